//! Configuration management

use config::{ConfigError, File, FileFormat};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub ami: AmiConfig,
    pub directory: DirectoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmiConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub secret: String,
}

/// Static directory tables: users to lines, lines to extensions, and the
/// switchboard hold queues.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub users: Vec<UserEntry>,
    pub lines: Vec<LineEntry>,
    pub queues: Vec<QueueEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    pub user_id: u64,
    pub line: String,
    pub number: String,
    pub context: String,
    #[serde(default)]
    pub caller_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineEntry {
    pub line: String,
    pub number: String,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub name: String,
    pub number: String,
    pub context: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for AmiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5038,
            username: "cti".to_string(),
            secret: "cti".to_string(),
        }
    }
}

impl Config {
    /// Load from an optional TOML file layered over the defaults.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }
        builder.build()?.try_deserialize()
    }

    pub fn ami_addr(&self) -> String {
        format!("{}:{}", self.ami.host, self.ami.port)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
