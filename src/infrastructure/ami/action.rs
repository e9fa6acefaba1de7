//! Outbound AMI actions

use uuid::Uuid;

/// An AMI action frame under construction.
///
/// Serialized as `Action: Name`, one `Key: Value` line per field, an
/// `ActionID` for response correlation, and a blank-line terminator.
#[derive(Debug, Clone)]
pub struct AmiAction {
    name: String,
    action_id: String,
    fields: Vec<(String, String)>,
}

impl AmiAction {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            action_id: Uuid::new_v4().to_string(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, key: &str, value: &str) -> Self {
        self.fields.push((key.to_string(), value.to_string()));
        self
    }

    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    /// Wire form of the action, ready to write to the manager socket.
    pub fn serialize(&self) -> String {
        let mut out = format!("Action: {}\r\n", self.name);
        for (key, value) in &self.fields {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("ActionID: ");
        out.push_str(&self.action_id);
        out.push_str("\r\n\r\n");
        out
    }

    pub fn login(username: &str, secret: &str) -> Self {
        Self::new("Login")
            .field("Username", username)
            .field("Secret", secret)
            .field("Events", "on")
    }

    pub fn hangup(channel: &str) -> Self {
        Self::new("Hangup").field("Channel", channel)
    }

    pub fn redirect(channel: &str, exten: &str, context: &str) -> Self {
        Self::new("Redirect")
            .field("Channel", channel)
            .field("Exten", exten)
            .field("Context", context)
            .field("Priority", "1")
    }

    pub fn atxfer(channel: &str, exten: &str, context: &str) -> Self {
        Self::new("Atxfer")
            .field("Channel", channel)
            .field("Exten", exten)
            .field("Context", context)
            .field("Priority", "1")
    }

    /// Originate a call to the switchboard line and bridge it straight to
    /// the waiting channel, presenting the waiting party's caller id and
    /// carrying the line's own id as connected-line variables.
    pub fn switchboard_retrieve(
        line_identity: &str,
        channel: &str,
        cid_name: &str,
        cid_number: &str,
        line_cid_name: &str,
        line_cid_number: &str,
    ) -> Self {
        Self::new("Originate")
            .field("Channel", line_identity)
            .field("Application", "Bridge")
            .field("Data", channel)
            .field("CallerID", &format!("\"{}\" <{}>", cid_name, cid_number))
            .field(
                "Variable",
                &format!("CONNECTEDLINE(name)={}", line_cid_name),
            )
            .field(
                "Variable",
                &format!("CONNECTEDLINE(num)={}", line_cid_number),
            )
            .field("Async", "true")
    }
}
