//! Interface layer - WebSocket client sessions and HTTP endpoints

pub mod metrics;
pub mod router;
pub mod session;
pub mod ws;
