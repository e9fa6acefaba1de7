//! Asterisk Manager Interface (AMI) transport
//!
//! Frames are `Key: Value` lines terminated by a blank line. The client
//! logs in over TCP, turns incoming event frames into normalized
//! [`AmiEvent`]s, and serializes outbound [`AmiAction`]s for the
//! signaling command port.

pub mod action;
pub mod client;
pub mod event;

pub use action::AmiAction;
pub use client::AmiClient;
pub use event::AmiEvent;
