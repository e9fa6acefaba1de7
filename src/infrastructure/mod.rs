//! Infrastructure layer - transports and external system adapters

pub mod ami;
