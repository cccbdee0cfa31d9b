//! Client half of the office presence sync: publishes the local avatar and
//! mirrors everyone else's from the relay's broadcasts.

pub mod config;
pub mod connection;
pub mod local;
pub mod presenter;
pub mod publisher;
pub mod reconciler;
pub mod session;
pub mod wanderer;
