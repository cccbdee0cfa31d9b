//! Types shared by the office relay server and its clients.
//!
//! Everything that crosses the wire lives here so both ends agree on the
//! JSON shape, and so the browser client can import generated TypeScript
//! bindings for the same types.

pub mod config;
pub mod participant;
pub mod protocol;
