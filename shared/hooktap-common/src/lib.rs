//! Hooktap Common Library
//!
//! Wire types and framing helpers shared by the server and observer clients.

pub mod protocol;
pub mod types;

pub use types::*;
