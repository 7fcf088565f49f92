//! Shared Types

mod payload;
mod response;

pub use payload::*;
pub use response::*;
