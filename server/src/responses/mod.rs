//! Response Overrides
//!
//! Per-channel synthetic reply for webhook senders, and the administrative
//! endpoint observers use to change it.

pub mod error;
pub mod handlers;
pub mod store;

pub use error::OverrideError;
pub use store::ResponseStore;
pub use handlers::update_response;
