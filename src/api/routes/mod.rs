//! Route handlers for the HTTP API
//!
//! - [`records`] - The record feed (`GET /`)
//! - [`system`] - Health

mod records;
mod system;

pub use records::*;
pub use system::*;
