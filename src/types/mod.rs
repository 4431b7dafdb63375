//! Core transcript types.

pub mod message;
pub mod usage;

pub use message::*;
pub use usage::*;
