//! Request plumbing shared by all handlers.

pub mod cors;
pub mod error;
