//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod codec;
mod repository;

pub use codec::{CodecError, PostCodec, SheetFormat};
pub use repository::PostRepository;
