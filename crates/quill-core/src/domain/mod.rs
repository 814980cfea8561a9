//! Domain entities - the core business objects.

mod post;

pub use post::{Post, PostInput, PostRow, TITLE_MAX_CHARS, now, touched_at};
