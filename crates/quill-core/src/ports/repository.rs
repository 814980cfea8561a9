use async_trait::async_trait;

use crate::domain::{Post, PostInput};
use crate::error::RepoError;

/// Post storage. Implementations assign ids and timestamps.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// All posts, ascending by id.
    async fn list(&self) -> Result<Vec<Post>, RepoError>;

    /// Find a post by its id.
    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, RepoError>;

    /// Insert a new post.
    async fn insert(&self, input: PostInput) -> Result<Post, RepoError>;

    /// Insert a batch of posts atomically: either every input is stored or none is.
    async fn insert_many(&self, inputs: Vec<PostInput>) -> Result<Vec<Post>, RepoError>;

    /// Replace title and body of an existing post.
    ///
    /// Returns [`RepoError::NotFound`] when no post has this id.
    async fn update(&self, id: i64, input: PostInput) -> Result<Post, RepoError>;

    /// Permanently remove a post.
    ///
    /// Returns [`RepoError::NotFound`] when no post has this id.
    async fn delete(&self, id: i64) -> Result<(), RepoError>;
}
