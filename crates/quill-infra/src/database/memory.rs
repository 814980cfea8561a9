//! In-memory post repository - used when no database is configured, and in tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use quill_core::domain::{self, Post, PostInput};
use quill_core::error::RepoError;
use quill_core::ports::PostRepository;

struct Table {
    next_id: i64,
    rows: BTreeMap<i64, Post>,
}

impl Table {
    fn insert(&mut self, input: PostInput, at: chrono::DateTime<chrono::Utc>) -> Post {
        let (title, body) = input.into_parts();
        let post = Post {
            id: self.next_id,
            title,
            body,
            created_at: at,
            updated_at: at,
        };
        self.next_id += 1;
        self.rows.insert(post.id, post.clone());
        post
    }
}

/// Post repository backed by a `BTreeMap` behind an async RwLock.
///
/// Ids start at 1 and are never reused, as with a database sequence.
/// Note: Data is lost on process restart.
pub struct InMemoryPostRepository {
    table: RwLock<Table>,
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table {
                next_id: 1,
                rows: BTreeMap::new(),
            }),
        }
    }
}

impl Default for InMemoryPostRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn list(&self) -> Result<Vec<Post>, RepoError> {
        let table = self.table.read().await;
        Ok(table.rows.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, RepoError> {
        let table = self.table.read().await;
        Ok(table.rows.get(&id).cloned())
    }

    async fn insert(&self, input: PostInput) -> Result<Post, RepoError> {
        let mut table = self.table.write().await;
        Ok(table.insert(input, domain::now()))
    }

    async fn insert_many(&self, inputs: Vec<PostInput>) -> Result<Vec<Post>, RepoError> {
        // One write lock for the whole batch, so readers never see half of it.
        let mut table = self.table.write().await;
        let at = domain::now();
        Ok(inputs
            .into_iter()
            .map(|input| table.insert(input, at))
            .collect())
    }

    async fn update(&self, id: i64, input: PostInput) -> Result<Post, RepoError> {
        let mut table = self.table.write().await;
        let post = table.rows.get_mut(&id).ok_or(RepoError::NotFound)?;

        let (title, body) = input.into_parts();
        post.title = title;
        post.body = body;
        post.updated_at = domain::touched_at(post.updated_at);

        Ok(post.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), RepoError> {
        let mut table = self.table.write().await;
        table
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(title: &str, body: &str) -> PostInput {
        PostInput::new(Some(title.to_string()), Some(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_fresh_ids() {
        let repo = InMemoryPostRepository::new();
        let first = repo.insert(input("a", "b")).await.unwrap();
        repo.delete(first.id).await.unwrap();
        let second = repo.insert(input("c", "d")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(second.created_at, second.updated_at);
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_id() {
        let repo = InMemoryPostRepository::new();
        repo.insert(input("first", "1")).await.unwrap();
        repo.insert_many(vec![input("second", "2"), input("third", "3")])
            .await
            .unwrap();

        let titles: Vec<String> = repo.list().await.unwrap().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_update_replaces_fields() {
        let repo = InMemoryPostRepository::new();
        let post = repo.insert(input("a", "b")).await.unwrap();
        let updated = repo.update(post.id, input("c", "d")).await.unwrap();

        assert_eq!(updated.id, post.id);
        assert_eq!((updated.title.as_str(), updated.body.as_str()), ("c", "d"));
        assert!(updated.updated_at > post.updated_at);
        assert_eq!(repo.find_by_id(post.id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn test_missing_ids() {
        let repo = InMemoryPostRepository::new();
        assert_eq!(repo.find_by_id(42).await.unwrap(), None);
        assert!(matches!(
            repo.update(42, input("a", "b")).await,
            Err(RepoError::NotFound)
        ));
        assert!(matches!(repo.delete(42).await, Err(RepoError::NotFound)));
    }
}
