//! Post use cases, shared by every transport.

use std::sync::Arc;

use crate::domain::{Post, PostInput};
use crate::error::{DomainError, RepoError, ValidationErrors};
use crate::ports::{CodecError, PostCodec, PostRepository, SheetFormat};

const ENTITY: &str = "Post";

/// Orchestrates the post repository and the spreadsheet codec.
pub struct PostService {
    repo: Arc<dyn PostRepository>,
    codec: Arc<dyn PostCodec>,
}

/// An exported file and the format it is written in.
#[derive(Debug, Clone)]
pub struct Export {
    pub format: SheetFormat,
    pub bytes: Vec<u8>,
}

impl PostService {
    pub fn new(repo: Arc<dyn PostRepository>, codec: Arc<dyn PostCodec>) -> Self {
        Self { repo, codec }
    }

    pub async fn list(&self) -> Result<Vec<Post>, DomainError> {
        self.repo.list().await.map_err(storage)
    }

    pub async fn create(
        &self,
        title: Option<String>,
        body: Option<String>,
    ) -> Result<Post, DomainError> {
        let input = PostInput::new(title, body)?;
        let post = self.repo.insert(input).await.map_err(storage)?;
        tracing::info!(post_id = post.id, "Post created");
        Ok(post)
    }

    pub async fn get(&self, id: i64) -> Result<Post, DomainError> {
        self.repo
            .find_by_id(id)
            .await
            .map_err(storage)?
            .ok_or(DomainError::NotFound {
                entity_type: ENTITY,
                id,
            })
    }

    pub async fn update(
        &self,
        id: i64,
        title: Option<String>,
        body: Option<String>,
    ) -> Result<Post, DomainError> {
        let input = PostInput::new(title, body)?;
        let post = self
            .repo
            .update(id, input)
            .await
            .map_err(|e| by_id(e, id))?;
        tracing::info!(post_id = post.id, "Post updated");
        Ok(post)
    }

    pub async fn delete(&self, id: i64) -> Result<(), DomainError> {
        self.repo.delete(id).await.map_err(|e| by_id(e, id))?;
        tracing::info!(post_id = id, "Post deleted");
        Ok(())
    }

    /// Import every row of a file, or nothing.
    ///
    /// All rows are validated before anything is written. Any invalid row
    /// rejects the whole file with errors keyed `rows.<line>.<field>`.
    pub async fn import(&self, bytes: &[u8], format: SheetFormat) -> Result<Vec<Post>, DomainError> {
        let rows = self.codec.decode(bytes, format)?;

        let mut errors = ValidationErrors::new();
        let mut inputs = Vec::with_capacity(rows.len());
        for row in rows {
            let line = row.line;
            match row.validate() {
                Ok(input) => inputs.push(input),
                Err(row_errors) => errors.merge_prefixed(&format!("rows.{line}"), row_errors),
            }
        }
        if !errors.is_empty() {
            tracing::debug!(failed_fields = errors.len(), "Import rejected");
            return Err(DomainError::Validation(errors));
        }

        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let posts = self.repo.insert_many(inputs).await.map_err(storage)?;
        tracing::info!(count = posts.len(), %format, "Posts imported");
        Ok(posts)
    }

    /// Every post, written with the codec's export format.
    pub async fn export(&self) -> Result<Export, DomainError> {
        let posts = self.list().await?;
        let bytes = self
            .codec
            .encode(&posts)
            .map_err(|e| DomainError::Internal(e.to_string()))?;
        tracing::debug!(count = posts.len(), size = bytes.len(), "Posts exported");
        Ok(Export {
            format: self.codec.export_format(),
            bytes,
        })
    }
}

impl From<CodecError> for DomainError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Write(msg) => DomainError::Internal(msg),
            other => DomainError::Format(other.to_string()),
        }
    }
}

fn storage(err: RepoError) -> DomainError {
    DomainError::Internal(err.to_string())
}

fn by_id(err: RepoError, id: i64) -> DomainError {
    match err {
        RepoError::NotFound => DomainError::NotFound {
            entity_type: ENTITY,
            id,
        },
        other => storage(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::domain::{PostRow, now, touched_at};

    /// Vec-backed repository, enough to drive the service.
    #[derive(Default)]
    struct StubRepo {
        posts: Mutex<Vec<Post>>,
    }

    impl StubRepo {
        fn store(&self, input: PostInput, posts: &mut Vec<Post>) -> Post {
            let (title, body) = input.into_parts();
            let at = now();
            let post = Post {
                id: posts.last().map(|p| p.id + 1).unwrap_or(1),
                title,
                body,
                created_at: at,
                updated_at: at,
            };
            posts.push(post.clone());
            post
        }
    }

    #[async_trait]
    impl PostRepository for StubRepo {
        async fn list(&self) -> Result<Vec<Post>, RepoError> {
            Ok(self.posts.lock().unwrap().clone())
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<Post>, RepoError> {
            Ok(self.posts.lock().unwrap().iter().find(|p| p.id == id).cloned())
        }

        async fn insert(&self, input: PostInput) -> Result<Post, RepoError> {
            let mut posts = self.posts.lock().unwrap();
            Ok(self.store(input, &mut posts))
        }

        async fn insert_many(&self, inputs: Vec<PostInput>) -> Result<Vec<Post>, RepoError> {
            let mut posts = self.posts.lock().unwrap();
            Ok(inputs
                .into_iter()
                .map(|input| self.store(input, &mut posts))
                .collect())
        }

        async fn update(&self, id: i64, input: PostInput) -> Result<Post, RepoError> {
            let mut posts = self.posts.lock().unwrap();
            let post = posts
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or(RepoError::NotFound)?;
            let (title, body) = input.into_parts();
            post.title = title;
            post.body = body;
            post.updated_at = touched_at(post.updated_at);
            Ok(post.clone())
        }

        async fn delete(&self, id: i64) -> Result<(), RepoError> {
            let mut posts = self.posts.lock().unwrap();
            let before = posts.len();
            posts.retain(|p| p.id != id);
            if posts.len() == before {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }
    }

    /// Codec that returns canned rows and writes `title|body` lines.
    struct StubCodec {
        rows: Vec<PostRow>,
    }

    impl PostCodec for StubCodec {
        fn decode(&self, _bytes: &[u8], format: SheetFormat) -> Result<Vec<PostRow>, CodecError> {
            match format {
                SheetFormat::Csv => Ok(self.rows.clone()),
                SheetFormat::Xlsx => Err(CodecError::MissingColumn("title")),
            }
        }

        fn encode(&self, posts: &[Post]) -> Result<Vec<u8>, CodecError> {
            let lines: Vec<String> = posts
                .iter()
                .map(|p| format!("{}|{}", p.title, p.body))
                .collect();
            Ok(lines.join("\n").into_bytes())
        }

        fn export_format(&self) -> SheetFormat {
            SheetFormat::Xlsx
        }
    }

    fn row(line: usize, title: Option<&str>, body: Option<&str>) -> PostRow {
        PostRow {
            line,
            title: title.map(String::from),
            body: body.map(String::from),
        }
    }

    fn service(rows: Vec<PostRow>) -> PostService {
        PostService::new(Arc::new(StubRepo::default()), Arc::new(StubCodec { rows }))
    }

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let svc = service(vec![]);
        let post = svc.create(some("Hello"), some("World")).await.unwrap();

        let found = svc.get(post.id).await.unwrap();
        assert_eq!(found, post);
        assert_eq!(found.title, "Hello");
        assert_eq!(found.body, "World");
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input() {
        let svc = service(vec![]);
        let err = svc.create(some(&"x".repeat(256)), None).await.unwrap_err();

        match err {
            DomainError::Validation(errors) => {
                assert!(errors.get("title").is_some());
                assert!(errors.get("body").is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(svc.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_keeps_id_and_advances_updated_at() {
        let svc = service(vec![]);
        let created = svc.create(some("a"), some("b")).await.unwrap();
        let updated = svc.update(created.id, some("c"), some("d")).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.title, "c");
        assert_eq!(updated.body, "d");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
    }

    #[tokio::test]
    async fn test_update_missing_post() {
        let svc = service(vec![]);
        let err = svc.update(999, some("a"), some("b")).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { id: 999, .. }));
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let svc = service(vec![]);
        let post = svc.create(some("a"), some("b")).await.unwrap();
        svc.delete(post.id).await.unwrap();

        assert!(matches!(svc.get(post.id).await, Err(DomainError::NotFound { .. })));
        assert!(matches!(svc.delete(post.id).await, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_import_inserts_all_rows() {
        let svc = service(vec![
            row(2, Some("A"), Some("B")),
            row(3, Some("C"), Some("D")),
        ]);
        let imported = svc.import(b"", SheetFormat::Csv).await.unwrap();
        assert_eq!(imported.len(), 2);

        let titles: Vec<String> = svc.list().await.unwrap().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_import_rejects_whole_file_on_bad_row() {
        let svc = service(vec![
            row(2, Some("A"), Some("B")),
            row(3, Some("C"), None),
        ]);
        let err = svc.import(b"", SheetFormat::Csv).await.unwrap_err();

        match err {
            DomainError::Validation(errors) => {
                assert!(errors.get("rows.3.body").is_some());
                assert_eq!(errors.len(), 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(svc.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_decode_failure_is_format_error() {
        let svc = service(vec![]);
        let err = svc.import(b"", SheetFormat::Xlsx).await.unwrap_err();
        assert!(matches!(err, DomainError::Format(_)));
    }

    #[tokio::test]
    async fn test_export_writes_all_posts_in_order() {
        let svc = service(vec![]);
        svc.create(some("one"), some("1")).await.unwrap();
        svc.create(some("two"), some("2")).await.unwrap();

        let export = svc.export().await.unwrap();
        assert_eq!(export.format, SheetFormat::Xlsx);
        assert_eq!(String::from_utf8(export.bytes).unwrap(), "one|1\ntwo|2");
    }
}
