//! PostgreSQL repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, DbConn, DbErr, EntityTrait, IntoActiveModel, QueryOrder,
    TransactionTrait,
};

use quill_core::domain::{self, Post, PostInput};
use quill_core::error::RepoError;
use quill_core::ports::PostRepository;

use super::entity::post::{self, Entity as PostEntity};

/// PostgreSQL post repository.
pub struct PostgresPostRepository {
    pub(crate) db: DbConn,
}

impl PostgresPostRepository {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }

    fn new_row(input: PostInput, at: DateTime<Utc>) -> post::ActiveModel {
        let (title, body) = input.into_parts();
        post::ActiveModel {
            title: Set(title),
            body: Set(body),
            created_at: Set(at.into()),
            updated_at: Set(at.into()),
            ..Default::default()
        }
    }
}

fn db_err(err: DbErr) -> RepoError {
    match err {
        DbErr::Conn(e) => RepoError::Connection(e.to_string()),
        DbErr::ConnectionAcquire(e) => RepoError::Connection(e.to_string()),
        DbErr::RecordNotFound(_) | DbErr::RecordNotUpdated => RepoError::NotFound,
        other => RepoError::Query(other.to_string()),
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn list(&self) -> Result<Vec<Post>, RepoError> {
        let result = PostEntity::find()
            .order_by_asc(post::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, RepoError> {
        let result = PostEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;

        Ok(result.map(Into::into))
    }

    async fn insert(&self, input: PostInput) -> Result<Post, RepoError> {
        let model = Self::new_row(input, domain::now())
            .insert(&self.db)
            .await
            .map_err(db_err)?;

        tracing::debug!(post_id = model.id, "Inserted post");
        Ok(model.into())
    }

    async fn insert_many(&self, inputs: Vec<PostInput>) -> Result<Vec<Post>, RepoError> {
        let at = domain::now();
        let txn = self.db.begin().await.map_err(db_err)?;

        // Dropping the transaction on an early return rolls it back.
        let mut posts: Vec<Post> = Vec::with_capacity(inputs.len());
        for input in inputs {
            let model = Self::new_row(input, at)
                .insert(&txn)
                .await
                .map_err(db_err)?;
            posts.push(model.into());
        }

        txn.commit().await.map_err(db_err)?;
        tracing::debug!(count = posts.len(), "Inserted post batch");
        Ok(posts)
    }

    async fn update(&self, id: i64, input: PostInput) -> Result<Post, RepoError> {
        let existing = PostEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(RepoError::NotFound)?;

        let previous: DateTime<Utc> = existing.updated_at.into();
        let (title, body) = input.into_parts();

        let mut active = existing.into_active_model();
        active.title = Set(title);
        active.body = Set(body);
        active.updated_at = Set(domain::touched_at(previous).into());

        let model = active.update(&self.db).await.map_err(db_err)?;
        tracing::debug!(post_id = model.id, "Updated post");
        Ok(model.into())
    }

    async fn delete(&self, id: i64) -> Result<(), RepoError> {
        let result = PostEntity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }

        tracing::debug!(post_id = id, "Deleted post");
        Ok(())
    }
}
