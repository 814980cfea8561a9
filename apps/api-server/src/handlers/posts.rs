//! Post handlers: CRUD plus spreadsheet import/export.

use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::{
    HttpResponse,
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    web,
};
use futures::TryStreamExt;

use quill_core::domain::Post;
use quill_core::ports::SheetFormat;
use quill_shared::ApiResponse;
use quill_shared::dto::{PostRequest, PostResponse};

use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// Multipart field carrying the import file.
const FILE_FIELD: &str = "file";

fn to_response(post: Post) -> PostResponse {
    PostResponse {
        id: post.id,
        title: post.title,
        body: post.body,
        created_at: post.created_at,
        updated_at: post.updated_at,
    }
}

/// GET /api/posts
pub async fn index(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let posts = state.posts.list().await?;
    let data: Vec<PostResponse> = posts.into_iter().map(to_response).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::ok(data)))
}

/// POST /api/posts
pub async fn store(
    state: web::Data<AppState>,
    body: web::Json<PostRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let post = state.posts.create(req.title, req.body).await?;

    Ok(HttpResponse::Created().json(ApiResponse::ok_with_message(
        to_response(post),
        "Post created successfully",
    )))
}

/// GET /api/posts/{id}
pub async fn show(state: web::Data<AppState>, path: web::Path<i64>) -> AppResult<HttpResponse> {
    let post = state.posts.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(to_response(post))))
}

/// PUT /api/posts/{id}
pub async fn update(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<PostRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let post = state
        .posts
        .update(path.into_inner(), req.title, req.body)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok_with_message(
        to_response(post),
        "Post updated successfully",
    )))
}

/// DELETE /api/posts/{id}
pub async fn destroy(state: web::Data<AppState>, path: web::Path<i64>) -> AppResult<HttpResponse> {
    state.posts.delete(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message("Post deleted successfully")))
}

/// POST /api/posts/import - multipart upload with an `.xlsx` or `.csv` in field `file`.
pub async fn import(state: web::Data<AppState>, payload: Multipart) -> AppResult<HttpResponse> {
    let upload = read_upload(payload, state.max_upload_bytes).await?;

    let format = SheetFormat::detect(upload.file_name.as_deref(), upload.content_type.as_deref())
        .ok_or_else(|| AppError::field(FILE_FIELD, "The file field must be a file of type: xlsx, csv."))?;

    let imported = state.posts.import(&upload.bytes, format).await?;
    tracing::debug!(
        file_name = upload.file_name.as_deref().unwrap_or("-"),
        count = imported.len(),
        "Import finished"
    );

    Ok(HttpResponse::Ok().json(ApiResponse::message("Posts imported successfully")))
}

/// GET /api/posts/export - every post as `posts.xlsx`.
pub async fn export(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let export = state.posts.export().await?;

    let disposition = ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(format!(
            "posts.{}",
            export.format.extension()
        ))],
    };

    Ok(HttpResponse::Ok()
        .content_type(export.format.mime())
        .insert_header(disposition)
        .body(export.bytes))
}

/// The file part of an import request.
struct Upload {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

async fn read_upload(mut payload: Multipart, limit: usize) -> AppResult<Upload> {
    while let Some(field) = payload.try_next().await.map_err(unreadable)? {
        if field.name() == Some(FILE_FIELD) {
            return read_file_field(field, limit).await;
        }
    }

    Err(AppError::field(FILE_FIELD, "The file field is required."))
}

async fn read_file_field(mut field: Field, limit: usize) -> AppResult<Upload> {
    let file_name = field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .map(str::to_owned);
    let content_type = field.content_type().map(|m| m.essence_str().to_owned());

    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(unreadable)? {
        if bytes.len() + chunk.len() > limit {
            return Err(AppError::field(
                FILE_FIELD,
                format!(
                    "The file field must not be greater than {} kilobytes.",
                    limit / 1024
                ),
            ));
        }
        bytes.extend_from_slice(&chunk);
    }

    if bytes.is_empty() {
        return Err(AppError::field(FILE_FIELD, "The file field is required."));
    }

    Ok(Upload {
        file_name,
        content_type,
        bytes,
    })
}

fn unreadable(err: MultipartError) -> AppError {
    AppError::field(FILE_FIELD, format!("The file could not be uploaded: {err}"))
}
