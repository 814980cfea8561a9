//! The browser client, served as one static page.

use actix_web::{HttpResponse, http::header::ContentType};

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// GET /
pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(INDEX_HTML)
}
