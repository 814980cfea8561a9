//! HTTP handlers and route configuration.

mod health;
mod posts;
mod ui;


use actix_web::web;

use crate::middleware::error::{json_config, path_config};

/// Configure all application routes; JSON bodies are capped at `json_limit` bytes.
pub fn configure_routes(cfg: &mut web::ServiceConfig, json_limit: usize) {
    cfg.app_data(json_config(json_limit))
        .app_data(path_config())
        .route("/", web::get().to(ui::index))
        .service(
            web::scope("/api")
                .route("/health", web::get().to(health::health_check))
                // Fixed segments before `/{id}`
                .service(
                    web::scope("/posts")
                        .route("", web::get().to(posts::index))
                        .route("", web::post().to(posts::store))
                        .route("/import", web::post().to(posts::import))
                        .route("/export", web::get().to(posts::export))
                        .route("/{id}", web::get().to(posts::show))
                        .route("/{id}", web::put().to(posts::update))
                        .route("/{id}", web::delete().to(posts::destroy)),
                ),
        );
}
