//! CORS policy for the browser client.

use actix_cors::Cors;

/// Any method and header from the configured origins; credentials are not supported.
pub fn cors(origins: &[String]) -> Cors {
    let base = Cors::default().allow_any_method().allow_any_header();

    if origins.iter().any(|o| o == "*") {
        return base.allow_any_origin();
    }

    origins
        .iter()
        .fold(base, |cors, origin| cors.allowed_origin(origin))
}
