use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use restify_core::AppError;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Builds the CORS layer for a comma-separated list of frontend origins.
pub(super) fn build_cors_layer(frontend_url: &str) -> Result<CorsLayer, AppError> {
    let origins = frontend_url
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|error| {
                AppError::Validation(format!("invalid FRONTEND_URL origin '{origin}': {error}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if origins.is_empty() {
        return Err(AppError::Validation(
            "FRONTEND_URL must name at least one origin".to_owned(),
        ));
    }

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ACCEPT, CONTENT_TYPE]))
}

#[cfg(test)]
mod tests {
    use super::build_cors_layer;

    #[test]
    fn origins_are_split_on_commas() {
        assert!(build_cors_layer("http://localhost:3000, https://admin.example.com").is_ok());
    }

    #[test]
    fn empty_origin_list_is_rejected() {
        assert!(build_cors_layer(" , ").is_err());
    }
}
