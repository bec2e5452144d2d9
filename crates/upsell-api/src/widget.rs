//! Embeddable logo carousel shown next to the upsell offer.

use axum::{
    http::header,
    response::{Html, IntoResponse},
};

const CAROUSEL_HTML: &str = include_str!("../assets/carousel.html");

/// Static HTML/CSS fragment, safe to cache for an hour
pub async fn carousel() -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "public, max-age=3600")],
        Html(CAROUSEL_HTML),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_is_self_contained() {
        assert!(CAROUSEL_HTML.contains("<style>"));
        assert!(CAROUSEL_HTML.contains("upsell-carousel__track"));
        assert!(!CAROUSEL_HTML.contains("<script"));
    }
}
