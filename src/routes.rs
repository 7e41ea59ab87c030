use crate::error::{internal_error, ApiError};
use crate::model::{HealthResponse, ShortenRequest, ShortenResponse, UrlMapping};
use crate::shortener::Shortener;
use async_trait::async_trait;
use axum::extract::{FromRequest, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use std::sync::Arc;
use url::Url;

#[derive(Clone)]
pub struct AppState {
    pub shortener: Shortener,
    pub encrypted_api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(shortener: Shortener, encrypted_api_key: Option<String>) -> Self {
        Self {
            shortener,
            encrypted_api_key: encrypted_api_key.map(Arc::from),
        }
    }
}

/// `POST /api/shorturl` body. The bundled form posts url-encoded data, API
/// clients send JSON. Bodies that cannot be read count as an invalid url.
pub struct ShortenPayload(pub ShortenRequest);

#[async_trait]
impl<S> FromRequest<S> for ShortenPayload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

        let payload = if is_form {
            Form::<ShortenRequest>::from_request(request, state)
                .await
                .map(|Form(payload)| payload)
                .map_err(|rejection| rejection.body_text())
        } else {
            Json::<ShortenRequest>::from_request(request, state)
                .await
                .map(|Json(payload)| payload)
                .map_err(|rejection| rejection.body_text())
        };

        payload.map(Self).map_err(|reason| {
            tracing::debug!("Unreadable shorten request: {}", reason);
            ApiError::InvalidUrl
        })
    }
}

pub async fn create_short_url(
    State(state): State<AppState>,
    ShortenPayload(request): ShortenPayload,
) -> Result<Json<ShortenResponse>, ApiError> {
    let mapping = state.shortener.shorten(&request.url).await?;
    Ok(Json(mapping.into()))
}

pub async fn redirect(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, ApiError> {
    let original_url = state.shortener.resolve(&code).await?;
    let location = redirect_location(&original_url).map_err(internal_error)?;
    tracing::debug!("Redirecting {} to {}", code, location);
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

/// Stored urls are sent back as written unless they contain whitespace,
/// control or non-ASCII characters. Those are replaced by the parsed url,
/// whose serialization is percent-encoded.
fn redirect_location(original_url: &str) -> Result<String, url::ParseError> {
    if original_url.bytes().all(|byte| byte.is_ascii_graphic()) {
        return Ok(original_url.to_string());
    }
    Url::parse(original_url).map(String::from)
}

pub async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<UrlMapping>>, ApiError> {
    Ok(Json(state.shortener.list_all().await?))
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.shortener.count().await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                database: "connected",
            }),
        ),
        Err(err) => {
            tracing::error!("Health check failed: {}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    database: "disconnected",
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{encrypt_api_key, API_KEY_HEADER};
    use crate::create_router;
    use crate::store::memory::MemoryStore;
    use crate::store::testing::FailingStore;
    use crate::store::MappingStore;
    use crate::validator::UrlValidator;
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app_with(store: Arc<dyn MappingStore>, encrypted_api_key: Option<String>) -> Router {
        let shortener = Shortener::new(store, UrlValidator::default());
        create_router(
            AppState::new(shortener, encrypted_api_key),
            std::path::Path::new("public"),
        )
    }

    fn app() -> Router {
        app_with(Arc::new(MemoryStore::new()), None)
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/shorturl")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn shorten_and_redirect_flow() {
        let app = app();

        let response = app
            .clone()
            .oneshot(post_json(r#"{"url":"https://example.com"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"original_url": "https://example.com", "short_url": 1})
        );

        let response = app
            .clone()
            .oneshot(post_json(r#"{"url":"https://example.com"}"#))
            .await
            .unwrap();
        assert_eq!(
            json_body(response).await,
            json!({"original_url": "https://example.com", "short_url": 1})
        );

        let response = app
            .clone()
            .oneshot(get_request("/api/shorturl/1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://example.com"
        );

        let response = app
            .clone()
            .oneshot(get_request("/api/shorturl/abc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({"error": "Wrong format"}));

        let response = app
            .oneshot(post_json(r#"{"url":"ftp://example.com"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({"error": "invalid url"}));
    }

    #[tokio::test]
    async fn redirect_location_is_always_a_valid_header() {
        let app = app();
        for (i, (url, location)) in [
            ("https://example.com/a\nb", "https://example.com/ab"),
            ("https://example.com/caf\u{e9} au lait", "https://example.com/caf%C3%A9%20au%20lait"),
        ]
        .iter()
        .enumerate()
        {
            let body = json!({ "url": url }).to_string();
            let response = app.clone().oneshot(post_json(&body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(json_body(response).await["original_url"], *url);

            let response = app
                .clone()
                .oneshot(get_request(&format!("/api/shorturl/{}", i + 1)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FOUND, "{url:?}");
            assert_eq!(response.headers().get(header::LOCATION).unwrap(), *location);
        }
    }

    #[tokio::test]
    async fn lenient_codes_redirect() {
        let app = app();
        app.clone()
            .oneshot(post_json(r#"{"url":"https://example.com"}"#))
            .await
            .unwrap();

        for uri in ["/api/shorturl/1abc", "/api/shorturl/%201", "/api/shorturl/1.0"] {
            let response = app.clone().oneshot(get_request(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::FOUND, "{uri}");
            assert_eq!(
                response.headers().get(header::LOCATION).unwrap(),
                "https://example.com"
            );
        }
    }

    #[tokio::test]
    async fn accepts_url_encoded_form() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/shorturl")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("url=https%3A%2F%2Fexample.com%2Fpath%3Fa%3D1"))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"original_url": "https://example.com/path?a=1", "short_url": 1})
        );
    }

    #[tokio::test]
    async fn unreadable_bodies_are_invalid_urls() {
        for body in ["{}", "not json", r#"{"url": 42}"#] {
            let response = app().oneshot(post_json(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(json_body(response).await, json!({"error": "invalid url"}));
        }

        let request = Request::builder()
            .method("POST")
            .uri("/api/shorturl")
            .body(Body::from(r#"{"url":"https://example.com"}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(json_body(response).await, json!({"error": "invalid url"}));
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let response = app()
            .oneshot(get_request("/api/shorturl/999999"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await,
            json!({"error": "No short URL found for the given input"})
        );
    }

    #[tokio::test]
    async fn lists_all_mappings() {
        let app = app();
        for url in ["https://a.com", "https://b.com"] {
            let body = json!({ "url": url }).to_string();
            app.clone().oneshot(post_json(&body)).await.unwrap();
        }

        let response = app.oneshot(get_request("/api/all")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let mappings = body.as_array().unwrap();
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[0]["original_url"], "https://a.com");
        assert_eq!(mappings[0]["short_url"], 1);
        assert_eq!(mappings[1]["original_url"], "https://b.com");
        assert_eq!(mappings[1]["short_url"], 2);
        assert!(mappings[0]["created_at"].is_string());
    }

    #[tokio::test]
    async fn list_all_requires_api_key_when_configured() {
        let app = app_with(
            Arc::new(MemoryStore::new()),
            Some(encrypt_api_key("secret")),
        );

        let response = app.clone().oneshot(get_request("/api/all")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await, json!({"error": "Unauthorized"}));

        let wrong_key = Request::builder()
            .uri("/api/all")
            .header(API_KEY_HEADER, "guess")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(wrong_key).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let right_key = Request::builder()
            .uri("/api/all")
            .header(API_KEY_HEADER, "secret")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(right_key).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!([]));

        // the other routes stay open
        let response = app
            .oneshot(post_json(r#"{"url":"https://example.com"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn store_failures_are_server_errors() {
        let app = app_with(Arc::new(FailingStore::unavailable()), None);

        let response = app
            .clone()
            .oneshot(post_json(r#"{"url":"https://example.com"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await, json!({"error": "server error"}));

        let response = app
            .clone()
            .oneshot(get_request("/api/shorturl/1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await, json!({"error": "server error"}));

        let response = app.oneshot(get_request("/api/all")).await.unwrap();
        assert_eq!(json_body(response).await, json!({"error": "server error"}));
    }

    #[tokio::test]
    async fn health_reflects_store_connectivity() {
        let response = app().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"status": "ok", "database": "connected"})
        );

        let response = app_with(Arc::new(FailingStore::unavailable()), None)
            .oneshot(get_request("/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            json_body(response).await,
            json!({"status": "degraded", "database": "disconnected"})
        );
    }

    #[tokio::test]
    async fn serves_the_index_page() {
        let response = app().oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/html"));
    }
}
