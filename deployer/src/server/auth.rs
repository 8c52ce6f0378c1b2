//! API key and bearer token authentication

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use deploy_api::ErrorResponse;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::debug;

use crate::http::client::API_KEY_HEADER;
use crate::server::state::ServerState;
use crate::storage::settings::AuthSettings;

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
}

fn api_key_matches(auth: &AuthSettings, request: &Request<Body>) -> bool {
    let Some(expected) = &auth.api_key else {
        return false;
    };
    request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|key| key == expected.expose_secret())
}

fn bearer_valid(auth: &AuthSettings, request: &Request<Body>) -> bool {
    let Some(secret) = &auth.jwt_secret else {
        return false;
    };
    let Some(token) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    else {
        return false;
    };

    let key = DecodingKey::from_secret(secret.expose_secret().as_bytes());
    match decode::<Claims>(token, &key, &Validation::new(Algorithm::HS256)) {
        Ok(data) => {
            debug!(
                "Authenticated bearer token for {}",
                data.claims.sub.as_deref().unwrap_or("anonymous")
            );
            true
        }
        Err(e) => {
            debug!("Rejected bearer token: {}", e);
            false
        }
    }
}

/// Accept a matching `X-API-Key` or a valid HS256 bearer token
///
/// Everything passes when neither credential is configured.
pub async fn require_auth(
    State(state): State<Arc<ServerState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if state.auth.is_open()
        || api_key_matches(&state.auth, &request)
        || bearer_valid(&state.auth, &request)
    {
        return next.run(request).await;
    }

    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("unauthorized")),
    )
        .into_response()
}
