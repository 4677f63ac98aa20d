use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{errors::AppError, AppState};

/// Header devices put the shared secret in.
pub const API_KEY_HEADER: &str = "x-api-key";

/// The configured shared secret, kept only as a SHA-256 digest. Candidates
/// are hashed and compared over all 32 bytes.
#[derive(Clone)]
pub struct ApiKey {
    digest: Arc<[u8; 32]>,
}

impl ApiKey {
    pub fn new(secret: &str) -> Self {
        Self {
            digest: Arc::new(Sha256::digest(secret.as_bytes()).into()),
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        let candidate: [u8; 32] = Sha256::digest(candidate.as_bytes()).into();
        candidate
            .iter()
            .zip(self.digest.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

/// Route middleware rejecting requests without the shared secret.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok());

    match provided {
        Some(key) if state.api_key.matches(key) => Ok(next.run(request).await),
        Some(_) => {
            debug!(path = %request.uri().path(), "Wrong API key");
            Err(AppError::Unauthorized)
        }
        None => {
            debug!(path = %request.uri().path(), "Missing API key");
            Err(AppError::Unauthorized)
        }
    }
}
