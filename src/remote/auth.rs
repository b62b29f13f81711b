// ABOUTME: Fetches bearer tokens for the secured charger-telemetry API
// ABOUTME: The token is opaque; only its location in the response body varies

use reqwest::Client;
use serde_json::Value;

use crate::error::{status_text, InferenceError, Result};

#[derive(Debug, Clone)]
pub struct TokenProvider {
    client: Client,
    endpoint: String,
}

impl TokenProvider {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub async fn fetch_token(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| InferenceError::Token(e.to_string()))?;

        if !response.status().is_success() {
            return Err(InferenceError::Token(status_text(response.status())));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| InferenceError::Token(format!("invalid token response: {}", e)))?;

        let token = extract_token(&body)
            .ok_or_else(|| InferenceError::Token("no token in response".to_string()))?;
        tracing::debug!(endpoint = %self.endpoint, "Fetched telemetry token");
        Ok(token)
    }
}

fn extract_token(body: &Value) -> Option<String> {
    ["/token", "/data/accessToken", "/data/token", "/accessToken"]
        .iter()
        .filter_map(|pointer| body.pointer(pointer).and_then(Value::as_str))
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

/// First characters of a token, safe to show in logs.
pub fn token_preview(token: &str) -> String {
    let preview: String = token.chars().take(20).collect();
    if preview.len() < token.len() {
        format!("{}...", preview)
    } else {
        preview
    }
}
