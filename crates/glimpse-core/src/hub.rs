//! Model hub authentication.
//!
//! The token is verified once before caption generation. A failure is logged
//! and returned as `PipelineError::Auth`; there is no retry.

use std::time::Duration;

use serde::Deserialize;

use crate::config::Config;
use crate::error::PipelineError;

/// Identity reported by the hub for a valid token.
#[derive(Debug, Clone, Deserialize)]
pub struct HubUser {
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// Verify the configured hub token against `{hub}/api/whoami-v2`.
pub async fn login(config: &Config) -> Result<HubUser, PipelineError> {
    let result = match config.hub_token() {
        Some(token) => whoami(&config.models.hub.endpoint, &token).await,
        None => Err(PipelineError::Auth {
            message: "No hub token configured. Set defaults.token or HF_TOKEN.".to_string(),
        }),
    };

    match result {
        Ok(user) => {
            tracing::info!("Logged in to model hub as {}", user.name);
            Ok(user)
        }
        Err(e) => {
            tracing::error!("Error logging in to model hub: {e}");
            Err(e)
        }
    }
}

async fn whoami(endpoint: &str, token: &str) -> Result<HubUser, PipelineError> {
    let url = format!("{}/api/whoami-v2", endpoint.trim_end_matches('/'));
    let resp = reqwest::Client::new()
        .get(&url)
        .bearer_auth(token)
        .timeout(Duration::from_secs(30))
        .send()
        .await
        .map_err(|e| PipelineError::Auth {
            message: format!("Request to {url} failed: {e}"),
        })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(PipelineError::Auth {
            message: format!("Hub rejected token (HTTP {status})"),
        });
    }

    resp.json().await.map_err(|e| PipelineError::Auth {
        message: format!("Unexpected whoami response: {e}"),
    })
}
