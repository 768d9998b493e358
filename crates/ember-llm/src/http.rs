//! Shared HTTP plumbing for the JSON completion providers.

use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use ember_core::GatewayError;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client with the provider connect and read timeouts.
pub fn build_client() -> Result<Client, GatewayError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(READ_TIMEOUT)
        .build()
        .map_err(|e| GatewayError::NetworkError(format!("failed to build HTTP client: {e}")))
}

/// POST `body` as JSON with bearer auth and decode the JSON reply.
pub async fn post_json<B, R>(
    client: &Client,
    url: &str,
    api_key: &SecretString,
    body: &B,
) -> Result<R, GatewayError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let resp = client
        .post(url)
        .bearer_auth(api_key.expose_secret())
        .header("accept", "application/json")
        .json(body)
        .send()
        .await
        .map_err(classify)?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        debug!(url, status = status.as_u16(), "upstream rejected request");
        return Err(GatewayError::from_status(status.as_u16(), body));
    }

    resp.json::<R>()
        .await
        .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
}

fn classify(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout(READ_TIMEOUT)
    } else {
        GatewayError::NetworkError(e.to_string())
    }
}

/// Trimmed text, or `InvalidResponse` when the provider returned nothing.
pub fn non_empty(text: Option<String>, provider: &str) -> Result<String, GatewayError> {
    match text.map(|t| t.trim().to_string()) {
        Some(t) if !t.is_empty() => Ok(t),
        _ => Err(GatewayError::InvalidResponse(format!("{provider}: empty completion"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_trims() {
        assert_eq!(non_empty(Some("  hi \n".into()), "p").unwrap(), "hi");
    }

    #[test]
    fn non_empty_rejects_blank_and_missing() {
        assert!(matches!(
            non_empty(Some("   ".into()), "p"),
            Err(GatewayError::InvalidResponse(_))
        ));
        assert!(non_empty(None, "p").is_err());
    }

    #[test]
    fn client_builds() {
        assert!(build_client().is_ok());
    }
}
