//! Veriff session client

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use lease_core::error::DomainError;
use lease_core::providers::{IdentityProvider, IdentitySession, IdentitySessionRequest};

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub api_key: String,
    /// HMAC key for decision callbacks.
    pub shared_secret: String,
    /// Public URL the provider posts decisions to.
    pub callback_url: String,
}

fn default_base_url() -> String {
    "https://stationapi.veriff.com".to_string()
}

#[derive(Serialize)]
struct SessionRequest<'a> {
    verification: SessionVerification<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionVerification<'a> {
    callback: &'a str,
    vendor_data: &'a str,
    person: SessionPerson<'a>,
    timestamp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionPerson<'a> {
    first_name: &'a str,
    last_name: &'a str,
}

#[derive(Deserialize)]
struct SessionResponse {
    verification: SessionCreated,
}

#[derive(Deserialize)]
struct SessionCreated {
    id: String,
    url: String,
}

pub struct VeriffClient {
    client: Client,
    config: IdentityConfig,
}

impl VeriffClient {
    pub fn new(config: IdentityConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
        }
    }
}

fn unavailable(detail: impl std::fmt::Display) -> DomainError {
    error!("Identity session creation failed: {}", detail);
    DomainError::Internal("identity verification is unavailable, try again later".to_string())
}

#[async_trait]
impl IdentityProvider for VeriffClient {
    async fn create_session(
        &self,
        request: &IdentitySessionRequest,
    ) -> Result<IdentitySession, DomainError> {
        let body = SessionRequest {
            verification: SessionVerification {
                callback: &self.config.callback_url,
                vendor_data: &request.vendor_data,
                person: SessionPerson {
                    first_name: &request.first_name,
                    last_name: &request.last_name,
                },
                timestamp: Utc::now().to_rfc3339(),
            },
        };

        let response = self
            .client
            .post(format!("{}/v1/sessions", self.config.base_url.trim_end_matches('/')))
            .header("X-AUTH-CLIENT", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(unavailable(format!("{} {}", status, text)));
        }

        let created: SessionResponse = response.json().await.map_err(unavailable)?;
        info!("Identity session {} created for {}", created.verification.id, request.vendor_data);
        Ok(IdentitySession {
            session_id: created.verification.id,
            redirect_url: created.verification.url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> VeriffClient {
        VeriffClient::new(IdentityConfig {
            base_url: server.uri(),
            api_key: "veriff-key".into(),
            shared_secret: "secret".into(),
            callback_url: "https://lease.example.com/api/kyc/webhook".into(),
        })
    }

    fn request() -> IdentitySessionRequest {
        IdentitySessionRequest {
            vendor_data: "8a6e0804-2bd0-4672-b79d-d97027f9071a".into(),
            first_name: "Somchai".into(),
            last_name: "Jaidee".into(),
        }
    }

    #[tokio::test]
    async fn test_create_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sessions"))
            .and(header("X-AUTH-CLIENT", "veriff-key"))
            .and(body_partial_json(json!({
                "verification": {
                    "callback": "https://lease.example.com/api/kyc/webhook",
                    "vendorData": "8a6e0804-2bd0-4672-b79d-d97027f9071a",
                    "person": { "firstName": "Somchai", "lastName": "Jaidee" }
                }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "status": "success",
                "verification": { "id": "sess-1", "url": "https://magic.veriff.me/v/abc" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = client(&server).create_session(&request()).await.unwrap();
        assert_eq!(session.session_id, "sess-1");
        assert_eq!(session.redirect_url, "https://magic.veriff.me/v/abc");
    }

    #[tokio::test]
    async fn test_provider_error_is_generic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad api key veriff-key"))
            .mount(&server)
            .await;

        let err = client(&server).create_session(&request()).await.unwrap_err();
        assert!(!err.to_string().contains("veriff-key"));
    }
}
