use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use lease_core::domain::{DeedData, UploadedDocument, UtilityBillData};
use lease_core::error::DomainError;
use lease_core::providers::{resolve_unit_match, DocumentIntelligence, UnitCandidate};

use super::prompts;
use crate::limiters::Limiters;

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Extraction, comparison and matching.
    #[serde(default = "default_flash_model")]
    pub flash_model: String,
    /// Forensic authenticity scoring.
    #[serde(default = "default_pro_model")]
    pub pro_model: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Simultaneous model calls allowed.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_ms: u64,
}

fn default_concurrency() -> usize {
    4
}

fn default_acquire_timeout() -> u64 {
    30_000
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_flash_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_pro_model() -> String {
    "gemini-2.5-pro".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Inline { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
    limiters: Arc<Limiters>,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig, limiters: Arc<Limiters>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
            limiters,
        }
    }

    /// One generateContent call; returns the concatenated text parts.
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        document: Option<&UploadedDocument>,
    ) -> Result<String, DomainError> {
        let (_permit, wait) = Limiters::acquire_timed(
            self.limiters.document_ai.clone(),
            self.limiters.acquire_timeout,
            "gemini_generate",
        )
        .await
        .map_err(|e| {
            warn!("{}", e);
            DomainError::Extraction("document analysis is busy, try again".to_string())
        })?;
        debug!("Gemini permit acquired after {:?}", wait);

        let mut parts = vec![Part::Text { text: prompt }];
        if let Some(document) = document {
            parts.push(Part::Inline {
                inline_data: InlineData {
                    mime_type: &document.mime_type,
                    data: STANDARD.encode(&document.bytes),
                },
            });
        }
        let request = GenerateRequest {
            contents: vec![Content { parts }],
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini network error: {}", e);
                unavailable()
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Gemini API error ({}): {}", status, body);
            return Err(unavailable());
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            unavailable()
        })?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            warn!("Gemini returned no text for model {}", model);
            return Err(DomainError::Extraction("the document could not be read".to_string()));
        }
        Ok(text)
    }

    async fn extract_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        document: &UploadedDocument,
    ) -> Result<T, DomainError> {
        let text = self
            .generate(&self.config.flash_model, prompt, Some(document))
            .await?;
        serde_json::from_str(strip_code_fences(&text)).map_err(|e| {
            warn!("Gemini returned unparseable JSON ({}): {}", e, text);
            DomainError::Extraction("the document could not be read".to_string())
        })
    }
}

fn unavailable() -> DomainError {
    DomainError::Extraction("document analysis service unavailable".to_string())
}

/// Remove a surrounding markdown code fence, with or without a language tag.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    match inner.split_once('\n') {
        Some((tag, rest)) if tag.trim().chars().all(|c| c.is_ascii_alphanumeric()) => rest.trim(),
        _ => inner.trim(),
    }
}

/// Parse a percentage answer, clamped to `[0, 100]`; anything else scores 0.
fn parse_score(answer: &str) -> f64 {
    answer
        .trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite())
        .map(|s| s.clamp(0.0, 100.0))
        .unwrap_or(0.0)
}

#[async_trait]
impl DocumentIntelligence for GeminiClient {
    async fn extract_fingerprint(&self, document: &UploadedDocument) -> Result<String, DomainError> {
        info!("Extracting contract fingerprint from {:?}", document);
        let text = self
            .generate(&self.config.flash_model, prompts::CONTRACT_FINGERPRINT, Some(document))
            .await?;
        Ok(strip_code_fences(&text).to_string())
    }

    async fn check_authenticity(&self, document: &UploadedDocument) -> f64 {
        match self
            .generate(&self.config.pro_model, prompts::AUTHENTICITY, Some(document))
            .await
        {
            Ok(answer) => {
                let score = parse_score(&answer);
                info!("Authenticity score for {}: {}", document.file_name, score);
                score
            }
            Err(e) => {
                warn!("Authenticity check failed, scoring 0: {}", e);
                0.0
            }
        }
    }

    async fn extract_deed_data(&self, document: &UploadedDocument) -> Result<DeedData, DomainError> {
        self.extract_json(prompts::TITLE_DEED, document).await
    }

    async fn extract_utility_bill_data(
        &self,
        document: &UploadedDocument,
    ) -> Result<UtilityBillData, DomainError> {
        self.extract_json(prompts::UTILITY_BILL, document).await
    }

    async fn compare_addresses(&self, a: &str, b: &str) -> bool {
        let prompt = prompts::compare_addresses(a, b);
        match self.generate(&self.config.flash_model, &prompt, None).await {
            Ok(answer) => {
                let answer = answer.trim().trim_end_matches('.').to_lowercase();
                debug!("Address comparison answer: {}", answer);
                answer == "true"
            }
            Err(e) => {
                warn!("Address comparison failed, treating as different: {}", e);
                false
            }
        }
    }

    async fn find_best_unit_match(&self, query: &str, candidates: &[UnitCandidate]) -> Option<Uuid> {
        if candidates.is_empty() {
            return None;
        }
        let labels: Vec<&str> = candidates.iter().map(|c| c.label.as_str()).collect();
        let prompt = prompts::best_unit_match(query, &labels);
        match self.generate(&self.config.flash_model, &prompt, None).await {
            Ok(answer) => {
                let matched = resolve_unit_match(&answer, candidates);
                info!("Unit match for '{}': {:?} (answer '{}')", query, matched, answer.trim());
                matched
            }
            Err(e) => {
                warn!("Unit matching failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
    }

    fn client(server: &MockServer) -> GeminiClient {
        let config = GeminiConfig {
            api_key: "test-key".into(),
            base_url: server.uri(),
            flash_model: "flash".into(),
            pro_model: "pro".into(),
            request_timeout_secs: 5,
            concurrency: 2,
            acquire_timeout_ms: 1000,
        };
        GeminiClient::new(config, Arc::new(Limiters::new(2, 1, 1000)))
    }

    fn scan() -> UploadedDocument {
        UploadedDocument::new(b"%PDF".to_vec(), "application/pdf", "lease.pdf")
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```{\n\"a\": 1\n}```"), "{\n\"a\": 1\n}");
        assert_eq!(strip_code_fences("  plain  "), "plain");
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("98.5"), 98.5);
        assert_eq!(parse_score(" 91% \n"), 91.0);
        assert_eq!(parse_score("150"), 100.0);
        assert_eq!(parse_score("NaN"), 0.0);
        assert_eq!(parse_score("looks genuine"), 0.0);
    }

    #[tokio::test]
    async fn test_fingerprint_sends_inline_document() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_string_contains("\"mime_type\":\"application/pdf\""))
            .and(body_string_contains(&STANDARD.encode(b"%PDF")))
            .respond_with(reply("Landlord: A | Tenant: B | Unit: 1 | From: 01/01/2025 | To: 31/12/2025 | Rent: 100\n"))
            .expect(1)
            .mount(&server)
            .await;

        let fingerprint = client(&server).extract_fingerprint(&scan()).await.unwrap();
        assert_eq!(
            fingerprint,
            "Landlord: A | Tenant: B | Unit: 1 | From: 01/01/2025 | To: 31/12/2025 | Rent: 100"
        );
    }

    #[tokio::test]
    async fn test_authenticity_uses_pro_model_and_fails_closed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/pro:generateContent"))
            .respond_with(reply("97.25"))
            .mount(&server)
            .await;
        assert_eq!(client(&server).check_authenticity(&scan()).await, 97.25);

        let broken = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&broken)
            .await;
        assert_eq!(client(&broken).check_authenticity(&scan()).await, 0.0);
    }

    #[tokio::test]
    async fn test_deed_json_inside_fence() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply(
                "```json\n{\"ownerName\": \"Somchai Jaidee\", \"propertyAddress\": \"285 Soi Sukhumvit 72\"}\n```",
            ))
            .mount(&server)
            .await;

        let deed = client(&server).extract_deed_data(&scan()).await.unwrap();
        assert_eq!(deed.owner_name, "Somchai Jaidee");
        assert_eq!(deed.property_address, "285 Soi Sukhumvit 72");
    }

    #[tokio::test]
    async fn test_bill_with_wrong_shape_is_extraction_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply("{\"name\": \"Somchai\"}"))
            .mount(&server)
            .await;

        let result = client(&server).extract_utility_bill_data(&scan()).await;
        assert!(matches!(result, Err(DomainError::Extraction(_))));
    }

    #[tokio::test]
    async fn test_empty_candidates_reply_is_extraction_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let result = client(&server).extract_fingerprint(&scan()).await;
        assert!(matches!(result, Err(DomainError::Extraction(_))));
    }

    #[tokio::test]
    async fn test_compare_addresses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Address A is"))
            .respond_with(reply("True.\n"))
            .mount(&server)
            .await;
        assert!(client(&server).compare_addresses("5 Main St", "5 Main Street").await);

        let broken = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&broken)
            .await;
        assert!(!client(&broken).compare_addresses("a", "a").await);
    }

    #[tokio::test]
    async fn test_unit_match_ignores_labels_outside_candidates() {
        let candidates = vec![
            UnitCandidate { id: Uuid::new_v4(), label: "279/19".into() },
            UnitCandidate { id: Uuid::new_v4(), label: "Room 5".into() },
        ];

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply("Room 5"))
            .mount(&server)
            .await;
        assert_eq!(
            client(&server).find_best_unit_match("room five", &candidates).await,
            Some(candidates[1].id)
        );

        let hallucinating = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply("Room 6"))
            .mount(&hallucinating)
            .await;
        assert_eq!(
            client(&hallucinating).find_best_unit_match("room six", &candidates).await,
            None
        );
    }

    #[tokio::test]
    async fn test_unit_match_without_candidates_skips_the_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply("none"))
            .expect(0)
            .mount(&server)
            .await;
        assert_eq!(client(&server).find_best_unit_match("Room 1", &[]).await, None);
    }
}
