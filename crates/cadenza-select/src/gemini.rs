//! Google Gemini REST client: text generation and query embeddings.
//!
//! Only the request/response fields cadenza uses are modelled. Failures are
//! reported as [`CallFailure`]s and left to the caller to classify.

use std::time::Duration;

use async_trait::async_trait;
use backon::Retryable;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CallFailure, EmbedError};
use crate::invoke::BackoffPolicy;
use crate::provider::{Embedder, GenerationRequest, GenerativeModel};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-004";

pub const DEFAULT_EMBED_DIMENSION: usize = 768;

// ---------------------------------------------------------------------------
// Wire types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A model listed by the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Resource name, e.g. `models/gemini-2.0-flash`.
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    /// The identifier without the `models/` prefix.
    pub fn id(&self) -> &str {
        self.name.strip_prefix("models/").unwrap_or(&self.name)
    }

    pub fn supports(&self, method: &str) -> bool {
        self.supported_generation_methods.iter().any(|m| m == method)
    }
}

/// Gemini API client.
///
/// One client serves every generation model; the model is chosen per call.
/// Query embeddings use a single configured model and are retried on
/// transient failures.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    embed_model: String,
    embed_backoff: BackoffPolicy,
}

impl GeminiClient {
    /// Create a new Gemini API client.
    pub fn new(api_key: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent("cadenza/0.1.0 (https://github.com/oxur/cadenza)")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: GEMINI_API_BASE.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            embed_backoff: BackoffPolicy::default(),
        })
    }

    /// Point the client at another endpoint (a proxy or a test server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }

    #[must_use]
    pub fn with_embed_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.embed_backoff = policy;
        self
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<String, CallFailure> {
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| CallFailure::Transport(e.to_string()))?;
        read_body(response).await
    }

    /// List the models available to this API key.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, CallFailure> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| CallFailure::Transport(e.to_string()))?;
        let body = read_body(response).await?;
        let parsed: ListModelsResponse = serde_json::from_str(&body).map_err(|e| {
            CallFailure::Transport(format!("failed to parse model list: {e}"))
        })?;
        Ok(parsed.models)
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let url = format!("{}/models/{}:embedContent", self.base_url, self.embed_model);
        let request = EmbedContentRequest {
            model: format!("models/{}", self.embed_model),
            content: Content {
                role: None,
                parts: vec![Part { text }],
            },
        };
        let body = self.post(&url, &request).await?;
        let parsed: EmbedContentResponse =
            serde_json::from_str(&body).map_err(|e| EmbedError::Parse(e.to_string()))?;
        Ok(parsed.embedding.values)
    }
}

/// Turn a response into its body, or a [`CallFailure`] for non-2xx
/// statuses. Gemini error bodies carry the message under `error.message`.
async fn read_body(response: reqwest::Response) -> Result<String, CallFailure> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| CallFailure::Transport(e.to_string()))?;

    if status.is_success() {
        return Ok(body);
    }
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    Err(CallFailure::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<String, CallFailure> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let schema = request.options.response_schema.as_ref();
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            system_instruction: request.system.as_deref().map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
            generation_config: GenerationConfig {
                temperature: request.options.temperature,
                max_output_tokens: request.options.max_output_tokens,
                response_mime_type: schema.map(|_| "application/json"),
                response_schema: schema,
            },
        };

        log::debug!("Gemini generateContent: model={}", model);
        let raw = self.post(&url, &body).await?;

        let parsed: GenerateContentResponse = serde_json::from_str(&raw).map_err(|e| {
            CallFailure::Transport(format!("failed to parse response from {model}: {e}"))
        })?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.is_empty() {
            log::warn!("{} returned no text (the response may have been blocked)", model);
        }
        Ok(text)
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    fn model(&self) -> &str {
        &self.embed_model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        (|| async { self.embed_once(text).await })
            .retry(self.embed_backoff.builder())
            .when(EmbedError::is_transient)
            .notify(|err: &EmbedError, delay: Duration| {
                log::warn!("Embedding request failed ({}), retrying in {:?}", err, delay);
            })
            .await
    }
}
