//! Collaborator contracts for the generation and embedding providers.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{CallFailure, EmbedError};

/// Generation options passed through to the provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    /// JSON schema the response should follow. Providers may ignore it.
    pub response_schema: Option<Value>,
}

/// One generation request. The model identifier is supplied per call so
/// the same request can be replayed against fallback models.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub options: GenerationOptions,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            options: GenerationOptions::default(),
        }
    }

    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.options.max_output_tokens = Some(max_output_tokens);
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.options.response_schema = Some(schema);
        self
    }
}

/// A remote generative model addressed by model identifier.
#[async_trait]
pub trait GenerativeModel: Send + Sync + fmt::Debug {
    /// Run one request against one model. Any 2xx response is `Ok`.
    async fn generate(&self, model: &str, request: &GenerationRequest)
        -> Result<String, CallFailure>;
}

/// Produces query embeddings comparable to the ones stored in the index.
#[async_trait]
pub trait Embedder: Send + Sync + fmt::Debug {
    /// Identifier of the embedding model, as recorded in index headers.
    fn model(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}
