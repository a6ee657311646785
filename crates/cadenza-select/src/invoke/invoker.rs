//! Fallback-and-retry driver over an ordered list of models.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{CallFailure, InvokeError};
use crate::invoke::backoff::BackoffPolicy;
use crate::invoke::classify::FailureClass;
use crate::provider::{GenerationRequest, GenerativeModel};

pub const DEFAULT_PRIMARY_MODEL: &str = "gemini-2.5-flash";

pub const DEFAULT_FALLBACK_MODELS: &[&str] =
    &["gemini-2.0-flash", "gemini-2.0-flash-lite", "gemini-1.5-flash"];

/// Extra passes over the overloaded models after the first pass.
pub const DEFAULT_RETRY_SWEEPS: usize = 2;

/// Outcome of one call against one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failed(FailureClass),
}

/// One call made during an invocation, with the raw response or error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAttempt {
    pub model: String,
    pub outcome: AttemptOutcome,
    pub detail: String,
}

/// A successful invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// The model that answered.
    pub model: String,
    pub text: String,
    /// Every call made, in order, including the successful one.
    pub attempts: Vec<ModelAttempt>,
}

impl Invocation {
    /// Calls made beyond the first one against each model.
    pub fn retries(&self) -> usize {
        let mut seen: Vec<&str> = Vec::new();
        let mut retries = 0;
        for attempt in &self.attempts {
            if seen.contains(&attempt.model.as_str()) {
                retries += 1;
            } else {
                seen.push(attempt.model.as_str());
            }
        }
        retries
    }
}

/// How the run of one model ended.
enum ModelRun {
    Success(String),
    Quota,
    Unavailable,
    /// Retries spent on transient failures; eligible for a sweep.
    Overloaded,
    Fatal { status: u16, message: String },
}

/// Drives a [`GenerativeModel`] through a primary model and its fallbacks.
///
/// The only state kept between calls is the last model that succeeded,
/// which is tried first on the next call. Concurrent callers may race on
/// it; the worst case is trying a less suitable model first.
#[derive(Debug)]
pub struct ModelInvoker {
    client: Arc<dyn GenerativeModel>,
    primary: String,
    fallbacks: Vec<String>,
    policy: BackoffPolicy,
    sweeps: usize,
    last_successful: Mutex<Option<String>>,
}

impl ModelInvoker {
    pub fn new(
        client: Arc<dyn GenerativeModel>,
        primary: impl Into<String>,
        fallbacks: Vec<String>,
    ) -> Self {
        Self {
            client,
            primary: primary.into(),
            fallbacks,
            policy: BackoffPolicy::default(),
            sweeps: DEFAULT_RETRY_SWEEPS,
            last_successful: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_sweeps(mut self, sweeps: usize) -> Self {
        self.sweeps = sweeps;
        self
    }

    pub fn last_successful_model(&self) -> Option<String> {
        self.last_successful
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn remember(&self, model: &str) {
        *self
            .last_successful
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(model.to_string());
    }

    /// Models in the order the next call will try them: the last successful
    /// model, the primary, then the fallbacks, without duplicates.
    pub fn attempt_order(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::with_capacity(self.fallbacks.len() + 2);
        let candidates = self
            .last_successful_model()
            .into_iter()
            .chain(std::iter::once(self.primary.clone()))
            .chain(self.fallbacks.iter().cloned());
        for model in candidates {
            if !model.is_empty() && !order.contains(&model) {
                order.push(model);
            }
        }
        order
    }

    /// Run `request`, falling back and retrying as the failures dictate.
    ///
    /// # Errors
    /// - [`InvokeError::Fatal`] on the first failure classified as `Other`.
    /// - [`InvokeError::QuotaExhausted`] when every model is out of quota.
    /// - [`InvokeError::Exhausted`] when transient failures outlast every
    ///   retry and sweep.
    pub async fn invoke(&self, request: &GenerationRequest) -> Result<Invocation, InvokeError> {
        let order = self.attempt_order();
        if order.is_empty() {
            return Err(InvokeError::NoModels);
        }

        let mut attempts = Vec::new();
        let mut quota = Vec::new();
        let mut overloaded = Vec::new();

        for model in &order {
            if *model != self.primary {
                log::warn!("Trying model {} instead of {}", model, self.primary);
            }
            match self.run_model(model, request, &mut attempts).await {
                ModelRun::Success(text) => return Ok(self.succeed(model, text, attempts)),
                ModelRun::Quota => quota.push(model.clone()),
                ModelRun::Unavailable => {}
                ModelRun::Overloaded => overloaded.push(model.clone()),
                ModelRun::Fatal { status, message } => {
                    return Err(InvokeError::Fatal {
                        model: model.clone(),
                        status,
                        message,
                    })
                }
            }
        }

        if quota.len() == order.len() {
            return Err(InvokeError::QuotaExhausted { models: quota });
        }

        for sweep in 1..=self.sweeps {
            if overloaded.is_empty() {
                break;
            }
            log::info!(
                "Retry sweep {}/{} over {} overloaded model(s)",
                sweep,
                self.sweeps,
                overloaded.len()
            );
            let mut still_overloaded = Vec::new();
            for model in overloaded {
                match self.run_model(&model, request, &mut attempts).await {
                    ModelRun::Success(text) => return Ok(self.succeed(&model, text, attempts)),
                    ModelRun::Overloaded => still_overloaded.push(model),
                    ModelRun::Quota | ModelRun::Unavailable => {}
                    ModelRun::Fatal { status, message } => {
                        return Err(InvokeError::Fatal {
                            model,
                            status,
                            message,
                        })
                    }
                }
            }
            overloaded = still_overloaded;
        }

        let last = attempts
            .last()
            .map(|a| format!("{}: {}", a.model, a.detail))
            .unwrap_or_default();
        Err(InvokeError::Exhausted {
            models: order,
            last,
        })
    }

    fn succeed(&self, model: &str, text: String, attempts: Vec<ModelAttempt>) -> Invocation {
        self.remember(model);
        log::debug!("{} answered after {} call(s)", model, attempts.len());
        Invocation {
            model: model.to_string(),
            text,
            attempts,
        }
    }

    /// Call one model until it succeeds, fails for good, or its retries run
    /// out.
    async fn run_model(
        &self,
        model: &str,
        request: &GenerationRequest,
        attempts: &mut Vec<ModelAttempt>,
    ) -> ModelRun {
        let mut delays = self.policy.delays();
        loop {
            let failure = match self.client.generate(model, request).await {
                Ok(text) => {
                    attempts.push(ModelAttempt {
                        model: model.to_string(),
                        outcome: AttemptOutcome::Success,
                        detail: text.clone(),
                    });
                    return ModelRun::Success(text);
                }
                Err(failure) => failure,
            };

            let class = failure.class();
            attempts.push(ModelAttempt {
                model: model.to_string(),
                outcome: AttemptOutcome::Failed(class),
                detail: failure.to_string(),
            });

            match class {
                FailureClass::QuotaExceeded => {
                    log::warn!("{} is out of quota: {}", model, failure);
                    return ModelRun::Quota;
                }
                FailureClass::ModelUnavailable => {
                    log::warn!("{} is unavailable, skipping: {}", model, failure);
                    return ModelRun::Unavailable;
                }
                FailureClass::Other => {
                    let (status, message) = match failure {
                        CallFailure::Status { status, message } => (status, message),
                        CallFailure::Transport(message) => (0, message),
                    };
                    return ModelRun::Fatal { status, message };
                }
                FailureClass::Overloaded | FailureClass::Transport => match delays.next() {
                    Some(delay) => {
                        log::warn!("{} failed ({}), retrying in {:?}", model, failure, delay);
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        log::warn!("{} is still failing after retries: {}", model, failure);
                        return ModelRun::Overloaded;
                    }
                },
            }
        }
    }
}
