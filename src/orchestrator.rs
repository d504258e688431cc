use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use futures_util::future::join_all;
use tokio::sync::watch;

use crate::image::ImageModel;
use crate::providers::{GoogleImages, OpenAiImages};
use crate::retry::RetryPolicy;
use crate::secrets::{CredentialStore, Credentials};
use crate::state::{BoardSnapshot, RunBoard, RunState};
use crate::types::GenerationIntent;
use crate::{Result, TriptychError};

/// Fans one generation intent out to every applicable model, retries each
/// call independently, and settles them all before reporting the run as
/// finished. One model failing never aborts or delays its siblings.
pub struct Orchestrator {
    models: Vec<Arc<dyn ImageModel>>,
    credentials: Credentials,
    retry: RetryPolicy,
    board: RunBoard,
    busy: AtomicBool,
    store: Option<Arc<dyn CredentialStore>>,
    persist_credentials: bool,
}

impl Orchestrator {
    /// Wire the three default adapters from `credentials`.
    pub fn new(credentials: Credentials) -> Self {
        let openai = credentials.openai.clone().unwrap_or_default();
        let gemini = credentials.gemini.clone().unwrap_or_default();
        let models: Vec<Arc<dyn ImageModel>> = vec![
            Arc::new(OpenAiImages::dalle2(openai.clone())),
            Arc::new(OpenAiImages::dalle3(openai)),
            Arc::new(GoogleImages::new(gemini)),
        ];
        Self::with_models(models, credentials)
    }

    /// Use custom adapters (alternate endpoints, tests).
    pub fn with_models(models: Vec<Arc<dyn ImageModel>>, credentials: Credentials) -> Self {
        let ids: Vec<_> = models.iter().map(|model| model.id()).collect();
        Self {
            models,
            credentials,
            retry: RetryPolicy::default(),
            board: RunBoard::new(&ids),
            busy: AtomicBool::new(false),
            store: None,
            persist_credentials: false,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Attach a credential store; `persist` mirrors the user's opt-in.
    pub fn with_credential_store(mut self, store: Arc<dyn CredentialStore>, persist: bool) -> Self {
        self.store = Some(store);
        self.persist_credentials = persist;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardSnapshot> {
        self.board.subscribe()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.board.snapshot()
    }

    /// Run `intent` against every model that supports its mode and wait for
    /// all of them to settle. Individual model failures surface only as
    /// that model's `Failed` state; the call itself fails only on
    /// precondition violations, before any state is touched.
    pub async fn generate_images(&self, intent: &GenerationIntent) -> Result<()> {
        if !self.credentials.is_complete() {
            return Err(TriptychError::Validation(
                "both provider api keys are required".to_string(),
            ));
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TriptychError::Validation(
                "generation is already running".to_string(),
            ));
        }

        if self.persist_credentials {
            if let Some(store) = self.store.clone() {
                let credentials = self.credentials.clone();
                // Fire-and-forget: a failing store must not block generation.
                tokio::spawn(async move {
                    if let Err(err) = store.save(&credentials).await {
                        tracing::warn!(error = %err, "failed to persist credentials");
                    }
                });
            }
        }

        self.board.reset();
        self.board.set_generating(true);

        let mode = intent.mode();
        let tasks = self
            .models
            .iter()
            .filter(|model| model.supports(mode))
            .map(|model| self.run_model(model.as_ref(), intent));
        join_all(tasks).await;

        self.board.set_generating(false);
        self.busy.store(false, Ordering::Release);
        Ok(())
    }

    async fn run_model(&self, model: &dyn ImageModel, intent: &GenerationIntent) {
        let id = model.id();
        self.board.set_run(id, RunState::Generating);
        let start = Instant::now();

        let outcome = self
            .retry
            .execute(
                || model.generate(intent),
                |attempt, max_attempts| {
                    self.board.set_run(
                        id,
                        RunState::Retrying {
                            attempt,
                            max_attempts,
                        },
                    );
                },
            )
            .await;

        match outcome {
            Ok(image) => {
                let elapsed_seconds = start.elapsed().as_secs_f64().round() as u64;
                tracing::debug!(model = %id, elapsed_seconds, "generation completed");
                self.board.set_run(
                    id,
                    RunState::Completed {
                        image,
                        elapsed_seconds,
                    },
                );
            }
            Err(err) => {
                tracing::error!(model = %id, error = %err, "generation failed");
                self.board.set_run(
                    id,
                    RunState::Failed {
                        error: err.to_string(),
                    },
                );
            }
        }
    }
}
