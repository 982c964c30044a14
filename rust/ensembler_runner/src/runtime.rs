//! The loaded ensembler and the state shared by both transports.

use std::sync::{Arc, OnceLock};

use ensembler_plugin_common::{EnsembleInput, Ensembler, Headers, Value};
use serde_json::Value as JsonValue;
use tracing::{debug, error};

use crate::error::{RequestError, RunnerError};
use crate::lifecycle::{Lifecycle, Phase};
use crate::loader::EnsemblerLoader;
use crate::normalize::normalize;
use crate::pool::WorkerPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub workers: usize,
    pub queue_depth: usize,
}

#[derive(Debug)]
pub struct EnsemblerRuntime {
    lifecycle: Lifecycle,
    settings: PoolSettings,
    pool: OnceLock<WorkerPool>,
}

impl EnsemblerRuntime {
    pub fn new(settings: PoolSettings) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            settings,
            pool: OnceLock::new(),
        }
    }

    /// Runtime already serving `ensembler`.
    pub fn with_ensembler(
        ensembler: Arc<dyn Ensembler>,
        settings: PoolSettings,
    ) -> Result<Self, RunnerError> {
        let runtime = Self::new(settings);
        runtime.lifecycle.advance(Phase::Loading);
        runtime.install(ensembler)?;
        Ok(runtime)
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn is_ready(&self) -> bool {
        self.lifecycle.is_ready() && self.pool.get().is_some()
    }

    /// Load the ensembler at `uri` and flip the runtime to ready.
    pub async fn load(&self, loader: &dyn EnsemblerLoader, uri: &str) -> Result<(), RunnerError> {
        self.lifecycle.advance(Phase::Loading);
        let ensembler = match loader.load(uri).await {
            Ok(ensembler) => ensembler,
            Err(source) => {
                error!(uri, error = %source, "Failed to load ensembler");
                self.lifecycle.advance(Phase::FailedLoad);
                return Err(RunnerError::Load {
                    uri: uri.to_string(),
                    source,
                });
            }
        };
        self.install(ensembler)
    }

    fn install(&self, ensembler: Arc<dyn Ensembler>) -> Result<(), RunnerError> {
        let pool = match WorkerPool::start(ensembler, self.settings.workers, self.settings.queue_depth) {
            Ok(pool) => pool,
            Err(err) => {
                self.lifecycle.advance(Phase::FailedLoad);
                return Err(RunnerError::Pool(err));
            }
        };
        if self.pool.set(pool).is_err() {
            debug!("Ensembler already installed; keeping the first one");
        }
        self.lifecycle.advance(Phase::Ready);
        Ok(())
    }

    pub async fn ensemble(
        &self,
        input: EnsembleInput,
        headers: Option<Headers>,
    ) -> Result<Value, RequestError> {
        let pool = match self.pool.get() {
            Some(pool) if self.lifecycle.is_ready() => pool,
            _ => return Err(RequestError::NotReady),
        };
        pool.run(input, headers).await
    }

    /// Normalize a JSON payload, run the ensembler and return its JSON result.
    pub async fn ensemble_json(
        &self,
        payload: &JsonValue,
        headers: Option<Headers>,
    ) -> Result<JsonValue, RequestError> {
        if !self.is_ready() {
            return Err(RequestError::NotReady);
        }
        let input = normalize(payload)?;
        let value = self.ensemble(input, headers).await?;
        Ok(value.into())
    }
}

/// Request headers as ensembler headers. Non-UTF-8 values are skipped.
pub fn collect_headers(headers: &axum::http::HeaderMap) -> Headers {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}
