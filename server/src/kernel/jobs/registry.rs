//! Job registry mapping each `JobKind` to its typed async handler.
//!
//! Unlike the source's dynamic string-keyed callback map, handlers here are
//! registered against a closed `JobKind` enum and validate their own typed
//! payload at dispatch time (§9 REDESIGN FLAGS).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::model::JobKind;
use super::processor::{HandlerOutcome, JobDeps};

type BoxedHandler = Box<
    dyn Fn(serde_json::Value, Arc<JobDeps>) -> Pin<Box<dyn Future<Output = Result<HandlerOutcome>> + Send>>
        + Send
        + Sync,
>;

#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<JobKind, BoxedHandler>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers the handler for `kind`. `F` receives the job's raw JSON
    /// payload already matched to `kind`; the handler is responsible for
    /// deserializing its own typed payload struct.
    pub fn register<F, Fut>(&mut self, kind: JobKind, handler: F)
    where
        F: Fn(serde_json::Value, Arc<JobDeps>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HandlerOutcome>> + Send + 'static,
    {
        self.handlers
            .insert(kind, Box::new(move |payload, deps| Box::pin(handler(payload, deps))));
    }

    pub async fn dispatch(
        &self,
        kind: JobKind,
        payload: serde_json::Value,
        deps: Arc<JobDeps>,
    ) -> Result<HandlerOutcome> {
        let handler = self
            .handlers
            .get(&kind)
            .ok_or_else(|| anyhow!("no handler registered for job kind: {}", kind))?;
        handler(payload, deps).await
    }

    pub fn is_registered(&self, kind: JobKind) -> bool {
        self.handlers.contains_key(&kind)
    }
}
