//! In-memory state owned by the daemon.
//!
//! The daemon plays the host: it holds the subsystem registry the providers
//! are registered into, and every request is dispatched through it. When the
//! package manager is missing nothing is registered and every request gets an
//! empty answer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use winget_cnf_core::{
    CancelToken, CnfConfig, CommandNotFoundProvider, FeedbackContext, FeedbackItem, ModuleInit,
    SessionFactory, SubsystemRegistry, WarmupState,
};

pub struct SharedState {
    registry: SubsystemRegistry,
    init: ModuleInit,
    provider: Option<Arc<CommandNotFoundProvider>>,
    config: CnfConfig,
    started_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub registered: bool,
    pub warmup: &'static str,
    pub idle_sessions: usize,
    pub started_at: String,
}

impl SharedState {
    /// Probes for the package manager and registers the providers.
    pub fn new(config: CnfConfig) -> Self {
        let init = ModuleInit::probe(config.clone());
        let registry = SubsystemRegistry::new();
        let provider = init.on_import(&registry);
        Self::assemble(registry, init, provider, config)
    }

    pub fn with_factory(config: CnfConfig, installed: bool, factory: Box<dyn SessionFactory>) -> Self {
        let init = ModuleInit::with_installed(config.clone(), installed);
        let registry = SubsystemRegistry::new();
        let provider = init.on_import_with(&registry, factory);
        Self::assemble(registry, init, provider, config)
    }

    fn assemble(
        registry: SubsystemRegistry,
        init: ModuleInit,
        provider: Option<Arc<CommandNotFoundProvider>>,
        config: CnfConfig,
    ) -> Self {
        Self {
            registry,
            init,
            provider,
            config,
            started_at: Utc::now(),
        }
    }

    pub fn feedback(&self, target: &str, command_line: Option<&str>) -> Vec<FeedbackItem> {
        let context = FeedbackContext {
            command_line: command_line.unwrap_or(target).to_string(),
            target: Some(target.to_string()),
        };
        let cancel = CancelToken::with_timeout(self.config.query_timeout());
        self.registry.feedback(&context, &cancel)
    }

    pub fn predict(&self, input: &str) -> Vec<String> {
        let cancel = CancelToken::with_timeout(self.config.query_timeout());
        self.registry.suggestions(input, &cancel)
    }

    pub fn command_accepted(&self, history: &[String]) {
        self.registry.command_line_accepted(history);
    }

    pub fn warmup_state(&self) -> Option<WarmupState> {
        self.provider.as_ref().map(|provider| provider.warmup_state())
    }

    pub fn health_snapshot(&self) -> HealthSnapshot {
        let warmup = match self.warmup_state() {
            None => "disabled",
            Some(WarmupState::Pending) => "pending",
            Some(WarmupState::Ready) => "ready",
            Some(WarmupState::Failed) => "failed",
        };
        HealthSnapshot {
            status: "ok",
            registered: self.init.is_enabled(),
            warmup,
            idle_sessions: self
                .provider
                .as_ref()
                .map(|provider| provider.resolver().pool().idle_count())
                .unwrap_or(0),
            started_at: self.started_at.to_rfc3339(),
        }
    }
}

impl Drop for SharedState {
    fn drop(&mut self) {
        self.init.on_remove(&self.registry);
    }
}
