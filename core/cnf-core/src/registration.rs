//! Host registration of the feedback and predictor capabilities.
//!
//! `SubsystemRegistry` stands in for the host's plugin registry: it keys
//! providers by id and fans host events out to whatever is registered.
//! `ModuleInit` is the import/remove lifecycle that decides whether anything
//! gets registered at all.

use crate::cancel::CancelToken;
use crate::config::CnfConfig;
use crate::feedback::FeedbackItem;
use crate::pool::{SessionFactory, SessionPool, WingetSessionFactory};
use crate::provider::{
    CommandNotFoundProvider, CommandPredictor, FeedbackContext, FeedbackProvider,
    PredictorFeedbackKind, PROVIDER_ID,
};
use crate::resolver::Resolver;
use crate::setup;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubsystemKind {
    FeedbackProvider,
    CommandPredictor,
}

#[derive(Default)]
struct Registered {
    feedback: BTreeMap<String, Arc<dyn FeedbackProvider>>,
    predictors: BTreeMap<String, Arc<dyn CommandPredictor>>,
}

#[derive(Default)]
pub struct SubsystemRegistry {
    inner: RwLock<Registered>,
}

impl SubsystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_feedback_provider(&self, provider: Arc<dyn FeedbackProvider>) {
        let id = provider.id().to_string();
        tracing::info!(id = %id, name = provider.name(), "Registered feedback provider");
        self.write().feedback.insert(id, provider);
    }

    pub fn register_predictor(&self, predictor: Arc<dyn CommandPredictor>) {
        let id = predictor.id().to_string();
        tracing::info!(id = %id, name = predictor.name(), "Registered command predictor");
        self.write().predictors.insert(id, predictor);
    }

    /// Returns true when something was registered under `id`.
    pub fn unregister(&self, kind: SubsystemKind, id: &str) -> bool {
        let mut inner = self.write();
        let removed = match kind {
            SubsystemKind::FeedbackProvider => inner.feedback.remove(id).is_some(),
            SubsystemKind::CommandPredictor => inner.predictors.remove(id).is_some(),
        };
        if removed {
            tracing::info!(id = %id, kind = ?kind, "Unregistered subsystem");
        }
        removed
    }

    pub fn is_registered(&self, kind: SubsystemKind, id: &str) -> bool {
        let inner = self.read();
        match kind {
            SubsystemKind::FeedbackProvider => inner.feedback.contains_key(id),
            SubsystemKind::CommandPredictor => inner.predictors.contains_key(id),
        }
    }

    /// Collects feedback from every registered provider.
    pub fn feedback(&self, context: &FeedbackContext, cancel: &CancelToken) -> Vec<FeedbackItem> {
        let providers: Vec<_> = self.read().feedback.values().cloned().collect();
        providers
            .iter()
            .filter_map(|provider| provider.get_feedback(context, cancel))
            .collect()
    }

    /// Collects predictions from every registered predictor, in id order.
    pub fn suggestions(&self, input: &str, cancel: &CancelToken) -> Vec<String> {
        let predictors: Vec<_> = self.read().predictors.values().cloned().collect();
        predictors
            .iter()
            .flat_map(|predictor| predictor.get_suggestion(input, cancel))
            .collect()
    }

    /// Notifies predictors that accept command-line feedback.
    pub fn command_line_accepted(&self, history: &[String]) {
        let predictors: Vec<_> = self.read().predictors.values().cloned().collect();
        for predictor in predictors
            .iter()
            .filter(|p| p.can_accept_feedback(PredictorFeedbackKind::CommandLineAccepted))
        {
            predictor.on_command_line_accepted(history);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Registered> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registered> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Import/remove lifecycle for the command-not-found capabilities.
pub struct ModuleInit {
    config: CnfConfig,
    installed: bool,
}

impl ModuleInit {
    /// Probes for the package manager once.
    pub fn probe(config: CnfConfig) -> Self {
        let installed = setup::is_package_manager_installed(&config);
        Self { config, installed }
    }

    /// Skips the probe; for hosts that already know.
    pub fn with_installed(config: CnfConfig, installed: bool) -> Self {
        Self { config, installed }
    }

    pub fn is_enabled(&self) -> bool {
        self.installed
    }

    pub fn config(&self) -> &CnfConfig {
        &self.config
    }

    pub fn on_import(&self, registry: &SubsystemRegistry) -> Option<Arc<CommandNotFoundProvider>> {
        self.on_import_with(
            registry,
            Box::new(WingetSessionFactory::new(self.config.clone())),
        )
    }

    /// Builds the provider, starts warm-up in the background and registers
    /// both capabilities. Returns without waiting for warm-up.
    pub fn on_import_with(
        &self,
        registry: &SubsystemRegistry,
        factory: Box<dyn SessionFactory>,
    ) -> Option<Arc<CommandNotFoundProvider>> {
        if !self.installed {
            tracing::info!("Package manager not installed; capabilities not registered");
            return None;
        }

        let pool = Arc::new(SessionPool::new(factory, self.config.effective_pool_size()));
        if let Err(err) = pool.prewarm() {
            tracing::debug!(error = %err, "Session pre-warm failed");
        }

        let provider = Arc::new(CommandNotFoundProvider::new(Resolver::new(
            pool,
            &self.config,
        )));
        // Detached: lookups check the warm-up state instead of joining.
        let _ = provider.start_warm_up(self.config.warmup_timeout());

        registry.register_feedback_provider(provider.clone());
        registry.register_predictor(provider.clone());
        Some(provider)
    }

    pub fn on_remove(&self, registry: &SubsystemRegistry) {
        if !self.installed {
            return;
        }
        registry.unregister(SubsystemKind::FeedbackProvider, PROVIDER_ID);
        registry.unregister(SubsystemKind::CommandPredictor, PROVIDER_ID);
    }
}
