//! Tiered package lookup for a failed command token.
//!
//! ## Tiers
//!
//! ```text
//! command  (case-insensitive equals)    → non-empty: done
//! name     (case-insensitive contains)  → non-empty: done
//! moniker  (case-insensitive contains)  → done regardless
//! ```
//!
//! Live lookups are refused until warm-up has succeeded. The warm-up runs on
//! its own thread and is never awaited by the lookup path.

use crate::cancel::CancelToken;
use crate::config::CnfConfig;
use crate::error::{CnfError, Result};
use crate::pool::SessionPool;
use crate::types::{MatchField, PackageQuery, PackageRecord};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

/// Synthetic suggestion returned when a lookup fails.
pub const FAILURE_SUGGESTION: &str = "Failed to execute WinGet Command Not Found.";

pub fn install_action(package_id: &str) -> String {
    format!("winget install --id {}", package_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupState {
    Pending,
    Ready,
    Failed,
}

#[derive(Debug)]
struct WarmupFlag(AtomicU8);

impl WarmupFlag {
    fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    fn get(&self) -> WarmupState {
        match self.0.load(Ordering::SeqCst) {
            1 => WarmupState::Ready,
            2 => WarmupState::Failed,
            _ => WarmupState::Pending,
        }
    }

    fn set(&self, state: WarmupState) {
        let value = match state {
            WarmupState::Pending => 0,
            WarmupState::Ready => 1,
            WarmupState::Failed => 2,
        };
        self.0.store(value, Ordering::SeqCst);
    }
}

/// Last resolved suggestion list, shared with the predictor.
#[derive(Debug, Default)]
pub struct SuggestionCache {
    entries: RwLock<Vec<String>>,
}

impl SuggestionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, suggestions: Vec<String>) {
        *self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = suggestions;
    }

    pub fn clear(&self) {
        self.replace(Vec::new());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub suggestions: Vec<String>,
    /// The producing tier returned more rows than the display cap.
    pub has_more: bool,
    /// `None` when no tier ran.
    pub matched_field: Option<MatchField>,
    /// Diagnostic for a failed lookup; `suggestions` then holds only
    /// `FAILURE_SUGGESTION`.
    pub error: Option<String>,
}

impl Resolution {
    fn failed(matched_field: MatchField, err: &CnfError) -> Self {
        Self {
            suggestions: vec![FAILURE_SUGGESTION.to_string()],
            has_more: false,
            matched_field: Some(matched_field),
            error: Some(err.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }
}

pub struct Resolver {
    pool: Arc<SessionPool>,
    cache: Arc<SuggestionCache>,
    warmup: Arc<WarmupFlag>,
    max_suggestions: usize,
    source: String,
}

impl Resolver {
    pub fn new(pool: Arc<SessionPool>, config: &CnfConfig) -> Self {
        Self {
            pool,
            cache: Arc::new(SuggestionCache::new()),
            warmup: Arc::new(WarmupFlag::new()),
            max_suggestions: config.max_suggestions,
            source: config.source.clone(),
        }
    }

    pub fn cache(&self) -> Arc<SuggestionCache> {
        Arc::clone(&self.cache)
    }

    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }

    pub fn warmup_state(&self) -> WarmupState {
        self.warmup.get()
    }

    /// Runs the count-limited priming query on the calling thread.
    pub fn warm_up(&self, cancel: &CancelToken) -> Result<()> {
        let outcome = run_warmup(&self.pool, &self.source, cancel);
        self.warmup.set(if outcome.is_ok() {
            WarmupState::Ready
        } else {
            WarmupState::Failed
        });
        outcome
    }

    /// Starts warm-up on a background thread and returns immediately.
    pub fn spawn_warm_up(&self, timeout: Duration) -> thread::JoinHandle<()> {
        let pool = Arc::clone(&self.pool);
        let warmup = Arc::clone(&self.warmup);
        let source = self.source.clone();

        thread::spawn(move || {
            let cancel = CancelToken::with_timeout(timeout);
            match run_warmup(&pool, &source, &cancel) {
                Ok(()) => {
                    warmup.set(WarmupState::Ready);
                    tracing::info!("Package index warm-up complete");
                }
                Err(err) => {
                    warmup.set(WarmupState::Failed);
                    tracing::warn!(error = %err, "Package index warm-up failed; lookups disabled");
                }
            }
        })
    }

    /// Looks up packages for `query` and replaces the cached suggestions.
    /// Never fails; errors become a single synthetic suggestion.
    pub fn resolve(&self, query: &str, cancel: &CancelToken) -> Resolution {
        let resolution = self.resolve_uncached(query.trim(), cancel);
        if resolution.is_failure() {
            self.cache.clear();
        } else {
            self.cache.replace(resolution.suggestions.clone());
        }
        resolution
    }

    fn resolve_uncached(&self, query: &str, cancel: &CancelToken) -> Resolution {
        if self.warmup.get() != WarmupState::Ready {
            // A cold session would pay the full warm-up cost on the
            // interactive path.
            tracing::debug!(state = ?self.warmup.get(), "Skipping lookup before warm-up");
            return Resolution::default();
        }
        if query.is_empty() {
            return Resolution::default();
        }

        let mut session = match self.pool.acquire() {
            Ok(session) => session,
            Err(err) => {
                tracing::debug!(error = %err, "No query session available");
                return Resolution::default();
            }
        };

        for field in MatchField::TIERS {
            if cancel.is_cancelled() {
                return Resolution::default();
            }

            session.clear();
            session.add_query(PackageQuery::tier(field, query, &self.source));
            let records = match session.invoke(cancel) {
                Ok(records) => records,
                Err(CnfError::Cancelled) => {
                    tracing::debug!(query = %query, tier = %field, "Lookup cancelled");
                    return Resolution::default();
                }
                Err(err) => {
                    tracing::warn!(query = %query, tier = %field, error = %err, "Lookup failed");
                    return Resolution::failed(field, &err);
                }
            };

            if !records.is_empty() || field == MatchField::Moniker {
                tracing::debug!(
                    query = %query,
                    tier = %field,
                    count = records.len(),
                    "Lookup finished"
                );
                return self.build_resolution(field, &records);
            }
        }

        Resolution::default()
    }

    /// Rows with an elided id are not offered but still count toward
    /// `has_more`.
    fn build_resolution(&self, field: MatchField, records: &[PackageRecord]) -> Resolution {
        let truncated = records.iter().filter(|record| record.is_truncated()).count();
        if truncated > 0 {
            tracing::debug!(tier = %field, truncated, "Skipping rows with elided ids");
        }
        Resolution {
            suggestions: records
                .iter()
                .filter(|record| !record.is_truncated())
                .map(|record| install_action(&record.id))
                .collect(),
            has_more: records.len() > self.max_suggestions,
            matched_field: Some(field),
            error: None,
        }
    }
}

fn run_warmup(pool: &SessionPool, source: &str, cancel: &CancelToken) -> Result<()> {
    let mut session = pool.acquire()?;
    session.add_query(PackageQuery::warmup(source));
    session.invoke(cancel).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::test_utils::FakeBackend;
    use crate::backend::QueryBackend;
    use crate::pool::FixedSessionFactory;

    fn resolver_with(backend: Arc<FakeBackend>) -> Resolver {
        let shared: Arc<dyn QueryBackend> = backend;
        let pool = Arc::new(SessionPool::new(
            Box::new(FixedSessionFactory::new(shared)),
            1,
        ));
        Resolver::new(pool, &CnfConfig::default())
    }

    fn warmed(backend: Arc<FakeBackend>) -> Resolver {
        let resolver = resolver_with(backend);
        resolver.warm_up(&CancelToken::new()).expect("warm-up");
        resolver
    }

    #[test]
    fn cold_resolver_returns_empty_without_querying() {
        let backend = Arc::new(FakeBackend::new().with_results(MatchField::Command, &["Git.Git"]));
        let resolver = resolver_with(Arc::clone(&backend));

        let resolution = resolver.resolve("git", &CancelToken::new());
        assert!(resolution.is_empty());
        assert!(!resolution.has_more);
        assert!(resolution.matched_field.is_none());
        assert!(backend.called_fields().is_empty());
    }

    #[test]
    fn failed_warmup_disables_lookups() {
        let backend = Arc::new(
            FakeBackend::new()
                .with_results(MatchField::Command, &["Git.Git"])
                .with_failing_warmup(),
        );
        let resolver = resolver_with(Arc::clone(&backend));
        assert!(resolver.warm_up(&CancelToken::new()).is_err());
        assert_eq!(resolver.warmup_state(), WarmupState::Failed);

        let resolution = resolver.resolve("git", &CancelToken::new());
        assert!(resolution.is_empty());
        assert_eq!(backend.called_fields(), vec![None]);
    }

    #[test]
    fn command_tier_short_circuits() {
        let backend = Arc::new(
            FakeBackend::new()
                .with_results(MatchField::Command, &["Git.Git"])
                .with_results(MatchField::Name, &["Other.Pkg"]),
        );
        let resolver = warmed(Arc::clone(&backend));

        let resolution = resolver.resolve("git", &CancelToken::new());
        assert_eq!(resolution.suggestions, vec!["winget install --id Git.Git"]);
        assert_eq!(resolution.matched_field, Some(MatchField::Command));
        assert_eq!(
            backend.called_fields(),
            vec![None, Some(MatchField::Command)]
        );
    }

    #[test]
    fn name_tier_used_when_command_tier_empty() {
        let backend = Arc::new(FakeBackend::new().with_results(MatchField::Name, &["Git.Git"]));
        let resolver = warmed(Arc::clone(&backend));

        let resolution = resolver.resolve("gti", &CancelToken::new());
        assert_eq!(resolution.suggestions, vec!["winget install --id Git.Git"]);
        assert_eq!(resolution.matched_field, Some(MatchField::Name));
        assert!(!resolution.has_more);
        assert_eq!(
            backend.called_fields(),
            vec![None, Some(MatchField::Command), Some(MatchField::Name)]
        );
    }

    #[test]
    fn all_tiers_empty_reports_moniker() {
        let backend = Arc::new(FakeBackend::new());
        let resolver = warmed(Arc::clone(&backend));

        let resolution = resolver.resolve("zzz", &CancelToken::new());
        assert!(resolution.is_empty());
        assert!(!resolution.has_more);
        assert_eq!(resolution.matched_field, Some(MatchField::Moniker));
        assert_eq!(backend.called_fields().len(), 4);
    }

    fn resolve_n_name_hits(count: usize) -> Resolution {
        let ids: Vec<String> = (0..count).map(|i| format!("Pkg.N{}", i)).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let resolver = warmed(Arc::new(
            FakeBackend::new().with_results(MatchField::Name, &refs),
        ));
        resolver.resolve("pkg", &CancelToken::new())
    }

    #[test]
    fn has_more_only_above_cap() {
        let at_cap = resolve_n_name_hits(20);
        assert_eq!(at_cap.suggestions.len(), 20);
        assert!(!at_cap.has_more);

        let above_cap = resolve_n_name_hits(21);
        assert_eq!(above_cap.suggestions.len(), 21);
        assert!(above_cap.has_more);
    }

    #[test]
    fn elided_ids_are_not_suggested_but_count_toward_more() {
        let mut ids: Vec<String> = (0..20).map(|i| format!("Pkg.N{}", i)).collect();
        ids.insert(3, "SomePublisher.Som\u{2026}".to_string());
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let resolver = warmed(Arc::new(
            FakeBackend::new().with_results(MatchField::Name, &refs),
        ));

        let resolution = resolver.resolve("pkg", &CancelToken::new());
        assert_eq!(resolution.suggestions.len(), 20);
        assert!(resolution
            .suggestions
            .iter()
            .all(|s| !s.contains("SomePublisher")));
        assert_eq!(resolution.suggestions[3], "winget install --id Pkg.N3");
        assert!(resolution.has_more);
    }

    #[test]
    fn query_failure_yields_single_synthetic_entry() {
        let backend = Arc::new(
            FakeBackend::new()
                .with_results(MatchField::Moniker, &["Never.Reached"])
                .failing_on(MatchField::Name),
        );
        let resolver = warmed(Arc::clone(&backend));

        let resolution = resolver.resolve("git", &CancelToken::new());
        assert_eq!(resolution.suggestions, vec![FAILURE_SUGGESTION.to_string()]);
        assert!(resolution.is_failure());
        assert!(resolution
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("Data required by the source is missing"));
        assert!(resolver.cache().is_empty());
        assert_eq!(resolver.pool().idle_count(), 1);
    }

    #[test]
    fn cancelled_lookup_returns_empty_and_releases_session() {
        let backend = Arc::new(FakeBackend::new().with_results(MatchField::Command, &["Git.Git"]));
        let resolver = warmed(Arc::clone(&backend));

        let cancel = CancelToken::new();
        cancel.cancel();
        let resolution = resolver.resolve("git", &cancel);
        assert!(resolution.is_empty());
        assert_eq!(resolver.pool().idle_count(), 1);
    }

    #[test]
    fn resolve_replaces_cache() {
        let backend = Arc::new(FakeBackend::new().with_results(MatchField::Command, &["Git.Git"]));
        let resolver = warmed(Arc::clone(&backend));
        resolver.cache().replace(vec!["stale".to_string()]);

        resolver.resolve("git", &CancelToken::new());
        assert_eq!(
            resolver.cache().snapshot(),
            vec!["winget install --id Git.Git".to_string()]
        );

        resolver.resolve("zzz", &CancelToken::new());
        assert!(resolver.cache().is_empty());
    }

    #[test]
    fn background_warmup_sets_ready() {
        let backend = Arc::new(FakeBackend::new());
        let resolver = resolver_with(backend);
        assert_eq!(resolver.warmup_state(), WarmupState::Pending);

        resolver
            .spawn_warm_up(Duration::from_secs(5))
            .join()
            .expect("warm-up thread");
        assert_eq!(resolver.warmup_state(), WarmupState::Ready);
    }
}
