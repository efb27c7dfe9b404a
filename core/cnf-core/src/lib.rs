//! # winget-cnf-core
//!
//! Core library for winget-cnf: suggests installable WinGet packages for
//! commands the shell could not find, and predicts those suggestions while
//! the user types.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. The only background work is
//!   a detached warm-up thread.
//! - **Fail-soft**: Public entry points return empty or synthetic results,
//!   never errors, because they run on the host's interactive error path.
//! - **Bounded**: One pooled query session is enough for serialized
//!   interactive use; the pool size is configurable.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use winget_cnf_core::{CancelToken, FeedbackContext, FeedbackProvider, ModuleInit, SubsystemRegistry};
//!
//! let registry = SubsystemRegistry::new();
//! let init = ModuleInit::probe(winget_cnf_core::load_config());
//! if let Some(provider) = init.on_import(&registry) {
//!     let item = provider.get_feedback(&FeedbackContext::for_target("gti"), &CancelToken::new());
//! }
//! ```

pub mod backend;
pub mod cancel;
pub mod config;
pub mod error;
pub mod feedback;
pub mod pool;
pub mod predictor;
pub mod provider;
pub mod registration;
pub mod resolver;
pub mod setup;
pub mod types;

pub use backend::{QueryBackend, WingetCli};
pub use cancel::CancelToken;
pub use config::{load_config, CnfConfig};
pub use error::{CnfError, Result};
pub use feedback::{build_feedback, FeedbackDisplayLayout, FeedbackItem};
pub use pool::{
    FixedSessionFactory, PooledSession, Session, SessionFactory, SessionPool, SessionState,
    WingetSessionFactory,
};
pub use predictor::Predictor;
pub use provider::{
    CommandNotFoundProvider, CommandPredictor, FeedbackContext, FeedbackProvider,
    PredictorFeedbackKind, Subsystem, PROVIDER_ID,
};
pub use registration::{ModuleInit, SubsystemKind, SubsystemRegistry};
pub use resolver::{Resolution, Resolver, SuggestionCache, WarmupState, FAILURE_SUGGESTION};
pub use types::{MatchField, MatchMode, PackageQuery, PackageRecord};
