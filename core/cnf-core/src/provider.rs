//! Capability adapter over the resolver and predictor.
//!
//! Hosts talk to `FeedbackProvider` and `CommandPredictor`; one
//! `CommandNotFoundProvider` implements both and forwards to plain methods.

use crate::cancel::CancelToken;
use crate::feedback::{build_feedback, FeedbackItem};
use crate::predictor::Predictor;
use crate::resolver::{Resolver, WarmupState};
use std::thread;
use std::time::Duration;

pub const PROVIDER_ID: &str = "09cd038b-a75f-4d91-8f71-f29e1ab480dc";
pub const PROVIDER_NAME: &str = "Windows Package Manager - WinGet";
pub const PROVIDER_DESCRIPTION: &str = "Finds missing commands that can be installed via WinGet.";

/// What the host knows about a failed command.
#[derive(Debug, Clone, Default)]
pub struct FeedbackContext {
    pub command_line: String,
    /// Offending token from the host's error record, when it has one.
    pub target: Option<String>,
}

impl FeedbackContext {
    pub fn for_target(target: impl Into<String>) -> Self {
        let target = target.into();
        Self {
            command_line: target.clone(),
            target: Some(target),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorFeedbackKind {
    SuggestionDisplayed,
    SuggestionAccepted,
    CommandLineAccepted,
    CommandLineExecuted,
}

/// Identity shared by every registered capability.
pub trait Subsystem: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn description(&self) -> &str;
}

pub trait FeedbackProvider: Subsystem {
    /// Returns None when there is nothing to show (not an error).
    fn get_feedback(&self, context: &FeedbackContext, cancel: &CancelToken)
        -> Option<FeedbackItem>;
}

pub trait CommandPredictor: Subsystem {
    fn get_suggestion(&self, input: &str, cancel: &CancelToken) -> Vec<String>;

    fn can_accept_feedback(&self, _kind: PredictorFeedbackKind) -> bool {
        false
    }

    fn on_command_line_accepted(&self, _history: &[String]) {}
}

pub struct CommandNotFoundProvider {
    resolver: Resolver,
    predictor: Predictor,
}

impl CommandNotFoundProvider {
    pub fn new(resolver: Resolver) -> Self {
        let predictor = Predictor::new(resolver.cache());
        Self {
            resolver,
            predictor,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn warmup_state(&self) -> WarmupState {
        self.resolver.warmup_state()
    }

    pub fn start_warm_up(&self, timeout: Duration) -> thread::JoinHandle<()> {
        self.resolver.spawn_warm_up(timeout)
    }
}

impl Subsystem for CommandNotFoundProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn description(&self) -> &str {
        PROVIDER_DESCRIPTION
    }
}

impl FeedbackProvider for CommandNotFoundProvider {
    fn get_feedback(
        &self,
        context: &FeedbackContext,
        cancel: &CancelToken,
    ) -> Option<FeedbackItem> {
        let target = context
            .target
            .as_deref()
            .map(str::trim)
            .filter(|target| !target.is_empty())?;

        let resolution = self.resolver.resolve(target, cancel);
        build_feedback(target, &resolution)
    }
}

impl CommandPredictor for CommandNotFoundProvider {
    fn get_suggestion(&self, input: &str, cancel: &CancelToken) -> Vec<String> {
        if cancel.is_cancelled() {
            return Vec::new();
        }
        self.predictor.predict(input)
    }

    fn can_accept_feedback(&self, kind: PredictorFeedbackKind) -> bool {
        kind == PredictorFeedbackKind::CommandLineAccepted
    }

    fn on_command_line_accepted(&self, _history: &[String]) {
        self.predictor.on_accepted();
    }
}
