//! Feedback items shown after a command fails.

use crate::resolver::Resolution;
use crate::types::MatchField;
use serde::{Deserialize, Serialize};

pub const FEEDBACK_HEADER: &str = "Try installing this package using WinGet:";

/// Layout hint for hosts that render feedback natively. Suggestions are
/// always laid out one per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackDisplayLayout {
    #[default]
    Portrait,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub header: String,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(default)]
    pub layout: FeedbackDisplayLayout,
}

impl FeedbackItem {
    /// Plain-text rendering for hosts without a native feedback UI.
    pub fn render(&self) -> String {
        let mut lines = vec![self.header.clone()];
        lines.extend(self.actions.iter().map(|action| format!("  {}", action)));
        if let Some(footer) = &self.footer {
            lines.push(footer.clone());
        }
        lines.join("\n")
    }
}

pub fn more_results_footer(field: MatchField, target: &str) -> String {
    format!(
        "Additional results can be found using \"winget search --{} {}\"",
        field, target
    )
}

/// Builds the item for `target`; `None` when there is nothing to show.
pub fn build_feedback(target: &str, resolution: &Resolution) -> Option<FeedbackItem> {
    if let Some(error) = &resolution.error {
        return Some(FeedbackItem {
            header: format!("{}\n{}", crate::resolver::FAILURE_SUGGESTION, error),
            actions: Vec::new(),
            footer: None,
            layout: FeedbackDisplayLayout::Portrait,
        });
    }

    if resolution.suggestions.is_empty() {
        return None;
    }

    let footer = match (resolution.has_more, resolution.matched_field) {
        (true, Some(field)) => Some(more_results_footer(field, target)),
        _ => None,
    };

    Some(FeedbackItem {
        header: FEEDBACK_HEADER.to_string(),
        actions: resolution.suggestions.clone(),
        footer,
        layout: FeedbackDisplayLayout::Portrait,
    })
}
