//! Suggestions and their rendering into a notification.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SuggestionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestionKind {
    StarRepository,
    FollowUser,
}

/// One recommendation with its justification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionItem {
    pub kind: SuggestionKind,
    /// Repository full name or user login, depending on `kind`.
    pub value: String,
    pub reason: String,
}

impl SuggestionItem {
    pub fn star_repository(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: SuggestionKind::StarRepository,
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn follow_user(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: SuggestionKind::FollowUser,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// A ranked set of recommendations for one user.
///
/// Immutable once persisted: every extraction creates a new suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: SuggestionId,
    pub user: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<SuggestionItem>,
}

/// Notification payload handed to the mailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSuggestion {
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl Suggestion {
    /// Renders the weekly report.
    pub fn render(&self) -> RenderedSuggestion {
        let subject = format!("Your weekly discover report, {}", self.user);

        let mut html = String::from("<html><head></head><body>");
        html.push_str("<p>This is your weekly report from GitHub.</p><ul>");
        let mut text = String::from("This is your weekly report from GitHub.\n\n");

        for item in &self.items {
            let label = match item.kind {
                SuggestionKind::StarRepository => "Repository",
                SuggestionKind::FollowUser => "User",
            };
            let _ = write!(
                html,
                "<li>{label}: {} because {}</li>",
                escape_html(&item.value),
                escape_html(&item.reason)
            );
            let _ = writeln!(text, "- {label}: {} because {}", item.value, item.reason);
        }
        html.push_str("</ul></body></html>");

        RenderedSuggestion {
            subject,
            html,
            text,
        }
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
