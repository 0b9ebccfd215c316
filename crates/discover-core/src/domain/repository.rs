use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A star edge seen from the repository side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stargazer {
    pub user: String,
    pub starred_at: DateTime<Utc>,
}

impl Stargazer {
    pub fn new(user: impl Into<String>, starred_at: DateTime<Utc>) -> Self {
        Self {
            user: user.into(),
            starred_at,
        }
    }
}

/// Resolved repository metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// `owner/repo`
    pub name: String,
    /// Topic labels.
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub stargazers: Vec<Stargazer>,
}

impl Repository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Splits `owner/repo`; `None` when the name is not of that shape.
    pub fn owner_and_name(&self) -> Option<(&str, &str)> {
        split_full_name(&self.name)
    }

    /// Union of labels and languages, in first-seen order.
    pub fn merge_labels(&mut self, other: &Repository) {
        union_into(&mut self.labels, &other.labels);
        union_into(&mut self.languages, &other.languages);
    }
}

/// Splits an `owner/repo` full name.
pub fn split_full_name(full_name: &str) -> Option<(&str, &str)> {
    let (owner, repo) = full_name.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner, repo))
}

fn union_into(target: &mut Vec<String>, extra: &[String]) {
    let mut known: HashSet<String> = target.iter().cloned().collect();
    for value in extra {
        if !value.is_empty() && known.insert(value.clone()) {
            target.push(value.clone());
        }
    }
}
