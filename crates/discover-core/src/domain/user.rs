//! Users as seen by the graph: follow edges and star edges.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A star edge from a user to a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarredRepository {
    /// `owner/repo`
    pub repository: String,
    pub starred_at: DateTime<Utc>,
}

impl StarredRepository {
    pub fn new(repository: impl Into<String>, starred_at: DateTime<Utc>) -> Self {
        Self {
            repository: repository.into(),
            starred_at,
        }
    }
}

/// A (possibly partial) view of a user.
///
/// Crawl stages fill in different fields: onboarding knows the followees,
/// followee expansion knows the stars. Stores merge these views with
/// [`User::merge`] instead of overwriting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub followees: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stars: Vec<StarredRepository>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_followees(mut self, followees: Vec<String>) -> Self {
        self.followees = followees;
        self
    }

    pub fn with_stars(mut self, stars: Vec<StarredRepository>) -> Self {
        self.stars = stars;
        self
    }

    /// Field-wise union with another view of the same user.
    ///
    /// Followees keep their first-seen order and never shrink. Stars are
    /// keyed by repository; a repeated star keeps the latest timestamp.
    pub fn merge(&mut self, other: User) {
        let mut known: HashSet<String> = self.followees.iter().cloned().collect();
        for followee in other.followees {
            if known.insert(followee.clone()) {
                self.followees.push(followee);
            }
        }

        for star in other.stars {
            match self
                .stars
                .iter_mut()
                .find(|existing| existing.repository == star.repository)
            {
                Some(existing) => {
                    if star.starred_at > existing.starred_at {
                        existing.starred_at = star.starred_at;
                    }
                }
                None => self.stars.push(star),
            }
        }
    }

    /// Distinct starred repositories in first-seen order.
    pub fn starred_repositories(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.stars
            .iter()
            .map(|s| s.repository.as_str())
            .filter(|r| seen.insert(*r))
            .collect()
    }

    pub fn has_starred(&self, repository: &str) -> bool {
        self.stars.iter().any(|s| s.repository == repository)
    }

    pub fn follows(&self, name: &str) -> bool {
        self.followees.iter().any(|f| f == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn merge_is_a_union_of_partial_views() {
        let mut user = User::new("alice").with_followees(vec!["bob".into(), "carol".into()]);
        user.merge(User::new("alice").with_stars(vec![StarredRepository::new("x/y", ts(1))]));
        user.merge(User::new("alice").with_followees(vec!["carol".into(), "dave".into()]));

        assert_eq!(user.followees, vec!["bob", "carol", "dave"]);
        assert_eq!(user.stars, vec![StarredRepository::new("x/y", ts(1))]);
    }

    #[test]
    fn merge_never_shrinks() {
        let mut user = User::new("alice")
            .with_followees(vec!["bob".into()])
            .with_stars(vec![StarredRepository::new("x/y", ts(1))]);
        user.merge(User::new("alice"));

        assert_eq!(user.followees.len(), 1);
        assert_eq!(user.stars.len(), 1);
    }

    #[test]
    fn merge_keeps_latest_star_timestamp() {
        let mut user = User::new("alice").with_stars(vec![StarredRepository::new("x/y", ts(5))]);
        user.merge(User::new("alice").with_stars(vec![StarredRepository::new("x/y", ts(2))]));
        assert_eq!(user.stars[0].starred_at, ts(5));

        user.merge(User::new("alice").with_stars(vec![StarredRepository::new("x/y", ts(9))]));
        assert_eq!(user.stars[0].starred_at, ts(9));
        assert_eq!(user.stars.len(), 1);
    }

    #[test]
    fn merging_the_same_view_twice_is_a_no_op() {
        let view = User::new("alice")
            .with_followees(vec!["bob".into()])
            .with_stars(vec![StarredRepository::new("x/y", ts(1))]);
        let mut user = view.clone();
        user.merge(view.clone());
        assert_eq!(user, view);
    }

    #[test]
    fn merging_into_an_empty_view_collapses_repeats() {
        let view = User::new("alice")
            .with_followees(vec!["bob".into(), "bob".into()])
            .with_stars(vec![
                StarredRepository::new("x/y", ts(1)),
                StarredRepository::new("x/y", ts(2)),
            ]);

        let mut once = User::new("alice");
        once.merge(view.clone());
        let mut twice = once.clone();
        twice.merge(view);

        assert_eq!(once.followees, vec!["bob"]);
        assert_eq!(once.stars, vec![StarredRepository::new("x/y", ts(2))]);
        assert_eq!(twice, once);
    }

    #[test]
    fn starred_repositories_are_distinct() {
        let user = User::new("alice").with_stars(vec![
            StarredRepository::new("x/y", ts(1)),
            StarredRepository::new("a/b", ts(2)),
            StarredRepository::new("x/y", ts(3)),
        ]);
        assert_eq!(user.starred_repositories(), vec!["x/y", "a/b"]);
    }
}
