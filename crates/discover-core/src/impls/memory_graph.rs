//! In-memory GraphStore.
//!
//! Star edges live on the user side only. A repository's stargazers are
//! read back from those edges, so `put_repository` and `put_user` feed the
//! same relation and neither can shrink it.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;

use crate::domain::{Repository, Stargazer, StarredRepository, SuggestionItem, User};
use crate::ports::{GraphStore, StoreError, SuggestionPolicy};

#[derive(Default)]
struct Graph {
    users: HashMap<String, User>,
    /// Labels and languages only; stargazers come from `users`.
    repositories: HashMap<String, Repository>,
}

impl Graph {
    /// A first write goes through `merge` too, so repeats inside one view
    /// collapse the same way on every write.
    fn merge_user(&mut self, user: User) {
        self.users
            .entry(user.name.clone())
            .or_insert_with(|| User::new(user.name.as_str()))
            .merge(user);
    }

    fn stargazers_of(&self, repository: &str) -> Vec<Stargazer> {
        let mut stargazers: Vec<Stargazer> = self
            .users
            .values()
            .filter_map(|user| {
                user.stars
                    .iter()
                    .find(|s| s.repository == repository)
                    .map(|s| Stargazer::new(user.name.clone(), s.starred_at))
            })
            .collect();
        stargazers.sort_by(|a, b| a.starred_at.cmp(&b.starred_at).then(a.user.cmp(&b.user)));
        stargazers
    }

    /// followee names of `user` that exist in the graph, deduplicated
    fn followees_of<'a>(&'a self, user: &'a User) -> impl Iterator<Item = &'a User> + 'a {
        let distinct: BTreeSet<&str> = user.followees.iter().map(String::as_str).collect();
        distinct
            .into_iter()
            .filter(move |name| *name != user.name)
            .filter_map(|name| self.users.get(name))
    }
}

#[derive(Default)]
pub struct MemoryGraphStore {
    graph: RwLock<Graph>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.graph.read().await.users.len()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn put_user(&self, user: &User) -> Result<(), StoreError> {
        if user.name.is_empty() {
            return Err(StoreError::Invalid("user without a name".to_string()));
        }
        self.graph.write().await.merge_user(user.clone());
        Ok(())
    }

    async fn put_repository(&self, repository: &Repository) -> Result<(), StoreError> {
        if repository.owner_and_name().is_none() {
            return Err(StoreError::Invalid(format!(
                "repository name {:?} is not owner/repo",
                repository.name
            )));
        }

        let mut graph = self.graph.write().await;
        let labels = Repository {
            stargazers: Vec::new(),
            ..repository.clone()
        };
        match graph.repositories.get_mut(&repository.name) {
            Some(existing) => existing.merge_labels(&labels),
            None => {
                graph.repositories.insert(repository.name.clone(), labels);
            }
        }

        for stargazer in &repository.stargazers {
            graph.merge_user(User::new(stargazer.user.clone()).with_stars(vec![
                StarredRepository::new(repository.name.clone(), stargazer.starred_at),
            ]));
        }
        Ok(())
    }

    async fn get_user(&self, name: &str) -> Result<Option<User>, StoreError> {
        Ok(self.graph.read().await.users.get(name).cloned())
    }

    async fn get_repository(&self, name: &str) -> Result<Option<Repository>, StoreError> {
        let graph = self.graph.read().await;
        Ok(graph.repositories.get(name).map(|repository| Repository {
            stargazers: graph.stargazers_of(name),
            ..repository.clone()
        }))
    }

    async fn get_user_suggestion(
        &self,
        user: &str,
        policy: &SuggestionPolicy,
        now: DateTime<Utc>,
    ) -> Result<Vec<SuggestionItem>, StoreError> {
        let graph = self.graph.read().await;
        let Some(user) = graph.users.get(user) else {
            return Ok(Vec::new());
        };
        let window = TimeDelta::from_std(policy.window)
            .map_err(|e| StoreError::Invalid(format!("suggestion window out of range: {e}")))?;
        let since = now - window;

        // repository -> followees who starred it inside the window
        let mut starred_by: HashMap<&str, BTreeSet<&str>> = HashMap::new();
        // user -> followees who follow them
        let mut followed_by: HashMap<&str, BTreeSet<&str>> = HashMap::new();

        for followee in graph.followees_of(user) {
            for star in followee.stars.iter().filter(|s| s.starred_at > since) {
                if user.has_starred(&star.repository) {
                    continue;
                }
                starred_by
                    .entry(star.repository.as_str())
                    .or_default()
                    .insert(followee.name.as_str());
            }
            for candidate in &followee.followees {
                if *candidate == user.name || user.follows(candidate) {
                    continue;
                }
                followed_by
                    .entry(candidate.as_str())
                    .or_default()
                    .insert(followee.name.as_str());
            }
        }

        let mut items: Vec<SuggestionItem> = rank(starred_by, policy.min_followees, policy.limit)
            .into_iter()
            .map(|(repository, followees)| {
                SuggestionItem::star_repository(
                    repository,
                    format!(
                        "starred by {} of your followees ({})",
                        followees.len(),
                        followees.join(", ")
                    ),
                )
            })
            .collect();

        items.extend(
            rank(
                followed_by,
                policy.min_common_followees,
                policy.follow_limit,
            )
            .into_iter()
            .map(|(login, followees)| {
                SuggestionItem::follow_user(
                    login,
                    format!(
                        "followed by {} of your followees ({})",
                        followees.len(),
                        followees.join(", ")
                    ),
                )
            }),
        );

        Ok(items)
    }
}

/// Count descending, then name ascending.
fn rank<'a>(
    candidates: HashMap<&'a str, BTreeSet<&'a str>>,
    min: usize,
    limit: usize,
) -> Vec<(&'a str, Vec<&'a str>)> {
    let mut ranked: Vec<(&str, Vec<&str>)> = candidates
        .into_iter()
        .filter(|(_, who)| who.len() >= min.max(1))
        .map(|(value, who)| (value, who.into_iter().collect()))
        .collect();
    ranked.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(b.0)));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SuggestionKind;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        now() - TimeDelta::days(days)
    }

    fn star(repository: &str, days: i64) -> StarredRepository {
        StarredRepository::new(repository, days_ago(days))
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn partial_views_merge_into_union() {
        let store = MemoryGraphStore::new();
        store
            .put_user(&User::new("alice").with_followees(names(&["bob", "carol"])))
            .await
            .unwrap();
        store
            .put_user(&User::new("alice").with_stars(vec![star("x/y", 1)]))
            .await
            .unwrap();
        store
            .put_user(&User::new("alice").with_followees(names(&["carol", "dave"])))
            .await
            .unwrap();

        let alice = store.get_user("alice").await.unwrap().unwrap();
        assert_eq!(alice.followees, names(&["bob", "carol", "dave"]));
        assert_eq!(alice.stars, vec![star("x/y", 1)]);
    }

    #[tokio::test]
    async fn reapplying_a_view_is_a_no_op() {
        let store = MemoryGraphStore::new();
        let view = User::new("alice")
            .with_followees(names(&["bob"]))
            .with_stars(vec![star("x/y", 2)]);
        store.put_user(&view).await.unwrap();
        store.put_user(&view).await.unwrap();

        assert_eq!(store.get_user("alice").await.unwrap(), Some(view));
    }

    #[tokio::test]
    async fn reapplying_a_view_with_repeats_is_a_no_op() {
        let store = MemoryGraphStore::new();
        let view = User::new("alice")
            .with_followees(names(&["bob", "bob"]))
            .with_stars(vec![star("x/y", 3), star("x/y", 2)]);

        store.put_user(&view).await.unwrap();
        let once = store.get_user("alice").await.unwrap().unwrap();
        store.put_user(&view).await.unwrap();
        let twice = store.get_user("alice").await.unwrap().unwrap();

        assert_eq!(once, twice);
        assert_eq!(once.followees, names(&["bob"]));
        assert_eq!(once.stars, vec![star("x/y", 2)]);
    }

    #[tokio::test]
    async fn repository_stargazers_become_star_edges() {
        let store = MemoryGraphStore::new();
        let mut repo = Repository::new("x/y");
        repo.labels = names(&["rust"]);
        repo.languages = names(&["Rust"]);
        repo.stargazers = vec![Stargazer::new("bob", days_ago(2))];
        store.put_repository(&repo).await.unwrap();
        store
            .put_user(&User::new("carol").with_stars(vec![star("x/y", 1)]))
            .await
            .unwrap();

        let mut relabel = Repository::new("x/y");
        relabel.labels = names(&["cli"]);
        store.put_repository(&relabel).await.unwrap();

        let stored = store.get_repository("x/y").await.unwrap().unwrap();
        assert_eq!(stored.labels, names(&["rust", "cli"]));
        assert_eq!(stored.languages, names(&["Rust"]));
        assert_eq!(
            stored.stargazers,
            vec![
                Stargazer::new("bob", days_ago(2)),
                Stargazer::new("carol", days_ago(1)),
            ]
        );
        assert!(store.get_user("bob").await.unwrap().unwrap().has_starred("x/y"));
    }

    #[tokio::test]
    async fn malformed_repository_name_is_rejected() {
        let store = MemoryGraphStore::new();
        let err = store.put_repository(&Repository::new("nope")).await;
        assert!(matches!(err, Err(StoreError::Invalid(_))));
    }

    #[tokio::test]
    async fn recent_stars_of_followees_rank_first_and_old_ones_drop_out() {
        let store = MemoryGraphStore::new();
        store
            .put_user(&User::new("alice").with_followees(names(&["bob", "carol", "dave"])))
            .await
            .unwrap();
        for followee in ["bob", "carol", "dave"] {
            store
                .put_user(&User::new(followee).with_stars(vec![star("x/y", 3)]))
                .await
                .unwrap();
        }
        store
            .put_user(&User::new("bob").with_stars(vec![star("a/b", 10)]))
            .await
            .unwrap();

        let items = store
            .get_user_suggestion("alice", &SuggestionPolicy::default(), now())
            .await
            .unwrap();

        let top = &items[0];
        assert_eq!(top.kind, SuggestionKind::StarRepository);
        assert_eq!(top.value, "x/y");
        assert!(top.reason.contains("3 of your followees"), "{}", top.reason);
        assert!(items.iter().all(|item| item.value != "a/b"));
    }

    #[tokio::test]
    async fn ranking_breaks_ties_by_name_and_honours_limit() {
        let store = MemoryGraphStore::new();
        store
            .put_user(&User::new("alice").with_followees(names(&["bob", "carol"])))
            .await
            .unwrap();
        store
            .put_user(&User::new("bob").with_stars(vec![
                star("z/z", 1),
                star("m/m", 1),
                star("a/a", 1),
            ]))
            .await
            .unwrap();
        store
            .put_user(&User::new("carol").with_stars(vec![star("z/z", 2)]))
            .await
            .unwrap();

        let policy = SuggestionPolicy {
            limit: 2,
            ..SuggestionPolicy::default()
        };
        let items = store
            .get_user_suggestion("alice", &policy, now())
            .await
            .unwrap();
        let values: Vec<&str> = items.iter().map(|i| i.value.as_str()).collect();
        assert_eq!(values, vec!["z/z", "a/a"]);
    }

    #[tokio::test]
    async fn already_starred_repositories_are_not_suggested() {
        let store = MemoryGraphStore::new();
        store
            .put_user(
                &User::new("alice")
                    .with_followees(names(&["bob"]))
                    .with_stars(vec![star("x/y", 30)]),
            )
            .await
            .unwrap();
        store
            .put_user(&User::new("bob").with_stars(vec![star("x/y", 1)]))
            .await
            .unwrap();

        let items = store
            .get_user_suggestion("alice", &SuggestionPolicy::default(), now())
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn users_followed_by_several_followees_are_suggested() {
        let store = MemoryGraphStore::new();
        store
            .put_user(&User::new("alice").with_followees(names(&["bob", "carol", "erin"])))
            .await
            .unwrap();
        store
            .put_user(&User::new("bob").with_followees(names(&["dave", "erin", "alice"])))
            .await
            .unwrap();
        store
            .put_user(&User::new("carol").with_followees(names(&["dave", "alice"])))
            .await
            .unwrap();

        let items = store
            .get_user_suggestion("alice", &SuggestionPolicy::default(), now())
            .await
            .unwrap();
        assert_eq!(
            items,
            vec![SuggestionItem::follow_user(
                "dave",
                "followed by 2 of your followees (bob, carol)"
            )]
        );
    }

    #[tokio::test]
    async fn unknown_user_gets_no_suggestion() {
        let store = MemoryGraphStore::new();
        let items = store
            .get_user_suggestion("ghost", &SuggestionPolicy::default(), now())
            .await
            .unwrap();
        assert!(items.is_empty());
    }
}
