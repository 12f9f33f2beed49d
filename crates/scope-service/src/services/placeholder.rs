//! Placeholder (synthetic/test) account detection.
//!
//! Placeholder status is a stored flag on the actor record. The denylist is
//! only used by the backfill, which flags existing accounts whose name or
//! email contains a denylisted term.

use crate::errors::ScopeError;
use crate::models::Actor;
use crate::observability::metrics::record_placeholder_backfill;
use crate::repositories::ActorDirectory;
use common::types::ActorId;
use tracing::{info, instrument};

/// Case-insensitive substring denylist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderDenylist {
    terms: Vec<String>,
}

impl PlaceholderDenylist {
    pub fn new(terms: impl IntoIterator<Item = String>) -> Self {
        Self {
            terms: terms
                .into_iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn matches(&self, actor: &Actor) -> bool {
        let name = actor.display_name.to_lowercase();
        let email = actor.email.to_lowercase();
        self.terms
            .iter()
            .any(|term| name.contains(term.as_str()) || email.contains(term.as_str()))
    }
}

/// Flag every unflagged actor that matches `denylist`.
///
/// Already-flagged actors are left alone and never unflagged. With
/// `dry_run` the matches are returned without writing.
#[instrument(skip_all, fields(dry_run = dry_run))]
pub async fn backfill_placeholder_flags(
    directory: &dyn ActorDirectory,
    denylist: &PlaceholderDenylist,
    dry_run: bool,
) -> Result<Vec<ActorId>, ScopeError> {
    let mut flagged: Vec<ActorId> = directory
        .list()
        .await?
        .iter()
        .filter(|a| !a.is_placeholder && denylist.matches(a))
        .map(|a| a.id)
        .collect();
    flagged.sort();

    if !dry_run {
        for id in &flagged {
            directory.set_placeholder(*id, true).await?;
        }
    }

    record_placeholder_backfill(dry_run, flagged.len());
    info!(
        target: "scope.services.placeholder",
        matched = flagged.len(),
        dry_run,
        "Placeholder backfill complete"
    );
    Ok(flagged)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{ActorStatus, Role};
    use crate::repositories::InMemoryStore;

    fn actor(name: &str, email: &str) -> Actor {
        Actor {
            id: ActorId::new(),
            display_name: name.to_string(),
            email: email.to_string(),
            role: Role::Manager,
            status: ActorStatus::Active,
            is_placeholder: false,
        }
    }

    fn denylist() -> PlaceholderDenylist {
        PlaceholderDenylist::new(["Test".to_string(), " demo ".to_string(), String::new()])
    }

    #[test]
    fn test_matches_name_or_email_case_insensitive() {
        let list = denylist();
        assert!(list.matches(&actor("QA TESTER", "qa@example.com")));
        assert!(list.matches(&actor("Alice", "alice+demo@example.com")));
        assert!(!list.matches(&actor("Alice", "alice@example.com")));
    }

    #[test]
    fn test_empty_denylist_matches_nothing() {
        let list = PlaceholderDenylist::new(Vec::new());
        assert!(list.is_empty());
        assert!(!list.matches(&actor("test", "test@example.com")));
    }

    #[tokio::test]
    async fn test_backfill_flags_matches() {
        let real = actor("Alice", "alice@example.com");
        let fake = actor("Demo Account", "sales@example.com");
        let store = InMemoryStore::from_parts([real.clone(), fake.clone()], [], []);

        let flagged = backfill_placeholder_flags(&store, &denylist(), false)
            .await
            .unwrap();
        assert_eq!(flagged, vec![fake.id]);
        assert!(store.get(fake.id).await.unwrap().unwrap().is_placeholder);
        assert!(!store.get(real.id).await.unwrap().unwrap().is_placeholder);

        // Second run finds nothing new.
        let again = backfill_placeholder_flags(&store, &denylist(), false)
            .await
            .unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_backfill_dry_run_does_not_write() {
        let fake = actor("test user", "t@example.com");
        let store = InMemoryStore::from_parts([fake.clone()], [], []);

        let flagged = backfill_placeholder_flags(&store, &denylist(), true)
            .await
            .unwrap();
        assert_eq!(flagged, vec![fake.id]);
        assert!(!store.get(fake.id).await.unwrap().unwrap().is_placeholder);
    }
}
