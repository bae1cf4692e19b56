//! Recruit roster listing.

use std::sync::Arc;

use clan_common::Recruit;
use tokio::sync::watch;

use crate::auth::SessionManager;
use crate::error::Result;
use crate::store::DataStore;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosterState {
    pub recruits: Vec<Recruit>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Newest-first list of tracked recruits.
pub struct Roster {
    sessions: Arc<SessionManager>,
    store: Arc<dyn DataStore>,
    state: watch::Sender<RosterState>,
}

impl Roster {
    pub fn new(sessions: Arc<SessionManager>, store: Arc<dyn DataStore>) -> Self {
        let (state, _) = watch::channel(RosterState::default());
        Self {
            sessions,
            store,
            state,
        }
    }

    /// Fetch the roster. A failure empties the list and sets the error.
    pub async fn load(&self) -> Result<()> {
        let Some(session) = self.sessions.session() else {
            tracing::debug!("Skipping roster load without a session");
            return Ok(());
        };

        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });

        match self.store.list_recruits(&session).await {
            Ok(recruits) => {
                tracing::debug!(count = recruits.len(), "Loaded roster");
                self.state.send_replace(RosterState {
                    recruits,
                    is_loading: false,
                    error: None,
                });
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to load roster: {}", e);
                self.state.send_replace(RosterState {
                    recruits: Vec::new(),
                    is_loading: false,
                    error: Some(e.to_string()),
                });
                Err(e)
            }
        }
    }

    pub fn recruits(&self) -> Vec<Recruit> {
        self.state.borrow().recruits.clone()
    }

    pub fn snapshot(&self) -> RosterState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<RosterState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::error::Error;
    use crate::test_util::{test_recruit, test_session, FakeDataStore, FakeIdentityProvider, RecordingNotifier};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    async fn roster(signed_in: bool) -> (Arc<FakeDataStore>, Roster) {
        let provider = Arc::new(FakeIdentityProvider::new());
        if signed_in {
            provider.set_current_session(Some(test_session(Uuid::new_v4(), None)));
        }
        let sessions = Arc::new(SessionManager::new(
            provider,
            Arc::new(RecordingNotifier::default()),
            &AuthConfig::default(),
        ));
        sessions.start().await;

        let data = Arc::new(FakeDataStore::new());
        let roster = Roster::new(sessions, data.clone());
        (data, roster)
    }

    #[tokio::test]
    async fn test_newest_first() {
        let (data, roster) = roster(true).await;
        let now = Utc::now();
        data.insert_recruit(test_recruit("Older", now - Duration::days(2)));
        data.insert_recruit(test_recruit("Newer", now));

        roster.load().await.unwrap();

        let names: Vec<String> = roster.recruits().into_iter().map(|r| r.rs_name).collect();
        assert_eq!(names, vec!["Newer", "Older"]);
        assert!(!roster.snapshot().is_loading);
    }

    #[tokio::test]
    async fn test_error_empties_list() {
        let (data, roster) = roster(true).await;
        data.insert_recruit(test_recruit("Zezima", Utc::now()));
        roster.load().await.unwrap();

        data.fail_recruits(Error::Query("relation does not exist".to_string()));
        assert!(roster.load().await.is_err());

        let state = roster.snapshot();
        assert!(state.recruits.is_empty());
        assert_eq!(state.error.as_deref(), Some("Query failed: relation does not exist"));
    }

    #[tokio::test]
    async fn test_requires_session() {
        let (data, roster) = roster(false).await;
        data.insert_recruit(test_recruit("Zezima", Utc::now()));

        roster.load().await.unwrap();

        assert!(roster.recruits().is_empty());
    }
}
