//! Per-user conversation sessions.
//!
//! Each user id maps to its own async mutex so that one user's events apply in order
//! while other users proceed independently. The map itself is sharded (`DashMap`), so
//! there is no store-wide lock on the hot path.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::submission::{Submission, SubmissionDraft, UserId};
use crate::flows::states::{ConversationState, FlowContext};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub state: ConversationState,
    pub draft: SubmissionDraft,
}

impl Session {
    pub fn flow_context(&self, has_previous_submission: bool, offer_update: bool) -> FlowContext {
        FlowContext {
            missing_required_fields: self.draft.missing_fields(),
            has_previous_submission,
            offer_update,
            prefilled: self.draft.prefilled,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<UserId, Arc<Mutex<Session>>>,
    last_submissions: DashMap<UserId, Submission>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, user_id: &UserId) -> Arc<Mutex<Session>> {
        self.sessions.entry(user_id.clone()).or_default().clone()
    }

    /// Exclusive access to one user's session for a read-transition-write sequence.
    pub async fn lock(&self, user_id: &UserId) -> OwnedMutexGuard<Session> {
        self.slot(user_id).lock_owned().await
    }

    pub async fn get(&self, user_id: &UserId) -> Session {
        let Some(slot) = self.sessions.get(user_id).map(|entry| entry.value().clone()) else {
            return Session::default();
        };
        let session = slot.lock().await;
        session.clone()
    }

    pub async fn set(&self, user_id: &UserId, session: Session) {
        let slot = self.slot(user_id);
        *slot.lock().await = session;
    }

    pub async fn clear(&self, user_id: &UserId) {
        if let Some(slot) = self.sessions.get(user_id).map(|entry| entry.value().clone()) {
            slot.lock().await.reset();
        }
    }

    pub fn remember_submission(&self, submission: Submission) {
        self.last_submissions.insert(submission.user_id.clone(), submission);
    }

    pub fn last_submission(&self, user_id: &UserId) -> Option<Submission> {
        self.last_submissions.get(user_id).map(|entry| entry.value().clone())
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| match entry.value().try_lock() {
                Ok(session) => !session.state.is_idle(),
                // held by an in-flight event, so not idle
                Err(_) => true,
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::{Session, SessionStore};
    use crate::domain::submission::{FormField, SubmissionDraft, UserId};
    use crate::flows::states::ConversationState;

    #[tokio::test]
    async fn unknown_user_starts_idle() {
        let store = SessionStore::new();
        let session = store.get(&UserId::from("U1")).await;

        assert_eq!(session.state, ConversationState::Idle);
        assert!(session.draft.is_empty());
    }

    #[tokio::test]
    async fn set_then_clear_round_trip() {
        let store = SessionStore::new();
        let user = UserId::from("U1");
        let mut draft = SubmissionDraft::default();
        draft.set(FormField::Name, "Jane Doe");

        store.set(&user, Session { state: ConversationState::Reason, draft }).await;
        assert_eq!(store.get(&user).await.state, ConversationState::Reason);
        assert_eq!(store.active_sessions(), 1);

        store.clear(&user).await;
        let cleared = store.get(&user).await;
        assert_eq!(cleared.state, ConversationState::Idle);
        assert!(cleared.draft.is_empty());
        assert_eq!(store.active_sessions(), 0);
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let store = SessionStore::new();
        let alice = UserId::from("UA");
        let bob = UserId::from("UB");

        store.set(&alice, Session { state: ConversationState::Amount, ..Session::default() }).await;
        let _held = store.lock(&alice).await;

        // bob is not blocked by alice's guard
        store.set(&bob, Session { state: ConversationState::Name, ..Session::default() }).await;
        assert_eq!(store.get(&bob).await.state, ConversationState::Name);
    }

    #[tokio::test]
    async fn lock_serializes_updates_for_one_user() {
        let store = Arc::new(SessionStore::new());
        let user = UserId::from("U1");

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let user = user.clone();
            tasks.push(tokio::spawn(async move {
                let mut session = store.lock(&user).await;
                let count = session.draft.get(FormField::Reason).map_or(0, |v| v.len());
                tokio::task::yield_now().await;
                session.draft.set(FormField::Reason, "x".repeat(count + 1));
            }));
        }
        for task in tasks {
            task.await.expect("task");
        }

        let session = store.get(&user).await;
        assert_eq!(session.draft.get(FormField::Reason).map(str::len), Some(16));
    }

    #[tokio::test]
    async fn last_submission_survives_clear() {
        let store = SessionStore::new();
        let user = UserId::from("U1");
        let mut draft = SubmissionDraft::default();
        for field in FormField::ORDERED {
            draft.set(field, "value");
        }
        store.remember_submission(draft.complete(user.clone(), Utc::now()).expect("complete"));

        store.clear(&user).await;

        assert!(store.last_submission(&user).is_some());
        assert!(store.last_submission(&UserId::from("U2")).is_none());
    }
}
