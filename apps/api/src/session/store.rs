use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::workflow::Workflow;

struct Entry {
    workflow: Arc<Workflow>,
    last_seen: Instant,
}

/// Live sessions keyed by id. Nothing is persisted; a restart drops every session.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh workflow and returns its session id.
    pub async fn create(&self, workflow: Workflow) -> (Uuid, Arc<Workflow>) {
        let id = Uuid::new_v4();
        let workflow = Arc::new(workflow);
        self.sessions.write().await.insert(
            id,
            Entry {
                workflow: workflow.clone(),
                last_seen: Instant::now(),
            },
        );
        info!(
            "Session {} opened for user {}",
            id,
            workflow.identity().user_id()
        );
        if workflow.identity().is_anonymous() {
            debug!("Session {} has no user identity; requests go out as anonymous", id);
        }
        (id, workflow)
    }

    /// Looks a session up and marks it as seen.
    pub async fn get(&self, id: Uuid) -> Option<Arc<Workflow>> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id)?;
        entry.last_seen = Instant::now();
        Some(entry.workflow.clone())
    }

    /// Tears a session down: unregisters it and resets its state, discarding any
    /// in-flight result. Returns false when the id is unknown.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id);
        match removed {
            Some(entry) => {
                entry.workflow.reset().await;
                info!("Session {} closed", id);
                true
            }
            None => false,
        }
    }

    /// Tears down every session untouched for at least `max_idle`.
    /// Sessions with an operation in flight are kept. Returns how many were closed.
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let expired: Vec<(Uuid, Arc<Workflow>)> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, entry)| {
                    now.duration_since(entry.last_seen) >= max_idle && !entry.workflow.is_busy()
                })
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id).map(|entry| (id, entry.workflow)))
                .collect()
        };

        for (id, workflow) in &expired {
            workflow.reset().await;
            info!("Session {} expired after {}s idle", id, max_idle.as_secs());
        }
        expired.len()
    }

    /// Runs `sweep_idle` every `every` until the process exits.
    pub fn spawn_sweeper(
        &self,
        max_idle: Duration,
        every: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // first tick is immediate
            loop {
                ticker.tick().await;
                let closed = store.sweep_idle(max_idle).await;
                if closed > 0 {
                    debug!("Idle sweep closed {} session(s)", closed);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Notify;

    use super::*;
    use crate::analysis_client::testing::{client, ScriptedTransport};
    use crate::extraction::TextExtractor;
    use crate::session::SessionIdentity;

    fn workflow(user: Option<&str>) -> Workflow {
        let base = client(Arc::new(ScriptedTransport::new(vec![])));
        Workflow::new(
            base.for_session(SessionIdentity::new(user.map(String::from))),
            TextExtractor::without_pdf_engine(),
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = SessionStore::new();
        let (id, created) = store.create(workflow(Some("u-7"))).await;

        let fetched = store.get(id).await.unwrap();
        assert!(Arc::ptr_eq(&created, &fetched));
        assert_eq!(fetched.identity().user_id(), "u-7");
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::new();
        let (a, _) = store.create(workflow(None)).await;
        let (b, _) = store.create(workflow(None)).await;
        assert_ne!(a, b);

        store
            .get(a)
            .await
            .unwrap()
            .set_job_description("Rust role".into())
            .await
            .unwrap();

        let b_state = store.get(b).await.unwrap().snapshot().await;
        assert!(b_state.job_description_text.is_empty());
    }

    #[tokio::test]
    async fn test_remove_resets_and_unregisters() {
        let store = SessionStore::new();
        let (id, session) = store.create(workflow(None)).await;
        session
            .set_resume_text("Jane Doe, Rust engineer".into())
            .await
            .unwrap();

        assert!(store.remove(id).await);
        assert!(store.get(id).await.is_none());
        // A handle kept across teardown sees a cleared state.
        assert!(session.snapshot().await.resume_text.is_empty());
        assert!(!store.remove(id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_are_swept() {
        let store = SessionStore::new();
        let (stale, stale_handle) = store.create(workflow(None)).await;
        let (fresh, _) = store.create(workflow(None)).await;
        stale_handle
            .set_resume_text("Jane Doe, Rust engineer".into())
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(50)).await;
        store.get(fresh).await.unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(store.sweep_idle(Duration::from_secs(60)).await, 1);
        assert!(store.get(stale).await.is_none());
        assert!(store.get(fresh).await.is_some());
        assert!(stale_handle.snapshot().await.resume_text.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_busy_sessions() {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(ScriptedTransport::gated(vec![], gate.clone()));
        let entered = transport.entered();
        let store = SessionStore::new();
        let (id, session) = store
            .create(Workflow::new(
                client(transport),
                TextExtractor::without_pdf_engine(),
            ))
            .await;
        session.set_resume_text("Jane Doe, Rust engineer".into()).await.unwrap();
        session.set_job_description("Rust role".into()).await.unwrap();

        let running = tokio::spawn({
            let session = session.clone();
            async move { session.run_scoring().await }
        });
        entered.notified().await;
        tokio::time::advance(Duration::from_secs(120)).await;

        assert_eq!(store.sweep_idle(Duration::from_secs(60)).await, 0);
        assert!(session.is_busy());

        gate.notify_one();
        assert!(running.await.unwrap().is_err());
        assert_eq!(store.sweep_idle(Duration::from_secs(60)).await, 1);
        assert!(store.get(id).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_closes_idle_sessions() {
        let store = SessionStore::new();
        let (id, _) = store.create(workflow(None)).await;

        let sweeper = store.spawn_sweeper(Duration::from_secs(60), Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(95)).await;

        assert!(store.get(id).await.is_none());
        sweeper.abort();
    }
}
