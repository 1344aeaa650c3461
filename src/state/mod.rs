/// Time sources.
pub mod clock;
/// Teams, packages and questions as loaded from storage.
pub mod content;
/// Working copy a mutation edits.
pub mod draft;
/// Engine rejections.
pub mod error;
/// Persisted event state.
pub mod event;
/// Round engines.
pub mod rounds;
mod snapshot;
mod sse;
/// Mutation plus broadcast helper used by the services.
pub mod transitions;

use std::{sync::Arc, time::Duration};

use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::{
    config::{AppConfig, GameRules},
    dao::{
        event_store::EventStore,
        models::{EventCommit, EventDocument},
        storage::StorageError,
    },
    error::ServiceError,
    state::{
        clock::{Clock, Millis, SystemClock},
        content::ContentBook,
        draft::EventDraft,
        error::GameResult,
    },
};

pub use self::snapshot::StateSnapshot;
pub use self::sse::SseHub;

/// Handle shared by handlers and background tasks.
pub type SharedState = Arc<AppState>;
/// Upper bound on one mutation, retries included.
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_COMMIT_ATTEMPTS: u32 = 5;
const CONFLICT_BACKOFF: Duration = Duration::from_millis(100);

/// How a mutation treats a store that holds no event document yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationMode {
    /// Start from a fresh lobby built from the team roster.
    CreateIfMissing,
    /// Fail with "not found".
    RequireExisting,
}

/// Outcome of [`AppState::run_mutation`].
#[derive(Debug)]
pub struct Mutation<T> {
    /// Value returned by the engine closure.
    pub value: T,
    /// State after the mutation.
    pub snapshot: StateSnapshot,
    /// Whether anything was written.
    pub changed: bool,
}

/// Central application state: storage handle, broadcast hub, rules and clock.
pub struct AppState {
    event_store: RwLock<Option<Arc<dyn EventStore>>>,
    sse: SseHub,
    config: AppConfig,
    clock: Arc<dyn Clock>,
    degraded: watch::Sender<bool>,
    transition_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Same as [`AppState::new`] with an explicit time source.
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            event_store: RwLock::new(None),
            sse: SseHub::new(64),
            config,
            clock,
            degraded: degraded_tx,
            transition_gate: Mutex::new(()),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
        })
    }

    /// Obtain a handle to the current event store, if one is installed.
    pub async fn event_store(&self) -> Option<Arc<dyn EventStore>> {
        let guard = self.event_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new event store implementation and leave degraded mode.
    pub async fn set_event_store(&self, store: Arc<dyn EventStore>) {
        {
            let mut guard = self.event_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current event store and enter degraded mode.
    pub async fn clear_event_store(&self) {
        {
            let mut guard = self.event_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.event_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Broadcast hub used for the SSE stream.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    /// Loaded application configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Scoring tables and durations.
    pub fn rules(&self) -> &GameRules {
        &self.config.rules
    }

    /// Current instant in epoch milliseconds.
    pub fn now_ms(&self) -> Millis {
        self.clock.now_ms()
    }

    /// Update and broadcast the degraded flag when the value changes.
    fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Read the current state without writing. When no event exists yet the
    /// lobby it would start from is returned at revision 0.
    ///
    /// Stores apply a commit as several writes, so reads wait for the
    /// transition in flight to land before loading.
    pub async fn snapshot(&self) -> Result<StateSnapshot, ServiceError> {
        let _gate = self.transition_gate.lock().await;
        let store = self.event_store().await.ok_or(ServiceError::Degraded)?;
        let draft = self
            .load_draft(store.as_ref(), MutationMode::CreateIfMissing)
            .await?;
        Ok(StateSnapshot::capture(
            draft.revision(),
            &draft.event,
            &draft.content,
        ))
    }

    /// Run one read-compute-write unit against the authoritative document.
    ///
    /// Writers are serialized in-process, the document is reloaded fresh,
    /// expired timers are applied (see [`reconciled`]), then `work` runs
    /// against the draft. A
    /// rejected closure writes nothing. A revision conflict reloads and
    /// re-runs `work`, so it must not have side effects outside the draft.
    pub async fn run_mutation<T, F>(
        &self,
        mode: MutationMode,
        mut work: F,
    ) -> Result<Mutation<T>, ServiceError>
    where
        F: FnMut(&mut EventDraft, &GameRules) -> GameResult<T>,
    {
        let _gate = self.transition_gate.lock().await;
        let attempt = self.mutate(mode, &mut work);
        match self.transition_timeout {
            Some(limit) => timeout(limit, attempt)
                .await
                .map_err(|_| ServiceError::Timeout)?,
            None => attempt.await,
        }
    }

    async fn mutate<T, F>(
        &self,
        mode: MutationMode,
        work: &mut F,
    ) -> Result<Mutation<T>, ServiceError>
    where
        F: FnMut(&mut EventDraft, &GameRules) -> GameResult<T>,
    {
        let store = self.event_store().await.ok_or(ServiceError::Degraded)?;
        let rules = self.rules();
        let mut delay = CONFLICT_BACKOFF;

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let draft = self.load_draft(store.as_ref(), mode).await?;
            let mut draft = reconciled(draft, rules);
            let value = work(&mut draft, rules)?;

            if !draft.is_dirty() {
                let snapshot =
                    StateSnapshot::capture(draft.revision(), &draft.event, &draft.content);
                return Ok(Mutation {
                    value,
                    snapshot,
                    changed: false,
                });
            }

            let content = draft.content.clone();
            let changes = draft.into_changes();
            let revision = changes.base_revision + 1;
            let commit = EventCommit {
                expected_revision: changes.base_revision,
                document: EventDocument {
                    revision,
                    state: changes.event,
                },
                packages: changes.packages,
            };
            let snapshot = StateSnapshot::capture(revision, &commit.document.state, &content);

            match store.commit(commit).await {
                Ok(()) => {
                    debug!(revision, attempt, "event committed");
                    return Ok(Mutation {
                        value,
                        snapshot,
                        changed: true,
                    });
                }
                Err(StorageError::Conflict { expected, found }) => {
                    warn!(
                        attempt,
                        expected,
                        found = ?found,
                        "event changed concurrently; reloading"
                    );
                    sleep(delay).await;
                    delay *= 2;
                }
                Err(err) => return Err(ServiceError::Unavailable(err)),
            }
        }

        warn!(
            attempts = MAX_COMMIT_ATTEMPTS,
            "giving up after repeated revision conflicts"
        );
        Err(ServiceError::Contention {
            attempts: MAX_COMMIT_ATTEMPTS,
        })
    }

    async fn load_draft(
        &self,
        store: &dyn EventStore,
        mode: MutationMode,
    ) -> Result<EventDraft, ServiceError> {
        let (event, teams, packages, questions) = tokio::try_join!(
            store.load_event(),
            store.list_teams(),
            store.list_packages(),
            store.list_questions()
        )?;

        let (revision, state) = match event {
            Some(document) => (document.revision, Some(document.state)),
            None if mode == MutationMode::CreateIfMissing => (0, None),
            None => return Err(ServiceError::NotFound("no event has been started".into())),
        };

        Ok(EventDraft::load(
            revision,
            state,
            teams,
            ContentBook::new(packages, questions),
            self.now_ms(),
        ))
    }
}

/// Apply expired deadlines to a copy of `draft`. A document the engines
/// cannot reconcile is returned as loaded, so operations such as a reset can
/// still repair it.
fn reconciled(draft: EventDraft, rules: &GameRules) -> EventDraft {
    let mut copy = draft.clone();
    match rounds::reconcile(&mut copy, rules) {
        Ok(_) => copy,
        Err(err) => {
            warn!(
                error = %err,
                phase = draft.event.round.phase_name(),
                "event cannot be reconciled; using it as stored"
            );
            draft
        }
    }
}
