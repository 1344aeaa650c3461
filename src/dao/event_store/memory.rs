//! Process-local store used when no database is configured and by tests.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::{
    dao::{
        event_store::EventStore,
        models::{ContentBundle, EventCommit, EventDocument},
        storage::{StorageError, StorageResult},
    },
    state::content::{Package, Question, TeamProfile},
};

#[derive(Debug, Error)]
#[error("in-memory store is offline")]
struct Offline;

/// [`EventStore`] keeping everything in process memory.
#[derive(Clone, Default)]
pub struct MemoryEventStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    // Event and packages change together under one lock.
    data: Mutex<MemoryData>,
    teams: RwLock<Vec<TeamProfile>>,
    questions: DashMap<Uuid, Question>,
    offline: AtomicBool,
}

#[derive(Default)]
struct MemoryData {
    event: Option<EventDocument>,
    packages: IndexMap<Uuid, Package>,
}

impl MemoryEventStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails until switched back on.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            Err(StorageError::unavailable("memory", Offline))
        } else {
            Ok(())
        }
    }

    async fn commit(&self, commit: EventCommit) -> StorageResult<()> {
        self.ensure_online()?;
        let mut data = self.inner.data.lock().await;
        let found = data.event.as_ref().map(|doc| doc.revision);
        if found.unwrap_or(0) != commit.expected_revision {
            return Err(StorageError::conflict(commit.expected_revision, found));
        }
        for package in commit.packages {
            data.packages.insert(package.id, package);
        }
        data.event = Some(commit.document);
        Ok(())
    }

    async fn seed(&self, content: ContentBundle) -> StorageResult<()> {
        self.ensure_online()?;
        {
            let mut teams = self.inner.teams.write().await;
            for team in content.teams {
                if !teams.iter().any(|existing| existing.id == team.id) {
                    teams.push(team);
                }
            }
        }
        {
            let mut data = self.inner.data.lock().await;
            for package in content.packages {
                data.packages.entry(package.id).or_insert(package);
            }
        }
        for question in content.questions {
            self.inner.questions.entry(question.id).or_insert(question);
        }
        Ok(())
    }
}

impl EventStore for MemoryEventStore {
    fn load_event(&self) -> BoxFuture<'static, StorageResult<Option<EventDocument>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            Ok(store.inner.data.lock().await.event.clone())
        })
    }

    fn commit(&self, commit: EventCommit) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.commit(commit).await })
    }

    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamProfile>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            Ok(store.inner.teams.read().await.clone())
        })
    }

    fn list_packages(&self) -> BoxFuture<'static, StorageResult<Vec<Package>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let data = store.inner.data.lock().await;
            Ok(data.packages.values().cloned().collect())
        })
    }

    fn list_questions(&self) -> BoxFuture<'static, StorageResult<Vec<Question>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            Ok(store
                .inner
                .questions
                .iter()
                .map(|entry| entry.value().clone())
                .collect())
        })
    }

    fn seed(&self, content: ContentBundle) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.seed(content).await })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }
}
