use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::doc,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    config::MongoConfig,
    connection::{establish_connection, ping},
    error::{CollectionOp, MongoDaoError, MongoResult},
    models::{
        EVENT_COLLECTION_NAME, EVENT_ID, MongoEventDocument, MongoPackageDocument,
        MongoQuestionDocument, MongoTeamDocument, PACKAGE_COLLECTION_NAME,
        QUESTION_COLLECTION_NAME, TEAM_COLLECTION_NAME,
    },
};
use crate::{
    dao::{
        event_store::EventStore,
        models::{ContentBundle, EventCommit, EventDocument},
        storage::StorageResult,
    },
    state::content::{Package, Question, TeamProfile},
};

const DUPLICATE_KEY_CODE: i32 = 11000;

/// [`EventStore`] backed by MongoDB collections.
#[derive(Clone)]
pub struct MongoEventStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY_CODE
    )
}

impl MongoInner {
    async fn health(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        ping(&database)
            .await
            .map_err(|source| MongoDaoError::Unreachable {
                attempts: 1,
                source,
            })
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoEventStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let questions = self.question_collection().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"package_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("question_package_idx".to_owned()))
                    .build(),
            )
            .build();
        questions
            .create_index(index)
            .await
            .map_err(MongoDaoError::on(CollectionOp::Index, QUESTION_COLLECTION_NAME))?;

        let packages = self.package_collection().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"round": 1, "number": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("package_round_number_idx".to_owned()))
                    .build(),
            )
            .build();
        packages
            .create_index(index)
            .await
            .map_err(MongoDaoError::on(CollectionOp::Index, PACKAGE_COLLECTION_NAME))?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn event_collection(&self) -> Collection<MongoEventDocument> {
        self.database().await.collection(EVENT_COLLECTION_NAME)
    }

    async fn team_collection(&self) -> Collection<MongoTeamDocument> {
        self.database().await.collection(TEAM_COLLECTION_NAME)
    }

    async fn package_collection(&self) -> Collection<MongoPackageDocument> {
        self.database().await.collection(PACKAGE_COLLECTION_NAME)
    }

    async fn question_collection(&self) -> Collection<MongoQuestionDocument> {
        self.database().await.collection(QUESTION_COLLECTION_NAME)
    }

    async fn load_event(&self) -> MongoResult<Option<EventDocument>> {
        let collection = self.event_collection().await;
        let document = collection
            .find_one(doc! {"_id": EVENT_ID})
            .await
            .map_err(MongoDaoError::on(CollectionOp::Read, EVENT_COLLECTION_NAME))?;
        document.map(MongoEventDocument::into_document).transpose()
    }

    /// Swap the event document when its revision still matches, then write
    /// the touched packages.
    async fn commit(&self, commit: EventCommit) -> MongoResult<()> {
        let expected = commit.expected_revision;
        let document = MongoEventDocument::from_document(&commit.document)?;
        let events = self.event_collection().await;

        if expected == 0 {
            match events.insert_one(&document).await {
                Ok(_) => {}
                Err(source) if is_duplicate_key(&source) => {
                    return Err(MongoDaoError::RevisionMismatch { expected });
                }
                Err(source) => {
                    return Err(MongoDaoError::on(CollectionOp::Write, EVENT_COLLECTION_NAME)(
                        source,
                    ));
                }
            }
        } else {
            let result = events
                .update_one(
                    doc! {"_id": EVENT_ID, "revision": expected as i64},
                    doc! {"$set": {"revision": document.revision, "body": document.body.as_str()}},
                )
                .await
                .map_err(MongoDaoError::on(CollectionOp::Write, EVENT_COLLECTION_NAME))?;
            if result.matched_count == 0 {
                return Err(MongoDaoError::RevisionMismatch { expected });
            }
        }

        let packages = self.package_collection().await;
        for package in &commit.packages {
            let document = MongoPackageDocument::from_package(package)?;
            packages
                .replace_one(doc! {"_id": document.id.as_str()}, &document)
                .upsert(true)
                .await
                .map_err(MongoDaoError::on(CollectionOp::Write, PACKAGE_COLLECTION_NAME))?;
        }
        debug!(
            revision = commit.document.revision,
            packages = commit.packages.len(),
            "event committed to MongoDB"
        );
        Ok(())
    }

    async fn list_teams(&self) -> MongoResult<Vec<TeamProfile>> {
        let documents: Vec<MongoTeamDocument> = self
            .team_collection()
            .await
            .find(doc! {})
            .sort(doc! {"position": 1})
            .await
            .map_err(MongoDaoError::on(CollectionOp::Read, TEAM_COLLECTION_NAME))?
            .try_collect()
            .await
            .map_err(MongoDaoError::on(CollectionOp::Read, TEAM_COLLECTION_NAME))?;
        documents
            .into_iter()
            .map(MongoTeamDocument::into_team)
            .collect()
    }

    async fn list_packages(&self) -> MongoResult<Vec<Package>> {
        let documents: Vec<MongoPackageDocument> = self
            .package_collection()
            .await
            .find(doc! {})
            .sort(doc! {"round": 1, "number": 1})
            .await
            .map_err(MongoDaoError::on(CollectionOp::Read, PACKAGE_COLLECTION_NAME))?
            .try_collect()
            .await
            .map_err(MongoDaoError::on(CollectionOp::Read, PACKAGE_COLLECTION_NAME))?;
        documents
            .into_iter()
            .map(MongoPackageDocument::into_package)
            .collect()
    }

    async fn list_questions(&self) -> MongoResult<Vec<Question>> {
        let documents: Vec<MongoQuestionDocument> = self
            .question_collection()
            .await
            .find(doc! {})
            .await
            .map_err(MongoDaoError::on(CollectionOp::Read, QUESTION_COLLECTION_NAME))?
            .try_collect()
            .await
            .map_err(MongoDaoError::on(CollectionOp::Read, QUESTION_COLLECTION_NAME))?;
        documents
            .into_iter()
            .map(MongoQuestionDocument::into_question)
            .collect()
    }

    /// Insert-only upserts so seeding never clobbers play progress.
    async fn seed(&self, content: ContentBundle) -> MongoResult<()> {
        let teams = self.team_collection().await;
        for (position, team) in content.teams.iter().enumerate() {
            let document = MongoTeamDocument::from_team(position, team)?;
            teams
                .update_one(
                    doc! {"_id": document.id.as_str()},
                    doc! {"$setOnInsert": {
                        "position": document.position,
                        "body": document.body.as_str(),
                    }},
                )
                .upsert(true)
                .await
                .map_err(MongoDaoError::on(CollectionOp::Write, TEAM_COLLECTION_NAME))?;
        }

        let packages = self.package_collection().await;
        for package in &content.packages {
            let document = MongoPackageDocument::from_package(package)?;
            packages
                .update_one(
                    doc! {"_id": document.id.as_str()},
                    doc! {"$setOnInsert": {
                        "round": document.round,
                        "number": document.number,
                        "body": document.body.as_str(),
                    }},
                )
                .upsert(true)
                .await
                .map_err(MongoDaoError::on(CollectionOp::Write, PACKAGE_COLLECTION_NAME))?;
        }

        let questions = self.question_collection().await;
        for question in &content.questions {
            let document = MongoQuestionDocument::from_question(question)?;
            questions
                .update_one(
                    doc! {"_id": document.id.as_str()},
                    doc! {"$setOnInsert": {
                        "package_id": document.package_id.as_str(),
                        "body": document.body.as_str(),
                    }},
                )
                .upsert(true)
                .await
                .map_err(MongoDaoError::on(CollectionOp::Write, QUESTION_COLLECTION_NAME))?;
        }
        Ok(())
    }
}

impl EventStore for MongoEventStore {
    fn load_event(&self) -> BoxFuture<'static, StorageResult<Option<EventDocument>>> {
        let store = self.clone();
        Box::pin(async move { store.load_event().await.map_err(Into::into) })
    }

    fn commit(&self, commit: EventCommit) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.commit(commit).await.map_err(Into::into) })
    }

    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamProfile>>> {
        let store = self.clone();
        Box::pin(async move { store.list_teams().await.map_err(Into::into) })
    }

    fn list_packages(&self) -> BoxFuture<'static, StorageResult<Vec<Package>>> {
        let store = self.clone();
        Box::pin(async move { store.list_packages().await.map_err(Into::into) })
    }

    fn list_questions(&self) -> BoxFuture<'static, StorageResult<Vec<Question>>> {
        let store = self.clone();
        Box::pin(async move { store.list_questions().await.map_err(Into::into) })
    }

    fn seed(&self, content: ContentBundle) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.seed(content).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.health().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
