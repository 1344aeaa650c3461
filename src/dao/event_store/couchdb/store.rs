use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use tracing::debug;

use crate::{
    dao::{
        event_store::EventStore,
        models::{ContentBundle, EventCommit, EventDocument},
        storage::StorageResult,
    },
    state::content::{Package, Question, TeamProfile},
};

use super::{
    config::{CouchConfig, CouchCredentials},
    error::{CouchAction, CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, CouchDocument, END_SUFFIX, EVENT_DOC_ID, EventBody, PACKAGE_PREFIX,
        QUESTION_PREFIX, TEAM_PREFIX, TeamBody, package_doc_id, question_doc_id, team_doc_id,
    },
};

/// [`EventStore`] backed by a CouchDB database.
#[derive(Clone)]
pub struct CouchEventStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    credentials: Option<Arc<CouchCredentials>>,
}

impl CouchEventStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let store = Self {
            client,
            base_url,
            database,
            credentials: config.credentials.map(Arc::new),
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.credentials.as_deref() {
            Some(creds) => builder.basic_auth(&creds.username, Some(&creds.password)),
            None => builder,
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.authorized(self.client.request(method, url))
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.as_ref();
        let url = self.database_url();

        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(CouchDaoError::transport(CouchAction::Database, database))?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorized(self.client.put(&url))
                    .send()
                    .await
                    .map_err(CouchDaoError::transport(CouchAction::Database, database))?;
                match create.status() {
                    status if status.is_success() => Ok(()),
                    // Another instance created it first.
                    StatusCode::PRECONDITION_FAILED => Ok(()),
                    status => Err(CouchDaoError::status(CouchAction::Database, database, status)),
                }
            }
            other => Err(CouchDaoError::status(CouchAction::Database, database, other)),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<CouchDocument<T>>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(CouchDaoError::transport(CouchAction::Read, doc_id))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<CouchDocument<T>>()
                .await
                .map(Some)
                .map_err(CouchDaoError::body(CouchAction::Read, doc_id)),
            other => Err(CouchDaoError::status(CouchAction::Read, doc_id, other)),
        }
    }

    /// PUT a document. Returns `Ok(false)` when CouchDB reports a revision conflict.
    async fn put_document<T>(&self, document: &CouchDocument<T>) -> CouchResult<bool>
    where
        T: Serialize,
    {
        let response = self
            .request(Method::PUT, &document.id)
            .json(document)
            .send()
            .await
            .map_err(CouchDaoError::transport(CouchAction::Write, &document.id))?;

        match response.status() {
            StatusCode::CONFLICT => Ok(false),
            status if status.is_success() => Ok(true),
            other => Err(CouchDaoError::status(CouchAction::Write, &document.id, other)),
        }
    }

    /// Write a document, carrying over the stored `_rev` so it replaces in place.
    async fn upsert_document<T>(&self, mut document: CouchDocument<T>) -> CouchResult<()>
    where
        T: Serialize + DeserializeOwned,
    {
        if let Some(existing) = self
            .get_document::<serde_json::Value>(&document.id)
            .await?
        {
            document.rev = existing.rev;
        }
        if self.put_document(&document).await? {
            Ok(())
        } else {
            Err(CouchDaoError::status(
                CouchAction::Write,
                &document.id,
                StatusCode::CONFLICT,
            ))
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<CouchDocument<T>>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(CouchDaoError::transport(CouchAction::Scan, prefix))?;

        if !response.status().is_success() {
            return Err(CouchDaoError::status(
                CouchAction::Scan,
                prefix,
                response.status(),
            ));
        }

        let payload = response
            .json::<AllDocsResponse>()
            .await
            .map_err(CouchDaoError::body(CouchAction::Scan, prefix))?;

        payload
            .rows
            .into_iter()
            .filter_map(|row| row.doc.map(|doc| (row.id, doc)))
            .map(|(id, doc)| {
                from_value(doc).map_err(|source| CouchDaoError::Schema { target: id, source })
            })
            .collect()
    }

    async fn commit(&self, commit: EventCommit) -> CouchResult<()> {
        let expected = commit.expected_revision;
        let current = self.get_document::<EventBody>(EVENT_DOC_ID).await?;
        let found = current.as_ref().map(|doc| doc.body.revision);
        if found.unwrap_or(0) != expected {
            return Err(CouchDaoError::RevisionMismatch { expected, found });
        }

        let mut document = CouchDocument::new(
            EVENT_DOC_ID.to_owned(),
            EventBody {
                revision: commit.document.revision,
                state: commit.document.state,
            },
        );
        document.rev = current.and_then(|doc| doc.rev);
        if !self.put_document(&document).await? {
            // Another writer replaced the document between our read and write.
            return Err(CouchDaoError::RevisionMismatch { expected, found });
        }

        let touched = commit.packages.len();
        for package in commit.packages {
            self.upsert_document(CouchDocument::new(package_doc_id(package.id), package))
                .await?;
        }
        debug!(
            revision = document.body.revision,
            packages = touched,
            "event committed to CouchDB"
        );
        Ok(())
    }

    async fn seed(&self, content: ContentBundle) -> CouchResult<()> {
        for (position, team) in content.teams.into_iter().enumerate() {
            let document = CouchDocument::new(team_doc_id(team.id), TeamBody { position, team });
            self.put_document(&document).await?;
        }
        for package in content.packages {
            self.put_document(&CouchDocument::new(package_doc_id(package.id), package))
                .await?;
        }
        for question in content.questions {
            self.put_document(&CouchDocument::new(question_doc_id(question.id), question))
                .await?;
        }
        Ok(())
    }
}

impl EventStore for CouchEventStore {
    fn load_event(&self) -> BoxFuture<'static, StorageResult<Option<EventDocument>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store.get_document::<EventBody>(EVENT_DOC_ID).await?;
            Ok(document.map(|doc| EventDocument {
                revision: doc.body.revision,
                state: doc.body.state,
            }))
        })
    }

    fn commit(&self, commit: EventCommit) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.commit(commit).await.map_err(Into::into) })
    }

    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamProfile>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut docs = store.list_documents::<TeamBody>(TEAM_PREFIX).await?;
            docs.sort_by_key(|doc| doc.body.position);
            Ok(docs.into_iter().map(|doc| doc.body.team).collect())
        })
    }

    fn list_packages(&self) -> BoxFuture<'static, StorageResult<Vec<Package>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store.list_documents::<Package>(PACKAGE_PREFIX).await?;
            Ok(docs.into_iter().map(|doc| doc.body).collect())
        })
    }

    fn list_questions(&self) -> BoxFuture<'static, StorageResult<Vec<Question>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store.list_documents::<Question>(QUESTION_PREFIX).await?;
            Ok(docs.into_iter().map(|doc| doc.body).collect())
        })
    }

    fn seed(&self, content: ContentBundle) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.seed(content).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .authorized(store.client.get(&url))
                .send()
                .await
                .map_err(CouchDaoError::transport(CouchAction::Database, &store.database))?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(
                    CouchDaoError::status(CouchAction::Database, &store.database, response.status())
                        .into(),
                )
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
