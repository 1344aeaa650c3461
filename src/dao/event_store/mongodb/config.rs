use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DB: &str = "summit_quiz";

/// Parsed driver options plus the database holding the quiz collections.
#[derive(Clone)]
pub struct MongoConfig {
    /// Driver options parsed from the connection string.
    pub options: ClientOptions,
    /// Database holding the quiz collections.
    pub database_name: String,
}

impl MongoConfig {
    /// Parse `uri`; `database` falls back to the URI's default database, then `summit_quiz`.
    pub async fn from_uri(uri: &str, database: Option<&str>) -> MongoResult<Self> {
        let options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: uri.to_owned(),
                source,
            })?;
        let database_name = database
            .map(str::to_owned)
            .or_else(|| options.default_database.clone())
            .unwrap_or_else(|| DEFAULT_DB.to_owned());

        Ok(Self {
            options,
            database_name,
        })
    }

    /// Read `MONGO_URI` (required) and `MONGO_DB`.
    pub async fn from_env() -> MongoResult<Self> {
        let Ok(uri) = std::env::var("MONGO_URI") else {
            return Err(MongoDaoError::MissingEnvVar { var: "MONGO_URI" });
        };
        let database = std::env::var("MONGO_DB").ok();
        Self::from_uri(&uri, database.as_deref()).await
    }
}
