use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "summit_quiz";

/// Basic-auth pair sent with every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouchCredentials {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

/// Where the CouchDB event store lives.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Server root, trailing slash tolerated.
    pub base_url: String,
    /// Database holding every quiz document.
    pub database: String,
    /// Sent as basic auth when present.
    pub credentials: Option<CouchCredentials>,
}

impl CouchConfig {
    /// Anonymous access to `database` on `base_url`.
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            credentials: None,
        }
    }

    /// Same configuration authenticating as `username`.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(CouchCredentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Read `COUCH_BASE_URL` (required), `COUCH_DB`, `COUCH_USERNAME` and `COUCH_PASSWORD`.
    pub fn from_env() -> CouchResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CouchResult<Self> {
        let base_url = lookup("COUCH_BASE_URL").ok_or(CouchDaoError::MissingEnvVar {
            var: "COUCH_BASE_URL",
        })?;
        let database = lookup("COUCH_DB").unwrap_or_else(|| DEFAULT_DATABASE.to_owned());
        let config = Self::new(base_url, database);

        // Credentials only count when both halves are present.
        Ok(match (lookup("COUCH_USERNAME"), lookup("COUCH_PASSWORD")) {
            (Some(username), Some(password)) => config.with_credentials(username, password),
            _ => config,
        })
    }
}
