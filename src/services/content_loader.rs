//! Reads the pre-provisioned teams, packages and questions seeded into the store.

use std::{fs, path::Path};

use thiserror::Error;
use tracing::{info, warn};

use crate::{config::content_path, dao::models::ContentBundle};

/// Failure to read a content file.
#[derive(Debug, Error)]
pub enum ContentError {
    /// The file could not be read.
    #[error("failed to read content file `{path}`")]
    Read {
        /// Path that was read.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a valid content bundle.
    #[error("failed to parse content file `{path}`")]
    Parse {
        /// Path that was read.
        path: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Parse a content bundle from `path`.
pub fn load_from(path: &Path) -> Result<ContentBundle, ContentError> {
    let display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| ContentError::Read {
        path: display.clone(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ContentError::Parse {
        path: display,
        source,
    })
}

/// Load the configured content bundle, falling back to an empty one.
pub fn load() -> ContentBundle {
    let path = content_path();
    match load_from(&path) {
        Ok(bundle) => {
            info!(
                path = %path.display(),
                teams = bundle.teams.len(),
                packages = bundle.packages.len(),
                questions = bundle.questions.len(),
                "loaded quiz content"
            );
            bundle
        }
        Err(err) => {
            warn!(error = %err, "quiz content unavailable; starting without content");
            ContentBundle::default()
        }
    }
}
