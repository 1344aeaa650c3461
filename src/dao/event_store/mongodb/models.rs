//! Collection layouts. Domain values travel as JSON bodies so map keys and
//! unsigned counters survive BSON unchanged.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::error::{BodyDirection, MongoDaoError, MongoResult};
use crate::{
    dao::models::EventDocument,
    state::content::{Package, Question, TeamProfile},
};

pub const EVENT_COLLECTION_NAME: &str = "events";
pub const TEAM_COLLECTION_NAME: &str = "teams";
pub const PACKAGE_COLLECTION_NAME: &str = "packages";
pub const QUESTION_COLLECTION_NAME: &str = "questions";

/// Identifier of the singleton event document.
pub const EVENT_ID: &str = "current";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoEventDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub revision: i64,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTeamDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub position: i64,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPackageDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub round: i32,
    pub number: i64,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub package_id: String,
    pub body: String,
}

fn encode<T: Serialize>(id: &str, value: &T) -> MongoResult<String> {
    serde_json::to_string(value).map_err(|source| MongoDaoError::Body {
        id: id.to_owned(),
        direction: BodyDirection::Encode,
        source,
    })
}

fn decode<T: DeserializeOwned>(id: &str, body: &str) -> MongoResult<T> {
    serde_json::from_str(body).map_err(|source| MongoDaoError::Body {
        id: id.to_owned(),
        direction: BodyDirection::Decode,
        source,
    })
}

impl MongoEventDocument {
    pub fn from_document(document: &EventDocument) -> MongoResult<Self> {
        Ok(Self {
            id: EVENT_ID.to_owned(),
            revision: document.revision as i64,
            body: encode(EVENT_ID, &document.state)?,
        })
    }

    pub fn into_document(self) -> MongoResult<EventDocument> {
        Ok(EventDocument {
            revision: self.revision.max(0) as u64,
            state: decode(&self.id, &self.body)?,
        })
    }
}

impl MongoTeamDocument {
    pub fn from_team(position: usize, team: &TeamProfile) -> MongoResult<Self> {
        let id = team.id.to_string();
        Ok(Self {
            body: encode(&id, team)?,
            id,
            position: position as i64,
        })
    }

    pub fn into_team(self) -> MongoResult<TeamProfile> {
        decode(&self.id, &self.body)
    }
}

impl MongoPackageDocument {
    pub fn from_package(package: &Package) -> MongoResult<Self> {
        let id = package.id.to_string();
        Ok(Self {
            body: encode(&id, package)?,
            id,
            round: i32::from(package.round.number()),
            number: i64::from(package.number),
        })
    }

    pub fn into_package(self) -> MongoResult<Package> {
        decode(&self.id, &self.body)
    }
}

impl MongoQuestionDocument {
    pub fn from_question(question: &Question) -> MongoResult<Self> {
        let id = question.id.to_string();
        Ok(Self {
            body: encode(&id, question)?,
            id,
            package_id: question.package_id.to_string(),
        })
    }

    pub fn into_question(self) -> MongoResult<Question> {
        decode(&self.id, &self.body)
    }
}
