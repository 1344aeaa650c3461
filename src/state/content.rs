//! Pre-provisioned quiz content (teams, packages, questions) and the
//! per-mutation view the round engines read and update.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::{
    clock::Millis,
    error::{GameError, GameResult},
    event::RoundKind,
};

/// Number of puzzle pieces hiding a Round2 image.
pub const PUZZLE_PIECES: u8 = 4;

/// A team registered for the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamProfile {
    /// Stable identifier for the team.
    pub id: Uuid,
    /// Display name.
    pub name: String,
}

/// Lifecycle of a package during play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    /// Never assigned to a team.
    #[default]
    Unassigned,
    /// Currently being played.
    InProgress,
    /// Fully played; cannot be selected again.
    Completed,
}

/// Final verdict recorded for one question of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Answered correctly.
    Correct,
    /// Answered incorrectly.
    Wrong,
    /// The package timer elapsed before the question was judged.
    Timeout,
}

/// One entry of a package's judged-outcome history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgedOutcome {
    /// Position of the question inside its package.
    pub question_index: usize,
    /// Identifier of the judged question.
    pub question_id: Uuid,
    /// Recorded verdict.
    pub outcome: Outcome,
    /// When the verdict was recorded.
    pub judged_at_ms: Millis,
}

/// Static Round2 puzzle attached to a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleContent {
    /// The keyword hidden behind the puzzle.
    pub target_answer: String,
    /// Letters in the keyword, whitespace excluded.
    pub letter_count: usize,
    /// Image revealed piece by piece.
    pub image_url: String,
    /// References to the four image pieces.
    pub pieces: Vec<String>,
    /// Horizontal question index mapped to the piece it uncovers.
    pub piece_for_question: BTreeMap<u8, u8>,
}

impl PuzzleContent {
    /// Build a puzzle, deriving the letter count from the keyword.
    pub fn new(
        target_answer: String,
        image_url: String,
        pieces: Vec<String>,
        piece_for_question: BTreeMap<u8, u8>,
    ) -> Self {
        let letter_count = target_answer
            .chars()
            .filter(|c| !c.is_whitespace())
            .count();
        Self {
            target_answer,
            letter_count,
            image_url,
            pieces,
            piece_for_question,
        }
    }
}

/// A package of questions played by one team (Round1) or by everyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Stable identifier.
    pub id: Uuid,
    /// Round the package belongs to.
    pub round: RoundKind,
    /// Human facing package number inside its round.
    pub number: u32,
    /// Play status.
    #[serde(default)]
    pub status: PackageStatus,
    /// Team currently or last playing the package.
    #[serde(default)]
    pub assigned_team: Option<Uuid>,
    /// Index of the next question to serve.
    #[serde(default)]
    pub question_index: usize,
    /// Judged outcomes in question order.
    #[serde(default)]
    pub history: Vec<JudgedOutcome>,
    /// Round2 puzzle metadata.
    #[serde(default)]
    pub puzzle: Option<PuzzleContent>,
}

impl Package {
    /// Outcome recorded for the question at `index`, if any.
    pub fn outcome_at(&self, index: usize) -> Option<&JudgedOutcome> {
        self.history
            .iter()
            .find(|entry| entry.question_index == index)
    }

    /// Forget all play progress.
    pub fn reset(&mut self) {
        self.status = PackageStatus::Unassigned;
        self.assigned_team = None;
        self.question_index = 0;
        self.history.clear();
    }
}

/// A single question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Stable identifier.
    pub id: Uuid,
    /// Owning package.
    pub package_id: Uuid,
    /// Position inside the package.
    pub index: usize,
    /// Question text.
    pub prompt: String,
    /// Expected answer, shown to the operator only.
    pub answer: String,
    /// Point value (Round4 bank questions).
    #[serde(default)]
    pub points: Option<i32>,
}

/// Content loaded for one mutation. Packages modified through
/// [`ContentBook::package_mut`] are written back with the event document.
#[derive(Debug, Clone, Default)]
pub struct ContentBook {
    packages: BTreeMap<Uuid, Package>,
    questions: BTreeMap<Uuid, Question>,
    originals: BTreeMap<Uuid, Package>,
}

impl ContentBook {
    /// Index the provided packages and questions.
    pub fn new(packages: Vec<Package>, questions: Vec<Question>) -> Self {
        Self {
            packages: packages.into_iter().map(|p| (p.id, p)).collect(),
            questions: questions.into_iter().map(|q| (q.id, q)).collect(),
            originals: BTreeMap::new(),
        }
    }

    /// Look up a package.
    pub fn package(&self, id: Uuid) -> GameResult<&Package> {
        self.packages
            .get(&id)
            .ok_or_else(|| GameError::not_found(format!("package `{id}` not found")))
    }

    /// Look up a package for modification, marking it for persistence.
    pub fn package_mut(&mut self, id: Uuid) -> GameResult<&mut Package> {
        let package = self
            .packages
            .get_mut(&id)
            .ok_or_else(|| GameError::not_found(format!("package `{id}` not found")))?;
        self.originals
            .entry(id)
            .or_insert_with(|| package.clone());
        Ok(package)
    }

    /// Every package, unordered.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    /// Packages of a round ordered by number.
    pub fn packages_of(&self, round: RoundKind) -> Vec<&Package> {
        let mut packages: Vec<&Package> = self
            .packages
            .values()
            .filter(|package| package.round == round)
            .collect();
        packages.sort_by_key(|package| package.number);
        packages
    }

    /// Look up a question.
    pub fn question(&self, id: Uuid) -> GameResult<&Question> {
        self.questions
            .get(&id)
            .ok_or_else(|| GameError::not_found(format!("question `{id}` not found")))
    }

    /// Questions of a package ordered by index.
    pub fn questions_of(&self, package_id: Uuid) -> Vec<&Question> {
        let mut questions: Vec<&Question> = self
            .questions
            .values()
            .filter(|question| question.package_id == package_id)
            .collect();
        questions.sort_by_key(|question| question.index);
        questions
    }

    /// Question at `index` inside a package.
    pub fn question_at(&self, package_id: Uuid, index: usize) -> GameResult<&Question> {
        self.questions
            .values()
            .find(|question| question.package_id == package_id && question.index == index)
            .ok_or_else(|| {
                GameError::not_found(format!(
                    "question {index} of package `{package_id}` not found"
                ))
            })
    }

    /// Every question belonging to a package of `round`.
    pub fn questions_of_round(&self, round: RoundKind) -> Vec<&Question> {
        self.questions
            .values()
            .filter(|question| {
                self.packages
                    .get(&question.package_id)
                    .is_some_and(|package| package.round == round)
            })
            .collect()
    }

    /// Reset every package of `round`, or of all rounds when `None`.
    pub fn reset_packages(&mut self, round: Option<RoundKind>) {
        for package in self.packages.values_mut() {
            if round.is_none_or(|kind| package.round == kind) {
                self.originals
                    .entry(package.id)
                    .or_insert_with(|| package.clone());
                package.reset();
            }
        }
    }

    /// Whether any package differs from its loaded copy.
    pub fn has_changes(&self) -> bool {
        self.originals
            .iter()
            .any(|(id, original)| self.packages.get(id) != Some(original))
    }

    /// Drain the modified packages for persistence.
    pub fn into_touched(self) -> Vec<Package> {
        let Self {
            mut packages,
            originals,
            ..
        } = self;
        originals
            .into_iter()
            .filter_map(|(id, original)| {
                packages
                    .remove(&id)
                    .filter(|package| *package != original)
            })
            .collect()
    }
}
