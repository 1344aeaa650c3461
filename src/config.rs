//! Application-level configuration loading, including the scoring rules and timer durations.

use std::{collections::BTreeMap, env, fs, io::ErrorKind, path::PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::state::{clock::Millis, rounds::round4::Tier};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SUMMIT_QUIZ_CONFIG_PATH";
/// Default location of the seed content file.
const DEFAULT_CONTENT_PATH: &str = "config/content.json";
/// Environment variable that overrides [`DEFAULT_CONTENT_PATH`].
const CONTENT_PATH_ENV: &str = "SUMMIT_QUIZ_CONTENT_PATH";
/// Round4 question duration used when a point value has no configured entry.
const FALLBACK_ROUND4_QUESTION_MS: Millis = 15_000;

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Scoring tables and durations used by the round engines.
    pub rules: GameRules,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the built-in rules.
    pub fn load() -> Self {
        let path = resolve_path(CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH);
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        vault_entries = app_config.rules.vault_scores.len(),
                        rank_entries = app_config.rules.round3_rank_scores.len(),
                        "loaded game rules from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    rules: GameRules,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            rules: value.rules.sanitized(),
        }
    }
}

/// Three point values making up a Round4 tier.
pub type TierPattern = [i32; 3];

/// Point patterns of the three Round4 tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPatterns {
    /// Low tier.
    pub low: TierPattern,
    /// Mid tier.
    pub mid: TierPattern,
    /// High tier.
    pub high: TierPattern,
}

impl Default for TierPatterns {
    fn default() -> Self {
        Self {
            low: [10, 10, 20],
            mid: [10, 20, 30],
            high: [20, 30, 30],
        }
    }
}

/// Scoring tables and timer durations.
///
/// The clue tables are indexed by the number of clues already opened; the
/// last entry is reused once the table runs out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
    /// Points for a correct Round1 answer.
    pub round1_correct_points: i32,
    /// Points for a correct Round2 horizontal answer.
    pub round2_horizontal_points: i32,
    /// Vault guess reward by opened clue count.
    pub vault_scores: Vec<i32>,
    /// Keyword guess reward by opened clue count.
    pub keyword_scores: Vec<i32>,
    /// Round3 reward by rank, rank 1 first. Ranks past the table score 0.
    pub round3_rank_scores: Vec<i32>,
    /// Round4 tier point patterns.
    pub tiers: TierPatterns,
    /// Share of the base value deducted on a wrong steal, in percent.
    pub steal_wrong_penalty_percent: i32,
    /// Round1 package-wide timer.
    pub round1_package_ms: Millis,
    /// Round2 horizontal question timer.
    pub round2_question_ms: Millis,
    /// Round3 question timer.
    pub round3_question_ms: Millis,
    /// Round4 question timer by point value.
    pub round4_question_ms: BTreeMap<i32, Millis>,
    /// Round4 steal window duration.
    pub steal_window_ms: Millis,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            round1_correct_points: 10,
            round2_horizontal_points: 10,
            vault_scores: vec![80, 60, 50, 40, 30],
            keyword_scores: vec![80, 60, 50, 40, 30],
            round3_rank_scores: vec![40, 30, 20, 10],
            tiers: TierPatterns::default(),
            steal_wrong_penalty_percent: 50,
            round1_package_ms: 60_000,
            round2_question_ms: 15_000,
            round3_question_ms: 30_000,
            round4_question_ms: BTreeMap::from([(10, 10_000), (20, 15_000), (30, 20_000)]),
            steal_window_ms: 5_000,
        }
    }
}

impl GameRules {
    /// Replace zero durations and empty tables with the built-in defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.vault_scores.is_empty() {
            self.vault_scores = defaults.vault_scores;
        }
        if self.keyword_scores.is_empty() {
            self.keyword_scores = defaults.keyword_scores;
        }
        if self.round3_rank_scores.is_empty() {
            self.round3_rank_scores = defaults.round3_rank_scores;
        }
        for (value, default) in [
            (&mut self.round1_package_ms, defaults.round1_package_ms),
            (&mut self.round2_question_ms, defaults.round2_question_ms),
            (&mut self.round3_question_ms, defaults.round3_question_ms),
            (&mut self.steal_window_ms, defaults.steal_window_ms),
        ] {
            if *value == 0 {
                *value = default;
            }
        }
        self.round4_question_ms.retain(|_, duration| *duration > 0);
        self
    }

    /// Reward for a correct vault guess after `opened_clues` clues.
    pub fn vault_score(&self, opened_clues: u8) -> i32 {
        clue_score(&self.vault_scores, opened_clues)
    }

    /// Reward for a correct keyword guess after `opened_clues` clues.
    pub fn keyword_score(&self, opened_clues: u8) -> i32 {
        clue_score(&self.keyword_scores, opened_clues)
    }

    /// Reward for the 1-based `rank` among correct Round3 answers.
    pub fn rank_score(&self, rank: usize) -> i32 {
        rank.checked_sub(1)
            .and_then(|index| self.round3_rank_scores.get(index))
            .copied()
            .unwrap_or(0)
    }

    /// Point pattern of a Round4 tier.
    pub fn tier_pattern(&self, tier: Tier) -> TierPattern {
        match tier {
            Tier::Low => self.tiers.low,
            Tier::Mid => self.tiers.mid,
            Tier::High => self.tiers.high,
        }
    }

    /// Timer for a Round4 question worth `points`.
    pub fn round4_question_ms(&self, points: i32) -> Millis {
        self.round4_question_ms
            .get(&points)
            .copied()
            .unwrap_or(FALLBACK_ROUND4_QUESTION_MS)
    }

    /// Deduction for a wrong steal on a question worth `points`.
    pub fn steal_penalty(&self, points: i32) -> i32 {
        points * self.steal_wrong_penalty_percent / 100
    }
}

fn clue_score(table: &[i32], opened_clues: u8) -> i32 {
    table
        .get(usize::from(opened_clues))
        .or_else(|| table.last())
        .copied()
        .unwrap_or(0)
}

/// Path of the seed content file, taking the environment override into account.
pub fn content_path() -> PathBuf {
    resolve_path(CONTENT_PATH_ENV, DEFAULT_CONTENT_PATH)
}

/// Resolve a configuration path taking the environment override into account.
fn resolve_path(env_key: &str, default: &str) -> PathBuf {
    env::var_os(env_key)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(default))
}
