//! The singleton Event State document shared by every connected client.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::{
    clock::Millis,
    content::TeamProfile,
    error::{GameError, GameResult},
    rounds::{
        round1::Round1State,
        round2::Round2State,
        round3::Round3State,
        round4::{Round4State, StarUsage},
    },
};

/// The four round formats of the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundKind {
    /// Single team, sequential package.
    Round1,
    /// Horizontal questions hiding a keyword puzzle.
    Round2,
    /// Parallel timed submissions ranked by speed.
    Round3,
    /// Point tiers, star power and steals.
    Round4,
}

impl RoundKind {
    /// Every round in play order.
    pub const ALL: [RoundKind; 4] = [
        RoundKind::Round1,
        RoundKind::Round2,
        RoundKind::Round3,
        RoundKind::Round4,
    ];

    /// Human facing round number.
    pub fn number(self) -> u8 {
        match self {
            RoundKind::Round1 => 1,
            RoundKind::Round2 => 2,
            RoundKind::Round3 => 3,
            RoundKind::Round4 => 4,
        }
    }
}

impl TryFrom<u8> for RoundKind {
    type Error = GameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(RoundKind::Round1),
            2 => Ok(RoundKind::Round2),
            3 => Ok(RoundKind::Round3),
            4 => Ok(RoundKind::Round4),
            other => Err(GameError::validation(format!(
                "round must be between 1 and 4, got {other}"
            ))),
        }
    }
}

/// Participation status of a team in the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TeamStatus {
    /// Not playing right now.
    #[default]
    Waiting,
    /// Currently holding the turn.
    Active,
    /// Done for this round.
    Finished,
}

/// Score line of one team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamScore {
    /// Team identifier.
    pub team_id: Uuid,
    /// Display name captured when the event was created.
    pub name: String,
    /// Cumulative score across all rounds.
    pub score: i32,
    /// Round status.
    pub status: TeamStatus,
}

/// Advisory wall-clock deadline of the active question (or package in Round1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionTimer {
    /// Deadline in epoch milliseconds.
    pub ends_at_ms: Millis,
    /// Whether the deadline is still being enforced.
    pub running: bool,
}

impl QuestionTimer {
    /// Start a timer ending `duration_ms` after `now_ms`.
    pub fn start(now_ms: Millis, duration_ms: Millis) -> GameResult<Self> {
        if duration_ms == 0 {
            return Err(GameError::precondition(
                "timer duration must be greater than zero",
            ));
        }
        Ok(Self {
            ends_at_ms: now_ms + duration_ms,
            running: true,
        })
    }

    /// True once the deadline passed while the timer was running.
    pub fn expired(&self, now_ms: Millis) -> bool {
        self.running && now_ms >= self.ends_at_ms
    }
}

/// Round-scoped state. Only the active round carries sub-state, so fields of
/// one round can never leak into another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoundState {
    /// No round started yet.
    #[default]
    Lobby,
    /// Round1 sequencer state.
    Round1(Round1State),
    /// Round2 orchestrator state.
    Round2(Round2State),
    /// Round3 concurrent judge state.
    Round3(Round3State),
    /// Round4 turn engine state.
    Round4(Round4State),
}

impl RoundState {
    /// Fresh sub-state for `round`.
    pub fn fresh(round: RoundKind) -> Self {
        match round {
            RoundKind::Round1 => RoundState::Round1(Round1State::default()),
            RoundKind::Round2 => RoundState::Round2(Round2State::default()),
            RoundKind::Round3 => RoundState::Round3(Round3State::default()),
            RoundKind::Round4 => RoundState::Round4(Round4State::default()),
        }
    }

    /// Which round is active, if any.
    pub fn kind(&self) -> Option<RoundKind> {
        match self {
            RoundState::Lobby => None,
            RoundState::Round1(_) => Some(RoundKind::Round1),
            RoundState::Round2(_) => Some(RoundKind::Round2),
            RoundState::Round3(_) => Some(RoundKind::Round3),
            RoundState::Round4(_) => Some(RoundKind::Round4),
        }
    }

    /// Machine readable name of the current phase.
    pub fn phase_name(&self) -> &'static str {
        match self {
            RoundState::Lobby => "lobby",
            RoundState::Round1(state) => state.phase.name(),
            RoundState::Round2(state) => state.phase.name(),
            RoundState::Round3(state) => state.phase.name(),
            RoundState::Round4(state) => state.phase.name(),
        }
    }
}

/// Records that outlive a round's sub-state. Leaving a round and starting it
/// again keeps them; only `reset_round` and `reset_game` clear them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EventLedger {
    /// Teams that completed their Round1 package.
    pub round1_finished: BTreeSet<Uuid>,
    /// Teams that played their Round4 turn.
    pub round4_finished: BTreeSet<Uuid>,
    /// Star power spent per team. An entry is never removed during play.
    pub star_usage: BTreeMap<Uuid, StarUsage>,
    /// Round4 questions drawn so far, by point value.
    pub round4_draws: BTreeMap<i32, BTreeSet<Uuid>>,
}

impl EventLedger {
    /// Teams done with `round`, for rounds that track it.
    pub fn finished(&self, round: RoundKind) -> Option<&BTreeSet<Uuid>> {
        match round {
            RoundKind::Round1 => Some(&self.round1_finished),
            RoundKind::Round4 => Some(&self.round4_finished),
            RoundKind::Round2 | RoundKind::Round3 => None,
        }
    }

    /// Drop everything recorded for `round`.
    pub fn forget(&mut self, round: RoundKind) {
        match round {
            RoundKind::Round1 => self.round1_finished.clear(),
            RoundKind::Round4 => {
                self.round4_finished.clear();
                self.star_usage.clear();
                self.round4_draws.clear();
            }
            RoundKind::Round2 | RoundKind::Round3 => {}
        }
    }
}

/// Authoritative state of the live event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventState {
    /// Ordered team scores.
    pub teams: IndexMap<Uuid, TeamScore>,
    /// Active round and its phase.
    pub round: RoundState,
    /// Question timer of the active round.
    pub timer: Option<QuestionTimer>,
    /// Event-wide play records.
    #[serde(default)]
    pub ledger: EventLedger,
    /// Creation instant.
    pub created_at_ms: Millis,
    /// Last mutation instant.
    pub updated_at_ms: Millis,
}

impl EventState {
    /// Build a fresh event from the registered team roster.
    pub fn new(roster: &[TeamProfile], now_ms: Millis) -> Self {
        let teams = roster
            .iter()
            .map(|team| {
                (
                    team.id,
                    TeamScore {
                        team_id: team.id,
                        name: team.name.clone(),
                        score: 0,
                        status: TeamStatus::Waiting,
                    },
                )
            })
            .collect();
        Self {
            teams,
            round: RoundState::Lobby,
            timer: None,
            ledger: EventLedger::default(),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    /// Score line of a team.
    pub fn team(&self, team_id: Uuid) -> GameResult<&TeamScore> {
        self.teams
            .get(&team_id)
            .ok_or_else(|| GameError::not_found(format!("team `{team_id}` not found")))
    }

    /// Mutable score line of a team.
    pub fn team_mut(&mut self, team_id: Uuid) -> GameResult<&mut TeamScore> {
        self.teams
            .get_mut(&team_id)
            .ok_or_else(|| GameError::not_found(format!("team `{team_id}` not found")))
    }

    /// Add `delta` (possibly negative) to a team score.
    pub fn award(&mut self, team_id: Uuid, delta: i32) -> GameResult<i32> {
        let team = self.team_mut(team_id)?;
        team.score += delta;
        Ok(team.score)
    }

    /// Put every team back to waiting, except teams the ledger records as
    /// done with `round`.
    pub fn reset_statuses(&mut self, round: RoundKind) {
        let finished = self.ledger.finished(round);
        for team in self.teams.values_mut() {
            team.status = if finished.is_some_and(|done| done.contains(&team.team_id)) {
                TeamStatus::Finished
            } else {
                TeamStatus::Waiting
            };
        }
    }

    /// Stop and clear the question timer.
    pub fn clear_timer(&mut self) {
        self.timer = None;
    }

    /// Whether a question timer is currently enforced.
    pub fn timer_running(&self) -> bool {
        self.timer.is_some_and(|timer| timer.running)
    }

    /// Team holding the turn in the active round.
    pub fn active_team(&self) -> Option<Uuid> {
        match &self.round {
            RoundState::Lobby | RoundState::Round3(_) => None,
            RoundState::Round1(state) => state.active_team,
            RoundState::Round2(state) => state.current_team,
            RoundState::Round4(state) => state.current_team,
        }
    }

    /// Package being played in the active round.
    pub fn active_package(&self) -> Option<Uuid> {
        match &self.round {
            RoundState::Lobby | RoundState::Round4(_) => None,
            RoundState::Round1(state) => state.active_package,
            RoundState::Round2(state) => state.package_id,
            RoundState::Round3(state) => state.package_id,
        }
    }

    /// Question currently on screen.
    pub fn current_question(&self) -> Option<Uuid> {
        match &self.round {
            RoundState::Lobby => None,
            RoundState::Round1(state) => state.current_question,
            RoundState::Round2(state) => state.current_question.map(|q| q.question_id),
            RoundState::Round3(state) => state.current_question,
            RoundState::Round4(state) => state.current_question().map(|q| q.question_id),
        }
    }

    /// Round1 sub-state, or a precondition error when another round is active.
    pub fn round1_mut(&mut self) -> GameResult<&mut Round1State> {
        match &mut self.round {
            RoundState::Round1(state) => Ok(state),
            _ => Err(not_in_round(RoundKind::Round1)),
        }
    }

    /// Round2 sub-state, or a precondition error when another round is active.
    pub fn round2_mut(&mut self) -> GameResult<&mut Round2State> {
        match &mut self.round {
            RoundState::Round2(state) => Ok(state),
            _ => Err(not_in_round(RoundKind::Round2)),
        }
    }

    /// Round3 sub-state, or a precondition error when another round is active.
    pub fn round3_mut(&mut self) -> GameResult<&mut Round3State> {
        match &mut self.round {
            RoundState::Round3(state) => Ok(state),
            _ => Err(not_in_round(RoundKind::Round3)),
        }
    }

    /// Round4 sub-state, or a precondition error when another round is active.
    pub fn round4_mut(&mut self) -> GameResult<&mut Round4State> {
        match &mut self.round {
            RoundState::Round4(state) => Ok(state),
            _ => Err(not_in_round(RoundKind::Round4)),
        }
    }
}

fn not_in_round(expected: RoundKind) -> GameError {
    GameError::precondition(format!(
        "operation requires round {} to be active",
        expected.number()
    ))
}
