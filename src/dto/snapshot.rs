//! Projections of the event state sent to displays, operators and teams.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::format_millis,
    state::{
        StateSnapshot,
        clock::Millis,
        content::{JudgedOutcome, Package, PackageStatus, Question},
        event::{EventLedger, RoundState, TeamScore, TeamStatus},
        rounds::round3::Round3Phase,
    },
};

/// Who a snapshot is rendered for. Answers are only shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Scoreboards and team devices.
    Public,
    /// Quiz master console.
    Operator,
}

/// Round sub-state with answer text removed wherever a rival team could
/// still copy it: every unjudged submission, and Round3 verdicts of the
/// question on screen until its results are shown.
fn public_round_state(round: &RoundState) -> RoundState {
    let mut round = round.clone();
    match &mut round {
        RoundState::Round2(state) => {
            for answer in &mut state.pending {
                answer.text.clear();
            }
        }
        RoundState::Round3(state) => {
            for answer in &mut state.pending {
                answer.text.clear();
            }
            let open = matches!(
                state.phase,
                Round3Phase::QuestionActive | Round3Phase::Judging
            );
            if let (true, Some(index)) = (open, state.question_index) {
                state
                    .results
                    .iter_mut()
                    .filter(|results| results.question_index == index)
                    .flat_map(|results| results.answers.iter_mut())
                    .for_each(|answer| answer.text.clear());
            }
        }
        RoundState::Lobby | RoundState::Round1(_) | RoundState::Round4(_) => {}
    }
    round
}

/// Full view of the event.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventSnapshot {
    /// Document revision; 0 before anything was committed.
    pub revision: u64,
    /// Active round number (1 to 4), absent in the lobby.
    pub round: Option<u8>,
    /// Phase of the active round, e.g. `round3_question_active`.
    pub phase: String,
    /// Teams in display order.
    pub teams: Vec<TeamSummary>,
    /// Running or last question timer.
    pub timer: Option<TimerSummary>,
    /// Team holding the turn.
    pub active_team: Option<Uuid>,
    /// Package being played.
    pub active_package: Option<Uuid>,
    /// Question on screen.
    pub current_question: Option<QuestionSummary>,
    /// Play progress of every package.
    pub packages: Vec<PackageSummary>,
    /// Round specific detail (queues, pieces, rankings, steal window).
    #[schema(value_type = Object)]
    pub round_state: RoundState,
    /// Last mutation instant.
    pub updated_at: String,
}

/// Score line of a team.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamSummary {
    /// Team identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Running total.
    pub score: i32,
    /// Turn status in the active round.
    #[schema(value_type = String)]
    pub status: TeamStatus,
    /// Round4 star power already spent.
    pub star_used: bool,
}

/// Question deadline.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimerSummary {
    /// Epoch milliseconds at which the question closes.
    pub ends_at_ms: Millis,
    /// False while the clock is paused.
    pub running: bool,
    /// Milliseconds left when the snapshot was rendered.
    pub remaining_ms: Millis,
}

/// Question shown on screen.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionSummary {
    /// Question identifier.
    pub id: Uuid,
    /// Package holding the question.
    pub package_id: Uuid,
    /// Position within the package.
    pub index: usize,
    /// Text read to the teams.
    pub prompt: String,
    /// Point value, set on Round4 questions only.
    pub points: Option<i32>,
    /// Expected answer, operator view only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

/// Play progress of a package.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PackageSummary {
    /// Package identifier.
    pub id: Uuid,
    /// Round number, 1 to 4.
    pub round: u8,
    /// Position within its round, starting at 1.
    pub number: u32,
    /// Whether the package is unassigned, in play or done.
    #[schema(value_type = String)]
    pub status: PackageStatus,
    /// Team playing or having played it.
    pub assigned_team: Option<Uuid>,
    /// Next question to serve.
    pub question_index: usize,
    /// Verdict of every question already served.
    #[schema(value_type = Vec<Object>)]
    pub history: Vec<JudgedOutcome>,
    /// Round2 picture puzzle.
    pub puzzle: Option<PuzzleSummary>,
}

/// Round2 puzzle as displayed.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PuzzleSummary {
    /// Letters in the hidden keyword.
    pub letter_count: usize,
    /// Picture revealed piece by piece.
    pub image_url: String,
    /// Pieces uncovered so far, in reveal order.
    pub pieces: Vec<String>,
    /// Hidden keyword, operator view only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
}

impl TeamSummary {
    fn render(team: &TeamScore, ledger: &EventLedger) -> Self {
        Self {
            id: team.team_id,
            name: team.name.clone(),
            score: team.score,
            status: team.status,
            star_used: ledger.star_usage.contains_key(&team.team_id),
        }
    }
}

impl QuestionSummary {
    fn render(question: &Question, audience: Audience) -> Self {
        Self {
            id: question.id,
            package_id: question.package_id,
            index: question.index,
            prompt: question.prompt.clone(),
            points: question.points,
            answer: (audience == Audience::Operator).then(|| question.answer.clone()),
        }
    }
}

impl PackageSummary {
    fn render(package: &Package, audience: Audience) -> Self {
        Self {
            id: package.id,
            round: package.round.number(),
            number: package.number,
            status: package.status,
            assigned_team: package.assigned_team,
            question_index: package.question_index,
            history: package.history.clone(),
            puzzle: package.puzzle.as_ref().map(|puzzle| PuzzleSummary {
                letter_count: puzzle.letter_count,
                image_url: puzzle.image_url.clone(),
                pieces: puzzle.pieces.clone(),
                keyword: (audience == Audience::Operator).then(|| puzzle.target_answer.clone()),
            }),
        }
    }
}

impl EventSnapshot {
    /// Render `snapshot` for `audience` as seen at `now_ms`.
    pub fn render(snapshot: &StateSnapshot, audience: Audience, now_ms: Millis) -> Self {
        let event = &snapshot.event;
        Self {
            revision: snapshot.revision,
            round: event.round.kind().map(|kind| kind.number()),
            phase: event.round.phase_name().to_owned(),
            teams: event
                .teams
                .values()
                .map(|team| TeamSummary::render(team, &event.ledger))
                .collect(),
            timer: event.timer.map(|timer| TimerSummary {
                ends_at_ms: timer.ends_at_ms,
                running: timer.running,
                remaining_ms: if timer.running {
                    timer.ends_at_ms.saturating_sub(now_ms)
                } else {
                    0
                },
            }),
            active_team: event.active_team(),
            active_package: event.active_package(),
            current_question: snapshot
                .current_question
                .as_ref()
                .map(|question| QuestionSummary::render(question, audience)),
            packages: snapshot
                .packages
                .iter()
                .map(|package| PackageSummary::render(package, audience))
                .collect(),
            round_state: match audience {
                Audience::Operator => event.round.clone(),
                Audience::Public => public_round_state(&event.round),
            },
            updated_at: format_millis(event.updated_at_ms),
        }
    }
}
