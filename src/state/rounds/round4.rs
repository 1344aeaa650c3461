//! Round4 turn engine: tiered question draws, one-shot star power and the
//! steal window.

use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::state::{
    clock::Millis,
    error::{GameError, GameResult},
    event::{EventLedger, RoundKind, TeamStatus},
};

use super::{RoundCtx, Verdict};

/// Point tier chosen for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Lowest point pattern.
    Low,
    /// Middle point pattern.
    Mid,
    /// Highest point pattern.
    High,
}

/// Phases of the Round4 state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Round4Phase {
    /// Waiting for the operator to pick the next team.
    #[default]
    Idle,
    /// Team picked; waiting for a tier.
    TeamSelected,
    /// The team decides whether to spend its star on this question.
    StarDecision,
    /// Question drawn; waiting for the timer.
    QuestionReady,
    /// The team is answering.
    QuestionActive,
    /// The question timer ran out.
    TimeUp,
    /// Other teams may claim the question.
    StealOpen,
    /// A team claimed the question.
    StealLocked,
    /// The steal window elapsed unclaimed.
    StealClosed,
    /// The round is over.
    Ended,
}

impl Round4Phase {
    /// Machine readable phase name.
    pub fn name(&self) -> &'static str {
        match self {
            Round4Phase::Idle => "round4_idle",
            Round4Phase::TeamSelected => "round4_team_selected",
            Round4Phase::StarDecision => "round4_star_decision",
            Round4Phase::QuestionReady => "round4_question_ready",
            Round4Phase::QuestionActive => "round4_question_active",
            Round4Phase::TimeUp => "round4_time_up",
            Round4Phase::StealOpen => "round4_steal_open",
            Round4Phase::StealLocked => "round4_steal_locked",
            Round4Phase::StealClosed => "round4_steal_closed",
            Round4Phase::Ended => "round4_ended",
        }
    }
}

/// A question drawn for the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawnQuestion {
    /// Question identifier.
    pub question_id: Uuid,
    /// Base point value.
    pub points: i32,
}

/// Where a team spent its star power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarUsage {
    /// Question the star was spent on.
    pub question_id: Uuid,
    /// Position of that question inside the turn.
    pub position: usize,
}

/// One steal claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StealBuzz {
    /// Claiming team.
    pub team_id: Uuid,
    /// Server receive time.
    pub at_ms: Millis,
}

/// Steal window after a wrong main answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StealWindow {
    /// Whether claims are accepted.
    pub active: bool,
    /// End of the window.
    pub ends_at_ms: Option<Millis>,
    /// Team that claimed the question.
    pub locked_team: Option<Uuid>,
    /// Claims received.
    pub queue: Vec<StealBuzz>,
}

/// Round4 sub-state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Round4State {
    /// Current phase.
    pub phase: Round4Phase,
    /// Number of completed turns.
    pub turn_index: usize,
    /// Team playing the turn.
    pub current_team: Option<Uuid>,
    /// Tier of the current turn.
    pub tier: Option<Tier>,
    /// Questions of the current turn.
    pub drawn: Vec<DrawnQuestion>,
    /// Position of the current question in [`Self::drawn`].
    pub question_pos: usize,
    /// Steal window.
    pub steal: StealWindow,
}

impl Round4State {
    /// Question currently in play.
    pub fn current_question(&self) -> Option<&DrawnQuestion> {
        self.drawn.get(self.question_pos)
    }

    /// Whether the current team spent its star on the current question.
    pub fn star_active(&self, ledger: &EventLedger) -> bool {
        let (Some(team_id), Some(question)) = (self.current_team, self.current_question()) else {
            return false;
        };
        ledger
            .star_usage
            .get(&team_id)
            .is_some_and(|usage| usage.question_id == question.question_id)
    }
}

type Ctx<'a, 'b> = &'a mut RoundCtx<'b, Round4State>;

pub(crate) fn select_team(ctx: Ctx<'_, '_>, team_id: Uuid) -> GameResult<()> {
    if !matches!(
        ctx.state.phase,
        Round4Phase::Idle | Round4Phase::TeamSelected
    ) {
        return Err(GameError::precondition(
            "a team can only be selected between turns",
        ));
    }
    ctx.team(team_id)?;
    if ctx.ledger.round4_finished.contains(&team_id) {
        return Err(GameError::precondition(format!(
            "team `{team_id}` already played its turn"
        )));
    }
    if let Some(previous) = ctx.state.current_team.filter(|id| *id != team_id) {
        ctx.set_status(previous, TeamStatus::Waiting);
    }
    ctx.set_status(team_id, TeamStatus::Active);
    ctx.state.current_team = Some(team_id);
    ctx.state.phase = Round4Phase::TeamSelected;
    Ok(())
}

pub(crate) fn select_tier<R: Rng + ?Sized>(
    ctx: Ctx<'_, '_>,
    tier: Tier,
    rng: &mut R,
) -> GameResult<()> {
    if ctx.state.phase != Round4Phase::TeamSelected {
        return Err(GameError::precondition("select a team before the tier"));
    }
    let pattern = ctx.rules.tier_pattern(tier);
    let bank = ctx.content.questions_of_round(RoundKind::Round4);
    let mut drawn: Vec<DrawnQuestion> = Vec::with_capacity(pattern.len());
    for points in pattern {
        let mut candidates: Vec<Uuid> = bank
            .iter()
            .filter(|question| question.points == Some(points))
            .map(|question| question.id)
            .filter(|id| {
                !ctx.ledger
                    .round4_draws
                    .get(&points)
                    .is_some_and(|used| used.contains(id))
                    && drawn.iter().all(|question| question.question_id != *id)
            })
            .collect();
        candidates.shuffle(&mut *rng);
        let question_id = candidates.first().copied().ok_or_else(|| {
            GameError::precondition(format!("no unused question worth {points} points"))
        })?;
        drawn.push(DrawnQuestion {
            question_id,
            points,
        });
    }

    for question in &drawn {
        ctx.ledger
            .round4_draws
            .entry(question.points)
            .or_default()
            .insert(question.question_id);
    }
    ctx.state.tier = Some(tier);
    ctx.state.drawn = drawn;
    ctx.state.question_pos = 0;
    prepare_question(ctx);
    info!(?tier, "round 4 questions drawn");
    Ok(())
}

pub(crate) fn confirm_star(ctx: Ctx<'_, '_>, team_id: Uuid, use_star: bool) -> GameResult<()> {
    if ctx.state.phase != Round4Phase::StarDecision {
        return Err(GameError::precondition("star power cannot be decided now"));
    }
    if ctx.state.current_team != Some(team_id) {
        return Err(GameError::precondition(format!(
            "team `{team_id}` does not hold the turn"
        )));
    }
    if use_star {
        if ctx.ledger.star_usage.contains_key(&team_id) {
            return Err(GameError::precondition("star power was already used"));
        }
        let position = ctx.state.question_pos;
        let question_id = ctx
            .state
            .current_question()
            .map(|question| question.question_id)
            .ok_or_else(|| GameError::precondition("no question drawn"))?;
        ctx.ledger.star_usage.insert(
            team_id,
            StarUsage {
                question_id,
                position,
            },
        );
        info!(%team_id, position, "star power spent");
    }
    ctx.state.phase = Round4Phase::QuestionReady;
    Ok(())
}

pub(crate) fn start_question(ctx: Ctx<'_, '_>) -> GameResult<()> {
    if ctx.state.phase != Round4Phase::QuestionReady {
        return Err(GameError::precondition("no question is ready"));
    }
    let points = ctx
        .state
        .current_question()
        .map(|question| question.points)
        .ok_or_else(|| GameError::precondition("no question drawn"))?;
    let duration = ctx.rules.round4_question_ms(points);
    ctx.start_timer(duration)?;
    ctx.state.phase = Round4Phase::QuestionActive;
    Ok(())
}

pub(crate) fn judge(ctx: Ctx<'_, '_>, verdict: Verdict) -> GameResult<()> {
    match ctx.state.phase {
        Round4Phase::QuestionActive | Round4Phase::TimeUp => judge_main(ctx, verdict),
        Round4Phase::StealLocked => judge_steal(ctx, verdict),
        _ => Err(GameError::precondition("nothing to judge in round 4")),
    }
}

fn judge_main(ctx: Ctx<'_, '_>, verdict: Verdict) -> GameResult<()> {
    let team_id = ctx
        .state
        .current_team
        .ok_or_else(|| GameError::precondition("no team holds the turn"))?;
    let points = ctx
        .state
        .current_question()
        .map(|question| question.points)
        .ok_or_else(|| GameError::precondition("no question drawn"))?;
    let star = ctx.state.star_active(ctx.ledger);
    ctx.clear_timer();
    if verdict.is_correct() {
        let gain = if star { points * 2 } else { points };
        ctx.award(team_id, gain)?;
        return next_question(ctx);
    }
    if star {
        ctx.award(team_id, -points)?;
    }
    let window = ctx.rules.steal_window_ms;
    ctx.start_timer(window)?;
    ctx.state.steal = StealWindow {
        active: true,
        ends_at_ms: Some(ctx.now_ms + window),
        locked_team: None,
        queue: Vec::new(),
    };
    ctx.state.phase = Round4Phase::StealOpen;
    info!(%team_id, points, star, "steal window opened");
    Ok(())
}

fn judge_steal(ctx: Ctx<'_, '_>, verdict: Verdict) -> GameResult<()> {
    let stealer = ctx
        .state
        .steal
        .locked_team
        .ok_or_else(|| GameError::precondition("nobody claimed the steal"))?;
    let points = ctx
        .state
        .current_question()
        .map(|question| question.points)
        .ok_or_else(|| GameError::precondition("no question drawn"))?;
    let delta = if verdict.is_correct() {
        points
    } else {
        -ctx.rules.steal_penalty(points)
    };
    ctx.award(stealer, delta)?;
    next_question(ctx)
}

pub(crate) fn buzz_steal(ctx: Ctx<'_, '_>, team_id: Uuid) -> GameResult<()> {
    ctx.team(team_id)?;
    match ctx.state.phase {
        Round4Phase::StealOpen => {}
        Round4Phase::StealLocked => {
            return Err(GameError::precondition("the steal is already claimed"));
        }
        _ => return Err(GameError::precondition("no steal window is open")),
    }
    if ctx.state.current_team == Some(team_id) {
        return Err(GameError::precondition(
            "the answering team cannot steal its own question",
        ));
    }
    if ctx
        .state
        .steal
        .ends_at_ms
        .is_some_and(|ends_at| ctx.now_ms >= ends_at)
    {
        return Err(GameError::precondition("the steal window is closed"));
    }
    let at_ms = ctx.now_ms;
    let steal = &mut ctx.state.steal;
    steal.queue.push(StealBuzz { team_id, at_ms });
    steal.locked_team = Some(team_id);
    steal.active = false;
    ctx.clear_timer();
    ctx.state.phase = Round4Phase::StealLocked;
    info!(%team_id, "steal claimed");
    Ok(())
}

pub(crate) fn advance(ctx: Ctx<'_, '_>) -> GameResult<()> {
    match ctx.state.phase {
        Round4Phase::StarDecision => {
            ctx.state.phase = Round4Phase::QuestionReady;
            Ok(())
        }
        Round4Phase::StealOpen | Round4Phase::StealClosed => {
            ctx.clear_timer();
            next_question(ctx)
        }
        _ => Err(GameError::precondition("nothing to advance in round 4")),
    }
}

pub(crate) fn reconcile(ctx: Ctx<'_, '_>) -> GameResult<bool> {
    match ctx.state.phase {
        Round4Phase::QuestionActive if ctx.timer_expired() => {
            ctx.clear_timer();
            ctx.state.phase = Round4Phase::TimeUp;
            Ok(true)
        }
        Round4Phase::StealOpen
            if ctx
                .state
                .steal
                .ends_at_ms
                .is_some_and(|ends_at| ctx.now_ms >= ends_at) =>
        {
            ctx.clear_timer();
            ctx.state.steal.active = false;
            ctx.state.phase = Round4Phase::StealClosed;
            Ok(true)
        }
        _ => Ok(false),
    }
}

pub(crate) fn end(ctx: Ctx<'_, '_>) -> GameResult<()> {
    ctx.clear_timer();
    ctx.state.steal = StealWindow::default();
    ctx.state.phase = Round4Phase::Ended;
    Ok(())
}

fn prepare_question(ctx: Ctx<'_, '_>) {
    let star_spent = ctx
        .state
        .current_team
        .is_some_and(|team_id| ctx.ledger.star_usage.contains_key(&team_id));
    ctx.state.phase = if star_spent {
        Round4Phase::QuestionReady
    } else {
        Round4Phase::StarDecision
    };
}

fn next_question(ctx: Ctx<'_, '_>) -> GameResult<()> {
    ctx.state.steal = StealWindow::default();
    ctx.state.question_pos += 1;
    if ctx.state.question_pos < ctx.state.drawn.len() {
        prepare_question(ctx);
        return Ok(());
    }

    let team_id = ctx
        .state
        .current_team
        .take()
        .ok_or_else(|| GameError::precondition("no team holds the turn"))?;
    ctx.set_status(team_id, TeamStatus::Finished);
    ctx.ledger.round4_finished.insert(team_id);
    ctx.state.turn_index += 1;
    ctx.state.drawn.clear();
    ctx.state.question_pos = 0;
    ctx.state.tier = None;
    let everyone_played = ctx
        .teams
        .keys()
        .all(|id| ctx.ledger.round4_finished.contains(id));
    ctx.state.phase = if everyone_played {
        Round4Phase::Ended
    } else {
        Round4Phase::Idle
    };
    info!(%team_id, turn_index = ctx.state.turn_index, "round 4 turn finished");
    Ok(())
}
