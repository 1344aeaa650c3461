//! Round1 sequencer: one team plays one package, questions served strictly
//! in index order under a package-wide timer.

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::state::{
    content::{JudgedOutcome, Outcome, PackageStatus},
    error::{GameError, GameResult},
    event::{RoundKind, TeamStatus},
};

use super::{RoundCtx, Verdict};

/// Phases of the Round1 state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Round1Phase {
    /// Waiting for the operator to pick a team.
    #[default]
    Idle,
    /// A team is picked; waiting for a package.
    TeamSelected,
    /// Package assigned; waiting for the timer to start.
    PackageReady,
    /// Questions are being served.
    InProgress,
    /// The package is finished.
    Completed,
    /// The round is over.
    Ended,
}

impl Round1Phase {
    /// Machine readable phase name.
    pub fn name(&self) -> &'static str {
        match self {
            Round1Phase::Idle => "round1_idle",
            Round1Phase::TeamSelected => "round1_team_selected",
            Round1Phase::PackageReady => "round1_package_ready",
            Round1Phase::InProgress => "round1_in_progress",
            Round1Phase::Completed => "round1_completed",
            Round1Phase::Ended => "round1_ended",
        }
    }
}

/// Round1 sub-state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Round1State {
    /// Current phase.
    pub phase: Round1Phase,
    /// Team playing.
    pub active_team: Option<Uuid>,
    /// Package being played.
    pub active_package: Option<Uuid>,
    /// Question on screen.
    pub current_question: Option<Uuid>,
}

pub(crate) fn select_team(ctx: &mut RoundCtx<'_, Round1State>, team_id: Uuid) -> GameResult<()> {
    if !matches!(
        ctx.state.phase,
        Round1Phase::Idle | Round1Phase::TeamSelected | Round1Phase::Completed
    ) {
        return Err(GameError::precondition(
            "a team can only be selected between packages",
        ));
    }
    if ctx.team(team_id)?.status == TeamStatus::Finished
        || ctx.ledger.round1_finished.contains(&team_id)
    {
        return Err(GameError::precondition(format!(
            "team `{team_id}` already played its package"
        )));
    }
    if ctx.state.phase == Round1Phase::TeamSelected
        && let Some(previous) = ctx.state.active_team.filter(|id| *id != team_id)
    {
        ctx.set_status(previous, TeamStatus::Waiting);
    }
    ctx.set_status(team_id, TeamStatus::Active);
    ctx.state.active_team = Some(team_id);
    ctx.state.active_package = None;
    ctx.state.current_question = None;
    ctx.state.phase = Round1Phase::TeamSelected;
    Ok(())
}

pub(crate) fn assign_package(
    ctx: &mut RoundCtx<'_, Round1State>,
    package_id: Uuid,
) -> GameResult<()> {
    if ctx.state.phase != Round1Phase::TeamSelected {
        return Err(GameError::precondition("select a team before the package"));
    }
    let team_id = ctx
        .state
        .active_team
        .ok_or_else(|| GameError::precondition("no team selected"))?;
    let package = ctx.content.package(package_id)?;
    if package.round != RoundKind::Round1 {
        return Err(GameError::validation("package does not belong to round 1"));
    }
    if package.status != PackageStatus::Unassigned {
        return Err(GameError::precondition(format!(
            "package {} was already played",
            package.number
        )));
    }
    if ctx.content.questions_of(package_id).is_empty() {
        return Err(GameError::precondition("package has no questions"));
    }

    let package = ctx.content.package_mut(package_id)?;
    package.status = PackageStatus::InProgress;
    package.assigned_team = Some(team_id);
    ctx.state.active_package = Some(package_id);
    ctx.state.phase = Round1Phase::PackageReady;
    Ok(())
}

pub(crate) fn start(ctx: &mut RoundCtx<'_, Round1State>) -> GameResult<()> {
    if ctx.state.phase != Round1Phase::PackageReady {
        return Err(GameError::precondition("no package is ready to start"));
    }
    let package_id = ctx
        .state
        .active_package
        .ok_or_else(|| GameError::precondition("no package assigned"))?;
    let index = ctx.content.package(package_id)?.question_index;
    let question_id = ctx.content.question_at(package_id, index)?.id;
    let duration = ctx.rules.round1_package_ms;
    ctx.start_timer(duration)?;
    ctx.state.current_question = Some(question_id);
    ctx.state.phase = Round1Phase::InProgress;
    info!(%package_id, "round 1 package started");
    Ok(())
}

pub(crate) fn judge(
    ctx: &mut RoundCtx<'_, Round1State>,
    question_id: Option<Uuid>,
    verdict: Verdict,
) -> GameResult<()> {
    let (package_id, index, question_id) = match question_id {
        Some(question_id) => {
            let question = ctx.content.question(question_id)?;
            (question.package_id, question.index, question.id)
        }
        None => {
            let question_id = ctx
                .state
                .current_question
                .ok_or_else(|| GameError::precondition("no active question"))?;
            let question = ctx.content.question(question_id)?;
            (question.package_id, question.index, question.id)
        }
    };
    let package = ctx.content.package(package_id)?;
    if package.round != RoundKind::Round1 {
        return Err(GameError::validation("question does not belong to round 1"));
    }
    let assigned_team = package.assigned_team;
    let outcome = match verdict {
        Verdict::Correct => Outcome::Correct,
        Verdict::Wrong => Outcome::Wrong,
    };

    match package.outcome_at(index).map(|entry| entry.outcome) {
        Some(Outcome::Correct | Outcome::Wrong) => {
            return Err(GameError::precondition("question was already judged"));
        }
        Some(Outcome::Timeout) => {
            let team_id = assigned_team
                .ok_or_else(|| GameError::precondition("package has no assigned team"))?;
            let now_ms = ctx.now_ms;
            let package = ctx.content.package_mut(package_id)?;
            if let Some(entry) = package
                .history
                .iter_mut()
                .find(|entry| entry.question_index == index)
            {
                entry.outcome = outcome;
                entry.judged_at_ms = now_ms;
            }
            if verdict.is_correct() {
                let points = ctx.rules.round1_correct_points;
                ctx.award(team_id, points)?;
            }
            info!(%question_id, ?outcome, "timeout overridden");
            return Ok(());
        }
        None => {}
    }

    if ctx.state.phase != Round1Phase::InProgress
        || ctx.state.active_package != Some(package_id)
        || package.question_index != index
    {
        return Err(GameError::precondition("question is not the current one"));
    }
    let team_id =
        assigned_team.ok_or_else(|| GameError::precondition("package has no assigned team"))?;

    let question_count = ctx.content.questions_of(package_id).len();
    let now_ms = ctx.now_ms;
    let package = ctx.content.package_mut(package_id)?;
    package.history.push(JudgedOutcome {
        question_index: index,
        question_id,
        outcome,
        judged_at_ms: now_ms,
    });
    package.question_index = index + 1;
    if verdict.is_correct() {
        let points = ctx.rules.round1_correct_points;
        ctx.award(team_id, points)?;
    }

    if index + 1 >= question_count {
        complete_package(ctx, package_id, team_id)?;
    } else {
        let next = ctx.content.question_at(package_id, index + 1)?.id;
        ctx.state.current_question = Some(next);
    }
    Ok(())
}

pub(crate) fn advance(ctx: &mut RoundCtx<'_, Round1State>) -> GameResult<()> {
    match ctx.state.phase {
        Round1Phase::Completed => {
            ctx.state.active_team = None;
            ctx.state.active_package = None;
            ctx.state.current_question = None;
            ctx.state.phase = Round1Phase::Idle;
            Ok(())
        }
        _ => Err(GameError::precondition("nothing to advance in round 1")),
    }
}

/// Finalize the package as soon as its timer has elapsed. Idempotent.
pub(crate) fn reconcile(ctx: &mut RoundCtx<'_, Round1State>) -> GameResult<bool> {
    if ctx.state.phase != Round1Phase::InProgress || !ctx.timer_expired() {
        return Ok(false);
    }
    let package_id = ctx
        .state
        .active_package
        .ok_or_else(|| GameError::precondition("no package assigned"))?;
    let remaining: Vec<(usize, Uuid)> = {
        let start = ctx.content.package(package_id)?.question_index;
        ctx.content
            .questions_of(package_id)
            .into_iter()
            .filter(|question| question.index >= start)
            .map(|question| (question.index, question.id))
            .collect()
    };
    let now_ms = ctx.now_ms;
    let package = ctx.content.package_mut(package_id)?;
    for (index, question_id) in &remaining {
        if package.outcome_at(*index).is_none() {
            package.history.push(JudgedOutcome {
                question_index: *index,
                question_id: *question_id,
                outcome: Outcome::Timeout,
                judged_at_ms: now_ms,
            });
        }
    }
    if let Some((last, _)) = remaining.last() {
        package.question_index = last + 1;
    }
    let team_id = package
        .assigned_team
        .ok_or_else(|| GameError::precondition("package has no assigned team"))?;
    complete_package(ctx, package_id, team_id)?;
    info!(%package_id, timeouts = remaining.len(), "round 1 package timed out");
    Ok(true)
}

pub(crate) fn end(ctx: &mut RoundCtx<'_, Round1State>) -> GameResult<()> {
    ctx.clear_timer();
    ctx.state.current_question = None;
    ctx.state.phase = Round1Phase::Ended;
    Ok(())
}

fn complete_package(
    ctx: &mut RoundCtx<'_, Round1State>,
    package_id: Uuid,
    team_id: Uuid,
) -> GameResult<()> {
    ctx.content.package_mut(package_id)?.status = PackageStatus::Completed;
    ctx.set_status(team_id, TeamStatus::Finished);
    ctx.ledger.round1_finished.insert(team_id);
    ctx.clear_timer();
    ctx.state.current_question = None;
    ctx.state.phase = Round1Phase::Completed;
    Ok(())
}
