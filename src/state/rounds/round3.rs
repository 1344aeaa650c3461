//! Round3 concurrent judge.
//!
//! Every team answers the same timed question. The reward of a correct answer
//! depends on its rank among all correct answers to that question, ordered by
//! submission time, then judging time, then server arrival sequence. Each
//! verdict re-ranks the whole question and applies the difference between the
//! new and the previously applied contributions, so the final scores do not
//! depend on the order in which verdicts arrive.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::GameRules,
    state::{
        clock::Millis,
        content::PackageStatus,
        error::{GameError, GameResult},
        event::{RoundKind, TeamScore},
    },
};

use super::{PendingAnswer, RoundCtx, Verdict};

/// Phases of the Round3 state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Round3Phase {
    /// Waiting for the question package.
    #[default]
    Idle,
    /// Package chosen; waiting for the first question.
    Ready,
    /// The question is open for submissions.
    QuestionActive,
    /// Submissions are closed; verdicts outstanding.
    Judging,
    /// Every submission of the question is judged.
    Results,
    /// The round is over.
    Ended,
}

impl Round3Phase {
    /// Machine readable phase name.
    pub fn name(&self) -> &'static str {
        match self {
            Round3Phase::Idle => "round3_idle",
            Round3Phase::Ready => "round3_ready",
            Round3Phase::QuestionActive => "round3_question_active",
            Round3Phase::Judging => "round3_judging",
            Round3Phase::Results => "round3_results",
            Round3Phase::Ended => "round3_ended",
        }
    }
}

/// A judged submission with its computed rank and reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgedAnswer {
    /// Submitting team.
    pub team_id: Uuid,
    /// Submitted text. Omitted from public views while rivals can still answer.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// Server receive time of the submission.
    pub submitted_at_ms: Millis,
    /// When the verdict was recorded.
    pub judged_at_ms: Millis,
    /// Server arrival sequence.
    pub sequence: u64,
    /// Verdict.
    pub correct: bool,
    /// Rank among correct answers, 0 when wrong.
    pub rank: usize,
    /// Points currently contributed to the team score.
    pub score: i32,
}

/// Judged answers of one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResults {
    /// Question index inside the package.
    pub question_index: usize,
    /// Judged answers, ranked correct answers first.
    pub answers: Vec<JudgedAnswer>,
}

/// Round3 sub-state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Round3State {
    /// Current phase.
    pub phase: Round3Phase,
    /// Package in play.
    pub package_id: Option<Uuid>,
    /// Index of the question on screen.
    pub question_index: Option<usize>,
    /// Question on screen.
    pub current_question: Option<Uuid>,
    /// Submissions waiting for a verdict, in arrival order.
    pub pending: Vec<PendingAnswer>,
    /// Judged results per question.
    pub results: Vec<QuestionResults>,
    /// Next arrival sequence number.
    pub next_sequence: u64,
}

impl Round3State {
    /// Judged results of the question at `index`.
    pub fn results_for(&self, index: usize) -> Option<&QuestionResults> {
        self.results
            .iter()
            .find(|results| results.question_index == index)
    }

    fn results_slot(&mut self, index: usize) -> &mut QuestionResults {
        let position = match self
            .results
            .iter()
            .position(|results| results.question_index == index)
        {
            Some(position) => position,
            None => {
                self.results.push(QuestionResults {
                    question_index: index,
                    answers: Vec::new(),
                });
                self.results.len() - 1
            }
        };
        &mut self.results[position]
    }

    fn already_judged(&self, index: usize, team_id: Uuid) -> bool {
        self.results_for(index)
            .is_some_and(|results| results.answers.iter().any(|a| a.team_id == team_id))
    }
}

type Ctx<'a, 'b> = &'a mut RoundCtx<'b, Round3State>;

pub(crate) fn assign_package(ctx: Ctx<'_, '_>, package_id: Uuid) -> GameResult<()> {
    if ctx.state.phase != Round3Phase::Idle {
        return Err(GameError::precondition(
            "the round 3 package is already chosen",
        ));
    }
    let package = ctx.content.package(package_id)?;
    if package.round != RoundKind::Round3 {
        return Err(GameError::validation("package does not belong to round 3"));
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
    ctx.content.package_mut(package_id)?.status = PackageStatus::InProgress;
    ctx.state.package_id = Some(package_id);
    ctx.state.phase = Round3Phase::Ready;
    Ok(())
}

pub(crate) fn start_question(ctx: Ctx<'_, '_>, index: Option<usize>) -> GameResult<()> {
    if !matches!(ctx.state.phase, Round3Phase::Ready | Round3Phase::Results) {
        return Err(GameError::precondition(
            "a question can only start once the previous one is judged",
        ));
    }
    let package_id = ctx
        .state
        .package_id
        .ok_or_else(|| GameError::precondition("no round 3 package assigned"))?;
    let count = ctx.content.questions_of(package_id).len();
    let index = match index {
        Some(index) if index >= count => {
            return Err(GameError::validation(format!(
                "question index must be below {count}"
            )));
        }
        Some(index) => index,
        None => (0..count)
            .find(|index| ctx.state.results_for(*index).is_none())
            .ok_or_else(|| GameError::precondition("every question was played"))?,
    };
    if ctx.state.results_for(index).is_some() {
        return Err(GameError::precondition(format!(
            "question {index} was already played"
        )));
    }
    let question_id = ctx.content.question_at(package_id, index)?.id;
    let duration = ctx.rules.round3_question_ms;
    ctx.start_timer(duration)?;
    ctx.content.package_mut(package_id)?.question_index = index + 1;

    ctx.state.pending.clear();
    ctx.state.results_slot(index);
    ctx.state.question_index = Some(index);
    ctx.state.current_question = Some(question_id);
    ctx.state.phase = Round3Phase::QuestionActive;
    info!(index, "round 3 question opened");
    Ok(())
}

pub(crate) fn submit_answer(ctx: Ctx<'_, '_>, team_id: Uuid, text: String) -> GameResult<()> {
    if ctx.state.phase != Round3Phase::QuestionActive {
        return Err(GameError::precondition("submissions are closed"));
    }
    ctx.team(team_id)?;
    let index = current_index(ctx)?;
    if ctx.state.pending.iter().any(|a| a.team_id == team_id)
        || ctx.state.already_judged(index, team_id)
    {
        return Err(GameError::precondition(format!(
            "team `{team_id}` already answered this question"
        )));
    }
    let sequence = ctx.state.next_sequence;
    ctx.state.next_sequence += 1;
    let submitted_at_ms = ctx.now_ms;
    ctx.state.pending.push(PendingAnswer {
        team_id,
        text,
        submitted_at_ms,
        sequence,
    });
    debug!(%team_id, sequence, "round 3 answer received");
    Ok(())
}

pub(crate) fn judge(ctx: Ctx<'_, '_>, team_id: Option<Uuid>, verdict: Verdict) -> GameResult<()> {
    if !matches!(
        ctx.state.phase,
        Round3Phase::QuestionActive | Round3Phase::Judging
    ) {
        return Err(GameError::precondition("no answer can be judged now"));
    }
    let index = current_index(ctx)?;
    let team_id = match team_id {
        Some(team_id) => team_id,
        None => ctx
            .state
            .pending
            .first()
            .map(|answer| answer.team_id)
            .ok_or_else(|| GameError::precondition("no pending answer"))?,
    };
    if ctx.state.already_judged(index, team_id) {
        return Err(GameError::precondition(format!(
            "team `{team_id}` was already judged for this question"
        )));
    }
    let position = ctx
        .state
        .pending
        .iter()
        .position(|answer| answer.team_id == team_id)
        .ok_or_else(|| {
            GameError::precondition(format!("team `{team_id}` has no pending answer"))
        })?;

    let answer = ctx.state.pending.remove(position);
    let judged = JudgedAnswer {
        team_id: answer.team_id,
        text: answer.text,
        submitted_at_ms: answer.submitted_at_ms,
        judged_at_ms: ctx.now_ms,
        sequence: answer.sequence,
        correct: verdict.is_correct(),
        rank: 0,
        score: 0,
    };
    let slot = ctx.state.results_slot(index);
    let previous = std::mem::take(&mut slot.answers);
    let mut candidates = previous.clone();
    candidates.push(judged);
    slot.answers = recompute(ctx.teams, ctx.rules, &previous, candidates);
    info!(%team_id, index, correct = verdict.is_correct(), "round 3 answer judged");

    if ctx.state.pending.is_empty() && ctx.state.phase == Round3Phase::Judging {
        ctx.state.phase = Round3Phase::Results;
    }
    Ok(())
}

pub(crate) fn advance(ctx: Ctx<'_, '_>) -> GameResult<()> {
    match ctx.state.phase {
        Round3Phase::QuestionActive => {
            close_question(ctx);
            Ok(())
        }
        Round3Phase::Ready | Round3Phase::Results => start_question(ctx, None),
        Round3Phase::Judging => Err(GameError::precondition(
            "judge every pending answer first",
        )),
        Round3Phase::Idle | Round3Phase::Ended => {
            Err(GameError::precondition("nothing to advance in round 3"))
        }
    }
}

pub(crate) fn reconcile(ctx: Ctx<'_, '_>) -> GameResult<bool> {
    if ctx.state.phase == Round3Phase::QuestionActive && ctx.timer_expired() {
        close_question(ctx);
        return Ok(true);
    }
    Ok(false)
}

/// Re-rank every question and settle the score differences. Idempotent.
pub(crate) fn end(ctx: Ctx<'_, '_>) -> GameResult<()> {
    for slot in ctx.state.results.iter_mut() {
        let previous = std::mem::take(&mut slot.answers);
        let candidates = previous.clone();
        slot.answers = recompute(ctx.teams, ctx.rules, &previous, candidates);
    }
    ctx.clear_timer();
    ctx.state.pending.clear();
    ctx.state.current_question = None;
    if let Some(package_id) = ctx.state.package_id {
        ctx.content.package_mut(package_id)?.status = PackageStatus::Completed;
    }
    ctx.state.phase = Round3Phase::Ended;
    Ok(())
}

fn close_question(ctx: Ctx<'_, '_>) {
    ctx.clear_timer();
    ctx.state.phase = if ctx.state.pending.is_empty() {
        Round3Phase::Results
    } else {
        Round3Phase::Judging
    };
}

fn current_index(ctx: &RoundCtx<'_, Round3State>) -> GameResult<usize> {
    ctx.state
        .question_index
        .ok_or_else(|| GameError::precondition("no active question"))
}

/// Rank `candidates`, apply `new - previous` contributions to the team scores
/// and return the ranked list.
fn recompute(
    teams: &mut IndexMap<Uuid, TeamScore>,
    rules: &GameRules,
    previous: &[JudgedAnswer],
    candidates: Vec<JudgedAnswer>,
) -> Vec<JudgedAnswer> {
    let ranked = rank_answers(rules, teams, candidates);

    let mut deltas: BTreeMap<Uuid, i32> = BTreeMap::new();
    for answer in previous {
        *deltas.entry(answer.team_id).or_default() -= answer.score;
    }
    for answer in &ranked {
        *deltas.entry(answer.team_id).or_default() += answer.score;
    }
    for (team_id, delta) in deltas {
        if delta == 0 {
            continue;
        }
        if let Some(team) = teams.get_mut(&team_id) {
            team.score += delta;
            debug!(%team_id, delta, score = team.score, "round 3 contribution adjusted");
        }
    }
    ranked
}

/// Drop entries of unknown or repeated teams, then rank correct answers by
/// (submission time, judging time, sequence).
fn rank_answers(
    rules: &GameRules,
    teams: &IndexMap<Uuid, TeamScore>,
    candidates: Vec<JudgedAnswer>,
) -> Vec<JudgedAnswer> {
    let mut seen = BTreeSet::new();
    let (mut correct, mut wrong): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .filter(|answer| teams.contains_key(&answer.team_id) && seen.insert(answer.team_id))
        .partition(|answer| answer.correct);

    correct.sort_by_key(|answer| (answer.submitted_at_ms, answer.judged_at_ms, answer.sequence));
    for (position, answer) in correct.iter_mut().enumerate() {
        answer.rank = position + 1;
        answer.score = rules.rank_score(answer.rank);
    }
    wrong.sort_by_key(|answer| answer.sequence);
    for answer in wrong.iter_mut() {
        answer.rank = 0;
        answer.score = 0;
    }
    correct.extend(wrong);
    correct
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use uuid::Uuid;

    use crate::{
        config::GameRules,
        state::{
            content::TeamProfile,
            draft::EventDraft,
            error::GameError,
            event::RoundKind,
            rounds::{self, Verdict, test_support::*},
        },
    };

    use super::{Round3Phase, Round3State};

    fn setup(team_count: usize) -> (EventDraft, Vec<TeamProfile>, GameRules) {
        let rules = GameRules::default();
        let teams = roster(team_count);
        let pkg = package(RoundKind::Round3, 1);
        let package_id = pkg.id;
        let qs = questions(&pkg, 3);
        let mut draft = draft(&teams, vec![pkg], qs, 0);
        rounds::start_round(&mut draft, RoundKind::Round3).expect("round");
        rounds::assign_package(&mut draft, &rules, package_id).expect("package");
        rounds::start_question(&mut draft, &rules, None).expect("question");
        (draft, teams, rules)
    }

    fn state(draft: &mut EventDraft) -> &mut Round3State {
        draft.event.round3_mut().expect("round 3")
    }

    fn submit_at(draft: EventDraft, rules: &GameRules, team: Uuid, now_ms: u64) -> EventDraft {
        let mut draft = at(draft, now_ms);
        rounds::submit_answer(&mut draft, rules, team, "answer".into()).expect("submit");
        draft
    }

    fn judge_at(
        draft: EventDraft,
        rules: &GameRules,
        team: Uuid,
        verdict: Verdict,
        now_ms: u64,
    ) -> EventDraft {
        let mut draft = at(draft, now_ms);
        rounds::judge(&mut draft, rules, Some(team), None, verdict).expect("judge");
        draft
    }

    fn score(draft: &EventDraft, team: Uuid) -> i32 {
        draft.event.team(team).expect("team").score
    }

    #[test]
    fn ranking_uses_submission_time_not_judging_time() {
        let (draft, teams, rules) = setup(2);
        let (a, b) = (teams[0].id, teams[1].id);
        let draft = submit_at(draft, &rules, b, 80);
        let draft = submit_at(draft, &rules, a, 100);
        let draft = judge_at(draft, &rules, a, Verdict::Correct, 200);
        assert_eq!(score(&draft, a), rules.rank_score(1));
        let mut draft = judge_at(draft, &rules, b, Verdict::Correct, 300);

        assert_eq!(score(&draft, b), rules.rank_score(1));
        assert_eq!(score(&draft, a), rules.rank_score(2));
        let results = state(&mut draft).results_for(0).expect("results").clone();
        let order: Vec<(Uuid, usize)> = results.answers.iter().map(|x| (x.team_id, x.rank)).collect();
        assert_eq!(order, vec![(b, 1), (a, 2)]);
    }

    #[test]
    fn wrong_answers_score_nothing_and_keep_rank_zero() {
        let (draft, teams, rules) = setup(2);
        let draft = submit_at(draft, &rules, teams[0].id, 10);
        let draft = submit_at(draft, &rules, teams[1].id, 20);
        let draft = judge_at(draft, &rules, teams[0].id, Verdict::Wrong, 30);
        let mut draft = judge_at(draft, &rules, teams[1].id, Verdict::Correct, 40);
        assert_eq!(score(&draft, teams[0].id), 0);
        assert_eq!(score(&draft, teams[1].id), rules.rank_score(1));
        let results = state(&mut draft).results_for(0).expect("results").clone();
        let wrong = results
            .answers
            .iter()
            .find(|answer| answer.team_id == teams[0].id)
            .expect("wrong answer");
        assert_eq!((wrong.rank, wrong.score), (0, 0));
    }

    #[test]
    fn a_team_is_judged_once_per_question() {
        let (draft, teams, rules) = setup(1);
        let draft = submit_at(draft, &rules, teams[0].id, 10);
        let mut draft = judge_at(draft, &rules, teams[0].id, Verdict::Correct, 20);
        let err = rounds::judge(&mut draft, &rules, Some(teams[0].id), None, Verdict::Correct)
            .unwrap_err();
        assert!(matches!(err, GameError::Precondition(_)));
        let err =
            rounds::submit_answer(&mut draft, &rules, teams[0].id, "again".into()).unwrap_err();
        assert!(matches!(err, GameError::Precondition(_)));
    }

    #[test]
    fn duplicate_pending_submission_is_rejected() {
        let (draft, teams, rules) = setup(1);
        let mut draft = submit_at(draft, &rules, teams[0].id, 10);
        let err = rounds::submit_answer(&mut draft, &rules, teams[0].id, "x".into()).unwrap_err();
        assert!(matches!(err, GameError::Precondition(_)));
        assert_eq!(state(&mut draft).pending.len(), 1);
    }

    #[test]
    fn phase_moves_to_results_once_the_queue_drains() {
        let (draft, teams, rules) = setup(2);
        let draft = submit_at(draft, &rules, teams[0].id, 10);
        let mut draft = submit_at(draft, &rules, teams[1].id, 20);
        rounds::advance(&mut draft, &rules).expect("close");
        assert_eq!(state(&mut draft).phase, Round3Phase::Judging);
        let draft = judge_at(draft, &rules, teams[0].id, Verdict::Correct, 30);
        let mut draft = judge_at(draft, &rules, teams[1].id, Verdict::Correct, 40);
        assert_eq!(state(&mut draft).phase, Round3Phase::Results);

        rounds::advance(&mut draft, &rules).expect("next question");
        let round = state(&mut draft);
        assert_eq!(round.phase, Round3Phase::QuestionActive);
        assert_eq!(round.question_index, Some(1));
    }

    #[test]
    fn expired_question_closes_submissions() {
        let (draft, teams, rules) = setup(1);
        let draft = submit_at(draft, &rules, teams[0].id, 10);
        let mut draft = at(draft, rules.round3_question_ms);
        assert!(rounds::reconcile(&mut draft, &rules).expect("reconcile"));
        assert_eq!(state(&mut draft).phase, Round3Phase::Judging);
    }

    #[test]
    fn ending_twice_keeps_scores() {
        let (draft, teams, rules) = setup(3);
        let draft = submit_at(draft, &rules, teams[2].id, 5);
        let draft = submit_at(draft, &rules, teams[0].id, 7);
        let draft = judge_at(draft, &rules, teams[0].id, Verdict::Correct, 10);
        let mut draft = judge_at(draft, &rules, teams[2].id, Verdict::Correct, 11);

        rounds::end_round(&mut draft, &rules, RoundKind::Round3).expect("end");
        let first: Vec<i32> = draft.event.teams.values().map(|t| t.score).collect();
        rounds::end_round(&mut draft, &rules, RoundKind::Round3).expect("end again");
        let second: Vec<i32> = draft.event.teams.values().map(|t| t.score).collect();
        assert_eq!(first, second);
        assert_eq!(state(&mut draft).phase, Round3Phase::Ended);
    }

    #[test]
    fn end_round_repairs_skewed_contributions() {
        let (draft, teams, rules) = setup(2);
        let draft = submit_at(draft, &rules, teams[0].id, 5);
        let mut draft = judge_at(draft, &rules, teams[0].id, Verdict::Correct, 6);
        state(&mut draft).results[0].answers[0].score = 0;
        draft.event.teams[0].score = 0;

        rounds::end_round(&mut draft, &rules, RoundKind::Round3).expect("end");
        assert_eq!(score(&draft, teams[0].id), rules.rank_score(1));
    }

    proptest! {
        #[test]
        fn scores_do_not_depend_on_judging_order(
            (verdicts, times, order) in (2usize..6).prop_flat_map(|n| (
                proptest::collection::vec(any::<bool>(), n),
                proptest::collection::vec(0u64..1_000, n),
                Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
            ))
        ) {
            let (mut draft, teams, rules) = setup(verdicts.len());
            for (offset, time) in times.iter().enumerate() {
                draft = submit_at(draft, &rules, teams[offset].id, *time);
            }
            for (step, offset) in order.iter().enumerate() {
                let verdict = if verdicts[*offset] { Verdict::Correct } else { Verdict::Wrong };
                draft = judge_at(draft, &rules, teams[*offset].id, verdict, 2_000 + step as u64);
            }

            let correct = verdicts.iter().filter(|v| **v).count();
            let expected: i32 = (1..=correct).map(|rank| rules.rank_score(rank)).sum();
            let total: i32 = draft.event.teams.values().map(|team| team.score).sum();
            prop_assert_eq!(total, expected);

            let results = state(&mut draft).results_for(0).expect("results").clone();
            for answer in results.answers.iter().filter(|answer| answer.correct) {
                let score = draft.event.team(answer.team_id).expect("team").score;
                prop_assert_eq!(score, answer.score);
            }
            let before: Vec<i32> = draft.event.teams.values().map(|t| t.score).collect();
            rounds::end_round(&mut draft, &rules, RoundKind::Round3).expect("end");
            let after: Vec<i32> = draft.event.teams.values().map(|t| t.score).collect();
            prop_assert_eq!(before, after);
        }
    }
}
