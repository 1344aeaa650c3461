//! Round2 orchestrator: horizontal questions uncover pieces of a puzzle image
//! while two buzzer tracks (vault guess and keyword queue) race for the hidden
//! keyword.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::state::{
    clock::Millis,
    content::{PUZZLE_PIECES, PackageStatus},
    error::{GameError, GameResult},
    event::{RoundKind, TeamStatus},
};

use super::{PendingAnswer, RoundCtx, Verdict};

/// Phases of the Round2 state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Round2Phase {
    /// Waiting for the puzzle package.
    #[default]
    Idle,
    /// A team is being given the turn and picks a horizontal question.
    TurnSelection,
    /// A horizontal question is open for answers.
    HorizontalActive,
    /// Answers to the horizontal question are being judged.
    HorizontalJudging,
    /// A puzzle piece has just been uncovered.
    PieceRevealed,
    /// The vault guess of the buzzer holder is being judged.
    VaultJudging,
    /// Keyword buzzes are being judged in arrival order.
    KeywordJudging,
    /// The round is over.
    Ended,
}

impl Round2Phase {
    /// Machine readable phase name.
    pub fn name(&self) -> &'static str {
        match self {
            Round2Phase::Idle => "round2_idle",
            Round2Phase::TurnSelection => "round2_turn_selection",
            Round2Phase::HorizontalActive => "round2_horizontal_active",
            Round2Phase::HorizontalJudging => "round2_horizontal_judging",
            Round2Phase::PieceRevealed => "round2_piece_revealed",
            Round2Phase::VaultJudging => "round2_vault_judging",
            Round2Phase::KeywordJudging => "round2_keyword_judging",
            Round2Phase::Ended => "round2_ended",
        }
    }
}

/// Horizontal question currently on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorizontalRef {
    /// Horizontal index inside the package.
    pub index: u8,
    /// Question identifier.
    pub question_id: Uuid,
}

/// One entry of the keyword queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordBuzz {
    /// Buzzing team.
    pub team_id: Uuid,
    /// Server receive time.
    pub at_ms: Millis,
    /// Server-assigned arrival order.
    pub sequence: u64,
}

/// Round2 sub-state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Round2State {
    /// Current phase.
    pub phase: Round2Phase,
    /// Phase interrupted by the vault buzzer.
    pub resume_phase: Option<Round2Phase>,
    /// Time left on the horizontal question while the vault is judged.
    #[serde(default)]
    pub paused_remaining_ms: Option<Millis>,
    /// Puzzle package in play.
    pub package_id: Option<Uuid>,
    /// Team holding the turn.
    pub current_team: Option<Uuid>,
    /// Horizontal question on screen.
    pub current_question: Option<HorizontalRef>,
    /// Teams that spent their turn in the current cycle.
    pub used_turns: BTreeSet<Uuid>,
    /// Horizontal questions already played.
    pub opened_questions: BTreeSet<u8>,
    /// Uncovered puzzle pieces.
    pub revealed_pieces: BTreeSet<u8>,
    /// Number of clues opened so far.
    pub opened_clues: u8,
    /// Piece uncovered by the last horizontal question.
    pub last_piece: Option<u8>,
    /// Teams barred from the vault and keyword buzzers.
    pub eliminated: BTreeSet<Uuid>,
    /// Answers waiting for a verdict.
    pub pending: Vec<PendingAnswer>,
    /// Whether the current batch had a correct answer.
    pub judged_correct: bool,
    /// Team holding the vault buzzer.
    pub vault_holder: Option<Uuid>,
    /// Append-only keyword queue.
    pub keyword_queue: Vec<KeywordBuzz>,
    /// Next keyword entry to judge.
    pub keyword_cursor: usize,
    /// Team that found the keyword.
    pub winner: Option<Uuid>,
    /// Next arrival sequence number.
    pub next_sequence: u64,
}

impl Round2State {
    fn take_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    /// Skip keyword entries of eliminated teams and return the next team to judge.
    fn seek_keyword(&mut self) -> Option<Uuid> {
        while let Some(entry) = self.keyword_queue.get(self.keyword_cursor) {
            if !self.eliminated.contains(&entry.team_id) {
                return Some(entry.team_id);
            }
            self.keyword_cursor += 1;
        }
        None
    }
}

type Ctx<'a, 'b> = &'a mut RoundCtx<'b, Round2State>;

pub(crate) fn assign_package(ctx: Ctx<'_, '_>, package_id: Uuid) -> GameResult<()> {
    if ctx.state.phase != Round2Phase::Idle {
        return Err(GameError::precondition(
            "the round 2 package is already chosen",
        ));
    }
    let package = ctx.content.package(package_id)?;
    if package.round != RoundKind::Round2 {
        return Err(GameError::validation("package does not belong to round 2"));
    }
    if package.puzzle.is_none() {
        return Err(GameError::validation("package has no puzzle"));
    }
    if package.status != PackageStatus::Unassigned {
        return Err(GameError::precondition(format!(
            "package {} was already played",
            package.number
        )));
    }
    ctx.content.package_mut(package_id)?.status = PackageStatus::InProgress;
    ctx.state.package_id = Some(package_id);
    ctx.state.phase = Round2Phase::TurnSelection;
    Ok(())
}

pub(crate) fn select_team(ctx: Ctx<'_, '_>, team_id: Uuid) -> GameResult<()> {
    if ctx.state.phase != Round2Phase::TurnSelection {
        return Err(GameError::precondition(
            "the turn can only be given during turn selection",
        ));
    }
    ctx.team(team_id)?;
    if ctx.state.used_turns.contains(&team_id) {
        return Err(GameError::precondition(format!(
            "team `{team_id}` already used its turn"
        )));
    }
    if let Some(previous) = ctx.state.current_team.filter(|id| *id != team_id) {
        ctx.set_status(previous, TeamStatus::Waiting);
    }
    ctx.set_status(team_id, TeamStatus::Active);
    ctx.state.current_team = Some(team_id);
    Ok(())
}

pub(crate) fn select_horizontal(ctx: Ctx<'_, '_>, team_id: Uuid, index: usize) -> GameResult<()> {
    if ctx.state.phase != Round2Phase::TurnSelection {
        return Err(GameError::precondition(
            "a horizontal question can only be chosen during turn selection",
        ));
    }
    if ctx.state.current_team != Some(team_id) {
        return Err(GameError::precondition(format!(
            "team `{team_id}` does not hold the turn"
        )));
    }
    let package_id = require_package(ctx)?;
    let count = ctx.content.questions_of(package_id).len();
    let slot = u8::try_from(index)
        .ok()
        .filter(|_| index < count)
        .ok_or_else(|| {
            GameError::validation(format!("horizontal index must be below {count}"))
        })?;
    if ctx.state.opened_questions.contains(&slot) {
        return Err(GameError::precondition(format!(
            "horizontal question {index} was already played"
        )));
    }
    let question_id = ctx.content.question_at(package_id, index)?.id;
    let duration = ctx.rules.round2_question_ms;
    ctx.start_timer(duration)?;

    let state = &mut *ctx.state;
    state.used_turns.insert(team_id);
    state.opened_questions.insert(slot);
    state.current_question = Some(HorizontalRef {
        index: slot,
        question_id,
    });
    state.pending.clear();
    state.judged_correct = false;
    state.last_piece = None;
    state.phase = Round2Phase::HorizontalActive;
    info!(%team_id, index, "horizontal question opened");
    Ok(())
}

pub(crate) fn submit_answer(ctx: Ctx<'_, '_>, team_id: Uuid, text: String) -> GameResult<()> {
    if ctx.state.phase != Round2Phase::HorizontalActive {
        return Err(GameError::precondition("no horizontal question is open"));
    }
    ctx.team(team_id)?;
    if ctx
        .state
        .pending
        .iter()
        .any(|answer| answer.team_id == team_id)
    {
        return Err(GameError::precondition(format!(
            "team `{team_id}` already answered"
        )));
    }
    let sequence = ctx.state.take_sequence();
    let submitted_at_ms = ctx.now_ms;
    ctx.state.pending.push(PendingAnswer {
        team_id,
        text,
        submitted_at_ms,
        sequence,
    });
    Ok(())
}

pub(crate) fn judge(ctx: Ctx<'_, '_>, team_id: Option<Uuid>, verdict: Verdict) -> GameResult<()> {
    match ctx.state.phase {
        Round2Phase::HorizontalJudging => judge_horizontal(ctx, team_id, verdict),
        Round2Phase::VaultJudging => judge_vault(ctx, team_id, verdict),
        Round2Phase::KeywordJudging => judge_keyword(ctx, team_id, verdict),
        _ => Err(GameError::precondition("nothing to judge in round 2")),
    }
}

fn judge_horizontal(ctx: Ctx<'_, '_>, team_id: Option<Uuid>, verdict: Verdict) -> GameResult<()> {
    let position = match team_id {
        Some(team_id) => ctx
            .state
            .pending
            .iter()
            .position(|answer| answer.team_id == team_id)
            .ok_or_else(|| {
                GameError::precondition(format!("team `{team_id}` has no pending answer"))
            })?,
        None if ctx.state.pending.is_empty() => {
            return Err(GameError::precondition("no pending answer"));
        }
        None => 0,
    };
    let answer = ctx.state.pending.remove(position);
    if verdict.is_correct() {
        let points = ctx.rules.round2_horizontal_points;
        ctx.award(answer.team_id, points)?;
        ctx.state.judged_correct = true;
    }
    if ctx.state.pending.is_empty() {
        finish_batch(ctx)?;
    }
    Ok(())
}

fn judge_vault(ctx: Ctx<'_, '_>, team_id: Option<Uuid>, verdict: Verdict) -> GameResult<()> {
    let holder = ctx
        .state
        .vault_holder
        .ok_or_else(|| GameError::precondition("nobody holds the vault buzzer"))?;
    if team_id.is_some_and(|team_id| team_id != holder) {
        return Err(GameError::precondition(format!(
            "team `{holder}` holds the vault buzzer"
        )));
    }
    ctx.state.vault_holder = None;
    let resume = ctx.state.resume_phase.take();
    let paused = ctx.state.paused_remaining_ms.take();
    if verdict.is_correct() {
        let points = ctx.rules.vault_score(ctx.state.opened_clues);
        ctx.award(holder, points)?;
        return finish_round(ctx, Some(holder));
    }
    ctx.state.eliminated.insert(holder);
    info!(team_id = %holder, "team eliminated by wrong vault guess");
    if all_eliminated(ctx) {
        return finish_round(ctx, None);
    }
    if let Some(remaining) = paused {
        ctx.start_timer(remaining)?;
    }
    ctx.state.phase = resume.unwrap_or(Round2Phase::TurnSelection);
    Ok(())
}

fn judge_keyword(ctx: Ctx<'_, '_>, team_id: Option<Uuid>, verdict: Verdict) -> GameResult<()> {
    let head = ctx
        .state
        .seek_keyword()
        .ok_or_else(|| GameError::precondition("the keyword queue is empty"))?;
    if team_id.is_some_and(|team_id| team_id != head) {
        return Err(GameError::precondition(format!(
            "team `{head}` is next in the keyword queue"
        )));
    }
    ctx.state.keyword_cursor += 1;
    if verdict.is_correct() {
        let points = ctx.rules.keyword_score(ctx.state.opened_clues);
        ctx.award(head, points)?;
        return finish_round(ctx, Some(head));
    }
    ctx.state.eliminated.insert(head);
    info!(team_id = %head, "team eliminated by wrong keyword guess");
    if all_eliminated(ctx) {
        return finish_round(ctx, None);
    }
    if ctx.state.seek_keyword().is_none() {
        ctx.state.phase = Round2Phase::TurnSelection;
    }
    Ok(())
}

pub(crate) fn buzz_vault(ctx: Ctx<'_, '_>, team_id: Uuid) -> GameResult<()> {
    ctx.team(team_id)?;
    let phase = ctx.state.phase;
    if !matches!(
        phase,
        Round2Phase::TurnSelection | Round2Phase::HorizontalActive | Round2Phase::PieceRevealed
    ) {
        return Err(GameError::precondition("the vault buzzer is closed"));
    }
    if ctx.state.eliminated.contains(&team_id) {
        return Err(GameError::precondition(format!(
            "team `{team_id}` is eliminated"
        )));
    }
    if let Some(holder) = ctx.state.vault_holder {
        return Err(GameError::precondition(format!(
            "team `{holder}` already holds the vault buzzer"
        )));
    }
    ctx.state.vault_holder = Some(team_id);
    ctx.state.resume_phase = Some(phase);
    // The horizontal clock stops while the vault guess is judged.
    if let Some(timer) = ctx.timer.as_mut().filter(|timer| timer.running) {
        ctx.state.paused_remaining_ms = Some(timer.ends_at_ms.saturating_sub(ctx.now_ms));
        timer.running = false;
    }
    ctx.state.phase = Round2Phase::VaultJudging;
    info!(%team_id, "vault buzzer locked");
    Ok(())
}

pub(crate) fn buzz_keyword(ctx: Ctx<'_, '_>, team_id: Uuid) -> GameResult<()> {
    ctx.team(team_id)?;
    if matches!(ctx.state.phase, Round2Phase::Idle | Round2Phase::Ended) {
        return Err(GameError::precondition("the keyword buzzer is closed"));
    }
    if ctx.state.eliminated.contains(&team_id) {
        return Err(GameError::precondition(format!(
            "team `{team_id}` is eliminated"
        )));
    }
    if ctx
        .state
        .keyword_queue
        .iter()
        .any(|entry| entry.team_id == team_id)
    {
        return Err(GameError::precondition(format!(
            "team `{team_id}` already buzzed for the keyword"
        )));
    }
    let sequence = ctx.state.take_sequence();
    let at_ms = ctx.now_ms;
    ctx.state.keyword_queue.push(KeywordBuzz {
        team_id,
        at_ms,
        sequence,
    });
    info!(%team_id, position = ctx.state.keyword_queue.len(), "keyword buzz queued");
    Ok(())
}

pub(crate) fn advance(ctx: Ctx<'_, '_>) -> GameResult<()> {
    match ctx.state.phase {
        Round2Phase::HorizontalActive => close_question(ctx),
        phase @ (Round2Phase::PieceRevealed | Round2Phase::TurnSelection) => {
            if ctx.state.seek_keyword().is_some() {
                ctx.state.phase = Round2Phase::KeywordJudging;
            } else if phase == Round2Phase::PieceRevealed {
                ctx.state.phase = Round2Phase::TurnSelection;
            } else {
                return Err(GameError::precondition(
                    "pick a horizontal question or end the round",
                ));
            }
            Ok(())
        }
        _ => Err(GameError::precondition("nothing to advance in round 2")),
    }
}

pub(crate) fn reconcile(ctx: Ctx<'_, '_>) -> GameResult<bool> {
    if ctx.state.phase == Round2Phase::HorizontalActive && ctx.timer_expired() {
        close_question(ctx)?;
        return Ok(true);
    }
    Ok(false)
}

pub(crate) fn end(ctx: Ctx<'_, '_>) -> GameResult<()> {
    if ctx.state.phase == Round2Phase::Ended {
        return Ok(());
    }
    let winner = ctx.state.winner;
    finish_round(ctx, winner)
}

fn close_question(ctx: Ctx<'_, '_>) -> GameResult<()> {
    ctx.clear_timer();
    ctx.state.phase = Round2Phase::HorizontalJudging;
    if ctx.state.pending.is_empty() {
        finish_batch(ctx)?;
    }
    Ok(())
}

/// Every answer of the batch is judged: uncover the mapped piece when one was
/// correct, then hand the turn back.
fn finish_batch(ctx: Ctx<'_, '_>) -> GameResult<()> {
    ctx.clear_timer();
    if let Some(team_id) = ctx.state.current_team.take() {
        ctx.set_status(team_id, TeamStatus::Waiting);
    }
    let package_id = require_package(ctx)?;
    if ctx.state.judged_correct {
        let index = ctx
            .state
            .current_question
            .map(|question| question.index)
            .ok_or_else(|| GameError::precondition("no horizontal question"))?;
        let piece = ctx
            .content
            .package(package_id)?
            .puzzle
            .as_ref()
            .and_then(|puzzle| puzzle.piece_for_question.get(&index).copied())
            .unwrap_or(index);
        if piece < PUZZLE_PIECES && ctx.state.revealed_pieces.insert(piece) {
            ctx.state.opened_clues += 1;
            info!(piece, opened_clues = ctx.state.opened_clues, "puzzle piece revealed");
        }
        ctx.state.last_piece = Some(piece);
        ctx.state.phase = Round2Phase::PieceRevealed;
    } else {
        ctx.state.phase = Round2Phase::TurnSelection;
    }

    let question_count = ctx.content.questions_of(package_id).len();
    let every_team_played = ctx
        .teams
        .keys()
        .all(|team_id| ctx.state.used_turns.contains(team_id));
    if every_team_played && ctx.state.opened_questions.len() < question_count {
        ctx.state.used_turns.clear();
    }
    Ok(())
}

fn finish_round(ctx: Ctx<'_, '_>, winner: Option<Uuid>) -> GameResult<()> {
    ctx.clear_timer();
    if let Some(team_id) = ctx.state.current_team.take() {
        ctx.set_status(team_id, TeamStatus::Waiting);
    }
    if let Some(package_id) = ctx.state.package_id {
        ctx.content.package_mut(package_id)?.status = PackageStatus::Completed;
    }
    ctx.state.vault_holder = None;
    ctx.state.resume_phase = None;
    ctx.state.paused_remaining_ms = None;
    ctx.state.winner = winner;
    ctx.state.phase = Round2Phase::Ended;
    match winner {
        Some(team_id) => info!(%team_id, "round 2 keyword found"),
        None => info!("round 2 ended without a winner"),
    }
    Ok(())
}

fn all_eliminated(ctx: &RoundCtx<'_, Round2State>) -> bool {
    ctx.teams
        .keys()
        .all(|team_id| ctx.state.eliminated.contains(team_id))
}

fn require_package(ctx: &RoundCtx<'_, Round2State>) -> GameResult<Uuid> {
    ctx.state
        .package_id
        .ok_or_else(|| GameError::precondition("no round 2 package assigned"))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;
    use uuid::Uuid;

    use crate::{
        config::GameRules,
        state::{
            content::{PackageStatus, PuzzleContent, TeamProfile},
            draft::EventDraft,
            error::GameError,
            event::RoundKind,
            rounds::{self, Verdict, test_support::*},
        },
    };

    use super::{Round2Phase, Round2State};

    fn setup(team_count: usize) -> (EventDraft, Vec<TeamProfile>, GameRules) {
        let rules = GameRules::default();
        let teams = roster(team_count);
        let mut pkg = package(RoundKind::Round2, 1);
        pkg.puzzle = Some(PuzzleContent::new(
            "MOUNT EVEREST".into(),
            "puzzle.png".into(),
            (0..4).map(|piece| format!("piece-{piece}.png")).collect(),
            BTreeMap::from([(0, 2), (1, 0), (2, 3), (3, 1)]),
        ));
        let package_id = pkg.id;
        let qs = questions(&pkg, 4);
        let mut draft = draft(&teams, vec![pkg], qs, 0);
        rounds::start_round(&mut draft, RoundKind::Round2).expect("round");
        rounds::assign_package(&mut draft, &rules, package_id).expect("package");
        (draft, teams, rules)
    }

    fn state(draft: &mut EventDraft) -> &mut Round2State {
        draft.event.round2_mut().expect("round 2")
    }

    fn open_horizontal(draft: &mut EventDraft, rules: &GameRules, team: Uuid, index: usize) {
        rounds::select_team(draft, rules, team).expect("turn");
        rounds::select_horizontal(draft, rules, team, index).expect("horizontal");
    }

    #[test]
    fn piece_is_revealed_once_every_answer_is_judged() {
        let (mut draft, teams, rules) = setup(3);
        open_horizontal(&mut draft, &rules, teams[0].id, 0);
        rounds::submit_answer(&mut draft, &rules, teams[0].id, "alpha".into()).expect("a");
        rounds::submit_answer(&mut draft, &rules, teams[1].id, "beta".into()).expect("b");
        rounds::advance(&mut draft, &rules).expect("close");
        assert_eq!(state(&mut draft).phase, Round2Phase::HorizontalJudging);

        rounds::judge(&mut draft, &rules, Some(teams[1].id), None, Verdict::Correct)
            .expect("judge b");
        assert!(state(&mut draft).revealed_pieces.is_empty());

        rounds::judge(&mut draft, &rules, Some(teams[0].id), None, Verdict::Wrong)
            .expect("judge a");
        let round = state(&mut draft);
        assert_eq!(round.phase, Round2Phase::PieceRevealed);
        assert_eq!(round.revealed_pieces.iter().copied().collect::<Vec<_>>(), vec![2]);
        assert_eq!(round.opened_clues, 1);
        assert_eq!(
            draft.event.team(teams[1].id).expect("team").score,
            rules.round2_horizontal_points
        );
    }

    #[test]
    fn batch_without_correct_answer_returns_to_turn_selection() {
        let (mut draft, teams, rules) = setup(2);
        open_horizontal(&mut draft, &rules, teams[0].id, 1);
        rounds::submit_answer(&mut draft, &rules, teams[1].id, "nope".into()).expect("b");
        rounds::advance(&mut draft, &rules).expect("close");
        rounds::judge(&mut draft, &rules, None, None, Verdict::Wrong).expect("judge");

        let round = state(&mut draft);
        assert_eq!(round.phase, Round2Phase::TurnSelection);
        assert!(round.revealed_pieces.is_empty());
        assert_eq!(round.opened_clues, 0);
    }

    #[test]
    fn expired_question_without_answers_moves_on() {
        let (mut draft, teams, rules) = setup(2);
        open_horizontal(&mut draft, &rules, teams[0].id, 0);
        let mut draft = at(draft, rules.round2_question_ms);
        assert!(rounds::reconcile(&mut draft, &rules).expect("reconcile"));
        assert_eq!(state(&mut draft).phase, Round2Phase::TurnSelection);
        assert!(draft.event.timer.is_none());
    }

    #[test]
    fn a_team_cannot_take_two_turns_in_one_cycle() {
        let (mut draft, teams, rules) = setup(2);
        open_horizontal(&mut draft, &rules, teams[0].id, 0);
        rounds::advance(&mut draft, &rules).expect("close");
        let err = rounds::select_team(&mut draft, &rules, teams[0].id).unwrap_err();
        assert!(matches!(err, GameError::Precondition(_)));
    }

    #[test]
    fn turns_reset_after_every_team_played() {
        let (mut draft, teams, rules) = setup(2);
        open_horizontal(&mut draft, &rules, teams[0].id, 0);
        rounds::advance(&mut draft, &rules).expect("close");
        open_horizontal(&mut draft, &rules, teams[1].id, 1);
        rounds::advance(&mut draft, &rules).expect("close");
        assert!(state(&mut draft).used_turns.is_empty());
        open_horizontal(&mut draft, &rules, teams[0].id, 2);
    }

    #[test]
    fn wrong_vault_guess_eliminates_and_resumes() {
        let (mut draft, teams, rules) = setup(3);
        open_horizontal(&mut draft, &rules, teams[0].id, 0);
        rounds::buzz_vault(&mut draft, &rules, teams[2].id).expect("vault");
        let err = rounds::buzz_vault(&mut draft, &rules, teams[1].id).unwrap_err();
        assert!(matches!(err, GameError::Precondition(_)));

        rounds::judge(&mut draft, &rules, None, None, Verdict::Wrong).expect("judge");
        let round = state(&mut draft);
        assert_eq!(round.phase, Round2Phase::HorizontalActive);
        assert!(round.eliminated.contains(&teams[2].id));

        let err = rounds::buzz_vault(&mut draft, &rules, teams[2].id).unwrap_err();
        assert!(matches!(err, GameError::Precondition(_)));
        let err = rounds::buzz_keyword(&mut draft, &rules, teams[2].id).unwrap_err();
        assert!(matches!(err, GameError::Precondition(_)));
    }

    #[test]
    fn correct_vault_guess_scores_by_opened_clues() {
        let (mut draft, teams, rules) = setup(2);
        rounds::buzz_vault(&mut draft, &rules, teams[1].id).expect("vault");
        rounds::judge(&mut draft, &rules, Some(teams[1].id), None, Verdict::Correct)
            .expect("judge");
        let round = state(&mut draft);
        assert_eq!(round.phase, Round2Phase::Ended);
        assert_eq!(round.winner, Some(teams[1].id));
        assert_eq!(
            draft.event.team(teams[1].id).expect("team").score,
            rules.vault_score(0)
        );
    }

    #[test]
    fn keyword_queue_is_judged_in_arrival_order() {
        let (mut draft, teams, rules) = setup(3);
        rounds::buzz_keyword(&mut draft, &rules, teams[0].id).expect("first");
        rounds::buzz_keyword(&mut draft, &rules, teams[1].id).expect("second");
        let err = rounds::buzz_keyword(&mut draft, &rules, teams[0].id).unwrap_err();
        assert!(matches!(err, GameError::Precondition(_)));

        rounds::advance(&mut draft, &rules).expect("enter keyword judging");
        assert_eq!(state(&mut draft).phase, Round2Phase::KeywordJudging);

        let err = rounds::judge(&mut draft, &rules, Some(teams[1].id), None, Verdict::Correct)
            .unwrap_err();
        assert!(matches!(err, GameError::Precondition(_)));

        rounds::judge(&mut draft, &rules, None, None, Verdict::Wrong).expect("first wrong");
        rounds::judge(&mut draft, &rules, None, None, Verdict::Correct).expect("second right");

        let round = state(&mut draft);
        assert_eq!(round.phase, Round2Phase::Ended);
        assert_eq!(round.winner, Some(teams[1].id));
        assert!(round.eliminated.contains(&teams[0].id));
        assert_eq!(
            draft.event.team(teams[1].id).expect("team").score,
            rules.keyword_score(0)
        );
    }

    #[test]
    fn exhausted_keyword_queue_returns_to_turn_selection() {
        let (mut draft, teams, rules) = setup(3);
        rounds::buzz_keyword(&mut draft, &rules, teams[0].id).expect("buzz");
        rounds::advance(&mut draft, &rules).expect("keyword judging");
        rounds::judge(&mut draft, &rules, None, None, Verdict::Wrong).expect("wrong");
        assert_eq!(state(&mut draft).phase, Round2Phase::TurnSelection);
    }

    #[test]
    fn round_ends_without_winner_when_everyone_is_eliminated() {
        let (mut draft, teams, rules) = setup(2);
        rounds::buzz_keyword(&mut draft, &rules, teams[0].id).expect("a");
        rounds::buzz_keyword(&mut draft, &rules, teams[1].id).expect("b");
        rounds::advance(&mut draft, &rules).expect("keyword judging");
        rounds::judge(&mut draft, &rules, None, None, Verdict::Wrong).expect("a wrong");
        rounds::judge(&mut draft, &rules, None, None, Verdict::Wrong).expect("b wrong");
        let round = state(&mut draft);
        assert_eq!(round.phase, Round2Phase::Ended);
        assert_eq!(round.winner, None);
    }

    #[test]
    fn wrong_vault_guesses_can_eliminate_every_team() {
        let (mut draft, teams, rules) = setup(2);
        rounds::buzz_vault(&mut draft, &rules, teams[0].id).expect("first vault");
        rounds::judge(&mut draft, &rules, None, None, Verdict::Wrong).expect("first wrong");
        assert_eq!(state(&mut draft).phase, Round2Phase::TurnSelection);

        rounds::buzz_vault(&mut draft, &rules, teams[1].id).expect("second vault");
        rounds::judge(&mut draft, &rules, None, None, Verdict::Wrong).expect("second wrong");
        let package_id = state(&mut draft).package_id.expect("package");
        let round = state(&mut draft);
        assert_eq!(round.phase, Round2Phase::Ended);
        assert_eq!(round.winner, None);
        assert!(round.vault_holder.is_none());
        assert_eq!(
            draft.content.package(package_id).expect("package").status,
            PackageStatus::Completed
        );
        assert!(draft.event.teams.values().all(|team| team.score == 0));
    }

    #[test]
    fn vault_buzz_during_piece_reveal_resumes_there() {
        let (mut draft, teams, rules) = setup(3);
        open_horizontal(&mut draft, &rules, teams[0].id, 0);
        rounds::submit_answer(&mut draft, &rules, teams[1].id, "guess".into()).expect("answer");
        rounds::advance(&mut draft, &rules).expect("close");
        rounds::judge(&mut draft, &rules, None, None, Verdict::Correct).expect("judge");
        assert_eq!(state(&mut draft).phase, Round2Phase::PieceRevealed);

        rounds::buzz_vault(&mut draft, &rules, teams[2].id).expect("vault");
        assert_eq!(state(&mut draft).phase, Round2Phase::VaultJudging);
        rounds::judge(&mut draft, &rules, Some(teams[2].id), None, Verdict::Wrong)
            .expect("vault wrong");

        let round = state(&mut draft);
        assert_eq!(round.phase, Round2Phase::PieceRevealed);
        assert_eq!(round.revealed_pieces.len(), 1);
        assert!(round.eliminated.contains(&teams[2].id));
    }

    #[test]
    fn vault_judging_pauses_the_horizontal_clock() {
        let (mut draft, teams, rules) = setup(3);
        open_horizontal(&mut draft, &rules, teams[0].id, 0);
        let mut draft = at(draft, 1_000);
        rounds::buzz_vault(&mut draft, &rules, teams[2].id).expect("vault");
        assert!(!draft.event.timer_running());

        let late = rules.round2_question_ms + 60_000;
        let mut draft = at(draft, late);
        assert!(!rounds::reconcile(&mut draft, &rules).expect("reconcile"));
        assert_eq!(state(&mut draft).phase, Round2Phase::VaultJudging);

        rounds::judge(&mut draft, &rules, None, None, Verdict::Wrong).expect("vault wrong");
        assert_eq!(state(&mut draft).phase, Round2Phase::HorizontalActive);
        let timer = draft.event.timer.expect("timer restarted");
        assert!(timer.running);
        assert_eq!(timer.ends_at_ms, late + rules.round2_question_ms - 1_000);
        rounds::submit_answer(&mut draft, &rules, teams[1].id, "guess".into())
            .expect("answer after resume");
    }

    proptest! {
        #[test]
        fn revealed_pieces_stay_bounded(
            verdicts in proptest::collection::vec(proptest::collection::vec(any::<bool>(), 0..3), 1..8)
        ) {
            let (mut draft, teams, rules) = setup(3);
            for batch in verdicts {
                let (team, index) = {
                    let round = state(&mut draft);
                    let Some(index) = (0..4u8).find(|i| !round.opened_questions.contains(i)) else {
                        break;
                    };
                    let team = teams
                        .iter()
                        .map(|team| team.id)
                        .find(|id| !round.used_turns.contains(id))
                        .expect("a team with a free turn");
                    (team, usize::from(index))
                };
                if state(&mut draft).phase == Round2Phase::PieceRevealed {
                    rounds::advance(&mut draft, &rules).expect("back to turns");
                }
                open_horizontal(&mut draft, &rules, team, index);
                for (offset, _) in batch.iter().enumerate() {
                    rounds::submit_answer(&mut draft, &rules, teams[offset].id, "guess".into())
                        .expect("submit");
                }
                rounds::advance(&mut draft, &rules).expect("close");
                for (offset, correct) in batch.iter().enumerate() {
                    let verdict = if *correct { Verdict::Correct } else { Verdict::Wrong };
                    rounds::judge(&mut draft, &rules, Some(teams[offset].id), None, verdict)
                        .expect("judge");
                }
                let round = state(&mut draft);
                prop_assert!(round.revealed_pieces.len() <= 4);
                prop_assert_eq!(usize::from(round.opened_clues), round.revealed_pieces.len());
            }
        }
    }
}
