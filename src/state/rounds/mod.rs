//! Pure round engines. Every operation receives the freshly loaded draft,
//! validates the request against the active round and phase, and mutates the
//! draft in place. Persistence and broadcasting happen around them.

/// Individual packages.
pub mod round1;
/// Picture puzzle.
pub mod round2;
/// Simultaneous answers ranked by time.
pub mod round3;
/// Tiered questions with star power and steals.
pub mod round4;

use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    config::GameRules,
    state::{
        clock::Millis,
        content::ContentBook,
        draft::EventDraft,
        error::{GameError, GameResult},
        event::{
            EventLedger, EventState, QuestionTimer, RoundKind, RoundState, TeamScore, TeamStatus,
        },
    },
};

use self::round4::Tier;

/// Operator verdict on an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The answer is accepted.
    Correct,
    /// The answer is rejected.
    Wrong,
}

impl Verdict {
    /// Whether the verdict accepts the answer.
    pub fn is_correct(self) -> bool {
        matches!(self, Verdict::Correct)
    }
}

/// A submitted answer waiting for the operator's verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAnswer {
    /// Submitting team.
    pub team_id: Uuid,
    /// Free text answer. Omitted from public views while rivals can still answer.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// Server receive time.
    pub submitted_at_ms: Millis,
    /// Server-assigned arrival order.
    pub sequence: u64,
}

/// Split borrow of a draft scoped to one round's sub-state.
pub(crate) struct RoundCtx<'a, S> {
    /// Sub-state of the active round.
    pub state: &'a mut S,
    pub teams: &'a mut IndexMap<Uuid, TeamScore>,
    pub timer: &'a mut Option<QuestionTimer>,
    /// Records kept across round switches.
    pub ledger: &'a mut EventLedger,
    pub content: &'a mut ContentBook,
    pub rules: &'a GameRules,
    /// Instant the operation is evaluated at.
    pub now_ms: Millis,
}

impl<S> RoundCtx<'_, S> {
    /// Score line of `team_id`, or not found.
    pub fn team(&self, team_id: Uuid) -> GameResult<&TeamScore> {
        self.teams
            .get(&team_id)
            .ok_or_else(|| GameError::not_found(format!("team `{team_id}` not found")))
    }

    /// Add `delta`, possibly negative, to the team's score.
    pub fn award(&mut self, team_id: Uuid, delta: i32) -> GameResult<()> {
        let team = self
            .teams
            .get_mut(&team_id)
            .ok_or_else(|| GameError::not_found(format!("team `{team_id}` not found")))?;
        team.score += delta;
        if delta != 0 {
            info!(%team_id, delta, score = team.score, "score updated");
        }
        Ok(())
    }

    /// Unknown teams are ignored.
    pub fn set_status(&mut self, team_id: Uuid, status: TeamStatus) {
        if let Some(team) = self.teams.get_mut(&team_id) {
            team.status = status;
        }
    }

    /// Replace the question timer with one ending `duration_ms` from now.
    pub fn start_timer(&mut self, duration_ms: Millis) -> GameResult<()> {
        *self.timer = Some(QuestionTimer::start(self.now_ms, duration_ms)?);
        Ok(())
    }

    pub fn timer_expired(&self) -> bool {
        self.timer.is_some_and(|timer| timer.expired(self.now_ms))
    }

    pub fn clear_timer(&mut self) {
        *self.timer = None;
    }
}

macro_rules! round_ctx {
    ($fn_name:ident, $variant:ident, $state:ty, $kind:expr) => {
        pub(crate) fn $fn_name<'a>(
            draft: &'a mut EventDraft,
            rules: &'a GameRules,
        ) -> GameResult<RoundCtx<'a, $state>> {
            let now_ms = draft.now_ms();
            let EventDraft { event, content, .. } = draft;
            let EventState {
                teams,
                round,
                timer,
                ledger,
                ..
            } = event;
            match round {
                RoundState::$variant(state) => Ok(RoundCtx {
                    state,
                    teams,
                    timer,
                    ledger,
                    content,
                    rules,
                    now_ms,
                }),
                _ => Err(GameError::precondition(format!(
                    "operation requires round {} to be active",
                    $kind.number()
                ))),
            }
        }
    };
}

round_ctx!(round1_ctx, Round1, round1::Round1State, RoundKind::Round1);
round_ctx!(round2_ctx, Round2, round2::Round2State, RoundKind::Round2);
round_ctx!(round3_ctx, Round3, round3::Round3State, RoundKind::Round3);
round_ctx!(round4_ctx, Round4, round4::Round4State, RoundKind::Round4);

fn active_round(draft: &EventDraft) -> GameResult<RoundKind> {
    draft
        .event
        .round
        .kind()
        .ok_or_else(|| GameError::precondition("no round is active"))
}

/// Make `round` the active round with a fresh sub-state. Teams the ledger
/// records as done with `round` stay finished.
pub fn start_round(draft: &mut EventDraft, round: RoundKind) -> GameResult<()> {
    if draft.event.timer_running() {
        return Err(GameError::precondition(
            "cannot switch rounds while a timer is running",
        ));
    }
    if draft.event.round.kind() == Some(round) {
        return Err(GameError::precondition(format!(
            "round {} is already active",
            round.number()
        )));
    }
    draft.event.round = RoundState::fresh(round);
    draft.event.clear_timer();
    draft.event.reset_statuses(round);
    info!(round = round.number(), "round started");
    Ok(())
}

/// Close the active round. Round3 re-runs its full score recompute.
pub fn end_round(draft: &mut EventDraft, rules: &GameRules, round: RoundKind) -> GameResult<()> {
    let active = active_round(draft)?;
    if active != round {
        return Err(GameError::precondition(format!(
            "round {} is not the active round",
            round.number()
        )));
    }
    match round {
        RoundKind::Round1 => round1::end(&mut round1_ctx(draft, rules)?)?,
        RoundKind::Round2 => round2::end(&mut round2_ctx(draft, rules)?)?,
        RoundKind::Round3 => round3::end(&mut round3_ctx(draft, rules)?)?,
        RoundKind::Round4 => round4::end(&mut round4_ctx(draft, rules)?)?,
    }
    info!(round = round.number(), "round ended");
    Ok(())
}

/// Reset the packages and ledger entries of `round` and, when it is active,
/// its sub-state. Scores are left untouched.
pub fn reset_round(draft: &mut EventDraft, round: RoundKind) -> GameResult<()> {
    draft.content.reset_packages(Some(round));
    draft.event.ledger.forget(round);
    if draft.event.round.kind() == Some(round) {
        draft.event.round = RoundState::fresh(round);
        draft.event.clear_timer();
        draft.event.reset_statuses(round);
    }
    info!(round = round.number(), "round reset");
    Ok(())
}

/// Recreate the whole event from the roster and reset every package.
pub fn reset_game(draft: &mut EventDraft) -> GameResult<()> {
    draft.content.reset_packages(None);
    let created_at = draft.now_ms();
    draft.event = EventState::new(&draft.roster, created_at);
    info!(teams = draft.roster.len(), "game reset");
    Ok(())
}

/// Apply every expired deadline of the active round. Returns whether anything changed.
pub fn reconcile(draft: &mut EventDraft, rules: &GameRules) -> GameResult<bool> {
    match draft.event.round.kind() {
        None => Ok(false),
        Some(RoundKind::Round1) => round1::reconcile(&mut round1_ctx(draft, rules)?),
        Some(RoundKind::Round2) => round2::reconcile(&mut round2_ctx(draft, rules)?),
        Some(RoundKind::Round3) => round3::reconcile(&mut round3_ctx(draft, rules)?),
        Some(RoundKind::Round4) => round4::reconcile(&mut round4_ctx(draft, rules)?),
    }
}

/// Operator picks the team holding the turn.
pub fn select_team(draft: &mut EventDraft, rules: &GameRules, team_id: Uuid) -> GameResult<()> {
    match active_round(draft)? {
        RoundKind::Round1 => round1::select_team(&mut round1_ctx(draft, rules)?, team_id),
        RoundKind::Round2 => round2::select_team(&mut round2_ctx(draft, rules)?, team_id),
        RoundKind::Round4 => round4::select_team(&mut round4_ctx(draft, rules)?, team_id),
        RoundKind::Round3 => Err(GameError::precondition(
            "round 3 is played by every team at once",
        )),
    }
}

/// Operator assigns the package to play.
pub fn assign_package(
    draft: &mut EventDraft,
    rules: &GameRules,
    package_id: Uuid,
) -> GameResult<()> {
    match active_round(draft)? {
        RoundKind::Round1 => round1::assign_package(&mut round1_ctx(draft, rules)?, package_id),
        RoundKind::Round2 => round2::assign_package(&mut round2_ctx(draft, rules)?, package_id),
        RoundKind::Round3 => round3::assign_package(&mut round3_ctx(draft, rules)?, package_id),
        RoundKind::Round4 => Err(GameError::precondition(
            "round 4 packages are drawn by selecting a tier",
        )),
    }
}

/// Operator starts the next question. `index` picks a Round2 horizontal or a
/// Round3 question explicitly.
pub fn start_question(
    draft: &mut EventDraft,
    rules: &GameRules,
    index: Option<usize>,
) -> GameResult<()> {
    match active_round(draft)? {
        RoundKind::Round1 => round1::start(&mut round1_ctx(draft, rules)?),
        RoundKind::Round2 => {
            let index = index.ok_or_else(|| {
                GameError::validation("round 2 requires a horizontal question index")
            })?;
            let mut ctx = round2_ctx(draft, rules)?;
            let team_id = ctx
                .state
                .current_team
                .ok_or_else(|| GameError::precondition("no team holds the turn"))?;
            round2::select_horizontal(&mut ctx, team_id, index)
        }
        RoundKind::Round3 => round3::start_question(&mut round3_ctx(draft, rules)?, index),
        RoundKind::Round4 => round4::start_question(&mut round4_ctx(draft, rules)?),
    }
}

/// Operator verdict. `team_id` names the judged team where several answers
/// compete; `question_id` targets a Round1 question (timeout overrides).
pub fn judge(
    draft: &mut EventDraft,
    rules: &GameRules,
    team_id: Option<Uuid>,
    question_id: Option<Uuid>,
    verdict: Verdict,
) -> GameResult<()> {
    match active_round(draft)? {
        RoundKind::Round1 => round1::judge(&mut round1_ctx(draft, rules)?, question_id, verdict),
        RoundKind::Round2 => round2::judge(&mut round2_ctx(draft, rules)?, team_id, verdict),
        RoundKind::Round3 => round3::judge(&mut round3_ctx(draft, rules)?, team_id, verdict),
        RoundKind::Round4 => round4::judge(&mut round4_ctx(draft, rules)?, verdict),
    }
}

/// Operator moves the active round to its next phase.
pub fn advance(draft: &mut EventDraft, rules: &GameRules) -> GameResult<()> {
    match active_round(draft)? {
        RoundKind::Round1 => round1::advance(&mut round1_ctx(draft, rules)?),
        RoundKind::Round2 => round2::advance(&mut round2_ctx(draft, rules)?),
        RoundKind::Round3 => round3::advance(&mut round3_ctx(draft, rules)?),
        RoundKind::Round4 => round4::advance(&mut round4_ctx(draft, rules)?),
    }
}

/// Operator picks the Round4 point tier, drawing its questions.
pub fn select_tier<R: Rng + ?Sized>(
    draft: &mut EventDraft,
    rules: &GameRules,
    tier: Tier,
    rng: &mut R,
) -> GameResult<()> {
    round4::select_tier(&mut round4_ctx(draft, rules)?, tier, rng)
}

/// A team submits a free text answer to the active question.
pub fn submit_answer(
    draft: &mut EventDraft,
    rules: &GameRules,
    team_id: Uuid,
    text: String,
) -> GameResult<()> {
    let text = text.trim().to_owned();
    if text.is_empty() {
        return Err(GameError::validation("answer must not be empty"));
    }
    match active_round(draft)? {
        RoundKind::Round2 => round2::submit_answer(&mut round2_ctx(draft, rules)?, team_id, text),
        RoundKind::Round3 => round3::submit_answer(&mut round3_ctx(draft, rules)?, team_id, text),
        RoundKind::Round1 | RoundKind::Round4 => Err(GameError::precondition(
            "answers are given aloud in this round",
        )),
    }
}

/// A team claims the Round2 horizontal question it wants to play.
pub fn select_horizontal(
    draft: &mut EventDraft,
    rules: &GameRules,
    team_id: Uuid,
    index: usize,
) -> GameResult<()> {
    round2::select_horizontal(&mut round2_ctx(draft, rules)?, team_id, index)
}

/// A team locks the Round2 vault buzzer.
pub fn buzz_vault(draft: &mut EventDraft, rules: &GameRules, team_id: Uuid) -> GameResult<()> {
    round2::buzz_vault(&mut round2_ctx(draft, rules)?, team_id)
}

/// A team joins the Round2 keyword queue.
pub fn buzz_keyword(draft: &mut EventDraft, rules: &GameRules, team_id: Uuid) -> GameResult<()> {
    round2::buzz_keyword(&mut round2_ctx(draft, rules)?, team_id)
}

/// A team claims the open Round4 steal window.
pub fn buzz_steal(draft: &mut EventDraft, rules: &GameRules, team_id: Uuid) -> GameResult<()> {
    round4::buzz_steal(&mut round4_ctx(draft, rules)?, team_id)
}

/// The Round4 active team decides on its star power.
pub fn confirm_star(
    draft: &mut EventDraft,
    rules: &GameRules,
    team_id: Uuid,
    use_star: bool,
) -> GameResult<()> {
    round4::confirm_star(&mut round4_ctx(draft, rules)?, team_id, use_star)
}

#[cfg(test)]
pub(crate) mod test_support {
    use uuid::Uuid;

    use crate::state::{
        content::{ContentBook, Package, PackageStatus, Question, TeamProfile},
        draft::EventDraft,
        event::RoundKind,
    };

    pub fn roster(count: usize) -> Vec<TeamProfile> {
        (0..count)
            .map(|index| TeamProfile {
                id: Uuid::new_v4(),
                name: format!("Team {}", index + 1),
            })
            .collect()
    }

    pub fn package(round: RoundKind, number: u32) -> Package {
        Package {
            id: Uuid::new_v4(),
            round,
            number,
            status: PackageStatus::Unassigned,
            assigned_team: None,
            question_index: 0,
            history: Vec::new(),
            puzzle: None,
        }
    }

    pub fn questions(package: &Package, count: usize) -> Vec<Question> {
        (0..count)
            .map(|index| Question {
                id: Uuid::new_v4(),
                package_id: package.id,
                index,
                prompt: format!("Question {}", index + 1),
                answer: format!("Answer {}", index + 1),
                points: None,
            })
            .collect()
    }

    pub fn draft(
        roster: &[TeamProfile],
        packages: Vec<Package>,
        questions: Vec<Question>,
        now_ms: u64,
    ) -> EventDraft {
        EventDraft::load(
            0,
            None,
            roster.to_vec(),
            ContentBook::new(packages, questions),
            now_ms,
        )
    }

    /// Re-wrap the draft's state at a later instant, as a reload would.
    pub fn at(draft: EventDraft, now_ms: u64) -> EventDraft {
        EventDraft::load(
            draft.revision(),
            Some(draft.event.clone()),
            draft.roster.clone(),
            draft.content.clone(),
            now_ms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{test_support::*, *};

    #[test]
    fn start_round_rejects_the_active_round() {
        let teams = roster(2);
        let mut draft = draft(&teams, Vec::new(), Vec::new(), 0);
        start_round(&mut draft, RoundKind::Round1).expect("start");
        let err = start_round(&mut draft, RoundKind::Round1).unwrap_err();
        assert!(matches!(err, GameError::Precondition(_)));
    }

    #[test]
    fn operations_require_an_active_round() {
        let teams = roster(1);
        let rules = GameRules::default();
        let mut draft = draft(&teams, Vec::new(), Vec::new(), 0);
        let err = advance(&mut draft, &rules).unwrap_err();
        assert!(matches!(err, GameError::Precondition(_)));
    }

    #[test]
    fn reset_game_keeps_roster_and_clears_scores() {
        let teams = roster(2);
        let mut draft = draft(&teams, Vec::new(), Vec::new(), 0);
        draft.event.award(teams[0].id, 30).expect("award");
        start_round(&mut draft, RoundKind::Round2).expect("start");
        reset_game(&mut draft).expect("reset");
        assert_eq!(draft.event.round, RoundState::Lobby);
        assert_eq!(draft.event.teams.len(), 2);
        assert!(draft.event.teams.values().all(|team| team.score == 0));
    }

    #[test]
    fn reset_round_leaves_scores() {
        let teams = roster(1);
        let rules = GameRules::default();
        let pkg = package(RoundKind::Round1, 1);
        let qs = questions(&pkg, 2);
        let package_id = pkg.id;
        let mut draft = draft(&teams, vec![pkg], qs, 0);
        start_round(&mut draft, RoundKind::Round1).expect("start");
        select_team(&mut draft, &rules, teams[0].id).expect("team");
        assign_package(&mut draft, &rules, package_id).expect("package");
        start_question(&mut draft, &rules, None).expect("question");
        judge(&mut draft, &rules, None, None, Verdict::Correct).expect("judge");

        reset_round(&mut draft, RoundKind::Round1).expect("reset");

        let package = draft.content.package(package_id).expect("package");
        assert!(package.history.is_empty());
        assert_eq!(draft.event.team(teams[0].id).expect("team").score, 10);
        assert!(draft.event.timer.is_none());
    }

    #[test]
    fn empty_answers_are_rejected() {
        let teams = roster(1);
        let rules = GameRules::default();
        let mut draft = draft(&teams, Vec::new(), Vec::new(), 0);
        start_round(&mut draft, RoundKind::Round3).expect("start");
        let err = submit_answer(&mut draft, &rules, teams[0].id, "   ".into()).unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));
    }
}
