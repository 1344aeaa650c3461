use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use futures::future::BoxFuture;
use tokio::sync::{Notify, Semaphore};
use summit_quiz_back::{
    config::AppConfig,
    dao::{
        event_store::{EventStore, MemoryEventStore},
        models::{ContentBundle, EventCommit, EventDocument},
        storage::{StorageError, StorageResult},
    },
    dto::{
        operator::{
            AssignPackageRequest, JudgeRequest, SelectTeamRequest, SelectTierRequest,
            StartQuestionRequest, TierDto, VerdictDto,
        },
        snapshot::{Audience, EventSnapshot},
        team::{ConfirmStarRequest, SubmitAnswerRequest},
    },
    error::ServiceError,
    services::{operator_service, public_service, reconciler, team_service},
    state::{
        AppState, SharedState,
        clock::ManualClock,
        content::{Package, PackageStatus, Question, TeamProfile},
        event::{EventState, QuestionTimer, RoundKind, RoundState},
        rounds::round1::{Round1Phase, Round1State},
    },
};
use uuid::Uuid;

const START_MS: u64 = 1_700_000_000_000;

struct Harness {
    state: SharedState,
    clock: Arc<ManualClock>,
    teams: Vec<TeamProfile>,
}

fn package(round: RoundKind, number: u32) -> Package {
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

fn questions(package: &Package, points: &[Option<i32>]) -> Vec<Question> {
    points
        .iter()
        .enumerate()
        .map(|(index, points)| Question {
            id: Uuid::new_v4(),
            package_id: package.id,
            index,
            prompt: format!("question {index}"),
            answer: format!("answer {index}"),
            points: *points,
        })
        .collect()
}

fn content() -> (ContentBundle, Vec<TeamProfile>) {
    let teams: Vec<TeamProfile> = ["Alpha", "Bravo", "Charlie"]
        .into_iter()
        .map(|name| TeamProfile {
            id: Uuid::new_v4(),
            name: name.into(),
        })
        .collect();
    let round1 = package(RoundKind::Round1, 1);
    let round3 = package(RoundKind::Round3, 1);
    let round4 = package(RoundKind::Round4, 1);
    let mut all_questions = questions(&round1, &[None, None]);
    all_questions.extend(questions(&round3, &[None, None]));
    all_questions.extend(questions(
        &round4,
        &[Some(10), Some(10), Some(10), Some(20), Some(20), Some(30)],
    ));
    let bundle = ContentBundle {
        teams: teams.clone(),
        packages: vec![round1, round3, round4],
        questions: all_questions,
    };
    (bundle, teams)
}

async fn harness_with(store: Arc<dyn EventStore>) -> Harness {
    let (bundle, teams) = content();
    store.seed(bundle).await.unwrap();
    let clock = Arc::new(ManualClock::new(START_MS));
    let state = AppState::with_clock(AppConfig::default(), clock.clone());
    state.set_event_store(store).await;
    Harness {
        state,
        clock,
        teams,
    }
}

async fn harness() -> Harness {
    harness_with(Arc::new(MemoryEventStore::new())).await
}

async fn public(state: &SharedState) -> EventSnapshot {
    public_service::event_snapshot(state, Audience::Public)
        .await
        .unwrap()
}

fn score(snapshot: &EventSnapshot, team_id: Uuid) -> i32 {
    snapshot
        .teams
        .iter()
        .find(|team| team.id == team_id)
        .map(|team| team.score)
        .unwrap()
}

fn judge(verdict: VerdictDto) -> JudgeRequest {
    JudgeRequest {
        verdict,
        team_id: None,
        question_id: None,
    }
}

async fn play_round1_until_started(h: &Harness) {
    operator_service::start_round(&h.state, 1).await.unwrap();
    operator_service::select_team(
        &h.state,
        SelectTeamRequest {
            team_id: h.teams[0].id,
        },
    )
    .await
    .unwrap();
    operator_service::assign_package(
        &h.state,
        AssignPackageRequest {
            package_id: None,
            number: Some(1),
        },
    )
    .await
    .unwrap();
    operator_service::start_question(&h.state, StartQuestionRequest { index: None })
        .await
        .unwrap();
}

#[tokio::test]
async fn lobby_is_visible_before_any_event_is_written() {
    let h = harness().await;
    let snapshot = public(&h.state).await;
    assert_eq!(snapshot.revision, 0);
    assert_eq!(snapshot.phase, "lobby");
    assert_eq!(snapshot.teams.len(), 3);
    assert!(snapshot.teams.iter().all(|team| team.score == 0));
}

#[tokio::test]
async fn round1_package_scores_each_correct_answer() {
    let h = harness().await;
    play_round1_until_started(&h).await;

    let first = operator_service::judge(&h.state, judge(VerdictDto::Correct))
        .await
        .unwrap();
    assert_eq!(score(&first.snapshot, h.teams[0].id), 10);
    assert!(first.snapshot.current_question.is_some());

    let last = operator_service::judge(&h.state, judge(VerdictDto::Wrong))
        .await
        .unwrap();
    assert_eq!(last.snapshot.phase, "round1_completed");
    assert_eq!(score(&last.snapshot, h.teams[0].id), 10);
    assert!(last.snapshot.timer.is_none());
    let played = last
        .snapshot
        .packages
        .iter()
        .find(|package| package.round == 1)
        .unwrap();
    assert_eq!(played.status, PackageStatus::Completed);
    assert_eq!(played.history.len(), 2);
}

#[tokio::test]
async fn operator_view_includes_answers_public_view_does_not() {
    let h = harness().await;
    play_round1_until_started(&h).await;

    let operator = public_service::event_snapshot(&h.state, Audience::Operator)
        .await
        .unwrap();
    let public = public(&h.state).await;
    assert_eq!(
        operator.current_question.unwrap().answer.as_deref(),
        Some("answer 0")
    );
    assert!(public.current_question.unwrap().answer.is_none());
}

#[tokio::test]
async fn rejected_operation_does_not_bump_the_revision() {
    let h = harness().await;
    let started = operator_service::start_round(&h.state, 1).await.unwrap();
    assert_eq!(started.snapshot.revision, 1);

    let err = operator_service::select_team(
        &h.state,
        SelectTeamRequest {
            team_id: Uuid::new_v4(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let err = operator_service::start_round(&h.state, 1).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    assert_eq!(public(&h.state).await.revision, 1);
}

#[tokio::test]
async fn operations_other_than_start_require_an_event() {
    let h = harness().await;
    let err = operator_service::advance(&h.state).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    assert!(matches!(
        reconciler::reconcile_once(&h.state).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn unknown_round_number_is_invalid_input() {
    let h = harness().await;
    let err = operator_service::start_round(&h.state, 7).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn reconciler_times_out_the_remaining_round1_questions() {
    let h = harness().await;
    play_round1_until_started(&h).await;
    operator_service::judge(&h.state, judge(VerdictDto::Correct))
        .await
        .unwrap();

    assert!(!reconciler::reconcile_once(&h.state).await.unwrap());
    h.clock.advance(60_000);
    assert!(reconciler::reconcile_once(&h.state).await.unwrap());

    let snapshot = public(&h.state).await;
    assert_eq!(snapshot.phase, "round1_completed");
    let played = snapshot
        .packages
        .iter()
        .find(|package| package.round == 1)
        .unwrap();
    assert_eq!(played.history.len(), 2);

    // A timed out question can still be overridden by the operator.
    let timed_out = played.history[1].question_id;
    let overridden = operator_service::judge(
        &h.state,
        JudgeRequest {
            verdict: VerdictDto::Correct,
            team_id: None,
            question_id: Some(timed_out),
        },
    )
    .await
    .unwrap();
    assert_eq!(score(&overridden.snapshot, h.teams[0].id), 20);
}

#[tokio::test]
async fn round3_ranks_by_submission_time() {
    let h = harness().await;
    operator_service::start_round(&h.state, 3).await.unwrap();
    operator_service::assign_package(
        &h.state,
        AssignPackageRequest {
            package_id: None,
            number: Some(1),
        },
    )
    .await
    .unwrap();
    operator_service::start_question(&h.state, StartQuestionRequest { index: None })
        .await
        .unwrap();

    let (early, late) = (h.teams[1].id, h.teams[0].id);
    team_service::submit_answer(&h.state, early, SubmitAnswerRequest { text: "first".into() })
        .await
        .unwrap();
    h.clock.advance(250);
    team_service::submit_answer(&h.state, late, SubmitAnswerRequest { text: "second".into() })
        .await
        .unwrap();
    let duplicate =
        team_service::submit_answer(&h.state, late, SubmitAnswerRequest { text: "again".into() })
            .await
            .unwrap_err();
    assert!(matches!(duplicate, ServiceError::InvalidState(_)));

    operator_service::advance(&h.state).await.unwrap();
    // Judge the later submission first; ranking must not depend on judging order.
    operator_service::judge(
        &h.state,
        JudgeRequest {
            verdict: VerdictDto::Correct,
            team_id: Some(late),
            question_id: None,
        },
    )
    .await
    .unwrap();
    let done = operator_service::judge(
        &h.state,
        JudgeRequest {
            verdict: VerdictDto::Correct,
            team_id: Some(early),
            question_id: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(score(&done.snapshot, early), 40);
    assert_eq!(score(&done.snapshot, late), 30);
    assert_eq!(score(&done.snapshot, h.teams[2].id), 0);
}

#[tokio::test]
async fn round4_star_doubles_the_loss_and_a_steal_scores() {
    let h = harness().await;
    let (active, stealer) = (h.teams[0].id, h.teams[1].id);
    operator_service::start_round(&h.state, 4).await.unwrap();
    operator_service::select_team(&h.state, SelectTeamRequest { team_id: active })
        .await
        .unwrap();
    let drawn = operator_service::select_tier(&h.state, SelectTierRequest { tier: TierDto::Low })
        .await
        .unwrap();
    assert_eq!(drawn.snapshot.phase, "round4_star_decision");

    team_service::confirm_star(&h.state, active, ConfirmStarRequest { use_star: true })
        .await
        .unwrap();
    operator_service::start_question(&h.state, StartQuestionRequest { index: None })
        .await
        .unwrap();
    let open = operator_service::judge(&h.state, judge(VerdictDto::Wrong))
        .await
        .unwrap();
    assert_eq!(open.snapshot.phase, "round4_steal_open");
    assert_eq!(score(&open.snapshot, active), -10);

    let own = team_service::buzz_steal(&h.state, active).await.unwrap_err();
    assert!(matches!(own, ServiceError::InvalidState(_)));
    team_service::buzz_steal(&h.state, stealer).await.unwrap();
    let late = team_service::buzz_steal(&h.state, h.teams[2].id)
        .await
        .unwrap_err();
    assert!(matches!(late, ServiceError::InvalidState(_)));

    let stolen = operator_service::judge(&h.state, judge(VerdictDto::Correct))
        .await
        .unwrap();
    assert_eq!(score(&stolen.snapshot, stealer), 10);
    // Star already spent, so the next question skips the decision.
    assert_eq!(stolen.snapshot.phase, "round4_question_ready");
}

#[tokio::test]
async fn expired_steal_window_rejects_late_buzzes() {
    let h = harness().await;
    let active = h.teams[0].id;
    operator_service::start_round(&h.state, 4).await.unwrap();
    operator_service::select_team(&h.state, SelectTeamRequest { team_id: active })
        .await
        .unwrap();
    operator_service::select_tier(&h.state, SelectTierRequest { tier: TierDto::Low })
        .await
        .unwrap();
    team_service::confirm_star(&h.state, active, ConfirmStarRequest { use_star: false })
        .await
        .unwrap();
    operator_service::start_question(&h.state, StartQuestionRequest { index: None })
        .await
        .unwrap();
    operator_service::judge(&h.state, judge(VerdictDto::Wrong))
        .await
        .unwrap();

    h.clock.advance(5_000);
    assert!(reconciler::reconcile_once(&h.state).await.unwrap());
    assert_eq!(public(&h.state).await.phase, "round4_steal_closed");

    let err = team_service::buzz_steal(&h.state, h.teams[1].id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
    assert_eq!(score(&public(&h.state).await, active), 0);
}

#[tokio::test]
async fn reset_game_restores_scores_and_packages() {
    let h = harness().await;
    play_round1_until_started(&h).await;
    operator_service::judge(&h.state, judge(VerdictDto::Correct))
        .await
        .unwrap();

    let reset = operator_service::reset_game(&h.state).await.unwrap();
    assert_eq!(reset.snapshot.phase, "lobby");
    assert!(reset.snapshot.teams.iter().all(|team| team.score == 0));
    assert!(
        reset
            .snapshot
            .packages
            .iter()
            .all(|package| package.status == PackageStatus::Unassigned && package.history.is_empty())
    );
}

#[tokio::test]
async fn reset_game_repairs_an_event_that_cannot_be_reconciled() {
    let h = harness().await;
    let mut broken = EventState::new(&h.teams, START_MS);
    broken.round = RoundState::Round1(Round1State {
        phase: Round1Phase::InProgress,
        ..Round1State::default()
    });
    broken.timer = Some(QuestionTimer {
        ends_at_ms: START_MS - 1,
        running: true,
    });
    let store = h.state.event_store().await.unwrap();
    store
        .commit(EventCommit {
            expected_revision: 0,
            document: EventDocument {
                revision: 1,
                state: broken,
            },
            packages: Vec::new(),
        })
        .await
        .unwrap();

    assert!(!reconciler::reconcile_once(&h.state).await.unwrap());
    let reset = operator_service::reset_game(&h.state).await.unwrap();
    assert_eq!(reset.snapshot.phase, "lobby");
    assert_eq!(reset.snapshot.revision, 2);
    assert!(reset.snapshot.timer.is_none());
}

#[tokio::test]
async fn degraded_mode_rejects_reads_and_writes() {
    let state = AppState::new(AppConfig::default());
    assert!(matches!(
        operator_service::start_round(&state, 1).await,
        Err(ServiceError::Degraded)
    ));
    assert!(matches!(
        public_service::event_snapshot(&state, Audience::Public).await,
        Err(ServiceError::Degraded)
    ));
}

#[tokio::test]
async fn offline_store_reports_unavailable() {
    let store = MemoryEventStore::new();
    let h = harness_with(Arc::new(store.clone())).await;
    store.set_offline(true);
    let err = operator_service::start_round(&h.state, 1).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));
}

/// Store that simulates another writer winning the first `conflicts` commits.
struct ContendedStore {
    inner: MemoryEventStore,
    conflicts: AtomicU32,
    commits: AtomicU32,
}

impl ContendedStore {
    fn new(conflicts: u32) -> Self {
        Self {
            inner: MemoryEventStore::new(),
            conflicts: AtomicU32::new(conflicts),
            commits: AtomicU32::new(0),
        }
    }
}

impl EventStore for ContendedStore {
    fn load_event(&self) -> BoxFuture<'static, StorageResult<Option<EventDocument>>> {
        self.inner.load_event()
    }

    fn commit(&self, commit: EventCommit) -> BoxFuture<'static, StorageResult<()>> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        let lose = self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if lose {
            let expected = commit.expected_revision;
            return Box::pin(async move {
                Err::<(), _>(StorageError::conflict(expected, Some(expected + 1)))
            });
        }
        EventStore::commit(&self.inner, commit)
    }

    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamProfile>>> {
        self.inner.list_teams()
    }

    fn list_packages(&self) -> BoxFuture<'static, StorageResult<Vec<Package>>> {
        self.inner.list_packages()
    }

    fn list_questions(&self) -> BoxFuture<'static, StorageResult<Vec<Question>>> {
        self.inner.list_questions()
    }

    fn seed(&self, content: ContentBundle) -> BoxFuture<'static, StorageResult<()>> {
        EventStore::seed(&self.inner, content)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}

#[tokio::test(start_paused = true)]
async fn conflicting_commit_is_retried_from_a_fresh_read() {
    let store = Arc::new(ContendedStore::new(2));
    let h = harness_with(store.clone()).await;

    let started = operator_service::start_round(&h.state, 1).await.unwrap();
    assert_eq!(started.snapshot.revision, 1);
    assert_eq!(store.commits.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn persistent_conflicts_surface_as_contention() {
    let store = Arc::new(ContendedStore::new(u32::MAX));
    let h = harness_with(store.clone()).await;

    let err = operator_service::start_round(&h.state, 1).await.unwrap_err();
    assert!(matches!(err, ServiceError::Contention { attempts: 5 }));
    assert_eq!(store.commits.load(Ordering::SeqCst), 5);
    assert_eq!(public(&h.state).await.revision, 0);
}

/// Store whose commits stall until the test hands out a permit.
struct HeldStore {
    inner: MemoryEventStore,
    entered: Arc<Notify>,
    release: Arc<Semaphore>,
}

impl HeldStore {
    fn new() -> Self {
        Self {
            inner: MemoryEventStore::new(),
            entered: Arc::new(Notify::new()),
            release: Arc::new(Semaphore::new(0)),
        }
    }
}

impl EventStore for HeldStore {
    fn load_event(&self) -> BoxFuture<'static, StorageResult<Option<EventDocument>>> {
        self.inner.load_event()
    }

    fn commit(&self, commit: EventCommit) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        let entered = self.entered.clone();
        let release = self.release.clone();
        Box::pin(async move {
            entered.notify_one();
            let _permit = release.acquire().await;
            EventStore::commit(&inner, commit).await
        })
    }

    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamProfile>>> {
        self.inner.list_teams()
    }

    fn list_packages(&self) -> BoxFuture<'static, StorageResult<Vec<Package>>> {
        self.inner.list_packages()
    }

    fn list_questions(&self) -> BoxFuture<'static, StorageResult<Vec<Question>>> {
        self.inner.list_questions()
    }

    fn seed(&self, content: ContentBundle) -> BoxFuture<'static, StorageResult<()>> {
        EventStore::seed(&self.inner, content)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}

#[tokio::test]
async fn snapshot_waits_for_the_commit_in_flight() {
    let store = Arc::new(HeldStore::new());
    let h = harness_with(store.clone()).await;

    let writer = tokio::spawn({
        let state = h.state.clone();
        async move { operator_service::start_round(&state, 1).await }
    });
    store.entered.notified().await;

    let reader = tokio::spawn({
        let state = h.state.clone();
        async move { public(&state).await }
    });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!reader.is_finished());

    store.release.add_permits(1);
    let started = writer.await.unwrap().unwrap();
    let seen = reader.await.unwrap();
    assert_eq!(seen.revision, started.snapshot.revision);
    assert_eq!(seen.phase, started.snapshot.phase);
}
