//! Integration tests for `GameService`: full games against the in-memory
//! store, with scripted expressions and a hand-driven clock.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use matharena::prelude::*;

// =========================================================================
// Helpers
// =========================================================================

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn secs(n: i64) -> TimeDelta {
    TimeDelta::seconds(n)
}

const ALICE: UserId = UserId(1);
const BOB: UserId = UserId(2);
const BUDGET: Duration = Duration::from_secs(10);

/// A service whose sessions are served 1, 2, 3, ... so the right answer is
/// always `score + 1`.
fn scripted_service() -> GameService<InMemorySessionStore> {
    GameService::builder()
        .generator_factory(|| -> Box<dyn Generator> {
            Box::new(SequenceGenerator::new(
                (1..=1000).map(Expression::constant),
            ))
        })
        .build(InMemorySessionStore::with_users([ALICE, BOB]))
}

async fn start(service: &GameService<InMemorySessionStore>) -> SessionView {
    service
        .create_session(ALICE, BUDGET, Difficulty::Easy, t0())
        .await
        .unwrap()
}

// =========================================================================
// create_session
// =========================================================================

#[tokio::test]
async fn test_create_session_registers_and_records_start() {
    let service = scripted_service();

    let view = start(&service).await;

    assert_eq!(view.id, SessionId(1), "id comes from the store");
    assert_eq!(view.user_id, ALICE);
    assert_eq!(view.expression, "1");
    assert_eq!(view.score, 0);
    assert_eq!(view.time_left_ms, 10_000);
    assert_eq!(view.finished_at, None);
    assert_eq!(service.active_sessions().await, 1);

    let record = service.store().record(view.id).await.unwrap();
    assert_eq!(record.started_at, t0());
    assert_eq!(record.finished_at, None);
}

#[tokio::test]
async fn test_create_session_unknown_user_returns_store_error() {
    let service = scripted_service();

    let result = service
        .create_session(UserId(99), BUDGET, Difficulty::Easy, t0())
        .await;

    assert!(matches!(
        result,
        Err(MatharenaError::Store(StoreError::UserNotFound(UserId(99))))
    ));
    assert_eq!(service.active_sessions().await, 0);
}

#[tokio::test]
async fn test_create_session_unsupported_difficulty_closes_store_record() {
    let service = GameService::builder().build(InMemorySessionStore::new());

    let result = service
        .create_session(ALICE, BUDGET, Difficulty::Medium, t0())
        .await;

    assert!(matches!(
        result,
        Err(MatharenaError::Session(SessionError::Generate(
            GenerateError::Unsupported(Difficulty::Medium)
        )))
    ));
    assert_eq!(service.active_sessions().await, 0);
    let record = service.store().record(SessionId(1)).await.unwrap();
    assert_eq!(record.finished_at, Some(t0()));
    assert_eq!(record.score, 0);
}

#[tokio::test]
async fn test_create_session_random_generator_serves_easy_sums() {
    let service = GameService::builder().build(InMemorySessionStore::new());

    let view = service
        .create_session(ALICE, BUDGET, Difficulty::Easy, t0())
        .await
        .unwrap();

    let terms: Vec<i64> = view
        .expression
        .split('+')
        .map(|t| t.parse().unwrap())
        .collect();
    assert!((2..=3).contains(&terms.len()), "got {}", view.expression);
    assert!(terms.iter().all(|t| (0..50).contains(t)));
}

// =========================================================================
// submit_answer
// =========================================================================

#[tokio::test]
async fn test_submit_answer_correct_adds_time_and_score() {
    let service = scripted_service();
    let view = start(&service).await;

    let answer = service
        .submit_answer(view.id, ALICE, 1, t0() + secs(2))
        .await
        .unwrap();

    assert_eq!(answer.outcome, Outcome::Correct);
    assert_eq!(answer.session.score, 1);
    assert_eq!(answer.session.expression, "2");
    // 10s - 2s elapsed + 5s reward.
    assert_eq!(answer.session.time_left_ms, 13_000);
}

#[tokio::test]
async fn test_submit_answer_incorrect_costs_time() {
    let service = scripted_service();
    let view = start(&service).await;

    let answer = service
        .submit_answer(view.id, ALICE, 77, t0() + secs(1))
        .await
        .unwrap();

    assert_eq!(answer.outcome, Outcome::Incorrect);
    assert_eq!(answer.session.score, 0);
    assert_eq!(answer.session.expression, "2");
    // 10s - 1s elapsed - 5s penalty.
    assert_eq!(answer.session.time_left_ms, 4_000);
}

#[tokio::test]
async fn test_submit_answer_wrong_owner_returns_invalid_session() {
    let service = scripted_service();
    let view = start(&service).await;

    let result = service.submit_answer(view.id, BOB, 1, t0()).await;

    match result {
        Err(MatharenaError::InvalidSession {
            id,
            source: SessionError::OwnerMismatch { user_id, .. },
        }) => {
            assert_eq!(id, view.id);
            assert_eq!(user_id, BOB);
        }
        other => panic!("expected owner mismatch, got {other:?}"),
    }
    // The owner can still play.
    let answer = service.submit_answer(view.id, ALICE, 1, t0()).await.unwrap();
    assert_eq!(answer.outcome, Outcome::Correct);
}

#[tokio::test]
async fn test_submit_answer_unknown_session_returns_invalid_session() {
    let service = scripted_service();

    let result = service.submit_answer(SessionId(404), ALICE, 1, t0()).await;

    assert!(matches!(
        result,
        Err(MatharenaError::InvalidSession {
            source: SessionError::NotFound(SessionId(404)),
            ..
        })
    ));
}

#[tokio::test]
async fn test_submit_answer_that_spends_budget_records_finish() {
    let service = scripted_service();
    let view = start(&service).await;

    // 10s - 6s elapsed - 5s penalty crosses zero 1s before the answer.
    let answer = service
        .submit_answer(view.id, ALICE, 0, t0() + secs(6))
        .await
        .unwrap();

    assert_eq!(answer.outcome, Outcome::Expired);
    assert_eq!(answer.session.time_left_ms, 0);
    assert_eq!(answer.session.finished_at, Some(t0() + secs(5)));
    assert_eq!(service.active_sessions().await, 0);

    let record = service.store().record(view.id).await.unwrap();
    assert_eq!(record.finished_at, Some(t0() + secs(5)));
}

#[tokio::test]
async fn test_submit_answer_after_deadline_returns_invalid_and_records_once() {
    let service = scripted_service();
    let view = start(&service).await;
    service
        .submit_answer(view.id, ALICE, 1, t0() + secs(1))
        .await
        .unwrap();

    // Deadline is now t0 + 1s + 14s.
    let late = service
        .submit_answer(view.id, ALICE, 2, t0() + secs(20))
        .await;
    let later = service
        .submit_answer(view.id, ALICE, 2, t0() + secs(21))
        .await;

    assert!(matches!(
        late,
        Err(MatharenaError::InvalidSession {
            source: SessionError::Expired(_),
            ..
        })
    ));
    assert!(matches!(
        later,
        Err(MatharenaError::InvalidSession {
            source: SessionError::NotFound(_),
            ..
        })
    ));

    let record = service.store().record(view.id).await.unwrap();
    assert_eq!(record.finished_at, Some(t0() + secs(15)));
    assert_eq!(record.score, 1);
    assert_eq!(service.store().finished_count().await, 1);
}

#[tokio::test]
async fn test_submit_answer_failed_generation_does_not_score() {
    let service = GameService::builder()
        .generator_factory(|| -> Box<dyn Generator> {
            Box::new(SequenceGenerator::new([Expression::constant(7)]))
        })
        .build(InMemorySessionStore::new());
    let view = start(&service).await;

    for _ in 0..2 {
        let result = service.submit_answer(view.id, ALICE, 7, t0() + secs(1)).await;
        assert!(matches!(
            result,
            Err(MatharenaError::Session(SessionError::Generate(
                GenerateError::Exhausted
            )))
        ));
    }

    let after = service.session(view.id, t0() + secs(1)).await.unwrap();
    assert_eq!(after.score, 0);
    assert_eq!(after.time_left_ms, 10_000);
    assert_eq!(after.expression, "7");
    assert_eq!(after.finished_at, None);
}

// =========================================================================
// stop_session
// =========================================================================

#[tokio::test]
async fn test_stop_session_records_finish_at_now() {
    let service = scripted_service();
    let view = start(&service).await;
    service.submit_answer(view.id, ALICE, 1, t0()).await.unwrap();

    let stopped = service
        .stop_session(view.id, ALICE, t0() + secs(3))
        .await
        .unwrap();

    assert_eq!(stopped.finished_at, Some(t0() + secs(3)));
    assert_eq!(stopped.score, 1);
    assert_eq!(service.active_sessions().await, 0);
    let record = service.store().record(view.id).await.unwrap();
    assert_eq!(record.finished_at, Some(t0() + secs(3)));
    assert_eq!(record.score, 1);
}

#[tokio::test]
async fn test_stop_session_twice_returns_invalid_session() {
    let service = scripted_service();
    let view = start(&service).await;
    service.stop_session(view.id, ALICE, t0()).await.unwrap();

    let result = service.stop_session(view.id, ALICE, t0()).await;

    assert!(matches!(result, Err(MatharenaError::InvalidSession { .. })));
    assert_eq!(service.store().finished_count().await, 1);
}

#[tokio::test]
async fn test_stop_session_after_deadline_returns_already_stopped() {
    let service = scripted_service();
    let view = start(&service).await;

    let result = service.stop_session(view.id, ALICE, t0() + secs(30)).await;

    assert!(matches!(result, Err(MatharenaError::AlreadyStopped(id)) if id == view.id));
    let record = service.store().record(view.id).await.unwrap();
    assert_eq!(record.finished_at, Some(t0() + secs(10)));
}

#[tokio::test]
async fn test_stop_session_wrong_owner_leaves_session_running() {
    let service = scripted_service();
    let view = start(&service).await;

    let result = service.stop_session(view.id, BOB, t0()).await;

    assert!(matches!(result, Err(MatharenaError::InvalidSession { .. })));
    assert_eq!(service.active_sessions().await, 1);
}

// =========================================================================
// session() / sweep_expired()
// =========================================================================

#[tokio::test]
async fn test_session_lookup_past_deadline_records_finish() {
    let service = scripted_service();
    let view = start(&service).await;

    assert!(service.session(view.id, t0() + secs(9)).await.is_ok());
    let result = service.session(view.id, t0() + secs(10)).await;

    assert!(matches!(result, Err(MatharenaError::InvalidSession { .. })));
    let record = service.store().record(view.id).await.unwrap();
    assert_eq!(record.finished_at, Some(t0() + secs(10)));
}

#[tokio::test]
async fn test_sweep_expired_records_each_finish() {
    let service = scripted_service();
    let first = start(&service).await;
    let second = service
        .create_session(BOB, Duration::from_secs(60), Difficulty::Easy, t0())
        .await
        .unwrap();

    let report = service.sweep_expired(t0() + secs(30)).await;

    assert_eq!(report.len(), 1);
    assert!(report.failed.is_empty());
    assert_eq!(report.recorded[0].id, first.id);
    assert_eq!(report.recorded[0].time_left_ms, 0);
    assert_eq!(service.store().finished_count().await, 1);
    assert!(service.session(second.id, t0() + secs(30)).await.is_ok());
}

/// Accepts starts, refuses every finish.
#[derive(Default)]
struct RejectingFinishStore {
    inner: InMemorySessionStore,
}

impl SessionStore for RejectingFinishStore {
    async fn create_session(
        &self,
        user_id: UserId,
        started_at: DateTime<Utc>,
    ) -> Result<SessionId, StoreError> {
        self.inner.create_session(user_id, started_at).await
    }

    async fn finish_session(&self, _record: FinishedSession) -> Result<(), StoreError> {
        Err(StoreError::Backend("disk full".into()))
    }
}

#[tokio::test]
async fn test_sweep_expired_reports_store_failures() {
    let service = GameService::builder().build(RejectingFinishStore::default());
    let view = service
        .create_session(ALICE, BUDGET, Difficulty::Easy, t0())
        .await
        .unwrap();

    let report = service.sweep_expired(t0() + secs(30)).await;

    assert!(report.recorded.is_empty());
    assert_eq!(report.failed.len(), 1);
    let (failed, err) = &report.failed[0];
    assert_eq!(failed.id, view.id);
    assert_eq!(failed.finished_at, Some(t0() + secs(10)));
    assert!(matches!(err, MatharenaError::Store(StoreError::Backend(_))));
    assert_eq!(service.active_sessions().await, 0);
}

#[tokio::test]
async fn test_sweep_expired_nothing_due_returns_empty_report() {
    let service = scripted_service();
    start(&service).await;

    let report = service.sweep_expired(t0() + secs(5)).await;

    assert!(report.is_empty());
    assert_eq!(service.active_sessions().await, 1);
}

// =========================================================================
// Configuration / concurrency
// =========================================================================

#[tokio::test]
async fn test_builder_clamps_oversized_config() {
    let service = GameService::builder()
        .session_config(SessionConfig {
            start_budget: Duration::from_secs(365 * 24 * 60 * 60),
            ..SessionConfig::default()
        })
        .build(InMemorySessionStore::new());

    assert_eq!(service.session_config().start_budget, SessionConfig::MAX_DURATION);
}

#[tokio::test]
async fn test_custom_deltas_apply_to_new_sessions() {
    let service = GameService::builder()
        .session_config(SessionConfig {
            deltas: Deltas {
                on_correct: Duration::from_secs(1),
                on_incorrect: Duration::from_secs(2),
            },
            ..SessionConfig::default()
        })
        .generator_factory(|| -> Box<dyn Generator> {
            Box::new(SequenceGenerator::new((1..=10).map(Expression::constant)))
        })
        .build(InMemorySessionStore::new());
    let view = start(&service).await;

    let correct = service.submit_answer(view.id, ALICE, 1, t0()).await.unwrap();
    let wrong = service.submit_answer(view.id, ALICE, 0, t0()).await.unwrap();

    assert_eq!(correct.session.time_left_ms, 11_000);
    assert_eq!(wrong.session.time_left_ms, 9_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_answers_and_stop_record_finish_exactly_once() {
    let service = scripted_service();
    let view = start(&service).await;

    let mut handles = Vec::new();
    for i in 0..32 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            if i == 16 {
                service.stop_session(view.id, ALICE, t0()).await.map(|_| ())
            } else {
                service
                    .submit_answer(view.id, ALICE, -1, t0())
                    .await
                    .map(|_| ())
            }
        }));
    }

    let results: Vec<_> = join_all(handles).await;
    let ok = results.iter().filter(|r| r.is_ok()).count();
    assert!(ok >= 1, "the first caller always gets through");
    for result in &results {
        if let Err(err) = result {
            assert!(
                matches!(err, MatharenaError::InvalidSession { .. }),
                "unexpected error: {err}"
            );
        }
    }

    assert_eq!(service.active_sessions().await, 0);
    assert_eq!(service.store().finished_count().await, 1);
}

async fn join_all(
    handles: Vec<tokio::task::JoinHandle<Result<(), MatharenaError>>>,
) -> Vec<Result<(), MatharenaError>> {
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

#[tokio::test]
async fn test_service_clones_share_state() {
    let service = scripted_service();
    let clone = service.clone();

    let view = start(&service).await;

    assert!(clone.session(view.id, t0()).await.is_ok());
}
