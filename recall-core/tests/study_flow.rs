//! End-to-end study flow against the SQLite store.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use recall_core::{
    Answer, Conjugated, ExternalStore, FactGraph, Key, ManualClock, Particle, RubyText, Sentence,
    SessionState, SqliteStore, StudySession, SubFact, TextUnit,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
}

fn graph() -> FactGraph {
    let sentence = Sentence::new(
        RubyText::new(vec![
            TextUnit::ruby("猫", "ねこ"),
            "が".into(),
            TextUnit::ruby("魚", "さかな"),
            "を".into(),
            TextUnit::ruby("食", "た"),
            "べた".into(),
        ]),
        vec![
            SubFact::Particle(Particle::new("猫", "が", "魚")),
            SubFact::Conjugated(Conjugated::new(
                vec![TextUnit::ruby("食", "た"), "べた".into()],
                RubyText::plain("食べる"),
            )),
        ],
        BTreeMap::from([("en".to_string(), "The cat ate the fish".to_string())]),
    )
    .unwrap();
    FactGraph::build(vec![sentence]).unwrap()
}

async fn open(store: Arc<SqliteStore>, clock: Arc<ManualClock>) -> StudySession {
    StudySession::builder(graph(), store)
        .clock(clock)
        .open()
        .await
        .unwrap()
}

fn answer_for(session: &StudySession, correct: bool) -> Answer {
    let quiz = session.quiz().unwrap();
    match (quiz.expects_text(), correct) {
        (true, true) => Answer::Text(quiz.solution().split('・').next().unwrap().to_string()),
        (true, false) => Answer::Text("わからない".to_string()),
        (false, knew) => Answer::Binary(knew),
    }
}

#[tokio::test]
async fn test_reviews_survive_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("study.db");
    let clock = Arc::new(ManualClock::new(t0()));

    {
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let mut session = open(store.clone(), clock.clone()).await;
        let learned = session.learn_all().await.unwrap();
        assert_eq!(learned, graph().len());

        session.start().await.unwrap();
        for _ in 0..3 {
            clock.advance(Duration::hours(6));
            let answer = answer_for(&session, true);
            session.answer(answer).await.unwrap();
        }
        session.sync().await.unwrap();

        let events = store.range("quiz/", "quiz/\u{FFFF}").await.unwrap();
        // every key hangs off the one sentence, so each review logs all of them
        assert_eq!(events.len(), 3 * graph().len());
        session.close();
    }

    let store = Arc::new(SqliteStore::open(&path).unwrap());
    let session = open(store, clock.clone()).await;
    let snapshot = session.snapshot().read();
    assert_eq!(snapshot.learned_count(), graph().len());
    for key in graph().keys() {
        let model = snapshot.get(key).unwrap();
        assert_eq!(model.last_seen, t0() + Duration::hours(18));
    }
}

#[tokio::test]
async fn test_failure_feedback_then_restart() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let clock = Arc::new(ManualClock::new(t0()));
    let mut session = open(store, clock.clone()).await;

    let particle = Key::from_raw("model/猫が魚を食べた/particle/猫_が_魚");
    session.learn(&particle).await.unwrap();
    session.start().await.unwrap();
    assert_eq!(session.quiz().unwrap().blanked().as_deref(), Some("猫＿＿魚を食べた"));

    clock.advance(Duration::hours(2));
    let before = session.snapshot().get(&particle).unwrap();
    let answer = answer_for(&session, false);
    session.answer(answer).await.unwrap();
    assert_eq!(session.state().name(), "feedback");

    let after = session.snapshot().get(&particle).unwrap();
    let at = session.now();
    assert!(after.predict_recall(at) <= before.predict_recall(at));

    session.start().await.unwrap();
    assert_eq!(session.state().active_key(), Some(&particle));
    session.end().unwrap();
    assert_eq!(session.state(), &SessionState::Idle);
}
