//! Personal-FM engine: promotion, lookahead, retry budget, priming.

mod support;

use core_player::error::PlayerError;
use core_player::fm::{FmPhase, PersonalFmEngine};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use support::*;

fn engine(gateway: &Arc<ScriptedGateway>) -> PersonalFmEngine {
    PersonalFmEngine::new(gateway.clone(), 5, Duration::from_secs(1))
}

#[tokio::test(start_paused = true)]
async fn advance_promotes_next_and_prefetches_a_new_one() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push_fm_batch(vec![make_track(103)]);

    let fm = engine(&gateway);
    fm.restore(Some(make_track(101)), Some(make_track(102)));

    let promoted = fm.advance().await.unwrap().unwrap();
    assert_eq!(promoted.id.0, 102);
    assert_eq!(fm.current().unwrap().id.0, 102);

    // Lookahead fetch runs in the background, depth exactly one.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(fm.peek_next().unwrap().id.0, 103);
    assert_eq!(gateway.fm_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fm.phase(), FmPhase::Loaded);
}

#[tokio::test(start_paused = true)]
async fn lookahead_equal_to_current_is_not_promoted() {
    let gateway = Arc::new(ScriptedGateway::new());
    let fm = engine(&gateway);
    fm.restore(Some(make_track(101)), Some(make_track(101)));

    let advanced = fm.advance().await.unwrap();
    assert!(advanced.is_none());
    assert_eq!(fm.current().unwrap().id.0, 101);
    // No promotion happened, so no lookahead fetch either.
    assert_eq!(gateway.fm_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn cold_start_retries_then_succeeds() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push_fm_batch(Vec::new());
    gateway.push_fm_error();
    gateway.push_fm_batch(vec![make_track(201)]);
    gateway.push_fm_batch(vec![make_track(202)]);

    let fm = engine(&gateway);
    let promoted = fm.advance().await.unwrap().unwrap();

    assert_eq!(promoted.id.0, 201);
    // Empty batch + error + success, then one lookahead fetch.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(gateway.fm_calls.load(Ordering::SeqCst), 4);
    assert_eq!(fm.peek_next().unwrap().id.0, 202);
}

#[tokio::test(start_paused = true)]
async fn exhausting_the_budget_returns_to_off() {
    let gateway = Arc::new(ScriptedGateway::new());
    // No scripted batches: every attempt comes back empty.

    let fm = engine(&gateway);
    let result = fm.advance().await;

    match result {
        Err(PlayerError::FmExhausted { attempts }) => assert_eq!(attempts, 5),
        other => panic!("expected FmExhausted, got {other:?}"),
    }
    assert_eq!(gateway.fm_calls.load(Ordering::SeqCst), 5);
    assert_eq!(fm.phase(), FmPhase::Off);
    assert!(fm.current().is_none());
}

#[tokio::test(start_paused = true)]
async fn prime_refills_an_inconsistent_feed() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push_fm_batch(vec![make_track(301), make_track(302)]);

    let fm = engine(&gateway);
    // current == next is the inconsistent shape that forces a refetch.
    fm.restore(Some(make_track(7)), Some(make_track(7)));

    fm.prime();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(fm.current().unwrap().id.0, 301);
    assert_eq!(fm.peek_next().unwrap().id.0, 302);
}

#[tokio::test(start_paused = true)]
async fn prime_is_a_noop_for_a_healthy_feed() {
    let gateway = Arc::new(ScriptedGateway::new());
    let fm = engine(&gateway);
    fm.restore(Some(make_track(1)), Some(make_track(2)));

    fm.prime();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(gateway.fm_calls.load(Ordering::SeqCst), 0);
    assert_eq!(fm.current().unwrap().id.0, 1);
}
