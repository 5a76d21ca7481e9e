//! Playback pacing, stop/continue policy and dispatch tests.

mod common;

use common::{ScriptedInjector, ScriptedVerifier};
use uiscribe::Point;
use uiscribe_macro_recorder::{
    EventData, Macro, MacroEvent, MacroPlayer, MarkerKind, MouseButton, PlaybackOptions,
};

fn click_at(timestamp: f64, x: i32, y: i32) -> MacroEvent {
    MacroEvent::new(
        timestamp,
        EventData::Click {
            x,
            y,
            button: MouseButton::Left,
            screen_size: (1920, 1080),
        },
    )
}

fn five_click_macro() -> Macro {
    let mut m = Macro::new("five", "");
    for i in 0..5 {
        m.push(click_at(i as f64 * 0.1, 10 * i, 20));
    }
    m.finalize(serde_json::Value::Null);
    m
}

#[tokio::test(start_paused = true)]
async fn test_pacing_scales_recorded_gaps_by_speed() {
    let (injector, _calls) = ScriptedInjector::new();
    let player = MacroPlayer::new(injector, None);

    let mut m = Macro::new("paced", "");
    m.push(click_at(100.0, 1, 1));
    m.push(click_at(102.0, 2, 2));
    m.finalize(serde_json::Value::Null);

    let result = player
        .play(
            &m,
            &PlaybackOptions {
                speed_multiplier: 2.0,
                ..PlaybackOptions::default()
            },
        )
        .await;

    assert!(result.success);
    assert_eq!(result.events_executed, 2);
    // 2.0s of recorded gap at 2x speed is ~1.0s of (virtual) wall time.
    assert!(
        (result.total_duration - 1.0).abs() < 0.05,
        "expected ~1.0s, got {}",
        result.total_duration
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_on_verification_failure_counts_failing_event() {
    let (injector, _calls) = ScriptedInjector::new();
    // Event 3 (index 2) fails verification.
    let verifier = ScriptedVerifier::new(vec![true, true, false, true, true]);
    let player = MacroPlayer::new(injector, Some(verifier));

    let result = player
        .play(
            &five_click_macro(),
            &PlaybackOptions {
                verify_each_step: true,
                stop_on_verification_failure: true,
                ..PlaybackOptions::default()
            },
        )
        .await;

    assert!(!result.success);
    // The failing event's dispatch ran, so it counts as executed.
    assert_eq!(result.events_executed, 3);
    assert!(result.failed_event.is_some());
    assert_eq!(result.verifications.len(), 3);
    assert_eq!(result.verifications_failed(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_continue_mode_executes_all_and_aggregates() {
    let (injector, calls) = ScriptedInjector::new();
    let verifier = ScriptedVerifier::new(vec![true, true, false, true, true]);
    let player = MacroPlayer::new(injector, Some(verifier));

    let result = player
        .play(
            &five_click_macro(),
            &PlaybackOptions {
                verify_each_step: true,
                stop_on_verification_failure: false,
                ..PlaybackOptions::default()
            },
        )
        .await;

    assert_eq!(result.events_executed, 5);
    assert!(result.failed_event.is_none());
    assert_eq!(result.verifications.len(), 5);
    assert_eq!(result.verifications_passed(), 4);
    assert_eq!(result.verifications_failed(), 1);
    // A failed verification still fails the run overall.
    assert!(!result.success);
    assert_eq!(calls.lock().unwrap().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_failure_follows_stop_policy() {
    let (injector, calls) = ScriptedInjector::failing_on(2);
    let player = MacroPlayer::new(injector, None);

    let result = player
        .play(
            &five_click_macro(),
            &PlaybackOptions {
                stop_on_verification_failure: true,
                ..PlaybackOptions::default()
            },
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.events_executed, 2);
    assert!(result.failed_event.is_some());
    assert!(result.error.is_some());
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_failure_continue_mode_keeps_going() {
    let (injector, calls) = ScriptedInjector::failing_on(2);
    let player = MacroPlayer::new(injector, None);

    let result = player
        .play(
            &five_click_macro(),
            &PlaybackOptions {
                stop_on_verification_failure: false,
                ..PlaybackOptions::default()
            },
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.events_executed, 5);
    assert!(result.failed_event.is_none());
    assert_eq!(calls.lock().unwrap().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_markers_and_waits_replay_without_injection() {
    let (injector, calls) = ScriptedInjector::new();
    let player = MacroPlayer::new(injector, None);

    let mut m = Macro::new("markers", "");
    m.push(MacroEvent::new(
        0.0,
        EventData::Marker {
            action: MarkerKind::InitialState,
            cursor_position: Point::new(0, 0),
        },
    ));
    m.push(click_at(0.5, 40, 50));
    m.push(MacroEvent::new(1.0, EventData::Wait { duration: 2.0 }));
    m.push(MacroEvent::new(
        3.5,
        EventData::Marker {
            action: MarkerKind::FinalState,
            cursor_position: Point::new(0, 0),
        },
    ));
    m.finalize(serde_json::Value::Null);

    let result = player.play(&m, &PlaybackOptions::default()).await;

    assert!(result.success);
    assert_eq!(result.events_executed, 4);
    let calls = calls.lock().unwrap();
    assert_eq!(calls.as_slice(), ["click(40,50,Left)"]);
}

#[tokio::test(start_paused = true)]
async fn test_dry_run_paces_but_never_dispatches() {
    let (injector, calls) = ScriptedInjector::new();
    let verifier = ScriptedVerifier::new(vec![false; 5]);
    let player = MacroPlayer::new(injector, Some(verifier));

    let result = player
        .play(
            &five_click_macro(),
            &PlaybackOptions {
                dry_run: true,
                verify_each_step: true,
                ..PlaybackOptions::default()
            },
        )
        .await;

    assert!(result.success);
    assert_eq!(result.events_executed, 5);
    assert!(calls.lock().unwrap().is_empty());
    assert!(result.verifications.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_playback_fails_fast() {
    let (injector, _calls) = ScriptedInjector::new();
    let player = MacroPlayer::new(injector, None);

    let mut slow = Macro::new("slow", "");
    slow.push(click_at(0.0, 1, 1));
    slow.push(click_at(10.0, 2, 2));
    slow.finalize(serde_json::Value::Null);

    let options = PlaybackOptions::default();
    let (first, second) = tokio::join!(player.play(&slow, &options), player.play(&slow, &options));

    // One of the two must have been rejected outright.
    let rejected = [&first, &second]
        .iter()
        .filter(|r| {
            r.error
                .as_deref()
                .is_some_and(|e| e.contains("already in progress"))
        })
        .count();
    assert_eq!(rejected, 1);
    assert!(first.success || second.success);
}
