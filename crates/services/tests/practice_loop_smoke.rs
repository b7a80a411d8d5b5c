use std::time::Duration;

use chrono::{DateTime, Utc};

use practice_core::hold_timer::Frame;
use practice_core::model::{DetectionMode, Pose, PracticeSettingsDraft};
use practice_core::time::fixed_now;
use services::{Clock, PracticeLoop, ScriptedFrames};

fn fast_settings() -> practice_core::model::PracticeSettings {
    PracticeSettingsDraft {
        tick_interval_ms: Some(5),
        detection_mode: Some(DetectionMode::Server),
        ..PracticeSettingsDraft::new()
    }
    .validate()
    .unwrap()
}

#[tokio::test]
async fn practice_loop_produces_session_on_stop() {
    let (handle, mut readings) = PracticeLoop::spawn(
        ScriptedFrames::new(vec![40.0, 85.0, 99.0]),
        Pose::Tree,
        fast_settings(),
        Clock::fixed(fixed_now()),
    );

    let mut seen = 0;
    while let Some(reading) = readings.recv().await {
        seen += 1;
        if seen >= 6 {
            assert!(reading.hold_secs > 0.0);
            break;
        }
    }

    let session = handle.stop().await.unwrap();
    assert_eq!(session.pose(), Pose::Tree);
    assert_eq!(session.detection_mode(), DetectionMode::Server);
    assert_eq!(session.start_time(), fixed_now());
    assert!(session.best_hold() > 0.0);
    assert!(session.duration() >= session.best_hold());
}

#[tokio::test]
async fn no_ticks_are_processed_after_stop() {
    let (handle, mut readings) = PracticeLoop::spawn(
        |at: DateTime<Utc>| Frame::new(at, 97.0),
        Pose::Dog,
        fast_settings(),
        Clock::fixed(fixed_now()),
    );
    tokio::time::sleep(Duration::from_millis(30)).await;
    handle.stop().await.unwrap();

    // Drain what was published before stop; the sender is gone afterwards.
    while readings.try_recv().is_ok() {}
    assert!(readings.recv().await.is_none());
}

#[tokio::test]
async fn dropped_reading_receiver_does_not_stop_the_loop() {
    let (handle, readings) = PracticeLoop::spawn(
        ScriptedFrames::new(vec![99.0]),
        Pose::Chair,
        fast_settings(),
        Clock::fixed(fixed_now()),
    );
    drop(readings);
    tokio::time::sleep(Duration::from_millis(30)).await;

    let session = handle.stop().await.unwrap();
    assert!(session.best_hold() > 0.0);
}
