use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info};

use practice_core::hold_timer::{Frame, Tick, TimerReading};
use practice_core::model::{Pose, PracticeSettings, Session};

use super::PracticeAttempt;
use crate::Clock;
use crate::error::PracticeError;

const READING_BUFFER: usize = 64;

/// Produces the classifier output for the targeted pose at each tick.
pub trait FrameSource: Send + 'static {
    fn capture(&mut self, at: DateTime<Utc>) -> Frame;
}

impl<F> FrameSource for F
where
    F: FnMut(DateTime<Utc>) -> Frame + Send + 'static,
{
    fn capture(&mut self, at: DateTime<Utc>) -> Frame {
        self(at)
    }
}

/// Replays a fixed list of confidences, then repeats the last one.
#[derive(Debug, Clone)]
pub struct ScriptedFrames {
    confidences: Vec<f64>,
    next: usize,
}

impl ScriptedFrames {
    #[must_use]
    pub fn new(confidences: Vec<f64>) -> Self {
        Self {
            confidences,
            next: 0,
        }
    }
}

impl FrameSource for ScriptedFrames {
    fn capture(&mut self, at: DateTime<Utc>) -> Frame {
        let index = self.next.min(self.confidences.len().saturating_sub(1));
        self.next = self.next.saturating_add(1);
        match self.confidences.get(index) {
            Some(confidence) => Frame::new(at, *confidence),
            None => Frame::empty(at),
        }
    }
}

/// Control side of a running practice loop.
#[derive(Debug)]
pub struct PracticeHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<Result<Session, PracticeError>>,
}

impl PracticeHandle {
    /// Halt the loop and return the finished session.
    ///
    /// The loop checks the stop signal before every tick, so no frame is
    /// processed once this has been called.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Aborted` if the loop task panicked or was
    /// cancelled.
    pub async fn stop(self) -> Result<Session, PracticeError> {
        // A send error means the loop already exited; its result is still in the task.
        let _ = self.stop_tx.send(true);
        self.task.await.map_err(|_| PracticeError::Aborted)?
    }
}

pub struct PracticeLoop;

impl PracticeLoop {
    /// Start ticking `source` for `pose` on the runtime.
    ///
    /// Readings are published on the returned receiver; dropping it does not
    /// stop the loop.
    #[must_use]
    pub fn spawn<S: FrameSource>(
        source: S,
        pose: Pose,
        settings: PracticeSettings,
        clock: Clock,
    ) -> (PracticeHandle, mpsc::Receiver<TimerReading>) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (reading_tx, reading_rx) = mpsc::channel(READING_BUFFER);
        let task = tokio::spawn(run(source, pose, settings, clock, stop_rx, reading_tx));
        (PracticeHandle { stop_tx, task }, reading_rx)
    }
}

async fn run<S: FrameSource>(
    mut source: S,
    pose: Pose,
    settings: PracticeSettings,
    clock: Clock,
    mut stop_rx: watch::Receiver<bool>,
    readings: mpsc::Sender<TimerReading>,
) -> Result<Session, PracticeError> {
    let started_at = clock.now();
    let origin = Instant::now();
    let elapsed_since = |instant: Instant| {
        TimeDelta::from_std(instant.duration_since(origin)).unwrap_or(TimeDelta::zero())
    };

    let mut attempt = PracticeAttempt::start(pose, &settings, started_at);
    let mut ticker = interval(std::time::Duration::from_millis(settings.tick_interval_ms()));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(pose = %pose, threshold = settings.threshold().percent(), "practice started");

    loop {
        tokio::select! {
            biased;

            changed = stop_rx.changed() => {
                // A dropped handle stops the loop as well.
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }

            instant = ticker.tick() => {
                let frame = source.capture(started_at + elapsed_since(instant));
                if let Tick::Reading(reading) = attempt.observe(&frame) {
                    if reading.new_best {
                        debug!(pose = %pose, hold_secs = reading.hold_secs, "new best hold");
                    }
                    // UI consumers may lag or go away; the attempt carries on.
                    let _ = readings.try_send(reading);
                }
            }
        }
    }

    let ended_at = started_at + elapsed_since(Instant::now());
    let session = attempt.finish(ended_at)?;
    info!(
        pose = %pose,
        best_hold = session.best_hold(),
        duration = session.duration(),
        "practice stopped"
    );
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use practice_core::time::fixed_now;

    #[test]
    fn scripted_frames_repeat_last_value() {
        let mut frames = ScriptedFrames::new(vec![10.0, 99.0]);
        let at = fixed_now();
        assert_eq!(frames.capture(at).confidence(), Some(10.0));
        assert_eq!(frames.capture(at).confidence(), Some(99.0));
        assert_eq!(frames.capture(at).confidence(), Some(99.0));

        let mut empty = ScriptedFrames::new(Vec::new());
        assert_eq!(empty.capture(at).confidence(), None);
    }
}
