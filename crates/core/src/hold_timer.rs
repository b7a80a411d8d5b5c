//! Hold detection over a stream of per-frame confidence scores.
//!
//! The timer owns its state; callers keep one instance per active attempt.
//! It never fails: frames it cannot use produce `Tick::NoSignal`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::HoldThreshold;
use crate::time::seconds_between;

/// A keypoint at or below this score is treated as not detected.
pub const MIN_KEYPOINT_SCORE: f32 = 0.2;

/// More missing keypoints than this invalidates the frame.
pub const MAX_MISSING_KEYPOINTS: usize = 4;

const CLOSE_FLOOR: f64 = 80.0;
const WARMING_FLOOR: f64 = 50.0;

/// Feedback zone for one confidence reading. Ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Idle,
    Warming,
    Close,
    Perfect,
}

impl Zone {
    #[must_use]
    pub fn classify(confidence: f64, threshold: HoldThreshold) -> Self {
        if confidence >= threshold.percent() {
            Zone::Perfect
        } else if confidence >= CLOSE_FLOOR {
            Zone::Close
        } else if confidence >= WARMING_FLOOR {
            Zone::Warming
        } else {
            Zone::Idle
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Zone::Idle => "idle",
            Zone::Warming => "warming",
            Zone::Close => "close",
            Zone::Perfect => "perfect",
        }
    }

    /// Short coaching line for presentation layers.
    #[must_use]
    pub fn prompt(self) -> &'static str {
        match self {
            Zone::Idle => "Keep trying! Adjust your position.",
            Zone::Warming => "Getting close. Keep adjusting.",
            Zone::Close => "Almost there! Small adjustments needed.",
            Zone::Perfect => "Perfect! Hold this pose.",
        }
    }
}

/// One classifier output for the targeted pose.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    at: DateTime<Utc>,
    confidence: Option<f64>,
    keypoint_scores: Vec<f32>,
}

impl Frame {
    #[must_use]
    pub fn new(at: DateTime<Utc>, confidence: f64) -> Self {
        Self {
            at,
            confidence: Some(confidence),
            keypoint_scores: Vec::new(),
        }
    }

    /// A tick where no pose estimate was produced.
    #[must_use]
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self {
            at,
            confidence: None,
            keypoint_scores: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_keypoint_scores(mut self, scores: Vec<f32>) -> Self {
        self.keypoint_scores = scores;
        self
    }

    #[must_use]
    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    #[must_use]
    pub fn confidence(&self) -> Option<f64> {
        self.confidence
    }

    fn has_pose(&self) -> bool {
        let missing = self
            .keypoint_scores
            .iter()
            .filter(|score| **score <= MIN_KEYPOINT_SCORE)
            .count();
        missing <= MAX_MISSING_KEYPOINTS
    }

    fn usable_confidence(&self) -> Option<f64> {
        self.confidence
            .filter(|c| c.is_finite() && (0.0..=100.0).contains(c))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerReading {
    pub at: DateTime<Utc>,
    pub confidence: f64,
    pub zone: Zone,
    /// Seconds of the current unbroken hold; 0 when not holding.
    pub hold_secs: f64,
    /// Set when this reading raised the attempt's best hold.
    pub new_best: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    NoSignal,
    Reading(TimerReading),
}

impl Tick {
    #[must_use]
    pub fn reading(&self) -> Option<&TimerReading> {
        match self {
            Tick::Reading(r) => Some(r),
            Tick::NoSignal => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HoldTimer {
    threshold: HoldThreshold,
    hold_started_at: Option<DateTime<Utc>>,
    last_frame_at: Option<DateTime<Utc>>,
    best_hold: f64,
}

impl HoldTimer {
    #[must_use]
    pub fn new(threshold: HoldThreshold) -> Self {
        Self {
            threshold,
            hold_started_at: None,
            last_frame_at: None,
            best_hold: 0.0,
        }
    }

    #[must_use]
    pub fn threshold(&self) -> HoldThreshold {
        self.threshold
    }

    #[must_use]
    pub fn is_holding(&self) -> bool {
        self.hold_started_at.is_some()
    }

    /// Longest hold observed since construction or the last `reset`.
    #[must_use]
    pub fn best_hold(&self) -> f64 {
        self.best_hold
    }

    /// Forget the current hold and the best, e.g. when the target pose changes.
    pub fn reset(&mut self) {
        self.hold_started_at = None;
        self.last_frame_at = None;
        self.best_hold = 0.0;
    }

    /// Process one frame.
    ///
    /// Out-of-order, pose-less and corrupt frames yield `Tick::NoSignal` and
    /// leave the hold state untouched.
    pub fn observe(&mut self, frame: &Frame) -> Tick {
        if self.last_frame_at.is_some_and(|last| frame.at <= last) {
            return Tick::NoSignal;
        }
        self.last_frame_at = Some(frame.at);

        if !frame.has_pose() {
            return Tick::NoSignal;
        }
        let Some(confidence) = frame.usable_confidence() else {
            return Tick::NoSignal;
        };

        let zone = Zone::classify(confidence, self.threshold);
        let hold_secs = if zone == Zone::Perfect {
            let started = *self.hold_started_at.get_or_insert(frame.at);
            seconds_between(started, frame.at)
        } else {
            self.hold_started_at = None;
            0.0
        };

        let new_best = hold_secs > self.best_hold;
        if new_best {
            self.best_hold = hold_secs;
        }

        Tick::Reading(TimerReading {
            at: frame.at,
            confidence,
            zone,
            hold_secs,
            new_best,
        })
    }
}

impl Default for HoldTimer {
    fn default() -> Self {
        Self::new(HoldThreshold::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn frame(secs: i64, confidence: f64) -> Frame {
        Frame::new(fixed_now() + Duration::seconds(secs), confidence)
    }

    fn holds(timer: &mut HoldTimer, readings: &[f64]) -> Vec<f64> {
        readings
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let secs = i64::try_from(i).unwrap();
                timer.observe(&frame(secs, *c)).reading().unwrap().hold_secs
            })
            .collect()
    }

    #[test]
    fn zones_follow_threshold() {
        let t = HoldThreshold::default();
        assert_eq!(Zone::classify(95.0, t), Zone::Perfect);
        assert_eq!(Zone::classify(94.9, t), Zone::Close);
        assert_eq!(Zone::classify(80.0, t), Zone::Close);
        assert_eq!(Zone::classify(50.0, t), Zone::Warming);
        assert_eq!(Zone::classify(49.9, t), Zone::Idle);

        let strict = HoldThreshold::new(99).unwrap();
        assert_eq!(Zone::classify(98.0, strict), Zone::Close);
    }

    #[test]
    fn dip_below_threshold_resets_hold() {
        let mut timer = HoldTimer::default();
        let out = holds(&mut timer, &[96.0, 97.0, 98.0, 94.0, 99.0, 99.0]);
        assert_eq!(out, vec![0.0, 1.0, 2.0, 0.0, 0.0, 1.0]);
        assert!((timer.best_hold() - 2.0).abs() < f64::EPSILON);
        assert!(timer.is_holding());
    }

    #[test]
    fn new_best_fires_only_on_new_maximum() {
        let mut timer = HoldTimer::default();
        let flags: Vec<bool> = [96.0, 97.0, 98.0, 10.0, 99.0, 99.0, 99.0, 99.0]
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let secs = i64::try_from(i).unwrap();
                timer.observe(&frame(secs, *c)).reading().unwrap().new_best
            })
            .collect();
        assert_eq!(
            flags,
            vec![false, true, true, false, false, false, false, true]
        );
    }

    #[test]
    fn pose_less_frame_is_skipped_without_breaking_hold() {
        let mut timer = HoldTimer::default();
        timer.observe(&frame(0, 97.0));

        let blurry = frame(1, 20.0).with_keypoint_scores(vec![0.1; 5]);
        assert_eq!(timer.observe(&blurry), Tick::NoSignal);
        assert!(timer.is_holding());

        let reading = timer.observe(&frame(2, 97.0));
        assert!((reading.reading().unwrap().hold_secs - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn four_missing_keypoints_still_count() {
        let mut timer = HoldTimer::default();
        let mut scores = vec![0.9_f32; 17];
        scores[..4].fill(0.2);
        let tick = timer.observe(&frame(0, 96.0).with_keypoint_scores(scores));
        assert!(tick.reading().is_some());
    }

    #[test]
    fn corrupt_and_out_of_order_frames_are_no_signal() {
        let mut timer = HoldTimer::default();
        assert_eq!(timer.observe(&Frame::empty(fixed_now())), Tick::NoSignal);
        assert_eq!(timer.observe(&frame(1, f64::NAN)), Tick::NoSignal);
        assert_eq!(timer.observe(&frame(2, 140.0)), Tick::NoSignal);
        assert!(timer.observe(&frame(3, 90.0)).reading().is_some());
        assert_eq!(timer.observe(&frame(3, 90.0)), Tick::NoSignal);
        assert_eq!(timer.observe(&frame(1, 90.0)), Tick::NoSignal);
    }

    #[test]
    fn reset_clears_best_and_hold() {
        let mut timer = HoldTimer::default();
        holds(&mut timer, &[99.0, 99.0, 99.0]);
        timer.reset();
        assert!(!timer.is_holding());
        assert_eq!(timer.best_hold(), 0.0);
        assert!(timer.observe(&frame(0, 99.0)).reading().is_some());
    }
}
