//! Eye aspect ratio and PERCLOS drowsiness estimation.

use std::collections::VecDeque;

use attn_models::{FaceLandmarks, Landmark};

/// Blink/PERCLOS parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlinkConfig {
    /// Number of trailing EAR samples considered
    pub window_size: usize,
    /// EAR below which the eyes count as closed
    pub ear_closed_threshold: f64,
    /// PERCLOS above which the participant counts as drowsy
    pub drowsy_perclos_threshold: f64,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            window_size: 60,
            ear_closed_threshold: 0.25,
            drowsy_perclos_threshold: 0.8,
        }
    }
}

/// Blink onsets remembered for the rate estimate.
const BLINK_HISTORY: usize = 32;

/// Upper bound on the reported blink rate, in blinks per minute.
const MAX_BLINK_RATE: f64 = 60.0;

/// Snapshot of a window after a sample was pushed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlinkState {
    pub perclos: f64,
    pub is_drowsy: bool,
    /// Blinks per minute over the remembered blink onsets
    pub blink_rate: f64,
}

/// Sliding window of EAR samples for one track.
#[derive(Debug, Clone)]
pub struct BlinkWindow {
    config: BlinkConfig,
    samples: VecDeque<f64>,
    closed: usize,
    /// Capture times of recent open-to-closed transitions
    blink_onsets: VecDeque<i64>,
}

impl BlinkWindow {
    pub fn new(config: BlinkConfig) -> Self {
        Self {
            config,
            samples: VecDeque::with_capacity(config.window_size),
            closed: 0,
            blink_onsets: VecDeque::with_capacity(BLINK_HISTORY),
        }
    }

    /// Append a sample captured at `timestamp_ms`, evicting the oldest one
    /// once the window is full. Non-finite samples are ignored.
    pub fn push(&mut self, ear: f64, timestamp_ms: i64) -> BlinkState {
        if ear.is_finite() && self.config.window_size > 0 {
            let was_closed = self.samples.back().is_some_and(|&e| self.is_closed(e));
            let now_closed = self.is_closed(ear);
            if now_closed && !was_closed {
                if self.blink_onsets.len() == BLINK_HISTORY {
                    self.blink_onsets.pop_front();
                }
                self.blink_onsets.push_back(timestamp_ms);
            }

            if self.samples.len() == self.config.window_size {
                if let Some(evicted) = self.samples.pop_front() {
                    if self.is_closed(evicted) {
                        self.closed -= 1;
                    }
                }
            }
            self.samples.push_back(ear);
            if now_closed {
                self.closed += 1;
            }
        }

        self.state()
    }

    /// Fraction of samples in the window with eyes closed. Zero when empty.
    pub fn perclos(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.closed as f64 / self.samples.len() as f64
        }
    }

    pub fn is_drowsy(&self) -> bool {
        self.perclos() > self.config.drowsy_perclos_threshold
    }

    pub fn state(&self) -> BlinkState {
        BlinkState {
            perclos: self.perclos(),
            is_drowsy: self.is_drowsy(),
            blink_rate: self.blink_rate(),
        }
    }

    /// Blinks per minute between the first and last remembered onsets,
    /// capped at 60. Zero until two blinks at least a second apart.
    pub fn blink_rate(&self) -> f64 {
        let (Some(&first), Some(&last)) = (self.blink_onsets.front(), self.blink_onsets.back())
        else {
            return 0.0;
        };
        let span_secs = last.saturating_sub(first) as f64 / 1000.0;
        if self.blink_onsets.len() < 2 || span_secs < 1.0 {
            return 0.0;
        }

        let intervals = (self.blink_onsets.len() - 1) as f64;
        (intervals / span_secs * 60.0).min(MAX_BLINK_RATE)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn is_closed(&self, ear: f64) -> bool {
        ear < self.config.ear_closed_threshold
    }
}

impl Default for BlinkWindow {
    fn default() -> Self {
        Self::new(BlinkConfig::default())
    }
}

/// Eye aspect ratio of one six-point eye outline:
/// `(|p2-p6| + |p3-p5|) / (2 * |p1-p4|)`.
pub fn eye_aspect_ratio(eye: &[Landmark; 6]) -> Option<f64> {
    let horizontal = eye[0].distance(&eye[3]);
    if horizontal <= f64::EPSILON {
        return None;
    }
    let vertical = eye[1].distance(&eye[5]) + eye[2].distance(&eye[4]);
    Some(vertical / (2.0 * horizontal))
}

/// EAR averaged over both eyes, or `None` when the mesh lacks eye points.
pub fn ear_from_landmarks(landmarks: &FaceLandmarks) -> Option<f64> {
    let left = eye_aspect_ratio(&landmarks.left_eye()?)?;
    let right = eye_aspect_ratio(&landmarks.right_eye()?)?;
    Some((left + right) / 2.0)
}
