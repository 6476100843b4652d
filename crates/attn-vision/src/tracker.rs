//! IoU-based face tracker for maintaining participant identity across frames.
//!
//! Uses greedy matching by Intersection over Union. Each track also owns
//! the blink window for its face, so PERCLOS history is dropped together
//! with the track.

use std::collections::HashMap;

use attn_models::{BoundingBox, FaceDetection, TrackId, TrackedFace};

use crate::blink::{BlinkConfig, BlinkWindow};

/// Tracker parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    /// Minimum detector confidence to start a new track
    pub min_confidence: f64,
    /// Minimum IoU for a detection to continue an existing track
    pub match_iou_threshold: f64,
    /// Consecutive missed frames tolerated before a track expires
    pub lost_track_buffer: u32,
    pub blink: BlinkConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            match_iou_threshold: 0.8,
            lost_track_buffer: 30,
            blink: BlinkConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct Track {
    bbox: BoundingBox,
    /// Frames since last matched detection
    missed: u32,
    blink: BlinkWindow,
}

/// Result of feeding one frame's detections to the tracker.
#[derive(Debug, Clone, Default)]
pub struct TrackerUpdate {
    /// Faces tracked in this frame, in detection order
    pub faces: Vec<TrackedFace>,
    /// Tracks removed after exceeding the lost-track buffer
    pub expired: Vec<TrackId>,
}

/// Track counts, logged when a meeting session ends.
#[derive(Debug, Clone, Default)]
pub struct TrackerStats {
    pub active_tracks: usize,
    pub lost_tracks: usize,
    pub total_created: u32,
}

/// Per-meeting face tracker. Track ids start at 1 and are never reused.
pub struct FaceTracker {
    config: TrackerConfig,
    tracks: HashMap<TrackId, Track>,
    next_track_id: u32,
}

impl FaceTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: HashMap::new(),
            next_track_id: 1,
        }
    }

    /// Update tracks with new detections.
    pub fn update(&mut self, detections: &[FaceDetection]) -> TrackerUpdate {
        // Every (detection, track) pair above the match threshold, best first
        let mut candidates: Vec<(f64, usize, TrackId)> = Vec::new();
        for (det_idx, det) in detections.iter().enumerate() {
            for (&track_id, track) in &self.tracks {
                let iou = det.bbox.iou(&track.bbox);
                if iou >= self.config.match_iou_threshold {
                    candidates.push((iou, det_idx, track_id));
                }
            }
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.2.cmp(&b.2)));

        let mut assigned: Vec<Option<TrackId>> = vec![None; detections.len()];
        let mut matched_tracks: Vec<TrackId> = Vec::new();
        for (_, det_idx, track_id) in candidates {
            if assigned[det_idx].is_some() || matched_tracks.contains(&track_id) {
                continue;
            }
            assigned[det_idx] = Some(track_id);
            matched_tracks.push(track_id);
        }

        let mut faces = Vec::with_capacity(detections.len());
        for (det, slot) in detections.iter().zip(assigned) {
            let track_id = match slot {
                Some(track_id) => {
                    if let Some(track) = self.tracks.get_mut(&track_id) {
                        track.bbox = det.bbox;
                        track.missed = 0;
                    }
                    track_id
                }
                None if det.confidence >= self.config.min_confidence => {
                    let track_id = self.create_track(det.bbox);
                    matched_tracks.push(track_id);
                    track_id
                }
                None => continue,
            };

            faces.push(TrackedFace {
                track_id,
                bbox: det.bbox,
                confidence: det.confidence,
            });
        }

        // Age unmatched tracks
        let mut expired = Vec::new();
        for (&track_id, track) in self.tracks.iter_mut() {
            if matched_tracks.contains(&track_id) {
                continue;
            }
            track.missed += 1;
            if track.missed > self.config.lost_track_buffer {
                expired.push(track_id);
            }
        }
        for track_id in &expired {
            self.tracks.remove(track_id);
        }
        expired.sort();

        TrackerUpdate { faces, expired }
    }

    fn create_track(&mut self, bbox: BoundingBox) -> TrackId {
        let track_id = TrackId(self.next_track_id);
        self.next_track_id += 1;
        self.tracks.insert(
            track_id,
            Track {
                bbox,
                missed: 0,
                blink: BlinkWindow::new(self.config.blink),
            },
        );
        track_id
    }

    /// Blink window of a live track.
    pub fn blink_window_mut(&mut self, track_id: TrackId) -> Option<&mut BlinkWindow> {
        self.tracks.get_mut(&track_id).map(|t| &mut t.blink)
    }

    /// Number of tracks matched in the most recent frame.
    pub fn active_track_count(&self) -> usize {
        self.tracks.values().filter(|t| t.missed == 0).count()
    }

    pub fn stats(&self) -> TrackerStats {
        let active_tracks = self.active_track_count();
        TrackerStats {
            active_tracks,
            lost_tracks: self.tracks.len() - active_tracks,
            total_created: self.next_track_id - 1,
        }
    }
}

impl Default for FaceTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f64, y: f64, confidence: f64) -> FaceDetection {
        FaceDetection::new(BoundingBox::new(x, y, 100.0, 100.0), confidence)
    }

    #[test]
    fn test_new_tracks_start_at_one() {
        let mut tracker = FaceTracker::default();
        let update = tracker.update(&[det(0.0, 0.0, 0.9), det(500.0, 0.0, 0.9)]);

        let ids: Vec<u32> = update.faces.iter().map(|f| f.track_id.value()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_track_id_stable_across_small_motion() {
        let mut tracker = FaceTracker::default();
        let first = tracker.update(&[det(100.0, 100.0, 0.9)]).faces[0].track_id;
        let second = tracker.update(&[det(102.0, 101.0, 0.9)]).faces[0].track_id;

        assert_eq!(first, second);
        assert_eq!(tracker.stats().total_created, 1);
        assert_eq!(tracker.stats().active_tracks, 1);
    }

    #[test]
    fn test_low_confidence_detection_does_not_start_track() {
        let mut tracker = FaceTracker::default();
        let update = tracker.update(&[det(0.0, 0.0, 0.3)]);

        assert!(update.faces.is_empty());
        assert_eq!(tracker.stats().total_created, 0);
    }

    #[test]
    fn test_track_expires_after_buffer_and_id_is_not_reused() {
        let config = TrackerConfig {
            lost_track_buffer: 2,
            ..Default::default()
        };
        let mut tracker = FaceTracker::new(config);
        let id = tracker.update(&[det(0.0, 0.0, 0.9)]).faces[0].track_id;

        assert!(tracker.update(&[]).expired.is_empty());
        assert!(tracker.update(&[]).expired.is_empty());
        assert_eq!(tracker.update(&[]).expired, vec![id]);
        assert!(tracker.blink_window_mut(id).is_none());

        let reappeared = tracker.update(&[det(0.0, 0.0, 0.9)]).faces[0].track_id;
        assert_ne!(reappeared, id);
        assert_eq!(reappeared, TrackId(2));
    }

    #[test]
    fn test_missed_frame_within_buffer_keeps_identity() {
        let mut tracker = FaceTracker::default();
        let id = tracker.update(&[det(0.0, 0.0, 0.9)]).faces[0].track_id;
        tracker.update(&[]);

        assert_eq!(tracker.stats().lost_tracks, 1);
        let again = tracker.update(&[det(1.0, 1.0, 0.9)]).faces[0].track_id;
        assert_eq!(again, id);
    }

    #[test]
    fn test_blink_window_is_per_track() {
        let mut tracker = FaceTracker::default();
        let update = tracker.update(&[det(0.0, 0.0, 0.9), det(500.0, 0.0, 0.9)]);
        let (a, b) = (update.faces[0].track_id, update.faces[1].track_id);

        tracker.blink_window_mut(a).unwrap().push(0.1, 0);
        assert_eq!(tracker.blink_window_mut(a).unwrap().len(), 1);
        assert!(tracker.blink_window_mut(b).unwrap().is_empty());
    }
}
