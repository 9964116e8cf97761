//! Displacement based speed estimation over a sliding trajectory window.
//!
//! The estimate uses only the first and last centroid of the window, which
//! smooths frame-to-frame detection jitter but assumes near-linear motion
//! inside the window. With a full window of `n` samples the displacement
//! covers `n - 1` frame steps while elapsed time is taken as `n / fps`, so a
//! constant velocity reads low by a factor of `(n - 1) / n`. Results are whole
//! km/h, truncated.

use std::collections::HashMap;

use log::trace;
use nalgebra as na;
use num_traits::ToPrimitive;

use crate::detection::{Centroid, TrackId, TrackedDetection};
use crate::history::TrajectoryStore;

const MPS_TO_KMH: f64 = 3.6;

/// Speed in km/h between two centroids observed `samples` frames apart.
///
/// Elapsed time of zero (no samples) yields zero instead of a division by zero.
/// Speeds beyond the `u32` range saturate.
pub fn endpoint_speed(
    first: &Centroid,
    last: &Centroid,
    samples: usize,
    fps: u32,
    meters_per_pixel: f64,
) -> u32 {
    let pixel_distance = na::distance(&first.cast::<f64>(), &last.cast::<f64>());
    let distance_meters = pixel_distance * meters_per_pixel;
    let time_seconds = samples as f64 / f64::from(fps);

    if time_seconds > 0.0 {
        let speed_kmh = distance_meters / time_seconds * MPS_TO_KMH;
        match speed_kmh.to_u32() {
            Some(speed) => speed,
            None if speed_kmh > 0.0 => u32::MAX,
            None => 0,
        }
    } else {
        0
    }
}

#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    fps: u32,
    meters_per_pixel: f64,
    history: TrajectoryStore,
    speeds: HashMap<TrackId, u32>,
}

impl SpeedEstimator {
    pub fn new(fps: u32, meters_per_pixel: f64) -> Self {
        Self {
            fps,
            meters_per_pixel,
            history: TrajectoryStore::new(fps),
            speeds: HashMap::new(),
        }
    }

    /// Minimum history length that must be exceeded before estimating.
    #[inline]
    pub fn min_samples(&self) -> usize {
        (self.fps / 2) as usize
    }

    /// Records the centroid of every identified detection and refreshes the
    /// estimate of each identity whose history passed the gate. Returns the
    /// estimates produced by this call in detection order.
    pub fn update(&mut self, tracked: &[TrackedDetection]) -> Vec<(TrackId, u32)> {
        let mut produced = Vec::new();

        for item in tracked {
            let Some(id) = item.track_id else {
                continue;
            };

            self.history.record(id, item.detection.centroid());

            if let Some(speed) = self.estimate(id) {
                produced.push((id, speed));
            }
        }

        produced
    }

    /// Re-estimates `id` from its current window. `None` while the window
    /// holds no more than half a second of samples.
    pub fn estimate(&mut self, id: TrackId) -> Option<u32> {
        let history = self.history.history_for(id)?;

        if history.len() <= self.min_samples() {
            return None;
        }

        let speed = match (history.oldest(), history.newest()) {
            (Some(first), Some(last)) => endpoint_speed(
                first,
                last,
                history.len(),
                self.fps,
                self.meters_per_pixel,
            ),
            _ => 0,
        };

        trace!("track {}: {} km/h over {} samples", id, speed, history.len());
        self.speeds.insert(id, speed);

        Some(speed)
    }

    #[inline]
    pub fn speed(&self, id: TrackId) -> Option<u32> {
        self.speeds.get(&id).copied()
    }

    /// Latest estimate per identity.
    #[inline]
    pub fn speeds(&self) -> &HashMap<TrackId, u32> {
        &self.speeds
    }

    #[inline]
    pub fn history(&self) -> &TrajectoryStore {
        &self.history
    }
}
