use std::cmp::Ordering;

use log::debug;

use crate::detection::{Detection, TrackId, TrackedDetection};

/// Assigns stable identities to per-frame detections.
pub trait Tracking {
    /// Returns the input detections in order, each paired with its identity
    /// or `None` when the tracker left it unmatched.
    fn update(&mut self, dets: &[Detection]) -> Vec<TrackedDetection>;
}

#[derive(Debug, Clone)]
struct Object {
    id: TrackId,
    last: Detection,
    time_since_update: u32,
}

/// Greedy IoU association between consecutive frames.
///
/// Pairs are matched in descending IoU order; detections left over open new
/// tracks. A track missing for more than `max_age` frames is dropped and the
/// same vehicle reappearing later receives a fresh identity.
#[derive(Debug, Clone)]
pub struct IouTracker {
    iou_threshold: f32,
    max_age: u32,
    next_id: TrackId,
    objects: Vec<Object>,
}

impl IouTracker {
    pub fn new(iou_threshold: f32, max_age: u32) -> Self {
        Self {
            iou_threshold,
            max_age,
            next_id: 1,
            objects: Vec::new(),
        }
    }

    /// Tracks currently alive, including ones coasting through a miss.
    #[inline]
    pub fn live_tracks(&self) -> usize {
        self.objects.len()
    }
}

impl Default for IouTracker {
    fn default() -> Self {
        Self::new(0.3, 30)
    }
}

impl Tracking for IouTracker {
    fn update(&mut self, dets: &[Detection]) -> Vec<TrackedDetection> {
        let mut pairs: Vec<(f32, usize, usize)> = Vec::new();
        for (oi, obj) in self.objects.iter().enumerate() {
            for (di, det) in dets.iter().enumerate() {
                let iou = obj.last.iou(det);
                if iou >= self.iou_threshold {
                    pairs.push((iou, oi, di));
                }
            }
        }

        pairs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let mut assigned: Vec<Option<TrackId>> = vec![None; dets.len()];
        let mut matched = vec![false; self.objects.len()];

        for (_, oi, di) in pairs {
            if matched[oi] || assigned[di].is_some() {
                continue;
            }

            let obj = &mut self.objects[oi];
            obj.last = dets[di];
            obj.time_since_update = 0;

            matched[oi] = true;
            assigned[di] = Some(obj.id);
        }

        for (obj, hit) in self.objects.iter_mut().zip(&matched) {
            if !hit {
                obj.time_since_update += 1;
            }
        }

        let max_age = self.max_age;
        self.objects.retain(|obj| {
            let keep = obj.time_since_update <= max_age;
            if !keep {
                debug!("track #{} lost", obj.id);
            }
            keep
        });

        for (di, slot) in assigned.iter_mut().enumerate() {
            if slot.is_none() {
                let id = self.next_id;
                self.next_id += 1;

                self.objects.push(Object {
                    id,
                    last: dets[di],
                    time_since_update: 0,
                });

                *slot = Some(id);
            }
        }

        dets.iter()
            .zip(assigned)
            .map(|(det, id)| TrackedDetection::new(id, *det))
            .collect()
    }
}
