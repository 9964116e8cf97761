use std::collections::HashMap;

use crate::circular_queue::CircularQueue;
use crate::detection::{Centroid, TrackId};

/// Per-identity window of the most recent centroids.
///
/// The window length equals the stream frame rate, so a full history spans
/// about one second. Entries are created on first sight and never expire.
#[derive(Debug, Clone)]
pub struct TrajectoryStore {
    window: usize,
    tracks: HashMap<TrackId, CircularQueue<Centroid>>,
}

impl TrajectoryStore {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            window: frame_rate as usize,
            tracks: HashMap::new(),
        }
    }

    /// Appends `centroid`, evicting the oldest sample once the window is full.
    /// Returns the history length after the push.
    pub fn record(&mut self, id: TrackId, centroid: Centroid) -> usize {
        let window = self.window;
        let history = self
            .tracks
            .entry(id)
            .or_insert_with(|| CircularQueue::with_capacity(window));

        history.push(centroid);
        history.len()
    }

    pub fn history_for(&self, id: TrackId) -> Option<&CircularQueue<Centroid>> {
        self.tracks.get(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
