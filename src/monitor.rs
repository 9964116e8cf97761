use std::collections::HashMap;

use log::{debug, info, warn};

use crate::aggregate::{Aggregator, VehicleCounts};
use crate::config::Config;
use crate::detection::{Detection, DetectionFilter, TrackId, TrackedDetection};
use crate::error::Error;
use crate::frame::{Frame, VideoInfo};
use crate::report::Summary;
use crate::source::{Detector, FrameSource};
use crate::speed::SpeedEstimator;
use crate::tracker::{IouTracker, Tracking};

const PROGRESS_EVERY: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Per-frame state handed to a sink for presentation.
pub struct FrameView<'a> {
    pub tracked: &'a [TrackedDetection],
    /// Latest estimate per identity, including identities not in this frame.
    pub speeds: &'a HashMap<TrackId, u32>,
    pub counts: &'a VehicleCounts,
}

impl<'a> FrameView<'a> {
    /// Overlay text for one detection: `#<id> <class> <speed> km/h`.
    pub fn label(&self, item: &TrackedDetection) -> String {
        let class = item
            .detection
            .vehicle_class()
            .map(|c| c.name())
            .unwrap_or("Unknown");

        match item.track_id {
            Some(id) => format!(
                "#{} {} {} km/h",
                id,
                class,
                self.speeds.get(&id).copied().unwrap_or(0)
            ),
            None => class.to_string(),
        }
    }

    /// Running per-class totals in display order.
    pub fn count_lines(&self) -> Vec<String> {
        self.counts
            .iter()
            .map(|(class, count)| format!("{}: {}", class, count))
            .collect()
    }
}

/// Consumer of processed frames: renderer, writer, display.
pub trait FrameSink<I> {
    /// `Err(Error::RenderFailure)` is tolerated by the run loop; any other
    /// error ends the run.
    fn consume(&mut self, frame: &Frame<I>, view: &FrameView<'_>) -> Result<Flow, Error>;

    fn finish(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// Discards frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl<I> FrameSink<I> for NullSink {
    fn consume(&mut self, _frame: &Frame<I>, _view: &FrameView<'_>) -> Result<Flow, Error> {
        Ok(Flow::Continue)
    }
}

/// Outcome of one processed frame.
#[derive(Debug, Clone, Default)]
pub struct FrameUpdate {
    pub tracked: Vec<TrackedDetection>,
    /// Estimates refreshed on this frame.
    pub estimates: Vec<(TrackId, u32)>,
}

/// Owns every piece of per-run state and advances it one frame at a time.
pub struct Monitor<T: Tracking = IouTracker> {
    filter: DetectionFilter,
    tracker: T,
    speeds: SpeedEstimator,
    aggregator: Aggregator,
    frames: u64,
}

impl Monitor<IouTracker> {
    pub fn from_config(info: VideoInfo, config: &Config) -> Result<Self, Error> {
        let tracker = IouTracker::new(config.iou_threshold, config.max_age);
        Self::new(info, config, tracker)
    }
}

impl<T: Tracking> Monitor<T> {
    pub fn new(info: VideoInfo, config: &Config, tracker: T) -> Result<Self, Error> {
        let fps = Config::validate_fps(info.fps)?;

        debug!(
            "monitor: {}x{} @ {} fps, {} m/px",
            info.width, info.height, fps, config.meters_per_pixel
        );

        Ok(Self {
            filter: config.filter(),
            tracker,
            speeds: SpeedEstimator::new(fps, config.meters_per_pixel),
            aggregator: Aggregator::new(),
            frames: 0,
        })
    }

    /// Filters, tracks and folds one frame of raw detections.
    pub fn process(&mut self, frame_index: u64, dets: Vec<Detection>) -> FrameUpdate {
        self.frames += 1;

        let dets = self.filter.apply(dets);
        let tracked = self.tracker.update(&dets);

        for item in &tracked {
            let Some(id) = item.track_id else {
                continue;
            };

            match item.detection.vehicle_class() {
                Some(class) => self.aggregator.observe(id, class, frame_index),
                None => warn!("track #{}: class {} is not a vehicle", id, item.detection.class),
            }
        }

        let estimates = self.speeds.update(&tracked);
        for (id, speed) in &estimates {
            self.aggregator.observe_speed(*id, *speed);
        }

        FrameUpdate { tracked, estimates }
    }

    pub fn view<'a>(&'a self, tracked: &'a [TrackedDetection]) -> FrameView<'a> {
        FrameView {
            tracked,
            speeds: self.speeds.speeds(),
            counts: self.aggregator.counts(),
        }
    }

    #[inline]
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    #[inline]
    pub fn speeds(&self) -> &SpeedEstimator {
        &self.speeds
    }

    /// Drives the loop until the source or detector runs dry or the sink
    /// asks to stop.
    pub fn run<S, D, K>(
        mut self,
        source: &mut S,
        detector: &mut D,
        sink: &mut K,
    ) -> Result<Summary, Error>
    where
        S: FrameSource,
        D: Detector<S::Image>,
        K: FrameSink<S::Image>,
    {
        loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) | Err(Error::EndOfStream) => {
                    debug!("end of stream after {} frames", self.frames);
                    break;
                }
                Err(err) => return Err(err),
            };

            if frame.index % PROGRESS_EVERY == 0 {
                info!(
                    "Processing frame {} ({:.2}s)...",
                    frame.index, frame.timestamp
                );
            }

            let dets = match detector.detect(&frame) {
                Ok(dets) => dets,
                Err(Error::EndOfStream) => {
                    debug!("detections exhausted at frame {}", frame.index);
                    break;
                }
                Err(err) => return Err(err),
            };

            let update = self.process(frame.index, dets);
            let view = self.view(&update.tracked);

            match sink.consume(&frame, &view) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => {
                    info!("stop requested at frame {}", frame.index);
                    break;
                }
                Err(Error::RenderFailure(reason)) => {
                    warn!("frame {}: {}", frame.index, reason);
                }
                Err(err) => return Err(err),
            }
        }

        sink.finish()?;

        Ok(self.finish())
    }

    pub fn finish(self) -> Summary {
        let (counts, records) = self.aggregator.into_parts();

        Summary {
            frames: self.frames,
            counts,
            records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::VehicleClass;
    use crate::source::{DetectionLog, ReplaySource, Replayed};

    struct Scripted(Vec<Vec<TrackedDetection>>);

    impl Tracking for Scripted {
        fn update(&mut self, _dets: &[Detection]) -> Vec<TrackedDetection> {
            if self.0.is_empty() {
                Vec::new()
            } else {
                self.0.remove(0)
            }
        }
    }

    fn det(class: i32) -> Detection {
        Detection {
            x: 100.0,
            y: 100.0,
            w: 40.0,
            h: 30.0,
            confidence: 0.9,
            class,
        }
    }

    #[test]
    fn unidentified_detections_are_skipped() {
        let script = vec![vec![
            TrackedDetection::new(None, det(2)),
            TrackedDetection::new(Some(4), det(5)),
        ]];
        let info = VideoInfo::new(640, 480, 10);
        let mut monitor = Monitor::new(info, &Config::default(), Scripted(script)).unwrap();

        let update = monitor.process(1, vec![det(2), det(5)]);
        assert_eq!(update.tracked.len(), 2);

        let summary = monitor.finish();
        assert_eq!(summary.records.len(), 1);
        assert_eq!(summary.counts.get(VehicleClass::Bus), 1);
        assert_eq!(summary.counts.total(), 1);
    }

    #[test]
    fn zero_fps_is_rejected() {
        let info = VideoInfo::new(640, 480, 0);
        assert!(Monitor::from_config(info, &Config::default()).is_err());
    }

    #[test]
    fn labels_default_to_zero_speed() {
        let info = VideoInfo::new(640, 480, 10);
        let mut monitor = Monitor::from_config(info, &Config::default()).unwrap();
        let update = monitor.process(1, vec![det(7)]);
        let view = monitor.view(&update.tracked);

        assert_eq!(view.label(&update.tracked[0]), "#1 Truck 0 km/h");
        assert_eq!(
            view.count_lines(),
            vec!["Car: 0", "Motorcycle: 0", "Bus: 0", "Truck: 1"]
        );
    }

    /// Replies to each frame from a fixed script, then keeps going.
    struct ScriptedSink {
        replies: std::vec::IntoIter<Result<Flow, Error>>,
        consumed: u64,
        finished: bool,
    }

    impl ScriptedSink {
        fn new(replies: Vec<Result<Flow, Error>>) -> Self {
            Self {
                replies: replies.into_iter(),
                consumed: 0,
                finished: false,
            }
        }
    }

    impl<I> FrameSink<I> for ScriptedSink {
        fn consume(&mut self, _frame: &Frame<I>, _view: &FrameView<'_>) -> Result<Flow, Error> {
            self.consumed += 1;
            self.replies.next().unwrap_or(Ok(Flow::Continue))
        }

        fn finish(&mut self) -> Result<(), Error> {
            self.finished = true;
            Ok(())
        }
    }

    fn ten_frame_log() -> String {
        (0..10)
            .map(|i| {
                let car = Detection {
                    x: 100.0 + i as f32 * 2.0,
                    ..det(2)
                };
                format!("{}: {}\n", i * 100, serde_json::to_string(&[car]).unwrap())
            })
            .collect()
    }

    fn run_with(sink: &mut ScriptedSink) -> Result<Summary, Error> {
        let log = ten_frame_log();
        let info = VideoInfo::new(640, 480, 10);
        let mut source = ReplaySource::new(DetectionLog::new(log.as_bytes()), info);
        let monitor = Monitor::from_config(info, &Config::default())?;

        monitor.run(&mut source, &mut Replayed, sink)
    }

    #[test]
    fn render_failure_is_tolerated_and_stop_flushes() {
        let mut sink = ScriptedSink::new(vec![
            Ok(Flow::Continue),
            Err(Error::RenderFailure("display gone".into())),
            Ok(Flow::Continue),
            Ok(Flow::Stop),
        ]);

        let summary = run_with(&mut sink).unwrap();

        assert_eq!(sink.consumed, 4);
        assert!(sink.finished);
        assert_eq!(summary.frames, 4);
        assert_eq!(summary.records.len(), 1);

        let record = &summary.records[&1];
        assert_eq!(record.frame_count, 4);
        assert_eq!(record.first_seen, Some(1));
        assert_eq!(record.last_seen, Some(4));
    }

    #[test]
    fn other_sink_errors_end_the_run() {
        let mut sink = ScriptedSink::new(vec![
            Ok(Flow::Continue),
            Err(Error::InvalidConfig("sink misconfigured".into())),
        ]);

        let result = run_with(&mut sink);

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
        assert_eq!(sink.consumed, 2);
        assert!(!sink.finished);
    }
}
