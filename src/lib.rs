pub mod aggregate;
pub mod bbox;
pub mod config;
pub mod detection;
pub mod error;
pub mod frame;
pub mod history;
pub mod monitor;
pub mod report;
pub mod source;
pub mod speed;
pub mod tracker;
#[cfg(feature = "video")]
pub mod video;

mod circular_queue;

pub use aggregate::{Aggregator, VehicleCounts, VehicleRecord};
pub use circular_queue::CircularQueue;
pub use config::Config;
pub use detection::{
    Centroid, Detection, DetectionFilter, TrackId, TrackedDetection, VehicleClass,
};
pub use error::Error;
pub use frame::{Frame, VideoInfo};
pub use monitor::{Flow, FrameSink, FrameUpdate, FrameView, Monitor, NullSink};
pub use report::Summary;
pub use source::{DetectionLog, Detector, FrameSource, Replayed, ReplaySource};
pub use speed::SpeedEstimator;
pub use tracker::{IouTracker, Tracking};
