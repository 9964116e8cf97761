use std::path::PathBuf;

use crate::detection::{DetectionFilter, VehicleClass};
use crate::error::Error;

/// Sentinel source selecting the default camera.
pub const WEBCAM_SOURCE: &str = "0";

#[derive(Debug, Clone)]
pub struct Config {
    /// Video file path, or [`WEBCAM_SOURCE`].
    pub source: String,
    pub headless: bool,
    /// Flat meters-per-pixel factor standing in for ground-plane calibration.
    pub meters_per_pixel: f64,
    pub confidence_threshold: f32,
    pub classes: Vec<i32>,
    pub iou_threshold: f32,
    pub max_age: u32,
    /// Frames wider than this are downscaled, keeping aspect ratio.
    pub resize_width: u32,
    /// Camera drivers report unreliable rates, so webcams assume this one.
    pub webcam_fps: u32,
    pub output_video: PathBuf,
    pub report: PathBuf,
}

impl Config {
    #[inline]
    pub fn is_webcam(&self) -> bool {
        self.source == WEBCAM_SOURCE
    }

    pub fn filter(&self) -> DetectionFilter {
        DetectionFilter::new(self.confidence_threshold, self.classes.clone())
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.meters_per_pixel.is_finite() || self.meters_per_pixel <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "calibration must be positive, got {}",
                self.meters_per_pixel
            )));
        }

        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::InvalidConfig(format!(
                "confidence must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }

        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(Error::InvalidConfig(format!(
                "iou threshold must be within [0, 1], got {}",
                self.iou_threshold
            )));
        }

        if self.resize_width == 0 {
            return Err(Error::InvalidConfig("resize width must be non-zero".into()));
        }

        if self.webcam_fps == 0 {
            return Err(Error::InvalidConfig("webcam fps must be non-zero".into()));
        }

        if let Some(class) = self
            .classes
            .iter()
            .find(|c| VehicleClass::from_coco(**c).is_none())
        {
            return Err(Error::InvalidConfig(format!(
                "class {} is not a vehicle category",
                class
            )));
        }

        Ok(())
    }

    /// Rejects streams whose frame rate cannot size a history window.
    pub fn validate_fps(fps: u32) -> Result<u32, Error> {
        if fps == 0 {
            return Err(Error::InvalidConfig("frame rate must be non-zero".into()));
        }

        Ok(fps)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: "traffic.mp4".to_string(),
            headless: false,
            meters_per_pixel: 0.05,
            confidence_threshold: 0.3,
            classes: VehicleClass::ALL.iter().map(|c| c.coco_id()).collect(),
            iou_threshold: 0.3,
            max_age: 30,
            resize_width: 1280,
            webcam_fps: 30,
            output_video: PathBuf::from("output.mp4"),
            report: PathBuf::from("tracked_vehicles.csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(!config.is_webcam());
        assert_eq!(config.classes, vec![2, 3, 5, 7]);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = Config::default();
        config.meters_per_pixel = 0.0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = Config::default();
        config.confidence_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.meters_per_pixel = f64::INFINITY;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = Config::default();
        config.iou_threshold = -0.1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.iou_threshold = 1.2;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.resize_width = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.classes = vec![2, 0];
        assert!(config.validate().is_err());

        assert!(Config::validate_fps(0).is_err());
        assert_eq!(Config::validate_fps(25).unwrap(), 25);
    }
}
