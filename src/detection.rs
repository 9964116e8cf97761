use std::fmt;

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb, Xywh};

/// Handle assigned by a tracker to one physical object across frames.
pub type TrackId = u32;

/// Integer pixel midpoint of a bounding box.
pub type Centroid = na::Point2<i32>;

/// Contains (x,y) of the center and (width,height) of bbox
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    #[serde(rename = "p")]
    pub confidence: f32,
    #[serde(rename = "c")]
    pub class: i32,
}

impl Detection {
    pub fn from_ltrb(bbox: BBox<Ltrb>, confidence: f32, class: i32) -> Self {
        let xywh = bbox.as_xywh();

        Self {
            x: xywh.cx(),
            y: xywh.cy(),
            w: xywh.width(),
            h: xywh.height(),
            confidence,
            class,
        }
    }

    pub fn iou(&self, other: &Detection) -> f32 {
        let b1_area = (self.w + 1.) * (self.h + 1.);
        let (xmin, xmax, ymin, ymax) = (self.xmin(), self.xmax(), self.ymin(), self.ymax());

        let b2_area = (other.w + 1.) * (other.h + 1.);

        let i_xmin = xmin.max(other.xmin());
        let i_xmax = xmax.min(other.xmax());
        let i_ymin = ymin.max(other.ymin());
        let i_ymax = ymax.min(other.ymax());
        let i_area = (i_xmax - i_xmin + 1.).max(0.) * (i_ymax - i_ymin + 1.).max(0.);

        (i_area) / (b1_area + b2_area - i_area)
    }

    #[inline(always)]
    pub fn bbox(&self) -> BBox<Xywh> {
        BBox::xywh(self.x, self.y, self.w, self.h)
    }

    #[inline(always)]
    pub fn ltrb(&self) -> BBox<Ltrb> {
        self.bbox().as_ltrb()
    }

    /// Midpoint of the corner coordinates, truncated to whole pixels.
    #[inline]
    pub fn centroid(&self) -> Centroid {
        let b = self.ltrb();

        na::Point2::new(
            ((b.left() + b.right()) / 2.0) as i32,
            ((b.top() + b.bottom()) / 2.0) as i32,
        )
    }

    #[inline]
    pub fn vehicle_class(&self) -> Option<VehicleClass> {
        VehicleClass::from_coco(self.class)
    }

    #[inline(always)]
    pub fn xmax(&self) -> f32 {
        self.x + self.w / 2.
    }

    #[inline(always)]
    pub fn ymax(&self) -> f32 {
        self.y + self.h / 2.
    }

    #[inline(always)]
    pub fn xmin(&self) -> f32 {
        self.x - self.w / 2.
    }

    #[inline(always)]
    pub fn ymin(&self) -> f32 {
        self.y - self.h / 2.
    }
}

/// Vehicle categories of the COCO label set.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VehicleClass {
    Car,
    Motorcycle,
    Bus,
    Truck,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 4] = [
        VehicleClass::Car,
        VehicleClass::Motorcycle,
        VehicleClass::Bus,
        VehicleClass::Truck,
    ];

    pub fn from_coco(class: i32) -> Option<Self> {
        match class {
            2 => Some(VehicleClass::Car),
            3 => Some(VehicleClass::Motorcycle),
            5 => Some(VehicleClass::Bus),
            7 => Some(VehicleClass::Truck),
            _ => None,
        }
    }

    pub fn coco_id(self) -> i32 {
        match self {
            VehicleClass::Car => 2,
            VehicleClass::Motorcycle => 3,
            VehicleClass::Bus => 5,
            VehicleClass::Truck => 7,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VehicleClass::Car => "Car",
            VehicleClass::Motorcycle => "Motorcycle",
            VehicleClass::Bus => "Bus",
            VehicleClass::Truck => "Truck",
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Detection paired with the identity a tracker gave it, if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedDetection {
    pub track_id: Option<TrackId>,
    pub detection: Detection,
}

impl TrackedDetection {
    #[inline]
    pub fn new(track_id: Option<TrackId>, detection: Detection) -> Self {
        Self {
            track_id,
            detection,
        }
    }
}

/// Confidence gate plus class allow-list applied to raw detector output.
#[derive(Debug, Clone)]
pub struct DetectionFilter {
    pub confidence_threshold: f32,
    pub classes: Vec<i32>,
}

impl DetectionFilter {
    pub fn new(confidence_threshold: f32, classes: Vec<i32>) -> Self {
        Self {
            confidence_threshold,
            classes,
        }
    }

    #[inline]
    pub fn accepts(&self, det: &Detection) -> bool {
        det.confidence > self.confidence_threshold && self.classes.contains(&det.class)
    }

    pub fn apply(&self, dets: Vec<Detection>) -> Vec<Detection> {
        dets.into_iter().filter(|d| self.accepts(d)).collect()
    }
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self::new(
            0.3,
            VehicleClass::ALL.iter().map(|c| c.coco_id()).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32, y: f32, confidence: f32, class: i32) -> Detection {
        Detection {
            x,
            y,
            w: 40.0,
            h: 20.0,
            confidence,
            class,
        }
    }

    #[test]
    fn centroid_truncates_to_pixels() {
        let d = Detection::from_ltrb(BBox::ltrb(10.0, 10.0, 21.0, 13.0), 0.9, 2);
        assert_eq!(d.centroid(), na::Point2::new(15, 11));
    }

    #[test]
    fn filter_uses_strict_threshold_and_allow_list() {
        let filter = DetectionFilter::default();
        let dets = vec![
            det(0.0, 0.0, 0.3, 2),
            det(0.0, 0.0, 0.31, 2),
            det(0.0, 0.0, 0.9, 0),
            det(0.0, 0.0, 0.9, 7),
        ];

        let kept = filter.apply(dets);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].class, 2);
        assert_eq!(kept[1].class, 7);
    }

    #[test]
    fn coco_mapping() {
        assert_eq!(VehicleClass::from_coco(3), Some(VehicleClass::Motorcycle));
        assert_eq!(VehicleClass::from_coco(1), None);
        for class in VehicleClass::ALL {
            assert_eq!(VehicleClass::from_coco(class.coco_id()), Some(class));
        }
        assert_eq!(VehicleClass::Truck.to_string(), "Truck");
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = det(50.0, 50.0, 0.9, 2);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);

        let far = det(500.0, 500.0, 0.9, 2);
        assert_eq!(a.iou(&far), 0.0);
    }

    #[test]
    fn parses_log_field_names() {
        let d: Detection =
            serde_json::from_str(r#"{"x":1.0,"y":2.0,"w":3.0,"h":4.0,"p":0.5,"c":7}"#).unwrap();
        assert_eq!(d.confidence, 0.5);
        assert_eq!(d.vehicle_class(), Some(VehicleClass::Truck));
    }
}
