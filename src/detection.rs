use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};
use crate::config::FilterConfig;
use crate::error::Result;

/// Single detector output in pixel space
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BBox<Ltrb>,
    #[serde(rename = "p")]
    pub confidence: f32,
    #[serde(rename = "c")]
    pub class: i32,
    /// Id assigned by the detector's own tracker, informational only
    #[serde(rename = "tid", default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<i32>,
}

impl Detection {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32, class: i32, confidence: f32) -> Result<Self> {
        Ok(Self {
            bbox: BBox::ltrb(x1, y1, x2, y2)?,
            confidence,
            class,
            track_id: None,
        })
    }

    #[inline(always)]
    pub fn center(&self) -> (i32, i32) {
        self.bbox.center()
    }
}

/// Drops detections of the wrong class, low confidence or touching the frame edge
#[derive(Debug, Clone)]
pub struct DetectionFilter {
    confidence_threshold: f32,
    classes: Vec<i32>,
    border_margin: i32,
}

impl DetectionFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            classes: config.classes.clone(),
            border_margin: config.border_margin,
        }
    }

    pub fn accepts(&self, det: &Detection, dims: (u32, u32)) -> bool {
        if !det.bbox.is_valid() || det.confidence < self.confidence_threshold {
            return false;
        }

        if !self.classes.contains(&det.class) {
            return false;
        }

        !det.bbox.near_border(dims.0, dims.1, self.border_margin)
    }

    /// Keeps detector order, later stages depend on it
    pub fn apply<'a>(
        &'a self,
        dets: &'a [Detection],
        dims: (u32, u32),
    ) -> impl Iterator<Item = &'a Detection> + 'a {
        dets.iter().filter(move |det| self.accepts(det, dims))
    }
}
