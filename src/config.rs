use std::fs;
use std::path::Path;

use serde_derive::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fingerprint::CompareMethod;

/// Camera intrinsics needed to turn pixels into ground meters.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    /// Sensor width in mm
    pub sensor_width: f64,
    pub resolution_width: u32,
    pub resolution_height: u32,
}

impl CameraConfig {
    #[inline]
    pub fn aspect_ratio(&self) -> f64 {
        self.resolution_width as f64 / self.resolution_height as f64
    }

    /// Sensor height in mm, derived from the width and the frame aspect ratio
    #[inline]
    pub fn sensor_height(&self) -> f64 {
        self.sensor_width / self.aspect_ratio()
    }

    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (
            self.resolution_width as f64 / 2.0,
            self.resolution_height as f64 / 2.0,
        )
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            sensor_width: 6.0,
            resolution_width: 1920,
            resolution_height: 1080,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Number of preceding frames scanned for gimbal rotation
    pub yaw_window: usize,
    /// Max per-frame yaw delta in degrees before displacement is suppressed
    pub yaw_threshold: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            yaw_window: 10,
            yaw_threshold: 4.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct IdentityConfig {
    /// How many recently created-or-updated vehicles are compared against
    pub lookback: usize,
    pub similarity_threshold: f32,
    pub method: CompareMethod,
    pub hue_bins: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            lookback: 4,
            similarity_threshold: 0.65,
            method: CompareMethod::Correlation,
            hue_bins: 180,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    pub confidence_threshold: f32,
    /// Forwarded to the detector, not used by the filter itself
    pub iou_threshold: f32,
    pub classes: Vec<i32>,
    /// Detections closer than this to any frame edge are skipped, in px
    pub border_margin: i32,
    /// Extra context around a snapshot crop, in px
    pub crop_padding: i32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            iou_threshold: 0.9,
            classes: vec![2, 3, 4, 5, 8],
            border_margin: 10,
            crop_padding: 20,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CleaningConfig {
    /// DBSCAN neighbourhood radius in coordinate degrees
    pub eps: f64,
    pub min_samples: usize,
    pub min_observations: usize,
    /// Douglas-Peucker tolerance in coordinate degrees, `None` disables it
    pub simplify_tolerance: Option<f64>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            eps: 0.00001,
            min_samples: 3,
            min_observations: 5,
            simplify_tolerance: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    /// Calendar date prefixed to the telemetry clock time
    pub date: String,
    pub color_seed: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            date: String::from("2024-12-09"),
            color_seed: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub projection: ProjectionConfig,
    pub identity: IdentityConfig,
    pub filter: FilterConfig,
    pub cleaning: CleaningConfig,
    pub export: ExportConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));

        if self.camera.resolution_width == 0 || self.camera.resolution_height == 0 {
            return invalid("camera resolution must be non-zero");
        }

        if self.camera.sensor_width <= 0.0 {
            return invalid("sensor width must be positive");
        }

        if self.identity.lookback == 0 {
            return invalid("identity lookback must be at least 1");
        }

        if self.identity.hue_bins == 0 {
            return invalid("hue bins must be at least 1");
        }

        if !(0.0..=1.0).contains(&self.filter.confidence_threshold) {
            return invalid("confidence threshold must be within [0, 1]");
        }

        if self.filter.border_margin < 0 || self.filter.crop_padding < 0 {
            return invalid("border margin and crop padding must not be negative");
        }

        if self.cleaning.eps <= 0.0 {
            return invalid("dbscan eps must be positive");
        }

        if matches!(self.cleaning.simplify_tolerance, Some(t) if t <= 0.0) {
            return invalid("simplify tolerance must be positive");
        }

        Ok(())
    }
}
