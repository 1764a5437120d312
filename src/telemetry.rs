use std::fs::File;
use std::io::BufReader;
use std::ops::Range;
use std::path::Path;

use serde_derive::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Drone pose for one video frame
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TelemetryFrame {
    pub latitude: f64,
    pub longitude: f64,
    /// Absolute altitude in meters
    pub abs_alt: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_alt: Option<f64>,
    /// Focal length in mm
    pub focal_len: f64,
    /// Gimbal yaw relative to the drone body, degrees
    pub gb_yaw: f64,
    #[serde(default)]
    pub gb_pitch: f64,
    #[serde(default)]
    pub gb_roll: f64,
    /// `HH:MM:SS:mmm` clock time
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_cnt: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_time: Option<String>,
}

/// Whole-run telemetry, index `i` belongs to decoded video frame `i`
#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    frames: Vec<TelemetryFrame>,
}

impl From<Vec<TelemetryFrame>> for Telemetry {
    fn from(frames: Vec<TelemetryFrame>) -> Self {
        Self { frames }
    }
}

impl Telemetry {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let frames: Vec<TelemetryFrame> = serde_json::from_reader(reader)?;

        Ok(Self { frames })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(Self {
            frames: serde_json::from_str(json)?,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&TelemetryFrame> {
        self.frames.get(index)
    }

    /// Like `get`, but a missing frame is reported as end of usable telemetry
    #[inline]
    pub fn frame(&self, index: usize) -> Result<&TelemetryFrame> {
        self.frames.get(index).ok_or(Error::TelemetryMissing(index))
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &'_ TelemetryFrame> {
        self.frames.iter()
    }

    /// Largest `|yaw[i] - yaw[i - 1]|` for `i` in `range`, pairs that fall
    /// outside the telemetry are ignored
    pub fn max_yaw_delta(&self, range: Range<usize>) -> Option<f64> {
        range
            .filter(|&i| i > 0)
            .filter_map(|i| {
                let curr = self.frames.get(i)?;
                let prev = self.frames.get(i - 1)?;

                Some((curr.gb_yaw - prev.gb_yaw).abs())
            })
            .fold(None, |max: Option<f64>, d| Some(max.map_or(d, |m| m.max(d))))
    }
}
