//! GeoJSON point features and the per-run aggregator that produces them.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_derive::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::geo::GeoPoint;
use crate::registry::{vehicle_name, VehicleRegistry};
use crate::telemetry::TelemetryFrame;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum FeatureKind {
    Feature,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum CollectionKind {
    FeatureCollection,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: GeometryKind,
    /// `[lon, lat]`
    pub coordinates: [f64; 2],
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Properties {
    pub vehicle_id: String,
    pub timestamp: String,
    pub color: String,
    pub frame_time: String,
    pub confidence: String,
    /// Set on the first feature of each frame, staggers the map animation
    pub delay: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GeoFeature {
    #[serde(rename = "type")]
    pub kind: FeatureKind,
    pub geometry: Geometry,
    pub properties: Properties,
    #[serde(skip)]
    pub vehicle: u32,
    #[serde(skip)]
    pub frame: usize,
}

impl GeoFeature {
    #[inline]
    pub fn point(&self) -> GeoPoint {
        let [lon, lat] = self.geometry.coordinates;

        GeoPoint::new(lat, lon)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: CollectionKind,
    pub features: Vec<GeoFeature>,
}

impl From<Vec<GeoFeature>> for FeatureCollection {
    fn from(features: Vec<GeoFeature>) -> Self {
        Self {
            kind: CollectionKind::FeatureCollection,
            features,
        }
    }
}

impl FeatureCollection {
    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, self)?;

        Ok(())
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.write_to(&mut writer)?;
        writer.flush()?;

        info!(path = %path.as_ref().display(), features = self.len(), "geojson exported");

        Ok(())
    }
}

/// Telemetry clock time with its last three characters dropped, on the export date
pub fn export_timestamp(date: &str, frame_time: &str) -> String {
    let cut = frame_time
        .char_indices()
        .rev()
        .nth(2)
        .map_or(0, |(idx, _)| idx);

    format!("{}T{}Z", date, &frame_time[..cut])
}

/// Collects features in arrival order, both as one flat list and per vehicle
#[derive(Debug, Clone)]
pub struct PathAggregator {
    date: String,
    features: Vec<GeoFeature>,
}

impl PathAggregator {
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            features: Vec::new(),
        }
    }

    /// Appends one observation. `first_in_frame` must be true only for the
    /// first surviving detection of the frame being processed.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &mut self,
        registry: &mut VehicleRegistry,
        vehicle: u32,
        point: GeoPoint,
        frame: usize,
        telemetry: &TelemetryFrame,
        confidence: f32,
        first_in_frame: bool,
    ) -> Result<&GeoFeature> {
        let track = registry
            .get_mut(vehicle)
            .ok_or(Error::UnknownVehicle(vehicle))?;

        if let Some(last) = track.last_frame() {
            if frame < last {
                return Err(Error::OutOfOrder {
                    vehicle,
                    frame,
                    last,
                });
            }
        }

        track.path.push((frame, point));

        self.features.push(GeoFeature {
            kind: FeatureKind::Feature,
            geometry: Geometry {
                kind: GeometryKind::Point,
                coordinates: point.lon_lat(),
            },
            properties: Properties {
                vehicle_id: vehicle_name(vehicle),
                timestamp: export_timestamp(&self.date, &telemetry.timestamp),
                color: track.color.to_hex(),
                frame_time: telemetry.timestamp.clone(),
                confidence: format!("{:.4}", confidence),
                delay: first_in_frame,
            },
            vehicle,
            frame,
        });

        Ok(&self.features[self.features.len() - 1])
    }

    #[inline]
    pub fn features(&self) -> &[GeoFeature] {
        &self.features
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    #[inline]
    pub fn into_features(self) -> Vec<GeoFeature> {
        self.features
    }

    /// (lat, lon) path of one vehicle, for consumers other than GeoJSON
    pub fn path(&self, registry: &VehicleRegistry, vehicle: u32) -> Option<Vec<(f64, f64)>> {
        registry
            .get(vehicle)
            .map(|track| track.path.iter().map(|(_, p)| (p.lat, p.lon)).collect())
    }
}
