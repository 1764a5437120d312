//! Pixel to latitude/longitude projection for a nadir-looking drone camera.

use serde_derive::{Deserialize, Serialize};
use tracing::trace;

use crate::config::{CameraConfig, ProjectionConfig};
use crate::error::{Error, Result};
use crate::math;
use crate::telemetry::{Telemetry, TelemetryFrame};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    #[inline]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// GeoJSON axis order
    #[inline]
    pub fn lon_lat(&self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}

/// Gimbal yaw turned into a compass bearing, must land in `[0, 360)`
pub fn absolute_bearing(frame: usize, telemetry: &TelemetryFrame) -> Result<f64> {
    let bearing = telemetry.gb_yaw + 180.0;

    if !(0.0..360.0).contains(&bearing) {
        return Err(Error::YawOutOfRange {
            frame,
            yaw: telemetry.gb_yaw,
        });
    }

    Ok(bearing)
}

#[derive(Debug, Clone)]
pub struct GeoProjector {
    camera: CameraConfig,
    projection: ProjectionConfig,
}

impl GeoProjector {
    pub fn new(camera: CameraConfig, projection: ProjectionConfig) -> Self {
        Self { camera, projection }
    }

    /// Meters per pixel along x and y at the given pose
    pub fn pixel_scale(&self, telemetry: &TelemetryFrame) -> (f64, f64) {
        let fov_h = math::field_of_view(self.camera.sensor_width, telemetry.focal_len);
        let fov_v = math::field_of_view(self.camera.sensor_height(), telemetry.focal_len);

        let ground_w = math::ground_coverage(telemetry.abs_alt, fov_h);
        let ground_h = math::ground_coverage(telemetry.abs_alt, fov_v);

        (
            ground_w / self.camera.resolution_width as f64,
            ground_h / self.camera.resolution_height as f64,
        )
    }

    /// Straight-line ground distance in meters between the image center and the pixel
    pub fn ground_displacement(&self, px: f64, py: f64, telemetry: &TelemetryFrame) -> f64 {
        let (sx, sy) = self.pixel_scale(telemetry);
        let (cx, cy) = self.camera.center();

        let dx = (px - cx) * sx;
        let dy = (py - cy) * sy;

        dx.hypot(dy)
    }

    /// True when the gimbal turned faster than the threshold anywhere in the
    /// window preceding `frame`
    pub fn yaw_unstable(&self, frame: usize, telemetry: &Telemetry) -> bool {
        let window = self.projection.yaw_window;
        if frame <= window {
            return false;
        }

        telemetry
            .max_yaw_delta(frame - window..frame)
            .map_or(false, |delta| delta > self.projection.yaw_threshold)
    }

    /// Projects pixel `(px, py)` of `frame` onto the ground.
    ///
    /// While the gimbal is rotating the displacement is forced to zero, so
    /// the drone's own position is returned rather than the vehicle's last
    /// known one.
    pub fn project(
        &self,
        px: f64,
        py: f64,
        frame: usize,
        telemetry: &Telemetry,
    ) -> Result<GeoPoint> {
        let pose = telemetry.frame(frame)?;
        let bearing = absolute_bearing(frame, pose)?;

        let mut displacement = self.ground_displacement(px, py, pose);
        if self.yaw_unstable(frame, telemetry) {
            trace!(frame, "gimbal rotating, displacement suppressed");
            displacement = 0.0;
        }

        let (lat, lon) =
            math::offset_by_bearing(pose.latitude, pose.longitude, displacement, bearing);

        Ok(GeoPoint::new(lat, lon))
    }
}
