use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("gimbal yaw {yaw} at frame {frame} normalizes outside of [0, 360)")]
    YawOutOfRange { frame: usize, yaw: f64 },

    #[error("no telemetry for frame {0}")]
    TelemetryMissing(usize),

    #[error("invalid bounding box [{x1}, {y1}, {x2}, {y2}]")]
    InvalidBBox { x1: i32, y1: i32, x2: i32, y2: i32 },

    #[error("fingerprint length mismatch: {0} vs {1}")]
    FingerprintMismatch(usize, usize),

    #[error("vehicle {vehicle} got frame {frame} after frame {last}")]
    OutOfOrder {
        vehicle: u32,
        frame: usize,
        last: usize,
    },

    #[error("frame {frame} arrived after frame {last}")]
    FrameOutOfOrder { frame: usize, last: usize },

    #[error("unknown vehicle {0}")]
    UnknownVehicle(u32),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML Error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
