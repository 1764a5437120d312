pub mod bbox;
pub mod color;
pub mod config;
pub mod detection;
pub mod error;
pub mod feature;
pub mod fingerprint;
pub mod frame;
pub mod geo;
pub mod identity;
pub mod math;
pub mod postprocess;
pub mod registry;
pub mod session;
pub mod telemetry;

mod circular_queue;

pub use config::Config;
pub use detection::Detection;
pub use error::{Error, Result};
pub use feature::{FeatureCollection, GeoFeature, PathAggregator};
pub use fingerprint::{CompareMethod, Fingerprint, Fingerprinter, HueHistogram};
pub use frame::Frame;
pub use geo::{GeoPoint, GeoProjector};
pub use identity::{Identity, IdentityResolver};
pub use postprocess::PathPostProcessor;
pub use registry::{TrackState, VehicleRegistry, VehicleTrack};
pub use session::{Detector, FrameOutcome, Session, SnapshotSink};
pub use telemetry::{Telemetry, TelemetryFrame};
