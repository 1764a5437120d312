use ndarray::{Array3, ArrayView3};
use tracing::{debug, info, warn};

use crate::config::{Config, FilterConfig};
use crate::detection::{Detection, DetectionFilter};
use crate::error::{Error, Result};
use crate::feature::{FeatureCollection, GeoFeature, PathAggregator};
use crate::fingerprint::{Fingerprinter, HueHistogram};
use crate::frame::Frame;
use crate::geo::{absolute_bearing, GeoProjector};
use crate::identity::{Identity, IdentityResolver};
use crate::postprocess::PathPostProcessor;
use crate::registry::{vehicle_name, VehicleRegistry};
use crate::telemetry::Telemetry;

/// Receives the padded crop of every newly seen vehicle
pub trait SnapshotSink {
    fn save(&mut self, name: &str, image: ArrayView3<'_, u8>) -> Result<()>;
}

/// Discards snapshots
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl SnapshotSink for NullSink {
    #[inline]
    fn save(&mut self, _name: &str, _image: ArrayView3<'_, u8>) -> Result<()> {
        Ok(())
    }
}

/// Keeps snapshots in memory, in the order they were taken
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub snapshots: Vec<(String, Array3<u8>)>,
}

impl SnapshotSink for MemorySink {
    fn save(&mut self, name: &str, image: ArrayView3<'_, u8>) -> Result<()> {
        self.snapshots.push((name.to_string(), image.to_owned()));

        Ok(())
    }
}

/// Produces detections for a frame, in the detector's own order.
///
/// `config` carries the confidence and IoU thresholds the detector's own
/// suppression should run with.
pub trait Detector {
    fn detect(
        &mut self,
        image: ArrayView3<'_, u8>,
        config: &FilterConfig,
    ) -> Result<Vec<Detection>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Processed { recorded: usize },
    /// Gimbal yaw could not be turned into a bearing, nothing was recorded
    Skipped,
    /// No telemetry for this frame, the session accepts no more frames
    EndOfTelemetry,
}

/// Frame-sequential run: filtering, identity, projection and aggregation.
///
/// Frames must arrive in index order; both the yaw gate and the identity
/// lookback depend on what earlier frames left behind, so a frame at or
/// before the last one seen is rejected without touching any state.
pub struct Session<P = HueHistogram, S = NullSink> {
    config: Config,
    telemetry: Telemetry,
    filter: DetectionFilter,
    projector: GeoProjector,
    resolver: IdentityResolver,
    registry: VehicleRegistry,
    aggregator: PathAggregator,
    fingerprinter: P,
    sink: S,
    last_frame: Option<usize>,
    exhausted: bool,
}

impl Session {
    pub fn new(config: Config, telemetry: Telemetry) -> Result<Self> {
        let fingerprinter = HueHistogram::new(config.identity.hue_bins);

        Self::with_parts(config, telemetry, fingerprinter, NullSink)
    }
}

impl<P: Fingerprinter, S: SnapshotSink> Session<P, S> {
    pub fn with_parts(
        config: Config,
        telemetry: Telemetry,
        fingerprinter: P,
        sink: S,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            filter: DetectionFilter::new(&config.filter),
            projector: GeoProjector::new(config.camera.clone(), config.projection.clone()),
            resolver: IdentityResolver::from_config(&config.identity),
            registry: VehicleRegistry::new(config.identity.lookback, config.export.color_seed),
            aggregator: PathAggregator::new(config.export.date.clone()),
            config,
            telemetry,
            fingerprinter,
            sink,
            last_frame: None,
            exhausted: false,
        })
    }

    #[inline]
    pub fn registry(&self) -> &VehicleRegistry {
        &self.registry
    }

    #[inline]
    pub fn features(&self) -> &[GeoFeature] {
        self.aggregator.features()
    }

    #[inline]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn process_frame(&mut self, frame: &Frame) -> Result<FrameOutcome> {
        if self.exhausted {
            return Ok(FrameOutcome::EndOfTelemetry);
        }

        if let Some(last) = self.last_frame {
            if frame.index <= last {
                return Err(Error::FrameOutOfOrder {
                    frame: frame.index,
                    last,
                });
            }
        }
        self.last_frame = Some(frame.index);

        let pose = match self.telemetry.frame(frame.index) {
            Ok(pose) => pose,
            Err(Error::TelemetryMissing(index)) => {
                info!(frame = index, "telemetry exhausted");
                self.exhausted = true;

                return Ok(FrameOutcome::EndOfTelemetry);
            }
            Err(err) => return Err(err),
        };

        if let Err(err) = absolute_bearing(frame.index, pose) {
            warn!(frame = frame.index, "{}", err);

            return Ok(FrameOutcome::Skipped);
        }

        let dims = frame.dims();
        let mut recorded = 0;

        for det in self.filter.apply(&frame.detections, dims) {
            let roi = match frame.crop(&det.bbox) {
                Some(roi) => roi,
                None => {
                    debug!(
                        frame = frame.index,
                        bbox = ?det.bbox.as_slice(),
                        "detection outside image"
                    );
                    continue;
                }
            };

            let (cx, cy) = det.center();
            let point = self
                .projector
                .project(cx as f64, cy as f64, frame.index, &self.telemetry)?;

            let fingerprint = self.fingerprinter.fingerprint(roi);
            let identity = self.resolver.identify(&mut self.registry, fingerprint)?;

            if let Identity::New(id) = identity {
                let padding = self.config.filter.crop_padding;
                if let Some(snapshot) = frame.padded_crop(&det.bbox, padding) {
                    self.sink.save(&format!("{}.jpg", vehicle_name(id)), snapshot)?;
                }
            }

            self.aggregator.record(
                &mut self.registry,
                identity.id(),
                point,
                frame.index,
                pose,
                det.confidence,
                recorded == 0,
            )?;

            recorded += 1;
        }

        Ok(FrameOutcome::Processed { recorded })
    }

    /// Feeds frames from `frames` through `detector` until either runs out
    pub fn run<I, D>(&mut self, frames: I, detector: &mut D) -> Result<usize>
    where
        I: IntoIterator<Item = Array3<u8>>,
        D: Detector,
    {
        let mut processed = 0;

        for (index, image) in frames.into_iter().enumerate() {
            if self.telemetry.get(index).is_none() {
                self.process_frame(&Frame::new(index, image, Vec::new()))?;
                break;
            }

            let detections = detector.detect(image.view(), &self.config.filter)?;
            let frame = Frame::new(index, image, detections);

            if self.process_frame(&frame)? == FrameOutcome::EndOfTelemetry {
                break;
            }

            processed += 1;
        }

        Ok(processed)
    }

    /// Cleans what was recorded so far and wraps it for export.
    /// Can be called at any point, vehicles that lose all their features are
    /// marked as filtered out.
    pub fn finish(mut self) -> Result<(FeatureCollection, VehicleRegistry)> {
        let features = self.aggregator.into_features();
        let cleaned = PathPostProcessor::new(self.config.cleaning).process(features);

        for id in &cleaned.removed {
            self.registry.mark_filtered(*id)?;
        }
        self.registry.finalize();

        info!(
            vehicles = self.registry.len(),
            features = cleaned.features.len(),
            "session finished"
        );

        Ok((FeatureCollection::from(cleaned.features), self.registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TrackState;
    use crate::telemetry::TelemetryFrame;

    fn pose(index: usize) -> TelemetryFrame {
        TelemetryFrame {
            latitude: 48.267013,
            longitude: 25.914562,
            abs_alt: 426.185,
            rel_alt: None,
            focal_len: 24.0,
            gb_yaw: -65.8,
            gb_pitch: -89.9,
            gb_roll: 0.0,
            timestamp: format!("12:30:{:02}:000", index),
            frame_cnt: Some(index as u32 + 1),
            diff_time: None,
        }
    }

    fn paint(image: &mut Array3<u8>, det: &Detection, rgb: [u8; 3]) {
        let b = det.bbox.as_slice();
        for y in b[1] as usize..b[3] as usize {
            for x in b[0] as usize..b[2] as usize {
                for c in 0..3 {
                    image[[y, x, c]] = rgb[c];
                }
            }
        }
    }

    fn frame(index: usize, cars: &[(Detection, [u8; 3])]) -> Frame {
        let mut image = Array3::<u8>::zeros((1080, 1920, 3));
        for (det, rgb) in cars {
            paint(&mut image, det, *rgb);
        }

        Frame::new(index, image, cars.iter().map(|(d, _)| *d).collect())
    }

    fn car(x: i32, y: i32) -> Detection {
        Detection::new(x, y, x + 40, y + 20, 2, 0.9).unwrap()
    }

    #[test]
    fn delay_marks_first_feature_of_each_frame() {
        let telemetry = Telemetry::from((0..3).map(pose).collect::<Vec<_>>());
        let mut session = Session::new(Config::default(), telemetry).unwrap();

        for index in 0..3 {
            let f = frame(index, &[(car(100, 100), [255, 0, 0]), (car(600, 400), [0, 0, 255])]);
            assert_eq!(
                session.process_frame(&f).unwrap(),
                FrameOutcome::Processed { recorded: 2 }
            );
        }

        for chunk in session.features().chunks(2) {
            assert!(chunk[0].properties.delay);
            assert!(!chunk[1].properties.delay);
        }
        assert_eq!(session.registry().len(), 2);
    }

    #[test]
    fn new_vehicles_get_a_snapshot() {
        let telemetry = Telemetry::from((0..2).map(pose).collect::<Vec<_>>());
        let config = Config::default();
        let fingerprinter = HueHistogram::new(config.identity.hue_bins);
        let mut session =
            Session::with_parts(config, telemetry, fingerprinter, MemorySink::default()).unwrap();

        session
            .process_frame(&frame(0, &[(car(100, 100), [0, 255, 0])]))
            .unwrap();
        session
            .process_frame(&frame(1, &[(car(110, 100), [0, 255, 0])]))
            .unwrap();

        let names: Vec<_> = session.sink().snapshots.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["vehicle_1.jpg"]);
        // 40x20 box plus 20px padding on each side
        assert_eq!(session.sink().snapshots[0].1.dim(), (60, 80, 3));
    }

    #[test]
    fn out_of_telemetry_stops_the_session() {
        let telemetry = Telemetry::from(vec![pose(0)]);
        let mut session = Session::new(Config::default(), telemetry).unwrap();

        session
            .process_frame(&frame(0, &[(car(100, 100), [255, 0, 0])]))
            .unwrap();
        assert_eq!(
            session.process_frame(&frame(1, &[])).unwrap(),
            FrameOutcome::EndOfTelemetry
        );
        assert!(session.is_exhausted());
        assert_eq!(session.features().len(), 1);
    }

    #[test]
    fn invalid_yaw_skips_frame_only() {
        let mut frames: Vec<_> = (0..2).map(pose).collect();
        frames[0].gb_yaw = 200.0;
        let mut session = Session::new(Config::default(), Telemetry::from(frames)).unwrap();

        let outcome = session
            .process_frame(&frame(0, &[(car(100, 100), [255, 0, 0])]))
            .unwrap();
        assert_eq!(outcome, FrameOutcome::Skipped);
        assert!(session.registry().is_empty());

        let outcome = session
            .process_frame(&frame(1, &[(car(100, 100), [255, 0, 0])]))
            .unwrap();
        assert_eq!(outcome, FrameOutcome::Processed { recorded: 1 });
        assert_eq!(session.registry().len(), 1);
    }

    struct Replay {
        frames: Vec<Vec<Detection>>,
        iou_seen: Vec<f32>,
    }

    impl Replay {
        fn new(frames: Vec<Vec<Detection>>) -> Self {
            Self {
                frames,
                iou_seen: Vec::new(),
            }
        }
    }

    impl Detector for Replay {
        fn detect(
            &mut self,
            _image: ArrayView3<'_, u8>,
            config: &FilterConfig,
        ) -> Result<Vec<Detection>> {
            self.iou_seen.push(config.iou_threshold);

            Ok(if self.frames.is_empty() {
                Vec::new()
            } else {
                self.frames.remove(0)
            })
        }
    }

    #[test]
    fn run_stops_at_end_of_telemetry() {
        let telemetry = Telemetry::from((0..3).map(pose).collect::<Vec<_>>());
        let mut session = Session::new(Config::default(), telemetry).unwrap();
        let mut detector = Replay::new(vec![vec![car(100, 100)]; 5]);

        let images = (0..5).map(|_| Array3::<u8>::zeros((1080, 1920, 3)));
        let processed = session.run(images, &mut detector).unwrap();

        assert_eq!(processed, 3);
        assert!(session.is_exhausted());
        assert_eq!(session.features().len(), 3);
    }

    #[test]
    fn detector_receives_filter_thresholds() {
        let telemetry = Telemetry::from((0..2).map(pose).collect::<Vec<_>>());
        let mut config = Config::default();
        config.filter.iou_threshold = 0.45;
        let mut session = Session::new(config, telemetry).unwrap();
        let mut detector = Replay::new(Vec::new());

        let images = (0..2).map(|_| Array3::<u8>::zeros((1080, 1920, 3)));
        session.run(images, &mut detector).unwrap();

        assert_eq!(detector.iou_seen, vec![0.45, 0.45]);
    }

    #[test]
    fn stale_frame_is_rejected_before_identity() {
        let telemetry = Telemetry::from((0..6).map(pose).collect::<Vec<_>>());
        let config = Config::default();
        let fingerprinter = HueHistogram::new(config.identity.hue_bins);
        let mut session =
            Session::with_parts(config, telemetry, fingerprinter, MemorySink::default()).unwrap();
        let red = [(car(100, 100), [255, 0, 0])];

        session.process_frame(&frame(5, &red)).unwrap();

        for stale in [3, 5] {
            match session.process_frame(&frame(stale, &red)) {
                Err(Error::FrameOutOfOrder { frame, last }) => {
                    assert_eq!((frame, last), (stale, 5));
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }

        let track = session.registry().get(1).unwrap();
        assert_eq!(track.hits, 1);
        assert_eq!(track.state, TrackState::Tentative);
        assert_eq!(track.path.len(), 1);
        assert_eq!(session.features().len(), 1);
        assert_eq!(session.sink().snapshots.len(), 1);
        assert_eq!(session.registry().recent().map(|t| t.id).collect::<Vec<_>>(), vec![1]);
    }
}
