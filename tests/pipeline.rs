use geotrack::config::Config;
use geotrack::session::MemorySink;
use geotrack::{
    Detection, Frame, FrameOutcome, GeoPoint, GeoProjector, HueHistogram, Session, Telemetry,
    TelemetryFrame, TrackState,
};
use ndarray::Array3;

const LAT: f64 = 48.267013;
const LON: f64 = 25.914562;

fn pose(index: usize) -> TelemetryFrame {
    TelemetryFrame {
        latitude: LAT + index as f64 * 1e-6,
        longitude: LON,
        abs_alt: 426.185,
        rel_alt: Some(102.229),
        focal_len: 24.0,
        gb_yaw: -65.8,
        gb_pitch: -89.9,
        gb_roll: 0.0,
        timestamp: format!("14:02:{:02}:{:03}", index / 30, (index % 30) * 33),
        frame_cnt: Some(index as u32 + 1),
        diff_time: Some(String::from("33ms")),
    }
}

fn frame(index: usize, cars: &[(Detection, [u8; 3])]) -> Frame {
    let mut image = Array3::<u8>::zeros((1080, 1920, 3));

    for (det, rgb) in cars {
        let b = det.bbox.as_slice();
        for y in b[1] as usize..b[3] as usize {
            for x in b[0] as usize..b[2] as usize {
                for c in 0..3 {
                    image[[y, x, c]] = rgb[c];
                }
            }
        }
    }

    Frame::new(index, image, cars.iter().map(|(d, _)| *d).collect())
}

#[test]
fn detection_at_image_center_lands_on_the_drone() {
    let telemetry = Telemetry::from(vec![TelemetryFrame {
        latitude: 48.267013,
        longitude: 25.914562,
        abs_alt: 426.185,
        rel_alt: None,
        focal_len: 24.0,
        gb_yaw: -65.8,
        gb_pitch: 0.0,
        gb_roll: 0.0,
        timestamp: String::from("14:02:00:000"),
        frame_cnt: None,
        diff_time: None,
    }]);

    let config = Config::default();
    let projector = GeoProjector::new(config.camera.clone(), config.projection.clone());
    let det = Detection::new(940, 530, 980, 550, 2, 0.93).unwrap();
    let (cx, cy) = det.center();

    let point = projector.project(cx as f64, cy as f64, 0, &telemetry).unwrap();

    assert_eq!((cx, cy), (960, 540));
    assert_eq!(point, GeoPoint::new(48.267013, 25.914562));
}

#[test]
fn noise_track_is_dropped_and_real_track_survives() {
    let frames = 8;
    let telemetry = Telemetry::from((0..frames).map(pose).collect::<Vec<_>>());
    let config = Config::default();
    let fingerprinter = HueHistogram::new(config.identity.hue_bins);
    let mut session =
        Session::with_parts(config, telemetry, fingerprinter, MemorySink::default()).unwrap();

    let red = Detection::new(940, 530, 980, 550, 2, 0.93).unwrap();
    let blue = Detection::new(300, 300, 340, 320, 3, 0.88).unwrap();

    for index in 0..frames {
        let cars: Vec<_> = if index < 2 {
            vec![(red, [220, 20, 20]), (blue, [20, 20, 220])]
        } else {
            vec![(red, [220, 20, 20])]
        };

        let outcome = session.process_frame(&frame(index, &cars)).unwrap();
        assert_eq!(outcome, FrameOutcome::Processed { recorded: cars.len() });
    }

    let raw = session.features();
    assert_eq!(raw.len(), frames + 2);
    for index in 0..frames {
        let delays: Vec<_> = raw
            .iter()
            .filter(|f| f.frame == index)
            .map(|f| f.properties.delay)
            .collect();

        assert_eq!(delays.iter().filter(|d| **d).count(), 1);
        assert!(delays[0]);
    }

    let snapshots: Vec<_> = session.sink().snapshots.iter().map(|(n, _)| n.clone()).collect();
    assert_eq!(snapshots, vec!["vehicle_1.jpg", "vehicle_2.jpg"]);

    let (collection, registry) = session.finish().unwrap();

    assert_eq!(collection.len(), frames);
    assert!(collection
        .features
        .iter()
        .all(|f| f.properties.vehicle_id == "vehicle_1"));
    assert_eq!(registry.get(1).unwrap().state, TrackState::Finalized);
    assert_eq!(registry.get(2).unwrap().state, TrackState::FilteredOut);

    // frame-arrival order survives cleaning
    let order: Vec<_> = collection.features.iter().map(|f| f.frame).collect();
    assert_eq!(order, (0..frames).collect::<Vec<_>>());

    let mut json = Vec::new();
    collection.write_to(&mut json).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
    let first = &value["features"][0];

    assert_eq!(value["type"], "FeatureCollection");
    assert_eq!(first["geometry"]["coordinates"][0], LON);
    assert_eq!(first["geometry"]["coordinates"][1], LAT);
    assert_eq!(first["properties"]["frame_time"], "14:02:00:000");
    assert_eq!(first["properties"]["timestamp"], "2024-12-09T14:02:00:Z");
    assert_eq!(first["properties"]["confidence"], "0.9300");
}

#[test]
fn ids_are_gap_free_for_distinct_vehicles() {
    let telemetry = Telemetry::from((0..1).map(pose).collect::<Vec<_>>());
    let mut session = Session::new(Config::default(), telemetry).unwrap();

    let colors = [
        [255, 0, 0],
        [0, 255, 0],
        [0, 0, 255],
        [255, 255, 0],
        [0, 255, 255],
        [255, 0, 255],
    ];
    let cars: Vec<_> = colors
        .iter()
        .enumerate()
        .map(|(i, rgb)| {
            let x = 100 + i as i32 * 200;
            (Detection::new(x, 200, x + 40, 220, 2, 0.9).unwrap(), *rgb)
        })
        .collect();

    session.process_frame(&frame(0, &cars)).unwrap();

    let ids: Vec<_> = session.registry().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn stopping_early_keeps_recorded_features_exportable() {
    let telemetry = Telemetry::from((0..100).map(pose).collect::<Vec<_>>());
    let mut config = Config::default();
    config.cleaning.min_observations = 3;
    let mut session = Session::new(config, telemetry).unwrap();

    let red = Detection::new(940, 530, 980, 550, 2, 0.93).unwrap();
    for index in 0..4 {
        session.process_frame(&frame(index, &[(red, [220, 20, 20])])).unwrap();
    }

    let (collection, _) = session.finish().unwrap();

    assert_eq!(collection.len(), 4);
}

#[test]
fn telemetry_file_round_trip() {
    let frames: Vec<_> = (0..3).map(pose).collect();
    let path = std::env::temp_dir().join(format!("geotrack-telemetry-{}.json", std::process::id()));
    std::fs::write(&path, serde_json::to_string(&frames).unwrap()).unwrap();

    let telemetry = Telemetry::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(telemetry.len(), 3);
    assert_eq!(telemetry.get(2), frames.get(2));
}
