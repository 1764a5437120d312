//! Cleaning of the aggregated feature set before export.
//!
//! Outliers are found with DBSCAN over all vehicles' points at once, so a
//! lone point is dropped even when it belongs to a long track. Tracks left
//! with too few points are removed entirely, and the survivors can
//! optionally be thinned with Douglas-Peucker.

use std::collections::{BTreeSet, HashMap};

use nalgebra as na;
use rstar::primitives::GeomWithData;
use rstar::RTree;
use tracing::info;

use crate::config::CleaningConfig;
use crate::feature::GeoFeature;
use crate::math;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Unvisited,
    Noise,
    Cluster(usize),
}

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// R-tree over the input points, radius queries return input indexes
struct Neighbourhood {
    tree: RTree<IndexedPoint>,
    eps_2: f64,
}

impl Neighbourhood {
    fn new(points: &[na::Point2<f64>], eps: f64) -> Self {
        let indexed = points
            .iter()
            .enumerate()
            .map(|(idx, p)| IndexedPoint::new([p.x, p.y], idx))
            .collect();

        Self {
            tree: RTree::bulk_load(indexed),
            eps_2: eps * eps,
        }
    }

    /// Indexes within `eps` of `p`, `p` itself included
    fn region(&self, p: &na::Point2<f64>) -> Vec<usize> {
        self.tree
            .locate_within_distance([p.x, p.y], self.eps_2)
            .map(|n| n.data)
            .collect()
    }
}

/// Density clustering, returns a cluster index per point or `None` for noise.
///
/// A point is a core point when at least `min_samples` points, itself
/// included, lie within `eps`. Every point enters the expansion queue at
/// most once, so memory stays linear even when all points coincide.
pub fn dbscan(points: &[na::Point2<f64>], eps: f64, min_samples: usize) -> Vec<Option<usize>> {
    let mut labels = vec![Label::Unvisited; points.len()];
    let mut queued = vec![false; points.len()];
    let index = Neighbourhood::new(points, eps);
    let mut cluster = 0;

    for idx in 0..points.len() {
        if labels[idx] != Label::Unvisited {
            continue;
        }

        let neighbours = index.region(&points[idx]);
        if neighbours.len() < min_samples {
            labels[idx] = Label::Noise;
            continue;
        }

        labels[idx] = Label::Cluster(cluster);
        queued[idx] = true;

        let mut seeds = Vec::new();
        enqueue(&neighbours, &labels, &mut queued, &mut seeds);

        while let Some(q) = seeds.pop() {
            let previous = labels[q];
            labels[q] = Label::Cluster(cluster);

            // noise was already found not to be a core point
            if previous == Label::Noise {
                continue;
            }

            let reach = index.region(&points[q]);
            if reach.len() >= min_samples {
                enqueue(&reach, &labels, &mut queued, &mut seeds);
            }
        }

        cluster += 1;
    }

    labels
        .into_iter()
        .map(|label| match label {
            Label::Cluster(c) => Some(c),
            _ => None,
        })
        .collect()
}

fn enqueue(candidates: &[usize], labels: &[Label], queued: &mut [bool], seeds: &mut Vec<usize>) {
    for &j in candidates {
        if !queued[j] && !matches!(labels[j], Label::Cluster(_)) {
            queued[j] = true;
            seeds.push(j);
        }
    }
}

/// Drops every feature DBSCAN labels as noise, order is preserved
pub fn remove_outliers(
    features: Vec<GeoFeature>,
    eps: f64,
    min_samples: usize,
) -> Vec<GeoFeature> {
    let points: Vec<_> = features
        .iter()
        .map(|f| {
            let [lon, lat] = f.geometry.coordinates;
            na::Point2::new(lon, lat)
        })
        .collect();

    let labels = dbscan(&points, eps, min_samples);

    features
        .into_iter()
        .zip(labels)
        .filter_map(|(f, label)| label.map(|_| f))
        .collect()
}

/// Drops all features of vehicles with fewer than `min_observations` features
pub fn filter_short_tracks(features: Vec<GeoFeature>, min_observations: usize) -> Vec<GeoFeature> {
    let mut counts: HashMap<u32, usize> = HashMap::new();
    for f in &features {
        *counts.entry(f.vehicle).or_default() += 1;
    }

    features
        .into_iter()
        .filter(|f| counts[&f.vehicle] >= min_observations)
        .collect()
}

/// Indexes of the points kept by Douglas-Peucker, endpoints always included
pub fn douglas_peucker(points: &[na::Point2<f64>], tolerance: f64) -> Vec<usize> {
    if points.len() < 3 {
        return (0..points.len()).collect();
    }

    let mut keep = simplify_range(points, 0, points.len() - 1, tolerance);
    keep.dedup();
    keep
}

fn simplify_range(
    points: &[na::Point2<f64>],
    start: usize,
    end: usize,
    tolerance: f64,
) -> Vec<usize> {
    let (a, b) = (&points[start], &points[end]);

    let mut max_distance = 0.0;
    let mut furthest = start;

    for idx in start + 1..end {
        // coincident endpoints, nothing to measure against
        let distance = match math::perpendicular_distance(&points[idx], a, b) {
            Some(d) => d,
            None => return vec![start, end],
        };

        if distance > max_distance {
            max_distance = distance;
            furthest = idx;
        }
    }

    if max_distance > tolerance {
        let mut left = simplify_range(points, start, furthest, tolerance);
        let right = simplify_range(points, furthest, end, tolerance);

        left.pop();
        left.extend(right);
        left
    } else {
        vec![start, end]
    }
}

/// Simplifies every vehicle's path, features keep their global order
pub fn simplify_paths(features: Vec<GeoFeature>, tolerance: f64) -> Vec<GeoFeature> {
    let mut by_vehicle: HashMap<u32, Vec<usize>> = HashMap::new();
    for (idx, f) in features.iter().enumerate() {
        by_vehicle.entry(f.vehicle).or_default().push(idx);
    }

    let mut keep = vec![false; features.len()];
    for indexes in by_vehicle.values() {
        let points: Vec<_> = indexes
            .iter()
            .map(|&i| {
                let [lon, lat] = features[i].geometry.coordinates;
                na::Point2::new(lon, lat)
            })
            .collect();

        for kept in douglas_peucker(&points, tolerance) {
            keep[indexes[kept]] = true;
        }
    }

    features
        .into_iter()
        .zip(keep)
        .filter_map(|(f, keep)| keep.then_some(f))
        .collect()
}

/// Outlier removal followed by the minimum observation filter
pub fn clean(
    features: Vec<GeoFeature>,
    eps: f64,
    min_samples: usize,
    min_observations: usize,
) -> Vec<GeoFeature> {
    let features = remove_outliers(features, eps, min_samples);

    filter_short_tracks(features, min_observations)
}

#[derive(Debug, Clone)]
pub struct Cleaned {
    pub features: Vec<GeoFeature>,
    /// Vehicles that had features before cleaning and none after
    pub removed: BTreeSet<u32>,
}

#[derive(Debug, Clone)]
pub struct PathPostProcessor {
    config: CleaningConfig,
}

impl PathPostProcessor {
    pub fn new(config: CleaningConfig) -> Self {
        Self { config }
    }

    pub fn process(&self, features: Vec<GeoFeature>) -> Cleaned {
        let before: BTreeSet<u32> = features.iter().map(|f| f.vehicle).collect();
        let total = features.len();

        let mut features = clean(
            features,
            self.config.eps,
            self.config.min_samples,
            self.config.min_observations,
        );

        if let Some(tolerance) = self.config.simplify_tolerance {
            features = simplify_paths(features, tolerance);
        }

        let after: BTreeSet<u32> = features.iter().map(|f| f.vehicle).collect();
        let removed: BTreeSet<u32> = before.difference(&after).copied().collect();

        info!(
            before = total,
            after = features.len(),
            vehicles_removed = removed.len(),
            "paths cleaned"
        );

        Cleaned { features, removed }
    }
}
