//! Appearance fingerprints used to re-identify vehicles between frames.
//!
//! A fingerprint is a hue histogram of the detection crop, min-max normalized
//! to `[0, 1]`. Hue is binned on the 8-bit `0..180` scale so histograms are
//! interchangeable with ones produced by common vision toolkits.

use ndarray::{Array1, ArrayView3, Axis};
use serde_derive::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompareMethod {
    /// Pearson correlation, `[-1, 1]`
    Correlation,
    /// Shared mass relative to the heavier histogram, `[0, 1]`
    Intersection,
    /// One minus the Bhattacharyya distance, `[0, 1]`
    Bhattacharyya,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint(Array1<f32>);

impl From<Vec<f32>> for Fingerprint {
    fn from(bins: Vec<f32>) -> Self {
        Fingerprint(Array1::from(bins))
    }
}

impl Fingerprint {
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_array(&self) -> &Array1<f32> {
        &self.0
    }

    /// Higher is more similar, identical fingerprints score the method's maximum
    pub fn similarity(&self, other: &Fingerprint, method: CompareMethod) -> Result<f32> {
        if self.len() != other.len() {
            return Err(Error::FingerprintMismatch(self.len(), other.len()));
        }

        let a = self.0.mapv(f64::from);
        let b = other.0.mapv(f64::from);

        let score = match method {
            CompareMethod::Correlation => correlation(&a, &b),
            CompareMethod::Intersection => {
                let shared = a.iter().zip(b.iter()).map(|(x, y)| x.min(*y)).sum::<f64>();
                let mass = a.sum().max(b.sum());

                if mass <= f64::EPSILON {
                    1.0
                } else {
                    shared / mass
                }
            }
            CompareMethod::Bhattacharyya => 1.0 - bhattacharyya(&a, &b),
        };

        Ok(score as f32)
    }
}

fn correlation(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    let n = a.len() as f64;
    if n == 0.0 {
        return 1.0;
    }

    let (ma, mb) = (a.sum() / n, b.sum() / n);
    let da = a.mapv(|x| x - ma);
    let db = b.mapv(|x| x - mb);

    let num = da.dot(&db);
    let (va, vb) = (da.dot(&da), db.dot(&db));

    // a flat histogram only correlates with another flat one
    match (va <= f64::EPSILON, vb <= f64::EPSILON) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        (false, false) => num / (va * vb).sqrt(),
    }
}

fn bhattacharyya(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    let n = a.len() as f64;
    let (sa, sb) = (a.sum(), b.sum());

    if sa <= f64::EPSILON && sb <= f64::EPSILON {
        return 0.0;
    }

    if sa <= f64::EPSILON || sb <= f64::EPSILON {
        return 1.0;
    }

    let coeff = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x * y).sqrt())
        .sum::<f64>();

    let mean_norm = ((sa / n) * (sb / n)).sqrt() * n;

    (1.0 - coeff / mean_norm).max(0.0).sqrt()
}

/// Turns a cropped detection into a fingerprint
pub trait Fingerprinter {
    /// `roi` is an `H x W x 3` RGB view
    fn fingerprint(&self, roi: ArrayView3<'_, u8>) -> Fingerprint;
}

#[derive(Debug, Clone)]
pub struct HueHistogram {
    bins: usize,
}

impl HueHistogram {
    const HUE_RANGE: f64 = 180.0;

    pub fn new(bins: usize) -> Self {
        Self { bins: bins.max(1) }
    }

    #[inline]
    pub fn bins(&self) -> usize {
        self.bins
    }

    fn bin_of(&self, r: u8, g: u8, b: u8) -> usize {
        let hue = rgb_to_hue(r, g, b) / 2.0;
        let bin = (hue * self.bins as f64 / Self::HUE_RANGE) as usize;

        bin.min(self.bins - 1)
    }
}

impl Default for HueHistogram {
    fn default() -> Self {
        Self::new(180)
    }
}

impl Fingerprinter for HueHistogram {
    fn fingerprint(&self, roi: ArrayView3<'_, u8>) -> Fingerprint {
        let mut hist = Array1::<f32>::zeros(self.bins);

        for row in roi.axis_iter(Axis(0)) {
            for px in row.axis_iter(Axis(0)) {
                if px.len() < 3 {
                    continue;
                }

                hist[self.bin_of(px[0], px[1], px[2])] += 1.0;
            }
        }

        let min = hist.fold(f32::INFINITY, |m, &v| m.min(v));
        let max = hist.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        let range = max - min;

        if range > f32::EPSILON {
            hist.mapv_inplace(|v| (v - min) / range);
        } else {
            hist.mapv_inplace(|_| 0.0);
        }

        Fingerprint(hist)
    }
}

/// Hue in degrees, `[0, 360)`
fn rgb_to_hue(r: u8, g: u8, b: u8) -> f64 {
    let (r, g, b) = (r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0);

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta < 1e-9 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta) % 6.0)
    } else if max == g {
        60.0 * (((b - r) / delta) + 2.0)
    } else {
        60.0 * (((r - g) / delta) + 4.0)
    };

    if h < 0.0 {
        h + 360.0
    } else {
        h
    }
}
