use ndarray::{s, Array3, ArrayView3};

use crate::bbox::{BBox, Ltrb};
use crate::detection::Detection;

/// One decoded video frame with its detections
pub struct Frame {
    pub index: usize,
    /// `H x W x 3` RGB pixels
    pub image: Array3<u8>,
    pub detections: Vec<Detection>,
}

impl Frame {
    pub fn new(index: usize, image: Array3<u8>, detections: Vec<Detection>) -> Self {
        Self {
            index,
            image,
            detections,
        }
    }

    /// (width, height)
    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        let (h, w, _) = self.image.dim();

        (w as u32, h as u32)
    }

    /// Pixels under `bbox`, clipped to the image; `None` if nothing overlaps
    pub fn crop(&self, bbox: &BBox<Ltrb>) -> Option<ArrayView3<'_, u8>> {
        let (w, h) = self.dims();
        let roi = bbox.clamped(w, h)?.as_ltwh();

        let (x, y) = (roi.left() as usize, roi.top() as usize);
        let (rw, rh) = (roi.width() as usize, roi.height() as usize);

        Some(self.image.slice(s![y..y + rh, x..x + rw, ..]))
    }

    /// `bbox` grown by `padding` on every side, clipped to the image
    pub fn padded_crop(&self, bbox: &BBox<Ltrb>, padding: i32) -> Option<ArrayView3<'_, u8>> {
        let (w, h) = self.dims();

        self.crop(&bbox.padded(padding, w, h))
    }
}
