use serde_derive::{Deserialize, Serialize};
use std::marker::PhantomData;

use crate::error::{Error, Result};

pub trait BBoxFormat: std::fmt::Debug + Default {}

/// Left-top-right-bottom format, contains left top and right bottom corners
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

/// Left-top-width-height format, contains left top corner and width-height
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Ltwh;
impl BBoxFormat for Ltwh {}

/// Pixel-space box, the format is tracked in the type
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct BBox<F: BBoxFormat>([i32; 4], #[serde(skip)] PhantomData<F>);

impl<F: BBoxFormat> From<BBox<F>> for [i32; 4] {
    fn from(bbox: BBox<F>) -> Self {
        bbox.0
    }
}

impl<F: BBoxFormat> BBox<F> {
    #[inline]
    pub fn as_slice(&self) -> &[i32; 4] {
        &self.0
    }
}

impl BBox<Ltrb> {
    /// Builds a box from its corners, rejects empty or inverted boxes
    pub fn ltrb(x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Self> {
        if x1 >= x2 || y1 >= y2 {
            return Err(Error::InvalidBBox { x1, y1, x2, y2 });
        }

        Ok(BBox([x1, y1, x2, y2], PhantomData))
    }

    #[inline(always)]
    pub fn left(&self) -> i32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> i32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn right(&self) -> i32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> i32 {
        self.0[3]
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.left() < self.right() && self.top() < self.bottom()
    }

    /// Integer center, rounded towards negative infinity
    #[inline]
    pub fn center(&self) -> (i32, i32) {
        (
            (self.left() + self.right()).div_euclid(2),
            (self.top() + self.bottom()).div_euclid(2),
        )
    }

    /// True when any edge lies within `margin` px of the frame edge
    pub fn near_border(&self, frame_w: u32, frame_h: u32, margin: i32) -> bool {
        self.left() < margin
            || self.top() < margin
            || self.right() > frame_w as i32 - margin
            || self.bottom() > frame_h as i32 - margin
    }

    /// Grows the box by `padding` on every side, clamped to the frame
    pub fn padded(&self, padding: i32, frame_w: u32, frame_h: u32) -> Self {
        BBox(
            [
                (self.left() - padding).max(0),
                (self.top() - padding).max(0),
                (self.right() + padding).min(frame_w as i32),
                (self.bottom() + padding).min(frame_h as i32),
            ],
            PhantomData,
        )
    }

    /// Intersection with the frame, `None` when nothing is left
    pub fn clamped(&self, frame_w: u32, frame_h: u32) -> Option<Self> {
        let bbox = BBox(
            [
                self.left().clamp(0, frame_w as i32),
                self.top().clamp(0, frame_h as i32),
                self.right().clamp(0, frame_w as i32),
                self.bottom().clamp(0, frame_h as i32),
            ],
            PhantomData,
        );

        bbox.is_valid().then_some(bbox)
    }

    #[inline]
    pub fn as_ltwh(&self) -> BBox<Ltwh> {
        self.into()
    }
}

impl BBox<Ltwh> {
    #[inline(always)]
    pub fn left(&self) -> i32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> i32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn width(&self) -> i32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn height(&self) -> i32 {
        self.0[3]
    }
}

impl<'a> From<&'a BBox<Ltrb>> for BBox<Ltwh> {
    #[inline]
    fn from(v: &'a BBox<Ltrb>) -> Self {
        Self(
            [v.0[0], v.0[1], v.0[2] - v.0[0], v.0[3] - v.0[1]],
            PhantomData,
        )
    }
}
