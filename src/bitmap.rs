//! Two-level image handed over by the upstream preprocessor.
//!
//! `true` is ink (foreground), `false` is paper. Coordinates are
//! `(x, y)` with the origin at the top-left corner.

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::model::BoundingBox;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryImage {
    width: u32,
    height: u32,
    pixels: Vec<bool>,
}

impl BinaryImage {
    /// Blank (all paper) image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![false; width as usize * height as usize],
        }
    }

    pub fn from_fn<F: FnMut(u32, u32) -> bool>(width: u32, height: u32, mut f: F) -> Self {
        let mut img = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                img.set(x, y, f(x, y));
            }
        }
        img
    }

    /// Threshold a grayscale page: pixels darker than `threshold` are ink.
    pub fn from_luma(gray: &GrayImage, threshold: u8) -> Self {
        Self::from_fn(gray.width(), gray.height(), |x, y| {
            gray.get_pixel(x, y).0[0] < threshold
        })
    }

    /// Render as black ink on white paper, for external debug writers.
    pub fn to_luma(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            if self.get(x, y) {
                Luma([0u8])
            } else {
                Luma([255u8])
            }
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Ink at `(x, y)`; anything outside the image is paper.
    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.pixels[self.index(x, y)]
    }

    /// Signed lookup for neighbourhood walks.
    pub fn get_i(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && self.get(x as u32, y as u32)
    }

    /// Writes outside the image are ignored.
    pub fn set(&mut self, x: u32, y: u32, ink: bool) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.pixels[i] = ink;
        }
    }

    /// Paint an inclusive rectangle, clipped to the image.
    pub fn fill_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, ink: bool) {
        for y in y0..=y1.min(self.height.saturating_sub(1)) {
            for x in x0..=x1.min(self.width.saturating_sub(1)) {
                self.set(x, y, ink);
            }
        }
    }

    /// Ink pixel count per row: the horizontal projection profile.
    pub fn row_counts(&self) -> Vec<u32> {
        self.pixels
            .chunks(self.width.max(1) as usize)
            .map(|row| row.iter().filter(|&&p| p).count() as u32)
            .collect()
    }

    pub fn count_ink(&self) -> usize {
        self.pixels.iter().filter(|&&p| p).count()
    }

    /// Copy of the pixels inside `bbox` as a new image.
    pub fn crop(&self, bbox: &BoundingBox) -> BinaryImage {
        BinaryImage::from_fn(bbox.width(), bbox.height(), |x, y| {
            self.get(bbox.x0 + x, bbox.y0 + y)
        })
    }

    /// Inclusive rows `[y_start, y_end]` of the vertical ink run through
    /// `(x, y)`, or `None` when the pixel is paper.
    pub fn vertical_run(&self, x: u32, y: u32) -> Option<(u32, u32)> {
        if !self.get(x, y) {
            return None;
        }
        let mut top = y;
        while top > 0 && self.get(x, top - 1) {
            top -= 1;
        }
        let mut bottom = y;
        while self.get(x, bottom + 1) {
            bottom += 1;
        }
        Some((top, bottom))
    }

    /// Length of the horizontal ink run through `(x, y)`; 0 on paper.
    pub fn horizontal_run_len(&self, x: u32, y: u32) -> u32 {
        if !self.get(x, y) {
            return 0;
        }
        let mut left = x;
        while left > 0 && self.get(left - 1, y) {
            left -= 1;
        }
        let mut right = x;
        while self.get(right + 1, y) {
            right += 1;
        }
        right - left + 1
    }
}
