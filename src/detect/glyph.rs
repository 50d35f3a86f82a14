//! Shape measurements on a single cropped glyph.

use crate::bitmap::BinaryImage;
use crate::model::{BoundingBox, ShapeDescriptor, Staff};

/// A vertical stroke: consecutive columns whose longest run is long enough.
/// Coordinates are glyph-local.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Stroke {
    pub x0: u32,
    pub x1: u32,
    pub y0: u32,
    pub y1: u32,
}

impl Stroke {
    pub fn width(&self) -> u32 {
        self.x1 - self.x0 + 1
    }

    pub fn center_x(&self) -> f64 {
        (self.x0 + self.x1) as f64 / 2.0
    }
}

/// A cropped glyph together with where it sits on the page.
pub(crate) struct Glyph<'a> {
    pub image: BinaryImage,
    /// Page bounding box of the crop
    pub bbox: BoundingBox,
    pub staff: &'a Staff,
}

impl<'a> Glyph<'a> {
    pub fn new(image: BinaryImage, bbox: BoundingBox, staff: &'a Staff) -> Self {
        Self { image, bbox, staff }
    }

    pub fn w(&self) -> u32 {
        self.image.width()
    }

    pub fn h(&self) -> u32 {
        self.image.height()
    }

    /// Width in staff-spaces.
    pub fn wu(&self) -> f64 {
        self.w() as f64 / self.staff.space
    }

    /// Height in staff-spaces.
    pub fn hu(&self) -> f64 {
        self.h() as f64 / self.staff.space
    }

    pub fn width_in(&self, range: (f64, f64)) -> bool {
        (range.0..=range.1).contains(&self.wu())
    }

    pub fn height_in(&self, range: (f64, f64)) -> bool {
        (range.0..=range.1).contains(&self.hu())
    }

    pub fn area(&self) -> u32 {
        self.image.count_ink() as u32
    }

    pub fn fill(&self) -> f64 {
        self.area() as f64 / (self.w() * self.h()).max(1) as f64
    }

    pub fn descriptor(&self) -> ShapeDescriptor {
        ShapeDescriptor {
            area: self.area(),
            aspect_ratio: self.w() as f64 / self.h().max(1) as f64,
            fill_ratio: self.fill(),
        }
    }

    /// Longest vertical run in a column, as inclusive local rows.
    pub fn longest_column_run(&self, x: u32) -> Option<(u32, u32)> {
        let mut best: Option<(u32, u32)> = None;
        let mut y = 0;
        while y < self.h() {
            match self.image.vertical_run(x, y) {
                Some((top, bottom)) => {
                    if best.map_or(true, |(t, b)| bottom - top > b - t) {
                        best = Some((top, bottom));
                    }
                    y = bottom + 1;
                }
                None => y += 1,
            }
        }
        best
    }

    pub fn longest_column_run_len(&self) -> u32 {
        (0..self.w())
            .filter_map(|x| self.longest_column_run(x))
            .map(|(t, b)| b - t + 1)
            .max()
            .unwrap_or(0)
    }

    /// Vertical strokes at least `min_len` pixels tall, left to right.
    pub fn strokes(&self, min_len: f64) -> Vec<Stroke> {
        let mut strokes: Vec<Stroke> = Vec::new();
        for x in 0..self.w() {
            let Some((top, bottom)) = self.longest_column_run(x) else {
                continue;
            };
            if ((bottom - top + 1) as f64) < min_len {
                continue;
            }
            match strokes.last_mut() {
                Some(s) if s.x1 + 1 == x && top <= s.y1 && bottom >= s.y0 => {
                    s.x1 = x;
                    s.y0 = s.y0.min(top);
                    s.y1 = s.y1.max(bottom);
                }
                _ => strokes.push(Stroke { x0: x, x1: x, y0: top, y1: bottom }),
            }
        }
        strokes
    }

    /// Number of horizontal bars: groups of consecutive rows holding a
    /// horizontal run of at least `min_len` pixels.
    pub fn bars(&self, min_len: f64) -> usize {
        let mut count = 0;
        let mut in_bar = false;
        for y in 0..self.h() {
            let longest = (0..self.w())
                .map(|x| self.image.horizontal_run_len(x, y))
                .max()
                .unwrap_or(0);
            let is_bar = longest as f64 >= min_len;
            if is_bar && !in_bar {
                count += 1;
            }
            in_bar = is_bar;
        }
        count
    }

    /// Ink fraction of a sub-rectangle given in fractions of the glyph box.
    pub fn region_fill(&self, fx0: f64, fy0: f64, fx1: f64, fy1: f64) -> f64 {
        let (w, h) = (self.w() as f64, self.h() as f64);
        let x0 = (fx0 * w).floor() as u32;
        let y0 = (fy0 * h).floor() as u32;
        let x1 = ((fx1 * w).ceil() as u32).clamp(x0 + 1, self.w().max(x0 + 1));
        let y1 = ((fy1 * h).ceil() as u32).clamp(y0 + 1, self.h().max(y0 + 1));
        let mut ink = 0u32;
        for y in y0..y1 {
            for x in x0..x1 {
                if self.image.get(x, y) {
                    ink += 1;
                }
            }
        }
        ink as f64 / ((x1 - x0) * (y1 - y0)) as f64
    }

    /// Ink fraction of each cell of a `rows × cols` grid, row-major.
    pub fn zones(&self, rows: u32, cols: u32) -> Vec<f64> {
        let mut out = Vec::with_capacity((rows * cols) as usize);
        for r in 0..rows {
            for c in 0..cols {
                out.push(self.region_fill(
                    c as f64 / cols as f64,
                    r as f64 / rows as f64,
                    (c + 1) as f64 / cols as f64,
                    (r + 1) as f64 / rows as f64,
                ));
            }
        }
        out
    }
}
