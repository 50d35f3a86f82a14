//! Connected-component labelling (8-connectivity).

use std::ops::Range;

use crate::bitmap::BinaryImage;
use crate::model::BoundingBox;

/// One connected blob of ink.
#[derive(Debug, Clone)]
pub struct Component {
    pub bbox: BoundingBox,
    /// Page coordinates of every ink pixel
    pub pixels: Vec<(u32, u32)>,
}

impl Component {
    pub fn area(&self) -> u32 {
        self.pixels.len() as u32
    }

    /// The component alone, cropped to its bounding box. Other blobs that
    /// happen to intrude into the box are left out.
    pub fn to_image(&self) -> BinaryImage {
        let mut img = BinaryImage::new(self.bbox.width(), self.bbox.height());
        for &(x, y) in &self.pixels {
            img.set(x - self.bbox.x0, y - self.bbox.y0, true);
        }
        img
    }
}

/// Label the components whose pixels lie in `rows`, ordered left to right
/// (then top to bottom) by bounding box.
pub fn label(image: &BinaryImage, rows: Range<u32>) -> Vec<Component> {
    let width = image.width();
    let y_end = rows.end.min(image.height());
    let y_start = rows.start.min(y_end);
    let band_height = y_end - y_start;

    let mut seen = vec![false; width as usize * band_height as usize];
    let slot = |x: u32, y: u32| (y - y_start) as usize * width as usize + x as usize;

    let mut components = Vec::new();
    let mut stack: Vec<(u32, u32)> = Vec::new();

    for y in y_start..y_end {
        for x in 0..width {
            if !image.get(x, y) || seen[slot(x, y)] {
                continue;
            }
            seen[slot(x, y)] = true;
            stack.push((x, y));

            let mut pixels = Vec::new();
            let mut bbox = BoundingBox { x0: x, y0: y, x1: x, y1: y };

            while let Some((px, py)) = stack.pop() {
                pixels.push((px, py));
                bbox.x0 = bbox.x0.min(px);
                bbox.x1 = bbox.x1.max(px);
                bbox.y0 = bbox.y0.min(py);
                bbox.y1 = bbox.y1.max(py);

                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        let nx = px as i64 + dx;
                        let ny = py as i64 + dy;
                        if ny < y_start as i64 || ny >= y_end as i64 || !image.get_i(nx, ny) {
                            continue;
                        }
                        let (nx, ny) = (nx as u32, ny as u32);
                        if !seen[slot(nx, ny)] {
                            seen[slot(nx, ny)] = true;
                            stack.push((nx, ny));
                        }
                    }
                }
            }

            components.push(Component { bbox, pixels });
        }
    }

    components.sort_by_key(|c| (c.bbox.x0, c.bbox.y0));
    components
}
