//! Staff line removal.
//!
//! A pixel run that covers a staff line is erased only when it is no
//! taller than the line itself (plus a small allowance for anti-aliasing
//! residue). Anything taller (a stem, a notehead, a beam or an accidental
//! stroke crossing the line) is kept intact, so symbols are not cut
//! into fragments.

use serde::Serialize;

use crate::bitmap::BinaryImage;
use crate::model::{Staff, StaffLine};

/// Output of the staff-free image builder.
#[derive(Debug, Clone, Serialize)]
pub struct StaffRemoval {
    /// Input image with staff-line pixels erased
    pub symbols: BinaryImage,
    /// Exactly the erased pixels
    pub mask: BinaryImage,
}

/// Erase line-like runs of every staff line.
pub fn remove_staff_lines(image: &BinaryImage, staves: &[Staff]) -> StaffRemoval {
    let mut symbols = image.clone();
    let mut mask = BinaryImage::new(image.width(), image.height());

    for staff in staves {
        for line in &staff.lines {
            erase_line(image, line, &mut symbols, &mut mask);
        }
    }

    log::debug!("staff removal erased {} pixels", mask.count_ink());
    StaffRemoval { symbols, mask }
}

fn erase_line(source: &BinaryImage, line: &StaffLine, out: &mut BinaryImage, mask: &mut BinaryImage) {
    let max_run = line.thickness + (line.thickness / 2).max(1);

    for x in 0..source.width() {
        let Some(y) = (line.row..=line.bottom_row()).find(|&y| source.get(x, y)) else {
            continue;
        };
        let Some((top, bottom)) = source.vertical_run(x, y) else {
            continue;
        };
        if bottom - top + 1 > max_run {
            continue;
        }
        for yy in top..=bottom {
            out.set(x, yy, false);
            mask.set(x, yy, true);
        }
    }
}
