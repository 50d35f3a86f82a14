//! Staff geometry extraction.
//!
//! Staff lines are the only long horizontal structures on a page, so the
//! horizontal projection profile (ink count per row) peaks on them. Peak
//! rows are merged into lines, and lines are grouped into five-line staves
//! whose spacing is close to uniform. The resulting staff-space becomes the
//! unit for every later geometric test.

use crate::bitmap::BinaryImage;
use crate::config::ConvertOptions;
use crate::error::{OmrError, Result};
use crate::model::{Staff, StaffLine};

/// Symbol search extends this many staff-spaces above and below a staff.
const BAND_MARGIN_SPACES: f64 = 3.0;

/// Find all staves on the page, top to bottom.
pub fn extract_staves(image: &BinaryImage, options: &ConvertOptions) -> Result<Vec<Staff>> {
    let profile = image.row_counts();
    let lines = find_lines(&profile, options.line_threshold, options.line_merge_gap);
    log::debug!("{} candidate staff lines", lines.len());

    let groups = group_lines(&lines, options.spacing_tolerance);
    if groups.is_empty() {
        return Err(OmrError::NoStaffDetected);
    }

    let mut staves: Vec<Staff> = groups
        .into_iter()
        .enumerate()
        .map(|(index, (lines, space))| {
            let (x_start, x_end) = horizontal_extent(image, &lines[2]);
            Staff {
                index,
                lines,
                space,
                x_start,
                x_end,
                band_top: 0,
                band_bottom: image.height(),
            }
        })
        .collect();

    assign_bands(&mut staves, image.height());

    for s in &staves {
        log::debug!(
            "staff {}: lines at {:?}, space {:.1}px, band {}..{}",
            s.index,
            s.lines.iter().map(|l| l.row).collect::<Vec<_>>(),
            s.space,
            s.band_top,
            s.band_bottom
        );
    }
    Ok(staves)
}

/// Rows reaching `threshold` of the fullest row, merged into lines.
fn find_lines(profile: &[u32], threshold: f64, merge_gap: u32) -> Vec<StaffLine> {
    let max = profile.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return Vec::new();
    }
    let cutoff = (threshold * max as f64).max(1.0);

    let mut lines: Vec<StaffLine> = Vec::new();
    let mut current: Option<(u32, u32)> = None; // (first row, last row)
    for (y, &count) in profile.iter().enumerate() {
        if (count as f64) < cutoff {
            continue;
        }
        let y = y as u32;
        current = match current {
            Some((first, last)) if y - last <= merge_gap => Some((first, y)),
            Some((first, last)) => {
                lines.push(StaffLine { row: first, thickness: last - first + 1 });
                Some((y, y))
            }
            None => Some((y, y)),
        };
    }
    if let Some((first, last)) = current {
        lines.push(StaffLine { row: first, thickness: last - first + 1 });
    }
    lines
}

/// Slide a five-line window over the lines; accept evenly spaced groups.
fn group_lines(lines: &[StaffLine], tolerance: f64) -> Vec<([StaffLine; 5], f64)> {
    let mut groups = Vec::new();
    let mut i = 0;
    while i + 5 <= lines.len() {
        let window: [StaffLine; 5] = [lines[i], lines[i + 1], lines[i + 2], lines[i + 3], lines[i + 4]];
        match evaluate_spacing(&window, tolerance) {
            Some(space) => {
                groups.push((window, space));
                i += 5;
            }
            None => i += 1,
        }
    }
    groups
}

/// Median spacing of a window when its spacing is uniform enough.
fn evaluate_spacing(window: &[StaffLine; 5], tolerance: f64) -> Option<f64> {
    let mut spacings: Vec<f64> = window
        .windows(2)
        .map(|w| w[1].center() - w[0].center())
        .collect();
    let mean = spacings.iter().sum::<f64>() / 4.0;
    let variance = spacings.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / 4.0;

    let thickest = window.iter().map(|l| l.thickness).max().unwrap_or(1) as f64;
    if mean <= 2.0 * thickest || variance.sqrt() > tolerance * mean {
        return None;
    }

    spacings.sort_by(|a, b| a.total_cmp(b));
    Some((spacings[1] + spacings[2]) / 2.0)
}

/// First and last ink column on a line's rows.
fn horizontal_extent(image: &BinaryImage, line: &StaffLine) -> (u32, u32) {
    let has_ink = |x: u32| (line.row..=line.bottom_row()).any(|y| image.get(x, y));
    let start = (0..image.width()).find(|&x| has_ink(x)).unwrap_or(0);
    let end = (0..image.width()).rev().find(|&x| has_ink(x)).unwrap_or(start);
    (start, end)
}

/// Search bands: a fixed margin around each staff, split at one shared row
/// halfway between neighbouring staves so no row belongs to two bands.
fn assign_bands(staves: &mut [Staff], height: u32) {
    // splits[i] is the first row of staff i + 1 and one past the last of staff i
    let splits: Vec<u32> = staves
        .windows(2)
        .map(|w| ((w[0].bottom() + w[1].top()) / 2.0).round().max(0.0) as u32)
        .collect();

    for i in 0..staves.len() {
        let margin = BAND_MARGIN_SPACES * staves[i].space;
        let mut top = (staves[i].top() - margin).max(0.0).floor() as u32;
        let mut bottom = ((staves[i].bottom() + margin).ceil().max(0.0) as u32).min(height);
        if i > 0 {
            top = top.max(splits[i - 1]);
        }
        if let Some(&split) = splits.get(i) {
            bottom = bottom.min(split);
        }
        staves[i].band_top = top;
        staves[i].band_bottom = bottom.max(top);
    }
}
