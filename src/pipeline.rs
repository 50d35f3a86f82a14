//! End-to-end conversion: image(s) → MIDI bytes + processing report.
//!
//! Each image runs the stages in order (staves, staff removal, detection,
//! association), every stage a pure function of the previous one's
//! output. Multi-page input is recognized in parallel and sequenced
//! serially in caller order; batch input runs whole conversions on a
//! bounded worker pool, and one image failing does not stop the others.

use std::collections::HashSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::associate::{associate, Association};
use crate::bitmap::BinaryImage;
use crate::config::ConvertOptions;
use crate::detect::{detect_symbols, SymbolSet};
use crate::error::{OmrError, Result};
use crate::midi::{render_midi, MidiSettings};
use crate::model::{BoundingBox, KeySignature, Staff, TimeSignature};
use crate::sequencer::sequence_pages;
use crate::staff::extract_staves;
use crate::unstaff::remove_staff_lines;

// ═══════════════════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════════════════

/// One input image with a caller-chosen identifier.
#[derive(Debug, Clone)]
pub struct Page {
    pub id: String,
    pub image: BinaryImage,
}

impl Page {
    pub fn new(id: impl Into<String>, image: BinaryImage) -> Self {
        Self { id: id.into(), image }
    }
}

/// A candidate's box with its classifier label, for debug overlays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledBox {
    pub staff: usize,
    pub label: String,
    pub bbox: BoundingBox,
}

/// Intermediate results kept when `collect_artifacts` is set. Plain data;
/// the library never writes them anywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifacts {
    /// Pixels erased as staff lines
    pub staff_mask: BinaryImage,
    pub symbol_boxes: Vec<LabeledBox>,
}

/// Everything recognized on one image, before sequencing.
#[derive(Debug, Clone)]
pub struct RecognizedPage {
    pub staves: Vec<Staff>,
    pub association: Association,
    /// Shapes that matched no rule
    pub unrecognized: usize,
    /// Shapes and noteheads dropped as ambiguous
    pub ambiguous: usize,
    /// Stems, beams and accidentals with nothing to attach to
    pub unresolved: usize,
    pub artifacts: Option<Artifacts>,
}

/// Summary of a conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub staff_count: usize,
    /// Musical symbols kept after association
    pub symbol_count: usize,
    /// All dropped candidates; the two counts below break it down
    pub unrecognized_symbol_count: usize,
    pub ambiguous_glyph_count: usize,
    pub unresolved_association_count: usize,
    pub detected_time_signature: Option<TimeSignature>,
    pub detected_key_signature: Option<KeySignature>,
    pub total_ticks: u32,
    pub time_signature_consistent: bool,
}

impl ProcessingReport {
    /// Convert the report to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| OmrError::Serialization(e.to_string()))
    }
}

/// Output of a successful conversion.
#[derive(Debug, Clone)]
pub struct Conversion {
    /// Standard MIDI File bytes
    pub midi: Vec<u8>,
    pub report: ProcessingReport,
    /// One entry per page when `collect_artifacts` is set, else empty
    pub artifacts: Vec<Artifacts>,
}

/// Outcome of one image in a batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub id: String,
    pub result: Result<Conversion>,
}

// ═══════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════

/// Run every recognition stage on one image.
pub fn recognize(image: &BinaryImage, options: &ConvertOptions) -> Result<RecognizedPage> {
    options.validate()?;

    let staves = extract_staves(image, options)?;
    let removal = remove_staff_lines(image, &staves);
    let set = detect_symbols(&removal.symbols, &staves);
    let association = associate(&staves, &set, options);

    if !association.symbols.iter().any(|s| s.is_timed()) {
        return Err(OmrError::NoSymbolsDetected);
    }

    let artifacts = options.collect_artifacts.then(|| Artifacts {
        staff_mask: removal.mask,
        symbol_boxes: labeled_boxes(&set),
    });

    log::info!(
        "recognized {} staves, {} symbols",
        staves.len(),
        association.symbols.len()
    );
    Ok(RecognizedPage {
        unrecognized: set.unrecognized,
        ambiguous: set.ambiguous.len() + association.ambiguous.len(),
        unresolved: association.unresolved.len(),
        staves,
        association,
        artifacts,
    })
}

/// Convert a single image.
pub fn convert(image: &BinaryImage, options: &ConvertOptions) -> Result<Conversion> {
    let page = recognize(image, options)?;
    finish(vec![page], options)
}

/// Convert several pages into one continuous score. Pages are sequenced
/// in the order given; ids must be unique.
pub fn convert_pages(pages: &[Page], options: &ConvertOptions) -> Result<Conversion> {
    if pages.is_empty() {
        return Err(OmrError::MultiPageOrderMismatch("page list is empty".into()));
    }
    let mut ids = HashSet::new();
    for page in pages {
        if !ids.insert(page.id.as_str()) {
            return Err(OmrError::MultiPageOrderMismatch(format!(
                "page id '{}' appears more than once",
                page.id
            )));
        }
    }

    let recognized: Vec<Result<RecognizedPage>> = pages
        .par_iter()
        .map(|p| {
            recognize(&p.image, options).inspect_err(|e| log::warn!("page '{}': {e}", p.id))
        })
        .collect();
    let recognized = recognized.into_iter().collect::<Result<Vec<_>>>()?;

    finish(recognized, options)
}

/// Convert independent images on a pool of `workers` threads. Failures are
/// recorded per image; only a pool that cannot start fails the batch.
pub fn convert_batch(
    pages: &[Page],
    options: &ConvertOptions,
    workers: usize,
) -> Result<Vec<BatchItem>> {
    options.validate()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| OmrError::WorkerPool(e.to_string()))?;

    let items: Vec<BatchItem> = pool.install(|| {
        pages
            .par_iter()
            .map(|p| BatchItem {
                id: p.id.clone(),
                result: convert(&p.image, options),
            })
            .collect()
    });

    let failed = items.iter().filter(|i| i.result.is_err()).count();
    for item in &items {
        if let Err(e) = &item.result {
            log::warn!("batch item '{}' failed: {e}", item.id);
        }
    }
    log::info!("batch finished: {} converted, {failed} failed", items.len() - failed);
    Ok(items)
}

// ═══════════════════════════════════════════════════════════════════════
// Internals
// ═══════════════════════════════════════════════════════════════════════

fn finish(pages: Vec<RecognizedPage>, options: &ConvertOptions) -> Result<Conversion> {
    let sequence = sequence_pages(
        pages.iter().map(|p| (p.staves.as_slice(), &p.association)),
        options,
    )?;
    let midi = render_midi(&sequence, &MidiSettings::from(options));

    let ambiguous: usize = pages.iter().map(|p| p.ambiguous).sum();
    let unresolved: usize = pages.iter().map(|p| p.unresolved).sum();
    let unrecognized: usize = pages.iter().map(|p| p.unrecognized).sum();
    let report = ProcessingReport {
        staff_count: pages.iter().map(|p| p.staves.len()).sum(),
        symbol_count: pages.iter().map(|p| p.association.symbols.len()).sum(),
        unrecognized_symbol_count: unrecognized + ambiguous + unresolved,
        ambiguous_glyph_count: ambiguous,
        unresolved_association_count: unresolved,
        detected_time_signature: sequence.time_signature,
        detected_key_signature: pages
            .iter()
            .flat_map(|p| p.association.key_signatures.iter())
            .copied()
            .find(|k| k.fifths != 0),
        total_ticks: sequence.end_tick,
        time_signature_consistent: sequence.time_signature_consistent,
    };
    log::debug!("report: {report:?}");

    Ok(Conversion {
        midi,
        report,
        artifacts: pages.into_iter().filter_map(|p| p.artifacts).collect(),
    })
}

fn labeled_boxes(set: &SymbolSet) -> Vec<LabeledBox> {
    set.candidates
        .iter()
        .map(|c| LabeledBox {
            staff: c.staff,
            label: c.kind.label().to_string(),
            bbox: c.bbox,
        })
        .collect()
}
