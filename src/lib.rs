//! scorescan: optical music recognition for clean, binarized sheet music.
//!
//! Finds the staves of a page, classifies the printed symbols, gives the
//! notes pitches and durations, and writes the result as a Standard MIDI
//! File. Image decoding, thresholding and deskewing happen upstream; the
//! input here is already a two-level [`BinaryImage`].
//!
//! # Example
//! ```no_run
//! use scorescan::{convert, BinaryImage, ConvertOptions};
//!
//! let gray = image::GrayImage::new(800, 400); // from the preprocessor
//! let page = BinaryImage::from_luma(&gray, 128);
//! let result = convert(&page, &ConvertOptions::default()).unwrap();
//! std::fs::write("page.mid", &result.midi).unwrap();
//! println!("{}", result.report.to_json().unwrap());
//! ```

pub mod associate;
pub mod bitmap;
pub mod components;
pub mod config;
pub mod detect;
pub mod error;
pub mod midi;
pub mod model;
pub mod pipeline;
pub mod sequencer;
pub mod staff;
pub mod unstaff;

pub use bitmap::BinaryImage;
pub use config::{ConvertOptions, StaffReading};
pub use error::{OmrError, Result};
pub use midi::{render_midi, MidiSettings, TICKS_PER_QUARTER};
pub use model::*;
pub use pipeline::{
    convert, convert_batch, convert_pages, recognize, Artifacts, BatchItem, Conversion,
    LabeledBox, Page, ProcessingReport, RecognizedPage,
};
pub use sequencer::Sequence;

/// Parse options from JSON and convert one image.
/// Convenience for callers that keep their settings as JSON.
pub fn convert_with_json(image: &BinaryImage, options_json: &str) -> Result<Conversion> {
    let options = ConvertOptions::from_json(options_json)?;
    convert(image, &options)
}
