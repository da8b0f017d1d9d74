//! Barcode symbols and the worker that extracts them from captured frames.
//!
//! - `symbol`: symbologies, format sets and decoded results.
//! - `options`: per-reader decode options.
//! - `decoder`: the pluggable decoding backend seam.
//! - `qr`: pure-Rust QR backend (feature `qr`).
//! - `worker`: format screening and decode of one frame.

pub mod decoder;
pub mod options;
#[cfg(feature = "qr")]
pub mod qr;
pub mod symbol;
pub mod worker;

pub use decoder::{DecodeError, SymbolDecoder};
pub use options::DecodeOptions;
#[cfg(feature = "qr")]
pub use qr::QrDecoder;
pub use symbol::{
    BarcodeFormat, ContentType, FormatSet, Point, Quadrilateral, SymbolResult, UnknownFormat,
};
pub use worker::{DecodeAbort, DecodeWorker};
