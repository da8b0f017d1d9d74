use thiserror::Error;
use video_ingest::{FrameError, ImageView};

use crate::{options::DecodeOptions, symbol::SymbolResult};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("decoder backend failed: {0}")]
    Backend(String),
    #[error("frame cannot be viewed: {0}")]
    InvalidView(#[from] FrameError),
}

/// A barcode decoding backend.
///
/// Implementations are called from the compute context and must not assume
/// any particular thread. Finding nothing is `Ok(vec![])`, not an error.
pub trait SymbolDecoder: Send + Sync {
    fn read_symbols(
        &self,
        view: &ImageView<'_>,
        options: &DecodeOptions,
    ) -> Result<Vec<SymbolResult>, DecodeError>;
}

impl<D: SymbolDecoder + ?Sized> SymbolDecoder for std::sync::Arc<D> {
    fn read_symbols(
        &self,
        view: &ImageView<'_>,
        options: &DecodeOptions,
    ) -> Result<Vec<SymbolResult>, DecodeError> {
        (**self).read_symbols(view, options)
    }
}
