//! `qrscan read`: decode still images once, without the sampling loop.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use serde::Serialize;
use symbology::{DecodeOptions, DecodeWorker, QrDecoder, SymbolResult};
use tracing::warn;
use video_ingest::{ImageView, PixelLayout};

use crate::still::load_rgba;

#[derive(Serialize)]
struct ReadLine {
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    symbols: Vec<SymbolResult>,
}

/// Decode every image; an image that fails to load is reported in its own
/// line and does not stop the rest.
pub fn run(images: &[PathBuf], options: DecodeOptions) -> Result<()> {
    let worker = DecodeWorker::new(Arc::new(QrDecoder::new()), options);
    let mut stdout = io::stdout().lock();
    for path in images {
        let line = match decode_file(&worker, path) {
            Ok(symbols) => ReadLine {
                image: path.display().to_string(),
                error: None,
                symbols,
            },
            Err(err) => {
                warn!("{err:#}");
                ReadLine {
                    image: path.display().to_string(),
                    error: Some(format!("{err:#}")),
                    symbols: Vec::new(),
                }
            }
        };
        serde_json::to_writer(&mut stdout, &line)?;
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}

fn decode_file(worker: &DecodeWorker, path: &Path) -> Result<Vec<SymbolResult>> {
    let image = load_rgba(path)?;
    let view = ImageView::new(
        image.as_raw(),
        image.width(),
        image.height(),
        PixelLayout::RgbWithPadding,
    )?;
    worker
        .decode_view(&view)
        .with_context(|| format!("failed to decode {}", path.display()))
}
