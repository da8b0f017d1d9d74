//! QR decoding backed by `rqrr`.
//!
//! Only [`BarcodeFormat::QrCode`] is produced. With `try_harder` the decoder
//! falls back to an inverted pass and then a 2x area-averaged downscale,
//! stopping at the first pass that finds anything.

use rqrr::PreparedImage;
use tracing::trace;
use video_ingest::ImageView;

use crate::{
    decoder::{DecodeError, SymbolDecoder},
    options::DecodeOptions,
    symbol::{BarcodeFormat, Point, Quadrilateral, SymbolResult},
};

#[derive(Clone, Copy, Debug, Default)]
pub struct QrDecoder;

impl QrDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Clone, Copy, Debug)]
enum Pass {
    Raw,
    Inverted,
    Downscaled,
}

impl SymbolDecoder for QrDecoder {
    fn read_symbols(
        &self,
        view: &ImageView<'_>,
        options: &DecodeOptions,
    ) -> Result<Vec<SymbolResult>, DecodeError> {
        if !options.symbologies.contains(BarcodeFormat::QrCode) {
            return Ok(Vec::new());
        }
        let width = view.width() as usize;
        let height = view.height() as usize;
        let luma = view.to_luma();

        let passes: &[Pass] = if options.try_harder {
            &[Pass::Raw, Pass::Inverted, Pass::Downscaled]
        } else {
            &[Pass::Raw]
        };
        for pass in passes {
            let found = match pass {
                Pass::Raw => scan(&luma, width, height, 1.0),
                Pass::Inverted => {
                    let inverted: Vec<u8> = luma.iter().map(|v| u8::MAX - v).collect();
                    scan(&inverted, width, height, 1.0)
                }
                Pass::Downscaled if width >= 2 && height >= 2 => {
                    let small = downscale_2x(&luma, width, height);
                    scan(&small, width / 2, height / 2, 2.0)
                }
                Pass::Downscaled => Vec::new(),
            };
            trace!(?pass, symbols = found.len(), "qr pass finished");
            if !found.is_empty() {
                return Ok(found);
            }
        }
        Ok(Vec::new())
    }
}

/// Detect and decode every grid in a grey image; `scale` maps corners back
/// to the caller's coordinate space.
fn scan(grey: &[u8], width: usize, height: usize, scale: f32) -> Vec<SymbolResult> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let mut image = PreparedImage::prepare_from_greyscale(width, height, |x, y| grey[y * width + x]);
    let mut symbols = Vec::new();
    for grid in image.detect_grids() {
        let mut payload = Vec::new();
        match grid.decode_to(&mut payload) {
            Ok(_meta) => {
                let corners = grid.bounds.map(|p| Point::new(p.x as f32, p.y as f32));
                let position = Quadrilateral::from_corners(corners).scaled(scale);
                symbols.push(SymbolResult::from_payload(
                    BarcodeFormat::QrCode,
                    payload,
                    position,
                ));
            }
            Err(err) => trace!("qr grid rejected: {err}"),
        }
    }
    symbols
}

/// Average each 2x2 block into one pixel.
fn downscale_2x(grey: &[u8], width: usize, height: usize) -> Vec<u8> {
    let (dw, dh) = (width / 2, height / 2);
    let mut out = Vec::with_capacity(dw * dh);
    for dy in 0..dh {
        for dx in 0..dw {
            let (sx, sy) = (dx * 2, dy * 2);
            let sum = grey[sy * width + sx] as u32
                + grey[sy * width + sx + 1] as u32
                + grey[(sy + 1) * width + sx] as u32
                + grey[(sy + 1) * width + sx + 1] as u32;
            out.push(((sum + 2) / 4) as u8);
        }
    }
    out
}
