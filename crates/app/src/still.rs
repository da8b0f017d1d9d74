//! A video source that plays a list of still images.
//!
//! Every image is resized to the dimensions of the first one and rasterized
//! into the chosen native format up front, so a frame read is a plain copy.

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use anyhow::{Context, Result, bail};
use image::{RgbaImage, imageops::FilterType};
use video_ingest::{CaptureError, NativePixelFormat, RenderTarget, VideoSource};

pub struct StillImageSource {
    name: String,
    paths: Vec<PathBuf>,
    frames: Vec<Vec<u8>>,
    width: u32,
    height: u32,
    format: NativePixelFormat,
    current: AtomicUsize,
    last_read: AtomicUsize,
    playing: AtomicBool,
    looping: bool,
}

impl StillImageSource {
    pub fn open(paths: &[PathBuf], format: NativePixelFormat, looping: bool) -> Result<Self> {
        let Some(first) = paths.first() else {
            bail!("at least one image is required");
        };
        let first_image = load_rgba(first)?;
        let (width, height) = first_image.dimensions();
        if width == 0 || height == 0 {
            bail!("{} has no pixels", first.display());
        }

        let mut frames = vec![rasterize(&first_image, format)?];
        for path in &paths[1..] {
            let mut image = load_rgba(path)?;
            if image.dimensions() != (width, height) {
                image = image::imageops::resize(&image, width, height, FilterType::Triangle);
            }
            frames.push(rasterize(&image, format)?);
        }

        Ok(Self {
            name: first.display().to_string(),
            paths: paths.to_vec(),
            frames,
            width,
            height,
            format,
            current: AtomicUsize::new(0),
            last_read: AtomicUsize::new(0),
            playing: AtomicBool::new(true),
            looping,
        })
    }

    /// Index of the image currently on screen.
    pub fn position(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    /// Index of the image the most recent capture copied out.
    pub fn last_read(&self) -> usize {
        self.last_read.load(Ordering::SeqCst)
    }

    pub fn path(&self, index: usize) -> Option<&Path> {
        self.paths.get(index).map(PathBuf::as_path)
    }

    /// Show the next image. Returns `false` once playback has ended.
    pub fn advance(&self) -> bool {
        if !self.is_playing() {
            return false;
        }
        let next = self.position() + 1;
        if next < self.frames.len() {
            self.current.store(next, Ordering::SeqCst);
        } else if self.looping {
            self.current.store(0, Ordering::SeqCst);
        } else {
            self.playing.store(false, Ordering::SeqCst);
            return false;
        }
        true
    }
}

impl VideoSource for StillImageSource {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn surface_ready(&self) -> bool {
        !self.frames.is_empty()
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel_format(&self) -> NativePixelFormat {
        self.format
    }

    fn read_pixels(&self, target: &mut RenderTarget) -> Result<(), CaptureError> {
        let index = self.position();
        let frame = self
            .frames
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("frame {index} out of range"))?;
        let pixels = target.pixels_mut();
        pixels.clear();
        pixels.extend_from_slice(frame);
        self.last_read.store(index, Ordering::SeqCst);
        Ok(())
    }
}

pub fn load_rgba(path: &Path) -> Result<RgbaImage> {
    let image = image::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(image.to_rgba8())
}

/// Lay out `image` in the memory order of `format`.
fn rasterize(image: &RgbaImage, format: NativePixelFormat) -> Result<Vec<u8>> {
    let pixels = image.pixels();
    let bytes = match format {
        NativePixelFormat::Rgba8 => image.as_raw().clone(),
        NativePixelFormat::Bgra8 => pixels.flat_map(|p| [p[2], p[1], p[0], p[3]]).collect(),
        NativePixelFormat::Argb8 => pixels.flat_map(|p| [p[3], p[0], p[1], p[2]]).collect(),
        NativePixelFormat::Abgr8 => pixels.flat_map(|p| [p[3], p[2], p[1], p[0]]).collect(),
        NativePixelFormat::Rgb8 => pixels.flat_map(|p| [p[0], p[1], p[2]]).collect(),
        NativePixelFormat::R8 => image::DynamicImage::ImageRgba8(image.clone())
            .to_luma8()
            .into_raw(),
        other => bail!("still images cannot be rasterized as {other:?}"),
    };
    Ok(bytes)
}
