use std::path::Path;

use anyhow::Context as _;

use crate::foundation::core::{Extent, PixelFormat, PixelRect};
use crate::foundation::error::{SortlastError, SortlastResult};
use crate::image::wire::{WireReader, WireWriter};
use crate::render::camera::tiled_size_and_origin;
use crate::render::target::RenderTarget;

const RAW_IMAGE_MAGIC: [u8; 4] = *b"SLRI";

/// Pixel buffer tagged with its dimensions and validity.
///
/// A valid image always holds exactly `width * height * bytes_per_pixel` bytes. An invalid
/// image carries no usable data and is never pushed to a target. Copies are explicit
/// (`Clone`); nothing aliases pixel storage across owners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawImage {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
    valid: bool,
}

impl Default for RawImage {
    fn default() -> Self {
        Self::invalid()
    }
}

impl RawImage {
    /// An image with no usable data.
    pub fn invalid() -> Self {
        Self {
            width: 0,
            height: 0,
            format: PixelFormat::Rgba8,
            pixels: Vec::new(),
            valid: false,
        }
    }

    /// Wrap an existing pixel buffer. Fails when the buffer length does not match.
    pub fn from_pixels(
        extent: Extent,
        format: PixelFormat,
        pixels: Vec<u8>,
    ) -> SortlastResult<Self> {
        if extent.is_empty() {
            return Err(SortlastError::render(format!(
                "raw image needs a non-empty extent, got {extent:?}"
            )));
        }
        let expected = extent.pixel_count() * format.bytes_per_pixel();
        if pixels.len() != expected {
            return Err(SortlastError::render(format!(
                "raw image {}x{} {format:?} expects {expected} bytes, got {}",
                extent.width,
                extent.height,
                pixels.len()
            )));
        }
        Ok(Self {
            width: extent.width,
            height: extent.height,
            format,
            pixels,
            valid: true,
        })
    }

    /// Image of `extent` filled with one premultiplied RGBA8 color.
    pub fn solid(extent: Extent, rgba: [u8; 4]) -> SortlastResult<Self> {
        Self::from_pixels(
            extent,
            PixelFormat::Rgba8,
            rgba.repeat(extent.pixel_count()),
        )
    }

    /// Read `region` of the target's frame buffer.
    ///
    /// The result is invalid when the region is degenerate, the target has zero extent, or
    /// the region does not fit inside the window.
    pub fn capture<T: RenderTarget + ?Sized>(target: &T, region: PixelRect) -> Self {
        let size = target.actual_size();
        if region.is_degenerate() || size.is_empty() || !region.fits_within(size) {
            tracing::debug!(?region, ?size, "capture region rejected");
            return Self::invalid();
        }
        match target.read_pixels(region) {
            Ok(pixels) => Self {
                width: region.width,
                height: region.height,
                format: PixelFormat::Rgba8,
                pixels,
                valid: true,
            },
            Err(err) => {
                tracing::warn!(%err, "frame buffer read failed");
                Self::invalid()
            }
        }
    }

    /// Read the region currently covered by the target's renderer viewport.
    pub fn capture_viewport<T: RenderTarget + ?Sized>(target: &T) -> Self {
        Self::capture(target, tiled_size_and_origin(target).rect())
    }

    /// `true` when the image carries usable pixels.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Width in pixels (0 when invalid).
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels (0 when invalid).
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Image dimensions.
    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }

    /// Pixel layout.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Packed pixel bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Give up ownership of the pixel bytes.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Drop the pixel data and mark the image unusable.
    pub fn invalidate(&mut self) {
        *self = Self::invalid();
    }

    /// Pixels as premultiplied RGBA8 (RGB gains an opaque alpha channel).
    pub fn to_rgba8(&self) -> Vec<u8> {
        match self.format {
            PixelFormat::Rgba8 => self.pixels.clone(),
            PixelFormat::Rgb8 => self
                .pixels
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
        }
    }

    /// Nearest-neighbour resample to `extent`. Invalid images stay invalid.
    pub fn resized(&self, extent: Extent) -> RawImage {
        if !self.valid || extent.is_empty() {
            return Self::invalid();
        }
        if extent == self.extent() {
            return self.clone();
        }
        let bpp = self.format.bytes_per_pixel();
        let (sw, sh) = (self.width as u64, self.height as u64);
        let mut out = Vec::with_capacity(extent.pixel_count() * bpp);
        for y in 0..u64::from(extent.height) {
            let sy = (y * sh / u64::from(extent.height)) as usize;
            for x in 0..u64::from(extent.width) {
                let sx = (x * sw / u64::from(extent.width)) as usize;
                let idx = (sy * self.width as usize + sx) * bpp;
                out.extend_from_slice(&self.pixels[idx..idx + bpp]);
            }
        }
        Self {
            width: extent.width,
            height: extent.height,
            format: self.format,
            pixels: out,
            valid: true,
        }
    }

    /// Write the pixels at the origin of the target's native viewport, at the image's own
    /// extent, bypassing the renderer viewport. No-op for invalid images.
    pub fn push_to_frame_buffer<T: RenderTarget + ?Sized>(
        &self,
        target: &mut T,
    ) -> SortlastResult<()> {
        if !self.valid {
            return Ok(());
        }
        let origin = target.native_viewport();
        let rect = PixelRect::new(origin.x, origin.y, self.width, self.height);
        target.draw_pixels(rect, &self.to_rgba8())
    }

    /// Scale the pixels into the target's current renderer viewport. No-op for invalid
    /// images or when the viewport covers no pixels.
    pub fn push_to_viewport<T: RenderTarget + ?Sized>(
        &self,
        target: &mut T,
    ) -> SortlastResult<()> {
        if !self.valid {
            return Ok(());
        }
        let region = tiled_size_and_origin(target);
        if region.is_empty() {
            return Ok(());
        }
        let placed = self.resized(Extent::new(region.width, region.height));
        target.draw_pixels(region.rect(), &placed.to_rgba8())
    }

    /// Write the image as a PNG file.
    pub fn save_png(&self, path: impl AsRef<Path>) -> SortlastResult<()> {
        let path = path.as_ref();
        if !self.valid {
            return Err(SortlastError::render(format!(
                "refusing to write invalid image to '{}'",
                path.display()
            )));
        }
        let (data, color) = match self.format {
            PixelFormat::Rgba8 => (&self.pixels, ::image::ColorType::Rgba8),
            PixelFormat::Rgb8 => (&self.pixels, ::image::ColorType::Rgb8),
        };
        ::image::save_buffer_with_format(
            path,
            data,
            self.width,
            self.height,
            color,
            ::image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }

    /// Serialize for transfer to another process.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::with_capacity(self.pixels.len() + 32);
        w.magic(RAW_IMAGE_MAGIC);
        w.u8(u8::from(self.valid));
        if self.valid {
            w.u8(match self.format {
                PixelFormat::Rgba8 => 0,
                PixelFormat::Rgb8 => 1,
            });
            w.u32(self.width);
            w.u32(self.height);
            w.bytes(&self.pixels);
        }
        w.finish()
    }

    /// Inverse of [`RawImage::encode`].
    pub fn decode(bytes: &[u8]) -> SortlastResult<Self> {
        let mut r = WireReader::new(bytes);
        r.expect_magic(RAW_IMAGE_MAGIC)?;
        let valid = r.u8()? != 0;
        if !valid {
            r.finish()?;
            return Ok(Self::invalid());
        }
        let format = match r.u8()? {
            0 => PixelFormat::Rgba8,
            1 => PixelFormat::Rgb8,
            other => {
                return Err(SortlastError::transfer(format!(
                    "unknown pixel format tag {other}"
                )));
            }
        };
        let width = r.u32()?;
        let height = r.u32()?;
        let pixels = r.bytes()?;
        r.finish()?;
        Self::from_pixels(Extent::new(width, height), format, pixels)
            .map_err(|e| SortlastError::transfer(e.to_string()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/image/raw.rs"]
mod tests;
