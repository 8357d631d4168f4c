// SPDX-License-Identifier: MPL-2.0

use std::{
    num::NonZeroU32,
    path::{Path, PathBuf},
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("texture failed to load at path {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// The layout of a decoded image's pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// One byte per pixel.
    R8,
    /// Four bytes per pixel.
    Rgba8,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::R8 => 1,
            Self::Rgba8 => 4,
        }
    }
}

/// How texture coordinates outside `[0, 1]` are resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
}

impl From<WrapMode> for wgpu::AddressMode {
    fn from(mode: WrapMode) -> Self {
        match mode {
            WrapMode::Repeat => Self::Repeat,
            WrapMode::ClampToEdge => Self::ClampToEdge,
        }
    }
}

/// A decoded image, ready for upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    /// The number of channels in the source image, before any expansion.
    pub channels: u8,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
}

impl TextureImage {
    pub fn decode(path: &Path) -> Result<Self, TextureError> {
        let image = image::open(path).map_err(|source| TextureError::Decode {
            path: path.to_owned(),
            source,
        })?;

        Ok(Self::from_dynamic(image))
    }

    /// Converts a decoded image into an uploadable one.
    ///
    /// Single-channel images stay single-channel. Everything else is expanded to RGBA since the GPU
    /// has no three-channel 8-bit format.
    pub fn from_dynamic(image: image::DynamicImage) -> Self {
        let channels = image.color().channel_count();
        let (width, height) = (image.width(), image.height());
        let (format, pixels) = if channels == 1 {
            (PixelFormat::R8, image.into_luma8().into_raw())
        } else {
            (PixelFormat::Rgba8, image.into_rgba8().into_raw())
        };

        Self {
            width,
            height,
            channels,
            format,
            pixels,
        }
    }

    /// Creates a 1x1 image of a single colour.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self::from_rgba8(1, 1, rgba.to_vec())
    }

    /// Wraps raw RGBA8 pixels. `pixels` must hold exactly `width * height * 4` bytes.
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height * 4) as usize);

        Self {
            width,
            height,
            channels: 4,
            format: PixelFormat::Rgba8,
            pixels,
        }
    }

    /// The wrap mode suited to this image's content.
    ///
    /// Images with an alpha channel are clamped; repeating them would bleed texels from the
    /// opposite edge into semi-transparent borders.
    pub fn default_wrap(&self) -> WrapMode {
        if self.channels == 4 {
            WrapMode::ClampToEdge
        } else {
            WrapMode::Repeat
        }
    }

    fn texture_format(&self, gamma: bool) -> wgpu::TextureFormat {
        match (self.format, gamma) {
            (PixelFormat::R8, _) => wgpu::TextureFormat::R8Unorm,
            (PixelFormat::Rgba8, false) => wgpu::TextureFormat::Rgba8Unorm,
            (PixelFormat::Rgba8, true) => wgpu::TextureFormat::Rgba8UnormSrgb,
        }
    }
}

/// A sampled 2D texture. The GPU resources are released when this is dropped.
#[derive(Debug)]
pub struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    size: (u32, u32),
}

impl GpuTexture {
    /// Uploads `image`. With `gamma`, colour data is stored as sRGB and linearized on sampling.
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &TextureImage,
        gamma: bool,
        wrap: WrapMode,
        label: Option<&str>,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: image.texture_format(gamma),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        });
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: NonZeroU32::new(image.format.bytes_per_pixel() * image.width),
                rows_per_image: NonZeroU32::new(image.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label,
            address_mode_u: wrap.into(),
            address_mode_v: wrap.into(),
            address_mode_w: wrap.into(),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            size: (image.width, image.height),
        }
    }

    /// Decodes and uploads the image at `path`, picking the wrap mode from its content.
    pub fn load(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: &Path,
        gamma: bool,
    ) -> Result<Self, TextureError> {
        let image = TextureImage::decode(path)?;
        tracing::debug!(
            "Loaded {}x{} texture with {} channel(s) from {}",
            image.width,
            image.height,
            image.channels,
            path.display(),
        );

        let label = path.to_string_lossy();
        Ok(Self::from_image(
            device,
            queue,
            &image,
            gamma,
            image.default_wrap(),
            Some(&label),
        ))
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn rgb_images_are_expanded_to_rgba() {
        let image = RgbImage::from_pixel(2, 1, Rgb([10, 20, 30]));
        let image = TextureImage::from_dynamic(image.into());

        assert_eq!(image.channels, 3);
        assert_eq!(image.format, PixelFormat::Rgba8);
        assert_eq!(image.pixels, vec![10, 20, 30, 255, 10, 20, 30, 255]);
        assert_eq!(image.default_wrap(), WrapMode::Repeat);
    }

    #[test]
    fn grayscale_images_stay_single_channel() {
        let image = GrayImage::from_pixel(3, 2, Luma([7]));
        let image = TextureImage::from_dynamic(image.into());

        assert_eq!(image.format, PixelFormat::R8);
        assert_eq!(image.pixels.len(), 6);
        assert_eq!(image.default_wrap(), WrapMode::Repeat);
    }

    #[test]
    fn alpha_images_clamp() {
        let image = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 128]));
        let image = TextureImage::from_dynamic(image.into());

        assert_eq!(image.default_wrap(), WrapMode::ClampToEdge);
    }

    #[test]
    fn gamma_selects_srgb_for_colour_only() {
        let rgba = TextureImage::solid([255; 4]);
        let gray = TextureImage::from_dynamic(GrayImage::new(1, 1).into());

        assert_eq!(rgba.texture_format(true), wgpu::TextureFormat::Rgba8UnormSrgb);
        assert_eq!(rgba.texture_format(false), wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(gray.texture_format(true), wgpu::TextureFormat::R8Unorm);
    }

    #[test]
    fn decode_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.png");

        let err = TextureImage::decode(&path).unwrap_err();
        assert!(err.to_string().contains("missing.png"));
    }

    #[test]
    fn decode_reads_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        RgbImage::from_pixel(4, 4, Rgb([255, 0, 0])).save(&path).unwrap();

        let image = TextureImage::decode(&path).unwrap();
        assert_eq!((image.width, image.height), (4, 4));
        assert_eq!(&image.pixels[..4], &[255, 0, 0, 255]);
    }
}
