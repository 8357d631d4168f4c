// SPDX-License-Identifier: MPL-2.0

//! The GPU context.

mod render;

pub use render::{Job, Pass};

use raw_window_handle::HasRawWindowHandle;
use thiserror::Error;
use wgpu::util::DeviceExt as _;

/// The format of the depth buffer every program renders with.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Surface formats we can render to, best first.
const SURFACE_FORMATS: [wgpu::TextureFormat; 2] = [
    wgpu::TextureFormat::Bgra8UnormSrgb,
    wgpu::TextureFormat::Rgba8UnormSrgb,
];

#[derive(Debug, Error)]
pub enum Error {
    #[error("no compatible graphics adapter found")]
    NoCompatibleAdapterFound,
    #[error("no compatible graphics device found")]
    NoCompatibleDeviceFound,
    #[error("unsupported surface; available formats are: {available}")]
    UnsupportedSurface { available: String },
    /// The surface was lost or outdated and has been reconfigured. The frame should be skipped.
    #[error("surface lost")]
    SurfaceLost,
    #[error(transparent)]
    Surface(#[from] wgpu::SurfaceError),
}

/// Owns the device, its queue and the window surface rendered into.
#[derive(Debug)]
pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface,
    config: wgpu::SurfaceConfiguration,
    depth: wgpu::Texture,
}

impl Renderer {
    /// Creates a new `Renderer`.
    ///
    /// # Safety
    ///
    /// `window` must live for as long as the returned renderer.
    pub async unsafe fn new(
        window: &impl HasRawWindowHandle,
        backends: wgpu::Backends,
        surface_width: u32,
        surface_height: u32,
    ) -> Result<Self, Error> {
        let (adapter, surface) = Self::create_adapter_and_surface(window, backends).await?;
        let info = adapter.get_info();
        tracing::info!("Using adapter {} ({:?})", info.name, info.backend);

        let supported = surface.get_supported_formats(&adapter);
        let format = SURFACE_FORMATS
            .into_iter()
            .find(|format| supported.contains(format))
            .ok_or_else(|| Error::UnsupportedSurface {
                available: supported
                    .iter()
                    .map(|format| format!("{:?}", format))
                    .collect::<Vec<String>>()
                    .join(", "),
            })?;

        let (device, queue) = Self::create_device_and_queue(&adapter).await?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: surface_width.max(1),
            height: surface_height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
        };
        surface.configure(&device, &config);
        let depth = create_depth_texture(&device, config.width, config.height);

        Ok(Self {
            device,
            queue,
            surface,
            config,
            depth,
        })
    }

    /// Creates handles to the graphics backend as well as the surface upon which rendering will
    /// take place.
    async fn create_adapter_and_surface(
        window: &impl HasRawWindowHandle,
        backends: wgpu::Backends,
    ) -> Result<(wgpu::Adapter, wgpu::Surface), Error> {
        let instance = wgpu::Instance::new(backends);

        // SAFETY: the caller of [`Renderer::new`] guarantees that the window outlives the
        // renderer, and with it the surface.
        let surface = unsafe { instance.create_surface(window) };

        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                compatible_surface: Some(&surface),
                ..Default::default()
            })
            .await
            .ok_or(Error::NoCompatibleAdapterFound)
            .map(|adapter| (adapter, surface))
    }

    /// Creates handles to the logical graphics device as well as the command buffer queue.
    async fn create_device_and_queue(
        adapter: &wgpu::Adapter,
    ) -> Result<(wgpu::Device, wgpu::Queue), Error> {
        adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Genix device"),
                    limits: adapter.limits(),
                    features: wgpu::Features::empty(),
                },
                None,
            )
            .await
            .map_err(|_| Error::NoCompatibleDeviceFound)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// The color format of the surface; programs rendering to it must target this format.
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// The width of the surface divided by its height.
    pub fn aspect_ratio(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }

    /// Reconfigures the surface and depth buffer. Zero sizes, as reported for minimized windows,
    /// are ignored.
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        tracing::debug!("Resizing surface to {}x{}", width, height);
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth = create_depth_texture(&self.device, width, height);
    }

    /// Acquires the next surface frame.
    pub fn begin_frame(&self, clear_color: [f32; 3]) -> Result<Job<'_>, Error> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::warn!("Surface lost; reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Err(Error::SurfaceLost);
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Job::new(
            frame,
            &self.depth,
            &self.device,
            &self.queue,
            clear_color,
        ))
    }
}

fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Genix depth texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
    })
}

/// Creates a buffer initialized with the contents of `slice`.
pub(crate) fn create_buffer<T>(
    device: &wgpu::Device,
    slice: &[T],
    usage: wgpu::BufferUsages,
    label: Option<&str>,
) -> wgpu::Buffer
where
    T: bytemuck::Pod + bytemuck::Zeroable,
{
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label,
        contents: bytemuck::cast_slice(slice),
        usage,
    })
}
