// SPDX-License-Identifier: MPL-2.0

use crate::{model::GpuMesh, shader::{ObjectUniforms, ShaderProgram}};

/// The work of rendering a single surface frame.
pub struct Job<'a> {
    frame: wgpu::SurfaceTexture,
    frame_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
    queue: &'a wgpu::Queue,
    clear_color: wgpu::Color,
}

impl<'a> Job<'a> {
    pub(super) fn new(
        frame: wgpu::SurfaceTexture,
        depth: &wgpu::Texture,
        device: &wgpu::Device,
        queue: &'a wgpu::Queue,
        clear_color: [f32; 3],
    ) -> Self {
        let [r, g, b] = clear_color.map(f64::from);

        Job {
            frame_view: Self::create_frame_view(&frame.texture),
            frame,
            depth_view: Self::create_depth_view(depth),
            encoder: Self::create_command_encoder(device),
            queue,
            clear_color: wgpu::Color { r, g, b, a: 1.0 },
        }
    }

    /// Creates a texture view for the current surface frame.
    fn create_frame_view(frame: &wgpu::Texture) -> wgpu::TextureView {
        Self::create_texture_view(frame, "Genix frame view", wgpu::TextureAspect::All)
    }

    fn create_depth_view(depth: &wgpu::Texture) -> wgpu::TextureView {
        Self::create_texture_view(depth, "Genix depth view", wgpu::TextureAspect::DepthOnly)
    }

    fn create_texture_view(
        texture: &wgpu::Texture,
        label: &str,
        aspect: wgpu::TextureAspect,
    ) -> wgpu::TextureView {
        texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            aspect,
            ..Default::default()
        })
    }

    fn create_command_encoder(device: &wgpu::Device) -> wgpu::CommandEncoder {
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Genix command encoder"),
        })
    }
}

impl Job<'_> {
    /// Opens a render pass that clears the frame to the clear color and the depth buffer to the
    /// far plane.
    pub fn pass(&mut self) -> Pass<'_> {
        Pass(self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Genix surface frame render pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.frame_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: true,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    // In clip space, 1.0 is the maximum depth.
                    load: wgpu::LoadOp::Clear(1.0),
                    store: true,
                }),
                stencil_ops: None,
            }),
        }))
    }

    /// Submits all recorded passes and presents the frame.
    pub fn submit(self) {
        self.queue.submit(Some(self.encoder.finish()));
        self.frame.present();
    }
}

pub struct Pass<'a>(wgpu::RenderPass<'a>);

impl<'a> Pass<'a> {
    /// Binds `program` and its per-frame uniforms for the draws that follow.
    pub fn set_program(&mut self, program: &'a ShaderProgram) {
        self.0.set_pipeline(program.pipeline());
        self.0.set_bind_group(0, program.frame_bind_group(), &[]);
    }

    pub fn draw_mesh(&mut self, mesh: &'a GpuMesh, object: &'a ObjectUniforms) {
        tracing::trace!("Rendering {} triangles...", mesh.index_count() / 3);

        self.0.set_bind_group(1, object.bind_group(), &[]);
        self.0.set_bind_group(2, mesh.material().bind_group(), &[]);
        self.0.set_vertex_buffer(0, mesh.vertex_buffer().slice(..));
        self.0
            .set_index_buffer(mesh.index_buffer().slice(..), wgpu::IndexFormat::Uint32);
        self.0.draw_indexed(0..mesh.index_count(), 0, 0..1);
    }
}
