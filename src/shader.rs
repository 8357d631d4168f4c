// SPDX-License-Identifier: MPL-2.0

//! Shader programs.
//!
//! A [`ShaderProgram`] pairs a vertex and a fragment stage with the uniform blocks they read.
//! Bind groups are laid out as follows:
//!
//! | Group | Contents                                             | Owner             |
//! |-------|------------------------------------------------------|-------------------|
//! | 0     | Per-frame uniform block (e.g. view and projection)   | [`ShaderProgram`] |
//! | 1     | Per-object uniform block (e.g. the model matrix)     | [`ObjectUniforms`]|
//! | 2     | One texture and sampler per texture kind             | [`Material`]      |
//!
//! Uniform names are resolved to offsets once, when the program is built.

pub mod uniform;

use std::{
    borrow::Cow,
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use thiserror::Error;

pub use uniform::{
    UniformBlock, UniformError, UniformLayout, UniformLocation, UniformType, UniformValue,
};

use crate::{
    model::{TextureKind, Vertex},
    renderer::DEPTH_FORMAT,
    texture::GpuTexture,
};

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to read shader file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("shader compilation error of type {stage}:\n{log}")]
    Compile { stage: Stage, log: String },
    #[error(transparent)]
    Uniform(#[from] UniformError),
}

/// The step of program construction at which an error occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
    /// Linking the stages into a pipeline.
    Program,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vertex => "VERTEX",
            Self::Fragment => "FRAGMENT",
            Self::Program => "PROGRAM",
        })
    }
}

/// WGSL source for both stages of a program. Each stage's entry point is `main`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderSource {
    pub label: String,
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSource {
    pub fn new(label: impl Into<String>, vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    pub fn from_files(vertex_path: &Path, fragment_path: &Path) -> Result<Self, ShaderError> {
        let read = |path: &Path| {
            fs::read_to_string(path).map_err(|source| ShaderError::Read {
                path: path.to_owned(),
                source,
            })
        };

        Ok(Self {
            label: vertex_path
                .file_stem()
                .map_or_else(String::new, |stem| stem.to_string_lossy().into_owned()),
            vertex: read(vertex_path)?,
            fragment: read(fragment_path)?,
        })
    }
}

/// Everything besides source text needed to build a [`ShaderProgram`].
#[derive(Clone, Copy, Debug)]
pub struct ProgramDescriptor<'a> {
    /// Members of the group 0 uniform struct, in declaration order.
    pub frame_uniforms: &'a [(&'a str, UniformType)],
    /// Members of the group 1 uniform struct, in declaration order.
    pub object_uniforms: &'a [(&'a str, UniformType)],
    /// The format of the color target the program renders into.
    pub color_format: wgpu::TextureFormat,
}

/// A compiled, linked program and its per-frame uniforms.
///
/// All GPU objects are released when the program is dropped.
#[derive(Debug)]
pub struct ShaderProgram {
    pipeline: wgpu::RenderPipeline,
    frame: UniformBlock,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    object_layout: Arc<UniformLayout>,
    object_bind_group_layout: wgpu::BindGroupLayout,
    material_bind_group_layout: wgpu::BindGroupLayout,
}

impl ShaderProgram {
    pub async fn new(
        device: &wgpu::Device,
        source: &ShaderSource,
        desc: ProgramDescriptor<'_>,
    ) -> Result<Self, ShaderError> {
        let frame_layout = Arc::new(UniformLayout::new(desc.frame_uniforms)?);
        let object_layout = Arc::new(UniformLayout::new(desc.object_uniforms)?);

        let vertex = compile(device, Stage::Vertex, &source.label, &source.vertex).await?;
        let fragment = compile(device, Stage::Fragment, &source.label, &source.fragment).await?;

        let frame_bind_group_layout = create_uniform_bind_group_layout(device, "Frame uniforms");
        let object_bind_group_layout = create_uniform_bind_group_layout(device, "Object uniforms");
        let material_bind_group_layout = create_material_bind_group_layout(device);

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = create_pipeline(
            device,
            &source.label,
            &[
                &frame_bind_group_layout,
                &object_bind_group_layout,
                &material_bind_group_layout,
            ],
            &vertex,
            &fragment,
            desc.color_format,
        );
        if let Some(error) = device.pop_error_scope().await {
            return Err(ShaderError::Compile {
                stage: Stage::Program,
                log: error.to_string(),
            });
        }
        tracing::debug!(
            "Linked program `{}` with {} frame and {} object uniform(s)",
            source.label,
            frame_layout.len(),
            object_layout.len(),
        );

        let frame = UniformBlock::new(frame_layout);
        let frame_buffer = create_uniform_buffer(device, &frame, "Frame uniforms");
        let frame_bind_group = create_uniform_bind_group(
            device,
            &frame_bind_group_layout,
            &frame_buffer,
            "Frame uniforms",
        );

        Ok(Self {
            pipeline,
            frame,
            frame_buffer,
            frame_bind_group,
            object_layout,
            object_bind_group_layout,
            material_bind_group_layout,
        })
    }

    /// Reads both stages from disk and builds the program.
    pub async fn from_files(
        device: &wgpu::Device,
        vertex_path: &Path,
        fragment_path: &Path,
        desc: ProgramDescriptor<'_>,
    ) -> Result<Self, ShaderError> {
        let source = ShaderSource::from_files(vertex_path, fragment_path)?;

        Self::new(device, &source, desc).await
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    pub fn frame_bind_group(&self) -> &wgpu::BindGroup {
        &self.frame_bind_group
    }

    /// The per-frame uniforms.
    pub fn frame(&self) -> &UniformBlock {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut UniformBlock {
        &mut self.frame
    }

    /// Uploads the per-frame uniforms if they changed.
    pub fn flush(&mut self, queue: &wgpu::Queue) {
        if let Some(bytes) = self.frame.take_dirty() {
            queue.write_buffer(&self.frame_buffer, 0, bytes);
        }
    }

    /// Creates a fresh, zeroed set of per-object uniforms.
    pub fn create_object(&self, device: &wgpu::Device) -> ObjectUniforms {
        let block = UniformBlock::new(Arc::clone(&self.object_layout));
        let buffer = create_uniform_buffer(device, &block, "Object uniforms");
        let bind_group = create_uniform_bind_group(
            device,
            &self.object_bind_group_layout,
            &buffer,
            "Object uniforms",
        );

        ObjectUniforms {
            block,
            buffer,
            bind_group,
        }
    }

    /// Binds one texture of every [kind](TextureKind), as chosen by `texture_for`.
    pub fn create_material<'t>(
        &self,
        device: &wgpu::Device,
        mut texture_for: impl FnMut(TextureKind) -> &'t GpuTexture,
    ) -> Material {
        let entries: Vec<wgpu::BindGroupEntry> = TextureKind::ALL
            .into_iter()
            .flat_map(|kind| {
                let texture = texture_for(kind);
                [
                    wgpu::BindGroupEntry {
                        binding: kind.texture_binding(),
                        resource: wgpu::BindingResource::TextureView(texture.view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: kind.sampler_binding(),
                        resource: wgpu::BindingResource::Sampler(texture.sampler()),
                    },
                ]
            })
            .collect();

        Material {
            bind_group: device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Material"),
                layout: &self.material_bind_group_layout,
                entries: &entries,
            }),
        }
    }
}

/// The uniforms of a single drawn object.
#[derive(Debug)]
pub struct ObjectUniforms {
    block: UniformBlock,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl ObjectUniforms {
    pub fn uniforms(&self) -> &UniformBlock {
        &self.block
    }

    pub fn uniforms_mut(&mut self) -> &mut UniformBlock {
        &mut self.block
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    /// Uploads the uniforms if they changed.
    pub fn flush(&mut self, queue: &wgpu::Queue) {
        if let Some(bytes) = self.block.take_dirty() {
            queue.write_buffer(&self.buffer, 0, bytes);
        }
    }
}

/// The textures a mesh is drawn with.
#[derive(Debug)]
pub struct Material {
    bind_group: wgpu::BindGroup,
}

impl Material {
    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

async fn compile(
    device: &wgpu::Device,
    stage: Stage,
    label: &str,
    source: &str,
) -> Result<wgpu::ShaderModule, ShaderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
    });

    match device.pop_error_scope().await {
        Some(error) => Err(ShaderError::Compile {
            stage,
            log: error.to_string(),
        }),
        None => Ok(module),
    }
}

fn create_uniform_bind_group_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

fn create_material_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Material"),
        entries: &material_layout_entries(),
    })
}

/// A texture and a sampler slot for every [`TextureKind`].
fn material_layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    TextureKind::ALL
        .into_iter()
        .flat_map(|kind| {
            [
                wgpu::BindGroupLayoutEntry {
                    binding: kind.texture_binding(),
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: kind.sampler_binding(),
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ]
        })
        .collect()
}

fn create_uniform_buffer(device: &wgpu::Device, block: &UniformBlock, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: block.layout().size() as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_uniform_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    })
}

fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
    vertex: &wgpu::ShaderModule,
    fragment: &wgpu::ShaderModule,
    color_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts,
            push_constant_ranges: &[],
        })),
        vertex: wgpu::VertexState {
            module: vertex,
            entry_point: "main",
            buffers: &[Vertex::layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module: fragment,
            entry_point: "main",
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_files_reads_both_stages() {
        let dir = tempfile::tempdir().unwrap();
        let vertex = dir.path().join("material.vert.wgsl");
        let fragment = dir.path().join("material.frag.wgsl");
        fs::write(&vertex, "// vertex").unwrap();
        fs::write(&fragment, "// fragment").unwrap();

        let source = ShaderSource::from_files(&vertex, &fragment).unwrap();
        assert_eq!(source, ShaderSource::new("material.vert", "// vertex", "// fragment"));
    }

    #[test]
    fn missing_stage_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let vertex = dir.path().join("a.wgsl");
        fs::write(&vertex, "").unwrap();

        let err = ShaderSource::from_files(&vertex, &dir.path().join("b.wgsl")).unwrap_err();
        match err {
            ShaderError::Read { path, .. } => assert!(path.ends_with("b.wgsl")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn material_layout_has_a_slot_pair_per_kind() {
        let entries = material_layout_entries();
        assert_eq!(entries.len(), 2 * TextureKind::ALL.len());

        for kind in TextureKind::ALL {
            let texture = entries
                .iter()
                .find(|entry| entry.binding == kind.texture_binding())
                .unwrap();
            assert!(matches!(texture.ty, wgpu::BindingType::Texture { .. }));

            let sampler = entries
                .iter()
                .find(|entry| entry.binding == kind.sampler_binding())
                .unwrap();
            assert!(matches!(sampler.ty, wgpu::BindingType::Sampler(_)));
        }
    }

    #[test]
    fn compile_errors_name_the_stage() {
        let err = ShaderError::Compile {
            stage: Stage::Fragment,
            log: "expected `;`".into(),
        };

        assert_eq!(
            err.to_string(),
            "shader compilation error of type FRAGMENT:\nexpected `;`"
        );
    }
}
