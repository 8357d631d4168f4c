// SPDX-License-Identifier: MPL-2.0

//! Meshes and models.
//!
//! Loading happens in two phases. [`import`] walks the file's objects and materials into plain
//! [`ModelData`], generic over the texture handle type; [`Model`] then uploads that data into
//! GPU buffers owned by the model.

pub mod cache;
pub mod import;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use thiserror::Error;

pub use cache::{TextureCache, TextureLoader};
pub use import::import;

use crate::{
    renderer::{create_buffer, Pass},
    shader::{Material, ObjectUniforms, ShaderProgram},
    texture::{GpuTexture, TextureError, TextureImage, WrapMode},
};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to import {}: {source}", path.display())]
    Import {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },
    #[error("failed to load texture {}: {source}", path.display())]
    Texture {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// A vertex within a [mesh](MeshData).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vertex {
    /// The location of this vertex in mesh space.
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

unsafe impl bytemuck::Pod for Vertex {}
unsafe impl bytemuck::Zeroable for Vertex {}

impl Vertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
        3 => Float32x3,
        4 => Float32x3
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// The role of a texture within a material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Normal,
    Height,
}

impl TextureKind {
    /// Every kind, in material binding order.
    pub const ALL: [Self; 4] = [Self::Diffuse, Self::Specular, Self::Normal, Self::Height];

    /// The material bind group slot holding this kind's texture. Its sampler sits in the slot
    /// right after.
    pub const fn texture_binding(self) -> u32 {
        self as u32 * 2
    }

    pub const fn sampler_binding(self) -> u32 {
        self.texture_binding() + 1
    }

    /// The colour a mesh without this kind of texture is drawn with. Each is neutral for its
    /// role: white albedo and specular, an unperturbed tangent-space normal, and zero height.
    pub const fn fallback_rgba(self) -> [u8; 4] {
        match self {
            Self::Diffuse | Self::Specular => [255, 255, 255, 255],
            Self::Normal => [128, 128, 255, 255],
            Self::Height => [0, 0, 0, 255],
        }
    }

    /// The sampler-name prefix shaders use for this kind of texture.
    pub const fn sampler_prefix(self) -> &'static str {
        match self {
            Self::Diffuse => "texture_diffuse",
            Self::Specular => "texture_specular",
            Self::Normal => "texture_normal",
            Self::Height => "texture_height",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeshTexture<T> {
    pub kind: TextureKind,
    /// The path as written in the material file, relative to the model's directory.
    pub path: String,
    pub handle: T,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeshData<T> {
    pub vertices: Vec<Vertex>,
    /// Triads of indices into [`Self::vertices`].
    pub indices: Vec<u32>,
    pub textures: Vec<MeshTexture<T>>,
}

// Derived `Default` would require `T: Default`.
impl<T> Default for MeshData<T> {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            textures: Vec::new(),
        }
    }
}

impl<T> MeshData<T> {
    /// Names each texture after its kind and its ordinal among textures of that kind, starting at
    /// 1: `texture_diffuse1`, `texture_diffuse2`, `texture_specular1`, and so on.
    pub fn sampler_names(&self) -> Vec<String> {
        let mut counts = [0u32; 4];
        self.textures
            .iter()
            .map(|texture| {
                let count = &mut counts[texture.kind as usize];
                *count += 1;
                format!("{}{}", texture.kind.sampler_prefix(), count)
            })
            .collect()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// The first texture of the given kind, if any.
    pub fn texture(&self, kind: TextureKind) -> Option<&MeshTexture<T>> {
        self.textures.iter().find(|texture| texture.kind == kind)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelData<T> {
    pub meshes: Vec<MeshData<T>>,
    /// The directory the model was loaded from; material paths are relative to it.
    pub directory: PathBuf,
    pub gamma_correction: bool,
}

/// Loads model textures straight onto the GPU.
pub struct GpuTextureLoader<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    gamma: bool,
}

impl<'a> GpuTextureLoader<'a> {
    pub fn new(device: &'a wgpu::Device, queue: &'a wgpu::Queue, gamma: bool) -> Self {
        Self {
            device,
            queue,
            gamma,
        }
    }
}

impl TextureLoader for GpuTextureLoader<'_> {
    type Handle = Arc<GpuTexture>;
    type Error = TextureError;

    fn load(&mut self, path: &Path, kind: TextureKind) -> Result<Self::Handle, Self::Error> {
        let image = TextureImage::decode(path)?;
        tracing::debug!("Loaded {:?} texture {}", kind, path.display());

        // Only colour data is gamma-encoded; normal, specular and height maps are linear.
        let gamma = self.gamma && kind == TextureKind::Diffuse;
        let label = path.to_string_lossy();

        Ok(Arc::new(GpuTexture::from_image(
            self.device,
            self.queue,
            &image,
            gamma,
            WrapMode::Repeat,
            Some(&label),
        )))
    }
}

/// 1x1 stand-ins for the texture kinds a mesh lacks.
#[derive(Debug)]
pub struct FallbackTextures([GpuTexture; 4]);

impl FallbackTextures {
    /// With `gamma`, the diffuse fallback is stored as sRGB like every other diffuse texture.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, gamma: bool) -> Self {
        Self(TextureKind::ALL.map(|kind| {
            GpuTexture::from_image(
                device,
                queue,
                &TextureImage::solid(kind.fallback_rgba()),
                gamma && kind == TextureKind::Diffuse,
                WrapMode::Repeat,
                Some(kind.sampler_prefix()),
            )
        }))
    }

    pub fn get(&self, kind: TextureKind) -> &GpuTexture {
        &self.0[kind as usize]
    }
}

/// A mesh whose vertices and indices live in GPU buffers.
#[derive(Debug)]
pub struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    material: Material,
}

impl GpuMesh {
    pub fn new(
        device: &wgpu::Device,
        program: &ShaderProgram,
        mesh: &MeshData<Arc<GpuTexture>>,
        fallbacks: &FallbackTextures,
    ) -> Self {
        let material = program.create_material(device, |kind| {
            mesh.texture(kind)
                .map_or(fallbacks.get(kind), |texture| &*texture.handle)
        });

        Self {
            vertex_buffer: create_buffer(
                device,
                &mesh.vertices,
                wgpu::BufferUsages::VERTEX,
                Some("Mesh vertices"),
            ),
            index_buffer: create_buffer(
                device,
                &mesh.indices,
                wgpu::BufferUsages::INDEX,
                Some("Mesh indices"),
            ),
            index_count: mesh.indices.len() as u32,
            material,
        }
    }

    pub fn vertex_buffer(&self) -> &wgpu::Buffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &wgpu::Buffer {
        &self.index_buffer
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn material(&self) -> &Material {
        &self.material
    }
}

/// A model with its meshes resident on the GPU.
#[derive(Debug)]
pub struct Model {
    data: ModelData<Arc<GpuTexture>>,
    meshes: Vec<GpuMesh>,
}

impl Model {
    /// Imports the model at `path` and uploads it.
    pub fn load(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        program: &ShaderProgram,
        path: &Path,
        gamma_correction: bool,
    ) -> Result<Self, ModelError> {
        let mut cache = TextureCache::new(GpuTextureLoader::new(device, queue, gamma_correction));
        let data = import(path, gamma_correction, &mut cache)?;
        tracing::info!(
            "Loaded {} with {} mesh(es) and {} distinct texture(s)",
            path.display(),
            data.meshes.len(),
            cache.len(),
        );

        Ok(Self::from_data(device, queue, program, data))
    }

    /// Uploads model data that was built or imported elsewhere.
    ///
    /// Each mesh binds the first texture of every [kind](TextureKind); missing kinds are bound
    /// to their [fallback](TextureKind::fallback_rgba).
    pub fn from_data(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        program: &ShaderProgram,
        data: ModelData<Arc<GpuTexture>>,
    ) -> Self {
        let fallbacks = FallbackTextures::new(device, queue, data.gamma_correction);
        let meshes = data
            .meshes
            .iter()
            .map(|mesh| GpuMesh::new(device, program, mesh, &fallbacks))
            .collect();

        Self { data, meshes }
    }

    pub fn data(&self) -> &ModelData<Arc<GpuTexture>> {
        &self.data
    }

    pub fn meshes(&self) -> &[GpuMesh] {
        &self.meshes
    }

    /// Draws every mesh of this model with the given per-object uniforms.
    pub fn draw<'a>(&'a self, pass: &mut Pass<'a>, object: &'a ObjectUniforms) {
        for mesh in &self.meshes {
            pass.draw_mesh(mesh, object);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texture(kind: TextureKind) -> MeshTexture<()> {
        MeshTexture {
            kind,
            path: String::new(),
            handle: (),
        }
    }

    #[test]
    fn sampler_names_are_numbered_per_kind() {
        let mesh = MeshData {
            vertices: Vec::new(),
            indices: Vec::new(),
            textures: vec![
                texture(TextureKind::Diffuse),
                texture(TextureKind::Specular),
                texture(TextureKind::Diffuse),
                texture(TextureKind::Normal),
                texture(TextureKind::Height),
            ],
        };

        assert_eq!(
            mesh.sampler_names(),
            vec![
                "texture_diffuse1",
                "texture_specular1",
                "texture_diffuse2",
                "texture_normal1",
                "texture_height1",
            ]
        );
    }

    #[test]
    fn each_kind_has_its_own_binding_pair() {
        let bindings: Vec<(u32, u32)> = TextureKind::ALL
            .iter()
            .map(|kind| (kind.texture_binding(), kind.sampler_binding()))
            .collect();

        assert_eq!(bindings, vec![(0, 1), (2, 3), (4, 5), (6, 7)]);
        for (i, kind) in TextureKind::ALL.into_iter().enumerate() {
            assert_eq!(kind as usize, i);
        }
    }

    #[test]
    fn fallbacks_are_neutral() {
        assert_eq!(TextureKind::Diffuse.fallback_rgba(), [255; 4]);
        assert_eq!(TextureKind::Specular.fallback_rgba(), [255; 4]);
        assert_eq!(TextureKind::Normal.fallback_rgba(), [128, 128, 255, 255]);
        assert_eq!(TextureKind::Height.fallback_rgba(), [0, 0, 0, 255]);
    }

    #[test]
    fn vertex_layout_matches_struct() {
        let layout = Vertex::layout();

        assert_eq!(layout.array_stride, 56);
        assert_eq!(layout.attributes[2].offset, 24);
        assert_eq!(layout.attributes[4].offset, 44);
    }
}
