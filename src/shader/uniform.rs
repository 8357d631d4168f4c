// SPDX-License-Identifier: MPL-2.0

//! Named uniforms backed by a CPU staging block.
//!
//! A [`UniformLayout`] resolves every uniform name to a byte offset exactly once, when the program
//! is built. A [`UniformBlock`] then writes values into a staging buffer laid out the way WGSL
//! lays out a `var<uniform>` struct, ready to be copied to the GPU as-is.

use std::{collections::HashMap, fmt, sync::Arc};

use glam::{Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UniformError {
    #[error("no uniform named `{0}`")]
    Unknown(String),
    #[error("uniform `{0}` is declared more than once")]
    Duplicate(String),
    #[error("uniform is of type {expected}, but a {found} was given")]
    TypeMismatch {
        expected: UniformType,
        found: UniformType,
    },
    #[error("uniform at offset {offset} with size {size} lies outside a block of {len} bytes")]
    OutOfBounds { offset: usize, size: usize, len: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UniformType {
    /// Stored as a `u32` since WGSL forbids `bool` in host-shareable memory.
    Bool,
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl UniformType {
    /// The size of this type in the uniform address space, in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::Bool | Self::Int | Self::Float => 4,
            Self::Vec2 => 8,
            Self::Vec3 => 12,
            Self::Vec4 => 16,
            Self::Mat2 => 16,
            // Three columns, each padded to a `vec4`.
            Self::Mat3 => 48,
            Self::Mat4 => 64,
        }
    }

    /// The required alignment of this type in the uniform address space, in bytes.
    pub const fn align(self) -> usize {
        match self {
            Self::Bool | Self::Int | Self::Float => 4,
            Self::Vec2 | Self::Mat2 => 8,
            Self::Vec3 | Self::Vec4 | Self::Mat3 | Self::Mat4 => 16,
        }
    }
}

impl fmt::Display for UniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bool => "bool",
            Self::Int => "i32",
            Self::Float => "f32",
            Self::Vec2 => "vec2<f32>",
            Self::Vec3 => "vec3<f32>",
            Self::Vec4 => "vec4<f32>",
            Self::Mat2 => "mat2x2<f32>",
            Self::Mat3 => "mat3x3<f32>",
            Self::Mat4 => "mat4x4<f32>",
        })
    }
}

/// A typed value destined for a uniform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat2(Mat2),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn ty(&self) -> UniformType {
        match self {
            Self::Bool(_) => UniformType::Bool,
            Self::Int(_) => UniformType::Int,
            Self::Float(_) => UniformType::Float,
            Self::Vec2(_) => UniformType::Vec2,
            Self::Vec3(_) => UniformType::Vec3,
            Self::Vec4(_) => UniformType::Vec4,
            Self::Mat2(_) => UniformType::Mat2,
            Self::Mat3(_) => UniformType::Mat3,
            Self::Mat4(_) => UniformType::Mat4,
        }
    }

    /// Writes this value into `out`, which must be exactly `self.ty().size()` bytes long.
    fn write_to(&self, out: &mut [u8]) {
        match self {
            Self::Bool(v) => out.copy_from_slice(bytemuck::bytes_of(&u32::from(*v))),
            Self::Int(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            Self::Float(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            Self::Vec2(v) => out.copy_from_slice(bytemuck::cast_slice(&v.to_array()[..])),
            Self::Vec3(v) => out.copy_from_slice(bytemuck::cast_slice(&v.to_array()[..])),
            Self::Vec4(v) => out.copy_from_slice(bytemuck::cast_slice(&v.to_array()[..])),
            Self::Mat2(m) => out.copy_from_slice(bytemuck::cast_slice(&m.to_cols_array()[..])),
            Self::Mat3(m) => {
                for (column, chunk) in m.to_cols_array_2d().iter().zip(out.chunks_exact_mut(16)) {
                    chunk[..12].copy_from_slice(bytemuck::cast_slice(&column[..]));
                }
            }
            Self::Mat4(m) => out.copy_from_slice(bytemuck::cast_slice(&m.to_cols_array()[..])),
        }
    }
}

/// Where a uniform lives within its block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformLocation {
    pub offset: usize,
    pub ty: UniformType,
}

/// The resolved layout of a uniform block.
#[derive(Debug, PartialEq, Eq)]
pub struct UniformLayout {
    locations: HashMap<String, UniformLocation>,
    size: usize,
}

impl UniformLayout {
    /// Lays out `fields` in declaration order, exactly as WGSL would lay out a struct with the
    /// same members.
    pub fn new(fields: &[(&str, UniformType)]) -> Result<Self, UniformError> {
        let mut locations = HashMap::with_capacity(fields.len());
        let mut cursor = 0;
        for &(name, ty) in fields {
            let offset = round_up(cursor, ty.align());
            if locations
                .insert(name.to_owned(), UniformLocation { offset, ty })
                .is_some()
            {
                return Err(UniformError::Duplicate(name.to_owned()));
            }
            cursor = offset + ty.size();
        }

        Ok(Self {
            locations,
            // Uniform buffer bindings must be a multiple of 16 bytes.
            size: round_up(cursor, 16).max(16),
        })
    }

    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        self.locations.get(name).copied()
    }

    /// The size of the block in bytes, including trailing padding.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

fn round_up(value: usize, align: usize) -> usize {
    (value + align - 1) / align * align
}

/// A CPU-side copy of a uniform block's contents.
#[derive(Clone, Debug)]
pub struct UniformBlock {
    layout: Arc<UniformLayout>,
    data: Vec<u8>,
    dirty: bool,
}

impl UniformBlock {
    /// Creates a zero-initialized block.
    pub fn new(layout: Arc<UniformLayout>) -> Self {
        Self {
            data: vec![0; layout.size()],
            layout,
            dirty: true,
        }
    }

    pub fn layout(&self) -> &Arc<UniformLayout> {
        &self.layout
    }

    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        self.layout.location(name)
    }

    /// The raw contents of this block.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns the contents if they changed since the last call, and marks them clean.
    pub fn take_dirty(&mut self) -> Option<&[u8]> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;

        Some(&self.data)
    }

    /// Writes `value` at a previously resolved location.
    pub fn set_at(&mut self, location: UniformLocation, value: UniformValue) -> Result<(), UniformError> {
        if location.ty != value.ty() {
            return Err(UniformError::TypeMismatch {
                expected: location.ty,
                found: value.ty(),
            });
        }

        let size = location.ty.size();
        let range = location.offset..location.offset + size;
        let len = self.data.len();
        let target = self
            .data
            .get_mut(range)
            .ok_or(UniformError::OutOfBounds {
                offset: location.offset,
                size,
                len,
            })?;
        value.write_to(target);
        self.dirty = true;

        Ok(())
    }

    pub fn set(&mut self, name: &str, value: UniformValue) -> Result<(), UniformError> {
        let location = self
            .location(name)
            .ok_or_else(|| UniformError::Unknown(name.to_owned()))?;

        self.set_at(location, value)
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> Result<(), UniformError> {
        self.set(name, UniformValue::Bool(value))
    }

    pub fn set_int(&mut self, name: &str, value: i32) -> Result<(), UniformError> {
        self.set(name, UniformValue::Int(value))
    }

    pub fn set_float(&mut self, name: &str, value: f32) -> Result<(), UniformError> {
        self.set(name, UniformValue::Float(value))
    }

    pub fn set_vec2(&mut self, name: &str, value: Vec2) -> Result<(), UniformError> {
        self.set(name, UniformValue::Vec2(value))
    }

    pub fn set_vec3(&mut self, name: &str, value: Vec3) -> Result<(), UniformError> {
        self.set(name, UniformValue::Vec3(value))
    }

    pub fn set_vec4(&mut self, name: &str, value: Vec4) -> Result<(), UniformError> {
        self.set(name, UniformValue::Vec4(value))
    }

    pub fn set_mat2(&mut self, name: &str, value: Mat2) -> Result<(), UniformError> {
        self.set(name, UniformValue::Mat2(value))
    }

    pub fn set_mat3(&mut self, name: &str, value: Mat3) -> Result<(), UniformError> {
        self.set(name, UniformValue::Mat3(value))
    }

    pub fn set_mat4(&mut self, name: &str, value: Mat4) -> Result<(), UniformError> {
        self.set(name, UniformValue::Mat4(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_at(block: &UniformBlock, offset: usize) -> f32 {
        bytemuck::pod_read_unaligned(&block.as_bytes()[offset..offset + 4])
    }

    #[test]
    fn layout_follows_wgsl_alignment() {
        let layout = UniformLayout::new(&[
            ("time", UniformType::Float),
            ("light_pos", UniformType::Vec3),
            ("shininess", UniformType::Float),
            ("uv_scale", UniformType::Vec2),
            ("normal_matrix", UniformType::Mat3),
            ("enabled", UniformType::Bool),
        ])
        .unwrap();

        let offset = |name| layout.location(name).unwrap().offset;
        assert_eq!(offset("time"), 0);
        assert_eq!(offset("light_pos"), 16);
        // Scalars may fill the tail of a `vec3`.
        assert_eq!(offset("shininess"), 28);
        assert_eq!(offset("uv_scale"), 32);
        assert_eq!(offset("normal_matrix"), 48);
        assert_eq!(offset("enabled"), 96);
        assert_eq!(layout.size(), 112);
    }

    #[test]
    fn empty_layout_has_minimum_size() {
        let layout = UniformLayout::new(&[]).unwrap();

        assert!(layout.is_empty());
        assert_eq!(layout.size(), 16);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = UniformLayout::new(&[
            ("model", UniformType::Mat4),
            ("model", UniformType::Mat4),
        ]);

        assert_eq!(result, Err(UniformError::Duplicate("model".into())));
    }

    #[test]
    fn setters_write_at_resolved_offsets() {
        let layout = UniformLayout::new(&[
            ("flag", UniformType::Bool),
            ("color", UniformType::Vec3),
            ("alpha", UniformType::Float),
        ])
        .unwrap();
        let mut block = UniformBlock::new(Arc::new(layout));

        block.set_bool("flag", true).unwrap();
        block.set_vec3("color", Vec3::new(0.25, 0.5, 0.75)).unwrap();
        block.set_float("alpha", 0.5).unwrap();

        let flag: u32 = bytemuck::pod_read_unaligned(&block.as_bytes()[0..4]);
        assert_eq!(flag, 1);
        assert_eq!(f32_at(&block, 16), 0.25);
        assert_eq!(f32_at(&block, 24), 0.75);
        assert_eq!(f32_at(&block, 28), 0.5);
    }

    #[test]
    fn mat3_columns_are_padded() {
        let layout = UniformLayout::new(&[("m", UniformType::Mat3)]).unwrap();
        let mut block = UniformBlock::new(Arc::new(layout));
        block
            .set_mat3(
                "m",
                Mat3::from_cols(
                    Vec3::new(1.0, 2.0, 3.0),
                    Vec3::new(4.0, 5.0, 6.0),
                    Vec3::new(7.0, 8.0, 9.0),
                ),
            )
            .unwrap();

        assert_eq!(f32_at(&block, 16), 4.0);
        assert_eq!(f32_at(&block, 12), 0.0);
        assert_eq!(f32_at(&block, 40), 9.0);
    }

    #[test]
    fn unknown_and_mismatched_uniforms_are_errors() {
        let layout = UniformLayout::new(&[("model", UniformType::Mat4)]).unwrap();
        let mut block = UniformBlock::new(Arc::new(layout));

        assert_eq!(
            block.set_float("view", 1.0),
            Err(UniformError::Unknown("view".into()))
        );
        assert_eq!(
            block.set_float("model", 1.0),
            Err(UniformError::TypeMismatch {
                expected: UniformType::Mat4,
                found: UniformType::Float,
            })
        );
    }

    #[test]
    fn foreign_locations_outside_the_block_are_errors() {
        let wide = UniformLayout::new(&[("a", UniformType::Mat4), ("b", UniformType::Mat4)]).unwrap();
        let narrow = UniformLayout::new(&[("a", UniformType::Mat4)]).unwrap();
        let mut block = UniformBlock::new(Arc::new(narrow));
        block.take_dirty();

        let location = wide.location("b").unwrap();
        assert_eq!(
            block.set_at(location, UniformValue::Mat4(Mat4::IDENTITY)),
            Err(UniformError::OutOfBounds {
                offset: 64,
                size: 64,
                len: 64,
            })
        );
        assert!(!block.is_dirty());
    }

    #[test]
    fn dirty_flag_tracks_writes() {
        let layout = UniformLayout::new(&[("count", UniformType::Int)]).unwrap();
        let mut block = UniformBlock::new(Arc::new(layout));

        assert!(block.take_dirty().is_some());
        assert!(block.take_dirty().is_none());

        let location = block.location("count").unwrap();
        block.set_at(location, UniformValue::Int(-7)).unwrap();
        let bytes = block.take_dirty().unwrap();
        assert_eq!(bytemuck::pod_read_unaligned::<i32>(&bytes[0..4]), -7);
    }
}
