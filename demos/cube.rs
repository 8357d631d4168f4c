// SPDX-License-Identifier: MPL-2.0

mod common;

use std::{path::PathBuf, sync::Arc};

use common::{DemoResult, Scene, Viewer};
use genix_engine::{
    model::{MeshData, MeshTexture, ModelData, TextureKind},
    renderer::Pass,
    shader::ObjectUniforms,
    texture::{TextureImage, WrapMode},
    GpuTexture, Model, Renderer, ShaderProgram, Transform, Vertex, ViewerConfig,
};
use glam::Vec3;

const CHECKER_SIZE: u32 = 64;
const CHECKER_CELL: u32 = 8;

fn main() {
    common::init_tracing();
    if let Err(e) = run() {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> DemoResult<()> {
    let mut config = ViewerConfig::default();
    config.window.title = "Cube".into();
    config.window.width = 1280;
    config.window.height = 720;
    config.camera.position = [0.0, 1.0, 4.0];

    let viewer = Viewer::new(&config)?;
    let scene = Cubes::new(&viewer.renderer, &viewer.program)?;

    viewer.run(scene)
}

struct Object {
    transform: Transform,
    uniforms: ObjectUniforms,
}

impl Object {
    fn new(renderer: &Renderer, program: &ShaderProgram, transform: Transform) -> Self {
        Self {
            transform,
            uniforms: program.create_object(renderer.device()),
        }
    }

    fn flush(&mut self, queue: &wgpu::Queue) -> DemoResult<()> {
        let uniforms = self.uniforms.uniforms_mut();
        uniforms.set_mat4("model", self.transform.model_matrix())?;
        uniforms.set_mat3("normal", self.transform.normal_matrix())?;
        self.uniforms.flush(queue);

        Ok(())
    }
}

struct Cubes {
    cube: Model,
    floor: Model,
    cubes: [Object; 2],
    floor_object: Object,
}

impl Cubes {
    fn new(renderer: &Renderer, program: &ShaderProgram) -> DemoResult<Self> {
        let (device, queue) = (renderer.device(), renderer.queue());
        let checker = Arc::new(GpuTexture::from_image(
            device,
            queue,
            &checker_image(),
            true,
            WrapMode::Repeat,
            Some("Checker"),
        ));

        let cube = Model::from_data(device, queue, program, model_data(cube_mesh(), &checker));
        let floor = Model::from_data(device, queue, program, model_data(floor_mesh(), &checker));

        let mut floor_transform = Transform::from_position(Vec3::new(0.0, -0.5, 0.0));
        *floor_transform.scale_mut() = Vec3::new(10.0, 1.0, 10.0);

        Ok(Self {
            cube,
            floor,
            cubes: [
                Object::new(renderer, program, Transform::from_position(Vec3::new(-1.0, 0.0, -1.0))),
                Object::new(renderer, program, Transform::from_position(Vec3::new(2.0, 0.0, 0.0))),
            ],
            floor_object: Object::new(renderer, program, floor_transform),
        })
    }
}

impl Scene for Cubes {
    fn update(&mut self, queue: &wgpu::Queue, time: f32) -> DemoResult<()> {
        for (i, cube) in self.cubes.iter_mut().enumerate() {
            let rotation = cube.transform.rotation_mut();
            rotation.y = time * (0.5 + i as f32 * 0.25);
            rotation.x = time * 0.2;
            cube.flush(queue)?;
        }

        self.floor_object.flush(queue)
    }

    fn draw<'a>(&'a self, pass: &mut Pass<'a>) {
        for cube in &self.cubes {
            self.cube.draw(pass, &cube.uniforms);
        }
        self.floor.draw(pass, &self.floor_object.uniforms);
    }
}

fn checker_image() -> TextureImage {
    let mut pixels = Vec::with_capacity((CHECKER_SIZE * CHECKER_SIZE * 4) as usize);
    for y in 0..CHECKER_SIZE {
        for x in 0..CHECKER_SIZE {
            let light = (x / CHECKER_CELL + y / CHECKER_CELL) % 2 == 0;
            let value = if light { 220 } else { 60 };
            pixels.extend_from_slice(&[value, value, value, 255]);
        }
    }

    TextureImage::from_rgba8(CHECKER_SIZE, CHECKER_SIZE, pixels)
}

fn model_data(mut mesh: MeshData<Arc<GpuTexture>>, diffuse: &Arc<GpuTexture>) -> ModelData<Arc<GpuTexture>> {
    mesh.textures.push(MeshTexture {
        kind: TextureKind::Diffuse,
        path: "checker".into(),
        handle: Arc::clone(diffuse),
    });

    ModelData {
        meshes: vec![mesh],
        directory: PathBuf::new(),
        gamma_correction: true,
    }
}

/// A unit cube centered on the origin with one quad per face.
fn cube_mesh() -> MeshData<Arc<GpuTexture>> {
    let mut mesh = MeshData::default();
    for normal in [Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y, Vec3::Z, -Vec3::Z] {
        let up = if normal.y == 0.0 { Vec3::Y } else { Vec3::Z };
        push_quad(&mut mesh, normal * 0.5, up.cross(normal) * 0.5, up * 0.5, normal, 1.0);
    }

    mesh
}

/// A unit square in the XZ plane, facing up, with its texture repeated ten times along each
/// axis.
fn floor_mesh() -> MeshData<Arc<GpuTexture>> {
    let mut mesh = MeshData::default();
    push_quad(&mut mesh, Vec3::ZERO, Vec3::X * 0.5, -Vec3::Z * 0.5, Vec3::Y, 10.0);

    mesh
}

fn push_quad(
    mesh: &mut MeshData<Arc<GpuTexture>>,
    center: Vec3,
    right: Vec3,
    up: Vec3,
    normal: Vec3,
    uv_scale: f32,
) {
    let base = mesh.vertices.len() as u32;
    for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
        let position = center + right * (u * 2.0 - 1.0) + up * (v * 2.0 - 1.0);
        mesh.vertices.push(Vertex {
            position: position.to_array(),
            normal: normal.to_array(),
            tex_coords: [u * uv_scale, (1.0 - v) * uv_scale],
            tangent: right.normalize().to_array(),
            bitangent: up.normalize().to_array(),
        });
    }
    mesh.indices
        .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
}
