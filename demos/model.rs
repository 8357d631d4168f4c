// SPDX-License-Identifier: MPL-2.0

//! Displays a single model.
//!
//! Usage: `model <model.obj | viewer.toml>`

mod common;

use std::path::{Path, PathBuf};

use common::{DemoResult, Scene, Viewer};
use fps_counter::FPSCounter;
use genix_engine::{
    renderer::Pass, shader::ObjectUniforms, Model, Transform, ViewerConfig,
};

fn main() {
    common::init_tracing();
    if let Err(e) = run() {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> DemoResult<()> {
    let config = load_config()?;
    let path = config
        .model
        .clone()
        .ok_or("no model given on the command line or in the config")?;

    let viewer = Viewer::new(&config)?;
    let model = Model::load(
        viewer.renderer.device(),
        viewer.renderer.queue(),
        &viewer.program,
        &path,
        config.gamma_correction,
    )?;
    let object = viewer.program.create_object(viewer.renderer.device());

    viewer.run(ModelScene {
        model,
        transform: Transform::default(),
        object,
        fps: FPSCounter::new(),
        last_report: 0,
    })
}

fn load_config() -> DemoResult<ViewerConfig> {
    let arg = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .ok_or("usage: model <model.obj | viewer.toml>")?;

    if arg.extension().map_or(false, |ext| ext == "toml") {
        return Ok(ViewerConfig::load(&arg)?);
    }

    let mut config = ViewerConfig::default();
    config.window.title = title_for(&arg);
    config.model = Some(arg);

    Ok(config)
}

fn title_for(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "Model".into(), |stem| stem.to_string_lossy().into_owned())
}

struct ModelScene {
    model: Model,
    transform: Transform,
    object: ObjectUniforms,
    fps: FPSCounter,
    last_report: u64,
}

impl Scene for ModelScene {
    fn update(&mut self, queue: &wgpu::Queue, time: f32) -> DemoResult<()> {
        let fps = self.fps.tick();
        let second = time as u64;
        if second > self.last_report {
            self.last_report = second;
            tracing::info!("{} FPS", fps);
        }

        let uniforms = self.object.uniforms_mut();
        uniforms.set_mat4("model", self.transform.model_matrix())?;
        uniforms.set_mat3("normal", self.transform.normal_matrix())?;
        self.object.flush(queue);

        Ok(())
    }

    fn draw<'a>(&'a self, pass: &mut Pass<'a>) {
        self.model.draw(pass, &self.object);
    }
}
