// SPDX-License-Identifier: MPL-2.0

//! The window, event loop and free-fly controls shared by the demos.

use std::{error::Error, time::Instant};

use genix_engine::{
    camera::CameraMovement,
    config::ViewerConfig,
    input::{self, InputState},
    renderer::Pass,
    shader::{ProgramDescriptor, ShaderError, ShaderProgram, ShaderSource, UniformType},
    Camera, Renderer,
};
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyboardInput, MouseScrollDelta, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::{Window, WindowBuilder},
};

pub type DemoResult<T> = Result<T, Box<dyn Error>>;

const NEAR: f32 = 0.1;
const FAR: f32 = 100.0;

/// Something the demo loop can animate and draw.
pub trait Scene: 'static {
    /// Updates per-object uniforms. `time` is the number of seconds since the loop started.
    fn update(&mut self, queue: &wgpu::Queue, time: f32) -> DemoResult<()>;

    fn draw<'a>(&'a self, pass: &mut Pass<'a>);
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();
}

/// A window with a renderer and the textured program the demos draw with.
pub struct Viewer {
    event_loop: EventLoop<()>,
    window: Window,
    pub renderer: Renderer,
    pub program: ShaderProgram,
    camera: Camera,
    clear_color: [f32; 3],
}

impl Viewer {
    pub fn new(config: &ViewerConfig) -> DemoResult<Self> {
        let event_loop = EventLoop::new();
        let window = WindowBuilder::new()
            .with_title(&config.window.title)
            .with_inner_size(PhysicalSize::new(config.window.width, config.window.height))
            .build(&event_loop)?;
        let size = window.inner_size();

        // SAFETY: the window is moved into the event loop alongside the renderer and both live
        // until the process exits.
        let renderer = pollster::block_on(unsafe {
            Renderer::new(&window, wgpu::Backends::all(), size.width, size.height)
        })?;
        let program = pollster::block_on(create_program(&renderer))?;

        Ok(Self {
            event_loop,
            window,
            renderer,
            program,
            camera: config.camera.build(),
            clear_color: config.clear_color,
        })
    }

    /// Runs the event loop until the window is closed or Escape is pressed.
    pub fn run(self, mut scene: impl Scene) -> ! {
        let Self {
            event_loop,
            window,
            mut renderer,
            mut program,
            mut camera,
            clear_color,
        } = self;
        let size = window.inner_size();
        let mut input = InputState::new(size.width, size.height);
        let start = Instant::now();

        window.set_cursor_visible(false);
        if let Err(e) = window.set_cursor_grab(true) {
            tracing::warn!("Failed to grab cursor: {}", e);
        }

        event_loop.run(move |event, _, control_flow| {
            *control_flow = ControlFlow::Poll;

            match event {
                Event::WindowEvent { event, window_id } if window_id == window.id() => {
                    match event {
                        WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,
                        WindowEvent::Resized(size) => {
                            renderer.resize_surface(size.width, size.height);
                        }
                        WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                            renderer.resize_surface(new_inner_size.width, new_inner_size.height);
                        }
                        WindowEvent::KeyboardInput {
                            input:
                                KeyboardInput {
                                    virtual_keycode: Some(key),
                                    state,
                                    ..
                                },
                            ..
                        } => {
                            let pressed = state == ElementState::Pressed;
                            match key {
                                VirtualKeyCode::Escape if pressed => {
                                    *control_flow = ControlFlow::Exit;
                                }
                                VirtualKeyCode::W => input.set_key(CameraMovement::Forward, pressed),
                                VirtualKeyCode::S => input.set_key(CameraMovement::Backward, pressed),
                                VirtualKeyCode::A => input.set_key(CameraMovement::Left, pressed),
                                VirtualKeyCode::D => input.set_key(CameraMovement::Right, pressed),
                                _ => {}
                            }
                        }
                        WindowEvent::CursorMoved { position, .. } => {
                            input::handle_cursor(
                                &mut input,
                                &mut camera,
                                position.x as f32,
                                position.y as f32,
                            );
                        }
                        WindowEvent::MouseWheel { delta, .. } => match delta {
                            MouseScrollDelta::LineDelta(_, y) => camera.process_mouse_scroll(y),
                            MouseScrollDelta::PixelDelta(position) => {
                                camera.process_mouse_scroll(position.y as f32 / 20.0);
                            }
                        },
                        WindowEvent::Focused(false) => input.reset_cursor(),
                        _ => {}
                    }
                }
                Event::MainEventsCleared => window.request_redraw(),
                Event::RedrawRequested(_) => {
                    input.begin_frame(Instant::now());
                    input.update(&mut camera);

                    let time = start.elapsed().as_secs_f32();
                    let result = render(&renderer, &mut program, &camera, &mut scene, clear_color, time);
                    if let Err(e) = result {
                        tracing::error!("{}", e);
                        *control_flow = ControlFlow::Exit;
                    }
                }
                _ => {}
            }
        })
    }
}

fn render(
    renderer: &Renderer,
    program: &mut ShaderProgram,
    camera: &Camera,
    scene: &mut impl Scene,
    clear_color: [f32; 3],
    time: f32,
) -> DemoResult<()> {
    let frame = program.frame_mut();
    frame.set_mat4(
        "projection",
        camera.projection_matrix(renderer.aspect_ratio(), NEAR, FAR),
    )?;
    frame.set_mat4("view", camera.view_matrix())?;
    program.flush(renderer.queue());
    scene.update(renderer.queue(), time)?;

    let mut job = match renderer.begin_frame(clear_color) {
        Ok(job) => job,
        Err(genix_engine::renderer::Error::SurfaceLost) => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    {
        let mut pass = job.pass();
        pass.set_program(program);
        scene.draw(&mut pass);
    }
    job.submit();

    Ok(())
}

async fn create_program(renderer: &Renderer) -> Result<ShaderProgram, ShaderError> {
    let source = ShaderSource::new(
        "textured",
        include_str!("../shaders/textured.vert.wgsl"),
        include_str!("../shaders/textured.frag.wgsl"),
    );

    ShaderProgram::new(
        renderer.device(),
        &source,
        ProgramDescriptor {
            frame_uniforms: &[
                ("projection", UniformType::Mat4),
                ("view", UniformType::Mat4),
            ],
            object_uniforms: &[
                ("model", UniformType::Mat4),
                ("normal", UniformType::Mat3),
            ],
            color_format: renderer.surface_format(),
        },
    )
    .await
}
