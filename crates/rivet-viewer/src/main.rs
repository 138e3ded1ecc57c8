//! Interactive smoke test for the display: textured quads, an emulated fan, a strip and
//! a lit compiled mesh, redrawn every frame.

use std::sync::Arc;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use rivet_display::backend::wgpu::WgpuBackend;
use rivet_display::device::{DisplayInit, VideoModeParams};
use rivet_display::draw::{ModelVertex, SpriteVertex};
use rivet_display::handle::{GeometryHandle, TextureHandle};
use rivet_display::logging::{LoggingConfig, init_logging};
use rivet_display::math::{IDENTITY, ortho, translation};
use rivet_display::pixel::{PixelFormat, Surface};
use rivet_display::resource::Mesh;
use rivet_display::state::{BlendMode, CullMode, Material, TextureMode, ZTestMode};
use rivet_display::window::WinitWindowHost;
use rivet_display::{Display, DisplayError};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

type ViewerDisplay = Display<WgpuBackend, WinitWindowHost>;

struct Scene {
    checker: TextureHandle,
    cube: GeometryHandle,
    frame: u64,
    screenshot_requested: bool,
}

#[derive(Default)]
struct Viewer {
    display: Option<ViewerDisplay>,
    scene: Option<Scene>,
}

impl Viewer {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("rivet viewer")
            .with_inner_size(LogicalSize::new(WIDTH as f64, HEIGHT as f64));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let init = DisplayInit {
            frame_limit: Some(120),
            vsync_lead: 0.5,
            ..Default::default()
        };
        let backend = WgpuBackend::new(window.clone(), &init).context("GPU initialization failed")?;
        let host = WinitWindowHost::new(window);
        let params = VideoModeParams {
            width: WIDTH,
            height: HEIGHT,
            title: "rivet viewer".to_string(),
            ..Default::default()
        };
        let mut display = Display::init(backend, host, init, &params).context("no usable video mode")?;

        let info = display.adapter_info();
        log::info!("adapter: {} via {}", info.name, info.backend);
        for spec in display.display_specs() {
            log::info!("output {}: {} modes", spec.name, spec.modes.len());
        }

        let scene = build_scene(&mut display).context("failed to build scene")?;
        self.display = Some(display);
        self.scene = Some(scene);
        Ok(())
    }

    fn redraw(&mut self) -> Result<(), DisplayError> {
        let (Some(display), Some(scene)) = (self.display.as_mut(), self.scene.as_mut()) else {
            return Ok(());
        };
        if !display.begin_frame()? {
            return display.end_frame();
        }
        draw_scene(display, scene)?;
        if std::mem::take(&mut scene.screenshot_requested) {
            match display.create_screenshot()? {
                Some(shot) => log::info!(
                    "screenshot: {}x{} {:?}, {} bytes",
                    shot.width,
                    shot.height,
                    shot.format,
                    shot.pixels.len()
                ),
                None => log::warn!("back buffer cannot be read back"),
            }
        }
        display.end_frame()?;
        scene.frame += 1;

        if scene.frame % 600 == 0
            && let Some(t) = display.last_frame_time()
        {
            log::info!(
                "frame {}: {:.2} ms, {} draws",
                t.frame_index,
                f64::from(t.dt) * 1000.0,
                display.stats().draw_calls
            );
        }
        Ok(())
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.display.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            log::error!("{e:#}");
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(display) = self.display.as_mut() else { return };
        display.host_mut().handle_event(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput { event, .. }
                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::F12) =>
            {
                if let Some(scene) = self.scene.as_mut() {
                    scene.screenshot_requested = true;
                }
            }
            WindowEvent::RedrawRequested => match self.redraw() {
                Ok(()) => {}
                Err(DisplayError::DeviceLost(reason)) => {
                    log::error!("device lost ({reason}); exiting");
                    event_loop.exit();
                }
                Err(e) => log::warn!("frame failed: {e}"),
            },
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.display.as_ref().is_some_and(Display::close_requested) {
            event_loop.exit();
            return;
        }
        if let Some(display) = &self.display {
            display.host().window().request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Scene handles die with the display.
        self.scene = None;
        self.display = None;
    }
}

fn build_scene(display: &mut ViewerDisplay) -> Result<Scene, DisplayError> {
    let mut surface = Surface::new(64, 64, PixelFormat::Rgba8);
    for y in 0..64 {
        let row = surface.row_mut(y);
        for x in 0..64usize {
            let on = ((x / 8) + (y as usize / 8)) % 2 == 0;
            let px = if on { [240, 240, 240, 255] } else { [40, 60, 120, 255] };
            row[x * 4..x * 4 + 4].copy_from_slice(&px);
        }
    }
    let checker = display.create_texture(PixelFormat::Rgba8, &surface, true)?;
    let cube = display.create_compiled_geometry(&[cube_mesh(60.0)])?;
    Ok(Scene {
        checker,
        cube,
        frame: 0,
        screenshot_requested: false,
    })
}

fn draw_scene(display: &mut ViewerDisplay, scene: &Scene) -> Result<(), DisplayError> {
    let (w, h) = display
        .actual_video_mode()
        .map(|m| (m.width as f32, m.height as f32))
        .unwrap_or((WIDTH as f32, HEIGHT as f32));
    let projection = ortho(0.0, w, h, 0.0, -1000.0, 1000.0);
    let t = scene.frame as f32 / 60.0;

    // ── sprites ───────────────────────────────────────────────────────────
    display.set_lighting(false);
    display.set_blend_mode(BlendMode::Normal);
    display.set_cull_mode(CullMode::None);
    display.set_z_test_mode(ZTestMode::Off);
    display.set_z_write(false);
    display.set_transforms(&projection, &IDENTITY, &IDENTITY);

    display.set_texture(0, scene.checker)?;
    display.set_texture_mode(0, TextureMode::Modulate);
    display.set_texture_filtering(0, true);
    let white = [255, 255, 255, 255];
    display.draw_quads(&[
        SpriteVertex::new([40.0, 40.0, 0.0], white, [0.0, 0.0]),
        SpriteVertex::new([296.0, 40.0, 0.0], white, [1.0, 0.0]),
        SpriteVertex::new([296.0, 296.0, 0.0], white, [1.0, 1.0]),
        SpriteVertex::new([40.0, 296.0, 0.0], white, [0.0, 1.0]),
    ])?;

    display.set_texture(0, TextureHandle::NONE)?;
    display.draw_fan(&circle([500.0, 170.0], 110.0, 32, t))?;

    display.set_blend_mode(BlendMode::Add);
    let strip: Vec<SpriteVertex> = (0..=20)
        .flat_map(|i| {
            let x = 40.0 + i as f32 * 36.0;
            let y = 420.0 + (t * 2.0 + i as f32 * 0.5).sin() * 30.0;
            let c = [(i * 12) as u8, 120, 255 - (i * 12) as u8, 200];
            [
                SpriteVertex::new([x, y, 0.0], c, [0.0, 0.0]),
                SpriteVertex::new([x, y + 40.0, 0.0], c, [0.0, 1.0]),
            ]
        })
        .collect();
    display.draw_strip(&strip)?;

    // ── lit mesh ──────────────────────────────────────────────────────────
    display.set_blend_mode(BlendMode::Normal);
    display.clear_z_buffer();
    display.set_z_test_mode(ZTestMode::WriteOnPass);
    display.set_z_write(true);
    display.set_cull_mode(CullMode::Back);
    display.set_lighting(true);
    display.set_material(&Material {
        diffuse: [0.9, 0.5, 0.2, 1.0],
        ..Default::default()
    });
    display.set_light_directional(
        0,
        [0.3, 0.3, 0.3, 1.0],
        [1.0, 1.0, 1.0, 1.0],
        [0.0; 4],
        [t.cos(), t.sin(), 1.0],
    );
    display.set_transforms(&projection, &IDENTITY, &translation(w - 160.0, h - 160.0, 0.0));
    display.draw_compiled_geometry(scene.cube, 0)?;
    display.set_light_off(0);
    Ok(())
}

fn circle(center: [f32; 2], radius: f32, segments: usize, phase: f32) -> Vec<SpriteVertex> {
    let mut out = vec![SpriteVertex::new([center[0], center[1], 0.0], [255; 4], [0.5, 0.5])];
    for i in 0..=segments {
        let a = i as f32 / segments as f32 * std::f32::consts::TAU;
        let hue = ((a + phase).sin() * 0.5 + 0.5) * 255.0;
        out.push(SpriteVertex::new(
            [center[0] + a.cos() * radius, center[1] + a.sin() * radius, 0.0],
            [hue as u8, 80, 255 - hue as u8, 255],
            [0.0, 0.0],
        ));
    }
    out
}

fn cube_mesh(half: f32) -> Mesh {
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, -1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];
    let mut mesh = Mesh::default();
    for (n, u, v) in FACES {
        let base = mesh.vertices.len() as u16;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let p = [0, 1, 2].map(|k| (n[k] + u[k] * su + v[k] * sv) * half);
            mesh.vertices
                .push(ModelVertex::new(p, n, [(su + 1.0) / 2.0, (sv + 1.0) / 2.0]));
        }
        mesh.triangles.push([base, base + 1, base + 2]);
        mesh.triangles.push([base + 2, base + 3, base]);
    }
    mesh
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut viewer = Viewer::default();
    event_loop
        .run_app(&mut viewer)
        .context("winit event loop terminated with error")?;
    Ok(())
}
