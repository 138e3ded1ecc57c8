use super::*;
use crate::backend::{Call, RecordingBackend, RenderTarget, SwapEffect, Topology};
use crate::device::{DisplayMode, DisplayRect, Rational};
use crate::draw::{ModelVertex, SpriteVertex};
use crate::pixel::{FormatSupport, PixelFormat, Region, Surface};
use crate::resource::{Mesh, RenderTargetParams};
use crate::state::{BlendMode, Material};
use crate::math::{IDENTITY, translation};
use crate::window::HeadlessWindow;
use crate::backend::OutputDesc;

type TestDisplay = Display<RecordingBackend, HeadlessWindow>;

fn display() -> TestDisplay {
    Display::init(
        RecordingBackend::new(),
        HeadlessWindow::new(),
        DisplayInit::default(),
        &VideoModeParams::default(),
    )
    .unwrap()
}

fn framed() -> TestDisplay {
    let mut d = display();
    assert!(d.begin_frame().unwrap());
    d.backend_mut().take_calls();
    d
}

fn sprites(n: usize) -> Vec<SpriteVertex> {
    (0..n)
        .map(|i| SpriteVertex::new([i as f32, 0.0, 0.0], [255; 4], [0.0, 0.0]))
        .collect()
}

fn draws(d: &TestDisplay) -> Vec<Call> {
    d.backend()
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::DrawSprites { .. } | Call::DrawModel { .. }))
        .cloned()
        .collect()
}

fn last_pixel_constants(d: &TestDisplay) -> Option<crate::state::PixelConstants> {
    d.backend().calls().iter().rev().find_map(|c| match c {
        Call::PixelConstants(p) => Some(*p),
        _ => None,
    })
}

// ── video mode ────────────────────────────────────────────────────────────

#[test]
fn init_negotiates_and_builds_targets() {
    let d = display();
    assert!(d.is_ready());
    let actual = d.actual_video_mode().unwrap();
    assert_eq!(actual.format, PixelFormat::Rgba8);
    assert_eq!((actual.width, actual.height), (640, 480));
    assert_eq!(actual.effect, SwapEffect::FlipDiscard);
    assert_eq!(
        d.backend().call_names(),
        vec!["create_swapchain", "create_back_buffer_targets"]
    );
    assert_eq!(d.host().applied.len(), 1);
}

#[test]
fn swapchain_falls_back_to_discard() {
    let mut backend = RecordingBackend::new();
    backend.failing_effects.insert(SwapEffect::FlipDiscard);
    let d = Display::init(backend, HeadlessWindow::new(), DisplayInit::default(), &VideoModeParams::default())
        .unwrap();
    assert_eq!(d.actual_video_mode().unwrap().effect, SwapEffect::Discard);
}

#[test]
fn video_mode_falls_back_to_windowed_640x480() {
    let host = HeadlessWindow {
        reject: Some(|p| !p.windowed),
        ..Default::default()
    };
    let params = VideoModeParams {
        windowed: false,
        width: 1920,
        height: 1080,
        ..Default::default()
    };
    let d = Display::init(RecordingBackend::new(), host, DisplayInit::default(), &params).unwrap();

    let tried: Vec<(u32, bool)> = d.host().applied.iter().map(|p| (p.bpp, p.windowed)).collect();
    // requested 32 bpp, 16 bpp, then 640x480 windowed (32 bpp duplicates the request)
    assert_eq!(tried, vec![(32, false), (16, false), (32, true)]);
    let actual = d.actual_video_mode().unwrap();
    assert_eq!((actual.width, actual.height), (640, 480));
}

#[test]
fn total_failure_joins_every_attempt() {
    let mut backend = RecordingBackend::new();
    backend.failing_effects.insert(SwapEffect::FlipDiscard);
    backend.failing_effects.insert(SwapEffect::Discard);
    let mut d = Display::new(backend, HeadlessWindow::new(), DisplayInit::default());
    let err = d.set_video_mode(&VideoModeParams::default()).unwrap_err();
    assert_eq!(err.attempts.len(), 2);
    assert!(err.to_string().contains("; "));
    assert!(err.attempts[0].contains("Swapchain creation failed"));
    assert!(!d.is_ready());
}

#[test]
fn no_back_buffer_format_is_reported() {
    let mut backend = RecordingBackend::new();
    for f in [PixelFormat::Bgra4, PixelFormat::Bgr5a1] {
        backend.support.insert(f, FormatSupport::TEXTURE_2D);
    }
    let mut d = Display::new(backend, HeadlessWindow::new(), DisplayInit::default());
    let err = d
        .try_video_mode(&VideoModeParams {
            bpp: 16,
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, DisplayError::NoBackBufferFormat { bpp: 16 }));
    assert!(d.host().applied.is_empty());
}

#[test]
fn failed_back_buffer_targets_leave_display_not_ready() {
    let mut backend = RecordingBackend::new();
    backend.fail_back_buffer_targets = true;
    let mut d = Display::new(backend, HeadlessWindow::new(), DisplayInit::default());
    assert!(d.try_video_mode(&VideoModeParams::default()).is_err());
    assert!(!d.is_ready());
    assert!(matches!(d.begin_frame(), Err(DisplayError::NotReady)));
}

#[test]
fn display_specs_come_from_backend_outputs() {
    let mut backend = RecordingBackend::new();
    let mode = DisplayMode {
        width: 1280,
        height: 720,
        refresh: Rational::new(60, 1),
    };
    backend.outputs.push(OutputDesc {
        name: "primary".into(),
        desktop: DisplayRect {
            x: 0,
            y: 0,
            width: 1280,
            height: 720,
        },
        modes: vec![mode, mode],
        current: None,
    });
    let d = Display::new(backend, HeadlessWindow::new(), DisplayInit::default());
    let specs = d.display_specs();
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].modes.len(), 1);
    assert_eq!(specs[0].current, Some(mode));
}

// ── frame lifecycle ───────────────────────────────────────────────────────

#[test]
fn frame_calls_happen_in_order() {
    let mut d = display();
    d.backend_mut().take_calls();
    assert!(d.begin_frame().unwrap());
    d.end_frame().unwrap();
    assert_eq!(
        d.backend().call_names(),
        vec!["begin_frame", "set_render_target", "clear", "present"]
    );
    assert_eq!(
        d.backend().calls()[2],
        Call::Clear {
            color: Some([0.0, 0.0, 0.0, 1.0]),
            depth: Some(1.0),
        }
    );
    assert_eq!(d.host().updates, 1);
    assert_eq!(d.last_frame_time().unwrap().frame_index, 0);
}

#[test]
fn vsync_selects_sync_interval() {
    let mut d = display();
    d.begin_frame().unwrap();
    d.end_frame().unwrap();
    assert!(d.backend().calls().contains(&Call::Present { sync_interval: 1 }));

    d.set_video_mode(&VideoModeParams {
        vsync: Some(false),
        ..Default::default()
    })
    .unwrap();
    d.backend_mut().take_calls();
    d.begin_frame().unwrap();
    d.end_frame().unwrap();
    assert!(d.backend().calls().contains(&Call::Present { sync_interval: 0 }));
}

#[test]
fn resize_is_applied_at_frame_start() {
    let mut d = display();
    d.host_mut().resize(800, 600);
    d.backend_mut().take_calls();
    assert!(d.begin_frame().unwrap());
    assert_eq!(
        &d.backend().call_names()[..3],
        &["resize_swapchain", "create_back_buffer_targets", "begin_frame"]
    );
    let actual = d.actual_video_mode().unwrap();
    assert_eq!((actual.width, actual.height), (800, 600));
}

#[test]
fn minimized_window_skips_frames() {
    let mut d = display();
    d.host_mut().resize(0, 0);
    assert!(!d.begin_frame().unwrap());
    d.draw_quads(&sprites(4)).unwrap();
    assert!(draws(&d).is_empty());
}

#[test]
fn minimized_frames_are_still_paced() {
    let mut d = Display::init(
        RecordingBackend::new(),
        HeadlessWindow::new(),
        DisplayInit {
            frame_limit: Some(10),
            ..Default::default()
        },
        &VideoModeParams::default(),
    )
    .unwrap();
    d.host_mut().resize(0, 0);

    let start = std::time::Instant::now();
    for _ in 0..5 {
        assert!(!d.begin_frame().unwrap());
        d.end_frame().unwrap();
    }
    assert!(start.elapsed() >= std::time::Duration::from_millis(400));
    assert!(!d.backend().call_names().contains(&"present"));
}

#[test]
fn screenshot_reads_back_buffer_in_frame() {
    let mut d = framed();
    d.backend_mut().back_buffer_fill = Some(7);
    let shot = d.create_screenshot().unwrap().unwrap();
    let actual = d.actual_video_mode().unwrap();
    assert_eq!((shot.width, shot.height), (actual.width, actual.height));
    assert_eq!(shot.format, actual.format);
    assert_eq!(shot.pitch, actual.width * actual.format.bytes_per_pixel() as u32);
    assert!(shot.pixels.iter().all(|&b| b == 7));
    assert_eq!(d.backend().call_names(), vec!["read_back_buffer"]);
}

#[test]
fn screenshot_outside_frame_or_unreadable_is_none() {
    let mut d = display();
    assert!(d.create_screenshot().unwrap().is_none());
    assert!(!d.backend().call_names().contains(&"read_back_buffer"));

    assert!(d.begin_frame().unwrap());
    d.backend_mut().back_buffer_fill = None;
    assert!(d.create_screenshot().unwrap().is_none());
}

#[test]
fn skipped_backend_frame_drops_draws() {
    let mut d = display();
    d.backend_mut().skip_frames = 1;
    assert!(!d.begin_frame().unwrap());
    d.draw_quads(&sprites(4)).unwrap();
    d.end_frame().unwrap();
    assert!(draws(&d).is_empty());
    assert!(!d.backend().call_names().contains(&"present"));
}

#[test]
fn surface_lost_on_present_reconfigures_next_frame() {
    let mut d = framed();
    d.backend_mut().present_error = Some(BackendError::SurfaceLost);
    d.end_frame().unwrap();
    d.backend_mut().take_calls();
    assert!(d.begin_frame().unwrap());
    assert_eq!(d.backend().call_names()[0], "resize_swapchain");
}

#[test]
fn device_lost_makes_draws_noops_until_mode_reset() {
    let mut d = framed();
    d.backend_mut().present_error = Some(BackendError::DeviceLost("reset".into()));
    assert!(matches!(d.end_frame(), Err(DisplayError::DeviceLost(_))));
    assert!(d.is_device_lost());
    assert!(matches!(d.begin_frame(), Err(DisplayError::DeviceLost(_))));
    d.draw_quads(&sprites(4)).unwrap();
    assert!(draws(&d).is_empty());

    d.set_video_mode(&VideoModeParams::default()).unwrap();
    assert!(!d.is_device_lost());
    assert!(d.begin_frame().unwrap());
}

#[test]
fn close_request_is_latched() {
    let mut d = display();
    d.host_mut().pending.close_requested = true;
    d.begin_frame().unwrap();
    assert!(d.close_requested());
}

// ── draws ─────────────────────────────────────────────────────────────────

#[test]
fn draws_flush_state_first() {
    let mut d = framed();
    d.set_blend_mode(BlendMode::Add);
    d.draw_quads(&sprites(8)).unwrap();
    let names = d.backend().call_names();
    let blend = names.iter().position(|n| *n == "blend").unwrap();
    let draw = names.iter().position(|n| *n == "draw_sprites").unwrap();
    assert!(blend < draw);
    assert_eq!(d.stats().draw_calls, 1);
    assert_eq!(d.stats().vertices, 8);
}

#[test]
fn second_draw_without_changes_flushes_nothing() {
    let mut d = framed();
    d.draw_quads(&sprites(4)).unwrap();
    d.backend_mut().take_calls();
    d.set_blend_mode(BlendMode::Normal);
    d.draw_quads(&sprites(4)).unwrap();
    assert_eq!(d.backend().call_names(), vec!["draw_sprites"]);
}

#[test]
fn quads_use_synthesized_indices() {
    let mut d = framed();
    d.draw_quads(&sprites(8)).unwrap();
    match &draws(&d)[0] {
        Call::DrawSprites {
            topology,
            vertex_count,
            indices: Some(indices),
        } => {
            assert_eq!(*topology, Topology::TriangleList);
            assert_eq!(*vertex_count, 8);
            assert_eq!(indices.len(), 12);
        }
        other => panic!("unexpected {other:?}"),
    }
}

fn indices_after_flush(d: &TestDisplay) -> Vec<u16> {
    let names = d.backend().call_names();
    let blend = names.iter().position(|n| *n == "blend").unwrap();
    let draw = names.iter().position(|n| *n == "draw_sprites").unwrap();
    assert!(blend < draw, "state must be flushed before the draw: {names:?}");
    match &d.backend().calls()[draw] {
        Call::DrawSprites {
            topology: Topology::TriangleList,
            indices: Some(indices),
            ..
        } => indices.clone(),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn quad_strip_shares_edges_between_quads() {
    let mut d = framed();
    d.set_blend_mode(BlendMode::Add);
    d.draw_quad_strip(&sprites(6)).unwrap();
    assert_eq!(
        indices_after_flush(&d),
        vec![0, 1, 2, 1, 2, 3, 2, 3, 4, 3, 4, 5]
    );
    assert_eq!(d.stats().vertices, 6);
}

#[test]
fn symmetric_quad_strip_fans_each_piece_around_its_centre() {
    let mut d = framed();
    d.set_blend_mode(BlendMode::Add);
    d.draw_symmetric_quad_strip(&sprites(9)).unwrap();
    assert_eq!(
        indices_after_flush(&d),
        vec![
            1, 3, 0, 1, 4, 3, 1, 5, 4, 1, 2, 5,
            4, 6, 3, 4, 7, 6, 4, 8, 7, 4, 5, 8,
        ]
    );
}

#[test]
fn short_strips_draw_nothing() {
    let mut d = framed();
    d.draw_quad_strip(&sprites(3)).unwrap();
    d.draw_symmetric_quad_strip(&sprites(5)).unwrap();
    assert!(draws(&d).is_empty());
    assert_eq!(d.stats().draw_calls, 0);
}

#[test]
fn fans_are_emulated_without_native_support() {
    let mut d = framed();
    d.draw_fan(&sprites(12)).unwrap();
    match &draws(&d)[0] {
        Call::DrawSprites {
            indices: Some(indices), ..
        } => {
            assert_eq!(indices.len(), 30);
            assert!(indices.chunks(3).all(|t| t[0] == 0));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn fans_are_native_when_supported() {
    let mut backend = RecordingBackend::new();
    backend.native_fans = true;
    let mut d = Display::init(backend, HeadlessWindow::new(), DisplayInit::default(), &VideoModeParams::default())
        .unwrap();
    d.begin_frame().unwrap();
    d.draw_fan(&sprites(6)).unwrap();
    assert!(matches!(
        draws(&d)[0],
        Call::DrawSprites {
            topology: Topology::TriangleFan,
            indices: None,
            ..
        }
    ));
}

#[test]
fn strips_and_triangles_draw_directly() {
    let mut d = framed();
    d.draw_strip(&sprites(5)).unwrap();
    d.draw_triangles(&sprites(7)).unwrap();
    let calls = draws(&d);
    assert!(matches!(
        calls[0],
        Call::DrawSprites {
            topology: Topology::TriangleStrip,
            vertex_count: 5,
            indices: None
        }
    ));
    assert!(matches!(
        calls[1],
        Call::DrawSprites {
            topology: Topology::TriangleList,
            vertex_count: 6,
            indices: None
        }
    ));
}

#[test]
fn oversized_draw_is_rejected() {
    let mut d = framed();
    let err = d.draw_quads(&sprites(MAX_INDEXED_VERTICES_PLUS_ONE)).unwrap_err();
    assert!(matches!(err, DisplayError::TooManyVertices { .. }));
    assert!(draws(&d).is_empty());
}

const MAX_INDEXED_VERTICES_PLUS_ONE: usize = crate::draw::MAX_INDEXED_VERTICES + 4;

// ── resources ─────────────────────────────────────────────────────────────

fn rgba(w: u32, h: u32) -> Surface {
    Surface::new(w, h, PixelFormat::Rgba8)
}

#[test]
fn deleting_bound_texture_unbinds_it() {
    let mut d = framed();
    let tex = d.create_texture(PixelFormat::Rgba8, &rgba(4, 4), false).unwrap();
    d.set_texture(0, tex).unwrap();
    d.set_texture(2, tex).unwrap();
    d.draw_quads(&sprites(4)).unwrap();
    d.backend_mut().take_calls();

    d.delete_texture(tex).unwrap();
    d.draw_quads(&sprites(4)).unwrap();
    let unbinds: Vec<usize> = d
        .backend()
        .calls()
        .iter()
        .filter_map(|c| match c {
            Call::BindTexture { unit, texture: None } => Some(*unit),
            _ => None,
        })
        .collect();
    assert_eq!(unbinds, vec![0, 2]);
    assert_eq!(last_pixel_constants(&d).unwrap().bound_units, 0);
}

#[test]
fn stale_texture_handle_is_rejected() {
    let mut d = display();
    let tex = d.create_texture(PixelFormat::Rgba8, &rgba(2, 2), false).unwrap();
    d.delete_texture(tex).unwrap();
    assert!(matches!(d.set_texture(0, tex), Err(DisplayError::InvalidHandle { .. })));
    assert!(d.delete_texture(tex).is_err());
    assert!(d.delete_texture(TextureHandle::NONE).is_ok());
}

#[test]
fn update_texture_checks_bounds() {
    let mut d = display();
    let tex = d.create_texture(PixelFormat::Rgba8, &rgba(40, 8), false).unwrap();
    // 40 wide rounds to a 64 wide texture
    let err = d
        .update_texture(tex, &rgba(64, 8), Region::new(10, 0, 60, 8))
        .unwrap_err();
    assert!(matches!(err, DisplayError::RegionOutOfBounds { .. }));
}

#[test]
fn render_target_round_trip() {
    let mut d = framed();
    let (rt, w, h) = d
        .create_render_target(RenderTargetParams {
            width: 256,
            height: 192,
            with_alpha: true,
            with_depth: true,
        })
        .unwrap();
    assert_eq!((w, h), (256, 192));

    d.set_render_target(rt, false).unwrap();
    let names = d.backend().call_names();
    assert!(names.ends_with(&["set_render_target", "clear"]));

    d.set_render_target(TextureHandle::NONE, true).unwrap();
    assert_eq!(
        d.backend().calls().last(),
        Some(&Call::SetRenderTarget(RenderTarget::BackBuffer))
    );
}

#[test]
fn deleting_active_render_target_restores_back_buffer() {
    let mut d = framed();
    let (rt, _, _) = d.create_render_target(RenderTargetParams::default()).unwrap();
    d.set_render_target(rt, true).unwrap();
    d.delete_texture(rt).unwrap();
    assert_eq!(d.render_target(), TextureHandle::NONE);
}

// ── compiled geometry ─────────────────────────────────────────────────────

fn mesh(vertex_count: usize, scaled: bool) -> Mesh {
    let mut vertices: Vec<ModelVertex> = (0..vertex_count)
        .map(|i| ModelVertex::new([i as f32, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]))
        .collect();
    if scaled {
        vertices[0].texture_matrix_scale = [2.0, 2.0];
    }
    Mesh {
        vertices,
        triangles: vec![[0, 1, 2]],
    }
}

#[test]
fn compiled_geometry_draws_requested_mesh() {
    let mut d = framed();
    let g = d.create_compiled_geometry(&[mesh(3, false), mesh(4, false)]).unwrap();
    d.draw_compiled_geometry(g, 1).unwrap();
    match draws(&d)[0] {
        Call::DrawModel {
            first_index,
            index_count,
            ..
        } => assert_eq!((first_index, index_count), (3, 3)),
        ref other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        d.draw_compiled_geometry(g, 2),
        Err(DisplayError::MeshOutOfRange { index: 2, count: 2 })
    ));
}

#[test]
fn unlit_geometry_uses_material_colour_then_restores() {
    let mut d = framed();
    d.set_material(&Material {
        diffuse: [0.5, 0.0, 0.0, 1.0],
        ..Default::default()
    });
    let g = d.create_compiled_geometry(&[mesh(3, false)]).unwrap();
    d.draw_compiled_geometry(g, 0).unwrap();
    let during = last_pixel_constants(&d).unwrap();
    assert_eq!(during.use_texture_factor, 1);

    d.draw_quads(&sprites(4)).unwrap();
    assert_eq!(last_pixel_constants(&d).unwrap().use_texture_factor, 0);
}

#[test]
fn lit_geometry_keeps_vertex_colour() {
    let mut d = framed();
    d.set_lighting(true);
    let g = d.create_compiled_geometry(&[mesh(3, false)]).unwrap();
    d.draw_compiled_geometry(g, 0).unwrap();
    assert_eq!(last_pixel_constants(&d).unwrap().use_texture_factor, 0);
}

#[test]
fn scaled_mesh_draws_without_texture_translation() {
    let mut d = framed();
    let texture = translation(0.25, 0.5, 0.0);
    d.set_texture_matrix(&texture);
    let g = d.create_compiled_geometry(&[mesh(3, true)]).unwrap();
    d.draw_compiled_geometry(g, 0).unwrap();

    let used = d.backend().calls().iter().rev().find_map(|c| match c {
        Call::VertexConstants(v) => Some(v.texture),
        _ => None,
    });
    assert_eq!(used, Some(IDENTITY));

    d.draw_quads(&sprites(4)).unwrap();
    let restored = d.backend().calls().iter().rev().find_map(|c| match c {
        Call::VertexConstants(v) => Some(v.texture),
        _ => None,
    });
    assert_eq!(restored, Some(texture));
}

#[test]
fn deleted_geometry_handle_is_stale() {
    let mut d = framed();
    let g = d.create_compiled_geometry(&[mesh(3, false)]).unwrap();
    let live = d.backend().live_buffers();
    d.delete_compiled_geometry(g).unwrap();
    assert_eq!(d.backend().live_buffers(), live - 2);
    assert!(matches!(
        d.draw_compiled_geometry(g, 0),
        Err(DisplayError::InvalidHandle { .. })
    ));
}

// ── state setters ─────────────────────────────────────────────────────────

#[test]
fn directional_light_flips_z() {
    let mut d = framed();
    d.set_lighting(true);
    d.set_light_directional(0, [0.1; 4], [1.0; 4], [0.0; 4], [0.0, 0.0, 1.0]);
    d.draw_quads(&sprites(4)).unwrap();
    let light = d.backend().calls().iter().rev().find_map(|c| match c {
        Call::VertexConstants(v) => Some(v.lights[0]),
        _ => None,
    });
    assert_eq!(light.unwrap().direction, [0.0, 0.0, -1.0, 1.0]);
}

#[test]
fn z_queries_reflect_state() {
    let mut d = display();
    assert!(!d.is_z_write_enabled());
    assert!(!d.is_z_test_enabled());
    d.set_z_write(true);
    d.set_z_test_mode(crate::state::ZTestMode::WriteOnPass);
    assert!(d.is_z_write_enabled());
    assert!(d.is_z_test_enabled());
}

#[test]
fn clear_z_buffer_only_clears_depth() {
    let mut d = framed();
    d.clear_z_buffer();
    assert_eq!(
        d.backend().calls(),
        &[Call::Clear {
            color: None,
            depth: Some(1.0)
        }]
    );
}

#[test]
fn capabilities_are_reported() {
    let d = display();
    assert!(d.supports_threaded_rendering());
    assert!(!d.supports_per_vertex_matrix_scale());
    assert_eq!(d.max_texture_units(), 4);
    assert!(d.supports_texture_format(PixelFormat::Rgba8));
    assert!(d.supports_texture_format(PixelFormat::Paletted));
}
