// Copyright 2025 the Borealis authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Public command API behaviour: synchronous validation, display
//! lifecycle events, threading preconditions and loop-time reporting.

use borealis_backend::HeadlessPlatform;
use borealis_core::config::{DisplayConfig, FrameworkConfig, RendererConfig};
use borealis_core::error::RendererApiError;
use borealis_core::event::{EventResult, RendererEventHandler};
use borealis_core::handle::{DisplayHandle, DisplayId, OffscreenBufferHandle};
use borealis_renderer::Renderer;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct RecordingHandler {
    displays_created: Vec<(DisplayHandle, EventResult)>,
    displays_destroyed: Vec<(DisplayHandle, EventResult)>,
    buffers_created: Vec<(OffscreenBufferHandle, EventResult)>,
    buffers_destroyed: Vec<(OffscreenBufferHandle, EventResult)>,
    loop_timings: Vec<(Duration, Duration)>,
    pixel_reads: usize,
}

impl RendererEventHandler for RecordingHandler {
    fn display_created(&mut self, display: DisplayHandle, result: EventResult) {
        self.displays_created.push((display, result));
    }
    fn display_destroyed(&mut self, display: DisplayHandle, result: EventResult) {
        self.displays_destroyed.push((display, result));
    }
    fn offscreen_buffer_created(
        &mut self,
        _display: DisplayHandle,
        buffer: OffscreenBufferHandle,
        result: EventResult,
    ) {
        self.buffers_created.push((buffer, result));
    }
    fn offscreen_buffer_destroyed(
        &mut self,
        _display: DisplayHandle,
        buffer: OffscreenBufferHandle,
        result: EventResult,
    ) {
        self.buffers_destroyed.push((buffer, result));
    }
    fn pixels_read(
        &mut self,
        _display: DisplayHandle,
        _buffer: OffscreenBufferHandle,
        _pixels: &[u8],
        _result: EventResult,
    ) {
        self.pixel_reads += 1;
    }
    fn render_thread_loop_timings(&mut self, maximum: Duration, average: Duration) {
        self.loop_timings.push((maximum, average));
    }
}

fn renderer(config: RendererConfig) -> Renderer {
    Renderer::new(
        Arc::new(HeadlessPlatform::new()),
        &FrameworkConfig::default(),
        config,
        None,
    )
}

#[test]
fn display_create_and_destroy_round_trip() {
    let mut r = renderer(RendererConfig::default());
    let mut handler = RecordingHandler::default();

    let display = r.create_display(&DisplayConfig::default());
    assert_eq!(display, DisplayId(1));
    r.flush();
    r.do_one_loop().unwrap();
    r.dispatch_events(&mut handler);
    assert_eq!(
        handler.displays_created,
        vec![(DisplayHandle(1), EventResult::Ok)]
    );

    r.destroy_display(display).unwrap();
    r.flush();
    r.do_one_loop().unwrap();
    r.dispatch_events(&mut handler);
    assert_eq!(
        handler.displays_destroyed,
        vec![(DisplayHandle(1), EventResult::Ok)]
    );
}

#[test]
fn display_ids_are_monotonic_and_zero_is_invalid() {
    let mut r = renderer(RendererConfig::default());
    let a = r.create_display(&DisplayConfig::default());
    let b = r.create_display(&DisplayConfig::default());
    assert!(a.is_valid() && b.is_valid());
    assert!(b.0 > a.0);
    assert!(!DisplayId::INVALID.is_valid());

    // framebuffers count as display buffers and differ per display
    let fa = r.get_display_framebuffer(a).unwrap();
    let fb = r.get_display_framebuffer(b).unwrap();
    assert_ne!(fa, fb);
}

#[test]
fn offscreen_buffer_dimension_boundaries() {
    let mut r = renderer(RendererConfig::default());
    let mut handler = RecordingHandler::default();
    let display = r.create_display(&DisplayConfig::default());
    r.flush();
    r.do_one_loop().unwrap();
    r.dispatch_events(&mut handler);

    // rejected synchronously, without any asynchronous event
    assert!(!r.create_offscreen_buffer(display, 0, 100, 1, false).is_valid());
    assert!(!r.create_offscreen_buffer(display, 100, 0, 1, false).is_valid());
    assert!(!r.create_offscreen_buffer(display, 4097, 100, 1, false).is_valid());
    assert!(r.last_error().is_some());

    r.flush();
    r.do_one_loop().unwrap();
    r.dispatch_events(&mut handler);
    assert!(handler.buffers_created.is_empty());

    // accepted at both ends of the range
    let small = r.create_offscreen_buffer(display, 1, 1, 1, false);
    let large = r.create_offscreen_buffer(display, 4096, 4096, 1, false);
    assert!(small.is_valid() && large.is_valid());
    r.flush();
    r.do_one_loop().unwrap();
    r.dispatch_events(&mut handler);
    assert_eq!(handler.buffers_created.len(), 2);
    assert!(handler
        .buffers_created
        .iter()
        .all(|(_, result)| *result == EventResult::Ok));
}

#[test]
fn offscreen_buffer_create_destroy_leaves_device_clean() {
    let platform = Arc::new(HeadlessPlatform::new());
    let mut r = Renderer::new(
        platform.clone(),
        &FrameworkConfig::default(),
        RendererConfig::default(),
        None,
    );
    let mut handler = RecordingHandler::default();
    let display = r.create_display(&DisplayConfig::default());
    r.flush();
    r.do_one_loop().unwrap();

    let stats = platform.device_stats(DisplayHandle(1)).unwrap();
    let before = stats.allocated();

    let ob = r.create_offscreen_buffer(display, 16, 16, 1, false);
    r.flush();
    r.do_one_loop().unwrap();
    assert!(stats.allocated() > before);

    r.destroy_offscreen_buffer(display, ob).unwrap();
    r.flush();
    r.do_one_loop().unwrap();
    r.dispatch_events(&mut handler);

    assert_eq!(stats.allocated(), before);
    assert_eq!(handler.buffers_destroyed.len(), 1);
    assert_eq!(handler.buffers_destroyed[0].1, EventResult::Ok);
}

#[test]
fn read_pixels_validation_is_synchronous() {
    let mut r = renderer(RendererConfig::default());
    let mut handler = RecordingHandler::default();
    let display = r.create_display(&DisplayConfig::default());
    let framebuffer = r.get_display_framebuffer(display).unwrap();
    r.flush();
    r.do_one_loop().unwrap();
    r.dispatch_events(&mut handler);

    // unknown display: synchronous error, no event
    let unknown = DisplayId(999);
    assert!(matches!(
        r.read_pixels(unknown, framebuffer, 0, 0, 10, 10),
        Err(RendererApiError::UnknownEntity(_))
    ));
    // zero-sized rectangle: synchronous error, no event
    assert!(matches!(
        r.read_pixels(display, framebuffer, 0, 0, 0, 10),
        Err(RendererApiError::InvalidArgument(_))
    ));

    r.flush();
    r.do_one_loop().unwrap();
    r.dispatch_events(&mut handler);
    assert_eq!(handler.pixel_reads, 0);

    // a valid request produces exactly one event
    r.read_pixels(display, framebuffer, 0, 0, 8, 8).unwrap();
    r.flush();
    r.do_one_loop().unwrap();
    r.dispatch_events(&mut handler);
    assert_eq!(handler.pixel_reads, 1);
}

#[test]
fn framerate_validation_boundaries() {
    let mut r = renderer(RendererConfig::default());
    assert!(r.set_maximum_framerate(0.0).is_err());
    assert!(r.set_maximum_framerate(-10.0).is_err());
    assert!(r.set_maximum_framerate(1.0 / 3600.0).is_ok());
    assert!(r.set_maximum_framerate(10_000.0).is_ok());
    assert!((r.maximum_framerate() - 10_000.0).abs() < 1.0);
}

#[test]
fn threading_modes_are_mutually_exclusive() {
    let mut r = renderer(RendererConfig::default());
    r.do_one_loop().unwrap();
    assert!(matches!(
        r.start_thread(),
        Err(RendererApiError::Precondition(_))
    ));

    let mut r = renderer(RendererConfig::default());
    r.start_thread().unwrap();
    assert!(r.is_thread_running());
    assert!(matches!(
        r.do_one_loop(),
        Err(RendererApiError::Precondition(_))
    ));
    r.stop_thread().unwrap();
    assert!(!r.is_thread_running());
}

#[test]
fn system_compositor_commands_require_the_feature() {
    let mut r = renderer(RendererConfig::default());
    assert!(matches!(
        r.sc_set_ivi_surface_visibility(borealis_core::handle::WaylandIviSurfaceId(1), true),
        Err(RendererApiError::Precondition(_))
    ));

    let mut r = renderer(RendererConfig {
        system_compositor_enabled: true,
        ..RendererConfig::default()
    });
    assert!(r
        .sc_set_ivi_surface_visibility(borealis_core::handle::WaylandIviSurfaceId(1), true)
        .is_ok());
}

#[test]
fn warping_mesh_validation() {
    let mut r = renderer(RendererConfig::default());
    let display = r.create_display(&DisplayConfig {
        warping_enabled: true,
        ..DisplayConfig::default()
    });

    let bad = borealis_core::command::WarpingMeshData {
        vertex_positions: vec![[0.0; 3]; 3],
        texture_coordinates: vec![[0.0; 2]; 3],
        indices: vec![0, 1], // not a triangle list
    };
    assert!(r.update_warping_mesh_data(display, bad).is_err());

    let empty = borealis_core::command::WarpingMeshData {
        vertex_positions: vec![],
        texture_coordinates: vec![],
        indices: vec![],
    };
    assert!(r.update_warping_mesh_data(display, empty).is_err());

    let good = borealis_core::command::WarpingMeshData {
        vertex_positions: vec![[0.0; 3]; 3],
        texture_coordinates: vec![[0.0; 2]; 3],
        indices: vec![0, 1, 2],
    };
    assert!(r.update_warping_mesh_data(display, good).is_ok());
}

#[test]
fn threaded_rendering_reports_loop_times() {
    let mut r = renderer(RendererConfig {
        maximum_framerate: 240.0,
        loop_count_period: Duration::from_millis(30),
        ..RendererConfig::default()
    });
    let mut handler = RecordingHandler::default();

    let display = r.create_display(&DisplayConfig::default());
    r.flush();
    r.start_thread().unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while handler.loop_timings.is_empty() {
        assert!(std::time::Instant::now() < deadline, "no loop timings arrived");
        std::thread::sleep(Duration::from_millis(10));
        r.dispatch_events(&mut handler);
    }
    assert_eq!(
        handler.displays_created,
        vec![(DisplayHandle(display.0), EventResult::Ok)]
    );
    for (maximum, average) in &handler.loop_timings {
        assert!(maximum >= average);
    }

    r.stop_thread().unwrap();
}
