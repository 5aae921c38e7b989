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

//! Events flowing back from the renderer to the user.
//!
//! Renderer events (displays, buffers, windows, loop timings) and scene
//! control events (scene states, flushes, links, picking) travel in two
//! separate queues; `dispatch_events` drains them synchronously on the
//! caller thread into the user's handler.

use crate::command::RendererSceneState;
use crate::handle::{
    DataSlotId, DisplayHandle, OffscreenBufferHandle, SceneId, WaylandIviSurfaceId,
};
use std::time::Duration;

/// Success/failure tag of a paired event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    /// The operation succeeded.
    Ok,
    /// The operation failed; the system stays healthy.
    Failed,
}

impl EventResult {
    /// Builds from a boolean success flag.
    pub fn from_success(success: bool) -> Self {
        if success {
            EventResult::Ok
        } else {
            EventResult::Failed
        }
    }
}

/// Keyboard event data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Platform key code.
    pub key_code: u32,
    /// Pressed or released.
    pub pressed: bool,
    /// Active modifier mask.
    pub modifiers: u32,
}

/// Mouse event data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    /// Button or motion code.
    pub button: u32,
    /// Pressed or released; `false` for pure motion.
    pub pressed: bool,
    /// Cursor x in window coordinates.
    pub x: i32,
    /// Cursor y in window coordinates.
    pub y: i32,
}

/// Event produced by the renderer side (displays, buffers, windows).
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum RendererEvent {
    DisplayCreated { display: DisplayHandle, result: EventResult },
    DisplayDestroyed { display: DisplayHandle, result: EventResult },
    OffscreenBufferCreated {
        display: DisplayHandle,
        buffer: OffscreenBufferHandle,
        result: EventResult,
    },
    OffscreenBufferDestroyed {
        display: DisplayHandle,
        buffer: OffscreenBufferHandle,
        result: EventResult,
    },
    /// Pixels read back from a display buffer; `buffer` invalid means
    /// the display framebuffer. Pixel data is empty on failure.
    ReadPixels {
        display: DisplayHandle,
        buffer: OffscreenBufferHandle,
        pixels: Vec<u8>,
        result: EventResult,
    },
    WarpingDataUpdated { display: DisplayHandle, result: EventResult },
    WindowClosed { display: DisplayHandle },
    WindowKeyEvent { display: DisplayHandle, event: KeyEvent },
    WindowMouseEvent { display: DisplayHandle, event: MouseEvent },
    WindowResized { display: DisplayHandle, width: u32, height: u32 },
    WindowMoved { display: DisplayHandle, x: i32, y: i32 },
    /// Loop-time statistics of one render thread over the last period.
    RenderThreadPeriodicLoopTimes {
        display: DisplayHandle,
        maximum: Duration,
        average: Duration,
    },
}

/// Event produced by scene control and data linking.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum SceneControlEvent {
    SceneStateChanged { scene: SceneId, state: RendererSceneState },
    SceneFlushed { scene: SceneId, flush_index: u64 },
    SceneExpired { scene: SceneId },
    SceneRecoveredFromExpiration { scene: SceneId },
    SceneForcedToUnsubscribe { scene: SceneId },
    StreamAvailabilityChanged { stream: WaylandIviSurfaceId, available: bool },
    DataLinked {
        provider_scene: SceneId,
        provider_data: DataSlotId,
        consumer_scene: SceneId,
        consumer_data: DataSlotId,
        result: EventResult,
    },
    DataUnlinked {
        consumer_scene: SceneId,
        consumer_data: DataSlotId,
        result: EventResult,
    },
    ObjectsPicked { scene: SceneId, pickable_ids: Vec<u32> },
}

/// User handler for renderer events; one method per event kind, all
/// defaulted to no-ops.
pub trait RendererEventHandler {
    /// A display finished creation.
    fn display_created(&mut self, _display: DisplayHandle, _result: EventResult) {}
    /// A display finished destruction.
    fn display_destroyed(&mut self, _display: DisplayHandle, _result: EventResult) {}
    /// An offscreen buffer finished creation.
    fn offscreen_buffer_created(
        &mut self,
        _display: DisplayHandle,
        _buffer: OffscreenBufferHandle,
        _result: EventResult,
    ) {
    }
    /// An offscreen buffer finished destruction.
    fn offscreen_buffer_destroyed(
        &mut self,
        _display: DisplayHandle,
        _buffer: OffscreenBufferHandle,
        _result: EventResult,
    ) {
    }
    /// A pixel readback finished.
    fn pixels_read(
        &mut self,
        _display: DisplayHandle,
        _buffer: OffscreenBufferHandle,
        _pixels: &[u8],
        _result: EventResult,
    ) {
    }
    /// A warping mesh update finished.
    fn warping_mesh_updated(&mut self, _display: DisplayHandle, _result: EventResult) {}
    /// The display window was closed.
    fn window_closed(&mut self, _display: DisplayHandle) {}
    /// A key event arrived on the display window.
    fn key_event(&mut self, _display: DisplayHandle, _event: KeyEvent) {}
    /// A mouse event arrived on the display window.
    fn mouse_event(&mut self, _display: DisplayHandle, _event: MouseEvent) {}
    /// The display window was resized.
    fn window_resized(&mut self, _display: DisplayHandle, _width: u32, _height: u32) {}
    /// The display window was moved.
    fn window_moved(&mut self, _display: DisplayHandle, _x: i32, _y: i32) {}
    /// Periodic loop-time statistics of a render thread.
    fn render_thread_loop_timings(&mut self, _maximum: Duration, _average: Duration) {}
}

/// User handler for scene control events; one method per event kind,
/// all defaulted to no-ops.
pub trait SceneControlEventHandler {
    /// A scene reached a new state.
    fn scene_state_changed(&mut self, _scene: SceneId, _state: RendererSceneState) {}
    /// A flush was applied.
    fn scene_flushed(&mut self, _scene: SceneId, _flush_index: u64) {}
    /// A scene's content expired.
    fn scene_expired(&mut self, _scene: SceneId) {}
    /// A previously expired scene recovered.
    fn scene_recovered_from_expiration(&mut self, _scene: SceneId) {}
    /// The renderer dropped a scene over its pending-flush limit.
    fn scene_forced_to_unsubscribe(&mut self, _scene: SceneId) {}
    /// An embedded-compositor stream became (un)available.
    fn stream_availability_changed(&mut self, _stream: WaylandIviSurfaceId, _available: bool) {}
    /// A data link attempt finished.
    fn data_linked(
        &mut self,
        _provider_scene: SceneId,
        _provider_data: DataSlotId,
        _consumer_scene: SceneId,
        _consumer_data: DataSlotId,
        _result: EventResult,
    ) {
    }
    /// A data unlink attempt finished.
    fn data_unlinked(
        &mut self,
        _consumer_scene: SceneId,
        _consumer_data: DataSlotId,
        _result: EventResult,
    ) {
    }
    /// A pick event hit pickable objects.
    fn objects_picked(&mut self, _scene: SceneId, _pickable_ids: &[u32]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_result_from_success() {
        assert_eq!(EventResult::from_success(true), EventResult::Ok);
        assert_eq!(EventResult::from_success(false), EventResult::Failed);
    }

    #[test]
    fn handlers_default_to_noops() {
        struct Silent;
        impl RendererEventHandler for Silent {}
        impl SceneControlEventHandler for Silent {}

        let mut handler = Silent;
        handler.display_created(DisplayHandle(1), EventResult::Ok);
        handler.scene_flushed(SceneId(1), 7);
    }
}
