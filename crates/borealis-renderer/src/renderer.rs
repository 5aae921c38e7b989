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

//! The public renderer API.
//!
//! Validates arguments synchronously, allocates opaque ids from
//! per-renderer counters (zero stays invalid), queues commands locally
//! until [`Renderer::flush`], and translates collected events into the
//! user's handler. Invalid-argument, unknown-entity and precondition
//! failures are reported synchronously and the offending command is
//! never enqueued; everything asynchronous arrives as a paired event.

use crate::dispatcher::DisplayDispatcher;
use borealis_core::command::{
    RendererCommand, RendererLogTopic, RendererSceneState, SceneInfo, ScenePublicationMode,
    ShaderCacheRef, WarpingMeshData,
};
use borealis_core::config::{DisplayConfig, FrameTimerLimits, FrameworkConfig, LoopMode, RendererConfig};
use borealis_core::device::{PixelRect, Platform};
use borealis_core::error::RendererApiError;
use borealis_core::event::{
    RendererEvent, RendererEventHandler, SceneControlEvent, SceneControlEventHandler,
};
use borealis_core::handle::{
    DataSlotId, DisplayBufferId, DisplayHandle, DisplayId, OffscreenBufferHandle, SceneId,
    StreamBufferHandle, StreamBufferId, WaylandIviLayerId, WaylandIviSurfaceId,
};
use borealis_core::shader_cache::BinaryShaderCache;
use std::collections::HashMap;
use std::sync::Arc;

const MAX_OFFSCREEN_BUFFER_DIM: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThreadingMode {
    Undefined,
    UsingDoOneLoop,
    OwnThread,
}

/// The renderer instance owned by the user.
pub struct Renderer {
    dispatcher: DisplayDispatcher,
    pending_commands: Vec<RendererCommand>,
    binary_shader_cache: Option<Arc<dyn BinaryShaderCache>>,
    system_compositor_enabled: bool,
    loop_mode: LoopMode,
    threading_mode: ThreadingMode,
    next_display_id: u32,
    next_display_buffer_id: u32,
    next_stream_buffer_id: u32,
    display_framebuffers: HashMap<DisplayId, DisplayBufferId>,
    scene_mappings: HashMap<SceneId, DisplayId>,
    last_error: Option<String>,
    temp_renderer_events: Vec<RendererEvent>,
    temp_scene_events: Vec<SceneControlEvent>,
}

impl Renderer {
    /// Creates a renderer over a backend platform.
    pub fn new(
        platform: Arc<dyn Platform>,
        framework_config: &FrameworkConfig,
        config: RendererConfig,
        binary_shader_cache: Option<Arc<dyn BinaryShaderCache>>,
    ) -> Self {
        let system_compositor_enabled = config.system_compositor_enabled;
        let loop_mode = config.loop_mode;
        let dispatcher = DisplayDispatcher::new(
            platform,
            config,
            framework_config.watchdog_interval_renderer,
            None,
        );
        Self {
            dispatcher,
            pending_commands: Vec::new(),
            binary_shader_cache,
            system_compositor_enabled,
            loop_mode,
            threading_mode: ThreadingMode::Undefined,
            next_display_id: 1,
            next_display_buffer_id: 1,
            next_stream_buffer_id: 1,
            display_framebuffers: HashMap::new(),
            scene_mappings: HashMap::new(),
            last_error: None,
            temp_renderer_events: Vec::new(),
            temp_scene_events: Vec::new(),
        }
    }

    /// The last synchronously reported error message, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Installs a watchdog callback notified from every render thread.
    ///
    /// Takes effect for threads started after the call.
    pub fn set_watchdog_callback(
        &mut self,
        callback: Option<std::sync::Arc<dyn borealis_core::watchdog::WatchdogCallback>>,
    ) {
        self.dispatcher.set_watchdog_callback(callback);
    }

    fn error(&mut self, err: RendererApiError) -> RendererApiError {
        log::error!("Renderer: {err}");
        self.last_error = Some(err.to_string());
        err
    }

    // --- displays & buffers ---

    /// Creates a display; returns the invalid id if the configuration
    /// does not validate.
    pub fn create_display(&mut self, config: &DisplayConfig) -> DisplayId {
        if let Err(e) = config.validate() {
            self.error(e);
            return DisplayId::INVALID;
        }

        let display = DisplayId(self.next_display_id);
        self.next_display_id += 1;
        // the display framebuffer counts as a display buffer
        let framebuffer = DisplayBufferId(self.next_display_buffer_id);
        self.next_display_buffer_id += 1;
        self.display_framebuffers.insert(display, framebuffer);

        self.pending_commands.push(RendererCommand::CreateDisplay {
            display: DisplayHandle(display.0),
            config: config.clone(),
            binary_shader_cache: self
                .binary_shader_cache
                .as_ref()
                .map(|c| ShaderCacheRef(c.clone())),
        });
        display
    }

    /// Destroys a display.
    pub fn destroy_display(&mut self, display: DisplayId) -> Result<(), RendererApiError> {
        if self.display_framebuffers.remove(&display).is_none() {
            return Err(self.error(RendererApiError::UnknownEntity(format!(
                "cannot destroy unknown display {display}"
            ))));
        }
        self.pending_commands.push(RendererCommand::DestroyDisplay {
            display: DisplayHandle(display.0),
        });
        Ok(())
    }

    /// The display buffer id of a display's framebuffer.
    pub fn get_display_framebuffer(
        &mut self,
        display: DisplayId,
    ) -> Result<DisplayBufferId, RendererApiError> {
        match self.display_framebuffers.get(&display) {
            Some(framebuffer) => Ok(*framebuffer),
            None => Err(self.error(RendererApiError::UnknownEntity(format!(
                "there is no display with id {display}"
            )))),
        }
    }

    /// Creates an offscreen buffer; dimensions must lie in `[1, 4096]`.
    ///
    /// Returns the invalid id on bad arguments without producing any
    /// asynchronous event.
    pub fn create_offscreen_buffer(
        &mut self,
        display: DisplayId,
        width: u32,
        height: u32,
        sample_count: u32,
        interruptible: bool,
    ) -> DisplayBufferId {
        if width < 1
            || width > MAX_OFFSCREEN_BUFFER_DIM
            || height < 1
            || height > MAX_OFFSCREEN_BUFFER_DIM
        {
            self.error(RendererApiError::InvalidArgument(format!(
                "offscreen buffer resolution must be above 0x0 and at most {MAX_OFFSCREEN_BUFFER_DIM}x{MAX_OFFSCREEN_BUFFER_DIM}, got {width}x{height}"
            )));
            return DisplayBufferId::INVALID;
        }
        if !self.display_framebuffers.contains_key(&display) {
            self.error(RendererApiError::UnknownEntity(format!(
                "cannot create offscreen buffer on unknown display {display}"
            )));
            return DisplayBufferId::INVALID;
        }

        let buffer = DisplayBufferId(self.next_display_buffer_id);
        self.next_display_buffer_id += 1;
        self.pending_commands
            .push(RendererCommand::CreateOffscreenBuffer {
                display: DisplayHandle(display.0),
                buffer: OffscreenBufferHandle(buffer.0),
                width,
                height,
                sample_count,
                interruptible,
            });
        buffer
    }

    /// Destroys an offscreen buffer.
    pub fn destroy_offscreen_buffer(
        &mut self,
        display: DisplayId,
        buffer: DisplayBufferId,
    ) -> Result<(), RendererApiError> {
        self.pending_commands
            .push(RendererCommand::DestroyOffscreenBuffer {
                display: DisplayHandle(display.0),
                buffer: OffscreenBufferHandle(buffer.0),
            });
        Ok(())
    }

    /// Creates a stream buffer fed by an embedded-compositor source.
    pub fn create_stream_buffer(
        &mut self,
        display: DisplayId,
        source: WaylandIviSurfaceId,
    ) -> StreamBufferId {
        let buffer = StreamBufferId(self.next_stream_buffer_id);
        self.next_stream_buffer_id += 1;
        self.pending_commands
            .push(RendererCommand::CreateStreamBuffer {
                display: DisplayHandle(display.0),
                buffer: StreamBufferHandle(buffer.0),
                source,
            });
        buffer
    }

    /// Destroys a stream buffer.
    pub fn destroy_stream_buffer(
        &mut self,
        display: DisplayId,
        buffer: StreamBufferId,
    ) -> Result<(), RendererApiError> {
        self.pending_commands
            .push(RendererCommand::DestroyStreamBuffer {
                display: DisplayHandle(display.0),
                buffer: StreamBufferHandle(buffer.0),
            });
        Ok(())
    }

    /// Enables or disables a stream buffer.
    pub fn set_stream_buffer_state(
        &mut self,
        display: DisplayId,
        buffer: StreamBufferId,
        enabled: bool,
    ) -> Result<(), RendererApiError> {
        self.pending_commands
            .push(RendererCommand::SetStreamBufferState {
                display: DisplayHandle(display.0),
                buffer: StreamBufferHandle(buffer.0),
                enabled,
            });
        Ok(())
    }

    /// Sets the clear color of a display buffer.
    pub fn set_display_buffer_clear_color(
        &mut self,
        display: DisplayId,
        buffer: DisplayBufferId,
        color: [f32; 4],
    ) -> Result<(), RendererApiError> {
        let framebuffer = self.get_display_framebuffer(display)?;
        // the framebuffer travels as the invalid offscreen handle
        let internal = if buffer == framebuffer {
            OffscreenBufferHandle::INVALID
        } else {
            OffscreenBufferHandle(buffer.0)
        };
        self.pending_commands.push(RendererCommand::SetClearColor {
            display: DisplayHandle(display.0),
            buffer: internal,
            color,
        });
        Ok(())
    }

    /// Requests an asynchronous pixel readback.
    pub fn read_pixels(
        &mut self,
        display: DisplayId,
        buffer: DisplayBufferId,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<(), RendererApiError> {
        if width == 0 || height == 0 {
            return Err(self.error(RendererApiError::InvalidArgument(
                "read pixels width and height must be greater than zero".into(),
            )));
        }
        let framebuffer = self.get_display_framebuffer(display)?;
        let internal = if buffer == framebuffer {
            OffscreenBufferHandle::INVALID
        } else {
            OffscreenBufferHandle(buffer.0)
        };
        self.pending_commands.push(RendererCommand::ReadPixels {
            display: DisplayHandle(display.0),
            buffer: internal,
            rect: PixelRect {
                x,
                y,
                width,
                height,
            },
            filename: None,
            send_via_dlt: false,
            full_screen: false,
        });
        Ok(())
    }

    /// Updates the warping mesh of a warping-enabled display.
    pub fn update_warping_mesh_data(
        &mut self,
        display: DisplayId,
        data: WarpingMeshData,
    ) -> Result<(), RendererApiError> {
        if data.indices.len() % 3 != 0 {
            return Err(self.error(RendererApiError::InvalidArgument(
                "warping indices must form a triangle list (multiple of 3)".into(),
            )));
        }
        if data.vertex_positions.is_empty() || data.indices.is_empty() {
            return Err(self.error(RendererApiError::InvalidArgument(
                "warping mesh needs more than zero vertices and indices".into(),
            )));
        }
        if data.texture_coordinates.len() != data.vertex_positions.len() {
            return Err(self.error(RendererApiError::InvalidArgument(
                "warping mesh needs one texture coordinate per vertex".into(),
            )));
        }
        self.pending_commands
            .push(RendererCommand::UpdateWarpingData {
                display: DisplayHandle(display.0),
                data,
            });
        Ok(())
    }

    // --- scene ingress (transport-facing) ---

    /// Announces a published scene.
    pub fn publish_scene(&mut self, scene: SceneId, mode: ScenePublicationMode) {
        self.pending_commands
            .push(RendererCommand::ScenePublished { scene, mode });
    }

    /// Announces an unpublished scene.
    pub fn unpublish_scene(&mut self, scene: SceneId) {
        self.scene_mappings.remove(&scene);
        self.pending_commands
            .push(RendererCommand::SceneUnpublished { scene });
    }

    /// Delivers scene content announcement.
    pub fn receive_scene(&mut self, info: SceneInfo) {
        self.pending_commands.push(RendererCommand::ReceiveScene { info });
    }

    /// Delivers a serialized scene flush.
    pub fn send_scene_update(&mut self, scene: SceneId, update_data: Vec<u8>) {
        self.pending_commands
            .push(RendererCommand::UpdateScene { scene, update_data });
    }

    // --- scene control ---

    /// Requests a scene state; `Ready` and `Rendered` require a mapping.
    pub fn set_scene_state(
        &mut self,
        scene: SceneId,
        state: RendererSceneState,
    ) -> Result<(), RendererApiError> {
        if state >= RendererSceneState::Ready && !self.scene_mappings.contains_key(&scene) {
            return Err(self.error(RendererApiError::Precondition(format!(
                "cannot set {scene} to {state:?} without a scene mapping"
            ))));
        }
        self.pending_commands
            .push(RendererCommand::SetSceneState { scene, state });
        Ok(())
    }

    /// Maps a scene onto a display.
    pub fn set_scene_mapping(
        &mut self,
        scene: SceneId,
        display: DisplayId,
    ) -> Result<(), RendererApiError> {
        if !self.display_framebuffers.contains_key(&display) {
            return Err(self.error(RendererApiError::UnknownEntity(format!(
                "cannot map {scene} to unknown display {display}"
            ))));
        }
        self.scene_mappings.insert(scene, display);
        self.pending_commands.push(RendererCommand::SetSceneMapping {
            scene,
            display: DisplayHandle(display.0),
        });
        Ok(())
    }

    /// Assigns a scene to a display buffer with a render order.
    pub fn set_scene_display_buffer_assignment(
        &mut self,
        scene: SceneId,
        buffer: DisplayBufferId,
        render_order: i32,
    ) -> Result<(), RendererApiError> {
        let Some(display) = self.scene_mappings.get(&scene) else {
            return Err(self.error(RendererApiError::Precondition(format!(
                "cannot assign unmapped {scene} to a display buffer"
            ))));
        };
        let framebuffer = self.display_framebuffers[display];
        let internal = if buffer == framebuffer {
            OffscreenBufferHandle::INVALID
        } else {
            OffscreenBufferHandle(buffer.0)
        };
        self.pending_commands
            .push(RendererCommand::SetSceneDisplayBufferAssignment {
                scene,
                buffer: internal,
                render_order,
            });
        Ok(())
    }

    /// Links a provider scene's data to a consumer scene's slot.
    pub fn link_data(
        &mut self,
        provider_scene: SceneId,
        provider_data: DataSlotId,
        consumer_scene: SceneId,
        consumer_data: DataSlotId,
    ) {
        self.pending_commands.push(RendererCommand::LinkData {
            provider_scene,
            provider_data,
            consumer_scene,
            consumer_data,
        });
    }

    /// Links an offscreen buffer into a consumer scene's slot.
    pub fn link_offscreen_buffer(
        &mut self,
        buffer: DisplayBufferId,
        consumer_scene: SceneId,
        consumer_data: DataSlotId,
    ) {
        self.pending_commands
            .push(RendererCommand::LinkOffscreenBuffer {
                provider_buffer: OffscreenBufferHandle(buffer.0),
                consumer_scene,
                consumer_data,
            });
    }

    /// Links a stream buffer into a consumer scene's slot.
    pub fn link_stream_buffer(
        &mut self,
        buffer: StreamBufferId,
        consumer_scene: SceneId,
        consumer_data: DataSlotId,
    ) {
        self.pending_commands.push(RendererCommand::LinkStreamBuffer {
            provider_buffer: StreamBufferHandle(buffer.0),
            consumer_scene,
            consumer_data,
        });
    }

    /// Removes the link feeding a consumer slot.
    pub fn unlink_data(&mut self, consumer_scene: SceneId, consumer_data: DataSlotId) {
        self.pending_commands.push(RendererCommand::UnlinkData {
            consumer_scene,
            consumer_data,
        });
    }

    /// Performs a pick at normalized scene coordinates.
    pub fn handle_pick_event(&mut self, scene: SceneId, x: f32, y: f32) {
        self.pending_commands.push(RendererCommand::PickEvent {
            scene,
            coords_normalized: [x, y],
        });
    }

    // --- system compositor ---

    fn require_system_compositor(&mut self) -> Result<(), RendererApiError> {
        if self.system_compositor_enabled {
            Ok(())
        } else {
            Err(self.error(RendererApiError::Precondition(
                "system compositor was not enabled when creating the renderer".into(),
            )))
        }
    }

    /// Sets the visibility of an IVI surface.
    pub fn sc_set_ivi_surface_visibility(
        &mut self,
        surface: WaylandIviSurfaceId,
        visible: bool,
    ) -> Result<(), RendererApiError> {
        self.require_system_compositor()?;
        self.pending_commands
            .push(RendererCommand::SCSetIviSurfaceVisibility { surface, visible });
        Ok(())
    }

    /// Sets the opacity of an IVI surface.
    pub fn sc_set_ivi_surface_opacity(
        &mut self,
        surface: WaylandIviSurfaceId,
        opacity: f32,
    ) -> Result<(), RendererApiError> {
        self.require_system_compositor()?;
        self.pending_commands
            .push(RendererCommand::SCSetIviSurfaceOpacity { surface, opacity });
        Ok(())
    }

    /// Sets the destination rectangle of an IVI surface.
    pub fn sc_set_ivi_surface_rectangle(
        &mut self,
        surface: WaylandIviSurfaceId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<(), RendererApiError> {
        self.require_system_compositor()?;
        self.pending_commands
            .push(RendererCommand::SCSetIviSurfaceDestRectangle {
                surface,
                x,
                y,
                width,
                height,
            });
        Ok(())
    }

    /// Sets the visibility of an IVI layer.
    pub fn sc_set_ivi_layer_visibility(
        &mut self,
        layer: WaylandIviLayerId,
        visible: bool,
    ) -> Result<(), RendererApiError> {
        self.require_system_compositor()?;
        self.pending_commands
            .push(RendererCommand::SCSetIviLayerVisibility { layer, visible });
        Ok(())
    }

    /// Adds an IVI surface to an IVI layer.
    pub fn sc_add_ivi_surface_to_layer(
        &mut self,
        surface: WaylandIviSurfaceId,
        layer: WaylandIviLayerId,
    ) -> Result<(), RendererApiError> {
        self.require_system_compositor()?;
        self.pending_commands
            .push(RendererCommand::SCAddIviSurfaceToIviLayer { surface, layer });
        Ok(())
    }

    /// Takes a system-compositor screenshot.
    pub fn sc_take_screenshot(
        &mut self,
        filename: &str,
        screen: i32,
    ) -> Result<(), RendererApiError> {
        self.require_system_compositor()?;
        self.pending_commands.push(RendererCommand::SCScreenshot {
            screen,
            filename: filename.to_string(),
        });
        Ok(())
    }

    // --- limits, logging, misc ---

    /// Sets the per-frame section budgets.
    pub fn set_frame_timer_limits(&mut self, limits: FrameTimerLimits) {
        self.pending_commands
            .push(RendererCommand::SetLimitsFrameBudgets { limits });
    }

    /// Sets the pending-flush limits.
    pub fn set_pending_flush_limits(&mut self, force_apply: u32, force_unsubscribe: u32) {
        self.pending_commands
            .push(RendererCommand::SetLimitsFlushesForceApply { limit: force_apply });
        self.pending_commands
            .push(RendererCommand::SetLimitsFlushesForceUnsubscribe {
                limit: force_unsubscribe,
            });
    }

    /// Toggles skipping of unmodified buffers.
    pub fn set_skipping_of_unmodified_buffers(&mut self, enable: bool) {
        self.pending_commands
            .push(RendererCommand::SetSkippingOfUnmodifiedBuffers { enable });
    }

    /// Queues a statistics log.
    pub fn log_statistics(&mut self) {
        self.pending_commands.push(RendererCommand::LogStatistics);
    }

    /// Queues a renderer info log.
    pub fn log_renderer_info(&mut self) {
        self.pending_commands.push(RendererCommand::LogInfo {
            topic: RendererLogTopic::All,
            verbose: true,
            node_filter: None,
        });
    }

    /// Echoes a confirmation through the renderer log.
    pub fn confirmation_echo(&mut self, text: &str) {
        self.pending_commands.push(RendererCommand::ConfirmationEcho {
            text: text.to_string(),
        });
    }

    /// Commands queued but not yet flushed, for inspection.
    pub fn pending_command_count(&self) -> usize {
        self.pending_commands.len()
    }

    /// Submits all queued commands to the dispatcher.
    pub fn flush(&mut self) {
        let commands = std::mem::take(&mut self.pending_commands);
        self.dispatcher.dispatch(commands);
    }

    // --- loop control ---

    /// Runs one loop of every display on the calling thread.
    pub fn do_one_loop(&mut self) -> Result<(), RendererApiError> {
        if self.threading_mode == ThreadingMode::OwnThread {
            return Err(self.error(RendererApiError::Precondition(
                "cannot call do_one_loop when the renderer runs in its own thread".into(),
            )));
        }
        self.threading_mode = ThreadingMode::UsingDoOneLoop;
        self.dispatcher.do_one_loop(self.loop_mode);
        Ok(())
    }

    /// Starts per-display render threads.
    pub fn start_thread(&mut self) -> Result<(), RendererApiError> {
        if self.threading_mode == ThreadingMode::UsingDoOneLoop {
            return Err(self.error(RendererApiError::Precondition(
                "cannot start the render thread after do_one_loop was used".into(),
            )));
        }
        self.threading_mode = ThreadingMode::OwnThread;
        if self.dispatcher.start_threads() {
            Ok(())
        } else {
            Err(self.error(RendererApiError::Precondition(
                "render threads are already running".into(),
            )))
        }
    }

    /// Stops the render threads.
    pub fn stop_thread(&mut self) -> Result<(), RendererApiError> {
        if self.threading_mode != ThreadingMode::OwnThread {
            return Err(self.error(RendererApiError::Precondition(
                "cannot stop the render thread, start_thread was never called".into(),
            )));
        }
        if self.dispatcher.stop_threads() {
            Ok(())
        } else {
            Err(self.error(RendererApiError::Precondition(
                "render threads are not running".into(),
            )))
        }
    }

    /// Whether render threads are running.
    pub fn is_thread_running(&self) -> bool {
        self.dispatcher.is_threaded()
    }

    /// Caps the render thread framerate.
    pub fn set_maximum_framerate(&mut self, framerate: f32) -> Result<(), RendererApiError> {
        if framerate <= 0.0 {
            return Err(self.error(RendererApiError::InvalidArgument(
                "maximum framerate must be positive".into(),
            )));
        }
        if self.threading_mode == ThreadingMode::UsingDoOneLoop {
            return Err(self.error(RendererApiError::Precondition(
                "framerate control is only available for the render thread".into(),
            )));
        }
        self.dispatcher.set_maximum_framerate(framerate);
        Ok(())
    }

    /// Current framerate cap.
    pub fn maximum_framerate(&self) -> f32 {
        self.dispatcher.maximum_framerate()
    }

    /// Switches the loop mode.
    pub fn set_loop_mode(&mut self, loop_mode: LoopMode) {
        self.loop_mode = loop_mode;
        self.dispatcher.set_loop_mode(loop_mode);
    }

    // --- events ---

    /// Drains renderer events into the handler on the calling thread.
    pub fn dispatch_events(&mut self, handler: &mut dyn RendererEventHandler) {
        self.temp_renderer_events.clear();
        self.dispatcher
            .dispatch_renderer_events(&mut self.temp_renderer_events);

        for event in self.temp_renderer_events.drain(..) {
            match event {
                RendererEvent::DisplayCreated { display, result } => {
                    handler.display_created(display, result)
                }
                RendererEvent::DisplayDestroyed { display, result } => {
                    handler.display_destroyed(display, result)
                }
                RendererEvent::OffscreenBufferCreated {
                    display,
                    buffer,
                    result,
                } => handler.offscreen_buffer_created(display, buffer, result),
                RendererEvent::OffscreenBufferDestroyed {
                    display,
                    buffer,
                    result,
                } => handler.offscreen_buffer_destroyed(display, buffer, result),
                RendererEvent::ReadPixels {
                    display,
                    buffer,
                    pixels,
                    result,
                } => handler.pixels_read(display, buffer, &pixels, result),
                RendererEvent::WarpingDataUpdated { display, result } => {
                    handler.warping_mesh_updated(display, result)
                }
                RendererEvent::WindowClosed { display } => handler.window_closed(display),
                RendererEvent::WindowKeyEvent { display, event } => {
                    handler.key_event(display, event)
                }
                RendererEvent::WindowMouseEvent { display, event } => {
                    handler.mouse_event(display, event)
                }
                RendererEvent::WindowResized {
                    display,
                    width,
                    height,
                } => handler.window_resized(display, width, height),
                RendererEvent::WindowMoved { display, x, y } => {
                    handler.window_moved(display, x, y)
                }
                RendererEvent::RenderThreadPeriodicLoopTimes {
                    maximum, average, ..
                } => handler.render_thread_loop_timings(maximum, average),
            }
        }
    }

    /// Drains scene-control events into the handler.
    pub fn dispatch_scene_control_events(&mut self, handler: &mut dyn SceneControlEventHandler) {
        self.temp_scene_events.clear();
        self.dispatcher
            .dispatch_scene_control_events(&mut self.temp_scene_events);

        for event in self.temp_scene_events.drain(..) {
            match event {
                SceneControlEvent::SceneStateChanged { scene, state } => {
                    handler.scene_state_changed(scene, state)
                }
                SceneControlEvent::SceneFlushed { scene, flush_index } => {
                    handler.scene_flushed(scene, flush_index)
                }
                SceneControlEvent::SceneExpired { scene } => handler.scene_expired(scene),
                SceneControlEvent::SceneRecoveredFromExpiration { scene } => {
                    handler.scene_recovered_from_expiration(scene)
                }
                SceneControlEvent::SceneForcedToUnsubscribe { scene } => {
                    handler.scene_forced_to_unsubscribe(scene)
                }
                SceneControlEvent::StreamAvailabilityChanged { stream, available } => {
                    handler.stream_availability_changed(stream, available)
                }
                SceneControlEvent::DataLinked {
                    provider_scene,
                    provider_data,
                    consumer_scene,
                    consumer_data,
                    result,
                } => handler.data_linked(
                    provider_scene,
                    provider_data,
                    consumer_scene,
                    consumer_data,
                    result,
                ),
                SceneControlEvent::DataUnlinked {
                    consumer_scene,
                    consumer_data,
                    result,
                } => handler.data_unlinked(consumer_scene, consumer_data, result),
                SceneControlEvent::ObjectsPicked {
                    scene,
                    pickable_ids,
                } => handler.objects_picked(scene, &pickable_ids),
            }
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.dispatcher.destroy();
    }
}
