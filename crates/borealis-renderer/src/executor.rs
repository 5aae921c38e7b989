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

//! The renderer command executor.
//!
//! Visits each drained command and applies it to the scene updater, the
//! scene control logic, the frame timer or the statistics. Commands
//! that produce paired events push them onto the bundle's collector.
//! `UpdateScene` is logged at debug level only to keep log volume
//! bounded.

use crate::collector::EventCollector;
use crate::control::SceneControlLogic;
use crate::stats::RendererStatistics;
use crate::updater::SceneUpdater;
use borealis_core::command::RendererCommand;
use borealis_core::event::{EventResult, RendererEvent};
use borealis_core::frame_timer::FrameTimer;

/// Executes a batch of drained commands on one display bundle.
///
/// Each command executes atomically with respect to other commands on
/// the same bundle; ordering within the batch is submission order.
pub struct CommandExecutor<'a> {
    /// Scene updater of the bundle.
    pub updater: &'a mut SceneUpdater,
    /// Scene control logic of the bundle.
    pub control: &'a mut SceneControlLogic,
    /// Frame timer of the bundle.
    pub frame_timer: &'a mut FrameTimer,
    /// Statistics of the bundle.
    pub stats: &'a mut RendererStatistics,
    /// Event collector of the bundle.
    pub events: &'a mut EventCollector,
    /// Cache/eviction configuration forwarded to new display contexts.
    pub keep_effects: bool,
    /// GPU byte budget forwarded to new display contexts.
    pub gpu_cache_size: u64,
}

impl CommandExecutor<'_> {
    /// Executes every command in the batch.
    pub fn execute_pending_commands(&mut self, commands: Vec<RendererCommand>) {
        let loggable = commands
            .iter()
            .filter(|c| !matches!(c, RendererCommand::UpdateScene { .. }))
            .count();
        if loggable > 0 {
            log::info!(
                "CommandExecutor executing {} commands, {loggable} will be logged, rest is scene-update commands",
                commands.len()
            );
        }

        for cmd in commands {
            self.execute(cmd);
        }
    }

    fn execute(&mut self, cmd: RendererCommand) {
        use RendererCommand::*;

        match &cmd {
            UpdateScene { scene, .. } => {
                log::debug!(" - executing UpdateScene for {scene}")
            }
            other => log::info!(" - executing {}", other.name()),
        }

        match cmd {
            ScenePublished { scene, mode } => self.updater.handle_scene_published(scene, mode),
            SceneUnpublished { scene } => self.updater.handle_scene_unpublished(scene),
            ReceiveScene { info } => self.updater.handle_scene_received(info),
            UpdateScene { scene, update_data } => {
                self.updater.handle_scene_update(scene, &update_data)
            }
            SetSceneState { scene, state } => self.control.set_scene_state(scene, state),
            SetSceneMapping { scene, display } => self.control.set_scene_mapping(scene, display),
            SetSceneDisplayBufferAssignment {
                scene,
                buffer,
                render_order,
            } => self
                .control
                .set_scene_display_buffer_assignment(scene, buffer, render_order),
            LinkData {
                provider_scene,
                provider_data,
                consumer_scene,
                consumer_data,
            } => self.updater.handle_scene_data_link_request(
                provider_scene,
                provider_data,
                consumer_scene,
                consumer_data,
            ),
            LinkOffscreenBuffer {
                provider_buffer,
                consumer_scene,
                consumer_data,
            } => self.updater.handle_buffer_to_scene_data_link_request(
                provider_buffer,
                consumer_scene,
                consumer_data,
            ),
            LinkStreamBuffer {
                provider_buffer,
                consumer_scene,
                consumer_data,
            } => self.updater.handle_stream_buffer_to_scene_data_link_request(
                provider_buffer,
                consumer_scene,
                consumer_data,
            ),
            UnlinkData {
                consumer_scene,
                consumer_data,
            } => self
                .updater
                .handle_data_unlink_request(consumer_scene, consumer_data),
            PickEvent {
                scene,
                coords_normalized,
            } => self.updater.handle_pick_event(scene, coords_normalized),
            CreateDisplay {
                config,
                binary_shader_cache,
                ..
            } => {
                self.updater.create_display_context(
                    config,
                    binary_shader_cache.map(|c| c.0),
                    self.keep_effects,
                    self.gpu_cache_size,
                );
            }
            DestroyDisplay { .. } => {
                self.updater.destroy_display_context();
            }
            CreateOffscreenBuffer {
                display,
                buffer,
                width,
                height,
                sample_count,
                interruptible,
            } => {
                let succeeded = self.updater.handle_buffer_create_request(
                    buffer,
                    display,
                    width,
                    height,
                    sample_count,
                    interruptible,
                );
                self.events
                    .push_renderer_event(RendererEvent::OffscreenBufferCreated {
                        display,
                        buffer,
                        result: EventResult::from_success(succeeded),
                    });
            }
            DestroyOffscreenBuffer { display, buffer } => {
                let succeeded = self.updater.handle_buffer_destroy_request(buffer, display);
                self.events
                    .push_renderer_event(RendererEvent::OffscreenBufferDestroyed {
                        display,
                        buffer,
                        result: EventResult::from_success(succeeded),
                    });
            }
            CreateStreamBuffer {
                display,
                buffer,
                source,
            } => self.updater.handle_stream_buffer_create(buffer, display, source),
            DestroyStreamBuffer { display, buffer } => {
                self.updater.handle_stream_buffer_destroy(buffer, display)
            }
            SetStreamBufferState {
                display,
                buffer,
                enabled,
            } => self.updater.set_stream_buffer_state(buffer, display, enabled),
            SetClearColor {
                display,
                buffer,
                color,
            } => self.updater.handle_set_clear_color(display, buffer, color),
            UpdateWarpingData { display, data } => {
                let succeeded =
                    display == self.updater.display && self.updater.set_warping_data(data);
                self.events
                    .push_renderer_event(RendererEvent::WarpingDataUpdated {
                        display,
                        result: EventResult::from_success(succeeded),
                    });
            }
            ReadPixels {
                display,
                buffer,
                rect,
                filename,
                send_via_dlt,
                full_screen,
            } => self.updater.handle_read_pixels(
                display,
                buffer,
                rect,
                full_screen,
                filename.as_deref(),
                send_via_dlt,
            ),
            SetSkippingOfUnmodifiedBuffers { enable } => {
                self.updater.set_skipping_of_unmodified_buffers(enable)
            }
            LogStatistics => self.stats.log_statistics(),
            LogInfo {
                topic,
                verbose,
                node_filter,
            } => self.updater.log_renderer_info(topic, verbose, node_filter),
            SCListIviSurfaces => {
                log::info!("SystemCompositor list IVI surfaces requested");
            }
            SCSetIviSurfaceVisibility { surface, visible } => {
                log::info!("SystemCompositor set visibility of {surface} to {visible}");
            }
            SCSetIviSurfaceOpacity { surface, opacity } => {
                log::info!("SystemCompositor set opacity of {surface} to {opacity}");
            }
            SCSetIviSurfaceDestRectangle {
                surface,
                x,
                y,
                width,
                height,
            } => {
                log::info!(
                    "SystemCompositor set rectangle of {surface} to ({x},{y} {width}x{height})"
                );
            }
            SCScreenshot { screen, filename } => {
                log::info!("SystemCompositor screenshot of screen {screen} to '{filename}'");
            }
            SCAddIviSurfaceToIviLayer { surface, layer } => {
                log::info!("SystemCompositor add {surface} to {layer}");
            }
            SCSetIviLayerVisibility { layer, visible } => {
                log::info!("SystemCompositor set visibility of {layer} to {visible}");
            }
            SCRemoveIviSurfaceFromIviLayer { surface, layer } => {
                log::info!("SystemCompositor remove {surface} from {layer}");
            }
            SCDestroyIviSurface { surface } => {
                log::info!("SystemCompositor destroy {surface}");
            }
            SetLimitsFrameBudgets { limits } => self.frame_timer.set_limits(limits),
            SetLimitsFlushesForceApply { limit } => {
                self.updater.set_limit_flushes_force_apply(limit)
            }
            SetLimitsFlushesForceUnsubscribe { limit } => {
                self.updater.set_limit_flushes_force_unsubscribe(limit)
            }
            ConfirmationEcho { text } => {
                log::info!("confirmation: {text}");
            }
        }
    }
}
