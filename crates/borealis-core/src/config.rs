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

//! Configuration surface of the framework and the renderer.

use crate::error::RendererApiError;
use crate::handle::{WaylandIviLayerId, WaylandIviSurfaceId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Interactive shell attached to the framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShellType {
    /// No shell.
    None,
    /// Console shell on stdin/stdout.
    Console,
    /// Platform default.
    #[default]
    Default,
}

/// What a render loop iteration does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoopMode {
    /// Apply scene updates and render.
    #[default]
    UpdateAndRender,
    /// Apply scene updates only; nothing is drawn.
    UpdateOnly,
}

/// Per-frame section time budgets, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameTimerLimits {
    /// Budget for uploading scene-owned resources.
    pub scene_resources_upload_micros: u64,
    /// Budget for uploading client resources.
    pub resources_upload_micros: u64,
    /// Budget for rendering interruptible offscreen buffers.
    pub offscreen_buffer_render_micros: u64,
}

impl Default for FrameTimerLimits {
    fn default() -> Self {
        // effectively unlimited until the user opts in
        Self {
            scene_resources_upload_micros: u64::MAX,
            resources_upload_micros: u64::MAX,
            offscreen_buffer_render_micros: u64::MAX,
        }
    }
}

/// Limits for the deferred-flush queue of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFlushLimits {
    /// Queue length at which flushes are applied regardless of missing
    /// resources.
    pub force_apply: u32,
    /// Queue length at which the scene is forcibly unsubscribed.
    pub force_unsubscribe: u32,
}

impl Default for PendingFlushLimits {
    fn default() -> Self {
        Self {
            force_apply: 120,
            force_unsubscribe: 5 * 120,
        }
    }
}

/// Renderer-level configuration.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Enables the system compositor (IVI) control commands.
    pub system_compositor_enabled: bool,
    /// Initial loop mode.
    pub loop_mode: LoopMode,
    /// Maximum framerate of threaded rendering, frames per second. Must
    /// be positive.
    pub maximum_framerate: f32,
    /// Per-frame section budgets.
    pub frame_timer_limits: FrameTimerLimits,
    /// Deferred-flush limits.
    pub pending_flush_limits: PendingFlushLimits,
    /// Skip re-rendering buffers whose content did not change.
    pub skip_unmodified_buffers: bool,
    /// Period of the loop-time statistics event; zero disables it.
    pub loop_count_period: Duration,
    /// GPU resource cache budget in bytes; zero disables caching.
    pub gpu_cache_size: u64,
    /// Never evict effects from the GPU cache.
    ///
    /// When set and the byte budget is exceeded by effects alone, no
    /// effect is forcibly unloaded; effect residency is then unbounded.
    pub keep_effects: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            system_compositor_enabled: false,
            loop_mode: LoopMode::UpdateAndRender,
            maximum_framerate: 60.0,
            frame_timer_limits: FrameTimerLimits::default(),
            pending_flush_limits: PendingFlushLimits::default(),
            skip_unmodified_buffers: true,
            loop_count_period: Duration::ZERO,
            gpu_cache_size: 0,
            keep_effects: true,
        }
    }
}

/// Framework-level configuration (connectivity, logging, watchdog).
#[derive(Debug, Clone)]
pub struct FrameworkConfig {
    /// Shell attached to the process.
    pub shell_type: ShellType,
    /// Watchdog notification interval for the renderer thread.
    pub watchdog_interval_renderer: Duration,
    /// Watchdog notification interval for worker threads.
    pub watchdog_interval_workers: Duration,
    /// Do not register with the DLT daemon.
    pub disable_dlt_application_registration: bool,
    /// Four-character DLT application id.
    pub dlt_application_id: String,
    /// DLT application description.
    pub dlt_application_description: String,
    /// Emit periodic statistics logs.
    pub periodic_logs_enabled: bool,
    /// Local interface to bind for TCP transport.
    pub tcp_interface_ip: String,
    /// Daemon address for TCP transport.
    pub tcp_daemon_ip: String,
    /// Daemon port for TCP transport.
    pub tcp_daemon_port: u16,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            shell_type: ShellType::Default,
            watchdog_interval_renderer: Duration::from_millis(1000),
            watchdog_interval_workers: Duration::from_millis(1000),
            disable_dlt_application_registration: false,
            dlt_application_id: "BORE".into(),
            dlt_application_description: "Borealis renderer".into(),
            periodic_logs_enabled: true,
            tcp_interface_ip: "127.0.0.1".into(),
            tcp_daemon_ip: "127.0.0.1".into(),
            tcp_daemon_port: 5999,
        }
    }
}

/// Per-display configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Window x position.
    pub window_x: i32,
    /// Window y position.
    pub window_y: i32,
    /// Window width in pixels.
    pub window_width: u32,
    /// Window height in pixels.
    pub window_height: u32,
    /// MSAA sample count for the framebuffer.
    pub msaa_samples: u32,
    /// Framebuffer clear color.
    pub clear_color: [f32; 4],
    /// Enables warping of the final image.
    pub warping_enabled: bool,
    /// IVI surface to attach the window to, if any.
    pub ivi_surface: WaylandIviSurfaceId,
    /// IVI layer to attach the surface to, if any.
    pub ivi_layer: WaylandIviLayerId,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            window_x: 0,
            window_y: 0,
            window_width: 1280,
            window_height: 480,
            msaa_samples: 1,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            warping_enabled: false,
            ivi_surface: WaylandIviSurfaceId::INVALID,
            ivi_layer: WaylandIviLayerId::INVALID,
        }
    }
}

impl DisplayConfig {
    /// Checks the configuration for internal consistency.
    pub fn validate(&self) -> Result<(), RendererApiError> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(RendererApiError::InvalidArgument(
                "display window dimensions must be positive".into(),
            ));
        }
        if !self.msaa_samples.is_power_of_two() || self.msaa_samples > 16 {
            return Err(RendererApiError::InvalidArgument(
                "MSAA sample count must be a power of two not larger than 16".into(),
            ));
        }
        if self.ivi_layer.is_valid() && !self.ivi_surface.is_valid() {
            return Err(RendererApiError::InvalidArgument(
                "an IVI layer requires an IVI surface".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_display_config_is_valid() {
        assert!(DisplayConfig::default().validate().is_ok());
    }

    #[test]
    fn display_config_rejects_zero_window() {
        let cfg = DisplayConfig {
            window_width: 0,
            ..DisplayConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn display_config_rejects_odd_msaa() {
        let cfg = DisplayConfig {
            msaa_samples: 3,
            ..DisplayConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = DisplayConfig {
            msaa_samples: 32,
            ..DisplayConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn display_config_rejects_layer_without_surface() {
        let cfg = DisplayConfig {
            ivi_layer: WaylandIviLayerId(2),
            ..DisplayConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
