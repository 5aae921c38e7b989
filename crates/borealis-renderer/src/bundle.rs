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

//! The display bundle.
//!
//! One bundle per display aggregates the whole renderer core for that
//! display: frame timer, statistics, scene updater (with registry and
//! upload pipeline), scene control logic and command executor. Its GPU
//! context is touched only by the thread driving [`DisplayBundle::do_one_loop`];
//! command and event queues are the only cross-thread surfaces.

use crate::collector::EventCollector;
use crate::command_queue::RendererCommandBuffer;
use crate::control::{SceneCommand, SceneControlLogic};
use crate::executor::CommandExecutor;
use crate::stats::RendererStatistics;
use crate::updater::SceneUpdater;
use borealis_core::command::RendererCommand;
use borealis_core::config::{LoopMode, RendererConfig};
use borealis_core::device::Platform;
use borealis_core::event::{RendererEvent, SceneControlEvent};
use borealis_core::frame_timer::FrameTimer;
use borealis_core::handle::DisplayHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// scene control convergence is bounded; one hop per queued request plus
// slack for immediate confirmations
const MAX_CONTROL_ROUNDS: usize = 8;

struct BundleCore {
    frame_timer: FrameTimer,
    stats: RendererStatistics,
    updater: SceneUpdater,
    control: SceneControlLogic,
    collector: EventCollector,
    keep_effects: bool,
    gpu_cache_size: u64,
}

/// Per-display aggregate with its own command and event queues.
pub struct DisplayBundle {
    display: DisplayHandle,
    pending_commands: RendererCommandBuffer,
    events: Mutex<(Vec<RendererEvent>, Vec<SceneControlEvent>)>,
    core: Mutex<BundleCore>,
    destroyed: AtomicBool,
}

impl DisplayBundle {
    /// Creates a bundle for one display.
    pub fn new(display: DisplayHandle, platform: Arc<dyn Platform>, config: &RendererConfig) -> Self {
        let mut frame_timer = FrameTimer::new();
        frame_timer.set_limits(config.frame_timer_limits);

        let mut updater = SceneUpdater::new(display, platform);
        updater.set_limit_flushes_force_apply(config.pending_flush_limits.force_apply);
        updater.set_limit_flushes_force_unsubscribe(config.pending_flush_limits.force_unsubscribe);
        updater.set_skipping_of_unmodified_buffers(config.skip_unmodified_buffers);

        Self {
            display,
            pending_commands: RendererCommandBuffer::new(),
            events: Mutex::new((Vec::new(), Vec::new())),
            core: Mutex::new(BundleCore {
                frame_timer,
                stats: RendererStatistics::new(),
                updater,
                control: SceneControlLogic::new(),
                collector: EventCollector::new(),
                keep_effects: config.keep_effects,
                gpu_cache_size: config.gpu_cache_size,
            }),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Whether the owned display has been destroyed; the dispatcher
    /// drops the bundle once its events are drained.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// The display this bundle owns.
    pub fn display(&self) -> DisplayHandle {
        self.display
    }

    /// Enqueues commands for this bundle, draining `cmds`.
    pub fn push_and_consume_commands(&self, cmds: &mut Vec<RendererCommand>) {
        self.pending_commands.push_and_consume(cmds);
    }

    /// Runs one loop iteration: execute commands, update, render,
    /// collect events.
    pub fn do_one_loop(&self, loop_mode: LoopMode, sleep_time: Duration) {
        let started = Instant::now();
        let mut core = self.core.lock().unwrap();
        let core = &mut *core;
        core.frame_timer.start_frame();

        let mut commands = Vec::new();
        self.pending_commands.swap_commands(&mut commands);
        let saw_destroy = commands
            .iter()
            .any(|c| matches!(c, RendererCommand::DestroyDisplay { .. }));
        CommandExecutor {
            updater: &mut core.updater,
            control: &mut core.control,
            frame_timer: &mut core.frame_timer,
            stats: &mut core.stats,
            events: &mut core.collector,
            keep_effects: core.keep_effects,
            gpu_cache_size: core.gpu_cache_size,
        }
        .execute_pending_commands(commands);

        run_scene_control(core);
        core.updater.update(&core.frame_timer, &mut core.stats);
        // update work (uploads, applied flushes) can complete mappings
        run_scene_control(core);

        if loop_mode == LoopMode::UpdateAndRender {
            core.updater.render_frame(&core.frame_timer);
        }

        for event in core.control.take_events() {
            core.collector.push_scene_control_event(event);
        }
        core.updater.drain_events(&mut core.collector);

        core.stats.frame_finished(started.elapsed());
        log::trace!(
            "DisplayBundle {} loop finished (slept {:?})",
            self.display,
            sleep_time
        );

        if saw_destroy && !core.updater.has_display_context() {
            self.destroyed.store(true, Ordering::SeqCst);
        }

        let mut events = self.events.lock().unwrap();
        core.collector.drain_renderer_events(&mut events.0);
        core.collector.drain_scene_control_events(&mut events.1);
    }

    /// Moves collected renderer events into `out`.
    pub fn dispatch_renderer_events(&self, out: &mut Vec<RendererEvent>) {
        out.append(&mut self.events.lock().unwrap().0);
    }

    /// Moves collected scene-control events into `out`.
    pub fn dispatch_scene_control_events(&self, out: &mut Vec<SceneControlEvent>) {
        out.append(&mut self.events.lock().unwrap().1);
    }

    /// Pushes an externally produced renderer event (loop statistics).
    pub fn push_renderer_event(&self, event: RendererEvent) {
        self.events.lock().unwrap().0.push(event);
    }
}

/// Lets updater confirmations and control sub-commands ping-pong until
/// the machines settle for this iteration.
fn run_scene_control(core: &mut BundleCore) {
    for _ in 0..MAX_CONTROL_ROUNDS {
        let events = core.updater.take_scene_events();
        let mut idle = events.is_empty();
        for event in events {
            core.control.handle_scene_event(event);
        }

        let commands = core.control.take_commands();
        idle &= commands.is_empty();
        if idle {
            break;
        }
        for command in commands {
            apply_scene_command(&mut core.updater, command);
        }
    }
}

fn apply_scene_command(updater: &mut SceneUpdater, command: SceneCommand) {
    match command {
        SceneCommand::Subscribe { scene } => updater.handle_scene_subscription_request(scene),
        SceneCommand::Unsubscribe { scene } => {
            updater.handle_scene_unsubscribe_request(scene, false)
        }
        SceneCommand::Map { scene, display } => updater.handle_scene_map_request(scene, display),
        SceneCommand::Unmap { scene } => updater.handle_scene_unmap_request(scene),
        SceneCommand::Show { scene } => updater.handle_scene_show_request(scene),
        SceneCommand::Hide { scene } => updater.handle_scene_hide_request(scene),
        SceneCommand::SetBufferAssignment {
            scene,
            buffer,
            render_order,
        } => updater.handle_buffer_assignment(scene, buffer, render_order),
    }
}
