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

//! The display dispatcher.
//!
//! Routes drained commands to the owning display bundle, creates a
//! bundle (and, in threaded mode, its loop controller) on
//! `CreateDisplay`, and aggregates events from all bundles. Commands
//! tagged with a scene go to the display the scene is mapped on when
//! known, otherwise to every bundle; commands naming no display always
//! broadcast. Per-display command order is submission order; ordering
//! across displays is unspecified.

use crate::bundle::DisplayBundle;
use crate::loop_controller::LoopController;
use borealis_core::command::{CommandScope, RendererCommand};
use borealis_core::config::{LoopMode, RendererConfig};
use borealis_core::device::Platform;
use borealis_core::event::{RendererEvent, SceneControlEvent};
use borealis_core::handle::{DisplayHandle, SceneId};
use borealis_core::watchdog::WatchdogCallback;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

struct BundleEntry {
    bundle: Arc<DisplayBundle>,
    controller: Option<LoopController>,
}

/// Routes commands to display bundles and aggregates their events.
pub struct DisplayDispatcher {
    platform: Arc<dyn Platform>,
    config: RendererConfig,
    watchdog_interval: Duration,
    watchdog_callback: Option<Arc<dyn WatchdogCallback>>,
    // deterministic display iteration order
    bundles: BTreeMap<DisplayHandle, BundleEntry>,
    scene_ownership: HashMap<SceneId, DisplayHandle>,
    // scene commands arriving before any display exists
    stashed_commands: Vec<RendererCommand>,
    // events of bundles reaped before the user drained them
    orphan_renderer_events: Vec<RendererEvent>,
    orphan_scene_events: Vec<SceneControlEvent>,
    threaded: bool,
    loop_mode: LoopMode,
    maximum_framerate: f32,
}

impl DisplayDispatcher {
    /// Creates a dispatcher with no displays.
    pub fn new(
        platform: Arc<dyn Platform>,
        config: RendererConfig,
        watchdog_interval: Duration,
        watchdog_callback: Option<Arc<dyn WatchdogCallback>>,
    ) -> Self {
        let loop_mode = config.loop_mode;
        let maximum_framerate = config.maximum_framerate;
        Self {
            platform,
            config,
            watchdog_interval,
            watchdog_callback,
            bundles: BTreeMap::new(),
            scene_ownership: HashMap::new(),
            stashed_commands: Vec::new(),
            orphan_renderer_events: Vec::new(),
            orphan_scene_events: Vec::new(),
            threaded: false,
            loop_mode,
            maximum_framerate,
        }
    }

    /// Number of live display bundles.
    pub fn display_count(&self) -> usize {
        self.bundles.len()
    }

    /// Installs the watchdog callback used by loop threads spawned
    /// from now on.
    pub fn set_watchdog_callback(&mut self, callback: Option<Arc<dyn WatchdogCallback>>) {
        self.watchdog_callback = callback;
    }

    /// Routes a batch of commands.
    pub fn dispatch(&mut self, commands: Vec<RendererCommand>) {
        for cmd in commands {
            self.dispatch_one(cmd);
        }
    }

    fn dispatch_one(&mut self, cmd: RendererCommand) {
        // mapping commands teach the dispatcher scene ownership
        if let RendererCommand::SetSceneMapping { scene, display } = &cmd {
            self.scene_ownership.insert(*scene, *display);
        }
        if let RendererCommand::SceneUnpublished { scene } = &cmd {
            self.scene_ownership.remove(scene);
        }

        match cmd.scope() {
            CommandScope::Display(display) => {
                if let RendererCommand::CreateDisplay { .. } = &cmd {
                    self.ensure_bundle(display);
                }
                match self.bundles.get(&display) {
                    Some(entry) => push_one(&entry.bundle, cmd),
                    None => log::warn!(
                        "DisplayDispatcher dropping {} for unknown {display}",
                        cmd.name()
                    ),
                }
            }
            CommandScope::Scene(scene) => {
                if self.bundles.is_empty() {
                    log::debug!(
                        "DisplayDispatcher stashing {} until a display exists",
                        cmd.name()
                    );
                    self.stashed_commands.push(cmd);
                    return;
                }
                match self.scene_ownership.get(&scene).copied() {
                    Some(display) if self.bundles.contains_key(&display) => {
                        push_one(&self.bundles[&display].bundle, cmd);
                    }
                    _ => self.broadcast(cmd),
                }
            }
            CommandScope::Broadcast => self.broadcast(cmd),
        }
    }

    fn broadcast(&mut self, cmd: RendererCommand) {
        let mut remaining = self.bundles.len();
        for entry in self.bundles.values() {
            remaining -= 1;
            if remaining == 0 {
                push_one(&entry.bundle, cmd);
                break;
            }
            push_one(&entry.bundle, cmd.clone());
        }
    }

    fn ensure_bundle(&mut self, display: DisplayHandle) {
        if self.bundles.contains_key(&display) {
            return;
        }
        log::info!("DisplayDispatcher creating bundle for {display}");
        let bundle = Arc::new(DisplayBundle::new(
            display,
            self.platform.clone(),
            &self.config,
        ));

        // commands stashed while no display existed go to the first one
        if let Some(mut stashed) = (!self.stashed_commands.is_empty()).then(|| {
            std::mem::take(&mut self.stashed_commands)
        }) {
            bundle.push_and_consume_commands(&mut stashed);
        }

        let controller = self.threaded.then(|| self.spawn_controller(&bundle));
        self.bundles.insert(display, BundleEntry { bundle, controller });
    }

    fn spawn_controller(&self, bundle: &Arc<DisplayBundle>) -> LoopController {
        let mut controller = LoopController::new(
            bundle.clone(),
            self.maximum_framerate,
            self.loop_mode,
            self.config.loop_count_period,
            self.watchdog_interval,
            self.watchdog_callback.clone(),
        );
        controller.start_rendering();
        controller
    }

    /// Drives every bundle once on the calling thread.
    ///
    /// Only valid while not threaded; in threaded mode the loop
    /// controllers keep the bundles running.
    pub fn do_one_loop(&mut self, loop_mode: LoopMode) {
        debug_assert!(!self.threaded);
        for entry in self.bundles.values() {
            entry.bundle.do_one_loop(loop_mode, Duration::ZERO);
        }
        self.reap_destroyed_bundles();
    }

    /// Starts one loop controller per bundle.
    pub fn start_threads(&mut self) -> bool {
        if self.threaded {
            return false;
        }
        self.threaded = true;
        let handles: Vec<DisplayHandle> = self.bundles.keys().copied().collect();
        for display in handles {
            let bundle = self.bundles[&display].bundle.clone();
            let controller = self.spawn_controller(&bundle);
            self.bundles.get_mut(&display).unwrap().controller = Some(controller);
        }
        true
    }

    /// Stops all loop controllers.
    pub fn stop_threads(&mut self) -> bool {
        if !self.threaded {
            return false;
        }
        self.threaded = false;
        for entry in self.bundles.values_mut() {
            if let Some(mut controller) = entry.controller.take() {
                controller.stop_rendering();
            }
        }
        true
    }

    /// Whether loop controllers drive the bundles.
    pub fn is_threaded(&self) -> bool {
        self.threaded
    }

    /// Applies a framerate cap to all loop controllers.
    pub fn set_maximum_framerate(&mut self, framerate: f32) {
        self.maximum_framerate = framerate;
        for entry in self.bundles.values() {
            if let Some(controller) = &entry.controller {
                controller.set_maximum_framerate(framerate);
            }
        }
    }

    /// Current framerate cap.
    pub fn maximum_framerate(&self) -> f32 {
        self.maximum_framerate
    }

    /// Switches the loop mode everywhere.
    pub fn set_loop_mode(&mut self, loop_mode: LoopMode) {
        self.loop_mode = loop_mode;
        for entry in self.bundles.values() {
            if let Some(controller) = &entry.controller {
                controller.set_loop_mode(loop_mode);
            }
        }
    }

    /// Aggregates renderer events from all bundles.
    pub fn dispatch_renderer_events(&mut self, out: &mut Vec<RendererEvent>) {
        out.append(&mut self.orphan_renderer_events);
        for entry in self.bundles.values() {
            entry.bundle.dispatch_renderer_events(out);
        }
        self.reap_destroyed_bundles();
    }

    /// Aggregates scene-control events from all bundles.
    pub fn dispatch_scene_control_events(&mut self, out: &mut Vec<SceneControlEvent>) {
        out.append(&mut self.orphan_scene_events);
        for entry in self.bundles.values() {
            entry.bundle.dispatch_scene_control_events(out);
        }
    }

    /// Destroys every display, letting each loop thread release its own
    /// backend, and drops all bundles.
    pub fn destroy(&mut self) {
        let displays: Vec<DisplayHandle> = self.bundles.keys().copied().collect();
        for display in displays {
            let entry = self.bundles.get_mut(&display).unwrap();
            entry
                .bundle
                .push_and_consume_commands(&mut vec![RendererCommand::DestroyDisplay { display }]);
            match entry.controller.take() {
                Some(mut controller) => controller.destroy_renderer(),
                None => entry.bundle.do_one_loop(LoopMode::UpdateOnly, Duration::ZERO),
            }
        }
        self.bundles.clear();
        self.threaded = false;
    }

    fn reap_destroyed_bundles(&mut self) {
        let dead: Vec<DisplayHandle> = self
            .bundles
            .iter()
            .filter(|(_, e)| e.bundle.is_destroyed())
            .map(|(d, _)| *d)
            .collect();
        for display in dead {
            log::info!("DisplayDispatcher dropping bundle of destroyed {display}");
            let mut entry = self.bundles.remove(&display).unwrap();
            if let Some(mut controller) = entry.controller.take() {
                controller.stop_rendering();
            }
            entry
                .bundle
                .dispatch_renderer_events(&mut self.orphan_renderer_events);
            entry
                .bundle
                .dispatch_scene_control_events(&mut self.orphan_scene_events);
            self.scene_ownership.retain(|_, d| *d != display);
        }
    }
}

fn push_one(bundle: &Arc<DisplayBundle>, cmd: RendererCommand) {
    bundle.push_and_consume_commands(&mut vec![cmd]);
}
