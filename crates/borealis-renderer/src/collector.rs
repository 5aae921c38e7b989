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

//! Collects events produced while executing commands and rendering.
//!
//! Renderer events and scene-control events travel in separate queues
//! so a handler interested in only one family never has to see the
//! other.

use borealis_core::event::{RendererEvent, SceneControlEvent};

/// Per-bundle event staging area.
#[derive(Debug, Default)]
pub struct EventCollector {
    renderer_events: Vec<RendererEvent>,
    scene_control_events: Vec<SceneControlEvent>,
}

impl EventCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a renderer event.
    pub fn push_renderer_event(&mut self, event: RendererEvent) {
        log::trace!("EventCollector renderer event: {event:?}");
        self.renderer_events.push(event);
    }

    /// Stages a scene-control event.
    pub fn push_scene_control_event(&mut self, event: SceneControlEvent) {
        log::trace!("EventCollector scene control event: {event:?}");
        self.scene_control_events.push(event);
    }

    /// Moves staged renderer events into `out`.
    pub fn drain_renderer_events(&mut self, out: &mut Vec<RendererEvent>) {
        out.append(&mut self.renderer_events);
    }

    /// Moves staged scene-control events into `out`.
    pub fn drain_scene_control_events(&mut self, out: &mut Vec<SceneControlEvent>) {
        out.append(&mut self.scene_control_events);
    }

    /// Whether anything is staged.
    pub fn is_empty(&self) -> bool {
        self.renderer_events.is_empty() && self.scene_control_events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use borealis_core::event::EventResult;
    use borealis_core::handle::{DisplayHandle, SceneId};

    #[test]
    fn families_stay_separate() {
        let mut collector = EventCollector::new();
        collector.push_renderer_event(RendererEvent::DisplayCreated {
            display: DisplayHandle(1),
            result: EventResult::Ok,
        });
        collector.push_scene_control_event(SceneControlEvent::SceneFlushed {
            scene: SceneId(5),
            flush_index: 1,
        });

        let mut renderer = Vec::new();
        let mut control = Vec::new();
        collector.drain_renderer_events(&mut renderer);
        collector.drain_scene_control_events(&mut control);

        assert_eq!(renderer.len(), 1);
        assert_eq!(control.len(), 1);
        assert!(collector.is_empty());
    }
}
