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

//! Scene control logic.
//!
//! One state machine per scene reconciles the user's target state
//! (Available / Ready / Rendered) with the actual state, emitting
//! imperative sub-commands to the scene updater whenever they diverge.
//! Mapping is applied before show; unmapping happens only once hidden;
//! the last target wins.

use borealis_core::command::RendererSceneState;
use borealis_core::event::SceneControlEvent;
use borealis_core::handle::{DisplayHandle, OffscreenBufferHandle, SceneId};
use std::collections::HashMap;

/// Imperative sub-command for the scene updater.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneCommand {
    /// Request scene content from its publisher.
    Subscribe { scene: SceneId },
    /// Drop scene content.
    Unsubscribe { scene: SceneId },
    /// Map the scene onto a display.
    Map { scene: SceneId, display: DisplayHandle },
    /// Remove the scene from its display.
    Unmap { scene: SceneId },
    /// Start rendering the scene.
    Show { scene: SceneId },
    /// Stop rendering the scene.
    Hide { scene: SceneId },
    /// Assign the scene to a display buffer with a render order.
    SetBufferAssignment {
        scene: SceneId,
        buffer: OffscreenBufferHandle,
        render_order: i32,
    },
}

/// Confirmation events flowing from the updater into the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    /// The scene was published by a client.
    Published { scene: SceneId },
    /// The scene was unpublished by its client.
    Unpublished { scene: SceneId },
    /// Scene content arrived and the first flush was applied.
    Subscribed { scene: SceneId },
    /// Subscription could not be established.
    SubscribeFailed { scene: SceneId },
    /// Scene content was dropped; `forced` when the renderer dropped it
    /// over the pending-flush limit.
    Unsubscribed { scene: SceneId, forced: bool },
    /// The scene is mapped and its resources are uploaded.
    Mapped { scene: SceneId },
    /// Mapping failed.
    MapFailed { scene: SceneId },
    /// The scene left its display.
    Unmapped { scene: SceneId },
    /// The scene is being rendered.
    Shown { scene: SceneId },
    /// Showing failed.
    ShowFailed { scene: SceneId },
    /// The scene is no longer rendered.
    Hidden { scene: SceneId },
}

impl SceneEvent {
    fn scene(&self) -> SceneId {
        match *self {
            SceneEvent::Published { scene }
            | SceneEvent::Unpublished { scene }
            | SceneEvent::Subscribed { scene }
            | SceneEvent::SubscribeFailed { scene }
            | SceneEvent::Unsubscribed { scene, .. }
            | SceneEvent::Mapped { scene }
            | SceneEvent::MapFailed { scene }
            | SceneEvent::Unmapped { scene }
            | SceneEvent::Shown { scene }
            | SceneEvent::ShowFailed { scene }
            | SceneEvent::Hidden { scene } => scene,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InternalState {
    Unpublished,
    Published,
    SubscriptionRequested,
    Subscribed,
    MapRequested,
    MappedAndAssigned,
    ShowRequested,
    Rendered,
    HideRequested,
    UnmapRequested,
    UnsubscribeRequested,
}

impl InternalState {
    fn public_state(self) -> RendererSceneState {
        use InternalState::*;
        match self {
            Unpublished => RendererSceneState::Unavailable,
            Published | SubscriptionRequested | Subscribed | MapRequested
            | UnsubscribeRequested => RendererSceneState::Available,
            MappedAndAssigned | ShowRequested | HideRequested | UnmapRequested => {
                RendererSceneState::Ready
            }
            Rendered => RendererSceneState::Rendered,
        }
    }
}

#[derive(Debug)]
struct SceneRecord {
    internal: InternalState,
    target: RendererSceneState,
    mapping: Option<DisplayHandle>,
    buffer_assignment: Option<(OffscreenBufferHandle, i32)>,
    reported: RendererSceneState,
}

impl SceneRecord {
    fn new() -> Self {
        Self {
            internal: InternalState::Unpublished,
            target: RendererSceneState::Available,
            mapping: None,
            buffer_assignment: None,
            reported: RendererSceneState::Unavailable,
        }
    }
}

/// Per-bundle scene control logic.
#[derive(Debug, Default)]
pub struct SceneControlLogic {
    scenes: HashMap<SceneId, SceneRecord>,
    commands_out: Vec<SceneCommand>,
    events_out: Vec<SceneControlEvent>,
}

impl SceneControlLogic {
    /// Creates empty control logic.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the user's target state for a scene.
    pub fn set_scene_state(&mut self, scene: SceneId, target: RendererSceneState) {
        let record = self.scenes.entry(scene).or_insert_with(SceneRecord::new);
        if record.target == target {
            // re-issuing the current target produces no new commands
            return;
        }
        if target >= RendererSceneState::Ready && record.mapping.is_none() {
            log::error!(
                "SceneControlLogic cannot target {target:?} for {scene}: no mapping set"
            );
            return;
        }
        record.target = target;
        self.reconcile(scene);
    }

    /// Sets the display a scene shall be mapped on.
    pub fn set_scene_mapping(&mut self, scene: SceneId, display: DisplayHandle) {
        let record = self.scenes.entry(scene).or_insert_with(SceneRecord::new);
        if matches!(
            record.internal,
            InternalState::MapRequested
                | InternalState::MappedAndAssigned
                | InternalState::ShowRequested
                | InternalState::Rendered
        ) {
            log::error!(
                "SceneControlLogic cannot change mapping of {scene} while mapped or shown"
            );
            return;
        }
        record.mapping = Some(display);
        self.reconcile(scene);
    }

    /// Assigns the scene to a display buffer with a render order.
    pub fn set_scene_display_buffer_assignment(
        &mut self,
        scene: SceneId,
        buffer: OffscreenBufferHandle,
        render_order: i32,
    ) {
        let record = self.scenes.entry(scene).or_insert_with(SceneRecord::new);
        record.buffer_assignment = Some((buffer, render_order));
        if matches!(
            record.internal,
            InternalState::MappedAndAssigned | InternalState::ShowRequested | InternalState::Rendered
        ) {
            self.commands_out.push(SceneCommand::SetBufferAssignment {
                scene,
                buffer,
                render_order,
            });
        }
    }

    /// Feeds a confirmation event into the state machine.
    pub fn handle_scene_event(&mut self, event: SceneEvent) {
        use InternalState::*;
        let scene = event.scene();
        let record = self.scenes.entry(scene).or_insert_with(SceneRecord::new);

        match event {
            SceneEvent::Published { .. } => {
                if record.internal == Unpublished {
                    record.internal = Published;
                }
            }
            SceneEvent::Unpublished { .. } => {
                // target and mapping survive so a re-publish resumes
                record.internal = Unpublished;
            }
            SceneEvent::Subscribed { .. } => {
                if record.internal == SubscriptionRequested {
                    record.internal = Subscribed;
                }
            }
            SceneEvent::SubscribeFailed { .. } => {
                if record.internal == SubscriptionRequested {
                    log::error!("SceneControlLogic subscription failed for {scene}");
                    record.internal = Published;
                }
            }
            SceneEvent::Unsubscribed { forced, .. } => {
                record.internal = Published;
                if forced {
                    // prevent an immediate re-subscribe of a misbehaving scene
                    record.target = RendererSceneState::Available;
                }
            }
            SceneEvent::Mapped { .. } => {
                if record.internal == MapRequested {
                    record.internal = MappedAndAssigned;
                    if let Some((buffer, render_order)) = record.buffer_assignment {
                        self.commands_out.push(SceneCommand::SetBufferAssignment {
                            scene,
                            buffer,
                            render_order,
                        });
                    }
                }
            }
            SceneEvent::MapFailed { .. } => {
                if record.internal == MapRequested {
                    log::error!("SceneControlLogic mapping failed for {scene}");
                    record.internal = Subscribed;
                }
            }
            SceneEvent::Unmapped { .. } => {
                if matches!(record.internal, UnmapRequested | MappedAndAssigned) {
                    record.internal = Subscribed;
                }
            }
            SceneEvent::Shown { .. } => {
                if record.internal == ShowRequested {
                    record.internal = Rendered;
                }
            }
            SceneEvent::ShowFailed { .. } => {
                if record.internal == ShowRequested {
                    log::error!("SceneControlLogic show failed for {scene}");
                    record.internal = MappedAndAssigned;
                }
            }
            SceneEvent::Hidden { .. } => {
                if matches!(record.internal, HideRequested | Rendered) {
                    record.internal = MappedAndAssigned;
                }
            }
        }

        self.reconcile(scene);
    }

    /// Drains the sub-commands produced since the last call.
    pub fn take_commands(&mut self) -> Vec<SceneCommand> {
        std::mem::take(&mut self.commands_out)
    }

    /// Drains the user-facing state-change events.
    pub fn take_events(&mut self) -> Vec<SceneControlEvent> {
        std::mem::take(&mut self.events_out)
    }

    /// Current public state of a scene.
    pub fn scene_state(&self, scene: SceneId) -> RendererSceneState {
        self.scenes
            .get(&scene)
            .map_or(RendererSceneState::Unavailable, |r| r.internal.public_state())
    }

    /// Drives one scene towards its target, emitting at most one
    /// command per call; progress continues as confirmations arrive.
    fn reconcile(&mut self, scene: SceneId) {
        use InternalState::*;
        let Some(record) = self.scenes.get_mut(&scene) else { return };

        match record.target {
            RendererSceneState::Ready | RendererSceneState::Rendered => match record.internal {
                Published => {
                    record.internal = SubscriptionRequested;
                    self.commands_out.push(SceneCommand::Subscribe { scene });
                }
                Subscribed => {
                    if let Some(display) = record.mapping {
                        record.internal = MapRequested;
                        self.commands_out.push(SceneCommand::Map { scene, display });
                    }
                }
                MappedAndAssigned => {
                    if record.target == RendererSceneState::Rendered {
                        record.internal = ShowRequested;
                        self.commands_out.push(SceneCommand::Show { scene });
                    }
                }
                Rendered => {
                    if record.target == RendererSceneState::Ready {
                        record.internal = HideRequested;
                        self.commands_out.push(SceneCommand::Hide { scene });
                    }
                }
                _ => {} // a request is in flight
            },
            RendererSceneState::Available | RendererSceneState::Unavailable => {
                match record.internal {
                    Rendered => {
                        record.internal = HideRequested;
                        self.commands_out.push(SceneCommand::Hide { scene });
                    }
                    MappedAndAssigned => {
                        // never unmap a scene that is still shown
                        record.internal = UnmapRequested;
                        self.commands_out.push(SceneCommand::Unmap { scene });
                    }
                    Subscribed => {
                        record.internal = UnsubscribeRequested;
                        self.commands_out.push(SceneCommand::Unsubscribe { scene });
                    }
                    _ => {}
                }
            }
        }

        let public = record.internal.public_state();
        if public != record.reported {
            record.reported = public;
            self.events_out.push(SceneControlEvent::SceneStateChanged {
                scene,
                state: public,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: SceneId = SceneId(10);
    const DISPLAY: DisplayHandle = DisplayHandle(1);

    fn reported_states(logic: &mut SceneControlLogic) -> Vec<RendererSceneState> {
        logic
            .take_events()
            .into_iter()
            .filter_map(|e| match e {
                SceneControlEvent::SceneStateChanged { state, .. } => Some(state),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn full_ramp_up_to_rendered() {
        let mut logic = SceneControlLogic::new();
        logic.set_scene_mapping(SCENE, DISPLAY);
        logic.set_scene_state(SCENE, RendererSceneState::Rendered);
        logic.handle_scene_event(SceneEvent::Published { scene: SCENE });
        assert_eq!(
            logic.take_commands(),
            vec![SceneCommand::Subscribe { scene: SCENE }]
        );

        logic.handle_scene_event(SceneEvent::Subscribed { scene: SCENE });
        assert_eq!(
            logic.take_commands(),
            vec![SceneCommand::Map {
                scene: SCENE,
                display: DISPLAY
            }]
        );

        logic.handle_scene_event(SceneEvent::Mapped { scene: SCENE });
        assert_eq!(
            logic.take_commands(),
            vec![SceneCommand::Show { scene: SCENE }]
        );

        logic.handle_scene_event(SceneEvent::Shown { scene: SCENE });
        assert!(logic.take_commands().is_empty());
        assert_eq!(logic.scene_state(SCENE), RendererSceneState::Rendered);
    }

    #[test]
    fn repeating_a_target_is_idempotent() {
        let mut logic = SceneControlLogic::new();
        logic.set_scene_mapping(SCENE, DISPLAY);
        logic.handle_scene_event(SceneEvent::Published { scene: SCENE });
        logic.set_scene_state(SCENE, RendererSceneState::Ready);
        let first = logic.take_commands();
        assert!(!first.is_empty());
        logic.take_events();

        logic.set_scene_state(SCENE, RendererSceneState::Ready);
        assert!(logic.take_commands().is_empty());
        assert!(logic.take_events().is_empty());
    }

    #[test]
    fn ramp_down_unmaps_only_when_hidden() {
        let mut logic = SceneControlLogic::new();
        logic.set_scene_mapping(SCENE, DISPLAY);
        logic.set_scene_state(SCENE, RendererSceneState::Rendered);
        logic.handle_scene_event(SceneEvent::Published { scene: SCENE });
        logic.handle_scene_event(SceneEvent::Subscribed { scene: SCENE });
        logic.handle_scene_event(SceneEvent::Mapped { scene: SCENE });
        logic.handle_scene_event(SceneEvent::Shown { scene: SCENE });
        logic.take_commands();

        logic.set_scene_state(SCENE, RendererSceneState::Available);
        assert_eq!(
            logic.take_commands(),
            vec![SceneCommand::Hide { scene: SCENE }]
        );

        logic.handle_scene_event(SceneEvent::Hidden { scene: SCENE });
        assert_eq!(
            logic.take_commands(),
            vec![SceneCommand::Unmap { scene: SCENE }]
        );

        logic.handle_scene_event(SceneEvent::Unmapped { scene: SCENE });
        assert_eq!(
            logic.take_commands(),
            vec![SceneCommand::Unsubscribe { scene: SCENE }]
        );

        logic.handle_scene_event(SceneEvent::Unsubscribed {
            scene: SCENE,
            forced: false,
        });
        assert!(logic.take_commands().is_empty());
        assert_eq!(logic.scene_state(SCENE), RendererSceneState::Available);
    }

    #[test]
    fn last_target_wins_mid_flight() {
        let mut logic = SceneControlLogic::new();
        logic.set_scene_mapping(SCENE, DISPLAY);
        logic.set_scene_state(SCENE, RendererSceneState::Rendered);
        logic.handle_scene_event(SceneEvent::Published { scene: SCENE });
        logic.take_commands(); // Subscribe issued

        // change of mind before subscription confirms
        logic.set_scene_state(SCENE, RendererSceneState::Available);

        logic.handle_scene_event(SceneEvent::Subscribed { scene: SCENE });
        assert_eq!(
            logic.take_commands(),
            vec![SceneCommand::Unsubscribe { scene: SCENE }]
        );
    }

    #[test]
    fn ready_target_without_mapping_is_rejected() {
        let mut logic = SceneControlLogic::new();
        logic.handle_scene_event(SceneEvent::Published { scene: SCENE });
        logic.take_events();
        logic.set_scene_state(SCENE, RendererSceneState::Ready);
        assert!(logic.take_commands().is_empty());
    }

    #[test]
    fn forced_unsubscribe_resets_target() {
        let mut logic = SceneControlLogic::new();
        logic.set_scene_mapping(SCENE, DISPLAY);
        logic.set_scene_state(SCENE, RendererSceneState::Rendered);
        logic.handle_scene_event(SceneEvent::Published { scene: SCENE });
        logic.handle_scene_event(SceneEvent::Subscribed { scene: SCENE });
        logic.take_commands();

        logic.handle_scene_event(SceneEvent::Unsubscribed {
            scene: SCENE,
            forced: true,
        });
        // no re-subscribe is attempted
        assert!(logic.take_commands().is_empty());
        assert_eq!(logic.scene_state(SCENE), RendererSceneState::Available);
    }

    #[test]
    fn state_changes_are_reported_once() {
        let mut logic = SceneControlLogic::new();
        logic.handle_scene_event(SceneEvent::Published { scene: SCENE });
        assert_eq!(
            reported_states(&mut logic),
            vec![RendererSceneState::Available]
        );
        // publishing again reports nothing new
        logic.handle_scene_event(SceneEvent::Published { scene: SCENE });
        assert!(reported_states(&mut logic).is_empty());
    }
}
