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

//! Full scene lifecycle through the public API: publication, ramp-up to
//! Rendered with real draws, ramp-down, pending-flush enforcement,
//! data linking, picking and stream availability.

use borealis_backend::HeadlessPlatform;
use borealis_core::command::{RendererSceneState, SceneInfo, ScenePublicationMode};
use borealis_core::config::{DisplayConfig, FrameworkConfig, PendingFlushLimits, RendererConfig};
use borealis_core::device::EffectSource;
use borealis_core::event::{EventResult, SceneControlEventHandler};
use borealis_core::handle::{
    CameraHandle, DataInstanceHandle, DataSlotId, DisplayHandle, DisplayId, MeshHandle,
    NodeHandle, PickableHandle, RenderPassHandle, SceneId, WaylandIviSurfaceId,
};
use borealis_core::resource::{ResourceBlob, ResourceContentHash, ResourceKind};
use borealis_core::scene::actions::{
    ProvidedResource, ResourceChanges, SceneAction, SceneUpdate,
};
use borealis_core::scene::{DataSlotKind, Frustum, Viewport};
use borealis_renderer::Renderer;
use std::sync::Arc;
use std::time::{Duration, Instant};

const SCENE: SceneId = SceneId(7);

#[derive(Default)]
struct ControlRecorder {
    states: Vec<(SceneId, RendererSceneState)>,
    flushed: Vec<u64>,
    forced_unsubscribes: Vec<SceneId>,
    links: Vec<EventResult>,
    picked: Vec<u32>,
    streams: Vec<(WaylandIviSurfaceId, bool)>,
}

impl ControlRecorder {
    fn current_state(&self, scene: SceneId) -> Option<RendererSceneState> {
        self.states
            .iter()
            .rev()
            .find(|(s, _)| *s == scene)
            .map(|(_, state)| *state)
    }
}

impl SceneControlEventHandler for ControlRecorder {
    fn scene_state_changed(&mut self, scene: SceneId, state: RendererSceneState) {
        self.states.push((scene, state));
    }
    fn scene_flushed(&mut self, _scene: SceneId, flush_index: u64) {
        self.flushed.push(flush_index);
    }
    fn scene_forced_to_unsubscribe(&mut self, scene: SceneId) {
        self.forced_unsubscribes.push(scene);
    }
    fn data_linked(
        &mut self,
        _provider_scene: SceneId,
        _provider_data: DataSlotId,
        _consumer_scene: SceneId,
        _consumer_data: DataSlotId,
        result: EventResult,
    ) {
        self.links.push(result);
    }
    fn objects_picked(&mut self, _scene: SceneId, pickable_ids: &[u32]) {
        self.picked.extend_from_slice(pickable_ids);
    }
    fn stream_availability_changed(&mut self, stream: WaylandIviSurfaceId, available: bool) {
        self.streams.push((stream, available));
    }
}

struct Env {
    platform: Arc<HeadlessPlatform>,
    renderer: Renderer,
    display: DisplayId,
    recorder: ControlRecorder,
}

impl Env {
    fn new(config: RendererConfig) -> Self {
        let platform = Arc::new(HeadlessPlatform::new());
        let mut renderer = Renderer::new(
            platform.clone(),
            &FrameworkConfig::default(),
            config,
            None,
        );
        let display = renderer.create_display(&DisplayConfig::default());
        assert!(display.is_valid());
        renderer.flush();
        renderer.do_one_loop().unwrap();
        Self {
            platform,
            renderer,
            display,
            recorder: ControlRecorder::default(),
        }
    }

    fn pump(&mut self) {
        self.renderer.flush();
        self.renderer.do_one_loop().unwrap();
        self.renderer
            .dispatch_scene_control_events(&mut self.recorder);
    }

    fn pump_until_state(&mut self, scene: SceneId, state: RendererSceneState) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.recorder.current_state(scene) != Some(state) {
            assert!(
                Instant::now() < deadline,
                "scene never reached {state:?}, saw {:?}",
                self.recorder.states
            );
            std::thread::sleep(Duration::from_millis(5));
            self.pump();
        }
    }

    fn start_scene(&mut self, first_update: SceneUpdate, target: RendererSceneState) {
        self.renderer.publish_scene(SCENE, ScenePublicationMode::LocalAndRemote);
        self.renderer.set_scene_mapping(SCENE, self.display).unwrap();
        self.renderer.set_scene_state(SCENE, target).unwrap();
        self.pump(); // control requests the subscription

        self.renderer.receive_scene(SceneInfo {
            scene: SCENE,
            friendly_name: "test scene".into(),
        });
        self.renderer.send_scene_update(SCENE, first_update.encode());
        self.pump();
    }
}

fn content_update(flush_index: u64) -> SceneUpdate {
    let effect = ResourceBlob::new(
        ResourceKind::Effect,
        EffectSource {
            name: format!("effect-{flush_index}"),
            vertex_source: "void main() {}".into(),
            fragment_source: "void main() {}".into(),
        }
        .encode(),
    );
    let vertices = ResourceBlob::new(ResourceKind::ArrayBuffer, vec![1; 36]);
    let indices = ResourceBlob::new(ResourceKind::IndexBuffer, vec![2; 6]);

    SceneUpdate {
        flush_index,
        actions: vec![
            SceneAction::AllocateNode {
                handle: NodeHandle(0),
                parent: None,
            },
            SceneAction::AllocateCamera {
                handle: CameraHandle(0),
                node: NodeHandle(0),
                viewport: Viewport {
                    x: 0,
                    y: 0,
                    width: 320,
                    height: 240,
                },
                frustum: Frustum {
                    left: -1.0,
                    right: 1.0,
                    bottom: -1.0,
                    top: 1.0,
                    near: 0.1,
                    far: 10.0,
                },
            },
            SceneAction::AllocateMesh {
                handle: MeshHandle(0),
                node: NodeHandle(0),
            },
            SceneAction::SetMeshEffect {
                mesh: MeshHandle(0),
                effect: effect.content_hash(),
            },
            SceneAction::SetMeshGeometry {
                mesh: MeshHandle(0),
                index_buffer: indices.content_hash(),
                vertex_buffers: vec![vertices.content_hash()],
                index_count: 3,
            },
            SceneAction::AllocateRenderPass {
                handle: RenderPassHandle(0),
                camera: CameraHandle(0),
                render_order: 0,
            },
            SceneAction::SetRenderPassMeshes {
                pass: RenderPassHandle(0),
                meshes: vec![MeshHandle(0)],
            },
            SceneAction::AllocateDataInstance {
                handle: DataInstanceHandle(0),
                values: vec![1.0, 2.0],
            },
            SceneAction::AllocateDataSlot {
                id: DataSlotId(1),
                kind: DataSlotKind::Consumer,
                data: DataInstanceHandle(0),
            },
            SceneAction::AllocatePickable {
                handle: PickableHandle(0),
                id: 77,
                rect: [0.0, 0.0, 0.5, 0.5],
            },
        ],
        resource_changes: ResourceChanges {
            added: vec![
                (effect.content_hash(), ResourceKind::Effect),
                (vertices.content_hash(), ResourceKind::ArrayBuffer),
                (indices.content_hash(), ResourceKind::IndexBuffer),
            ],
            removed: vec![],
        },
        provided_resources: vec![
            ProvidedResource::new(effect),
            ProvidedResource::new(vertices),
            ProvidedResource::new(indices),
        ],
        expiration_timestamp_ms: None,
    }
}

#[test]
fn scene_ramps_up_to_rendered_and_draws() {
    // keep redrawing unmodified buffers so draw calls stay observable
    let mut env = Env::new(RendererConfig {
        skip_unmodified_buffers: false,
        ..RendererConfig::default()
    });
    env.start_scene(content_update(1), RendererSceneState::Rendered);
    env.pump_until_state(SCENE, RendererSceneState::Rendered);

    // the ramp reported each public state exactly once, in order
    let states: Vec<_> = env
        .recorder
        .states
        .iter()
        .filter(|(s, _)| *s == SCENE)
        .map(|(_, state)| *state)
        .collect();
    assert_eq!(
        states,
        vec![
            RendererSceneState::Available,
            RendererSceneState::Ready,
            RendererSceneState::Rendered
        ]
    );
    assert_eq!(env.recorder.flushed, vec![1]);

    // the mesh is actually drawn once everything is resident
    let stats = env.platform.device_stats(DisplayHandle(1)).unwrap();
    let draws_before = stats.draws();
    env.pump();
    assert!(stats.draws() > draws_before);
}

#[test]
fn scene_ramps_down_unmapping_and_unsubscribing() {
    let mut env = Env::new(RendererConfig::default());
    env.start_scene(content_update(1), RendererSceneState::Rendered);
    env.pump_until_state(SCENE, RendererSceneState::Rendered);

    env.renderer
        .set_scene_state(SCENE, RendererSceneState::Available)
        .unwrap();
    env.pump_until_state(SCENE, RendererSceneState::Available);

    // ramping down passed through Ready (hidden) before Available
    let tail: Vec<_> = env
        .recorder
        .states
        .iter()
        .filter(|(s, _)| *s == SCENE)
        .map(|(_, state)| *state)
        .skip_while(|s| *s != RendererSceneState::Rendered)
        .collect();
    assert_eq!(
        tail,
        vec![
            RendererSceneState::Rendered,
            RendererSceneState::Ready,
            RendererSceneState::Available
        ]
    );
}

#[test]
fn missing_resources_defer_flushes_until_force_limits() {
    let mut env = Env::new(RendererConfig {
        pending_flush_limits: PendingFlushLimits {
            force_apply: 100, // keep force-apply out of the way
            force_unsubscribe: 3,
        },
        ..RendererConfig::default()
    });
    env.start_scene(content_update(1), RendererSceneState::Rendered);
    env.pump_until_state(SCENE, RendererSceneState::Rendered);
    let flushes_before = env.recorder.flushed.len();

    // updates referencing a payload that never arrives
    let ghost = ResourceContentHash { low: 99, high: 1 };
    for flush_index in 2..=6 {
        let update = SceneUpdate {
            flush_index,
            actions: vec![],
            resource_changes: ResourceChanges {
                added: vec![(ghost, ResourceKind::Texture2D)],
                removed: vec![],
            },
            provided_resources: vec![],
            expiration_timestamp_ms: None,
        };
        env.renderer.send_scene_update(SCENE, update.encode());
        env.pump();
    }

    // deferred flushes piled up past the limit: the scene was dropped
    assert_eq!(env.recorder.forced_unsubscribes, vec![SCENE]);
    assert_eq!(env.recorder.flushed.len(), flushes_before);
    assert_eq!(
        env.recorder.current_state(SCENE),
        Some(RendererSceneState::Available)
    );
}

#[test]
fn data_links_validate_slot_kinds() {
    let mut env = Env::new(RendererConfig::default());
    env.start_scene(content_update(1), RendererSceneState::Rendered);
    env.pump_until_state(SCENE, RendererSceneState::Rendered);

    // slot 1 is a consumer: linking an offscreen buffer succeeds
    let ob = env
        .renderer
        .create_offscreen_buffer(env.display, 16, 16, 1, false);
    env.pump();
    env.renderer.link_offscreen_buffer(ob, SCENE, DataSlotId(1));
    env.pump();
    assert_eq!(env.recorder.links, vec![EventResult::Ok]);

    // unknown slot fails asynchronously
    env.renderer.link_offscreen_buffer(ob, SCENE, DataSlotId(99));
    env.pump();
    assert_eq!(env.recorder.links, vec![EventResult::Ok, EventResult::Failed]);

    env.renderer.unlink_data(SCENE, DataSlotId(1));
    env.pump();
}

#[test]
fn picking_reports_hit_ids() {
    let mut env = Env::new(RendererConfig::default());
    env.start_scene(content_update(1), RendererSceneState::Rendered);
    env.pump_until_state(SCENE, RendererSceneState::Rendered);

    env.renderer.handle_pick_event(SCENE, 0.25, 0.25);
    env.pump();
    assert_eq!(env.recorder.picked, vec![77]);

    // outside every pickable rect: no event
    env.renderer.handle_pick_event(SCENE, 0.9, 0.9);
    env.pump();
    assert_eq!(env.recorder.picked, vec![77]);
}

#[test]
fn stream_availability_changes_surface_as_events() {
    let mut env = Env::new(RendererConfig::default());
    let stream = WaylandIviSurfaceId(12);
    env.platform
        .set_stream_available(DisplayHandle(1), stream, true);
    env.pump();
    env.platform
        .set_stream_available(DisplayHandle(1), stream, false);
    env.pump();

    assert_eq!(env.recorder.streams, vec![(stream, true), (stream, false)]);
}

#[test]
fn scene_file_payloads_survive_reload_and_feed_updates() {
    use borealis_core::scene::file::{SceneFileLoader, SceneFileWriter};
    use std::io::Cursor;

    let vertices = ResourceBlob::new(ResourceKind::ArrayBuffer, vec![3; 48]);
    let indices = ResourceBlob::new_compressed(ResourceKind::IndexBuffer, &[4; 600]);

    // persist the payloads and read them back through the loader
    let mut writer = SceneFileWriter::new();
    writer.add_resource(&vertices);
    writer.add_resource(&indices);
    let mut container = Vec::new();
    writer.write_to(&mut container).unwrap();

    let mut loader = SceneFileLoader::open(Cursor::new(container)).unwrap();
    let loaded_vertices = loader.read_blob(vertices.content_hash()).unwrap();
    let loaded_indices = loader.read_blob(indices.content_hash()).unwrap();
    assert_eq!(loaded_vertices.content_hash(), vertices.content_hash());
    assert_eq!(loaded_indices.content_hash(), indices.content_hash());

    // the reloaded payloads drive a scene to Ready like fresh ones
    let update = SceneUpdate {
        flush_index: 1,
        actions: vec![SceneAction::AllocateNode {
            handle: NodeHandle(0),
            parent: None,
        }],
        resource_changes: ResourceChanges {
            added: vec![
                (loaded_vertices.content_hash(), loaded_vertices.kind()),
                (loaded_indices.content_hash(), loaded_indices.kind()),
            ],
            removed: vec![],
        },
        provided_resources: vec![
            ProvidedResource::new(loaded_vertices),
            ProvidedResource::new(loaded_indices),
        ],
        expiration_timestamp_ms: None,
    };

    let mut env = Env::new(RendererConfig::default());
    env.start_scene(update, RendererSceneState::Ready);
    env.pump_until_state(SCENE, RendererSceneState::Ready);
}

#[test]
fn repeated_target_state_produces_no_new_events() {
    let mut env = Env::new(RendererConfig::default());
    env.start_scene(content_update(1), RendererSceneState::Ready);
    env.pump_until_state(SCENE, RendererSceneState::Ready);
    let events_before = env.recorder.states.len();

    env.renderer
        .set_scene_state(SCENE, RendererSceneState::Ready)
        .unwrap();
    env.pump();
    env.pump();
    assert_eq!(env.recorder.states.len(), events_before);
}
