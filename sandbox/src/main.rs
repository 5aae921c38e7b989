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

//! Drives the renderer headlessly through a full scene lifecycle:
//! display creation, scene publication, content updates, ramp-up to
//! Rendered, a pixel readback and teardown.

use anyhow::Result;
use borealis_backend::HeadlessPlatform;
use borealis_core::command::{RendererSceneState, SceneInfo, ScenePublicationMode};
use borealis_core::config::{DisplayConfig, FrameworkConfig, RendererConfig};
use borealis_core::device::EffectSource;
use borealis_core::event::{EventResult, RendererEventHandler, SceneControlEventHandler};
use borealis_core::handle::{
    CameraHandle, DisplayHandle, MeshHandle, NodeHandle, RenderPassHandle, SceneId,
};
use borealis_core::resource::{ResourceBlob, ResourceKind};
use borealis_core::scene::actions::{ProvidedResource, ResourceChanges, SceneAction, SceneUpdate};
use borealis_core::scene::{Frustum, Viewport};
use borealis_core::shader_cache::MemoryShaderCache;
use borealis_renderer::Renderer;
use std::sync::Arc;

const SCENE: SceneId = SceneId(42);

#[derive(Default)]
struct Logger {
    rendered: bool,
    pixels: usize,
}

impl RendererEventHandler for Logger {
    fn display_created(&mut self, display: DisplayHandle, result: EventResult) {
        log::info!("sandbox: display {display} created: {result:?}");
    }
    fn display_destroyed(&mut self, display: DisplayHandle, result: EventResult) {
        log::info!("sandbox: display {display} destroyed: {result:?}");
    }
    fn pixels_read(
        &mut self,
        _display: DisplayHandle,
        _buffer: borealis_core::handle::OffscreenBufferHandle,
        pixels: &[u8],
        result: EventResult,
    ) {
        log::info!("sandbox: read {} pixel bytes: {result:?}", pixels.len());
        self.pixels = pixels.len();
    }
}

impl SceneControlEventHandler for Logger {
    fn scene_state_changed(&mut self, scene: SceneId, state: RendererSceneState) {
        log::info!("sandbox: {scene} is now {state:?}");
        if state == RendererSceneState::Rendered {
            self.rendered = true;
        }
    }
    fn scene_flushed(&mut self, scene: SceneId, flush_index: u64) {
        log::debug!("sandbox: {scene} flushed #{flush_index}");
    }
}

fn triangle_update() -> SceneUpdate {
    let effect = ResourceBlob::new(
        ResourceKind::Effect,
        EffectSource {
            name: "flat".into(),
            vertex_source: "void main() { gl_Position = vec4(pos, 1.0); }".into(),
            fragment_source: "void main() { fragColor = vec4(1.0); }".into(),
        }
        .encode(),
    );
    let vertices = ResourceBlob::new(
        ResourceKind::ArrayBuffer,
        vec![0u8; 9 * std::mem::size_of::<f32>()],
    );
    let indices = ResourceBlob::new(ResourceKind::IndexBuffer, vec![0, 0, 1, 0, 2, 0]);

    let added = [&effect, &vertices, &indices]
        .iter()
        .map(|b| (b.content_hash(), b.kind()))
        .collect();

    SceneUpdate {
        flush_index: 1,
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
                    width: 640,
                    height: 480,
                },
                frustum: Frustum {
                    left: -1.0,
                    right: 1.0,
                    bottom: -1.0,
                    top: 1.0,
                    near: 0.1,
                    far: 100.0,
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
        ],
        resource_changes: ResourceChanges {
            added,
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

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let platform = Arc::new(HeadlessPlatform::new());
    let cache = Arc::new(MemoryShaderCache::new());
    let mut renderer = Renderer::new(
        platform,
        &FrameworkConfig::default(),
        RendererConfig::default(),
        Some(cache),
    );

    let display = renderer.create_display(&DisplayConfig::default());
    anyhow::ensure!(display.is_valid(), "display creation rejected");
    let framebuffer = renderer.get_display_framebuffer(display)?;

    renderer.publish_scene(SCENE, ScenePublicationMode::LocalOnly);
    renderer.set_scene_mapping(SCENE, display)?;
    renderer.set_scene_state(SCENE, RendererSceneState::Rendered)?;
    renderer.flush();
    // one loop lets the control logic request the subscription; the
    // "client" then delivers content the way the transport would
    renderer.do_one_loop()?;

    renderer.receive_scene(SceneInfo {
        scene: SCENE,
        friendly_name: "triangle".into(),
    });
    renderer.send_scene_update(SCENE, triangle_update().encode());
    renderer.flush();

    let mut logger = Logger::default();
    for _ in 0..200 {
        renderer.do_one_loop()?;
        renderer.dispatch_events(&mut logger);
        renderer.dispatch_scene_control_events(&mut logger);
        if logger.rendered {
            break;
        }
        // give the shader upload thread time to finish compiling
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    anyhow::ensure!(logger.rendered, "scene never reached Rendered");

    renderer.read_pixels(display, framebuffer, 0, 0, 64, 64)?;
    renderer.flush();
    renderer.do_one_loop()?;
    renderer.dispatch_events(&mut logger);
    anyhow::ensure!(logger.pixels == 64 * 64 * 4, "unexpected readback size");

    renderer.destroy_display(display)?;
    renderer.flush();
    renderer.do_one_loop()?;
    renderer.dispatch_events(&mut logger);

    log::info!("sandbox: scene lifecycle completed");
    Ok(())
}
