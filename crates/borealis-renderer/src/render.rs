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

//! The per-frame draw pass.
//!
//! Offscreen buffers render first (interruptible ones under the
//! offscreen-buffer time budget), the framebuffer last, then the
//! surface swaps. A draw is skipped unless every resource it references
//! is resident; skips are logged once per missing resource.

use crate::registry::ResourceRegistry;
use crate::updater::SceneUpdater;
use borealis_core::device::{Device, MeshBatch};
use borealis_core::frame_timer::{FrameTimer, FrameTimerSection};
use borealis_core::handle::{DeviceResourceHandle, OffscreenBufferHandle, SceneId};
use borealis_core::resource::{ResourceContentHash, ResourceStatus};
use borealis_core::scene::SceneStorage;
use std::collections::HashSet;

const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

impl SceneUpdater {
    /// Renders one frame onto every display buffer and swaps.
    pub fn render_frame(&mut self, frame_timer: &FrameTimer) {
        let Some(backend) = self.backend.as_mut() else { return };
        if !backend.surface().enable() {
            log::error!("SceneUpdater could not enable surface for rendering");
            return;
        }

        // shown scenes grouped by target buffer, in render order
        let mut by_buffer: Vec<(OffscreenBufferHandle, Vec<(i32, SceneId)>)> = Vec::new();
        for (&scene, record) in &self.scenes {
            if !record.shown {
                continue;
            }
            let entry = by_buffer
                .iter_mut()
                .find(|(buffer, _)| *buffer == record.buffer_assignment);
            match entry {
                Some((_, list)) => list.push((record.render_order, scene)),
                None => by_buffer.push((record.buffer_assignment, vec![(record.render_order, scene)])),
            }
        }
        for (_, list) in &mut by_buffer {
            list.sort_unstable();
        }

        let mut rendered_scenes: Vec<SceneId> = Vec::new();
        {
            let device = backend.device();

            // offscreen buffers first, in handle order for determinism
            let mut ob_handles: Vec<OffscreenBufferHandle> =
                self.offscreen_buffers.keys().copied().collect();
            ob_handles.sort_unstable_by_key(|h| h.0);

            let mut interruptible_budget_hit = false;
            for buffer in ob_handles {
                let scenes = by_buffer
                    .iter()
                    .find(|(b, _)| *b == buffer)
                    .map(|(_, s)| s.as_slice())
                    .unwrap_or(&[]);
                if scenes.is_empty() {
                    continue;
                }
                if self.skip_unmodified_buffers
                    && !scenes.iter().any(|(_, s)| self.scenes[s].modified)
                {
                    continue;
                }

                let info = &self.offscreen_buffers[&buffer];
                if info.interruptible {
                    if interruptible_budget_hit
                        || frame_timer.is_budget_exceeded(FrameTimerSection::OffscreenBufferRender)
                    {
                        interruptible_budget_hit = true;
                        log::info!(
                            "SceneUpdater interrupt: offscreen buffer render budget exhausted before {buffer}"
                        );
                        continue;
                    }
                }

                let clear = self
                    .clear_colors
                    .get(&buffer)
                    .copied()
                    .unwrap_or(DEFAULT_CLEAR_COLOR);
                device.activate_render_target(Some(info.device_handle));
                device.clear(clear);
                for &(_, scene) in scenes {
                    render_scene(
                        device,
                        &self.registry,
                        &self.scenes[&scene].storage,
                        scene,
                        &mut self.logged_missing_resources,
                    );
                    rendered_scenes.push(scene);
                }
            }

            // then the framebuffer
            let framebuffer_scenes = by_buffer
                .iter()
                .find(|(b, _)| !b.is_valid())
                .map(|(_, s)| s.as_slice())
                .unwrap_or(&[]);
            let framebuffer_dirty = !self.skip_unmodified_buffers
                || framebuffer_scenes.iter().any(|(_, s)| self.scenes[s].modified);
            if !framebuffer_scenes.is_empty() && framebuffer_dirty {
                let clear = self
                    .clear_colors
                    .get(&OffscreenBufferHandle::INVALID)
                    .copied()
                    .unwrap_or(DEFAULT_CLEAR_COLOR);
                device.activate_render_target(None);
                device.clear(clear);
                for &(_, scene) in framebuffer_scenes {
                    render_scene(
                        device,
                        &self.registry,
                        &self.scenes[&scene].storage,
                        scene,
                        &mut self.logged_missing_resources,
                    );
                    rendered_scenes.push(scene);
                }
            }
        }

        for scene in rendered_scenes {
            if let Some(record) = self.scenes.get_mut(&scene) {
                record.modified = false;
            }
        }

        backend.surface().swap_buffers();
    }
}

fn render_scene(
    device: &mut dyn Device,
    registry: &ResourceRegistry,
    storage: &SceneStorage,
    scene: SceneId,
    logged_missing: &mut HashSet<ResourceContentHash>,
) {
    for (_, pass) in storage.passes_in_order() {
        for &mesh_handle in &pass.meshes {
            let Some(mesh) = storage.mesh(mesh_handle) else {
                log::warn!("SceneUpdater {scene} pass references released {mesh_handle}");
                continue;
            };
            if !mesh.visible || mesh.index_count == 0 {
                continue;
            }

            let Some(batch) = resolve_batch(registry, mesh, logged_missing) else {
                continue;
            };
            device.draw(&batch);
        }
    }
}

fn resolve_batch(
    registry: &ResourceRegistry,
    mesh: &borealis_core::scene::MeshNode,
    logged_missing: &mut HashSet<ResourceContentHash>,
) -> Option<MeshBatch> {
    let effect = resolve_handle(registry, mesh.effect, logged_missing)?;
    let index_buffer = resolve_handle(registry, mesh.index_buffer, logged_missing)?;

    let mut vertex_buffers = Vec::with_capacity(mesh.vertex_buffers.len());
    for &hash in &mesh.vertex_buffers {
        vertex_buffers.push(resolve_handle(registry, hash, logged_missing)?);
    }
    let mut textures = Vec::with_capacity(mesh.textures.len());
    for &hash in &mesh.textures {
        textures.push(resolve_handle(registry, hash, logged_missing)?);
    }

    Some(MeshBatch {
        effect,
        index_buffer,
        vertex_buffers,
        textures,
        index_count: mesh.index_count,
    })
}

fn resolve_handle(
    registry: &ResourceRegistry,
    hash: ResourceContentHash,
    logged_missing: &mut HashSet<ResourceContentHash>,
) -> Option<DeviceResourceHandle> {
    match registry.get(hash) {
        Some(desc) if desc.status == ResourceStatus::Uploaded => Some(desc.device_handle),
        other => {
            if logged_missing.insert(hash) {
                let status = other.map(|d| d.status);
                log::warn!("SceneUpdater draw skipped, resource #{hash} not resident ({status:?})");
            }
            None
        }
    }
}
