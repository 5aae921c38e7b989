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

//! Per-frame resource upload and eviction.
//!
//! Once per frame the manager selects every provided resource for
//! upload, computes how many bytes must leave the GPU cache to make
//! room, evicts unused resources in registration order, uploads under
//! the frame's time budget, and exchanges effects with the async shader
//! uploader.

use crate::registry::ResourceRegistry;
use crate::shader_uploader::{AsyncShaderUploader, EffectToUpload, UploadedEffect};
use crate::stats::RendererStatistics;
use crate::uploader::{ResourceUploader, UploadOutcome};
use ahash::AHashMap;
use borealis_core::device::{EffectSource, RenderBackend};
use borealis_core::frame_timer::{FrameTimer, FrameTimerSection};
use borealis_core::handle::SceneId;
use borealis_core::resource::{ResourceContentHash, ResourceKind, ResourceStatus};

/// Time budget is polled every this many uploaded resources.
const RESOURCES_BETWEEN_BUDGET_CHECKS: usize = 10;

/// Resources above this size force an immediate budget poll.
const LARGE_RESOURCE_BYTE_THRESHOLD: u32 = 250_000;

/// Drives uploads and evictions against byte and time budgets.
pub struct ResourceUploadManager {
    uploader: ResourceUploader,
    async_uploader: AsyncShaderUploader,
    keep_effects: bool,
    gpu_cache_size: u64,
    resource_sizes: AHashMap<ResourceContentHash, u32>,
    total_uploaded_bytes: u64,
    effects_to_upload: Vec<EffectToUpload>,
    effects_uploaded_tmp: Vec<UploadedEffect>,
}

impl ResourceUploadManager {
    /// Creates a manager for one display bundle.
    pub fn new(
        uploader: ResourceUploader,
        async_uploader: AsyncShaderUploader,
        keep_effects: bool,
        gpu_cache_size: u64,
    ) -> Self {
        Self {
            uploader,
            async_uploader,
            keep_effects,
            gpu_cache_size,
            resource_sizes: AHashMap::new(),
            total_uploaded_bytes: 0,
            effects_to_upload: Vec::new(),
            effects_uploaded_tmp: Vec::new(),
        }
    }

    /// Bytes currently resident on the device through this manager.
    pub fn resident_bytes(&self) -> u64 {
        self.total_uploaded_bytes
    }

    /// The async uploader, for lifecycle control by the bundle.
    pub fn async_uploader_mut(&mut self) -> &mut AsyncShaderUploader {
        &mut self.async_uploader
    }

    /// Whether any provided or in-flight resource still needs work.
    pub fn has_anything_to_upload(&self, registry: &ResourceRegistry) -> bool {
        !registry.get_all_provided().is_empty() || registry.has_any_scheduled_for_upload()
    }

    /// The per-frame entry point.
    pub fn upload_and_unload_pending_resources(
        &mut self,
        registry: &mut ResourceRegistry,
        backend: &mut dyn RenderBackend,
        frame_timer: &FrameTimer,
        stats: &mut RendererStatistics,
    ) {
        let (resources_to_upload, size_to_upload) = self.select_uploads(registry);
        let size_to_free = self.bytes_to_free_for(size_to_upload);

        let resources_to_unload = self.select_unloads(registry, self.keep_effects, size_to_free);

        self.unload_resources(registry, backend, &resources_to_unload);
        self.upload_resources(registry, backend, frame_timer, stats, &resources_to_upload);
        self.sync_effects(registry, backend);
    }

    /// Unloads everything unconditionally; used on display destruction.
    pub fn unload_all(&mut self, registry: &mut ResourceRegistry, backend: &mut dyn RenderBackend) {
        let to_unload = self.select_unloads(registry, false, u64::MAX);
        self.unload_resources(registry, backend, &to_unload);
    }

    fn select_uploads(
        &mut self,
        registry: &mut ResourceRegistry,
    ) -> (Vec<ResourceContentHash>, u64) {
        let hashes: Vec<_> = registry.get_all_provided().to_vec();
        let mut total_size = 0u64;
        for &hash in &hashes {
            total_size += u64::from(registry.prepare_for_upload(hash));
        }
        (hashes, total_size)
    }

    /// How many bytes must be freed before uploading `size_to_upload`.
    fn bytes_to_free_for(&self, size_to_upload: u64) -> u64 {
        if self.gpu_cache_size == 0 {
            // no caching: unload everything unused
            return u64::MAX;
        }

        if self.gpu_cache_size > self.total_uploaded_bytes {
            let remaining_cache = self.gpu_cache_size - self.total_uploaded_bytes;
            if remaining_cache < size_to_upload {
                size_to_upload - remaining_cache
            } else {
                0
            }
        } else {
            // cache already exceeded: free the overshoot plus room for
            // the incoming resources
            size_to_upload + self.total_uploaded_bytes - self.gpu_cache_size
        }
    }

    fn select_unloads(
        &self,
        registry: &ResourceRegistry,
        keep_effects: bool,
        size_to_be_freed: u64,
    ) -> Vec<ResourceContentHash> {
        let mut to_unload = Vec::new();
        let mut size_to_unload = 0u64;

        // stop collecting once enough bytes are gathered; the rest may
        // stay uploaded until more memory is needed
        for hash in registry.get_all_not_in_use() {
            if size_to_unload >= size_to_be_freed {
                break;
            }
            let Some(desc) = registry.get(hash) else { continue };
            if desc.status != ResourceStatus::Uploaded {
                continue;
            }
            if keep_effects && desc.kind == ResourceKind::Effect {
                continue;
            }
            debug_assert!(self.resource_sizes.contains_key(&hash));
            to_unload.push(hash);
            size_to_unload += u64::from(*self.resource_sizes.get(&hash).unwrap_or(&0));
        }
        to_unload
    }

    fn unload_resources(
        &mut self,
        registry: &mut ResourceRegistry,
        backend: &mut dyn RenderBackend,
        to_unload: &[ResourceContentHash],
    ) {
        for &hash in to_unload {
            let Some(desc) = registry.get(hash) else { continue };
            debug_assert!(desc.is_unused());
            debug_assert_eq!(desc.status, ResourceStatus::Uploaded);

            self.uploader
                .unload_resource(backend, desc.kind, hash, desc.device_handle);

            let size = self.resource_sizes.remove(&hash).unwrap_or(0);
            debug_assert!(self.total_uploaded_bytes >= u64::from(size));
            self.total_uploaded_bytes -= u64::from(size);

            log::trace!("ResourceUploadManager unloaded and unregistered #{hash}");
            registry.unregister(hash);
        }
    }

    fn upload_resources(
        &mut self,
        registry: &mut ResourceRegistry,
        backend: &mut dyn RenderBackend,
        frame_timer: &FrameTimer,
        stats: &mut RendererStatistics,
        to_upload: &[ResourceContentHash],
    ) {
        let mut size_uploaded = 0u64;
        for (i, &hash) in to_upload.iter().enumerate() {
            let resource_size = registry.get(hash).map_or(0, |d| d.decompressed_size);
            self.upload_one(registry, backend, hash);
            stats.resource_uploaded(resource_size);
            size_uploaded += u64::from(resource_size);

            let check_time_limit = (i % RESOURCES_BETWEEN_BUDGET_CHECKS == 0)
                || resource_size > LARGE_RESOURCE_BYTE_THRESHOLD;
            if check_time_limit
                && frame_timer.is_budget_exceeded(FrameTimerSection::ResourcesUpload)
            {
                let uploaded = i + 1;
                let remaining = to_upload.len() - uploaded;
                log::info!(
                    "ResourceUploadManager interrupt: exceeded time for resource upload (uploaded {uploaded} resources of size {size_uploaded} B, remaining {remaining} resources to upload)"
                );
                let preview: Vec<String> = to_upload[uploaded..]
                    .iter()
                    .take(10)
                    .map(|h| {
                        let kind =
                            registry.get(*h).map_or("?", |d| d.kind.name());
                        format!("[#{h}; {kind}]")
                    })
                    .collect();
                log::info!(
                    "Remaining resources in queue to upload: {}{}",
                    preview.join(" "),
                    if remaining > 10 { " ..." } else { "" }
                );
                break;
            }
        }
    }

    fn upload_one(
        &mut self,
        registry: &mut ResourceRegistry,
        backend: &mut dyn RenderBackend,
        hash: ResourceContentHash,
    ) {
        let (kind, data, size, first_scene) = {
            let Some(desc) = registry.get(hash) else { return };
            debug_assert_eq!(desc.status, ResourceStatus::Provided);
            debug_assert!(!desc.device_handle.is_valid());
            let Some(data) = desc.decompressed.clone() else {
                log::error!("ResourceUploadManager no payload prepared for #{hash}");
                registry.set_broken(hash);
                return;
            };
            (
                desc.kind,
                data,
                desc.decompressed_size,
                desc.scene_usage.first().copied().unwrap_or_default(),
            )
        };

        match self
            .uploader
            .upload_resource(backend, hash, kind, &data, first_scene)
        {
            UploadOutcome::Uploaded { handle, vram_size } => {
                self.resource_sizes.insert(hash, size);
                self.total_uploaded_bytes += u64::from(size);
                registry.set_uploaded(hash, handle, vram_size.max(size));
            }
            UploadOutcome::Failed => {
                log::error!("ResourceUploadManager failed to upload resource #{hash} ({kind})");
                registry.set_broken(hash);
            }
            UploadOutcome::DeferToAsync => {
                debug_assert_eq!(kind, ResourceKind::Effect);
                debug_assert!(!self.effects_to_upload.iter().any(|(h, _)| *h == hash));
                match EffectSource::decode(&data) {
                    Some(effect) => {
                        self.effects_to_upload.push((hash, effect));
                        registry.set_scheduled_for_upload(hash);
                    }
                    None => {
                        log::error!("ResourceUploadManager effect #{hash} payload is not decodable");
                        registry.set_broken(hash);
                    }
                }
            }
        }
    }

    fn sync_effects(&mut self, registry: &mut ResourceRegistry, backend: &mut dyn RenderBackend) {
        let new_work = std::mem::take(&mut self.effects_to_upload);
        self.async_uploader
            .sync(new_work, &mut self.effects_uploaded_tmp);

        let uploaded = std::mem::take(&mut self.effects_uploaded_tmp);
        for (hash, shader) in uploaded {
            if !registry.contains(hash) {
                log::error!(
                    "ResourceUploadManager unexpected effect uploaded, ignored: #{hash} is not in the registry"
                );
                continue;
            }
            if registry.status(hash) != Some(ResourceStatus::ScheduledForUpload) {
                log::error!(
                    "ResourceUploadManager unexpected effect uploaded, ignored: #{hash} is not scheduled for upload"
                );
                continue;
            }

            match shader {
                Some(shader) => {
                    let (size, first_scene) = registry
                        .get(hash)
                        .map(|d| {
                            (
                                d.decompressed_size,
                                d.scene_usage.first().copied().unwrap_or_default(),
                            )
                        })
                        .unwrap_or((0, SceneId::INVALID));

                    let handle = backend.device().register_shader(shader);
                    if handle.is_valid() {
                        self.resource_sizes.insert(hash, size);
                        self.total_uploaded_bytes += u64::from(size);
                        registry.set_uploaded(hash, handle, size);
                        self.uploader
                            .store_shader_in_cache(backend.device(), handle, hash, first_scene);
                    } else {
                        log::error!(
                            "ResourceUploadManager device rejected compiled shader #{hash}"
                        );
                        registry.set_broken(hash);
                    }
                }
                None => {
                    log::error!("ResourceUploadManager failed to upload effect #{hash}");
                    registry.set_broken(hash);
                }
            }
        }
    }
}
