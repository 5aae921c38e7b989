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

//! Uploads individual resources to the device.
//!
//! Effects take the binary-shader-cache fast path when a pre-compiled
//! binary exists; otherwise they are deferred to the async shader
//! uploader. All other kinds upload synchronously.

use borealis_core::device::{Device, RenderBackend};
use borealis_core::handle::{DeviceResourceHandle, SceneId};
use borealis_core::resource::{ResourceContentHash, ResourceKind};
use borealis_core::shader_cache::BinaryShaderCache;
use std::sync::Arc;

/// Result of one synchronous upload attempt.
#[derive(Debug)]
pub enum UploadOutcome {
    /// Resource is resident; handle is valid.
    Uploaded {
        /// Device handle.
        handle: DeviceResourceHandle,
        /// Bytes occupied on the device.
        vram_size: u32,
    },
    /// Upload failed; the resource is broken.
    Failed,
    /// Effect with no usable cached binary; compile asynchronously.
    DeferToAsync,
}

/// Uploads resources on the render thread.
pub struct ResourceUploader {
    shader_cache: Option<Arc<dyn BinaryShaderCache>>,
}

impl ResourceUploader {
    /// Creates an uploader, optionally backed by a binary shader cache.
    pub fn new(shader_cache: Option<Arc<dyn BinaryShaderCache>>) -> Self {
        Self { shader_cache }
    }

    /// Uploads one resource.
    ///
    /// `first_scene` is the scene recorded as owner when a compiled
    /// binary is persisted to the cache.
    pub fn upload_resource(
        &mut self,
        backend: &mut dyn RenderBackend,
        hash: ResourceContentHash,
        kind: ResourceKind,
        data: &[u8],
        first_scene: SceneId,
    ) -> UploadOutcome {
        let device = backend.device();
        match kind {
            ResourceKind::Effect => self.upload_effect(device, hash, first_scene),
            ResourceKind::Texture2D | ResourceKind::Texture3D | ResourceKind::TextureCube => {
                let handle = device.allocate_texture(kind, data);
                finish(handle, data.len() as u32)
            }
            ResourceKind::ArrayBuffer | ResourceKind::IndexBuffer => {
                let handle = device.allocate_buffer(kind, data);
                finish(handle, data.len() as u32)
            }
        }
    }

    fn upload_effect(
        &mut self,
        device: &mut dyn Device,
        hash: ResourceContentHash,
        _first_scene: SceneId,
    ) -> UploadOutcome {
        let Some(cache) = &self.shader_cache else {
            return UploadOutcome::DeferToAsync;
        };

        if cache.formats_reported_once() {
            cache.device_supports_formats(&device.supported_binary_shader_formats());
        }

        if !cache.has_binary_shader(hash) {
            return UploadOutcome::DeferToAsync;
        }

        let binary = cache.binary_shader_data(hash);
        let format = cache.binary_shader_format(hash);
        let handle = device.upload_binary_shader(&binary, format);
        let success = handle.is_valid();
        cache.binary_shader_uploaded(hash, success);

        if success {
            log::debug!("ResourceUploader effect #{hash} uploaded from binary shader cache");
            UploadOutcome::Uploaded {
                handle,
                vram_size: binary.len() as u32,
            }
        } else {
            // a stale or incompatible binary falls back to compilation
            log::warn!(
                "ResourceUploader cached binary for effect #{hash} was rejected by the device, recompiling"
            );
            UploadOutcome::DeferToAsync
        }
    }

    /// Persists a freshly compiled shader to the binary cache.
    pub fn store_shader_in_cache(
        &mut self,
        device: &dyn Device,
        handle: DeviceResourceHandle,
        hash: ResourceContentHash,
        scene: SceneId,
    ) {
        let Some(cache) = &self.shader_cache else { return };
        if !cache.should_binary_shader_be_cached(hash, scene) {
            return;
        }
        match device.get_binary_shader(handle) {
            Some((binary, format)) => cache.store_binary_shader(hash, scene, &binary, format),
            None => log::warn!(
                "ResourceUploader device returned no binary for shader #{hash}, not cached"
            ),
        }
    }

    /// Unloads one resource from the device.
    pub fn unload_resource(
        &mut self,
        backend: &mut dyn RenderBackend,
        kind: ResourceKind,
        hash: ResourceContentHash,
        handle: DeviceResourceHandle,
    ) {
        log::trace!("ResourceUploader unloading #{hash} ({kind})");
        backend.device().delete_resource(handle);
    }
}

fn finish(handle: DeviceResourceHandle, vram_size: u32) -> UploadOutcome {
    if handle.is_valid() {
        UploadOutcome::Uploaded { handle, vram_size }
    } else {
        UploadOutcome::Failed
    }
}
