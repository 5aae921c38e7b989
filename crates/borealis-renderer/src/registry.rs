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

//! The GPU resource registry.
//!
//! One registry per display bundle tracks every GPU-bound resource: its
//! content hash, kind, lifecycle status, device handle, byte sizes and
//! the set of scenes using it. The registry is only ever touched by the
//! owning bundle's thread.

use ahash::AHashMap;
use borealis_core::handle::{DeviceResourceHandle, SceneId};
use borealis_core::resource::{ResourceBlob, ResourceContentHash, ResourceKind, ResourceStatus};

/// Registry entry for one resource.
#[derive(Debug)]
pub struct ResourceDescriptor {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Lifecycle status.
    pub status: ResourceStatus,
    /// Payload, kept while not yet uploaded.
    pub blob: Option<ResourceBlob>,
    /// Decompressed payload, prepared just before upload.
    pub decompressed: Option<Vec<u8>>,
    /// Device handle; valid iff status is `Uploaded`.
    pub device_handle: DeviceResourceHandle,
    /// Scenes currently referencing this resource.
    pub scene_usage: Vec<SceneId>,
    /// External hash-usage tokens (offscreen-buffer links and friends).
    pub external_refs: u32,
    /// Cached decompressed size in bytes.
    pub decompressed_size: u32,
    /// Bytes occupied on the device while uploaded.
    pub vram_size: u32,
}

impl ResourceDescriptor {
    fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            status: ResourceStatus::Registered,
            blob: None,
            decompressed: None,
            device_handle: DeviceResourceHandle::INVALID,
            scene_usage: Vec::new(),
            external_refs: 0,
            decompressed_size: 0,
            vram_size: 0,
        }
    }

    /// Whether no scene and no external token references this resource.
    pub fn is_unused(&self) -> bool {
        self.scene_usage.is_empty() && self.external_refs == 0
    }
}

/// Tracks every GPU-bound resource of one display bundle.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: AHashMap<ResourceContentHash, ResourceDescriptor>,
    // insertion order; eviction walks it front to back
    registration_order: Vec<ResourceContentHash>,
    provided: Vec<ResourceContentHash>,
    scheduled_for_upload: usize,
}

impl ResourceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource, creating its descriptor on first reference.
    pub fn register(&mut self, hash: ResourceContentHash, kind: ResourceKind) {
        if !self.resources.contains_key(&hash) {
            self.resources.insert(hash, ResourceDescriptor::new(kind));
            self.registration_order.push(hash);
            log::trace!("ResourceRegistry registered #{hash} ({kind})");
        }
    }

    /// Removes a resource from the registry entirely.
    ///
    /// The upload manager calls this right after the device unload of
    /// an evicted resource.
    pub fn unregister(&mut self, hash: ResourceContentHash) {
        if self.resources.remove(&hash).is_some() {
            self.registration_order.retain(|h| *h != hash);
            self.provided.retain(|h| *h != hash);
        }
    }

    /// Whether the hash has a descriptor.
    pub fn contains(&self, hash: ResourceContentHash) -> bool {
        self.resources.contains_key(&hash)
    }

    /// Immutable descriptor access.
    pub fn get(&self, hash: ResourceContentHash) -> Option<&ResourceDescriptor> {
        self.resources.get(&hash)
    }

    /// Status of a resource, if registered.
    pub fn status(&self, hash: ResourceContentHash) -> Option<ResourceStatus> {
        self.resources.get(&hash).map(|d| d.status)
    }

    /// Adds a scene to the usage set.
    pub fn add_scene_usage(&mut self, hash: ResourceContentHash, scene: SceneId) {
        if let Some(desc) = self.resources.get_mut(&hash) {
            if !desc.scene_usage.contains(&scene) {
                desc.scene_usage.push(scene);
            }
        }
    }

    /// Removes a scene from the usage set.
    pub fn remove_scene_usage(&mut self, hash: ResourceContentHash, scene: SceneId) {
        if let Some(desc) = self.resources.get_mut(&hash) {
            desc.scene_usage.retain(|s| *s != scene);
        }
    }

    /// Takes an external hash-usage token.
    pub fn add_external_ref(&mut self, hash: ResourceContentHash) {
        if let Some(desc) = self.resources.get_mut(&hash) {
            desc.external_refs += 1;
        }
    }

    /// Releases an external hash-usage token.
    pub fn release_external_ref(&mut self, hash: ResourceContentHash) {
        if let Some(desc) = self.resources.get_mut(&hash) {
            desc.external_refs = desc.external_refs.saturating_sub(1);
        }
    }

    /// Whether any scene other than `scene`, or an external token,
    /// references the resource.
    pub fn is_in_use_anywhere_else(&self, hash: ResourceContentHash, scene: SceneId) -> bool {
        self.resources.get(&hash).is_some_and(|d| {
            d.external_refs > 0 || d.scene_usage.iter().any(|s| *s != scene)
        })
    }

    /// Attaches the payload: `Registered → Provided`.
    pub fn set_provided(&mut self, hash: ResourceContentHash, blob: ResourceBlob) {
        let Some(desc) = self.resources.get_mut(&hash) else {
            log::warn!("ResourceRegistry provide for unknown resource #{hash}");
            return;
        };
        if !desc.status.can_transition_to(ResourceStatus::Provided) {
            // payload re-delivered for an already uploaded resource
            log::debug!(
                "ResourceRegistry ignoring payload for #{hash} in status {}",
                desc.status
            );
            return;
        }
        desc.decompressed_size = blob.decompressed_size();
        desc.blob = Some(blob);
        desc.status = ResourceStatus::Provided;
        self.provided.push(hash);
    }

    /// Marks the resource as queued in the async uploader.
    pub fn set_scheduled_for_upload(&mut self, hash: ResourceContentHash) {
        self.transition(hash, ResourceStatus::ScheduledForUpload);
        self.scheduled_for_upload += 1;
    }

    /// Marks the resource resident: stores the device handle and size.
    pub fn set_uploaded(
        &mut self,
        hash: ResourceContentHash,
        device_handle: DeviceResourceHandle,
        vram_size: u32,
    ) {
        debug_assert!(device_handle.is_valid());
        if let Some(desc) = self.resources.get_mut(&hash) {
            if desc.status == ResourceStatus::ScheduledForUpload {
                self.scheduled_for_upload -= 1;
            }
        }
        self.transition(hash, ResourceStatus::Uploaded);
        if let Some(desc) = self.resources.get_mut(&hash) {
            desc.device_handle = device_handle;
            desc.vram_size = vram_size;
            desc.blob = None;
            desc.decompressed = None;
        }
    }

    /// Marks the resource broken; referencing draws will be skipped.
    pub fn set_broken(&mut self, hash: ResourceContentHash) {
        if let Some(desc) = self.resources.get_mut(&hash) {
            if desc.status == ResourceStatus::ScheduledForUpload {
                self.scheduled_for_upload -= 1;
            }
        }
        self.transition(hash, ResourceStatus::Broken);
        if let Some(desc) = self.resources.get_mut(&hash) {
            desc.blob = None;
            desc.decompressed = None;
        }
    }

    fn transition(&mut self, hash: ResourceContentHash, next: ResourceStatus) {
        let Some(desc) = self.resources.get_mut(&hash) else {
            log::error!("ResourceRegistry status change for unknown resource #{hash}");
            return;
        };
        if !desc.status.can_transition_to(next) {
            log::error!(
                "ResourceRegistry illegal transition {} -> {next} for #{hash}",
                desc.status
            );
            return;
        }
        if desc.status == ResourceStatus::Provided {
            self.provided.retain(|h| *h != hash);
        }
        desc.status = next;
    }

    /// Hashes whose payload arrived but that are not yet uploaded,
    /// in provision order.
    pub fn get_all_provided(&self) -> &[ResourceContentHash] {
        &self.provided
    }

    /// Whether any resource sits in the async upload queue.
    pub fn has_any_scheduled_for_upload(&self) -> bool {
        self.scheduled_for_upload > 0
    }

    /// Hashes with no scene usage and no external tokens, in
    /// registration order.
    pub fn get_all_not_in_use(&self) -> Vec<ResourceContentHash> {
        self.registration_order
            .iter()
            .filter(|h| self.resources.get(h).is_some_and(|d| d.is_unused()))
            .copied()
            .collect()
    }

    /// Every registered hash in registration order.
    pub fn all_hashes(&self) -> &[ResourceContentHash] {
        &self.registration_order
    }

    /// Decompresses the payload of a provided resource and caches the
    /// result; returns the decompressed size.
    pub fn prepare_for_upload(&mut self, hash: ResourceContentHash) -> u32 {
        let Some(desc) = self.resources.get_mut(&hash) else {
            return 0;
        };
        debug_assert_eq!(desc.status, ResourceStatus::Provided);
        if desc.decompressed.is_none() {
            if let Some(blob) = &desc.blob {
                desc.decompressed = Some(blob.decompress());
            }
        }
        desc.decompressed_size
    }

    /// Sum of `vram_size` over uploaded descriptors; for invariant checks.
    pub fn uploaded_bytes(&self) -> u64 {
        self.resources
            .values()
            .filter(|d| d.status == ResourceStatus::Uploaded)
            .map(|d| u64::from(d.vram_size))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(n: u8, size: usize) -> ResourceBlob {
        ResourceBlob::new(ResourceKind::IndexBuffer, vec![n; size])
    }

    fn registered(reg: &mut ResourceRegistry, n: u8, size: usize) -> ResourceContentHash {
        let b = blob(n, size);
        let hash = b.content_hash();
        reg.register(hash, ResourceKind::IndexBuffer);
        reg.set_provided(hash, b);
        hash
    }

    #[test]
    fn uploaded_iff_device_handle_valid() {
        let mut reg = ResourceRegistry::new();
        let hash = registered(&mut reg, 1, 10);
        assert!(!reg.get(hash).unwrap().device_handle.is_valid());

        reg.set_uploaded(hash, DeviceResourceHandle(5), 10);
        let desc = reg.get(hash).unwrap();
        assert_eq!(desc.status, ResourceStatus::Uploaded);
        assert!(desc.device_handle.is_valid());
        assert!(desc.blob.is_none());
    }

    #[test]
    fn provided_list_tracks_status() {
        let mut reg = ResourceRegistry::new();
        let a = registered(&mut reg, 1, 10);
        let b = registered(&mut reg, 2, 20);
        assert_eq!(reg.get_all_provided(), &[a, b]);

        reg.set_uploaded(a, DeviceResourceHandle(1), 10);
        assert_eq!(reg.get_all_provided(), &[b]);

        reg.set_broken(b);
        assert!(reg.get_all_provided().is_empty());
    }

    #[test]
    fn not_in_use_respects_scenes_and_tokens() {
        let mut reg = ResourceRegistry::new();
        let hash = registered(&mut reg, 1, 10);
        assert_eq!(reg.get_all_not_in_use(), vec![hash]);

        reg.add_scene_usage(hash, SceneId(1));
        assert!(reg.get_all_not_in_use().is_empty());
        assert!(!reg.is_in_use_anywhere_else(hash, SceneId(1)));

        reg.add_external_ref(hash);
        reg.remove_scene_usage(hash, SceneId(1));
        assert!(reg.get_all_not_in_use().is_empty());
        assert!(reg.is_in_use_anywhere_else(hash, SceneId(1)));

        reg.release_external_ref(hash);
        assert_eq!(reg.get_all_not_in_use(), vec![hash]);
    }

    #[test]
    fn illegal_transitions_are_ignored() {
        let mut reg = ResourceRegistry::new();
        let hash = registered(&mut reg, 3, 8);
        reg.set_uploaded(hash, DeviceResourceHandle(9), 8);
        // Uploaded -> Broken is not part of the DAG
        reg.set_broken(hash);
        assert_eq!(reg.status(hash), Some(ResourceStatus::Uploaded));
    }

    #[test]
    fn scheduled_counter_balances() {
        let mut reg = ResourceRegistry::new();
        let hash = registered(&mut reg, 4, 6);
        reg.set_scheduled_for_upload(hash);
        assert!(reg.has_any_scheduled_for_upload());
        reg.set_uploaded(hash, DeviceResourceHandle(2), 6);
        assert!(!reg.has_any_scheduled_for_upload());
    }

    #[test]
    fn duplicate_scene_usage_is_tracked_once() {
        let mut reg = ResourceRegistry::new();
        let hash = registered(&mut reg, 5, 4);
        reg.add_scene_usage(hash, SceneId(2));
        reg.add_scene_usage(hash, SceneId(2));
        assert_eq!(reg.get(hash).unwrap().scene_usage.len(), 1);
        reg.remove_scene_usage(hash, SceneId(2));
        assert!(reg.get(hash).unwrap().is_unused());
    }
}
