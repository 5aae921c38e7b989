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

//! Pluggable persistent cache for compiled shader binaries.

use crate::device::BinaryShaderFormat;
use crate::handle::SceneId;
use crate::resource::ResourceContentHash;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Persistent key/value store mapping effect hash to a pre-compiled GPU
/// binary.
///
/// Implementations must be thread-safe: the renderer calls into the
/// cache from per-display threads and from async uploader threads.
pub trait BinaryShaderCache: Send + Sync {
    /// Reports the formats the device can consume. Forwarded once per
    /// device; see [`BinaryShaderCache::formats_reported_once`].
    fn device_supports_formats(&self, formats: &[BinaryShaderFormat]);

    /// Whether a binary is stored for the effect.
    fn has_binary_shader(&self, effect: ResourceContentHash) -> bool;

    /// Size of the stored binary, zero if absent.
    fn binary_shader_size(&self, effect: ResourceContentHash) -> u32;

    /// Format of the stored binary.
    fn binary_shader_format(&self, effect: ResourceContentHash) -> BinaryShaderFormat;

    /// Copies the stored binary out.
    fn binary_shader_data(&self, effect: ResourceContentHash) -> Vec<u8>;

    /// Whether a freshly compiled shader should be persisted.
    fn should_binary_shader_be_cached(&self, effect: ResourceContentHash, scene: SceneId) -> bool;

    /// Persists a compiled shader binary.
    fn store_binary_shader(
        &self,
        effect: ResourceContentHash,
        scene: SceneId,
        data: &[u8],
        format: BinaryShaderFormat,
    );

    /// Feedback after attempting to upload a cached binary.
    fn binary_shader_uploaded(&self, effect: ResourceContentHash, success: bool);

    /// One-shot latch for the per-device format report.
    ///
    /// Returns `true` exactly once per cache instance; the caller that
    /// receives `true` performs the [`device_supports_formats`] report.
    ///
    /// [`device_supports_formats`]: BinaryShaderCache::device_supports_formats
    fn formats_reported_once(&self) -> bool;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: Vec<u8>,
    format: BinaryShaderFormat,
}

/// In-memory [`BinaryShaderCache`] used as the default implementation
/// and by tests.
#[derive(Default)]
pub struct MemoryShaderCache {
    entries: Mutex<HashMap<ResourceContentHash, CacheEntry>>,
    upload_results: Mutex<Vec<(ResourceContentHash, bool)>>,
    formats_reported: AtomicBool,
}

impl MemoryShaderCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload feedback recorded so far, for inspection.
    pub fn upload_results(&self) -> Vec<(ResourceContentHash, bool)> {
        self.upload_results.lock().unwrap().clone()
    }

    /// Number of stored binaries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BinaryShaderCache for MemoryShaderCache {
    fn device_supports_formats(&self, formats: &[BinaryShaderFormat]) {
        log::debug!("MemoryShaderCache device supports {} binary formats", formats.len());
    }

    fn has_binary_shader(&self, effect: ResourceContentHash) -> bool {
        self.entries.lock().unwrap().contains_key(&effect)
    }

    fn binary_shader_size(&self, effect: ResourceContentHash) -> u32 {
        self.entries
            .lock()
            .unwrap()
            .get(&effect)
            .map_or(0, |e| e.data.len() as u32)
    }

    fn binary_shader_format(&self, effect: ResourceContentHash) -> BinaryShaderFormat {
        self.entries
            .lock()
            .unwrap()
            .get(&effect)
            .map_or(BinaryShaderFormat(0), |e| e.format)
    }

    fn binary_shader_data(&self, effect: ResourceContentHash) -> Vec<u8> {
        self.entries
            .lock()
            .unwrap()
            .get(&effect)
            .map_or_else(Vec::new, |e| e.data.clone())
    }

    fn should_binary_shader_be_cached(&self, _effect: ResourceContentHash, _scene: SceneId) -> bool {
        true
    }

    fn store_binary_shader(
        &self,
        effect: ResourceContentHash,
        _scene: SceneId,
        data: &[u8],
        format: BinaryShaderFormat,
    ) {
        self.entries.lock().unwrap().insert(
            effect,
            CacheEntry {
                data: data.to_vec(),
                format,
            },
        );
    }

    fn binary_shader_uploaded(&self, effect: ResourceContentHash, success: bool) {
        self.upload_results.lock().unwrap().push((effect, success));
    }

    fn formats_reported_once(&self) -> bool {
        !self.formats_reported.swap(true, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceKind;

    fn hash(tag: &[u8]) -> ResourceContentHash {
        ResourceContentHash::from_payload(ResourceKind::Effect, tag)
    }

    #[test]
    fn store_and_query() {
        let cache = MemoryShaderCache::new();
        let h = hash(b"effect-a");
        assert!(!cache.has_binary_shader(h));

        cache.store_binary_shader(h, SceneId(1), &[1, 2, 3], BinaryShaderFormat(7));
        assert!(cache.has_binary_shader(h));
        assert_eq!(cache.binary_shader_size(h), 3);
        assert_eq!(cache.binary_shader_format(h), BinaryShaderFormat(7));
        assert_eq!(cache.binary_shader_data(h), vec![1, 2, 3]);
    }

    #[test]
    fn formats_reported_is_one_shot() {
        let cache = MemoryShaderCache::new();
        assert!(cache.formats_reported_once());
        assert!(!cache.formats_reported_once());
        assert!(!cache.formats_reported_once());
    }

    #[test]
    fn upload_feedback_is_recorded() {
        let cache = MemoryShaderCache::new();
        let h = hash(b"effect-b");
        cache.binary_shader_uploaded(h, true);
        cache.binary_shader_uploaded(h, false);
        assert_eq!(cache.upload_results(), vec![(h, true), (h, false)]);
    }
}
