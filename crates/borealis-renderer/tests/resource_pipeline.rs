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

//! Upload-pipeline behaviour against the headless backend: byte-budget
//! eviction, asynchronous shader compilation and time-budget
//! interruption.

use borealis_backend::HeadlessPlatform;
use borealis_core::config::DisplayConfig;
use borealis_core::device::{EffectSource, Platform};
use borealis_core::frame_timer::{FrameTimer, FrameTimerSection};
use borealis_core::handle::{DisplayHandle, SceneId};
use borealis_core::resource::{ResourceBlob, ResourceContentHash, ResourceKind, ResourceStatus};
use borealis_core::shader_cache::{BinaryShaderCache, MemoryShaderCache};
use borealis_renderer::registry::ResourceRegistry;
use borealis_renderer::shader_uploader::AsyncShaderUploader;
use borealis_renderer::stats::RendererStatistics;
use borealis_renderer::upload::ResourceUploadManager;
use borealis_renderer::uploader::ResourceUploader;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DISPLAY: DisplayHandle = DisplayHandle(1);

struct Fixture {
    platform: Arc<HeadlessPlatform>,
    backend: Box<dyn borealis_core::device::RenderBackend>,
    manager: ResourceUploadManager,
    registry: ResourceRegistry,
    frame_timer: FrameTimer,
    stats: RendererStatistics,
    shader_cache: Arc<MemoryShaderCache>,
}

impl Fixture {
    fn new(gpu_cache_size: u64, keep_effects: bool) -> Self {
        let platform = Arc::new(HeadlessPlatform::new());
        let mut backend = platform
            .create_render_backend(DISPLAY, &DisplayConfig::default())
            .expect("headless backend");

        let mut async_uploader = AsyncShaderUploader::new(platform.clone(), DISPLAY);
        assert!(async_uploader.start(backend.as_mut()));

        let shader_cache = Arc::new(MemoryShaderCache::new());
        let manager = ResourceUploadManager::new(
            ResourceUploader::new(Some(shader_cache.clone())),
            async_uploader,
            keep_effects,
            gpu_cache_size,
        );

        Self {
            platform,
            backend,
            manager,
            registry: ResourceRegistry::new(),
            frame_timer: FrameTimer::new(),
            stats: RendererStatistics::new(),
            shader_cache,
        }
    }

    fn provide(&mut self, blob: ResourceBlob) -> ResourceContentHash {
        let hash = blob.content_hash();
        self.registry.register(hash, blob.kind());
        self.registry.set_provided(hash, blob);
        hash
    }

    fn frame(&mut self) {
        self.frame_timer.start_frame();
        self.manager.upload_and_unload_pending_resources(
            &mut self.registry,
            self.backend.as_mut(),
            &self.frame_timer,
            &mut self.stats,
        );
    }

    fn teardown(mut self) {
        self.manager.async_uploader_mut().stop();
        self.manager
            .unload_all(&mut self.registry, self.backend.as_mut());
        self.platform.destroy_render_backend(DISPLAY, self.backend);
    }
}

fn buffer_blob(tag: u8, size: usize) -> ResourceBlob {
    let mut data = vec![tag; size];
    data[0] = tag.wrapping_add(1);
    ResourceBlob::new(ResourceKind::IndexBuffer, data)
}

fn effect_blob(name: &str) -> ResourceBlob {
    ResourceBlob::new(
        ResourceKind::Effect,
        EffectSource {
            name: name.into(),
            vertex_source: format!("// {name}\nvoid main() {{}}"),
            fragment_source: "void main() {}".into(),
        }
        .encode(),
    )
}

#[test]
fn resident_bytes_match_uploaded_descriptors() {
    let mut fx = Fixture::new(0, false);
    let a = fx.provide(buffer_blob(1, 64));
    fx.registry.add_scene_usage(a, SceneId(1));
    let b = fx.provide(buffer_blob(2, 36));
    fx.registry.add_scene_usage(b, SceneId(1));

    fx.frame();

    assert_eq!(fx.registry.status(a), Some(ResourceStatus::Uploaded));
    assert_eq!(fx.registry.status(b), Some(ResourceStatus::Uploaded));
    assert_eq!(fx.manager.resident_bytes(), 100);
    assert_eq!(fx.registry.uploaded_bytes(), 100);
    fx.teardown();
}

#[test]
fn eviction_frees_enough_bytes_for_incoming() {
    // budget 100 B, resident 100 B of unused resources, incoming 40 B
    let mut fx = Fixture::new(100, false);
    let old: Vec<_> = (0..10)
        .map(|i| fx.provide(buffer_blob(i, 10)))
        .collect();
    fx.frame();
    assert_eq!(fx.manager.resident_bytes(), 100);

    let new: Vec<_> = (20..24)
        .map(|i| fx.provide(buffer_blob(i, 10)))
        .collect();
    fx.frame();

    for hash in &new {
        assert_eq!(fx.registry.status(*hash), Some(ResourceStatus::Uploaded));
    }
    let resident = fx.manager.resident_bytes();
    assert!((40..=100).contains(&resident), "resident {resident} B");

    // at least 40 B of old resources were unloaded and unregistered
    let evicted = old.iter().filter(|h| !fx.registry.contains(**h)).count();
    assert!(evicted >= 4, "only {evicted} old resources evicted");
    assert_eq!(fx.registry.uploaded_bytes(), resident);
    fx.teardown();
}

#[test]
fn zero_cache_unloads_everything_unused() {
    let mut fx = Fixture::new(0, false);
    let hash = fx.provide(buffer_blob(7, 50));
    fx.frame();
    assert_eq!(fx.manager.resident_bytes(), 50);

    // next frame with no usage: everything unused is evicted
    fx.frame();
    assert!(!fx.registry.contains(hash));
    assert_eq!(fx.manager.resident_bytes(), 0);
    fx.teardown();
}

#[test]
fn keep_effects_survive_zero_cache_eviction() {
    let mut fx = Fixture::new(0, true);
    let effect = fx.provide(effect_blob("sticky"));
    let buffer = fx.provide(buffer_blob(9, 30));

    let deadline = Instant::now() + Duration::from_secs(5);
    while fx.registry.status(effect) != Some(ResourceStatus::Uploaded) {
        assert!(Instant::now() < deadline, "shader never finished");
        fx.frame();
        std::thread::sleep(Duration::from_millis(5));
    }

    // both unused; eviction may take the buffer but never the effect
    fx.frame();
    fx.frame();
    assert_eq!(fx.registry.status(effect), Some(ResourceStatus::Uploaded));
    assert!(!fx.registry.contains(buffer));
    fx.teardown();
}

#[test]
fn effect_compiles_asynchronously_and_lands_in_cache() {
    let mut fx = Fixture::new(0, true);
    let effect = fx.provide(effect_blob("async"));
    fx.registry.add_scene_usage(effect, SceneId(3));

    fx.frame();
    // handed to the async thread, nothing resident yet
    assert_eq!(
        fx.registry.status(effect),
        Some(ResourceStatus::ScheduledForUpload)
    );
    assert_eq!(fx.manager.resident_bytes(), 0);

    let deadline = Instant::now() + Duration::from_secs(5);
    while fx.registry.status(effect) != Some(ResourceStatus::Uploaded) {
        assert!(Instant::now() < deadline, "shader never finished");
        std::thread::sleep(Duration::from_millis(5));
        fx.frame();
    }

    let desc = fx.registry.get(effect).unwrap();
    assert!(desc.device_handle.is_valid());
    assert!(fx.shader_cache.has_binary_shader(effect));
    fx.teardown();
}

#[test]
fn broken_shader_is_marked_and_skipped() {
    let mut fx = Fixture::new(0, true);
    let bad = fx.provide(ResourceBlob::new(
        ResourceKind::Effect,
        EffectSource {
            name: "bad".into(),
            vertex_source: "#error broken".into(),
            fragment_source: "void main() {}".into(),
        }
        .encode(),
    ));
    fx.registry.add_scene_usage(bad, SceneId(1));

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        fx.frame();
        match fx.registry.status(bad) {
            Some(ResourceStatus::Broken) => break,
            _ => {
                assert!(Instant::now() < deadline, "shader never failed");
                std::thread::sleep(Duration::from_millis(5));
            }
        }
    }
    assert!(!fx.registry.get(bad).unwrap().device_handle.is_valid());
    assert!(!fx.shader_cache.has_binary_shader(bad));
    fx.teardown();
}

#[test]
fn binary_cache_fast_path_skips_compilation() {
    let shared_cache;
    // first renderer session compiles and persists the shader
    {
        let mut fx = Fixture::new(0, true);
        let effect = fx.provide(effect_blob("cached"));
        fx.registry.add_scene_usage(effect, SceneId(1));
        let deadline = Instant::now() + Duration::from_secs(5);
        while !fx.shader_cache.has_binary_shader(effect) {
            assert!(Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(5));
            fx.frame();
        }
        shared_cache = fx.shader_cache.clone();
        fx.teardown();
    }

    // second session uploads straight from the cache, synchronously
    let platform = Arc::new(HeadlessPlatform::new());
    let mut backend = platform
        .create_render_backend(DISPLAY, &DisplayConfig::default())
        .unwrap();
    let mut async_uploader = AsyncShaderUploader::new(platform.clone(), DISPLAY);
    assert!(async_uploader.start(backend.as_mut()));
    let mut manager = ResourceUploadManager::new(
        ResourceUploader::new(Some(shared_cache.clone())),
        async_uploader,
        true,
        0,
    );
    let mut registry = ResourceRegistry::new();
    let mut frame_timer = FrameTimer::new();
    let mut stats = RendererStatistics::new();

    let blob = effect_blob("cached");
    let effect = blob.content_hash();
    registry.register(effect, ResourceKind::Effect);
    registry.set_provided(effect, blob);
    registry.add_scene_usage(effect, SceneId(1));

    frame_timer.start_frame();
    manager.upload_and_unload_pending_resources(
        &mut registry,
        backend.as_mut(),
        &frame_timer,
        &mut stats,
    );

    // uploaded within one frame, no async round trip
    assert_eq!(registry.status(effect), Some(ResourceStatus::Uploaded));
    assert!(shared_cache
        .upload_results()
        .iter()
        .any(|(h, success)| *h == effect && *success));

    manager.async_uploader_mut().stop();
    manager.unload_all(&mut registry, backend.as_mut());
    platform.destroy_render_backend(DISPLAY, backend);
}

#[test]
fn exhausted_time_budget_interrupts_uploads() {
    let mut fx = Fixture::new(0, false);
    let hashes: Vec<_> = (0..100u8)
        .map(|i| {
            let hash = fx.provide(buffer_blob(i, 1024));
            fx.registry.add_scene_usage(hash, SceneId(1));
            hash
        })
        .collect();

    fx.frame_timer
        .set_section_budget(FrameTimerSection::ResourcesUpload, 0);
    fx.frame_timer.start_frame();
    std::thread::sleep(Duration::from_millis(1));
    fx.manager.upload_and_unload_pending_resources(
        &mut fx.registry,
        fx.backend.as_mut(),
        &fx.frame_timer,
        &mut fx.stats,
    );

    let uploaded: Vec<_> = hashes
        .iter()
        .filter(|h| fx.registry.status(**h) == Some(ResourceStatus::Uploaded))
        .collect();
    let provided = hashes
        .iter()
        .filter(|h| fx.registry.status(**h) == Some(ResourceStatus::Provided))
        .count();

    assert!(!uploaded.is_empty() && uploaded.len() < 100);
    assert_eq!(provided, 100 - uploaded.len());
    // the interrupted prefix is exactly the front of the queue
    for (i, hash) in hashes.iter().enumerate() {
        let expected = if i < uploaded.len() {
            ResourceStatus::Uploaded
        } else {
            ResourceStatus::Provided
        };
        assert_eq!(fx.registry.status(*hash), Some(expected), "resource {i}");
    }

    // the rest completes once the budget recovers
    fx.frame_timer
        .set_section_budget(FrameTimerSection::ResourcesUpload, u64::MAX);
    fx.frame();
    for hash in &hashes {
        assert_eq!(fx.registry.status(*hash), Some(ResourceStatus::Uploaded));
    }
    fx.teardown();
}

#[test]
fn no_duplicate_effects_within_sync_cycle() {
    let mut fx = Fixture::new(0, true);
    let effect = fx.provide(effect_blob("once"));
    fx.registry.add_scene_usage(effect, SceneId(1));

    // first frame schedules the effect; subsequent frames must not
    // schedule it again while the compile is in flight
    fx.frame();
    fx.frame();
    fx.frame();
    assert!(matches!(
        fx.registry.status(effect),
        Some(ResourceStatus::ScheduledForUpload | ResourceStatus::Uploaded)
    ));

    let deadline = Instant::now() + Duration::from_secs(5);
    while fx.registry.status(effect) != Some(ResourceStatus::Uploaded) {
        assert!(Instant::now() < deadline);
        std::thread::sleep(Duration::from_millis(5));
        fx.frame();
    }
    fx.teardown();
}
