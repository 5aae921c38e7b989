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

//! The scene updater.
//!
//! Executes scene lifecycle requests, applies serialized scene deltas,
//! resolves their resource dependencies through the registry and the
//! upload manager, and owns the display context together with its
//! offscreen and stream buffers and the data-link tables.
//!
//! Flushes whose resources are not yet resident are deferred; a scene
//! exceeding the force-apply limit has its flushes applied regardless,
//! and one exceeding the force-unsubscribe limit is dropped from
//! rendering entirely.

use crate::collector::EventCollector;
use crate::control::SceneEvent;
use crate::registry::ResourceRegistry;
use crate::shader_uploader::AsyncShaderUploader;
use crate::stats::RendererStatistics;
use crate::upload::ResourceUploadManager;
use crate::uploader::ResourceUploader;
use borealis_core::command::{
    RendererLogTopic, SceneInfo, ScenePublicationMode, WarpingMeshData,
};
use borealis_core::config::{DisplayConfig, PendingFlushLimits};
use borealis_core::device::{PixelRect, Platform, RenderBackend};
use borealis_core::event::{EventResult, RendererEvent, SceneControlEvent};
use borealis_core::frame_timer::FrameTimer;
use borealis_core::handle::{
    DataSlotId, DisplayHandle, OffscreenBufferHandle, SceneId, StreamBufferHandle,
    WaylandIviSurfaceId,
};
use borealis_core::resource::{ResourceContentHash, ResourceStatus};
use borealis_core::scene::actions::SceneUpdate;
use borealis_core::scene::{DataSlotKind, SceneStorage};
use borealis_core::shader_cache::BinaryShaderCache;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Where a consumer slot gets its data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSource {
    /// Another scene's provider slot.
    SceneData {
        /// Providing scene.
        provider_scene: SceneId,
        /// Provider slot in that scene.
        provider_data: DataSlotId,
    },
    /// An offscreen buffer sampled as texture.
    OffscreenBuffer(OffscreenBufferHandle),
    /// A stream buffer fed by the embedded compositor.
    StreamBuffer(StreamBufferHandle),
}

#[derive(Debug)]
pub(crate) struct OffscreenBufferInfo {
    pub(crate) device_handle: borealis_core::handle::DeviceResourceHandle,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) interruptible: bool,
}

#[derive(Debug)]
pub(crate) struct StreamBufferInfo {
    pub(crate) source: WaylandIviSurfaceId,
    pub(crate) enabled: bool,
}

#[derive(Debug, Default)]
pub(crate) struct SceneRecord {
    pub(crate) publication_mode: Option<ScenePublicationMode>,
    pub(crate) info: Option<SceneInfo>,
    pub(crate) subscription_requested: bool,
    pub(crate) received: bool,
    pub(crate) subscribed: bool,
    pub(crate) map_requested: bool,
    pub(crate) mapped: bool,
    pub(crate) shown: bool,
    /// Invalid buffer handle means the display framebuffer.
    pub(crate) buffer_assignment: OffscreenBufferHandle,
    pub(crate) render_order: i32,
    pub(crate) storage: SceneStorage,
    pub(crate) pending_flushes: VecDeque<SceneUpdate>,
    pub(crate) used_resources: HashSet<ResourceContentHash>,
    pub(crate) last_applied_flush: u64,
    pub(crate) expiration_timestamp_ms: Option<u64>,
    pub(crate) expired: bool,
    pub(crate) modified: bool,
}

impl SceneRecord {
    fn is_published(&self) -> bool {
        self.publication_mode.is_some()
    }
}

/// Scene state and display-context owner of one bundle.
pub struct SceneUpdater {
    pub(crate) display: DisplayHandle,
    platform: Arc<dyn Platform>,
    pub(crate) backend: Option<Box<dyn RenderBackend>>,
    pub(crate) upload_manager: Option<ResourceUploadManager>,
    pub(crate) registry: ResourceRegistry,
    pub(crate) display_config: Option<DisplayConfig>,
    warping_data: Option<WarpingMeshData>,
    pub(crate) clear_colors: HashMap<OffscreenBufferHandle, [f32; 4]>,
    pub(crate) offscreen_buffers: HashMap<OffscreenBufferHandle, OffscreenBufferInfo>,
    pub(crate) stream_buffers: HashMap<StreamBufferHandle, StreamBufferInfo>,
    pub(crate) scenes: HashMap<SceneId, SceneRecord>,
    data_links: HashMap<(SceneId, DataSlotId), LinkSource>,
    scene_events: Vec<SceneEvent>,
    pub(crate) events: EventCollector,
    flush_limits: PendingFlushLimits,
    pub(crate) skip_unmodified_buffers: bool,
    // log draw-skips only once per missing resource
    pub(crate) logged_missing_resources: HashSet<ResourceContentHash>,
}

impl SceneUpdater {
    /// Creates the updater of one display bundle.
    pub fn new(display: DisplayHandle, platform: Arc<dyn Platform>) -> Self {
        Self {
            display,
            platform,
            backend: None,
            upload_manager: None,
            registry: ResourceRegistry::new(),
            display_config: None,
            warping_data: None,
            clear_colors: HashMap::new(),
            offscreen_buffers: HashMap::new(),
            stream_buffers: HashMap::new(),
            scenes: HashMap::new(),
            data_links: HashMap::new(),
            scene_events: Vec::new(),
            events: EventCollector::new(),
            flush_limits: PendingFlushLimits::default(),
            skip_unmodified_buffers: true,
            logged_missing_resources: HashSet::new(),
        }
    }

    /// Whether the display context exists.
    pub fn has_display_context(&self) -> bool {
        self.backend.is_some()
    }

    /// Confirmation events for the scene control logic.
    pub fn take_scene_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.scene_events)
    }

    /// Moves user-facing events into the bundle collector.
    pub fn drain_events(&mut self, out: &mut EventCollector) {
        let mut renderer = Vec::new();
        let mut control = Vec::new();
        self.events.drain_renderer_events(&mut renderer);
        self.events.drain_scene_control_events(&mut control);
        for e in renderer {
            out.push_renderer_event(e);
        }
        for e in control {
            out.push_scene_control_event(e);
        }
    }

    // --- display context ---

    /// Creates the display context: backend, async shader uploader and
    /// upload manager. Emits `DisplayCreated`.
    pub fn create_display_context(
        &mut self,
        config: DisplayConfig,
        shader_cache: Option<Arc<dyn BinaryShaderCache>>,
        keep_effects: bool,
        gpu_cache_size: u64,
    ) -> bool {
        if self.backend.is_some() {
            log::error!("SceneUpdater display context for {} already exists", self.display);
            self.events.push_renderer_event(RendererEvent::DisplayCreated {
                display: self.display,
                result: EventResult::Failed,
            });
            return false;
        }

        let Some(mut backend) = self.platform.create_render_backend(self.display, &config)
        else {
            log::error!("SceneUpdater failed to create render backend for {}", self.display);
            self.events.push_renderer_event(RendererEvent::DisplayCreated {
                display: self.display,
                result: EventResult::Failed,
            });
            return false;
        };

        let mut async_uploader = AsyncShaderUploader::new(self.platform.clone(), self.display);
        if !async_uploader.start(backend.as_mut()) {
            log::error!("SceneUpdater failed to start async shader uploader for {}", self.display);
            self.platform.destroy_render_backend(self.display, backend);
            self.events.push_renderer_event(RendererEvent::DisplayCreated {
                display: self.display,
                result: EventResult::Failed,
            });
            return false;
        }

        self.upload_manager = Some(ResourceUploadManager::new(
            ResourceUploader::new(shader_cache),
            async_uploader,
            keep_effects,
            gpu_cache_size,
        ));
        self.backend = Some(backend);
        self.display_config = Some(config);
        self.events.push_renderer_event(RendererEvent::DisplayCreated {
            display: self.display,
            result: EventResult::Ok,
        });
        log::info!("SceneUpdater created display context for {}", self.display);
        true
    }

    /// Destroys the display context. Emits `DisplayDestroyed`.
    pub fn destroy_display_context(&mut self) -> bool {
        let (Some(mut backend), Some(mut manager)) =
            (self.backend.take(), self.upload_manager.take())
        else {
            log::error!("SceneUpdater no display context to destroy for {}", self.display);
            self.events.push_renderer_event(RendererEvent::DisplayDestroyed {
                display: self.display,
                result: EventResult::Failed,
            });
            return false;
        };

        manager.async_uploader_mut().stop();
        manager.unload_all(&mut self.registry, backend.as_mut());
        for (handle, info) in self.offscreen_buffers.drain() {
            log::debug!("SceneUpdater destroying leftover offscreen buffer {handle}");
            backend.device().delete_offscreen_buffer(info.device_handle);
        }
        self.platform.destroy_render_backend(self.display, backend);
        self.display_config = None;

        self.events.push_renderer_event(RendererEvent::DisplayDestroyed {
            display: self.display,
            result: EventResult::Ok,
        });
        log::info!("SceneUpdater destroyed display context for {}", self.display);
        true
    }

    // --- scene lifecycle ---

    /// A client published a scene.
    pub fn handle_scene_published(&mut self, scene: SceneId, mode: ScenePublicationMode) {
        let record = self.scenes.entry(scene).or_default();
        if record.is_published() {
            log::warn!("SceneUpdater {scene} already published");
            return;
        }
        record.publication_mode = Some(mode);
        self.scene_events.push(SceneEvent::Published { scene });
    }

    /// A client unpublished a scene; all local data is dropped.
    pub fn handle_scene_unpublished(&mut self, scene: SceneId) {
        if !self.scenes.get(&scene).is_some_and(SceneRecord::is_published) {
            log::warn!("SceneUpdater unpublish of unknown {scene}");
            return;
        }
        self.release_scene_content(scene);
        self.scenes.remove(&scene);
        self.scene_events.push(SceneEvent::Unpublished { scene });
    }

    /// Control logic requests subscription.
    pub fn handle_scene_subscription_request(&mut self, scene: SceneId) {
        let record = self.scenes.entry(scene).or_default();
        if !record.is_published() {
            log::error!("SceneUpdater cannot subscribe unpublished {scene}");
            self.scene_events.push(SceneEvent::SubscribeFailed { scene });
            return;
        }
        record.subscription_requested = true;
        // the transport relays the request; content arrives via
        // ReceiveScene + UpdateScene commands
    }

    /// Scene content announcement arrived.
    pub fn handle_scene_received(&mut self, info: SceneInfo) {
        let scene = info.scene;
        let Some(record) = self.scenes.get_mut(&scene) else {
            log::warn!("SceneUpdater received unknown {scene}");
            return;
        };
        if !record.subscription_requested {
            log::warn!("SceneUpdater received {scene} without subscription, ignoring");
            return;
        }
        log::info!("SceneUpdater received {scene} ('{}')", info.friendly_name);
        record.info = Some(info);
        record.received = true;
    }

    /// Control logic drops a subscription.
    pub fn handle_scene_unsubscribe_request(&mut self, scene: SceneId, forced: bool) {
        let Some(record) = self.scenes.get(&scene) else { return };
        if !record.received && !record.subscription_requested {
            log::warn!("SceneUpdater unsubscribe of unsubscribed {scene}");
            return;
        }
        self.release_scene_content(scene);
        self.scene_events.push(SceneEvent::Unsubscribed { scene, forced });
        if forced {
            self.events
                .push_scene_control_event(SceneControlEvent::SceneForcedToUnsubscribe { scene });
        }
    }

    fn release_scene_content(&mut self, scene: SceneId) {
        let Some(record) = self.scenes.get_mut(&scene) else { return };
        for hash in record.used_resources.drain() {
            self.registry.remove_scene_usage(hash, scene);
        }
        record.storage = SceneStorage::default();
        record.pending_flushes.clear();
        record.subscription_requested = false;
        record.received = false;
        record.subscribed = false;
        record.map_requested = false;
        record.mapped = false;
        record.shown = false;
        record.expiration_timestamp_ms = None;
        record.expired = false;
        self.data_links.retain(|(consumer, _), source| {
            *consumer != scene
                && !matches!(source, LinkSource::SceneData { provider_scene, .. } if *provider_scene == scene)
        });
    }

    /// Applies a serialized flush to a scene.
    pub fn handle_scene_update(&mut self, scene: SceneId, bytes: &[u8]) {
        let update = match SceneUpdate::decode(bytes) {
            Ok(update) => update,
            Err(e) => {
                log::error!("SceneUpdater dropping undecodable update for {scene}: {e}");
                return;
            }
        };

        let Some(record) = self.scenes.get_mut(&scene) else {
            log::warn!("SceneUpdater update for unknown {scene}");
            return;
        };
        if !record.received {
            log::warn!("SceneUpdater update for unsubscribed {scene}, dropped");
            return;
        }

        // new references start uploading before the flush is applied
        for &(hash, kind) in &update.resource_changes.added {
            self.registry.register(hash, kind);
            self.registry.add_scene_usage(hash, scene);
            record.used_resources.insert(hash);
        }
        for provided in &update.provided_resources {
            self.registry.set_provided(provided.hash, provided.blob.clone());
        }

        record.pending_flushes.push_back(update);
        self.try_apply_pending_flushes(scene);
        self.enforce_flush_limits(scene);
    }

    fn flush_is_applicable(
        registry: &ResourceRegistry,
        record: &SceneRecord,
        update: &SceneUpdate,
    ) -> bool {
        // only a scene on (or heading to) a display waits for residency
        if !(record.mapped || record.map_requested || record.shown) {
            return true;
        }
        update.resource_changes.added.iter().all(|(hash, _)| {
            matches!(
                registry.status(*hash),
                Some(ResourceStatus::Uploaded | ResourceStatus::Broken)
            )
        })
    }

    fn try_apply_pending_flushes(&mut self, scene: SceneId) {
        let Some(record) = self.scenes.get_mut(&scene) else { return };
        let force_apply = record.pending_flushes.len() > self.flush_limits.force_apply as usize;

        while let Some(update) = record.pending_flushes.front() {
            if !force_apply && !Self::flush_is_applicable(&self.registry, record, update) {
                break;
            }
            let update = record.pending_flushes.pop_front().unwrap();
            Self::apply_flush(&mut self.registry, record, scene, &update);
            self.events.push_scene_control_event(SceneControlEvent::SceneFlushed {
                scene,
                flush_index: update.flush_index,
            });
            if record.received && !record.subscribed {
                record.subscribed = true;
                self.scene_events.push(SceneEvent::Subscribed { scene });
            }
        }
    }

    fn apply_flush(
        registry: &mut ResourceRegistry,
        record: &mut SceneRecord,
        scene: SceneId,
        update: &SceneUpdate,
    ) {
        for action in &update.actions {
            if let Err(e) = record.storage.apply(scene, action.clone()) {
                log::error!("SceneUpdater action dropped: {e}");
            }
        }
        for &hash in &update.resource_changes.removed {
            registry.remove_scene_usage(hash, scene);
            record.used_resources.remove(&hash);
        }
        record.last_applied_flush = update.flush_index;
        record.modified = true;
        if let Some(ts) = update.expiration_timestamp_ms {
            record.expiration_timestamp_ms = Some(ts);
        } else {
            record.expiration_timestamp_ms = None;
            record.expired = false;
        }
        log::debug!(
            "SceneUpdater applied flush {} to {scene}",
            update.flush_index
        );
    }

    fn enforce_flush_limits(&mut self, scene: SceneId) {
        let Some(record) = self.scenes.get(&scene) else { return };
        let pending = record.pending_flushes.len();
        if pending > self.flush_limits.force_unsubscribe as usize {
            log::error!(
                "SceneUpdater {scene} exceeded force-unsubscribe limit with {pending} pending flushes"
            );
            self.handle_scene_unsubscribe_request(scene, true);
        }
    }

    // --- mapping / showing ---

    /// Control logic maps a scene onto this display.
    pub fn handle_scene_map_request(&mut self, scene: SceneId, display: DisplayHandle) {
        let has_context = self.backend.is_some();
        let Some(record) = self.scenes.get_mut(&scene) else {
            self.scene_events.push(SceneEvent::MapFailed { scene });
            return;
        };
        if display != self.display || !has_context || !record.subscribed {
            log::error!("SceneUpdater cannot map {scene} onto {display}");
            self.scene_events.push(SceneEvent::MapFailed { scene });
            return;
        }
        record.map_requested = true;
    }

    /// Control logic removes a scene from this display.
    pub fn handle_scene_unmap_request(&mut self, scene: SceneId) {
        let Some(record) = self.scenes.get_mut(&scene) else { return };
        if record.shown {
            log::error!("SceneUpdater refusing to unmap shown {scene}");
            return;
        }
        record.mapped = false;
        record.map_requested = false;
        self.scene_events.push(SceneEvent::Unmapped { scene });
    }

    /// Control logic shows a mapped scene.
    pub fn handle_scene_show_request(&mut self, scene: SceneId) {
        let Some(record) = self.scenes.get_mut(&scene) else {
            self.scene_events.push(SceneEvent::ShowFailed { scene });
            return;
        };
        if !record.mapped {
            log::error!("SceneUpdater cannot show unmapped {scene}");
            self.scene_events.push(SceneEvent::ShowFailed { scene });
            return;
        }
        record.shown = true;
        record.modified = true;
        self.scene_events.push(SceneEvent::Shown { scene });
    }

    /// Control logic hides a scene.
    pub fn handle_scene_hide_request(&mut self, scene: SceneId) {
        let Some(record) = self.scenes.get_mut(&scene) else { return };
        record.shown = false;
        record.modified = true;
        self.scene_events.push(SceneEvent::Hidden { scene });
    }

    /// Assigns a scene to a display buffer.
    pub fn handle_buffer_assignment(
        &mut self,
        scene: SceneId,
        buffer: OffscreenBufferHandle,
        render_order: i32,
    ) {
        if buffer.is_valid() && !self.offscreen_buffers.contains_key(&buffer) {
            log::error!("SceneUpdater buffer assignment to unknown {buffer}");
            return;
        }
        if let Some(record) = self.scenes.get_mut(&scene) {
            record.buffer_assignment = buffer;
            record.render_order = render_order;
            record.modified = true;
        }
    }

    // --- buffers ---

    /// Creates an offscreen buffer on this display.
    pub fn handle_buffer_create_request(
        &mut self,
        buffer: OffscreenBufferHandle,
        display: DisplayHandle,
        width: u32,
        height: u32,
        sample_count: u32,
        interruptible: bool,
    ) -> bool {
        if display != self.display || self.offscreen_buffers.contains_key(&buffer) {
            return false;
        }
        let Some(backend) = self.backend.as_mut() else { return false };
        let device_handle = backend
            .device()
            .create_offscreen_buffer(width, height, sample_count);
        if !device_handle.is_valid() {
            log::error!("SceneUpdater device failed to create offscreen buffer {buffer}");
            return false;
        }
        self.offscreen_buffers.insert(
            buffer,
            OffscreenBufferInfo {
                device_handle,
                width,
                height,
                interruptible,
            },
        );
        true
    }

    /// Destroys an offscreen buffer.
    pub fn handle_buffer_destroy_request(
        &mut self,
        buffer: OffscreenBufferHandle,
        display: DisplayHandle,
    ) -> bool {
        if display != self.display {
            return false;
        }
        let still_assigned = self
            .scenes
            .values()
            .any(|r| r.mapped && r.buffer_assignment == buffer);
        if still_assigned {
            log::error!("SceneUpdater cannot destroy {buffer}: scenes are assigned to it");
            return false;
        }
        let Some(info) = self.offscreen_buffers.remove(&buffer) else {
            return false;
        };
        if let Some(backend) = self.backend.as_mut() {
            backend.device().delete_offscreen_buffer(info.device_handle);
        }
        self.clear_colors.remove(&buffer);
        self.data_links
            .retain(|_, source| *source != LinkSource::OffscreenBuffer(buffer));
        true
    }

    /// Creates a stream buffer fed by the embedded compositor.
    pub fn handle_stream_buffer_create(
        &mut self,
        buffer: StreamBufferHandle,
        display: DisplayHandle,
        source: WaylandIviSurfaceId,
    ) {
        if display != self.display || self.stream_buffers.contains_key(&buffer) {
            log::error!("SceneUpdater cannot create stream buffer {buffer}");
            return;
        }
        self.stream_buffers.insert(
            buffer,
            StreamBufferInfo {
                source,
                enabled: true,
            },
        );
    }

    /// Destroys a stream buffer.
    pub fn handle_stream_buffer_destroy(
        &mut self,
        buffer: StreamBufferHandle,
        display: DisplayHandle,
    ) {
        if display != self.display || self.stream_buffers.remove(&buffer).is_none() {
            log::error!("SceneUpdater cannot destroy stream buffer {buffer}");
            return;
        }
        self.data_links
            .retain(|_, source| *source != LinkSource::StreamBuffer(buffer));
    }

    /// Enables or disables a stream buffer.
    pub fn set_stream_buffer_state(
        &mut self,
        buffer: StreamBufferHandle,
        display: DisplayHandle,
        enabled: bool,
    ) {
        if display != self.display {
            return;
        }
        if let Some(info) = self.stream_buffers.get_mut(&buffer) {
            info.enabled = enabled;
        }
    }

    /// Sets the clear color of a display buffer; invalid handle selects
    /// the framebuffer.
    pub fn handle_set_clear_color(
        &mut self,
        display: DisplayHandle,
        buffer: OffscreenBufferHandle,
        color: [f32; 4],
    ) {
        if display != self.display {
            return;
        }
        if buffer.is_valid() && !self.offscreen_buffers.contains_key(&buffer) {
            log::error!("SceneUpdater clear color for unknown {buffer}");
            return;
        }
        self.clear_colors.insert(buffer, color);
    }

    // --- linking ---

    /// Links a provider scene's data slot to a consumer scene's slot.
    pub fn handle_scene_data_link_request(
        &mut self,
        provider_scene: SceneId,
        provider_data: DataSlotId,
        consumer_scene: SceneId,
        consumer_data: DataSlotId,
    ) {
        let ok = self.slot_kind(provider_scene, provider_data) == Some(DataSlotKind::Provider)
            && self.slot_kind(consumer_scene, consumer_data) == Some(DataSlotKind::Consumer);
        if ok {
            self.data_links.insert(
                (consumer_scene, consumer_data),
                LinkSource::SceneData {
                    provider_scene,
                    provider_data,
                },
            );
        } else {
            log::error!(
                "SceneUpdater data link {provider_scene}/{provider_data} -> {consumer_scene}/{consumer_data} failed"
            );
        }
        self.events.push_scene_control_event(SceneControlEvent::DataLinked {
            provider_scene,
            provider_data,
            consumer_scene,
            consumer_data,
            result: EventResult::from_success(ok),
        });
    }

    /// Links an offscreen buffer into a consumer scene's slot.
    pub fn handle_buffer_to_scene_data_link_request(
        &mut self,
        provider_buffer: OffscreenBufferHandle,
        consumer_scene: SceneId,
        consumer_data: DataSlotId,
    ) {
        let ok = self.offscreen_buffers.contains_key(&provider_buffer)
            && self.slot_kind(consumer_scene, consumer_data) == Some(DataSlotKind::Consumer);
        if ok {
            self.data_links.insert(
                (consumer_scene, consumer_data),
                LinkSource::OffscreenBuffer(provider_buffer),
            );
        } else {
            log::error!(
                "SceneUpdater buffer link {provider_buffer} -> {consumer_scene}/{consumer_data} failed"
            );
        }
        self.events.push_scene_control_event(SceneControlEvent::DataLinked {
            provider_scene: SceneId::INVALID,
            provider_data: DataSlotId(0),
            consumer_scene,
            consumer_data,
            result: EventResult::from_success(ok),
        });
    }

    /// Links a stream buffer into a consumer scene's slot.
    pub fn handle_stream_buffer_to_scene_data_link_request(
        &mut self,
        provider_buffer: StreamBufferHandle,
        consumer_scene: SceneId,
        consumer_data: DataSlotId,
    ) {
        let ok = self.stream_buffers.contains_key(&provider_buffer)
            && self.slot_kind(consumer_scene, consumer_data) == Some(DataSlotKind::Consumer);
        if ok {
            self.data_links.insert(
                (consumer_scene, consumer_data),
                LinkSource::StreamBuffer(provider_buffer),
            );
        } else {
            log::error!(
                "SceneUpdater stream link {provider_buffer} -> {consumer_scene}/{consumer_data} failed"
            );
        }
        self.events.push_scene_control_event(SceneControlEvent::DataLinked {
            provider_scene: SceneId::INVALID,
            provider_data: DataSlotId(0),
            consumer_scene,
            consumer_data,
            result: EventResult::from_success(ok),
        });
    }

    /// Removes the link feeding a consumer slot.
    pub fn handle_data_unlink_request(&mut self, consumer_scene: SceneId, consumer_data: DataSlotId) {
        let removed = self
            .data_links
            .remove(&(consumer_scene, consumer_data))
            .is_some();
        if !removed {
            log::error!("SceneUpdater unlink of unlinked {consumer_scene}/{consumer_data}");
        }
        self.events.push_scene_control_event(SceneControlEvent::DataUnlinked {
            consumer_scene,
            consumer_data,
            result: EventResult::from_success(removed),
        });
    }

    fn slot_kind(&self, scene: SceneId, slot: DataSlotId) -> Option<DataSlotKind> {
        self.scenes
            .get(&scene)
            .and_then(|r| r.storage.data_slot(slot))
            .map(|s| s.kind)
    }

    /// Current link source of a consumer slot.
    pub fn link_source(&self, consumer_scene: SceneId, consumer_data: DataSlotId) -> Option<LinkSource> {
        self.data_links.get(&(consumer_scene, consumer_data)).copied()
    }

    // --- picking, read pixels, logging ---

    /// Performs a pick at normalized display coordinates.
    pub fn handle_pick_event(&mut self, scene: SceneId, coords_normalized: [f32; 2]) {
        let Some(record) = self.scenes.get(&scene) else { return };
        let ids = record.storage.pick(coords_normalized);
        if !ids.is_empty() {
            self.events.push_scene_control_event(SceneControlEvent::ObjectsPicked {
                scene,
                pickable_ids: ids,
            });
        }
    }

    /// Reads pixels back from a display buffer.
    pub fn handle_read_pixels(
        &mut self,
        display: DisplayHandle,
        buffer: OffscreenBufferHandle,
        rect: PixelRect,
        full_screen: bool,
        filename: Option<&str>,
        send_via_dlt: bool,
    ) {
        let pixels = self.read_pixels_impl(display, buffer, rect, full_screen);

        match &pixels {
            Some(data) => {
                if let Some(path) = filename {
                    if let Err(e) = std::fs::write(path, data) {
                        log::error!("SceneUpdater failed to write screenshot '{path}': {e}");
                    }
                }
                if send_via_dlt {
                    log::info!(
                        "SceneUpdater screenshot of {} B ready for DLT transfer",
                        data.len()
                    );
                }
            }
            None => log::error!("SceneUpdater read pixels failed on {display}"),
        }

        let result = EventResult::from_success(pixels.is_some());
        self.events.push_renderer_event(RendererEvent::ReadPixels {
            display,
            buffer,
            pixels: pixels.unwrap_or_default(),
            result,
        });
    }

    fn read_pixels_impl(
        &mut self,
        display: DisplayHandle,
        buffer: OffscreenBufferHandle,
        mut rect: PixelRect,
        full_screen: bool,
    ) -> Option<Vec<u8>> {
        if display != self.display || self.backend.is_none() {
            return None;
        }

        let target = if buffer.is_valid() {
            let info = self.offscreen_buffers.get(&buffer)?;
            if full_screen {
                rect = PixelRect {
                    x: 0,
                    y: 0,
                    width: info.width,
                    height: info.height,
                };
            }
            Some(info.device_handle)
        } else {
            if full_screen {
                let config = self.display_config.as_ref()?;
                rect = PixelRect {
                    x: 0,
                    y: 0,
                    width: config.window_width,
                    height: config.window_height,
                };
            }
            None
        };

        self.backend.as_mut()?.device().read_pixels(target, rect)
    }

    /// Stores warping mesh data for the display.
    pub fn set_warping_data(&mut self, data: WarpingMeshData) -> bool {
        let warping_enabled = self
            .display_config
            .as_ref()
            .is_some_and(|c| c.warping_enabled);
        if !warping_enabled {
            return false;
        }
        self.warping_data = Some(data);
        true
    }

    /// Writes renderer internals to the log.
    pub fn log_renderer_info(
        &self,
        topic: RendererLogTopic,
        verbose: bool,
        node_filter: Option<SceneId>,
    ) {
        if matches!(topic, RendererLogTopic::All | RendererLogTopic::Scenes) {
            for (id, record) in &self.scenes {
                if node_filter.is_some_and(|f| f != *id) {
                    continue;
                }
                log::info!(
                    "Scene {id}: published={} subscribed={} mapped={} shown={} pendingFlushes={}",
                    record.is_published(),
                    record.subscribed,
                    record.mapped,
                    record.shown,
                    record.pending_flushes.len()
                );
                if verbose {
                    log::info!(
                        "  nodes={} meshes={} passes={}",
                        record.storage.node_count(),
                        record.storage.mesh_count(),
                        record.storage.render_pass_count()
                    );
                }
            }
        }
        if matches!(topic, RendererLogTopic::All | RendererLogTopic::Resources) {
            log::info!(
                "Registry: {} resources, {} provided, resident {} B",
                self.registry.all_hashes().len(),
                self.registry.get_all_provided().len(),
                self.upload_manager.as_ref().map_or(0, |m| m.resident_bytes())
            );
        }
        if matches!(topic, RendererLogTopic::All | RendererLogTopic::Links) {
            for ((consumer, slot), source) in &self.data_links {
                log::info!("Link {consumer}/{slot} <- {source:?}");
            }
        }
    }

    /// Sets the force-apply pending flush limit.
    pub fn set_limit_flushes_force_apply(&mut self, limit: u32) {
        self.flush_limits.force_apply = limit;
    }

    /// Sets the force-unsubscribe pending flush limit.
    pub fn set_limit_flushes_force_unsubscribe(&mut self, limit: u32) {
        self.flush_limits.force_unsubscribe = limit;
    }

    /// Toggles skipping of unmodified buffers during rendering.
    pub fn set_skipping_of_unmodified_buffers(&mut self, enable: bool) {
        self.skip_unmodified_buffers = enable;
    }

    // --- per-frame update ---

    /// Runs one update pass: compositor requests, resource uploads,
    /// deferred flushes, mapping progress and expiration checks.
    pub fn update(&mut self, frame_timer: &FrameTimer, stats: &mut RendererStatistics) {
        if let (Some(backend), Some(manager)) =
            (self.backend.as_mut(), self.upload_manager.as_mut())
        {
            let compositor = backend.embedded_compositor();
            compositor.handle_requests();
            for change in compositor.dispatch_stream_changes() {
                self.events.push_scene_control_event(
                    SceneControlEvent::StreamAvailabilityChanged {
                        stream: change.stream,
                        available: change.available,
                    },
                );
            }

            manager.upload_and_unload_pending_resources(
                &mut self.registry,
                backend.as_mut(),
                frame_timer,
                stats,
            );
        }

        let scenes: Vec<SceneId> = self.scenes.keys().copied().collect();
        for scene in scenes {
            self.try_apply_pending_flushes(scene);
            self.update_mapping_progress(scene);
        }
        self.check_expirations();
    }

    fn update_mapping_progress(&mut self, scene: SceneId) {
        let Some(record) = self.scenes.get_mut(&scene) else { return };
        if !record.map_requested {
            return;
        }
        let resources_settled = record.used_resources.iter().all(|hash| {
            matches!(
                self.registry.status(*hash),
                Some(ResourceStatus::Uploaded | ResourceStatus::Broken)
            )
        });
        if record.pending_flushes.is_empty() && resources_settled {
            record.map_requested = false;
            record.mapped = true;
            record.modified = true;
            self.scene_events.push(SceneEvent::Mapped { scene });
        }
    }

    fn check_expirations(&mut self) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        for (&scene, record) in &mut self.scenes {
            let Some(ts) = record.expiration_timestamp_ms else { continue };
            if now_ms > ts && !record.expired {
                record.expired = true;
                log::error!("SceneUpdater {scene} content expired");
                self.events
                    .push_scene_control_event(SceneControlEvent::SceneExpired { scene });
            } else if now_ms <= ts && record.expired {
                record.expired = false;
                self.events.push_scene_control_event(
                    SceneControlEvent::SceneRecoveredFromExpiration { scene },
                );
            }
        }
    }
}
