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

//! Headless platform factory.

use crate::compositor::{HeadlessEmbeddedCompositor, HeadlessTextureUploadAdapter, StreamTable};
use crate::device::{DeviceStats, HeadlessDevice};
use crate::surface::{HeadlessSurface, SurfaceState};
use borealis_core::config::DisplayConfig;
use borealis_core::device::{
    Device, EmbeddedCompositor, Platform, RenderBackend, Surface, TextureUploadAdapter,
    UploadBackend,
};
use borealis_core::handle::{DisplayHandle, WaylandIviSurfaceId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

struct DisplayShared {
    surface_state: Arc<SurfaceState>,
    stats: Arc<DeviceStats>,
    streams: Arc<StreamTable>,
}

/// [`Platform`] creating headless backends.
///
/// Keeps per-display shared state so the shared-context handshake can
/// be verified: [`Platform::create_upload_backend`] fails while the
/// display's primary surface is enabled.
#[derive(Default)]
pub struct HeadlessPlatform {
    displays: Mutex<HashMap<DisplayHandle, DisplayShared>>,
    fail_display_creation: AtomicBool,
}

impl HeadlessPlatform {
    /// Creates an empty platform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent display creation fail. Test hook.
    pub fn fail_display_creation(&self, fail: bool) {
        self.fail_display_creation.store(fail, Ordering::SeqCst);
    }

    /// Device stats of a created display, for inspection.
    pub fn device_stats(&self, display: DisplayHandle) -> Option<Arc<DeviceStats>> {
        self.displays
            .lock()
            .unwrap()
            .get(&display)
            .map(|d| d.stats.clone())
    }

    /// Surface state of a created display, for inspection.
    pub fn surface_state(&self, display: DisplayHandle) -> Option<Arc<SurfaceState>> {
        self.displays
            .lock()
            .unwrap()
            .get(&display)
            .map(|d| d.surface_state.clone())
    }

    /// Injects embedded-compositor stream availability on a display.
    pub fn set_stream_available(
        &self,
        display: DisplayHandle,
        stream: WaylandIviSurfaceId,
        available: bool,
    ) {
        if let Some(shared) = self.displays.lock().unwrap().get(&display) {
            shared.streams.set_available(stream, available);
        }
    }
}

struct HeadlessRenderBackend {
    device: HeadlessDevice,
    surface: HeadlessSurface,
    compositor: HeadlessEmbeddedCompositor,
    adapter: HeadlessTextureUploadAdapter,
}

impl RenderBackend for HeadlessRenderBackend {
    fn device(&mut self) -> &mut dyn Device {
        &mut self.device
    }

    fn surface(&self) -> &dyn Surface {
        &self.surface
    }

    fn embedded_compositor(&mut self) -> &mut dyn EmbeddedCompositor {
        &mut self.compositor
    }

    fn texture_upload_adapter(&mut self) -> &mut dyn TextureUploadAdapter {
        &mut self.adapter
    }
}

struct HeadlessUploadBackend {
    device: HeadlessDevice,
    context: HeadlessSurface,
}

impl UploadBackend for HeadlessUploadBackend {
    fn device(&mut self) -> &mut dyn Device {
        &mut self.device
    }

    fn context(&self) -> &dyn Surface {
        &self.context
    }
}

impl Platform for HeadlessPlatform {
    fn create_render_backend(
        &self,
        display: DisplayHandle,
        config: &DisplayConfig,
    ) -> Option<Box<dyn RenderBackend>> {
        if self.fail_display_creation.load(Ordering::SeqCst) {
            log::error!("HeadlessPlatform display creation failing by request");
            return None;
        }
        if config.validate().is_err() {
            return None;
        }

        let shared = DisplayShared {
            surface_state: Arc::new(SurfaceState::default()),
            stats: Arc::new(DeviceStats::default()),
            streams: Arc::new(StreamTable::default()),
        };
        let backend = HeadlessRenderBackend {
            device: HeadlessDevice::new(shared.stats.clone()),
            surface: HeadlessSurface::new(shared.surface_state.clone()),
            compositor: HeadlessEmbeddedCompositor::new(shared.streams.clone()),
            adapter: HeadlessTextureUploadAdapter,
        };
        backend.surface.enable();

        self.displays.lock().unwrap().insert(display, shared);
        Some(Box::new(backend))
    }

    fn destroy_render_backend(&self, display: DisplayHandle, backend: Box<dyn RenderBackend>) {
        backend.surface().disable();
        self.displays.lock().unwrap().remove(&display);
    }

    fn create_upload_backend(&self, display: DisplayHandle) -> Option<Box<dyn UploadBackend>> {
        let displays = self.displays.lock().unwrap();
        let shared = displays.get(&display)?;
        if shared.surface_state.is_enabled() {
            log::error!(
                "HeadlessPlatform refusing shared context for {display}: primary surface still enabled"
            );
            return None;
        }

        let context = HeadlessSurface::new(Arc::new(SurfaceState::default()));
        // shared context becomes current on the calling (uploader) thread
        context.enable();
        Some(Box::new(HeadlessUploadBackend {
            device: HeadlessDevice::new(shared.stats.clone()),
            context,
        }))
    }

    fn destroy_upload_backend(&self, _display: DisplayHandle, backend: Box<dyn UploadBackend>) {
        backend.context().disable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_backend_requires_disabled_surface() {
        let platform = HeadlessPlatform::new();
        let display = DisplayHandle(1);
        let backend = platform
            .create_render_backend(display, &DisplayConfig::default())
            .unwrap();

        // surface is enabled right after creation: handshake must fail
        assert!(platform.create_upload_backend(display).is_none());

        backend.surface().disable();
        let upload = platform.create_upload_backend(display);
        assert!(upload.is_some());
        platform.destroy_upload_backend(display, upload.unwrap());
    }

    #[test]
    fn unknown_display_has_no_upload_backend(){
        let platform = HeadlessPlatform::new();
        assert!(platform.create_upload_backend(DisplayHandle(9)).is_none());
    }

    #[test]
    fn forced_creation_failure() {
        let platform = HeadlessPlatform::new();
        platform.fail_display_creation(true);
        assert!(platform
            .create_render_backend(DisplayHandle(1), &DisplayConfig::default())
            .is_none());
    }

    #[test]
    fn upload_devices_share_allocation_stats() {
        let platform = HeadlessPlatform::new();
        let display = DisplayHandle(1);
        let mut backend = platform
            .create_render_backend(display, &DisplayConfig::default())
            .unwrap();
        backend
            .device()
            .allocate_buffer(borealis_core::resource::ResourceKind::IndexBuffer, &[0; 64]);
        let stats = platform.device_stats(display).unwrap();
        assert_eq!(stats.allocated(), 64);
    }
}
