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

//! The headless in-memory device.

use borealis_core::device::{
    BinaryShaderFormat, CompiledShader, Device, EffectSource, MeshBatch, PixelRect,
};
use borealis_core::handle::DeviceResourceHandle;
use borealis_core::resource::ResourceKind;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The one binary shader format the headless device understands.
pub const HEADLESS_BINARY_SHADER_FORMAT: BinaryShaderFormat = BinaryShaderFormat(0xB0);

/// Marker in shader source that makes compilation fail. Mirrors a
/// preprocessor error in real shader source.
const COMPILE_ERROR_MARKER: &str = "#error";

/// Shared counters observable while a device is owned by the renderer.
#[derive(Debug, Default)]
pub struct DeviceStats {
    /// Bytes currently allocated.
    pub allocated_bytes: AtomicU64,
    /// Draw calls issued since creation.
    pub draw_calls: AtomicU64,
    /// Shaders compiled (on any context) since creation.
    pub shader_compiles: AtomicU64,
    /// Resources deleted since creation.
    pub deletions: AtomicU64,
}

impl DeviceStats {
    /// Current allocation in bytes.
    pub fn allocated(&self) -> u64 {
        self.allocated_bytes.load(Ordering::SeqCst)
    }

    /// Draw calls issued so far.
    pub fn draws(&self) -> u64 {
        self.draw_calls.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
enum Entry {
    Texture { bytes: u64 },
    Buffer { bytes: u64 },
    Shader { binary: Vec<u8>, format: BinaryShaderFormat },
    OffscreenBuffer { width: u32, height: u32, bytes: u64 },
}

impl Entry {
    fn bytes(&self) -> u64 {
        match self {
            Entry::Texture { bytes } | Entry::Buffer { bytes } | Entry::OffscreenBuffer { bytes, .. } => {
                *bytes
            }
            Entry::Shader { binary, .. } => binary.len() as u64,
        }
    }
}

/// In-memory [`Device`] tracking every allocation.
///
/// Each entry records its size so the allocation counter stays exact
/// across deletion, matching what the registry's resident accounting
/// expects from a real device.
#[derive(Debug)]
pub struct HeadlessDevice {
    next_handle: u64,
    entries: HashMap<DeviceResourceHandle, Entry>,
    active_target: Option<DeviceResourceHandle>,
    clear_color: [f32; 4],
    stats: Arc<DeviceStats>,
}

impl HeadlessDevice {
    /// Creates a device reporting into the shared stats block.
    pub fn new(stats: Arc<DeviceStats>) -> Self {
        Self {
            next_handle: 1,
            entries: HashMap::new(),
            active_target: None,
            clear_color: [0.0; 4],
            stats,
        }
    }

    fn insert(&mut self, entry: Entry) -> DeviceResourceHandle {
        let handle = DeviceResourceHandle(self.next_handle);
        self.next_handle += 1;
        self.stats
            .allocated_bytes
            .fetch_add(entry.bytes(), Ordering::SeqCst);
        self.entries.insert(handle, entry);
        handle
    }

    fn remove(&mut self, handle: DeviceResourceHandle) {
        if let Some(entry) = self.entries.remove(&handle) {
            self.stats
                .allocated_bytes
                .fetch_sub(entry.bytes(), Ordering::SeqCst);
            self.stats.deletions.fetch_add(1, Ordering::SeqCst);
        } else {
            log::warn!("HeadlessDevice delete of unknown handle {handle}");
        }
    }

    /// Number of live entries, all types included.
    pub fn live_entries(&self) -> usize {
        self.entries.len()
    }
}

impl Device for HeadlessDevice {
    fn allocate_texture(&mut self, kind: ResourceKind, data: &[u8]) -> DeviceResourceHandle {
        debug_assert!(matches!(
            kind,
            ResourceKind::Texture2D | ResourceKind::Texture3D | ResourceKind::TextureCube
        ));
        if data.is_empty() {
            return DeviceResourceHandle::INVALID;
        }
        self.insert(Entry::Texture {
            bytes: data.len() as u64,
        })
    }

    fn allocate_buffer(&mut self, kind: ResourceKind, data: &[u8]) -> DeviceResourceHandle {
        debug_assert!(matches!(
            kind,
            ResourceKind::ArrayBuffer | ResourceKind::IndexBuffer
        ));
        if data.is_empty() {
            return DeviceResourceHandle::INVALID;
        }
        self.insert(Entry::Buffer {
            bytes: data.len() as u64,
        })
    }

    fn compile_shader(&mut self, effect: &EffectSource) -> Option<CompiledShader> {
        self.stats.shader_compiles.fetch_add(1, Ordering::SeqCst);
        if effect.vertex_source.contains(COMPILE_ERROR_MARKER)
            || effect.fragment_source.contains(COMPILE_ERROR_MARKER)
        {
            log::error!("HeadlessDevice shader compile failed for '{}'", effect.name);
            return None;
        }
        let mut binary = effect.name.as_bytes().to_vec();
        binary.extend(effect.vertex_source.as_bytes());
        binary.extend(effect.fragment_source.as_bytes());
        Some(CompiledShader {
            binary,
            format: HEADLESS_BINARY_SHADER_FORMAT,
        })
    }

    fn register_shader(&mut self, shader: CompiledShader) -> DeviceResourceHandle {
        if shader.format != HEADLESS_BINARY_SHADER_FORMAT {
            return DeviceResourceHandle::INVALID;
        }
        self.insert(Entry::Shader {
            binary: shader.binary,
            format: shader.format,
        })
    }

    fn upload_binary_shader(
        &mut self,
        binary: &[u8],
        format: BinaryShaderFormat,
    ) -> DeviceResourceHandle {
        if format != HEADLESS_BINARY_SHADER_FORMAT || binary.is_empty() {
            return DeviceResourceHandle::INVALID;
        }
        self.insert(Entry::Shader {
            binary: binary.to_vec(),
            format,
        })
    }

    fn get_binary_shader(
        &self,
        handle: DeviceResourceHandle,
    ) -> Option<(Vec<u8>, BinaryShaderFormat)> {
        match self.entries.get(&handle) {
            Some(Entry::Shader { binary, format }) => Some((binary.clone(), *format)),
            _ => None,
        }
    }

    fn supported_binary_shader_formats(&self) -> Vec<BinaryShaderFormat> {
        vec![HEADLESS_BINARY_SHADER_FORMAT]
    }

    fn delete_resource(&mut self, handle: DeviceResourceHandle) {
        self.remove(handle);
    }

    fn create_offscreen_buffer(
        &mut self,
        width: u32,
        height: u32,
        sample_count: u32,
    ) -> DeviceResourceHandle {
        if width == 0 || height == 0 || sample_count == 0 {
            return DeviceResourceHandle::INVALID;
        }
        let bytes = u64::from(width) * u64::from(height) * 4 * u64::from(sample_count);
        self.insert(Entry::OffscreenBuffer {
            width,
            height,
            bytes,
        })
    }

    fn delete_offscreen_buffer(&mut self, handle: DeviceResourceHandle) {
        self.remove(handle);
    }

    fn activate_render_target(&mut self, target: Option<DeviceResourceHandle>) {
        self.active_target = target;
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    fn draw(&mut self, batch: &MeshBatch) {
        debug_assert!(batch.effect.is_valid());
        debug_assert!(batch.index_buffer.is_valid());
        self.stats.draw_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn read_pixels(
        &mut self,
        target: Option<DeviceResourceHandle>,
        rect: PixelRect,
    ) -> Option<Vec<u8>> {
        if let Some(handle) = target {
            match self.entries.get(&handle) {
                Some(Entry::OffscreenBuffer { width, height, .. }) => {
                    if rect.x + rect.width > *width || rect.y + rect.height > *height {
                        return None;
                    }
                }
                _ => return None,
            }
        }
        let texel = self.clear_color.map(|c| (c.clamp(0.0, 1.0) * 255.0) as u8);
        let count = (rect.width * rect.height) as usize;
        let mut pixels = Vec::with_capacity(count * 4);
        for _ in 0..count {
            pixels.extend_from_slice(&texel);
        }
        Some(pixels)
    }

    fn allocated_bytes(&self) -> u64 {
        self.stats.allocated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> (HeadlessDevice, Arc<DeviceStats>) {
        let stats = Arc::new(DeviceStats::default());
        (HeadlessDevice::new(stats.clone()), stats)
    }

    #[test]
    fn allocation_accounting_is_exact() {
        let (mut dev, stats) = device();
        let a = dev.allocate_buffer(ResourceKind::IndexBuffer, &[0; 100]);
        let b = dev.allocate_texture(ResourceKind::Texture2D, &[0; 50]);
        assert!(a.is_valid() && b.is_valid());
        assert_eq!(stats.allocated(), 150);

        dev.delete_resource(a);
        assert_eq!(stats.allocated(), 50);
        dev.delete_resource(b);
        assert_eq!(stats.allocated(), 0);
        assert_eq!(dev.live_entries(), 0);
    }

    #[test]
    fn empty_payload_upload_is_broken() {
        let (mut dev, _) = device();
        assert!(!dev.allocate_buffer(ResourceKind::ArrayBuffer, &[]).is_valid());
        assert!(!dev.allocate_texture(ResourceKind::Texture2D, &[]).is_valid());
    }

    #[test]
    fn shader_compile_and_register_round_trip() {
        let (mut dev, _) = device();
        let effect = EffectSource {
            name: "e".into(),
            vertex_source: "v".into(),
            fragment_source: "f".into(),
        };
        let compiled = dev.compile_shader(&effect).unwrap();
        let handle = dev.register_shader(compiled);
        assert!(handle.is_valid());
        let (binary, format) = dev.get_binary_shader(handle).unwrap();
        assert_eq!(format, HEADLESS_BINARY_SHADER_FORMAT);
        assert!(!binary.is_empty());
    }

    #[test]
    fn error_marker_fails_compilation() {
        let (mut dev, _) = device();
        let effect = EffectSource {
            name: "bad".into(),
            vertex_source: "#error nope".into(),
            fragment_source: "f".into(),
        };
        assert!(dev.compile_shader(&effect).is_none());
    }

    #[test]
    fn read_pixels_respects_bounds() {
        let (mut dev, _) = device();
        let ob = dev.create_offscreen_buffer(16, 16, 1);
        let ok = dev.read_pixels(
            Some(ob),
            PixelRect {
                x: 0,
                y: 0,
                width: 16,
                height: 16,
            },
        );
        assert_eq!(ok.unwrap().len(), 16 * 16 * 4);

        let out_of_bounds = dev.read_pixels(
            Some(ob),
            PixelRect {
                x: 8,
                y: 8,
                width: 16,
                height: 16,
            },
        );
        assert!(out_of_bounds.is_none());
    }
}
