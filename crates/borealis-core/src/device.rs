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

//! The render backend abstraction.
//!
//! These traits are the central point of interaction with the underlying
//! graphics stack. A backend bundles a [`Device`] (GPU resources and draw
//! calls), a [`Surface`] (context ownership and buffer swapping), an
//! [`EmbeddedCompositor`] and a [`TextureUploadAdapter`]. Failure of any
//! create or upload is reported by returning the invalid
//! [`DeviceResourceHandle`]; callers treat it as "upload broken".
//!
//! GPU contexts are strictly thread-affine. The [`Platform`] factory
//! creates one backend per display and, on demand, an [`UploadBackend`]
//! whose shared context must be created on the uploader thread while the
//! primary surface is disabled.

use crate::config::DisplayConfig;
use crate::handle::{DeviceResourceHandle, DisplayHandle, WaylandIviSurfaceId};
use crate::resource::ResourceKind;
use serde::{Deserialize, Serialize};

/// Identifies a binary shader representation understood by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BinaryShaderFormat(pub u32);

/// Effect payload: named vertex + fragment source pair.
///
/// This is the decoded form of a [`ResourceKind::Effect`] blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectSource {
    /// Debug name of the effect.
    pub name: String,
    /// Vertex stage source.
    pub vertex_source: String,
    /// Fragment stage source.
    pub fragment_source: String,
}

impl EffectSource {
    /// Decodes an effect from its blob payload.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        bincode::deserialize(payload).ok()
    }

    /// Encodes the effect into a blob payload.
    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).expect("effect source serialization cannot fail")
    }
}

/// A shader compiled off the render thread, ready for registration.
///
/// Produced by [`Device::compile_shader`] on the upload backend and
/// consumed by [`Device::register_shader`] on the owning backend.
#[derive(Debug)]
pub struct CompiledShader {
    /// Backend-specific program binary.
    pub binary: Vec<u8>,
    /// Format of `binary`.
    pub format: BinaryShaderFormat,
}

/// A minimal draw call: one mesh with its bound resources.
#[derive(Debug, Clone)]
pub struct MeshBatch {
    /// Shader program to bind.
    pub effect: DeviceResourceHandle,
    /// Index buffer to bind.
    pub index_buffer: DeviceResourceHandle,
    /// Vertex buffers to bind, in attribute order.
    pub vertex_buffers: Vec<DeviceResourceHandle>,
    /// Textures to bind, in sampler order.
    pub textures: Vec<DeviceResourceHandle>,
    /// Number of indices to draw.
    pub index_count: u32,
}

/// Rectangle in pixels, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    /// Left edge.
    pub x: u32,
    /// Bottom edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// GPU device: resource lifecycle and draw submission.
pub trait Device: Send {
    /// Uploads texture data, returns the invalid handle on failure.
    fn allocate_texture(&mut self, kind: ResourceKind, data: &[u8]) -> DeviceResourceHandle;

    /// Uploads an array or index buffer, returns the invalid handle on failure.
    fn allocate_buffer(&mut self, kind: ResourceKind, data: &[u8]) -> DeviceResourceHandle;

    /// Compiles an effect into a shader program.
    ///
    /// Used on the upload backend's shared context; `None` signals a
    /// compile failure.
    fn compile_shader(&mut self, effect: &EffectSource) -> Option<CompiledShader>;

    /// Registers a shader compiled elsewhere on a shared context.
    fn register_shader(&mut self, shader: CompiledShader) -> DeviceResourceHandle;

    /// Uploads a pre-compiled shader binary from the binary shader cache.
    fn upload_binary_shader(
        &mut self,
        binary: &[u8],
        format: BinaryShaderFormat,
    ) -> DeviceResourceHandle;

    /// Reads back a shader's binary form for persisting to the cache.
    fn get_binary_shader(
        &self,
        handle: DeviceResourceHandle,
    ) -> Option<(Vec<u8>, BinaryShaderFormat)>;

    /// Binary shader formats this device can consume.
    fn supported_binary_shader_formats(&self) -> Vec<BinaryShaderFormat>;

    /// Releases any resource previously returned by this device.
    fn delete_resource(&mut self, handle: DeviceResourceHandle);

    /// Creates an offscreen render target, invalid handle on failure.
    fn create_offscreen_buffer(
        &mut self,
        width: u32,
        height: u32,
        sample_count: u32,
    ) -> DeviceResourceHandle;

    /// Releases an offscreen render target.
    fn delete_offscreen_buffer(&mut self, handle: DeviceResourceHandle);

    /// Selects the render target for subsequent draws; `None` is the
    /// display framebuffer.
    fn activate_render_target(&mut self, target: Option<DeviceResourceHandle>);

    /// Clears the active render target.
    fn clear(&mut self, color: [f32; 4]);

    /// Issues one draw call.
    fn draw(&mut self, batch: &MeshBatch);

    /// Reads pixels back from a render target; `None` on failure.
    fn read_pixels(
        &mut self,
        target: Option<DeviceResourceHandle>,
        rect: PixelRect,
    ) -> Option<Vec<u8>>;

    /// Total bytes currently allocated on this device.
    fn allocated_bytes(&self) -> u64;
}

/// Windowing surface owning a GPU context.
///
/// Contexts are thread-affine: after the first [`Surface::enable`] only
/// the enabling thread may touch the context until it is disabled.
pub trait Surface: Send {
    /// Makes the context current on the calling thread.
    fn enable(&self) -> bool;

    /// Releases the context from the current thread.
    fn disable(&self);

    /// Presents the back buffer.
    fn swap_buffers(&self);
}

/// Availability change of one embedded-compositor stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamAvailability {
    /// The stream source surface.
    pub stream: WaylandIviSurfaceId,
    /// Whether content is now available.
    pub available: bool,
}

/// External video/surface composition source.
pub trait EmbeddedCompositor: Send {
    /// Processes pending client requests.
    fn handle_requests(&mut self);

    /// Whether the given stream currently provides content.
    fn has_content_for_stream(&self, stream: WaylandIviSurfaceId) -> bool;

    /// Drains availability changes since the last call.
    fn dispatch_stream_changes(&mut self) -> Vec<StreamAvailability>;
}

/// Adapter for platform-specific texture upload paths.
pub trait TextureUploadAdapter: Send {
    /// Uploads 2D texel data into an existing texture.
    fn upload_texture_2d(
        &mut self,
        handle: DeviceResourceHandle,
        width: u32,
        height: u32,
        data: &[u8],
    );
}

/// Facade bundling the per-display backend objects.
pub trait RenderBackend: Send {
    /// The GPU device.
    fn device(&mut self) -> &mut dyn Device;

    /// The windowing surface.
    fn surface(&self) -> &dyn Surface;

    /// The embedded compositor.
    fn embedded_compositor(&mut self) -> &mut dyn EmbeddedCompositor;

    /// The texture upload adapter.
    fn texture_upload_adapter(&mut self) -> &mut dyn TextureUploadAdapter;
}

/// Reduced backend used by the async shader uploader thread.
pub trait UploadBackend: Send {
    /// Device view of the shared context.
    fn device(&mut self) -> &mut dyn Device;

    /// The shared context.
    fn context(&self) -> &dyn Surface;
}

/// Factory for backends.
///
/// Implementations must enforce the shared-context handshake: an
/// [`UploadBackend`] for a display can only be created while that
/// display's primary surface is disabled, and the creation happens on
/// the calling (uploader) thread.
pub trait Platform: Send + Sync {
    /// Creates the render backend for a display; `None` on failure.
    fn create_render_backend(
        &self,
        display: DisplayHandle,
        config: &DisplayConfig,
    ) -> Option<Box<dyn RenderBackend>>;

    /// Tears down a display's render backend.
    fn destroy_render_backend(&self, display: DisplayHandle, backend: Box<dyn RenderBackend>);

    /// Creates the shared-context upload backend for a display.
    ///
    /// Must be called on the thread that will own the shared context.
    /// Returns `None` if creation fails, including when the display's
    /// primary surface is still enabled.
    fn create_upload_backend(&self, display: DisplayHandle) -> Option<Box<dyn UploadBackend>>;

    /// Tears down an upload backend on the owning thread.
    fn destroy_upload_backend(&self, display: DisplayHandle, backend: Box<dyn UploadBackend>);
}
