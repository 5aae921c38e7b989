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

//! The renderer command surface.
//!
//! Every operation on the renderer is a variant of [`RendererCommand`]
//! carrying only its inputs. Commands are enqueued by user threads,
//! routed by the display dispatcher and executed on the owning display
//! bundle's thread.

use crate::config::{DisplayConfig, FrameTimerLimits};
use crate::device::PixelRect;
use crate::handle::{
    DataSlotId, DisplayHandle, OffscreenBufferHandle, SceneId, StreamBufferHandle,
    WaylandIviLayerId, WaylandIviSurfaceId,
};
use crate::shader_cache::BinaryShaderCache;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How a published scene is distributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenePublicationMode {
    /// Visible to local and remote renderers.
    LocalAndRemote,
    /// Visible to the local renderer only.
    LocalOnly,
}

/// Announcement data of a received scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneInfo {
    /// The scene id.
    pub scene: SceneId,
    /// Human-readable name for diagnostics.
    pub friendly_name: String,
}

/// User-facing scene state targets and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RendererSceneState {
    /// Not published, or all local data released.
    Unavailable,
    /// Published; no local data.
    Available,
    /// Subscribed, mapped and all resources uploaded; ready to show.
    Ready,
    /// Rendered every frame.
    Rendered,
}

/// Mesh data used to warp the final display image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarpingMeshData {
    /// Vertex positions.
    pub vertex_positions: Vec<[f32; 3]>,
    /// One texture coordinate per vertex.
    pub texture_coordinates: Vec<[f32; 2]>,
    /// Triangle list indices; length must be a multiple of three.
    pub indices: Vec<u16>,
}

/// Topic filter of the `LogInfo` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererLogTopic {
    /// Everything.
    All,
    /// Scene states and content counts.
    Scenes,
    /// Resource registry contents.
    Resources,
    /// Data links.
    Links,
}

/// Shared handle to a user-provided binary shader cache.
///
/// Wrapper so the command enum stays `Clone` and `Debug` while the
/// cache itself is an opaque trait object.
#[derive(Clone)]
pub struct ShaderCacheRef(pub Arc<dyn BinaryShaderCache>);

impl fmt::Debug for ShaderCacheRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ShaderCacheRef(..)")
    }
}

/// Routing scope of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandScope {
    /// Owned by one display.
    Display(DisplayHandle),
    /// Owned by whichever display the scene is mapped on.
    Scene(SceneId),
    /// Delivered to every display bundle.
    Broadcast,
}

/// A renderer command. Each variant carries only its inputs.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum RendererCommand {
    ScenePublished { scene: SceneId, mode: ScenePublicationMode },
    SceneUnpublished { scene: SceneId },
    ReceiveScene { info: SceneInfo },
    UpdateScene { scene: SceneId, update_data: Vec<u8> },
    SetSceneState { scene: SceneId, state: RendererSceneState },
    SetSceneMapping { scene: SceneId, display: DisplayHandle },
    SetSceneDisplayBufferAssignment {
        scene: SceneId,
        buffer: OffscreenBufferHandle,
        render_order: i32,
    },
    LinkData {
        provider_scene: SceneId,
        provider_data: DataSlotId,
        consumer_scene: SceneId,
        consumer_data: DataSlotId,
    },
    LinkOffscreenBuffer {
        provider_buffer: OffscreenBufferHandle,
        consumer_scene: SceneId,
        consumer_data: DataSlotId,
    },
    LinkStreamBuffer {
        provider_buffer: StreamBufferHandle,
        consumer_scene: SceneId,
        consumer_data: DataSlotId,
    },
    UnlinkData { consumer_scene: SceneId, consumer_data: DataSlotId },
    PickEvent { scene: SceneId, coords_normalized: [f32; 2] },
    CreateDisplay {
        display: DisplayHandle,
        config: DisplayConfig,
        binary_shader_cache: Option<ShaderCacheRef>,
    },
    DestroyDisplay { display: DisplayHandle },
    CreateOffscreenBuffer {
        display: DisplayHandle,
        buffer: OffscreenBufferHandle,
        width: u32,
        height: u32,
        sample_count: u32,
        interruptible: bool,
    },
    DestroyOffscreenBuffer { display: DisplayHandle, buffer: OffscreenBufferHandle },
    CreateStreamBuffer {
        display: DisplayHandle,
        buffer: StreamBufferHandle,
        source: WaylandIviSurfaceId,
    },
    DestroyStreamBuffer { display: DisplayHandle, buffer: StreamBufferHandle },
    SetStreamBufferState {
        display: DisplayHandle,
        buffer: StreamBufferHandle,
        enabled: bool,
    },
    SetClearColor {
        display: DisplayHandle,
        buffer: OffscreenBufferHandle,
        color: [f32; 4],
    },
    UpdateWarpingData { display: DisplayHandle, data: WarpingMeshData },
    ReadPixels {
        display: DisplayHandle,
        buffer: OffscreenBufferHandle,
        rect: PixelRect,
        filename: Option<String>,
        send_via_dlt: bool,
        full_screen: bool,
    },
    SetSkippingOfUnmodifiedBuffers { enable: bool },
    LogStatistics,
    LogInfo {
        topic: RendererLogTopic,
        verbose: bool,
        node_filter: Option<SceneId>,
    },
    SCListIviSurfaces,
    SCSetIviSurfaceVisibility { surface: WaylandIviSurfaceId, visible: bool },
    SCSetIviSurfaceOpacity { surface: WaylandIviSurfaceId, opacity: f32 },
    SCSetIviSurfaceDestRectangle {
        surface: WaylandIviSurfaceId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    SCScreenshot { screen: i32, filename: String },
    SCAddIviSurfaceToIviLayer { surface: WaylandIviSurfaceId, layer: WaylandIviLayerId },
    SCSetIviLayerVisibility { layer: WaylandIviLayerId, visible: bool },
    SCRemoveIviSurfaceFromIviLayer {
        surface: WaylandIviSurfaceId,
        layer: WaylandIviLayerId,
    },
    SCDestroyIviSurface { surface: WaylandIviSurfaceId },
    SetLimitsFrameBudgets { limits: FrameTimerLimits },
    SetLimitsFlushesForceApply { limit: u32 },
    SetLimitsFlushesForceUnsubscribe { limit: u32 },
    ConfirmationEcho { text: String },
}

impl RendererCommand {
    /// Where the dispatcher routes this command.
    pub fn scope(&self) -> CommandScope {
        use RendererCommand::*;
        match self {
            CreateDisplay { display, .. }
            | DestroyDisplay { display }
            | CreateOffscreenBuffer { display, .. }
            | DestroyOffscreenBuffer { display, .. }
            | CreateStreamBuffer { display, .. }
            | DestroyStreamBuffer { display, .. }
            | SetStreamBufferState { display, .. }
            | SetClearColor { display, .. }
            | UpdateWarpingData { display, .. }
            | ReadPixels { display, .. } => CommandScope::Display(*display),

            ScenePublished { scene, .. }
            | SceneUnpublished { scene }
            | UpdateScene { scene, .. }
            | SetSceneState { scene, .. }
            | SetSceneMapping { scene, .. }
            | SetSceneDisplayBufferAssignment { scene, .. }
            | PickEvent { scene, .. } => CommandScope::Scene(*scene),
            ReceiveScene { info } => CommandScope::Scene(info.scene),
            LinkData { consumer_scene, .. }
            | LinkOffscreenBuffer { consumer_scene, .. }
            | LinkStreamBuffer { consumer_scene, .. }
            | UnlinkData { consumer_scene, .. } => CommandScope::Scene(*consumer_scene),

            _ => CommandScope::Broadcast,
        }
    }

    /// Stable variant name for log output.
    pub fn name(&self) -> &'static str {
        use RendererCommand::*;
        match self {
            ScenePublished { .. } => "ScenePublished",
            SceneUnpublished { .. } => "SceneUnpublished",
            ReceiveScene { .. } => "ReceiveScene",
            UpdateScene { .. } => "UpdateScene",
            SetSceneState { .. } => "SetSceneState",
            SetSceneMapping { .. } => "SetSceneMapping",
            SetSceneDisplayBufferAssignment { .. } => "SetSceneDisplayBufferAssignment",
            LinkData { .. } => "LinkData",
            LinkOffscreenBuffer { .. } => "LinkOffscreenBuffer",
            LinkStreamBuffer { .. } => "LinkStreamBuffer",
            UnlinkData { .. } => "UnlinkData",
            PickEvent { .. } => "PickEvent",
            CreateDisplay { .. } => "CreateDisplay",
            DestroyDisplay { .. } => "DestroyDisplay",
            CreateOffscreenBuffer { .. } => "CreateOffscreenBuffer",
            DestroyOffscreenBuffer { .. } => "DestroyOffscreenBuffer",
            CreateStreamBuffer { .. } => "CreateStreamBuffer",
            DestroyStreamBuffer { .. } => "DestroyStreamBuffer",
            SetStreamBufferState { .. } => "SetStreamBufferState",
            SetClearColor { .. } => "SetClearColor",
            UpdateWarpingData { .. } => "UpdateWarpingData",
            ReadPixels { .. } => "ReadPixels",
            SetSkippingOfUnmodifiedBuffers { .. } => "SetSkippingOfUnmodifiedBuffers",
            LogStatistics => "LogStatistics",
            LogInfo { .. } => "LogInfo",
            SCListIviSurfaces => "SCListIviSurfaces",
            SCSetIviSurfaceVisibility { .. } => "SCSetIviSurfaceVisibility",
            SCSetIviSurfaceOpacity { .. } => "SCSetIviSurfaceOpacity",
            SCSetIviSurfaceDestRectangle { .. } => "SCSetIviSurfaceDestRectangle",
            SCScreenshot { .. } => "SCScreenshot",
            SCAddIviSurfaceToIviLayer { .. } => "SCAddIviSurfaceToIviLayer",
            SCSetIviLayerVisibility { .. } => "SCSetIviLayerVisibility",
            SCRemoveIviSurfaceFromIviLayer { .. } => "SCRemoveIviSurfaceFromIviLayer",
            SCDestroyIviSurface { .. } => "SCDestroyIviSurface",
            SetLimitsFrameBudgets { .. } => "SetLimitsFrameBudgets",
            SetLimitsFlushesForceApply { .. } => "SetLimitsFlushesForceApply",
            SetLimitsFlushesForceUnsubscribe { .. } => "SetLimitsFlushesForceUnsubscribe",
            ConfirmationEcho { .. } => "ConfirmationEcho",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_are_routed() {
        let cmd = RendererCommand::DestroyDisplay {
            display: DisplayHandle(2),
        };
        assert_eq!(cmd.scope(), CommandScope::Display(DisplayHandle(2)));

        let cmd = RendererCommand::UpdateScene {
            scene: SceneId(7),
            update_data: vec![],
        };
        assert_eq!(cmd.scope(), CommandScope::Scene(SceneId(7)));

        assert_eq!(RendererCommand::LogStatistics.scope(), CommandScope::Broadcast);
        assert_eq!(
            RendererCommand::ConfirmationEcho { text: "ok".into() }.scope(),
            CommandScope::Broadcast
        );
    }

    #[test]
    fn names_match_variants() {
        assert_eq!(
            RendererCommand::SetSceneState {
                scene: SceneId(1),
                state: RendererSceneState::Ready
            }
            .name(),
            "SetSceneState"
        );
    }
}
