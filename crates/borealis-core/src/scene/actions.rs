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

//! The serialized scene delta format.
//!
//! Clients mutate scenes by sending a [`SceneUpdate`] (one flush): a
//! batch of [`SceneAction`]s plus the resource-reference changes and any
//! newly provided payloads that flush introduces. Updates are encoded
//! with bincode behind a leading format-version byte; unknown versions
//! fail closed.

use crate::error::SceneUpdateError;
use crate::handle::{
    CameraHandle, DataInstanceHandle, DataSlotId, MeshHandle, NodeHandle, PickableHandle,
    RenderPassHandle,
};
use crate::resource::{ResourceBlob, ResourceContentHash, ResourceKind};
use crate::scene::graph::{DataSlotKind, Frustum, Transform, Viewport};
use serde::{Deserialize, Serialize};

/// Version byte of the update wire format.
pub const SCENE_UPDATE_FORMAT_VERSION: u8 = 1;

/// One mutation of a scene arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum SceneAction {
    AllocateNode { handle: NodeHandle, parent: Option<NodeHandle> },
    ReleaseNode { handle: NodeHandle },
    SetTransform { node: NodeHandle, transform: Transform },
    AllocateMesh { handle: MeshHandle, node: NodeHandle },
    ReleaseMesh { handle: MeshHandle },
    SetMeshEffect { mesh: MeshHandle, effect: ResourceContentHash },
    SetMeshGeometry {
        mesh: MeshHandle,
        index_buffer: ResourceContentHash,
        vertex_buffers: Vec<ResourceContentHash>,
        index_count: u32,
    },
    SetMeshTextures { mesh: MeshHandle, textures: Vec<ResourceContentHash> },
    SetMeshVisibility { mesh: MeshHandle, visible: bool },
    AllocateCamera {
        handle: CameraHandle,
        node: NodeHandle,
        viewport: Viewport,
        frustum: Frustum,
    },
    ReleaseCamera { handle: CameraHandle },
    SetCameraViewport { camera: CameraHandle, viewport: Viewport },
    AllocateRenderPass {
        handle: RenderPassHandle,
        camera: CameraHandle,
        render_order: i32,
    },
    ReleaseRenderPass { handle: RenderPassHandle },
    SetRenderPassMeshes { pass: RenderPassHandle, meshes: Vec<MeshHandle> },
    SetRenderPassOrder { pass: RenderPassHandle, render_order: i32 },
    SetRenderPassEnabled { pass: RenderPassHandle, enabled: bool },
    AllocateDataInstance { handle: DataInstanceHandle, values: Vec<f32> },
    ReleaseDataInstance { handle: DataInstanceHandle },
    SetDataValues { handle: DataInstanceHandle, values: Vec<f32> },
    AllocateDataSlot { id: DataSlotId, kind: DataSlotKind, data: DataInstanceHandle },
    ReleaseDataSlot { id: DataSlotId },
    AllocatePickable { handle: PickableHandle, id: u32, rect: [f32; 4] },
    ReleasePickable { handle: PickableHandle },
    SetPickableEnabled { handle: PickableHandle, enabled: bool },
}

/// Resource references gained and dropped by one flush.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChanges {
    /// Hashes this scene starts referencing with this flush.
    pub added: Vec<(ResourceContentHash, ResourceKind)>,
    /// Hashes this scene stops referencing with this flush.
    pub removed: Vec<ResourceContentHash>,
}

impl ResourceChanges {
    /// Whether the flush changes no references.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// A resource payload delivered alongside a flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidedResource {
    /// Content hash of the payload.
    pub hash: ResourceContentHash,
    /// The payload itself.
    pub blob: ResourceBlob,
}

impl ProvidedResource {
    /// Wraps a blob, computing its hash.
    pub fn new(blob: ResourceBlob) -> Self {
        Self {
            hash: blob.content_hash(),
            blob,
        }
    }
}

/// One flush: the unit of scene mutation applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneUpdate {
    /// Monotonically increasing flush counter per scene.
    pub flush_index: u64,
    /// Arena mutations, applied in order.
    pub actions: Vec<SceneAction>,
    /// Resource reference changes.
    pub resource_changes: ResourceChanges,
    /// Payloads delivered with this flush.
    pub provided_resources: Vec<ProvidedResource>,
    /// Content expiration, milliseconds since the epoch. `None` clears
    /// a previously set expiration.
    pub expiration_timestamp_ms: Option<u64>,
}

impl SceneUpdate {
    /// Encodes the update for transport.
    pub fn encode(&self) -> Vec<u8> {
        let body = bincode::serialize(self).expect("scene update serialization cannot fail");
        let mut out = Vec::with_capacity(body.len() + 1);
        out.push(SCENE_UPDATE_FORMAT_VERSION);
        out.extend(body);
        out
    }

    /// Decodes an update received from transport.
    pub fn decode(bytes: &[u8]) -> Result<Self, SceneUpdateError> {
        let (&version, body) = bytes
            .split_first()
            .ok_or_else(|| SceneUpdateError::Decode("empty update payload".into()))?;
        if version != SCENE_UPDATE_FORMAT_VERSION {
            return Err(SceneUpdateError::UnsupportedVersion(version));
        }
        bincode::deserialize(body).map_err(|e| SceneUpdateError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_round_trip() {
        let update = SceneUpdate {
            flush_index: 3,
            actions: vec![
                SceneAction::AllocateNode {
                    handle: NodeHandle(0),
                    parent: None,
                },
                SceneAction::SetTransform {
                    node: NodeHandle(0),
                    transform: Transform::default(),
                },
            ],
            resource_changes: ResourceChanges {
                added: vec![(
                    ResourceContentHash { low: 1, high: 2 },
                    ResourceKind::IndexBuffer,
                )],
                removed: vec![],
            },
            provided_resources: vec![ProvidedResource::new(ResourceBlob::new(
                ResourceKind::IndexBuffer,
                vec![0, 1, 2, 3],
            ))],
            expiration_timestamp_ms: Some(123_456),
        };

        let decoded = SceneUpdate::decode(&update.encode()).unwrap();
        assert_eq!(decoded, update);
    }

    #[test]
    fn unknown_version_fails_closed() {
        let mut bytes = SceneUpdate::default().encode();
        bytes[0] = 99;
        match SceneUpdate::decode(&bytes) {
            Err(SceneUpdateError::UnsupportedVersion(99)) => {}
            other => panic!("expected UnsupportedVersion, got {other:?}"),
        }
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(SceneUpdate::decode(&[]).is_err());
    }
}
