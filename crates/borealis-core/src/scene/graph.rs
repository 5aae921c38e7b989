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

//! Arena-backed scene storage.
//!
//! Polymorphic scene objects are represented as per-type arenas indexed
//! by dense handles. A node's parent is a weak (index-only) back
//! reference validated on lookup; the parent owns its children list.

use crate::error::SceneUpdateError;
use crate::handle::{
    CameraHandle, DataInstanceHandle, DataSlotId, MeshHandle, NodeHandle, PickableHandle,
    RenderPassHandle, SceneId,
};
use crate::resource::ResourceContentHash;
use crate::scene::actions::SceneAction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Local transform of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Translation vector.
    pub translation: [f32; 3],
    /// Rotation quaternion (x, y, z, w).
    pub rotation: [f32; 4],
    /// Per-axis scale.
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        }
    }
}

/// A plain scene-graph node.
#[derive(Debug, Clone, Default)]
pub struct Node {
    /// Weak back reference to the owning parent.
    pub parent: Option<NodeHandle>,
    /// Owned children.
    pub children: Vec<NodeHandle>,
    /// Local transform.
    pub transform: Transform,
}

/// A node with appearance and geometry.
#[derive(Debug, Clone)]
pub struct MeshNode {
    /// The node carrying this mesh.
    pub node: NodeHandle,
    /// Effect (shader program) resource.
    pub effect: ResourceContentHash,
    /// Index buffer resource.
    pub index_buffer: ResourceContentHash,
    /// Vertex buffer resources in attribute order.
    pub vertex_buffers: Vec<ResourceContentHash>,
    /// Texture resources in sampler order.
    pub textures: Vec<ResourceContentHash>,
    /// Number of indices to draw.
    pub index_count: u32,
    /// Whether the mesh is drawn.
    pub visible: bool,
}

/// Camera viewport in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Left edge.
    pub x: i32,
    /// Bottom edge.
    pub y: i32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

/// Camera frustum planes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frustum {
    /// Left plane.
    pub left: f32,
    /// Right plane.
    pub right: f32,
    /// Bottom plane.
    pub bottom: f32,
    /// Top plane.
    pub top: f32,
    /// Near plane.
    pub near: f32,
    /// Far plane.
    pub far: f32,
}

/// A camera bound to a node.
#[derive(Debug, Clone)]
pub struct Camera {
    /// The node carrying this camera.
    pub node: NodeHandle,
    /// Viewport rectangle.
    pub viewport: Viewport,
    /// Frustum planes.
    pub frustum: Frustum,
}

/// Groups meshes under a camera with a render order.
#[derive(Debug, Clone)]
pub struct RenderPass {
    /// Camera the pass renders with.
    pub camera: CameraHandle,
    /// Passes render in ascending order.
    pub render_order: i32,
    /// Meshes drawn by this pass.
    pub meshes: Vec<MeshHandle>,
    /// Disabled passes are skipped.
    pub enabled: bool,
}

/// Uniform data owned by the scene.
#[derive(Debug, Clone, Default)]
pub struct DataInstance {
    /// Raw float values.
    pub values: Vec<f32>,
}

/// Direction of a data slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSlotKind {
    /// Offers data to other scenes.
    Provider,
    /// Consumes data from another scene or buffer.
    Consumer,
}

/// Named linking point of a scene.
#[derive(Debug, Clone)]
pub struct DataSlot {
    /// Slot direction.
    pub kind: DataSlotKind,
    /// Data instance backing the slot.
    pub data: DataInstanceHandle,
}

/// Region of the viewport that reports pick hits.
#[derive(Debug, Clone)]
pub struct PickableObject {
    /// User-chosen pickable id reported in pick events.
    pub id: u32,
    /// Normalized viewport-space rectangle `[min_x, min_y, max_x, max_y]`.
    pub rect: [f32; 4],
    /// Disabled pickables never hit.
    pub enabled: bool,
}

/// All arenas of one scene.
#[derive(Debug, Default)]
pub struct SceneStorage {
    nodes: Vec<Option<Node>>,
    meshes: Vec<Option<MeshNode>>,
    cameras: Vec<Option<Camera>>,
    render_passes: Vec<Option<RenderPass>>,
    data_instances: Vec<Option<DataInstance>>,
    data_slots: HashMap<DataSlotId, DataSlot>,
    pickables: Vec<Option<PickableObject>>,
}

fn put<T>(
    arena: &mut Vec<Option<T>>,
    index: usize,
    value: T,
    scene: SceneId,
    what: &str,
) -> Result<(), SceneUpdateError> {
    if index >= arena.len() {
        arena.resize_with(index + 1, || None);
    }
    if arena[index].is_some() {
        return Err(SceneUpdateError::InvalidHandle {
            scene,
            what: format!("{what} (slot already allocated)"),
        });
    }
    arena[index] = Some(value);
    Ok(())
}

fn take<T>(
    arena: &mut [Option<T>],
    index: usize,
    scene: SceneId,
    what: &str,
) -> Result<T, SceneUpdateError> {
    arena
        .get_mut(index)
        .and_then(Option::take)
        .ok_or_else(|| SceneUpdateError::InvalidHandle {
            scene,
            what: what.to_string(),
        })
}

fn slot<'a, T>(arena: &'a [Option<T>], index: usize) -> Option<&'a T> {
    arena.get(index).and_then(Option::as_ref)
}

fn slot_mut<'a, T>(
    arena: &'a mut [Option<T>],
    index: usize,
    scene: SceneId,
    what: &str,
) -> Result<&'a mut T, SceneUpdateError> {
    arena
        .get_mut(index)
        .and_then(Option::as_mut)
        .ok_or_else(|| SceneUpdateError::InvalidHandle {
            scene,
            what: what.to_string(),
        })
}

impl SceneStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a node.
    pub fn node(&self, handle: NodeHandle) -> Option<&Node> {
        slot(&self.nodes, handle.index())
    }

    /// Looks up a mesh node.
    pub fn mesh(&self, handle: MeshHandle) -> Option<&MeshNode> {
        slot(&self.meshes, handle.index())
    }

    /// Looks up a camera.
    pub fn camera(&self, handle: CameraHandle) -> Option<&Camera> {
        slot(&self.cameras, handle.index())
    }

    /// Looks up a render pass.
    pub fn render_pass(&self, handle: RenderPassHandle) -> Option<&RenderPass> {
        slot(&self.render_passes, handle.index())
    }

    /// Looks up a data instance.
    pub fn data_instance(&self, handle: DataInstanceHandle) -> Option<&DataInstance> {
        slot(&self.data_instances, handle.index())
    }

    /// Looks up a data slot.
    pub fn data_slot(&self, id: DataSlotId) -> Option<&DataSlot> {
        self.data_slots.get(&id)
    }

    /// Looks up a pickable object.
    pub fn pickable(&self, handle: PickableHandle) -> Option<&PickableObject> {
        slot(&self.pickables, handle.index())
    }

    /// The parent of a node, validated against the arena.
    ///
    /// A stale back reference (parent slot released) yields `None`.
    pub fn parent_of(&self, handle: NodeHandle) -> Option<NodeHandle> {
        let parent = self.node(handle)?.parent?;
        self.node(parent).map(|_| parent)
    }

    /// Render passes sorted by ascending render order; disabled passes
    /// are filtered out.
    pub fn passes_in_order(&self) -> Vec<(RenderPassHandle, &RenderPass)> {
        let mut passes: Vec<_> = self
            .render_passes
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (RenderPassHandle(i as u32), p)))
            .filter(|(_, p)| p.enabled)
            .collect();
        passes.sort_by_key(|(h, p)| (p.render_order, h.0));
        passes
    }

    /// Enabled pickables whose rectangle contains the coordinate.
    pub fn pick(&self, coords: [f32; 2]) -> Vec<u32> {
        self.pickables
            .iter()
            .flatten()
            .filter(|p| p.enabled)
            .filter(|p| {
                coords[0] >= p.rect[0]
                    && coords[1] >= p.rect[1]
                    && coords[0] <= p.rect[2]
                    && coords[1] <= p.rect[3]
            })
            .map(|p| p.id)
            .collect()
    }

    /// Every resource hash currently referenced by a mesh.
    pub fn referenced_resources(&self) -> impl Iterator<Item = ResourceContentHash> + '_ {
        self.meshes.iter().flatten().flat_map(|m| {
            std::iter::once(m.effect)
                .chain(std::iter::once(m.index_buffer))
                .chain(m.vertex_buffers.iter().copied())
                .chain(m.textures.iter().copied())
        })
    }

    /// Number of allocated nodes (diagnostics).
    pub fn node_count(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    /// Number of allocated meshes (diagnostics).
    pub fn mesh_count(&self) -> usize {
        self.meshes.iter().flatten().count()
    }

    /// Number of allocated render passes (diagnostics).
    pub fn render_pass_count(&self) -> usize {
        self.render_passes.iter().flatten().count()
    }

    /// Applies one action to the arenas.
    pub fn apply(&mut self, scene: SceneId, action: SceneAction) -> Result<(), SceneUpdateError> {
        use SceneAction::*;
        match action {
            AllocateNode { handle, parent } => {
                if let Some(p) = parent {
                    slot_mut(&mut self.nodes, p.index(), scene, "parent node")?
                        .children
                        .push(handle);
                }
                put(
                    &mut self.nodes,
                    handle.index(),
                    Node {
                        parent,
                        ..Node::default()
                    },
                    scene,
                    "node",
                )
            }
            ReleaseNode { handle } => {
                let node = take(&mut self.nodes, handle.index(), scene, "node")?;
                if let Some(p) = node.parent {
                    if let Some(parent) = self.nodes.get_mut(p.index()).and_then(Option::as_mut) {
                        parent.children.retain(|&c| c != handle);
                    }
                }
                Ok(())
            }
            SetTransform { node, transform } => {
                slot_mut(&mut self.nodes, node.index(), scene, "node")?.transform = transform;
                Ok(())
            }
            AllocateMesh { handle, node } => {
                slot(&self.nodes, node.index()).ok_or_else(|| SceneUpdateError::InvalidHandle {
                    scene,
                    what: "mesh node".into(),
                })?;
                put(
                    &mut self.meshes,
                    handle.index(),
                    MeshNode {
                        node,
                        effect: ResourceContentHash::INVALID,
                        index_buffer: ResourceContentHash::INVALID,
                        vertex_buffers: Vec::new(),
                        textures: Vec::new(),
                        index_count: 0,
                        visible: true,
                    },
                    scene,
                    "mesh",
                )
            }
            ReleaseMesh { handle } => {
                take(&mut self.meshes, handle.index(), scene, "mesh").map(drop)
            }
            SetMeshEffect { mesh, effect } => {
                slot_mut(&mut self.meshes, mesh.index(), scene, "mesh")?.effect = effect;
                Ok(())
            }
            SetMeshGeometry {
                mesh,
                index_buffer,
                vertex_buffers,
                index_count,
            } => {
                let m = slot_mut(&mut self.meshes, mesh.index(), scene, "mesh")?;
                m.index_buffer = index_buffer;
                m.vertex_buffers = vertex_buffers;
                m.index_count = index_count;
                Ok(())
            }
            SetMeshTextures { mesh, textures } => {
                slot_mut(&mut self.meshes, mesh.index(), scene, "mesh")?.textures = textures;
                Ok(())
            }
            SetMeshVisibility { mesh, visible } => {
                slot_mut(&mut self.meshes, mesh.index(), scene, "mesh")?.visible = visible;
                Ok(())
            }
            AllocateCamera {
                handle,
                node,
                viewport,
                frustum,
            } => {
                slot(&self.nodes, node.index()).ok_or_else(|| SceneUpdateError::InvalidHandle {
                    scene,
                    what: "camera node".into(),
                })?;
                put(
                    &mut self.cameras,
                    handle.index(),
                    Camera {
                        node,
                        viewport,
                        frustum,
                    },
                    scene,
                    "camera",
                )
            }
            ReleaseCamera { handle } => {
                take(&mut self.cameras, handle.index(), scene, "camera").map(drop)
            }
            SetCameraViewport { camera, viewport } => {
                slot_mut(&mut self.cameras, camera.index(), scene, "camera")?.viewport = viewport;
                Ok(())
            }
            AllocateRenderPass {
                handle,
                camera,
                render_order,
            } => {
                slot(&self.cameras, camera.index()).ok_or_else(|| {
                    SceneUpdateError::InvalidHandle {
                        scene,
                        what: "render pass camera".into(),
                    }
                })?;
                put(
                    &mut self.render_passes,
                    handle.index(),
                    RenderPass {
                        camera,
                        render_order,
                        meshes: Vec::new(),
                        enabled: true,
                    },
                    scene,
                    "render pass",
                )
            }
            ReleaseRenderPass { handle } => {
                take(&mut self.render_passes, handle.index(), scene, "render pass").map(drop)
            }
            SetRenderPassMeshes { pass, meshes } => {
                slot_mut(&mut self.render_passes, pass.index(), scene, "render pass")?.meshes =
                    meshes;
                Ok(())
            }
            SetRenderPassOrder { pass, render_order } => {
                slot_mut(&mut self.render_passes, pass.index(), scene, "render pass")?
                    .render_order = render_order;
                Ok(())
            }
            SetRenderPassEnabled { pass, enabled } => {
                slot_mut(&mut self.render_passes, pass.index(), scene, "render pass")?.enabled =
                    enabled;
                Ok(())
            }
            AllocateDataInstance { handle, values } => put(
                &mut self.data_instances,
                handle.index(),
                DataInstance { values },
                scene,
                "data instance",
            ),
            ReleaseDataInstance { handle } => {
                take(&mut self.data_instances, handle.index(), scene, "data instance").map(drop)
            }
            SetDataValues { handle, values } => {
                slot_mut(&mut self.data_instances, handle.index(), scene, "data instance")?
                    .values = values;
                Ok(())
            }
            AllocateDataSlot { id, kind, data } => {
                slot(&self.data_instances, data.index()).ok_or_else(|| {
                    SceneUpdateError::InvalidHandle {
                        scene,
                        what: "data slot instance".into(),
                    }
                })?;
                if self.data_slots.insert(id, DataSlot { kind, data }).is_some() {
                    return Err(SceneUpdateError::InvalidHandle {
                        scene,
                        what: format!("data slot {id} (already allocated)"),
                    });
                }
                Ok(())
            }
            ReleaseDataSlot { id } => {
                self.data_slots
                    .remove(&id)
                    .map(drop)
                    .ok_or_else(|| SceneUpdateError::InvalidHandle {
                        scene,
                        what: format!("data slot {id}"),
                    })
            }
            AllocatePickable { handle, id, rect } => put(
                &mut self.pickables,
                handle.index(),
                PickableObject {
                    id,
                    rect,
                    enabled: true,
                },
                scene,
                "pickable",
            ),
            ReleasePickable { handle } => {
                take(&mut self.pickables, handle.index(), scene, "pickable").map(drop)
            }
            SetPickableEnabled { handle, enabled } => {
                slot_mut(&mut self.pickables, handle.index(), scene, "pickable")?.enabled = enabled;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: SceneId = SceneId(1);

    fn storage_with_root() -> SceneStorage {
        let mut s = SceneStorage::new();
        s.apply(
            SCENE,
            SceneAction::AllocateNode {
                handle: NodeHandle(0),
                parent: None,
            },
        )
        .unwrap();
        s
    }

    #[test]
    fn child_holds_weak_back_reference() {
        let mut s = storage_with_root();
        s.apply(
            SCENE,
            SceneAction::AllocateNode {
                handle: NodeHandle(1),
                parent: Some(NodeHandle(0)),
            },
        )
        .unwrap();

        assert_eq!(s.parent_of(NodeHandle(1)), Some(NodeHandle(0)));
        assert_eq!(s.node(NodeHandle(0)).unwrap().children, vec![NodeHandle(1)]);

        // releasing the parent invalidates the back reference on lookup
        s.apply(SCENE, SceneAction::ReleaseNode { handle: NodeHandle(0) })
            .unwrap();
        assert_eq!(s.parent_of(NodeHandle(1)), None);
    }

    #[test]
    fn double_allocation_is_rejected() {
        let mut s = storage_with_root();
        let err = s.apply(
            SCENE,
            SceneAction::AllocateNode {
                handle: NodeHandle(0),
                parent: None,
            },
        );
        assert!(err.is_err());
    }

    #[test]
    fn passes_sorted_by_render_order() {
        let mut s = storage_with_root();
        s.apply(
            SCENE,
            SceneAction::AllocateCamera {
                handle: CameraHandle(0),
                node: NodeHandle(0),
                viewport: Viewport {
                    x: 0,
                    y: 0,
                    width: 640,
                    height: 480,
                },
                frustum: Frustum {
                    left: -1.0,
                    right: 1.0,
                    bottom: -1.0,
                    top: 1.0,
                    near: 0.1,
                    far: 100.0,
                },
            },
        )
        .unwrap();
        for (i, order) in [(0u32, 5), (1u32, -3), (2u32, 1)] {
            s.apply(
                SCENE,
                SceneAction::AllocateRenderPass {
                    handle: RenderPassHandle(i),
                    camera: CameraHandle(0),
                    render_order: order,
                },
            )
            .unwrap();
        }
        let orders: Vec<i32> = s.passes_in_order().iter().map(|(_, p)| p.render_order).collect();
        assert_eq!(orders, vec![-3, 1, 5]);
    }

    #[test]
    fn pick_hits_enabled_rects_only() {
        let mut s = SceneStorage::new();
        s.apply(
            SCENE,
            SceneAction::AllocatePickable {
                handle: PickableHandle(0),
                id: 10,
                rect: [0.0, 0.0, 0.5, 0.5],
            },
        )
        .unwrap();
        s.apply(
            SCENE,
            SceneAction::AllocatePickable {
                handle: PickableHandle(1),
                id: 11,
                rect: [0.0, 0.0, 1.0, 1.0],
            },
        )
        .unwrap();
        s.apply(
            SCENE,
            SceneAction::SetPickableEnabled {
                handle: PickableHandle(1),
                enabled: false,
            },
        )
        .unwrap();

        assert_eq!(s.pick([0.25, 0.25]), vec![10]);
        assert_eq!(s.pick([0.75, 0.75]), Vec::<u32>::new());
    }
}
