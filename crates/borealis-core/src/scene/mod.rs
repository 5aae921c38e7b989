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

//! The renderer-side scene model.
//!
//! Scene content lives in per-type arenas addressed by dense handles;
//! clients drive it exclusively through serialized [`SceneAction`]
//! streams grouped into flushes.
//!
//! [`SceneAction`]: actions::SceneAction

pub mod actions;
pub mod file;
mod graph;

pub use graph::{
    Camera, DataInstance, DataSlot, DataSlotKind, Frustum, MeshNode, Node, PickableObject,
    RenderPass, SceneStorage, Transform, Viewport,
};
