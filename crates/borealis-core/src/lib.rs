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

//! # Borealis Core
//!
//! Foundational crate containing the types, contracts and wire formats
//! shared between the renderer core and its backends: ids and handles,
//! the content-addressed resource model, the scene model and its
//! serialized delta format, the command/event surface, and the traits a
//! render backend must implement.

#![warn(missing_docs)]

pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod frame_timer;
pub mod handle;
pub mod resource;
pub mod scene;
pub mod shader_cache;
pub mod watchdog;

pub use frame_timer::{FrameTimer, FrameTimerSection};
pub use handle::{DisplayHandle, SceneId};
pub use resource::{ResourceContentHash, ResourceKind, ResourceStatus};
