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

//! # Borealis Backend
//!
//! Headless reference implementation of the render backend traits: an
//! in-memory device that tracks allocations and VRAM byte-exactly, a
//! surface enforcing context thread-affinity, and a platform factory
//! that enforces the shared-context handshake of the async uploader.
//!
//! Used by the test suites and by deployments that run the renderer in
//! `UpdateOnly` mode without a GPU.

mod compositor;
mod device;
mod platform;
mod surface;

pub use compositor::{HeadlessEmbeddedCompositor, StreamTable};
pub use device::{DeviceStats, HeadlessDevice, HEADLESS_BINARY_SHADER_FORMAT};
pub use platform::HeadlessPlatform;
pub use surface::{HeadlessSurface, SurfaceState};
