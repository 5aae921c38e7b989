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

//! # Borealis Renderer
//!
//! The renderer core: a command queue feeding per-display bundles, a
//! GPU resource registry with an eviction-aware upload pipeline and
//! asynchronous shader compilation, scene state control, and render
//! loops with per-frame time budgets.
//!
//! Entry point is [`Renderer`]; everything else is reachable for
//! embedders that assemble their own bundles.

#![warn(missing_docs)]

pub mod bundle;
pub mod collector;
pub mod command_queue;
pub mod control;
pub mod dispatcher;
pub mod executor;
pub mod loop_controller;
pub mod registry;
mod render;
pub mod renderer;
pub mod shader_uploader;
pub mod stats;
pub mod updater;
pub mod upload;
pub mod uploader;

pub use renderer::Renderer;
