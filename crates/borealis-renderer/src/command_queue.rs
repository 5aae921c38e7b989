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

//! The shared command buffer.
//!
//! Multi-producer (user threads), single-consumer (the owning display
//! bundle). Consumption swaps the whole queue out under the lock so the
//! lock is held only briefly and commands execute outside it.

use borealis_core::command::RendererCommand;
use std::sync::Mutex;

/// Mutex-guarded command queue.
#[derive(Debug, Default)]
pub struct RendererCommandBuffer {
    queue: Mutex<Vec<RendererCommand>>,
}

impl RendererCommandBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues one command.
    pub fn push(&self, cmd: RendererCommand) {
        self.queue.lock().unwrap().push(cmd);
    }

    /// Enqueues a batch, draining `cmds`.
    pub fn push_and_consume(&self, cmds: &mut Vec<RendererCommand>) {
        if cmds.is_empty() {
            return;
        }
        self.queue.lock().unwrap().append(cmds);
    }

    /// Swaps the queue into `out`; `out` must be empty.
    pub fn swap_commands(&self, out: &mut Vec<RendererCommand>) {
        debug_assert!(out.is_empty());
        std::mem::swap(&mut *self.queue.lock().unwrap(), out);
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
