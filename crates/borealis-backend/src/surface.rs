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

//! Context-affine headless surface.

use borealis_core::device::Surface;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

/// Shared context-ownership state of one surface.
///
/// The platform keeps a reference so it can verify the shared-context
/// handshake: an upload backend may only be created while the primary
/// surface is disabled.
#[derive(Debug, Default)]
pub struct SurfaceState {
    owner: Mutex<Option<ThreadId>>,
    swap_count: AtomicU64,
}

impl SurfaceState {
    /// Whether any thread currently has the context enabled.
    pub fn is_enabled(&self) -> bool {
        self.owner.lock().unwrap().is_some()
    }

    /// Buffer swaps performed so far.
    pub fn swaps(&self) -> u64 {
        self.swap_count.load(Ordering::SeqCst)
    }
}

/// Headless [`Surface`] enforcing the thread-affinity contract.
#[derive(Debug)]
pub struct HeadlessSurface {
    state: Arc<SurfaceState>,
}

impl HeadlessSurface {
    /// Creates a surface over shared ownership state.
    pub fn new(state: Arc<SurfaceState>) -> Self {
        Self { state }
    }
}

impl Surface for HeadlessSurface {
    fn enable(&self) -> bool {
        let mut owner = self.state.owner.lock().unwrap();
        let current = std::thread::current().id();
        match *owner {
            Some(existing) if existing != current => {
                log::error!("HeadlessSurface enable refused: context is current on another thread");
                false
            }
            _ => {
                *owner = Some(current);
                true
            }
        }
    }

    fn disable(&self) {
        *self.state.owner.lock().unwrap() = None;
    }

    fn swap_buffers(&self) {
        self.state.swap_count.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_is_exclusive_across_threads() {
        let state = Arc::new(SurfaceState::default());
        let surface = HeadlessSurface::new(state.clone());
        assert!(surface.enable());
        assert!(state.is_enabled());

        let other = HeadlessSurface::new(state.clone());
        let grabbed = std::thread::spawn(move || other.enable()).join().unwrap();
        assert!(!grabbed);

        surface.disable();
        assert!(!state.is_enabled());
    }

    #[test]
    fn reenabling_on_same_thread_is_fine() {
        let surface = HeadlessSurface::new(Arc::new(SurfaceState::default()));
        assert!(surface.enable());
        assert!(surface.enable());
    }

    #[test]
    fn swaps_are_counted() {
        let state = Arc::new(SurfaceState::default());
        let surface = HeadlessSurface::new(state.clone());
        surface.swap_buffers();
        surface.swap_buffers();
        assert_eq!(state.swaps(), 2);
    }
}
