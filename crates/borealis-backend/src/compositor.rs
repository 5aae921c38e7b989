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

//! Headless embedded compositor and texture upload adapter.

use borealis_core::device::{
    EmbeddedCompositor, StreamAvailability, TextureUploadAdapter,
};
use borealis_core::handle::{DeviceResourceHandle, WaylandIviSurfaceId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Stream contents of a display, injectable from the outside.
///
/// Tests and embedders flip availability here; the compositor drains
/// the change log on `dispatch_stream_changes`.
#[derive(Debug, Default)]
pub struct StreamTable {
    available: Mutex<HashSet<WaylandIviSurfaceId>>,
    pending: Mutex<Vec<StreamAvailability>>,
}

impl StreamTable {
    /// Marks a stream (un)available and records the change.
    pub fn set_available(&self, stream: WaylandIviSurfaceId, available: bool) {
        let mut set = self.available.lock().unwrap();
        let changed = if available {
            set.insert(stream)
        } else {
            set.remove(&stream)
        };
        if changed {
            self.pending
                .lock()
                .unwrap()
                .push(StreamAvailability { stream, available });
        }
    }
}

/// Headless [`EmbeddedCompositor`] backed by a [`StreamTable`].
#[derive(Debug)]
pub struct HeadlessEmbeddedCompositor {
    streams: Arc<StreamTable>,
}

impl HeadlessEmbeddedCompositor {
    /// Creates a compositor over an injectable stream table.
    pub fn new(streams: Arc<StreamTable>) -> Self {
        Self { streams }
    }
}

impl EmbeddedCompositor for HeadlessEmbeddedCompositor {
    fn handle_requests(&mut self) {
        // nothing to poll headlessly
    }

    fn has_content_for_stream(&self, stream: WaylandIviSurfaceId) -> bool {
        self.streams.available.lock().unwrap().contains(&stream)
    }

    fn dispatch_stream_changes(&mut self) -> Vec<StreamAvailability> {
        std::mem::take(&mut self.streams.pending.lock().unwrap())
    }
}

/// Headless [`TextureUploadAdapter`]; upload is a size-checked no-op.
#[derive(Debug, Default)]
pub struct HeadlessTextureUploadAdapter;

impl TextureUploadAdapter for HeadlessTextureUploadAdapter {
    fn upload_texture_2d(
        &mut self,
        handle: DeviceResourceHandle,
        width: u32,
        height: u32,
        data: &[u8],
    ) {
        debug_assert!(handle.is_valid());
        debug_assert!(data.len() as u64 >= u64::from(width) * u64::from(height));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_changes_are_drained_once() {
        let table = Arc::new(StreamTable::default());
        let mut compositor = HeadlessEmbeddedCompositor::new(table.clone());

        let stream = WaylandIviSurfaceId(4);
        table.set_available(stream, true);
        assert!(compositor.has_content_for_stream(stream));

        let changes = compositor.dispatch_stream_changes();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].available);
        assert!(compositor.dispatch_stream_changes().is_empty());
    }

    #[test]
    fn redundant_availability_is_not_reported() {
        let table = Arc::new(StreamTable::default());
        let mut compositor = HeadlessEmbeddedCompositor::new(table.clone());
        let stream = WaylandIviSurfaceId(9);
        table.set_available(stream, true);
        table.set_available(stream, true);
        assert_eq!(compositor.dispatch_stream_changes().len(), 1);
    }
}
