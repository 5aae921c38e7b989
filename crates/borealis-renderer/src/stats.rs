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

//! Per-bundle renderer statistics.

use std::time::Duration;

/// Counters accumulated between statistics logs.
#[derive(Debug, Default)]
pub struct RendererStatistics {
    frames: u64,
    resources_uploaded: u64,
    resource_bytes_uploaded: u64,
    flushes_applied: u64,
    loop_time_sum: Duration,
    loop_time_max: Duration,
}

impl RendererStatistics {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a finished loop iteration.
    pub fn frame_finished(&mut self, loop_time: Duration) {
        self.frames += 1;
        self.loop_time_sum += loop_time;
        self.loop_time_max = self.loop_time_max.max(loop_time);
    }

    /// Records one uploaded resource.
    pub fn resource_uploaded(&mut self, bytes: u32) {
        self.resources_uploaded += 1;
        self.resource_bytes_uploaded += u64::from(bytes);
    }

    /// Records one applied scene flush.
    pub fn flush_applied(&mut self) {
        self.flushes_applied += 1;
    }

    /// Frames since the last reset.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Resources uploaded since the last reset.
    pub fn resources_uploaded(&self) -> u64 {
        self.resources_uploaded
    }

    /// Writes a summary line to the log and resets the counters.
    pub fn log_statistics(&mut self) {
        let avg_loop = if self.frames > 0 {
            self.loop_time_sum / self.frames as u32
        } else {
            Duration::ZERO
        };
        log::info!(
            "RendererStatistics frames: {}, flushes applied: {}, resources uploaded: {} ({} B), loop avg: {:?}, loop max: {:?}",
            self.frames,
            self.flushes_applied,
            self.resources_uploaded,
            self.resource_bytes_uploaded,
            avg_loop,
            self.loop_time_max
        );
        *self = Self::default();
    }
}
