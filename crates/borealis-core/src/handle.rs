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

//! Strongly typed ids and handles.
//!
//! Every id that crosses the public API reserves the numeric value zero
//! as "invalid"; creation calls hand out ids starting at one from a
//! monotonically incrementing per-renderer counter. Scene-internal
//! handles are dense small integers into per-type arenas.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! renderer_id {
    ($(#[$doc:meta])* $name:ident, $repr:ty) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub $repr);

        impl $name {
            /// The reserved invalid id (numeric zero).
            pub const INVALID: Self = Self(0);

            /// Returns `true` unless this is the reserved invalid id.
            pub fn is_valid(self) -> bool {
                self.0 != 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }
    };
}

renderer_id!(
    /// Identifies a scene across the whole distributed system.
    SceneId, u64
);
renderer_id!(
    /// Internal handle of a display owned by the dispatcher.
    DisplayHandle, u32
);
renderer_id!(
    /// Internal handle of an offscreen buffer on a display.
    OffscreenBufferHandle, u32
);
renderer_id!(
    /// Internal handle of a stream buffer fed by the embedded compositor.
    StreamBufferHandle, u32
);
renderer_id!(
    /// Surface id on the system compositor (IVI).
    WaylandIviSurfaceId, u32
);
renderer_id!(
    /// Layer id on the system compositor (IVI).
    WaylandIviLayerId, u32
);
renderer_id!(
    /// User-facing display id handed out by the renderer API.
    DisplayId, u32
);
renderer_id!(
    /// User-facing id of a display buffer (framebuffer or offscreen buffer).
    DisplayBufferId, u32
);
renderer_id!(
    /// User-facing id of a stream buffer.
    StreamBufferId, u32
);

/// Handle to a resource living on the GPU device.
///
/// A zero handle is the tag-coded "invalid" value; any create or upload
/// on a device reports failure by returning it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceResourceHandle(pub u64);

impl DeviceResourceHandle {
    /// The reserved invalid handle.
    pub const INVALID: Self = Self(0);

    /// Returns `true` unless this is the invalid handle.
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for DeviceResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "device#{}", self.0)
        } else {
            write!(f, "device#invalid")
        }
    }
}

impl Default for DeviceResourceHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

macro_rules! arena_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl $name {
            /// Arena slot index backing this handle.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "[{}]"), self.0)
            }
        }
    };
}

arena_handle!(
    /// Dense handle into a scene's node arena.
    NodeHandle
);
arena_handle!(
    /// Dense handle into a scene's mesh-node arena.
    MeshHandle
);
arena_handle!(
    /// Dense handle into a scene's camera arena.
    CameraHandle
);
arena_handle!(
    /// Dense handle into a scene's render-pass arena.
    RenderPassHandle
);
arena_handle!(
    /// Dense handle into a scene's data-instance arena.
    DataInstanceHandle
);
arena_handle!(
    /// Dense handle into a scene's pickable-object arena.
    PickableHandle
);

/// Id of a named data slot used for data linking between scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataSlotId(pub u32);

impl fmt::Display for DataSlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_invalid() {
        assert!(!SceneId::INVALID.is_valid());
        assert!(!DisplayHandle(0).is_valid());
        assert!(!DeviceResourceHandle::default().is_valid());
        assert!(SceneId(1).is_valid());
        assert!(DeviceResourceHandle(17).is_valid());
    }

    #[test]
    fn display_formatting() {
        assert_eq!(SceneId(42).to_string(), "SceneId(42)");
        assert_eq!(DeviceResourceHandle(3).to_string(), "device#3");
        assert_eq!(DeviceResourceHandle::INVALID.to_string(), "device#invalid");
    }
}
