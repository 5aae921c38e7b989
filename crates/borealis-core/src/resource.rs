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

//! The content-addressed resource model.
//!
//! A resource is an immutable blob (shader source, texture data, vertex
//! or index buffer) identified by a 128-bit content hash. Identical hash
//! implies identical bytes; a resource is never mutated after
//! registration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 128-bit content hash identifying a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceContentHash {
    /// Low 64 bits.
    pub low: u64,
    /// High 64 bits.
    pub high: u64,
}

impl ResourceContentHash {
    /// The reserved invalid hash (all zero).
    pub const INVALID: Self = Self { low: 0, high: 0 };

    /// Returns `true` unless this is the invalid hash.
    pub fn is_valid(&self) -> bool {
        self.low != 0 || self.high != 0
    }

    /// Computes the content hash of a payload.
    ///
    /// FNV-1a over the payload run twice with different offset bases; the
    /// resource kind is mixed in so that identical bytes of different
    /// kinds do not collide.
    pub fn from_payload(kind: ResourceKind, payload: &[u8]) -> Self {
        const PRIME: u64 = 0x0000_0100_0000_01B3;
        let mut low: u64 = 0xcbf2_9ce4_8422_2325 ^ kind as u64;
        let mut high: u64 = 0x6c62_272e_07bb_0142 ^ (kind as u64).rotate_left(32);
        for &b in payload {
            low = (low ^ u64::from(b)).wrapping_mul(PRIME);
            high = (high ^ u64::from(b).rotate_left(7)).wrapping_mul(PRIME);
        }
        Self { low, high }
    }
}

impl fmt::Display for ResourceContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}{:016x}", self.high, self.low)
    }
}

/// The kind of GPU resource a blob decodes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Shader program (vertex + fragment source), compiled asynchronously.
    Effect = 0,
    /// 2D texture.
    Texture2D = 1,
    /// 3D texture.
    Texture3D = 2,
    /// Cube texture.
    TextureCube = 3,
    /// Vertex array buffer.
    ArrayBuffer = 4,
    /// Index buffer.
    IndexBuffer = 5,
}

impl ResourceKind {
    /// Short name for log output.
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Effect => "Effect",
            ResourceKind::Texture2D => "Texture2D",
            ResourceKind::Texture3D => "Texture3D",
            ResourceKind::TextureCube => "TextureCube",
            ResourceKind::ArrayBuffer => "ArrayBuffer",
            ResourceKind::IndexBuffer => "IndexBuffer",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle status of a resource tracked by the registry.
///
/// Transitions follow the DAG
/// `Registered → Provided → (ScheduledForUpload →)? Uploaded | Broken`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    /// Referenced by a scene; payload not yet arrived.
    Registered,
    /// Payload available, not yet uploaded.
    Provided,
    /// Handed to the async shader uploader, waiting for the compile result.
    ScheduledForUpload,
    /// Resident on the device; the device handle is valid.
    Uploaded,
    /// Upload or compilation failed; draws referencing it are skipped.
    Broken,
}

impl ResourceStatus {
    /// Whether the status DAG permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: ResourceStatus) -> bool {
        use ResourceStatus::*;
        matches!(
            (self, next),
            (Registered, Provided)
                | (Provided, ScheduledForUpload)
                | (Provided, Uploaded)
                | (Provided, Broken)
                | (ScheduledForUpload, Uploaded)
                | (ScheduledForUpload, Broken)
        )
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceStatus::Registered => "Registered",
            ResourceStatus::Provided => "Provided",
            ResourceStatus::ScheduledForUpload => "ScheduledForUpload",
            ResourceStatus::Uploaded => "Uploaded",
            ResourceStatus::Broken => "Broken",
        };
        f.write_str(s)
    }
}

/// Compression applied to a blob payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadCompression {
    /// Payload stored verbatim.
    None,
    /// Byte-wise run-length encoding, effective for flat texture data.
    Rle,
}

/// An immutable, content-addressed resource payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBlob {
    kind: ResourceKind,
    compression: PayloadCompression,
    payload: Vec<u8>,
    decompressed_size: u32,
}

impl ResourceBlob {
    /// Wraps an uncompressed payload.
    pub fn new(kind: ResourceKind, payload: Vec<u8>) -> Self {
        let decompressed_size = payload.len() as u32;
        Self {
            kind,
            compression: PayloadCompression::None,
            payload,
            decompressed_size,
        }
    }

    /// Compresses a payload with RLE and wraps it.
    pub fn new_compressed(kind: ResourceKind, data: &[u8]) -> Self {
        Self {
            kind,
            compression: PayloadCompression::Rle,
            payload: rle_encode(data),
            decompressed_size: data.len() as u32,
        }
    }

    /// The resource kind this blob decodes to.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Size of the payload after decompression, in bytes.
    pub fn decompressed_size(&self) -> u32 {
        self.decompressed_size
    }

    /// Size of the stored (possibly compressed) payload, in bytes.
    pub fn stored_size(&self) -> u32 {
        self.payload.len() as u32
    }

    /// Content hash of this blob.
    pub fn content_hash(&self) -> ResourceContentHash {
        ResourceContentHash::from_payload(self.kind, &self.payload)
    }

    /// Decompresses the payload.
    pub fn decompress(&self) -> Vec<u8> {
        match self.compression {
            PayloadCompression::None => self.payload.clone(),
            PayloadCompression::Rle => rle_decode(&self.payload, self.decompressed_size as usize),
        }
    }
}

fn rle_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        let mut run = 1usize;
        while run < 255 && i + run < data.len() && data[i + run] == byte {
            run += 1;
        }
        out.push(run as u8);
        out.push(byte);
        i += run;
    }
    out
}

fn rle_decode(data: &[u8], expected_size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(expected_size);
    for pair in data.chunks_exact(2) {
        out.extend(std::iter::repeat(pair[1]).take(pair[0] as usize));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_content_addressed() {
        let a = ResourceContentHash::from_payload(ResourceKind::IndexBuffer, b"abc");
        let b = ResourceContentHash::from_payload(ResourceKind::IndexBuffer, b"abc");
        let c = ResourceContentHash::from_payload(ResourceKind::IndexBuffer, b"abd");
        let d = ResourceContentHash::from_payload(ResourceKind::ArrayBuffer, b"abc");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert!(a.is_valid());
    }

    #[test]
    fn status_dag() {
        use ResourceStatus::*;
        assert!(Registered.can_transition_to(Provided));
        assert!(Provided.can_transition_to(Uploaded));
        assert!(Provided.can_transition_to(ScheduledForUpload));
        assert!(ScheduledForUpload.can_transition_to(Broken));
        assert!(!Uploaded.can_transition_to(Provided));
        assert!(!Registered.can_transition_to(Uploaded));
        assert!(!Broken.can_transition_to(Uploaded));
    }

    #[test]
    fn rle_round_trip() {
        let data = [0u8; 1024]
            .iter()
            .chain([7u8; 300].iter())
            .copied()
            .collect::<Vec<_>>();
        let blob = ResourceBlob::new_compressed(ResourceKind::Texture2D, &data);
        assert!(blob.stored_size() < data.len() as u32);
        assert_eq!(blob.decompressed_size(), data.len() as u32);
        assert_eq!(blob.decompress(), data);
    }

    #[test]
    fn uncompressed_blob_passthrough() {
        let blob = ResourceBlob::new(ResourceKind::Effect, b"void main() {}".to_vec());
        assert_eq!(blob.decompress(), b"void main() {}");
        assert_eq!(blob.decompressed_size(), 14);
    }
}
