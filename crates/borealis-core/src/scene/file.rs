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

//! The persisted scene-file container.
//!
//! A scene file is a self-describing container: a fixed-size header,
//! a table of contents mapping resource hashes to payload locations,
//! and the payload blobs. The version header is checked on open and
//! unknown versions fail closed.

use crate::error::SceneFileError;
use crate::resource::{ResourceBlob, ResourceContentHash, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::TryInto;
use std::io::{Read, Seek, SeekFrom, Write};

/// A unique byte sequence identifying Borealis scene files.
pub const FILE_MAGIC_BYTES: [u8; 8] = *b"BORESCNF";

/// Version of the container layout this build writes and reads.
pub const FILE_FORMAT_VERSION: u8 = 1;

const HEADER_SIZE: usize = 8 + 1 + 8;

/// Table-of-contents entry for one resource payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Content hash of the payload.
    pub hash: ResourceContentHash,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Offset of the payload within the blob section.
    pub offset: u64,
    /// Stored payload size in bytes.
    pub size: u32,
    /// Decompressed size in bytes.
    pub decompressed_size: u32,
}

// The header is fixed-layout and parsed by hand; only the table of
// contents goes through bincode.
fn parse_header(bytes: &[u8]) -> Result<u64, SceneFileError> {
    if bytes.len() < HEADER_SIZE {
        return Err(SceneFileError::Corrupt("truncated header".into()));
    }
    if bytes[0..8] != FILE_MAGIC_BYTES {
        return Err(SceneFileError::NotASceneFile);
    }
    let version = bytes[8];
    if version != FILE_FORMAT_VERSION {
        return Err(SceneFileError::UnsupportedVersion(version));
    }
    Ok(u64::from_le_bytes(bytes[9..HEADER_SIZE].try_into().unwrap()))
}

/// Writes scene files.
#[derive(Debug, Default)]
pub struct SceneFileWriter {
    toc: Vec<TocEntry>,
    blobs: Vec<u8>,
}

impl SceneFileWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one resource payload.
    pub fn add_resource(&mut self, blob: &ResourceBlob) {
        let payload = bincode::serialize(blob).expect("blob serialization cannot fail");
        self.toc.push(TocEntry {
            hash: blob.content_hash(),
            kind: blob.kind(),
            offset: self.blobs.len() as u64,
            size: payload.len() as u32,
            decompressed_size: blob.decompressed_size(),
        });
        self.blobs.extend(payload);
    }

    /// Writes the container.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<(), SceneFileError> {
        let toc = bincode::serialize(&self.toc)
            .map_err(|e| SceneFileError::Corrupt(format!("TOC serialization: {e}")))?;

        out.write_all(&FILE_MAGIC_BYTES)?;
        out.write_all(&[FILE_FORMAT_VERSION])?;
        out.write_all(&(toc.len() as u64).to_le_bytes())?;
        out.write_all(&toc)?;
        out.write_all(&self.blobs)?;
        Ok(())
    }
}

/// Reads scene files, giving random access to payloads by hash.
#[derive(Debug)]
pub struct SceneFileLoader<R> {
    reader: R,
    toc: HashMap<ResourceContentHash, TocEntry>,
    blob_section_start: u64,
}

impl<R: Read + Seek> SceneFileLoader<R> {
    /// Opens a container, parsing header and table of contents.
    pub fn open(mut reader: R) -> Result<Self, SceneFileError> {
        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header)?;
        let toc_len = parse_header(&header)?;

        let mut toc_bytes = vec![0u8; toc_len as usize];
        reader.read_exact(&mut toc_bytes)?;
        let entries: Vec<TocEntry> = bincode::deserialize(&toc_bytes)
            .map_err(|e| SceneFileError::Corrupt(format!("TOC deserialization: {e}")))?;

        let toc = entries.into_iter().map(|e| (e.hash, e)).collect();
        Ok(Self {
            reader,
            toc,
            blob_section_start: (HEADER_SIZE as u64) + toc_len,
        })
    }

    /// Number of payloads in the container.
    pub fn entry_count(&self) -> usize {
        self.toc.len()
    }

    /// Whether the container carries a payload for the hash.
    pub fn contains(&self, hash: ResourceContentHash) -> bool {
        self.toc.contains_key(&hash)
    }

    /// Positions the reader at the payload of `hash`.
    ///
    /// Returns a size-limited stream over the payload bytes together
    /// with the entry; `Err(MissingEntry)` if the file has no payload
    /// for that hash.
    pub fn get_entry(
        &mut self,
        hash: ResourceContentHash,
    ) -> Result<(std::io::Take<&mut R>, TocEntry), SceneFileError> {
        let entry = self
            .toc
            .get(&hash)
            .cloned()
            .ok_or(SceneFileError::MissingEntry(hash))?;
        self.reader
            .seek(SeekFrom::Start(self.blob_section_start + entry.offset))?;
        let stream = (&mut self.reader).take(u64::from(entry.size));
        Ok((stream, entry))
    }

    /// Reads and decodes the full blob for `hash`.
    pub fn read_blob(&mut self, hash: ResourceContentHash) -> Result<ResourceBlob, SceneFileError> {
        let (mut stream, entry) = self.get_entry(hash)?;
        let mut bytes = Vec::with_capacity(entry.size as usize);
        stream.read_to_end(&mut bytes)?;
        if bytes.len() != entry.size as usize {
            return Err(SceneFileError::Corrupt(format!(
                "payload for #{hash} truncated ({} of {} bytes)",
                bytes.len(),
                entry.size
            )));
        }
        bincode::deserialize(&bytes)
            .map_err(|e| SceneFileError::Corrupt(format!("payload for #{hash}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_blobs() -> Vec<ResourceBlob> {
        vec![
            ResourceBlob::new(ResourceKind::IndexBuffer, vec![0, 1, 2, 3, 4, 5]),
            ResourceBlob::new_compressed(ResourceKind::Texture2D, &[7u8; 4096]),
            ResourceBlob::new(ResourceKind::Effect, b"shader source".to_vec()),
        ]
    }

    fn write_container(blobs: &[ResourceBlob]) -> Vec<u8> {
        let mut writer = SceneFileWriter::new();
        for blob in blobs {
            writer.add_resource(blob);
        }
        let mut out = Vec::new();
        writer.write_to(&mut out).unwrap();
        out
    }

    #[test]
    fn round_trip_through_file() {
        let blobs = sample_blobs();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.bsf");

        let bytes = write_container(&blobs);
        std::fs::write(&path, bytes).unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let mut loader = SceneFileLoader::open(std::io::BufReader::new(file)).unwrap();
        assert_eq!(loader.entry_count(), blobs.len());

        for blob in &blobs {
            let loaded = loader.read_blob(blob.content_hash()).unwrap();
            assert_eq!(&loaded, blob);
        }
    }

    #[test]
    fn get_entry_streams_exact_size() {
        let blobs = sample_blobs();
        let bytes = write_container(&blobs);
        let mut loader = SceneFileLoader::open(Cursor::new(bytes)).unwrap();

        let hash = blobs[0].content_hash();
        let (mut stream, entry) = loader.get_entry(hash).unwrap();
        let mut payload = Vec::new();
        stream.read_to_end(&mut payload).unwrap();
        assert_eq!(payload.len(), entry.size as usize);
        assert_eq!(entry.kind, ResourceKind::IndexBuffer);
    }

    #[test]
    fn missing_entry_is_reported() {
        let bytes = write_container(&sample_blobs());
        let mut loader = SceneFileLoader::open(Cursor::new(bytes)).unwrap();
        let absent = ResourceContentHash { low: 1, high: 1 };
        assert!(matches!(
            loader.get_entry(absent),
            Err(SceneFileError::MissingEntry(_))
        ));
    }

    #[test]
    fn unknown_version_fails_closed() {
        let mut bytes = write_container(&sample_blobs());
        bytes[8] = 42;
        assert!(matches!(
            SceneFileLoader::open(Cursor::new(bytes)),
            Err(SceneFileError::UnsupportedVersion(42))
        ));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut bytes = write_container(&sample_blobs());
        bytes[0] = b'X';
        assert!(matches!(
            SceneFileLoader::open(Cursor::new(bytes)),
            Err(SceneFileError::NotASceneFile)
        ));
    }
}
