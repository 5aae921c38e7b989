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

//! Defines the hierarchy of error types for the renderer.
//!
//! Synchronous failures of the command API (invalid arguments, unknown
//! entities, precondition violations) are reported through
//! [`RendererApiError`]; everything asynchronous surfaces as a paired
//! `*Failed` event instead and never crosses the command boundary as an
//! error.

use crate::handle::SceneId;
use crate::resource::ResourceContentHash;
use std::fmt;

/// Synchronous error returned by the public command API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererApiError {
    /// A caller-supplied argument is outside its valid domain.
    InvalidArgument(String),
    /// The command names an entity the renderer does not know.
    UnknownEntity(String),
    /// The call violates an API precondition (e.g. mixing threading modes).
    Precondition(String),
}

impl fmt::Display for RendererApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RendererApiError::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            RendererApiError::UnknownEntity(msg) => write!(f, "Unknown entity: {msg}"),
            RendererApiError::Precondition(msg) => write!(f, "Precondition violated: {msg}"),
        }
    }
}

impl std::error::Error for RendererApiError {}

/// Error produced while decoding or applying a serialized scene update.
#[derive(Debug)]
pub enum SceneUpdateError {
    /// The update payload could not be decoded.
    Decode(String),
    /// The update payload was encoded with an unknown format version.
    UnsupportedVersion(u8),
    /// The update names a scene that was never received.
    UnknownScene(SceneId),
    /// An action references an arena handle that is not allocated.
    InvalidHandle {
        /// Scene the action was applied to.
        scene: SceneId,
        /// Human-readable description of the offending handle.
        what: String,
    },
}

impl fmt::Display for SceneUpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneUpdateError::Decode(msg) => write!(f, "Failed to decode scene update: {msg}"),
            SceneUpdateError::UnsupportedVersion(v) => {
                write!(f, "Unsupported scene update version {v}")
            }
            SceneUpdateError::UnknownScene(id) => {
                write!(f, "Scene update for unknown scene {id}")
            }
            SceneUpdateError::InvalidHandle { scene, what } => {
                write!(f, "Scene update for {scene} references invalid {what}")
            }
        }
    }
}

impl std::error::Error for SceneUpdateError {}

/// Error produced by the persisted scene-file loader and writer.
#[derive(Debug)]
pub enum SceneFileError {
    /// Underlying I/O failure.
    Io(std::io::Error),
    /// File does not start with the expected magic bytes.
    NotASceneFile,
    /// File carries a format version this build does not understand.
    UnsupportedVersion(u8),
    /// Structural damage (truncated table of contents or payload).
    Corrupt(String),
    /// The table of contents has no payload for the requested hash.
    MissingEntry(ResourceContentHash),
}

impl fmt::Display for SceneFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneFileError::Io(e) => write!(f, "Scene file I/O error: {e}"),
            SceneFileError::NotASceneFile => write!(f, "Not a Borealis scene file"),
            SceneFileError::UnsupportedVersion(v) => {
                write!(f, "Unsupported scene file version {v}; refusing to load")
            }
            SceneFileError::Corrupt(msg) => write!(f, "Corrupt scene file: {msg}"),
            SceneFileError::MissingEntry(hash) => {
                write!(f, "Scene file has no payload for resource #{hash}")
            }
        }
    }
}

impl std::error::Error for SceneFileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SceneFileError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SceneFileError {
    fn from(e: std::io::Error) -> Self {
        SceneFileError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = RendererApiError::InvalidArgument("framerate must be positive".into());
        assert_eq!(format!("{err}"), "Invalid argument: framerate must be positive");

        let err = RendererApiError::UnknownEntity("display DisplayId(9)".into());
        assert_eq!(format!("{err}"), "Unknown entity: display DisplayId(9)");
    }

    #[test]
    fn scene_file_error_wraps_io() {
        use std::error::Error;
        let err: SceneFileError =
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(err.source().is_some());
        assert!(format!("{err}").starts_with("Scene file I/O error"));
    }
}
