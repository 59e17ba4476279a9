//! Error types for uploads and GeoJSON decoding.

use std::fmt;

/// Errors that can occur while accepting a model upload.
///
/// None of these are fatal: the viewer reports them and keeps whatever model
/// it was already showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The file extension is not one the model viewer accepts.
    UnsupportedFormat {
        /// Name of the rejected file.
        file_name: String,
    },
    /// The file content could not be decoded or parsed.
    ParseFailure {
        /// Name of the file that failed.
        file_name: String,
        /// The parser's error message.
        message: String,
    },
    /// Another model is still being parsed.
    LoadInProgress {
        /// Name of the file that was turned away.
        file_name: String,
    },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::UnsupportedFormat { file_name } => {
                write!(
                    f,
                    "unsupported model format for {file_name}: upload a .gltf or .glb file"
                )
            }
            LoadError::ParseFailure { file_name, message } => {
                write!(f, "failed to load model {file_name}: {message}")
            }
            LoadError::LoadInProgress { file_name } => {
                write!(
                    f,
                    "cannot load {file_name} while another model is still loading"
                )
            }
        }
    }
}

impl std::error::Error for LoadError {}

/// Errors that reject a whole GeoJSON document.
///
/// Problems inside a single feature never produce an error; the feature is
/// skipped instead.
#[derive(Debug)]
pub enum GeoJsonError {
    /// The text is not JSON, or its root is not an object.
    ParseFailure {
        /// Description of what went wrong.
        message: String,
    },
}

impl fmt::Display for GeoJsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoJsonError::ParseFailure { message } => {
                write!(f, "invalid GeoJSON document: {message}")
            }
        }
    }
}

impl std::error::Error for GeoJsonError {}

impl From<serde_json::Error> for GeoJsonError {
    fn from(e: serde_json::Error) -> Self {
        GeoJsonError::ParseFailure {
            message: e.to_string(),
        }
    }
}
