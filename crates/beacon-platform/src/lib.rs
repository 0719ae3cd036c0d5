mod config;
mod host;
mod paths;

pub use config::{GlobalConfig, StorageError};
pub use host::{HostCapabilities, HostProfile, HostVersion, HoverFormat, UnsupportedHost};
pub use paths::{FALLBACK_ARTIFACT_NAME, UPDATE_FOLDER_NAME, UpdatePaths, artifact_file_name};
