pub mod artifact;

pub use artifact::{artifact_path, read_artifact, write_artifact, StorageError, ARTIFACT_FILE_NAME};
