//! Best-effort removal of transfer artifacts.

use std::io::ErrorKind;

use tracing::{debug, info};

use courier_core::ArtifactPaths;

/// Remove every artifact that exists. Failures are logged and swallowed.
///
/// Returns the number of files actually removed.
pub fn remove_artifacts(paths: &ArtifactPaths) -> usize {
    let mut removed = 0;
    for path in paths.iter() {
        match std::fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "cleaned up artifact");
                removed += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => debug!(path = %path.display(), "could not remove artifact: {e}"),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::timestamped(dir.path(), "t");
        std::fs::write(&paths.consignment, b"c").unwrap();
        std::fs::write(&paths.psbt, b"p").unwrap();

        assert_eq!(remove_artifacts(&paths), 2);
        assert!(!paths.consignment.exists());
        assert!(!paths.psbt.exists());
    }

    #[test]
    fn missing_files_are_fine() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::timestamped(dir.path(), "t");
        std::fs::write(&paths.psbt, b"p").unwrap();
        assert_eq!(remove_artifacts(&paths), 1);
        assert_eq!(remove_artifacts(&paths), 0);
    }

    #[test]
    fn undeletable_path_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be removed with remove_file.
        let paths = ArtifactPaths::new(dir.path(), dir.path().join("absent.psbt"));
        assert_eq!(remove_artifacts(&paths), 0);
        assert!(dir.path().exists());
    }
}
