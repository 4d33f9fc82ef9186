//! Filesystem probe.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::events::Event;
use crate::probes::Probe;

/// Ensures a directory exists, creating it (and its parents) with the
/// given mode when absent.
///
/// Idempotent: an existing directory is left untouched, whatever its
/// permissions. A non-directory at the path is `Failed`.
pub struct EnsureDir {
    path: PathBuf,
    mode: u32,
    label: String,
}

impl EnsureDir {
    /// Default creation mode when the config does not give one.
    pub const DEFAULT_MODE: u32 = 0o755;

    pub fn new(path: impl Into<PathBuf>, mode: u32) -> Self {
        let path = path.into();
        Self {
            label: format!("ensuredir:{}", path.display()),
            path,
            mode,
        }
    }
}

#[async_trait]
impl Probe for EnsureDir {
    fn name(&self) -> &str {
        &self.label
    }

    async fn check(&self) -> Event {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_dir() => return Event::ok(),
            Ok(_) => {
                return Event::failed(format!("{} exists and is not a directory", self.path.display()))
            }
            Err(_) => {}
        }

        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(self.mode);

        match builder.create(&self.path).await {
            Ok(()) => Event::ok(),
            Err(e) => Event::failed(format!("mkdir {}: {e}", self.path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventCode;

    #[tokio::test]
    async fn creates_nested_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("a/b/c");

        let probe = EnsureDir::new(&target, 0o755);
        assert_eq!(probe.check().await.code(), EventCode::Ok);
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn idempotent_for_existing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("data");

        let probe = EnsureDir::new(&target, 0o700);
        assert_eq!(probe.check().await.code(), EventCode::Ok);
        assert_eq!(probe.check().await.code(), EventCode::Ok);
        assert_eq!(probe.check().await.code(), EventCode::Ok);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn applies_requested_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("restricted");

        let probe = EnsureDir::new(&target, 0o700);
        assert_eq!(probe.check().await.code(), EventCode::Ok);

        let mode = std::fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[tokio::test]
    async fn fails_on_non_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("file");
        std::fs::write(&target, b"x").unwrap();

        let probe = EnsureDir::new(&target, 0o755);
        assert_eq!(probe.check().await.code(), EventCode::Failed);
    }
}
