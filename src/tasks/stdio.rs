//! Stdio wiring for child processes.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncWriteExt};

use tracing::warn;

/// Sentinel accepted in config to discard a stream explicitly.
const SUPPRESS: &str = "SUPPRESS";

/// Where one of a child's output streams goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StdioTarget {
    /// Drop the stream on the floor.
    #[default]
    Discard,
    /// Append raw bytes to a file. Opened create+append so a restarting
    /// child does not truncate its own log.
    File(PathBuf),
}

impl StdioTarget {
    /// Binds a config value: a file path, the `SUPPRESS` sentinel, or
    /// empty/absent for discard.
    pub fn from_config(value: Option<&str>) -> Self {
        match value {
            None | Some("") | Some(SUPPRESS) => StdioTarget::Discard,
            Some(path) => StdioTarget::File(PathBuf::from(path)),
        }
    }

    /// The `Stdio` disposition to spawn the child with.
    pub(super) fn as_stdio(&self) -> Stdio {
        match self {
            StdioTarget::Discard => Stdio::null(),
            StdioTarget::File(_) => Stdio::piped(),
        }
    }

    /// Spawns the copy task for a piped stream, if this target needs one.
    ///
    /// The copier forwards raw bytes until EOF on the pipe; it does not
    /// frame, line-buffer, or interpret them.
    pub(super) fn spawn_copier<R>(&self, task: &str, stream: Option<R>)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let StdioTarget::File(path) = self else {
            return;
        };
        let Some(mut stream) = stream else {
            return;
        };
        let task = task.to_string();
        let path = path.clone();
        tokio::spawn(async move {
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await;
            let mut file = match file {
                Ok(f) => f,
                Err(e) => {
                    warn!(task = %task, path = %path.display(), error = %e, "cannot open log target");
                    return;
                }
            };
            if let Err(e) = tokio::io::copy(&mut stream, &mut file).await {
                warn!(task = %task, path = %path.display(), error = %e, "log copy failed");
            }
            let _ = file.flush().await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_suppress_discard() {
        assert_eq!(StdioTarget::from_config(None), StdioTarget::Discard);
        assert_eq!(StdioTarget::from_config(Some("")), StdioTarget::Discard);
        assert_eq!(
            StdioTarget::from_config(Some("SUPPRESS")),
            StdioTarget::Discard
        );
    }

    #[test]
    fn path_becomes_file_target() {
        assert_eq!(
            StdioTarget::from_config(Some("/var/log/api.log")),
            StdioTarget::File(PathBuf::from("/var/log/api.log"))
        );
    }
}
