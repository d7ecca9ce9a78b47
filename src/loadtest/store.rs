//! Newline-delimited session id file bridging a start run and a later ping run.
//!
//! One id per line, no header, no escaping. The file is written once at the
//! end of a start run and read once at the beginning of a ping run.

use std::fs::File;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::loadtest::error::LoadTestError;
use crate::loadtest::session::SessionId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the file contents with `sessions`, one per line, in order.
    pub fn write(&self, sessions: &[SessionId]) -> Result<usize, LoadTestError> {
        let io_err = |source| LoadTestError::Io {
            source,
            path: self.path.display().to_string(),
        };
        let mut file = BufWriter::new(File::create(&self.path).map_err(io_err)?);
        for session in sessions {
            writeln!(file, "{session}").map_err(io_err)?;
        }
        file.flush().map_err(io_err)?;
        tracing::info!(path = %self.path.display(), sessions = sessions.len(), "session store written");
        Ok(sessions.len())
    }

    /// Reads every persisted id in file order.
    ///
    /// Blank lines and the legacy sentinel are skipped. A missing file reads
    /// as an empty store.
    pub fn read(&self) -> Result<Vec<SessionId>, LoadTestError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), "session store not found, nothing to ping");
                return Ok(Vec::new());
            },
            Err(source) => {
                return Err(LoadTestError::Io {
                    source,
                    path: self.path.display().to_string(),
                });
            },
        };

        let sessions: Vec<SessionId> = text.lines().filter_map(SessionId::parse).collect();
        tracing::info!(path = %self.path.display(), sessions = sessions.len(), "session store read");
        Ok(sessions)
    }
}
