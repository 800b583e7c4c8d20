use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("cannot access table file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed table data: {0}")]
    Malformed(String),

    #[error("malformed table file {}: {reason}", .path.display())]
    MalformedFile {
        path: PathBuf,
        reason: String,
    },
}

impl TableError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> TableError {
        TableError::Io { path: path.into(), source }
    }

    /// 為記憶體層級的格式錯誤補上檔案路徑
    pub(crate) fn with_path(self, path: impl Into<PathBuf>) -> TableError {
        match self {
            TableError::Malformed(reason) => TableError::MalformedFile {
                path: path.into(),
                reason,
            },
            other => other,
        }
    }
}
