use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldLoadError {
    #[error("unknown map '{0}'")]
    UnknownMap(String),
    #[error("map '{map}' has no warp events")]
    NoWarpEvents { map: String },
    #[error("map '{map}' is malformed: {reason}")]
    MalformedMap { map: String, reason: String },
    #[error("failed to read world manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid world manifest: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("world loader worker disconnected")]
    WorkerDisconnected,
}
