use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("failed to allocate packet buffer pool {name}")]
    PoolAllocFailed { name: String },

    #[error("engine failed to allocate KNI device {name}")]
    DeviceAllocFailed { name: String },

    #[error("kernel request {op} on interface {name} failed: {source}")]
    IfaceRequest {
        op: &'static str,
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(#[source] io::Error),

    #[error("link state updates are not supported by this engine")]
    LinkNotSupported,

    #[error("engine failed to update link state")]
    LinkError,
}

pub type Result<T> = std::result::Result<T, Error>;
