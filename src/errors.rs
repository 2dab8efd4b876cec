use std::io;
use thiserror::Error;


/// Ошибки жизненного цикла пула
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("thread count must be greater than 0")]
    ThreadCountOutOfRange,
    #[error("pool is already running, call deinitialize first")]
    AlreadyRunning,
    #[error("pool is shutting down, retry after deinitialize returns")]
    Stopping,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),
}


/// Ошибки потоков ввода-вывода
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("out of range: {0}")]
    OutOfRange(&'static str),
    #[error("operation `{0}` is not supported by this stream")]
    Unsupported(&'static str),
    #[error("stream does not support resizing")]
    NotResizable,
    #[error("stream is closed")]
    Closed,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0}")]
    Other(String),
}


/// Ошибки, доставляемые через TaskHandle
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task panicked: {0}")]
    Panic(String),
    #[error("task was cancelled before it ran")]
    Cancelled,
    #[error("pool is not running")]
    PoolStopped,
    #[error("timed out waiting for task")]
    Timeout,
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("{0}")]
    Failed(String),
}

impl TaskError {
    pub fn failed(err: impl std::fmt::Display) -> Self {
        TaskError::Failed(err.to_string())
    }
}


pub type StreamResult<T> = Result<T, StreamError>;

pub type TaskResult<T> = Result<T, TaskError>;
