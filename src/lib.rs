//! Пул потоков для блокирующего ввода-вывода и общий контракт потоков
//!
//! # Features
//! - Фиксированный пул OS-потоков с FIFO-очередью и явным жизненным циклом
//! - Паники и ошибки задач доставляются через `TaskHandle`, воркер не падает
//! - Poll-адаптер: операции "не готово / готово / abort" без блокировки воркера
//! - `BufferedStream` поверх любого `Stream` с корректными seek и flush
//! - Асинхронные операции над потоками через `SharedStream`

pub mod errors;
pub mod global;
pub mod handle;
pub mod model;
pub mod poll;
pub mod pool;
pub mod stream;

pub use errors::{PoolError, StreamError, StreamResult, TaskError, TaskResult};
pub use handle::TaskHandle;
pub use model::PoolMetrics;
pub use poll::{poll_fn, poll_io, IoCommand, IoCompletion, PollState};
pub use pool::{Config, RetryPolicy, ThreadPool, WorkerPool};
pub use stream::{
    BufferContext, BufferedStream, FileAccess, FileStream, MemoryStream, SeekOrigin,
    SharedStream, Stream,
};
