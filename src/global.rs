//! Пул уровня процесса.
//!
//! Для кода, которому неудобно передавать `WorkerPool` явно. Пул создаётся
//! лениво в остановленном состоянии; запускать и останавливать его нужно
//! через `initialize` и `deinitialize`.

use super::{
    errors::{PoolError, TaskError},
    handle::TaskHandle,
    pool::{Config, WorkerPool},
};
use std::{sync::OnceLock, time::Duration};

static POOL: OnceLock<WorkerPool> = OnceLock::new();

pub fn pool() -> &'static WorkerPool {
    POOL.get_or_init(|| WorkerPool::new(Config::default()))
}

pub fn initialize(thread_count: usize) -> Result<(), PoolError> {
    pool().initialize(thread_count)
}

/// Запуск с числом потоков из `Config::default()`
pub fn initialize_default() -> Result<(), PoolError> {
    let pool = pool();
    pool.initialize(pool.config().num_threads)
}

pub fn deinitialize(poll_interval: Option<Duration>) {
    pool().deinitialize(poll_interval)
}

pub fn is_running() -> bool {
    pool().is_running()
}

pub fn run<T, F>(f: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    pool().run(f)
}

pub fn try_run<T, E, F>(f: F) -> TaskHandle<T>
where
    T: Send + 'static,
    E: Into<TaskError>,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    pool().try_run(f)
}
