//! Поток под внешней блокировкой и асинхронные операции над ним.
//!
//! Асинхронные варианты выполняют синхронную операцию на воркере пула
//! под блокировкой потока, поэтому операции с одним потоком
//! сериализуются, а их взаимный порядок не гарантирован.

use super::{SeekOrigin, Stream};
use crate::{
    errors::{StreamError, StreamResult},
    handle::TaskHandle,
    pool::WorkerPool,
};
use parking_lot::{Mutex, MutexGuard};
use std::{sync::Arc, time::Duration};


pub struct SharedStream<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedStream<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> SharedStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(stream)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.inner.lock()
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, S>> {
        self.inner.try_lock()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut *guard)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn aliases<D>(&self, other: &SharedStream<D>) -> bool {
        Arc::as_ptr(&self.inner).cast::<()>() == Arc::as_ptr(&other.inner).cast::<()>()
    }
}

impl<S: Stream + 'static> SharedStream<S> {
    /// Читает до `len` байт; вектор обрезается до прочитанного
    pub fn read_async(&self, pool: &WorkerPool, len: usize) -> StreamResult<TaskHandle<Vec<u8>>> {
        if len == 0 {
            return Err(StreamError::InvalidArgument("read length must be greater than 0"));
        }

        let stream = self.clone();
        Ok(pool.try_run(move || {
            let mut buffer = vec![0u8; len];
            let n = stream.lock().read(&mut buffer)?;
            buffer.truncate(n);
            Ok::<_, StreamError>(buffer)
        }))
    }

    pub fn write_async(
        &self,
        pool: &WorkerPool,
        data: impl Into<Vec<u8>>,
    ) -> StreamResult<TaskHandle<()>> {
        let data = data.into();
        if data.is_empty() {
            return Err(StreamError::InvalidArgument("write buffer is empty"));
        }

        let stream = self.clone();
        Ok(pool.try_run(move || stream.lock().write(&data)))
    }

    pub fn flush_async(&self, pool: &WorkerPool) -> TaskHandle<()> {
        let stream = self.clone();
        pool.try_run(move || stream.lock().flush())
    }

    pub fn seek_async(&self, pool: &WorkerPool, offset: i64, origin: SeekOrigin) -> TaskHandle<u64> {
        let stream = self.clone();
        pool.try_run(move || stream.lock().seek(offset, origin))
    }

    /// Блокирует сначала `dst`, затем источник. Встречные копирования
    /// между одной парой потоков нужно упорядочивать снаружи.
    pub fn copy_to_async<D: Stream + 'static>(
        &self,
        pool: &WorkerPool,
        dst: &SharedStream<D>,
    ) -> StreamResult<TaskHandle<u64>> {
        if self.aliases(dst) {
            return Err(StreamError::InvalidArgument("cannot copy a stream into itself"));
        }

        let src = self.clone();
        let dst = dst.clone();

        Ok(pool.try_run(move || {
            let mut dst = dst.lock();
            src.lock().copy_to(&mut *dst)
        }))
    }

    pub fn copy_to_async_with<D: Stream + 'static>(
        &self,
        pool: &WorkerPool,
        dst: &SharedStream<D>,
        buffer_size: usize,
    ) -> StreamResult<TaskHandle<u64>> {
        if buffer_size == 0 {
            return Err(StreamError::OutOfRange("copy buffer size must be greater than 0"));
        }

        if self.aliases(dst) {
            return Err(StreamError::InvalidArgument("cannot copy a stream into itself"));
        }

        let src = self.clone();
        let dst = dst.clone();

        Ok(pool.try_run(move || {
            let mut dst = dst.lock();
            src.lock().copy_to_with(&mut *dst, buffer_size)
        }))
    }
}

impl<S: Stream> Stream for SharedStream<S> {
    fn can_read(&self) -> bool {
        self.lock().can_read()
    }

    fn can_write(&self) -> bool {
        self.lock().can_write()
    }

    fn can_seek(&self) -> bool {
        self.lock().can_seek()
    }

    fn can_timeout(&self) -> bool {
        self.lock().can_timeout()
    }

    fn size(&self) -> StreamResult<u64> {
        self.lock().size()
    }

    fn set_size(&mut self, value: u64) -> StreamResult<()> {
        self.lock().set_size(value)
    }

    fn position(&self) -> StreamResult<u64> {
        self.lock().position()
    }

    fn set_position(&mut self, value: u64) -> StreamResult<()> {
        self.lock().set_position(value)
    }

    fn read_timeout(&self) -> StreamResult<Duration> {
        self.lock().read_timeout()
    }

    fn set_read_timeout(&mut self, value: Duration) -> StreamResult<()> {
        self.lock().set_read_timeout(value)
    }

    fn write_timeout(&self) -> StreamResult<Duration> {
        self.lock().write_timeout()
    }

    fn set_write_timeout(&mut self, value: Duration) -> StreamResult<()> {
        self.lock().set_write_timeout(value)
    }

    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        self.lock().read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> StreamResult<()> {
        self.lock().write(buf)
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> StreamResult<u64> {
        self.lock().seek(offset, origin)
    }

    fn flush(&mut self) -> StreamResult<()> {
        self.lock().flush()
    }

    fn close(&mut self) -> StreamResult<()> {
        self.lock().close()
    }
}
