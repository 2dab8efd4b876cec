//! Буферизующая обёртка над любым `Stream`.
//!
//! Мелкие чтения и записи собираются во внутренний буфер фиксированной
//! ёмкости, чтобы реже обращаться к внутреннему потоку. Буфер в каждый
//! момент содержит либо непрочитанные данные (`Reading`), либо ещё не
//! записанные (`Writing`), но не то и другое сразу.
//!
//! Обёртка не синхронизирована: для доступа из нескольких потоков
//! оберните её в `SharedStream`.

use super::{resolve_seek, SeekOrigin, Stream};
use crate::errors::{StreamError, StreamResult};
use std::time::Duration;
use tracing::warn;


pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Что сейчас лежит в буфере
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferContext {
    None,
    Reading,
    Writing,
}


pub struct BufferedStream<S: Stream> {
    inner: S,
    buffer: Vec<u8>,
    read_pos: usize,
    read_len: usize,
    write_pos: usize,
    context: BufferContext,
}

impl<S: Stream> BufferedStream<S> {
    pub fn new(inner: S) -> StreamResult<Self> {
        Self::with_capacity(inner, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(inner: S, capacity: usize) -> StreamResult<Self> {
        if capacity == 0 {
            return Err(StreamError::InvalidArgument("buffer capacity must be greater than 0"));
        }
        if !inner.can_read() && !inner.can_write() {
            return Err(StreamError::InvalidArgument(
                "inner stream must be readable or writable",
            ));
        }

        Ok(Self {
            inner,
            buffer: vec![0u8; capacity],
            read_pos: 0,
            read_len: 0,
            write_pos: 0,
            context: BufferContext::None,
        })
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn context(&self) -> BufferContext {
        self.context
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Прямой доступ к внутреннему потоку в обход буфера.
    /// Перед использованием вызовите `flush`.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    fn reset_read(&mut self) {
        self.read_pos = 0;
        self.read_len = 0;
        if self.context == BufferContext::Reading {
            self.context = BufferContext::None;
        }
    }

    fn read_buffered(&mut self, buf: &mut [u8]) -> usize {
        let n = (self.read_len - self.read_pos).min(buf.len());
        buf[..n].copy_from_slice(&self.buffer[self.read_pos..self.read_pos + n]);
        self.read_pos += n;
        n
    }

    /// Отдаёт накопленные байты внутреннему потоку. При ошибке буфер
    /// сохраняется.
    fn flush_write(&mut self) -> StreamResult<()> {
        if self.write_pos > 0 {
            self.inner.write(&self.buffer[..self.write_pos])?;
            self.write_pos = 0;
        }
        if self.context == BufferContext::Writing {
            self.context = BufferContext::None;
        }
        Ok(())
    }

    /// Выбрасывает упреждающе прочитанные байты, возвращая внутренний
    /// поток на логическую позицию, если он умеет seek.
    fn discard_read_ahead(&mut self) -> StreamResult<()> {
        let unread = self.read_len - self.read_pos;
        if unread > 0 && self.inner.can_seek() {
            let back = i64::try_from(unread)
                .map_err(|_| StreamError::OutOfRange("read-ahead does not fit into a seek offset"))?;
            self.inner.seek(-back, SeekOrigin::Current)?;
        }
        self.reset_read();
        Ok(())
    }
}

impl<S: Stream> Stream for BufferedStream<S> {
    fn can_read(&self) -> bool {
        self.inner.can_read()
    }

    fn can_write(&self) -> bool {
        self.inner.can_write()
    }

    fn can_seek(&self) -> bool {
        self.inner.can_seek()
    }

    fn can_timeout(&self) -> bool {
        self.inner.can_timeout()
    }

    /// Логический размер с учётом ещё не записанных байт
    fn size(&self) -> StreamResult<u64> {
        let size = self.inner.size()?;
        if self.write_pos == 0 {
            return Ok(size);
        }
        let pending_end = self.inner.position()? + self.write_pos as u64;
        Ok(size.max(pending_end))
    }

    fn set_size(&mut self, value: u64) -> StreamResult<()> {
        self.flush_write()?;
        self.discard_read_ahead()?;
        self.inner.set_size(value)
    }

    fn position(&self) -> StreamResult<u64> {
        let inner = self.inner.position()?;
        Ok(match self.context {
            BufferContext::Reading => inner.saturating_sub((self.read_len - self.read_pos) as u64),
            BufferContext::Writing => inner + self.write_pos as u64,
            BufferContext::None => inner,
        })
    }

    fn read_timeout(&self) -> StreamResult<Duration> {
        self.inner.read_timeout()
    }

    fn set_read_timeout(&mut self, value: Duration) -> StreamResult<()> {
        self.inner.set_read_timeout(value)
    }

    fn write_timeout(&self) -> StreamResult<Duration> {
        self.inner.write_timeout()
    }

    fn set_write_timeout(&mut self, value: Duration) -> StreamResult<()> {
        self.inner.set_write_timeout(value)
    }

    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        if buf.is_empty() {
            return Err(StreamError::InvalidArgument("read buffer is empty"));
        }
        if self.context == BufferContext::Writing {
            self.flush_write()?;
        }

        if self.context == BufferContext::Reading && self.read_pos < self.read_len {
            return Ok(self.read_buffered(buf));
        }
        self.reset_read();

        // Большие чтения мимо буфера
        if buf.len() >= self.buffer.len() {
            return self.inner.read(buf);
        }

        let n = self.inner.read(&mut self.buffer)?;
        if n == 0 {
            return Ok(0);
        }
        self.read_len = n;
        self.context = BufferContext::Reading;
        Ok(self.read_buffered(buf))
    }

    fn write(&mut self, buf: &[u8]) -> StreamResult<()> {
        if buf.is_empty() {
            return Err(StreamError::InvalidArgument("write buffer is empty"));
        }
        if self.context == BufferContext::Reading {
            self.discard_read_ahead()?;
        }

        if self.write_pos + buf.len() > self.buffer.len() {
            self.flush_write()?;
        }
        if buf.len() >= self.buffer.len() {
            return self.inner.write(buf);
        }

        self.buffer[self.write_pos..self.write_pos + buf.len()].copy_from_slice(buf);
        self.write_pos += buf.len();
        self.context = BufferContext::Writing;
        Ok(())
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> StreamResult<u64> {
        if !self.inner.can_seek() {
            return Err(StreamError::Unsupported("seek"));
        }
        if self.context == BufferContext::Writing {
            self.flush_write()?;
        }

        let base = match origin {
            SeekOrigin::Begin => 0,
            SeekOrigin::Current => self.position()?,
            SeekOrigin::End => self.inner.size()?,
        };
        let target = resolve_seek(base, offset)?;

        if self.context == BufferContext::Reading {
            // Цель внутри окна буфера: достаточно сдвинуть курсор
            let inner_pos = self.inner.position()?;
            let window_start = inner_pos.saturating_sub(self.read_len as u64);
            if target >= window_start && target < inner_pos {
                self.read_pos = (target - window_start) as usize;
                return Ok(target);
            }
            self.reset_read();
        }

        let absolute = i64::try_from(target)
            .map_err(|_| StreamError::OutOfRange("seek target does not fit into an offset"))?;
        self.inner.seek(absolute, SeekOrigin::Begin)
    }

    /// Записывает накопленное и вызывает `flush` внутреннего потока,
    /// только если тот доступен на запись.
    fn flush(&mut self) -> StreamResult<()> {
        match self.context {
            BufferContext::Writing => self.flush_write()?,
            BufferContext::Reading if self.inner.can_seek() => self.discard_read_ahead()?,
            _ => {}
        }

        if self.inner.can_write() {
            self.inner.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> StreamResult<()> {
        self.flush()?;
        self.inner.close()
    }
}

impl<S: Stream> Drop for BufferedStream<S> {
    fn drop(&mut self) {
        if self.write_pos == 0 {
            return;
        }
        if let Err(err) = self.flush_write() {
            warn!(error = %err, pending = self.write_pos, "buffered writes lost on drop");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryStream;

    fn data(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let result = BufferedStream::with_capacity(MemoryStream::new(), 0);
        assert!(matches!(result, Err(StreamError::InvalidArgument(_))));
    }

    #[test]
    fn small_writes_stay_in_buffer() {
        let mut stream = BufferedStream::with_capacity(MemoryStream::new(), 8).unwrap();
        stream.write(&[1, 2, 3]).unwrap();
        assert_eq!(stream.context(), BufferContext::Writing);
        assert!(stream.get_ref().buffer().is_empty());
        assert_eq!(stream.position().unwrap(), 3);
        assert_eq!(stream.size().unwrap(), 3);

        stream.flush().unwrap();
        assert_eq!(stream.get_ref().buffer(), &[1, 2, 3]);
        assert_eq!(stream.context(), BufferContext::None);
    }

    #[test]
    fn overflow_flushes_before_absorbing() {
        let mut stream = BufferedStream::with_capacity(MemoryStream::new(), 4).unwrap();
        stream.write(&[1, 2, 3]).unwrap();
        stream.write(&[4, 5]).unwrap();
        assert_eq!(stream.get_ref().buffer(), &[1, 2, 3]);
        assert_eq!(stream.position().unwrap(), 5);
    }

    #[test]
    fn large_write_goes_straight_through() {
        let mut stream = BufferedStream::with_capacity(MemoryStream::new(), 4).unwrap();
        stream.write(&[9]).unwrap();
        stream.write(&data(10)).unwrap();
        assert_eq!(stream.get_ref().buffer().len(), 11);
        assert_eq!(stream.context(), BufferContext::None);
    }

    #[test]
    fn read_refills_once_and_serves_from_buffer() {
        let inner = MemoryStream::from_vec(data(20));
        let mut stream = BufferedStream::with_capacity(inner, 8).unwrap();

        let mut buf = [0u8; 3];
        assert_eq!(stream.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [0, 1, 2]);
        assert_eq!(stream.get_ref().position().unwrap(), 8);
        assert_eq!(stream.position().unwrap(), 3);

        let mut rest = [0u8; 7];
        // Короткое чтение: в буфере осталось 5 байт
        assert_eq!(stream.read(&mut rest).unwrap(), 5);
        assert_eq!(&rest[..5], &[3, 4, 5, 6, 7]);
    }

    #[test]
    fn seek_inside_window_keeps_buffer() {
        let inner = MemoryStream::from_vec(data(20));
        let mut stream = BufferedStream::with_capacity(inner, 8).unwrap();
        stream.read_byte().unwrap();

        assert_eq!(stream.seek(5, SeekOrigin::Begin).unwrap(), 5);
        assert_eq!(stream.context(), BufferContext::Reading);
        assert_eq!(stream.get_ref().position().unwrap(), 8);
        assert_eq!(stream.read_byte().unwrap(), Some(5));

        assert_eq!(stream.seek(-2, SeekOrigin::Current).unwrap(), 4);
        assert_eq!(stream.read_byte().unwrap(), Some(4));
    }

    #[test]
    fn seek_outside_window_discards_buffer() {
        let inner = MemoryStream::from_vec(data(20));
        let mut stream = BufferedStream::with_capacity(inner, 8).unwrap();
        stream.read_byte().unwrap();

        assert_eq!(stream.seek(-2, SeekOrigin::End).unwrap(), 18);
        assert_eq!(stream.context(), BufferContext::None);
        assert_eq!(stream.read_byte().unwrap(), Some(18));
    }

    #[test]
    fn write_after_read_rewinds_inner_stream() {
        let inner = MemoryStream::from_vec(data(10));
        let mut stream = BufferedStream::with_capacity(inner, 8).unwrap();
        assert_eq!(stream.read_byte().unwrap(), Some(0));

        stream.write(&[42]).unwrap();
        stream.flush().unwrap();
        assert_eq!(stream.get_ref().buffer()[..3], [0, 42, 2]);
        assert_eq!(stream.position().unwrap(), 2);
    }

    #[test]
    fn read_after_write_flushes_first() {
        let mut stream = BufferedStream::with_capacity(MemoryStream::new(), 8).unwrap();
        stream.write(&[1, 2, 3]).unwrap();
        stream.seek(0, SeekOrigin::Begin).unwrap();
        stream.write(&[7]).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[2, 3]);
        assert_eq!(stream.get_ref().buffer(), &[7, 2, 3]);
    }

    #[test]
    fn empty_buffers_are_rejected() {
        let mut stream = BufferedStream::new(MemoryStream::new()).unwrap();
        assert!(matches!(stream.read(&mut []), Err(StreamError::InvalidArgument(_))));
        assert!(matches!(stream.write(&[]), Err(StreamError::InvalidArgument(_))));
    }

    #[test]
    fn negative_seek_is_out_of_range() {
        let mut stream = BufferedStream::new(MemoryStream::new()).unwrap();
        assert!(matches!(
            stream.seek(-1, SeekOrigin::Begin),
            Err(StreamError::OutOfRange(_))
        ));
    }

    #[test]
    fn set_size_flushes_pending_writes() {
        let mut stream = BufferedStream::with_capacity(MemoryStream::new(), 16).unwrap();
        stream.write(&data(6)).unwrap();
        stream.set_size(4).unwrap();
        assert_eq!(stream.get_ref().buffer(), &[0, 1, 2, 3]);
    }
}
