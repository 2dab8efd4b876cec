//! Общий контракт байтовых потоков и его реализации.
//!
//! Возможности потока проверяются через `can_*`; неподдерживаемая операция
//! возвращает `StreamError::Unsupported`, а не значение-заглушку.

pub mod buffered;
pub mod file;
pub mod memory;
pub mod shared;

pub use buffered::{BufferContext, BufferedStream};
pub use file::{FileAccess, FileStream};
pub use memory::MemoryStream;
pub use shared::SharedStream;

use super::errors::{StreamError, StreamResult};
use std::time::Duration;


/// Размер буфера `copy_to`, если поток не знает, сколько осталось
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 81920;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    Begin,
    Current,
    End,
}


pub trait Stream: Send {
    fn can_read(&self) -> bool;

    fn can_write(&self) -> bool;

    fn can_seek(&self) -> bool;

    fn can_timeout(&self) -> bool {
        false
    }

    fn size(&self) -> StreamResult<u64> {
        Err(StreamError::Unsupported("size"))
    }

    fn set_size(&mut self, _value: u64) -> StreamResult<()> {
        Err(StreamError::Unsupported("set_size"))
    }

    fn position(&self) -> StreamResult<u64> {
        Err(StreamError::Unsupported("position"))
    }

    fn set_position(&mut self, value: u64) -> StreamResult<()> {
        let offset = i64::try_from(value)
            .map_err(|_| StreamError::OutOfRange("position does not fit into a seek offset"))?;
        self.seek(offset, SeekOrigin::Begin).map(|_| ())
    }

    fn read_timeout(&self) -> StreamResult<Duration> {
        Err(StreamError::Unsupported("read_timeout"))
    }

    fn set_read_timeout(&mut self, _value: Duration) -> StreamResult<()> {
        Err(StreamError::Unsupported("set_read_timeout"))
    }

    fn write_timeout(&self) -> StreamResult<Duration> {
        Err(StreamError::Unsupported("write_timeout"))
    }

    fn set_write_timeout(&mut self, _value: Duration) -> StreamResult<()> {
        Err(StreamError::Unsupported("set_write_timeout"))
    }

    /// Читает до `buf.len()` байт. `0` означает конец данных.
    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize>;

    /// Пишет все байты или возвращает ошибку
    fn write(&mut self, buf: &[u8]) -> StreamResult<()>;

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> StreamResult<u64>;

    fn flush(&mut self) -> StreamResult<()>;

    fn close(&mut self) -> StreamResult<()> {
        Ok(())
    }

    fn read_byte(&mut self) -> StreamResult<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    fn write_byte(&mut self, value: u8) -> StreamResult<()> {
        self.write(&[value])
    }

    /// Перекачивает остаток потока в `dst`, возвращает число байт
    fn copy_to(&mut self, dst: &mut dyn Stream) -> StreamResult<u64> {
        let buffer_size = copy_buffer_size(self)?;
        self.copy_to_with(dst, buffer_size)
    }

    fn copy_to_with(&mut self, dst: &mut dyn Stream, buffer_size: usize) -> StreamResult<u64> {
        if buffer_size == 0 {
            return Err(StreamError::OutOfRange("copy buffer size must be greater than 0"));
        }

        let mut buffer = vec![0u8; buffer_size];
        let mut total = 0u64;
        loop {
            let n = self.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            dst.write(&buffer[..n])?;
            total += n as u64;
        }
        Ok(total)
    }
}


/// Для потоков с известным размером буфер не больше остатка
fn copy_buffer_size<S: Stream + ?Sized>(stream: &S) -> StreamResult<usize> {
    if !stream.can_seek() {
        return Ok(DEFAULT_COPY_BUFFER_SIZE);
    }

    let size = stream.size()?;
    let position = stream.position()?;
    if size <= position {
        return Ok(1);
    }

    let remaining = usize::try_from(size - position).unwrap_or(usize::MAX);
    Ok(remaining.min(DEFAULT_COPY_BUFFER_SIZE))
}

/// Абсолютная позиция `base + offset`; отрицательный результат запрещён
pub(crate) fn resolve_seek(base: u64, offset: i64) -> StreamResult<u64> {
    let target = i128::from(base) + i128::from(offset);
    if target < 0 {
        return Err(StreamError::OutOfRange("cannot seek before the beginning of the stream"));
    }
    u64::try_from(target).map_err(|_| StreamError::OutOfRange("seek target overflows"))
}


impl<S: Stream + ?Sized> Stream for Box<S> {
    fn can_read(&self) -> bool {
        (**self).can_read()
    }

    fn can_write(&self) -> bool {
        (**self).can_write()
    }

    fn can_seek(&self) -> bool {
        (**self).can_seek()
    }

    fn can_timeout(&self) -> bool {
        (**self).can_timeout()
    }

    fn size(&self) -> StreamResult<u64> {
        (**self).size()
    }

    fn set_size(&mut self, value: u64) -> StreamResult<()> {
        (**self).set_size(value)
    }

    fn position(&self) -> StreamResult<u64> {
        (**self).position()
    }

    fn set_position(&mut self, value: u64) -> StreamResult<()> {
        (**self).set_position(value)
    }

    fn read_timeout(&self) -> StreamResult<Duration> {
        (**self).read_timeout()
    }

    fn set_read_timeout(&mut self, value: Duration) -> StreamResult<()> {
        (**self).set_read_timeout(value)
    }

    fn write_timeout(&self) -> StreamResult<Duration> {
        (**self).write_timeout()
    }

    fn set_write_timeout(&mut self, value: Duration) -> StreamResult<()> {
        (**self).set_write_timeout(value)
    }

    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> StreamResult<()> {
        (**self).write(buf)
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> StreamResult<u64> {
        (**self).seek(offset, origin)
    }

    fn flush(&mut self) -> StreamResult<()> {
        (**self).flush()
    }

    fn close(&mut self) -> StreamResult<()> {
        (**self).close()
    }
}
