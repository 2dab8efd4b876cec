use super::{resolve_seek, SeekOrigin, Stream};
use crate::errors::{StreamError, StreamResult};


/// Поток поверх `Vec<u8>`.
///
/// Созданный через `new`/`with_capacity` растёт при записи за концом.
/// Созданный из готовых данных (`from_vec`) имеет фиксированный размер.
#[derive(Debug, Clone)]
pub struct MemoryStream {
    buffer: Vec<u8>,
    position: u64,
    resizable: bool,
    writable: bool,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            position: 0,
            resizable: true,
            writable: true,
        }
    }

    pub fn from_vec(buffer: Vec<u8>) -> Self {
        Self {
            buffer,
            position: 0,
            resizable: false,
            writable: true,
        }
    }

    pub fn read_only(buffer: Vec<u8>) -> Self {
        Self {
            writable: false,
            ..Self::from_vec(buffer)
        }
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.buffer.clone()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn set_capacity(&mut self, capacity: usize) -> StreamResult<()> {
        if capacity < self.buffer.len() {
            return Err(StreamError::OutOfRange("capacity is smaller than the stream length"));
        }
        if !self.resizable && capacity != self.buffer.capacity() {
            return Err(StreamError::NotResizable);
        }
        self.buffer.reserve_exact(capacity - self.buffer.len());
        Ok(())
    }

    fn offset(&self) -> usize {
        usize::try_from(self.position).unwrap_or(usize::MAX)
    }
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for MemoryStream {
    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        self.writable
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn size(&self) -> StreamResult<u64> {
        Ok(self.buffer.len() as u64)
    }

    fn set_size(&mut self, value: u64) -> StreamResult<()> {
        if !self.resizable {
            return Err(StreamError::NotResizable);
        }
        let len = usize::try_from(value)
            .map_err(|_| StreamError::OutOfRange("length exceeds addressable memory"))?;
        self.buffer.resize(len, 0);
        Ok(())
    }

    fn position(&self) -> StreamResult<u64> {
        Ok(self.position)
    }

    fn set_position(&mut self, value: u64) -> StreamResult<()> {
        self.position = value;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        let start = self.offset();
        if start >= self.buffer.len() {
            return Ok(0);
        }

        let n = (self.buffer.len() - start).min(buf.len());
        buf[..n].copy_from_slice(&self.buffer[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> StreamResult<()> {
        if !self.writable {
            return Err(StreamError::Unsupported("write"));
        }

        let start = self.offset();
        let end = start
            .checked_add(buf.len())
            .ok_or(StreamError::OutOfRange("write past addressable memory"))?;

        if end > self.buffer.len() {
            if !self.resizable {
                return Err(StreamError::NotResizable);
            }
            self.buffer.resize(end, 0);
        }

        self.buffer[start..end].copy_from_slice(buf);
        self.position = end as u64;
        Ok(())
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> StreamResult<u64> {
        let base = match origin {
            SeekOrigin::Begin => 0,
            SeekOrigin::Current => self.position,
            SeekOrigin::End => self.buffer.len() as u64,
        };
        self.position = resolve_seek(base, offset)?;
        Ok(self.position)
    }

    fn flush(&mut self) -> StreamResult<()> {
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_back() {
        let mut stream = MemoryStream::new();
        stream.write(&[1, 2, 3, 4]).unwrap();
        assert_eq!(stream.position().unwrap(), 4);

        stream.seek(1, SeekOrigin::Begin).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[2, 3, 4]);
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn write_past_end_zero_fills_gap() {
        let mut stream = MemoryStream::new();
        stream.seek(2, SeekOrigin::Begin).unwrap();
        stream.write(&[9]).unwrap();
        assert_eq!(stream.buffer(), &[0, 0, 9]);
    }

    #[test]
    fn fixed_stream_rejects_growth() {
        let mut stream = MemoryStream::from_vec(vec![0; 2]);
        stream.write(&[1, 2]).unwrap();
        assert!(matches!(stream.write(&[3]), Err(StreamError::NotResizable)));
        assert!(matches!(stream.set_size(10), Err(StreamError::NotResizable)));
    }

    #[test]
    fn read_only_stream_rejects_writes() {
        let mut stream = MemoryStream::read_only(vec![1, 2]);
        assert!(!stream.can_write());
        assert!(matches!(stream.write(&[3]), Err(StreamError::Unsupported("write"))));
        assert_eq!(stream.read_byte().unwrap(), Some(1));
    }

    #[test]
    fn seek_from_end_and_before_start() {
        let mut stream = MemoryStream::from_vec(vec![0; 10]);
        assert_eq!(stream.seek(-3, SeekOrigin::End).unwrap(), 7);
        assert_eq!(stream.seek(2, SeekOrigin::Current).unwrap(), 9);
        assert!(matches!(stream.seek(-1, SeekOrigin::Begin), Err(StreamError::OutOfRange(_))));
        assert_eq!(stream.position().unwrap(), 9);
    }

    #[test]
    fn set_size_truncates_and_extends() {
        let mut stream = MemoryStream::new();
        stream.write(&[1, 2, 3]).unwrap();
        stream.set_size(1).unwrap();
        assert_eq!(stream.buffer(), &[1]);
        stream.set_size(3).unwrap();
        assert_eq!(stream.buffer(), &[1, 0, 0]);
    }
}
