use super::{SeekOrigin, Stream};
use crate::errors::{StreamError, StreamResult};
use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccess {
    Read,
    Write,
    ReadWrite,
}

impl FileAccess {
    fn readable(self) -> bool {
        matches!(self, FileAccess::Read | FileAccess::ReadWrite)
    }

    fn writable(self) -> bool {
        matches!(self, FileAccess::Write | FileAccess::ReadWrite)
    }
}


/// Поток поверх файла ОС. После `close` все операции возвращают `Closed`.
#[derive(Debug)]
pub struct FileStream {
    file: Option<File>,
    access: FileAccess,
    path: PathBuf,
}

impl FileStream {
    /// Открывает файл; для записи файл создаётся, если его нет
    pub fn open(path: impl AsRef<Path>, access: FileAccess) -> StreamResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(access.readable())
            .write(access.writable())
            .create(access.writable())
            .open(path)?;

        Ok(Self {
            file: Some(file),
            access,
            path: path.to_path_buf(),
        })
    }

    /// Создаёт пустой файл (или обрезает существующий) для чтения и записи
    pub fn create(path: impl AsRef<Path>) -> StreamResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            file: Some(file),
            access: FileAccess::ReadWrite,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn access(&self) -> FileAccess {
        self.access
    }

    fn file(&self) -> StreamResult<&File> {
        self.file.as_ref().ok_or(StreamError::Closed)
    }

    fn file_mut(&mut self) -> StreamResult<&mut File> {
        self.file.as_mut().ok_or(StreamError::Closed)
    }
}

impl Stream for FileStream {
    fn can_read(&self) -> bool {
        self.file.is_some() && self.access.readable()
    }

    fn can_write(&self) -> bool {
        self.file.is_some() && self.access.writable()
    }

    fn can_seek(&self) -> bool {
        self.file.is_some()
    }

    fn size(&self) -> StreamResult<u64> {
        Ok(self.file()?.metadata()?.len())
    }

    fn set_size(&mut self, value: u64) -> StreamResult<()> {
        if !self.access.writable() {
            return Err(StreamError::Unsupported("set_size"));
        }
        self.file()?.set_len(value)?;
        Ok(())
    }

    fn position(&self) -> StreamResult<u64> {
        let mut file = self.file()?;
        Ok(file.stream_position()?)
    }

    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        if !self.access.readable() {
            return Err(StreamError::Unsupported("read"));
        }
        Ok(self.file_mut()?.read(buf)?)
    }

    fn write(&mut self, buf: &[u8]) -> StreamResult<()> {
        if !self.access.writable() {
            return Err(StreamError::Unsupported("write"));
        }
        self.file_mut()?.write_all(buf)?;
        Ok(())
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> StreamResult<u64> {
        let target = match origin {
            SeekOrigin::Begin => {
                let start = u64::try_from(offset)
                    .map_err(|_| StreamError::OutOfRange("cannot seek before the beginning of the stream"))?;
                SeekFrom::Start(start)
            }
            SeekOrigin::Current => SeekFrom::Current(offset),
            SeekOrigin::End => SeekFrom::End(offset),
        };
        Ok(self.file_mut()?.seek(target)?)
    }

    fn flush(&mut self) -> StreamResult<()> {
        self.file_mut()?.flush()?;
        Ok(())
    }

    fn close(&mut self) -> StreamResult<()> {
        if let Some(file) = self.file.take() {
            if self.access.writable() {
                file.sync_all()?;
            }
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, process};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pooled_io_{}_{}", process::id(), name))
    }

    #[test]
    fn write_seek_read() {
        let path = temp_path("write_seek_read");
        let mut stream = FileStream::create(&path).unwrap();
        stream.write(b"hello world").unwrap();
        assert_eq!(stream.size().unwrap(), 11);

        stream.seek(6, SeekOrigin::Begin).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(stream.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"world");
        assert_eq!(stream.position().unwrap(), 11);

        stream.close().unwrap();
        assert!(matches!(stream.read(&mut buf), Err(StreamError::Closed)));
        assert!(!stream.can_read());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn read_only_access_refuses_writes() {
        let path = temp_path("read_only_access");
        fs::write(&path, b"abc").unwrap();

        let mut stream = FileStream::open(&path, FileAccess::Read).unwrap();
        assert!(stream.can_read());
        assert!(!stream.can_write());
        assert!(matches!(stream.write(b"x"), Err(StreamError::Unsupported("write"))));
        assert!(matches!(stream.seek(-1, SeekOrigin::Begin), Err(StreamError::OutOfRange(_))));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = FileStream::open(temp_path("does_not_exist"), FileAccess::Read);
        assert!(matches!(result, Err(StreamError::Io(_))));
    }
}
