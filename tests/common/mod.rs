#![allow(dead_code)]

use pooled_io::{MemoryStream, SeekOrigin, Stream, StreamError, StreamResult};
use proptest::test_runner::Config as ProptestConfig;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Once,
};

static INIT_LOGGING: Once = Once::new();

/// Логи тестов в формате `tracing`; уровень из `RUST_LOG`
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .with_thread_names(true)
            .try_init();
    });
}

/// Число случаев можно переопределить через `PROPTEST_CASES`
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(cases);
    ProptestConfig::with_cases(cases)
}

pub fn create_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| i as u8).collect()
}


#[derive(Debug, Default)]
pub struct Counters {
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    pub seeks: AtomicUsize,
    pub flushes: AtomicUsize,
}

impl Counters {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn seeks(&self) -> usize {
        self.seeks.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}


/// MemoryStream с настраиваемыми возможностями и счётчиками вызовов
pub struct ProbeStream {
    pub inner: MemoryStream,
    pub readable: bool,
    pub writable: bool,
    pub seekable: bool,
    pub counters: Arc<Counters>,
}

impl ProbeStream {
    pub fn new(inner: MemoryStream) -> Self {
        Self {
            inner,
            readable: true,
            writable: true,
            seekable: true,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn read_only(data: Vec<u8>) -> Self {
        Self {
            writable: false,
            ..Self::new(MemoryStream::from_vec(data))
        }
    }
}

impl Stream for ProbeStream {
    fn can_read(&self) -> bool {
        self.readable
    }

    fn can_write(&self) -> bool {
        self.writable
    }

    fn can_seek(&self) -> bool {
        self.seekable
    }

    fn size(&self) -> StreamResult<u64> {
        if !self.seekable {
            return Err(StreamError::Unsupported("size"));
        }
        self.inner.size()
    }

    fn position(&self) -> StreamResult<u64> {
        if !self.seekable {
            return Err(StreamError::Unsupported("position"));
        }
        self.inner.position()
    }

    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> StreamResult<()> {
        if !self.writable {
            return Err(StreamError::Unsupported("write"));
        }
        self.counters.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(buf)
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> StreamResult<u64> {
        if !self.seekable {
            return Err(StreamError::Unsupported("seek"));
        }
        self.counters.seeks.fetch_add(1, Ordering::SeqCst);
        self.inner.seek(offset, origin)
    }

    fn flush(&mut self) -> StreamResult<()> {
        self.counters.flushes.fetch_add(1, Ordering::SeqCst);
        self.inner.flush()
    }
}


/// Поток, у которого каждая операция ввода-вывода падает
#[derive(Default)]
pub struct FailingStream;

impl Stream for FailingStream {
    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        true
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn read(&mut self, _buf: &mut [u8]) -> StreamResult<usize> {
        Err(StreamError::Other("operation not allowed".to_string()))
    }

    fn write(&mut self, _buf: &[u8]) -> StreamResult<()> {
        Err(StreamError::Other("operation not allowed".to_string()))
    }

    fn seek(&mut self, _offset: i64, _origin: SeekOrigin) -> StreamResult<u64> {
        Err(StreamError::Other("operation not allowed".to_string()))
    }

    fn flush(&mut self) -> StreamResult<()> {
        Err(StreamError::Other("operation not allowed".to_string()))
    }
}
