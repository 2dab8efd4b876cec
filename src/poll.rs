//! Адаптер для операций, которые нельзя блокировать на воркере.
//!
//! Операция опрашивается короткими задачами пула: если она не готова,
//! продолжение снова ставится в очередь, и воркер освобождается для
//! других задач.

use super::{
    errors::{StreamError, StreamResult, TaskError},
    handle::{self, Promise, TaskHandle},
    pool::{capture, RetryPolicy, Spawner, WorkerPool},
};
use crossbeam::utils::Backoff;
use std::{fmt, task::Poll, thread};
use tracing::trace;


/// Готовность ресурса, которую сообщает probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    NotReady,
    Read,
    Write,
    ReadWrite,
    Abort,
}

impl PollState {
    pub fn is_readable(self) -> bool {
        matches!(self, PollState::Read | PollState::ReadWrite)
    }

    pub fn is_writable(self) -> bool {
        matches!(self, PollState::Write | PollState::ReadWrite)
    }
}


pub type ReadFn = Box<dyn FnMut(&mut [u8]) -> StreamResult<usize> + Send>;
pub type WriteFn = Box<dyn FnMut(&[u8]) -> StreamResult<usize> + Send>;

/// Операция чтения или записи вместе с буфером, которым она владеет
pub enum IoCommand {
    Read { handle: ReadFn, buffer: Vec<u8> },
    Write { handle: WriteFn, buffer: Vec<u8> },
}

impl IoCommand {
    pub fn read<F>(handle: F, buffer: Vec<u8>) -> Self
    where
        F: FnMut(&mut [u8]) -> StreamResult<usize> + Send + 'static,
    {
        IoCommand::Read {
            handle: Box::new(handle),
            buffer,
        }
    }

    pub fn write<F>(handle: F, buffer: Vec<u8>) -> Self
    where
        F: FnMut(&[u8]) -> StreamResult<usize> + Send + 'static,
    {
        IoCommand::Write {
            handle: Box::new(handle),
            buffer,
        }
    }

    fn accepts(&self, state: PollState) -> bool {
        match self {
            IoCommand::Read { .. } => state.is_readable(),
            IoCommand::Write { .. } => state.is_writable(),
        }
    }

    fn execute(&mut self) -> StreamResult<usize> {
        match self {
            IoCommand::Read { handle, buffer } => handle(buffer.as_mut_slice()),
            IoCommand::Write { handle, buffer } => handle(buffer.as_slice()),
        }
    }

    fn into_buffer(self) -> Vec<u8> {
        match self {
            IoCommand::Read { buffer, .. } | IoCommand::Write { buffer, .. } => buffer,
        }
    }
}

impl fmt::Debug for IoCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, len) = match self {
            IoCommand::Read { buffer, .. } => ("Read", buffer.len()),
            IoCommand::Write { buffer, .. } => ("Write", buffer.len()),
        };
        f.debug_struct("IoCommand")
            .field("kind", &kind)
            .field("buffer_len", &len)
            .finish()
    }
}


/// Результат `poll_io`: число переданных байт и буфер команды
#[derive(Debug)]
pub struct IoCompletion {
    pub transferred: usize,
    pub buffer: Vec<u8>,
    pub aborted: bool,
}

impl IoCompletion {
    /// Прочитанные (или записанные) байты
    pub fn filled(&self) -> &[u8] {
        &self.buffer[..self.transferred.min(self.buffer.len())]
    }
}


struct Attempt<T, F> {
    op: F,
    promise: Promise<T>,
    spawner: Spawner,
    backoff: Backoff,
    attempts: usize,
}

impl<T, E, F> Attempt<T, F>
where
    T: Send + 'static,
    E: Into<TaskError>,
    F: FnMut() -> Result<Poll<T>, E> + Send + 'static,
{
    fn run(mut self) {
        self.attempts += 1;

        match capture(&mut self.op) {
            Ok(Poll::Ready(value)) => {
                trace!(attempts = self.attempts, "poll operation completed");
                let result = Ok(value);
                self.spawner.record(&result);
                let _ = self.promise.send(result);
            }
            Ok(Poll::Pending) => {
                // handle уже никто не ждёт
                if self.promise.is_closed() {
                    return;
                }
                self.pace();
                self.resubmit();
            }
            Err(err) => {
                let result = Err(err);
                self.spawner.record(&result);
                let _ = self.promise.send(result);
            }
        }
    }

    fn pace(&self) {
        match self.spawner.retry_policy() {
            RetryPolicy::Immediate => {}
            RetryPolicy::Snooze => self.backoff.snooze(),
            RetryPolicy::Sleep(pause) => thread::sleep(pause),
        }
    }

    fn resubmit(self) {
        let spawner = self.spawner.clone();
        // Пул остановлен: задача уничтожается, handle получает Cancelled
        let _ = spawner.spawn(Box::new(move || self.run()));
    }
}


/// Превращает опрашиваемую операцию в `TaskHandle`.
///
/// `op` возвращает `Poll::Ready(value)` когда операция завершена и
/// `Poll::Pending` когда её нужно повторить. Ошибка или паника в `op`
/// завершают handle и останавливают повторы.
pub fn poll_fn<T, E, F>(pool: &WorkerPool, op: F) -> TaskHandle<T>
where
    T: Send + 'static,
    E: Into<TaskError>,
    F: FnMut() -> Result<Poll<T>, E> + Send + 'static,
{
    let (promise, task_handle) = handle::channel();
    let spawner = pool.spawner();
    let attempt = Attempt {
        op,
        promise,
        spawner: spawner.clone(),
        backoff: Backoff::new(),
        attempts: 0,
    };

    match spawner.spawn(Box::new(move || attempt.run())) {
        Ok(()) => task_handle,
        Err(rejected) => {
            drop(rejected);
            TaskHandle::ready(Err(TaskError::PoolStopped))
        }
    }
}


/// Выполняет `command`, когда `probe` сообщает готовность в нужном
/// направлении. `PollState::Abort` завершает handle с нулём байт.
pub fn poll_io<P>(pool: &WorkerPool, mut probe: P, command: IoCommand) -> TaskHandle<IoCompletion>
where
    P: FnMut() -> PollState + Send + 'static,
{
    let mut command = Some(command);

    poll_fn(pool, move || -> StreamResult<Poll<IoCompletion>> {
        let state = probe();
        let Some(pending) = command.as_mut() else {
            return Err(StreamError::Other("io command already completed".to_string()));
        };

        if state == PollState::Abort {
            let buffer = command.take().map(IoCommand::into_buffer).unwrap_or_default();
            return Ok(Poll::Ready(IoCompletion {
                transferred: 0,
                buffer,
                aborted: true,
            }));
        }
        if !pending.accepts(state) {
            return Ok(Poll::Pending);
        }

        let transferred = pending.execute()?;
        let buffer = command.take().map(IoCommand::into_buffer).unwrap_or_default();
        Ok(Poll::Ready(IoCompletion {
            transferred,
            buffer,
            aborted: false,
        }))
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_directions() {
        assert!(PollState::Read.is_readable());
        assert!(!PollState::Read.is_writable());
        assert!(PollState::ReadWrite.is_readable());
        assert!(PollState::ReadWrite.is_writable());
        assert!(!PollState::NotReady.is_readable());
        assert!(!PollState::Abort.is_writable());
    }

    #[test]
    fn command_accepts_matching_direction_only() {
        let read = IoCommand::read(|_| Ok(0), vec![0; 4]);
        let write = IoCommand::write(|b| Ok(b.len()), vec![1; 4]);
        assert!(read.accepts(PollState::Read));
        assert!(!read.accepts(PollState::Write));
        assert!(write.accepts(PollState::ReadWrite));
        assert!(!write.accepts(PollState::NotReady));
    }

    #[test]
    fn filled_is_bounded_by_buffer() {
        let completion = IoCompletion {
            transferred: 10,
            buffer: vec![1, 2, 3],
            aborted: false,
        };
        assert_eq!(completion.filled(), &[1, 2, 3]);
    }
}
