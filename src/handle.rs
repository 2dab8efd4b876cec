use super::errors::{TaskError, TaskResult};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::{
    sync::oneshot::{self, error::TryRecvError},
    time::Duration,
};


/// Единица работы в очереди пула
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Сторона записи пары promise/future. Заполняется ровно один раз.
pub(crate) type Promise<T> = oneshot::Sender<TaskResult<T>>;

pub(crate) fn channel<T>() -> (Promise<T>, TaskHandle<T>) {
    let (tx, rx) = oneshot::channel();
    (tx, TaskHandle::new(rx))
}


/// Handle на результат задачи, выполняемой пулом.
///
/// Можно дождаться асинхронно (`.await`), заблокировать поток (`wait`)
/// или опросить без блокировки (`try_get`). Если promise уничтожен без
/// результата (задача выброшена при остановке пула), handle разрешается
/// в `TaskError::Cancelled`.
#[must_use = "dropping a TaskHandle discards the task result"]
pub struct TaskHandle<T> {
    receiver: oneshot::Receiver<TaskResult<T>>,
}

impl<T> TaskHandle<T> {

    pub(crate) fn new(receiver: oneshot::Receiver<TaskResult<T>>) -> Self {
        Self { receiver }
    }

    /// Уже разрешённый handle
    pub(crate) fn ready(result: TaskResult<T>) -> Self {
        let (tx, handle) = channel();
        let _ = tx.send(result);
        handle
    }

    /// Блокирует текущий поток до завершения задачи.
    ///
    /// Нельзя вызывать внутри async-контекста tokio, там используйте `.await`.
    pub fn wait(self) -> TaskResult<T> {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(TaskError::Cancelled))
    }

    /// Неблокирующий опрос. `None` пока задача не завершена.
    ///
    /// Результат отдаётся один раз, последующие вызовы вернут `Cancelled`.
    pub fn try_get(&mut self) -> Option<TaskResult<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(TaskError::Cancelled)),
        }
    }

    pub async fn await_timeout(self, timeout: Duration) -> TaskResult<T> {
        match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TaskError::Cancelled),
            Err(_) => Err(TaskError::Timeout),
        }
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = TaskResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(res) => Poll::Ready(res.unwrap_or(Err(TaskError::Cancelled))),
            Poll::Pending => Poll::Pending,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_handle_resolves_immediately() {
        let mut handle = TaskHandle::ready(Ok(7));
        assert_eq!(handle.try_get().map(|r| r.ok()), Some(Some(7)));
    }

    #[test]
    fn dropped_promise_resolves_to_cancelled() {
        let (tx, handle) = channel::<u32>();
        drop(tx);
        assert!(matches!(handle.wait(), Err(TaskError::Cancelled)));
    }

    #[test]
    fn pending_handle_reports_none() {
        let (tx, mut handle) = channel::<u32>();
        assert!(handle.try_get().is_none());
        let _ = tx.send(Ok(1));
        assert!(matches!(handle.try_get(), Some(Ok(1))));
    }
}
