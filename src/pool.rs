use super::{
    errors::{PoolError, TaskError, TaskResult},
    handle::{self, Task, TaskHandle},
    model::PoolMetrics,
};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::{Condvar, Mutex};
use std::{
    any::Any,
    collections::VecDeque,
    mem,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};


/// Как poll-адаптер ждёт между повторными попытками
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Сразу обратно в очередь
    Immediate,
    /// `crossbeam::utils::Backoff`: сначала spin, потом yield
    Snooze,
    /// Фиксированная пауза перед повторной постановкой. Всё это время
    /// воркер занят и не берёт другие задачи, поэтому паузу стоит держать
    /// короткой, а потоков в пуле иметь больше, чем одновременных опросов.
    Sleep(Duration),
}


/// Конфигурация пула потоков
#[derive(Debug, Clone)]
pub struct Config {
    pub num_threads: usize,
    pub thread_name_prefix: String,
    pub shutdown_poll_interval: Duration,
    pub retry_policy: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            num_threads: (num_cpus * 4).max(2),
            thread_name_prefix: "pooled-io-worker".to_string(),
            shutdown_poll_interval: Duration::from_millis(10),
            retry_policy: RetryPolicy::Snooze,
        }
    }
}

impl Config {
    pub fn cpu_bound() -> Self {
        Self {
            num_threads: num_cpus::get().max(1),
            ..Default::default()
        }
    }

    /// Много потоков: задачи в основном ждут ввода-вывода. Повторы
    /// poll-адаптера через `Snooze`, без сна на воркере.
    pub fn io_bound() -> Self {
        Self {
            num_threads: (num_cpus::get() * 4).max(2),
            retry_policy: RetryPolicy::Snooze,
            ..Default::default()
        }
    }
}


pub type ThreadPool = Arc<WorkerPool>;

struct Queue {
    tasks: VecDeque<Task>,
    accepting: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    signal: Condvar,
    thread_count: AtomicUsize,
    idle_workers: AtomicUsize,
    /// Счётчик текущего поколения; отсоединённые воркеры прошлых
    /// поколений пишут в свой
    exited_workers: Mutex<Arc<AtomicUsize>>,
    active_tasks: AtomicUsize,
    total_spawned: AtomicUsize,
    completed_tasks: AtomicUsize,
    failed_tasks: AtomicUsize,
    cancelled_tasks: AtomicUsize,
    retry_policy: RetryPolicy,
}

impl Shared {
    /// Ставит задачу в очередь. Если пул остановлен, задача возвращается
    /// вызывающему, чтобы её drop произошёл вне блокировки.
    fn push(&self, task: Task) -> Result<(), Task> {
        let mut queue = self.queue.lock();
        if !queue.accepting {
            return Err(task);
        }
        queue.tasks.push_back(task);
        self.total_spawned.fetch_add(1, Ordering::Relaxed);
        self.signal.notify_one();
        Ok(())
    }

    fn record<T>(&self, result: &TaskResult<T>) {
        if result.is_ok() {
            self.completed_tasks.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_tasks.fetch_add(1, Ordering::Relaxed);
        }
    }
}


/// Клонируемая ссылка на очередь пула для задач, которые ставят
/// продолжения сами (poll-адаптер).
#[derive(Clone)]
pub(crate) struct Spawner {
    shared: Arc<Shared>,
}

impl Spawner {
    pub(crate) fn spawn(&self, task: Task) -> Result<(), Task> {
        self.shared.push(task)
    }

    pub(crate) fn record<T>(&self, result: &TaskResult<T>) {
        self.shared.record(result);
    }

    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        self.shared.retry_policy
    }
}


struct Generation {
    token: CancellationToken,
    threads: Vec<thread::JoinHandle<()>>,
    exited: Arc<AtomicUsize>,
}

#[derive(Default)]
struct Lifecycle {
    generation: Option<Generation>,
    stopping: bool,
}


/// Пул из фиксированного числа OS-потоков с общей FIFO-очередью.
///
/// Жизненный цикл явный: `initialize` запускает потоки, `deinitialize`
/// останавливает их и выбрасывает задачи, которые ещё не начались.
/// После остановки пул можно инициализировать заново.
pub struct WorkerPool {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
    config: Config,
}

impl WorkerPool {
    /// Пул в остановленном состоянии
    pub fn new(config: Config) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                tasks: VecDeque::new(),
                accepting: false,
            }),
            signal: Condvar::new(),
            thread_count: AtomicUsize::new(0),
            idle_workers: AtomicUsize::new(0),
            exited_workers: Mutex::new(Arc::new(AtomicUsize::new(0))),
            active_tasks: AtomicUsize::new(0),
            total_spawned: AtomicUsize::new(0),
            completed_tasks: AtomicUsize::new(0),
            failed_tasks: AtomicUsize::new(0),
            cancelled_tasks: AtomicUsize::new(0),
            retry_policy: config.retry_policy,
        });

        Self {
            shared,
            lifecycle: Mutex::new(Lifecycle::default()),
            config,
        }
    }

    /// Создаёт и сразу запускает пул на `num_threads` потоков
    pub fn start(num_threads: usize) -> Result<ThreadPool, PoolError> {
        Self::with_config(Config {
            num_threads,
            ..Default::default()
        })
    }

    pub fn with_config(config: Config) -> Result<ThreadPool, PoolError> {
        let num_threads = config.num_threads;
        let pool = Arc::new(Self::new(config));
        pool.initialize(num_threads)?;
        Ok(pool)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn initialize(&self, thread_count: usize) -> Result<(), PoolError> {
        if thread_count == 0 {
            return Err(PoolError::ThreadCountOutOfRange);
        }

        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.generation.is_some() {
            return Err(PoolError::AlreadyRunning);
        }
        if lifecycle.stopping {
            return Err(PoolError::Stopping);
        }

        let token = CancellationToken::new();
        let exited = Arc::new(AtomicUsize::new(0));

        // Очередь открывается только после запуска всех потоков: при откате
        // воркеры не успевают взять задачу
        let mut threads = Vec::with_capacity(thread_count);
        for index in 0..thread_count {
            let shared = Arc::clone(&self.shared);
            let worker_token = token.clone();
            let worker_exited = Arc::clone(&exited);
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", self.config.thread_name_prefix, index))
                .spawn(move || worker_loop(shared, worker_token, worker_exited));

            match spawned {
                Ok(handle) => threads.push(handle),
                Err(err) => {
                    warn!(index, error = %err, "failed to spawn worker, rolling back");
                    let generation = Generation { token, threads, exited };
                    self.stop(generation, self.config.shutdown_poll_interval);
                    return Err(PoolError::Spawn(err));
                }
            }
        }

        *self.shared.exited_workers.lock() = Arc::clone(&exited);
        self.shared.queue.lock().accepting = true;
        self.shared.thread_count.store(thread_count, Ordering::Release);
        lifecycle.generation = Some(Generation { token, threads, exited });
        debug!(thread_count, "worker pool initialized");
        Ok(())
    }

    /// Останавливает пул. Повторный вызов безопасен.
    ///
    /// `poll_interval` задаёт, как часто повторно будить воркеров, пока
    /// все они не завершатся; `None` берёт значение из `Config`.
    ///
    /// Если остановка уже идёт в другом потоке (в том числе когда задача
    /// останавливает свой же пул), вызов возвращается сразу, не дожидаясь её.
    /// До её окончания `initialize` возвращает `PoolError::Stopping`.
    pub fn deinitialize(&self, poll_interval: Option<Duration>) {
        let generation = {
            let mut lifecycle = self.lifecycle.lock();
            match lifecycle.generation.take() {
                Some(generation) => {
                    lifecycle.stopping = true;
                    generation
                }
                None => return,
            }
        };

        let interval = poll_interval.unwrap_or(self.config.shutdown_poll_interval);
        self.stop(generation, interval);
        self.lifecycle.lock().stopping = false;
    }

    pub fn shutdown(&self) {
        self.deinitialize(None);
    }

    fn stop(&self, generation: Generation, interval: Duration) {
        let Generation {
            token,
            threads,
            exited,
        } = generation;
        self.shared.thread_count.store(0, Ordering::Release);
        token.cancel();

        let discarded = {
            let mut queue = self.shared.queue.lock();
            queue.accepting = false;
            let tasks = mem::take(&mut queue.tasks);
            self.shared.signal.notify_all();
            tasks
        };
        let discarded_count = discarded.len();
        self.shared
            .cancelled_tasks
            .fetch_add(discarded_count, Ordering::Relaxed);
        // promise внутри задач уничтожаются здесь, handle получают Cancelled
        drop(discarded);

        // Вызов из собственного воркера: этот поток не завершится, пока не вернётся задача
        let current = thread::current().id();
        let own = threads.iter().filter(|t| t.thread().id() == current).count();
        let expected = threads.len() - own;

        while exited.load(Ordering::Acquire) < expected {
            {
                let _queue = self.shared.queue.lock();
                self.shared.signal.notify_all();
            }
            thread::sleep(interval);
        }

        for handle in threads {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("worker thread panicked outside of a task");
            }
        }

        debug!(discarded = discarded_count, "worker pool deinitialized");
    }

    /// Не блокируется на `deinitialize`: пул считается остановленным с
    /// начала остановки
    pub fn is_running(&self) -> bool {
        self.thread_count() > 0
    }

    pub fn thread_count(&self) -> usize {
        self.shared.thread_count.load(Ordering::Acquire)
    }

    pub(crate) fn spawner(&self) -> Spawner {
        Spawner {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Выполняет `f` на одном из воркеров.
    ///
    /// Паника внутри `f` не завершает воркер, а попадает в handle как
    /// `TaskError::Panic`. Если пул остановлен, handle сразу разрешён с
    /// `TaskError::PoolStopped`.
    pub fn run<T, F>(&self, f: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.try_run(move || Ok::<T, TaskError>(f()))
    }

    /// Как `run`, но для замыканий, возвращающих `Result`
    pub fn try_run<T, E, F>(&self, f: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        E: Into<TaskError>,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        let (promise, task_handle) = handle::channel();
        let shared = Arc::clone(&self.shared);

        let task: Task = Box::new(move || {
            let result = capture(f);
            shared.record(&result);
            let _ = promise.send(result);
        });

        match self.shared.push(task) {
            Ok(()) => task_handle,
            Err(rejected) => {
                drop(rejected);
                TaskHandle::ready(Err(TaskError::PoolStopped))
            }
        }
    }

    /// Собирает результаты в порядке завершения
    pub async fn join_handles<T>(handles: Vec<TaskHandle<T>>) -> Vec<TaskResult<T>> {
        if handles.is_empty() {
            return Vec::new();
        }

        let len = handles.len();
        let mut futures = FuturesUnordered::from_iter(handles);
        let mut results = Vec::with_capacity(len);

        while let Some(result) = futures.next().await {
            results.push(result);
        }

        results
    }

    /// Блокирующее ожидание в порядке постановки
    pub fn wait_all<T>(handles: Vec<TaskHandle<T>>) -> Vec<TaskResult<T>> {
        handles.into_iter().map(TaskHandle::wait).collect()
    }

    #[inline]
    pub fn metrics(&self) -> PoolMetrics {
        let queued_tasks = self.shared.queue.lock().tasks.len();
        PoolMetrics {
            thread_count: self.thread_count(),
            active_tasks: self.shared.active_tasks.load(Ordering::Relaxed),
            idle_workers: self.shared.idle_workers.load(Ordering::Relaxed),
            exited_workers: self.shared.exited_workers.lock().load(Ordering::Relaxed),
            queued_tasks,
            total_spawned: self.shared.total_spawned.load(Ordering::Relaxed),
            completed_tasks: self.shared.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.shared.failed_tasks.load(Ordering::Relaxed),
            cancelled_tasks: self.shared.cancelled_tasks.load(Ordering::Relaxed),
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}


fn worker_loop(shared: Arc<Shared>, token: CancellationToken, exited: Arc<AtomicUsize>) {
    loop {
        let task = {
            let mut queue = shared.queue.lock();
            loop {
                if token.is_cancelled() {
                    break None;
                }
                if let Some(task) = queue.tasks.pop_front() {
                    break Some(task);
                }
                shared.idle_workers.fetch_add(1, Ordering::AcqRel);
                shared.signal.wait(&mut queue);
                shared.idle_workers.fetch_sub(1, Ordering::AcqRel);
            }
        };

        let Some(task) = task else {
            break;
        };

        shared.active_tasks.fetch_add(1, Ordering::AcqRel);
        trace!("worker picked up a task");
        task();
        shared.active_tasks.fetch_sub(1, Ordering::AcqRel);
    }

    exited.fetch_add(1, Ordering::AcqRel);
    trace!("worker exited");
}


/// Единственная точка, где паника или ошибка задачи превращается в результат
pub(crate) fn capture<T, E, F>(f: F) -> TaskResult<T>
where
    E: Into<TaskError>,
    F: FnOnce() -> Result<T, E>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result.map_err(Into::into),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(%message, "task panicked");
            Err(TaskError::Panic(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
