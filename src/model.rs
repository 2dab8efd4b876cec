/// Снимок счётчиков пула.
///
/// `total_spawned` считает каждую постановку в очередь, включая повторные
/// попытки poll-адаптера; `completed_tasks` и `failed_tasks` считают
/// разрешённые handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    pub thread_count: usize,
    pub active_tasks: usize,
    pub idle_workers: usize,
    pub exited_workers: usize,
    pub queued_tasks: usize,
    pub total_spawned: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub cancelled_tasks: usize,
}

impl PoolMetrics {
    pub fn utilization(&self) -> f64 {
        if self.active_tasks + self.idle_workers == 0 {
            return 0.0;
        }
        self.active_tasks as f64 / (self.active_tasks + self.idle_workers) as f64
    }

    pub fn queue_pressure(&self) -> f64 {
        if self.thread_count == 0 {
            return self.queued_tasks as f64;
        }
        self.queued_tasks as f64 / self.thread_count as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.completed_tasks + self.failed_tasks;
        if total == 0 {
            return 1.0;
        }
        self.completed_tasks as f64 / total as f64
    }
}
