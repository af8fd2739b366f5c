//! Таблица отложенных задач сенсора (вместо coroutine/timer)
//!
//! Задачи поллятся один раз за tick против elapsed time.
//! Cancel — синхронная операция над таблицей: отменённая задача гарантированно не сработает.

/// Токен отмены задачи (уникален в пределах одной таблицы)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskToken(u64);

/// Что делать по наступлении срока
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorTask {
    /// Снять look-at override, вернуть собственный поворот
    ReleaseLookAt,
}

#[derive(Debug, Clone, Copy)]
struct ScheduledTask {
    token: TaskToken,
    due_at: f32,
    task: SensorTask,
}

#[derive(Debug, Clone, Default)]
pub struct ScheduledTasks {
    next_token: u64,
    pending: Vec<ScheduledTask>,
}

impl ScheduledTasks {
    pub fn schedule(&mut self, due_at: f32, task: SensorTask) -> TaskToken {
        let token = TaskToken(self.next_token);
        self.next_token += 1;

        self.pending.push(ScheduledTask { token, due_at, task });
        token
    }

    /// true если задача была в таблице (повторный cancel — no-op)
    pub fn cancel(&mut self, token: TaskToken) -> bool {
        let before = self.pending.len();
        self.pending.retain(|scheduled| scheduled.token != token);
        self.pending.len() != before
    }

    pub fn is_pending(&self, token: TaskToken) -> bool {
        self.pending.iter().any(|scheduled| scheduled.token == token)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Забирает задачи со сроком <= now (порядок: due_at, затем порядок постановки)
    pub fn take_due(&mut self, now: f32) -> Vec<(TaskToken, SensorTask)> {
        let mut due: Vec<ScheduledTask> = Vec::new();

        self.pending.retain(|scheduled| {
            if scheduled.due_at <= now {
                due.push(*scheduled);
                false
            } else {
                true
            }
        });

        due.sort_by(|a, b| a.due_at.total_cmp(&b.due_at).then(a.token.cmp(&b.token)));
        due.into_iter().map(|scheduled| (scheduled.token, scheduled.task)).collect()
    }
}
