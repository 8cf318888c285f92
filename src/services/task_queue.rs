//! 后台任务队列 - 业务能力层
//!
//! 只负责"提交任务并返回任务ID"，不等待任务完成

use tracing::info;

/// 已提交的任务
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedTask {
    pub id: u64,
    pub program: String,
    pub user: String,
    pub args: Vec<String>,
}

/// 后台任务队列
pub trait TaskQueue {
    fn submit(&mut self, program: &str, user: &str, args: Vec<String>) -> u64;

    fn get(&self, task_id: u64) -> Option<SubmittedTask>;

    /// 分配任务序列号，同一序列中的任务按提交顺序执行
    fn reserve_sequence_id(&mut self) -> u64;
}

/// 内存中的任务队列
#[derive(Debug, Default)]
pub struct InMemoryTaskQueue {
    tasks: Vec<SubmittedTask>,
    last_sequence_id: u64,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskQueue for InMemoryTaskQueue {
    fn submit(&mut self, program: &str, user: &str, args: Vec<String>) -> u64 {
        let id = self.tasks.len() as u64 + 1;
        info!("📤 提交后台任务 #{}: {} {}", id, program, args.join(" "));
        self.tasks.push(SubmittedTask {
            id,
            program: program.to_string(),
            user: user.to_string(),
            args,
        });
        id
    }

    fn get(&self, task_id: u64) -> Option<SubmittedTask> {
        self.tasks.iter().find(|t| t.id == task_id).cloned()
    }

    fn reserve_sequence_id(&mut self) -> u64 {
        self.last_sequence_id += 1;
        self.last_sequence_id
    }
}
