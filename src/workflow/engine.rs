//! 工作流引擎 - 流程层
//!
//! 工作流定义（[`Step`] 树）被编译成扁平的指令序列，程序计数器
//! 保存在存缴上，因此中止或等待输入的运行可以从原处继续。

use std::fmt;

use tracing::{debug, error, info};

use crate::error::{AppResult, WorkflowError};
use crate::models::{Deposition, DepositionState, WorkflowStatus};
use crate::workflow::deposit_ctx::DepositCtx;

/// 单个任务的执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// 继续下一个任务
    Continue,
    /// 等待表单提交
    Wait { draft_id: String },
    /// 中止运行，下次从本任务重新开始
    Halt { reason: String },
}

impl TaskOutcome {
    pub fn halt(reason: impl Into<String>) -> Self {
        TaskOutcome::Halt {
            reason: reason.into(),
        }
    }

    pub fn wait(draft_id: impl Into<String>) -> Self {
        TaskOutcome::Wait {
            draft_id: draft_id.into(),
        }
    }
}

/// 工作流任务
pub trait Task {
    fn name(&self) -> &'static str;

    fn execute(&self, deposition: &mut Deposition, ctx: &mut DepositCtx<'_>)
        -> AppResult<TaskOutcome>;
}

/// 分支条件
pub type Condition = fn(&Deposition) -> bool;

/// 工作流定义
pub enum Step {
    Run(Box<dyn Task>),
    IfElse {
        cond: Condition,
        then: Vec<Step>,
        otherwise: Vec<Step>,
    },
}

impl Step {
    pub fn run(task: impl Task + 'static) -> Self {
        Step::Run(Box::new(task))
    }

    pub fn if_else(cond: Condition, then: Vec<Step>, otherwise: Vec<Step>) -> Self {
        Step::IfElse {
            cond,
            then,
            otherwise,
        }
    }
}

enum Instr {
    Exec(Box<dyn Task>),
    /// 条件不成立时跳转
    JumpUnless(Condition, usize),
    Jump(usize),
}

/// 一次运行的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Waiting { draft_id: String },
    Halted { reason: String },
}

/// 编译后的工作流
pub struct Workflow {
    name: &'static str,
    program: Vec<Instr>,
}

impl Workflow {
    pub fn compile(name: &'static str, steps: Vec<Step>) -> Self {
        let mut program = Vec::new();
        emit(&mut program, steps);
        Self { name, program }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 指令数量
    pub fn len(&self) -> usize {
        self.program.len()
    }

    pub fn is_empty(&self) -> bool {
        self.program.is_empty()
    }

    /// 从存缴保存的位置继续运行
    pub fn run(&self, deposition: &mut Deposition, ctx: &mut DepositCtx<'_>) -> AppResult<RunOutcome> {
        if deposition.state == DepositionState::Stopped {
            return Err(WorkflowError::Stopped {
                deposition_id: deposition.id,
            }
            .into());
        }
        if deposition.workflow.status == WorkflowStatus::Completed {
            debug!("[存缴 {}] 工作流已完成，跳过", deposition.id);
            return Ok(RunOutcome::Completed);
        }

        info!(
            "[存缴 {}] ▶ 运行工作流 {} ({}, pc={})",
            deposition.id, self.name, ctx.origin, deposition.workflow.pc
        );
        deposition.workflow.status = WorkflowStatus::Running;

        while let Some(instr) = self.program.get(deposition.workflow.pc) {
            match instr {
                Instr::Jump(target) => deposition.workflow.pc = *target,
                Instr::JumpUnless(cond, target) => {
                    deposition.workflow.pc = if cond(deposition) {
                        deposition.workflow.pc + 1
                    } else {
                        *target
                    };
                }
                Instr::Exec(task) => {
                    debug!("[存缴 {}] 执行任务 {}", deposition.id, task.name());
                    match task.execute(deposition, ctx) {
                        Ok(TaskOutcome::Continue) => deposition.workflow.pc += 1,
                        Ok(TaskOutcome::Wait { draft_id }) => {
                            info!("[存缴 {}] ⏸️ 等待草稿 {} 提交", deposition.id, draft_id);
                            deposition.workflow.status = WorkflowStatus::Waiting;
                            return Ok(RunOutcome::Waiting { draft_id });
                        }
                        Ok(TaskOutcome::Halt { reason }) => {
                            info!("[存缴 {}] ⏹️ {} 中止: {}", deposition.id, task.name(), reason);
                            deposition.workflow.status = WorkflowStatus::Halted;
                            return Ok(RunOutcome::Halted { reason });
                        }
                        Err(e) => {
                            error!("[存缴 {}] ❌ 任务 {} 失败: {}", deposition.id, task.name(), e);
                            deposition.workflow.status = WorkflowStatus::Failed;
                            return Err(e);
                        }
                    }
                }
            }
        }

        deposition.workflow.status = WorkflowStatus::Completed;
        deposition.state = DepositionState::Done;
        deposition.update();
        info!("[存缴 {}] ✅ 工作流完成", deposition.id);
        Ok(RunOutcome::Completed)
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("instructions", &self.program.len())
            .finish()
    }
}

fn emit(program: &mut Vec<Instr>, steps: Vec<Step>) {
    for step in steps {
        match step {
            Step::Run(task) => program.push(Instr::Exec(task)),
            Step::IfElse {
                cond,
                then,
                otherwise,
            } => {
                let branch = program.len();
                program.push(Instr::JumpUnless(cond, 0));
                emit(program, then);

                let skip_else = program.len();
                program.push(Instr::Jump(0));

                let else_start = program.len();
                emit(program, otherwise);
                let end = program.len();

                program[branch] = Instr::JumpUnless(cond, else_start);
                program[skip_else] = Instr::Jump(end);
            }
        }
    }
}
