//! Plan execution
//!
//! Each task instance moves through [`TaskState`]s in plan order. The first
//! failure stops the run; nothing after it is started.

use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::{execute_command, first_unmet, Context, Plan, TaskInstance};
use crate::ui::Verbosity;
use std::fmt;
use tracing::debug;

/// Lifecycle of one task instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    EvaluatingConditions,
    Skipped,
    Running,
    Done,
    Failed,
}

impl TaskState {
    /// Whether the instance will not change state again
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Skipped | TaskState::Done | TaskState::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Pending => "pending",
            TaskState::EvaluatingConditions => "evaluating-conditions",
            TaskState::Skipped => "skipped",
            TaskState::Running => "running",
            TaskState::Done => "done",
            TaskState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Runs a plan
pub struct Engine {
    plan: Plan,
    states: Vec<TaskState>,
}

impl Engine {
    pub fn new(plan: Plan) -> Self {
        let states = vec![TaskState::Pending; plan.len()];
        Engine { plan, states }
    }

    /// State of every instance, in plan order
    pub fn states(&self) -> &[TaskState] {
        &self.states
    }

    /// Run every instance in order, stopping at the first failure
    pub fn run(&mut self, ctx: &Context) -> ExecutionResult<()> {
        for index in 0..self.plan.len() {
            if ctx.interrupt.is_triggered() {
                debug!("interrupted, not scheduling further tasks");
                return Err(ExecutionError::Interrupted);
            }

            if let Err(e) = self.run_instance(index, ctx) {
                self.transition(index, TaskState::Failed);
                return Err(e);
            }
        }

        Ok(())
    }

    fn run_instance(&mut self, index: usize, ctx: &Context) -> ExecutionResult<()> {
        self.transition(index, TaskState::EvaluatingConditions);
        let instance = &self.plan.instances[index];

        let unmet = first_unmet(&instance.conditions, &instance.bindings, ctx).map_err(|e| {
            ctx.ui.print_command_error(&e);
            e
        })?;
        if let Some(condition) = unmet {
            ctx.ui.print_task_skip(instance.name(), &condition.to_string());
            self.transition(index, TaskState::Skipped);
            return Ok(());
        }

        self.transition(index, TaskState::Running);
        let instance = &self.plan.instances[index];
        run_commands(instance, ctx)?;

        self.transition(index, TaskState::Done);
        Ok(())
    }

    fn transition(&mut self, index: usize, to: TaskState) {
        let from = self.states[index];
        debug!(
            task = self.plan.instances[index].name(),
            %from,
            %to,
            "task state"
        );
        self.states[index] = to;
    }
}

fn run_commands(instance: &TaskInstance, ctx: &Context) -> ExecutionResult<()> {
    ctx.ui.print_task_start(instance.name());

    let quiet;
    let ctx = if instance.quiet && ctx.ui.verbosity() > Verbosity::Quiet {
        quiet = ctx.clone().with_verbosity(Verbosity::Quiet);
        &quiet
    } else {
        ctx
    };

    for cmd in &instance.commands {
        execute_command(cmd, ctx)?;
    }

    ctx.ui.print_task_complete(instance.name());
    Ok(())
}
