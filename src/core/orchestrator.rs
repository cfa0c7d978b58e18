//! 编排器：任务状态机
//!
//! PLANNING -> VALIDATING -> (PLANNING | EXECUTING | FAILED)
//! EXECUTING -> TOOL_DISPATCH -> REFLECTING -> (EXECUTING | PLANNING | DONE)
//!
//! 单线程推进：一次只运行一个节点，节点之间检查取消令牌与迭代上限。
//! 运行状态（envelope、cursor、outcome、history）只属于本次运行，节点调用时以参数传入。

use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::config::OrchestratorSection;
use crate::core::{FailureReason, GenerationRecord, Phase, RunEvent, RunReport, RunStatus};
use crate::experts::{Executor, ExecutorStep, Planner, Reflector, Route, Validator};
use crate::memory::RunHistory;
use crate::plan::{PlanEnvelope, StepCursor, Task, ToolOutcome};
use crate::tools::{ToolContext, ToolRunner};

/// 工具结果预览最大字符数
const RESULT_PREVIEW_CHARS: usize = 200;

/// VALIDATING 之后的去向：通过 -> EXECUTING；拒绝且未达上限 -> PLANNING；拒绝且达上限 -> FAILED
pub fn route_after_validation(envelope: &PlanEnvelope, max_attempts: u32) -> Phase {
    match envelope.verdict() {
        Some(v) if v.is_valid => Phase::Executing,
        Some(_) if envelope.attempts() >= max_attempts => Phase::Failed,
        Some(_) => Phase::Planning,
        None => Phase::Validating,
    }
}

/// 单次运行的可变状态
struct RunState {
    phase: Phase,
    envelope: Option<PlanEnvelope>,
    cursor: StepCursor,
    outcome: Option<ToolOutcome>,
    history: RunHistory,
    iterations: usize,
    phases: Vec<Phase>,
    cursor_positions: Vec<usize>,
    generations: Vec<GenerationRecord>,
    failure: Option<FailureReason>,
}

impl RunState {
    fn new() -> Self {
        Self {
            phase: Phase::Planning,
            envelope: None,
            cursor: StepCursor::start(),
            outcome: None,
            history: RunHistory::new(),
            iterations: 0,
            phases: vec![Phase::Planning],
            cursor_positions: Vec::new(),
            generations: Vec::new(),
            failure: None,
        }
    }
}

pub struct Orchestrator {
    planner: Planner,
    validator: Validator,
    executor: Executor,
    runner: ToolRunner,
    reflector: Reflector,
    limits: OrchestratorSection,
    event_tx: Option<UnboundedSender<RunEvent>>,
}

impl Orchestrator {
    pub fn new(
        planner: Planner,
        validator: Validator,
        executor: Executor,
        runner: ToolRunner,
        limits: OrchestratorSection,
    ) -> Self {
        Self {
            planner,
            validator,
            executor,
            runner,
            reflector: Reflector::new(),
            limits,
            event_tx: None,
        }
    }

    /// 设置事件推送通道
    pub fn with_event_tx(mut self, tx: UnboundedSender<RunEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send_event(&self, ev: RunEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    /// 运行一个任务直到 DONE / FAILED；失败以 RunReport 返回，不会中断调用方
    pub async fn run(&self, task: &Task, cancel: CancellationToken) -> RunReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let ctx = ToolContext::new(task.clone());
        let mut state = RunState::new();
        tracing::info!(run = %run_id, task = %task.id, "Starting run: {}", task.text);

        while !state.phase.is_terminal() {
            if cancel.is_cancelled() {
                tracing::warn!(run = %run_id, "Run cancelled");
                state.failure = Some(FailureReason::Cancelled);
                self.transition(&mut state, Phase::Failed);
                break;
            }
            if state.iterations >= self.limits.iteration_limit {
                tracing::error!(run = %run_id, "Iteration limit {} reached", self.limits.iteration_limit);
                state.failure = Some(FailureReason::IterationLimit {
                    limit: self.limits.iteration_limit,
                });
                self.transition(&mut state, Phase::Failed);
                break;
            }
            state.iterations += 1;

            let next = match state.phase {
                Phase::Planning => self.plan(&mut state, task).await,
                Phase::Validating => self.validate(&mut state, task).await,
                Phase::Executing => self.execute(&mut state, task).await,
                Phase::ToolDispatch => self.dispatch(&mut state, &ctx).await,
                Phase::Reflecting => self.reflect(&mut state),
                Phase::Done | Phase::Failed => break,
            };
            self.transition(&mut state, next);
        }

        let status = match &state.failure {
            None => RunStatus::Done,
            Some(reason) => RunStatus::Failed {
                reason: reason.to_string(),
            },
        };
        self.send_event(RunEvent::Finished {
            succeeded: state.failure.is_none(),
        });
        tracing::info!(run = %run_id, iterations = state.iterations, "Run finished: {:?}", status);

        RunReport {
            run_id,
            task_id: task.id.clone(),
            status,
            failure: state.failure,
            iterations: state.iterations,
            phases: state.phases,
            cursor_positions: state.cursor_positions,
            history: state.history,
            generations: state.generations,
            started_at,
            finished_at: Utc::now(),
        }
    }

    fn transition(&self, state: &mut RunState, next: Phase) {
        let from = state.phase;
        tracing::info!("{} -> {}", from, next);
        self.send_event(RunEvent::PhaseChanged {
            from,
            to: next,
            iteration: state.iterations,
        });
        state.phase = next;
        state.phases.push(next);
    }

    fn set_cursor(&self, state: &mut RunState, cursor: StepCursor) {
        state.cursor = cursor;
        state.cursor_positions.push(cursor.position);
        self.send_event(RunEvent::CursorAdvanced {
            position: cursor.position,
        });
    }

    async fn plan(&self, state: &mut RunState, task: &Task) -> Phase {
        match self
            .planner
            .generate(task, &state.history, state.envelope.as_ref())
            .await
        {
            Ok(out) => {
                self.send_event(RunEvent::PlanProduced {
                    steps: out.plan.len(),
                });
                state.generations.push(out.record);
                let envelope = match state.envelope.take() {
                    Some(mut env) if env.is_rejected() => {
                        env.revise(out.plan);
                        env
                    }
                    _ => PlanEnvelope::new(out.plan),
                };
                state.envelope = Some(envelope);
                Phase::Validating
            }
            Err(failure) => {
                self.send_event(RunEvent::PlanFailed {
                    reason: failure.error.to_string(),
                });
                Phase::Planning
            }
        }
    }

    async fn validate(&self, state: &mut RunState, task: &Task) -> Phase {
        let Some(envelope) = state.envelope.as_mut() else {
            return Phase::Planning;
        };
        let review = self.validator.review(envelope, task, &state.history).await;
        if let Some(record) = review.record {
            state.generations.push(record);
        }
        self.send_event(RunEvent::Verdict {
            is_valid: review.verdict.is_valid,
            attempts: envelope.attempts(),
            feedback: review.verdict.feedback.clone(),
        });

        let next = route_after_validation(envelope, self.limits.max_validation_attempts);
        match next {
            Phase::Executing => self.set_cursor(state, StepCursor::start()),
            Phase::Failed => {
                tracing::error!("Review limit exceeded after {} attempts", envelope.attempts());
                state.failure = Some(FailureReason::ValidationExhausted {
                    attempts: envelope.attempts(),
                    feedback: review.verdict.feedback,
                });
            }
            _ => {}
        }
        next
    }

    async fn execute(&self, state: &mut RunState, task: &Task) -> Phase {
        let Some(envelope) = state.envelope.as_ref() else {
            return Phase::Planning;
        };
        let out = self
            .executor
            .next(envelope, state.cursor, task, &state.history)
            .await;
        if let Some(record) = out.record {
            state.generations.push(record);
        }
        match out.step {
            ExecutorStep::Done => Phase::Done,
            ExecutorStep::Dispatch(outcome) => {
                state.outcome = Some(outcome);
                Phase::ToolDispatch
            }
        }
    }

    async fn dispatch(&self, state: &mut RunState, ctx: &ToolContext) -> Phase {
        let Some(outcome) = state.outcome.take() else {
            return Phase::Executing;
        };
        state.outcome = Some(self.runner.invoke(ctx, outcome).await);
        Phase::Reflecting
    }

    fn reflect(&self, state: &mut RunState) -> Phase {
        let Some(outcome) = state.outcome.take() else {
            return Phase::Executing;
        };
        let plan_len = state.envelope.as_ref().map(|e| e.plan().len()).unwrap_or(0);
        let reflection = self.reflector.reflect(&outcome, state.cursor, plan_len);

        self.send_event(RunEvent::ToolResult {
            tool: outcome.step.tool_name.clone(),
            status: outcome.status,
            preview: outcome.payload_text().chars().take(RESULT_PREVIEW_CHARS).collect(),
        });
        state.history.push(reflection.record);

        match reflection.route {
            Route::NextStep => {
                self.set_cursor(state, reflection.cursor);
                Phase::Executing
            }
            Route::Done => {
                self.set_cursor(state, reflection.cursor);
                Phase::Done
            }
            Route::Replan => {
                // 新一轮规划周期：丢弃已执行的计划，校验次数重新计数
                state.envelope = None;
                Phase::Planning
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ExecutionPlan, ValidationVerdict};

    fn rejected(times: u32) -> PlanEnvelope {
        let mut env = PlanEnvelope::new(ExecutionPlan::default());
        for _ in 0..times {
            env.record_verdict(ValidationVerdict::reject("no"));
        }
        env
    }

    #[test]
    fn test_route_unvalidated_stays() {
        let env = PlanEnvelope::new(ExecutionPlan::default());
        assert_eq!(route_after_validation(&env, 5), Phase::Validating);
    }

    #[test]
    fn test_route_rejected_below_limit_replans() {
        for n in 1..5 {
            assert_eq!(route_after_validation(&rejected(n), 5), Phase::Planning);
        }
    }

    #[test]
    fn test_route_rejected_at_limit_fails() {
        assert_eq!(route_after_validation(&rejected(5), 5), Phase::Failed);
        assert_eq!(route_after_validation(&rejected(6), 5), Phase::Failed);
    }

    #[test]
    fn test_route_valid_executes() {
        let mut env = rejected(4);
        env.record_verdict(ValidationVerdict::approve("ok"));
        assert_eq!(route_after_validation(&env, 5), Phase::Executing);
    }
}
