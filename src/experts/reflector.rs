//! Reflector：把工具结果转为游标推进或重新规划
//!
//! 纯函数，不调用 Generator。SUCCESS 推进游标；ERROR（以及不应出现的 PENDING）保持游标并升级到 Planner。
//! 每个结果都生成一条历史记录，由 Orchestrator 追加到 RunHistory。

use crate::memory::HistoryRecord;
use crate::plan::{StepCursor, ToolOutcome, ToolStatus};

/// 反思后的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// 继续执行下一步
    NextStep,
    /// 计划耗尽或终结型工具成功
    Done,
    /// 升级到 Planner 重新规划
    Replan,
}

#[derive(Debug, Clone)]
pub struct Reflection {
    pub cursor: StepCursor,
    pub route: Route,
    pub record: HistoryRecord,
}

#[derive(Debug, Default)]
pub struct Reflector;

impl Reflector {
    pub fn new() -> Self {
        Self
    }

    pub fn reflect(&self, outcome: &ToolOutcome, cursor: StepCursor, plan_len: usize) -> Reflection {
        let record = HistoryRecord::from_outcome(outcome);
        match outcome.status {
            ToolStatus::Success => {
                let next = cursor.advance();
                let route = if outcome.terminal || next.position >= plan_len {
                    Route::Done
                } else {
                    Route::NextStep
                };
                tracing::info!(position = next.position, "SUCCESS execution, advancing cursor");
                Reflection {
                    cursor: next,
                    route,
                    record,
                }
            }
            ToolStatus::Error | ToolStatus::Pending => {
                tracing::warn!(
                    tool = %outcome.step.tool_name,
                    "ERROR while executing, replanning: {}",
                    outcome.payload_text()
                );
                Reflection {
                    cursor,
                    route: Route::Replan,
                    record,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{PlanStep, StepArguments, ToolDecision, ToolPayload};

    fn outcome(status: ToolStatus) -> ToolOutcome {
        let mut o = ToolOutcome::pending(
            PlanStep::new("echo", StepArguments::Empty),
            ToolDecision::Tool,
            StepArguments::Empty,
        );
        if status != ToolStatus::Pending {
            o.resolve(status, ToolPayload::Text("result".into()));
        }
        o
    }

    #[test]
    fn test_success_advances_by_one() {
        for k in 0..4 {
            let r = Reflector.reflect(&outcome(ToolStatus::Success), StepCursor { position: k }, 10);
            assert_eq!(r.cursor.position, k + 1);
            assert_eq!(r.route, Route::NextStep);
            assert!(r.record.is_success());
        }
    }

    #[test]
    fn test_success_on_last_step_is_done() {
        let r = Reflector.reflect(&outcome(ToolStatus::Success), StepCursor { position: 1 }, 2);
        assert_eq!(r.cursor.position, 2);
        assert_eq!(r.route, Route::Done);
    }

    #[test]
    fn test_terminal_tool_finishes_early() {
        let mut o = outcome(ToolStatus::Success);
        o.terminal = true;
        let r = Reflector.reflect(&o, StepCursor::start(), 3);
        assert_eq!(r.cursor.position, 1);
        assert_eq!(r.route, Route::Done);
    }

    #[test]
    fn test_error_keeps_cursor_and_replans() {
        for k in 0..4 {
            let r = Reflector.reflect(&outcome(ToolStatus::Error), StepCursor { position: k }, 10);
            assert_eq!(r.cursor.position, k);
            assert_eq!(r.route, Route::Replan);
            assert!(r.record.is_error());
        }
    }

    #[test]
    fn test_pending_treated_as_error() {
        let r = Reflector.reflect(&outcome(ToolStatus::Pending), StepCursor::start(), 1);
        assert_eq!(r.route, Route::Replan);
    }
}
