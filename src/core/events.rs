//! 运行过程事件：供日志之外的观察者（CLI、测试）跟踪状态机

use serde::Serialize;

use crate::core::Phase;
use crate::plan::ToolStatus;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// 状态迁移
    PhaseChanged { from: Phase, to: Phase, iteration: usize },
    /// Planner 产出计划
    PlanProduced { steps: usize },
    /// Planner 失败，保留原有 envelope
    PlanFailed { reason: String },
    /// 校验结论
    Verdict { is_valid: bool, attempts: u32, feedback: String },
    /// 工具结果
    ToolResult { tool: String, status: ToolStatus, preview: String },
    /// 游标移动（含初始位置 0）
    CursorAdvanced { position: usize },
    /// 运行结束
    Finished { succeeded: bool },
}
