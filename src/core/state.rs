//! 状态定义：状态机阶段、运行结果与用量记录

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::FailureReason;
use crate::llm::TokenUsage;
use crate::memory::RunHistory;

/// 编排状态机的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Planning,
    Validating,
    Executing,
    ToolDispatch,
    Reflecting,
    Done,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Planning => "PLANNING",
            Phase::Validating => "VALIDATING",
            Phase::Executing => "EXECUTING",
            Phase::ToolDispatch => "TOOL_DISPATCH",
            Phase::Reflecting => "REFLECTING",
            Phase::Done => "DONE",
            Phase::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// 调用 Generator 的节点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpertKind {
    Planner,
    Validator,
    Executor,
}

/// 单次 Generator 调用的元数据（供会话上报 LLM 用量）
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRecord {
    pub expert: ExpertKind,
    pub model: String,
    pub usage: TokenUsage,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Done,
    Failed { reason: String },
}

/// 一次运行的结果
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub task_id: String,
    pub status: RunStatus,
    #[serde(skip)]
    pub failure: Option<FailureReason>,
    /// 消耗的节点调用次数
    pub iterations: usize,
    /// 依次经过的阶段
    pub phases: Vec<Phase>,
    /// 依次到达的游标位置（每个新计划从 0 开始）
    pub cursor_positions: Vec<usize>,
    pub history: RunHistory,
    pub generations: Vec<GenerationRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Done
    }

    /// 所有 Generator 调用的 token 总量
    pub fn total_usage(&self) -> TokenUsage {
        let mut total = TokenUsage::default();
        for g in &self.generations {
            total.add(g.usage);
        }
        total
    }

    /// 某阶段被进入的次数
    pub fn visits(&self, phase: Phase) -> usize {
        self.phases.iter().filter(|p| **p == phase).count()
    }
}
