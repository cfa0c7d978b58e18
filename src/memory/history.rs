//! 运行历史（RunHistory）
//!
//! 每次工具派发的结果（工具名、参数、结果摘要）按顺序追加，运行期间只增不改。
//! Planner 用它避免重复已成功的步骤、定位失败原因；Validator 用它识别重复步骤。
//! 记录同时保存计划中的原始参数与实际派发的参数，占位符替换后仍能与新计划比对。

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::plan::{StepArguments, ToolOutcome, ToolStatus};

/// 结果摘要最大字符数（写入 prompt 时防止过长）
const SUMMARY_MAX_CHARS: usize = 300;

/// 单条历史记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub tool_name: String,
    /// 实际派发的参数
    pub arguments: StepArguments,
    /// 计划步骤中写下的参数（可能含占位符）
    pub planned_arguments: StepArguments,
    pub status: ToolStatus,
    /// 工具是否真的被调用
    pub dispatched: bool,
    pub summary: String,
    pub at: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn new(
        tool_name: impl Into<String>,
        arguments: StepArguments,
        status: ToolStatus,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            planned_arguments: arguments.clone(),
            arguments,
            status,
            dispatched: true,
            summary: truncate(&summary.into()),
            at: Utc::now(),
        }
    }

    /// 由已解析的 ToolOutcome 生成记录
    pub fn from_outcome(outcome: &ToolOutcome) -> Self {
        Self {
            planned_arguments: outcome.step.arguments.clone(),
            dispatched: outcome.dispatched,
            ..Self::new(
                outcome.step.tool_name.clone(),
                outcome.arguments.clone(),
                outcome.status,
                outcome.payload_text(),
            )
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolStatus::Error
    }

    /// 工具名一致，且参数与计划参数或实际参数之一完全相同
    pub fn matches(&self, tool_name: &str, arguments: &StepArguments) -> bool {
        self.tool_name == tool_name
            && (&self.planned_arguments == arguments || &self.arguments == arguments)
    }

    /// prompt 中的一行：`SUCCESS tool {args}: summary`
    pub fn render(&self) -> String {
        format!(
            "{} {} {}: {}",
            self.status, self.tool_name, self.arguments, self.summary
        )
    }
}

fn truncate(s: &str) -> String {
    if s.chars().count() > SUMMARY_MAX_CHARS {
        format!("{}...", s.chars().take(SUMMARY_MAX_CHARS).collect::<String>())
    } else {
        s.to_string()
    }
}

/// 只追加的历史序列
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunHistory {
    records: Vec<HistoryRecord>,
}

impl RunHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: HistoryRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryRecord> {
        self.records.last()
    }

    /// 最近一条记录是否为失败（Planner 据此进入错误恢复）
    pub fn last_failed(&self) -> Option<&HistoryRecord> {
        self.records.last().filter(|r| r.is_error())
    }

    /// 最近一条记录是否为真正派发过的工具失败（Validator 据此拒绝原样重试）
    pub fn last_failed_dispatch(&self) -> Option<&HistoryRecord> {
        self.last_failed().filter(|r| r.dispatched)
    }

    /// 该工具 + 参数是否已成功执行过
    pub fn has_success(&self, tool_name: &str, arguments: &StepArguments) -> bool {
        self.records
            .iter()
            .any(|r| r.is_success() && r.matches(tool_name, arguments))
    }

    /// 已完成动作列表（用于 prompt 中的 ALREADY DONE）
    pub fn finished_actions(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.is_success())
            .map(|r| format!("{} {}", r.tool_name, r.arguments))
            .collect()
    }

    /// 逐行渲染，空历史返回 "None"
    pub fn render(&self) -> String {
        if self.records.is_empty() {
            return "None".to_string();
        }
        self.records
            .iter()
            .map(|r| format!("- {}", r.render()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
