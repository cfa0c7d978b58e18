//! 计划数据模型
//!
//! Task / PlanStep / ExecutionPlan / ValidationVerdict / PlanEnvelope / StepCursor / ToolOutcome。
//! 这些类型只描述数据，行为由 experts 与 orchestrator 负责。

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 一次编排运行的输入：只读
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
}

impl Task {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// 步骤参数：结构化 map、原始字符串或为空
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum StepArguments {
    Structured(Map<String, Value>),
    Raw(String),
    #[default]
    Empty,
}

impl StepArguments {
    /// 从任意 JSON 值构造；null 视为 Empty，非对象/字符串的标量转为 Raw
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => StepArguments::Empty,
            Value::Object(map) => StepArguments::Structured(map),
            Value::String(s) => StepArguments::Raw(s),
            other => StepArguments::Raw(other.to_string()),
        }
    }

    /// 转为 JSON 值，供工具执行
    pub fn to_value(&self) -> Value {
        match self {
            StepArguments::Structured(map) => Value::Object(map.clone()),
            StepArguments::Raw(s) => Value::String(s.clone()),
            StepArguments::Empty => Value::Null,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            StepArguments::Structured(map) => map.is_empty(),
            StepArguments::Raw(s) => s.trim().is_empty(),
            StepArguments::Empty => true,
        }
    }

    /// 取结构化参数中的字符串字段
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self {
            StepArguments::Structured(map) => map.get(key).and_then(Value::as_str),
            _ => None,
        }
    }
}

impl fmt::Display for StepArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepArguments::Structured(map) => {
                write!(f, "{}", Value::Object(map.clone()))
            }
            StepArguments::Raw(s) => write!(f, "{s}"),
            StepArguments::Empty => write!(f, "(none)"),
        }
    }
}

/// 计划中的单个步骤；身份由其在计划中的位置决定
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct PlanStep {
    /// 完成该步骤要使用的工具名
    #[serde(default)]
    pub tool_name: String,
    /// 传给工具的参数
    #[serde(default)]
    pub arguments: StepArguments,
    /// 执行该步骤的简短理由
    #[serde(default)]
    pub reasoning: String,
    /// 该步骤的摘要
    #[serde(default)]
    pub summary: String,
}

impl PlanStep {
    pub fn new(tool_name: impl Into<String>, arguments: StepArguments) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            reasoning: String::new(),
            summary: String::new(),
        }
    }
}

/// 有序步骤序列，插入顺序即执行顺序
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionPlan {
    /// 执行步骤列表
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// 零步骤计划 = 没有可执行的计划
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, position: usize) -> Option<&PlanStep> {
        self.steps.get(position)
    }
}

/// 校验结论：每次校验产生一个，之后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub is_valid: bool,
    pub feedback: String,
}

impl ValidationVerdict {
    pub fn approve(feedback: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            feedback: feedback.into(),
        }
    }

    pub fn reject(feedback: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            feedback: feedback.into(),
        }
    }
}

/// 计划 + 校验簿记；attempts 只增不减
#[derive(Debug, Clone, PartialEq)]
pub struct PlanEnvelope {
    plan: ExecutionPlan,
    validated: bool,
    attempts: u32,
    verdict: Option<ValidationVerdict>,
}

impl PlanEnvelope {
    /// 新一轮规划：attempts = 0，未校验，无结论
    pub fn new(plan: ExecutionPlan) -> Self {
        Self {
            plan,
            validated: false,
            attempts: 0,
            verdict: None,
        }
    }

    /// 修复路径：替换计划，清空本次结论，但保留已消耗的校验次数
    pub fn revise(&mut self, plan: ExecutionPlan) {
        self.plan = plan;
        self.validated = false;
        self.verdict = None;
    }

    /// 记录一次校验结果：attempts 恰好 +1
    pub fn record_verdict(&mut self, verdict: ValidationVerdict) {
        self.attempts = self.attempts.saturating_add(1);
        self.validated = true;
        self.verdict = Some(verdict);
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn validated(&self) -> bool {
        self.validated
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn verdict(&self) -> Option<&ValidationVerdict> {
        self.verdict.as_ref()
    }

    /// 已校验且被拒绝
    pub fn is_rejected(&self) -> bool {
        matches!(&self.verdict, Some(v) if !v.is_valid)
    }

    pub fn is_approved(&self) -> bool {
        matches!(&self.verdict, Some(v) if v.is_valid)
    }
}

/// 指向下一个未执行步骤；position == len 表示计划耗尽
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StepCursor {
    pub position: usize,
}

impl StepCursor {
    pub fn start() -> Self {
        Self { position: 0 }
    }

    pub fn advance(self) -> Self {
        Self {
            position: self.position + 1,
        }
    }

    pub fn is_exhausted(&self, plan: &ExecutionPlan) -> bool {
        self.position >= plan.len()
    }
}

/// Executor 对步骤的实现方式选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ToolDecision {
    /// 直接调用工具
    Tool,
    /// 生成代码执行（暂未实现）
    Code,
}

impl fmt::Display for ToolDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolDecision::Tool => write!(f, "tool"),
            ToolDecision::Code => write!(f, "code"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolStatus {
    Pending,
    Success,
    Error,
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolStatus::Pending => write!(f, "PENDING"),
            ToolStatus::Success => write!(f, "SUCCESS"),
            ToolStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// 工具返回：文本或结构化
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolPayload {
    Text(String),
    Json(Value),
}

impl ToolPayload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ToolPayload::Text(s) => Some(s),
            ToolPayload::Json(_) => None,
        }
    }
}

impl fmt::Display for ToolPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolPayload::Text(s) => write!(f, "{s}"),
            ToolPayload::Json(v) => write!(f, "{v}"),
        }
    }
}

/// 单步派发结果。Executor 创建，ToolRunner 写入状态，Reflector 只读
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub step: PlanStep,
    /// 实际使用的参数（Executor 可能替换了占位符）
    pub arguments: StepArguments,
    pub decision: Option<ToolDecision>,
    pub status: ToolStatus,
    pub payload: Option<ToolPayload>,
    /// 成功后是否直接结束运行（终结型工具）
    pub terminal: bool,
    /// 工具是否真的被调用过；Executor 层面的失败、代码决策、未知工具均为 false
    pub dispatched: bool,
}

impl ToolOutcome {
    pub fn pending(step: PlanStep, decision: ToolDecision, arguments: StepArguments) -> Self {
        Self {
            step,
            arguments,
            decision: Some(decision),
            status: ToolStatus::Pending,
            payload: None,
            terminal: false,
            dispatched: false,
        }
    }

    /// 未能得到决策时直接标记为 ERROR
    pub fn failed(step: PlanStep, reason: impl Into<String>) -> Self {
        let arguments = step.arguments.clone();
        Self {
            step,
            arguments,
            decision: None,
            status: ToolStatus::Error,
            payload: Some(ToolPayload::Text(reason.into())),
            terminal: false,
            dispatched: false,
        }
    }

    pub fn resolve(&mut self, status: ToolStatus, payload: ToolPayload) {
        self.status = status;
        self.payload = Some(payload);
    }

    pub fn is_pending(&self) -> bool {
        self.status == ToolStatus::Pending
    }

    pub fn payload_text(&self) -> String {
        self.payload
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}
