//! 工具注册表（工具目录）
//!
//! 所有工具实现 Tool trait（name / description / execute），由 ToolRegistry 按名注册与查找，
//! ToolRunner 在调用时加超时并统一解析为 SUCCESS / ERROR。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::plan::{StepArguments, Task, ToolPayload};
use crate::session::SessionError;

/// 工具执行错误；由 ToolRunner 统一解析为 ERROR，错误文本作为 payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("missing required argument '{0}'")]
    MissingArgument(String),

    #[error("{0}")]
    Failed(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// 工具成功的判定方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStyle {
    /// Ok 即成功
    Typed,
    /// Ok 文本须以 "SUCCESS" 开头才算成功（旧式工具）
    Sentinel,
}

/// 每次工具调用显式传入的运行上下文
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub task: Task,
}

impl ToolContext {
    pub fn new(task: Task) -> Self {
        Self { task }
    }
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（对应 PlanStep.tool_name）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认表示参数格式不限
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    fn result_style(&self) -> ResultStyle {
        ResultStyle::Typed
    }

    /// 成功后是否结束整个运行（如提交答案）
    fn is_terminal(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &ToolContext, args: &StepArguments) -> Result<ToolPayload, ToolError>;
}

/// 工具注册表：按名称有序存储 Arc<dyn Tool>，保证目录描述稳定
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 生成 prompt 中的 Available Tools 段落：每行 `name: description`
    pub fn describe(&self) -> String {
        self.tools
            .iter()
            .map(|(name, tool)| format!("{}: {}", name, tool.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 含参数 schema 的 JSON 描述
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|(name, tool)| {
                serde_json::json!({
                    "name": name,
                    "description": tool.description(),
                    "parameters": tool.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}
