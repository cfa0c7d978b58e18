//! 会话边界：benchmark 会话的启动、任务列表与评分上报
//!
//! 编排核心只消费 SessionTask 的 id 与 text；其余交互都经由工具（provide_answer / get_secret）。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::GenerationRecord;
use crate::plan::Task;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rejected: {0}")]
    Rejected(String),
}

/// 会话元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub benchmark: String,
    pub workspace: String,
    pub name: String,
    pub architecture: String,
}

impl Default for SessionMeta {
    fn default() -> Self {
        Self {
            benchmark: "demo".to_string(),
            workspace: "dev".to_string(),
            name: "local run".to_string(),
            architecture: "plan-validate-execute".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTask {
    pub task_id: String,
    pub spec_id: String,
    pub task_text: String,
}

impl SessionTask {
    pub fn to_task(&self) -> Task {
        Task::new(self.task_id.clone(), self.task_text.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEval {
    pub score: f64,
    pub logs: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskCompletion {
    pub eval: Option<TaskEval>,
}

/// benchmark 会话客户端
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// 启动会话，返回 session id
    async fn start_session(&self, meta: &SessionMeta) -> Result<String, SessionError>;

    async fn session_status(&self, session_id: &str) -> Result<Vec<SessionTask>, SessionError>;

    async fn start_task(&self, task: &SessionTask) -> Result<(), SessionError>;

    /// 结束任务并取回评分（若有）
    async fn complete_task(&self, task: &SessionTask) -> Result<TaskCompletion, SessionError>;

    async fn submit_session(&self, session_id: &str) -> Result<(), SessionError>;

    /// 为任务提交答案，返回会话的确认文本
    async fn provide_answer(&self, task_id: &str, answer: &str) -> Result<String, SessionError>;

    async fn get_secret(&self, task_id: &str) -> Result<String, SessionError>;

    /// 上报单次 LLM 调用的用量；默认不上报
    async fn log_llm(&self, _task_id: &str, _record: &GenerationRecord) -> Result<(), SessionError> {
        Ok(())
    }
}
