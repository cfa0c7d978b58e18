//! 错误类型
//!
//! GenerationFailure / ToolExecutionError 在节点内部就地恢复（见各专家）；
//! 只有 FailureReason 会把一次运行终止为 FAILED，AgentError 用于运行边界之外（配置、会话）。

use thiserror::Error;

use crate::session::SessionError;

/// 运行以 FAILED 结束的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    #[error("validation exhausted after {attempts} attempts: {feedback}")]
    ValidationExhausted { attempts: u32, feedback: String },

    #[error("iteration limit {limit} reached")]
    IterationLimit { limit: usize },

    #[error("run cancelled")]
    Cancelled,
}

/// 运行之外的错误（配置、会话边界）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}
