//! 核心编排层：状态机、运行结果、事件与错误

pub mod builder;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod state;

pub use builder::OrchestratorBuilder;
pub use error::{AgentError, FailureReason};
pub use events::RunEvent;
pub use orchestrator::{route_after_validation, Orchestrator};
pub use state::{ExpertKind, GenerationRecord, Phase, RunReport, RunStatus};
