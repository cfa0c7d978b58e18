//! 会话层：benchmark 会话边界、进程内实现与驱动

pub mod client;
pub mod driver;
pub mod local;

pub use client::{SessionClient, SessionError, SessionMeta, SessionTask, TaskCompletion, TaskEval};
pub use driver::{SessionDriver, SessionSummary, TaskSummary};
pub use local::LocalSession;
