//! 工具层：工具目录、内置工具与带超时的 ToolRunner

pub mod builtin;
pub mod registry;
pub mod runner;

pub use builtin::{EchoTool, GetSecretTool, ProvideAnswerTool, ReportCompletionTool};
pub use registry::{ResultStyle, Tool, ToolContext, ToolError, ToolRegistry};
pub use runner::ToolRunner;
