//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）以及结构化输出的 Generator

pub mod generator;
pub mod mock;
pub mod openai;
pub mod traits;

pub use generator::{extract_json, Generated, GenerationError, Generator};
pub use mock::{ScriptedLlmClient, ScriptedReply};
pub use openai::OpenAiClient;
pub use traits::{Completion, LlmClient, LlmError, TokenUsage};
