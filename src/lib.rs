//! ERC - 多专家任务编排状态机
//!
//! 自然语言任务 -> 计划 -> 约束校验 -> 逐步执行 -> 结果反思，
//! 按每步结果推进、重新规划或终止。
//!
//! 模块划分：
//! - **plan**: 计划、游标、工具结果等数据模型
//! - **memory**: 与模型交互的消息、运行内只追加的执行历史
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Scripted Mock）、结构化输出 Generator
//! - **experts**: Planner、Validator、Executor、Reflector
//! - **tools**: 工具目录、内置工具与 ToolRunner
//! - **core**: 编排状态机、运行结果、事件与错误
//! - **session**: benchmark 会话边界、进程内会话与驱动
//! - **config** / **persona**: 配置加载（TOML + 环境变量）与专家 persona

pub mod config;
pub mod core;
pub mod experts;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod persona;
pub mod plan;
pub mod session;
pub mod tools;
