//! 记忆层：与模型交互的消息，以及一次运行内只追加的执行历史

pub mod history;
pub mod message;

pub use history::{HistoryRecord, RunHistory};
pub use message::{Message, Role};
