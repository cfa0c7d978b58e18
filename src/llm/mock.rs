//! 脚本化 Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序回放预设回复，并记录每次收到的消息，便于断言「是否调用了 Generator」以及 prompt 内容。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{Completion, LlmClient, LlmError, TokenUsage};
use crate::memory::Message;

/// 单条预设回复
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// 原样返回文本
    Text(String),
    /// 返回 JSON 序列化后的文本
    Json(Value),
    /// 返回错误
    Error(LlmError),
    /// 挂起指定时长后返回空对象（用于超时测试）
    Hang(Duration),
}

/// Mock 客户端：脚本耗尽后返回 ApiError
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<ScriptedReply>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 已发生的调用次数
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// 第 n 次调用拼接后的全部消息文本
    pub fn prompt(&self, n: usize) -> Option<String> {
        let calls = self.calls.lock().ok()?;
        calls.get(n).map(|msgs| {
            msgs.iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[Message]) -> Result<Completion, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        let usage = TokenUsage::new(10, 5);
        match next {
            Some(ScriptedReply::Text(text)) => Ok(Completion::new(text, usage)),
            Some(ScriptedReply::Json(value)) => Ok(Completion::new(value.to_string(), usage)),
            Some(ScriptedReply::Error(e)) => Err(e),
            Some(ScriptedReply::Hang(d)) => {
                tokio::time::sleep(d).await;
                Ok(Completion::new("{}", usage))
            }
            None => Err(LlmError::ApiError("mock script exhausted".to_string())),
        }
    }
}
