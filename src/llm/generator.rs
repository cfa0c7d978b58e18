//! Generator：结构化输出调用边界
//!
//! invoke(system, user, expected schema) -> (artifact, usage) | Error。
//! 期望的 JSON Schema 由 schemars 从目标类型生成并拼入 system，回复中提取 JSON 后反序列化。
//! 每次调用都有超时，超时或解析失败都以 GenerationError 返回，由调用方决定如何恢复。

use std::sync::Arc;
use std::time::{Duration, Instant};

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time::timeout;

use crate::llm::{LlmClient, LlmError, TokenUsage};
use crate::memory::Message;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generation failed: {0}")]
    Llm(LlmError),

    #[error("generation timed out")]
    Timeout,

    #[error("unparseable generator output: {0}")]
    Unparseable(String),
}

impl From<LlmError> for GenerationError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Timeout => GenerationError::Timeout,
            other => GenerationError::Llm(other),
        }
    }
}

/// 一次成功调用的产物与元数据
#[derive(Debug, Clone)]
pub struct Generated<T> {
    pub artifact: T,
    pub usage: TokenUsage,
    pub elapsed: Duration,
}

/// 持有 LLM 与单次调用超时；运行之间共享，只读
#[derive(Clone)]
pub struct Generator {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl Generator {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    pub async fn generate<T>(&self, system: &str, user: &str) -> Result<Generated<T>, GenerationError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let system = format!(
            "{}\n\nRespond with exactly one JSON object matching this JSON Schema, and nothing else:\n{}",
            system.trim_end(),
            schema_json::<T>()
        );
        let messages = [Message::system(system), Message::user(user.to_string())];

        let started = Instant::now();
        let completion = match timeout(self.timeout, self.llm.complete(&messages)).await {
            Ok(Ok(c)) => c,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(GenerationError::Timeout),
        };
        let elapsed = started.elapsed();
        tracing::debug!(raw = %completion.content, "generator output");

        let json = extract_json(&completion.content)
            .ok_or_else(|| GenerationError::Unparseable(preview(&completion.content)))?;
        let artifact: T = serde_json::from_str(json)
            .map_err(|e| GenerationError::Unparseable(format!("{}: {}", e, preview(json))))?;

        Ok(Generated {
            artifact,
            usage: completion.usage,
            elapsed,
        })
    }
}

fn schema_json<T: JsonSchema>() -> String {
    let schema = schema_for!(T);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// 从回复中提取 JSON 对象（```json ... ``` 或首个 '{' 到最后一个 '}'）
pub fn extract_json(output: &str) -> Option<&str> {
    let trimmed = output.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let body = rest.find("```").map(|end| &rest[..end]).unwrap_or(rest);
        return Some(body.trim());
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

fn preview(s: &str) -> String {
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ScriptedLlmClient, ScriptedReply};
    use crate::plan::ExecutionPlan;
    use serde_json::json;

    fn generator(replies: Vec<ScriptedReply>, timeout: Duration) -> (Generator, Arc<ScriptedLlmClient>) {
        let llm = Arc::new(ScriptedLlmClient::new(replies));
        (Generator::new(llm.clone(), timeout), llm)
    }

    #[test]
    fn test_extract_json_fenced_and_bare() {
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), Some("{\"a\":1}"));
        assert_eq!(extract_json("sure: {\"a\":1} done"), Some("{\"a\":1}"));
        assert_eq!(extract_json("no json here"), None);
    }

    #[tokio::test]
    async fn test_generate_plan_with_schema_in_system() {
        let (g, llm) = generator(
            vec![ScriptedReply::Json(json!({
                "steps": [{"tool_name": "report_completion", "arguments": {"final_message": "9"}}]
            }))],
            Duration::from_secs(5),
        );
        let out: Generated<ExecutionPlan> = g.generate("persona", "task").await.unwrap();
        assert_eq!(out.artifact.len(), 1);
        assert_eq!(out.usage.total_tokens, 15);
        assert!(llm.prompt(0).unwrap().contains("JSON Schema"));
    }

    #[tokio::test]
    async fn test_unparseable_output() {
        let (g, _) = generator(
            vec![ScriptedReply::Text("I cannot help with that".into())],
            Duration::from_secs(5),
        );
        let err = g.generate::<ExecutionPlan>("s", "u").await.unwrap_err();
        assert!(matches!(err, GenerationError::Unparseable(_)));
    }

    #[tokio::test]
    async fn test_generation_timeout() {
        let (g, _) = generator(
            vec![ScriptedReply::Hang(Duration::from_secs(10))],
            Duration::from_millis(50),
        );
        let err = g.generate::<ExecutionPlan>("s", "u").await.unwrap_err();
        assert_eq!(err, GenerationError::Timeout);
    }

    #[tokio::test]
    async fn test_llm_timeout_maps_to_timeout() {
        let (g, _) = generator(
            vec![ScriptedReply::Error(LlmError::Timeout)],
            Duration::from_secs(5),
        );
        let err = g.generate::<ExecutionPlan>("s", "u").await.unwrap_err();
        assert_eq!(err, GenerationError::Timeout);
    }
}
