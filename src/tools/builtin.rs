//! 内置工具：完成上报、答案提交、取 secret、echo
//!
//! provide_answer / get_secret 通过 SessionClient 与任务所在会话交互，任务身份来自 ToolContext。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::plan::{StepArguments, ToolPayload};
use crate::session::SessionClient;
use crate::tools::{ResultStyle, Tool, ToolContext, ToolError};

/// 上报任务完成（旧式工具：返回 "SUCCESS" 前缀文本）
pub struct ReportCompletionTool;

#[async_trait]
impl Tool for ReportCompletionTool {
    fn name(&self) -> &str {
        "report_completion"
    }

    fn description(&self) -> &str {
        "Reports that the task has been completed. Final step. Args: {\"final_message\": \"answer or summary\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "final_message": { "type": "string" } },
            "required": ["final_message"]
        })
    }

    fn result_style(&self) -> ResultStyle {
        ResultStyle::Sentinel
    }

    fn is_terminal(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, args: &StepArguments) -> Result<ToolPayload, ToolError> {
        let message = match args {
            StepArguments::Raw(s) if !s.trim().is_empty() => s.as_str(),
            _ => args.get_str("final_message").unwrap_or("Task completed."),
        };
        tracing::info!(task = %ctx.task.id, "Task completed: {}", message);
        Ok(ToolPayload::Text(format!("SUCCESS {message}")))
    }
}

/// 提交当前任务的答案
pub struct ProvideAnswerTool {
    session: Arc<dyn SessionClient>,
}

impl ProvideAnswerTool {
    pub fn new(session: Arc<dyn SessionClient>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Tool for ProvideAnswerTool {
    fn name(&self) -> &str {
        "provide_answer"
    }

    fn description(&self) -> &str {
        "Provide the final answer for the current task. Final step. Args: {\"answer\": \"...\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "answer": { "type": "string" } },
            "required": ["answer"]
        })
    }

    fn is_terminal(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, args: &StepArguments) -> Result<ToolPayload, ToolError> {
        let answer = match args {
            StepArguments::Raw(s) if !s.trim().is_empty() => s.as_str(),
            _ => args
                .get_str("answer")
                .ok_or_else(|| ToolError::MissingArgument("answer".to_string()))?,
        };
        let ack = self.session.provide_answer(&ctx.task.id, answer).await?;
        Ok(ToolPayload::Text(ack))
    }
}

/// 读取当前任务的 secret
pub struct GetSecretTool {
    session: Arc<dyn SessionClient>,
}

impl GetSecretTool {
    pub fn new(session: Arc<dyn SessionClient>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Tool for GetSecretTool {
    fn name(&self) -> &str {
        "get_secret"
    }

    fn description(&self) -> &str {
        "Get the secret value for the current task. No arguments."
    }

    async fn execute(&self, ctx: &ToolContext, _args: &StepArguments) -> Result<ToolPayload, ToolError> {
        let secret = self.session.get_secret(&ctx.task.id).await?;
        Ok(ToolPayload::Text(secret))
    }
}

/// Echo 工具（测试用）
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo text (for testing). Args: {\"text\": \"message\"}"
    }

    async fn execute(&self, _ctx: &ToolContext, args: &StepArguments) -> Result<ToolPayload, ToolError> {
        let text = match args {
            StepArguments::Raw(s) => s.as_str(),
            _ => args.get_str("text").unwrap_or("(empty)"),
        };
        Ok(ToolPayload::Text(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Task;
    use crate::session::LocalSession;
    use serde_json::json;

    fn ctx(id: &str) -> ToolContext {
        ToolContext::new(Task::new(id, "task"))
    }

    #[tokio::test]
    async fn test_report_completion_sentinel() {
        let args = StepArguments::from_value(json!({"final_message": "9"}));
        let out = ReportCompletionTool.execute(&ctx("t1"), &args).await.unwrap();
        assert_eq!(out, ToolPayload::Text("SUCCESS 9".into()));
    }

    #[tokio::test]
    async fn test_provide_answer_requires_answer() {
        let session = Arc::new(LocalSession::new(["What is 2+2?"]));
        let tool = ProvideAnswerTool::new(session);
        let err = tool
            .execute(&ctx("task-1"), &StepArguments::Empty)
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::MissingArgument("answer".into()));
    }

    #[tokio::test]
    async fn test_provide_answer_and_secret_go_through_session() {
        let session = Arc::new(LocalSession::new(["Return the secret"]).with_secret("task-1", "95uZ"));
        let secret = GetSecretTool::new(session.clone())
            .execute(&ctx("task-1"), &StepArguments::Empty)
            .await
            .unwrap();
        assert_eq!(secret, ToolPayload::Text("95uZ".into()));

        let answer = StepArguments::from_value(json!({"answer": "95uZ"}));
        ProvideAnswerTool::new(session.clone())
            .execute(&ctx("task-1"), &answer)
            .await
            .unwrap();
        assert_eq!(session.answer("task-1").as_deref(), Some("95uZ"));
    }
}
