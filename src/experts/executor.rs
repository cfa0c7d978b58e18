//! Executor：逐步派发
//!
//! 读取 cursor 处的步骤，向 Generator 请求实现方式（tool / code）以及可选的具体参数
//! （用历史中的真实值替换占位符），打包为 PENDING 的 ToolOutcome。cursor 由 Reflector 推进。

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::{ExpertKind, GenerationRecord};
use crate::llm::Generator;
use crate::memory::RunHistory;
use crate::plan::{PlanEnvelope, StepArguments, StepCursor, Task, ToolDecision, ToolOutcome};
use crate::tools::ToolRegistry;

/// Generator 的决策输出
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecutionDecision {
    /// 如何实现该步骤："tool" 直接调用工具，"code" 生成代码
    pub decision: ToolDecision,
    /// 替换占位符后的具体参数；省略则使用计划中的参数
    #[serde(default)]
    pub arguments: Option<Value>,
}

#[derive(Debug, Clone)]
pub enum ExecutorStep {
    /// 计划已耗尽
    Done,
    Dispatch(ToolOutcome),
}

#[derive(Debug, Clone)]
pub struct ExecutorOutput {
    pub step: ExecutorStep,
    pub record: Option<GenerationRecord>,
}

pub struct Executor {
    generator: Generator,
    persona: String,
    tools_schema: String,
}

impl Executor {
    pub fn new(generator: Generator, persona: impl Into<String>, catalogue: &ToolRegistry) -> Self {
        Self {
            generator,
            persona: persona.into(),
            tools_schema: catalogue.to_schema_json(),
        }
    }

    pub async fn next(
        &self,
        envelope: &PlanEnvelope,
        cursor: StepCursor,
        task: &Task,
        history: &RunHistory,
    ) -> ExecutorOutput {
        let Some(step) = envelope.plan().step(cursor.position) else {
            tracing::info!("Executor: no steps left");
            return ExecutorOutput {
                step: ExecutorStep::Done,
                record: None,
            };
        };
        tracing::info!(position = cursor.position, tool = %step.tool_name, "Executor deciding");

        let system = format!("{}\n\nAvailable Tools:\n{}", self.persona, self.tools_schema);
        let user = format!(
            "TASK: {}\n\nHISTORY:\n{}\n\nExecute the next step.\nTOOL: {}\nPLANNED ARGUMENTS: {}\nREASONING: {}",
            task.text,
            history.render(),
            step.tool_name,
            step.arguments,
            step.reasoning
        );

        match self.generator.generate::<ExecutionDecision>(&system, &user).await {
            Ok(generated) => {
                let decision = generated.artifact;
                let arguments = match decision.arguments {
                    Some(v) if !v.is_null() => StepArguments::from_value(v),
                    _ => step.arguments.clone(),
                };
                tracing::info!("Executor decision: {} (args: {})", decision.decision, arguments);
                ExecutorOutput {
                    step: ExecutorStep::Dispatch(ToolOutcome::pending(
                        step.clone(),
                        decision.decision,
                        arguments,
                    )),
                    record: Some(GenerationRecord {
                        expert: ExpertKind::Executor,
                        model: self.generator.model().to_string(),
                        usage: generated.usage,
                        elapsed_ms: generated.elapsed.as_millis() as u64,
                    }),
                }
            }
            Err(e) => {
                tracing::error!("Executor failed to decide: {}", e);
                ExecutorOutput {
                    step: ExecutorStep::Dispatch(ToolOutcome::failed(
                        step.clone(),
                        format!("executor decision failed: {e}"),
                    )),
                    record: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::llm::{LlmError, ScriptedLlmClient, ScriptedReply};
    use crate::plan::{ExecutionPlan, PlanStep, ToolStatus};
    use crate::tools::EchoTool;
    use serde_json::json;

    fn executor(replies: Vec<ScriptedReply>) -> (Executor, Arc<ScriptedLlmClient>) {
        let llm = Arc::new(ScriptedLlmClient::new(replies));
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let generator = Generator::new(llm.clone(), Duration::from_secs(5));
        (Executor::new(generator, "persona", &registry), llm)
    }

    fn envelope() -> PlanEnvelope {
        PlanEnvelope::new(ExecutionPlan::new(vec![PlanStep::new(
            "echo",
            StepArguments::from_value(json!({"text": "[secret_value]"})),
        )]))
    }

    fn task() -> Task {
        Task::new("t1", "echo the secret")
    }

    #[tokio::test]
    async fn test_exhausted_plan_is_done_without_generator() {
        let (e, llm) = executor(vec![]);
        let out = e
            .next(&envelope(), StepCursor { position: 1 }, &task(), &RunHistory::new())
            .await;
        assert!(matches!(out.step, ExecutorStep::Done));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_pending_outcome_with_resolved_arguments() {
        let (e, _) = executor(vec![ScriptedReply::Json(
            json!({"decision": "tool", "arguments": {"text": "95uZ"}}),
        )]);
        let out = e
            .next(&envelope(), StepCursor::start(), &task(), &RunHistory::new())
            .await;
        let ExecutorStep::Dispatch(outcome) = out.step else {
            panic!("expected dispatch");
        };
        assert_eq!(outcome.status, ToolStatus::Pending);
        assert_eq!(outcome.decision, Some(ToolDecision::Tool));
        assert_eq!(outcome.arguments.get_str("text"), Some("95uZ"));
        assert_eq!(outcome.step.arguments.get_str("text"), Some("[secret_value]"));
    }

    #[tokio::test]
    async fn test_planned_arguments_kept_when_omitted() {
        let (e, _) = executor(vec![ScriptedReply::Json(json!({"decision": "code"}))]);
        let out = e
            .next(&envelope(), StepCursor::start(), &task(), &RunHistory::new())
            .await;
        let ExecutorStep::Dispatch(outcome) = out.step else {
            panic!("expected dispatch");
        };
        assert_eq!(outcome.decision, Some(ToolDecision::Code));
        assert_eq!(outcome.arguments, outcome.step.arguments);
    }

    #[tokio::test]
    async fn test_generation_failure_surfaces_as_error_outcome() {
        let (e, _) = executor(vec![ScriptedReply::Error(LlmError::EmptyResponse)]);
        let out = e
            .next(&envelope(), StepCursor::start(), &task(), &RunHistory::new())
            .await;
        let ExecutorStep::Dispatch(outcome) = out.step else {
            panic!("expected dispatch");
        };
        assert_eq!(outcome.status, ToolStatus::Error);
        assert!(out.record.is_none());
    }
}
