//! Planner：生成 / 修复执行计划
//!
//! 三种上下文：
//! - 首次规划：仅任务 + 历史（ALREADY DONE 列表避免重复成功步骤）
//! - 修复：上一份 envelope 被拒绝时，附带被拒计划与校验反馈
//! - 错误恢复：历史最后一条为失败时，附带失败的工具与参数，要求不得原样重试
//!
//! Generator 失败或产物不合法时返回 Err，由 Orchestrator 保留原 envelope 重试，不会使运行崩溃。

use crate::core::{ExpertKind, GenerationRecord};
use crate::llm::{GenerationError, Generator};
use crate::memory::RunHistory;
use crate::plan::{ExecutionPlan, PlanEnvelope, Task};
use crate::tools::ToolRegistry;

/// Planner 一次成功调用的产物
#[derive(Debug, Clone)]
pub struct PlannerOutput {
    pub plan: ExecutionPlan,
    pub record: GenerationRecord,
}

/// Planner 失败（Generator 出错或产物不合法）
#[derive(Debug, Clone)]
pub struct PlannerFailure {
    pub error: GenerationError,
}

pub struct Planner {
    generator: Generator,
    persona: String,
    tools_desc: String,
    max_attempts: u32,
}

impl Planner {
    pub fn new(
        generator: Generator,
        persona: impl Into<String>,
        catalogue: &ToolRegistry,
        max_attempts: u32,
    ) -> Self {
        Self {
            generator,
            persona: persona.into(),
            tools_desc: catalogue.describe(),
            max_attempts,
        }
    }

    pub async fn generate(
        &self,
        task: &Task,
        history: &RunHistory,
        prior: Option<&PlanEnvelope>,
    ) -> Result<PlannerOutput, PlannerFailure> {
        tracing::info!(task = %task.id, repair = prior.is_some_and(PlanEnvelope::is_rejected), "Planner node started");

        let system = self.system_context(task, history);
        let user = self.user_context(task, history, prior);

        let generated = self
            .generator
            .generate::<ExecutionPlan>(&system, &user)
            .await
            .map_err(|error| {
                tracing::error!("Planner failed: {}", error);
                PlannerFailure { error }
            })?;

        let plan = generated.artifact;
        tracing::info!("STRATEGIC PLAN ({} steps):", plan.len());
        for (i, step) in plan.steps.iter().enumerate() {
            tracing::info!("  {}. {} (args: {})", i + 1, step.tool_name, step.arguments);
            if !step.reasoning.is_empty() {
                tracing::info!("     why: {}", step.reasoning);
            }
        }

        Ok(PlannerOutput {
            plan,
            record: GenerationRecord {
                expert: ExpertKind::Planner,
                model: self.generator.model().to_string(),
                usage: generated.usage,
                elapsed_ms: generated.elapsed.as_millis() as u64,
            },
        })
    }

    fn system_context(&self, task: &Task, history: &RunHistory) -> String {
        let finished = history.finished_actions();
        let finished = if finished.is_empty() {
            "None".to_string()
        } else {
            finished.join(", ")
        };
        format!(
            "{}\n\nAvailable Tools:\n{}\n\nSTATUS:\n- ALREADY DONE: [{}]\n- Current Goal: {}",
            self.persona, self.tools_desc, finished, task.text
        )
    }

    pub(crate) fn user_context(
        &self,
        task: &Task,
        history: &RunHistory,
        prior: Option<&PlanEnvelope>,
    ) -> String {
        let mut text = format!("TASK: {}\n\nHISTORY:\n{}\n", task.text, history.render());

        match prior {
            Some(env) if env.is_rejected() => {
                let feedback = env.verdict().map(|v| v.feedback.as_str()).unwrap_or_default();
                let rejected = serde_json::to_string_pretty(env.plan()).unwrap_or_default();
                text.push_str(&format!(
                    "\nPLAN REJECTED (Attempt {}/{}): {}\nREJECTED PLAN:\n{}\n\
                     INSTRUCTION: Produce a revised plan that addresses the feedback. \
                     If you are repeating a step, advance to the NEXT step.\n",
                    env.attempts(),
                    self.max_attempts,
                    feedback,
                    rejected
                ));
            }
            _ => {
                if let Some(failed) = history.last_failed() {
                    text.push_str(&format!(
                        "\nLAST STEP FAILED: {} with arguments {} -> {}\n\
                         INSTRUCTION: Fix the error shown in history. Do NOT issue the same tool \
                         with the same arguments again.\n",
                        failed.tool_name, failed.arguments, failed.summary
                    ));
                }
            }
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::llm::{LlmError, ScriptedLlmClient, ScriptedReply};
    use crate::memory::HistoryRecord;
    use crate::plan::{PlanStep, StepArguments, ToolStatus, ValidationVerdict};
    use crate::tools::{EchoTool, ReportCompletionTool};
    use serde_json::json;

    fn planner(replies: Vec<ScriptedReply>) -> (Planner, Arc<ScriptedLlmClient>) {
        let llm = Arc::new(ScriptedLlmClient::new(replies));
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(ReportCompletionTool);
        let generator = Generator::new(llm.clone(), Duration::from_secs(5));
        (Planner::new(generator, "persona", &registry, 5), llm)
    }

    fn task() -> Task {
        Task::new("t1", "count characters in 'raspberry'")
    }

    #[tokio::test]
    async fn test_first_plan() {
        let (p, llm) = planner(vec![ScriptedReply::Json(json!({
            "steps": [{"tool_name": "report_completion", "arguments": {"final_message": "9"}}]
        }))]);
        let out = p.generate(&task(), &RunHistory::new(), None).await.unwrap();
        assert_eq!(out.plan.len(), 1);
        assert_eq!(out.record.expert, ExpertKind::Planner);
        let prompt = llm.prompt(0).unwrap();
        assert!(prompt.contains("ALREADY DONE: [None]"));
        assert!(prompt.contains("report_completion: "));
        assert!(!prompt.contains("PLAN REJECTED"));
    }

    #[tokio::test]
    async fn test_failure_is_reported_not_raised() {
        let (p, _) = planner(vec![ScriptedReply::Error(LlmError::ApiError("503".into()))]);
        let err = p.generate(&task(), &RunHistory::new(), None).await.unwrap_err();
        assert!(matches!(err.error, GenerationError::Llm(_)));
    }

    #[test]
    fn test_repair_context_carries_feedback() {
        let (p, _) = planner(vec![]);
        let mut env = PlanEnvelope::new(ExecutionPlan::new(vec![PlanStep::new(
            "echo",
            StepArguments::Raw("x".into()),
        )]));
        env.record_verdict(ValidationVerdict::reject("wrong tool"));
        let text = p.user_context(&task(), &RunHistory::new(), Some(&env));
        assert!(text.contains("PLAN REJECTED (Attempt 1/5): wrong tool"));
        assert!(text.contains("\"tool_name\": \"echo\""));
    }

    #[test]
    fn test_error_recovery_context_names_failing_step() {
        let (p, _) = planner(vec![]);
        let mut history = RunHistory::new();
        history.push(HistoryRecord::new(
            "get_secret",
            StepArguments::Empty,
            ToolStatus::Error,
            "backend unavailable",
        ));
        let text = p.user_context(&task(), &history, None);
        assert!(text.contains("LAST STEP FAILED: get_secret"));
        assert!(text.contains("backend unavailable"));
    }
}
