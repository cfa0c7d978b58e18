//! Validator：计划约束审查
//!
//! 先做不调用 Generator 的结构检查（空计划、缺工具名、未知工具、首步重复已成功步骤、
//! 任一步骤原样重试刚派发失败的步骤），
//! 再交给 Generator 审查。Generator 失败或输出无法解析一律拒绝（fail-closed）。
//! 每次调用都使 envelope.attempts 恰好 +1。

use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;

use crate::core::{ExpertKind, GenerationRecord};
use crate::llm::Generator;
use crate::memory::RunHistory;
use crate::plan::{ExecutionPlan, PlanEnvelope, Task, ValidationVerdict};
use crate::tools::ToolRegistry;

pub const EMPTY_PLAN_FEEDBACK: &str = "Plan is empty.";

/// Generator 的审查输出
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ConstraintReview {
    /// 当前计划是否满足所有约束
    pub is_valid: bool,
    /// 违反约束的具体说明或确认
    #[serde(default, alias = "feedback")]
    pub review_feedback: String,
}

/// 一次审查的结果；record 仅在调用了 Generator 且成功时存在
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub verdict: ValidationVerdict,
    pub record: Option<GenerationRecord>,
    /// 是否调用了 Generator
    pub consulted_generator: bool,
}

pub struct Validator {
    generator: Generator,
    persona: String,
    catalogue: Arc<ToolRegistry>,
}

impl Validator {
    pub fn new(generator: Generator, persona: impl Into<String>, catalogue: Arc<ToolRegistry>) -> Self {
        Self {
            generator,
            persona: persona.into(),
            catalogue,
        }
    }

    /// 审查 envelope 中的计划并把结论写回 envelope（attempts +1, validated = true）
    pub async fn review(
        &self,
        envelope: &mut PlanEnvelope,
        task: &Task,
        history: &RunHistory,
    ) -> ReviewOutcome {
        tracing::info!(task = %task.id, attempt = envelope.attempts() + 1, "Reviewer checking plan");

        let outcome = match self.structural_check(envelope.plan(), history) {
            Some(verdict) => {
                tracing::warn!("Plan rejected without review: {}", verdict.feedback);
                ReviewOutcome {
                    verdict,
                    record: None,
                    consulted_generator: false,
                }
            }
            None => self.consult(envelope.plan(), task, history).await,
        };

        envelope.record_verdict(outcome.verdict.clone());
        outcome
    }

    /// 不需要模型即可判定的拒绝理由
    pub(crate) fn structural_check(
        &self,
        plan: &ExecutionPlan,
        history: &RunHistory,
    ) -> Option<ValidationVerdict> {
        if plan.is_empty() {
            return Some(ValidationVerdict::reject(EMPTY_PLAN_FEEDBACK));
        }

        for (i, step) in plan.steps.iter().enumerate() {
            if step.tool_name.trim().is_empty() {
                return Some(ValidationVerdict::reject(format!(
                    "Step {} has no tool_name.",
                    i + 1
                )));
            }
            if !self.catalogue.contains(&step.tool_name) {
                return Some(ValidationVerdict::reject(format!(
                    "Step {} uses unknown tool '{}'. Available tools: {}.",
                    i + 1,
                    step.tool_name,
                    self.catalogue.tool_names().join(", ")
                )));
            }
        }

        let first = &plan.steps[0];
        if history.has_success(&first.tool_name, &first.arguments) {
            return Some(ValidationVerdict::reject(format!(
                "Step '{}' with these arguments was already executed. \
                 Use different arguments (e.g. next page) or move to next stage.",
                first.tool_name
            )));
        }

        // 仅针对真正调用过工具的失败；Executor 侧失败允许原样重试
        if let Some(failed) = history.last_failed_dispatch() {
            if let Some(i) = plan
                .steps
                .iter()
                .position(|step| failed.matches(&step.tool_name, &step.arguments))
            {
                return Some(ValidationVerdict::reject(format!(
                    "Step {} '{}' with these arguments just failed. Fix the arguments or use another tool.",
                    i + 1,
                    plan.steps[i].tool_name
                )));
            }
        }

        None
    }

    async fn consult(&self, plan: &ExecutionPlan, task: &Task, history: &RunHistory) -> ReviewOutcome {
        let system = format!(
            "{}\n\nAvailable Tools:\n{}",
            self.persona,
            self.catalogue.describe()
        );
        let plan_str = serde_json::to_string_pretty(plan).unwrap_or_default();
        let user = format!(
            "History:\n{}\n\nTask: {}\n\nPLAN:\n{}",
            history.render(),
            task.text,
            plan_str
        );

        match self.generator.generate::<ConstraintReview>(&system, &user).await {
            Ok(generated) => {
                let review = generated.artifact;
                let verdict = if review.is_valid {
                    tracing::info!("Plan approved");
                    ValidationVerdict::approve(review.review_feedback)
                } else {
                    tracing::warn!("Plan rejected: {}", review.review_feedback);
                    let feedback = if review.review_feedback.trim().is_empty() {
                        "Plan rejected without feedback.".to_string()
                    } else {
                        review.review_feedback
                    };
                    ValidationVerdict::reject(feedback)
                };
                ReviewOutcome {
                    verdict,
                    record: Some(GenerationRecord {
                        expert: ExpertKind::Validator,
                        model: self.generator.model().to_string(),
                        usage: generated.usage,
                        elapsed_ms: generated.elapsed.as_millis() as u64,
                    }),
                    consulted_generator: true,
                }
            }
            Err(e) => {
                tracing::error!("Reviewer could not review plan ({}), rejecting", e);
                ReviewOutcome {
                    verdict: ValidationVerdict::reject(format!(
                        "Plan could not be reviewed ({e}); rejected."
                    )),
                    record: None,
                    consulted_generator: true,
                }
            }
        }
    }
}
