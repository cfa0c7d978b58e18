//! ToolRunner：唯一允许产生外部副作用的组件
//!
//! 按 outcome.step.tool_name 派发到工具目录，施加超时；异常（Err）、超时、未知工具、
//! 旧式工具未返回 SUCCESS 前缀均解析为 ERROR，错误文本作为 payload。每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::plan::{StepArguments, ToolDecision, ToolOutcome, ToolPayload, ToolStatus};
use crate::tools::{ResultStyle, ToolContext, ToolRegistry};

const SUCCESS_SENTINEL: &str = "SUCCESS";

pub struct ToolRunner {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolRunner {
    pub fn new(registry: Arc<ToolRegistry>, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_timeout(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// 解析 PENDING 的 outcome；已是终态的 outcome 原样返回
    pub async fn invoke(&self, ctx: &ToolContext, mut outcome: ToolOutcome) -> ToolOutcome {
        if !outcome.is_pending() {
            return outcome;
        }

        let start = Instant::now();
        let resolution = self.dispatch(ctx, &mut outcome).await;
        let audit = audit_line(ctx, &outcome, &resolution, start.elapsed());
        tracing::info!(audit = %audit, "tool");

        outcome.resolve(resolution.status, resolution.payload);
        outcome
    }

    async fn dispatch(&self, ctx: &ToolContext, outcome: &mut ToolOutcome) -> Resolution {
        match outcome.decision {
            Some(ToolDecision::Tool) => {}
            Some(ToolDecision::Code) => {
                return Resolution::error(
                    "not_implemented",
                    "NotImplemented: code actions are not supported",
                );
            }
            None => return Resolution::error("no_decision", "no dispatch decision"),
        }

        let tool_name = outcome.step.tool_name.clone();
        let Some(tool) = self.registry.get(&tool_name) else {
            return Resolution::error("unknown_tool", format!("Unknown tool: {tool_name}"));
        };

        outcome.dispatched = true;
        outcome.terminal = tool.is_terminal();
        match timeout(self.timeout, tool.execute(ctx, &outcome.arguments)).await {
            Ok(Ok(payload)) => {
                let status = match tool.result_style() {
                    ResultStyle::Typed => ToolStatus::Success,
                    ResultStyle::Sentinel => {
                        let ok = payload
                            .as_text()
                            .is_some_and(|s| s.trim_start().starts_with(SUCCESS_SENTINEL));
                        if ok { ToolStatus::Success } else { ToolStatus::Error }
                    }
                };
                Resolution {
                    status,
                    payload,
                    label: "ok",
                }
            }
            Ok(Err(e)) => Resolution::error("error", e.to_string()),
            Err(_) => Resolution::error(
                "timeout",
                format!(
                    "Tool timeout: {} after {}s",
                    tool_name,
                    self.timeout.as_secs()
                ),
            ),
        }
    }
}

/// 一次派发的结论与审计标签
struct Resolution {
    status: ToolStatus,
    payload: ToolPayload,
    label: &'static str,
}

impl Resolution {
    fn error(label: &'static str, reason: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            payload: ToolPayload::Text(reason.into()),
            label,
        }
    }
}

fn audit_line(
    ctx: &ToolContext,
    outcome: &ToolOutcome,
    resolution: &Resolution,
    elapsed: Duration,
) -> serde_json::Value {
    serde_json::json!({
        "event": "tool_audit",
        "task": ctx.task.id,
        "tool": outcome.step.tool_name,
        "ok": resolution.status == ToolStatus::Success,
        "outcome": resolution.label,
        "dispatched": outcome.dispatched,
        "duration_ms": elapsed.as_millis() as u64,
        "args_preview": args_preview(&outcome.arguments),
    })
}

fn args_preview(args: &StepArguments) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{PlanStep, Task};
    use crate::tools::{EchoTool, ReportCompletionTool, Tool, ToolError};
    use async_trait::async_trait;
    use serde_json::json;

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "fail"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        async fn execute(&self, _: &ToolContext, _: &StepArguments) -> Result<ToolPayload, ToolError> {
            Err(ToolError::Failed("backend unavailable".to_string()))
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps"
        }
        async fn execute(&self, _: &ToolContext, _: &StepArguments) -> Result<ToolPayload, ToolError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(ToolPayload::Text("late".into()))
        }
    }

    struct LegacyNoSentinel;

    #[async_trait]
    impl Tool for LegacyNoSentinel {
        fn name(&self) -> &str {
            "legacy"
        }
        fn description(&self) -> &str {
            "legacy tool"
        }
        fn result_style(&self) -> ResultStyle {
            ResultStyle::Sentinel
        }
        async fn execute(&self, _: &ToolContext, _: &StepArguments) -> Result<ToolPayload, ToolError> {
            Ok(ToolPayload::Text("I'm sorry, I can't do that".into()))
        }
    }

    fn runner() -> ToolRunner {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(ReportCompletionTool);
        registry.register(FailingTool);
        registry.register(SlowTool);
        registry.register(LegacyNoSentinel);
        ToolRunner::with_timeout(Arc::new(registry), Duration::from_millis(50))
    }

    fn ctx() -> ToolContext {
        ToolContext::new(Task::new("t", "task"))
    }

    fn pending(tool: &str, args: StepArguments, decision: ToolDecision) -> ToolOutcome {
        ToolOutcome::pending(PlanStep::new(tool, args.clone()), decision, args)
    }

    #[tokio::test]
    async fn test_typed_success() {
        let args = StepArguments::from_value(json!({"text": "hi"}));
        let out = runner().invoke(&ctx(), pending("echo", args, ToolDecision::Tool)).await;
        assert_eq!(out.status, ToolStatus::Success);
        assert_eq!(out.payload_text(), "hi");
        assert!(!out.terminal);
    }

    #[tokio::test]
    async fn test_sentinel_success_is_terminal() {
        let args = StepArguments::from_value(json!({"final_message": "9"}));
        let out = runner()
            .invoke(&ctx(), pending("report_completion", args, ToolDecision::Tool))
            .await;
        assert_eq!(out.status, ToolStatus::Success);
        assert!(out.terminal);
    }

    #[tokio::test]
    async fn test_sentinel_missing_is_error() {
        let out = runner()
            .invoke(&ctx(), pending("legacy", StepArguments::Empty, ToolDecision::Tool))
            .await;
        assert_eq!(out.status, ToolStatus::Error);
    }

    #[tokio::test]
    async fn test_err_unknown_and_timeout_resolve_error() {
        let r = runner();
        let out = r.invoke(&ctx(), pending("fail", StepArguments::Empty, ToolDecision::Tool)).await;
        assert_eq!(out.status, ToolStatus::Error);
        assert_eq!(out.payload_text(), "backend unavailable");

        let out = r.invoke(&ctx(), pending("nope", StepArguments::Empty, ToolDecision::Tool)).await;
        assert_eq!(out.status, ToolStatus::Error);
        assert!(out.payload_text().contains("Unknown tool"));

        let out = r.invoke(&ctx(), pending("slow", StepArguments::Empty, ToolDecision::Tool)).await;
        assert_eq!(out.status, ToolStatus::Error);
        assert!(out.payload_text().contains("timeout"));
    }

    #[tokio::test]
    async fn test_code_decision_not_implemented() {
        let out = runner()
            .invoke(&ctx(), pending("echo", StepArguments::Empty, ToolDecision::Code))
            .await;
        assert_eq!(out.status, ToolStatus::Error);
        assert!(out.payload_text().starts_with("NotImplemented"));
    }

    #[tokio::test]
    async fn test_only_registered_tools_count_as_dispatched() {
        let r = runner();
        let out = r.invoke(&ctx(), pending("fail", StepArguments::Empty, ToolDecision::Tool)).await;
        assert!(out.dispatched);

        let out = r.invoke(&ctx(), pending("nope", StepArguments::Empty, ToolDecision::Tool)).await;
        assert!(!out.dispatched);

        let out = r.invoke(&ctx(), pending("echo", StepArguments::Empty, ToolDecision::Code)).await;
        assert!(!out.dispatched);
    }

    #[test]
    fn test_audit_line_for_rejected_dispatch() {
        let outcome = pending("nope", StepArguments::Raw("x".into()), ToolDecision::Tool);
        let resolution = Resolution::error("unknown_tool", "Unknown tool: nope");
        let audit = audit_line(&ctx(), &outcome, &resolution, Duration::from_millis(3));
        assert_eq!(audit["event"], "tool_audit");
        assert_eq!(audit["task"], "t");
        assert_eq!(audit["tool"], "nope");
        assert_eq!(audit["ok"], false);
        assert_eq!(audit["outcome"], "unknown_tool");
        assert_eq!(audit["dispatched"], false);
        assert_eq!(audit["duration_ms"], 3);
        assert_eq!(audit["args_preview"], "x");
    }

    #[tokio::test]
    async fn test_resolved_outcome_passes_through() {
        let failed = ToolOutcome::failed(PlanStep::new("echo", StepArguments::Empty), "generation failed");
        let out = runner().invoke(&ctx(), failed.clone()).await;
        assert_eq!(out, failed);
    }
}
