//! 会话驱动：逐个运行会话中的任务
//!
//! 每个任务一次独立的 Orchestrator 运行；无论运行成败都会 complete_task。
//! 单个任务失败不会中断会话，最后统一 submit_session。

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, OrchestratorBuilder, RunReport, RunStatus};
use crate::session::{SessionClient, SessionMeta, SessionTask};
use crate::tools::{GetSecretTool, ProvideAnswerTool, ReportCompletionTool, ToolRegistry};

/// 单个任务的结果概要
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub task_id: String,
    pub task_text: String,
    pub status: RunStatus,
    pub iterations: usize,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub tasks: Vec<TaskSummary>,
}

impl SessionSummary {
    pub fn succeeded(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == RunStatus::Done)
            .count()
    }

    /// 有评分任务的平均分
    pub fn mean_score(&self) -> Option<f64> {
        let scores: Vec<f64> = self.tasks.iter().filter_map(|t| t.score).collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }
}

pub struct SessionDriver {
    session: Arc<dyn SessionClient>,
    builder: OrchestratorBuilder,
}

impl SessionDriver {
    pub fn new(session: Arc<dyn SessionClient>, builder: OrchestratorBuilder) -> Self {
        Self { session, builder }
    }

    /// 本会话的工具目录：完成上报、答案提交、取 secret
    pub fn catalogue(&self) -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(ReportCompletionTool);
        tools.register(ProvideAnswerTool::new(self.session.clone()));
        tools.register(GetSecretTool::new(self.session.clone()));
        tools
    }

    pub async fn run(
        &self,
        meta: &SessionMeta,
        cancel: CancellationToken,
    ) -> Result<SessionSummary, AgentError> {
        let session_id = self.session.start_session(meta).await?;
        let tasks = self.session.session_status(&session_id).await?;
        tracing::info!(session = %session_id, "Session has {} tasks", tasks.len());

        let orchestrator = self.builder.build(self.catalogue());
        let mut summaries = Vec::with_capacity(tasks.len());

        for task in &tasks {
            tracing::info!("Starting Task: {} ({}): {}", task.task_id, task.spec_id, task.task_text);
            if let Err(e) = self.session.start_task(task).await {
                tracing::warn!(task = %task.task_id, "start_task failed: {}", e);
            }

            let report = orchestrator.run(&task.to_task(), cancel.clone()).await;
            if let RunStatus::Failed { reason } = &report.status {
                tracing::warn!(task = %task.task_id, "Run failed: {}", reason);
            }
            self.report_usage(task, &report).await;

            let score = match self.session.complete_task(task).await {
                Ok(done) => done.eval.map(|eval| {
                    tracing::info!(task = %task.task_id, "SCORE: {}\n{}", eval.score, eval.logs);
                    eval.score
                }),
                Err(e) => {
                    tracing::warn!(task = %task.task_id, "complete_task failed: {}", e);
                    None
                }
            };

            summaries.push(TaskSummary {
                task_id: task.task_id.clone(),
                task_text: task.task_text.clone(),
                status: report.status,
                iterations: report.iterations,
                score,
            });
        }

        self.session.submit_session(&session_id).await?;
        tracing::info!(session = %session_id, "Session submitted");

        Ok(SessionSummary {
            session_id,
            tasks: summaries,
        })
    }

    async fn report_usage(&self, task: &SessionTask, report: &RunReport) {
        for record in &report.generations {
            if let Err(e) = self.session.log_llm(&task.task_id, record).await {
                tracing::warn!(task = %task.task_id, "log_llm failed: {}", e);
            }
        }
        let total = report.total_usage();
        tracing::info!(
            task = %task.task_id,
            calls = report.generations.len(),
            total_tokens = total.total_tokens,
            "LLM usage"
        );
    }
}
