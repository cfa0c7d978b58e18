//! 会话驱动集成测试

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use erc::config::AppConfig;
    use erc::core::{OrchestratorBuilder, RunStatus};
    use erc::llm::{ScriptedLlmClient, ScriptedReply};
    use erc::session::{LocalSession, SessionDriver, SessionMeta};

    #[tokio::test]
    async fn test_failed_task_does_not_abort_session() {
        let mut replies = vec![
            ScriptedReply::Json(json!({"steps": [
                {"tool_name": "get_secret", "arguments": {}},
                {"tool_name": "provide_answer", "arguments": {"answer": "[secret_value]"}}
            ]})),
            ScriptedReply::Json(json!({"is_valid": true, "review_feedback": "ok"})),
            ScriptedReply::Json(json!({"decision": "tool"})),
            // 占位符由 Executor 按历史替换
            ScriptedReply::Json(json!({"decision": "tool", "arguments": {"answer": "95uZ"}})),
        ];
        replies.extend((0..5).map(|_| ScriptedReply::Json(json!({"steps": []}))));
        let llm = Arc::new(ScriptedLlmClient::new(replies));

        let session = Arc::new(
            LocalSession::new(["Return the secret value", "Unsolvable"])
                .with_secret("task-1", "95uZ")
                .with_expected("task-1", "95uZ")
                .with_expected("task-2", "42"),
        );
        let driver = SessionDriver::new(
            session.clone(),
            OrchestratorBuilder::new(AppConfig::default(), llm.clone()),
        );

        let summary = driver
            .run(&SessionMeta::default(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.tasks.len(), 2);
        assert_eq!(summary.tasks[0].status, RunStatus::Done);
        assert_eq!(summary.tasks[0].score, Some(1.0));
        assert!(matches!(summary.tasks[1].status, RunStatus::Failed { .. }));
        assert_eq!(summary.tasks[1].score, Some(0.0));
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.mean_score(), Some(0.5));

        assert_eq!(session.answer("task-1").as_deref(), Some("95uZ"));
        assert_eq!(session.completed(), vec!["task-1", "task-2"]);
        assert_eq!(session.llm_calls("task-1"), 4);
        assert_eq!(session.llm_calls("task-2"), 5);
        assert!(session.is_submitted());
        assert_eq!(llm.remaining(), 0);
    }

    #[test]
    fn test_catalogue_binds_session_tools() {
        let session = Arc::new(LocalSession::new(["x"]));
        let llm = Arc::new(ScriptedLlmClient::new(vec![]));
        let driver = SessionDriver::new(session, OrchestratorBuilder::new(AppConfig::default(), llm));
        assert_eq!(
            driver.catalogue().tool_names(),
            vec!["get_secret", "provide_answer", "report_completion"]
        );
    }
}
