//! 进程内会话：任务预先给定，记录答案，可选地按期望答案打分（1.0 / 0.0）

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::core::GenerationRecord;
use crate::session::{
    SessionClient, SessionError, SessionMeta, SessionTask, TaskCompletion, TaskEval,
};

#[derive(Default)]
struct LocalState {
    session_id: Option<String>,
    started: Vec<String>,
    completed: Vec<String>,
    answers: HashMap<String, String>,
    llm_log: Vec<(String, GenerationRecord)>,
    submitted: bool,
}

pub struct LocalSession {
    tasks: Vec<SessionTask>,
    secrets: HashMap<String, String>,
    expected: HashMap<String, String>,
    state: Mutex<LocalState>,
}

impl LocalSession {
    /// 任务 id 依次为 task-1, task-2, ...
    pub fn new<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tasks = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| SessionTask {
                task_id: format!("task-{}", i + 1),
                spec_id: "local".to_string(),
                task_text: text.into(),
            })
            .collect();
        Self {
            tasks,
            secrets: HashMap::new(),
            expected: HashMap::new(),
            state: Mutex::new(LocalState::default()),
        }
    }

    pub fn with_secret(mut self, task_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.secrets.insert(task_id.into(), secret.into());
        self
    }

    /// 设置期望答案；complete_task 时据此打分
    pub fn with_expected(mut self, task_id: impl Into<String>, answer: impl Into<String>) -> Self {
        self.expected.insert(task_id.into(), answer.into());
        self
    }

    pub fn tasks(&self) -> &[SessionTask] {
        &self.tasks
    }

    /// 任务最近一次提交的答案
    pub fn answer(&self, task_id: &str) -> Option<String> {
        self.lock().answers.get(task_id).cloned()
    }

    pub fn completed(&self) -> Vec<String> {
        self.lock().completed.clone()
    }

    pub fn is_submitted(&self) -> bool {
        self.lock().submitted
    }

    /// 某任务上报的 LLM 调用次数
    pub fn llm_calls(&self, task_id: &str) -> usize {
        self.lock()
            .llm_log
            .iter()
            .filter(|(id, _)| id == task_id)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, LocalState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn known(&self, task_id: &str) -> Result<(), SessionError> {
        if self.tasks.iter().any(|t| t.task_id == task_id) {
            Ok(())
        } else {
            Err(SessionError::NotFound(format!("task {task_id}")))
        }
    }
}

fn normalize(answer: &str) -> String {
    answer.trim().to_lowercase()
}

#[async_trait]
impl SessionClient for LocalSession {
    async fn start_session(&self, meta: &SessionMeta) -> Result<String, SessionError> {
        let id = format!("local-{}", uuid::Uuid::new_v4());
        tracing::info!(session = %id, benchmark = %meta.benchmark, "Local session started: {}", meta.name);
        self.lock().session_id = Some(id.clone());
        Ok(id)
    }

    async fn session_status(&self, session_id: &str) -> Result<Vec<SessionTask>, SessionError> {
        match &self.lock().session_id {
            Some(id) if id == session_id => Ok(self.tasks.clone()),
            _ => Err(SessionError::NotFound(format!("session {session_id}"))),
        }
    }

    async fn start_task(&self, task: &SessionTask) -> Result<(), SessionError> {
        self.known(&task.task_id)?;
        self.lock().started.push(task.task_id.clone());
        Ok(())
    }

    async fn complete_task(&self, task: &SessionTask) -> Result<TaskCompletion, SessionError> {
        self.known(&task.task_id)?;
        let mut state = self.lock();
        state.completed.push(task.task_id.clone());

        let Some(expected) = self.expected.get(&task.task_id) else {
            return Ok(TaskCompletion::default());
        };
        let eval = match state.answers.get(&task.task_id) {
            Some(given) if normalize(given) == normalize(expected) => TaskEval {
                score: 1.0,
                logs: format!("answer '{given}' matches"),
            },
            Some(given) => TaskEval {
                score: 0.0,
                logs: format!("expected '{expected}', got '{given}'"),
            },
            None => TaskEval {
                score: 0.0,
                logs: "no answer provided".to_string(),
            },
        };
        Ok(TaskCompletion { eval: Some(eval) })
    }

    async fn submit_session(&self, session_id: &str) -> Result<(), SessionError> {
        let mut state = self.lock();
        match &state.session_id {
            Some(id) if id == session_id => {
                state.submitted = true;
                Ok(())
            }
            _ => Err(SessionError::NotFound(format!("session {session_id}"))),
        }
    }

    async fn provide_answer(&self, task_id: &str, answer: &str) -> Result<String, SessionError> {
        self.known(task_id)?;
        let mut state = self.lock();
        if state.completed.iter().any(|id| id == task_id) {
            return Err(SessionError::Rejected(format!("task {task_id} already completed")));
        }
        state.answers.insert(task_id.to_string(), answer.to_string());
        Ok(format!("SUCCESS answer recorded for {task_id}"))
    }

    async fn get_secret(&self, task_id: &str) -> Result<String, SessionError> {
        self.known(task_id)?;
        self.secrets
            .get(task_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(format!("secret for {task_id}")))
    }

    async fn log_llm(&self, task_id: &str, record: &GenerationRecord) -> Result<(), SessionError> {
        self.lock()
            .llm_log
            .push((task_id.to_string(), record.clone()));
        Ok(())
    }
}
