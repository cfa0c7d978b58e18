//! 编排器构建器：统一的组件初始化逻辑
//!
//! 同一份配置、persona 与 LLM 客户端，按每个会话的工具目录组装出 Orchestrator。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::config::AppConfig;
use crate::core::{Orchestrator, RunEvent};
use crate::experts::{Executor, Planner, Validator};
use crate::llm::{Generator, LlmClient};
use crate::persona::PersonaSet;
use crate::tools::{ToolRegistry, ToolRunner};

pub struct OrchestratorBuilder {
    config: AppConfig,
    llm: Arc<dyn LlmClient>,
    personas: PersonaSet,
    event_tx: Option<UnboundedSender<RunEvent>>,
}

impl OrchestratorBuilder {
    pub fn new(config: AppConfig, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            config,
            llm,
            personas: PersonaSet::default(),
            event_tx: None,
        }
    }

    /// 设置三位专家的 persona（默认使用内置文本）
    pub fn with_personas(mut self, personas: PersonaSet) -> Self {
        self.personas = personas;
        self
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<RunEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 构建共享的 Generator（单次调用超时来自 llm.request_timeout_secs）
    pub fn build_generator(&self) -> Generator {
        Generator::new(
            self.llm.clone(),
            Duration::from_secs(self.config.llm.request_timeout_secs),
        )
    }

    /// 以给定工具目录构建 Orchestrator；目录在运行期间只读
    pub fn build(&self, catalogue: ToolRegistry) -> Orchestrator {
        let catalogue = Arc::new(catalogue);
        let generator = self.build_generator();
        let limits = self.config.orchestrator.clone();

        let planner = Planner::new(
            generator.clone(),
            self.personas.planner.clone(),
            &catalogue,
            limits.max_validation_attempts,
        );
        let validator = Validator::new(
            generator.clone(),
            self.personas.validator.clone(),
            catalogue.clone(),
        );
        let executor = Executor::new(generator, self.personas.executor.clone(), &catalogue);
        let runner = ToolRunner::new(catalogue, self.config.tools.tool_timeout_secs);

        let orchestrator = Orchestrator::new(planner, validator, executor, runner, limits);
        match &self.event_tx {
            Some(tx) => orchestrator.with_event_tx(tx.clone()),
            None => orchestrator,
        }
    }
}
