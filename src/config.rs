//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `ERC__*` 覆盖（双下划线表示嵌套，如 `ERC__LLM__MODEL=oss-20b`）。

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::AgentError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub orchestrator: OrchestratorSection,
    pub tools: ToolsSection,
}

/// [app] 段：应用名、persona 目录
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 专家 persona 文本所在目录，未设置或文件缺失时使用内置默认
    pub persona_dir: Option<PathBuf>,
}

/// [llm] 段：模型、端点、采样参数与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// 单次 Generator 调用超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_model() -> String {
    "oss-20b".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
            temperature: 0.0,
            max_tokens: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// [orchestrator] 段：校验次数上限与总迭代上限
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSection {
    #[serde(default = "default_max_validation_attempts")]
    pub max_validation_attempts: u32,
    /// 节点调用总数上限，防止 PLANNING <-> EXECUTING 空转
    #[serde(default = "default_iteration_limit")]
    pub iteration_limit: usize,
}

fn default_max_validation_attempts() -> u32 {
    5
}

fn default_iteration_limit() -> usize {
    50
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_validation_attempts: default_max_validation_attempts(),
            iteration_limit: default_iteration_limit(),
        }
    }
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

fn default_tool_timeout_secs() -> u64 {
    120
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 ERC__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path，则追加该文件（必须存在，可覆盖前面的键）
/// 3. 最后叠加环境变量 ERC__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, AgentError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        if Path::new(&format!("{name}.toml")).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ERC")
            .separator("__")
            .try_parsing(true),
    );

    Ok(builder.build()?.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.orchestrator.max_validation_attempts, 5);
        assert_eq!(cfg.orchestrator.iteration_limit, 50);
        assert_eq!(cfg.llm.request_timeout_secs, 120);
        assert_eq!(cfg.tools.tool_timeout_secs, 120);
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[llm]\nmodel = \"gpt-4o-mini\"\n\n[orchestrator]\nmax_validation_attempts = 3"
        )
        .unwrap();
        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert_eq!(cfg.orchestrator.max_validation_attempts, 3);
        assert_eq!(cfg.orchestrator.iteration_limit, 50);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(matches!(
            load_config(Some(Path::new("/nonexistent/erc.toml"))),
            Err(AgentError::Config(_))
        ));
    }
}
