//! 专家 persona 文本
//!
//! 进程启动时从 persona 目录读取一次，之后只读；构建 Orchestrator 时每位专家各持一份副本。

use std::path::Path;

const PLANNER_FILE: &str = "planning_expert_system.txt";
const VALIDATOR_FILE: &str = "constraint_expert_system.txt";
const EXECUTOR_FILE: &str = "execution_expert_system.txt";

const DEFAULT_PLANNER: &str = "You are a planning expert. Break the task into the smallest ordered \
sequence of tool calls that completes it. Use only the available tools. Never repeat a step that \
already succeeded. Finish with the completion tool once the answer is known.";

const DEFAULT_VALIDATOR: &str = "You are a constraints analyst. Review the proposed plan against the \
task, the history and the available tools. Reject plans that use unknown tools, pass wrong arguments, \
repeat finished work, or cannot complete the task. Explain every rejection precisely.";

const DEFAULT_EXECUTOR: &str = "You are an autonomous executor. Decide how to carry out the next plan \
step. If the planned arguments contain placeholders such as [secret_value], look up the real value in \
the history and return concrete arguments.";

/// 三个专家的 system persona
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaSet {
    pub planner: String,
    pub validator: String,
    pub executor: String,
}

impl Default for PersonaSet {
    fn default() -> Self {
        Self {
            planner: DEFAULT_PLANNER.to_string(),
            validator: DEFAULT_VALIDATOR.to_string(),
            executor: DEFAULT_EXECUTOR.to_string(),
        }
    }
}

impl PersonaSet {
    /// 从目录加载；缺失的文件回退到内置默认
    pub fn load(dir: &Path) -> Self {
        let defaults = Self::default();
        Self {
            planner: read_or(dir, PLANNER_FILE, defaults.planner),
            validator: read_or(dir, VALIDATOR_FILE, defaults.validator),
            executor: read_or(dir, EXECUTOR_FILE, defaults.executor),
        }
    }

    pub fn from_optional_dir(dir: Option<&Path>) -> Self {
        dir.map(Self::load).unwrap_or_default()
    }
}

fn read_or(dir: &Path, file: &str, fallback: String) -> String {
    match std::fs::read_to_string(dir.join(file)) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => fallback,
        Err(e) => {
            tracing::warn!("Persona {} not loaded ({}), using built-in default", file, e);
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_with_partial_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PLANNER_FILE), "custom planner").unwrap();
        std::fs::write(dir.path().join(VALIDATOR_FILE), "   ").unwrap();

        let personas = PersonaSet::load(dir.path());
        assert_eq!(personas.planner, "custom planner");
        assert_eq!(personas.validator, DEFAULT_VALIDATOR);
        assert_eq!(personas.executor, DEFAULT_EXECUTOR);
    }

    #[test]
    fn test_no_directory_uses_defaults() {
        assert_eq!(PersonaSet::from_optional_dir(None), PersonaSet::default());
    }
}
