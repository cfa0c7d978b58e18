//! ERC - 入口：加载配置与 persona，在进程内会话上逐个运行任务并打印结果。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use erc::config::load_config;
use erc::core::{OrchestratorBuilder, RunStatus};
use erc::llm::OpenAiClient;
use erc::observability;
use erc::persona::PersonaSet;
use erc::session::{LocalSession, SessionDriver, SessionMeta};

#[derive(Parser, Debug)]
#[command(name = "erc", version, about = "Plan / validate / execute task orchestrator")]
struct Args {
    /// 额外的配置文件（TOML）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 任务文本，可重复
    #[arg(long = "task")]
    tasks: Vec<String>,

    /// 任务文件，每行一个任务
    #[arg(long)]
    tasks_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let args = Args::parse();

    let cfg = load_config(args.config.as_deref()).context("Failed to load config")?;

    let mut tasks = args.tasks;
    if let Some(path) = &args.tasks_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tasks file {}", path.display()))?;
        tasks.extend(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from),
        );
    }
    if tasks.is_empty() {
        bail!("no tasks given (use --task or --tasks-file)");
    }

    let llm = Arc::new(OpenAiClient::from_config(&cfg.llm));
    let mut meta = SessionMeta::default();
    if let Some(name) = &cfg.app.name {
        meta.name = name.clone();
    }
    let personas = PersonaSet::from_optional_dir(cfg.app.persona_dir.as_deref());
    let builder = OrchestratorBuilder::new(cfg, llm).with_personas(personas);
    let session = Arc::new(LocalSession::new(tasks));
    let driver = SessionDriver::new(session.clone(), builder);

    // Ctrl-C：在节点之间停止调度
    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.cancel();
        }
    });

    let summary = driver
        .run(&meta, cancel)
        .await
        .context("Session run failed")?;

    println!("{}", "=".repeat(40));
    for task in &summary.tasks {
        let status = match &task.status {
            RunStatus::Done => "DONE".to_string(),
            RunStatus::Failed { reason } => format!("FAILED ({reason})"),
        };
        let answer = session.answer(&task.task_id).unwrap_or_else(|| "-".to_string());
        println!(
            "{} [{}] iterations={} answer={}\n  {}",
            task.task_id, status, task.iterations, answer, task.task_text
        );
    }
    println!(
        "{}/{} tasks done",
        summary.succeeded(),
        summary.tasks.len()
    );

    Ok(())
}
