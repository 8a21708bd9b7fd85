//! AI Operations Assistant HTTP API
//!
//! 启动: cargo run --bin ops-assistant-web --features web
//! 端口: 配置 [server] port，或环境变量 OPS__SERVER__PORT

#![cfg(feature = "web")]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;

use ops_assistant::config::load_config;
use ops_assistant::core::{build_tool_registry, create_llm_from_config, Orchestrator};
use ops_assistant::pipeline::TaskEvent;
use ops_assistant::server::{create_router, AppState};

#[derive(Parser)]
#[command(name = "ops-assistant-web", about = "AI Operations Assistant HTTP API")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    ops_assistant::observability::init("info");

    let cfg = load_config(args.config).context("Failed to load configuration")?;
    let llm = create_llm_from_config(&cfg).context("Failed to create LLM client")?;
    let registry = Arc::new(build_tool_registry(&cfg));

    // verbose 请求的阶段事件写入日志；并发请求按 run_id 区分
    let (tx, mut rx) = mpsc::unbounded_channel::<TaskEvent>();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event.event) {
                Ok(json) => tracing::info!(run_id = %event.run_id, event = %json, "pipeline"),
                Err(e) => tracing::warn!("event serialize failed: {}", e),
            }
        }
    });

    let orchestrator = Orchestrator::new(llm, registry.clone(), &cfg).with_events(tx);
    let app = create_router(Arc::new(AppState {
        orchestrator,
        registry,
    }));

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    tracing::info!("🚀 {} API: http://{}", cfg.app.name, addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
