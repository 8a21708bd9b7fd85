//! AI Operations Assistant CLI
//!
//! 用法：
//! - `ops-assistant "What's the weather in Paris?" [-v]` 单次执行
//! - `ops-assistant` 进入交互模式

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use ops_assistant::config::load_config;
use ops_assistant::pipeline::step_label;
use ops_assistant::{build_orchestrator, Orchestrator, PipelineEvent, TaskEvent, TaskResult};

#[derive(Parser)]
#[command(
    name = "ops-assistant",
    version,
    about = "AI Operations Assistant - Execute natural language tasks using AI agents"
)]
struct Args {
    /// Task to execute (if not provided, enters interactive mode)
    task: Option<String>,

    /// Show detailed execution steps
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path (layered over config/default.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

const HELP_TEXT: &str = r#"
📚 Example Tasks:
-----------------
• "Find the top 5 Python web frameworks on GitHub"
• "What's the weather in New York and London?"
• "Get information about the tensorflow repository on GitHub"
• "Search for machine learning repositories with more than 10000 stars"
• "What's the weather forecast for Tokyo?"
• "Tell me about user 'torvalds' on GitHub and the weather in Helsinki"

💡 Tips:
---------
• Be specific about what you want
• You can combine multiple requests
• The assistant will break down complex tasks into steps
"#;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    // CLI 默认只输出 warn 以上，避免与回复内容混在一起；RUST_LOG 可覆盖
    ops_assistant::observability::init("warn");

    let cfg = load_config(args.config.clone()).context("Failed to load configuration")?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let orchestrator = match build_orchestrator(&cfg) {
        Ok(o) => o.with_events(tx),
        Err(e) => {
            println!("❌ Error: {e}");
            println!("Please set it in your .env file or environment");
            return Ok(ExitCode::FAILURE);
        }
    };

    match args.task {
        Some(task) => {
            let result = run_task(&orchestrator, &mut rx, &task, args.verbose).await;
            if result.success {
                println!("{}", result.response.unwrap_or_default());
                Ok(ExitCode::SUCCESS)
            } else {
                print_failure(&result, "");
                Ok(ExitCode::FAILURE)
            }
        }
        None => {
            interactive(&orchestrator, &mut rx).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn interactive(
    orchestrator: &Orchestrator,
    rx: &mut mpsc::UnboundedReceiver<TaskEvent>,
) -> anyhow::Result<()> {
    println!("{}", "=".repeat(60));
    println!("🤖 AI Operations Assistant - Interactive Mode");
    println!("{}", "=".repeat(60));
    println!(
        "\nAvailable tools: GitHub (search repos, get user info), Weather (current & forecast)"
    );
    println!("Type 'quit' or 'exit' to stop, 'help' for examples\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("📝 Enter your task: ");
        std::io::stdout().flush().context("flush stdout")?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!("\n👋 Goodbye!");
            break;
        };

        let task = line.trim();
        if task.is_empty() {
            continue;
        }
        match task.to_lowercase().as_str() {
            "quit" | "exit" | "q" => {
                println!("👋 Goodbye!");
                break;
            }
            "help" => {
                println!("{HELP_TEXT}");
                continue;
            }
            _ => {}
        }

        let result = run_task(orchestrator, rx, task, true).await;
        if result.success {
            println!("\n{}", result.response.unwrap_or_default());
        } else {
            print_failure(&result, "\n");
        }
        println!("\n{}\n", "-".repeat(60));
    }
    Ok(())
}

/// 执行任务的同时渲染事件；任务结束后把残留事件一并输出
async fn run_task(
    orchestrator: &Orchestrator,
    rx: &mut mpsc::UnboundedReceiver<TaskEvent>,
    task: &str,
    verbose: bool,
) -> TaskResult {
    let fut = orchestrator.process_task(task, verbose);
    tokio::pin!(fut);
    let result = loop {
        tokio::select! {
            biased;
            Some(event) = rx.recv() => render(&event.event),
            result = &mut fut => {
                while let Ok(event) = rx.try_recv() {
                    render(&event.event);
                }
                break result;
            }
        }
    };

    let (prompt, completion, total) = orchestrator.token_usage();
    if verbose && total > 0 {
        println!("\n📊 Tokens used so far: {prompt} prompt + {completion} completion = {total}");
    }
    result
}

fn print_failure(result: &TaskResult, lead: &str) {
    // 部分完成时仍有格式化后的回复，先展示回复再报错
    if let Some(response) = &result.response {
        println!("{lead}{response}\n");
    }
    println!(
        "{lead}❌ Error: {}",
        result.error.as_deref().unwrap_or("Unknown error")
    );
}

fn banner(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("{title}");
    println!("{}", "=".repeat(60));
}

fn render(event: &PipelineEvent) {
    match event {
        PipelineEvent::PlanningStarted { task } => {
            banner("🤖 PLANNER AGENT");
            println!("Task: {task}\n");
            println!("Creating execution plan...");
        }
        PipelineEvent::PlanCreated { plan } => {
            println!("\n✅ Plan created:");
            match serde_json::to_string_pretty(plan) {
                Ok(json) => println!("{json}"),
                Err(_) => println!("{plan:?}"),
            }
        }
        PipelineEvent::PlanningFailed { error } => println!("\n❌ {error}"),
        PipelineEvent::ExecutionStarted { total } => {
            banner("⚡ EXECUTOR AGENT");
            println!("Executing {total} plan step(s)...\n");
        }
        PipelineEvent::StepRetry {
            step_number,
            attempt,
            max_attempts,
            error,
        } => println!(
            "  ⚠️  Step {}: attempt {attempt}/{max_attempts} failed: {error}",
            step_label(step_number.as_ref())
        ),
        PipelineEvent::StepCompleted {
            step_number,
            description,
            success,
            error,
        } => {
            let status = if *success { "✅" } else { "❌" };
            println!("  {status} Step {}: {description}", step_label(step_number.as_ref()));
            if let Some(error) = error {
                println!("     Error: {error}");
            }
        }
        PipelineEvent::VerificationStarted => {
            banner("✔️  VERIFIER AGENT");
            println!("Verifying and formatting results...\n");
        }
        PipelineEvent::FallbackFormatting { reason } => {
            println!("  ⚠️  Formatter unavailable ({reason}), using plain output");
        }
        PipelineEvent::FinalResponseReady { .. } => banner("📋 FINAL RESPONSE"),
    }
}
