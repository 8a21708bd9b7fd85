//! HTTP API：任务提交、工具列表、健康检查
//!
//! 路由：
//! - `GET /`、`GET /api` 服务信息
//! - `GET /health`
//! - `GET /tools`
//! - `POST /task` `{task, verbose}` → TaskResult

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::Orchestrator;
use crate::pipeline::TaskResult;
use crate::tools::ToolRegistry;

/// 共享状态：编排器与其使用的同一份工具注册表
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub registry: Arc<ToolRegistry>,
}

#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    pub task: String,
    #[serde(default)]
    pub verbose: bool,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(api_info))
        .route("/api", get(api_info))
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/task", post(process_task))
        .with_state(state)
}

async fn api_info() -> Json<Value> {
    Json(json!({
        "name": "AI Operations Assistant",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /task": "Submit a natural language task",
            "GET /health": "Health check",
            "GET /tools": "List available tools"
        }
    }))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

async fn list_tools(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({"tools": state.registry.to_schema_json()}))
}

async fn process_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TaskRequest>,
) -> Json<TaskResult> {
    tracing::info!(task = %req.task, verbose = req.verbose, "task received");
    Json(state.orchestrator.process_task(&req.task, req.verbose).await)
}
