//! 工具执行器
//!
//! 持有共享的 ToolRegistry 与单次调用超时；invoke(tool, params) 在超时内调用工具，
//! 超时、工具返回 Err、工具 panic 统一转为 ToolError；每次调用输出结构化审计日志（JSON）。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde_json::{Map, Value};
use tokio::time::timeout;

use crate::tools::{Tool, ToolError, ToolOutput, ToolRegistry};

/// 工具执行器：对每次调用施加超时并记录审计日志
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.registry.get(name)
    }

    /// 调用一次工具（不重试）；工具须已注册，查找由调用方负责
    pub async fn invoke(
        &self,
        tool: &dyn Tool,
        params: &Map<String, Value>,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let call = AssertUnwindSafe(tool.execute(params)).catch_unwind();
        let result = match timeout(self.timeout, call).await {
            Ok(Ok(inner)) => inner,
            Ok(Err(panic)) => Err(ToolError::Panicked(panic_message(panic.as_ref()))),
            Err(_) => Err(ToolError::Timeout(self.timeout.as_secs())),
        };

        let (ok, outcome): (bool, &str) = match &result {
            Ok(out) if out.success => (true, "ok"),
            Ok(_) => (false, "reported_failure"),
            Err(ToolError::Timeout(_)) => (false, "timeout"),
            Err(ToolError::Panicked(_)) => (false, "panic"),
            Err(_) => (false, "error"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool.name(),
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(params),
        });
        tracing::info!(audit = %audit, "tool");

        result
    }
}

/// 取 panic 负载中的字符串信息
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn args_preview(params: &Map<String, Value>) -> String {
    let s = Value::Object(params.clone()).to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
