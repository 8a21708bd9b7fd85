//! 编排器：串联 Planner → Executor → Verifier
//!
//! 每次调用新建一个 TaskResult，逐阶段填充后返回。规划失败提前结束；
//! 阶段内的 panic 在这里被捕获，error 为 panic 原文，已填充的 plan / execution_results 保留。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::Instrument;

use crate::config::AppConfig;
use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::pipeline::events::{emit, EventSink, PipelineEvent, TaskEvent};
use crate::pipeline::{Executor, Planner, TaskResult, Verifier};
use crate::tools::executor::panic_message;
use crate::tools::{ToolExecutor, ToolRegistry};

/// 流水线编排器；持有的模型句柄与工具注册表可在并发调用间共享
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    planner: Planner,
    executor: Executor,
    verifier: Verifier,
    events: Option<UnboundedSender<TaskEvent>>,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, registry: Arc<ToolRegistry>, cfg: &AppConfig) -> Self {
        let tools = ToolExecutor::new(registry.clone(), cfg.tools.tool_timeout_secs);
        Self {
            planner: Planner::new(llm.clone(), registry),
            executor: Executor::new(tools, cfg.pipeline.max_retries),
            verifier: Verifier::new(llm.clone(), cfg.pipeline.data_preview_chars),
            llm,
            events: None,
        }
    }

    /// 订阅阶段事件（verbose 模式下由调用方渲染）；每个事件带所属任务的 run_id
    pub fn with_events(mut self, tx: UnboundedSender<TaskEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// 模型累计 token 使用（prompt, completion, total）
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    /// 处理一个自然语言任务；verbose 为 true 时才发送阶段事件
    pub async fn process_task(&self, task: &str, verbose: bool) -> TaskResult {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("task", %run_id);
        let sink = match &self.events {
            Some(tx) if verbose => Some(EventSink::new(tx.clone(), run_id.as_str())),
            _ => None,
        };

        let mut result = TaskResult::new(task);
        let outcome = AssertUnwindSafe(self.run_stages(task, sink.as_ref(), &mut result))
            .catch_unwind()
            .instrument(span.clone())
            .await;

        if let Err(panic) = outcome {
            let message = panic_message(panic.as_ref());
            span.in_scope(|| tracing::error!(error = %message, "pipeline aborted"));
            result.success = false;
            result.error = Some(message);
        }

        let (prompt_tokens, completion_tokens, total_tokens) = self.token_usage();
        span.in_scope(|| {
            tracing::info!(prompt_tokens, completion_tokens, total_tokens, "token usage")
        });
        result
    }

    async fn run_stages(
        &self,
        task: &str,
        events: Option<&EventSink>,
        result: &mut TaskResult,
    ) {
        tracing::info!("planning");
        emit(events, PipelineEvent::PlanningStarted { task: task.to_string() });
        let plan = match self.planner.plan(task).await {
            Ok(plan) => plan,
            Err(e) => {
                let err = AgentError::Planning(e);
                tracing::warn!(error = %err, "planning failed");
                emit(events, PipelineEvent::PlanningFailed { error: err.to_string() });
                result.error = Some(err.to_string());
                return;
            }
        };
        result.plan = Some(plan.clone());
        emit(events, PipelineEvent::PlanCreated { plan: plan.clone() });

        tracing::info!(steps = plan.steps.len(), "executing");
        let execution = self.executor.execute(&plan, events).await;
        result.execution_results = Some(execution.results.clone());

        tracing::info!("verifying");
        emit(events, PipelineEvent::VerificationStarted);
        let verification = self
            .verifier
            .verify(task, &plan, &execution.results, events)
            .await;

        result.success = verification.success;
        result.response = Some(verification.final_response);
        result.error = verification.error;
        emit(events, PipelineEvent::FinalResponseReady { success: result.success });
        tracing::info!(success = result.success, "task finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use tokio::sync::mpsc;

    use crate::llm::{LlmError, MockLlmClient};
    use crate::tools::{Tool, ToolError, ToolOutput};

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "returns its parameters"
        }

        async fn execute(&self, params: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::ok(Value::Object(params.clone())))
        }
    }

    /// 在执行阶段 panic 的工具：ToolExecutor 会把它转成失败尝试
    struct Panicky;

    #[async_trait]
    impl Tool for Panicky {
        fn name(&self) -> &str {
            "panicky"
        }

        fn description(&self) -> &str {
            "panics"
        }

        async fn execute(&self, _params: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
            panic!("tool exploded");
        }
    }

    /// complete 时 panic 的模型：用于验证编排边界兜底
    struct PanickingVerifierLlm {
        inner: MockLlmClient,
    }

    #[async_trait]
    impl LlmClient for PanickingVerifierLlm {
        async fn complete(
            &self,
            messages: &[crate::llm::Message],
        ) -> Result<String, LlmError> {
            if self.inner.call_count() >= 1 {
                panic!("formatter crashed");
            }
            self.inner.complete(messages).await
        }
    }

    /// 固定 token 统计的模型
    struct MeteredLlm {
        inner: MockLlmClient,
    }

    #[async_trait]
    impl LlmClient for MeteredLlm {
        fn token_usage(&self) -> (u64, u64, u64) {
            let calls = self.inner.call_count() as u64;
            (calls * 100, calls * 20, calls * 120)
        }

        async fn complete(
            &self,
            messages: &[crate::llm::Message],
        ) -> Result<String, LlmError> {
            self.inner.complete(messages).await
        }
    }

    const ECHO_PLAN: &str = r#"{"task_understanding": "echo", "steps": [{"step_number": 1, "description": "echo it", "tool": "echo", "parameters": {"text": "hi"}}], "expected_output": "hi"}"#;

    fn registry() -> Arc<ToolRegistry> {
        let mut r = ToolRegistry::new();
        r.register(Echo);
        r.register(Panicky);
        Arc::new(r)
    }

    #[tokio::test]
    async fn test_happy_path() {
        let llm = Arc::new(MockLlmClient::with_responses([ECHO_PLAN, "Echoed: hi"]));
        let orch = Orchestrator::new(llm.clone(), registry(), &AppConfig::default());
        let result = orch.process_task("say hi", false).await;

        assert!(result.success);
        assert_eq!(result.response.as_deref(), Some("Echoed: hi"));
        assert_eq!(result.error, None);
        assert_eq!(result.plan.unwrap().steps.len(), 1);
        let outcomes = result.execution_results.unwrap();
        assert_eq!(outcomes[0].data, Some(json!({"text": "hi"})));
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_planning_failure_stops_pipeline() {
        let llm = Arc::new(MockLlmClient::new());
        llm.push_err(LlmError::ApiError("unavailable".into()));
        let orch = Orchestrator::new(llm.clone(), registry(), &AppConfig::default());
        let result = orch.process_task("say hi", false).await;

        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Planning failed: Planning failed: LLM API error: unavailable")
        );
        assert!(result.plan.is_none());
        assert!(result.execution_results.is_none());
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_plan_reported() {
        let llm = Arc::new(MockLlmClient::with_responses([
            r#"{"steps": [{"tool": "jira", "parameters": {}}]}"#,
        ]));
        let orch = Orchestrator::new(llm, registry(), &AppConfig::default());
        let result = orch.process_task("open a ticket", false).await;
        assert_eq!(
            result.error.as_deref(),
            Some("Planning failed: Step 1 uses unknown tool: jira")
        );
    }

    #[tokio::test]
    async fn test_empty_task() {
        let llm = Arc::new(MockLlmClient::new());
        let orch = Orchestrator::new(llm.clone(), registry(), &AppConfig::default());
        let result = orch.process_task("  ", false).await;
        assert_eq!(result.error.as_deref(), Some("Planning failed: No task provided"));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_tool_panic_is_a_failed_step() {
        let llm = Arc::new(MockLlmClient::with_responses([
            r#"{"steps": [{"step_number": 1, "description": "boom", "tool": "panicky", "parameters": {}}]}"#,
            "Nothing worked.",
        ]));
        let orch = Orchestrator::new(llm, registry(), &AppConfig::default());
        let result = orch.process_task("explode", false).await;

        assert!(!result.success);
        assert_eq!(result.response.as_deref(), Some("Nothing worked."));
        assert_eq!(result.error.as_deref(), Some("Some data may be incomplete"));
        let outcomes = result.execution_results.unwrap();
        assert_eq!(
            outcomes[0].error.as_deref(),
            Some("Failed after 3 attempts: Tool panicked: tool exploded")
        );
    }

    #[tokio::test]
    async fn test_stage_panic_keeps_partial_result() {
        let llm = Arc::new(PanickingVerifierLlm {
            inner: MockLlmClient::with_responses([ECHO_PLAN]),
        });
        let orch = Orchestrator::new(llm, registry(), &AppConfig::default());
        let result = orch.process_task("say hi", false).await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("formatter crashed"));
        assert!(result.plan.is_some());
        assert_eq!(result.execution_results.map(|r| r.len()), Some(1));
        assert!(result.response.is_none());
    }

    #[tokio::test]
    async fn test_events_only_when_verbose() {
        let llm = Arc::new(MockLlmClient::with_responses([ECHO_PLAN, "ok", ECHO_PLAN, "ok"]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let orch = Orchestrator::new(llm, registry(), &AppConfig::default()).with_events(tx);

        orch.process_task("say hi", false).await;
        assert!(rx.try_recv().is_err());

        orch.process_task("say hi", true).await;
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(serde_json::to_value(&ev).unwrap()["type"].as_str().unwrap().to_string());
        }
        assert_eq!(
            kinds,
            vec![
                "planning_started",
                "plan_created",
                "execution_started",
                "step_completed",
                "verification_started",
                "final_response_ready"
            ]
        );
    }

    #[tokio::test]
    async fn test_events_carry_one_run_id_per_task() {
        let llm = Arc::new(MockLlmClient::with_responses([ECHO_PLAN, "ok", ECHO_PLAN, "ok"]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let orch = Orchestrator::new(llm, registry(), &AppConfig::default()).with_events(tx);

        orch.process_task("say hi", true).await;
        let first: Vec<TaskEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        orch.process_task("say hi", true).await;
        let second: Vec<TaskEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();

        assert_eq!(first.len(), 6);
        assert_eq!(second.len(), 6);
        let first_id = &first[0].run_id;
        let second_id = &second[0].run_id;
        assert!(uuid::Uuid::parse_str(first_id).is_ok());
        assert!(first.iter().all(|e| &e.run_id == first_id));
        assert!(second.iter().all(|e| &e.run_id == second_id));
        assert_ne!(first_id, second_id);
        assert_eq!(serde_json::to_value(&first[0]).unwrap()["run_id"], json!(first_id));
    }

    #[tokio::test]
    async fn test_token_usage_reported_from_model() {
        let llm = Arc::new(MeteredLlm {
            inner: MockLlmClient::with_responses([ECHO_PLAN, "Echoed: hi"]),
        });
        let orch = Orchestrator::new(llm, registry(), &AppConfig::default());
        assert_eq!(orch.token_usage(), (0, 0, 0));

        let result = orch.process_task("say hi", false).await;
        assert!(result.success);
        assert_eq!(orch.token_usage(), (200, 40, 240));
    }
}
