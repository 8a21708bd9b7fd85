//! Executor：按计划顺序逐步调用工具，单步有限次立即重试
//!
//! 单步失败不会中断整个计划；每个输入步骤恰好对应一个 StepOutcome。

use crate::pipeline::events::{emit, EventSink, PipelineEvent};
use crate::pipeline::{step_label, ExecutionResult, Plan, PlanContext, Step, StepOutcome};
use crate::tools::ToolExecutor;

/// Executor
pub struct Executor {
    tools: ToolExecutor,
    max_retries: u32,
}

impl Executor {
    pub fn new(tools: ToolExecutor, max_retries: u32) -> Self {
        Self {
            tools,
            max_retries: max_retries.max(1),
        }
    }

    /// 顺序执行全部步骤
    pub async fn execute(
        &self,
        plan: &Plan,
        events: Option<&EventSink>,
    ) -> ExecutionResult {
        let plan_context = PlanContext::from(plan);
        if plan.steps.is_empty() {
            return ExecutionResult {
                success: false,
                results: Vec::new(),
                plan_context,
                error: Some("No steps to execute".to_string()),
            };
        }

        emit(events, PipelineEvent::ExecutionStarted { total: plan.steps.len() });

        let mut results = Vec::with_capacity(plan.steps.len());
        for step in &plan.steps {
            let outcome = self.execute_step(step, events).await;
            if outcome.success {
                tracing::info!(step = %step_label(step.step_number.as_ref()), tool = %step.tool, "step succeeded");
            } else {
                tracing::warn!(
                    step = %step_label(step.step_number.as_ref()),
                    tool = %step.tool,
                    error = outcome.error.as_deref().unwrap_or_default(),
                    "step failed"
                );
            }
            emit(
                events,
                PipelineEvent::StepCompleted {
                    step_number: outcome.step_number.clone(),
                    description: outcome.description.clone(),
                    success: outcome.success,
                    error: outcome.error.clone(),
                },
            );
            results.push(outcome);
        }

        let success = results.iter().all(|r| r.success);
        ExecutionResult {
            success,
            results,
            plan_context,
            error: (!success).then(|| "Some steps failed".to_string()),
        }
    }

    async fn execute_step(
        &self,
        step: &Step,
        events: Option<&EventSink>,
    ) -> StepOutcome {
        let Some(tool) = self.tools.get_tool(&step.tool) else {
            return StepOutcome::failed(step, format!("Unknown tool: {}", step.tool));
        };

        let mut last_error = String::new();
        for attempt in 1..=self.max_retries {
            tracing::debug!(
                step = %step_label(step.step_number.as_ref()),
                tool = %step.tool,
                attempt,
                "invoking tool"
            );
            match self.tools.invoke(tool.as_ref(), &step.parameters).await {
                Ok(out) if out.success => {
                    return StepOutcome::succeeded(step, out.data);
                }
                Ok(out) => {
                    last_error = out.error.unwrap_or_else(|| "Unknown error".to_string());
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            if attempt < self.max_retries {
                tracing::warn!(
                    step = %step_label(step.step_number.as_ref()),
                    attempt,
                    error = %last_error,
                    "attempt failed, retrying"
                );
                emit(
                    events,
                    PipelineEvent::StepRetry {
                        step_number: step.step_number.clone(),
                        attempt,
                        max_attempts: self.max_retries,
                        error: last_error.clone(),
                    },
                );
            }
        }

        StepOutcome::failed(
            step,
            format!("Failed after {} attempts: {}", self.max_retries, last_error),
        )
    }
}
