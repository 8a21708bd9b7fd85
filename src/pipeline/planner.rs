//! Planner：任务 → 经过结构校验的 Plan
//!
//! 把注册表中每个工具的 name / description / parameters schema 拼进 prompt，请模型输出 Plan JSON，
//! 再按固定顺序做整体校验（全有或全无，首个违规即返回）。

use std::sync::Arc;

use serde_json::Value;

use crate::core::{PlanError, PlanViolation};
use crate::llm::LlmClient;
use crate::pipeline::{plan_schema_json, Plan, Step};
use crate::tools::ToolRegistry;

const PLANNER_SYSTEM_PROMPT: &str = "You are a task planning agent. Your job is to analyze user requests and create detailed execution plans.

You must respond with a valid JSON object containing a plan with steps.

Each step must include:
- step_number: Sequential number starting from 1
- description: What this step does
- tool: Name of the tool to use (must be one of the available tools)
- parameters: Object with parameters for the tool

Be precise and use only the available tools. Break complex tasks into smaller steps.";

const PLAN_FORMAT_EXAMPLE: &str = r#"{
    "task_understanding": "Brief explanation of what the user wants",
    "steps": [
        {
            "step_number": 1,
            "description": "Description of what this step does",
            "tool": "tool_name",
            "parameters": {
                "param1": "value1"
            }
        }
    ],
    "expected_output": "What the final result should contain"
}"#;

/// Planner：持有模型句柄与共享的工具注册表
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>) -> Self {
        Self { llm, tools }
    }

    /// 每个工具一段 Tool / Description / Parameters，按注册顺序
    pub fn tool_descriptions(&self) -> String {
        self.tools
            .iter()
            .map(|tool| {
                format!(
                    "Tool: {}\nDescription: {}\nParameters: {}\n",
                    tool.name(),
                    tool.description(),
                    tool.parameters_schema()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn build_prompt(&self, task: &str) -> String {
        format!(
            "User Task: {task}\n\n\
             Available Tools:\n{tools}\n\
             Create a step-by-step plan to accomplish this task. Respond with JSON in this exact format:\n\
             {example}\n\n\
             The plan must conform to this JSON Schema:\n{schema}",
            tools = self.tool_descriptions(),
            example = PLAN_FORMAT_EXAMPLE,
            schema = plan_schema_json(),
        )
    }

    /// 生成并校验 Plan；空任务不调用模型
    pub async fn plan(&self, task: &str) -> Result<Plan, PlanError> {
        if task.trim().is_empty() {
            return Err(PlanError::EmptyTask);
        }

        let prompt = self.build_prompt(task);
        let raw = self
            .llm
            .generate_json(&prompt, Some(PLANNER_SYSTEM_PROMPT))
            .await?;
        tracing::debug!(raw = %raw, "planner raw output");

        let plan = validate_plan(&raw, &self.tools)?;
        tracing::info!(steps = plan.steps.len(), "plan validated");
        Ok(plan)
    }
}

/// 结构校验，顺序：对象 → 有 steps → steps 非空 → 逐步（有 tool → tool 已注册 → 有 parameters）
pub fn validate_plan(raw: &Value, tools: &ToolRegistry) -> Result<Plan, PlanViolation> {
    let obj = raw.as_object().ok_or(PlanViolation::NotAnObject)?;
    let steps_value = obj.get("steps").ok_or(PlanViolation::MissingSteps)?;
    let raw_steps: &[Value] = match steps_value {
        Value::Array(items) => items,
        Value::Null => &[],
        _ => {
            return Err(PlanViolation::MalformedStep {
                step: 1,
                reason: "steps is not a list".to_string(),
            })
        }
    };
    if raw_steps.is_empty() {
        return Err(PlanViolation::EmptySteps);
    }

    let mut steps = Vec::with_capacity(raw_steps.len());
    for (i, raw_step) in raw_steps.iter().enumerate() {
        let n = i + 1;
        let tool = raw_step.get("tool").ok_or(PlanViolation::MissingTool(n))?;
        let tool_name = tool.as_str().unwrap_or_default();
        if !tools.contains(tool_name) {
            return Err(PlanViolation::UnknownTool {
                step: n,
                tool: tool.as_str().map_or_else(|| tool.to_string(), str::to_string),
            });
        }
        if raw_step.get("parameters").is_none() {
            return Err(PlanViolation::MissingParameters(n));
        }
        let step: Step =
            serde_json::from_value(raw_step.clone()).map_err(|e| PlanViolation::MalformedStep {
                step: n,
                reason: e.to_string(),
            })?;
        steps.push(step);
    }

    let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
    Ok(Plan {
        task_understanding: text("task_understanding"),
        steps,
        expected_output: text("expected_output"),
    })
}
