//! 流水线数据模型：Plan / Step / StepOutcome / ExecutionResult / CompletenessAnalysis / TaskResult
//!
//! 每个阶段构造并拥有自己的输出，后续阶段只读。

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// 规划结果：有序步骤，每步绑定一个工具
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Plan {
    /// 对用户意图的简述
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_understanding: Option<String>,
    pub steps: Vec<Step>,
    /// 最终结果应包含的内容
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
}

/// 单个计划步骤
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Step {
    /// 模型给出的序号，原样回显（数字或字符串均可），不重新编号
    #[serde(default)]
    pub step_number: Option<Value>,
    #[serde(default = "default_description", deserialize_with = "description_or_default")]
    pub description: String,
    /// 工具名，必须已注册
    pub tool: String,
    /// 工具参数，仅由对应工具解释
    pub parameters: Map<String, Value>,
}

fn default_description() -> String {
    "No description".to_string()
}

/// null 视同缺失；非字符串按 JSON 文本保留
fn description_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => default_description(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

impl Step {
    pub fn new(step_number: u64, description: impl Into<String>, tool: impl Into<String>, parameters: Value) -> Self {
        Self {
            step_number: Some(Value::from(step_number)),
            description: description.into(),
            tool: tool.into(),
            parameters: match parameters {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }
}

/// 序号显示：字符串去引号，缺失或 null 时为 "?"
pub fn step_label(step_number: Option<&Value>) -> String {
    match step_number {
        None | Some(Value::Null) => "?".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Plan 结构的 JSON Schema，拼入规划 prompt
pub fn plan_schema_json() -> String {
    let schema = schema_for!(Plan);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// 单步执行结果：success 为 true 时 data 有意义，否则 error 有意义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_number: Option<Value>,
    pub description: String,
    pub tool: String,
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn succeeded(step: &Step, data: Option<Value>) -> Self {
        Self {
            step_number: step.step_number.clone(),
            description: step.description.clone(),
            tool: step.tool.clone(),
            success: true,
            data,
            error: None,
        }
    }

    pub fn failed(step: &Step, error: impl Into<String>) -> Self {
        Self {
            step_number: step.step_number.clone(),
            description: step.description.clone(),
            tool: step.tool.clone(),
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Plan 中的说明性字段，执行阶段原样回显给校验阶段
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanContext {
    pub task_understanding: String,
    pub expected_output: String,
}

impl From<&Plan> for PlanContext {
    fn from(plan: &Plan) -> Self {
        Self {
            task_understanding: plan.task_understanding.clone().unwrap_or_default(),
            expected_output: plan.expected_output.clone().unwrap_or_default(),
        }
    }
}

/// 执行阶段输出：results 与 plan.steps 一一对应、顺序一致
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub results: Vec<StepOutcome>,
    pub plan_context: PlanContext,
    pub error: Option<String>,
}

/// 失败步骤条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub step: Option<Value>,
    pub description: String,
    pub error: Option<String>,
}

/// 完整性分析（派生值，不持久化）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessAnalysis {
    pub complete: bool,
    pub successful_steps: usize,
    pub total_steps: usize,
    /// 百分比；total_steps 为 0 时为 0
    pub success_rate: f64,
    pub issues: Vec<Issue>,
}

impl CompletenessAnalysis {
    pub fn from_outcomes(results: &[StepOutcome]) -> Self {
        let total_steps = results.len();
        let successful_steps = results.iter().filter(|r| r.success).count();
        let issues = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| Issue {
                step: r.step_number.clone(),
                description: r.description.clone(),
                error: r.error.clone(),
            })
            .collect();
        let success_rate = if total_steps > 0 {
            successful_steps as f64 / total_steps as f64 * 100.0
        } else {
            0.0
        };

        Self {
            complete: successful_steps == total_steps,
            successful_steps,
            total_steps,
            success_rate,
            issues,
        }
    }
}

/// 校验阶段输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub success: bool,
    pub final_response: String,
    pub issues: Vec<Issue>,
    pub raw_results: Vec<StepOutcome>,
    pub error: Option<String>,
}

/// 顶层结果信封：每次调用新建，逐阶段填充，返回后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task: String,
    pub success: bool,
    pub response: Option<String>,
    pub plan: Option<Plan>,
    pub execution_results: Option<Vec<StepOutcome>>,
    pub error: Option<String>,
}

impl TaskResult {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            success: false,
            response: None,
            plan: None,
            execution_results: None,
            error: None,
        }
    }
}
