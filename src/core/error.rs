//! 流水线错误类型
//!
//! PlanError 覆盖规划阶段的三类失败（空任务 / 模型调用 / 结构校验），出现即终止流水线；
//! 执行与校验阶段的失败不走错误通道，而是记录在各自的结果结构中。

use thiserror::Error;

use crate::llm::LlmError;

/// Plan 结构校验失败（step 序号从 1 开始）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanViolation {
    #[error("Plan is not a valid object")]
    NotAnObject,

    #[error("Plan has no steps")]
    MissingSteps,

    #[error("Plan has empty steps")]
    EmptySteps,

    #[error("Step {0} has no tool specified")]
    MissingTool(usize),

    #[error("Step {step} uses unknown tool: {tool}")]
    UnknownTool { step: usize, tool: String },

    #[error("Step {0} has no parameters")]
    MissingParameters(usize),

    #[error("Step {step} is malformed: {reason}")]
    MalformedStep { step: usize, reason: String },
}

/// 规划阶段错误
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("No task provided")]
    EmptyTask,

    #[error("Planning failed: {0}")]
    Generation(#[from] LlmError),

    #[error(transparent)]
    Invalid(#[from] PlanViolation),
}

/// 编排层错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Planning failed: {0}")]
    Planning(#[from] PlanError),

    #[error("Config error: {0}")]
    ConfigError(String),
}
