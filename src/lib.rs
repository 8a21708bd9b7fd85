//! AI Operations Assistant - 规划 / 执行 / 校验 三阶段智能体流水线
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、组件装配、编排器
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Gemini / Mock）
//! - **observability**: 日志初始化
//! - **pipeline**: Planner、Executor、Verifier 与数据模型
//! - **tools**: 工具注册表、执行器，以及 GitHub / Weather 工具
//! - **server**: HTTP API（feature `web`）

pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod pipeline;
#[cfg(feature = "web")]
pub mod server;
pub mod tools;

pub use crate::core::{build_orchestrator, AgentError, Orchestrator};
pub use crate::pipeline::{PipelineEvent, TaskEvent, TaskResult};
