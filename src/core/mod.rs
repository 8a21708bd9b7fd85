//! 核心编排层：错误类型、组件装配、流水线编排

pub mod builder;
pub mod error;
pub mod orchestrator;

pub use builder::{build_orchestrator, build_tool_registry, create_llm_from_config};
pub use error::{AgentError, PlanError, PlanViolation};
pub use orchestrator::Orchestrator;
