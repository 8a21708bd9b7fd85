//! 规划 → 执行 → 校验 流水线
//!
//! - **planner**: 生成并校验 Plan
//! - **executor**: 逐步调用工具，有限次重试
//! - **verifier**: 完整性分析与最终回复格式化
//! - **events**: 阶段检查点事件
//! - **types**: 各阶段的数据结构

pub mod events;
pub mod executor;
pub mod planner;
pub mod types;
pub mod verifier;

/// 单步最多尝试次数
pub const MAX_RETRIES: u32 = 3;

/// 传给格式化模型的单步数据预览上限（字符数）
pub const DATA_PREVIEW_CHARS: usize = 500;

pub use events::{EventSink, PipelineEvent, TaskEvent};
pub use executor::Executor;
pub use planner::{validate_plan, Planner};
pub use types::{
    plan_schema_json, step_label, CompletenessAnalysis, ExecutionResult, Issue, Plan,
    PlanContext, Step, StepOutcome, TaskResult, Verification,
};
pub use verifier::{build_results_summary, fallback_format, Verifier};
