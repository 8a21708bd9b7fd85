//! 流水线过程事件：CLI verbose 输出与其它前端按需渲染

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::pipeline::Plan;

/// 阶段检查点事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// 开始规划
    PlanningStarted { task: String },
    /// 规划成功
    PlanCreated { plan: Plan },
    /// 规划失败，流水线终止
    PlanningFailed { error: String },
    /// 开始执行（共 total 步）
    ExecutionStarted { total: usize },
    /// 某步一次尝试失败，即将重试
    StepRetry {
        step_number: Option<Value>,
        attempt: u32,
        max_attempts: u32,
        error: String,
    },
    /// 某步结束（成功或耗尽重试）
    StepCompleted {
        step_number: Option<Value>,
        description: String,
        success: bool,
        error: Option<String>,
    },
    /// 开始校验与格式化
    VerificationStarted,
    /// 模型格式化失败，改用本地格式化
    FallbackFormatting { reason: String },
    /// 最终回复就绪
    FinalResponseReady { success: bool },
}

/// 带任务 run_id 的事件；同一发送端被并发任务共享时据此区分
#[derive(Debug, Clone, Serialize)]
pub struct TaskEvent {
    pub run_id: String,
    #[serde(flatten)]
    pub event: PipelineEvent,
}

/// 单次任务的事件出口：共享的发送端 + 本次 run_id
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<TaskEvent>,
    run_id: String,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<TaskEvent>, run_id: impl Into<String>) -> Self {
        Self {
            tx,
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

/// 可选事件出口；接收端已关闭时静默丢弃
pub(crate) fn emit(sink: Option<&EventSink>, event: PipelineEvent) {
    if let Some(sink) = sink {
        let _ = sink.tx.send(TaskEvent {
            run_id: sink.run_id.clone(),
            event,
        });
    }
}
