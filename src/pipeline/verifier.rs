//! Verifier：完整性分析 + 最终回复格式化
//!
//! 优先请模型整理回复；模型调用失败时退回本地确定性格式化（无 I/O，不会失败）。

use std::sync::Arc;

use serde_json::Value;

use crate::llm::LlmClient;
use crate::pipeline::events::{emit, EventSink, PipelineEvent};
use crate::pipeline::{step_label, CompletenessAnalysis, Plan, StepOutcome, Verification};

const VERIFIER_SYSTEM_PROMPT: &str = "You are a response formatting agent. Your job is to take raw execution results and create a clear, well-formatted response for the user.

Guidelines:
- Be concise but comprehensive
- Highlight key information
- Use clear formatting (bullet points, sections)
- If there were failures, explain what happened
- Make the response easy to understand";

/// Verifier
pub struct Verifier {
    llm: Arc<dyn LlmClient>,
    data_preview_chars: usize,
}

impl Verifier {
    pub fn new(llm: Arc<dyn LlmClient>, data_preview_chars: usize) -> Self {
        Self {
            llm,
            data_preview_chars,
        }
    }

    pub async fn verify(
        &self,
        original_task: &str,
        plan: &Plan,
        results: &[StepOutcome],
        events: Option<&EventSink>,
    ) -> Verification {
        let analysis = CompletenessAnalysis::from_outcomes(results);
        tracing::info!(
            successful = analysis.successful_steps,
            total = analysis.total_steps,
            "completeness analysed"
        );

        let prompt = self.build_prompt(original_task, plan, results, &analysis);
        let final_response = match self.llm.generate(&prompt, Some(VERIFIER_SYSTEM_PROMPT)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "response formatting failed, using fallback");
                emit(events, PipelineEvent::FallbackFormatting { reason: e.to_string() });
                fallback_format(original_task, results, &analysis)
            }
        };

        Verification {
            success: analysis.complete,
            final_response,
            error: (!analysis.complete).then(|| "Some data may be incomplete".to_string()),
            issues: analysis.issues,
            raw_results: results.to_vec(),
        }
    }

    fn build_prompt(
        &self,
        original_task: &str,
        plan: &Plan,
        results: &[StepOutcome],
        analysis: &CompletenessAnalysis,
    ) -> String {
        format!(
            "Original Task: {original_task}\n\n\
             Task Understanding: {understanding}\n\
             Expected Output: {expected}\n\n\
             Execution Results:\n{summary}\n\n\
             Analysis:\n\
             - Success Rate: {rate:.1}%\n\
             - Completed: {ok}/{total} steps\n\
             - Issues: {issues}\n\n\
             Please create a clear, formatted response that:\n\
             1. Summarizes what was requested\n\
             2. Presents the key findings/data\n\
             3. Notes any issues or incomplete data\n\
             4. Is easy for a human to read and understand\n\n\
             Format the response nicely with sections and bullet points where appropriate.",
            understanding = plan.task_understanding.as_deref().unwrap_or("N/A"),
            expected = plan.expected_output.as_deref().unwrap_or("N/A"),
            summary = build_results_summary(results, self.data_preview_chars),
            rate = analysis.success_rate,
            ok = analysis.successful_steps,
            total = analysis.total_steps,
            issues = analysis.issues.len(),
        )
    }
}

/// null / 空串 / 空数组 / 空对象视为无数据
fn has_data(data: Option<&Value>) -> bool {
    match data {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(_) => true,
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// 给模型看的逐步摘要：成功步骤附截断后的数据，失败步骤附错误
pub fn build_results_summary(results: &[StepOutcome], max_chars: usize) -> String {
    results
        .iter()
        .map(|r| {
            let marker = if r.success { "✓" } else { "✗" };
            let mut part = format!("Step {} [{marker}]: {}", step_label(r.step_number.as_ref()), r.description);
            if r.success {
                if let Some(data) = r.data.as_ref().filter(|d| has_data(Some(d))) {
                    part.push_str(&format!("\n  Data: {}", truncate_chars(&data.to_string(), max_chars)));
                }
            } else {
                part.push_str(&format!(
                    "\n  Error: {}",
                    r.error.as_deref().unwrap_or("Unknown error")
                ));
            }
            part
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 本地格式化：横幅、任务、状态、成功率、逐步结果、问题列表
pub fn fallback_format(
    original_task: &str,
    results: &[StepOutcome],
    analysis: &CompletenessAnalysis,
) -> String {
    let banner = "=".repeat(50);
    let rule = "-".repeat(30);
    let mut lines = vec![
        banner.clone(),
        "AI Operations Assistant - Results".to_string(),
        banner,
        String::new(),
        format!("Task: {original_task}"),
        String::new(),
        format!(
            "Status: {}",
            if analysis.complete { "Complete" } else { "Partial" }
        ),
        format!("Success Rate: {:.1}%", analysis.success_rate),
        String::new(),
        "Results:".to_string(),
        rule.clone(),
    ];

    for r in results {
        lines.push(format!("\nStep {}: {}", step_label(r.step_number.as_ref()), r.description));
        lines.push(format!("Status: {}", if r.success { "SUCCESS" } else { "FAILED" }));
        if r.success {
            if let Some(data) = r.data.as_ref().filter(|d| has_data(Some(d))) {
                lines.push(format!("Data: {data}"));
            }
        } else {
            lines.push(format!("Error: {}", r.error.as_deref().unwrap_or("Unknown error")));
        }
    }

    if !analysis.issues.is_empty() {
        lines.extend([String::new(), "Issues:".to_string(), rule]);
        for issue in &analysis.issues {
            lines.push(format!(
                "- Step {}: {}",
                step_label(issue.step.as_ref()),
                issue.error.as_deref().unwrap_or("Unknown error")
            ));
        }
    }

    lines.join("\n")
}
