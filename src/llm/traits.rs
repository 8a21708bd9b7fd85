//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Gemini / Mock）实现 LlmClient::complete；
//! generate（纯文本）与 generate_json（结构化）是建立在 complete 之上的默认方法，流水线只依赖这两个。

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::llm::Message;

/// 追加在结构化请求末尾的格式约束
const JSON_ONLY_SUFFIX: &str = "Respond ONLY with valid JSON, no markdown or extra text.";

/// 模型调用错误：传输失败、超时、返回内容无法解析
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM API error: {0}")]
    ApiError(String),

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("Failed to parse JSON response: {reason}\nResponse: {response}")]
    InvalidJson { reason: String, response: String },
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }

    /// 文本生成：可选 system 指令 + 单条 user prompt
    async fn generate(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
    ) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_instruction {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(prompt));
        self.complete(&messages).await
    }

    /// 结构化生成：要求模型只输出 JSON，容忍 ```json 代码块包裹
    async fn generate_json(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
    ) -> Result<Value, LlmError> {
        let full_prompt = format!("{prompt}\n\n{JSON_ONLY_SUFFIX}");
        let response = self.generate(&full_prompt, system_instruction).await?;
        parse_json_response(&response)
    }
}

/// 去掉首尾的 ```json / ``` 围栏
pub fn strip_code_fence(text: &str) -> &str {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}

/// 解析模型返回的 JSON 文本
pub fn parse_json_response(response: &str) -> Result<Value, LlmError> {
    serde_json::from_str(strip_code_fence(response)).map_err(|e| LlmError::InvalidJson {
        reason: e.to_string(),
        response: response.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_json_response_error_keeps_raw() {
        let err = parse_json_response("not json at all").unwrap_err();
        match err {
            LlmError::InvalidJson { response, .. } => assert_eq!(response, "not json at all"),
            other => panic!("Expected InvalidJson, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_json_fenced() {
        let llm = MockLlmClient::new();
        llm.push_ok("```json\n{\"steps\": []}\n```");
        let value = llm.generate_json("plan it", Some("sys")).await.unwrap();
        assert!(value["steps"].as_array().unwrap().is_empty());

        let prompts = llm.prompts();
        assert!(prompts[0].ends_with(JSON_ONLY_SUFFIX));
        assert_eq!(llm.system_prompts()[0].as_deref(), Some("sys"));
    }
}
