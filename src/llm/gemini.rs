//! Gemini 客户端（OpenAI 兼容格式）
//!
//! Gemini 提供与 OpenAI 兼容的 chat completions 端点。
//! - Base URL: https://generativelanguage.googleapis.com/v1beta/openai/
//! - 默认模型: gemini-flash-lite-latest

use crate::llm::OpenAiClient;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";
pub const GEMINI_FLASH_LITE: &str = "gemini-flash-lite-latest";

/// 创建 Gemini 客户端；model 为 None 时使用 GEMINI_FLASH_LITE
pub fn create_gemini_client(api_key: &str, model: Option<&str>, timeout_secs: u64) -> OpenAiClient {
    let model = model.unwrap_or(GEMINI_FLASH_LITE);
    OpenAiClient::new(Some(GEMINI_BASE_URL), model, api_key, timeout_secs)
}
