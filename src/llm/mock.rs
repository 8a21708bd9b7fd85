//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序弹出预置回复；队列耗尽时返回 ApiError。记录调用次数与每次的 user / system 内容，便于断言。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, Message, Role};

/// Mock 客户端：脚本化回复
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    system_prompts: Mutex<Vec<Option<String>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以一组成功回复构造
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::new();
        for r in responses {
            client.push_ok(r);
        }
        client
    }

    pub fn push_ok(&self, response: impl Into<String>) {
        if let Ok(mut q) = self.responses.lock() {
            q.push_back(Ok(response.into()));
        }
    }

    pub fn push_err(&self, err: LlmError) {
        if let Ok(mut q) = self.responses.lock() {
            q.push_back(Err(err));
        }
    }

    /// complete 被调用的次数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 每次调用中最后一条 user 消息
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// 每次调用中的 system 消息（无则 None）
    pub fn system_prompts(&self) -> Vec<Option<String>> {
        self.system_prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let system = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone());
        if let Ok(mut p) = self.prompts.lock() {
            p.push(last_user);
        }
        if let Ok(mut s) = self.system_prompts.lock() {
            s.push(system);
        }

        self.responses
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| Err(LlmError::ApiError("mock: no scripted response".to_string())))
    }
}
