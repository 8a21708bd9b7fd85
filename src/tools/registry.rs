//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找。
//! 注册表在启动时构建一次，之后只读，以 Arc 在 Planner 与 Executor 之间共享。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// 工具执行结果：success 为 true 时 data 有意义，否则 error 有意义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// 工具调用中的非预期失败（预期失败应通过 ToolOutput::fail 报告）
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Tool timed out after {0}s")]
    Timeout(u64),

    #[error("Tool panicked: {0}")]
    Panicked(String),
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（Plan 中 step.tool 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema（type / properties / required）
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具
    async fn execute(&self, params: &Map<String, Value>) -> Result<ToolOutput, ToolError>;
}

/// 工具注册表：保持注册顺序（用于生成 prompt），按名 O(1) 查找；重名时后注册者覆盖前者
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&pos) => {
                tracing::warn!(tool = %name, "duplicate tool name, replacing earlier registration");
                self.tools[pos] = tool;
            }
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&pos| self.tools[pos].clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 按注册顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    /// [{name, description, parameters}]，供 /tools 接口与 prompt 使用
    pub fn to_schema_json(&self) -> Value {
        Value::Array(
            self.tools
                .iter()
                .map(|tool| {
                    serde_json::json!({
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters_schema()
                    })
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, &'static str);

    #[async_trait]
    impl Tool for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            self.1
        }

        async fn execute(&self, _params: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::ok(Value::String(self.1.to_string())))
        }
    }

    #[test]
    fn test_registration_order_preserved() {
        let mut registry = ToolRegistry::new();
        registry.register(Named("weather", "w"));
        registry.register(Named("github", "g"));
        assert_eq!(registry.tool_names(), vec!["weather", "github"]);
        assert!(registry.contains("github"));
        assert!(registry.get("nope").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_last_wins() {
        let mut registry = ToolRegistry::new();
        registry.register(Named("echo", "first"));
        registry.register(Named("other", "x"));
        registry.register(Named("echo", "second"));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.tool_names(), vec!["echo", "other"]);

        let tool = registry.get("echo").unwrap();
        assert_eq!(tool.description(), "second");
        let out = tool.execute(&Map::new()).await.unwrap();
        assert_eq!(out.data, Some(Value::String("second".into())));
    }

    #[test]
    fn test_schema_json_shape() {
        let mut registry = ToolRegistry::new();
        registry.register(Named("echo", "Echo text"));
        let schema = registry.to_schema_json();
        assert_eq!(schema[0]["name"], "echo");
        assert_eq!(schema[0]["parameters"]["type"], "object");
    }
}
