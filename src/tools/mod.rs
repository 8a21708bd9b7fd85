//! 工具箱：注册表、执行器与内置工具（github / weather）

pub mod executor;
pub mod github;
pub mod registry;
pub mod weather;

use serde_json::{Map, Value};

pub use executor::ToolExecutor;
pub use github::GitHubTool;
pub use registry::{Tool, ToolError, ToolOutput, ToolRegistry};
pub use weather::WeatherTool;

/// 取字符串参数
pub fn param_str<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

/// 取非负整数参数；模型偶尔把数字写成字符串，一并接受
pub fn param_u64(params: &Map<String, Value>, key: &str) -> Option<u64> {
    match params.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
