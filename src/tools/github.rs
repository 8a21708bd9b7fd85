//! GitHub 工具：仓库搜索、仓库详情、用户信息
//!
//! 调用 GitHub REST v3；可选 token 提高速率限制。缺参数、未知 action、HTTP 错误都以 ToolOutput::fail 报告。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde_json::{json, Map, Value};

use crate::config::GithubSection;
use crate::tools::{param_str, param_u64, Tool, ToolError, ToolOutput};

const USER_AGENT: &str = "AI-Ops-Assistant";
const HTTP_TIMEOUT_SECS: u64 = 10;

/// GitHub 工具
pub struct GitHubTool {
    client: Client,
    base_url: String,
    default_limit: u64,
}

impl GitHubTool {
    pub fn new(base_url: impl Into<String>, token: Option<&str>, default_limit: u64) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            match HeaderValue::from_str(&format!("token {token}")) {
                Ok(v) => {
                    headers.insert(AUTHORIZATION, v);
                }
                Err(_) => tracing::warn!("GITHUB_TOKEN contains invalid header characters, ignored"),
            }
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_limit,
        }
    }

    /// 从 [tools.github] 构建；配置未给 token 时读取 GITHUB_TOKEN
    pub fn from_config(cfg: &GithubSection) -> Self {
        let token = cfg
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok());
        Self::new(cfg.base_url.clone(), token.as_deref(), cfg.default_limit)
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ToolError> {
        let url = format!("{}{}", self.base_url, path);
        let value = self
            .client
            .get(url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        Ok(value)
    }

    async fn search_repos(&self, query: &str, limit: u64) -> Result<ToolOutput, ToolError> {
        if query.is_empty() {
            return Ok(ToolOutput::fail("Query is required"));
        }
        let data = self
            .get_json(
                "/search/repositories",
                &[
                    ("q", query.to_string()),
                    ("sort", "stars".to_string()),
                    ("order", "desc".to_string()),
                    ("per_page", limit.to_string()),
                ],
            )
            .await?;

        let repositories: Vec<Value> = data
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| {
                        json!({
                            "name": item["name"],
                            "full_name": item["full_name"],
                            "description": or_default(&item["description"], "No description"),
                            "stars": item["stargazers_count"],
                            "forks": item["forks_count"],
                            "language": or_default(&item["language"], "Unknown"),
                            "url": item["html_url"],
                            "owner": item["owner"]["login"],
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(ToolOutput::ok(json!({
            "total_count": data.get("total_count").cloned().unwrap_or(json!(0)),
            "repositories": repositories,
        })))
    }

    async fn get_repo(&self, owner: &str, repo: &str) -> Result<ToolOutput, ToolError> {
        if owner.is_empty() || repo.is_empty() {
            return Ok(ToolOutput::fail("Owner and repo are required"));
        }
        let data = self.get_json(&format!("/repos/{owner}/{repo}"), &[]).await?;
        Ok(ToolOutput::ok(json!({
            "name": data["name"],
            "full_name": data["full_name"],
            "description": or_default(&data["description"], "No description"),
            "stars": data["stargazers_count"],
            "forks": data["forks_count"],
            "watchers": data["watchers_count"],
            "language": or_default(&data["language"], "Unknown"),
            "url": data["html_url"],
            "created_at": data["created_at"],
            "updated_at": data["updated_at"],
            "topics": data.get("topics").cloned().unwrap_or(json!([])),
            "license": data["license"]["name"],
        })))
    }

    async fn get_user(&self, username: &str) -> Result<ToolOutput, ToolError> {
        if username.is_empty() {
            return Ok(ToolOutput::fail("Username is required"));
        }
        let data = self.get_json(&format!("/users/{username}"), &[]).await?;
        Ok(ToolOutput::ok(json!({
            "login": data["login"],
            "name": or_default(&data["name"], "N/A"),
            "bio": or_default(&data["bio"], "No bio"),
            "public_repos": data["public_repos"],
            "followers": data["followers"],
            "following": data["following"],
            "location": or_default(&data["location"], "Unknown"),
            "company": or_default(&data["company"], "N/A"),
            "blog": or_default(&data["blog"], ""),
            "url": data["html_url"],
            "created_at": data["created_at"],
        })))
    }
}

/// null / 缺失字段回退为默认文本
fn or_default(v: &Value, default: &str) -> Value {
    if v.is_null() {
        Value::String(default.to_string())
    } else {
        v.clone()
    }
}

#[async_trait]
impl Tool for GitHubTool {
    fn name(&self) -> &str {
        "github"
    }

    fn description(&self) -> &str {
        "Search GitHub repositories, get repository details, stars, and descriptions"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["search_repos", "get_repo", "get_user"],
                    "description": "Action to perform"
                },
                "query": {"type": "string", "description": "Search query for search_repos action"},
                "owner": {"type": "string", "description": "Repository owner for get_repo action"},
                "repo": {"type": "string", "description": "Repository name for get_repo action"},
                "username": {"type": "string", "description": "Username for get_user action"},
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results (default: 5)",
                    "default": 5
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, params: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let action = param_str(params, "action").unwrap_or_default();
        let result = match action {
            "search_repos" => {
                let limit = param_u64(params, "limit").unwrap_or(self.default_limit);
                self.search_repos(param_str(params, "query").unwrap_or_default(), limit)
                    .await
            }
            "get_repo" => {
                self.get_repo(
                    param_str(params, "owner").unwrap_or_default(),
                    param_str(params, "repo").unwrap_or_default(),
                )
                .await
            }
            "get_user" => {
                self.get_user(param_str(params, "username").unwrap_or_default())
                    .await
            }
            other => Ok(ToolOutput::fail(format!("Unknown action: {other}"))),
        };
        Ok(result.unwrap_or_else(|e| ToolOutput::fail(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    // 以下用例在发出请求前即返回，不触网
    #[tokio::test]
    async fn test_missing_arguments_reported() {
        let tool = GitHubTool::new("http://127.0.0.1:9", None, 5);

        let out = tool
            .execute(&params(json!({"action": "search_repos"})))
            .await
            .unwrap();
        assert_eq!(out, ToolOutput::fail("Query is required"));

        let out = tool
            .execute(&params(json!({"action": "get_repo", "owner": "rust-lang"})))
            .await
            .unwrap();
        assert_eq!(out.error.as_deref(), Some("Owner and repo are required"));

        let out = tool
            .execute(&params(json!({"action": "get_user"})))
            .await
            .unwrap();
        assert_eq!(out.error.as_deref(), Some("Username is required"));
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let tool = GitHubTool::new("http://127.0.0.1:9", None, 5);
        let out = tool
            .execute(&params(json!({"action": "delete_repo"})))
            .await
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.error.as_deref(), Some("Unknown action: delete_repo"));
    }

    #[tokio::test]
    async fn test_transport_error_is_reported_not_thrown() {
        let tool = GitHubTool::new("http://127.0.0.1:9", None, 5);
        let out = tool
            .execute(&params(json!({"action": "get_user", "username": "torvalds"})))
            .await
            .unwrap();
        assert!(!out.success);
        assert!(out.error.is_some());
    }

    #[test]
    fn test_or_default() {
        assert_eq!(or_default(&Value::Null, "N/A"), json!("N/A"));
        assert_eq!(or_default(&json!("x"), "N/A"), json!("x"));
    }
}
