//! 流水线集成测试：Mock LLM + 本地 axum 假上游（Open-Meteo / GitHub）

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Query;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use ops_assistant::config::{load_config, AppConfig};
use ops_assistant::core::Orchestrator;
use ops_assistant::llm::{LlmError, MockLlmClient};
use ops_assistant::pipeline::{
    CompletenessAnalysis, Executor, Plan, Step, Verifier, MAX_RETRIES,
};
use ops_assistant::tools::{GitHubTool, ToolExecutor, ToolRegistry, WeatherTool};

/// 在随机端口上启动假上游，返回 base url
async fn spawn_upstream(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn fake_geocoding(Query(q): Query<std::collections::HashMap<String, String>>) -> Json<Value> {
    if q.get("name").map(String::as_str) == Some("Paris") {
        Json(json!({"results": [{
            "latitude": 48.85341,
            "longitude": 2.3488,
            "name": "Paris",
            "country": "France",
            "country_code": "FR",
            "timezone": "Europe/Paris"
        }]}))
    } else {
        Json(json!({}))
    }
}

async fn fake_forecast() -> Json<Value> {
    Json(json!({
        "current": {
            "temperature_2m": 18.2,
            "relative_humidity_2m": 64,
            "apparent_temperature": 17.5,
            "precipitation": 0.0,
            "weather_code": 2,
            "wind_speed_10m": 11.3,
            "wind_direction_10m": 250
        }
    }))
}

async fn weather_registry() -> Arc<ToolRegistry> {
    let base = spawn_upstream(
        Router::new()
            .route("/v1/search", get(fake_geocoding))
            .route("/v1/forecast", get(fake_forecast)),
    )
    .await;
    let mut registry = ToolRegistry::new();
    registry.register(WeatherTool::new(
        format!("{base}/v1/search"),
        format!("{base}/v1/forecast"),
    ));
    Arc::new(registry)
}

fn executor(registry: Arc<ToolRegistry>) -> Executor {
    Executor::new(ToolExecutor::new(registry, 10), MAX_RETRIES)
}

#[tokio::test]
async fn test_weather_in_paris_end_to_end() {
    let registry = weather_registry().await;
    let llm = Arc::new(MockLlmClient::with_responses([
        r#"```json
{
  "task_understanding": "Current weather in Paris",
  "steps": [
    {"step_number": 1, "description": "Get current weather for Paris", "tool": "weather",
     "parameters": {"action": "current", "city": "Paris"}}
  ],
  "expected_output": "Temperature and conditions in Paris"
}
```"#,
        "## Weather in Paris\n- 18.2°C, partly cloudy",
    ]));
    let orch = Orchestrator::new(llm.clone(), registry, &AppConfig::default());

    let result = orch.process_task("What's the weather in Paris?", false).await;

    assert!(result.success, "unexpected failure: {:?}", result.error);
    let outcomes = result.execution_results.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].success);
    let data = outcomes[0].data.as_ref().unwrap();
    assert_eq!(data["current"]["temperature"], json!(18.2));
    assert_eq!(data["current"]["weather_description"], "Partly cloudy");
    assert_eq!(data["location"]["country"], "France");
    assert!(result.response.unwrap().contains("Paris"));

    // 格式化 prompt 中带有工具数据
    let prompts = llm.prompts();
    assert!(prompts[1].contains("Step 1 [✓]: Get current weather for Paris"));
    assert!(prompts[1].contains("\"temperature\":18.2"));
}

#[tokio::test]
async fn test_unknown_city_fails_after_retries() {
    let registry = weather_registry().await;
    let plan = Plan {
        steps: vec![Step::new(
            1,
            "Weather for Atlantis",
            "weather",
            json!({"action": "current", "city": "Atlantis"}),
        )],
        ..Plan::default()
    };
    let result = executor(registry).execute(&plan, None).await;
    assert!(!result.success);
    assert_eq!(
        result.results[0].error.as_deref(),
        Some("Failed after 3 attempts: Could not find city: Atlantis")
    );
}

#[tokio::test]
async fn test_nonexistent_tool_in_hand_built_plan() {
    let registry = weather_registry().await;
    let plan = Plan {
        task_understanding: Some("open a ticket".into()),
        steps: vec![Step::new(1, "Create ticket", "jira", json!({"title": "x"}))],
        expected_output: None,
    };

    let execution = executor(registry).execute(&plan, None).await;
    assert!(!execution.success);
    assert_eq!(execution.results.len(), 1);
    assert_eq!(execution.results[0].error.as_deref(), Some("Unknown tool: jira"));

    let analysis = CompletenessAnalysis::from_outcomes(&execution.results);
    assert!(!analysis.complete);
    assert_eq!(analysis.issues.len(), 1);

    let llm = Arc::new(MockLlmClient::new());
    llm.push_err(LlmError::ApiError("offline".into()));
    let verification = Verifier::new(llm, 500)
        .verify("open a ticket", &plan, &execution.results, None)
        .await;
    assert!(!verification.success);
    assert_eq!(verification.issues.len(), 1);
    assert!(verification.final_response.contains("Error: Unknown tool: jira"));
}

#[tokio::test]
async fn test_github_search_against_fake_api() {
    let base = spawn_upstream(Router::new().route(
        "/search/repositories",
        get(|Query(q): Query<std::collections::HashMap<String, String>>| async move {
            assert_eq!(q.get("sort").map(String::as_str), Some("stars"));
            Json(json!({
                "total_count": 1,
                "items": [{
                    "name": "axum",
                    "full_name": "tokio-rs/axum",
                    "description": null,
                    "stargazers_count": 20000,
                    "forks_count": 1000,
                    "language": "Rust",
                    "html_url": "https://github.com/tokio-rs/axum",
                    "owner": {"login": "tokio-rs"}
                }]
            }))
        }),
    ))
    .await;

    let mut registry = ToolRegistry::new();
    registry.register(GitHubTool::new(base, None, 5));
    let plan = Plan {
        steps: vec![Step::new(
            1,
            "Search web frameworks",
            "github",
            json!({"action": "search_repos", "query": "rust web framework", "limit": 3}),
        )],
        ..Plan::default()
    };
    let result = executor(Arc::new(registry)).execute(&plan, None).await;
    assert!(result.success);
    let data = result.results[0].data.as_ref().unwrap();
    assert_eq!(data["total_count"], 1);
    assert_eq!(data["repositories"][0]["full_name"], "tokio-rs/axum");
    assert_eq!(data["repositories"][0]["description"], "No description");
    assert_eq!(data["repositories"][0]["owner"], "tokio-rs");
}

#[test]
fn test_config_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "[pipeline]\nmax_retries = 5\n\n[server]\nport = 9100\n\n[tools.weather]\nforecast_url = \"http://localhost:1/forecast\""
    )
    .unwrap();

    let cfg = load_config(Some(path)).unwrap();
    assert_eq!(cfg.pipeline.max_retries, 5);
    assert_eq!(cfg.pipeline.data_preview_chars, 500);
    assert_eq!(cfg.server.port, 9100);
    assert_eq!(cfg.tools.weather.forecast_url, "http://localhost:1/forecast");
    assert_eq!(
        cfg.tools.weather.geocoding_url,
        "https://geocoding-api.open-meteo.com/v1/search"
    );
}
