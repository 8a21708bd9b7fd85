//! Weather 工具：Open-Meteo 地理编码 + 当前天气 / 7 日预报（免 API Key）

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};

use crate::config::WeatherSection;
use crate::tools::{param_str, Tool, ToolError, ToolOutput};

const HTTP_TIMEOUT_SECS: u64 = 10;

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,precipitation,weather_code,wind_speed_10m,wind_direction_10m";
const DAILY_FIELDS: &str =
    "temperature_2m_max,temperature_2m_min,precipitation_sum,weather_code,wind_speed_10m_max";

/// 地理编码结果
#[derive(Debug, Clone, PartialEq)]
struct Coordinates {
    lat: f64,
    lon: f64,
    name: String,
    country: String,
    timezone: String,
}

impl Coordinates {
    fn from_result(r: &Value) -> Option<Self> {
        Some(Self {
            lat: r.get("latitude")?.as_f64()?,
            lon: r.get("longitude")?.as_f64()?,
            name: r.get("name")?.as_str()?.to_string(),
            country: r
                .get("country")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string(),
            timezone: r
                .get("timezone")
                .and_then(Value::as_str)
                .unwrap_or("UTC")
                .to_string(),
        })
    }

    fn location_json(&self) -> Value {
        json!({
            "city": self.name,
            "country": self.country,
            "coordinates": {"lat": self.lat, "lon": self.lon}
        })
    }
}

/// Weather 工具
pub struct WeatherTool {
    client: Client,
    geocoding_url: String,
    forecast_url: String,
}

impl WeatherTool {
    pub fn new(geocoding_url: impl Into<String>, forecast_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            client,
            geocoding_url: geocoding_url.into(),
            forecast_url: forecast_url.into(),
        }
    }

    pub fn from_config(cfg: &WeatherSection) -> Self {
        Self::new(cfg.geocoding_url.clone(), cfg.forecast_url.clone())
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, ToolError> {
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

    /// 城市名 → 坐标；指定 country 时优先匹配 country_code
    async fn geocode(
        &self,
        city: &str,
        country: Option<&str>,
    ) -> Result<Option<Coordinates>, ToolError> {
        let data = self
            .get_json(
                &self.geocoding_url,
                &[
                    ("name", city.to_string()),
                    ("count", "1".to_string()),
                    ("language", "en".to_string()),
                    ("format", "json".to_string()),
                ],
            )
            .await?;
        let results = data
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(pick_result(&results, country))
    }

    async fn current(&self, coords: &Coordinates) -> Result<ToolOutput, ToolError> {
        let data = self
            .get_json(
                &self.forecast_url,
                &[
                    ("latitude", coords.lat.to_string()),
                    ("longitude", coords.lon.to_string()),
                    ("current", CURRENT_FIELDS.to_string()),
                    ("timezone", coords.timezone.clone()),
                ],
            )
            .await?;
        let current = &data["current"];
        let code = current["weather_code"].as_i64();
        Ok(ToolOutput::ok(json!({
            "location": coords.location_json(),
            "current": {
                "temperature": current["temperature_2m"],
                "temperature_unit": "°C",
                "feels_like": current["apparent_temperature"],
                "humidity": current["relative_humidity_2m"],
                "humidity_unit": "%",
                "precipitation": current["precipitation"],
                "precipitation_unit": "mm",
                "wind_speed": current["wind_speed_10m"],
                "wind_speed_unit": "km/h",
                "wind_direction": current["wind_direction_10m"],
                "weather_code": current["weather_code"],
                "weather_description": weather_description(code),
            }
        })))
    }

    async fn forecast(&self, coords: &Coordinates) -> Result<ToolOutput, ToolError> {
        let data = self
            .get_json(
                &self.forecast_url,
                &[
                    ("latitude", coords.lat.to_string()),
                    ("longitude", coords.lon.to_string()),
                    ("daily", DAILY_FIELDS.to_string()),
                    ("timezone", coords.timezone.clone()),
                ],
            )
            .await?;
        let daily = &data["daily"];
        let dates = daily["time"].as_array().cloned().unwrap_or_default();
        // 各数组长度可能不一致，越界取 null
        let at = |key: &str, i: usize| daily[key].get(i).cloned().unwrap_or(Value::Null);

        let days: Vec<Value> = dates
            .iter()
            .enumerate()
            .map(|(i, date)| {
                let code = at("weather_code", i);
                json!({
                    "date": date,
                    "temp_max": at("temperature_2m_max", i),
                    "temp_min": at("temperature_2m_min", i),
                    "precipitation": at("precipitation_sum", i),
                    "wind_speed_max": at("wind_speed_10m_max", i),
                    "weather_description": weather_description(code.as_i64()),
                    "weather_code": code,
                })
            })
            .collect();

        Ok(ToolOutput::ok(json!({
            "location": coords.location_json(),
            "forecast": days,
            "units": {"temperature": "°C", "precipitation": "mm", "wind_speed": "km/h"}
        })))
    }

    async fn run(
        &self,
        action: &str,
        city: &str,
        country: Option<&str>,
    ) -> Result<ToolOutput, ToolError> {
        let Some(coords) = self.geocode(city, country).await? else {
            return Ok(ToolOutput::fail(format!("Could not find city: {city}")));
        };
        match action {
            "current" => self.current(&coords).await,
            "forecast" => self.forecast(&coords).await,
            other => Ok(ToolOutput::fail(format!("Unknown action: {other}"))),
        }
    }
}

fn pick_result(results: &[Value], country: Option<&str>) -> Option<Coordinates> {
    if let Some(country) = country {
        let matched = results.iter().find(|r| {
            r.get("country_code")
                .and_then(Value::as_str)
                .is_some_and(|cc| cc.eq_ignore_ascii_case(country))
        });
        if let Some(c) = matched.and_then(Coordinates::from_result) {
            return Some(c);
        }
    }
    results.first().and_then(Coordinates::from_result)
}

/// WMO 天气代码 → 描述
pub fn weather_description(code: Option<i64>) -> String {
    let Some(code) = code else {
        return "Unknown".to_string();
    };
    let text = match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Foggy",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow",
        73 => "Moderate snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        other => return format!("Unknown (code: {other})"),
    };
    text.to_string()
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Get current weather and forecast for any city worldwide"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["current", "forecast"],
                    "description": "Action to perform: 'current' for current weather, 'forecast' for 7-day forecast"
                },
                "city": {"type": "string", "description": "City name to get weather for"},
                "country": {
                    "type": "string",
                    "description": "Optional country code (e.g., 'US', 'IN', 'UK') to disambiguate city names"
                }
            },
            "required": ["action", "city"]
        })
    }

    async fn execute(&self, params: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let action = param_str(params, "action").unwrap_or("current");
        let city = param_str(params, "city").unwrap_or_default();
        if city.is_empty() {
            return Ok(ToolOutput::fail("City name is required"));
        }
        let country = param_str(params, "country");
        Ok(self
            .run(action, city, country)
            .await
            .unwrap_or_else(|e| ToolOutput::fail(e.to_string())))
    }
}
