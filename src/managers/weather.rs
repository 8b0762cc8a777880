use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::errors::ToolError;
use crate::managers::render::{display, field, settle};
use crate::mcp::catalog::ToolDescriptor;
use crate::mcp::content::ToolResult;
use crate::mcp::schema::{FieldKind, FieldSpec, ParameterSchema};
use crate::services::config::Config;
use crate::services::dispatcher::ToolHandler;
use crate::services::upstream::{endpoint, Upstream, UpstreamRequest};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    fn temperature_symbol(self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    fn speed_symbol(self) -> &'static str {
        match self {
            Units::Metric => "m/s",
            Units::Imperial => "mph",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    City(String),
    Coordinates { lat: f64, lon: f64 },
}

#[derive(Debug, Deserialize)]
struct WeatherArgs {
    city: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    units: Units,
}

impl Location {
    /// A city name wins over coordinates when both are given.
    fn resolve(city: Option<String>, lat: Option<f64>, lon: Option<f64>) -> Result<Self, ToolError> {
        if let Some(city) = city.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()) {
            return Ok(Location::City(city));
        }
        match (lat, lon) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                    return Err(ToolError::invalid_params(format!(
                        "Coordinates out of range: lat={}, lon={}",
                        lat, lon
                    )));
                }
                Ok(Location::Coordinates { lat, lon })
            }
            _ => Err(ToolError::invalid_params(
                "Either city or both lat and lon are required for get_weather",
            )),
        }
    }

    fn label(&self) -> String {
        match self {
            Location::City(city) => city.clone(),
            Location::Coordinates { lat, lon } => format!("{}, {}", lat, lon),
        }
    }
}

pub struct WeatherLookup {
    config: Arc<Config>,
    upstream: Arc<dyn Upstream>,
}

impl WeatherLookup {
    pub fn new(config: Arc<Config>, upstream: Arc<dyn Upstream>) -> Self {
        Self { config, upstream }
    }

    fn build_request(&self, location: &Location, units: Units) -> Result<UpstreamRequest, ToolError> {
        let api_key = self
            .config
            .weather_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ToolError::config("OPENWEATHER_API_KEY is not configured")
                    .with_hint("Export OPENWEATHER_API_KEY before starting relay.")
            })?;
        let mut request = UpstreamRequest::get(endpoint(&self.config.weather_base_url, &["weather"])?);
        request = match location {
            Location::City(city) => request.with_query("q", city.as_str()),
            Location::Coordinates { lat, lon } => request
                .with_query("lat", lat.to_string())
                .with_query("lon", lon.to_string()),
        };
        Ok(request
            .with_query("appid", api_key)
            .with_query("units", units.as_str()))
    }
}

pub fn render_weather(location: &Location, units: Units, payload: &Value) -> Result<String, ToolError> {
    let name = payload
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| location.label());
    let place = match payload.pointer("/sys/country").and_then(Value::as_str) {
        Some(country) if !country.is_empty() => format!("{}, {}", name, country),
        _ => name,
    };
    let condition = payload
        .pointer("/weather/0/description")
        .or_else(|| payload.pointer("/weather/0/main"));
    let temp = units.temperature_symbol();
    let mut out = format!("**Weather for {}**\n\n", place);
    out.push_str(&format!("• Condition: {}\n", display(condition, "Unknown")));
    out.push_str(&format!(
        "• Temperature: {}{} (feels like {}{})\n",
        display(payload.pointer("/main/temp"), "N/A"),
        temp,
        display(payload.pointer("/main/feels_like"), "N/A"),
        temp,
    ));
    out.push_str(&format!(
        "• Humidity: {}%\n",
        display(payload.pointer("/main/humidity"), "N/A")
    ));
    out.push_str(&format!(
        "• Wind: {} {}\n",
        payload
            .get("wind")
            .map(|wind| field(wind, "speed", "N/A"))
            .unwrap_or_else(|| "N/A".to_string()),
        units.speed_symbol(),
    ));
    out.push_str("\n**Raw response:**\n```json\n");
    out.push_str(&serde_json::to_string_pretty(payload)?);
    out.push_str("\n```");
    Ok(out)
}

#[async_trait]
impl ToolHandler for WeatherLookup {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "get_weather",
            "Current weather for a city or a latitude/longitude pair. Returns a short \
             summary followed by the raw upstream payload.",
            ParameterSchema::new()
                .field(FieldSpec::new("city", FieldKind::String, "City name, e.g. 'Paris' or 'Paris,FR'"))
                .field(FieldSpec::new("lat", FieldKind::Number, "Latitude (use together with lon)"))
                .field(FieldSpec::new("lon", FieldKind::Number, "Longitude (use together with lat)"))
                .field(
                    FieldSpec::new(
                        "units",
                        FieldKind::Enum(vec!["metric", "imperial"]),
                        "Unit system for temperature and wind",
                    )
                    .default_value(json!("metric")),
                )
                .one_of_groups(vec![vec!["city"], vec!["lat", "lon"]]),
        )
    }

    async fn handle(&self, args: Value) -> Result<ToolResult, ToolError> {
        let args: WeatherArgs = serde_json::from_value(args)
            .map_err(|err| ToolError::invalid_params(format!("Invalid get_weather arguments: {}", err)))?;
        let location = Location::resolve(args.city, args.lat, args.lon)?;
        let request = self.build_request(&location, args.units)?;
        let outcome = match self.upstream.send(request).await {
            Ok(payload) => render_weather(&location, args.units, &payload),
            Err(err) => Err(err.into()),
        };
        settle(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_takes_precedence_over_coordinates() {
        let location = Location::resolve(Some("Oslo".into()), Some(1.0), Some(2.0)).expect("location");
        assert_eq!(location, Location::City("Oslo".into()));
    }

    #[test]
    fn half_a_coordinate_pair_is_rejected() {
        let err = Location::resolve(None, Some(1.0), None).expect_err("invalid");
        assert!(err.message.contains("Either city or both lat and lon"));
        let err = Location::resolve(Some("  ".into()), None, None).expect_err("invalid");
        assert!(err.message.contains("city"));
        assert!(Location::resolve(None, Some(95.0), Some(0.0)).is_err());
    }

    #[test]
    fn imperial_units_change_symbols() {
        let payload = json!({
            "name": "Austin",
            "sys": {"country": "US"},
            "weather": [{"main": "Clear", "description": "clear sky"}],
            "main": {"temp": 90.1, "feels_like": 95, "humidity": 40},
            "wind": {"speed": 7.2}
        });
        let text = render_weather(&Location::City("Austin".into()), Units::Imperial, &payload)
            .expect("render");
        assert!(text.starts_with("**Weather for Austin, US**\n\n"));
        assert!(text.contains("• Condition: clear sky\n"));
        assert!(text.contains("• Temperature: 90.1°F (feels like 95°F)\n"));
        assert!(text.contains("• Humidity: 40%\n"));
        assert!(text.contains("• Wind: 7.2 mph\n"));
        assert!(text.contains("```json\n{\n"));
        assert!(text.ends_with("\n```"));
    }
}
