//! `get_weather`: Open-Meteo forecast passthrough.

use std::sync::Arc;

use crate::error::LuminaryError;
use crate::provider::http::status_to_error;
use crate::tools::{AgentTool, AgentToolParameters, Tool, ToolExecutionContext};

/// Create the `get_weather` tool.
///
/// Returns the provider payload unchanged: current and hourly temperature
/// plus daily sunrise/sunset in the location's own timezone.
pub fn get_weather_tool(client: reqwest::Client, endpoint: &str) -> Arc<dyn Tool> {
    let endpoint = endpoint.to_string();
    Arc::new(AgentTool::new(
        "get_weather",
        "Get the current weather at a location. Ask for location first if not given.",
        AgentToolParameters::object()
            .number_in_range("latitude", "Latitude in degrees", -90.0, 90.0, true)
            .number_in_range("longitude", "Longitude in degrees", -180.0, 180.0, true)
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let client = client.clone();
            let endpoint = endpoint.clone();
            async move {
                let latitude = args.get_f64("latitude")?;
                let longitude = args.get_f64("longitude")?;

                let response = client
                    .get(&endpoint)
                    .query(&[
                        ("latitude", latitude.to_string()),
                        ("longitude", longitude.to_string()),
                        ("current", "temperature_2m".to_string()),
                        ("hourly", "temperature_2m".to_string()),
                        ("daily", "sunrise,sunset".to_string()),
                        ("timezone", "auto".to_string()),
                    ])
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    let err = status_to_error(status.as_u16(), &body);
                    return Err(LuminaryError::tool("get_weather", err.to_string()));
                }
                Ok(response.json::<serde_json::Value>().await?)
            }
        },
    ))
}
