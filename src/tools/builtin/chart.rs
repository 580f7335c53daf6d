//! `generate_chart`: turns model-provided series into a chart payload.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::tools::{AgentTool, AgentToolParameters, Tool, ToolArguments, ToolExecutionContext};

const CHART_TYPES: &[&str] = &["line", "bar", "pie"];
const CHART_COLORS: &[&str] = &[
    "--color-chart-1",
    "--color-chart-2",
    "--color-chart-3",
    "--color-chart-4",
    "--color-chart-5",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartPoint {
    pub name: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AxisLabels {
    pub x: String,
    pub y: String,
}

#[derive(Debug, Deserialize)]
struct ChartRequest {
    #[serde(rename = "type")]
    chart_type: String,
    color: String,
    title: String,
    labels: AxisLabels,
    data: Vec<ChartPoint>,
}

/// Payload rendered by the client's chart component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartPayload {
    pub chart_type: String,
    pub data: Vec<ChartPoint>,
    pub color: String,
    pub title: String,
    pub labels: AxisLabels,
}

fn parameters() -> AgentToolParameters {
    AgentToolParameters::object()
        .string_enum("type", "Chart type", CHART_TYPES, true)
        .string_enum("color", "Chart color", CHART_COLORS, true)
        .string("title", "Chart title", true)
        .object(
            "labels",
            "Axis labels",
            AgentToolParameters::object()
                .string("x", "X-axis label", true)
                .string("y", "Y-axis label", true),
            true,
        )
        .array(
            "data",
            "Data points",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "value": { "type": ["number", "null"] }
                },
                "required": ["name", "value"]
            }),
            true,
        )
        .build()
}

fn build_chart(args: &ToolArguments) -> crate::error::Result<ChartPayload> {
    let request: ChartRequest = args.deserialize()?;
    if let Some(point) = request.data.iter().find(|p| p.name.trim().is_empty()) {
        return Err(crate::error::LuminaryError::tool(
            "generate_chart",
            format!("data point with empty name (value {:?})", point.value),
        ));
    }
    Ok(ChartPayload {
        chart_type: request.chart_type,
        data: request.data,
        color: request.color,
        title: request.title,
        labels: request.labels,
    })
}

/// Create the `generate_chart` tool. Pure transform, no I/O.
pub fn generate_chart_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "generate_chart",
        "Generate chart data for rendering in a UI component.",
        parameters(),
        |args, _ctx: ToolExecutionContext| async move {
            let payload = build_chart(&args)?;
            Ok(serde_json::to_value(payload)?)
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::validate_arguments;
    use pretty_assertions::assert_eq;

    fn sample_args() -> serde_json::Value {
        json!({
            "type": "bar",
            "color": "--color-chart-2",
            "title": "Downloads",
            "labels": { "x": "Month", "y": "Count" },
            "data": [{ "name": "Jan", "value": 10 }, { "name": "Feb", "value": null }]
        })
    }

    #[tokio::test]
    async fn builds_chart_payload_from_arguments() {
        let tool = generate_chart_tool();
        let args = sample_args();
        assert!(validate_arguments(&args, &tool.parameters().schema).is_ok());

        let out = tool
            .execute(
                &ToolArguments::new("generate_chart", args),
                &ToolExecutionContext::new("c", "generate_chart"),
            )
            .await
            .unwrap();
        assert_eq!(
            out,
            json!({
                "chartType": "bar",
                "data": [{ "name": "Jan", "value": 10.0 }, { "name": "Feb", "value": null }],
                "color": "--color-chart-2",
                "title": "Downloads",
                "labels": { "x": "Month", "y": "Count" }
            })
        );
    }

    #[test]
    fn schema_rejects_unknown_color() {
        let mut args = sample_args();
        args["color"] = json!("hotpink");
        assert!(validate_arguments(&args, &parameters().schema).is_err());
    }
}
