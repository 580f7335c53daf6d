//! `run_code`: executes a snippet on a Piston sandbox.
//!
//! Failures never surface as tool errors. The model receives an
//! `Error: ...` string instead so it can explain the problem conversationally.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::OnceCell;

use crate::error::LuminaryError;
use crate::tools::{AgentToolParameters, Tool, ToolArguments, ToolExecutionContext};

const COMPILE_TIMEOUT_MS: u64 = 10_000;
const RUN_TIMEOUT_MS: u64 = 3_000;

/// A language runtime advertised by Piston.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PistonRuntime {
    pub language: String,
    pub version: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub runtime: Option<String>,
}

impl PistonRuntime {
    fn matches(&self, language: &str) -> bool {
        let wanted = language.trim().to_lowercase();
        self.language.to_lowercase() == wanted
            || self.aliases.iter().any(|a| a.to_lowercase() == wanted)
    }

    fn file_extension(&self) -> &'static str {
        match self.language.as_str() {
            "javascript" => "js",
            "typescript" => "ts",
            "python" => "py",
            "c++" => "cpp",
            "rust" => "rs",
            "go" => "go",
            _ => "txt",
        }
    }
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    language: &'a str,
    version: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    runtime: Option<&'a str>,
    files: Vec<SourceFile<'a>>,
    stdin: &'a str,
    args: Vec<String>,
    compile_timeout: u64,
    run_timeout: u64,
    compile_cpu_time: u64,
    run_cpu_time: u64,
    compile_memory_limit: i64,
    run_memory_limit: i64,
}

#[derive(Debug, Serialize)]
struct SourceFile<'a> {
    name: String,
    content: &'a str,
    encoding: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    compile: Option<StageOutput>,
    #[serde(default)]
    run: Option<StageOutput>,
}

#[derive(Debug, Default, Deserialize)]
struct StageOutput {
    #[serde(default)]
    output: String,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
}

impl StageOutput {
    fn best(&self) -> Option<&str> {
        [&self.output, &self.stdout, &self.stderr]
            .into_iter()
            .map(String::as_str)
            .find(|s| !s.is_empty())
    }
}

/// The `run_code` tool. Runtimes are fetched once and cached.
pub struct RunCodeTool {
    client: reqwest::Client,
    base_url: String,
    parameters: AgentToolParameters,
    runtimes: OnceCell<Vec<PistonRuntime>>,
}

impl RunCodeTool {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            parameters: AgentToolParameters::object()
                .string("language", "Programming language (js, python, c++, go, etc.)", true)
                .string("code", "Code snippet to execute", true)
                .build(),
            runtimes: OnceCell::new(),
        }
    }

    async fn runtimes(&self) -> Result<&[PistonRuntime], String> {
        self.runtimes
            .get_or_try_init(|| async {
                let response = self
                    .client
                    .get(format!("{}/runtimes", self.base_url))
                    .send()
                    .await
                    .map_err(|e| format!("failed to list runtimes: {e}"))?;
                if !response.status().is_success() {
                    return Err(format!("failed to list runtimes: {}", response.status()));
                }
                response
                    .json::<Vec<PistonRuntime>>()
                    .await
                    .map_err(|e| format!("failed to parse runtimes: {e}"))
            })
            .await
            .map(Vec::as_slice)
    }

    async fn run(&self, language: &str, code: &str) -> Result<String, String> {
        let runtime = self
            .runtimes()
            .await?
            .iter()
            .find(|r| r.matches(language))
            .cloned()
            .ok_or_else(|| format!("No runtime found for '{language}'"))?;

        let request = ExecuteRequest {
            language: &runtime.language,
            version: &runtime.version,
            runtime: runtime.runtime.as_deref(),
            files: vec![SourceFile {
                name: format!("code.{}", runtime.file_extension()),
                content: code,
                encoding: "utf8",
            }],
            stdin: "",
            args: Vec::new(),
            compile_timeout: COMPILE_TIMEOUT_MS,
            run_timeout: RUN_TIMEOUT_MS,
            compile_cpu_time: COMPILE_TIMEOUT_MS,
            run_cpu_time: RUN_TIMEOUT_MS,
            compile_memory_limit: -1,
            run_memory_limit: -1,
        };

        let response = self
            .client
            .post(format!("{}/execute", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Piston API error: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Piston API error: {status} - {body}"));
        }

        let data: ExecuteResponse = response
            .json()
            .await
            .map_err(|e| format!("Piston API error: {e}"))?;
        data.run
            .as_ref()
            .and_then(StageOutput::best)
            .or_else(|| data.compile.as_ref().and_then(StageOutput::best))
            .map(str::to_string)
            .ok_or_else(|| "No output returned from code execution.".to_string())
    }
}

#[async_trait]
impl Tool for RunCodeTool {
    fn name(&self) -> &str {
        "run_code"
    }

    fn description(&self) -> &str {
        "Execute code in a specific language using the Piston API."
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, LuminaryError> {
        let language = args.get_str("language")?;
        let code = args.get_str("code")?;
        match self.run(language, code).await {
            Ok(output) => Ok(json!(output)),
            Err(message) => {
                tracing::debug!(tool_call_id = %ctx.tool_call_id, language, %message, "run_code failed");
                Ok(json!(format!("Error: {message}")))
            }
        }
    }
}
