//! Code execution capability.
//!
//! Programs run through a configured interpreter that reads the source from
//! stdin. A program that fails is reported as data ([`CodeOutcome::Error`]),
//! not as a tool failure.

use async_trait::async_trait;
use forager_core::error::ToolError;
use forager_core::intent::Intent;
use forager_core::observation::CodeOutcome;
use forager_core::tool::ToolCapability;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Cap on captured stdout/stderr per run.
const MAX_OUTPUT_BYTES: usize = 16 * 1024;

/// Something that can run a program in a given language.
#[async_trait]
pub trait CodeRunner: Send + Sync {
    async fn execute(&self, language: &str, code: &str) -> Result<CodeOutcome, ToolError>;
}

/// Runs programs as local interpreter processes.
pub struct ProcessRunner {
    /// language → interpreter command line (e.g. "python" → "python3")
    interpreters: HashMap<String, String>,
}

impl ProcessRunner {
    pub fn new(interpreters: HashMap<String, String>) -> Self {
        Self {
            interpreters: interpreters
                .into_iter()
                .map(|(lang, cmd)| (lang.to_lowercase(), cmd))
                .collect(),
        }
    }

    fn interpreter_for(&self, language: &str) -> Option<&str> {
        let lang = language.to_lowercase();
        let canonical = match lang.as_str() {
            "py" | "python3" => "python",
            "js" | "node" => "javascript",
            "sh" | "shell" => "bash",
            other => other,
        };
        self.interpreters.get(canonical).map(String::as_str)
    }
}

fn clip(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= MAX_OUTPUT_BYTES {
        return text.trim_end().to_string();
    }
    let mut end = MAX_OUTPUT_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n[output truncated]", &text[..end])
}

#[async_trait]
impl CodeRunner for ProcessRunner {
    async fn execute(&self, language: &str, code: &str) -> Result<CodeOutcome, ToolError> {
        let command_line = self.interpreter_for(language).ok_or_else(|| ToolError::Rejected {
            tool_name: "code".into(),
            reason: format!("no interpreter configured for '{language}'"),
        })?;

        let mut parts = command_line.split_whitespace();
        let program = parts.next().ok_or_else(|| ToolError::Rejected {
            tool_name: "code".into(),
            reason: format!("empty interpreter command for '{language}'"),
        })?;

        debug!(language = %language, interpreter = %program, "Running program");

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::Unavailable(format!("cannot start {program}: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(code.as_bytes())
                .await
                .map_err(|e| ToolError::Transport {
                    tool_name: "code".into(),
                    reason: format!("failed to send program: {e}"),
                })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ToolError::Transport {
                tool_name: "code".into(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            Ok(CodeOutcome::Output(clip(&output.stdout)))
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(language = %language, exit_code = code, "Program failed");
            let stderr = clip(&output.stderr);
            let message = if stderr.is_empty() {
                format!("exit code {code}")
            } else {
                format!("exit code {code}: {stderr}")
            };
            Ok(CodeOutcome::Error(message))
        }
    }
}

/// The `code` capability.
pub struct CodeTool {
    runner: Arc<dyn CodeRunner>,
}

impl CodeTool {
    pub fn new(runner: Arc<dyn CodeRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ToolCapability for CodeTool {
    fn intent(&self) -> Intent {
        Intent::Code
    }

    fn description(&self) -> &str {
        "Run a short program and return its output. Use for calculations and data processing."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": { "type": "string", "description": "Program source" },
                "language": {
                    "type": "string",
                    "description": "Programming language (default python)"
                }
            },
            "required": ["code"]
        })
    }

    async fn invoke(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let code = arguments["code"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'code' argument".into()))?;
        let language = arguments["language"].as_str().unwrap_or("python");

        let outcome = self.runner.execute(language, code).await?;
        let mut body = serde_json::json!({ "language": language, "code": code });
        match outcome {
            CodeOutcome::Output(out) => body["output"] = serde_json::json!(out),
            CodeOutcome::Error(err) => body["error"] = serde_json::json!(err),
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_runner() -> ProcessRunner {
        ProcessRunner::new(HashMap::from([("bash".to_string(), "sh".to_string())]))
    }

    #[test]
    fn language_aliases_resolve() {
        let runner = ProcessRunner::new(HashMap::from([
            ("Python".to_string(), "python3".to_string()),
            ("javascript".to_string(), "node".to_string()),
        ]));
        assert_eq!(runner.interpreter_for("py"), Some("python3"));
        assert_eq!(runner.interpreter_for("JS"), Some("node"));
        assert_eq!(runner.interpreter_for("ruby"), None);
    }

    #[test]
    fn clip_truncates_long_output() {
        let long = vec![b'a'; MAX_OUTPUT_BYTES + 10];
        assert!(clip(&long).ends_with("[output truncated]"));
        assert_eq!(clip(b"hi\n"), "hi");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_program_returns_output() {
        let outcome = sh_runner().execute("sh", "echo hello").await.unwrap();
        assert_eq!(outcome, CodeOutcome::Output("hello".into()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_program_is_data() {
        let outcome = sh_runner()
            .execute("bash", "echo boom >&2; exit 3")
            .await
            .unwrap();
        match outcome {
            CodeOutcome::Error(msg) => {
                assert!(msg.contains("exit code 3"));
                assert!(msg.contains("boom"));
            }
            other => panic!("expected error outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_language_is_rejected() {
        let err = sh_runner().execute("cobol", "DISPLAY 'HI'").await.unwrap_err();
        assert!(matches!(err, ToolError::Rejected { .. }));
    }

    #[tokio::test]
    async fn missing_interpreter_is_unavailable() {
        let runner = ProcessRunner::new(HashMap::from([(
            "python".to_string(),
            "definitely-not-an-interpreter-xyz".to_string(),
        )]));
        let err = runner.execute("python", "print(1)").await.unwrap_err();
        assert!(matches!(err, ToolError::Unavailable(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tool_body_carries_output_or_error() {
        let tool = CodeTool::new(Arc::new(sh_runner()));
        let ok = tool
            .invoke(serde_json::json!({"code": "echo 42", "language": "sh"}))
            .await
            .unwrap();
        assert_eq!(ok["output"], "42");

        let failed = tool
            .invoke(serde_json::json!({"code": "exit 1", "language": "sh"}))
            .await
            .unwrap();
        assert!(failed["error"].as_str().unwrap().contains("exit code 1"));
    }
}
