//! Document drafting capability — renders a markdown document locally.

use async_trait::async_trait;
use forager_core::error::ToolError;
use forager_core::intent::Intent;
use forager_core::tool::ToolCapability;

/// Assemble a markdown document from a title and either finished content
/// or a topic to outline.
pub fn create_document(title: &str, content: &str) -> serde_json::Value {
    let title = title.trim();
    let mut body = format!("# {title}\n\n");
    body.push_str(content.trim());
    body.push('\n');

    serde_json::json!({
        "title": title,
        "content": body,
        "format": "markdown",
    })
}

fn outline(topic: &str) -> String {
    format!(
        "## Overview\n\n{topic}\n\n## Key Points\n\n- \n\n## Details\n\n\n## Summary\n"
    )
}

/// The `document` capability.
pub struct DocumentTool;

#[async_trait]
impl ToolCapability for DocumentTool {
    fn intent(&self) -> Intent {
        Intent::Document
    }

    fn description(&self) -> &str {
        "Draft a markdown document. Pass finished `content`, or a `topic` to get an outline."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Document title" },
                "topic": { "type": "string", "description": "What the document is about" },
                "content": {
                    "type": "string",
                    "description": "Full markdown body, if already written"
                }
            },
            "required": ["title"]
        })
    }

    async fn invoke(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let title = arguments["title"]
            .as_str()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'title' argument".into()))?;

        let body = match arguments["content"].as_str() {
            Some(content) if !content.trim().is_empty() => content.to_string(),
            _ => outline(arguments["topic"].as_str().unwrap_or(title)),
        };

        Ok(create_document(title, &body))
    }
}
