//! `forager classify` — Goal understanding and intent classification only.

use forager_agent::{classify, understand};

/// Build the JSON report for one request.
pub fn report(text: &str) -> serde_json::Value {
    let goal = understand(text, &[]);
    let classification = classify(text);
    serde_json::json!({
        "goal": goal,
        "classification": classification,
    })
}

pub fn run(text: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(&report(text))?);
    Ok(())
}
