//! Observation builder — turns raw tool bodies and errors into observations.
//!
//! The dispatcher never looks inside response bodies; everything
//! tool-specific about reading them lives here.

use forager_core::error::ToolError;
use forager_core::intent::Intent;
use forager_core::observation::{CodeOutcome, Observation, SearchHit, ToolErrorCause};
use serde_json::{Map, Value};
use tracing::warn;

pub struct ObservationBuilder;

fn text(body: &Value, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(str::to_string)
}

fn param(params: &Map<String, Value>, key: &str) -> String {
    params
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn unreadable(intent: Intent) -> Observation {
    warn!(intent = %intent, "Tool returned an unreadable body");
    Observation::tool_error(
        ToolErrorCause::Transport,
        format!("{intent} returned a response that could not be read"),
    )
}

impl ObservationBuilder {
    /// Normalize one successful tool body.
    pub fn from_response(intent: Intent, params: &Map<String, Value>, body: &Value) -> Observation {
        match intent {
            Intent::Search => {
                let Some(raw) = body.get("results").and_then(Value::as_array) else {
                    return unreadable(intent);
                };
                let results = raw
                    .iter()
                    .filter_map(|hit| {
                        Some(SearchHit {
                            title: text(hit, "title").unwrap_or_default(),
                            url: text(hit, "url")?,
                            snippet: text(hit, "snippet").unwrap_or_default(),
                        })
                    })
                    .collect();
                Observation::SearchResult {
                    query: text(body, "query").unwrap_or_else(|| param(params, "query")),
                    results,
                }
            }
            Intent::ImageSingle | Intent::ImageBatch => {
                let Some(urls) = body.get("urls").and_then(Value::as_array) else {
                    return unreadable(intent);
                };
                Observation::ImageResult {
                    prompt: text(body, "prompt").unwrap_or_else(|| param(params, "prompt")),
                    urls: urls
                        .iter()
                        .filter_map(|u| u.as_str().map(str::to_string))
                        .collect(),
                    model: text(body, "model").unwrap_or_default(),
                }
            }
            Intent::Document => {
                let Some(content) = text(body, "content") else {
                    return unreadable(intent);
                };
                Observation::DocumentResult {
                    title: text(body, "title").unwrap_or_else(|| param(params, "title")),
                    content,
                    format: text(body, "format").unwrap_or_else(|| "markdown".to_string()),
                }
            }
            Intent::Code => {
                let outcome = match (text(body, "output"), text(body, "error")) {
                    (_, Some(err)) => CodeOutcome::Error(err),
                    (Some(out), None) => CodeOutcome::Output(out),
                    (None, None) => return unreadable(intent),
                };
                Observation::CodeResult {
                    language: text(body, "language").unwrap_or_else(|| param(params, "language")),
                    code: text(body, "code").unwrap_or_else(|| param(params, "code")),
                    outcome,
                }
            }
            Intent::None => Observation::tool_error(
                ToolErrorCause::Unavailable,
                "no tool serves this request",
            ),
        }
    }

    pub fn from_error(error: &ToolError) -> Observation {
        Observation::tool_error(error.cause(), error.to_string())
    }

    /// Merge the outcomes of one action's sub-calls.
    ///
    /// Failed sub-calls are dropped as long as one succeeded. Search hits
    /// are concatenated (deduplicated by URL) and image URLs appended; for
    /// other tools the first success stands.
    pub fn combine(
        intent: Intent,
        params: &Map<String, Value>,
        outcomes: Vec<Result<Value, ToolError>>,
    ) -> Observation {
        let mut observations: Vec<Observation> = outcomes
            .iter()
            .map(|outcome| match outcome {
                Ok(body) => Self::from_response(intent, params, body),
                Err(e) => Self::from_error(e),
            })
            .collect();

        let failed = observations.iter().filter(|o| o.is_error()).count();
        if failed == observations.len() {
            return observations.into_iter().next().unwrap_or_else(|| {
                Observation::tool_error(ToolErrorCause::Rejected, "tool produced nothing")
            });
        }
        if failed > 0 {
            warn!(intent = %intent, failed, total = observations.len(), "Some sub-calls failed");
        }

        observations.retain(|o| !o.is_error());
        let mut iter = observations.into_iter();
        let Some(mut merged) = iter.next() else {
            return Observation::tool_error(ToolErrorCause::Rejected, "tool produced nothing");
        };

        for next in iter {
            match (&mut merged, next) {
                (
                    Observation::SearchResult { query, results },
                    Observation::SearchResult { query: q, results: more },
                ) => {
                    if !query.split("; ").any(|known| known == q) {
                        query.push_str("; ");
                        query.push_str(&q);
                    }
                    for hit in more {
                        if !results.iter().any(|r| r.url == hit.url) {
                            results.push(hit);
                        }
                    }
                }
                (
                    Observation::ImageResult { urls, .. },
                    Observation::ImageResult { urls: more, .. },
                ) => {
                    urls.extend(more);
                }
                _ => {}
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(url: &str) -> Value {
        json!({"title": "t", "url": url, "snippet": "s"})
    }

    #[test]
    fn search_body_becomes_result() {
        let obs = ObservationBuilder::from_response(
            Intent::Search,
            &Map::new(),
            &json!({"query": "silver", "results": [hit("https://a.example"), {"title": "no url"}]}),
        );
        match obs {
            Observation::SearchResult { query, results } => {
                assert_eq!(query, "silver");
                assert_eq!(results.len(), 1);
            }
            other => panic!("expected search result, got {other:?}"),
        }
    }

    #[test]
    fn code_error_body_is_data() {
        let obs = ObservationBuilder::from_response(
            Intent::Code,
            &Map::new(),
            &json!({
                "language": "python",
                "code": "1/0",
                "error": "exit code 1: ZeroDivisionError"
            }),
        );
        assert!(!obs.is_error());
        assert!(matches!(
            obs,
            Observation::CodeResult { outcome: CodeOutcome::Error(_), .. }
        ));
    }

    #[test]
    fn malformed_body_is_transport_error() {
        let obs =
            ObservationBuilder::from_response(Intent::Document, &Map::new(), &json!({"oops": 1}));
        assert_eq!(obs.error_cause(), Some(ToolErrorCause::Transport));
    }

    #[test]
    fn errors_keep_their_cause() {
        let err = ToolError::InvalidArguments("missing query".into());
        let obs = ObservationBuilder::from_error(&err);
        assert!(matches!(
            obs,
            Observation::ToolError {
                cause: ToolErrorCause::InvalidParameters,
                retryable: false,
                ..
            }
        ));
    }

    #[test]
    fn search_fan_out_merges_and_dedups() {
        let obs = ObservationBuilder::combine(
            Intent::Search,
            &Map::new(),
            vec![
                Ok(json!({"query": "a", "results": [hit("https://1"), hit("https://2")]})),
                Err(ToolError::Transport { tool_name: "search".into(), reason: "down".into() }),
                Ok(json!({"query": "b", "results": [hit("https://2"), hit("https://3")]})),
            ],
        );
        match obs {
            Observation::SearchResult { query, results } => {
                assert_eq!(query, "a; b");
                assert_eq!(results.len(), 3);
            }
            other => panic!("expected merged search, got {other:?}"),
        }
    }

    #[test]
    fn partial_image_batch_stays_usable() {
        let img = |u: &str| Ok(json!({"prompt": "a cat", "urls": [u], "model": "m"}));
        let obs = ObservationBuilder::combine(
            Intent::ImageBatch,
            &Map::new(),
            vec![
                img("https://i/1"),
                Err(ToolError::Timeout { tool_name: "image_batch".into(), timeout_secs: 30 }),
                img("https://i/2"),
            ],
        );
        match obs {
            Observation::ImageResult { urls, .. } => {
                assert_eq!(urls, vec!["https://i/1", "https://i/2"])
            }
            other => panic!("expected images, got {other:?}"),
        }
    }

    #[test]
    fn all_failed_returns_first_error() {
        let obs = ObservationBuilder::combine(
            Intent::ImageBatch,
            &Map::new(),
            vec![
                Err(ToolError::Timeout { tool_name: "image_batch".into(), timeout_secs: 30 }),
                Err(ToolError::Rejected {
                    tool_name: "image_batch".into(),
                    reason: "policy".into(),
                }),
            ],
        );
        assert_eq!(obs.error_cause(), Some(ToolErrorCause::Timeout));
    }
}
