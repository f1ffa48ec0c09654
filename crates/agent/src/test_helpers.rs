//! Shared canned collaborators for agent tests.

use async_trait::async_trait;
use forager_core::error::{MemoryError, ProviderError, ToolError};
use forager_core::intent::Intent;
use forager_core::memory::{MemoryEntry, MemoryStore};
use forager_core::message::{Message, MessageToolCall};
use forager_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use forager_core::tool::ToolCapability;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type Scripted = Result<ProviderResponse, ProviderError>;

/// A provider that replays scripted responses in order.
///
/// `repeating` replays one response forever. Panics when a finite script
/// runs out.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Scripted>>,
    repeat: Option<Scripted>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(response: Scripted) -> Self {
        Self {
            repeat: Some(response),
            ..Self::new(Vec::new())
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        match &self.repeat {
            Some(response) => response.clone(),
            None => panic!("ScriptedProvider: no response scripted for call #{n}"),
        }
    }
}

pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

pub fn make_tool_call_response(tool: &str, args: Value, thought: &str) -> ProviderResponse {
    let mut message = Message::assistant(thought);
    message.tool_calls.push(MessageToolCall {
        id: format!("call_{tool}"),
        name: tool.to_string(),
        arguments: args.to_string(),
    });
    ProviderResponse {
        message,
        ..make_text_response("")
    }
}

type Responder = Box<dyn Fn(&Value) -> Result<Value, ToolError> + Send + Sync>;

/// A capability with a canned response, optional latency, and call counters.
pub struct StubCapability {
    intent: Intent,
    responder: Responder,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

pub fn silver_hits() -> Value {
    json!([
        {
            "title": "Silver spot price",
            "url": "https://metals.example/silver",
            "snippet": "Silver trades at $31.20 per ounce today."
        }
    ])
}

impl StubCapability {
    pub fn new(
        intent: Intent,
        responder: impl Fn(&Value) -> Result<Value, ToolError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            intent,
            responder: Box::new(responder),
            delay: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// A search tool that echoes the query with one silver-price hit.
    pub fn search_ok() -> Self {
        Self::new(Intent::Search, |args| {
            Ok(json!({ "query": args["query"], "results": silver_hits() }))
        })
    }

    pub fn failing(intent: Intent, error: ToolError) -> Self {
        Self::new(intent, move |_| Err(error.clone()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most invocations ever running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolCapability for StubCapability {
    fn intent(&self) -> Intent {
        self.intent
    }

    fn description(&self) -> &str {
        "stub"
    }

    fn parameters_schema(&self) -> Value {
        match self.intent {
            Intent::Search => json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "queries": { "type": "array" }
                },
                "required": ["query"]
            }),
            Intent::ImageSingle | Intent::ImageBatch => json!({
                "type": "object",
                "properties": {
                    "prompt": { "type": "string" },
                    "count": { "type": "integer", "minimum": 1, "maximum": 4 }
                },
                "required": ["prompt"]
            }),
            Intent::Document => json!({
                "type": "object",
                "properties": { "title": { "type": "string" } },
                "required": ["title"]
            }),
            Intent::Code => json!({
                "type": "object",
                "properties": { "code": { "type": "string" } },
                "required": ["code"]
            }),
            Intent::None => json!({ "type": "object" }),
        }
    }

    fn split(&self, arguments: &Value) -> Vec<Value> {
        let Some(extra) = arguments["queries"].as_array() else {
            return vec![arguments.clone()];
        };
        std::iter::once(arguments["query"].clone())
            .chain(extra.iter().cloned())
            .map(|q| json!({ "query": q }))
            .collect()
    }

    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.responder)(&arguments)
    }
}

/// An in-memory store that counts reads and can be made to fail.
pub struct CountingMemoryStore {
    entries: Mutex<Vec<MemoryEntry>>,
    reads: AtomicUsize,
    fail: bool,
    hang: bool,
}

impl CountingMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            reads: AtomicUsize::new(0),
            fail: false,
            hang: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Reads never complete.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::new()
        }
    }

    pub fn with_entry(self, entry: MemoryEntry) -> Self {
        self.entries.lock().unwrap().push(entry);
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MemoryStore for CountingMemoryStore {
    fn name(&self) -> &str {
        "counting"
    }

    async fn get_active_memories(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail {
            return Err(MemoryError::Storage("store offline".into()));
        }
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id && e.is_active)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn store(&self, mut entry: MemoryEntry) -> Result<String, MemoryError> {
        if self.fail {
            return Err(MemoryError::Storage("store offline".into()));
        }
        let mut entries = self.entries.lock().unwrap();
        entry.id = format!("mem-{}", entries.len() + 1);
        let id = entry.id.clone();
        entries.push(entry);
        Ok(id)
    }

    async fn deactivate(&self, id: &str) -> Result<bool, MemoryError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
