//! MCP Server implementation
//!
//! Coordinates MCP protocol handling with the tool dispatcher.

use super::protocol::*;
use crate::cache::ResultCache;
use crate::config::{ServerSettings, Settings};
use crate::dispatch::{Dispatcher, ToolError};
use crate::engines::{CallContext, EngineRegistry, Selector};
use crate::{Error, Result};
use serde_json::{json, Value};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// MCP server exposing the published tools of one engine
pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
    info: ServerInfo,
    call_timeout: Option<Duration>,
    /// Cancellation tokens of running tool calls, by request id
    in_flight: Mutex<HashMap<String, CancellationToken>>,
}

/// Entry of a running call in the in-flight table, removed on drop
///
/// Dropping covers completion as well as a caller abandoning the call
/// future (for example an HTTP client disconnecting).
struct InFlightCall<'a> {
    server: &'a McpServer,
    key: String,
}

impl Drop for InFlightCall<'_> {
    fn drop(&mut self) {
        self.server.in_flight().remove(&self.key);
    }
}

impl McpServer {
    /// Fails when `call_timeout` is not a usable number of seconds
    pub fn new(dispatcher: Arc<Dispatcher>, settings: &ServerSettings) -> Result<Self> {
        Ok(Self {
            dispatcher,
            info: ServerInfo {
                name: settings.name.clone(),
                version: settings.version.clone(),
            },
            call_timeout: settings.call_timeout()?,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    /// Select an engine from the registry and bind it
    ///
    /// Fails with `NoEngineAvailable` when the registry is empty.
    pub fn from_registry(registry: &EngineRegistry, settings: &Settings) -> Result<Self> {
        let engine = Selector::from_settings(&settings.selection).select(registry)?;
        info!(
            "Using search engine: {} v{}",
            engine.name(),
            engine.version()
        );
        info!("Available engines: {}", registry.list().join(", "));

        let mut dispatcher = Dispatcher::bind(engine);
        if settings.cache.enabled {
            dispatcher = dispatcher.with_cache(ResultCache::new(
                settings.cache.ttl,
                settings.cache.max_capacity,
            ));
        }
        info!("Published tools: {}", dispatcher.tool_names().join(", "));

        Self::new(Arc::new(dispatcher), &settings.server)
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of tool calls currently running
    pub fn in_flight_calls(&self) -> usize {
        self.in_flight().len()
    }

    /// Record a running call under its request id
    ///
    /// Returns `None` when a call with the same id is already running.
    fn track(&self, key: String, token: CancellationToken) -> Option<InFlightCall<'_>> {
        match self.in_flight().entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(token);
                Some(InFlightCall { server: self, key })
            }
        }
    }

    /// Handle a single MCP message
    ///
    /// Returns the serialized response, or `None` for notifications.
    pub async fn handle_message(&self, message: &str) -> Result<Option<String>> {
        let request: JsonRpcRequest = match serde_json::from_str(message) {
            Ok(request) => request,
            Err(e) => {
                debug!("Unparseable message: {}", e);
                let response = JsonRpcResponse::error(None, PARSE_ERROR, format!("Parse error: {}", e));
                return Ok(Some(serde_json::to_string(&response)?));
            }
        };

        Ok(self
            .handle_request(request)
            .await?
            .map(|response| serde_json::to_string(&response))
            .transpose()?)
    }

    /// Handle a parsed request
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Result<Option<JsonRpcResponse>> {
        if request.jsonrpc != "2.0" && !request.is_notification() {
            return Ok(Some(JsonRpcResponse::error(
                request.id,
                INVALID_REQUEST,
                "Invalid Request: jsonrpc must be \"2.0\"",
            )));
        }

        let notification = request.id.is_none();
        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id, request.params)?,
            "initialized" | "notifications/initialized" => return Ok(None),
            "notifications/cancelled" => {
                self.handle_cancelled(request.params);
                return Ok(None);
            }
            "ping" => JsonRpcResponse::success(request.id, json!({})),
            "tools/list" => self.handle_tools_list(request.id)?,
            "tools/call" => {
                let response = self.handle_tools_call(request.id, request.params).await?;
                if notification {
                    debug!("Tool call sent as a notification, dropping its result");
                    return Ok(None);
                }
                response
            }
            _ if notification => {
                debug!("Ignoring notification {}", request.method);
                return Ok(None);
            }
            _ => JsonRpcResponse::error(
                request.id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        };

        Ok(Some(response))
    }

    fn handle_initialize(&self, id: Option<Value>, params: Value) -> Result<JsonRpcResponse> {
        let params: InitializeParams = serde_json::from_value(params).unwrap_or_default();
        if let Some(client) = params.client_info {
            info!("Client connected: {} {}", client.name, client.version);
        }

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: self.info.clone(),
        };

        Ok(JsonRpcResponse::success(id, serde_json::to_value(result)?))
    }

    fn handle_tools_list(&self, id: Option<Value>) -> Result<JsonRpcResponse> {
        let result = ToolsListResult {
            tools: self.dispatcher.definitions(),
        };
        Ok(JsonRpcResponse::success(id, serde_json::to_value(result)?))
    }

    async fn handle_tools_call(&self, id: Option<Value>, params: Value) -> Result<JsonRpcResponse> {
        let params: ToolCallParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => {
                return Ok(JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("Invalid params: {}", e),
                ))
            }
        };

        let token = CancellationToken::new();
        let _tracked = match id.as_ref().map(request_key) {
            Some(key) => match self.track(key, token.clone()) {
                Some(tracked) => Some(tracked),
                None => {
                    return Ok(JsonRpcResponse::error(
                        id,
                        INVALID_REQUEST,
                        "Invalid Request: a call with this id is already running",
                    ))
                }
            },
            None => None,
        };

        let mut ctx = CallContext::with_token(token);
        if let Some(timeout) = self.call_timeout {
            ctx = ctx.timeout(timeout);
        }

        let outcome = self
            .dispatcher
            .call(&ctx, &params.name, params.arguments)
            .await;

        let response = match outcome {
            Ok(text) => JsonRpcResponse::success(id, serde_json::to_value(ToolResult::text(text))?),
            Err(ToolError::NotFound(name)) => {
                JsonRpcResponse::error(id, INVALID_PARAMS, format!("tool not found: {}", name))
            }
            Err(e) => JsonRpcResponse::success(
                id,
                serde_json::to_value(ToolResult::error(e.to_string()))?,
            ),
        };
        Ok(response)
    }

    fn handle_cancelled(&self, params: Value) {
        let params: CancelledParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => {
                warn!("Malformed cancellation: {}", e);
                return;
            }
        };

        let key = request_key(&params.request_id);
        match self.in_flight().get(&key) {
            Some(token) => {
                info!(
                    "Cancelling request {}: {}",
                    key,
                    params.reason.as_deref().unwrap_or("no reason given")
                );
                token.cancel();
            }
            None => debug!("Cancellation for unknown request {}", key),
        }
    }

    /// Serve JSON-RPC over stdin/stdout until stdin closes
    pub async fn run_stdio(self: Arc<Self>) -> Result<()> {
        info!("MCP server ready, listening on stdio");
        self.serve_lines(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve newline-delimited JSON-RPC until `input` reaches EOF
    ///
    /// Each line is handled on its own task so a slow call never blocks
    /// others; responses are written by a single writer task. Requests still
    /// running at EOF are awaited before returning.
    pub async fn serve_lines<R, W>(self: Arc<Self>, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut lines = input.lines();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let writer = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                output.write_all(line.as_bytes()).await?;
                output.write_all(b"\n").await?;
                output.flush().await?;
            }
            Ok::<_, std::io::Error>(())
        });

        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }

                    let server = Arc::clone(&self);
                    let tx = tx.clone();
                    tasks.spawn(async move {
                        let reply = match server.handle_message(&line).await {
                            Ok(reply) => reply,
                            Err(e) => {
                                error!("Failed to handle message: {}", e);
                                let response = JsonRpcResponse::error(
                                    None,
                                    INTERNAL_ERROR,
                                    format!("Internal error: {}", e),
                                );
                                serde_json::to_string(&response).ok()
                            }
                        };
                        if let Some(reply) = reply {
                            // Receiver only closes on shutdown
                            let _ = tx.send(reply);
                        }
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!("Request task failed: {}", e);
                    }
                }
            }
        }

        debug!("Input closed, waiting for {} running requests", tasks.len());
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Request task failed: {}", e);
            }
        }

        drop(tx);
        writer.await?.map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::testing::StubEngine;
    use crate::engines::OperationKind;

    fn server(engine: StubEngine) -> Arc<McpServer> {
        let dispatcher = Arc::new(Dispatcher::bind(Arc::new(engine)));
        Arc::new(McpServer::new(dispatcher, &ServerSettings::default()).unwrap())
    }

    fn call(id: Value, query: &str) -> Value {
        json!({"jsonrpc": "2.0", "id": id, "method": "tools/call", "params": {
            "name": "web_search",
            "arguments": {"query": query}
        }})
    }

    async fn wait_for_in_flight(server: &McpServer, count: usize) {
        while server.in_flight_calls() != count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn roundtrip(server: &McpServer, request: Value) -> Value {
        let reply = server
            .handle_message(&request.to_string())
            .await
            .unwrap()
            .expect("a response");
        serde_json::from_str(&reply).unwrap()
    }

    #[tokio::test]
    async fn test_handle_initialize() {
        let server = server(StubEngine::new("stub"));
        let reply = roundtrip(
            &server,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "test", "version": "1.0"}
            }}),
        )
        .await;

        assert_eq!(reply["result"]["serverInfo"]["name"], "multi-search-server");
        assert_eq!(reply["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert!(reply["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_notifications_have_no_reply() {
        let server = server(StubEngine::new("stub"));
        for method in ["notifications/initialized", "initialized", "notifications/unknown"] {
            let message = json!({"jsonrpc": "2.0", "method": method}).to_string();
            assert!(server.handle_message(&message).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_parse_error() {
        let server = server(StubEngine::new("stub"));
        let reply = server.handle_message("{not json").await.unwrap().unwrap();
        let reply: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["error"]["code"], PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let server = server(StubEngine::new("stub"));
        let reply = roundtrip(&server, json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"})).await;
        assert_eq!(reply["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(reply["id"], 3);
    }

    #[tokio::test]
    async fn test_tools_list_follows_support() {
        let server = server(StubEngine::new("stub").supporting(&[OperationKind::ImageSearch]));
        let reply = roundtrip(&server, json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await;

        let names: Vec<_> = reply["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["web_search", "image_search", "webpage_scrape"]);
        assert!(reply["result"]["tools"][0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn test_tools_call() {
        let server = server(StubEngine::new("stub"));
        let reply = roundtrip(
            &server,
            json!({"jsonrpc": "2.0", "id": "a", "method": "tools/call", "params": {
                "name": "web_search",
                "arguments": {"query": "rust"}
            }}),
        )
        .await;

        assert!(reply["result"].get("isError").is_none());
        let text = reply["result"]["content"][0]["text"].as_str().unwrap();
        let data: Value = serde_json::from_str(text).unwrap();
        assert_eq!(data["input"]["query"], "rust");
        assert_eq!(server.in_flight_calls(), 0);
    }

    #[tokio::test]
    async fn test_unpublished_tool_is_protocol_error() {
        let server = server(StubEngine::new("stub"));
        let reply = roundtrip(
            &server,
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {
                "name": "image_search",
                "arguments": {"query": "rust"}
            }}),
        )
        .await;

        assert_eq!(reply["error"]["code"], INVALID_PARAMS);
        assert_eq!(reply["error"]["message"], "tool not found: image_search");
    }

    #[tokio::test]
    async fn test_failed_call_is_tool_error() {
        let server = server(StubEngine::new("stub"));
        let reply = roundtrip(
            &server,
            json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call", "params": {
                "name": "web_search",
                "arguments": {"query": ""}
            }}),
        )
        .await;

        assert_eq!(reply["result"]["isError"], true);
        let text = reply["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("web_search failed:"));
    }

    #[tokio::test]
    async fn test_cancel_in_flight_call() {
        let server = server(StubEngine::new("slow").with_delay(Duration::from_secs(30)));

        let call = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                roundtrip(
                    &server,
                    json!({"jsonrpc": "2.0", "id": 9, "method": "tools/call", "params": {
                        "name": "web_search",
                        "arguments": {"query": "rust"}
                    }}),
                )
                .await
            })
        };

        while server.in_flight_calls() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let cancel = json!({"jsonrpc": "2.0", "method": "notifications/cancelled", "params": {
            "requestId": 9,
            "reason": "user aborted"
        }});
        assert!(server.handle_message(&cancel.to_string()).await.unwrap().is_none());

        let reply = tokio::time::timeout(Duration::from_secs(5), call)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply["result"]["isError"], true);
        assert!(reply["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("cancelled"));
    }

    #[test]
    fn test_unusable_call_timeout_is_rejected() {
        let dispatcher = Arc::new(Dispatcher::bind(Arc::new(StubEngine::new("stub"))));
        let settings = ServerSettings {
            call_timeout: f64::INFINITY,
            ..Default::default()
        };
        assert!(McpServer::new(dispatcher, &settings).is_err());
    }

    #[tokio::test]
    async fn test_abandoned_call_leaves_no_entry() {
        let server = server(StubEngine::new("slow").with_delay(Duration::from_secs(30)));

        let pending = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                server
                    .handle_message(&call(json!(11), "rust").to_string())
                    .await
            })
        };
        wait_for_in_flight(&server, 1).await;

        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());
        assert_eq!(server.in_flight_calls(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_running_id_is_rejected() {
        let server = server(StubEngine::new("slow").with_delay(Duration::from_secs(30)));

        let first = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { roundtrip(&server, call(json!(12), "first")).await })
        };
        wait_for_in_flight(&server, 1).await;

        let reply = roundtrip(&server, call(json!(12), "second")).await;
        assert_eq!(reply["error"]["code"], INVALID_REQUEST);
        assert_eq!(server.in_flight_calls(), 1);

        // The first call is still tracked and can be cancelled
        let cancel = json!({"jsonrpc": "2.0", "method": "notifications/cancelled", "params": {
            "requestId": 12
        }});
        server.handle_message(&cancel.to_string()).await.unwrap();

        let reply = tokio::time::timeout(Duration::from_secs(5), first)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply["result"]["isError"], true);
        assert_eq!(server.in_flight_calls(), 0);
    }

    #[tokio::test]
    async fn test_tool_call_notification_has_no_reply() {
        let engine = StubEngine::new("stub");
        let calls = engine.call_counter();
        let server = server(engine);

        let message = json!({"jsonrpc": "2.0", "method": "tools/call", "params": {
            "name": "web_search",
            "arguments": {"query": "rust"}
        }});
        assert!(server.handle_message(&message.to_string()).await.unwrap().is_none());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_serve_lines_answers_out_of_order_and_drains() {
        let server = server(StubEngine::new("slow").with_delay(Duration::from_millis(200)));

        let input = format!(
            "{}\n\n{}\n",
            call(json!(1), "slow"),
            json!({"jsonrpc": "2.0", "id": 2, "method": "ping"})
        );
        let (output, replies) = tokio::io::duplex(64 * 1024);

        server.serve_lines(input.as_bytes(), output).await.unwrap();

        let mut lines = BufReader::new(replies).lines();
        let mut ids = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            let reply: Value = serde_json::from_str(&line).unwrap();
            ids.push(reply["id"].clone());
        }
        assert_eq!(ids, vec![json!(2), json!(1)]);
    }
}
