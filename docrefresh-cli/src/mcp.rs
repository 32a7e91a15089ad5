//! [`RemoteStore`] over an MCP server's streamable-HTTP transport.
//!
//! Every capability maps to one `tools/call` JSON-RPC request. Tool results
//! arrive as `{content: [{type: "text", text}], isError}` and the text is JSON.
//! Responses may be plain JSON or a single server-sent event.

use std::cell::Cell;
use std::time::Duration;

use serde_json::{json, Value};

use docrefresh_sync::artifact::StudioRequest;
use docrefresh_sync::remote::{
    ArtifactStatus, NotebookInfo, RemoteError, RemoteResult, RemoteSource, RemoteStore,
};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SESSION_HEADER: &str = "mcp-session-id";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct McpRemote {
    agent: ureq::Agent,
    endpoint: String,
    session_id: Option<String>,
    next_id: Cell<u64>,
}

impl McpRemote {
    /// Perform the MCP handshake against `endpoint` (e.g. `http://localhost:8080/mcp`).
    pub fn connect(endpoint: &str) -> RemoteResult<Self> {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        let mut remote = McpRemote {
            agent,
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            session_id: None,
            next_id: Cell::new(1),
        };

        let init = json!({
            "jsonrpc": "2.0",
            "id": "init",
            "method": "initialize",
            "params": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": { "name": "docrefresh", "version": env!("CARGO_PKG_VERSION") },
            },
        });
        let response = remote.post(&init)?;
        remote.session_id = response.header(SESSION_HEADER).map(str::to_owned);
        if remote.session_id.is_none() {
            tracing::debug!("no MCP session id returned by {}", remote.endpoint);
        }

        let initialized = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
        if let Err(e) = remote.post(&initialized) {
            tracing::debug!("initialized notification failed: {e}");
        }
        tracing::info!("connected to MCP endpoint {}", remote.endpoint);
        Ok(remote)
    }

    fn post(&self, payload: &Value) -> RemoteResult<ureq::Response> {
        let mut request = self
            .agent
            .post(&self.endpoint)
            .set("Accept", "application/json, text/event-stream");
        if let Some(session) = &self.session_id {
            request = request.set(SESSION_HEADER, session);
        }
        request.send_json(payload).map_err(|e| match e {
            ureq::Error::Status(code, _) => RemoteError::Transport(format!("HTTP {code}")),
            ureq::Error::Transport(t) => RemoteError::Transport(t.to_string()),
        })
    }

    fn call_tool(&self, name: &str, arguments: Value) -> RemoteResult<Value> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        tracing::debug!("tools/call {name}");

        let body = self
            .post(&tool_payload(id, name, arguments))?
            .into_string()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        tool_result(&parse_rpc_body(&body)?)
    }
}

// ---------------------------------------------------------------------------
// Wire helpers
// ---------------------------------------------------------------------------

fn tool_payload(id: u64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments },
    })
}

/// Plain JSON, or the first `data:` line of an event stream.
fn parse_rpc_body(body: &str) -> RemoteResult<Value> {
    let data = body
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .unwrap_or(body);
    serde_json::from_str(data).map_err(|e| RemoteError::Malformed(format!("invalid JSON-RPC body: {e}")))
}

/// Unwrap a JSON-RPC response into the tool's JSON payload.
fn tool_result(rpc: &Value) -> RemoteResult<Value> {
    if let Some(err) = rpc.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(RemoteError::Rejected(message.to_owned()));
    }
    let result = rpc
        .get("result")
        .ok_or_else(|| RemoteError::Malformed("response has no result".into()))?;

    let text = result
        .get("content")
        .and_then(Value::as_array)
        .and_then(|blocks| {
            blocks
                .iter()
                .find(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        })
        .and_then(|b| b.get("text"))
        .and_then(Value::as_str);

    if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
        return Err(RemoteError::Rejected(
            text.unwrap_or("tool reported an error").to_owned(),
        ));
    }
    match text {
        Some(t) => Ok(serde_json::from_str(t).unwrap_or_else(|_| Value::String(t.to_owned()))),
        None => Ok(result.clone()),
    }
}

fn is_not_found(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    ["not found", "not_found", "no such", "does not exist", "404"]
        .iter()
        .any(|needle| msg.contains(needle))
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// A bare array, or the array under `key`.
fn array_at<'a>(v: &'a Value, key: &str) -> &'a [Value] {
    v.as_array()
        .or_else(|| v.get(key).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn notebook_from(v: &Value) -> RemoteResult<NotebookInfo> {
    let id = str_field(v, "id")
        .ok_or_else(|| RemoteError::Malformed(format!("notebook without id: {v}")))?;
    Ok(NotebookInfo {
        id,
        title: str_field(v, "title").unwrap_or_default(),
    })
}

fn source_from(v: &Value) -> Option<RemoteSource> {
    let source_type = str_field(v, "source_type_name")
        .or_else(|| v.get("source_type").map(|t| t.to_string().trim_matches('"').to_owned()))
        .unwrap_or_default();
    Some(RemoteSource {
        id: str_field(v, "id")?,
        title: str_field(v, "title").unwrap_or_default(),
        source_type,
    })
}

/// `studio_create` arguments for a single-call artifact.
fn studio_args(notebook_id: &str, source_ids: &[String], request: &StudioRequest) -> Value {
    let mut args = json!({
        "notebook_id": notebook_id,
        "source_ids": source_ids,
        "confirm": true,
    });
    let extra = match request {
        StudioRequest::Report { format } => json!({
            "artifact_type": "report",
            "format": format.label(),
        }),
        StudioRequest::Audio { format, length } => json!({
            "artifact_type": "audio",
            "format": format.name(),
            "length": length.name(),
        }),
        StudioRequest::Infographic { orientation, detail } => json!({
            "artifact_type": "infographic",
            "orientation": orientation.name(),
            "detail_level": detail.name(),
        }),
        StudioRequest::Flashcards { difficulty } => json!({
            "artifact_type": "flashcards",
            "difficulty": difficulty.name(),
        }),
        StudioRequest::Quiz { question_count, difficulty } => json!({
            "artifact_type": "quiz",
            "question_count": question_count,
            "difficulty": difficulty.name(),
        }),
    };
    if let (Some(base), Some(extra)) = (args.as_object_mut(), extra.as_object()) {
        base.extend(extra.clone());
    }
    args
}

// ---------------------------------------------------------------------------
// RemoteStore
// ---------------------------------------------------------------------------

impl RemoteStore for McpRemote {
    fn list_notebooks(&self) -> RemoteResult<Vec<NotebookInfo>> {
        let v = self.call_tool("notebook_list", json!({ "max_results": 100 }))?;
        array_at(&v, "notebooks").iter().map(notebook_from).collect()
    }

    /// Only a rejection naming a missing notebook reads as `None`.
    fn get_notebook(&self, notebook_id: &str) -> RemoteResult<Option<NotebookInfo>> {
        match self.call_tool("notebook_get", json!({ "notebook_id": notebook_id })) {
            Ok(v) => notebook_from(&v).map(Some),
            Err(RemoteError::Rejected(msg)) if is_not_found(&msg) => {
                tracing::debug!("notebook {notebook_id} not available: {msg}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn create_notebook(&self, title: &str) -> RemoteResult<NotebookInfo> {
        let v = self.call_tool("notebook_create", json!({ "title": title }))?;
        let mut nb = notebook_from(&v)?;
        if nb.title.is_empty() {
            nb.title = title.to_owned();
        }
        Ok(nb)
    }

    fn list_sources(&self, notebook_id: &str) -> RemoteResult<Vec<RemoteSource>> {
        let v = self.call_tool("source_list_drive", json!({ "notebook_id": notebook_id }))?;
        Ok(array_at(&v, "sources").iter().filter_map(source_from).collect())
    }

    fn add_text_source(&self, notebook_id: &str, title: &str, content: &str) -> RemoteResult<String> {
        let v = self.call_tool(
            "source_add",
            json!({
                "notebook_id": notebook_id,
                "source_type": "text",
                "title": title,
                "text": content,
            }),
        )?;
        str_field(&v, "id")
            .or_else(|| str_field(&v, "source_id"))
            .ok_or_else(|| RemoteError::Malformed(format!("source_add returned no id: {v}")))
    }

    fn delete_source(&self, source_id: &str) -> RemoteResult<()> {
        self.call_tool(
            "source_delete",
            json!({ "source_id": source_id, "confirm": true }),
        )
        .map(|_| ())
    }

    fn generate_mind_map(&self, _notebook_id: &str, _source_ids: &[String]) -> RemoteResult<String> {
        Err(RemoteError::Unsupported("mind map generation"))
    }

    fn save_mind_map(
        &self,
        _notebook_id: &str,
        _title: &str,
        _mind_map: &str,
        _source_ids: &[String],
    ) -> RemoteResult<Option<String>> {
        Err(RemoteError::Unsupported("mind map generation"))
    }

    fn create_artifact(
        &self,
        notebook_id: &str,
        source_ids: &[String],
        request: &StudioRequest,
    ) -> RemoteResult<Option<String>> {
        let v = self.call_tool("studio_create", studio_args(notebook_id, source_ids, request))?;
        Ok(str_field(&v, "artifact_id"))
    }

    fn poll_artifacts(&self, notebook_id: &str) -> RemoteResult<Vec<ArtifactStatus>> {
        let v = self.call_tool(
            "studio_status",
            json!({ "notebook_id": notebook_id, "action": "status" }),
        )?;
        Ok(array_at(&v, "artifacts")
            .iter()
            .filter_map(|a| {
                Some(ArtifactStatus {
                    id: str_field(a, "artifact_id").or_else(|| str_field(a, "id"))?,
                    status: str_field(a, "status").unwrap_or_default(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrefresh_sync::artifact::{Difficulty, ReportFormat};
    use docrefresh_sync::ArtifactType;

    #[test]
    fn only_missing_notebook_rejections_read_as_not_found() {
        assert!(is_not_found("Notebook abc123 not found"));
        assert!(is_not_found("NOT_FOUND: notebook"));
        assert!(is_not_found("notebook does not exist"));
        assert!(!is_not_found("authentication expired, re-run login"));
        assert!(!is_not_found("rate limit exceeded"));
    }

    fn wrap(text: &str, is_error: bool) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": { "content": [{ "type": "text", "text": text }], "isError": is_error },
        })
    }

    #[test]
    fn event_stream_body_is_unwrapped() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n";
        let v = parse_rpc_body(body).unwrap();
        assert_eq!(v["id"], 1);
    }

    #[test]
    fn plain_json_body_is_parsed() {
        let v = parse_rpc_body("{\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{}}").unwrap();
        assert_eq!(v["id"], 2);
        assert!(matches!(parse_rpc_body("nope"), Err(RemoteError::Malformed(_))));
    }

    #[test]
    fn tool_text_is_parsed_as_json() {
        let v = tool_result(&wrap("{\"id\":\"src-1\",\"title\":\"t\"}", false)).unwrap();
        assert_eq!(v["id"], "src-1");
        let v = tool_result(&wrap("Source deleted.", false)).unwrap();
        assert_eq!(v, Value::String("Source deleted.".into()));
    }

    #[test]
    fn tool_errors_are_rejections() {
        let err = tool_result(&wrap("Set confirm=true. IRREVERSIBLE.", true)).unwrap_err();
        assert_eq!(err, RemoteError::Rejected("Set confirm=true. IRREVERSIBLE.".into()));

        let rpc = json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": -32601, "message": "no such tool" } });
        assert_eq!(tool_result(&rpc).unwrap_err(), RemoteError::Rejected("no such tool".into()));
    }

    #[test]
    fn sources_accept_numeric_types() {
        let v = json!([
            { "id": "s1", "title": "DOC: demo :: README.md", "source_type": 4, "source_type_name": "text" },
            { "id": "s2", "title": "Notes", "source_type": 4 },
            { "title": "no id" },
        ]);
        let sources: Vec<_> = array_at(&v, "sources").iter().filter_map(source_from).collect();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].source_type, "text");
        assert_eq!(sources[1].source_type, "4");
    }

    #[test]
    fn studio_args_carry_named_parameters() {
        let req = StudioRequest::Report { format: ReportFormat::StudyGuide };
        let args = studio_args("nb-1", &["s1".to_owned()], &req);
        assert_eq!(args["artifact_type"], "report");
        assert_eq!(args["format"], "Study Guide");
        assert_eq!(args["confirm"], true);
        assert_eq!(args["source_ids"][0], "s1");

        let quiz = ArtifactType::Quiz.studio_request().unwrap();
        let args = studio_args("nb-1", &[], &quiz);
        assert_eq!(args["artifact_type"], "quiz");
        assert_eq!(args["difficulty"], Difficulty::Medium.name());
        assert_eq!(args["question_count"], 5);
    }

    #[test]
    fn tool_payload_is_a_tools_call() {
        let p = tool_payload(7, "notebook_list", json!({}));
        assert_eq!(p["method"], "tools/call");
        assert_eq!(p["params"]["name"], "notebook_list");
        assert_eq!(p["id"], 7);
    }
}
