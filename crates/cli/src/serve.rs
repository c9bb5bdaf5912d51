//! Daemon mode – newline-delimited JSON requests over a Unix socket.
//!
//! Request:  `{"id": "1", "method": "query", "params": {"tag": "ready"}}`
//! Response: `{"id": "1", "http_status": 503, "result": { ...health report... }}`
//!
//! Methods: `query` (params: `filter` | `tag` | `tags` | `all`, optional
//! `detailed`), `live`, `ready`, `list`.

use health_engine::types::ErrorCode;
use health_engine::{HealthResponse, HealthService, TagFilter};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonRequest {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DaemonError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonError {
    pub code: ErrorCode,
    pub message: String,
}

impl DaemonResponse {
    fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            http_status: None,
            result: None,
            error: Some(DaemonError {
                code: ErrorCode::InvalidInput,
                message: message.into(),
            }),
        }
    }
}

pub async fn run_daemon(socket_path: PathBuf, service: HealthService) -> anyhow::Result<()> {
    // Remove stale socket if it exists
    let _ = std::fs::remove_file(&socket_path);

    let listener = UnixListener::bind(&socket_path).map_err(|e| {
        anyhow::anyhow!("cannot bind socket {}: {}", socket_path.display(), e)
    })?;
    tracing::info!(socket = %socket_path.display(), "healthctl daemon listening");

    tokio::select! {
        _ = serve(listener, service) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }
    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}

/// Accept loop. Every connection gets its own task, so one slow query never
/// holds up another client.
pub async fn serve(listener: UnixListener, service: HealthService) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let service = service.clone();
                tokio::spawn(async move { handle_connection(stream, service).await });
            }
            Err(e) => {
                tracing::warn!(error = %e, "accept error");
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, service: HealthService) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_request(&line, &service).await;
        let mut resp_json = serde_json::to_string(&response).unwrap_or_else(|_| "{}".into());
        resp_json.push('\n');
        if writer.write_all(resp_json.as_bytes()).await.is_err() {
            break;
        }
    }
}

pub async fn handle_request(line: &str, service: &HealthService) -> DaemonResponse {
    let req: DaemonRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            return DaemonResponse::error("unknown", format!("invalid JSON request: {}", e));
        }
    };
    tracing::debug!(id = %req.id, method = %req.method, "daemon request");

    let detailed = req
        .params
        .get("detailed")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let report = match req.method.as_str() {
        "query" => match filter_from_params(&req.params) {
            Ok(filter) => service.query_filter(&filter).await,
            Err(msg) => return DaemonResponse::error(req.id, msg),
        },
        "live" => service.live().await,
        "ready" => service.ready().await,
        "list" => {
            let probes: Vec<_> = service
                .registry()
                .list()
                .into_iter()
                .map(|(name, tags)| serde_json::json!({ "name": name, "tags": tags }))
                .collect();
            return DaemonResponse {
                id: req.id,
                http_status: None,
                result: Some(serde_json::Value::Array(probes)),
                error: None,
            };
        }
        other => {
            return DaemonResponse::error(req.id, format!("unknown method: {}", other));
        }
    };

    let body = if detailed {
        HealthResponse::detailed(&report)
    } else {
        HealthResponse::from(&report)
    };
    DaemonResponse {
        id: req.id,
        http_status: Some(body.status_code()),
        result: serde_json::to_value(&body).ok(),
        error: None,
    }
}

/// `{"filter": <TagFilter>}`, `{"tag": "ready"}`, `{"tags": ["db", "sql"]}`
/// (any of), `{"all": true}` or nothing for every probe.
fn filter_from_params(params: &serde_json::Value) -> Result<TagFilter, String> {
    match params.get("all") {
        None => {}
        Some(serde_json::Value::Bool(false)) => {}
        Some(serde_json::Value::Bool(true)) => {
            if ["filter", "tag", "tags"].iter().any(|k| params.get(k).is_some()) {
                return Err("'all' cannot be combined with a tag selection".to_string());
            }
            return Ok(TagFilter::All);
        }
        Some(_) => return Err("'all' must be a boolean".to_string()),
    }
    if let Some(f) = params.get("filter") {
        return serde_json::from_value(f.clone()).map_err(|e| format!("invalid filter: {}", e));
    }
    if let Some(tag) = params.get("tag") {
        return tag
            .as_str()
            .map(TagFilter::tag)
            .ok_or_else(|| "'tag' must be a string".to_string());
    }
    if let Some(tags) = params.get("tags") {
        return serde_json::from_value::<Vec<String>>(tags.clone())
            .map(TagFilter::AnyOf)
            .map_err(|e| format!("'tags' must be an array of strings: {}", e));
    }
    Ok(TagFilter::All)
}
