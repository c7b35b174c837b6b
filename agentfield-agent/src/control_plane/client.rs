//! HTTP control-plane client

use super::types::{
    AuditFilters, CredentialRequest, ExecutionNote, MemoryRequest, NodeRegistration,
    RemoteExecuteRequest, RemoteExecuteResponse, ShutdownNotice, StatusUpdate, VectorMatch,
    VectorSearchRequest, VectorSetRequest,
};
use super::ControlPlane;
use crate::config::AgentConfig;
use crate::constants::{
    self, headers, AUDIT_EXPORT_PATH, CREDENTIAL_ISSUE_PATH, EXECUTION_NOTE_PATH,
    MEMORY_DELETE_PATH, MEMORY_EVENTS_BUFFER, MEMORY_EVENTS_WS_PATH, MEMORY_GET_PATH,
    MEMORY_SET_PATH, MEMORY_VECTOR_SEARCH_PATH, MEMORY_VECTOR_SET_PATH, NODE_REGISTER_PATH,
    WORKFLOW_EVENTS_PATH,
};
use crate::error::{AgentError, AgentResult};
use agentfield_core::{ExecutionStatusUpdate, MemoryChangeEvent, WorkflowEvent};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type EventSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    connect_timeout: Duration,
    event_timeout: Duration,
    callback_timeout: Duration,
}

impl HttpControlPlane {
    pub fn new(
        base_url: impl AsRef<str>,
        token: Option<String>,
        request_timeout: Duration,
    ) -> AgentResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AgentError::internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            token,
            connect_timeout: request_timeout,
            event_timeout: request_timeout,
            callback_timeout: request_timeout,
        })
    }

    /// Client for the configured control plane, or `None` when the node
    /// runs standalone.
    pub fn from_config(config: &AgentConfig) -> AgentResult<Option<Self>> {
        let Some(server) = config.server_url.as_deref() else {
            return Ok(None);
        };
        let mut client = Self::new(server, config.token.clone(), config.request_timeout)?;
        client.event_timeout = config.event_timeout;
        client.callback_timeout = config.callback.attempt_timeout;
        Ok(Some(client))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Accept", "application/json");
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Send `builder`, mapping network failures to transport errors and
    /// non-2xx responses to control-plane errors.
    async fn send(&self, operation: &'static str, builder: RequestBuilder) -> AgentResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| AgentError::transport(operation, e))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default().trim().to_string();
        Err(AgentError::ControlPlane {
            operation,
            status,
            message,
        })
    }

    async fn post_json<B>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> AgentResult<Response>
    where
        B: Serialize + ?Sized + Sync,
    {
        let mut builder = self.request(Method::POST, path).json(body);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        self.send(operation, builder).await
    }

    async fn connect_events(&self) -> AgentResult<EventSocket> {
        const OPERATION: &str = "memory_events";
        let url = constants::websocket_url(&self.base_url, MEMORY_EVENTS_WS_PATH);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| AgentError::transport(OPERATION, e))?;
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| AgentError::internal(format!("Invalid token header: {}", e)))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, _) =
            tokio::time::timeout(self.connect_timeout, tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| AgentError::transport(OPERATION, "connect timed out"))?
                .map_err(|e| AgentError::transport(OPERATION, e))?;
        Ok(stream)
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        response: Response,
    ) -> AgentResult<T> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AgentError::transport(operation, e))?;
        if bytes.is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn register_node(&self, registration: &NodeRegistration) -> AgentResult<()> {
        self.post_json("register_node", NODE_REGISTER_PATH, registration, None)
            .await
            .map(|_| ())
            .map_err(|e| AgentError::Registration(e.to_string()))
    }

    async fn update_status(&self, node_id: &str, update: &StatusUpdate) -> AgentResult<()> {
        let builder = self
            .request(Method::PATCH, &constants::node_status_path(node_id))
            .json(update);
        self.send("update_status", builder).await.map(|_| ())
    }

    async fn notify_shutdown(&self, node_id: &str, notice: &ShutdownNotice) -> AgentResult<()> {
        self.post_json(
            "notify_shutdown",
            &constants::node_shutdown_path(node_id),
            notice,
            None,
        )
        .await
        .map(|_| ())
    }

    async fn execute(&self, request: &RemoteExecuteRequest) -> AgentResult<RemoteExecuteResponse> {
        let mut builder = self
            .request(Method::POST, &constants::execute_target_path(&request.target))
            .json(&serde_json::json!({ "input": request.input }));
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AgentError::transport(request.target.clone(), e))?;

        let status = response.status();
        if status != StatusCode::OK {
            let message = response.text().await.unwrap_or_default().trim().to_string();
            return Err(AgentError::RemoteExecution {
                target: request.target.clone(),
                status: Some(status.as_u16()),
                message,
            });
        }
        match self.read_json("execute", response).await {
            Err(AgentError::Serialization(e)) => Err(AgentError::RemoteExecution {
                target: request.target.clone(),
                status: Some(status.as_u16()),
                message: format!("malformed execute response: {}", e),
            }),
            other => other,
        }
    }

    async fn send_workflow_event(&self, event: &WorkflowEvent) -> AgentResult<()> {
        self.post_json(
            "send_workflow_event",
            WORKFLOW_EVENTS_PATH,
            event,
            Some(self.event_timeout),
        )
        .await
        .map(|_| ())
    }

    async fn post_execution_status(&self, update: &ExecutionStatusUpdate) -> AgentResult<()> {
        self.post_json(
            "post_execution_status",
            &constants::execution_status_path(&update.execution_id),
            update,
            Some(self.callback_timeout),
        )
        .await
        .map(|_| ())
    }

    async fn add_execution_note(
        &self,
        execution_id: &str,
        note: &ExecutionNote,
    ) -> AgentResult<()> {
        let builder = self
            .request(Method::POST, EXECUTION_NOTE_PATH)
            .header(headers::EXECUTION_ID, execution_id)
            .timeout(self.event_timeout)
            .json(note);
        self.send("add_execution_note", builder).await.map(|_| ())
    }

    async fn memory_get(&self, request: &MemoryRequest) -> AgentResult<Option<Value>> {
        match self.post_json("memory_get", MEMORY_GET_PATH, request, None).await {
            Ok(response) => {
                let body: Value = self.read_json("memory_get", response).await?;
                Ok(body.get("data").cloned().filter(|v| !v.is_null()))
            }
            Err(AgentError::ControlPlane { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn memory_set(&self, request: &MemoryRequest) -> AgentResult<()> {
        self.post_json("memory_set", MEMORY_SET_PATH, request, None)
            .await
            .map(|_| ())
    }

    async fn memory_delete(&self, request: &MemoryRequest) -> AgentResult<()> {
        self.post_json("memory_delete", MEMORY_DELETE_PATH, request, None)
            .await
            .map(|_| ())
    }

    async fn memory_vector_set(&self, request: &VectorSetRequest) -> AgentResult<()> {
        self.post_json("memory_vector_set", MEMORY_VECTOR_SET_PATH, request, None)
            .await
            .map(|_| ())
    }

    async fn memory_vector_search(
        &self,
        request: &VectorSearchRequest,
    ) -> AgentResult<Vec<VectorMatch>> {
        let response = self
            .post_json("memory_vector_search", MEMORY_VECTOR_SEARCH_PATH, request, None)
            .await?;
        let body: Value = self.read_json("memory_vector_search", response).await?;
        let matches = match body {
            Value::Array(_) => body,
            Value::Object(mut obj) => obj.remove("results").unwrap_or(Value::Array(Vec::new())),
            _ => Value::Array(Vec::new()),
        };
        Ok(serde_json::from_value(matches)?)
    }

    async fn subscribe_memory_events(&self) -> AgentResult<mpsc::Receiver<MemoryChangeEvent>> {
        let stream = self.connect_events().await?;
        let (tx, rx) = mpsc::channel(MEMORY_EVENTS_BUFFER);
        tokio::spawn(forward_memory_events(stream, tx));
        Ok(rx)
    }

    async fn issue_credential(&self, request: &CredentialRequest) -> AgentResult<Value> {
        let response = self
            .post_json("issue_credential", CREDENTIAL_ISSUE_PATH, request, None)
            .await?;
        self.read_json("issue_credential", response).await
    }

    async fn export_audit_trail(&self, filters: &AuditFilters) -> AgentResult<Value> {
        let builder = self.request(Method::GET, AUDIT_EXPORT_PATH).query(filters);
        let response = self.send("export_audit_trail", builder).await?;
        self.read_json("export_audit_trail", response).await
    }
}

/// Decode text frames into change events until either side goes away.
async fn forward_memory_events(mut stream: EventSocket, tx: mpsc::Sender<MemoryChangeEvent>) {
    loop {
        let message = tokio::select! {
            _ = tx.closed() => break,
            message = stream.next() => message,
        };
        match message {
            Some(Ok(Message::Text(text))) => {
                match serde_json::from_str::<MemoryChangeEvent>(&text) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Undecodable memory event"),
                }
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Memory event stream error");
                break;
            }
        }
    }
    let _ = stream.close(None).await;
}
