//! Mock email provider for exercising the HTTP transport
//!
//! Accepts one HTTP/1.1 request per connection, records it, and answers with
//! the next scripted response (the last one repeats once the script runs out).
#![allow(dead_code)] // Test utility module - not all methods used in every test

use std::{
    collections::{HashMap, VecDeque},
    net::SocketAddr,
    sync::Arc,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::Mutex,
    task::JoinHandle,
};

/// Request captured by the mock provider
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Header names lower-cased
    pub headers: HashMap<String, String>,
    pub body: serde_json::Value,
}

/// Scripted response
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: String,
}

impl ProviderResponse {
    pub fn accepted(id: &str) -> Self {
        Self {
            status: 202,
            body: serde_json::json!({ "id": id, "status": "Running" }).to_string(),
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

pub struct MockProvider {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl MockProvider {
    pub fn builder() -> MockProviderBuilder {
        MockProviderBuilder {
            responses: VecDeque::new(),
        }
    }

    /// Endpoint URL to configure the transport with
    pub fn endpoint(&self) -> String {
        format!("http://{}/emails:send", self.addr)
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }

    async fn handle_client(
        stream: TcpStream,
        response: ProviderResponse,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut reader = BufReader::new(stream);
        let mut line = String::new();

        reader.read_line(&mut line).await?;
        let mut parts = line.split_whitespace();
        let method = parts.next().unwrap_or_default().to_string();
        let path = parts.next().unwrap_or_default().to_string();

        let mut headers = HashMap::new();
        loop {
            line.clear();
            reader.read_line(&mut line).await?;
            let header = line.trim_end();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        let length = headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        let mut body = vec![0; length];
        reader.read_exact(&mut body).await?;

        requests.lock().await.push(RecordedRequest {
            method,
            path,
            headers,
            body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
        });

        let reply = format!(
            "HTTP/1.1 {} Mock\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            response.status,
            response.body.len(),
            response.body
        );

        let mut stream = reader.into_inner();
        stream.write_all(reply.as_bytes()).await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok(())
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct MockProviderBuilder {
    responses: VecDeque<ProviderResponse>,
}

impl MockProviderBuilder {
    #[must_use]
    pub fn respond(mut self, response: ProviderResponse) -> Self {
        self.responses.push_back(response);
        self
    }

    pub async fn build(self) -> std::io::Result<MockProvider> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let mut responses = self.responses;
        let mut last = ProviderResponse::accepted("op-default");

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                if let Some(next) = responses.pop_front() {
                    last = next;
                }

                let response = last.clone();
                let requests = Arc::clone(&recorded);
                tokio::spawn(async move {
                    if let Err(e) = MockProvider::handle_client(stream, response, requests).await {
                        tracing::debug!("Mock provider connection error: {e}");
                    }
                });
            }
        });

        Ok(MockProvider {
            addr,
            requests,
            handle,
        })
    }
}
