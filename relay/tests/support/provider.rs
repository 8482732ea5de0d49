//! Minimal provider stub that accepts every request with the same status

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

pub struct StubProvider {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl StubProvider {
    /// Answer every request with `status`
    pub async fn start(status: u16) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let hits = Arc::new(AtomicUsize::new(0));

        let handle = {
            let hits = hits.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let hits = hits.clone();
                    tokio::spawn(async move {
                        let n = hits.fetch_add(1, Ordering::SeqCst) + 1;
                        let _ = Self::answer(stream, status, n).await;
                    });
                }
            })
        };

        Ok(Self { addr, hits, handle })
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/emails:send", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    async fn answer(stream: TcpStream, status: u16, n: usize) -> std::io::Result<()> {
        let mut reader = BufReader::new(stream);
        let mut content_length = 0;

        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 || line.trim().is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':')
                && name.eq_ignore_ascii_case("content-length")
            {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }

        let mut body = vec![0; content_length];
        reader.read_exact(&mut body).await?;

        let payload = format!(r#"{{"id":"op-{n}"}}"#);
        let response = format!(
            "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
            payload.len()
        );

        let mut stream = reader.into_inner();
        stream.write_all(response.as_bytes()).await?;
        stream.shutdown().await
    }
}

impl Drop for StubProvider {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
