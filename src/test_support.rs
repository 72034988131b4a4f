//! Provider doubles shared by the unit tests.

use async_trait::async_trait;
use crate::error::{QaError, Result};
use crate::providers::traits::{CompletionProvider, EmbeddingProvider};
use crate::providers::utils::HashEmbeddings;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

type Responder = dyn Fn(&str) -> Result<String> + Send + Sync;

/// Answers every prompt with a closure and records what it was asked.
#[derive(Clone)]
pub struct ScriptedProvider {
    responder: Arc<Responder>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProvider {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self::new(|_| Err(QaError::LanguageModel("rate limited".to_string())))
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        (self.responder)(prompt)
    }

    async fn get_model_info(&self) -> Result<String> {
        Ok("scripted".to_string())
    }

    fn temperature(&self) -> f32 {
        0.0
    }
}

/// Hash embeddings that count calls and can be switched into failure.
#[derive(Clone)]
pub struct CountingEmbeddings {
    inner: HashEmbeddings,
    calls: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl CountingEmbeddings {
    pub fn new(dimensions: usize) -> Self {
        Self {
            inner: HashEmbeddings::new(dimensions).expect("non-zero dimensions"),
            calls: Arc::new(AtomicUsize::new(0)),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn record(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(QaError::EmbeddingProvider("provider unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbeddings {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.record()?;
        self.inner.embed_documents(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.record()?;
        self.inner.embed_query(text).await
    }
}

/// Serves exactly one HTTP response with a JSON body and returns the server's
/// base URL (`http://127.0.0.1:<port>`).
pub async fn serve_once(status_line: &'static str, body: impl Into<String>) -> String {
    let body = body.into();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 64 * 1024];
        let _ = socket.read(&mut buf).await;
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });
    format!("http://{}", addr)
}
