//! Document Retrieval Gateway
//!
//! Uploaded documents are chunked, embedded, and held in an in-memory vector
//! store. Retrieval embeds the query and returns the top-scoring chunks
//! across the caller's document allow-list, joined into one excerpt block
//! for the tool-resolution loop.

use anyhow::{Context, Result};
use async_openai::{Client, config::OpenAIConfig, types::CreateEmbeddingRequestArgs};
use async_trait::async_trait;
use slate_core::capability::Retriever;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

const CHUNK_SIZE: usize = 500;
const CHUNK_OVERLAP: usize = 50;
const TOP_K: usize = 3;

/// Splits text into overlapping chunks of roughly `chunk_size` characters.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let stride = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        start += stride;
    }
    chunks
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }
    dot / (magnitude_a * magnitude_b)
}

struct StoredDocument {
    name: String,
    chunks: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

/// Chunk vectors for every uploaded document, keyed by document id.
#[derive(Default)]
pub struct InMemoryVectorStore {
    documents: RwLock<HashMap<String, StoredDocument>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: String, name: String, chunks: Vec<String>, vectors: Vec<Vec<f32>>) {
        info!(document_id = %id, vectors = vectors.len(), "Stored document embeddings");
        self.documents.write().await.insert(
            id,
            StoredDocument {
                name,
                chunks,
                vectors,
            },
        );
    }

    /// The best-scoring chunks across the allow-listed documents, highest
    /// first. Unknown ids are skipped.
    pub async fn search(
        &self,
        query_vector: &[f32],
        document_ids: &[String],
        top_k: usize,
    ) -> Vec<(String, f32)> {
        let documents = self.documents.read().await;
        let mut scored: Vec<(String, f32)> = Vec::new();
        for id in document_ids {
            let Some(document) = documents.get(id) else {
                continue;
            };
            for (chunk, vector) in document.chunks.iter().zip(&document.vectors) {
                scored.push((chunk.clone(), cosine_similarity(query_vector, vector)));
            }
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }

    /// One line per stored document, for the session preamble.
    pub async fn summaries(&self, document_ids: &[String]) -> Option<String> {
        let documents = self.documents.read().await;
        let names: Vec<String> = document_ids
            .iter()
            .filter_map(|id| documents.get(id).map(|d| format!("- {}", d.name)))
            .collect();
        if names.is_empty() {
            None
        } else {
            Some(names.join("\n"))
        }
    }
}

/// Embedding-backed implementation of the core `Retriever` trait.
pub struct EmbeddingRetriever {
    client: Client<OpenAIConfig>,
    model: String,
    store: Arc<InMemoryVectorStore>,
}

impl EmbeddingRetriever {
    pub fn new(config: OpenAIConfig, model: String, store: Arc<InMemoryVectorStore>) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            store,
        }
    }

    async fn embed(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(inputs)
            .build()?;
        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .context("Embedding request failed")?;
        Ok(response.data.into_iter().map(|e| e.embedding).collect())
    }

    /// Chunks, embeds, and stores a document; returns its new id.
    pub async fn index_document(&self, name: &str, text: &str) -> Result<(String, usize)> {
        let chunks = chunk_text(text, CHUNK_SIZE, CHUNK_OVERLAP);
        let vectors = self.embed(chunks.clone()).await?;
        let id = Uuid::new_v4().to_string();
        let count = chunks.len();
        self.store
            .insert(id.clone(), name.to_string(), chunks, vectors)
            .await;
        Ok((id, count))
    }
}

#[async_trait]
impl Retriever for EmbeddingRetriever {
    async fn retrieve(&self, query: &str, document_ids: &[String]) -> Result<String> {
        if document_ids.is_empty() {
            return Ok(String::new());
        }
        let query_vector = self
            .embed(vec![query.to_string()])
            .await?
            .into_iter()
            .next()
            .context("Embedding response was empty")?;

        let top = self.store.search(&query_vector, document_ids, TOP_K).await;
        debug!(query, results = top.len(), "Retrieved relevant chunks");
        Ok(top
            .into_iter()
            .map(|(chunk, _)| chunk)
            .collect::<Vec<_>>()
            .join("\n\n---\n\n"))
    }
}
