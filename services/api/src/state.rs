//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the compiler, module pipeline, and registries.

use crate::config::Config;
use crate::gateway::retrieval::{EmbeddingRetriever, InMemoryVectorStore};
use crate::registry::{ModuleRegistry, SessionRegistry};
use slate_core::compiler::ScriptCompiler;
use slate_core::module::ModulePipeline;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub compiler: Arc<ScriptCompiler>,
    pub pipeline: Arc<ModulePipeline>,
    /// Concrete handle kept for document indexing; the compiler holds it as
    /// a `dyn Retriever`.
    pub indexer: Arc<EmbeddingRetriever>,
    pub vector_store: Arc<InMemoryVectorStore>,
    pub modules: Arc<ModuleRegistry>,
    pub sessions: Arc<SessionRegistry>,
    pub config: Arc<Config>,
}
