//! Capability Gateways
//!
//! Concrete providers behind the core capability traits:
//!
//! - `generation`: an OpenAI-compatible chat client with the canvas command
//!   set and the retrieval tool registered as functions.
//! - `retrieval`: document chunking, embeddings, and an in-memory vector
//!   store with cosine-similarity search.
//! - `synthesis`: the Google Cloud Text-to-Speech REST API, plus a disabled
//!   stand-in for deployments without a TTS key.

pub mod generation;
pub mod retrieval;
pub mod synthesis;
