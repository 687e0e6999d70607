//! Core logic for compiling and playing multi-modal presentation scripts.
//!
//! A presentation script is an ordered list of commands: narration to speak
//! and shapes to draw, paced by per-command delays. This crate turns
//! conversation turns into validated scripts (via a tool-resolution loop
//! against pluggable generation/retrieval/synthesis capabilities), renders
//! narration audio concurrently, assembles multi-step modules, and plays
//! scripts back deterministically. It knows nothing about HTTP, WebSockets,
//! or any concrete provider; those live in the service crate behind the
//! [`capability`] traits.

pub mod capability;
pub mod command;
pub mod compiler;
pub mod extract;
pub mod module;
pub mod player;
pub mod prompt;
pub mod synthesis;
