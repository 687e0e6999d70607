//! API Models
//!
//! This module defines the data structures served by the REST API and used
//! for generating OpenAPI documentation with `utoipa`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slate_core::command::CommandScript;
use slate_core::module::ModuleLength;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    Generating,
    Completed,
    Failed,
}

// Implement Display for easy conversion to a string, useful for logging.
impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleStatus::Generating => write!(f, "generating"),
            ModuleStatus::Completed => write!(f, "completed"),
            ModuleStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A pre-generated learning module and its playable script.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ModuleRecord {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub title: String,
    pub prompt: String,
    #[schema(value_type = String, example = "Medium")]
    pub length: ModuleLength,
    #[schema(value_type = String, example = "generating")]
    pub status: ModuleStatus,
    pub language_code: String,
    /// Present once generation completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub script: Option<CommandScript>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Summary view of a module, without the (potentially large) script.
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ModuleSummary {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub title: String,
    #[schema(value_type = String, example = "completed")]
    pub status: ModuleStatus,
    pub updated_at: DateTime<Utc>,
}

impl From<&ModuleRecord> for ModuleSummary {
    fn from(record: &ModuleRecord) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            status: record.status,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateDocumentPayload {
    #[schema(example = "photosynthesis-notes.txt")]
    pub name: String,
    /// The full document text; it is chunked and embedded on upload.
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentResponse {
    pub id: String,
    pub name: String,
    pub chunks: usize,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
