//! Shared data models.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::settings::Settings;
use crate::Error;

/// Archived page record, as returned by the archive service.
///
/// Fields the host does not interpret (metadata, author, version, score...)
/// are kept in `extra` and passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub date: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document {
    /// Extension-relative path of the document viewer for this record.
    ///
    /// Unsaved documents come back with an empty id and have no viewer.
    pub fn viewer_path(&self) -> Option<String> {
        if self.id.is_empty() {
            None
        } else {
            Some(format!("document.html?id={}", self.id))
        }
    }

    pub fn has_summary(&self) -> bool {
        self.summary.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

/// Editable document fields sent with `PUT /documents/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl DocumentUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.tags.is_none() && self.category.is_none() && self.summary.is_none()
    }
}

/// Payload of a successful response, serialized under an action-specific key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseData {
    Message(String),
    ApiEndpoint(String),
    Document(Document),
    Results(Vec<Document>),
    Settings(Settings),
    Healthy(bool),
}

/// Uniform reply envelope delivered for every request.
///
/// Built only through [`Response::success`] and [`Response::failure`] so that
/// a successful response never carries an error and a failed one never
/// carries data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    success: bool,
    #[serde(flatten)]
    data: Option<ResponseData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Response {
    pub fn success(data: ResponseData) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            "Unknown error".to_string()
        } else {
            message
        };
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&ResponseData> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn into_data(self) -> Option<ResponseData> {
        self.data
    }
}

impl From<Error> for Response {
    fn from(err: Error) -> Self {
        Response::failure(err.to_string())
    }
}

impl From<Document> for ResponseData {
    fn from(doc: Document) -> Self {
        ResponseData::Document(doc)
    }
}

impl From<Vec<Document>> for ResponseData {
    fn from(docs: Vec<Document>) -> Self {
        ResponseData::Results(docs)
    }
}

impl From<Settings> for ResponseData {
    fn from(settings: Settings) -> Self {
        ResponseData::Settings(settings)
    }
}
