//! Inbound requests and the closed set of actions they map to.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use shared::{DocumentUpdate, Error, Result, SettingsPatch};

/// A request as sent by the content script, popup or a native trigger.
///
/// Payload fields are action-specific; unused ones are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summarize: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<DocumentUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SettingsPatch>,
}

impl Request {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn save_page(url: impl Into<String>, summarize: Option<bool>) -> Self {
        Self {
            url: Some(url.into()),
            summarize,
            ..Self::new("savePage")
        }
    }

    pub fn summarize_page(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::new("summarizePage")
        }
    }
}

/// When the reply to an action is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    /// Before `handle` returns
    Immediate,
    /// From a spawned task, after `handle` has returned
    Deferred,
}

/// Every operation the router knows how to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Ping,
    GetApiEndpoint,
    SavePage { url: String, summarize: Option<bool> },
    SummarizePage { url: String },
    Search {
        query: String,
        semantic: bool,
        limit: Option<u32>,
        offset: u32,
    },
    GetDocument { id: String },
    UpdateDocument { id: String, update: DocumentUpdate },
    GetSimilar { id: String },
    CheckHealth,
    GetSettings,
    SaveSettings { patch: SettingsPatch },
    ResetSettings,
}

impl Action {
    /// Classify and validate a request. Unknown tags fail closed.
    pub fn parse(request: &Request) -> Result<Action> {
        let action = match request.action.as_str() {
            "ping" => Action::Ping,
            "getApiEndpoint" => Action::GetApiEndpoint,
            "savePage" => Action::SavePage {
                url: page_url(request.url.as_deref())?,
                summarize: request.summarize,
            },
            "summarizePage" => Action::SummarizePage {
                url: page_url(request.url.as_deref())?,
            },
            "search" => Action::Search {
                query: request.query.clone().unwrap_or_default(),
                semantic: request.semantic.unwrap_or(false),
                limit: request.limit.filter(|&l| l > 0),
                offset: request.offset.unwrap_or(0),
            },
            "getDocument" => Action::GetDocument {
                id: document_id(request.document_id.as_deref())?,
            },
            "updateDocument" => {
                let update = request.update.clone().unwrap_or_default();
                if update.is_empty() {
                    return Err(Error::Validation("No document fields to update".to_string()));
                }
                Action::UpdateDocument {
                    id: document_id(request.document_id.as_deref())?,
                    update,
                }
            }
            "getSimilar" => Action::GetSimilar {
                id: document_id(request.document_id.as_deref())?,
            },
            "checkHealth" => Action::CheckHealth,
            "getSettings" => Action::GetSettings,
            "saveSettings" => Action::SaveSettings {
                patch: request
                    .settings
                    .clone()
                    .ok_or_else(|| Error::Validation("Settings are required".to_string()))?,
            },
            "resetSettings" => Action::ResetSettings,
            other => return Err(Error::UnroutedAction(other.to_string())),
        };
        Ok(action)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Ping => "ping",
            Action::GetApiEndpoint => "getApiEndpoint",
            Action::SavePage { .. } => "savePage",
            Action::SummarizePage { .. } => "summarizePage",
            Action::Search { .. } => "search",
            Action::GetDocument { .. } => "getDocument",
            Action::UpdateDocument { .. } => "updateDocument",
            Action::GetSimilar { .. } => "getSimilar",
            Action::CheckHealth => "checkHealth",
            Action::GetSettings => "getSettings",
            Action::SaveSettings { .. } => "saveSettings",
            Action::ResetSettings => "resetSettings",
        }
    }

    pub fn timing(&self) -> Timing {
        match self {
            Action::Ping | Action::GetApiEndpoint | Action::GetSettings => Timing::Immediate,
            Action::SavePage { .. }
            | Action::SummarizePage { .. }
            | Action::Search { .. }
            | Action::GetDocument { .. }
            | Action::UpdateDocument { .. }
            | Action::GetSimilar { .. }
            | Action::CheckHealth
            | Action::SaveSettings { .. }
            | Action::ResetSettings => Timing::Deferred,
        }
    }
}

fn page_url(raw: Option<&str>) -> Result<String> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(Error::Validation("URL is required".to_string()));
    }

    let parsed = Url::parse(raw).map_err(|e| Error::Validation(format!("Invalid URL '{}': {}", raw, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(raw.to_string()),
        scheme => Err(Error::Validation(format!(
            "Only http and https pages can be archived, got {}",
            scheme
        ))),
    }
}

fn document_id(raw: Option<&str>) -> Result<String> {
    match raw.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(Error::Validation("Document id is required".to_string())),
    }
}
