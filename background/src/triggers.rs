//! Context-menu and keyboard-shortcut gestures.
//!
//! A trigger only builds a [`Request`] and sends it through the router like
//! any other caller; the outcome is reported as notifications.

use serde::Serialize;
use shared::{ArchiveApi, Document, Response, ResponseData, SettingsStore};
use tracing::{info, warn};

use crate::notify::{Notification, Notifier};
use crate::request::Request;
use crate::router::ActionRouter;

/// Entries the extension installs in the page context menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMenuItem {
    SavePage,
    SummarizePage,
}

impl ContextMenuItem {
    pub const ALL: [ContextMenuItem; 2] = [ContextMenuItem::SavePage, ContextMenuItem::SummarizePage];

    pub fn id(self) -> &'static str {
        match self {
            ContextMenuItem::SavePage => "savePage",
            ContextMenuItem::SummarizePage => "summarizePage",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ContextMenuItem::SavePage => "Save page to Marchiver",
            ContextMenuItem::SummarizePage => "Summarize and save page",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|item| item.id() == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub id: &'static str,
    pub title: &'static str,
}

pub fn menu_entries() -> Vec<MenuEntry> {
    ContextMenuItem::ALL
        .into_iter()
        .map(|item| MenuEntry {
            id: item.id(),
            title: item.title(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    /// Alt+S
    Save,
    /// Alt+M
    Summarize,
}

impl Shortcut {
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "alt+s" => Some(Shortcut::Save),
            "alt+m" => Some(Shortcut::Summarize),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    ContextMenu { item: ContextMenuItem, page_url: String },
    Shortcut { key: Shortcut, page_url: String },
}

impl Trigger {
    fn summarizes(&self) -> bool {
        matches!(
            self,
            Trigger::ContextMenu {
                item: ContextMenuItem::SummarizePage,
                ..
            } | Trigger::Shortcut {
                key: Shortcut::Summarize,
                ..
            }
        )
    }

    /// The router request this gesture stands for.
    pub fn request(&self) -> Request {
        match self {
            Trigger::ContextMenu { item, page_url } => match item {
                ContextMenuItem::SavePage => Request::save_page(page_url.as_str(), None),
                ContextMenuItem::SummarizePage => Request::summarize_page(page_url.as_str()),
            },
            // The save shortcut asks for no summary; autoSummarize still applies.
            Trigger::Shortcut { key, page_url } => match key {
                Shortcut::Save => Request::save_page(page_url.as_str(), Some(false)),
                Shortcut::Summarize => Request::summarize_page(page_url.as_str()),
            },
        }
    }

    fn progress(&self) -> Option<&'static str> {
        match self {
            Trigger::ContextMenu { .. } if self.summarizes() => Some("Summarizing page..."),
            Trigger::ContextMenu { .. } => Some("Saving page to Marchiver..."),
            Trigger::Shortcut { .. } => None,
        }
    }

    fn success_message(&self, doc: Option<&Document>) -> String {
        let message = match self {
            Trigger::ContextMenu { .. } if self.summarizes() => "Page summarized and saved successfully!",
            Trigger::ContextMenu { .. } => match doc {
                Some(doc) if doc.has_summary() => "Page saved with summary!",
                _ => "Page saved successfully!",
            },
            Trigger::Shortcut { .. } if self.summarizes() => "Page summarized and saved to Marchiver",
            Trigger::Shortcut { .. } => "Page saved to Marchiver",
        };
        message.to_string()
    }

    fn failure_message(&self, error: &str) -> String {
        let verb = if self.summarizes() { "summarizing" } else { "saving" };
        match self {
            Trigger::ContextMenu { .. } => format!("Error {} page: {}", verb, error),
            Trigger::Shortcut { .. } => format!("Error {} page", verb),
        }
    }
}

/// Run `trigger` through the router and notify about its outcome.
pub async fn run<A, S>(router: &ActionRouter<A, S>, notifier: &dyn Notifier, trigger: &Trigger) -> Response
where
    A: ArchiveApi + 'static,
    S: SettingsStore + 'static,
{
    if let Some(progress) = trigger.progress() {
        notifier.notify(Notification::info(progress));
    }

    let response = router.dispatch(&trigger.request()).await;

    if response.is_success() {
        let doc = match response.data() {
            Some(ResponseData::Document(doc)) => Some(doc),
            _ => None,
        };
        info!(document_id = doc.map(|d| d.id.as_str()), "Trigger completed");
        let notification = Notification::info(trigger.success_message(doc))
            .opening(doc.and_then(Document::viewer_path));
        notifier.notify(notification);
    } else {
        let error = response.error().unwrap_or_default();
        warn!(error, "Trigger failed");
        notifier.notify(Notification::error(trigger.failure_message(error)));
    }

    response
}
