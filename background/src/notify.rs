//! Desktop notifications raised by native triggers.

use serde::Serialize;
use uuid::Uuid;

pub const NOTIFICATION_TITLE: &str = "Marchiver";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub notification_id: Uuid,
    pub title: String,
    pub message: String,
    pub is_error: bool,
    /// Extension page to open when the notification is clicked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_on_click: Option<String>,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            notification_id: Uuid::new_v4(),
            title: NOTIFICATION_TITLE.to_string(),
            message: message.into(),
            is_error: false,
            open_on_click: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::info(message)
        }
    }

    pub fn opening(mut self, path: Option<String>) -> Self {
        self.open_on_click = path;
        self
    }
}

/// Sink for notifications. Delivery is best effort.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}
