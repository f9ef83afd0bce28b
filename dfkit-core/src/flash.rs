//! Flash messages: notifications queued for display on the next rendered page

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a flash message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    #[default]
    Info,
    Warning,
    Error,
}

impl FlashLevel {
    /// CSS class used when rendering the message
    pub fn css_class(&self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Info => "info",
            FlashLevel::Warning => "warning",
            FlashLevel::Error => "danger",
        }
    }
}

impl fmt::Display for FlashLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlashLevel::Success => "success",
            FlashLevel::Info => "info",
            FlashLevel::Warning => "warning",
            FlashLevel::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub message: String,
    pub level: FlashLevel,
}

impl FlashMessage {
    pub fn new(message: impl Into<String>, level: FlashLevel) -> Self {
        Self {
            message: message.into(),
            level,
        }
    }
}

/// Ordered queue of pending flash messages.
///
/// Messages keep insertion order; `drain` empties the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashQueue {
    messages: Vec<FlashMessage>,
}

impl FlashQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>, level: FlashLevel) {
        self.messages.push(FlashMessage::new(message, level));
    }

    pub fn drain(&mut self) -> Vec<FlashMessage> {
        std::mem::take(&mut self.messages)
    }

    pub fn messages(&self) -> &[FlashMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_keeps_order_and_drains() {
        let mut queue = FlashQueue::new();
        queue.push("Saved", FlashLevel::Success);
        queue.push("Check your input", FlashLevel::Warning);

        assert_eq!(queue.len(), 2);
        let drained = queue.drain();
        assert_eq!(drained[0].message, "Saved");
        assert_eq!(drained[1].level, FlashLevel::Warning);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_level_serialization() {
        let json = serde_json::to_string(&FlashMessage::new("x", FlashLevel::Error)).unwrap();
        assert_eq!(json, r#"{"message":"x","level":"error"}"#);
        assert_eq!(FlashLevel::Error.css_class(), "danger");
        assert_eq!(FlashLevel::default(), FlashLevel::Info);
    }
}
