//! Output formatting for CLI results

use serde::Serialize;

use fleetpush_protocol::{Notification, RegisteredUser};

use crate::cli::OutputFormat;
use crate::error::{CliError, CliResult};

/// Format and display output based on format preference
#[derive(Debug, Clone, Copy)]
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    #[must_use]
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Display any serializable value
    ///
    /// # Errors
    ///
    /// Fails only if the value cannot be serialized to JSON.
    pub fn display<T: Serialize + ?Sized>(&self, value: &T) -> CliResult<()> {
        match self.format {
            OutputFormat::Human | OutputFormat::Json => self.display_json(value, true),
            OutputFormat::Compact => self.display_json(value, false),
        }
    }

    /// Display one received notification
    ///
    /// # Errors
    ///
    /// Fails only if the value cannot be serialized to JSON.
    pub fn display_notification(&self, notification: &Notification) -> CliResult<()> {
        match self.format {
            OutputFormat::Human => {
                println!("{}", render_notification(notification));
                Ok(())
            }
            // One line per notification so the stream can be piped
            _ => self.display_json(notification, false),
        }
    }

    /// Display registered users
    ///
    /// # Errors
    ///
    /// Fails only if the value cannot be serialized to JSON.
    pub fn display_users(&self, users: &[RegisteredUser]) -> CliResult<()> {
        match self.format {
            OutputFormat::Human => {
                if users.is_empty() {
                    println!("No users registered");
                    return Ok(());
                }
                for user in users {
                    println!("{}", render_user(user));
                }
                println!("\n{} user(s)", users.len());
                Ok(())
            }
            _ => self.display(users),
        }
    }

    /// Report a completed action
    ///
    /// # Errors
    ///
    /// Fails only if the value cannot be serialized to JSON.
    pub fn display_done(&self, action: &str, topic: &str) -> CliResult<()> {
        match self.format {
            OutputFormat::Human => {
                println!("{action} on {topic}");
                Ok(())
            }
            _ => self.display(&serde_json::json!({ "action": action, "topic": topic })),
        }
    }

    /// Display error with suggestions
    pub fn display_error(&self, error: &CliError) {
        eprintln!("Error [{}]: {error}", error.category());

        let suggestions = error.suggestions();
        if !suggestions.is_empty() {
            eprintln!("\nSuggestions:");
            for suggestion in suggestions {
                eprintln!("  • {suggestion}");
            }
        }
    }

    fn display_json<T: Serialize + ?Sized>(&self, value: &T, pretty: bool) -> CliResult<()> {
        let json = if pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        println!("{json}");
        Ok(())
    }
}

/// `[kind] title: message`, followed by attached data when present.
pub fn render_notification(notification: &Notification) -> String {
    let mut line = format!(
        "[{}] {}: {}",
        notification.kind, notification.title, notification.message
    );
    if let Some(data) = notification.data.as_ref().filter(|d| !d.is_empty()) {
        line.push(' ');
        line.push_str(&serde_json::Value::Object(data.clone()).to_string());
    }
    line
}

fn render_user(user: &RegisteredUser) -> String {
    match &user.user_type {
        Some(role) => format!("{} ({role})", user.user_id),
        None => user.user_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetpush_protocol::NotificationKind;
    use serde_json::{Map, json};

    fn notification(data: Option<Map<String, serde_json::Value>>) -> Notification {
        Notification {
            id: "n-1".into(),
            title: "Order ready".into(),
            message: "Dock 3".into(),
            kind: NotificationKind::Success,
            timestamp: 0,
            data,
        }
    }

    #[test]
    fn test_render_notification() {
        assert_eq!(
            render_notification(&notification(None)),
            "[success] Order ready: Dock 3"
        );

        let mut data = Map::new();
        data.insert("orderId".into(), json!(42));
        assert_eq!(
            render_notification(&notification(Some(data))),
            r#"[success] Order ready: Dock 3 {"orderId":42}"#
        );
        assert_eq!(
            render_notification(&notification(Some(Map::new()))),
            "[success] Order ready: Dock 3"
        );
    }

    #[test]
    fn test_render_user() {
        let user: RegisteredUser =
            serde_json::from_value(json!({"userId": "d-1", "userType": "driver"})).unwrap();
        assert_eq!(render_user(&user), "d-1 (driver)");

        let user: RegisteredUser = serde_json::from_value(json!({"userId": "anon"})).unwrap();
        assert_eq!(render_user(&user), "anon");
    }
}
