//! CLI argument parsing

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use fleetpush_protocol::{NotificationKind, UserType};

/// Main CLI application structure
#[derive(Parser, Debug)]
#[command(
    name = "fleetpush",
    version,
    about = "Listen for and publish real-time fleet notifications",
    long_about = "Connects to a fleetpush pub/sub server over WebSocket, registers as the given user, \
                  and listens for notifications, publishes them, or queries the server.\n\n\
                  Settings are layered: built-in defaults, then --config, then FLEETPUSH_* \
                  environment variables, then command-line flags."
)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Server WebSocket URL (overrides config and FLEETPUSH_SERVER_URL)
    #[arg(long, short = 's', global = true)]
    pub server_url: Option<String>,

    /// Config file (TOML, YAML or JSON)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// User id to register as
    #[arg(
        long,
        short = 'u',
        global = true,
        env = "FLEETPUSH_USER_ID",
        default_value = "fleetpush-cli"
    )]
    pub user_id: String,

    /// Role to register as: driver, client or warehouse
    #[arg(long, short = 't', global = true, env = "FLEETPUSH_USER_TYPE", default_value = "client")]
    pub user_type: UserType,

    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value = "human")]
    pub format: OutputFormat,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Print incoming notifications for this user until interrupted
    Listen {
        /// Extra topics to subscribe to
        #[arg(long = "topic", short = 'T')]
        topics: Vec<String>,

        /// Exit after this many notifications
        #[arg(long, short = 'n')]
        count: Option<usize>,
    },

    /// Send a notification to one user
    Send {
        /// Recipient user id
        target: String,

        #[command(flatten)]
        notification: NotificationArgs,
    },

    /// Send a notification to every user of a role
    Broadcast {
        /// Recipient role: driver, client or warehouse
        role: UserType,

        #[command(flatten)]
        notification: NotificationArgs,
    },

    /// Publish raw JSON to any topic
    Publish {
        /// Topic name
        topic: String,

        /// JSON value to publish as `data`
        data: String,
    },

    /// Show server status
    Status,

    /// List registered users
    Users,
}

/// Content of an outgoing notification
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct NotificationArgs {
    /// Heading
    pub title: String,

    /// Body text
    pub message: String,

    /// Severity: success, error, warning or info
    #[arg(long, short = 'k', default_value = "info")]
    pub kind: NotificationKind,

    /// Extra application data as a JSON object
    #[arg(long, short = 'd')]
    pub data: Option<String>,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable
    Human,
    /// Pretty-printed JSON
    Json,
    /// One JSON document per line
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["fleetpush", "status"]).unwrap();
        assert_eq!(cli.command, Commands::Status);
        assert_eq!(cli.format, OutputFormat::Human);
        assert_eq!(cli.log_level, "warn");
        assert!(cli.server_url.is_none());
        assert!(!cli.log_json);
    }

    #[test]
    fn test_identity_flags_parse_roles() {
        let cli = Cli::try_parse_from([
            "fleetpush",
            "--user-id",
            "d-1",
            "--user-type",
            "Driver",
            "users",
        ])
        .unwrap();
        assert_eq!(cli.user_id, "d-1");
        assert_eq!(cli.user_type, UserType::Driver);

        assert!(Cli::try_parse_from(["fleetpush", "--user-type", "admin", "users"]).is_err());
    }

    #[test]
    fn test_send_arguments() {
        let cli = Cli::try_parse_from([
            "fleetpush",
            "send",
            "a@x.com",
            "Order ready",
            "Dock 3",
            "--kind",
            "success",
            "--data",
            r#"{"orderId":42}"#,
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Commands::Send {
                target: "a@x.com".into(),
                notification: NotificationArgs {
                    title: "Order ready".into(),
                    message: "Dock 3".into(),
                    kind: NotificationKind::Success,
                    data: Some(r#"{"orderId":42}"#.into()),
                },
            }
        );
    }

    #[test]
    fn test_listen_collects_topics() {
        let cli = Cli::try_parse_from([
            "fleetpush", "listen", "-T", "orders", "--topic", "announcements", "-n", "3",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Commands::Listen {
                topics: vec!["orders".into(), "announcements".into()],
                count: Some(3),
            }
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "fleetpush",
            "broadcast",
            "warehouse",
            "Stock",
            "Low on pallets",
            "--server-url",
            "ws://push.example:3008",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.server_url.as_deref(), Some("ws://push.example:3008"));
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Commands::Broadcast { role: UserType::Warehouse, .. }
        ));
    }
}
