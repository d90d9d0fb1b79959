use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::filter::StatusFilter;
use crate::task::TaskId;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskflow",
    version,
    about = "TaskFlow: terminal client for a TaskFlow todo server",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Overrides `api_base_url` and TASKFLOW_API_URL.
    #[arg(long = "api-url", global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Store an access token, or exchange email and password for one.
    Login(LoginArgs),
    /// Register a new account.
    Signup(SignupArgs),
    /// Forget the stored access token.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// List tasks, optionally filtered.
    List(ListArgs),
    /// Show total, active and completed counts.
    Stats,
    /// Create a task.
    Add(AddArgs),
    /// Flip a task between open and done.
    Toggle { id: TaskId },
    /// Change the title or description of a task.
    Edit(EditArgs),
    /// Delete a task.
    #[command(alias = "delete")]
    Rm { id: TaskId },
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct LoginArgs {
    #[arg(long, conflicts_with_all = ["email", "password"])]
    pub token: Option<String>,

    #[arg(long, requires = "password")]
    pub email: Option<String>,

    #[arg(long, requires = "email")]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SignupArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub password: String,

    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ListArgs {
    #[arg(long, default_value_t = StatusFilter::All)]
    pub status: StatusFilter,

    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AddArgs {
    pub title: String,

    #[arg(long, short = 'd')]
    pub description: Option<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct EditArgs {
    pub id: TaskId,

    #[arg(long, short = 't')]
    pub title: Option<String>,

    /// An empty value clears the description.
    #[arg(long, short = 'd')]
    pub description: Option<String>,
}

impl Command {
    /// Commands that go through a mounted dashboard.
    pub fn needs_dashboard(&self) -> bool {
        matches!(
            self,
            Self::List(_)
                | Self::Stats
                | Self::Add(_)
                | Self::Toggle { .. }
                | Self::Edit(_)
                | Self::Rm { .. }
        )
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> GlobalCli {
        GlobalCli::try_parse_from(std::iter::once("taskflow").chain(args.iter().copied()))
            .expect("parse")
    }

    #[test]
    fn global_flags_work_after_the_subcommand() {
        let cli = parse(&["list", "-vv", "--api-url", "http://api.test", "--status", "done"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.api_url.as_deref(), Some("http://api.test"));
        assert_eq!(
            cli.command,
            Command::List(ListArgs {
                status: StatusFilter::Completed,
                search: None
            })
        );
    }

    #[test]
    fn edit_takes_numeric_id_and_optional_fields() {
        let cli = parse(&["edit", "7", "--title", "Renamed"]);
        assert_eq!(
            cli.command,
            Command::Edit(EditArgs {
                id: TaskId::new(7),
                title: Some("Renamed".to_string()),
                description: None
            })
        );
        assert!(cli.command.needs_dashboard());

        assert!(GlobalCli::try_parse_from(["taskflow", "toggle", "seven"]).is_err());
    }

    #[test]
    fn login_token_conflicts_with_password_flow() {
        let both = ["taskflow", "login", "--token", "t", "--email", "a@b.c"];
        assert!(GlobalCli::try_parse_from(both).is_err());
        assert!(GlobalCli::try_parse_from(["taskflow", "login", "--email", "a@b.c"]).is_err());

        let cli = parse(&["login", "--email", "a@b.c", "--password", "pw"]);
        assert!(!cli.command.needs_dashboard());
    }

    #[test]
    fn only_task_commands_mount_the_dashboard() {
        let dashboard: [&[&str]; 6] = [
            &["list"],
            &["stats"],
            &["add", "Buy milk"],
            &["toggle", "1"],
            &["edit", "1", "-t", "x"],
            &["rm", "1"],
        ];
        for args in dashboard {
            assert!(parse(args).command.needs_dashboard(), "{args:?}");
        }

        let direct: [&[&str]; 4] = [
            &["login", "--token", "t"],
            &["signup", "--email", "a@b.c", "--password", "pw"],
            &["logout"],
            &["whoami"],
        ];
        for args in direct {
            assert!(!parse(args).command.needs_dashboard(), "{args:?}");
        }
    }

    #[test]
    fn rm_accepts_delete_alias() {
        assert_eq!(parse(&["delete", "3"]).command, Command::Rm { id: TaskId::new(3) });
    }
}
