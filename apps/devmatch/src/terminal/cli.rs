use clap::{Args, Parser, Subcommand, ValueEnum};
use devmatch_api::Role;
use std::path::PathBuf;

use crate::telemetry::logging::{LogConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "devmatch",
    about = "Get matched with a coding partner, chat, and ship a project",
    author,
    version
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "DEVMATCH_API_URL",
        help = "Base URL of the devmatch backend"
    )]
    pub api_url: Option<String>,

    #[arg(
        long,
        global = true,
        env = "DEVMATCH_WS_URL",
        help = "STOMP WebSocket endpoint (defaults to <api-url>/ws)"
    )]
    pub ws_url: Option<String>,

    #[arg(
        long,
        global = true,
        env = "DEVMATCH_SESSION_COOKIE",
        value_name = "COOKIE",
        hide_env_values = true,
        help = "Cookie header issued by the backend after login, e.g. SESSION=..."
    )]
    pub session_cookie: Option<String>,

    #[command(flatten)]
    pub logging: LoggingArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    #[arg(
        long = "log-level",
        global = true,
        value_enum,
        env = "DEVMATCH_LOG_LEVEL",
        default_value_t = LogLevel::Warn,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    pub level: LogLevel,

    #[arg(
        long = "log-file",
        global = true,
        value_name = "PATH",
        env = "DEVMATCH_LOG_FILE",
        help = "Write logs to the specified file instead of stderr"
    )]
    pub file: Option<PathBuf>,
}

impl LoggingArgs {
    pub fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the OAuth login link
    Login,
    /// End the backend session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Pick the role you want to be matched for
    Role(RoleArgs),
    /// Join, inspect or leave the matching queue
    #[command(subcommand)]
    Queue(QueueCommand),
    /// Show the current match: project and partner
    Match,
    /// Print the stored chat history of a conversation
    History(HistoryArgs),
    /// Chat live in a conversation; stdin lines are sent, EOF or /quit leaves
    Chat(ChatArgs),
    /// Submit the finished project for review
    Submit(SubmitArgs),
    /// Show the review status of a submitted project
    Review(ReviewArgs),
}

#[derive(Subcommand, Debug)]
pub enum QueueCommand {
    /// Enter the queue
    Join(QueueJoinArgs),
    /// Show your position in the queue
    Status,
    /// Leave the queue
    Leave,
}

#[derive(Args, Debug)]
pub struct QueueJoinArgs {
    #[arg(long, help = "Keep polling until a match is found")]
    pub wait: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Frontend,
    Backend,
    Fullstack,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Frontend => Role::Frontend,
            RoleArg::Backend => Role::Backend,
            RoleArg::Fullstack => Role::Fullstack,
        }
    }
}

#[derive(Args, Debug)]
pub struct RoleArgs {
    #[arg(value_enum)]
    pub role: RoleArg,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[arg(value_name = "CONVERSATION")]
    pub conversation: String,

    #[arg(long, help = "Maximum number of messages to fetch")]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    #[arg(value_name = "CONVERSATION")]
    pub conversation: String,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    #[arg(value_name = "MATCH")]
    pub match_id: String,

    #[arg(long = "repo", value_name = "URL", help = "Repository with the finished project")]
    pub repository_url: String,

    #[arg(long, help = "Notes for the reviewer")]
    pub notes: Option<String>,
}

#[derive(Args, Debug)]
pub struct ReviewArgs {
    #[arg(value_name = "MATCH")]
    pub match_id: String,
}
