use devmatch_api::auth::{self, Navigator};
use devmatch_api::completion::CompletionFlow;
use devmatch_api::queue::{self, DEFAULT_POLL_INTERVAL};
use devmatch_api::{ApiClient, MatchmakingApi, QueueState};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use url::Url;

use crate::client::{ChatClient, ChatController};
use crate::config::Config;
use crate::session::{HistorySource, SessionState};
use crate::terminal::cli::{self, Command, QueueCommand};
use crate::terminal::error::CliError;
use crate::terminal::render::{self, ViewPrinter};

/// Leaves a chat when typed on its own line.
const QUIT: &str = "/quit";

/// Prints redirect targets instead of opening a browser.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, target: &Url) {
        eprintln!("Open {target} in your browser.");
    }
}

pub async fn run(cli: cli::Cli) -> Result<(), CliError> {
    let config = resolve_config(&cli)?;

    match cli.command {
        Command::Login => {
            let api_config = config.api_config()?;
            auth::begin_login(&api_config, &TerminalNavigator)?;
            eprintln!(
                "After signing in, copy the SESSION cookie into DEVMATCH_SESSION_COOKIE \
                 (or pass --session-cookie)."
            );
            Ok(())
        }
        Command::Logout => {
            let api_config = config.api_config()?;
            let api = ApiClient::new(api_config.clone())?;
            auth::logout(&api, &api_config, &TerminalNavigator).await?;
            println!("signed out");
            Ok(())
        }
        Command::Whoami => {
            let user = api(&config)?.current_user().await?;
            println!("{}", render::user_line(&user));
            Ok(())
        }
        Command::Role(args) => {
            let user = api(&config)?.select_role(args.role.into()).await?;
            println!("{}", render::user_line(&user));
            Ok(())
        }
        Command::Queue(command) => run_queue(&config, command).await,
        Command::Match => {
            let current = api(&config)?.current_match().await?.ok_or(CliError::NoMatch)?;
            for line in render::match_lines(&current) {
                println!("{line}");
            }
            Ok(())
        }
        Command::History(args) => {
            let limit = args.limit.unwrap_or(config.history_limit);
            let messages = api(&config)?
                .load_history(&args.conversation, limit)
                .await?;
            for message in &messages {
                println!("{}", render::message_line(message));
            }
            Ok(())
        }
        Command::Chat(args) => run_chat(&config, args.conversation).await,
        Command::Submit(args) => {
            let api = api(&config)?;
            let mut flow = CompletionFlow::new(args.match_id);
            flow.open();
            if let Some(draft) = flow.draft_mut() {
                draft.repository_url = args.repository_url;
                draft.notes = args.notes.unwrap_or_default();
            }
            let review = flow.submit(&api).await?;
            println!("{}", render::review_line(&review));
            Ok(())
        }
        Command::Review(args) => {
            let review = api(&config)?.review(&args.match_id).await?;
            println!("{}", render::review_line(&review));
            Ok(())
        }
    }
}

/// Environment first, then command line flags on top.
fn resolve_config(cli: &cli::Cli) -> Result<Config, CliError> {
    let mut config = Config::from_env()?;
    if let Some(api_url) = &cli.api_url {
        config.api_url = api_url.clone();
    }
    if let Some(ws_url) = &cli.ws_url {
        config.ws_url = Some(ws_url.clone());
    }
    if let Some(cookie) = &cli.session_cookie {
        config.session_cookie = Some(cookie.clone());
    }
    Ok(config)
}

fn api(config: &Config) -> Result<ApiClient, CliError> {
    Ok(ApiClient::new(config.api_config()?)?)
}

async fn run_queue(config: &Config, command: QueueCommand) -> Result<(), CliError> {
    let api = api(config)?;
    match command {
        QueueCommand::Join(args) => {
            let status = api.join_queue().await?;
            println!("{}", render::queue_line(&status));
            if args.wait && status.state != QueueState::Matched {
                let match_id = queue::wait_for_match(&api, DEFAULT_POLL_INTERVAL).await?;
                println!("matched: {match_id}");
            }
        }
        QueueCommand::Status => {
            let status = api.queue_status().await?;
            println!("{}", render::queue_line(&status));
        }
        QueueCommand::Leave => {
            api.leave_queue().await?;
            println!("left the queue");
        }
    }
    Ok(())
}

async fn run_chat(config: &Config, conversation: String) -> Result<(), CliError> {
    let client = ChatClient::from_config(config)?;
    let mut controller = ChatController::new(client);
    controller.set_conversation(Some(&conversation)).await;
    let Some(mut updates) = controller.session().map(|session| session.watch()) else {
        return Ok(());
    };
    info!(target: "devmatch::session", %conversation, "chat started");

    let mut printer = ViewPrinter::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut outcome = Ok(());
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = updates.borrow_and_update().clone();
                for line in printer.render(&view) {
                    println!("{line}");
                }
                if view.state == SessionState::FailedPermanent {
                    if let Some(err) = view.error {
                        outcome = Err(err.into());
                    }
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == QUIT {
                    break;
                }
                if !controller.view().can_send() {
                    eprintln!("not connected; message not sent");
                    continue;
                }
                controller.send(line);
            }
        }
    }

    controller.set_conversation(None).await;
    outcome
}
