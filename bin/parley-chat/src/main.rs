//! parley-chat – terminal client for a parley server.
//!
//! Without a subcommand it opens an interactive chat: every line typed is sent
//! as one turn and the reply is printed as it streams in.  `/new` starts a new
//! conversation, `/quit` (or end of input) exits.

mod client;
mod session;

use std::io::Write;

use clap::{Parser, Subcommand};
use parley_core::{ConsumerUpdate, Locale};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::client::ApiClient;

#[derive(Parser)]
#[command(name = "parley-chat", version, about = "Chat with a parley server from the terminal")]
struct Cli {
    /// Base URL of the server.
    #[arg(long, env = "PARLEY_SERVER", default_value = "http://127.0.0.1:3000")]
    server: String,

    /// Session id to list conversations under (generated and remembered when omitted).
    #[arg(long, env = "PARLEY_SESSION")]
    session: Option<String>,

    /// Language for client-side notices (en, ja).
    #[arg(long, env = "PARLEY_LOCALE", default_value = "en")]
    locale: Locale,

    /// Log client activity to stderr.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat (the default).
    Chat {
        /// Continue an existing conversation.
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Send a single message and print the reply.
    Send {
        message: String,
        #[arg(long)]
        conversation: Option<String>,
    },
    /// List this session's conversations, most recently active first.
    List,
    /// Print a conversation and its messages.
    Show { id: String },
    /// Change a conversation's title.
    Rename { id: String, title: String },
    /// Delete a conversation and its messages.
    Delete { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "parley_chat=debug,parley_core=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let session_id = session::resolve(cli.session);
    debug!(%session_id, server = %cli.server, "client starting");
    let client = ApiClient::new(&cli.server, session_id)?;

    match cli.command.unwrap_or(Command::Chat { conversation: None }) {
        Command::Chat { conversation } => repl(&client, cli.locale, conversation).await?,
        Command::Send { message, conversation } => {
            let outcome = turn(&client, cli.locale, &message, conversation.as_deref()).await?;
            if let Some(id) = outcome.conversation_id {
                eprintln!("[conversation {id}]");
            }
            if outcome.failed {
                std::process::exit(1);
            }
        }
        Command::List => {
            let conversations = client.list().await?;
            if conversations.is_empty() {
                println!("no conversations for session {}", client.session_id());
            }
            for c in conversations {
                println!("{}  {}  {}", c.id, c.updated_at, c.title);
            }
        }
        Command::Show { id } => {
            let detail = client.show(&id).await?;
            println!("# {} ({})", detail.title, detail.id);
            for m in detail.messages {
                println!("\n[{}] {}\n{}", m.role, m.created_at, m.content);
            }
        }
        Command::Rename { id, title } => {
            let c = client.rename(&id, &title).await?;
            println!("{}  {}", c.id, c.title);
        }
        Command::Delete { id } => {
            client.delete(&id).await?;
            println!("deleted {id}");
        }
    }
    Ok(())
}

async fn repl(client: &ApiClient, locale: Locale, mut conversation: Option<String>) -> anyhow::Result<()> {
    eprintln!("session {} (type /new for a new conversation, /quit to exit)", client.session_id());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else { break };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/new" => {
                conversation = None;
                eprintln!("[new conversation]");
                continue;
            }
            _ => {}
        }
        match turn(client, locale, line, conversation.as_deref()).await {
            Ok(outcome) => {
                if conversation.is_none() {
                    conversation = outcome.conversation_id;
                }
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }
    Ok(())
}

/// Send one message and print the reply as it grows.
async fn turn(
    client: &ApiClient,
    locale: Locale,
    message: &str,
    conversation: Option<&str>,
) -> Result<parley_core::ConsumerOutcome, client::ClientError> {
    let mut printer = DeltaPrinter::default();
    let outcome = client
        .send(message, conversation, locale.retry_notice(), |update| printer.show(update))
        .await?;
    println!();
    Ok(outcome)
}

/// Prints only the part of the cumulative reply not yet on screen.
#[derive(Default)]
struct DeltaPrinter {
    printed: usize,
}

impl DeltaPrinter {
    fn show(&mut self, update: &ConsumerUpdate) {
        let mut out = std::io::stdout();
        match update {
            ConsumerUpdate::Content(content) => {
                if let Some(delta) = content.get(self.printed..) {
                    let _ = write!(out, "{delta}");
                    let _ = out.flush();
                }
                self.printed = content.len();
            }
            ConsumerUpdate::Failed(notice) => {
                let _ = write!(out, "\n{notice}");
                self.printed = 0;
            }
            ConsumerUpdate::ConversationAssigned(id) => debug!(conversation_id = %id, "conversation assigned"),
        }
    }
}
