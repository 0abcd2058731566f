use aayushi_cli::{
    CompletionClient, CompletionOptions, Composer, ComposerError, SendStatus, TranscriptEvent,
};
use aayushi_core::{ConversationStore, JsonFileStorage, Role};
use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "aayushi")]
#[command(about = "Terminal chat with the Aayushi assistant")]
#[command(version)]
struct Cli {
    #[arg(long, env = "AAYUSHI_SERVER_URL", default_value = "http://localhost:3000")]
    server_url: String,

    /// Directory holding the conversation history
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Completion model
    #[arg(long)]
    model: Option<String>,

    /// Language the assistant answers in
    #[arg(long)]
    language: Option<String>,

    #[arg(long)]
    temperature: Option<f32>,

    #[arg(long)]
    max_tokens: Option<u32>,

    /// Search the web for every message
    #[arg(long, default_value = "false")]
    web: bool,

    /// Enable debug mode
    #[arg(long, short, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive chat (default)
    Chat,
    /// Send a single message in the active conversation
    Send {
        /// Message content
        message: String,
    },
    /// List saved conversations
    History,
}

type ActiveSend = Arc<Mutex<Option<CancellationToken>>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let data_dir = match cli.data_dir.clone() {
        Some(dir) => dir,
        None => dirs::home_dir()
            .context("Cannot locate the home directory; pass --data-dir")?
            .join(".aayushi"),
    };
    let storage = JsonFileStorage::new(&data_dir);
    storage
        .init()
        .await
        .with_context(|| format!("Cannot create {}", storage.base_path().display()))?;
    log::debug!("History stored in {}", storage.base_path().display());

    let store = ConversationStore::load(Arc::new(storage)).await;
    let mut composer = Composer::new(store, CompletionClient::new(&cli.server_url));

    let options = CompletionOptions {
        model: cli.model.clone(),
        temperature: cli.temperature,
        max_tokens: cli.max_tokens,
        use_web: cli.web,
        language: cli.language.clone(),
    };

    let active: ActiveSend = Arc::new(Mutex::new(None));
    spawn_interrupt_handler(active.clone());

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_interactive_chat(&mut composer, &options, &active).await,
        Commands::Send { message } => {
            send_and_render(&mut composer, &message, &options, &active).await?;
            Ok(())
        }
        Commands::History => {
            print_conversations(&composer);
            Ok(())
        }
    }
}

/// Ctrl-C cancels the reply in flight, or exits when there is none.
fn spawn_interrupt_handler(active: ActiveSend) {
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            let token = active.lock().ok().and_then(|slot| slot.as_ref().cloned());
            match token {
                Some(token) => token.cancel(),
                None => {
                    println!();
                    std::process::exit(0);
                }
            }
        }
    });
}

async fn run_interactive_chat(
    composer: &mut Composer,
    options: &CompletionOptions,
    active: &ActiveSend,
) -> anyhow::Result<()> {
    println!("{}", "Aayushi chat. Type /help for commands.".cyan());
    if let Some(conversation) = composer.active() {
        println!("{}", format!("Continuing \"{}\"", conversation.title).dimmed());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".green().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            match run_command(composer, command).await {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => {
                    println!("{}", format!("Error: {}", e).red());
                    continue;
                }
            }
        }

        // Errors are already rendered by the transcript callback.
        let _ = send_and_render(composer, line, options, active).await;
    }

    Ok(())
}

/// Run a slash command. Returns false when the session should end.
async fn run_command(composer: &mut Composer, command: &str) -> Result<bool, ComposerError> {
    let (name, arg) = match command.split_once(' ') {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match name {
        "quit" | "exit" => return Ok(false),
        "new" => {
            composer.new_conversation().await?;
            println!("{}", "Started a new conversation".dimmed());
        }
        "list" => print_conversations(composer),
        "show" => print_transcript(composer),
        "switch" => match conversation_at(composer, arg) {
            Some(id) => {
                composer.select_conversation(&id)?;
                print_transcript(composer);
            }
            None => println!("{}", "Usage: /switch <number from /list>".yellow()),
        },
        "rename" => match composer.active().map(|c| c.id.clone()) {
            Some(id) if !arg.is_empty() => {
                composer.rename_conversation(&id, arg).await?;
                println!("{}", format!("Renamed to \"{}\"", arg).dimmed());
            }
            Some(_) => println!("{}", "Usage: /rename <title>".yellow()),
            None => println!("{}", "No active conversation".yellow()),
        },
        "delete" => {
            let target = if arg.is_empty() {
                composer.active().map(|c| c.id.clone())
            } else {
                conversation_at(composer, arg)
            };
            match target {
                Some(id) => {
                    composer.delete_conversation(&id).await?;
                    println!("{}", "Conversation deleted".dimmed());
                }
                None => println!("{}", "Nothing to delete".yellow()),
            }
        }
        "clear" => {
            composer.clear_history().await?;
            println!("{}", "History cleared".dimmed());
        }
        _ => print_help(),
    }

    Ok(true)
}

async fn send_and_render(
    composer: &mut Composer,
    text: &str,
    options: &CompletionOptions,
    active: &ActiveSend,
) -> Result<(), ComposerError> {
    let token = CancellationToken::new();
    if let Ok(mut slot) = active.lock() {
        *slot = Some(token.clone());
    }

    let result = composer
        .send(text, options, &token, |event| match event {
            TranscriptEvent::Started { sources } => {
                print!("{} ", "aayushi:".magenta().bold());
                if !sources.is_empty() {
                    println!("{}", format!("({} web sources)", sources.len()).dimmed());
                }
            }
            TranscriptEvent::Chunk(chunk) => {
                print!("{}", chunk);
                let _ = std::io::stdout().flush();
            }
            TranscriptEvent::Completed => println!(),
            TranscriptEvent::Cancelled => println!("{}", " [stopped]".yellow()),
            TranscriptEvent::Failed(error) => println!("{}", format!("\nError: {}", error).red()),
        })
        .await;

    if let Ok(mut slot) = active.lock() {
        *slot = None;
    }

    match &result {
        Ok(outcome) if outcome.status == SendStatus::Completed => print_sources(composer),
        Ok(_) => {}
        Err(ComposerError::Client(_)) => {}
        Err(e) => println!("{}", format!("Error: {}", e).red()),
    }
    result.map(|_| ())
}

fn conversation_at(composer: &Composer, arg: &str) -> Option<String> {
    let index: usize = arg.parse().ok()?;
    composer
        .conversations()
        .get(index.checked_sub(1)?)
        .map(|c| c.id.clone())
}

fn print_conversations(composer: &Composer) {
    if composer.conversations().is_empty() {
        println!("{}", "No conversations yet".dimmed());
        return;
    }

    let active_id = composer.active().map(|c| c.id.as_str());
    for (i, conversation) in composer.conversations().iter().enumerate() {
        let marker = if Some(conversation.id.as_str()) == active_id { "*" } else { " " };
        println!(
            "{} {:>2}. {} {}",
            marker.green(),
            i + 1,
            conversation.title,
            format!("({} messages)", conversation.messages.len()).dimmed()
        );
    }
}

fn print_transcript(composer: &Composer) {
    let Some(conversation) = composer.active() else {
        println!("{}", "No active conversation".dimmed());
        return;
    };

    println!("{}", format!("── {} ──", conversation.title).cyan());
    for message in &conversation.messages {
        match message.role {
            Role::User => println!("{} {}", "you:".green().bold(), message.content),
            Role::Assistant => {
                let content = if message.content.is_empty() {
                    "(no reply)".dimmed().to_string()
                } else {
                    message.content.clone()
                };
                let suffix = if message.truncated { " [incomplete]" } else { "" };
                println!("{} {}{}", "aayushi:".magenta().bold(), content, suffix.yellow());
            }
        }
    }
}

fn print_sources(composer: &Composer) {
    let sources = composer
        .active()
        .and_then(|c| c.last_message())
        .and_then(|m| m.sources.as_ref());

    if let Some(sources) = sources {
        println!("{}", "Sources:".dimmed());
        for (i, source) in sources.iter().enumerate() {
            println!("  {}. {} {}", i + 1, source.title, source.href.blue());
        }
    }
}

fn print_help() {
    println!("{}", "Commands:".cyan());
    println!("  /new             start a new conversation");
    println!("  /list            list conversations");
    println!("  /show            print the active conversation");
    println!("  /switch <n>      switch to conversation n");
    println!("  /rename <title>  rename the active conversation");
    println!("  /delete [n]      delete conversation n or the active one");
    println!("  /clear           delete all conversations");
    println!("  /quit            exit");
    println!("Prefix a message with web: to search the web for it.");
}
