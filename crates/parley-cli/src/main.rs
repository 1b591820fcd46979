//! parley - terminal client for a streaming conversational agent

mod config;
mod ui;

use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use parley_client::{ChatSession, ChatView, ConnectionStatus};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// How long one-shot mode waits for the first connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// parley - chat with a streaming agent server
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Conversation endpoint (default: ws://localhost:8000/messaging/ws)
    #[arg(long)]
    url: Option<String>,

    /// Send a single message, print the reply and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they don't interleave with the conversation
    let filter = if args.verbose {
        EnvFilter::new("parley=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();
    let chat_config = cfg.chat_config(args.url);

    if args.print_config {
        let effective = config::Config {
            url: Some(chat_config.url.clone()),
            reconnect: chat_config.reconnect,
        };
        print!("{}", toml::to_string_pretty(&effective)?);
        return Ok(());
    }

    let session = ChatSession::connect(&chat_config).context("Invalid configuration")?;

    let result = match args.command {
        Some(command) => run_command(&session, &command).await,
        None => run_interactive(&session, &chat_config.url).await,
    };

    session.close().await;
    result
}

/// One-shot mode: connect, send, print the reply as it streams, exit
async fn run_command(session: &ChatSession, command: &str) -> anyhow::Result<()> {
    let mut views = session.subscribe();

    tokio::time::timeout(
        CONNECT_TIMEOUT,
        views.wait_for(|v| v.connection_status == ConnectionStatus::Connected),
    )
    .await
    .context("Timed out connecting to server")?
    .context("Session closed before connecting")?;

    let mut printer = ui::Printer::without_status();
    // Messages already on screen are not part of this reply
    printer.render(&session.view());

    session.send_message(command)?;

    loop {
        let view: ChatView = views.borrow_and_update().clone();
        emit(&printer.render(&view))?;
        if !view.is_loading {
            if !printer.at_line_start() {
                println!();
            }
            if let Some(error) = view.error {
                anyhow::bail!(error);
            }
            return Ok(());
        }
        if views.changed().await.is_err() {
            anyhow::bail!("Session closed before the reply completed");
        }
    }
}

/// Interactive mode: stdin lines are sent, views are printed as they change
async fn run_interactive(session: &ChatSession, url: &str) -> anyhow::Result<()> {
    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        eprintln!("parley ({})  /quit to exit", url);
        eprintln!();
    }

    let mut views = session.subscribe();
    let mut printer = ui::Printer::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    emit(&printer.render(&views.borrow_and_update()))?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line? else {
                    // EOF
                    break;
                };
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input == "/quit" || input == "/exit" {
                    break;
                }
                if let Err(e) = session.send_message(input) {
                    // Connection failures already show up in the view
                    if e.is_transient() {
                        tracing::debug!("Send failed: {}", e);
                    } else {
                        eprintln!("Error: {}", e);
                    }
                }
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let out = printer.render(&views.borrow_and_update());
                emit(&out)?;
            }
        }
    }

    if !printer.at_line_start() {
        println!();
    }
    Ok(())
}

fn emit(out: &str) -> std::io::Result<()> {
    if out.is_empty() {
        return Ok(());
    }
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(out.as_bytes())?;
    stdout.flush()
}
