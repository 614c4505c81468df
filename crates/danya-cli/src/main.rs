//! danya - terminal chat client for Yandex AI Studio agents

mod commands;
mod config;
mod store;
mod utils;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use danya_agent::{
    BotReply, ChatEvent, ChatSession, ChatStore, MemoryStore, OrchestrationMode,
    OrchestratorConfig, PriceTable, ProviderTransport, Roster, SessionConfig, TurnOutcome,
    TurnReport, TurnResult,
};
use danya_ai::YandexClient;

use crate::config::Config;
use crate::utils::{format_cost, format_duration};

/// danya - chat with Yandex AI Studio agents
#[derive(Parser, Debug)]
#[command(name = "danya")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Orchestration mode (single, fan-out)
    #[arg(short, long)]
    mode: Option<String>,

    /// Response format (text, json)
    #[arg(short, long)]
    format: Option<String>,

    /// Disable history compression
    #[arg(long)]
    no_compression: bool,

    /// Directory for messages, history and usage
    #[arg(long)]
    data_dir: Option<String>,

    /// Keep the chat in memory only
    #[arg(long)]
    no_persist: bool,

    /// Run in non-interactive mode with a single prompt
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("danya=debug,danya_agent=debug,danya_ai=debug")
            .with_writer(io::stderr)
            .init();
    } else if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(io::stderr)
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match Config::init() {
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

    let mut cfg = Config::load();
    if let Some(dir) = &args.data_dir {
        cfg.data_dir = Some(dir.clone());
    }

    let client_config = match cfg.client_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            eprintln!("Set credentials with: export YANDEX_API_KEY=... YANDEX_FOLDER_ID=...");
            eprintln!("Or add them to the config file: danya --init-config");
            std::process::exit(1);
        }
    };
    let folder_id = client_config.folder_id.clone();

    let mode = cfg.orchestration_mode(args.mode.as_deref())?;
    let endpoint = match mode {
        OrchestrationMode::Single { endpoint, .. } => endpoint,
        OrchestrationMode::FanOut => danya_agent::Endpoint::Agent,
    };
    let roster = Roster::new(cfg.agents(&folder_id, endpoint)?)?;

    let format = match &args.format {
        Some(f) => config::parse_format(f)?,
        None => cfg.format.unwrap_or_default(),
    };

    let mut compression = cfg.compression_config(&folder_id);
    if args.no_compression {
        compression.enabled = false;
    }

    let defaults = SessionConfig::default();
    let session_config = SessionConfig {
        orchestrator: OrchestratorConfig {
            mode,
            ..Default::default()
        },
        format,
        compression,
        tokenizer_model_uri: cfg.tokenizer_model_uri.clone(),
        prices: PriceTable::builtin(),
        greeting: cfg.greeting.clone().unwrap_or(defaults.greeting),
        cleared_greeting: cfg.cleared_greeting.clone().unwrap_or(defaults.cleared_greeting),
    };

    let client = YandexClient::new(client_config).context("failed to create API client")?;
    let transport = Arc::new(ProviderTransport::new(client));
    let store: Arc<dyn ChatStore> = if args.no_persist {
        Arc::new(MemoryStore::new())
    } else {
        let dir = cfg.data_dir();
        tracing::debug!("Data dir: {}", dir.display());
        Arc::new(store::FileStore::new(dir))
    };

    let session = ChatSession::new(session_config, roster, transport, store);
    if let Err(e) = session.restore().await {
        eprintln!("Warning: Failed to restore chat: {}", e);
    }

    if let Some(command) = &args.command {
        return run_command(&session, command, args.verbose).await;
    }

    run_interactive(&session, args.verbose).await
}

/// Send one prompt and print the replies
async fn run_command(session: &ChatSession, command: &str, verbose: bool) -> anyhow::Result<()> {
    match session.send_message(command).await {
        TurnOutcome::Completed(result) => {
            print_turn(&result, session.mode(), verbose);
            if let Some(message) = result.error {
                anyhow::bail!(message);
            }
            Ok(())
        }
        TurnOutcome::Ignored => anyhow::bail!("empty prompt"),
        TurnOutcome::Busy => anyhow::bail!("another request is in flight"),
    }
}

async fn run_interactive(session: &ChatSession, verbose: bool) -> anyhow::Result<()> {
    // Show startup info and the chat so far (only if TTY)
    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        let primary = session.roster().primary();
        match session.mode() {
            OrchestrationMode::FanOut => {
                eprintln!("danya (fan-out, {} agents)", session.roster().len())
            }
            OrchestrationMode::Single { .. } => eprintln!("danya ({})", primary.display_name),
        }
        eprintln!();
    }
    for message in session.messages().await {
        print_message(&message);
    }

    // Compression progress is only visible through events
    let mut events = session.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ChatEvent::CompressionStart { turns }) => {
                    println!("[Compressing {} turns]", turns);
                }
                Ok(ChatEvent::CompressionEnd {
                    compressed: true,
                    saved_tokens,
                }) => {
                    println!("[Compressed: ~{} tokens saved]", saved_tokens);
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let handle = session.handle();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        // Handle slash commands
        if input.starts_with('/') {
            let history = session.history().await;
            let ctx = commands::CommandContext {
                mode: session.mode(),
                format: session.format().await,
                usage: session.usage().await,
                history: &history,
                roster: session.roster(),
            };
            if let Some(result) = commands::execute_command(input, &ctx) {
                match result {
                    commands::CommandResult::Clear => {
                        if let Err(e) = session.clear_chat().await {
                            eprintln!("Warning: {}", e);
                        }
                        if let Some(greeting) = session.messages().await.last() {
                            print_message(greeting);
                        }
                    }
                    commands::CommandResult::Exit => {
                        break;
                    }
                    commands::CommandResult::Message(msg) => {
                        println!("{}", msg);
                    }
                    commands::CommandResult::ChangeFormat(format) => {
                        session.set_format(format).await;
                        println!("Response format set to: {}", commands::format_name(format));
                    }
                    commands::CommandResult::Unknown(cmd) => {
                        println!("Unknown command: /{}", cmd);
                        println!("Type /help for available commands.");
                    }
                }
                continue;
            }
        }

        // Ctrl-C aborts the request, not the program
        let turn = session.send_message(input);
        tokio::pin!(turn);
        let outcome = loop {
            tokio::select! {
                outcome = &mut turn => break outcome,
                _ = tokio::signal::ctrl_c() => {
                    handle.abort();
                }
            }
        };

        match outcome {
            TurnOutcome::Completed(result) => print_turn(&result, session.mode(), verbose),
            TurnOutcome::Busy => eprintln!("Still waiting for the previous reply"),
            TurnOutcome::Ignored => {}
        }
    }

    printer.abort();
    Ok(())
}

fn print_turn(result: &TurnResult, mode: OrchestrationMode, verbose: bool) {
    let fan_out = matches!(mode, OrchestrationMode::FanOut);
    for reply in &result.replies {
        print_reply(reply, fan_out, verbose);
    }
    if let Some(message) = &result.error {
        eprintln!("Error: {}", message);
    }
    if let (Some(call), true) = (&result.call, verbose) {
        eprintln!(
            "[{} in, {} out, {}, {}]",
            call.input_tokens,
            call.output_tokens,
            format_cost(call.cost),
            format_duration(call.elapsed_millis)
        );
    }
    if let Some(report) = &result.report {
        print_report(report);
    }
}

fn print_reply(reply: &BotReply, show_agent: bool, verbose: bool) {
    if let (true, Some(agent)) = (show_agent, &reply.agent) {
        println!("[{}]", agent.display_name);
    }
    if let Some(text) = &reply.text {
        println!("{}", text);
    }
    if let Some(url) = &reply.image_url {
        println!("[image] {}", url);
    }
    if let (Some(payload), true) = (&reply.structured_payload, verbose) {
        println!("{}", payload);
    }
    println!();
}

fn print_message(message: &danya_agent::ChatMessage) {
    let prefix = if message.is_from_user {
        "> ".to_string()
    } else {
        match &message.agent_name {
            Some(name) => format!("[{}] ", name),
            None => String::new(),
        }
    };
    if let Some(text) = &message.text {
        println!("{}{}", prefix, text);
    }
    if let Some(url) = &message.image_url {
        println!("{}[image] {}", prefix, url);
    }
}

fn print_report(report: &TurnReport) {
    println!("Agent statistics");
    println!("{}", "-".repeat(40));
    for row in &report.rows {
        let status = match &row.error {
            Some(e) => format!("  error: {}", utils::truncate_chars(e, 60)),
            None => String::new(),
        };
        println!(
            "  {:<16} {:>8}  {:>6} in {:>6} out  {:>8}{}",
            utils::truncate_chars(&row.agent.display_name, 16),
            format_duration(row.elapsed_millis),
            row.input_tokens,
            row.output_tokens,
            format_cost(row.cost),
            status
        );
    }
    println!(
        "  {:<16} {:>8}  {:>6} in {:>6} out  {:>8}",
        "Total",
        format_duration(report.total_elapsed_millis),
        report.total_input_tokens,
        report.total_output_tokens,
        format_cost(report.total_cost)
    );
    if report.failed_agents() > 0 {
        println!("  {} of {} agents failed", report.failed_agents(), report.rows.len());
    }
    println!();
}
