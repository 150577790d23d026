mod setup;
mod tools;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use parley_agent::{AgentError, AgentEvent, ChatSession};
use parley_config::Config;
use parley_observability::{create_session_span, LogManager};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::Instrument;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Terminal chat with tool-using language models")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(long, env = "PARLEY_CONFIG", default_value = "~/.parley/config.json")]
    config: String,

    /// Model to use instead of the configured one
    #[arg(long, short)]
    model: Option<String>,

    /// Enable debug logging
    #[arg(long, short, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat
    Chat,
    /// Send a single message and print the answer
    Send {
        /// Message text
        message: String,
    },
    /// Configuration management
    Config(ConfigArgs),
}

#[derive(Args, Clone)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long, default_value = "false")]
        force: bool,
    },
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path =
        parley_config::expand_tilde(&cli.config).unwrap_or_else(|| PathBuf::from(&cli.config));

    if let Commands::Config(args) = &cli.command {
        return handle_config(args, &config_path).await;
    }

    let config = Config::load_or_default(&config_path).await?;

    let mut logging = config.logging.clone();
    if cli.debug {
        logging.level = "debug".to_string();
    }
    let mut log_manager = match LogManager::init(logging) {
        Ok(manager) => Some(manager),
        Err(e) => {
            eprintln!("{}", format!("Logging disabled: {}", e).dimmed());
            None
        }
    };

    let agent = setup::build_agent(&config, cli.model.clone())?;
    let mut session = ChatSession::new(agent, config.agent.system_prompt.clone());

    match cli.command {
        Commands::Chat => {
            let span = create_session_span(session.id());
            run_interactive_chat(&mut session, log_manager.as_mut())
                .instrument(span)
                .await
        }
        Commands::Send { message } => {
            if run_round(&mut session, &message).await.is_err() {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Config(_) => Ok(()),
    }
}

async fn handle_config(args: &ConfigArgs, config_path: &Path) -> anyhow::Result<()> {
    match args.command {
        ConfigCommands::Init { force } => {
            if config_path.exists() && !force {
                println!("{}", format!("Config already exists at {:?}", config_path).yellow());
                println!("{}", "Use --force to overwrite".dimmed());
                return Ok(());
            }

            Config::default().save(config_path).await?;
            println!("{}", format!("Config initialized at {:?}", config_path).green());
            println!("{}", "Edit this file to point at your provider and model".dimmed());
        }
        ConfigCommands::Show => {
            let mut config = Config::load_or_default(config_path).await?;
            if config.llm.api_key.is_some() {
                config.llm.api_key = Some("********".to_string());
            }

            println!("{}", "Current configuration:".cyan().bold());
            println!();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Path => {
            println!("{}", config_path.display());
        }
    }

    Ok(())
}

/// Run one round, printing events as they arrive; Ctrl-C cancels the round
async fn run_round(session: &mut ChatSession, text: &str) -> Result<(), AgentError> {
    let mut handle = session.submit(text)?;

    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(event) => render_event(&event),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => handle.cancel(),
        }
    }

    session.wait().await.map(|_| ())
}

fn render_event(event: &AgentEvent) {
    match event {
        AgentEvent::Chunk { text } => {
            print!("{}", text);
            let _ = io::stdout().flush();
        }
        AgentEvent::ToolCall { name, .. } => {
            println!("{}", format!("[calling {}]", name).dimmed());
        }
        AgentEvent::ToolResult { name, success, .. } => {
            if !success {
                println!("{}", format!("[{} failed]", name).yellow());
            }
        }
        AgentEvent::Retrying {
            attempt,
            max_attempts,
            reason,
        } => {
            // partial output above this line is superseded
            println!();
            println!(
                "{}",
                format!("{} Retrying ({}/{})...", reason, attempt + 1, max_attempts).yellow()
            );
        }
        AgentEvent::Complete { .. } => println!(),
        AgentEvent::Error { message } => {
            println!();
            println!("{}", format!("Error: {}", message).red());
        }
    }
}

async fn run_interactive_chat(
    session: &mut ChatSession,
    mut log_manager: Option<&mut LogManager>,
) -> anyhow::Result<()> {
    println!("{}", "Parley interactive chat".cyan().bold());
    println!("{}", format!("Session ID: {}", session.id()).dimmed());
    println!("{}", "Type /reset to start over, /log <level> to change logging, /exit to leave".dimmed());
    println!();

    loop {
        print!("{} ", "You:".cyan().bold());
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        match input {
            "" => continue,
            "/exit" | "/quit" => break,
            "/reset" => {
                session.reset();
                println!("{}", "Conversation cleared.".dimmed());
                continue;
            }
            _ => {}
        }

        if let Some(level) = input.strip_prefix("/log ") {
            match log_manager.as_deref_mut() {
                Some(manager) => match manager.update_level(level.trim()) {
                    Ok(()) => println!("{}", format!("Log level set to {}", level.trim()).dimmed()),
                    Err(e) => println!("{}", e.to_string().yellow()),
                },
                None => println!("{}", "Logging is disabled".yellow()),
            }
            continue;
        }

        print!("{} ", "Assistant:".green().bold());
        io::stdout().flush()?;
        // failures were already shown through the Error event
        let _ = run_round(session, input).await;
        println!();
    }

    println!("{}", "Goodbye!".cyan());
    Ok(())
}
