//! tooldeck CLI — run workflows, inspect functions and manage config.
//!
//! Reuses the same core engine (tooldeck-core) and server bootstrap
//! (tooldeck-server) that back the HTTP API.

use clap::{Parser, Subcommand};

use tooldeck_cli::commands;

/// tooldeck CLI — admin tooling engine
#[derive(Parser)]
#[command(name = "tooldeck", version, about = "tooldeck CLI — admin tooling engine")]
pub struct Cli {
    /// Path to the SQLite database file (`:memory:` for a throwaway store)
    #[arg(long, env = "TOOLDECK_DB_PATH", default_value = "tooldeck.db")]
    db: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the tooldeck HTTP backend server
    Server {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3220)]
        port: u16,
        /// Accepted x-session-token values (repeatable or comma separated)
        #[arg(long = "session-token", env = "TOOLDECK_SESSION_TOKENS", value_delimiter = ',')]
        session_tokens: Vec<String>,
    },

    /// Inspect registered functions
    Functions {
        #[command(subcommand)]
        action: FunctionsAction,
    },

    /// Run or validate workflow documents (JSON or YAML)
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },

    /// Read and write config store entries
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum FunctionsAction {
    /// List registered functions
    List,
    /// Print a function's description as JSON
    Describe {
        /// Function name
        name: String,
    },
}

#[derive(Subcommand)]
enum WorkflowAction {
    /// Execute a workflow and print the execution report
    Run {
        /// Path to the workflow file
        file: String,
        /// User input as key=value (repeatable)
        #[arg(long = "input")]
        inputs: Vec<String>,
        /// User input as a JSON object
        #[arg(long)]
        input_json: Option<String>,
        /// Abort the run after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Log resolved arguments for every action
        #[arg(long)]
        debug: bool,
    },
    /// Check a workflow against the registry without running it
    Validate {
        /// Path to the workflow file
        file: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print a config value
    Get { key: String },
    /// Set a config value (JSON, or plain text stored as a string)
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tooldeck_server::DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let result = match cli.command {
        Some(Commands::Server {
            host,
            port,
            session_tokens,
        }) => commands::server::run(host, port, cli.db, session_tokens).await,

        Some(Commands::Functions { action }) => match commands::init_state(&cli.db) {
            Ok(state) => match action {
                FunctionsAction::List => commands::functions::list(&state),
                FunctionsAction::Describe { name } => {
                    commands::functions::run_describe(&state, &name)
                }
            },
            Err(e) => Err(e),
        },

        Some(Commands::Workflow { action }) => match commands::init_state(&cli.db) {
            Ok(state) => match action {
                WorkflowAction::Run {
                    file,
                    inputs,
                    input_json,
                    timeout_secs,
                    debug,
                } => match commands::workflow::parse_inputs(&inputs, input_json.as_deref()) {
                    Ok(input) => {
                        commands::workflow::run(&state, &file, input, timeout_secs, debug).await
                    }
                    Err(e) => Err(e),
                },
                WorkflowAction::Validate { file } => {
                    commands::workflow::run_validate(&state, &file)
                }
            },
            Err(e) => Err(e),
        },

        Some(Commands::Config { action }) => match commands::init_state(&cli.db) {
            Ok(state) => match action {
                ConfigAction::Get { key } => commands::config::run_get(&state, &key).await,
                ConfigAction::Set { key, value } => {
                    commands::config::run_set(&state, &key, &value).await
                }
            },
            Err(e) => Err(e),
        },

        None => {
            // No subcommand — show help
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
