//! MuRAG CLI - Multimodal retrieval-augmented chat over your documents

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// MuRAG - Ask questions across PDFs, Word files, images and audio, with citations
#[derive(Parser)]
#[command(name = "murag")]
#[command(version)]
#[command(about = "Multimodal retrieval-augmented chat with citations", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize MuRAG (create config, data directories and database)
    Init,

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Upload a file, or every supported file in a directory
    Upload {
        /// File or directory to upload
        path: String,

        /// Process the queue before returning
        #[arg(short, long)]
        wait: bool,
    },

    /// List uploaded documents
    Files {
        /// Filter by status (processing, completed, failed)
        #[arg(short, long)]
        status: Option<String>,

        /// Maximum documents to show
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },

    /// Show a document and its chunks
    Show {
        /// Document ID (or prefix)
        id: String,
    },

    /// Delete a document, its chunks and embeddings
    Remove {
        /// Document ID (or prefix)
        id: String,
    },

    /// Run a document through the pipeline again
    Reprocess {
        /// Document ID (or prefix)
        id: String,
    },

    /// Show pipeline status
    Status,

    /// Run the processing pipeline in the foreground
    Process {
        /// Drain due jobs once and exit
        #[arg(long)]
        once: bool,
    },

    /// Ask a question and get a cited answer
    Ask {
        /// Your question
        question: String,

        /// Continue an existing conversation
        #[arg(short, long)]
        conversation: Option<String>,
    },

    /// Interactive chat session
    Chat {
        /// Resume an existing conversation
        #[arg(short, long)]
        conversation: Option<String>,
    },

    /// List conversations, or replay one
    History {
        /// Conversation ID
        conversation: Option<String>,

        /// Maximum conversations to list
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Open the source passage behind a citation
    Cite {
        /// Citation ID
        id: String,
    },

    /// Show database statistics
    Stats,

    /// Start the HTTP API and background pipeline
    Serve {
        /// Address to bind (default: from config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (default: from config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Open configuration in editor
    Edit,

    /// Print the configuration file path
    Path,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., retrieval.top_k)
        key: String,

        /// Value to set
        value: String,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("murag=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("murag=info,warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init => commands::init::run(),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => commands::config::show(),
            ConfigCommands::Edit => commands::config::edit(),
            ConfigCommands::Path => commands::config::path(),
            ConfigCommands::Set { key, value } => commands::config::set(&key, &value),
        },
        Commands::Upload { path, wait } => commands::upload::run(&path, wait),
        Commands::Files { status, limit } => commands::files::list(status, limit),
        Commands::Show { id } => commands::files::show(&id),
        Commands::Remove { id } => commands::files::remove(&id),
        Commands::Reprocess { id } => commands::files::reprocess(&id),
        Commands::Status => commands::status::run(),
        Commands::Process { once } => commands::process::run(once),
        Commands::Ask {
            question,
            conversation,
        } => commands::ask::run(&question, conversation),
        Commands::Chat { conversation } => commands::chat::run(conversation),
        Commands::History {
            conversation,
            limit,
        } => commands::history::run(conversation, limit),
        Commands::Cite { id } => commands::cite::run(&id),
        Commands::Stats => commands::stats::run(),
        Commands::Serve { host, port } => commands::serve::run(host, port),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
