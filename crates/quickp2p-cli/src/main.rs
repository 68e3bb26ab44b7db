use std::path::PathBuf;

use clap::{Parser, Subcommand};
use quickp2p_cli::cli::{CliCommand, CliConfig, Session, SetArgs};
use quickp2p_core::tracing_setup::init_tracing;
use quickp2p_core::{ColorMode, NotificationPermission, ProfileConfig, StorageBackend};

#[derive(Parser)]
#[command(name = "quickp2p")]
#[command(about = "Manage the local QuickP2P profile")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Path to JSON config file (contains dataDir, ephemeral, notifications)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Profile directory (overrides config file and QUICKP2P_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Keep the profile in memory only
    #[arg(long)]
    ephemeral: bool,

    /// Answer to the notification permission prompt
    #[arg(long)]
    notifications: Option<NotificationPermission>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the profile and preferences
    Show,

    /// Change preferences
    Set {
        /// Play a sound when a message arrives in the background
        #[arg(long)]
        sound: Option<bool>,
        /// Show a notification when a message arrives in the background
        #[arg(long)]
        notifications: Option<bool>,
        /// Show active typing indicators (also hides your own typing status when off)
        #[arg(long)]
        typing: Option<bool>,
        /// Color theme: light or dark
        #[arg(long)]
        color_mode: Option<ColorMode>,
        /// Custom user name
        #[arg(long, conflicts_with = "clear_username")]
        username: Option<String>,
        /// Go back to the generated user name
        #[arg(long)]
        clear_username: bool,
    },

    /// Export profile data so it can be moved to another device
    Export {
        /// Output file or directory (stdout when omitted)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Import profile data exported on another device
    Import {
        /// Exported profile file
        file: PathBuf,
    },

    /// Delete all profile data and start over with a new identity
    Reset {
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("Warning: Failed to set up logging: {}", e);
    }

    let config = load_config(&cli);

    let command = match cli.command {
        Some(Commands::Show) => CliCommand::Show,
        Some(Commands::Set {
            sound,
            notifications,
            typing,
            color_mode,
            username,
            clear_username,
        }) => CliCommand::Set(SetArgs {
            sound,
            notifications,
            typing,
            color_mode,
            username,
            clear_username,
        }),
        Some(Commands::Export { out }) => CliCommand::Export { out },
        Some(Commands::Import { file }) => CliCommand::Import { file },
        Some(Commands::Reset { yes }) => CliCommand::Reset { yes },
        None => {
            // No command - show help
            eprintln!("No command specified. Use --help for usage.");
            std::process::exit(1);
        }
    };

    let mut session = Session::open(config, cli.pretty).await;
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut out = std::io::stdout();
    let mut err = std::io::stderr();

    if let Err(e) = session.run(command, &mut input, &mut out, &mut err).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Build the profile config: flags > config file > environment > defaults
fn load_config(cli: &Cli) -> ProfileConfig {
    let file_config = match &cli.config {
        Some(path) => match CliConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        },
        None => CliConfig::default(),
    };

    let mut config = file_config.into_profile_config();
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if cli.ephemeral {
        config.storage = StorageBackend::Memory;
    }
    if let Some(answer) = cli.notifications {
        config.notification_answer = answer;
    }
    config
}
