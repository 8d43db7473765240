//! Command-line entry point: argument parsing and subcommand dispatch only
//! (§1 — out of scope for the core, kept here as the thin shell around it).

use clap::{
    builder::{
        styling::{AnsiColor, Effects},
        Styles,
    },
    CommandFactory, Parser, Subcommand,
};
use clap_complete::{generate, Shell};

use showvault::types::MediaFilter;
use showvault::{cli, error};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

/// A command-line ingestion client for a subscription live-concert catalog.
#[derive(Parser, Debug)]
#[clap(
    version = env!("CARGO_PKG_VERSION"),
    name = env!("CARGO_PKG_NAME"),
    bin_name = env!("CARGO_PKG_NAME"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    styles = styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve and report a session against the configured credentials
    Auth,

    /// Operate on the local catalog cache
    Catalog {
        #[clap(subcommand)]
        command: CatalogCommand,
    },

    /// Download shows
    Download {
        #[clap(subcommand)]
        command: DownloadCommand,
    },

    /// Remote mirror operations
    Mirror {
        #[clap(subcommand)]
        command: MirrorCommand,
    },

    /// Poll the auto-refresh policy and keep the catalog current
    Watch,

    /// Generate shell completion scripts
    Completions { shell: Shell },
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Fetch the latest-additions feed and merge it into the indices
    Update,
    /// Enumerate every artist and fetch every show, bounded to 5 concurrent workers
    Crawl,
    /// Show counts, artist totals, date range, and top artists
    Stats,
    /// Show the subset of an artist's catalog not present in the local library
    Gaps {
        artist_id: u64,
        #[clap(long, value_enum, default_value = "any")]
        media: MediaFilter,
        #[clap(long)]
        ids_only: bool,
    },
}

#[derive(Subcommand, Debug)]
enum DownloadCommand {
    /// Download one show's audio (and video, if selected) by container id
    Album { container_id: u64 },
    /// Download one show's video only, by container id
    Video { container_id: u64 },
    /// Download every show for an artist
    Artist { artist_id: u64 },
}

#[derive(Subcommand, Debug)]
enum MirrorCommand {
    /// 5-second bounded reachability probe against the configured remote
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Auth => cli::login().await,
        Command::Catalog { command } => match command {
            CatalogCommand::Update => cli::update().await,
            CatalogCommand::Crawl => cli::crawl().await,
            CatalogCommand::Stats => cli::stats().await,
            CatalogCommand::Gaps { artist_id, media, ids_only } => {
                cli::gaps(artist_id, media, ids_only).await
            }
        },
        Command::Download { command } => match command {
            DownloadCommand::Album { container_id } => cli::download_album(container_id).await,
            DownloadCommand::Video { container_id } => cli::download_video(container_id).await,
            DownloadCommand::Artist { artist_id } => cli::download_artist(artist_id).await,
        },
        Command::Mirror { command } => match command {
            MirrorCommand::Status => cli::status().await,
        },
        Command::Watch => cli::watch().await,
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
            return;
        }
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(error::exit_code(&e));
    }
}
