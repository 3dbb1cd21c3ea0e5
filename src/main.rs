//! `scrutinio` command line front-end.
//!
//! Run with:
//! ```bash
//! cargo run -- serve --config scrutinio.toml
//! cargo run -- vote cat --count 3
//! cargo run -- counts --style markdown
//! cargo run -- watch
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use scrutinio::client::VoteClient;
use scrutinio::net::{RemoteVoteApi, Server};
use scrutinio::table::{CountsTable, TableStyle};
use scrutinio::{Choice, Error, Result, ServiceConfig, VoteApi, VoteService};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::lookup_host;

#[derive(Debug, Parser)]
#[command(name = "scrutinio", version, about = "Sharded vote tallies over TCP")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the vote server
    Serve(ServeArgs),
    /// Cast votes, showing the optimistic totals before the server answers
    Vote(VoteArgs),
    /// Print the current totals
    Counts(CountsArgs),
    /// Print totals as the server pushes them
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the configuration)
    #[arg(short, long)]
    listen: Option<String>,

    /// Shards per counter (overrides `default_shards`)
    #[arg(short, long)]
    shards: Option<usize>,
}

#[derive(Debug, Args)]
struct Remote {
    /// Server address
    #[arg(short, long, default_value = scrutinio::config::DEFAULT_LISTEN)]
    addr: String,
}

#[derive(Debug, Args)]
struct VoteArgs {
    #[command(flatten)]
    remote: Remote,

    /// What to vote for: cat, dog or goldfish
    choice: Choice,

    /// Number of votes to cast
    #[arg(short = 'n', long, default_value = "1")]
    count: usize,

    #[command(flatten)]
    table: TableArgs,
}

#[derive(Debug, Args)]
struct CountsArgs {
    #[command(flatten)]
    remote: Remote,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    table: TableArgs,
}

#[derive(Debug, Args)]
struct WatchArgs {
    #[command(flatten)]
    remote: Remote,

    /// Leave goldfish out of the total
    #[arg(long)]
    no_goldfish: bool,
}

#[derive(Debug, Args)]
struct TableArgs {
    /// Table style
    #[arg(long, value_enum, default_value = "rounded")]
    style: StyleChoice,

    /// Leave goldfish out of the total and the shares
    #[arg(long)]
    no_goldfish: bool,
}

impl TableArgs {
    fn table(&self) -> CountsTable {
        CountsTable::new()
            .with_style(self.style.into())
            .with_total(true)
            .include_goldfish(!self.no_goldfish)
    }
}

/// Table style selection.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum StyleChoice {
    Ascii,
    #[default]
    Rounded,
    Sharp,
    Markdown,
    Blank,
}

impl From<StyleChoice> for TableStyle {
    fn from(choice: StyleChoice) -> Self {
        match choice {
            StyleChoice::Ascii => TableStyle::Ascii,
            StyleChoice::Rounded => TableStyle::Rounded,
            StyleChoice::Sharp => TableStyle::Sharp,
            StyleChoice::Markdown => TableStyle::Markdown,
            StyleChoice::Blank => TableStyle::Blank,
        }
    }
}

impl Remote {
    async fn resolve(&self) -> Result<SocketAddr> {
        lookup_host(&self.addr)
            .await?
            .next()
            .ok_or_else(|| Error::Config(format!("cannot resolve `{}`", self.addr)))
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(shards) = args.shards {
        config.default_shards = shards;
    }

    let service = Arc::new(VoteService::new(
        &config,
        Arc::new(scrutinio::store::MemoryStore::new()),
    )?);
    let server = Server::bind(config.listen.as_str(), service).await?;
    server
        .run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}

async fn vote(args: VoteArgs) -> Result<()> {
    let api = Arc::new(RemoteVoteApi::new(args.remote.resolve().await?));
    let client = VoteClient::new(Arc::clone(&api));
    if let Err(err) = client.refresh().await {
        tracing::warn!(error = %err, "cannot read totals before voting");
    }

    let calls: Vec<_> = (0..args.count).map(|_| client.vote(args.choice)).collect();
    if let Some(predicted) = client.displayed() {
        println!("{}", args.table.table().with_title("predicted").render(&predicted));
    }

    let mut failed = None;
    for call in calls {
        match call.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => failed = Some(err),
            Err(err) => failed = Some(Error::Io(std::io::Error::other(err))),
        }
    }

    match client.refresh().await {
        Ok(counts) => println!("{}", args.table.table().with_title("server").render(&counts)),
        Err(err) => tracing::warn!(error = %err, "cannot read totals after voting"),
    }

    match failed {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn counts(args: CountsArgs) -> Result<()> {
    let api = RemoteVoteApi::new(args.remote.resolve().await?);
    let counts = api.vote_counts().await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
    } else {
        println!("{}", args.table.table().render(&counts));
    }
    Ok(())
}

async fn watch(args: WatchArgs) -> Result<()> {
    let api = RemoteVoteApi::new(args.remote.resolve().await?);
    let mut sub = api.subscribe().await?;
    while let Some(counts) = sub.next().await? {
        println!("{counts}  total={}", counts.total(!args.no_goldfish));
    }
    tracing::info!("server closed the stream");
    Ok(())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Vote(args) => vote(args).await,
        Command::Counts(args) => counts(args).await,
        Command::Watch(args) => watch(args).await,
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(kind = %err.kind(), "{err}");
            std::process::ExitCode::FAILURE
        }
    }
}
