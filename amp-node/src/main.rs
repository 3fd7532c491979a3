//! # AMP Node CLI
//!
//! 运维命令行：加载本地配置，通过 HTTP 远端接口操作一个运行中的平台。
//!
//! ```text
//! amp info
//! amp --url http://peer:8000 invoke add --agent calc -p a=1 -p b=2
//! amp connect http://other:8000 --username admin --password secret
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};

mod commands;

use commands::{Context, NotifyTarget};

#[derive(Parser, Debug)]
#[command(name = "amp")]
#[command(about = "AMP - Agent runtime platform operator CLI")]
#[command(version)]
struct Cli {
    /// Configuration file (default: $AMP_CONFIG, ./amp.toml, ~/.config/amp/config.toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Platform to talk to (default: the configured own base URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Bearer token sent with every request
    #[arg(long, global = true)]
    token: Option<String>,

    /// Print raw JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show platform info
    Info,

    /// List agents of the platform's containers
    Agents,

    /// Send a message to an agent
    Send {
        agent: String,
        /// JSON payload; anything that does not parse is sent as a string
        payload: String,
        #[arg(long)]
        container: Option<String>,
        /// Do not let the platform forward to connected platforms
        #[arg(long)]
        local: bool,
    },

    /// Broadcast a message on a channel
    Broadcast {
        channel: String,
        payload: String,
        #[arg(long)]
        container: Option<String>,
        #[arg(long)]
        local: bool,
    },

    /// Invoke an action
    Invoke {
        action: String,
        #[arg(long)]
        agent: Option<String>,
        /// Parameter as key=value (value parsed as JSON when possible)
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,
        /// Timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        #[arg(long)]
        container: Option<String>,
        #[arg(long)]
        local: bool,
    },

    /// Read a stream to stdout
    Stream {
        name: String,
        #[arg(long)]
        agent: Option<String>,
        #[arg(long)]
        container: Option<String>,
        #[arg(long)]
        local: bool,
    },

    /// Connect the platform to another platform
    Connect {
        url: String,
        #[arg(long, requires = "password")]
        username: Option<String>,
        #[arg(long, requires = "username")]
        password: Option<String>,
    },

    /// Disconnect the platform from another platform
    Disconnect { url: String },

    /// Ask the platform to refresh a container or a connected platform
    Notify {
        #[command(subcommand)]
        target: NotifyTarget,
    },

    /// Print the effective local configuration (secrets redacted)
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Command failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = Context::load(cli.config, cli.url, cli.token, cli.json)?;
    info!("Using platform {}", ctx.url());

    match cli.command {
        Commands::Info => commands::info(&ctx).await,
        Commands::Agents => commands::agents(&ctx).await,
        Commands::Send {
            agent,
            payload,
            container,
            local,
        } => commands::send(&ctx, &agent, &payload, container.as_deref(), !local).await,
        Commands::Broadcast {
            channel,
            payload,
            container,
            local,
        } => commands::broadcast(&ctx, &channel, &payload, container.as_deref(), !local).await,
        Commands::Invoke {
            action,
            agent,
            params,
            timeout,
            container,
            local,
        } => {
            commands::invoke(
                &ctx,
                &action,
                agent.as_deref(),
                &params,
                timeout,
                container.as_deref(),
                !local,
            )
            .await
        }
        Commands::Stream {
            name,
            agent,
            container,
            local,
        } => commands::stream(&ctx, &name, agent.as_deref(), container.as_deref(), !local).await,
        Commands::Connect {
            url,
            username,
            password,
        } => commands::connect(&ctx, &url, username, password).await,
        Commands::Disconnect { url } => commands::disconnect(&ctx, &url).await,
        Commands::Notify { target } => commands::notify(&ctx, target).await,
        Commands::Config => commands::config(&ctx),
    }
}
