use clap::{Parser, Subcommand};
use mail2bug::resolver::{resolve, ResolutionConfig};
use mail2bug::ticket::Ticket;

#[derive(Parser)]
#[command(name = "mail2bug")]
#[command(about = "Email-to-issue bridge", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: MAIL2BUG_CONFIG_PATH or ~/.mail2bug/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the webhook gateway. Requires tracker.organization and a personal access token (MAIL2BUG_PAT) for the devops backend.
    Serve {
        /// Config file path (default: MAIL2BUG_CONFIG_PATH or ~/.mail2bug/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 15152)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Show which project and title a subject would produce, without filing anything.
    Resolve {
        /// Email subject
        #[arg(long, short)]
        subject: String,

        /// Recipient address (e.g. project@example.com)
        #[arg(long, short)]
        recipient: Option<String>,

        /// Config file path (default: MAIL2BUG_CONFIG_PATH or ~/.mail2bug/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("mail2bug {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Resolve {
            subject,
            recipient,
            config,
        }) => {
            if let Err(e) = run_resolve(subject, recipient, config) {
                log::error!("resolve failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(mail2bug::config::default_config_path);
    let dir = mail2bug::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = mail2bug::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{} (config {})",
        config.gateway.bind,
        config.gateway.port,
        path.display()
    );
    mail2bug::gateway::run_gateway(config).await
}

fn run_resolve(
    subject: String,
    recipient: Option<String>,
    config_path: Option<std::path::PathBuf>,
) -> anyhow::Result<()> {
    let (config, _) = mail2bug::config::load_config(config_path)?;
    let resolution_config = ResolutionConfig {
        explicit_project: config
            .tracker
            .project
            .clone()
            .filter(|p| !p.trim().is_empty()),
        strategy: config.tracker.determine_project_via,
    };
    let mut ticket = Ticket::new(subject, String::new());
    if let Some(r) = recipient {
        ticket = ticket.with_recipient(r);
    }
    let resolution = resolve(&mut ticket, &resolution_config);
    println!("project: {}", resolution.project);
    println!("source:  {}", resolution.source.as_str());
    println!("title:   {}", ticket.title);
    Ok(())
}
