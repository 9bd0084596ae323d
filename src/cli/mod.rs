use clap::{Parser, Subcommand};
use serde_json::json;

use crate::app::{self, AppState};
use crate::auth::{issue_session_token, Claims, Profile};
use crate::config::AppConfig;
use crate::routes::RouteClass;

#[derive(Parser)]
#[command(name = "wahlkreis-api")]
#[command(about = "Constituency-office API gateway")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Port to bind, overrides PORT")]
        port: Option<u16>,
    },

    #[command(about = "Sign a primary session token for local testing")]
    IssueToken {
        #[arg(long, help = "Subject id")]
        sub: String,
        #[arg(long, default_value = "Local User")]
        name: String,
        #[arg(long, default_value = "local@example.org")]
        email: String,
        #[arg(long, help = "Mark the session as fraction leadership")]
        fraction_leadership: bool,
        #[arg(long)]
        wahlkreis: Option<String>,
    },

    #[command(about = "Show whether paths are public or protected")]
    Classify {
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = AppConfig::from_env()?;

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => serve(config, port).await,
        Commands::IssueToken { sub, name, email, fraction_leadership, wahlkreis } => {
            let profile = Profile { sub, name, email, is_fraction_leadership: fraction_leadership, wahlkreis };
            let claims = Claims::new(profile, config.session.ttl_hours);
            let token = issue_session_token(&claims, &config.session)?;
            match output_format {
                OutputFormat::Text => println!("{}", token),
                OutputFormat::Json => println!(
                    "{}",
                    json!({ "token": token, "cookie": config.session.cookie_name, "exp": claims.exp })
                ),
            }
            Ok(())
        }
        Commands::Classify { paths } => {
            for path in paths {
                let class = match config.routes.public.classify(&path) {
                    RouteClass::Public => "public",
                    RouteClass::Protected => "protected",
                };
                match output_format {
                    OutputFormat::Text => println!("{:<10} {}", class, path),
                    OutputFormat::Json => println!("{}", json!({ "path": path, "class": class })),
                }
            }
            Ok(())
        }
    }
}

async fn serve(mut config: AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.api.port = port;
    }
    tracing::info!("Starting wahlkreis-api in {:?} mode with {:?} store", config.environment, config.store);

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let state = AppState::from_config(config).await?;
    let app = app::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
