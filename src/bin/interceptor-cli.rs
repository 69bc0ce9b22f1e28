use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use url::Url;

use http_interceptor::auth::{BearerAuthenticator, HttpTokenRefresher, NoRefresh, TokenRefresher};
use http_interceptor::chain::InterceptorChain;
use http_interceptor::config::{load_config, InterceptorConfig};
use http_interceptor::credential::{Credential, CredentialStore, FileCredentialStore};
use http_interceptor::http::{RequestDescriptor, RequestIdAdapter, ReqwestTransport};
use http_interceptor::observability::{init_logging, metrics, LoggingObserver};

#[derive(Parser)]
#[command(name = "interceptor-cli")]
#[command(about = "Send authenticated requests through the interceptor chain", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Credential file. Overrides `auth.credential_path`.
    #[arg(long)]
    credentials: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a GET request
    Get {
        path: String,
        /// Query parameters as key=value
        #[arg(short, long = "query")]
        query: Vec<String>,
    },
    /// Send a POST request with a JSON body
    Post {
        path: String,
        /// JSON body
        #[arg(short, long, default_value = "{}")]
        body: String,
    },
    /// Store a credential in the credential file
    Login {
        access_token: String,
        refresh_token: String,
        /// Lifetime of the access token in seconds
        #[arg(long, default_value_t = 3600)]
        expires_in: u64,
    },
    /// Show the stored credential's state
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => InterceptorConfig::default(),
    };

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let credential_path = cli
        .credentials
        .clone()
        .or_else(|| config.auth.credential_path.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("credentials.json"));
    let store = Arc::new(FileCredentialStore::load(&credential_path)?);

    tracing::info!(
        base_url = %config.base_url,
        credentials = %credential_path.display(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Login {
            access_token,
            refresh_token,
            expires_in,
        } => {
            let credential = Credential::checked_expiring_in(
                access_token,
                refresh_token,
                Duration::from_secs(expires_in),
            )
            .ok_or_else(|| format!("--expires-in out of range: {}", expires_in))?;
            store.set(credential);
            println!("Credential stored in {}", credential_path.display());
        }
        Commands::Status => print_status(store.as_ref(), &config),
        Commands::Get { path, query } => {
            let chain = build_chain(&config, store)?;
            let descriptor = RequestDescriptor::get(Url::parse(&config.base_url)?, path)
                .with_query(&parse_query(&query)?)?;
            let value: Value = chain.execute(&descriptor).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Post { path, body } => {
            let chain = build_chain(&config, store)?;
            let body: Value = serde_json::from_str(&body)?;
            let descriptor =
                RequestDescriptor::post(Url::parse(&config.base_url)?, path).with_body(&body)?;
            let value: Value = chain.execute(&descriptor).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}

fn build_chain(
    config: &InterceptorConfig,
    store: Arc<FileCredentialStore>,
) -> Result<InterceptorChain, Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let transport = Arc::new(ReqwestTransport::new(client.clone()));

    let mut builder = InterceptorChain::builder(transport)
        .with_config(config)?
        .adapter(Arc::new(RequestIdAdapter))
        .observer(Arc::new(LoggingObserver::new(&config.observability)));

    if config.auth.enabled {
        let refresher: Arc<dyn TokenRefresher> = match &config.auth.refresh_url {
            Some(url) => Arc::new(HttpTokenRefresher::new(client, Url::parse(url)?)),
            None => Arc::new(NoRefresh),
        };
        let authenticator = BearerAuthenticator::from_config(&config.auth, refresher)?;
        builder = builder.authenticator(Arc::new(authenticator), store);
    }

    Ok(builder.build())
}

fn parse_query(pairs: &[String]) -> Result<Map<String, Value>, Box<dyn std::error::Error>> {
    let mut query = Map::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("query parameter must be key=value: {}", pair))?;
        query.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(query)
}

fn print_status(store: &dyn CredentialStore, config: &InterceptorConfig) {
    match store.get() {
        Some(credential) => {
            let state = if credential.requires_refresh(config.auth.skew()) {
                "refresh required"
            } else {
                "valid"
            };
            println!("Credential: {}", state);
            println!("Expires in: {}s", credential.remaining().as_secs());
        }
        None => println!("Credential: none"),
    }
}
