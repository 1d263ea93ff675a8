//! Sourcing CLI - Command-line client for the sourcing marketplace
//!
//! Logs in, keeps the session on disk between runs, and calls the backend
//! through the session manager

use anyhow::Context;
use clap::{Parser, Subcommand};
use sourcing_api::MarketplaceClient;
use sourcing_core::{
    config_error, init_logging, log_operation_start, log_operation_success, validation_error,
    ClientConfig, Credentials, ErrorContext, LoggingConfig, Registration, SourcingError,
    SourcingResult,
};
use sourcing_session::{
    expiry_from_token, principal_from_token, ApiRequest, FileTokenStore, SessionManager,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "sourcing")]
#[command(about = "Command-line client for the sourcing marketplace")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with email and password
    Login {
        #[arg(short, long)]
        email: String,

        /// Password; read from SOURCING_PASSWORD when omitted
        #[arg(short, long, env = "SOURCING_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account and log in
    Register {
        #[arg(short, long)]
        email: String,

        /// Password; read from SOURCING_PASSWORD when omitted
        #[arg(short, long, env = "SOURCING_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Full name
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        company: Option<String>,
    },

    /// Log in with a Google ID token
    LoginGoogle {
        /// ID token issued by Google Sign-In
        #[arg(long)]
        assertion: String,
    },

    /// Forget the stored session
    Logout,

    /// Show who the current session belongs to
    Whoami,

    /// Show session state without calling the backend
    Status,

    /// Send an arbitrary request through the session
    Request {
        /// HTTP method
        method: String,

        /// Path relative to the backend base URL
        path: String,

        /// JSON request body
        #[arg(long)]
        body: Option<String>,

        /// Do not require a stored session
        #[arg(long)]
        anonymous: bool,
    },

    /// List your quotes or show one
    Quotes {
        #[arg(long)]
        id: Option<String>,
    },

    /// Show your account profile
    Profile,

    /// List notifications
    Notifications {
        /// Mark all notifications read afterwards
        #[arg(long)]
        mark_read: bool,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize default configuration
        #[arg(long)]
        init: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let logging_config = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig::default()
    };
    init_logging(&logging_config)
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize logging")?;

    debug!("Starting sourcing CLI v{}", env!("CARGO_PKG_VERSION"));

    if let Err(error) = run(cli).await {
        error.log();
        if error.requires_login() {
            eprintln!("🔑 Please log in again: sourcing login --email <EMAIL>");
        }
        if let Some(context) = error.context() {
            for suggestion in &context.recovery_suggestions {
                eprintln!("💡 {}", suggestion);
            }
        }
        return Err(error.into());
    }

    Ok(())
}

async fn run(cli: Cli) -> SourcingResult<()> {
    let config = load_config(cli.config.as_ref()).await?;

    match cli.command {
        Commands::Config {
            show,
            init,
            validate,
        } => handle_config(&config, show, init, validate).await,
        Commands::Login { email, password } => {
            let password = password.ok_or_else(|| {
                validation_error!(
                    "Password required: pass --password or set SOURCING_PASSWORD",
                    "password",
                    "cli"
                )
            })?;
            handle_login(&config, Credentials::password(email, password)).await
        }
        Commands::Register {
            email,
            password,
            name,
            company,
        } => {
            let password = password.ok_or_else(|| {
                validation_error!(
                    "Password required: pass --password or set SOURCING_PASSWORD",
                    "password",
                    "cli"
                )
            })?;
            let mut registration = Registration::new(email, password);
            if let Some(name) = name {
                registration = registration.with_name(&name);
            }
            if let Some(company) = company {
                registration = registration.with_company(company);
            }
            handle_register(&config, registration).await
        }
        Commands::LoginGoogle { assertion } => {
            handle_login(&config, Credentials::federated("google", assertion)).await
        }
        Commands::Logout => {
            create_manager(&config)?.logout()?;
            println!("👋 Logged out");
            Ok(())
        }
        Commands::Whoami => handle_whoami(&config).await,
        Commands::Status => handle_status(&config),
        Commands::Request {
            method,
            path,
            body,
            anonymous,
        } => handle_request(&config, &method, path, body, anonymous).await,
        Commands::Quotes { id } => handle_quotes(&config, id).await,
        Commands::Profile => handle_profile(&config).await,
        Commands::Notifications { mark_read } => handle_notifications(&config, mark_read).await,
    }
}

async fn load_config(config_path: Option<&PathBuf>) -> SourcingResult<ClientConfig> {
    let mut config = if let Some(path) = config_path {
        info!("Loading configuration from {:?}", path);
        ClientConfig::from_file(path)?
    } else {
        let default_paths = [
            get_config_path(),
            dirs::home_dir().map(|d| d.join(".sourcing").join("config.toml")),
            Some(PathBuf::from("sourcing.toml")),
        ];

        match default_paths.into_iter().flatten().find(|path| path.exists()) {
            Some(path) => {
                info!("Loading configuration from {:?}", path);
                ClientConfig::from_file(&path)?
            }
            None => {
                debug!("No configuration file found, using defaults");
                ClientConfig::default()
            }
        }
    };

    config.apply_env_overrides();
    Ok(config)
}

/// Default configuration file path
fn get_config_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|d| d.join(".config")))
        .map(|d| d.join("sourcing").join("config.toml"))
}

fn create_manager(config: &ClientConfig) -> SourcingResult<SessionManager> {
    config.validate()?;
    let session_file = config.session_file().ok_or_else(|| {
        config_error!(
            "Cannot determine where to store the session; set storage.session_file",
            "cli"
        )
    })?;
    debug!(path = %session_file.display(), "Using session file");

    SessionManager::new(config.clone(), Arc::new(FileTokenStore::new(session_file)))
}

fn create_client(config: &ClientConfig) -> SourcingResult<MarketplaceClient> {
    Ok(MarketplaceClient::new(Arc::new(create_manager(config)?)))
}

async fn handle_login(config: &ClientConfig, credentials: Credentials) -> SourcingResult<()> {
    let manager = create_manager(config)?;
    log_operation_start!("login", account = %credentials.label());

    let session = manager.login(&credentials).await?;
    log_operation_success!("login", account = %credentials.label());

    println!("✅ Logged in as {}", credentials.label());
    if let Some(expires_at) = session.expires_at {
        println!("   Access token valid until {}", expires_at.to_rfc3339());
    }
    if !session.has_refresh_token() {
        println!("   No refresh token issued; you will need to log in again when it expires");
    }
    Ok(())
}

async fn handle_register(config: &ClientConfig, registration: Registration) -> SourcingResult<()> {
    let manager = create_manager(config)?;
    log_operation_start!("register", account = %registration.email);

    manager.register(&registration).await?;
    log_operation_success!("register", account = %registration.email);

    println!("✅ Account created for {}", registration.email);
    Ok(())
}

async fn handle_whoami(config: &ClientConfig) -> SourcingResult<()> {
    let manager = create_manager(config)?;
    let principal = manager.principal().await?;

    println!("👤 {}", principal.id);
    if let Some(email) = &principal.email {
        println!("   Email: {}", email);
    }
    println!("   Role:  {}", principal.role);
    Ok(())
}

fn handle_status(config: &ClientConfig) -> SourcingResult<()> {
    let manager = create_manager(config)?;

    println!("🔗 Backend: {}", config.backend.base_url);
    if let Some(path) = config.session_file() {
        println!("📁 Session file: {}", path.display());
    }
    println!("🔐 State: {}", manager.state());

    if let Some(session) = manager.session()? {
        if let Some(principal) = principal_from_token(&session.access_token) {
            println!("   Principal: {} ({})", principal.id, principal.role);
        }
        let expiry = session
            .expires_at
            .or_else(|| expiry_from_token(&session.access_token));
        if let Some(expires_at) = expiry {
            println!("   Access token expires: {}", expires_at.to_rfc3339());
        }
        println!(
            "   Refresh token: {}",
            if session.has_refresh_token() {
                "present"
            } else {
                "absent"
            }
        );
    }
    Ok(())
}

fn parse_method(method: &str) -> SourcingResult<reqwest::Method> {
    reqwest::Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| validation_error!(format!("Invalid HTTP method: {}", method), "method", "cli"))
}

async fn handle_request(
    config: &ClientConfig,
    method: &str,
    path: String,
    body: Option<String>,
    anonymous: bool,
) -> SourcingResult<()> {
    let manager = create_manager(config)?;

    let path = if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    };
    let mut request = ApiRequest::new(parse_method(method)?, path);
    if let Some(body) = body {
        let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            validation_error!(format!("Request body is not valid JSON: {}", e), "body", "cli")
        })?;
        request = request.json(value);
    }
    if anonymous {
        request = request.anonymous();
    }

    let response = manager.request(request).await?;
    let status = response.status();
    let text = response.text().await.map_err(|e| SourcingError::Network {
        message: format!("Failed to read response body: {}", e),
        source: Some(Box::new(e)),
        context: ErrorContext::new("cli").with_operation("request"),
    })?;

    println!("HTTP {}", status);
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) if !text.is_empty() => println!("{}", text),
        Err(_) => {}
    }
    Ok(())
}

async fn handle_quotes(config: &ClientConfig, id: Option<String>) -> SourcingResult<()> {
    let client = create_client(config)?;

    if let Some(id) = id {
        let quote = client.quote(&id).await?;
        println!("📄 Quote {}: {}", quote.id, quote.name);
        println!("   Industry: {}", quote.industry);
        if let Some(status) = &quote.status {
            println!("   Status: {}", status);
        }
        println!("   Requirements: {}", quote.requirements);
        println!("   Details: {}", quote.details);
        return Ok(());
    }

    let quotes = client.my_quotes().await?;
    if quotes.is_empty() {
        println!("No quotes yet");
    }
    for quote in quotes {
        println!(
            "{:>6}  {:<40}  {}",
            quote.id,
            quote.name,
            quote.created_at.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn handle_profile(config: &ClientConfig) -> SourcingResult<()> {
    let client = create_client(config)?;
    let profile = client.profile().await?;

    println!("👤 {} {}", profile.first_name, profile.last_name);
    println!("   Email:   {}", profile.email);
    if !profile.company.is_empty() {
        println!("   Company: {}", profile.company);
    }
    if !profile.phone.is_empty() {
        println!("   Phone:   {}", profile.phone);
    }
    Ok(())
}

async fn handle_notifications(config: &ClientConfig, mark_read: bool) -> SourcingResult<()> {
    let client = create_client(config)?;
    let notifications = client.notifications().await?;

    let unread = notifications.iter().filter(|n| !n.read).count();
    println!("🔔 {} notifications, {} unread", notifications.len(), unread);
    for notification in &notifications {
        println!(
            "{} {}: {}",
            if notification.read { " " } else { "•" },
            notification.title,
            notification.message
        );
    }

    if mark_read && unread > 0 {
        client.mark_all_notifications_read().await?;
        println!("✅ Marked all read");
    }
    Ok(())
}

async fn handle_config(
    config: &ClientConfig,
    show: bool,
    init: bool,
    validate: bool,
) -> SourcingResult<()> {
    if init {
        let config_path = get_config_path()
            .ok_or_else(|| config_error!("Cannot determine configuration directory", "config_init"))?;
        if let Some(dir) = config_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        ClientConfig::default().save_to_file(&config_path)?;
        println!("✅ Configuration initialized at: {:?}", config_path);
        println!("📝 Edit the file to point backend.base_url at your marketplace backend.");
    }

    if show {
        let rendered = toml::to_string_pretty(config).map_err(|e| SourcingError::Config {
            message: format!("Failed to render configuration: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config_show"),
        })?;
        println!("📋 Current configuration:");
        println!("{}", rendered);
    }

    if validate {
        match config.validate() {
            Ok(()) => println!("✅ Configuration is valid"),
            Err(e) => {
                println!("❌ Configuration validation failed: {}", e);
                return Err(e);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("get").unwrap(), reqwest::Method::GET);
        assert_eq!(parse_method(" DELETE ").unwrap(), reqwest::Method::DELETE);
        assert!(parse_method("NOT A METHOD").is_err());
    }

    #[test]
    fn test_request_arguments() {
        let cli = Cli::try_parse_from([
            "sourcing",
            "request",
            "POST",
            "/quotes/create/",
            "--body",
            r#"{"name": "Bolts"}"#,
            "--anonymous",
        ])
        .unwrap();

        match cli.command {
            Commands::Request {
                method,
                path,
                body,
                anonymous,
            } => {
                assert_eq!(method, "POST");
                assert_eq!(path, "/quotes/create/");
                assert!(body.is_some());
                assert!(anonymous);
            }
            _ => panic!("Expected request command"),
        }
    }

    #[tokio::test]
    async fn test_explicit_config_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sourcing.toml");

        let mut config = ClientConfig::for_base_url("https://api.example.test");
        config.storage.session_file = Some(dir.path().join("session.json").display().to_string());
        config.save_to_file(&path).unwrap();

        let loaded = load_config(Some(&path)).await.unwrap();
        assert_eq!(
            loaded.session_file(),
            Some(dir.path().join("session.json"))
        );
    }
}
