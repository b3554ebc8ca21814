use passkey_auth_server::cleanup::run_cleanup_loop;
use passkey_auth_server::config::{Config, IdentityConfig};
use passkey_auth_server::db;
use passkey_auth_server::identity::local::LocalIdentityProvider;
use passkey_auth_server::state::AppState;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_bootstrap_usage() {
    eprintln!("Usage: passkey-auth-server bootstrap <email>");
    eprintln!();
    eprintln!("Create the account if needed and print a bearer access token for it.");
    eprintln!("Only available with IDENTITY_PROVIDER=local.");
}

/// First sign-in for the built-in identity provider, before any passkey exists
async fn bootstrap(config: &Config, email: &str) -> anyhow::Result<()> {
    if !matches!(config.identity, IdentityConfig::Local) {
        anyhow::bail!("bootstrap needs IDENTITY_PROVIDER=local; create accounts in the identity server instead");
    }

    let pool = db::connect(&config.database_url).await?;
    let provider = LocalIdentityProvider::new(pool, chrono::Duration::hours(config.session_ttl_hours));
    let session = provider.bootstrap(email).await?;

    println!("{}", session.access_token);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default: info for dependencies, debug for this crate; RUST_LOG overrides
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,passkey_auth_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && args[1] == "bootstrap" {
        if args.len() != 3 {
            print_bootstrap_usage();
            std::process::exit(1);
        }
        return bootstrap(&config, &args[2]).await;
    }

    tracing::info!("Configuration loaded: {:?}", config);

    let app_state = AppState::new(&config).await?;
    tracing::info!(rp_id = %app_state.rp.id, origin = %app_state.rp.origin, "Application state initialized");

    tokio::spawn(run_cleanup_loop(
        app_state.db.clone(),
        app_state.identity.clone(),
        Duration::from_secs(config.challenge_cleanup_interval_secs),
    ));

    let app = passkey_auth_server::build_app(app_state).await?;

    let bind_addr = config.bind_address();
    tracing::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
