use anyhow::Context;
use mnemo::{
    auth::jwt::AuthService,
    cli::{
        init::{self, InitConfig, InitResult},
        output::Output,
        Cli, Commands,
    },
    create_app,
    db::DatabaseProvider,
    llm::Provider,
    AppConfig, AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        Some(Commands::Init {
            path,
            force,
            host,
            port,
            anonymous,
        }) => match init::run(
            InitConfig {
                path,
                force,
                host,
                port,
                anonymous,
            },
            &output,
        ) {
            InitResult::Success | InitResult::AlreadyExists => Ok(()),
            InitResult::Error(e) => anyhow::bail!(e),
        },
        Some(Commands::Config { full, validate }) => {
            let config = load_config(&cli.config, &output)?;
            if validate {
                output.success("Configuration is valid");
            } else {
                show_config(&config, full, &output)?;
            }
            for warning in config.warnings() {
                output.warning(&warning.to_string());
            }
            Ok(())
        }
        Some(Commands::Token { user }) => {
            let config = load_config(&cli.config, &output)?;
            let auth = AuthService::new(
                config.jwt_secret(),
                config.auth.jwt_access_expiry,
                None,
            );
            let token = auth
                .issue_token(&user)
                .with_context(|| format!("set {} to issue tokens", config.auth.jwt_secret_env))?;
            println!("{}", token);
            Ok(())
        }
        Some(Commands::Serve) | None => {
            let config = load_config(&cli.config, &output)?;
            init_tracing(&config, cli.verbose);
            serve(config).await
        }
    }
}

fn load_config(path: &std::path::Path, output: &Output) -> anyhow::Result<AppConfig> {
    AppConfig::load(path).map_err(|e| {
        output.error(&e.to_string());
        anyhow::anyhow!(e).context(format!("loading {}", path.display()))
    })
}

fn show_config(config: &AppConfig, full: bool, output: &Output) -> anyhow::Result<()> {
    if full {
        println!("{}", config.to_toml_string()?);
        return Ok(());
    }

    output.header("Configuration");
    output.kv("listen", &format!("{}:{}", config.server.host, config.server.port));
    output.kv("database", &config.database.url);
    output.kv("llm", &config.llm.api_base);
    output.kv("history window", &config.memory.history_window.to_string());
    output.kv(
        "summary every",
        &format!("{} assistant messages", config.memory.summary_update_every),
    );
    output.kv("anonymous access", &config.auth.allow_anonymous.to_string());
    Ok(())
}

/// `RUST_LOG` wins over `server.log_level`.
fn init_tracing(config: &AppConfig, verbose: bool) {
    let default_level = if verbose {
        "debug"
    } else {
        config.server.log_level.as_str()
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mnemo={0},mnemo_server={0},tower_http={0}", default_level)));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.server.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    for warning in config.warnings() {
        tracing::warn!("{}", warning);
    }

    let store = DatabaseProvider::from_config(&config.database)
        .create_store()
        .await
        .context("opening database")?;

    let llm = Provider::OpenAI {
        api_key: config.llm_api_key().unwrap_or_default(),
        api_base: config.llm.api_base.clone(),
        request_timeout_secs: config.llm.request_timeout_secs,
    };
    let llm = llm
        .create_client()
        .with_context(|| format!("set {} to reach the completion provider", config.llm.api_key_env))?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = create_app(AppState::new(config, store, llm));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!("mnemo listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
