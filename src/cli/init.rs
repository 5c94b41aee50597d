//! `mnemo-server init`: write a default `mnemo.toml` and the data directory.

use super::output::Output;
use crate::utils::toml_config::AppConfig;
use std::fs;
use std::path::{Path, PathBuf};

pub enum InitResult {
    Success,
    /// mnemo.toml exists and `--force` was not given
    AlreadyExists,
    Error(String),
}

pub struct InitConfig {
    pub path: PathBuf,
    pub force: bool,
    pub host: String,
    pub port: u16,
    /// Allow requests without a token (single-user local setups)
    pub anonymous: bool,
}

const ENV_EXAMPLE: &str = "\
# Secret used to sign and verify access tokens
JWT_SECRET=change-me-to-a-long-random-string
# Completion provider key
OPENAI_API_KEY=
";

pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing mnemo");

    let config_path = config.path.join("mnemo.toml");
    if config_path.exists() && !config.force {
        output.warning("mnemo.toml already exists!");
        output.hint("Use --force to overwrite it");
        return InitResult::AlreadyExists;
    }

    let mut app_config = AppConfig::default();
    app_config.server.host = config.host;
    app_config.server.port = config.port;
    app_config.auth.allow_anonymous = config.anonymous;

    let rendered = match app_config.to_toml_string() {
        Ok(s) => s,
        Err(e) => return InitResult::Error(e.to_string()),
    };

    if let Err(e) = write_files(&config.path, &config_path, &rendered, output) {
        output.error(&e);
        return InitResult::Error(e);
    }

    output.success("Project initialized");
    output.hint("Fill in .env, then start the server:");
    output.command("mnemo-server");

    InitResult::Success
}

fn write_files(base: &Path, config_path: &Path, rendered: &str, output: &Output) -> Result<(), String> {
    let data_dir = base.join("data");
    fs::create_dir_all(&data_dir)
        .map_err(|e| format!("Failed to create {}: {}", data_dir.display(), e))?;
    output.created("directory", &data_dir.display().to_string());

    fs::write(config_path, rendered)
        .map_err(|e| format!("Failed to write {}: {}", config_path.display(), e))?;
    output.created("config", &config_path.display().to_string());

    let env_example = base.join(".env.example");
    if !env_example.exists() {
        fs::write(&env_example, ENV_EXAMPLE)
            .map_err(|e| format!("Failed to write {}: {}", env_example.display(), e))?;
        output.created("env template", &env_example.display().to_string());
    }

    Ok(())
}
