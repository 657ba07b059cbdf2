use std::{env, path::Path};

use stockify_auth::config::SigningConfig;
use stockify_auth::keys::{KeyStore, KeyStoreEntry};
use stockify_server::ServerBuilder;
use stockify_server::config::loader::load_config;

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From STOCKIFY_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (stockify.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (STOCKIFY_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    // Initialize tracing early with the default level
    stockify_server::observability::init_tracing();

    let (config_path, source) = resolve_config_path();

    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        path = %config_path,
        source = %source,
        "Configuration loaded"
    );

    stockify_server::observability::apply_logging_level(&cfg.logging.level);

    if let Some(path) = generate_keystore_arg() {
        if let Err(e) = generate_keystore(Path::new(&path), &cfg.auth.signing) {
            eprintln!("Keystore generation failed: {e}");
            std::process::exit(2);
        }
        return;
    }

    let server = match ServerBuilder::new().with_config(cfg).build() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Server initialization failed: {e}");
            std::process::exit(2);
        }
    };

    if let Err(err) = server.run().await {
        eprintln!("Server error: {err}");
    }
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: STOCKIFY_CONFIG
/// 3. Default: stockify.toml
fn resolve_config_path() -> (String, ConfigSource) {
    if let Some(path) = flag_value("--config") {
        return (path, ConfigSource::CliArgument);
    }

    if let Ok(path) = env::var("STOCKIFY_CONFIG")
        && !path.is_empty()
    {
        return (path, ConfigSource::EnvironmentVariable);
    }

    ("stockify.toml".to_string(), ConfigSource::Default)
}

/// `--generate-keystore <path>` writes a fresh key under the configured alias
/// and exits.
fn generate_keystore_arg() -> Option<String> {
    flag_value("--generate-keystore")
}

fn flag_value(flag: &str) -> Option<String> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == flag {
            return args.next();
        }
    }
    None
}

/// Adds a newly generated key to the keystore at `path`, creating the file
/// if needed. An existing entry with the same alias is replaced.
fn generate_keystore(path: &Path, signing: &SigningConfig) -> anyhow::Result<()> {
    let mut store = if path.exists() {
        KeyStore::from_path(path)?
    } else {
        KeyStore::default()
    };

    let entry = KeyStoreEntry::generate(
        signing.alias.clone(),
        signing.algorithm,
        signing.passphrase.as_deref(),
    )?;
    store.insert(entry);
    std::fs::write(path, store.to_toml_string()?)?;

    tracing::info!(
        path = %path.display(),
        alias = %signing.alias,
        algorithm = %signing.algorithm,
        encrypted = signing.passphrase.is_some(),
        "Keystore entry written"
    );
    Ok(())
}
