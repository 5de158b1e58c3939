//! `fieldcrypt`: runtime key generation and deployment self-check.
//!
//! `fieldcrypt keygen` prints a fresh base64 runtime key to stdout.
//!
//! `fieldcrypt check` (the default) runs the startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline.
//! 3. Build the [`EncryptionServiceManager`].
//! 4. Encrypt and decrypt a sample value on the blocking pool and log latency.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use uuid::Uuid;

use fieldcrypt::config::Config;
use fieldcrypt::telemetry;
use fieldcrypt::EncryptionServiceManager;

const SELF_TEST_PLAINTEXT: &str = "fieldcrypt self-test";

/// Tenant-scoped field-level encryption tooling
#[derive(Parser)]
#[command(name = "fieldcrypt")]
#[command(version)]
#[command(about = "Runtime key generation and deployment self-check", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Load configuration, build the service manager and run a self-test (default)
    Check,

    /// Print a fresh base64 runtime key
    Keygen,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Check) {
        Command::Keygen => {
            println!("{}", EncryptionServiceManager::generate_runtime_key().to_base64());
            Ok(())
        }
        Command::Check => check().await,
    }
}

async fn check() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    let kdf_config = cfg.kdf_config()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        kdf = %kdf_config.algorithm(),
        max_cached_tenants = ?cfg.max_cached_tenants(),
        "fieldcrypt starting"
    );

    // -----------------------------------------------------------------------
    // 3. Service manager
    // -----------------------------------------------------------------------
    let manager = EncryptionServiceManager::with_capacity(
        cfg.runtime_key()?,
        Some(kdf_config),
        cfg.max_cached_tenants(),
    )
    .context("failed to build encryption service manager")?;

    // -----------------------------------------------------------------------
    // 4. Self-test
    // -----------------------------------------------------------------------
    let self_test_tenant = Uuid::new_v4();
    let service = manager.get_service(self_test_tenant)?;

    let started = Instant::now();
    let blob = service
        .encrypt_async(SELF_TEST_PLAINTEXT.to_owned())
        .await
        .context("self-test encryption failed")?;
    let encrypt_ms = started.elapsed().as_millis();

    let started = Instant::now();
    let plaintext = service
        .decrypt_async(blob.clone())
        .await
        .context("self-test decryption failed")?;
    let decrypt_ms = started.elapsed().as_millis();

    if plaintext != SELF_TEST_PLAINTEXT {
        anyhow::bail!("self-test round trip returned different plaintext");
    }
    manager.evict(self_test_tenant);

    info!(
        blob_len = blob.len(),
        encrypt_ms = encrypt_ms as u64,
        decrypt_ms = decrypt_ms as u64,
        "self-test passed"
    );

    telemetry::shutdown_telemetry();
    Ok(())
}
