#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use clap::{Parser, Subcommand};
use push_registrar::adapters::persistence::FilePersistence;
use push_registrar::config::Config;
use push_registrar::core::ConfigStore;
use push_registrar::domain::extended_json;
use push_registrar::telemetry;
use std::io::Write;
use std::sync::Arc;

/// Inspect and repair the locally persisted push provider configs.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print every stored provider config
    Show,
    /// Print the stored config of one service
    Get { service: String },
    /// Remove the stored config of one service
    Forget { service: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_telemetry(&cli.config.telemetry)?;

    let store_config = &cli.config.store;
    let persistence = Arc::new(FilePersistence::new(&store_config.data_dir, &store_config.suite_name));
    tracing::debug!(path = %persistence.path().display(), key = %store_config.configs_key, "Opening config store");
    let store = ConfigStore::new(persistence, store_config.configs_key.as_str());

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Show => {
            let configs = extended_json::encode_relaxed(&store.load());
            writeln!(stdout, "{}", serde_json::to_string_pretty(&configs)?)?;
        }
        Command::Get { service } => match store.provider_info(&service) {
            Some(info) => writeln!(stdout, "{}", serde_json::to_string_pretty(&extended_json::encode_relaxed(&info))?)?,
            None => anyhow::bail!("no config stored for service \"{service}\""),
        },
        Command::Forget { service } => {
            store.remove_service(&service)?;
            tracing::info!(service = %service, "Removed stored push config");
        }
    }

    Ok(())
}
