//! Idle Vault entry point
//!
//! Native: a small save-management CLI over a directory-backed store.
//! Web: installs logging, opens LocalStorage and loads the current save.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_app {
    use std::cell::RefCell;
    use std::rc::Rc;

    use idle_vault::platform::LocalStorage;
    use idle_vault::{SaveConfig, SaveManager, Statistics};

    pub fn run() {
        console_error_panic_hook::set_once();
        if let Err(err) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::error_1(&format!("Failed to init logger: {err}").into());
        }

        log::info!("Idle Vault starting...");

        let store = match LocalStorage::open() {
            Ok(store) => store,
            Err(err) => {
                log::error!("Saves disabled: {err}");
                return;
            }
        };

        let stats = Rc::new(RefCell::new(Statistics::new()));
        let mut manager = SaveManager::new(store, SaveConfig::default());
        manager.register_subsystem(Statistics::SUBSYSTEM_NAME, stats.clone());

        match manager.load() {
            Ok(report) if report.is_fresh() => log::info!("Fresh game"),
            Ok(_) => log::info!(
                "Lifetime earned: {}",
                manager.format(&stats.borrow().lifetime_earned)
            ),
            Err(err) => log::error!("Could not load save, restore a backup: {err}"),
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_app::run();
}

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    use anyhow::{Context, Result};
    use clap::{Parser, Subcommand};
    use idle_vault::persistence::Payload;
    use idle_vault::platform::FileStore;
    use idle_vault::{Decimal, Notation, SaveConfig, SaveManager, Statistics};

    #[derive(Parser)]
    #[command(author, version, about = "Idle Vault save manager")]
    pub struct Cli {
        /// Directory holding the save files
        #[arg(long, env = "IDLE_VAULT_DIR", default_value = "saves")]
        dir: PathBuf,
        #[command(subcommand)]
        command: Command,
    }

    #[derive(Subcommand)]
    enum Command {
        /// Save core fields given as a JSON object.
        Save { json: String },
        /// Load and print the current save.
        Load,
        /// Print the save as export text.
        Export,
        /// Replace the save with export text, then load it.
        Import { text: String },
        /// List backup slots.
        Backups,
        /// Restore a backup slot and load it.
        Restore { slot: u8 },
        /// Delete the save.
        Delete {
            /// Delete backups too
            #[arg(long, default_value_t = false)]
            all: bool,
        },
        /// Format a number.
        Format {
            number: Decimal,
            #[arg(value_parser = parse_notation, default_value = "standard")]
            notation: Notation,
        },
        /// Set the display notation.
        Notation {
            #[arg(value_parser = parse_notation)]
            name: Notation,
        },
    }

    pub fn run(cli: Cli) -> Result<()> {
        // Formatting needs no store
        if let Command::Format { number, notation } = &cli.command {
            println!("{}", notation.format(number));
            return Ok(());
        }

        let store = FileStore::open(&cli.dir)
            .with_context(|| format!("open save directory {}", cli.dir.display()))?;
        let stats = Rc::new(RefCell::new(Statistics::new()));
        let mut manager = SaveManager::new(store, SaveConfig::default());
        manager.register_subsystem(Statistics::SUBSYSTEM_NAME, stats.clone());

        match cli.command {
            Command::Save { json } => {
                let core: Payload = serde_json::from_str(&json).context("parse core fields")?;
                // Keep existing subsystem state rather than overwriting it with defaults
                if manager.has_save() {
                    manager.load()?;
                }
                let report = manager.save(&core)?;
                println!(
                    "saved {} bytes (checksum {}, backed up: {})",
                    report.bytes, report.checksum, report.backed_up
                );
            }
            Command::Load => {
                let report = manager.load()?;
                match report.data {
                    None => println!("no save"),
                    Some(data) => {
                        if report.checksum_mismatch {
                            eprintln!("warning: checksum mismatch");
                        }
                        println!("{}", serde_json::to_string_pretty(&data)?);
                        println!(
                            "lifetime earned: {}",
                            manager.format(&stats.borrow().lifetime_earned)
                        );
                    }
                }
            }
            Command::Export => println!("{}", manager.export_save()?),
            Command::Import { text } => {
                let report = manager.import_save(&text)?;
                if report.stripped_keys > 0 {
                    eprintln!("warning: removed {} unsafe key(s)", report.stripped_keys);
                }
                manager.load()?;
                println!("imported {} bytes", report.bytes);
            }
            Command::Backups => {
                for info in manager.backups_info()? {
                    match (info.exists, info.timestamp) {
                        (false, _) => println!("slot {}: empty", info.slot),
                        (true, Some(ts)) => {
                            println!("slot {}: {} bytes, saved at {ts}", info.slot, info.bytes)
                        }
                        (true, None) => {
                            println!("slot {}: {} bytes (unreadable)", info.slot, info.bytes)
                        }
                    }
                }
            }
            Command::Restore { slot } => {
                manager.restore_backup(slot)?;
                println!("restored slot {slot}");
            }
            Command::Delete { all } => {
                manager.delete_save(all)?;
                println!("deleted");
            }
            Command::Notation { name } => {
                manager.settings_mut().notation = name;
                manager.save_settings()?;
                println!("notation set to {}", name.as_str());
            }
            Command::Format { .. } => {}
        }
        Ok(())
    }

    fn parse_notation(name: &str) -> Result<Notation, String> {
        Notation::from_str(name).ok_or_else(|| {
            let known: Vec<_> = Notation::ALL.iter().map(Notation::as_str).collect();
            format!("unknown notation {name:?} (expected one of {})", known.join(", "))
        })
    }

}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    use clap::Parser;

    env_logger::init();
    log::debug!("Idle Vault (native) starting...");
    cli::run(cli::Cli::parse())
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}
