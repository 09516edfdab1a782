use std::error::Error;
use std::path::Path;

use telemetry_hub::adapters::db::{
    collection_counts, open_connection, run_migrations, schema_version,
};
use telemetry_hub::app::AppConfig;

/// Creates or upgrades the document store and prints what it holds.
/// The target is the first argument, falling back to `DB_PATH`.
fn main() {
    let _ = dotenvy::dotenv();

    let db_path = match std::env::args().nth(1) {
        Some(path) => path,
        None => match AppConfig::from_env() {
            Ok(config) => config.db_path,
            Err(error) => {
                eprintln!("invalid configuration: {error}");
                std::process::exit(2);
            }
        },
    };

    if let Err(error) = prepare_store(&db_path) {
        eprintln!("failed to prepare document store at {db_path}: {error}");
        std::process::exit(1);
    }
}

fn prepare_store(db_path: &str) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = Path::new(db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let mut connection = open_connection(db_path)?;
    let before = schema_version(&connection)?;
    run_migrations(&mut connection)?;
    let after = schema_version(&connection)?;

    println!("{db_path}: schema v{before} -> v{after}");

    let counts = collection_counts(&connection)?;
    if counts.is_empty() {
        println!("no documents stored yet");
    }
    for (collection, count) in counts {
        println!("  {collection:<16} {count}");
    }

    Ok(())
}
