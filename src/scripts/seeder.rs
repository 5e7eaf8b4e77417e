//! Load or wipe the fixture data.
//!
//! ```text
//! seeder -i [data-dir]   import users, bootcamps, courses and reviews
//! seeder -d              delete them again
//! ```

use anyhow::{bail, Result};
use std::path::PathBuf;

use bootcamp_directory::config::{AppConfig, Backend};
use bootcamp_directory::seed::{destroy_data, import_data, Fixtures};
use bootcamp_directory::services::BcryptPasswordHasher;
use bootcamp_directory::store::PostgresStore;

enum Command {
    Import(PathBuf),
    Destroy,
}

fn parse_args() -> Result<Command> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("-i") => Ok(Command::Import(
            args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data")),
        )),
        Some("-d") => Ok(Command::Destroy),
        _ => bail!("Usage: seeder -i [data-dir] | seeder -d"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("sqlx", log::LevelFilter::Warn)
        .init();

    let command = parse_args()?;
    let config = AppConfig::load()?;
    if config.database.backend == Backend::Memory {
        bail!("The in-memory backend cannot be seeded; configure a Postgres database");
    }

    let database_url = config.database_url()?;
    let store = PostgresStore::new(&database_url, config.database.max_connections.unwrap_or(5)).await?;
    store.migrate().await?;
    println!("Connected to database.");

    match command {
        Command::Import(dir) => {
            let fixtures = Fixtures::load(&dir).await?;
            let summary = import_data(&store, &BcryptPasswordHasher::default(), fixtures).await?;
            println!(
                "Imported {} users, {} bootcamps, {} courses and {} reviews from {}",
                summary.users,
                summary.bootcamps,
                summary.courses,
                summary.reviews,
                dir.display()
            );
            println!("Data imported");
        }
        Command::Destroy => {
            let removed = destroy_data(&store).await?;
            println!("Removed {} documents", removed);
            println!("Data destroyed");
        }
    }

    Ok(())
}
