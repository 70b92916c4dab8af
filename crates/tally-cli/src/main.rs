//! Tally CLI - General-ledger import for bookkeepers
//!
//! Usage:
//!   tally init                               Initialize database
//!   tally accounts add --client acme ...     Maintain a client's chart of accounts
//!   tally import --client acme --file CSV    Analyze and import a ledger extract
//!   tally serve --port 3000                  Start web server

mod cli;
mod commands;


use anyhow::{bail, Result};
use clap::Parser;
use tally_core::{EntityMatcher, ImportManager};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Accounts { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None => commands::cmd_accounts_list(&db, None),
                Some(AccountsAction::List { client }) => {
                    commands::cmd_accounts_list(&db, client.as_deref())
                }
                Some(AccountsAction::Add {
                    client,
                    number,
                    name,
                    account_type,
                }) => commands::cmd_accounts_add(&db, &client, &number, &name, &account_type),
                Some(AccountsAction::Delete { client, number }) => {
                    commands::cmd_accounts_delete(&db, &client, &number)
                }
            }
        }
        Commands::Import {
            client,
            file,
            maps,
            skips,
            create_missing,
            dry_run,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let manager = ImportManager::new(db, config);
            let options = commands::ImportOptions {
                maps,
                skips,
                create_missing,
                dry_run,
            };
            commands::cmd_import(&manager, &client, &file, &options)
        }
        Commands::Status { client } => match client {
            None => commands::cmd_status(&cli.db, cli.no_encrypt),
            Some(client) => {
                let config = commands::load_config(cli.config.as_deref())?;
                let db = commands::open_db(&cli.db, cli.no_encrypt)?;
                commands::cmd_client_status(&ImportManager::new(db, config), &client)
            }
        },
        Commands::Cancel {
            client,
            session,
            reject,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_cancel(&ImportManager::new(db, config), &client, session, reject)
        }
        Commands::Validate { file } => {
            if !commands::cmd_validate(&file)? {
                bail!("Journal entry is not valid");
            }
            Ok(())
        }
        Commands::Match { file } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_match(&EntityMatcher::new(config.matcher), &file).map(|_| ())
        }
        Commands::Serve { port, host } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_serve(&cli.db, &host, port, cli.no_encrypt, config).await
        }
    }
}
