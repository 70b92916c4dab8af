//! Chart of accounts commands (list, add, delete)

use anyhow::{bail, Context, Result};
use tally_core::db::Database;
use tally_core::models::{AccountType, NewChartAccount};

use super::truncate;

pub fn cmd_accounts_list(db: &Database, client: Option<&str>) -> Result<()> {
    let clients = match client {
        Some(c) => vec![c.to_string()],
        None => db.list_clients()?,
    };

    if clients.is_empty() {
        println!("No clients yet. Add an account with: tally accounts add --client <id> ...");
        return Ok(());
    }

    for client_id in clients {
        let accounts = db.list_chart_accounts(&client_id)?;
        println!();
        println!("📒 Chart of accounts: {} ({} accounts)", client_id, accounts.len());
        println!("   ─────────────────────────────────────────────────────────────");
        if accounts.is_empty() {
            println!("   (empty)");
            continue;
        }
        for account in accounts {
            println!(
                "   {:>6}  {:<36} {:<10} (id {})",
                account.number,
                truncate(&account.name, 36),
                account.account_type,
                account.id
            );
        }
    }
    println!();

    Ok(())
}

pub fn cmd_accounts_add(
    db: &Database,
    client: &str,
    number: &str,
    name: &str,
    account_type: &str,
) -> Result<()> {
    let account_type: AccountType = account_type.parse().map_err(anyhow::Error::msg)?;

    let account = db
        .create_chart_account(
            client,
            &NewChartAccount {
                number: number.to_string(),
                name: name.to_string(),
                account_type,
            },
        )
        .context("Failed to add account")?;

    db.log_audit(
        "cli",
        "create_account",
        Some("chart_account"),
        Some(account.id),
        Some(&format!("client={}, number={}", client, account.number)),
    )?;

    println!(
        "✅ Added {} ({}) for {}",
        account.label(),
        account.account_type,
        client
    );
    Ok(())
}

pub fn cmd_accounts_delete(db: &Database, client: &str, number: &str) -> Result<()> {
    let account = match db.find_chart_account_by_number(client, number)? {
        Some(a) => a,
        None => bail!("Client {} has no account numbered {}", client, number),
    };

    if !db.delete_chart_account(client, account.id)? {
        bail!("Account {} was already removed", account.label());
    }

    db.log_audit(
        "cli",
        "delete_account",
        Some("chart_account"),
        Some(account.id),
        Some(&format!("client={}, number={}", client, account.number)),
    )?;

    println!("🗑️  Deleted {} for {}", account.label(), client);
    Ok(())
}
