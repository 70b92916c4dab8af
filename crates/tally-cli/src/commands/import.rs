//! Import command implementations (import, cancel)

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use regex::Regex;
use tally_core::import::parse_rows;
use tally_core::models::{AccountAnalysis, AccountMapping, ImportStatus, MatchType};
use tally_core::{Database, Error, ImportManager};
use tracing::debug;

use super::truncate;

/// Rows listed in the skipped-row report before it is cut short
const SKIPPED_ROWS_SHOWN: usize = 10;

/// Options for one `tally import` run
#[derive(Debug, Default)]
pub struct ImportOptions {
    /// `REF=NUMBER` pairs
    pub maps: Vec<String>,
    /// References whose rows are left out
    pub skips: Vec<String>,
    pub create_missing: bool,
    pub dry_run: bool,
}

/// Split a `REF=NUMBER` argument. The reference may itself contain spaces.
pub fn parse_map_arg(arg: &str) -> Result<(String, String)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^\s*(.+?)\s*=\s*(\S+)\s*$").expect("valid regex"));

    match re.captures(arg) {
        Some(caps) => Ok((caps[1].to_string(), caps[2].to_string())),
        None => bail!("Invalid --map '{}': expected REF=NUMBER", arg),
    }
}

/// Turn --map/--skip arguments into mapping decisions for a client
pub fn build_mappings(
    db: &Database,
    client: &str,
    maps: &[String],
    skips: &[String],
) -> Result<HashMap<String, AccountMapping>> {
    let mut mappings = HashMap::new();

    for arg in maps {
        let (account_ref, number) = parse_map_arg(arg)?;
        let account = db
            .find_chart_account_by_number(client, &number)?
            .with_context(|| format!("Client {} has no account numbered {}", client, number))?;
        mappings.insert(account_ref, AccountMapping::map_to(account.id, "cli: --map"));
    }

    for account_ref in skips {
        mappings.insert(account_ref.trim().to_string(), AccountMapping::skip());
    }

    Ok(mappings)
}

pub fn cmd_import(
    manager: &ImportManager,
    client: &str,
    file: &Path,
    options: &ImportOptions,
) -> Result<()> {
    println!("📥 Importing {} for {}...", file.display(), client);

    let reader =
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let rows = parse_rows(reader).context("Failed to parse ledger CSV")?;
    println!("   Found {} rows", rows.len());

    let mut mappings = build_mappings(manager.db(), client, &options.maps, &options.skips)?;
    debug!(client, decisions = mappings.len(), "Mapping decisions from arguments");

    if options.dry_run {
        let (analysis, summary) = manager.preview(client, &rows)?;
        print_analysis(&analysis, &mappings);
        println!();
        println!(
            "   Match rate: {}% ({} exact, {} fuzzy, {} new)",
            summary.match_rate,
            summary.exact_matches,
            summary.fuzzy_matches,
            summary.new_accounts_needed
        );
        println!("🔍 Dry run: nothing was written");
        return Ok(());
    }

    let filename = file.file_name().and_then(|n| n.to_str());
    let analysis = manager.analyze(client, filename, rows)?;
    if analysis.resumed {
        println!("   ↩️  Resuming session {}", analysis.session_id);
    } else {
        println!("   Session {}", analysis.session_id);
    }
    print_analysis(&analysis.account_analysis, &mappings);

    if options.create_missing {
        for a in &analysis.account_analysis {
            if a.match_type == MatchType::Missing && a.can_create {
                mappings
                    .entry(a.account_ref.clone())
                    .or_insert_with(AccountMapping::create);
            }
        }
    }

    let summary = match manager.start_import(
        client,
        analysis.session_id,
        &mappings,
        options.create_missing,
    ) {
        Ok(summary) => summary,
        Err(Error::MappingIncomplete(refs)) => {
            println!();
            println!("⏸️  Session {} is waiting on mappings for:", analysis.session_id);
            for r in &refs {
                println!("   - {}", r);
            }
            println!();
            println!("   Re-run with --map \"REF=NUMBER\", --skip \"REF\" or --create-missing");
            bail!("{} account reference(s) still need a mapping", refs.len());
        }
        Err(e) => return Err(e.into()),
    };

    manager.db().log_audit(
        "cli",
        "finish_import",
        Some("import_session"),
        Some(summary.session_id),
        Some(&format!(
            "status={}, imported={}, skipped={}, accounts_created={}",
            summary.status, summary.successful, summary.skipped, summary.accounts_created
        )),
    )?;

    println!();
    match summary.status {
        ImportStatus::Completed => println!("✅ Import complete!"),
        status => println!("⚠️  Import {}", status),
    }
    println!("   Imported: {}", summary.successful);
    println!("   Skipped: {}", summary.skipped);
    if summary.accounts_created > 0 {
        println!("   Accounts created: {}", summary.accounts_created);
    }

    if !summary.skipped_rows.is_empty() {
        println!();
        println!("   Skipped rows:");
        for row in summary.skipped_rows.iter().take(SKIPPED_ROWS_SHOWN) {
            println!(
                "   - row {} [{}]: {}",
                row.row_index + 1,
                truncate(&row.account_ref, 24),
                row.reason
            );
        }
        if summary.skipped_rows.len() > SKIPPED_ROWS_SHOWN {
            println!(
                "   ... and {} more",
                summary.skipped_rows.len() - SKIPPED_ROWS_SHOWN
            );
        }
    }

    Ok(())
}

fn print_analysis(analysis: &[AccountAnalysis], mappings: &HashMap<String, AccountMapping>) {
    println!();
    println!("   Account references:");
    for a in analysis {
        let icon = match a.match_type {
            MatchType::Exact => "✅",
            MatchType::Fuzzy => "🔶",
            MatchType::Missing => "➕",
            MatchType::Error => "❌",
        };
        let target = match &a.matched_account {
            Some(account) => format!("→ {} ({}%)", account.label(), a.confidence),
            None => match &a.error {
                Some(reason) => reason.clone(),
                None => "no match".to_string(),
            },
        };
        let decision = match mappings.get(&a.account_ref) {
            Some(m) => format!(" [{}]", m.action),
            None if a.auto_mapped => " [auto]".to_string(),
            None => String::new(),
        };
        println!(
            "   {} {:<28} {:>4} rows  {}{}",
            icon,
            truncate(&a.account_ref, 28),
            a.transaction_count,
            target,
            decision
        );
    }
}

pub fn cmd_cancel(
    manager: &ImportManager,
    client: &str,
    session_id: i64,
    reject: bool,
) -> Result<()> {
    let session = if reject {
        manager.reject(client, session_id)?
    } else {
        manager.cancel(client, session_id)?
    };

    manager.db().log_audit(
        "cli",
        if reject { "reject_import" } else { "cancel_import" },
        Some("import_session"),
        Some(session_id),
        Some(&format!("client={}", client)),
    )?;

    println!("🛑 Session {} is now {}", session.id, session.status);
    if let Some(reason) = &session.error {
        println!("   {}", reason);
    }
    Ok(())
}
