//! Server command implementation

use std::path::Path;

use anyhow::Result;
use tally_core::TallyConfig;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_encrypt: bool,
    config: TallyConfig,
) -> Result<()> {
    println!("🚀 Starting Tally web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);

    // Comma-separated list of origins allowed to call the API
    let allowed_origins: Vec<String> = std::env::var("TALLY_ALLOWED_ORIGINS")
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if !allowed_origins.is_empty() {
        println!("   CORS origins: {}", allowed_origins.join(", "));
    }

    let db = open_db(db_path, no_encrypt)?;
    let server_config = tally_server::ServerConfig { allowed_origins };

    tally_server::serve_with_config(db, config, host, port, server_config).await
}
