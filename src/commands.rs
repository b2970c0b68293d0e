use std::path::Path;

use anyhow::Result;
use tracing::info;

use clearfetch_core::{AppConfig, ListingRecord, TokenStore};

use crate::harvest::mint_token;

pub async fn run_solve(
    mut config: AppConfig,
    url: Option<String>,
    file: Option<String>,
    timeout: Option<u64>,
    headed: bool,
) -> Result<()> {
    if let Some(timeout) = timeout {
        config.solver.timeout_seconds = timeout;
    }
    if headed {
        config.solver.headed = true;
    }

    let url = url.unwrap_or_else(|| config.site.root_url.clone());
    let path = file.unwrap_or_else(|| config.tokens.file.clone());

    // A failed solve propagates before anything is written: the token file
    // stays untouched and the process exits non-zero.
    let (token, snapshot) = mint_token(&config.solver, &url).await?;

    let store = TokenStore::new(&path);
    store.append_and_save(&url, &snapshot)?;
    info!(path = %path, "token snapshot appended");

    // Ready-to-paste replay command for manual checks.
    let cookies = token
        .cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ");
    println!(
        "curl: curl --header \"Cookie: {}\" --header \"User-Agent: {}\" {}",
        cookies, token.client_identity, url
    );
    if !snapshot.expires.is_empty() {
        println!("expires: {}", snapshot.expires);
    }

    Ok(())
}

pub fn run_export(config: AppConfig, output: &str) -> Result<()> {
    let dir = Path::new(&config.fetch.output_dir);
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

    let mut parts = vec![
        "Listing summary".to_string(),
        format!("Generated: {now}"),
        String::new(),
    ];

    for target in &config.site.targets {
        let (title, path) = match &target.filter_category {
            Some(filter) => (
                filter.clone(),
                dir.join(format!("listing_{}_{}.json", target.label, filter)),
            ),
            None => (
                target.label.clone(),
                dir.join(format!("listing_{}.json", target.label)),
            ),
        };
        parts.push(format!("==== {} ({}) ====", title, target.label));

        let records: Vec<ListingRecord> = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();

        if records.is_empty() {
            parts.push("no data".to_string());
        } else {
            parts.push(format!("total: {}", records.len()));
            for (i, record) in records.iter().enumerate() {
                parts.push(format_entry(i + 1, record, &target.label));
            }
        }
        parts.push(String::new());
    }

    let document = parts.join("\n");
    std::fs::write(output, document)?;

    println!("summary written to {output}");
    Ok(())
}

fn format_entry(idx: usize, record: &ListingRecord, label: &str) -> String {
    let phones = if record.phones.is_empty() {
        "none".to_string()
    } else {
        record.phones.join(", ")
    };
    let new = if record.new { "yes" } else { "no" };
    [
        format!("[{label}-{idx}] category: {}", record.category),
        format!("    description: {}", record.description),
        format!("    phones: {phones}"),
        format!("    new: {new}"),
    ]
    .join("\n")
}
