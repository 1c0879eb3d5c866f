//! Tables command implementation - row counts of the pipeline tables

use anyhow::{Context, Result};
use md_core::MergeCallSite;
use serde::Serialize;

use crate::cli::{GlobalArgs, OutputFormat, TablesArgs};
use crate::commands::common::{load_config, open_store, print_table};

#[derive(Debug, Serialize)]
struct TableInfo {
    layer: String,
    table: String,
    exists: bool,
    rows: usize,
}

/// Execute the tables command
pub(crate) async fn execute(args: &TablesArgs, global: &GlobalArgs) -> Result<()> {
    let config = load_config(global)?;
    let store = open_store(&config, global)?;

    let mut tables = Vec::with_capacity(MergeCallSite::ALL.len());
    for site in MergeCallSite::ALL {
        let table = config.tables.get(site);
        let exists = store
            .relation_exists(table)
            .await
            .with_context(|| format!("Failed to look up {}", table))?;
        let rows = if exists {
            store
                .row_count(table)
                .await
                .with_context(|| format!("Failed to count rows of {}", table))?
        } else {
            0
        };
        tables.push(TableInfo {
            layer: site.to_string(),
            table: table.to_string(),
            exists,
            rows,
        });
    }

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tables)?),
        OutputFormat::Text => {
            let rows: Vec<Vec<String>> = tables
                .iter()
                .map(|t| {
                    vec![
                        t.layer.clone(),
                        t.table.clone(),
                        if t.exists {
                            t.rows.to_string()
                        } else {
                            "-".to_string()
                        },
                    ]
                })
                .collect();
            print_table(&["LAYER", "TABLE", "ROWS"], &rows);
        }
    }

    Ok(())
}
