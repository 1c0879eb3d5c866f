//! Init command implementation - scaffolds a new Medallion project

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::cli::InitArgs;

/// Execute the init command
pub(crate) async fn execute(args: &InitArgs) -> Result<()> {
    // Reject names that could cause path traversal or confusing directory names
    if args.name.contains('/')
        || args.name.contains('\\')
        || args.name.contains("..")
        || args.name.starts_with('.')
        || args.name.starts_with('-')
    {
        anyhow::bail!(
            "Invalid project name '{}': must not contain '/', '\\', '..', or start with '.' or '-'",
            args.name
        );
    }

    let project_dir = Path::new(&args.name);
    if project_dir.exists() {
        anyhow::bail!(
            "Directory '{}' already exists. Choose a different project name.",
            args.name
        );
    }

    println!("Creating new Medallion project: {}\n", args.name);
    let created = scaffold(project_dir, &args.name, &args.database_path)?;
    for path in &created {
        println!("  Created {}", path);
    }
    println!();
    println!("Project '{}' initialized successfully!", args.name);
    println!();
    println!("Next steps:");
    println!("  cd {}", args.name);
    println!("  cp <your files> files/bronze/");
    println!("  medallion validate   # Check the configuration");
    println!("  medallion run        # Load the bronze files");

    Ok(())
}

/// Write the project skeleton under `project_dir`, returning the created paths
pub(crate) fn scaffold(project_dir: &Path, name: &str, database_path: &str) -> Result<Vec<String>> {
    let bronze = project_dir.join("files/bronze");
    fs::create_dir_all(&bronze)
        .with_context(|| format!("Failed to create directory: {}", bronze.display()))?;

    // Escape YAML special characters in interpolated values
    let safe_name = name.replace('"', "\\\"");
    let safe_db_path = database_path.replace('"', "\\\"");
    let config_content = format!(
        r#"name: "{name}"
version: "1.0.0"

source:
  path: files/bronze
  extension: csv
  has_header: true
  delimiter: ","
  mode: lenient

# Orders dated before this day are flagged in the silver table
cutoff_date: 2019-08-01

database:
  path: "{db_path}"

target_path: target
parallel_dimensions: false

# update_columns:
#   silver: [Email, Quantity, UnitPrice, Tax, ModifiedTS]
"#,
        name = safe_name,
        db_path = safe_db_path,
    );
    fs::write(project_dir.join("medallion.yml"), config_content)
        .context("Failed to write medallion.yml")?;

    let gitignore = "target/\n*.duckdb\n*.duckdb.wal\n";
    fs::write(project_dir.join(".gitignore"), gitignore).context("Failed to write .gitignore")?;

    Ok(vec![
        "medallion.yml".to_string(),
        "files/bronze/".to_string(),
        ".gitignore".to_string(),
    ])
}
