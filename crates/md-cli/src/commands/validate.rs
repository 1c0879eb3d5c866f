//! Validate command implementation

use anyhow::Result;
use md_core::MergeCallSite;
use std::path::Path;

use crate::cli::{GlobalArgs, ValidateArgs};
use crate::commands::common::{database_path, load_config, ExitCode};

/// Execute the validate command
pub(crate) async fn execute(args: &ValidateArgs, global: &GlobalArgs) -> Result<()> {
    // load_config runs Config::validate
    let config = match load_config(global) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ {:#}", e);
            return Err(ExitCode(1).into());
        }
    };

    println!("✓ Configuration for '{}' is valid", config.name);
    println!("  database: {}", database_path(&config, global));
    println!(
        "  source:   {} (*.{}, {} mode)",
        config.source.path, config.source.extension, config.source.mode
    );
    println!("  cutoff:   {}", config.cutoff_date);
    for site in MergeCallSite::ALL {
        println!(
            "  {:<13} {} keyed on [{}]",
            site.to_string(),
            config.tables.get(site),
            config.merge_keys.get(site).join(", ")
        );
    }

    if args.check_source {
        let source = config.source_path_absolute(Path::new(&global.project_dir));
        if !source.is_dir() {
            eprintln!("✗ Source directory {} does not exist", source.display());
            return Err(ExitCode(1).into());
        }
        println!("✓ Source directory {} exists", source.display());
    }

    Ok(())
}
