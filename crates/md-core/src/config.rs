//! Configuration types and parsing for medallion.yml

use crate::error::{CoreError, CoreResult};
use crate::record::{
    columns, ConformedRecord, CustomerDimRow, DateDimRow, FactRow, ProductDimRow, RawRecord,
    TableRecord,
};
use crate::schema::TableSchema;
use crate::serde_helpers::default_true;
use crate::table_name::TableName;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Main project configuration from medallion.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Project name
    pub name: String,

    /// Project version
    #[serde(default = "default_version")]
    pub version: String,

    /// Bronze source files
    #[serde(default)]
    pub source: SourceConfig,

    /// Orders dated strictly before this day get `IsFlagged = true`
    #[serde(default = "default_cutoff_date")]
    pub cutoff_date: NaiveDate,

    /// Database connection configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Catalog names of the silver and gold tables
    #[serde(default)]
    pub tables: TablesConfig,

    /// Match-key columns for each merge call site
    #[serde(default)]
    pub merge_keys: MergeKeysConfig,

    /// Columns overwritten when an incoming row matches an existing one.
    /// Empty (the default) leaves matched rows untouched.
    #[serde(default)]
    pub update_columns: UpdateColumnsConfig,

    /// Output directory for run state
    #[serde(default = "default_target_path")]
    pub target_path: String,

    /// Build the customer and product dimensions concurrently
    #[serde(default)]
    pub parallel_dimensions: bool,
}

/// How rows that fail type coercion are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Skip the row and log a warning
    #[default]
    Lenient,
    /// Abort the whole batch
    Strict,
}

impl std::fmt::Display for IngestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestMode::Lenient => write!(f, "lenient"),
            IngestMode::Strict => write!(f, "strict"),
        }
    }
}

/// Bronze source directory and file layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Directory holding the delimited files
    #[serde(default = "default_source_path")]
    pub path: String,

    /// File extension to pick up
    #[serde(default = "default_extension")]
    pub extension: String,

    /// First line of each file is a header
    #[serde(default = "default_true")]
    pub has_header: bool,

    /// Field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Coercion failure policy
    #[serde(default)]
    pub mode: IngestMode,

    /// Column layout of the files, in file order
    #[serde(default = "RawRecord::source_schema")]
    pub columns: TableSchema,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: default_source_path(),
            extension: default_extension(),
            has_header: true,
            delimiter: default_delimiter(),
            mode: IngestMode::default(),
            columns: RawRecord::source_schema(),
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database path (DuckDB file or :memory:)
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// The five merge call sites of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeCallSite {
    Silver,
    DimDate,
    DimCustomer,
    DimProduct,
    Fact,
}

impl MergeCallSite {
    pub const ALL: [MergeCallSite; 5] = [
        MergeCallSite::Silver,
        MergeCallSite::DimDate,
        MergeCallSite::DimCustomer,
        MergeCallSite::DimProduct,
        MergeCallSite::Fact,
    ];

    /// Schema of the table merged into at this call site
    pub fn table_schema(&self) -> TableSchema {
        match self {
            MergeCallSite::Silver => ConformedRecord::table_schema(),
            MergeCallSite::DimDate => DateDimRow::table_schema(),
            MergeCallSite::DimCustomer => CustomerDimRow::table_schema(),
            MergeCallSite::DimProduct => ProductDimRow::table_schema(),
            MergeCallSite::Fact => FactRow::table_schema(),
        }
    }
}

impl std::fmt::Display for MergeCallSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeCallSite::Silver => write!(f, "silver"),
            MergeCallSite::DimDate => write!(f, "dim_date"),
            MergeCallSite::DimCustomer => write!(f, "dim_customer"),
            MergeCallSite::DimProduct => write!(f, "dim_product"),
            MergeCallSite::Fact => write!(f, "fact"),
        }
    }
}

/// Catalog table names
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TablesConfig {
    #[serde(default = "default_silver_table")]
    pub silver: TableName,
    #[serde(default = "default_dim_date_table")]
    pub dim_date: TableName,
    #[serde(default = "default_dim_customer_table")]
    pub dim_customer: TableName,
    #[serde(default = "default_dim_product_table")]
    pub dim_product: TableName,
    #[serde(default = "default_fact_table")]
    pub fact: TableName,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            silver: default_silver_table(),
            dim_date: default_dim_date_table(),
            dim_customer: default_dim_customer_table(),
            dim_product: default_dim_product_table(),
            fact: default_fact_table(),
        }
    }
}

impl TablesConfig {
    pub fn get(&self, site: MergeCallSite) -> &TableName {
        match site {
            MergeCallSite::Silver => &self.silver,
            MergeCallSite::DimDate => &self.dim_date,
            MergeCallSite::DimCustomer => &self.dim_customer,
            MergeCallSite::DimProduct => &self.dim_product,
            MergeCallSite::Fact => &self.fact,
        }
    }
}

/// Match-key columns per merge call site
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeKeysConfig {
    #[serde(default = "default_silver_keys")]
    pub silver: Vec<String>,
    #[serde(default = "default_dim_date_keys")]
    pub dim_date: Vec<String>,
    #[serde(default = "default_dim_customer_keys")]
    pub dim_customer: Vec<String>,
    #[serde(default = "default_dim_product_keys")]
    pub dim_product: Vec<String>,
    #[serde(default = "default_fact_keys")]
    pub fact: Vec<String>,
}

impl Default for MergeKeysConfig {
    fn default() -> Self {
        Self {
            silver: default_silver_keys(),
            dim_date: default_dim_date_keys(),
            dim_customer: default_dim_customer_keys(),
            dim_product: default_dim_product_keys(),
            fact: default_fact_keys(),
        }
    }
}

impl MergeKeysConfig {
    pub fn get(&self, site: MergeCallSite) -> &[String] {
        match site {
            MergeCallSite::Silver => &self.silver,
            MergeCallSite::DimDate => &self.dim_date,
            MergeCallSite::DimCustomer => &self.dim_customer,
            MergeCallSite::DimProduct => &self.dim_product,
            MergeCallSite::Fact => &self.fact,
        }
    }
}

/// Update columns per merge call site
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateColumnsConfig {
    #[serde(default)]
    pub silver: Vec<String>,
    #[serde(default)]
    pub dim_date: Vec<String>,
    #[serde(default)]
    pub dim_customer: Vec<String>,
    #[serde(default)]
    pub dim_product: Vec<String>,
    #[serde(default)]
    pub fact: Vec<String>,
}

impl UpdateColumnsConfig {
    pub fn get(&self, site: MergeCallSite) -> &[String] {
        match site {
            MergeCallSite::Silver => &self.silver,
            MergeCallSite::DimDate => &self.dim_date,
            MergeCallSite::DimCustomer => &self.dim_customer,
            MergeCallSite::DimProduct => &self.dim_product,
            MergeCallSite::Fact => &self.fact,
        }
    }
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_cutoff_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 8, 1).unwrap_or_default()
}

fn default_source_path() -> String {
    "files/bronze".to_string()
}

fn default_extension() -> String {
    "csv".to_string()
}

fn default_delimiter() -> char {
    ','
}

const DEFAULT_DB_PATH: &str = ":memory:";

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

fn default_target_path() -> String {
    "target".to_string()
}

fn default_silver_table() -> TableName {
    TableName::new("sales_silver")
}

fn default_dim_date_table() -> TableName {
    TableName::new("dimdate_gold")
}

fn default_dim_customer_table() -> TableName {
    TableName::new("dimcustomer_gold")
}

fn default_dim_product_table() -> TableName {
    TableName::new("dimproduct_gold")
}

fn default_fact_table() -> TableName {
    TableName::new("factsales_gold")
}

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn default_silver_keys() -> Vec<String> {
    keys(&[
        columns::SALES_ORDER_NUMBER,
        columns::ORDER_DATE,
        columns::CUSTOMER_NAME,
        columns::ITEM,
    ])
}

fn default_dim_date_keys() -> Vec<String> {
    keys(&[columns::ORDER_DATE])
}

fn default_dim_customer_keys() -> Vec<String> {
    keys(&[columns::CUSTOMER_NAME, columns::EMAIL])
}

fn default_dim_product_keys() -> Vec<String> {
    keys(&[columns::ITEM_NAME, columns::ITEM_INFO])
}

fn default_fact_keys() -> Vec<String> {
    keys(&[columns::ORDER_DATE, columns::CUSTOMER_ID, columns::ITEM_ID])
}

impl Config {
    /// Configuration with every default applied
    pub fn with_name(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: default_version(),
            source: SourceConfig::default(),
            cutoff_date: default_cutoff_date(),
            database: DatabaseConfig::default(),
            tables: TablesConfig::default(),
            merge_keys: MergeKeysConfig::default(),
            update_columns: UpdateColumnsConfig::default(),
            target_path: default_target_path(),
            parallel_dimensions: false,
        }
    }

    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        log::debug!("Loaded project '{}' from {}", config.name, path.display());
        Ok(config)
    }

    /// Load configuration from a project directory
    /// Looks for medallion.yml or medallion.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join("medallion.yml");
        let yaml_path = dir.join("medallion.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() {
            return Err(invalid("Project name cannot be empty".to_string()));
        }

        if self.source.path.is_empty() {
            return Err(invalid("source.path cannot be empty".to_string()));
        }

        if !self.source.delimiter.is_ascii() {
            return Err(invalid(format!(
                "source.delimiter must be a single ASCII character, found '{}'",
                self.source.delimiter
            )));
        }

        self.validate_source_columns()?;

        let mut seen_tables = HashSet::new();
        for site in MergeCallSite::ALL {
            let table = self.tables.get(site);
            if !seen_tables.insert(table.as_str()) {
                return Err(invalid(format!(
                    "Table '{}' is used by more than one pipeline layer",
                    table
                )));
            }
            self.validate_merge_site(site)?;
        }

        Ok(())
    }

    fn validate_source_columns(&self) -> CoreResult<()> {
        let mut seen = HashSet::new();
        for col in &self.source.columns.columns {
            if !seen.insert(col.name.as_str()) {
                return Err(invalid(format!(
                    "Duplicate source column '{}'",
                    col.name
                )));
            }
        }

        for required in RawRecord::source_schema().columns {
            match self.source.columns.column(&required.name) {
                None => {
                    return Err(invalid(format!(
                        "source.columns is missing required column '{}'",
                        required.name
                    )))
                }
                Some(col) if col.data_type != required.data_type => {
                    return Err(invalid(format!(
                        "source column '{}' must be of type {}, found {}",
                        col.name, required.data_type, col.data_type
                    )))
                }
                Some(col) if col.nullable && !required.nullable => {
                    return Err(invalid(format!(
                        "source column '{}' cannot be nullable",
                        col.name
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn validate_merge_site(&self, site: MergeCallSite) -> CoreResult<()> {
        let schema = site.table_schema();
        let keys = self.merge_keys.get(site);

        if keys.is_empty() {
            return Err(invalid(format!(
                "merge_keys.{} must list at least one column",
                site
            )));
        }

        for key in keys {
            if !schema.contains(key) {
                return Err(invalid(format!(
                    "merge_keys.{}: '{}' is not a column of {} (columns: {})",
                    site,
                    key,
                    self.tables.get(site),
                    schema.column_names().join(", ")
                )));
            }
        }

        for col in self.update_columns.get(site) {
            if !schema.contains(col) {
                return Err(invalid(format!(
                    "update_columns.{}: '{}' is not a column of {}",
                    site,
                    col,
                    self.tables.get(site)
                )));
            }
            if keys.contains(col) {
                return Err(invalid(format!(
                    "update_columns.{}: '{}' is a merge key and cannot be updated",
                    site, col
                )));
            }
        }
        Ok(())
    }

    /// Get absolute source path relative to a project root
    pub fn source_path_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.source.path)
    }

    /// Get absolute target path relative to a project root
    pub fn target_path_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.target_path)
    }
}

fn invalid(message: String) -> CoreError {
    CoreError::ConfigInvalid { message }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
