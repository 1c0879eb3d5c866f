//! Dimension builders
//!
//! All three gold dimensions follow the same steps: project the silver
//! table onto the dimension, keep one row per natural key, drop the keys
//! the dimension already holds, number the rest after the current
//! maximum surrogate ID and merge them in.

use chrono::{Datelike, NaiveDate};
use md_core::record::columns::*;
use md_core::{
    Config, ConformedRecord, CustomerDimRow, DateDimRow, MergeCallSite, ProductDimRow, Row, RowKey,
    TableName, TableRecord, TableSchema, Value,
};
use serde::Serialize;
use std::collections::HashSet;

use crate::error::PipelineResult;
use crate::merge::{Catalog, MergeOutcome, MergeSpec};

/// Table and key layout of one dimension
#[derive(Debug, Clone, Copy)]
pub struct DimensionSpec<'a> {
    pub table: &'a TableName,
    pub schema: &'a TableSchema,
    pub natural_key: &'a [String],
    pub update_columns: &'a [String],
    /// Integer column receiving generated IDs, if the dimension has one
    pub surrogate: Option<&'a str>,
}

/// Result of one dimension build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DimensionOutcome {
    /// Natural keys not present before this build
    pub new_rows: usize,
    /// Lowest ID assigned by this build
    pub first_id: Option<i64>,
    /// Highest ID assigned by this build
    pub last_id: Option<i64>,
    pub merge: MergeOutcome,
}

/// Add the rows of `projected` whose natural key the dimension lacks
pub async fn build_dimension(
    catalog: &Catalog,
    spec: &DimensionSpec<'_>,
    projected: impl IntoIterator<Item = Row>,
) -> PipelineResult<DimensionOutcome> {
    let current = catalog.scan(spec.table, spec.schema).await?;
    let current_max = spec
        .surrogate
        .map(|column| max_id(&current, column))
        .unwrap_or(0);
    let present: HashSet<RowKey> = current.iter().map(|r| r.key(spec.natural_key)).collect();

    let mut seen: HashSet<RowKey> = HashSet::new();
    let mut new_rows: Vec<(RowKey, Row)> = projected
        .into_iter()
        .filter_map(|row| {
            let key = row.key(spec.natural_key);
            (!present.contains(&key) && seen.insert(key.clone())).then_some((key, row))
        })
        .collect();
    new_rows.sort_by(|a, b| a.0.cmp(&b.0));

    let mut outcome = DimensionOutcome {
        new_rows: new_rows.len(),
        ..Default::default()
    };

    let rows: Vec<Row> = new_rows
        .into_iter()
        .enumerate()
        .map(|(offset, (_, row))| match spec.surrogate {
            Some(column) => {
                let id = current_max + 1 + offset as i64;
                if outcome.first_id.is_none() {
                    outcome.first_id = Some(id);
                }
                outcome.last_id = Some(id);
                row.with(column, id)
            }
            None => row,
        })
        .collect();

    let merge = MergeSpec {
        table: spec.table,
        schema: spec.schema,
        match_keys: spec.natural_key,
        update_columns: spec.update_columns,
    };
    outcome.merge = catalog.upsert(&merge, rows).await?;

    log::info!(
        "{}: {} new rows (current max id {})",
        spec.table,
        outcome.new_rows,
        current_max
    );
    Ok(outcome)
}

fn max_id(rows: &[Row], column: &str) -> i64 {
    rows.iter()
        .filter_map(|r| r.get(column).and_then(Value::as_int))
        .max()
        .unwrap_or(0)
        .max(0)
}

/// The three gold dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Date,
    Customer,
    Product,
}

impl Dimension {
    pub fn call_site(self) -> MergeCallSite {
        match self {
            Dimension::Date => MergeCallSite::DimDate,
            Dimension::Customer => MergeCallSite::DimCustomer,
            Dimension::Product => MergeCallSite::DimProduct,
        }
    }

    pub fn surrogate_column(self) -> Option<&'static str> {
        match self {
            Dimension::Date => None,
            Dimension::Customer => Some(CUSTOMER_ID),
            Dimension::Product => Some(ITEM_ID),
        }
    }

    /// Dimension attributes of a silver record, without the surrogate ID
    pub fn project(self, record: &ConformedRecord) -> Row {
        match self {
            Dimension::Date => date_row(record.order_date).to_row(),
            Dimension::Customer => {
                let (first, last) = split_customer_name(&record.customer_name);
                Row::new()
                    .with(CUSTOMER_NAME, record.customer_name.as_str())
                    .with(EMAIL, record.email.as_str())
                    .with(FIRST, first)
                    .with(LAST, last)
            }
            Dimension::Product => {
                let (name, info) = split_item(&record.item);
                Row::new().with(ITEM_NAME, name).with(ITEM_INFO, info)
            }
        }
    }

    /// Build this dimension from the silver records using `config`
    pub async fn build(
        self,
        catalog: &Catalog,
        config: &Config,
        silver: &[ConformedRecord],
    ) -> PipelineResult<DimensionOutcome> {
        let site = self.call_site();
        let schema = site.table_schema();
        let spec = DimensionSpec {
            table: config.tables.get(site),
            schema: &schema,
            natural_key: config.merge_keys.get(site),
            update_columns: config.update_columns.get(site),
            surrogate: self.surrogate_column(),
        };
        build_dimension(catalog, &spec, silver.iter().map(|r| self.project(r))).await
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dimension::Date => write!(f, "date"),
            Dimension::Customer => write!(f, "customer"),
            Dimension::Product => write!(f, "product"),
        }
    }
}

/// Calendar attributes of an order date
pub fn date_row(order_date: NaiveDate) -> DateDimRow {
    DateDimRow {
        order_date,
        day: i64::from(order_date.day()),
        month: i64::from(order_date.month()),
        year: i64::from(order_date.year()),
        mmmyyyy: order_date.format("%b-%Y").to_string(),
        yyyymm: order_date.format("%Y%m").to_string(),
    }
}

/// Split a full name on its first space; the last name is empty without one
pub fn split_customer_name(name: &str) -> (String, String) {
    match name.split_once(' ') {
        Some((first, last)) => (first.to_string(), last.to_string()),
        None => (name.to_string(), String::new()),
    }
}

/// Split an item descriptor on its first `", "`; the info is empty without one
pub fn split_item(item: &str) -> (String, String) {
    match item.split_once(", ") {
        Some((name, info)) => (name.to_string(), info.to_string()),
        None => (item.to_string(), String::new()),
    }
}

/// Decode the rows of a customer dimension
pub fn decode_customers(table: &TableName, rows: &[Row]) -> PipelineResult<Vec<CustomerDimRow>> {
    rows.iter()
        .map(|r| CustomerDimRow::from_row(table.as_str(), r))
        .collect::<Result<Vec<_>, _>>()
        .map_err(Into::into)
}

/// Decode the rows of a product dimension
pub fn decode_products(table: &TableName, rows: &[Row]) -> PipelineResult<Vec<ProductDimRow>> {
    rows.iter()
        .map(|r| ProductDimRow::from_row(table.as_str(), r))
        .collect::<Result<Vec<_>, _>>()
        .map_err(Into::into)
}

#[cfg(test)]
#[path = "dimension_test.rs"]
mod tests;
