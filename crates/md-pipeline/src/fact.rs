//! Fact builder: silver rows joined to the customer and product dimensions

use md_core::{Config, ConformedRecord, CustomerDimRow, FactRow, MergeCallSite, ProductDimRow};
use md_core::{Row, TableName, TableRecord};
use std::collections::HashMap;

use crate::dimension::{decode_customers, decode_products, split_item};
use crate::error::{DataQualityWarning, PipelineResult};
use crate::merge::{Catalog, MergeOutcome, MergeSpec};

/// Fact rows of a batch, ready to merge
#[derive(Debug, Clone, Default)]
pub struct FactBuild {
    pub rows: Vec<FactRow>,
    pub warnings: Vec<DataQualityWarning>,
}

/// Surrogate-ID lookups over the two keyed dimensions
pub struct DimensionLookup {
    customers: HashMap<(String, String), i64>,
    products: HashMap<(String, String), i64>,
}

impl DimensionLookup {
    pub fn new(customers: &[CustomerDimRow], products: &[ProductDimRow]) -> Self {
        Self {
            customers: customers
                .iter()
                .map(|c| ((c.customer_name.clone(), c.email.clone()), c.customer_id))
                .collect(),
            products: products
                .iter()
                .map(|p| ((p.item_name.clone(), p.item_info.clone()), p.item_id))
                .collect(),
        }
    }

    pub fn customer_id(&self, name: &str, email: &str) -> Option<i64> {
        self.customers
            .get(&(name.to_string(), email.to_string()))
            .copied()
    }

    pub fn item_id(&self, item_name: &str, item_info: &str) -> Option<i64> {
        self.products
            .get(&(item_name.to_string(), item_info.to_string()))
            .copied()
    }
}

/// Left-join silver records to the dimensions
///
/// A missing dimension row leaves its foreign key NULL and records an
/// [`DataQualityWarning::UnmatchedForeignKey`]; the fact row is kept.
pub fn build_fact_rows(
    silver: &[ConformedRecord],
    lookup: &DimensionLookup,
    customer_table: &TableName,
    product_table: &TableName,
) -> FactBuild {
    let mut build = FactBuild::default();

    for record in silver {
        let customer_id = lookup.customer_id(&record.customer_name, &record.email);
        if customer_id.is_none() {
            build.warnings.push(DataQualityWarning::UnmatchedForeignKey {
                dimension: customer_table.clone(),
                key: format!("('{}', '{}')", record.customer_name, record.email),
                sales_order: record.sales_order_number.clone(),
            });
        }

        let (item_name, item_info) = split_item(&record.item);
        let item_id = lookup.item_id(&item_name, &item_info);
        if item_id.is_none() {
            build.warnings.push(DataQualityWarning::UnmatchedForeignKey {
                dimension: product_table.clone(),
                key: format!("('{}', '{}')", item_name, item_info),
                sales_order: record.sales_order_number.clone(),
            });
        }

        build.rows.push(FactRow {
            customer_id,
            item_id,
            order_date: record.order_date,
            quantity: record.quantity,
            unit_price: record.unit_price,
            tax: record.tax,
        });
    }

    for warning in &build.warnings {
        log::warn!("{}", warning);
    }
    build
}

/// Read the current customer and product dimensions and build fact rows
pub async fn build_facts(
    catalog: &Catalog,
    config: &Config,
    silver: &[ConformedRecord],
) -> PipelineResult<FactBuild> {
    let customer_table = &config.tables.dim_customer;
    let product_table = &config.tables.dim_product;

    let customer_rows = catalog
        .scan(customer_table, &CustomerDimRow::table_schema())
        .await?;
    let product_rows = catalog
        .scan(product_table, &ProductDimRow::table_schema())
        .await?;
    let lookup = DimensionLookup::new(
        &decode_customers(customer_table, &customer_rows)?,
        &decode_products(product_table, &product_rows)?,
    );

    Ok(build_fact_rows(
        silver,
        &lookup,
        customer_table,
        product_table,
    ))
}

/// Merge fact rows into the fact table
pub async fn merge_facts(
    catalog: &Catalog,
    config: &Config,
    facts: &[FactRow],
) -> PipelineResult<MergeOutcome> {
    let site = MergeCallSite::Fact;
    let schema = site.table_schema();
    let spec = MergeSpec {
        table: config.tables.get(site),
        schema: &schema,
        match_keys: config.merge_keys.get(site),
        update_columns: config.update_columns.get(site),
    };
    let rows: Vec<Row> = facts.iter().map(FactRow::to_row).collect();
    catalog.upsert(&spec, rows).await
}

#[cfg(test)]
#[path = "fact_test.rs"]
mod tests;
