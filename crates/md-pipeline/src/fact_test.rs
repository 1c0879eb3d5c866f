use super::*;
use chrono::NaiveDate;
use md_db::MemoryStore;
use std::sync::Arc;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn silver(order: &str, customer: &str, email: &str, item: &str) -> ConformedRecord {
    let stamp = date(2024, 1, 1).and_hms_opt(0, 0, 0).unwrap();
    ConformedRecord {
        sales_order_number: order.to_string(),
        sales_order_line_number: 1,
        order_date: date(2021, 1, 1),
        customer_name: customer.to_string(),
        email: email.to_string(),
        item: item.to_string(),
        quantity: 2,
        unit_price: 5.0,
        tax: 0.5,
        file_name: "f.csv".to_string(),
        is_flagged: false,
        created_ts: stamp,
        modified_ts: stamp,
    }
}

fn lookup() -> DimensionLookup {
    DimensionLookup::new(
        &[CustomerDimRow {
            customer_name: "Jane Doe".to_string(),
            email: "e2".to_string(),
            first: "Jane".to_string(),
            last: "Doe".to_string(),
            customer_id: 7,
        }],
        &[ProductDimRow {
            item_name: "A".to_string(),
            item_info: "Red".to_string(),
            item_id: 3,
        }],
    )
}

#[test]
fn test_joins_on_natural_keys() {
    let build = build_fact_rows(
        &[silver("SO1", "Jane Doe", "e2", "A, Red")],
        &lookup(),
        &TableName::new("dimcustomer_gold"),
        &TableName::new("dimproduct_gold"),
    );

    assert!(build.warnings.is_empty());
    assert_eq!(
        build.rows,
        vec![FactRow {
            customer_id: Some(7),
            item_id: Some(3),
            order_date: date(2021, 1, 1),
            quantity: 2,
            unit_price: 5.0,
            tax: 0.5,
        }]
    );
}

#[test]
fn test_unmatched_keys_become_null_with_warnings() {
    let build = build_fact_rows(
        &[silver("SO9", "Jane Doe", "other", "A, Blue")],
        &lookup(),
        &TableName::new("dimcustomer_gold"),
        &TableName::new("dimproduct_gold"),
    );

    assert_eq!(build.rows.len(), 1);
    assert_eq!(build.rows[0].customer_id, None);
    assert_eq!(build.rows[0].item_id, None);
    assert_eq!(build.warnings.len(), 2);
    assert_eq!(
        build.warnings[1],
        DataQualityWarning::UnmatchedForeignKey {
            dimension: TableName::new("dimproduct_gold"),
            key: "('A', 'Blue')".to_string(),
            sales_order: "SO9".to_string(),
        }
    );
}

#[tokio::test]
async fn test_fact_merge_with_null_keys_is_idempotent() {
    let config = Config::with_name("test");
    let catalog = Catalog::new(Arc::new(MemoryStore::new()));
    catalog
        .ensure_table(&config.tables.fact, &FactRow::table_schema())
        .await
        .unwrap();

    let build = build_fact_rows(
        &[
            silver("SO1", "Jane Doe", "e2", "A, Red"),
            silver("SO2", "Nobody", "e0", "A, Red"),
        ],
        &lookup(),
        &config.tables.dim_customer,
        &config.tables.dim_product,
    );

    let first = merge_facts(&catalog, &config, &build.rows).await.unwrap();
    let second = merge_facts(&catalog, &config, &build.rows).await.unwrap();

    assert_eq!(first.inserted, 2);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.unchanged, 2);
    assert_eq!(
        catalog
            .store()
            .row_count(&config.tables.fact)
            .await
            .unwrap(),
        2
    );
}
