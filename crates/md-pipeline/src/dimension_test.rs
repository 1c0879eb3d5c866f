use super::*;
use chrono::NaiveDateTime;
use md_db::MemoryStore;
use std::sync::Arc;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn stamp() -> NaiveDateTime {
    date(2024, 1, 1).and_hms_opt(0, 0, 0).unwrap()
}

fn silver(customer: &str, email: &str, item: &str, order_date: NaiveDate) -> ConformedRecord {
    ConformedRecord {
        sales_order_number: "SO1".to_string(),
        sales_order_line_number: 1,
        order_date,
        customer_name: customer.to_string(),
        email: email.to_string(),
        item: item.to_string(),
        quantity: 1,
        unit_price: 1.0,
        tax: 0.1,
        file_name: "f.csv".to_string(),
        is_flagged: false,
        created_ts: stamp(),
        modified_ts: stamp(),
    }
}

async fn setup() -> (Catalog, Config) {
    let config = Config::with_name("test");
    let catalog = Catalog::new(Arc::new(MemoryStore::new()));
    for dim in [Dimension::Date, Dimension::Customer, Dimension::Product] {
        let site = dim.call_site();
        catalog
            .ensure_table(config.tables.get(site), &site.table_schema())
            .await
            .unwrap();
    }
    (catalog, config)
}

async fn products(catalog: &Catalog, config: &Config) -> Vec<ProductDimRow> {
    let table = &config.tables.dim_product;
    let rows = catalog
        .scan(table, &ProductDimRow::table_schema())
        .await
        .unwrap();
    let mut decoded = decode_products(table, &rows).unwrap();
    decoded.sort_by_key(|p| p.item_id);
    decoded
}

#[test]
fn test_split_customer_name() {
    assert_eq!(
        split_customer_name("Jane Doe"),
        ("Jane".to_string(), "Doe".to_string())
    );
    assert_eq!(
        split_customer_name("Mary Ann Smith"),
        ("Mary".to_string(), "Ann Smith".to_string())
    );
    assert_eq!(
        split_customer_name("Unknown"),
        ("Unknown".to_string(), String::new())
    );
}

#[test]
fn test_split_item() {
    assert_eq!(
        split_item("Mountain-100, Silver, 38"),
        ("Mountain-100".to_string(), "Silver, 38".to_string())
    );
    assert_eq!(split_item("B"), ("B".to_string(), String::new()));
    assert_eq!(split_item("A,Red"), ("A,Red".to_string(), String::new()));
}

#[test]
fn test_date_row_labels() {
    let row = date_row(date(2019, 7, 1));
    assert_eq!(row.day, 1);
    assert_eq!(row.month, 7);
    assert_eq!(row.year, 2019);
    assert_eq!(row.mmmyyyy, "Jul-2019");
    assert_eq!(row.yyyymm, "201907");
}

#[tokio::test]
async fn test_ids_start_at_one_and_follow_key_order() {
    let (catalog, config) = setup().await;
    let batch = vec![
        silver("Ann", "a", "B", date(2021, 1, 1)),
        silver("Ann", "a", "A, Red", date(2021, 1, 1)),
        silver("Ann", "a", "B", date(2021, 1, 2)),
    ];

    let outcome = Dimension::Product
        .build(&catalog, &config, &batch)
        .await
        .unwrap();

    assert_eq!(outcome.new_rows, 2);
    assert_eq!(outcome.first_id, Some(1));
    assert_eq!(outcome.last_id, Some(2));
    assert_eq!(outcome.merge.inserted, 2);

    let rows = products(&catalog, &config).await;
    assert_eq!(rows[0].item_name, "A");
    assert_eq!(rows[0].item_info, "Red");
    assert_eq!(rows[0].item_id, 1);
    assert_eq!(rows[1].item_name, "B");
    assert_eq!(rows[1].item_info, "");
    assert_eq!(rows[1].item_id, 2);
}

#[tokio::test]
async fn test_later_runs_keep_ids_and_continue_numbering() {
    let (catalog, config) = setup().await;
    let first_batch = vec![silver("Ann", "a", "A, Red", date(2021, 1, 1))];
    Dimension::Product
        .build(&catalog, &config, &first_batch)
        .await
        .unwrap();

    let second_batch = vec![
        silver("Ann", "a", "C", date(2021, 1, 1)),
        silver("Ann", "a", "A, Red", date(2021, 1, 1)),
    ];
    let outcome = Dimension::Product
        .build(&catalog, &config, &second_batch)
        .await
        .unwrap();

    assert_eq!(outcome.new_rows, 1);
    assert_eq!(outcome.first_id, Some(2));

    let rows = products(&catalog, &config).await;
    assert_eq!(rows.len(), 2);
    assert_eq!((rows[0].item_name.as_str(), rows[0].item_id), ("A", 1));
    assert_eq!((rows[1].item_name.as_str(), rows[1].item_id), ("C", 2));
}

#[tokio::test]
async fn test_ids_continue_after_gaps() {
    let (catalog, config) = setup().await;
    let table = config.tables.dim_product.clone();
    let schema = ProductDimRow::table_schema();
    let keys = config.merge_keys.dim_product.clone();
    let seeded = ProductDimRow {
        item_name: "Z".to_string(),
        item_info: String::new(),
        item_id: 40,
    };
    catalog
        .upsert(
            &MergeSpec {
                table: &table,
                schema: &schema,
                match_keys: &keys,
                update_columns: &[],
            },
            vec![seeded.to_row()],
        )
        .await
        .unwrap();

    let outcome = Dimension::Product
        .build(&catalog, &config, &[silver("Ann", "a", "A", date(2021, 1, 1))])
        .await
        .unwrap();

    assert_eq!(outcome.first_id, Some(41));
}

#[tokio::test]
async fn test_rebuild_adds_nothing() {
    let (catalog, config) = setup().await;
    let batch = vec![
        silver("Jane Doe", "e2", "B", date(2021, 1, 1)),
        silver("Unknown", "e1", "A, Red", date(2019, 7, 1)),
    ];

    for dim in [Dimension::Date, Dimension::Customer, Dimension::Product] {
        dim.build(&catalog, &config, &batch).await.unwrap();
    }
    for dim in [Dimension::Date, Dimension::Customer, Dimension::Product] {
        let outcome = dim.build(&catalog, &config, &batch).await.unwrap();
        assert_eq!(outcome.new_rows, 0, "{dim} dimension grew");
        assert_eq!(outcome.merge.inserted, 0);
        assert_eq!(outcome.first_id, None);
    }
}

#[tokio::test]
async fn test_customer_dimension_derives_names() {
    let (catalog, config) = setup().await;
    let batch = vec![
        silver("Jane Doe", "e2", "B", date(2021, 1, 1)),
        silver("Jane Doe", "e3", "B", date(2021, 1, 1)),
    ];

    let outcome = Dimension::Customer
        .build(&catalog, &config, &batch)
        .await
        .unwrap();
    assert_eq!(outcome.new_rows, 2);

    let table = &config.tables.dim_customer;
    let rows = catalog
        .scan(table, &CustomerDimRow::table_schema())
        .await
        .unwrap();
    let mut customers = decode_customers(table, &rows).unwrap();
    customers.sort_by_key(|c| c.customer_id);

    assert_eq!(customers[0].email, "e2");
    assert_eq!(customers[0].first, "Jane");
    assert_eq!(customers[0].last, "Doe");
    assert_eq!(customers[1].email, "e3");
    assert_eq!(customers[1].customer_id, 2);
}

#[tokio::test]
async fn test_date_dimension_has_no_surrogate() {
    let (catalog, config) = setup().await;
    let batch = vec![
        silver("Ann", "a", "B", date(2021, 1, 1)),
        silver("Bob", "b", "B", date(2021, 1, 1)),
        silver("Ann", "a", "B", date(2019, 7, 1)),
    ];

    let outcome = Dimension::Date
        .build(&catalog, &config, &batch)
        .await
        .unwrap();

    assert_eq!(outcome.new_rows, 2);
    assert_eq!(outcome.first_id, None);
    assert_eq!(
        catalog
            .store()
            .row_count(&config.tables.dim_date)
            .await
            .unwrap(),
        2
    );
}
