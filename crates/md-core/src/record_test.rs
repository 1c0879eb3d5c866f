use super::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn sample_conformed() -> ConformedRecord {
    let ts = date(2024, 3, 1).and_hms_opt(12, 0, 0).unwrap();
    ConformedRecord {
        sales_order_number: "SO1".to_string(),
        sales_order_line_number: 1,
        order_date: date(2019, 7, 1),
        customer_name: "Unknown".to_string(),
        email: "e1".to_string(),
        item: "A, Red".to_string(),
        quantity: 1,
        unit_price: 10.0,
        tax: 1.0,
        file_name: "2019.csv".to_string(),
        is_flagged: true,
        created_ts: ts,
        modified_ts: ts,
    }
}

#[test]
fn test_conformed_row_matches_schema() {
    let row = sample_conformed().to_row();
    ConformedRecord::table_schema()
        .check_row("sales_silver", &row)
        .unwrap();
    assert_eq!(row.len(), ConformedRecord::table_schema().columns.len());
}

#[test]
fn test_conformed_from_row() {
    let record = sample_conformed();
    let decoded = ConformedRecord::from_row("sales_silver", &record.to_row()).unwrap();
    assert_eq!(decoded, record);
}

#[test]
fn test_from_row_missing_column() {
    let row = Row::new().with(ITEM_NAME, "A");
    let err = ProductDimRow::from_row("dimproduct_gold", &row).unwrap_err();
    assert!(matches!(err, CoreError::MissingColumn { ref column, .. } if column == ITEM_INFO));
}

#[test]
fn test_from_row_wrong_type() {
    let row = Row::new()
        .with(ITEM_NAME, "A")
        .with(ITEM_INFO, "")
        .with(ITEM_ID, "one");
    let err = ProductDimRow::from_row("dimproduct_gold", &row).unwrap_err();
    assert!(err.to_string().contains("expected integer, found string"));
}

#[test]
fn test_fact_row_nullable_keys() {
    let fact = FactRow {
        customer_id: None,
        item_id: Some(4),
        order_date: date(2021, 1, 1),
        quantity: 2,
        unit_price: 5.0,
        tax: 0.5,
    };
    let row = fact.to_row();
    assert_eq!(row.get(CUSTOMER_ID), Some(&Value::Null));
    FactRow::table_schema()
        .check_row("factsales_gold", &row)
        .unwrap();
    assert_eq!(FactRow::from_row("factsales_gold", &row).unwrap(), fact);
}

#[test]
fn test_raw_record_null_customer_name() {
    let row = Row::new()
        .with(SALES_ORDER_NUMBER, "SO1")
        .with(SALES_ORDER_LINE_NUMBER, 1_i64)
        .with(ORDER_DATE, date(2019, 7, 1))
        .with(CUSTOMER_NAME, Value::Null)
        .with(EMAIL, "e1")
        .with(ITEM, "A, Red")
        .with(QUANTITY, 1_i64)
        .with(UNIT_PRICE, 10.0)
        .with(TAX, 1.0);
    let raw = RawRecord::from_source_row("2019.csv", &row).unwrap();
    assert_eq!(raw.customer_name, None);
    assert_eq!(raw.item, "A, Red");
}

#[test]
fn test_unit_price_accepts_integer_value() {
    let row = Row::new().with(UNIT_PRICE, 10_i64);
    let r = RowReader::new("t", &row);
    assert_eq!(r.decimal(UNIT_PRICE).unwrap(), 10.0);
}
