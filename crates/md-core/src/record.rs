//! Typed records for every layer of the pipeline
//!
//! Each record type knows its table schema and converts to and from the
//! dynamic [`Row`] representation the storage layer and merge primitive
//! work with.

use crate::error::{CoreError, CoreResult};
use crate::schema::{ColumnDef, ColumnType, TableSchema};
use crate::value::{Row, Value};
use chrono::{NaiveDate, NaiveDateTime};

/// Column names shared by the source files and the pipeline tables
pub mod columns {
    pub const SALES_ORDER_NUMBER: &str = "SalesOrderNumber";
    pub const SALES_ORDER_LINE_NUMBER: &str = "SalesOrderLineNumber";
    pub const ORDER_DATE: &str = "OrderDate";
    pub const CUSTOMER_NAME: &str = "CustomerName";
    pub const EMAIL: &str = "Email";
    pub const ITEM: &str = "Item";
    pub const QUANTITY: &str = "Quantity";
    pub const UNIT_PRICE: &str = "UnitPrice";
    pub const TAX: &str = "Tax";

    pub const FILE_NAME: &str = "FileName";
    pub const IS_FLAGGED: &str = "IsFlagged";
    pub const CREATED_TS: &str = "CreatedTS";
    pub const MODIFIED_TS: &str = "ModifiedTS";

    pub const DAY: &str = "Day";
    pub const MONTH: &str = "Month";
    pub const YEAR: &str = "Year";
    pub const MMMYYYY: &str = "mmmyyyy";
    pub const YYYYMM: &str = "yyyymm";

    pub const FIRST: &str = "First";
    pub const LAST: &str = "Last";
    pub const CUSTOMER_ID: &str = "CustomerID";

    pub const ITEM_NAME: &str = "ItemName";
    pub const ITEM_INFO: &str = "ItemInfo";
    pub const ITEM_ID: &str = "ItemID";
}

use columns::*;

/// A record type stored in a pipeline table
pub trait TableRecord: Sized {
    /// Schema of the table holding this record
    fn table_schema() -> TableSchema;

    /// Convert into a dynamic row
    fn to_row(&self) -> Row;

    /// Decode from a dynamic row read from `table`
    fn from_row(table: &str, row: &Row) -> CoreResult<Self>;
}

/// Typed accessors over a row, reporting failures against a table name
pub struct RowReader<'a> {
    table: &'a str,
    row: &'a Row,
}

impl<'a> RowReader<'a> {
    pub fn new(table: &'a str, row: &'a Row) -> Self {
        Self { table, row }
    }

    fn value(&self, column: &str) -> CoreResult<&'a Value> {
        self.row.get(column).ok_or_else(|| CoreError::MissingColumn {
            table: self.table.to_string(),
            column: column.to_string(),
        })
    }

    fn mismatch(&self, column: &str, expected: &str, found: &Value) -> CoreError {
        CoreError::ColumnType {
            table: self.table.to_string(),
            column: column.to_string(),
            expected: expected.to_string(),
            found: found.type_name().to_string(),
        }
    }

    pub fn opt_text(&self, column: &str) -> CoreResult<Option<String>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            other => Err(self.mismatch(column, "string", other)),
        }
    }

    pub fn text(&self, column: &str) -> CoreResult<String> {
        let value = self.value(column)?;
        value
            .as_text()
            .map(str::to_string)
            .ok_or_else(|| self.mismatch(column, "string", value))
    }

    pub fn opt_int(&self, column: &str) -> CoreResult<Option<i64>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Int(i) => Ok(Some(*i)),
            other => Err(self.mismatch(column, "integer", other)),
        }
    }

    pub fn int(&self, column: &str) -> CoreResult<i64> {
        let value = self.value(column)?;
        value
            .as_int()
            .ok_or_else(|| self.mismatch(column, "integer", value))
    }

    pub fn decimal(&self, column: &str) -> CoreResult<f64> {
        let value = self.value(column)?;
        value
            .as_decimal()
            .ok_or_else(|| self.mismatch(column, "decimal", value))
    }

    pub fn bool(&self, column: &str) -> CoreResult<bool> {
        let value = self.value(column)?;
        value
            .as_bool()
            .ok_or_else(|| self.mismatch(column, "boolean", value))
    }

    pub fn date(&self, column: &str) -> CoreResult<NaiveDate> {
        let value = self.value(column)?;
        value
            .as_date()
            .ok_or_else(|| self.mismatch(column, "date", value))
    }

    pub fn timestamp(&self, column: &str) -> CoreResult<NaiveDateTime> {
        let value = self.value(column)?;
        value
            .as_timestamp()
            .ok_or_else(|| self.mismatch(column, "timestamp", value))
    }
}

/// One sales line as read from a bronze file
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub sales_order_number: String,
    pub sales_order_line_number: i64,
    pub order_date: NaiveDate,
    pub customer_name: Option<String>,
    pub email: String,
    pub item: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub tax: f64,
}

impl RawRecord {
    /// Default column layout of the bronze files
    pub fn source_schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnDef::required(SALES_ORDER_NUMBER, ColumnType::String),
            ColumnDef::required(SALES_ORDER_LINE_NUMBER, ColumnType::Integer),
            ColumnDef::required(ORDER_DATE, ColumnType::Date),
            ColumnDef::nullable(CUSTOMER_NAME, ColumnType::String),
            ColumnDef::required(EMAIL, ColumnType::String),
            ColumnDef::required(ITEM, ColumnType::String),
            ColumnDef::required(QUANTITY, ColumnType::Integer),
            ColumnDef::required(UNIT_PRICE, ColumnType::Decimal),
            ColumnDef::required(TAX, ColumnType::Decimal),
        ])
    }

    /// Decode a row produced by the ingest reader
    pub fn from_source_row(source: &str, row: &Row) -> CoreResult<Self> {
        let r = RowReader::new(source, row);
        Ok(Self {
            sales_order_number: r.text(SALES_ORDER_NUMBER)?,
            sales_order_line_number: r.int(SALES_ORDER_LINE_NUMBER)?,
            order_date: r.date(ORDER_DATE)?,
            customer_name: r.opt_text(CUSTOMER_NAME)?,
            email: r.text(EMAIL)?,
            item: r.text(ITEM)?,
            quantity: r.int(QUANTITY)?,
            unit_price: r.decimal(UNIT_PRICE)?,
            tax: r.decimal(TAX)?,
        })
    }
}

/// A silver-layer row: raw attributes plus provenance columns
#[derive(Debug, Clone, PartialEq)]
pub struct ConformedRecord {
    pub sales_order_number: String,
    pub sales_order_line_number: i64,
    pub order_date: NaiveDate,
    pub customer_name: String,
    pub email: String,
    pub item: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub tax: f64,
    pub file_name: String,
    pub is_flagged: bool,
    pub created_ts: NaiveDateTime,
    pub modified_ts: NaiveDateTime,
}

impl TableRecord for ConformedRecord {
    fn table_schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnDef::required(SALES_ORDER_NUMBER, ColumnType::String),
            ColumnDef::required(SALES_ORDER_LINE_NUMBER, ColumnType::Integer),
            ColumnDef::required(ORDER_DATE, ColumnType::Date),
            ColumnDef::required(CUSTOMER_NAME, ColumnType::String),
            ColumnDef::required(EMAIL, ColumnType::String),
            ColumnDef::required(ITEM, ColumnType::String),
            ColumnDef::required(QUANTITY, ColumnType::Integer),
            ColumnDef::required(UNIT_PRICE, ColumnType::Decimal),
            ColumnDef::required(TAX, ColumnType::Decimal),
            ColumnDef::required(FILE_NAME, ColumnType::String),
            ColumnDef::required(IS_FLAGGED, ColumnType::Boolean),
            ColumnDef::required(CREATED_TS, ColumnType::Timestamp),
            ColumnDef::required(MODIFIED_TS, ColumnType::Timestamp),
        ])
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with(SALES_ORDER_NUMBER, self.sales_order_number.as_str())
            .with(SALES_ORDER_LINE_NUMBER, self.sales_order_line_number)
            .with(ORDER_DATE, self.order_date)
            .with(CUSTOMER_NAME, self.customer_name.as_str())
            .with(EMAIL, self.email.as_str())
            .with(ITEM, self.item.as_str())
            .with(QUANTITY, self.quantity)
            .with(UNIT_PRICE, self.unit_price)
            .with(TAX, self.tax)
            .with(FILE_NAME, self.file_name.as_str())
            .with(IS_FLAGGED, self.is_flagged)
            .with(CREATED_TS, self.created_ts)
            .with(MODIFIED_TS, self.modified_ts)
    }

    fn from_row(table: &str, row: &Row) -> CoreResult<Self> {
        let r = RowReader::new(table, row);
        Ok(Self {
            sales_order_number: r.text(SALES_ORDER_NUMBER)?,
            sales_order_line_number: r.int(SALES_ORDER_LINE_NUMBER)?,
            order_date: r.date(ORDER_DATE)?,
            customer_name: r.text(CUSTOMER_NAME)?,
            email: r.text(EMAIL)?,
            item: r.text(ITEM)?,
            quantity: r.int(QUANTITY)?,
            unit_price: r.decimal(UNIT_PRICE)?,
            tax: r.decimal(TAX)?,
            file_name: r.text(FILE_NAME)?,
            is_flagged: r.bool(IS_FLAGGED)?,
            created_ts: r.timestamp(CREATED_TS)?,
            modified_ts: r.timestamp(MODIFIED_TS)?,
        })
    }
}

/// One row per distinct order date
#[derive(Debug, Clone, PartialEq)]
pub struct DateDimRow {
    pub order_date: NaiveDate,
    pub day: i64,
    pub month: i64,
    pub year: i64,
    /// e.g. `Jul-2019`
    pub mmmyyyy: String,
    /// e.g. `201907`
    pub yyyymm: String,
}

impl TableRecord for DateDimRow {
    fn table_schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnDef::required(ORDER_DATE, ColumnType::Date),
            ColumnDef::required(DAY, ColumnType::Integer),
            ColumnDef::required(MONTH, ColumnType::Integer),
            ColumnDef::required(YEAR, ColumnType::Integer),
            ColumnDef::required(MMMYYYY, ColumnType::String),
            ColumnDef::required(YYYYMM, ColumnType::String),
        ])
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with(ORDER_DATE, self.order_date)
            .with(DAY, self.day)
            .with(MONTH, self.month)
            .with(YEAR, self.year)
            .with(MMMYYYY, self.mmmyyyy.as_str())
            .with(YYYYMM, self.yyyymm.as_str())
    }

    fn from_row(table: &str, row: &Row) -> CoreResult<Self> {
        let r = RowReader::new(table, row);
        Ok(Self {
            order_date: r.date(ORDER_DATE)?,
            day: r.int(DAY)?,
            month: r.int(MONTH)?,
            year: r.int(YEAR)?,
            mmmyyyy: r.text(MMMYYYY)?,
            yyyymm: r.text(YYYYMM)?,
        })
    }
}

/// One row per distinct (customer name, email) pair
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerDimRow {
    pub customer_name: String,
    pub email: String,
    pub first: String,
    pub last: String,
    pub customer_id: i64,
}

impl TableRecord for CustomerDimRow {
    fn table_schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnDef::required(CUSTOMER_NAME, ColumnType::String),
            ColumnDef::required(EMAIL, ColumnType::String),
            ColumnDef::required(FIRST, ColumnType::String),
            ColumnDef::required(LAST, ColumnType::String),
            ColumnDef::required(CUSTOMER_ID, ColumnType::Integer),
        ])
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with(CUSTOMER_NAME, self.customer_name.as_str())
            .with(EMAIL, self.email.as_str())
            .with(FIRST, self.first.as_str())
            .with(LAST, self.last.as_str())
            .with(CUSTOMER_ID, self.customer_id)
    }

    fn from_row(table: &str, row: &Row) -> CoreResult<Self> {
        let r = RowReader::new(table, row);
        Ok(Self {
            customer_name: r.text(CUSTOMER_NAME)?,
            email: r.text(EMAIL)?,
            first: r.text(FIRST)?,
            last: r.text(LAST)?,
            customer_id: r.int(CUSTOMER_ID)?,
        })
    }
}

/// One row per distinct (item name, item info) pair
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDimRow {
    pub item_name: String,
    pub item_info: String,
    pub item_id: i64,
}

impl TableRecord for ProductDimRow {
    fn table_schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnDef::required(ITEM_NAME, ColumnType::String),
            ColumnDef::required(ITEM_INFO, ColumnType::String),
            ColumnDef::required(ITEM_ID, ColumnType::Integer),
        ])
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with(ITEM_NAME, self.item_name.as_str())
            .with(ITEM_INFO, self.item_info.as_str())
            .with(ITEM_ID, self.item_id)
    }

    fn from_row(table: &str, row: &Row) -> CoreResult<Self> {
        let r = RowReader::new(table, row);
        Ok(Self {
            item_name: r.text(ITEM_NAME)?,
            item_info: r.text(ITEM_INFO)?,
            item_id: r.int(ITEM_ID)?,
        })
    }
}

/// One row per sales line, keyed by dimension surrogate IDs
#[derive(Debug, Clone, PartialEq)]
pub struct FactRow {
    /// NULL when the customer lookup found no dimension row
    pub customer_id: Option<i64>,
    /// NULL when the product lookup found no dimension row
    pub item_id: Option<i64>,
    pub order_date: NaiveDate,
    pub quantity: i64,
    pub unit_price: f64,
    pub tax: f64,
}

impl TableRecord for FactRow {
    fn table_schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnDef::nullable(CUSTOMER_ID, ColumnType::Integer),
            ColumnDef::nullable(ITEM_ID, ColumnType::Integer),
            ColumnDef::required(ORDER_DATE, ColumnType::Date),
            ColumnDef::required(QUANTITY, ColumnType::Integer),
            ColumnDef::required(UNIT_PRICE, ColumnType::Decimal),
            ColumnDef::required(TAX, ColumnType::Decimal),
        ])
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with(CUSTOMER_ID, self.customer_id)
            .with(ITEM_ID, self.item_id)
            .with(ORDER_DATE, self.order_date)
            .with(QUANTITY, self.quantity)
            .with(UNIT_PRICE, self.unit_price)
            .with(TAX, self.tax)
    }

    fn from_row(table: &str, row: &Row) -> CoreResult<Self> {
        let r = RowReader::new(table, row);
        Ok(Self {
            customer_id: r.opt_int(CUSTOMER_ID)?,
            item_id: r.opt_int(ITEM_ID)?,
            order_date: r.date(ORDER_DATE)?,
            quantity: r.int(QUANTITY)?,
            unit_price: r.decimal(UNIT_PRICE)?,
            tax: r.decimal(TAX)?,
        })
    }
}

#[cfg(test)]
#[path = "record_test.rs"]
mod tests;
