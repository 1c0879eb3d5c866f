//! Row enricher: raw records to conformed silver records

use crate::error::PipelineResult;
use crate::ingest::SourceRow;
use chrono::{NaiveDate, NaiveDateTime, SubsecRound, Utc};
use md_core::{ConformedRecord, RawRecord};
use std::sync::Arc;

/// Stand-in for a missing or blank customer name
pub const UNKNOWN_CUSTOMER: &str = "Unknown";

/// Source of the enrichment timestamp
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in UTC, truncated to microseconds to match stored precision
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc().trunc_subsecs(6)
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Turns raw records into conformed records
#[derive(Clone)]
pub struct Enricher {
    cutoff: NaiveDate,
    clock: Arc<dyn Clock>,
}

impl Enricher {
    pub fn new(cutoff: NaiveDate, clock: Arc<dyn Clock>) -> Self {
        Self { cutoff, clock }
    }

    /// Decode and enrich one ingested row
    pub fn enrich_row(&self, source: &SourceRow) -> PipelineResult<ConformedRecord> {
        let raw = RawRecord::from_source_row(&source.file_name, &source.row)?;
        Ok(self.enrich(raw, &source.file_name))
    }

    /// Add provenance columns and substitute a blank customer name
    pub fn enrich(&self, raw: RawRecord, file_name: &str) -> ConformedRecord {
        let now = self.clock.now();
        let customer_name = match raw.customer_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => UNKNOWN_CUSTOMER.to_string(),
        };

        ConformedRecord {
            sales_order_number: raw.sales_order_number,
            sales_order_line_number: raw.sales_order_line_number,
            is_flagged: raw.order_date < self.cutoff,
            order_date: raw.order_date,
            customer_name,
            email: raw.email,
            item: raw.item,
            quantity: raw.quantity,
            unit_price: raw.unit_price,
            tax: raw.tax,
            file_name: file_name.to_string(),
            created_ts: now,
            modified_ts: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw(customer_name: Option<&str>, order_date: NaiveDate) -> RawRecord {
        RawRecord {
            sales_order_number: "SO1".to_string(),
            sales_order_line_number: 1,
            order_date,
            customer_name: customer_name.map(str::to_string),
            email: "e1".to_string(),
            item: "A, Red".to_string(),
            quantity: 1,
            unit_price: 10.0,
            tax: 1.0,
        }
    }

    fn fixed() -> Arc<dyn Clock> {
        Arc::new(FixedClock(date(2024, 5, 6).and_hms_opt(7, 8, 9).unwrap()))
    }

    /// Returns a later instant on every call
    struct TickingClock(AtomicI64);

    impl Clock for TickingClock {
        fn now(&self) -> NaiveDateTime {
            let secs = self.0.fetch_add(1, Ordering::SeqCst);
            chrono::DateTime::from_timestamp(secs, 0)
                .unwrap()
                .naive_utc()
        }
    }

    #[test]
    fn test_blank_customer_names_become_unknown() {
        let enricher = Enricher::new(date(2019, 8, 1), fixed());
        for name in [None, Some(""), Some("   ")] {
            let record = enricher.enrich(raw(name, date(2020, 1, 1)), "f.csv");
            assert_eq!(record.customer_name, UNKNOWN_CUSTOMER);
        }
        let record = enricher.enrich(raw(Some("Jane Doe"), date(2020, 1, 1)), "f.csv");
        assert_eq!(record.customer_name, "Jane Doe");
    }

    #[test]
    fn test_flag_is_strictly_before_cutoff() {
        let cutoff = date(2019, 8, 1);
        let enricher = Enricher::new(cutoff, fixed());

        assert!(enricher.enrich(raw(None, date(2019, 7, 31)), "f").is_flagged);
        assert!(!enricher.enrich(raw(None, cutoff), "f").is_flagged);
        assert!(!enricher.enrich(raw(None, date(2021, 1, 1)), "f").is_flagged);
    }

    #[test]
    fn test_clock_is_read_once_per_row() {
        let enricher = Enricher::new(date(2019, 8, 1), Arc::new(TickingClock(AtomicI64::new(0))));

        let first = enricher.enrich(raw(None, date(2020, 1, 1)), "f");
        let second = enricher.enrich(raw(None, date(2020, 1, 1)), "f");

        assert_eq!(first.created_ts, first.modified_ts);
        assert_eq!(second.created_ts, second.modified_ts);
        assert!(second.created_ts > first.created_ts);
    }

    #[test]
    fn test_provenance_columns() {
        let enricher = Enricher::new(date(2019, 8, 1), fixed());
        let record = enricher.enrich(raw(Some("Ann"), date(2020, 1, 1)), "2020.csv");

        assert_eq!(record.file_name, "2020.csv");
        assert_eq!(
            record.created_ts,
            date(2024, 5, 6).and_hms_opt(7, 8, 9).unwrap()
        );
    }

    #[test]
    fn test_system_clock_has_microsecond_precision() {
        let now = SystemClock.now();
        assert_eq!(now.and_utc().timestamp_subsec_nanos() % 1_000, 0);
    }
}
