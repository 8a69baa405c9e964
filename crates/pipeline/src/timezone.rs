//! Tenant-relative date conversion.
//!
//! Dumps carry tenant-relative dates in UTC so a restore into a tenant with a
//! different offset keeps the same instant.

use chrono::{FixedOffset, NaiveDateTime, TimeZone};
use tenvault_core::row::DataRowInfo;
use tenvault_core::schema::TableInfo;
use tenvault_core::ColumnValue;

pub fn local_to_utc(local: NaiveDateTime, offset: FixedOffset) -> NaiveDateTime {
    match offset.from_local_datetime(&local).single() {
        Some(dt) => dt.naive_utc(),
        None => local,
    }
}

pub fn utc_to_local(utc: NaiveDateTime, offset: FixedOffset) -> NaiveDateTime {
    offset.from_utc_datetime(&utc).naive_local()
}

/// Convert every tenant-relative date column of `row` to UTC.
pub fn row_to_utc(table: &TableInfo, row: &mut DataRowInfo, offset: FixedOffset) {
    for date in table.date_columns.iter().filter(|d| d.tenant_relative) {
        if let Some(local) = row.get(&date.name).and_then(ColumnValue::as_datetime) {
            row.set(date.name.clone(), ColumnValue::DateTime(local_to_utc(local, offset)));
        }
    }
}

/// `value` converted to the target tenant's local time if `column` is a
/// tenant-relative date.
pub fn value_to_local(
    table: &TableInfo,
    column: &str,
    value: ColumnValue,
    offset: FixedOffset,
) -> ColumnValue {
    let relative = table.date_column(column).is_some_and(|d| d.tenant_relative);
    match value.as_datetime() {
        Some(utc) if relative => ColumnValue::DateTime(utc_to_local(utc, offset)),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn conversion_preserves_the_instant() {
        let berlin = FixedOffset::east_opt(3600).unwrap();
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();

        let utc = local_to_utc(at(10), berlin);
        assert_eq!(utc, at(9));
        assert_eq!(utc_to_local(utc, tokyo), at(18));
    }

    #[test]
    fn only_tenant_relative_columns_are_converted() {
        let table = TableInfo::new("crm_task")
            .local_date("deadline")
            .utc_date("last_modifed_on");
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let mut row = DataRowInfo::new()
            .with("deadline", at(7))
            .with("last_modifed_on", at(7));

        row_to_utc(&table, &mut row, offset);
        assert_eq!(row.get("deadline"), Some(&ColumnValue::DateTime(at(12))));
        assert_eq!(row.get("last_modifed_on"), Some(&ColumnValue::DateTime(at(7))));

        let back = value_to_local(&table, "deadline", ColumnValue::DateTime(at(12)), offset);
        assert_eq!(back, ColumnValue::DateTime(at(7)));
    }
}
