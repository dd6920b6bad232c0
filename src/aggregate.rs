use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Timelike};
use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::model::*;
use crate::pipeline::PipelineError;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

impl RawRecord {
    /// Validate the fields the grid needs: `ResourceID`, `Status`, `Startdatetime`.
    pub fn parse(&self) -> Result<Reservation, PipelineError> {
        let resource_id = match self.0.get("ResourceID") {
            Some(Value::String(s)) if !s.trim().is_empty() => ResourceId::new(s.trim()),
            Some(Value::Number(n)) if n.is_u64() => ResourceId::new(n.to_string()),
            _ => return Err(malformed("ResourceID", &self.0)),
        };
        let label = match self.0.get("Status") {
            Some(Value::String(s)) => s.clone(),
            _ => return Err(malformed("Status", &self.0)),
        };
        let hour = match self.0.get("Startdatetime") {
            Some(Value::String(s)) => hour_of_day(s).ok_or_else(|| malformed("Startdatetime", &self.0))?,
            _ => return Err(malformed("Startdatetime", &self.0)),
        };
        Ok(Reservation {
            resource_id,
            status: Status::from_code(&label),
            label,
            hour,
        })
    }
}

fn malformed(field: &str, record: &Value) -> PipelineError {
    PipelineError::MalformedRecord(format!("missing or invalid {field} in {record}"))
}

/// Hour of day in the timestamp's own offset; naive timestamps are already local.
fn hour_of_day(raw: &str) -> Option<usize> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.hour() as usize);
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.hour() as usize)
}

/// Reduce raw feed records to one 24-hour row per catalog resource.
///
/// Every catalog resource is present, all `Available` unless a record says otherwise.
/// Records are ordered by resource id, then by raw status label; when two land on
/// the same hour the later one wins. Malformed records and records for resources
/// outside the catalog are skipped.
pub fn aggregate(records: &[RawRecord], catalog: &Catalog) -> OccupancyGrid {
    let mut rows: BTreeMap<ResourceId, HourRow> = catalog
        .resources()
        .iter()
        .map(|id| (id.clone(), [SlotStatus::Available; HOURS_PER_DAY]))
        .collect();

    let mut reservations: Vec<Reservation> = Vec::with_capacity(records.len());
    let mut malformed = 0u64;
    for record in records {
        match record.parse() {
            Ok(r) if catalog.contains(&r.resource_id) => reservations.push(r),
            Ok(r) => debug!("skipping record for {} outside {}", r.resource_id, catalog.facility()),
            Err(e) => {
                warn!("{e}");
                malformed += 1;
            }
        }
    }
    if malformed > 0 {
        metrics::counter!(crate::observability::MALFORMED_RECORDS_TOTAL).increment(malformed);
    }

    // Stable, so equal keys keep feed order.
    reservations.sort_by(|a, b| {
        a.resource_id
            .cmp(&b.resource_id)
            .then_with(|| a.label.cmp(&b.label))
    });

    for r in &reservations {
        if let Some(row) = rows.get_mut(&r.resource_id) {
            row[r.hour] = SlotStatus::from(&r.status);
        }
    }

    OccupancyGrid::from_rows(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Facility;
    use serde_json::json;

    fn catalog(ids: &[&str]) -> Catalog {
        Catalog::new(Facility::Ebib, ids.iter().map(|id| ResourceId::from(*id)).collect())
    }

    fn rec(id: &str, status: &str, start: &str) -> RawRecord {
        RawRecord(json!({ "ResourceID": id, "Status": status, "Startdatetime": start }))
    }

    fn row<'a>(grid: &'a OccupancyGrid, id: &str) -> &'a HourRow {
        grid.get(&ResourceId::from(id)).unwrap()
    }

    #[test]
    fn empty_feed_is_all_available() {
        let cat = catalog(&["1", "2", "3"]);
        let grid = aggregate(&[], &cat);
        assert_eq!(grid.len(), 3);
        for (_, row) in grid.iter() {
            assert!(row.iter().all(|s| *s == SlotStatus::Available));
        }
    }

    #[test]
    fn one_row_per_catalog_resource() {
        let cat = catalog(&["10", "20"]);
        let records = vec![
            rec("10", "B", "2024-05-14T09:00:00"),
            rec("99", "B", "2024-05-14T09:00:00"),
            rec("10", "C", "2024-05-14T22:00:00"),
        ];
        let grid = aggregate(&records, &cat);
        assert_eq!(grid.len(), 2);
        assert!(grid.get(&ResourceId::from("99")).is_none());
        assert_eq!(row(&grid, "10")[9], SlotStatus::Booked);
        assert_eq!(row(&grid, "10")[22], SlotStatus::Closed);
        assert_eq!(row(&grid, "10")[10], SlotStatus::Available);
        assert!(row(&grid, "20").iter().all(|s| *s == SlotStatus::Available));
    }

    #[test]
    fn later_label_wins_same_hour() {
        let cat = catalog(&["5"]);
        // Feed order is Closed first; sorted by label it becomes B, C.
        let records = vec![
            rec("5", "C", "2024-05-14T13:00:00"),
            rec("5", "B", "2024-05-14T13:00:00"),
        ];
        let grid = aggregate(&records, &cat);
        assert_eq!(row(&grid, "5")[13], SlotStatus::Closed);
    }

    #[test]
    fn equal_keys_keep_feed_order() {
        let cat = catalog(&["5"]);
        let records = vec![
            rec("5", "X", "2024-05-14T08:00:00"),
            rec("5", "X", "2024-05-14T08:30:00"),
        ];
        let grid = aggregate(&records, &cat);
        assert_eq!(row(&grid, "5")[8], SlotStatus::Unknown);
    }

    #[test]
    fn malformed_records_are_skipped() {
        let cat = catalog(&["1", "2"]);
        let records = vec![
            RawRecord(json!({ "Status": "B", "Startdatetime": "2024-05-14T09:00:00" })),
            RawRecord(json!({ "ResourceID": "1", "Startdatetime": "2024-05-14T09:00:00" })),
            RawRecord(json!({ "ResourceID": "1", "Status": "B", "Startdatetime": "noon" })),
            RawRecord(json!("not an object")),
            rec("2", "B", "2024-05-14T11:00:00"),
        ];
        let grid = aggregate(&records, &cat);
        assert_eq!(grid.len(), 2);
        assert!(row(&grid, "1").iter().all(|s| *s == SlotStatus::Available));
        assert_eq!(row(&grid, "2")[11], SlotStatus::Booked);
    }

    #[test]
    fn numeric_resource_ids_and_offsets() {
        let cat = catalog(&["301001"]);
        let records = vec![
            RawRecord(json!({ "ResourceID": 301001, "Status": "B", "Startdatetime": "2024-05-14T15:00:00+02:00" })),
            RawRecord(json!({ "ResourceID": 301001, "Status": "C", "Startdatetime": "2024-05-14 07:00:00" })),
        ];
        let grid = aggregate(&records, &cat);
        assert_eq!(row(&grid, "301001")[15], SlotStatus::Booked);
        assert_eq!(row(&grid, "301001")[7], SlotStatus::Closed);
    }

    #[test]
    fn aggregation_is_deterministic() {
        let set = crate::catalog::CatalogSet::fixtures();
        let cat = set.get(Facility::Agora).unwrap().as_ref();
        let records: Vec<RawRecord> = cat
            .resources()
            .iter()
            .enumerate()
            .flat_map(|(i, id)| {
                let hour = format!("2024-05-14T{:02}:00:00", i % 24);
                vec![
                    rec(id.as_str(), "C", &hour),
                    rec(id.as_str(), "B", &hour),
                    rec(id.as_str(), "Z", "2024-05-14T23:00:00"),
                ]
            })
            .collect();
        let a = aggregate(&records, cat);
        let b = aggregate(&records, cat);
        assert_eq!(a, b);
        assert_eq!(a.len(), cat.len());
        assert!(a.iter().all(|(_, row)| row.len() == HOURS_PER_DAY));
    }

    #[test]
    fn parse_reports_field() {
        let err = RawRecord(json!({ "ResourceID": "1", "Status": 3, "Startdatetime": "2024-05-14T09:00:00" }))
            .parse()
            .unwrap_err();
        assert!(err.to_string().contains("Status"));
    }
}
