//! # Batch Priority Resolver
//!
//! Orders product batches by expiry (earliest first, undated last) and
//! flags how close each one is to expiring. Advisory only: nothing here
//! blocks a sale.
//!
//! ```text
//! input:   [2024-01-01, none, 2023-06-01, 2025-01-01]
//! rank():  [2023-06-01, 2024-01-01, 2025-01-01, none]
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::classify::{batch_expiry_thresholds, classify};
use crate::types::ProductBatch;

/// Expiry tier of a batch on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Expiry date is before today.
    Expired,
    /// Expires within 0 to 7 days.
    Critical,
    /// Expires within 8 to 30 days.
    Warning,
    /// More than 30 days left.
    Ok,
    /// No expiry date recorded.
    NoDate,
}

/// Classifies an expiry date relative to `today`.
pub fn batch_status(expiry_date: Option<NaiveDate>, today: NaiveDate) -> BatchStatus {
    match expiry_date {
        None => BatchStatus::NoDate,
        Some(expiry) => classify((today - expiry).num_days(), &batch_expiry_thresholds()),
    }
}

/// Sorts ascending by expiry date with undated batches last.
///
/// The sort is stable, so batches sharing an expiry keep their input order.
pub fn rank(mut batches: Vec<ProductBatch>) -> Vec<ProductBatch> {
    batches.sort_by_key(|b| (b.expiry_date.is_none(), b.expiry_date));
    batches
}

/// A batch with its priority classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RankedBatch {
    pub batch: ProductBatch,
    pub status: BatchStatus,
    /// Negative once expired; `None` for undated batches.
    pub days_until_expiry: Option<i64>,
}

/// Ranks and classifies batches as of `today`.
pub fn rank_and_classify(batches: Vec<ProductBatch>, today: NaiveDate) -> Vec<RankedBatch> {
    rank(batches)
        .into_iter()
        .map(|batch| RankedBatch {
            status: batch_status(batch.expiry_date, today),
            days_until_expiry: batch.expiry_date.map(|d| (d - today).num_days()),
            batch,
        })
        .collect()
}

/// Quantity to take from one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDraw {
    pub batch_id: String,
    pub quantity: i64,
}

/// Plans how `quantity` units are taken from ranked batches.
///
/// Expired and empty batches are skipped. If the batches cannot cover the
/// whole quantity the plan is simply shorter; batch tracking never rejects
/// a movement.
pub fn plan_fifo_draw(ranked: &[RankedBatch], quantity: i64) -> Vec<BatchDraw> {
    let mut remaining = quantity;
    let mut draws = Vec::new();

    for entry in ranked {
        if remaining <= 0 {
            break;
        }
        if entry.status == BatchStatus::Expired || entry.batch.quantity <= 0 {
            continue;
        }
        let take = remaining.min(entry.batch.quantity);
        draws.push(BatchDraw {
            batch_id: entry.batch.id.clone(),
            quantity: take,
        });
        remaining -= take;
    }
    draws
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn batch(id: &str, expiry: Option<NaiveDate>, quantity: i64) -> ProductBatch {
        ProductBatch {
            id: id.to_string(),
            tenant_id: "t-1".to_string(),
            product_id: "p-1".to_string(),
            batch_number: format!("L-{id}"),
            manufacturing_date: None,
            expiry_date: expiry,
            quantity,
            location_id: None,
        }
    }

    #[test]
    fn test_rank_orders_by_expiry_undated_last() {
        let ranked = rank(vec![
            batch("a", Some(date(2024, 1, 1)), 1),
            batch("b", None, 1),
            batch("c", Some(date(2023, 6, 1)), 1),
            batch("d", Some(date(2025, 1, 1)), 1),
        ]);

        let expiries: Vec<_> = ranked.iter().map(|b| b.expiry_date).collect();
        assert_eq!(
            expiries,
            vec![
                Some(date(2023, 6, 1)),
                Some(date(2024, 1, 1)),
                Some(date(2025, 1, 1)),
                None
            ]
        );
    }

    #[test]
    fn test_rank_is_stable() {
        let same = Some(date(2024, 1, 1));
        let ranked = rank(vec![batch("x", same, 1), batch("n1", None, 1), batch("y", same, 1), batch("n2", None, 1)]);
        let ids: Vec<_> = ranked.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "n1", "n2"]);
    }

    #[test]
    fn test_batch_status_boundaries() {
        let today = date(2024, 5, 10);
        assert_eq!(batch_status(Some(date(2024, 5, 9)), today), BatchStatus::Expired);
        assert_eq!(batch_status(Some(today), today), BatchStatus::Critical);
        assert_eq!(batch_status(Some(date(2024, 5, 17)), today), BatchStatus::Critical);
        assert_eq!(batch_status(Some(date(2024, 5, 18)), today), BatchStatus::Warning);
        assert_eq!(batch_status(Some(date(2024, 6, 9)), today), BatchStatus::Warning);
        assert_eq!(batch_status(Some(date(2024, 6, 10)), today), BatchStatus::Ok);
        assert_eq!(batch_status(None, today), BatchStatus::NoDate);
    }

    #[test]
    fn test_plan_fifo_draw_skips_expired_and_tolerates_shortfall() {
        let today = date(2024, 5, 10);
        let ranked = rank_and_classify(
            vec![
                batch("old", Some(date(2024, 5, 1)), 10),
                batch("soon", Some(date(2024, 5, 12)), 3),
                batch("later", Some(date(2024, 8, 1)), 4),
                batch("undated", None, 2),
            ],
            today,
        );
        assert_eq!(ranked[0].days_until_expiry, Some(-9));

        let draws = plan_fifo_draw(&ranked, 5);
        assert_eq!(
            draws,
            vec![
                BatchDraw { batch_id: "soon".to_string(), quantity: 3 },
                BatchDraw { batch_id: "later".to_string(), quantity: 2 },
            ]
        );

        let draws = plan_fifo_draw(&ranked, 50);
        assert_eq!(draws.iter().map(|d| d.quantity).sum::<i64>(), 9);
    }
}
