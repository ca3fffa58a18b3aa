//! # Threshold Classifier
//!
//! One generic function maps an elapsed day count onto a tier. Client
//! inactivity and batch expiry are two threshold tables fed to it.
//!
//! ```text
//!   elapsed days ─────────────────────────────────────────────────────►
//!
//!   clients:   active   │ 30  recent │ 60  warning │ 91  urgent
//!   batches:   ok │ -30 warning │ -7 critical │ 1 expired
//!                 (elapsed = today − expiry, so future dates are negative)
//! ```
//!
//! Bands are lower-inclusive and checked from the highest bound down; any
//! value below every band gets the fallback tier, which makes `classify`
//! total over `i64`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::batch::BatchStatus;

// =============================================================================
// Generic Classifier
// =============================================================================

/// Ordered lower-inclusive bands plus a fallback tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thresholds<T> {
    bands: Vec<(i64, T)>,
    fallback: T,
}

impl<T: Copy> Thresholds<T> {
    /// Builds a table from `(lower_inclusive, tier)` bands in any order.
    pub fn new(mut bands: Vec<(i64, T)>, fallback: T) -> Self {
        bands.sort_by(|a, b| b.0.cmp(&a.0));
        Thresholds { bands, fallback }
    }
}

/// Returns the tier for `elapsed_days`.
pub fn classify<T: Copy>(elapsed_days: i64, thresholds: &Thresholds<T>) -> T {
    thresholds
        .bands
        .iter()
        .find(|(lower, _)| elapsed_days >= *lower)
        .map(|(_, tier)| *tier)
        .unwrap_or(thresholds.fallback)
}

// =============================================================================
// Client Inactivity
// =============================================================================

/// How long since a client's last completed visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ClientTier {
    /// More than 90 days.
    Urgent,
    /// 60 to 90 days.
    Warning,
    /// 30 to 59 days.
    Recent,
    /// Under 30 days (or a visit dated in the future).
    Active,
}

pub fn client_inactivity_thresholds() -> Thresholds<ClientTier> {
    Thresholds::new(
        vec![
            (91, ClientTier::Urgent),
            (60, ClientTier::Warning),
            (30, ClientTier::Recent),
        ],
        ClientTier::Active,
    )
}

pub fn batch_expiry_thresholds() -> Thresholds<BatchStatus> {
    Thresholds::new(
        vec![
            (1, BatchStatus::Expired),
            (-7, BatchStatus::Critical),
            (-30, BatchStatus::Warning),
        ],
        BatchStatus::Ok,
    )
}

/// A client with the business day of their last completed appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClientActivity {
    pub client_id: String,
    pub client_name: String,
    #[ts(as = "Option<String>")]
    pub last_visit: Option<NaiveDate>,
}

/// A client placed in an inactivity tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClassifiedClient {
    pub client_id: String,
    pub client_name: String,
    #[ts(as = "Option<String>")]
    pub last_visit: Option<NaiveDate>,
    pub days_since_visit: Option<i64>,
}

/// Clients grouped by inactivity tier, most overdue first within a tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TieredClients {
    pub urgent: Vec<ClassifiedClient>,
    pub warning: Vec<ClassifiedClient>,
    pub recent: Vec<ClassifiedClient>,
    pub active: Vec<ClassifiedClient>,
    /// Clients without any completed appointment.
    pub never_visited: Vec<ClassifiedClient>,
}

/// Groups clients into inactivity tiers as of `today`.
pub fn classify_clients(clients: Vec<ClientActivity>, today: NaiveDate) -> TieredClients {
    let thresholds = client_inactivity_thresholds();
    let mut tiers = TieredClients::default();

    for client in clients {
        let days = client.last_visit.map(|d| (today - d).num_days());
        let classified = ClassifiedClient {
            client_id: client.client_id,
            client_name: client.client_name,
            last_visit: client.last_visit,
            days_since_visit: days,
        };
        match days {
            None => tiers.never_visited.push(classified),
            Some(d) => match classify(d, &thresholds) {
                ClientTier::Urgent => tiers.urgent.push(classified),
                ClientTier::Warning => tiers.warning.push(classified),
                ClientTier::Recent => tiers.recent.push(classified),
                ClientTier::Active => tiers.active.push(classified),
            },
        }
    }

    for tier in [
        &mut tiers.urgent,
        &mut tiers.warning,
        &mut tiers.recent,
        &mut tiers.active,
    ] {
        tier.sort_by(|a, b| b.days_since_visit.cmp(&a.days_since_visit));
    }
    tiers.never_visited.sort_by(|a, b| a.client_name.cmp(&b.client_name));
    tiers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_boundaries() {
        let t = client_inactivity_thresholds();
        assert_eq!(classify(91, &t), ClientTier::Urgent);
        assert_eq!(classify(90, &t), ClientTier::Warning);
        assert_eq!(classify(60, &t), ClientTier::Warning);
        assert_eq!(classify(59, &t), ClientTier::Recent);
        assert_eq!(classify(30, &t), ClientTier::Recent);
        assert_eq!(classify(29, &t), ClientTier::Active);
        assert_eq!(classify(0, &t), ClientTier::Active);
        assert_eq!(classify(-5, &t), ClientTier::Active);
    }

    #[test]
    fn test_classify_is_total() {
        let t = client_inactivity_thresholds();
        assert_eq!(classify(i64::MAX, &t), ClientTier::Urgent);
        assert_eq!(classify(i64::MIN, &t), ClientTier::Active);

        let b = batch_expiry_thresholds();
        assert_eq!(classify(i64::MAX, &b), BatchStatus::Expired);
        assert_eq!(classify(i64::MIN, &b), BatchStatus::Ok);
    }

    #[test]
    fn test_band_order_does_not_matter() {
        let t = Thresholds::new(vec![(10, 'b'), (20, 'c'), (0, 'a')], '-');
        assert_eq!(classify(25, &t), 'c');
        assert_eq!(classify(15, &t), 'b');
        assert_eq!(classify(0, &t), 'a');
        assert_eq!(classify(-1, &t), '-');
    }

    #[test]
    fn test_classify_clients_groups_and_sorts() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let visit = |days: i64| Some(today - chrono::Duration::days(days));
        let client = |id: &str, last_visit| ClientActivity {
            client_id: id.to_string(),
            client_name: format!("Cliente {id}"),
            last_visit,
        };

        let tiers = classify_clients(
            vec![
                client("a", visit(120)),
                client("b", visit(91)),
                client("c", visit(90)),
                client("d", visit(45)),
                client("e", visit(3)),
                client("f", None),
            ],
            today,
        );

        let ids = |v: &Vec<ClassifiedClient>| v.iter().map(|c| c.client_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&tiers.urgent), vec!["a", "b"]);
        assert_eq!(ids(&tiers.warning), vec!["c"]);
        assert_eq!(ids(&tiers.recent), vec!["d"]);
        assert_eq!(ids(&tiers.active), vec!["e"]);
        assert_eq!(ids(&tiers.never_visited), vec!["f"]);
        assert_eq!(tiers.urgent[0].days_since_visit, Some(120));
    }
}
