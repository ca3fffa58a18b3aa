//! # Report Service
//!
//! Read-only views recomputed on demand: batch priority (FIFO guidance)
//! and client inactivity tiers. Nothing here writes.

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::debug;

use atelier_core::batch::{rank_and_classify, RankedBatch};
use atelier_core::classify::{classify_clients, ClientActivity, TieredClients};
use atelier_core::interval::business_day;

use crate::config::EngineSettings;
use crate::error::EngineResult;
use crate::repository::batch::BatchRepository;
use crate::repository::catalog::CatalogRepository;
use crate::service::with_timeout;

#[derive(Debug, Clone)]
pub struct ReportService {
    pool: SqlitePool,
    settings: EngineSettings,
    batches: BatchRepository,
    catalog: CatalogRepository,
}

impl ReportService {
    pub fn new(pool: SqlitePool, tenant_id: &str, settings: EngineSettings) -> Self {
        ReportService {
            pool,
            settings,
            batches: BatchRepository::new(tenant_id),
            catalog: CatalogRepository::new(tenant_id),
        }
    }

    /// Batches with quantity left, earliest expiry first, classified as of
    /// `today`. All products when `product_id` is `None`.
    pub async fn get_batch_priority(
        &self,
        product_id: Option<&str>,
        today: NaiveDate,
    ) -> EngineResult<Vec<RankedBatch>> {
        with_timeout(self.settings.operation_timeout, "get_batch_priority", async {
            let batches = self.batches.list_available(&self.pool, product_id).await?;
            debug!(count = batches.len(), product_id = ?product_id, "Ranking batches");
            Ok(rank_and_classify(batches, today))
        })
        .await
    }

    /// Each client with the business day of their last completed visit.
    pub async fn client_activity(&self) -> EngineResult<Vec<ClientActivity>> {
        with_timeout(self.settings.operation_timeout, "client_activity", async {
            let rows = self.catalog.client_visits(&self.pool).await?;

            let mut activity = Vec::with_capacity(rows.len());
            for row in rows {
                let last_visit = row
                    .last_visit_at()?
                    .map(|at| business_day(at, self.settings.business_offset));
                activity.push(ClientActivity {
                    client_id: row.client_id,
                    client_name: row.client_name,
                    last_visit,
                });
            }
            Ok(activity)
        })
        .await
    }

    /// Clients grouped by inactivity tier as of `today`.
    pub async fn classify_clients(&self, today: NaiveDate) -> EngineResult<TieredClients> {
        let activity = self.client_activity().await?;
        Ok(classify_clients(activity, today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use atelier_core::batch::BatchStatus;
    use atelier_core::AppointmentStatus;

    use crate::service::booking::NewAppointment;
    use crate::service::test_support::{add_batch, add_client, add_product, date, fixture, Fixture, TENANT};

    fn reports(f: &Fixture) -> ReportService {
        f.db.reports(TENANT, EngineSettings::default())
    }

    fn noon(day: NaiveDate) -> DateTime<Utc> {
        Utc.from_utc_datetime(&day.and_hms_opt(12, 0, 0).unwrap())
    }

    async fn visit(f: &Fixture, client_id: &str, day: NaiveDate, status: AppointmentStatus) {
        let booking = f.db.booking(TENANT, EngineSettings::default());
        let appt = booking
            .book(NewAppointment {
                resource_id: f.resource_id.clone(),
                client_id: client_id.to_string(),
                service_id: f.service_id.clone(),
                start_time: noon(day),
                notes: None,
            })
            .await
            .unwrap();
        if status != AppointmentStatus::Scheduled {
            booking.set_status(&appt.id, status).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_batch_priority_orders_and_classifies() {
        let f = fixture().await;
        let svc = reports(&f);
        let today = date(2024, 1, 15);

        add_batch(&f.db, &f.product_id, "A", Some(date(2024, 1, 1)), 4).await;
        add_batch(&f.db, &f.product_id, "B", None, 4).await;
        add_batch(&f.db, &f.product_id, "C", Some(date(2023, 6, 1)), 4).await;
        add_batch(&f.db, &f.product_id, "D", Some(date(2025, 1, 1)), 4).await;
        add_batch(&f.db, &f.product_id, "E", Some(date(2024, 1, 20)), 0).await;

        let ranked = svc
            .get_batch_priority(Some(&f.product_id), today)
            .await
            .unwrap();

        let numbers: Vec<_> = ranked.iter().map(|r| r.batch.batch_number.as_str()).collect();
        assert_eq!(numbers, vec!["C", "A", "D", "B"]);
        let statuses: Vec<_> = ranked.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                BatchStatus::Expired,
                BatchStatus::Expired,
                BatchStatus::Ok,
                BatchStatus::NoDate
            ]
        );
        assert_eq!(ranked[1].days_until_expiry, Some(-14));
    }

    #[tokio::test]
    async fn test_batch_priority_can_span_products() {
        let f = fixture().await;
        let svc = reports(&f);
        let other = add_product(&f.db, "Acetona", 0, 500, 1200).await;
        let today = date(2024, 1, 15);

        add_batch(&f.db, &f.product_id, "A", Some(date(2024, 1, 20)), 1).await;
        add_batch(&f.db, &other, "B", Some(date(2024, 1, 18)), 1).await;

        let all = svc.get_batch_priority(None, today).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].batch.product_id, other);
        assert_eq!(all[0].status, BatchStatus::Critical);

        let one = svc.get_batch_priority(Some(&other), today).await.unwrap();
        assert_eq!(one.len(), 1);
    }

    #[tokio::test]
    async fn test_clients_are_tiered_by_last_completed_visit() {
        let f = fixture().await;
        let svc = reports(&f);
        let today = date(2024, 6, 30);

        // Maria: completed 91 days ago, plus a cancelled visit last week.
        visit(&f, &f.client_id, today - Duration::days(91), AppointmentStatus::Completed).await;
        visit(&f, &f.client_id, today - Duration::days(7), AppointmentStatus::Cancelled).await;

        let ana = add_client(&f.db, "Ana").await;
        visit(&f, &ana, today - Duration::days(90), AppointmentStatus::Completed).await;

        let bia = add_client(&f.db, "Bia").await;
        visit(&f, &bia, today - Duration::days(30), AppointmentStatus::Completed).await;

        let carla = add_client(&f.db, "Carla").await;
        visit(&f, &carla, today - Duration::days(2), AppointmentStatus::Completed).await;

        // Scheduled only: never visited.
        let duda = add_client(&f.db, "Duda").await;
        visit(&f, &duda, today - Duration::days(1), AppointmentStatus::Scheduled).await;

        let tiers = svc.classify_clients(today).await.unwrap();

        assert_eq!(tiers.urgent.len(), 1);
        assert_eq!(tiers.urgent[0].client_name, "Maria");
        assert_eq!(tiers.urgent[0].days_since_visit, Some(91));
        assert_eq!(tiers.warning[0].client_name, "Ana");
        assert_eq!(tiers.recent[0].client_name, "Bia");
        assert_eq!(tiers.active[0].client_name, "Carla");
        assert_eq!(tiers.never_visited.len(), 1);
        assert_eq!(tiers.never_visited[0].client_name, "Duda");
    }

    #[tokio::test]
    async fn test_client_activity_uses_latest_completed_visit() {
        let f = fixture().await;
        let svc = reports(&f);

        visit(&f, &f.client_id, date(2024, 3, 1), AppointmentStatus::Completed).await;
        visit(&f, &f.client_id, date(2024, 4, 2), AppointmentStatus::Completed).await;

        let activity = svc.client_activity().await.unwrap();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].last_visit, Some(date(2024, 4, 2)));
    }
}
