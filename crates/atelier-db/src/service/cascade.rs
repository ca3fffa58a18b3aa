//! # Cascade Service
//!
//! Applies primary business events and everything they imply, as one
//! atomic unit, and maintains the resulting ledger entries.
//!
//! ## Cascade Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply_event(event)                                                    │
//! │    │                                                                    │
//! │    ├── event.validate()                  → Validation                  │
//! │    ├── look up product / client / package (pool)  → LookupFailed       │
//! │    ▼                                                                    │
//! │  BEGIN                                                                  │
//! │    claim posted_events key               ← first write                 │
//! │    │   already claimed → ROLLBACK, return stored outcome (replayed)    │
//! │    │   claimed by another event type → Validation                     │
//! │    │                                                                    │
//! │    primary record      stock_movements / product_sales /               │
//! │    │                   service_package_sales                           │
//! │    stock delta         guarded; short → ROLLBACK, InsufficientStock    │
//! │    batch draws         FIFO, only when enabled; never rejects          │
//! │    ledger entry        accounts_payable / accounts_receivable          │
//! │    store derived list on the claimed key                               │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use atelier_core::batch::{plan_fifo_draw, rank_and_classify};
use atelier_core::cascade::{
    ensure_stock, package_sale_ledger, product_sale_ledger, stock_delta, stock_movement_ledger,
    LedgerDraft, PackageSaleInput, ProductSaleInput, StockMovementInput,
};
use atelier_core::validation::validate_required;
use atelier_core::{
    BusinessEvent, CascadeOutcome, CoreError, DerivedRecord, EventReceipt, LedgerDirection,
    LedgerEntry, LedgerStatus, Money, MovementType, PackageSale, PackageSaleStatus, Product,
    ProductSale, ReferenceType, StockMovement, ValidationError,
};

use crate::config::EngineSettings;
use crate::error::{DbError, EngineResult};
use crate::repository::batch::BatchRepository;
use crate::repository::catalog::{CatalogRepository, Client, ServicePackage};
use crate::repository::event::PostedEventRepository;
use crate::repository::generate_id;
use crate::repository::ledger::LedgerRepository;
use crate::repository::movement::StockMovementRepository;
use crate::repository::product::ProductRepository;
use crate::repository::sale::SaleRepository;
use crate::service::with_timeout;

/// Records an event needs, loaded before the transaction starts.
enum Resolved {
    Movement(Product),
    ProductSale {
        product: Product,
        client: Option<Client>,
    },
    PackageSale {
        client: Client,
        package: ServicePackage,
    },
}

/// Applies business events and maintains the ledger for one tenant.
#[derive(Debug, Clone)]
pub struct CascadeService {
    pool: SqlitePool,
    tenant_id: String,
    settings: EngineSettings,
    events: PostedEventRepository,
    products: ProductRepository,
    movements: StockMovementRepository,
    batches: BatchRepository,
    sales: SaleRepository,
    ledger: LedgerRepository,
    catalog: CatalogRepository,
}

impl CascadeService {
    pub fn new(pool: SqlitePool, tenant_id: &str, settings: EngineSettings) -> Self {
        CascadeService {
            pool,
            tenant_id: tenant_id.to_string(),
            settings,
            events: PostedEventRepository::new(tenant_id),
            products: ProductRepository::new(tenant_id),
            movements: StockMovementRepository::new(tenant_id),
            batches: BatchRepository::new(tenant_id),
            sales: SaleRepository::new(tenant_id),
            ledger: LedgerRepository::new(tenant_id),
            catalog: CatalogRepository::new(tenant_id),
        }
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Decodes a wire-level event and applies it.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let receipt = cascade
    ///     .post_event("product_sale", r#"{"product_id": "...", "quantity": 2}"#)
    ///     .await?;
    /// ```
    pub async fn post_event(&self, event_type: &str, payload: &str) -> EngineResult<EventReceipt> {
        let value: serde_json::Value = serde_json::from_str(payload).map_err(|e| {
            CoreError::from(ValidationError::InvalidFormat {
                field: "payload".to_string(),
                reason: e.to_string(),
            })
        })?;
        let event = BusinessEvent::from_wire(event_type, value)?;
        let outcome = self.apply_event(event).await?;
        Ok(outcome.receipt())
    }

    /// Applies one event: primary record plus derived records, atomically.
    pub async fn apply_event(&self, event: BusinessEvent) -> EngineResult<CascadeOutcome> {
        with_timeout(self.settings.operation_timeout, "apply_event", async {
            event.validate()?;

            let reference = event.reference_type();
            let primary_id = event
                .supplied_id()
                .map(str::to_string)
                .unwrap_or_else(generate_id);
            let resolved = self.resolve(&event).await?;
            let today = self.settings.today();

            let mut tx = self.pool.begin().await?;

            if !self
                .events
                .claim(&mut *tx, reference, &primary_id, event.event_type())
                .await?
            {
                tx.rollback().await?;
                return self
                    .stored_outcome(reference, &primary_id, event.event_type())
                    .await;
            }

            let derived = match (&event, resolved) {
                (BusinessEvent::StockEntry(input), Resolved::Movement(product)) => {
                    self.apply_movement(&mut tx, MovementType::Entry, input, &product, &primary_id, today)
                        .await?
                }
                (BusinessEvent::StockExit(input), Resolved::Movement(product)) => {
                    self.apply_movement(&mut tx, MovementType::Exit, input, &product, &primary_id, today)
                        .await?
                }
                (BusinessEvent::ProductSale(input), Resolved::ProductSale { product, client }) => {
                    self.apply_product_sale(&mut tx, input, &product, client.as_ref(), &primary_id, today)
                        .await?
                }
                (BusinessEvent::PackageSale(input), Resolved::PackageSale { client, package }) => {
                    self.apply_package_sale(&mut tx, input, &client, &package, &primary_id, today)
                        .await?
                }
                _ => {
                    return Err(DbError::Internal(format!(
                        "{} resolved to the wrong records",
                        event.event_type()
                    ))
                    .into())
                }
            };

            let derived = match derived {
                Ok(derived) => derived,
                Err(rejection) => {
                    tx.rollback().await?;
                    info!(
                        event_type = event.event_type(),
                        reason = %rejection,
                        "Event rejected"
                    );
                    return Err(rejection.into());
                }
            };

            self.events
                .store_derived(&mut *tx, reference, &primary_id, &derived)
                .await?;
            tx.commit().await?;

            info!(
                event_type = event.event_type(),
                reference_id = %primary_id,
                derived = derived.len(),
                "Event applied"
            );

            Ok(CascadeOutcome {
                reference,
                primary_id,
                derived,
                replayed: false,
            })
        })
        .await
    }

    /// Loads the records an event refers to. Missing ones fail the event.
    async fn resolve(&self, event: &BusinessEvent) -> EngineResult<Resolved> {
        match event {
            BusinessEvent::StockEntry(input) | BusinessEvent::StockExit(input) => {
                Ok(Resolved::Movement(self.require_product(&input.product_id).await?))
            }
            BusinessEvent::ProductSale(input) => {
                let product = self.require_product(&input.product_id).await?;
                let client = match &input.client_id {
                    Some(id) => Some(self.require_client(id).await?),
                    None => None,
                };
                Ok(Resolved::ProductSale { product, client })
            }
            BusinessEvent::PackageSale(input) => {
                let client = self.require_client(&input.client_id).await?;
                let package = self
                    .catalog
                    .get_package(&self.pool, &input.package_id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("Service package", input.package_id.as_str()))?;
                Ok(Resolved::PackageSale { client, package })
            }
        }
    }

    // Each apply_* returns the outer Result for store failures and the inner
    // one for business rejections, which the caller rolls back.

    async fn apply_movement(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        movement_type: MovementType,
        input: &StockMovementInput,
        product: &Product,
        primary_id: &str,
        today: NaiveDate,
    ) -> EngineResult<Result<Vec<DerivedRecord>, CoreError>> {
        let unit_cost = input
            .unit_cost_cents
            .map(Money::from_cents)
            .unwrap_or_else(|| product.unit_cost());
        let draft = match stock_movement_ledger(
            movement_type,
            &product.name,
            input.quantity,
            unit_cost,
            input.counterparty_name.as_deref(),
            input.due_date,
            today,
        ) {
            Ok(draft) => draft,
            Err(rejection) => return Ok(Err(rejection)),
        };

        let movement = StockMovement {
            id: primary_id.to_string(),
            tenant_id: self.tenant_id.clone(),
            product_id: product.id.clone(),
            movement_type,
            quantity: input.quantity,
            location_id: input.location_id.clone(),
            reason: input.reason.clone(),
            unit_cost_cents: unit_cost.cents(),
            created_at: Utc::now(),
        };
        self.movements.insert(&mut **tx, &movement).await?;

        let mut derived = Vec::new();
        let stock = match movement_type {
            MovementType::Entry => self.add_stock(tx, product, input.quantity).await?,
            MovementType::Exit => {
                match self.remove_stock(tx, product, input.quantity).await? {
                    Ok(record) => {
                        derived.extend(self.draw_batches(tx, &product.id, input.quantity, today).await?);
                        record
                    }
                    Err(rejection) => return Ok(Err(rejection)),
                }
            }
        };
        derived.insert(0, stock);

        let ledger_id = self
            .insert_ledger(tx, draft, ReferenceType::StockMovement, primary_id)
            .await?;
        derived.push(ledger_id);

        Ok(Ok(derived))
    }

    async fn apply_product_sale(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        input: &ProductSaleInput,
        product: &Product,
        client: Option<&Client>,
        primary_id: &str,
        today: NaiveDate,
    ) -> EngineResult<Result<Vec<DerivedRecord>, CoreError>> {
        let unit_price = input
            .unit_price_cents
            .map(Money::from_cents)
            .unwrap_or_else(|| product.sale_price());
        let draft = match product_sale_ledger(
            &product.name,
            input.quantity,
            unit_price,
            client.map(|c| c.name.as_str()),
            today,
        ) {
            Ok(draft) => draft,
            Err(rejection) => return Ok(Err(rejection)),
        };

        let mut derived = match self.remove_stock(tx, product, input.quantity).await? {
            Ok(record) => vec![record],
            Err(rejection) => return Ok(Err(rejection)),
        };

        let sale = ProductSale {
            id: primary_id.to_string(),
            tenant_id: self.tenant_id.clone(),
            product_id: product.id.clone(),
            client_id: client.map(|c| c.id.clone()),
            quantity: input.quantity,
            unit_price_cents: unit_price.cents(),
            total_cents: draft.amount.cents(),
            created_at: Utc::now(),
        };
        self.sales.insert_product_sale(&mut **tx, &sale).await?;

        derived.extend(self.draw_batches(tx, &product.id, input.quantity, today).await?);
        derived.push(
            self.insert_ledger(tx, draft, ReferenceType::ProductSale, primary_id)
                .await?,
        );

        Ok(Ok(derived))
    }

    async fn apply_package_sale(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        input: &PackageSaleInput,
        client: &Client,
        package: &ServicePackage,
        primary_id: &str,
        today: NaiveDate,
    ) -> EngineResult<Result<Vec<DerivedRecord>, CoreError>> {
        let price = Money::from_cents(input.price_cents.unwrap_or(package.price_cents));
        let sessions = input.purchased_quantity.unwrap_or(package.session_count);

        let sale = PackageSale {
            id: primary_id.to_string(),
            tenant_id: self.tenant_id.clone(),
            client_id: client.id.clone(),
            package_id: package.id.clone(),
            price_cents: price.cents(),
            purchased_quantity: sessions,
            remaining_quantity: sessions,
            status: PackageSaleStatus::Active,
            created_at: Utc::now(),
        };
        self.sales.insert_package_sale(&mut **tx, &sale).await?;

        let draft = package_sale_ledger(&package.name, &client.name, price, input.due_date, today);
        let ledger = self
            .insert_ledger(tx, draft, ReferenceType::PackageSale, primary_id)
            .await?;

        Ok(Ok(vec![ledger]))
    }

    async fn add_stock(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        product: &Product,
        quantity: i64,
    ) -> EngineResult<DerivedRecord> {
        let after = self
            .products
            .add_stock(&mut **tx, &product.id, quantity)
            .await?
            .ok_or_else(|| CoreError::not_found("Product", product.id.as_str()))?;

        Ok(DerivedRecord::StockDelta {
            product_id: product.id.clone(),
            delta: stock_delta(MovementType::Entry, quantity),
            quantity_after: after,
        })
    }

    /// Guarded decrement. `Err` names the product and what was available.
    async fn remove_stock(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        product: &Product,
        quantity: i64,
    ) -> EngineResult<Result<DerivedRecord, CoreError>> {
        match self.products.remove_stock(&mut **tx, &product.id, quantity).await? {
            Some(after) => Ok(Ok(DerivedRecord::StockDelta {
                product_id: product.id.clone(),
                delta: stock_delta(MovementType::Exit, quantity),
                quantity_after: after,
            })),
            None => {
                let available = self
                    .products
                    .stock_quantity(&mut **tx, &product.id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("Product", product.id.as_str()))?;
                let rejection = match ensure_stock(&product.name, available, quantity) {
                    Err(rejection) => rejection,
                    // Enough stock recorded but the guarded update matched nothing.
                    Ok(()) => CoreError::not_found("Product", product.id.as_str()),
                };
                Ok(Err(rejection))
            }
        }
    }

    /// Takes `quantity` from the product's batches, earliest expiry first.
    async fn draw_batches(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        product_id: &str,
        quantity: i64,
        today: NaiveDate,
    ) -> EngineResult<Vec<DerivedRecord>> {
        if !self.settings.fifo_batch_consumption {
            return Ok(Vec::new());
        }

        let batches = self.batches.list_available(&mut **tx, Some(product_id)).await?;
        let plan = plan_fifo_draw(&rank_and_classify(batches, today), quantity);

        let mut drawn = Vec::with_capacity(plan.len());
        for draw in plan {
            if self.batches.draw(&mut **tx, &draw.batch_id, draw.quantity).await? {
                drawn.push(DerivedRecord::BatchDraw {
                    batch_id: draw.batch_id,
                    quantity: draw.quantity,
                });
            }
        }
        debug!(product_id = %product_id, draws = drawn.len(), "Batch draws applied");
        Ok(drawn)
    }

    async fn insert_ledger(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        draft: LedgerDraft,
        reference_type: ReferenceType,
        reference_id: &str,
    ) -> EngineResult<DerivedRecord> {
        let entry = LedgerEntry {
            id: generate_id(),
            tenant_id: self.tenant_id.clone(),
            direction: draft.direction,
            description: draft.description,
            amount_cents: draft.amount.cents(),
            due_date: draft.due_date,
            status: draft.status,
            payment_date: draft.payment_date,
            reference_type,
            reference_id: reference_id.to_string(),
            counterparty_name: draft.counterparty_name,
            created_at: Utc::now(),
        };
        self.ledger.insert(&mut **tx, &entry).await?;

        Ok(DerivedRecord::Ledger {
            direction: entry.direction,
            id: entry.id,
        })
    }

    /// The outcome recorded for an already-posted key. The key must have
    /// been posted by the same kind of event.
    async fn stored_outcome(
        &self,
        reference: ReferenceType,
        primary_id: &str,
        event_type: &str,
    ) -> EngineResult<CascadeOutcome> {
        let (posted_as, derived) = self
            .events
            .load(&self.pool, reference, primary_id)
            .await?
            .ok_or_else(|| DbError::not_found("PostedEvent", primary_id))?;

        if posted_as != event_type {
            info!(
                event_type,
                posted_as = %posted_as,
                reference_id = %primary_id,
                "Event id already used by another event type"
            );
            return Err(CoreError::from(ValidationError::IdAlreadyPosted {
                id: primary_id.to_string(),
                posted_as,
            })
            .into());
        }

        info!(
            event_type,
            reference_id = %primary_id,
            "Event already applied; returning stored outcome"
        );
        Ok(CascadeOutcome {
            reference,
            primary_id: primary_id.to_string(),
            derived,
            replayed: true,
        })
    }

    async fn require_product(&self, id: &str) -> EngineResult<Product> {
        self.products
            .get_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| CoreError::not_found("Product", id).into())
    }

    async fn require_client(&self, id: &str) -> EngineResult<Client> {
        self.catalog
            .get_client(&self.pool, id)
            .await?
            .ok_or_else(|| CoreError::not_found("Client", id).into())
    }

    // =========================================================================
    // Ledger Maintenance
    // =========================================================================

    /// Entries of one direction as shown on `today`: pending entries past
    /// their due date carry [`LedgerStatus::Overdue`].
    pub async fn list_ledger(
        &self,
        direction: LedgerDirection,
        today: NaiveDate,
    ) -> EngineResult<Vec<LedgerEntry>> {
        with_timeout(self.settings.operation_timeout, "list_ledger", async {
            let entries = self.ledger.list(&self.pool, direction).await?;
            Ok(entries
                .into_iter()
                .map(|mut entry| {
                    entry.status = entry.effective_status(today);
                    entry
                })
                .collect())
        })
        .await
    }

    /// Marks a pending entry paid (payable) or received (receivable).
    pub async fn settle(
        &self,
        direction: LedgerDirection,
        id: &str,
        payment_date: NaiveDate,
    ) -> EngineResult<LedgerEntry> {
        with_timeout(self.settings.operation_timeout, "settle", async {
            let changed = self
                .ledger
                .mark_settled(&self.pool, direction, id, payment_date)
                .await?;
            self.after_transition(direction, id, changed, direction.settled_status())
                .await
        })
        .await
    }

    /// Cancels a pending entry.
    pub async fn cancel(&self, direction: LedgerDirection, id: &str) -> EngineResult<LedgerEntry> {
        with_timeout(self.settings.operation_timeout, "cancel", async {
            let changed = self.ledger.mark_cancelled(&self.pool, direction, id).await?;
            self.after_transition(direction, id, changed, LedgerStatus::Cancelled)
                .await
        })
        .await
    }

    async fn after_transition(
        &self,
        direction: LedgerDirection,
        id: &str,
        changed: bool,
        to: LedgerStatus,
    ) -> EngineResult<LedgerEntry> {
        let entry = self
            .ledger
            .get_by_id(&self.pool, direction, id)
            .await?
            .ok_or_else(|| CoreError::not_found("Ledger entry", id))?;

        if !changed {
            return Err(CoreError::InvalidLedgerTransition {
                entry_id: id.to_string(),
                from: entry.status,
                to,
            }
            .into());
        }

        info!(id = %id, direction = direction.as_str(), to = to.as_str(), "Ledger entry updated");
        Ok(entry)
    }

    /// Every ledger entry derived from one primary record.
    pub async fn entries_for_reference(
        &self,
        reference_type: ReferenceType,
        reference_id: &str,
    ) -> EngineResult<Vec<LedgerEntry>> {
        with_timeout(self.settings.operation_timeout, "entries_for_reference", async {
            validate_required("reference_id", reference_id).map_err(CoreError::from)?;
            let entries = self
                .ledger
                .for_reference(&self.pool, reference_type, reference_id)
                .await?;
            Ok(entries)
        })
        .await
    }
}
