//! # Cascade Rules
//!
//! Pure derivation rules for the ledger cascade: which ledger entry and
//! which stock delta a primary business event produces. The database layer
//! executes them inside one transaction; nothing in here touches storage.
//!
//! ## Event → Derived Records
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Event          Primary record          Stock      Ledger entry         │
//! │  ─────          ──────────────          ─────      ────────────         │
//! │  stock_entry    StockMovement(entry)    += q       payable, pending     │
//! │                                                    q × unit cost        │
//! │  stock_exit     StockMovement(exit)     −= q       receivable, pending  │
//! │                                                    q × unit cost        │
//! │  product_sale   ProductSale             −= q       receivable, received │
//! │                                                    q × unit price       │
//! │  package_sale   ServicePackageSale      —          receivable, pending  │
//! │                                                    package price        │
//! │                                                                         │
//! │  Every ledger entry points back via (reference_type, reference_id).    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Idempotency
//! A payload may carry `id`, the id its primary record will get. The same
//! id posted twice yields one set of derived records; the second call
//! returns the stored [`CascadeOutcome`] with `replayed = true`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{LedgerDirection, LedgerStatus, MovementType, ReferenceType};
use crate::validation::{
    validate_amount_cents, validate_name, validate_notes, validate_quantity, validate_required,
    validate_uuid,
};
use crate::{DEFAULT_CLIENT_NAME, DEFAULT_SUPPLIER_NAME};

// =============================================================================
// Event Payloads
// =============================================================================

/// Payload of `stock_entry` and `stock_exit`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockMovementInput {
    /// Id for the movement record; doubles as the idempotency key.
    #[serde(default)]
    pub id: Option<String>,
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    /// Overrides the product's unit cost.
    #[serde(default)]
    pub unit_cost_cents: Option<i64>,
    /// Supplier (entry) or client (exit) named on the ledger entry.
    #[serde(default)]
    pub counterparty_name: Option<String>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
}

/// Payload of `product_sale`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSaleInput {
    #[serde(default)]
    pub id: Option<String>,
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub client_id: Option<String>,
    /// Overrides the product's sale price.
    #[serde(default)]
    pub unit_price_cents: Option<i64>,
}

/// Payload of `package_sale`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PackageSaleInput {
    #[serde(default)]
    pub id: Option<String>,
    pub client_id: String,
    pub package_id: String,
    /// Overrides the catalog price of the package.
    #[serde(default)]
    pub price_cents: Option<i64>,
    /// Overrides the catalog session count.
    #[serde(default)]
    pub purchased_quantity: Option<i64>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
}

/// A primary business event handed to the cascade engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusinessEvent {
    StockEntry(StockMovementInput),
    StockExit(StockMovementInput),
    ProductSale(ProductSaleInput),
    PackageSale(PackageSaleInput),
}

impl BusinessEvent {
    /// Decodes a wire-level `(event_type, payload)` pair.
    pub fn from_wire(event_type: &str, payload: serde_json::Value) -> CoreResult<Self> {
        fn decode<T: serde::de::DeserializeOwned>(payload: serde_json::Value) -> CoreResult<T> {
            serde_json::from_value(payload).map_err(|e| {
                CoreError::Validation(ValidationError::InvalidFormat {
                    field: "payload".to_string(),
                    reason: e.to_string(),
                })
            })
        }

        match event_type {
            "stock_entry" => Ok(BusinessEvent::StockEntry(decode(payload)?)),
            "stock_exit" => Ok(BusinessEvent::StockExit(decode(payload)?)),
            "product_sale" => Ok(BusinessEvent::ProductSale(decode(payload)?)),
            "package_sale" => Ok(BusinessEvent::PackageSale(decode(payload)?)),
            other => Err(CoreError::UnknownEventType(other.to_string())),
        }
    }

    pub const fn event_type(&self) -> &'static str {
        match self {
            BusinessEvent::StockEntry(_) => "stock_entry",
            BusinessEvent::StockExit(_) => "stock_exit",
            BusinessEvent::ProductSale(_) => "product_sale",
            BusinessEvent::PackageSale(_) => "package_sale",
        }
    }

    /// Kind of primary record this event writes.
    pub const fn reference_type(&self) -> ReferenceType {
        match self {
            BusinessEvent::StockEntry(_) | BusinessEvent::StockExit(_) => {
                ReferenceType::StockMovement
            }
            BusinessEvent::ProductSale(_) => ReferenceType::ProductSale,
            BusinessEvent::PackageSale(_) => ReferenceType::PackageSale,
        }
    }

    /// Caller-supplied primary record id, if any.
    pub fn supplied_id(&self) -> Option<&str> {
        match self {
            BusinessEvent::StockEntry(i) | BusinessEvent::StockExit(i) => i.id.as_deref(),
            BusinessEvent::ProductSale(i) => i.id.as_deref(),
            BusinessEvent::PackageSale(i) => i.id.as_deref(),
        }
    }

    /// Validates the payload. Runs before any write.
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(id) = self.supplied_id() {
            validate_uuid("id", id)?;
        }

        match self {
            BusinessEvent::StockEntry(input) | BusinessEvent::StockExit(input) => {
                validate_required("product_id", &input.product_id)?;
                validate_quantity("quantity", input.quantity)?;
                if let Some(cost) = input.unit_cost_cents {
                    validate_amount_cents("unit_cost", cost)?;
                }
                if let Some(name) = &input.counterparty_name {
                    validate_name("counterparty_name", name)?;
                }
                validate_notes("reason", input.reason.as_deref())?;
            }
            BusinessEvent::ProductSale(input) => {
                validate_required("product_id", &input.product_id)?;
                validate_quantity("quantity", input.quantity)?;
                if let Some(price) = input.unit_price_cents {
                    validate_amount_cents("unit_price", price)?;
                }
                if let Some(client_id) = &input.client_id {
                    validate_required("client_id", client_id)?;
                }
            }
            BusinessEvent::PackageSale(input) => {
                validate_required("client_id", &input.client_id)?;
                validate_required("package_id", &input.package_id)?;
                if let Some(price) = input.price_cents {
                    validate_amount_cents("price", price)?;
                }
                if let Some(sessions) = input.purchased_quantity {
                    validate_quantity("purchased_quantity", sessions)?;
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Derivation Rules
// =============================================================================

/// A ledger entry ready to be inserted, minus ids and the back-reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerDraft {
    pub direction: LedgerDirection,
    pub description: String,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub status: LedgerStatus,
    pub payment_date: Option<NaiveDate>,
    pub counterparty_name: String,
}

fn line_total(unit: Money, quantity: i64) -> CoreResult<Money> {
    unit.checked_multiply_quantity(quantity).ok_or_else(|| {
        CoreError::Validation(ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: 0,
            max: i64::MAX,
        })
    })
}

fn counterparty_or(name: Option<&str>, fallback: &str) -> String {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => fallback.to_string(),
    }
}

/// Signed change applied to `products.stock_quantity`.
#[inline]
pub const fn stock_delta(movement: MovementType, quantity: i64) -> i64 {
    movement.sign() * quantity
}

/// Ledger entry for a manual stock movement.
///
/// Entries create a payable to the supplier, exits a receivable from the
/// client; both are valued at cost and start pending.
pub fn stock_movement_ledger(
    movement: MovementType,
    product_name: &str,
    quantity: i64,
    unit_cost: Money,
    counterparty_name: Option<&str>,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
) -> CoreResult<LedgerDraft> {
    let amount = line_total(unit_cost, quantity)?;
    let (direction, description, counterparty) = match movement {
        MovementType::Entry => (
            LedgerDirection::Payable,
            format!("Entrada de estoque - {} ({} un.)", product_name, quantity),
            counterparty_or(counterparty_name, DEFAULT_SUPPLIER_NAME),
        ),
        MovementType::Exit => (
            LedgerDirection::Receivable,
            format!("Saída de estoque - {} ({} un.)", product_name, quantity),
            counterparty_or(counterparty_name, DEFAULT_CLIENT_NAME),
        ),
    };

    Ok(LedgerDraft {
        direction,
        description,
        amount,
        due_date: due_date.unwrap_or(today),
        status: LedgerStatus::Pending,
        payment_date: None,
        counterparty_name: counterparty,
    })
}

/// Ledger entry for a counter sale: already received today.
pub fn product_sale_ledger(
    product_name: &str,
    quantity: i64,
    unit_price: Money,
    client_name: Option<&str>,
    today: NaiveDate,
) -> CoreResult<LedgerDraft> {
    Ok(LedgerDraft {
        direction: LedgerDirection::Receivable,
        description: format!("Venda de produto - {} ({} un.)", product_name, quantity),
        amount: line_total(unit_price, quantity)?,
        due_date: today,
        status: LedgerStatus::Received,
        payment_date: Some(today),
        counterparty_name: counterparty_or(client_name, DEFAULT_CLIENT_NAME),
    })
}

/// Ledger entry for a sold service package: pending until paid.
pub fn package_sale_ledger(
    package_name: &str,
    client_name: &str,
    price: Money,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
) -> LedgerDraft {
    LedgerDraft {
        direction: LedgerDirection::Receivable,
        description: format!("Venda de pacote - {}", package_name),
        amount: price,
        due_date: due_date.unwrap_or(today),
        status: LedgerStatus::Pending,
        payment_date: None,
        counterparty_name: counterparty_or(Some(client_name), DEFAULT_CLIENT_NAME),
    }
}

/// Rejects a decrement that would take stock below zero.
pub fn ensure_stock(product_name: &str, available: i64, requested: i64) -> CoreResult<()> {
    if available < requested {
        return Err(CoreError::InsufficientStock {
            product: product_name.to_string(),
            available,
            requested,
        });
    }
    Ok(())
}

// =============================================================================
// Outcomes
// =============================================================================

/// A record written (or mutated) by the cascade besides the primary record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DerivedRecord {
    Ledger {
        direction: LedgerDirection,
        id: String,
    },
    StockDelta {
        product_id: String,
        delta: i64,
        quantity_after: i64,
    },
    BatchDraw {
        batch_id: String,
        quantity: i64,
    },
}

impl DerivedRecord {
    /// Id of the row this record wrote or changed.
    pub fn record_id(&self) -> &str {
        match self {
            DerivedRecord::Ledger { id, .. } => id,
            DerivedRecord::StockDelta { product_id, .. } => product_id,
            DerivedRecord::BatchDraw { batch_id, .. } => batch_id,
        }
    }
}

/// Everything one applied event produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CascadeOutcome {
    pub reference: ReferenceType,
    pub primary_id: String,
    pub derived: Vec<DerivedRecord>,
    /// True when the event had already been applied and nothing was written.
    pub replayed: bool,
}

impl CascadeOutcome {
    pub fn receipt(&self) -> EventReceipt {
        EventReceipt {
            primary_id: self.primary_id.clone(),
            derived_ids: self
                .derived
                .iter()
                .map(|d| d.record_id().to_string())
                .collect(),
            replayed: self.replayed,
        }
    }

    /// Ids of the ledger entries in this outcome.
    pub fn ledger_ids(&self) -> impl Iterator<Item = &str> {
        self.derived.iter().filter_map(|d| match d {
            DerivedRecord::Ledger { id, .. } => Some(id.as_str()),
            _ => None,
        })
    }
}

/// Wire-level answer to `post_event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EventReceipt {
    pub primary_id: String,
    pub derived_ids: Vec<String>,
    pub replayed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    #[test]
    fn test_from_wire_decodes_known_types() {
        let event = BusinessEvent::from_wire(
            "stock_entry",
            json!({ "product_id": "p-1", "quantity": 4, "unit_cost_cents": 1250 }),
        )
        .unwrap();

        assert_eq!(event.reference_type(), ReferenceType::StockMovement);
        match event {
            BusinessEvent::StockEntry(input) => {
                assert_eq!(input.quantity, 4);
                assert_eq!(input.unit_cost_cents, Some(1250));
                assert!(input.id.is_none());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_from_wire_rejects_unknown_and_malformed() {
        assert!(matches!(
            BusinessEvent::from_wire("refund", json!({})),
            Err(CoreError::UnknownEventType(t)) if t == "refund"
        ));
        assert!(matches!(
            BusinessEvent::from_wire("product_sale", json!({ "quantity": 1 })),
            Err(CoreError::Validation(ValidationError::InvalidFormat { .. }))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_payloads() {
        let zero = BusinessEvent::StockExit(StockMovementInput {
            product_id: "p-1".to_string(),
            quantity: 0,
            ..Default::default()
        });
        assert!(zero.validate().is_err());

        let negative_cost = BusinessEvent::StockEntry(StockMovementInput {
            product_id: "p-1".to_string(),
            quantity: 1,
            unit_cost_cents: Some(-5),
            ..Default::default()
        });
        assert!(negative_cost.validate().is_err());

        let bad_id = BusinessEvent::PackageSale(PackageSaleInput {
            id: Some("abc".to_string()),
            client_id: "c-1".to_string(),
            package_id: "k-1".to_string(),
            ..Default::default()
        });
        assert!(bad_id.validate().is_err());

        let ok = BusinessEvent::ProductSale(ProductSaleInput {
            product_id: "p-1".to_string(),
            quantity: 2,
            ..Default::default()
        });
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_stock_entry_creates_payable_at_cost() {
        let draft = stock_movement_ledger(
            MovementType::Entry,
            "Shampoo 300ml",
            4,
            Money::from_cents(1250),
            None,
            None,
            today(),
        )
        .unwrap();

        assert_eq!(draft.direction, LedgerDirection::Payable);
        assert_eq!(draft.amount.cents(), 5000);
        assert_eq!(draft.counterparty_name, "Fornecedor");
        assert_eq!(draft.due_date, today());
        assert_eq!(draft.status, LedgerStatus::Pending);
        assert_eq!(draft.description, "Entrada de estoque - Shampoo 300ml (4 un.)");
    }

    #[test]
    fn test_stock_exit_creates_receivable_with_supplied_values() {
        let due = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let draft = stock_movement_ledger(
            MovementType::Exit,
            "Esmalte",
            3,
            Money::from_cents(800),
            Some("Salão Vizinho"),
            Some(due),
            today(),
        )
        .unwrap();

        assert_eq!(draft.direction, LedgerDirection::Receivable);
        assert_eq!(draft.amount.cents(), 2400);
        assert_eq!(draft.counterparty_name, "Salão Vizinho");
        assert_eq!(draft.due_date, due);
    }

    #[test]
    fn test_product_sale_is_received_today() {
        let draft =
            product_sale_ledger("Condicionador", 2, Money::from_cents(3990), None, today()).unwrap();

        assert_eq!(draft.status, LedgerStatus::Received);
        assert_eq!(draft.payment_date, Some(today()));
        assert_eq!(draft.amount.cents(), 7980);
        assert_eq!(draft.counterparty_name, "Cliente");
    }

    #[test]
    fn test_package_sale_is_pending() {
        let draft = package_sale_ledger("10 Escovas", "Ana", Money::from_cents(45000), None, today());
        assert_eq!(draft.status, LedgerStatus::Pending);
        assert_eq!(draft.amount.cents(), 45000);
        assert_eq!(draft.counterparty_name, "Ana");
    }

    #[test]
    fn test_amount_overflow_is_a_validation_error() {
        let result = stock_movement_ledger(
            MovementType::Entry,
            "X",
            i64::MAX,
            Money::from_cents(2),
            None,
            None,
            today(),
        );
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_ensure_stock_names_the_product() {
        assert!(ensure_stock("Esmalte", 5, 5).is_ok());
        let err = ensure_stock("Esmalte", 3, 5).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Esmalte: available 3, requested 5"
        );
        assert_eq!(stock_delta(MovementType::Exit, 5), -5);
    }

    #[test]
    fn test_outcome_receipt_lists_derived_ids() {
        let outcome = CascadeOutcome {
            reference: ReferenceType::ProductSale,
            primary_id: "s-1".to_string(),
            derived: vec![
                DerivedRecord::StockDelta {
                    product_id: "p-1".to_string(),
                    delta: -2,
                    quantity_after: 8,
                },
                DerivedRecord::Ledger {
                    direction: LedgerDirection::Receivable,
                    id: "l-1".to_string(),
                },
            ],
            replayed: false,
        };

        let receipt = outcome.receipt();
        assert_eq!(receipt.primary_id, "s-1");
        assert_eq!(receipt.derived_ids, vec!["p-1", "l-1"]);
        assert_eq!(outcome.ledger_ids().collect::<Vec<_>>(), vec!["l-1"]);

        let stored = serde_json::to_value(&outcome.derived).unwrap();
        assert_eq!(stored[1]["kind"], "ledger");
        assert_eq!(stored[1]["direction"], "receivable");
    }
}
