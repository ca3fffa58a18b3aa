//! # Domain Types
//!
//! Persisted domain types shared by the core rules and the database layer.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Scheduling          Inventory              Ledger                      │
//! │  ──────────          ─────────              ──────                      │
//! │  Appointment         Product (stock)        LedgerEntry                 │
//! │  AppointmentStatus   StockMovement          LedgerDirection             │
//! │                      ProductBatch           LedgerStatus                │
//! │                      ProductSale            ReferenceType               │
//! │                      PackageSale                                        │
//! │                                                                         │
//! │  Every row carries tenant_id. Derived rows copy it from their trigger.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has a UUID v4 `id`; ledger entries additionally point back
//! at the record that produced them through `(reference_type, reference_id)`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Appointment
// =============================================================================

/// Lifecycle of an appointment.
///
/// ```text
/// Scheduled ──► Confirmed ──► Completed
///     │             │
///     └──────┬──────┘
///            ▼
///        Cancelled
/// ```
/// Completed and Cancelled are terminal. Appointments are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Cancelled appointments no longer occupy their slot.
    #[inline]
    pub const fn occupies_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// Whether staff may move an appointment from `self` to `next`.
    pub const fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Scheduled, Confirmed)
                | (Scheduled, Completed)
                | (Scheduled, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
        )
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

/// A booked occupation of a resource (technician) by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Appointment {
    pub id: String,
    pub tenant_id: String,
    /// Technician occupied by this appointment.
    pub resource_id: String,
    pub client_id: String,
    /// Service performed; its duration defines the occupied interval.
    pub service_id: String,
    /// Start instant, normalised to whole minutes.
    #[ts(as = "String")]
    pub start_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Inventory
// =============================================================================

/// Direction of a manual stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Goods received from a supplier.
    Entry,
    /// Goods leaving stock outside a product sale.
    Exit,
}

impl MovementType {
    /// Sign applied to the stock balance.
    #[inline]
    pub const fn sign(&self) -> i64 {
        match self {
            MovementType::Entry => 1,
            MovementType::Exit => -1,
        }
    }
}

/// A product with its running stock balance.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub sku: Option<String>,
    /// Purchase cost per unit, used for stock movement ledger amounts.
    pub unit_cost_cents: i64,
    /// Retail price per unit, used for product sales.
    pub sale_price_cents: i64,
    /// Algebraic sum of all movements and sales. Never negative.
    pub stock_quantity: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents)
    }

    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_cents(self.sale_price_cents)
    }
}

/// A posted stock movement. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub location_id: Option<String>,
    pub reason: Option<String>,
    pub unit_cost_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A lot of a product with an optional expiry date.
///
/// Batch quantities are tracked independently of `Product::stock_quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductBatch {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub batch_number: String,
    #[ts(as = "Option<String>")]
    pub manufacturing_date: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    pub quantity: i64,
    pub location_id: Option<String>,
}

/// A counter sale of a product; primary record of the ProductSale event.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductSale {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub client_id: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Status of a sold service package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PackageSaleStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
}

/// A service package (subscription) sold to a client.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PackageSale {
    pub id: String,
    pub tenant_id: String,
    pub client_id: String,
    pub package_id: String,
    pub price_cents: i64,
    pub purchased_quantity: i64,
    /// Sessions left. Not decremented by this core.
    pub remaining_quantity: i64,
    pub status: PackageSaleStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Ledger
// =============================================================================

/// Which book a ledger entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LedgerDirection {
    /// Accounts payable (money owed by the business).
    Payable,
    /// Accounts receivable (money owed to the business).
    Receivable,
}

impl LedgerDirection {
    /// Backing table for this direction.
    pub const fn table(&self) -> &'static str {
        match self {
            LedgerDirection::Payable => "accounts_payable",
            LedgerDirection::Receivable => "accounts_receivable",
        }
    }

    /// Status an entry reaches when it is settled.
    pub const fn settled_status(&self) -> LedgerStatus {
        match self {
            LedgerDirection::Payable => LedgerStatus::Paid,
            LedgerDirection::Receivable => LedgerStatus::Received,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            LedgerDirection::Payable => "payable",
            LedgerDirection::Receivable => "receivable",
        }
    }
}

/// Ledger entry status.
///
/// `Overdue` is never stored: it is derived at read time from `due_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    #[default]
    Pending,
    Paid,
    Received,
    Overdue,
    Cancelled,
}

impl LedgerStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Pending => "pending",
            LedgerStatus::Paid => "paid",
            LedgerStatus::Received => "received",
            LedgerStatus::Overdue => "overdue",
            LedgerStatus::Cancelled => "cancelled",
        }
    }
}

/// Kind of primary record a ledger entry was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    StockMovement,
    ProductSale,
    PackageSale,
}

impl ReferenceType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::StockMovement => "stock_movement",
            ReferenceType::ProductSale => "product_sale",
            ReferenceType::PackageSale => "package_sale",
        }
    }
}

/// A payable or receivable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LedgerEntry {
    pub id: String,
    pub tenant_id: String,
    pub direction: LedgerDirection,
    pub description: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    /// Stored status (never `Overdue`; see [`LedgerEntry::effective_status`]).
    pub status: LedgerStatus,
    #[ts(as = "Option<String>")]
    pub payment_date: Option<NaiveDate>,
    pub reference_type: ReferenceType,
    pub reference_id: String,
    pub counterparty_name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Status as shown to users on `today`: pending entries past their due
    /// date read as overdue.
    pub fn effective_status(&self, today: NaiveDate) -> LedgerStatus {
        match self.status {
            LedgerStatus::Pending if self.due_date < today => LedgerStatus::Overdue,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: LedgerStatus, due: NaiveDate) -> LedgerEntry {
        LedgerEntry {
            id: "l-1".to_string(),
            tenant_id: "t-1".to_string(),
            direction: LedgerDirection::Receivable,
            description: "Venda".to_string(),
            amount_cents: 1000,
            due_date: due,
            status,
            payment_date: None,
            reference_type: ReferenceType::ProductSale,
            reference_id: "s-1".to_string(),
            counterparty_name: "Cliente".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_overdue_is_derived_from_due_date() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();

        assert_eq!(
            entry(LedgerStatus::Pending, yesterday).effective_status(today),
            LedgerStatus::Overdue
        );
        assert_eq!(
            entry(LedgerStatus::Pending, today).effective_status(today),
            LedgerStatus::Pending
        );
        assert_eq!(
            entry(LedgerStatus::Received, yesterday).effective_status(today),
            LedgerStatus::Received
        );
    }

    #[test]
    fn test_appointment_transitions() {
        use AppointmentStatus::*;
        assert!(Scheduled.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Scheduled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Scheduled.can_transition_to(Scheduled));
        assert!(!Cancelled.occupies_slot());
        assert!(Confirmed.occupies_slot());
    }

    #[test]
    fn test_settled_status_per_direction() {
        assert_eq!(LedgerDirection::Payable.settled_status(), LedgerStatus::Paid);
        assert_eq!(
            LedgerDirection::Receivable.settled_status(),
            LedgerStatus::Received
        );
    }

    #[test]
    fn test_serde_names_match_storage() {
        assert_eq!(
            serde_json::to_string(&ReferenceType::StockMovement).unwrap(),
            "\"stock_movement\""
        );
        assert_eq!(ReferenceType::PackageSale.as_str(), "package_sale");
        assert_eq!(
            serde_json::to_string(&AppointmentStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
    }
}
