//! # Validation Module
//!
//! Input checks run at the engine boundary, before a transaction opens.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: HTTP controller (outside this workspace)                     │
//! │  └── Deserialization, auth                                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engine operation (lotkeeper-db repositories)                 │
//! │  └── THIS MODULE: quantities, costs, ids, periods                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (0 <= quantity_remaining <= quantity_initial)               │
//! │  ├── CHECK (direction IN (1, -1))                                      │
//! │  └── Append-only triggers on the ledger                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Anything rejected here surfaces as `InvalidInput` and nothing is written.

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::types::UnitCostComponents;
use crate::{MAX_MOVEMENT_QUANTITY, MAX_REFERENCE_LEN, MAX_UNIT_COST_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Master Data
// =============================================================================

/// Validates a SKU: 1-50 characters, alphanumeric plus `-` and `_`.
///
/// ```rust
/// use lotkeeper_core::validation::validate_sku;
///
/// assert!(validate_sku("COKE-330").is_ok());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "only letters, digits, '-' and '_' are allowed".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name (1-200 characters).
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Quantities
// =============================================================================

/// Validates a movement quantity (consume, open lot, destroy).
///
/// ## Flow
/// ```text
/// consume(product, qty)
///      │
///      ▼
/// validate_quantity(qty) ← THIS FUNCTION
///      │
///      ├── qty <= 0?              → MustBePositive
///      ├── qty > MAX_MOVEMENT?    → OutOfRange
///      └── OK → open transaction
/// ```
///
/// ```rust
/// use lotkeeper_core::validation::validate_quantity;
///
/// assert!(validate_quantity(7).is_ok());
/// assert!(validate_quantity(0).is_err());
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_MOVEMENT_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_MOVEMENT_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a physical count. Zero is a valid count (shelf is empty).
pub fn validate_count(qty: i64) -> ValidationResult<()> {
    if !(0..=MAX_MOVEMENT_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "physical_qty".to_string(),
            min: 0,
            max: MAX_MOVEMENT_QUANTITY,
        });
    }

    Ok(())
}

// =============================================================================
// Costs & Prices
// =============================================================================

/// Every cost component must lie in `0..=MAX_UNIT_COST_CENTS`. Zero-cost
/// lots are allowed (free samples, opening stock with unknown cost).
pub fn validate_cost_components(costs: &UnitCostComponents) -> ValidationResult<()> {
    for (field, cents) in [
        ("purchase_price", costs.purchase_price_cents),
        ("tax", costs.tax_cents),
        ("other_cost", costs.other_cost_cents),
    ] {
        if !(0..=MAX_UNIT_COST_CENTS).contains(&cents) {
            return Err(ValidationError::OutOfRange {
                field: field.to_string(),
                min: 0,
                max: MAX_UNIT_COST_CENTS,
            });
        }
    }

    Ok(())
}

/// Validates a unit sale price in cents (`0..=MAX_UNIT_COST_CENTS`).
pub fn validate_sale_price_cents(cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_UNIT_COST_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: "unit_sale_price".to_string(),
            min: 0,
            max: MAX_UNIT_COST_CENTS,
        });
    }

    Ok(())
}

// =============================================================================
// Identifiers
// =============================================================================

/// Validates a UUID string.
///
/// ```rust
/// use lotkeeper_core::validation::validate_uuid;
///
/// assert!(validate_uuid("product_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("product_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

/// Validates an opaque reference (source ref, sale id, location, actor).
pub fn validate_reference(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_REFERENCE_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_REFERENCE_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Periods
// =============================================================================

/// Start must not be after end.
pub fn validate_period(start: DateTime<Utc>, end: DateTime<Utc>) -> ValidationResult<()> {
    if start > end {
        return Err(ValidationError::InvalidRange {
            field: "period".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
