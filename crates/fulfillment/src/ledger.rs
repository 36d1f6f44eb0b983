//! Ledger-backed stock movements.
//!
//! Every change to an ingredient's quantity goes through [`StockLedger`] and is
//! paired with a ledger entry in the same transaction, so the summed ledger of
//! an ingredient always equals its current quantity.

use std::collections::BTreeSet;

use common::{IngredientId, OrderId, StaffId};
use domain::{Ingredient, InventoryError, LedgerEntry, LedgerReason, NewIngredient, NewLedgerEntry};
use rust_decimal::Decimal;
use serde::Serialize;
use store::StoreTx;

use crate::error::{FulfillmentError, Result};

/// Who and what a deduction is recorded against.
#[derive(Debug, Clone, Copy)]
pub struct DeductionContext {
    pub order_id: Option<OrderId>,
    pub actor: StaffId,
    pub reason: LedgerReason,
}

impl DeductionContext {
    /// Context for stock consumed by an order.
    pub fn order_usage(order_id: OrderId, actor: StaffId) -> Self {
        Self {
            order_id: Some(order_id),
            actor,
            reason: LedgerReason::OrderUsage,
        }
    }
}

/// Result of comparing an ingredient's quantity with its ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub ingredient_id: IngredientId,
    #[serde(with = "rust_decimal::serde::float")]
    pub current: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub ledger_sum: Decimal,
    pub balanced: bool,
}

/// Stock operations. All of them run inside the caller's transaction.
pub struct StockLedger;

fn not_found(id: IngredientId) -> FulfillmentError {
    FulfillmentError::NotFound(format!("Ingredient {id} not found."))
}

impl StockLedger {
    /// Current quantity of an ingredient, read without locking.
    pub async fn current_quantity<T: StoreTx>(tx: &mut T, id: IngredientId) -> Result<Decimal> {
        tx.ingredient(id)
            .await?
            .map(|i| i.quantity)
            .ok_or_else(|| not_found(id))
    }

    /// Locks a set of ingredients in ascending id order.
    ///
    /// Every writer takes its locks in the same order and before its first
    /// deduction, so two transactions can never wait on each other in a cycle.
    pub async fn lock<T: StoreTx>(
        tx: &mut T,
        ids: impl IntoIterator<Item = IngredientId>,
    ) -> Result<Vec<Ingredient>> {
        let ordered: BTreeSet<IngredientId> = ids.into_iter().collect();
        let mut locked = Vec::with_capacity(ordered.len());
        for id in ordered {
            let ingredient = tx.lock_ingredient(id).await?.ok_or_else(|| not_found(id))?;
            locked.push(ingredient);
        }
        Ok(locked)
    }

    /// Deducts `amount` if the ingredient holds at least that much.
    ///
    /// On a shortfall nothing is written and the error reports what was
    /// required and what is available.
    #[tracing::instrument(skip(tx, context), fields(reason = %context.reason))]
    pub async fn reserve_and_deduct<T: StoreTx>(
        tx: &mut T,
        id: IngredientId,
        amount: Decimal,
        context: &DeductionContext,
    ) -> Result<LedgerEntry> {
        if amount <= Decimal::ZERO {
            return Err(InventoryError::NonPositiveDeduction(amount).into());
        }

        let ingredient = tx.lock_ingredient(id).await?.ok_or_else(|| not_found(id))?;
        if ingredient.quantity < amount {
            return Err(FulfillmentError::InsufficientStock {
                ingredient_id: id,
                ingredient: ingredient.name,
                product: None,
                required: amount,
                available: ingredient.quantity,
            });
        }

        tx.update_ingredient_quantity(id, ingredient.quantity - amount)
            .await?;
        let entry = tx
            .append_ledger_entry(NewLedgerEntry {
                ingredient_id: id,
                quantity_change: -amount,
                reason: context.reason,
                user_id: context.actor,
                order_id: context.order_id,
            })
            .await?;

        metrics::counter!("inventory_ledger_entries_total", "reason" => context.reason.as_str())
            .increment(1);
        Ok(entry)
    }

    /// Records a manual purchase, waste or correction.
    #[tracing::instrument(skip(tx))]
    pub async fn adjust<T: StoreTx>(
        tx: &mut T,
        id: IngredientId,
        change: Decimal,
        reason: LedgerReason,
        actor: StaffId,
    ) -> Result<LedgerEntry> {
        if !reason.is_manual() {
            return Err(InventoryError::ReasonNotManual(reason).into());
        }
        if change.is_zero() {
            return Err(InventoryError::ZeroChange.into());
        }

        let ingredient = tx.lock_ingredient(id).await?.ok_or_else(|| not_found(id))?;
        let updated = ingredient.quantity + change;
        if updated < Decimal::ZERO {
            return Err(FulfillmentError::InsufficientStock {
                ingredient_id: id,
                ingredient: ingredient.name,
                product: None,
                required: -change,
                available: ingredient.quantity,
            });
        }

        tx.update_ingredient_quantity(id, updated).await?;
        let entry = tx
            .append_ledger_entry(NewLedgerEntry {
                ingredient_id: id,
                quantity_change: change,
                reason,
                user_id: actor,
                order_id: None,
            })
            .await?;

        metrics::counter!("inventory_ledger_entries_total", "reason" => reason.as_str())
            .increment(1);
        tracing::info!(ingredient = %ingredient.name, %change, %updated, "stock adjusted");
        Ok(entry)
    }

    /// Registers an ingredient and records its opening balance.
    pub async fn register_ingredient<T: StoreTx>(
        tx: &mut T,
        ingredient: &NewIngredient,
        actor: StaffId,
    ) -> Result<Ingredient> {
        if ingredient.name.trim().is_empty() {
            return Err(FulfillmentError::Validation(
                "Ingredient name is required.".to_string(),
            ));
        }
        if ingredient.initial_quantity < Decimal::ZERO || ingredient.threshold < Decimal::ZERO {
            return Err(FulfillmentError::Validation(format!(
                "Quantity and threshold of {} must not be negative.",
                ingredient.name
            )));
        }

        let created = tx.insert_ingredient(ingredient).await?;
        tx.append_ledger_entry(NewLedgerEntry {
            ingredient_id: created.id,
            quantity_change: ingredient.initial_quantity,
            reason: LedgerReason::InitialStock,
            user_id: actor,
            order_id: None,
        })
        .await?;

        metrics::counter!(
            "inventory_ledger_entries_total",
            "reason" => LedgerReason::InitialStock.as_str()
        )
        .increment(1);
        Ok(created)
    }

    /// Soft-disables an ingredient. Its history stays in the ledger.
    pub async fn deactivate<T: StoreTx>(tx: &mut T, id: IngredientId) -> Result<Ingredient> {
        let mut ingredient = tx.lock_ingredient(id).await?.ok_or_else(|| not_found(id))?;
        tx.update_ingredient_active(id, false).await?;
        ingredient.active = false;
        Ok(ingredient)
    }

    /// Ledger entries of an ingredient, newest first.
    pub async fn history<T: StoreTx>(
        tx: &mut T,
        id: IngredientId,
        limit: Option<usize>,
    ) -> Result<Vec<LedgerEntry>> {
        if tx.ingredient(id).await?.is_none() {
            return Err(not_found(id));
        }
        Ok(tx.ledger_entries(id, limit).await?)
    }

    /// Checks that the ledger of an ingredient sums to its current quantity.
    pub async fn reconcile<T: StoreTx>(tx: &mut T, id: IngredientId) -> Result<Reconciliation> {
        let current = Self::current_quantity(tx, id).await?;
        let ledger_sum = tx.ledger_sum(id).await?;
        let reconciliation = Reconciliation {
            ingredient_id: id,
            current,
            ledger_sum,
            balanced: current == ledger_sum,
        };
        if !reconciliation.balanced {
            tracing::error!(
                ingredient_id = %id,
                %current,
                %ledger_sum,
                "ingredient quantity does not match its ledger"
            );
        }
        Ok(reconciliation)
    }

    /// Active ingredients at or below their reorder threshold, by name.
    pub async fn low_stock<T: StoreTx>(tx: &mut T) -> Result<Vec<Ingredient>> {
        Ok(tx.low_stock_ingredients().await?)
    }
}
