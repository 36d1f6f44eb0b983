//! Stock queries and manual adjustments, one transaction per call.

use common::{IngredientId, StaffId};
use domain::{Ingredient, LedgerEntry, LedgerReason};
use rust_decimal::Decimal;
use store::{Store, StoreTx};

use crate::error::Result;
use crate::ledger::{Reconciliation, StockLedger};

/// Transactional front for [`StockLedger`].
#[derive(Clone)]
pub struct InventoryService<S: Store> {
    store: S,
}

impl<S: Store> InventoryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Records a purchase, waste or correction and commits it.
    #[tracing::instrument(skip(self))]
    pub async fn adjust(
        &self,
        ingredient_id: IngredientId,
        change: Decimal,
        reason: LedgerReason,
        actor: StaffId,
    ) -> Result<LedgerEntry> {
        let mut tx = self.store.begin().await?;
        let entry = StockLedger::adjust(&mut tx, ingredient_id, change, reason, actor).await?;
        tx.commit().await?;
        Ok(entry)
    }

    pub async fn low_stock(&self) -> Result<Vec<Ingredient>> {
        let mut tx = self.store.begin().await?;
        let low = StockLedger::low_stock(&mut tx).await?;
        tx.rollback().await?;
        Ok(low)
    }

    pub async fn history(
        &self,
        ingredient_id: IngredientId,
        limit: Option<usize>,
    ) -> Result<Vec<LedgerEntry>> {
        let mut tx = self.store.begin().await?;
        let entries = StockLedger::history(&mut tx, ingredient_id, limit).await?;
        tx.rollback().await?;
        Ok(entries)
    }

    pub async fn reconcile(&self, ingredient_id: IngredientId) -> Result<Reconciliation> {
        let mut tx = self.store.begin().await?;
        let reconciliation = StockLedger::reconcile(&mut tx, ingredient_id).await?;
        tx.rollback().await?;
        Ok(reconciliation)
    }
}
