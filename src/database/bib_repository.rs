//! Identifier Allocator: contiguous bib-number ranges per category.
//!
//! Each category owns a disjoint numbering band (see `catalog::bib_band_for`)
//! so a bib number visually identifies its category. Allocation runs inside
//! the caller's order-creation transaction: a rolled-back order burns no
//! numbers.

use sqlx::{PgPool, Postgres, Transaction};

use crate::catalog::bib_band_for;
use crate::database::error::DatabaseError;

/// A contiguous, exclusively-owned range of bib numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BibRange {
    pub start: i32,
    pub count: u32,
}

impl BibRange {
    pub const EMPTY: BibRange = BibRange { start: 0, count: 0 };

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn numbers(&self) -> impl Iterator<Item = i32> + '_ {
        (0..self.count as i32).map(move |offset| self.start + offset)
    }
}

/// Allocate `quantity` contiguous bib numbers for a category, inside an open
/// transaction.
///
/// The first-ever allocation for a category seeds its counter at the band
/// offset with an upsert that no-ops when the row already exists, so two
/// concurrent initializers cannot race. The allocation itself is a single
/// atomic read-modify-write; concurrent callers always receive disjoint
/// ranges.
pub async fn allocate_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    category_id: &str,
    quantity: u32,
) -> Result<BibRange, DatabaseError> {
    if quantity == 0 {
        return Ok(BibRange::EMPTY);
    }

    let band = bib_band_for(category_id);

    sqlx::query(
        "INSERT INTO bib_counters (category_id, next_number)
         VALUES ($1, $2)
         ON CONFLICT (category_id) DO NOTHING",
    )
    .bind(category_id)
    .bind(band)
    .execute(&mut **tx)
    .await
    .map_err(DatabaseError::from_sqlx)?;

    let (next_number,): (i32,) = sqlx::query_as(
        "UPDATE bib_counters
         SET next_number = next_number + $2
         WHERE category_id = $1
         RETURNING next_number",
    )
    .bind(category_id)
    .bind(quantity as i32)
    .fetch_one(&mut **tx)
    .await
    .map_err(DatabaseError::from_sqlx)?;

    Ok(BibRange {
        start: next_number - quantity as i32,
        count: quantity,
    })
}

/// Standalone allocation in its own transaction. Only used by operational
/// tooling; order creation goes through [`allocate_in_tx`].
pub async fn allocate(
    pool: &PgPool,
    category_id: &str,
    quantity: u32,
) -> Result<BibRange, DatabaseError> {
    let mut tx = pool.begin().await.map_err(DatabaseError::from_sqlx)?;
    let range = allocate_in_tx(&mut tx, category_id, quantity).await?;
    tx.commit().await.map_err(DatabaseError::from_sqlx)?;
    Ok(range)
}
