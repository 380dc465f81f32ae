//! Discount-code lookups and the atomic usage counter.

use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::error::DatabaseError;
use crate::pricing::{DiscountKind, DiscountTerms};

/// Discount code entity. `kind` is `PERCENT` or `FIXED`; `magnitude` is a
/// percentage (0-100) or a fixed amount in minor units respectively.
#[derive(Debug, Clone, FromRow)]
pub struct DiscountCode {
    pub id: Uuid,
    pub code: String,
    pub kind: String,
    pub magnitude: i64,
    pub active: bool,
    pub starts_at: Option<chrono::DateTime<chrono::Utc>>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub category_id: Option<String>,
    pub min_subtotal: Option<i64>,
    pub max_uses: Option<i32>,
    pub used_count: i32,
}

impl DiscountCode {
    /// Pricing-engine view of this record.
    pub fn terms(&self) -> DiscountTerms {
        DiscountTerms {
            code: self.code.clone(),
            kind: match self.kind.as_str() {
                "FIXED" => DiscountKind::Fixed,
                _ => DiscountKind::Percent,
            },
            magnitude: self.magnitude,
            active: self.active,
            starts_at: self.starts_at,
            expires_at: self.expires_at,
            category_id: self.category_id.clone(),
            min_subtotal: self.min_subtotal,
            max_uses: self.max_uses,
            used_count: self.used_count,
        }
    }
}

/// Codes are stored upper-cased; user input is normalized before lookup.
pub fn normalize_code(code: &str) -> Option<String> {
    let normalized = code.trim().to_uppercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

pub struct DiscountRepository {
    pool: PgPool,
}

impl DiscountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<DiscountCode>, DatabaseError> {
        let Some(normalized) = normalize_code(code) else {
            return Ok(None);
        };

        sqlx::query_as::<_, DiscountCode>(
            "SELECT id, code, kind, magnitude, active, starts_at, expires_at,
                    category_id, min_subtotal, max_uses, used_count
             FROM discount_codes
             WHERE code = $1",
        )
        .bind(normalized)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Atomically bump the usage counter. Guarded against the cap so a
    /// counter can never overshoot `max_uses`; returns whether a row was
    /// actually incremented.
    pub async fn increment_usage(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE discount_codes
             SET used_count = used_count + 1
             WHERE id = $1 AND (max_uses IS NULL OR used_count < max_uses)",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_normalization() {
        assert_eq!(normalize_code("  race10 "), Some("RACE10".to_string()));
        assert_eq!(normalize_code("RACE10"), Some("RACE10".to_string()));
        assert_eq!(normalize_code("   "), None);
        assert_eq!(normalize_code(""), None);
    }

    #[test]
    fn terms_conversion_maps_kind() {
        let row = DiscountCode {
            id: Uuid::new_v4(),
            code: "BOX10".to_string(),
            kind: "FIXED".to_string(),
            magnitude: 1_000,
            active: true,
            starts_at: None,
            expires_at: None,
            category_id: None,
            min_subtotal: None,
            max_uses: Some(50),
            used_count: 3,
        };
        let terms = row.terms();
        assert_eq!(terms.kind, DiscountKind::Fixed);
        assert_eq!(terms.max_uses, Some(50));
    }
}
