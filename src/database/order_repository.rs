//! Order persistence: the atomic creation boundary and the guarded status
//! updates the state machine relies on.
//!
//! `create_order` is the only write path for new orders. Bib allocation,
//! the order row, participants and add-ons all commit or roll back as one
//! unit; a failed checkout leaves no partial order and no burned numbers.

use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::database::bib_repository::{allocate_in_tx, BibRange};
use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::pricing::PricingBreakdown;

/// Order entity. Status is one of `PENDING`, `PAID`, `FAILED`; mutated only
/// through the guarded updates below, never deleted.
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub category_id: String,
    pub quantity: i32,
    pub status: String,
    pub ticket_subtotal: i64,
    pub addon_subtotal: i64,
    pub discount_amount: i64,
    pub discounted_subtotal: i64,
    pub surcharge: i64,
    pub grand_total: i64,
    pub discount_code_id: Option<Uuid>,
    pub preference_id: Option<String>,
    pub payment_id: Option<String>,
    pub processor_status: Option<String>,
    pub confirmation_sent_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Participant {
    pub id: Uuid,
    pub order_id: Uuid,
    pub full_name: String,
    pub national_id: String,
    pub birth_date: String,
    pub phone: String,
    pub email: String,
    pub city: String,
    pub state: String,
    pub tshirt_size: String,
    pub emergency_name: String,
    pub emergency_phone: String,
    pub health_info: String,
    pub bib_number: i32,
    pub group_position: Option<i32>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ParticipantAddOn {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub addon_type: String,
    pub size: Option<String>,
    pub quantity: i32,
}

/// Input for one participant row, already validated by the checkout service.
#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub full_name: String,
    pub national_id: String,
    pub birth_date: String,
    pub phone: String,
    pub email: String,
    pub city: String,
    pub state: String,
    pub tshirt_size: String,
    pub emergency_name: String,
    pub emergency_phone: String,
    pub health_info: String,
    pub addons: Vec<NewAddOn>,
}

#[derive(Debug, Clone)]
pub struct NewAddOn {
    pub addon_type: String,
    pub size: Option<String>,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub category_id: String,
    pub quantity: u32,
    /// Participants per purchased unit; `participants.len()` must be
    /// `quantity * group_size`, checked by `create_order`.
    pub group_size: u32,
    pub pricing: PricingBreakdown,
    pub discount_code_id: Option<Uuid>,
    pub participants: Vec<NewParticipant>,
}

pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an order, its participants and add-ons, and allocate bib
    /// numbers, as one transaction.
    ///
    /// One bib is allocated per purchased unit. For multi-person categories
    /// every member of a unit shares the unit's bib and gets a
    /// `group_position` of 1..group_size; single-person categories get one
    /// bib per participant and no group position.
    pub async fn create_order(&self, new: NewOrder) -> Result<Order, DatabaseError> {
        let expected = new.quantity as usize * new.group_size.max(1) as usize;
        if new.participants.len() != expected {
            return Err(DatabaseError::new(DatabaseErrorKind::InvalidInput {
                message: format!(
                    "order needs {} participants, got {}",
                    expected,
                    new.participants.len()
                ),
            }));
        }

        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let range: BibRange = allocate_in_tx(&mut tx, &new.category_id, new.quantity).await?;
        let bibs: Vec<i32> = range.numbers().collect();

        let order = sqlx::query_as::<_, Order>(
            "INSERT INTO orders
                (id, category_id, quantity, status,
                 ticket_subtotal, addon_subtotal, discount_amount,
                 discounted_subtotal, surcharge, grand_total, discount_code_id)
             VALUES ($1, $2, $3, 'PENDING', $4, $5, $6, $7, $8, $9, $10)
             RETURNING id, category_id, quantity, status,
                       ticket_subtotal, addon_subtotal, discount_amount,
                       discounted_subtotal, surcharge, grand_total,
                       discount_code_id, preference_id, payment_id,
                       processor_status, confirmation_sent_at, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&new.category_id)
        .bind(new.quantity as i32)
        .bind(new.pricing.ticket_subtotal)
        .bind(new.pricing.addon_subtotal)
        .bind(new.pricing.discount_amount)
        .bind(new.pricing.discounted_subtotal)
        .bind(new.pricing.surcharge)
        .bind(new.pricing.grand_total)
        .bind(new.discount_code_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let group_size = new.group_size.max(1) as usize;
        for (index, participant) in new.participants.iter().enumerate() {
            let bib_number = bibs[index / group_size];
            let group_position = if group_size > 1 {
                Some((index % group_size) as i32 + 1)
            } else {
                None
            };

            let (participant_id,): (Uuid,) = sqlx::query_as(
                "INSERT INTO participants
                    (id, order_id, full_name, national_id, birth_date, phone,
                     email, city, state, tshirt_size, emergency_name,
                     emergency_phone, health_info, bib_number, group_position)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                 RETURNING id",
            )
            .bind(Uuid::new_v4())
            .bind(order.id)
            .bind(&participant.full_name)
            .bind(&participant.national_id)
            .bind(&participant.birth_date)
            .bind(&participant.phone)
            .bind(&participant.email)
            .bind(&participant.city)
            .bind(&participant.state)
            .bind(&participant.tshirt_size)
            .bind(&participant.emergency_name)
            .bind(&participant.emergency_phone)
            .bind(&participant.health_info)
            .bind(bib_number)
            .bind(group_position)
            .fetch_one(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

            for addon in &participant.addons {
                sqlx::query(
                    "INSERT INTO participant_addons
                        (id, participant_id, addon_type, size, quantity)
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(Uuid::new_v4())
                .bind(participant_id)
                .bind(&addon.addon_type)
                .bind(&addon.size)
                .bind(addon.quantity.max(1))
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::from_sqlx)?;
            }
        }

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;

        info!(
            order_id = %order.id,
            category = %order.category_id,
            quantity = order.quantity,
            first_bib = range.start,
            "Order created"
        );

        Ok(order)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DatabaseError> {
        sqlx::query_as::<_, Order>(
            "SELECT id, category_id, quantity, status,
                    ticket_subtotal, addon_subtotal, discount_amount,
                    discounted_subtotal, surcharge, grand_total,
                    discount_code_id, preference_id, payment_id,
                    processor_status, confirmation_sent_at, created_at
             FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Lifecycle status only, for the payment-pending poll.
    pub async fn read_status(&self, id: Uuid) -> Result<Option<String>, DatabaseError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT status FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        Ok(row.map(|(status,)| status))
    }

    pub async fn participants_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<Participant>, DatabaseError> {
        sqlx::query_as::<_, Participant>(
            "SELECT id, order_id, full_name, national_id, birth_date, phone,
                    email, city, state, tshirt_size, emergency_name,
                    emergency_phone, health_info, bib_number, group_position
             FROM participants
             WHERE order_id = $1
             ORDER BY bib_number ASC, group_position ASC NULLS FIRST",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Record the hosted-checkout preference id returned by the processor.
    pub async fn set_preference_id(
        &self,
        id: Uuid,
        preference_id: &str,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE orders SET preference_id = $2 WHERE id = $1")
            .bind(id)
            .bind(preference_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::new(DatabaseErrorKind::NotFound {
                entity: "Order".to_string(),
                id: id.to_string(),
            }));
        }
        Ok(())
    }

    /// Guarded transition to `PAID`. Returns true only for the first caller
    /// to move this order; duplicate webhook deliveries match zero rows.
    /// The `status <> 'PAID'` predicate is the mutual-exclusion gate for the
    /// paid-side effects; there is no application-level lock.
    pub async fn transition_to_paid(
        &self,
        id: Uuid,
        payment_id: &str,
        processor_status: &str,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE orders
             SET status = 'PAID', payment_id = $2, processor_status = $3
             WHERE id = $1 AND status <> 'PAID'",
        )
        .bind(id)
        .bind(payment_id)
        .bind(processor_status)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    /// Guarded transition to `FAILED`. Only a pending order can fail; a paid
    /// order never moves backward.
    pub async fn mark_failed(
        &self,
        id: Uuid,
        payment_id: &str,
        processor_status: &str,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE orders
             SET status = 'FAILED', payment_id = $2, processor_status = $3
             WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(id)
        .bind(payment_id)
        .bind(processor_status)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    /// Audit-only update for processor statuses that map to no transition.
    pub async fn record_processor_status(
        &self,
        id: Uuid,
        payment_id: &str,
        processor_status: &str,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE orders
             SET payment_id = $2, processor_status = $3
             WHERE id = $1",
        )
        .bind(id)
        .bind(payment_id)
        .bind(processor_status)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    /// Stamp the confirmation-sent marker, at most once per order. Returns
    /// whether this call did the stamping.
    pub async fn stamp_confirmation_sent(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE orders
             SET confirmation_sent_at = NOW()
             WHERE id = $1 AND confirmation_sent_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}
