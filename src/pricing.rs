//! Pricing & Discount Engine.
//!
//! Pure computation over integer minor-currency units. The discount preview
//! endpoint and authoritative order creation both call [`price_order`] /
//! [`apply_discount`]; there is deliberately no second copy of this math
//! anywhere in the crate.
//!
//! Rounding is round-half-up throughout, done with integer arithmetic.
//! Floats never touch money.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{addon_price, Category};

/// Round-half-up division of non-negative integers.
fn div_round_half_up(numerator: i64, denominator: i64) -> i64 {
    debug_assert!(numerator >= 0 && denominator > 0);
    (2 * numerator + denominator) / (2 * denominator)
}

/// How the order will be settled. Offline settlement (cash / direct transfer
/// collected by the organizer) carries no processor surcharge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementPath {
    OnlineCheckout,
    Offline,
}

/// Processor fee schedule: percentage rate in basis points plus a fixed
/// per-transaction fee in minor units.
#[derive(Debug, Clone, Copy)]
pub struct SurchargeSchedule {
    pub rate_bps: i64,
    pub fixed_fee: i64,
}

impl SurchargeSchedule {
    /// Gross amount the customer must be charged so that, after the
    /// processor deducts `rate` and `fixed_fee` from it, the merchant nets
    /// exactly `net`. Solving `gross * (1 - r) - f = net` rather than adding
    /// the fee on top; the naive `net * (1 + r) + f` undercharges by a
    /// fraction of `r^2`.
    pub fn gross_for_net(&self, net: i64) -> i64 {
        if net <= 0 {
            return 0;
        }
        div_round_half_up((net + self.fixed_fee) * 10_000, 10_000 - self.rate_bps)
    }

    pub fn surcharge_for_net(&self, net: i64) -> i64 {
        self.gross_for_net(net).saturating_sub(net).max(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiscountKind {
    Percent,
    Fixed,
}

/// The pricing-relevant view of a discount-code record. The repository
/// entity converts into this so the engine stays free of database types.
#[derive(Debug, Clone)]
pub struct DiscountTerms {
    pub code: String,
    pub kind: DiscountKind,
    pub magnitude: i64,
    pub active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub category_id: Option<String>,
    pub min_subtotal: Option<i64>,
    pub max_uses: Option<i32>,
    pub used_count: i32,
}

/// Every distinct reason a discount code can be refused. Matched as a value,
/// never by message substring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DiscountRejection {
    #[error("Unknown discount code")]
    UnknownCode,
    #[error("This discount code is no longer active")]
    Inactive,
    #[error("This discount code is not valid yet")]
    NotYetValid,
    #[error("This discount code has expired")]
    Expired,
    #[error("This discount code does not apply to the selected category")]
    WrongCategory,
    #[error("The order subtotal is below the minimum for this discount code")]
    BelowMinimumSubtotal,
    #[error("This discount code has reached its usage limit")]
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("{0}")]
    Discount(DiscountRejection),
    #[error("Computed payable amount is zero or negative; catalog prices are misconfigured")]
    ZeroAmount,
}

impl From<DiscountRejection> for PricingError {
    fn from(r: DiscountRejection) -> Self {
        PricingError::Discount(r)
    }
}

/// One add-on selection on a participant, as submitted at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddOnSelection {
    #[serde(rename = "type")]
    pub addon_type: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub quantity: u32,
}

/// Full monetary breakdown for an order. Invariants:
/// `0 <= discount_amount <= ticket_subtotal` and
/// `grand_total = ticket_subtotal - discount_amount + addon_subtotal + surcharge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PricingBreakdown {
    pub ticket_subtotal: i64,
    pub addon_subtotal: i64,
    pub discount_amount: i64,
    pub discounted_subtotal: i64,
    pub surcharge: i64,
    pub grand_total: i64,
}

/// Validate a discount code against the order context. Checks run in a fixed
/// order so the caller always gets the most fundamental rejection first.
pub fn validate_discount(
    terms: &DiscountTerms,
    category_id: &str,
    ticket_subtotal: i64,
    now: DateTime<Utc>,
) -> Result<(), DiscountRejection> {
    if !terms.active {
        return Err(DiscountRejection::Inactive);
    }
    if let Some(starts_at) = terms.starts_at {
        if now < starts_at {
            return Err(DiscountRejection::NotYetValid);
        }
    }
    if let Some(expires_at) = terms.expires_at {
        if now > expires_at {
            return Err(DiscountRejection::Expired);
        }
    }
    if let Some(restricted) = terms.category_id.as_deref() {
        if restricted != category_id {
            return Err(DiscountRejection::WrongCategory);
        }
    }
    if let Some(min_subtotal) = terms.min_subtotal {
        // Inclusive boundary: a subtotal exactly at the minimum is accepted.
        if ticket_subtotal < min_subtotal {
            return Err(DiscountRejection::BelowMinimumSubtotal);
        }
    }
    if let Some(max_uses) = terms.max_uses {
        if terms.used_count >= max_uses {
            return Err(DiscountRejection::Exhausted);
        }
    }
    Ok(())
}

/// Discount amount for a validated code. Applies only to the ticket
/// subtotal, never to add-ons, and is clamped to `[0, ticket_subtotal]`.
pub fn discount_amount(terms: &DiscountTerms, ticket_subtotal: i64) -> i64 {
    let raw = match terms.kind {
        DiscountKind::Percent => {
            let pct = terms.magnitude.clamp(0, 100);
            div_round_half_up(ticket_subtotal * pct, 100)
        }
        DiscountKind::Fixed => terms.magnitude.max(0),
    };
    raw.clamp(0, ticket_subtotal)
}

/// Validate and compute in one step, as the preview endpoint needs.
pub fn apply_discount(
    terms: &DiscountTerms,
    category_id: &str,
    ticket_subtotal: i64,
    now: DateTime<Utc>,
) -> Result<i64, DiscountRejection> {
    validate_discount(terms, category_id, ticket_subtotal, now)?;
    Ok(discount_amount(terms, ticket_subtotal))
}

/// Sum of catalog prices for the add-ons selected across all participants.
/// Unknown types contribute zero; a zero quantity is treated as one, matching
/// the storefront's lenient form handling.
pub fn addon_subtotal(selections: &[&[AddOnSelection]]) -> i64 {
    selections
        .iter()
        .flat_map(|per_participant| per_participant.iter())
        .map(|sel| addon_price(&sel.addon_type) * i64::from(sel.quantity.max(1)))
        .sum()
}

/// Authoritative price computation for an order request.
pub fn price_order(
    category: &Category,
    quantity: u32,
    selections: &[&[AddOnSelection]],
    discount: Option<&DiscountTerms>,
    now: DateTime<Utc>,
    path: SettlementPath,
    schedule: SurchargeSchedule,
) -> Result<PricingBreakdown, PricingError> {
    let ticket_subtotal = category.base_price * i64::from(quantity);
    let addon_subtotal = addon_subtotal(selections);

    let discount_amount = match discount {
        Some(terms) => apply_discount(terms, category.id, ticket_subtotal, now)?,
        None => 0,
    };

    let discounted_subtotal = ticket_subtotal - discount_amount + addon_subtotal;
    if discounted_subtotal <= 0 {
        return Err(PricingError::ZeroAmount);
    }

    let surcharge = match path {
        SettlementPath::OnlineCheckout => schedule.surcharge_for_net(discounted_subtotal),
        SettlementPath::Offline => 0,
    };

    Ok(PricingBreakdown {
        ticket_subtotal,
        addon_subtotal,
        discount_amount,
        discounted_subtotal,
        surcharge,
        grand_total: discounted_subtotal + surcharge,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::category_by_id;
    use chrono::TimeZone;

    const SCHEDULE: SurchargeSchedule = SurchargeSchedule {
        rate_bps: 399,
        fixed_fee: 39,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn percent_code(magnitude: i64) -> DiscountTerms {
        DiscountTerms {
            code: "RACE10".to_string(),
            kind: DiscountKind::Percent,
            magnitude,
            active: true,
            starts_at: None,
            expires_at: None,
            category_id: None,
            min_subtotal: None,
            max_uses: None,
            used_count: 0,
        }
    }

    #[test]
    fn team_order_ticket_subtotal() {
        let teams = category_by_id("teams").unwrap();
        let breakdown = price_order(
            teams,
            1,
            &[],
            None,
            now(),
            SettlementPath::OnlineCheckout,
            SCHEDULE,
        )
        .unwrap();
        assert_eq!(breakdown.ticket_subtotal, 66_000);
        assert_eq!(breakdown.addon_subtotal, 0);
        assert_eq!(breakdown.discount_amount, 0);
    }

    #[test]
    fn ten_percent_discount_on_pairs() {
        let pairs = category_by_id("pairs").unwrap();
        let code = percent_code(10);
        let breakdown = price_order(
            pairs,
            1,
            &[],
            Some(&code),
            now(),
            SettlementPath::OnlineCheckout,
            SCHEDULE,
        )
        .unwrap();
        assert_eq!(breakdown.ticket_subtotal, 34_000);
        assert_eq!(breakdown.discount_amount, 3_400);
        assert_eq!(breakdown.discounted_subtotal, 30_600);
    }

    #[test]
    fn surcharge_gross_up_matches_reference_values() {
        // (30600 + 39) / (1 - 0.0399) = 31912.3 -> 31912
        let gross = SCHEDULE.gross_for_net(30_600);
        assert!((gross - 31_912).abs() <= 1, "gross was {gross}");
        assert_eq!(SCHEDULE.surcharge_for_net(30_600), gross - 30_600);
    }

    #[test]
    fn surcharge_round_trips_within_one_unit() {
        for net in [1, 39, 100, 999, 16_500, 30_600, 66_000, 1_000_000] {
            let gross = SCHEDULE.gross_for_net(net);
            let processor_cut = div_round_half_up(gross * SCHEDULE.rate_bps, 10_000);
            let merchant_nets = gross - processor_cut - SCHEDULE.fixed_fee;
            assert!(
                (merchant_nets - net).abs() <= 1,
                "net {net}: gross {gross} nets {merchant_nets}"
            );
        }
    }

    #[test]
    fn discount_never_exceeds_ticket_subtotal() {
        let kids = category_by_id("kids").unwrap();
        let mut code = percent_code(0);
        code.kind = DiscountKind::Fixed;
        code.magnitude = 1_000_000;
        let breakdown = price_order(
            kids,
            1,
            &[],
            Some(&code),
            now(),
            SettlementPath::Offline,
            SCHEDULE,
        );
        // Fully discounted tickets with no add-ons leave nothing payable.
        assert_eq!(breakdown, Err(PricingError::ZeroAmount));

        code.magnitude = 5_000;
        let breakdown = price_order(
            kids,
            1,
            &[],
            Some(&code),
            now(),
            SettlementPath::Offline,
            SCHEDULE,
        )
        .unwrap();
        assert_eq!(breakdown.discount_amount, 5_000);
        assert!(breakdown.discount_amount <= breakdown.ticket_subtotal);
    }

    #[test]
    fn percent_magnitude_is_clamped_to_0_100() {
        let code = percent_code(250);
        assert_eq!(discount_amount(&code, 10_000), 10_000);
        let code = percent_code(-5);
        assert_eq!(discount_amount(&code, 10_000), 0);
    }

    #[test]
    fn discount_does_not_apply_to_addons() {
        let fun = category_by_id("fun").unwrap();
        let shirt = [AddOnSelection {
            addon_type: "shirt".to_string(),
            size: Some("M".to_string()),
            quantity: 1,
        }];
        let code = percent_code(100);
        let breakdown = price_order(
            fun,
            1,
            &[&shirt],
            Some(&code),
            now(),
            SettlementPath::Offline,
            SCHEDULE,
        )
        .unwrap();
        // 100% off the ticket, add-on untouched.
        assert_eq!(breakdown.discount_amount, 16_500);
        assert_eq!(breakdown.addon_subtotal, 5_900);
        assert_eq!(breakdown.discounted_subtotal, 5_900);
    }

    #[test]
    fn min_subtotal_boundary_is_inclusive() {
        let mut code = percent_code(10);
        code.min_subtotal = Some(34_000);
        assert!(validate_discount(&code, "pairs", 34_000, now()).is_ok());
        assert_eq!(
            validate_discount(&code, "pairs", 33_999, now()),
            Err(DiscountRejection::BelowMinimumSubtotal)
        );
    }

    #[test]
    fn rejection_reasons_are_distinct() {
        let moment = now();
        let mut code = percent_code(10);

        code.active = false;
        assert_eq!(
            validate_discount(&code, "pairs", 34_000, moment),
            Err(DiscountRejection::Inactive)
        );

        code.active = true;
        code.starts_at = Some(moment + chrono::Duration::days(1));
        assert_eq!(
            validate_discount(&code, "pairs", 34_000, moment),
            Err(DiscountRejection::NotYetValid)
        );

        code.starts_at = None;
        code.expires_at = Some(moment - chrono::Duration::days(1));
        assert_eq!(
            validate_discount(&code, "pairs", 34_000, moment),
            Err(DiscountRejection::Expired)
        );

        code.expires_at = None;
        code.category_id = Some("teams".to_string());
        assert_eq!(
            validate_discount(&code, "pairs", 34_000, moment),
            Err(DiscountRejection::WrongCategory)
        );

        code.category_id = None;
        code.max_uses = Some(5);
        code.used_count = 5;
        assert_eq!(
            validate_discount(&code, "pairs", 34_000, moment),
            Err(DiscountRejection::Exhausted)
        );
    }

    #[test]
    fn unknown_addon_types_are_ignored() {
        let selections = [AddOnSelection {
            addon_type: "jetpack".to_string(),
            size: None,
            quantity: 3,
        }];
        assert_eq!(addon_subtotal(&[&selections]), 0);
    }

    #[test]
    fn zero_addon_quantity_counts_as_one() {
        let selections = [AddOnSelection {
            addon_type: "socks".to_string(),
            size: Some("M".to_string()),
            quantity: 0,
        }];
        assert_eq!(addon_subtotal(&[&selections]), 2_500);
    }

    #[test]
    fn offline_settlement_waives_surcharge() {
        let pairs = category_by_id("pairs").unwrap();
        let breakdown = price_order(
            pairs,
            1,
            &[],
            None,
            now(),
            SettlementPath::Offline,
            SCHEDULE,
        )
        .unwrap();
        assert_eq!(breakdown.surcharge, 0);
        assert_eq!(breakdown.grand_total, breakdown.discounted_subtotal);
    }

    #[test]
    fn breakdown_identity_holds() {
        let pairs = category_by_id("pairs").unwrap();
        let shirt = [AddOnSelection {
            addon_type: "shirt".to_string(),
            size: Some("L".to_string()),
            quantity: 2,
        }];
        let code = percent_code(10);
        let b = price_order(
            pairs,
            2,
            &[&shirt, &[]],
            Some(&code),
            now(),
            SettlementPath::OnlineCheckout,
            SCHEDULE,
        )
        .unwrap();
        assert_eq!(
            b.grand_total,
            b.ticket_subtotal - b.discount_amount + b.addon_subtotal + b.surcharge
        );
    }
}
