//! End-to-end pricing scenarios against the public catalog.

use chrono::{DateTime, TimeZone, Utc};

use titanrace_backend::catalog::{category_by_id, CATEGORIES};
use titanrace_backend::pricing::{
    price_order, AddOnSelection, DiscountKind, DiscountRejection, DiscountTerms, PricingError,
    SettlementPath, SurchargeSchedule,
};

const SCHEDULE: SurchargeSchedule = SurchargeSchedule {
    rate_bps: 399,
    fixed_fee: 39,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn code(kind: DiscountKind, magnitude: i64) -> DiscountTerms {
    DiscountTerms {
        code: "TEST".to_string(),
        kind,
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
fn teams_order_without_discount() {
    let teams = category_by_id("teams").unwrap();
    let breakdown = price_order(
        teams,
        1,
        &[&[], &[], &[], &[]],
        None,
        now(),
        SettlementPath::Offline,
        SCHEDULE,
    )
    .unwrap();

    assert_eq!(breakdown.ticket_subtotal, 66_000);
    assert_eq!(breakdown.discount_amount, 0);
    assert_eq!(breakdown.surcharge, 0);
    assert_eq!(breakdown.grand_total, 66_000);
}

#[test]
fn pairs_order_with_ten_percent_discount_and_surcharge() {
    let pairs = category_by_id("pairs").unwrap();
    let breakdown = price_order(
        pairs,
        1,
        &[&[], &[]],
        Some(&code(DiscountKind::Percent, 10)),
        now(),
        SettlementPath::OnlineCheckout,
        SCHEDULE,
    )
    .unwrap();

    assert_eq!(breakdown.ticket_subtotal, 34_000);
    assert_eq!(breakdown.discount_amount, 3_400);
    assert_eq!(breakdown.discounted_subtotal, 30_600);
    // gross = round((30600 + 39) * 10000 / 9601)
    assert_eq!(breakdown.grand_total, 31_912);
    assert_eq!(
        breakdown.grand_total,
        breakdown.discounted_subtotal + breakdown.surcharge
    );
}

#[test]
fn addons_are_never_discounted() {
    let fun = category_by_id("fun").unwrap();
    let shirt = AddOnSelection {
        addon_type: "shirt".to_string(),
        size: Some("M".to_string()),
        quantity: 1,
    };
    let breakdown = price_order(
        fun,
        1,
        &[std::slice::from_ref(&shirt)],
        Some(&code(DiscountKind::Percent, 100)),
        now(),
        SettlementPath::Offline,
        SCHEDULE,
    )
    .unwrap();

    assert_eq!(breakdown.ticket_subtotal, 16_500);
    assert_eq!(breakdown.discount_amount, 16_500);
    assert_eq!(breakdown.addon_subtotal, 5_900);
    assert_eq!(breakdown.grand_total, 5_900);
}

#[test]
fn fixed_discount_is_clamped_to_ticket_subtotal() {
    let kids = category_by_id("kids").unwrap();
    let breakdown = price_order(
        kids,
        1,
        &[&[]],
        Some(&code(DiscountKind::Fixed, 1_000_000)),
        now(),
        SettlementPath::Offline,
        SCHEDULE,
    );

    // Discount clamps to the full ticket subtotal, leaving nothing payable.
    assert!(matches!(breakdown, Err(PricingError::ZeroAmount)));
}

#[test]
fn expired_code_is_rejected_before_pricing() {
    let fun = category_by_id("fun").unwrap();
    let mut terms = code(DiscountKind::Percent, 10);
    terms.expires_at = Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());

    let result = price_order(
        fun,
        1,
        &[&[]],
        Some(&terms),
        now(),
        SettlementPath::Offline,
        SCHEDULE,
    );
    assert!(matches!(
        result,
        Err(PricingError::Discount(DiscountRejection::Expired))
    ));
}

#[test]
fn surcharge_round_trips_within_one_minor_unit() {
    // The processor deducts rate + fixed fee from the gross; the merchant
    // must net at least the discounted subtotal, overshooting by at most 1.
    for category in CATEGORIES {
        for quantity in 1..=3u32 {
            let net = category.base_price * i64::from(quantity);
            let gross = SCHEDULE.gross_for_net(net);
            let kept = gross - (gross * SCHEDULE.rate_bps + 5_000) / 10_000 - SCHEDULE.fixed_fee;
            assert!(
                (kept - net).abs() <= 1,
                "category {} qty {}: net {} gross {} kept {}",
                category.id,
                quantity,
                net,
                gross,
                kept
            );
        }
    }
}

#[test]
fn breakdown_identity_holds_across_catalog() {
    for category in CATEGORIES {
        let participants: Vec<&[AddOnSelection]> =
            vec![&[]; category.group_size as usize];
        let breakdown = price_order(
            category,
            1,
            &participants,
            Some(&code(DiscountKind::Percent, 15)),
            now(),
            SettlementPath::OnlineCheckout,
            SCHEDULE,
        )
        .unwrap();

        assert!(breakdown.discount_amount >= 0);
        assert!(breakdown.discount_amount <= breakdown.ticket_subtotal);
        assert_eq!(
            breakdown.grand_total,
            breakdown.ticket_subtotal - breakdown.discount_amount
                + breakdown.addon_subtotal
                + breakdown.surcharge
        );
    }
}
