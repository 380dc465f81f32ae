//! Checkout orchestration: validate the registration form, price the order,
//! persist it atomically, and hand the buyer off to hosted checkout.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::catalog::{addon_by_id, category_by_id, Category};
use crate::config::{CheckoutConfig, ProcessorConfig};
use crate::database::discount_repository::DiscountRepository;
use crate::database::order_repository::{NewAddOn, NewOrder, NewParticipant, OrderRepository};
use crate::error::{AppError, AppResult};
use crate::pricing::{
    price_order, AddOnSelection, DiscountRejection, PricingBreakdown, SettlementPath,
    SurchargeSchedule,
};
use crate::processor::types::{BackUrls, PreferenceItem, PreferenceRequest};
use crate::processor::MercadoPagoClient;

#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantForm {
    pub full_name: String,
    pub national_id: String,
    pub birth_date: String,
    pub phone: String,
    pub email: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    pub tshirt_size: String,
    #[serde(default)]
    pub emergency_name: String,
    #[serde(default)]
    pub emergency_phone: String,
    #[serde(default)]
    pub health_info: String,
    #[serde(default)]
    pub addons: Vec<AddOnSelection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub category_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub discount_code: Option<String>,
    pub participants: Vec<ParticipantForm>,
    #[serde(default)]
    pub terms_accepted: bool,
}

/// Totals are minor currency units, same as everywhere inside the crate.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub status: String,
    pub preference_id: String,
    /// Hosted-checkout URL the buyer is redirected to.
    pub checkout_url: String,
    pub ticket_subtotal: i64,
    pub addon_subtotal: i64,
    pub discount_amount: i64,
    pub surcharge: i64,
    pub grand_total: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscountPreviewRequest {
    pub code: String,
    pub category_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscountPreviewResponse {
    pub valid: bool,
    pub discount_amount: i64,
    /// Ticket subtotal after the discount; equals the subtotal when the
    /// code is rejected.
    pub discounted_subtotal: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub struct CheckoutService {
    orders: Arc<OrderRepository>,
    discounts: Arc<DiscountRepository>,
    processor: Arc<MercadoPagoClient>,
    checkout_config: CheckoutConfig,
    processor_config: ProcessorConfig,
}

impl CheckoutService {
    pub fn new(
        orders: Arc<OrderRepository>,
        discounts: Arc<DiscountRepository>,
        processor: Arc<MercadoPagoClient>,
        checkout_config: CheckoutConfig,
        processor_config: ProcessorConfig,
    ) -> Self {
        Self {
            orders,
            discounts,
            processor,
            checkout_config,
            processor_config,
        }
    }

    fn schedule(&self) -> SurchargeSchedule {
        SurchargeSchedule {
            rate_bps: self.checkout_config.surcharge_rate_bps,
            fixed_fee: self.checkout_config.surcharge_fixed_fee,
        }
    }

    /// Full checkout: validate, price, persist, create the hosted-checkout
    /// preference, and correlate it back onto the order.
    pub async fn checkout(&self, request: CheckoutRequest) -> AppResult<CheckoutResponse> {
        let category = validate_request(&request)?;

        let discount_row = match request.discount_code.as_deref() {
            Some(code) => self.discounts.find_by_code(code).await?,
            None => None,
        };
        if request.discount_code.is_some() && discount_row.is_none() {
            return Err(AppError::from(crate::pricing::PricingError::Discount(
                DiscountRejection::UnknownCode,
            )));
        }
        let terms = discount_row.as_ref().map(|row| row.terms());

        let selections: Vec<&[AddOnSelection]> = request
            .participants
            .iter()
            .map(|p| p.addons.as_slice())
            .collect();
        let pricing = price_order(
            category,
            request.quantity,
            &selections,
            terms.as_ref(),
            Utc::now(),
            SettlementPath::OnlineCheckout,
            self.schedule(),
        )?;

        let new_order = NewOrder {
            category_id: category.id.to_string(),
            quantity: request.quantity,
            group_size: category.group_size,
            pricing,
            discount_code_id: discount_row.as_ref().map(|row| row.id),
            participants: request
                .participants
                .iter()
                .map(normalize_participant)
                .collect(),
        };
        let order = self.orders.create_order(new_order).await?;

        let preference = self
            .processor
            .create_preference(&self.preference_for(order.id, category, &pricing))
            .await?;
        self.orders
            .set_preference_id(order.id, &preference.id)
            .await?;

        info!(
            order_id = %order.id,
            preference_id = %preference.id,
            grand_total = pricing.grand_total,
            "checkout completed, awaiting payment"
        );

        Ok(CheckoutResponse {
            order_id: order.id,
            status: order.status,
            preference_id: preference.id,
            checkout_url: preference.init_point,
            ticket_subtotal: pricing.ticket_subtotal,
            addon_subtotal: pricing.addon_subtotal,
            discount_amount: pricing.discount_amount,
            surcharge: pricing.surcharge,
            grand_total: pricing.grand_total,
        })
    }

    /// Stateless discount preview for the storefront form. Rejections come
    /// back as a reason string, not an error status.
    pub async fn preview_discount(
        &self,
        request: DiscountPreviewRequest,
    ) -> AppResult<DiscountPreviewResponse> {
        let category = category_by_id(&request.category_id)
            .ok_or_else(|| AppError::validation("Unknown category"))?;
        if request.quantity == 0 {
            return Err(AppError::validation("Quantity must be at least 1"));
        }

        let row = self.discounts.find_by_code(&request.code).await?;
        Ok(preview_for(
            row.map(|r| r.terms()),
            category,
            request.quantity,
            Utc::now(),
        ))
    }

    fn preference_for(
        &self,
        order_id: Uuid,
        category: &Category,
        pricing: &PricingBreakdown,
    ) -> PreferenceRequest {
        PreferenceRequest {
            items: vec![PreferenceItem {
                id: category.id.to_string(),
                title: format!("Registration - {}", category.name),
                quantity: 1,
                unit_price: crate::processor::types::to_currency_units(pricing.grand_total),
                currency_id: "BRL".to_string(),
            }],
            external_reference: order_id.to_string(),
            back_urls: back_urls_for(&self.checkout_config.site_url, order_id),
            auto_return: "approved".to_string(),
            notification_url: self.processor_config.webhook_url.clone(),
        }
    }
}

/// Pure preview outcome for a discount lookup result.
fn preview_for(
    terms: Option<crate::pricing::DiscountTerms>,
    category: &Category,
    quantity: u32,
    now: chrono::DateTime<Utc>,
) -> DiscountPreviewResponse {
    let ticket_subtotal = category.base_price * i64::from(quantity);
    let Some(terms) = terms else {
        return DiscountPreviewResponse {
            valid: false,
            discount_amount: 0,
            discounted_subtotal: ticket_subtotal,
            reason: Some(DiscountRejection::UnknownCode.to_string()),
        };
    };

    match crate::pricing::apply_discount(&terms, category.id, ticket_subtotal, now) {
        Ok(amount) => DiscountPreviewResponse {
            valid: true,
            discount_amount: amount,
            discounted_subtotal: ticket_subtotal - amount,
            reason: None,
        },
        Err(rejection) => DiscountPreviewResponse {
            valid: false,
            discount_amount: 0,
            discounted_subtotal: ticket_subtotal,
            reason: Some(rejection.to_string()),
        },
    }
}

/// Redirect targets for the hosted checkout. Success and pending carry the
/// order id so the storefront landing page can poll the status endpoint.
fn back_urls_for(site_url: &str, order_id: Uuid) -> BackUrls {
    let site = site_url.trim_end_matches('/');
    BackUrls {
        success: format!("{}/checkout/success?orderId={}", site, order_id),
        pending: format!("{}/checkout/pending?orderId={}", site, order_id),
        failure: format!("{}/checkout/failure", site),
    }
}

/// Request validation. Returns the catalog category on success.
fn validate_request(request: &CheckoutRequest) -> Result<&'static Category, AppError> {
    let category = category_by_id(&request.category_id)
        .ok_or_else(|| AppError::validation("Unknown category"))?;
    if request.quantity == 0 {
        return Err(AppError::validation("Quantity must be at least 1"));
    }
    if !request.terms_accepted {
        return Err(AppError::validation("Terms of service must be accepted"));
    }

    let expected = request.quantity as usize * category.group_size as usize;
    if request.participants.len() != expected {
        return Err(AppError::validation(format!(
            "Expected {} participants for this category and quantity, got {}",
            expected,
            request.participants.len()
        )));
    }

    for (index, participant) in request.participants.iter().enumerate() {
        validate_participant(participant)
            .map_err(|msg| AppError::validation(format!("Participant {}: {}", index + 1, msg)))?;
    }
    Ok(category)
}

fn validate_participant(form: &ParticipantForm) -> Result<(), String> {
    if form.full_name.trim().chars().count() < 3 {
        return Err("name must have at least 3 characters".to_string());
    }
    if digits_of(&form.national_id).len() != 11 {
        return Err("national id must have 11 digits".to_string());
    }
    if digits_of(&form.phone).len() != 11 {
        return Err("phone must have 11 digits".to_string());
    }
    if !is_iso_date(&form.birth_date) {
        return Err("birth date must be YYYY-MM-DD".to_string());
    }
    if !form.email.contains('@') {
        return Err("email is invalid".to_string());
    }
    if form.tshirt_size.trim().is_empty() {
        return Err("t-shirt size is required".to_string());
    }
    Ok(())
}

fn normalize_participant(form: &ParticipantForm) -> NewParticipant {
    NewParticipant {
        full_name: form.full_name.trim().to_string(),
        national_id: digits_of(&form.national_id),
        birth_date: form.birth_date.trim().to_string(),
        phone: digits_of(&form.phone),
        email: form.email.trim().to_lowercase(),
        city: form.city.trim().to_string(),
        state: form.state.trim().to_uppercase(),
        tshirt_size: form.tshirt_size.trim().to_uppercase(),
        emergency_name: form.emergency_name.trim().to_string(),
        emergency_phone: digits_of(&form.emergency_phone),
        health_info: form.health_info.trim().to_string(),
        // Unknown add-on types price to zero and are dropped, not rejected.
        addons: form
            .addons
            .iter()
            .filter(|sel| addon_by_id(&sel.addon_type).is_some())
            .map(|sel| NewAddOn {
                addon_type: sel.addon_type.clone(),
                size: sel.size.clone(),
                quantity: sel.quantity.max(1) as i32,
            })
            .collect(),
    }
}

fn digits_of(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn is_iso_date(value: &str) -> bool {
    let value = value.trim();
    value.len() == 10
        && chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant() -> ParticipantForm {
        ParticipantForm {
            full_name: "Ana Souza".to_string(),
            national_id: "123.456.789-01".to_string(),
            birth_date: "1990-05-14".to_string(),
            phone: "(11) 98765-4321".to_string(),
            email: "Ana@Example.com".to_string(),
            city: "São Paulo".to_string(),
            state: "sp".to_string(),
            tshirt_size: "m".to_string(),
            emergency_name: "Bruno Souza".to_string(),
            emergency_phone: "(11) 91234-5678".to_string(),
            health_info: String::new(),
            addons: vec![],
        }
    }

    fn request(quantity: u32, participants: usize) -> CheckoutRequest {
        CheckoutRequest {
            category_id: "fun".to_string(),
            quantity,
            discount_code: None,
            participants: (0..participants).map(|_| participant()).collect(),
            terms_accepted: true,
        }
    }

    #[test]
    fn accepts_well_formed_request() {
        assert!(validate_request(&request(2, 2)).is_ok());
    }

    #[test]
    fn rejects_participant_count_mismatch() {
        assert!(validate_request(&request(2, 1)).is_err());
    }

    #[test]
    fn pairs_category_needs_two_per_unit() {
        let mut req = request(1, 2);
        req.category_id = "pairs".to_string();
        assert!(validate_request(&req).is_ok());
        req.participants.pop();
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn rejects_unaccepted_terms() {
        let mut req = request(1, 1);
        req.terms_accepted = false;
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn rejects_bad_national_id_and_phone() {
        let mut req = request(1, 1);
        req.participants[0].national_id = "1234".to_string();
        assert!(validate_request(&req).is_err());

        let mut req = request(1, 1);
        req.participants[0].phone = "555".to_string();
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn rejects_malformed_birth_date() {
        let mut req = request(1, 1);
        req.participants[0].birth_date = "14/05/1990".to_string();
        assert!(validate_request(&req).is_err());

        let mut req = request(1, 1);
        req.participants[0].birth_date = "1990-13-40".to_string();
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn unknown_addon_is_accepted_and_dropped() {
        let mut req = request(1, 1);
        req.participants[0].addons.push(AddOnSelection {
            addon_type: "cap".to_string(),
            size: None,
            quantity: 1,
        });
        req.participants[0].addons.push(AddOnSelection {
            addon_type: "socks".to_string(),
            size: Some("M".to_string()),
            quantity: 1,
        });
        assert!(validate_request(&req).is_ok());

        let normalized = normalize_participant(&req.participants[0]);
        assert_eq!(normalized.addons.len(), 1);
        assert_eq!(normalized.addons[0].addon_type, "socks");
    }

    fn percent_terms(magnitude: i64) -> crate::pricing::DiscountTerms {
        crate::pricing::DiscountTerms {
            code: "RACE10".to_string(),
            kind: crate::pricing::DiscountKind::Percent,
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
    fn preview_reports_discounted_subtotal() {
        let category = category_by_id("pairs").unwrap();
        let preview = preview_for(Some(percent_terms(10)), category, 1, Utc::now());
        assert!(preview.valid);
        assert_eq!(preview.discount_amount, 3_400);
        assert_eq!(preview.discounted_subtotal, 30_600);
        assert!(preview.reason.is_none());
    }

    #[test]
    fn rejected_preview_keeps_full_subtotal() {
        let category = category_by_id("fun").unwrap();
        let mut terms = percent_terms(10);
        terms.active = false;
        let preview = preview_for(Some(terms), category, 2, Utc::now());
        assert!(!preview.valid);
        assert_eq!(preview.discount_amount, 0);
        assert_eq!(preview.discounted_subtotal, 33_000);
        assert!(preview.reason.is_some());

        let unknown = preview_for(None, category, 2, Utc::now());
        assert!(!unknown.valid);
        assert_eq!(unknown.discounted_subtotal, 33_000);
    }

    #[test]
    fn back_urls_carry_the_order_id() {
        let order_id = Uuid::new_v4();
        let urls = back_urls_for("https://titanrace.example/", order_id);
        assert_eq!(
            urls.success,
            format!("https://titanrace.example/checkout/success?orderId={}", order_id)
        );
        assert_eq!(
            urls.pending,
            format!("https://titanrace.example/checkout/pending?orderId={}", order_id)
        );
        assert_eq!(urls.failure, "https://titanrace.example/checkout/failure");
    }

    #[test]
    fn normalization_strips_formatting() {
        let normalized = normalize_participant(&participant());
        assert_eq!(normalized.national_id, "12345678901");
        assert_eq!(normalized.phone, "11987654321");
        assert_eq!(normalized.email, "ana@example.com");
        assert_eq!(normalized.state, "SP");
        assert_eq!(normalized.tshirt_size, "M");
    }
}
