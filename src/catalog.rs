//! Static event catalog: participation categories and add-on products.
//!
//! Categories and add-on prices are fixed per event edition and loaded from
//! code, not the database. All prices are integer minor-currency units.

/// A purchasable participation tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub id: &'static str,
    pub name: &'static str,
    /// Price per purchased unit, in minor units.
    pub base_price: i64,
    /// Participants bundled into one purchased unit (1, 2 or 4).
    pub group_size: u32,
    /// Starting offset of this category's bib-number band.
    pub bib_band: i32,
}

pub const CATEGORIES: &[Category] = &[
    Category {
        id: "kids",
        name: "Kids",
        base_price: 8_000,
        group_size: 1,
        bib_band: 0,
    },
    Category {
        id: "fun",
        name: "Fun Run",
        base_price: 16_500,
        group_size: 1,
        bib_band: 100,
    },
    Category {
        id: "competitive",
        name: "Competitive",
        base_price: 17_500,
        group_size: 1,
        bib_band: 500,
    },
    Category {
        id: "pairs",
        name: "Pairs",
        base_price: 34_000,
        group_size: 2,
        bib_band: 800,
    },
    Category {
        id: "teams",
        name: "Teams",
        base_price: 66_000,
        group_size: 4,
        bib_band: 900,
    },
];

/// Band used when a counter exists for a category id not in the catalog.
pub const FALLBACK_BIB_BAND: i32 = 1_000;

pub fn category_by_id(id: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|c| c.id == id)
}

pub fn bib_band_for(category_id: &str) -> i32 {
    category_by_id(category_id)
        .map(|c| c.bib_band)
        .unwrap_or(FALLBACK_BIB_BAND)
}

/// An optional product attached to a single participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOnProduct {
    pub id: &'static str,
    pub name: &'static str,
    pub price: i64,
    pub sizes: &'static [&'static str],
}

pub const ADD_ONS: &[AddOnProduct] = &[
    AddOnProduct {
        id: "shirt",
        name: "Official race shirt",
        price: 5_900,
        sizes: &["XS", "S", "M", "L", "XL"],
    },
    AddOnProduct {
        id: "gloves",
        name: "Grip gloves",
        price: 3_000,
        sizes: &["S", "M", "L"],
    },
    AddOnProduct {
        id: "socks",
        name: "Race socks",
        price: 2_500,
        sizes: &["S", "M", "L"],
    },
];

pub fn addon_by_id(id: &str) -> Option<&'static AddOnProduct> {
    ADD_ONS.iter().find(|a| a.id == id)
}

/// Catalog price for an add-on type. Unknown types price to zero.
pub fn addon_price(id: &str) -> i64 {
    addon_by_id(id).map(|a| a.price).unwrap_or(0)
}
