//! # Cart
//!
//! In-memory staging area for one sale being assembled at a register.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Cart Operations                                    │
//! │                                                                         │
//! │  Scan / pick product ─────► add_item() ────────► push or merge line    │
//! │                                 │                                       │
//! │                                 └── live stock < requested? ✗          │
//! │                                                                         │
//! │  Change quantity ─────────► update_quantity() ─► qty ≤ 0 removes line  │
//! │                                                                         │
//! │  Cart discount ───────────► set_discount_percentage()  ┐ mutually      │
//! │                             set_discount_amount()      ┘ exclusive     │
//! │                                                                         │
//! │  Checkout / abandon ──────► clear()                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rounding
//! Each line is rounded to the cent once; the subtotal is an exact sum of
//! rounded lines, and a percentage discount is taken from that subtotal. The
//! total that gets persisted is therefore exactly [`Cart::total`].
//!
//! The cart performs no reservation: the stock check is against the product
//! snapshot handed in by the caller. The sale engine re-checks at commit.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::{round_div, DiscountRate, Money, BPS_SCALE};
use crate::types::Product;
use crate::validation::{validate_cart_size, validate_discount_bps, validate_quantity};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// Cart Line
// =============================================================================

/// A product snapshot plus a quantity.
///
/// Prices are frozen when the line is created; later catalog edits do not
/// change what this cart charges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: i64,
    pub product_name: String,
    pub barcode: Option<String>,
    pub unit_price_cents: i64,
    pub purchase_price_cents: i64,
    pub discount_bps: u32,
    pub quantity: i64,
}

impl CartLine {
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartLine {
            product_id: product.id,
            product_name: product.name.clone(),
            barcode: product.barcode.clone(),
            unit_price_cents: product.selling_price_cents,
            purchase_price_cents: product.purchase_price_cents,
            discount_bps: product.discount_bps,
            quantity,
        }
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn discount(&self) -> DiscountRate {
        DiscountRate::from_bps(self.discount_bps)
    }

    /// Quantity × unit price after the line discount, rounded to the cent.
    pub fn subtotal(&self) -> Money {
        self.unit_price().discounted_line(self.discount(), self.quantity)
    }

    /// (discounted selling price − purchase price) × quantity, rounded once.
    pub fn profit(&self) -> Money {
        let kept = BPS_SCALE - self.discount_bps as i64;
        let per_unit_scaled = self.unit_price_cents as i128 * kept as i128
            - self.purchase_price_cents as i128 * BPS_SCALE as i128;
        let cents = round_div(per_unit_scaled * self.quantity as i128, BPS_SCALE as i128);
        Money::from_cents(cents as i64)
    }
}

// =============================================================================
// Cart Discount
// =============================================================================

/// Cart-wide discount. Only one form can be active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CartDiscount {
    #[default]
    None,
    Percentage(DiscountRate),
    Amount(Money),
}

// =============================================================================
// Cart
// =============================================================================

/// The shopping cart.
///
/// ## Invariants
/// - Lines are unique by `product_id` (adding the same product merges)
/// - Every line quantity is in `1..=MAX_ITEM_QUANTITY`
/// - `discount_amount() <= subtotal()`, so `total() >= 0`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
    discount: CartDiscount,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `quantity` of `product`, merging into an existing line.
    ///
    /// ## Errors
    /// - `InsufficientStock` when the snapshot cannot cover the resulting
    ///   line quantity; the cart is left unchanged
    /// - `QuantityTooLarge` / `CartTooLarge` for the register limits
    pub fn add_item(&mut self, product: &Product, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            let new_qty = line.quantity + quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            ensure_stock(product, new_qty)?;
            line.quantity = new_qty;
            return Ok(());
        }

        ensure_stock(product, quantity)?;
        validate_cart_size(self.lines.len()).map_err(|_| CoreError::CartTooLarge {
            max: MAX_CART_ITEMS,
        })?;

        self.lines.push(CartLine::from_product(product, quantity));
        Ok(())
    }

    /// Removes the line for `product_id`.
    pub fn remove_item(&mut self, product_id: i64) -> CoreResult<()> {
        let initial_len = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);

        if self.lines.len() == initial_len {
            Err(CoreError::not_found("Cart line", product_id))
        } else {
            Ok(())
        }
    }

    /// Sets the quantity of an existing line, re-checked against `product`.
    ///
    /// A quantity of zero or less removes the line.
    pub fn update_quantity(&mut self, product: &Product, quantity: i64) -> CoreResult<()> {
        if quantity <= 0 {
            return self.remove_item(product.id);
        }

        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product.id)
            .ok_or_else(|| CoreError::not_found("Cart line", product.id))?;

        ensure_stock(product, quantity)?;
        line.quantity = quantity;
        Ok(())
    }

    /// Applies a percentage discount to the whole cart, replacing any fixed amount.
    pub fn set_discount_percentage(&mut self, rate: DiscountRate) -> CoreResult<()> {
        validate_discount_bps(rate.bps())?;
        self.discount = CartDiscount::Percentage(rate);
        Ok(())
    }

    /// Applies a fixed discount, replacing any percentage.
    ///
    /// The amount must lie in `[0, subtotal]` at the time it is set.
    pub fn set_discount_amount(&mut self, amount: Money) -> CoreResult<()> {
        if amount.is_negative() {
            return Err(CoreError::invalid_amount("discount must not be negative"));
        }

        let subtotal = self.subtotal();
        if amount > subtotal {
            return Err(CoreError::invalid_amount(format!(
                "discount {} exceeds subtotal {}",
                amount, subtotal
            )));
        }

        self.discount = CartDiscount::Amount(amount);
        Ok(())
    }

    pub fn clear_discount(&mut self) {
        self.discount = CartDiscount::None;
    }

    /// Empties the cart and drops any discount.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.discount = CartDiscount::None;
    }

    // -------------------------------------------------------------------------
    // Derived values
    // -------------------------------------------------------------------------

    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    /// The cart-level discount in money.
    ///
    /// A fixed amount is clamped to the current subtotal, so removing lines
    /// after setting it can never push the total below zero.
    pub fn discount_amount(&self) -> Money {
        match self.discount {
            CartDiscount::None => Money::zero(),
            CartDiscount::Percentage(rate) => self.subtotal().percentage(rate),
            CartDiscount::Amount(amount) => amount.min(self.subtotal()),
        }
    }

    pub fn total(&self) -> Money {
        self.subtotal() - self.discount_amount()
    }

    /// Sum of line profits. The cart-level discount is not included;
    /// see [`Cart::net_profit`].
    pub fn total_profit(&self) -> Money {
        self.lines.iter().map(CartLine::profit).sum()
    }

    /// Line profit minus the cart-level discount.
    pub fn net_profit(&self) -> Money {
        self.total_profit() - self.discount_amount()
    }

    pub fn discount(&self) -> CartDiscount {
        self.discount
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_id: i64) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    /// Number of distinct lines.
    pub fn item_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn totals(&self) -> CartTotals {
        CartTotals::from(self)
    }
}

fn ensure_stock(product: &Product, requested: i64) -> CoreResult<()> {
    if product.can_supply(requested) {
        Ok(())
    } else {
        Err(CoreError::InsufficientStock {
            product: product.name.clone(),
            available: product.stock_quantity,
            requested,
        })
    }
}

/// Cart totals summary for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub item_count: usize,
    pub total_quantity: i64,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub profit: Money,
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        CartTotals {
            item_count: cart.item_count(),
            total_quantity: cart.total_quantity(),
            subtotal: cart.subtotal(),
            discount: cart.discount_amount(),
            total: cart.total(),
            profit: cart.total_profit(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
