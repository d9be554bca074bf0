//! # Register Session
//!
//! One cashier's working cart at one register. Products are always re-read
//! from the catalog before they enter the cart, so prices and stock checks use
//! current values; the cart then snapshots them until checkout.
//!
//! ```text
//!   scan ──► add_by_barcode ─┐
//!   key  ──► add_by_id ──────┼──► Cart ──► checkout ──► SaleReceipt
//!   edit ──► update_quantity ┘               │
//!                                            └─ failure: cart kept as is
//! ```

use tracing::debug;

use crate::error::PosResult;
use crate::orchestrator::{CheckoutRequest, PointOfSale, SaleReceipt};
use minimart_core::{Cart, CartTotals, DiscountRate, Money, PaymentMethod};

pub struct RegisterSession<'a> {
    pos: &'a PointOfSale,
    cashier_id: i64,
    cart: Cart,
}

impl<'a> RegisterSession<'a> {
    pub fn new(pos: &'a PointOfSale, cashier_id: i64) -> Self {
        RegisterSession {
            pos,
            cashier_id,
            cart: Cart::new(),
        }
    }

    pub fn cashier_id(&self) -> i64 {
        self.cashier_id
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn totals(&self) -> CartTotals {
        self.cart.totals()
    }

    /// Scans one or more units of an active product into the cart.
    pub async fn add_by_barcode(&mut self, barcode: &str, quantity: i64) -> PosResult<CartTotals> {
        let product = self.pos.product_by_barcode(barcode).await?;
        self.cart.add_item(&product, quantity)?;
        debug!(product_id = product.id, quantity, "Scanned into cart");
        Ok(self.cart.totals())
    }

    pub async fn add_by_id(&mut self, product_id: i64, quantity: i64) -> PosResult<CartTotals> {
        let product = self.pos.product(product_id).await?;
        self.cart.add_item(&product, quantity)?;
        debug!(product_id, quantity, "Added to cart");
        Ok(self.cart.totals())
    }

    /// Sets a line's quantity. Zero or less removes the line.
    pub async fn update_quantity(&mut self, product_id: i64, quantity: i64) -> PosResult<CartTotals> {
        if quantity <= 0 {
            self.cart.remove_item(product_id)?;
        } else {
            let product = self.pos.product(product_id).await?;
            self.cart.update_quantity(&product, quantity)?;
        }
        Ok(self.cart.totals())
    }

    pub fn remove_item(&mut self, product_id: i64) -> PosResult<CartTotals> {
        self.cart.remove_item(product_id)?;
        Ok(self.cart.totals())
    }

    pub fn set_discount_percentage(&mut self, rate: DiscountRate) -> PosResult<CartTotals> {
        self.cart.set_discount_percentage(rate)?;
        Ok(self.cart.totals())
    }

    pub fn set_discount_amount(&mut self, amount: Money) -> PosResult<CartTotals> {
        self.cart.set_discount_amount(amount)?;
        Ok(self.cart.totals())
    }

    pub fn clear_discount(&mut self) -> CartTotals {
        self.cart.clear_discount();
        self.cart.totals()
    }

    /// Completes the sale. On success the cart is empty and ready for the
    /// next customer; on failure it is left untouched.
    pub async fn checkout(
        &mut self,
        payment_method: PaymentMethod,
        amount_paid: Option<Money>,
        customer_id: Option<i64>,
    ) -> PosResult<SaleReceipt> {
        let request = CheckoutRequest {
            cashier_id: self.cashier_id,
            payment_method,
            amount_paid,
            customer_id,
        };
        self.pos.complete_sale(&mut self.cart, &request).await
    }

    /// Drops everything in the cart without writing anything.
    pub fn abandon(&mut self) {
        if !self.cart.is_empty() {
            debug!(
                cashier_id = self.cashier_id,
                lines = self.cart.item_count(),
                "Cart abandoned"
            );
        }
        self.cart.clear();
    }
}
