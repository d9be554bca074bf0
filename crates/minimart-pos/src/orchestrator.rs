//! # Sale Transaction Orchestrator
//!
//! Turns a cart into a committed sale, and reverses committed sales through
//! cancellation or partial returns.
//!
//! ## Checkout Phases
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        complete_sale(cart, request)                     │
//! │                                                                         │
//! │  Staging ──► Validating ──► Committing ──┬──► Completed                │
//! │     │            │              │        │      • cart cleared         │
//! │     │            │              │        │      • alerts published     │
//! │     └────────────┴──────────────┴────────┴──► Aborted                  │
//! │                                                 • nothing written      │
//! │                                                                         │
//! │  Committing, inside ONE transaction:                                   │
//! │    1. sale number (VNT-<stamp>-<register>[-n])                         │
//! │    2. sale header + one snapshot per line                              │
//! │    3. stock decrement per line (guarded)                               │
//! │    4. credit ledger row + balance (credit sales)                       │
//! │    5. customer statistics                                              │
//! │    commit ─ or rollback on the first error                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write Gate
//! Every operation that moves stock or credit holds `write_gate` for its whole
//! transaction. Reads never take it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::PosConfig;
use crate::credit;
use crate::error::PosResult;
use crate::inventory::{self, LowStockAlert, StockChange, StockReason};
use crate::numbering;
use minimart_core::{
    Cart, Clock, CoreError, Money, PaymentMethod, Product, Return, Sale, SaleItem, SystemClock,
    ValidationError,
};
use minimart_db::repository::{
    customer as customer_repo, returns as return_repo, sale as sale_repo,
};
use minimart_db::{Database, DbError, NewReturn, NewReturnItem, NewSale, NewSaleItem};

/// Buffered low-stock alerts per subscriber before the oldest are dropped.
const ALERT_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// Requests and Receipts
// =============================================================================

/// Per-attempt checkout state, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalePhase {
    Staging,
    Validating,
    Committing,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub cashier_id: i64,
    pub payment_method: PaymentMethod,
    /// Defaults to the sale total.
    pub amount_paid: Option<Money>,
    pub customer_id: Option<i64>,
}

impl CheckoutRequest {
    pub fn cash(cashier_id: i64, amount_paid: Money) -> Self {
        CheckoutRequest {
            cashier_id,
            payment_method: PaymentMethod::Cash,
            amount_paid: Some(amount_paid),
            customer_id: None,
        }
    }

    /// Charge the whole total to the customer's balance.
    pub fn credit(cashier_id: i64, customer_id: i64) -> Self {
        CheckoutRequest {
            cashier_id,
            payment_method: PaymentMethod::Credit,
            amount_paid: Some(Money::zero()),
            customer_id: Some(customer_id),
        }
    }

    pub fn with_customer(mut self, customer_id: i64) -> Self {
        self.customer_id = Some(customer_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub sale_id: i64,
    pub sale_number: String,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub amount_paid: Money,
    pub change: Money,
    pub payment_method: PaymentMethod,
    pub customer_id: Option<i64>,
    pub item_count: usize,
    pub created_at: DateTime<Utc>,
    pub low_stock: Vec<LowStockAlert>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelledSale {
    pub sale_id: i64,
    pub sale_number: String,
    /// One entry per line that still had units out.
    pub restored: Vec<StockChange>,
    /// Amount taken off the customer's balance.
    pub credit_reversed: Money,
    pub cancelled_at: DateTime<Utc>,
    pub low_stock: Vec<LowStockAlert>,
}

/// One product in a return request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLine {
    pub product_id: i64,
    pub quantity: i64,
}

impl ReturnLine {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        ReturnLine {
            product_id,
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnedLine {
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    /// Discounted unit price of the original line.
    pub unit_price: Money,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnReceipt {
    pub return_id: i64,
    pub return_number: String,
    pub sale_id: i64,
    pub sale_number: String,
    pub return_amount: Money,
    pub refund_method: PaymentMethod,
    pub lines: Vec<ReturnedLine>,
    pub low_stock: Vec<LowStockAlert>,
}

/// A sale line with how much of it has come back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineView {
    pub item: SaleItem,
    pub returned_quantity: i64,
}

impl SaleLineView {
    pub fn returnable(&self) -> i64 {
        self.item.quantity - self.returned_quantity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleDetails {
    pub sale: Sale,
    pub items: Vec<SaleLineView>,
    pub returns: Vec<Return>,
}

impl SaleDetails {
    pub fn total_returned(&self) -> Money {
        self.returns.iter().map(Return::return_amount).sum()
    }
}

// =============================================================================
// Point of Sale
// =============================================================================

/// The sale engine for one register.
///
/// Shared by reference between register sessions; all mutation goes through
/// `&self` behind the write gate.
pub struct PointOfSale {
    pub(crate) db: Database,
    pub(crate) clock: Arc<dyn Clock>,
    register_number: i64,
    pub(crate) write_gate: Mutex<()>,
    alerts: broadcast::Sender<LowStockAlert>,
}

impl PointOfSale {
    pub fn new(db: Database, register_number: i64) -> Self {
        Self::with_clock(db, register_number, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, register_number: i64, clock: Arc<dyn Clock>) -> Self {
        let (alerts, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);
        PointOfSale {
            db,
            clock,
            register_number,
            write_gate: Mutex::new(()),
            alerts,
        }
    }

    /// Opens the configured database and runs migrations.
    pub async fn open(config: &PosConfig) -> PosResult<Self> {
        let db = Database::new(config.db_config()?).await?;
        info!(
            register = config.register.register_number,
            store = %config.register.store_name,
            "Register ready"
        );
        Ok(Self::new(db, config.register.register_number))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn register_number(&self) -> i64 {
        self.register_number
    }

    /// Low-stock alerts published after each committed operation.
    pub fn subscribe_low_stock(&self) -> broadcast::Receiver<LowStockAlert> {
        self.alerts.subscribe()
    }

    pub(crate) fn publish(&self, alerts: &[LowStockAlert]) {
        for alert in alerts {
            // No subscribers is fine; alerts are also on the receipt.
            let _ = self.alerts.send(alert.clone());
        }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Commits the cart as a sale. The cart is cleared only on success.
    ///
    /// ## Errors
    /// - `EmptyCart`, `InsufficientPayment`, `InvalidAmount` before any write
    /// - `InsufficientStock` if a line can no longer be supplied
    /// - `NotFound` for an unknown or archived customer
    /// - `Persistence` if the store fails; nothing is kept
    pub async fn complete_sale(
        &self,
        cart: &mut Cart,
        request: &CheckoutRequest,
    ) -> PosResult<SaleReceipt> {
        let _gate = self.write_gate.lock().await;

        let result = self.checkout(cart, request).await;
        match &result {
            Ok(receipt) => {
                log_phase(SalePhase::Completed);
                info!(
                    sale_number = %receipt.sale_number,
                    total = %receipt.total,
                    method = %receipt.payment_method,
                    items = receipt.item_count,
                    "Sale completed"
                );
                cart.clear();
                self.publish(&receipt.low_stock);
            }
            Err(err) => {
                log_phase(SalePhase::Aborted);
                debug!(error = %err, "Sale aborted");
            }
        }

        result
    }

    async fn checkout(&self, cart: &Cart, request: &CheckoutRequest) -> PosResult<SaleReceipt> {
        log_phase(SalePhase::Staging);
        if cart.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let subtotal = cart.subtotal();
        let discount = cart.discount_amount();
        let total = cart.total();

        log_phase(SalePhase::Validating);
        let amount_paid = request.amount_paid.unwrap_or(total);
        if amount_paid.is_negative() {
            return Err(CoreError::invalid_amount("amount paid cannot be negative").into());
        }
        if !request.payment_method.is_credit() && amount_paid < total {
            return Err(CoreError::InsufficientPayment {
                total,
                paid: amount_paid,
            }
            .into());
        }
        let change = (amount_paid - total).non_negative();

        log_phase(SalePhase::Committing);
        let now = self.clock.now();
        let header = NewSale {
            sale_number: String::new(),
            customer_id: request.customer_id,
            cashier_id: request.cashier_id,
            subtotal_cents: subtotal.cents(),
            discount_cents: discount.cents(),
            total_cents: total.cents(),
            payment_method: request.payment_method,
            amount_paid_cents: amount_paid.cents(),
            change_cents: change.cents(),
            register_number: self.register_number,
            created_at: now,
        };

        let mut tx = self.db.begin().await?;
        let written = self.write_sale(&mut tx, cart, header, now).await;
        let (sale_id, sale_number, low_stock) =
            commit_or_rollback(tx, written, "complete_sale").await?;

        Ok(SaleReceipt {
            sale_id,
            sale_number,
            subtotal,
            discount,
            total,
            amount_paid,
            change,
            payment_method: request.payment_method,
            customer_id: request.customer_id,
            item_count: cart.item_count(),
            created_at: now,
            low_stock,
        })
    }

    async fn write_sale(
        &self,
        conn: &mut SqliteConnection,
        cart: &Cart,
        mut header: NewSale,
        now: DateTime<Utc>,
    ) -> PosResult<(i64, String, Vec<LowStockAlert>)> {
        let customer = match header.customer_id {
            Some(id) => Some(
                customer_repo::find_active(conn, id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("Customer", id))?,
            ),
            None => None,
        };

        header.sale_number = numbering::next_sale_number(conn, now, self.register_number).await?;
        let sale_id = sale_repo::insert_sale(conn, &header).await?;

        let mut low_stock = Vec::new();
        for line in cart.lines() {
            sale_repo::insert_item(
                conn,
                &NewSaleItem {
                    sale_id,
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                    barcode: line.barcode.clone(),
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price_cents,
                    discount_bps: line.discount_bps,
                    subtotal_cents: line.subtotal().cents(),
                    purchase_price_cents: line.purchase_price_cents,
                },
            )
            .await?;

            let change = inventory::decrease_stock(
                conn,
                line.product_id,
                line.quantity,
                StockReason::Sale,
                now,
            )
            .await?;
            low_stock.extend(change.low_stock);
        }

        let total = Money::from_cents(header.total_cents);
        if header.payment_method.is_credit() {
            match &customer {
                Some(customer) => {
                    credit::charge_sale(conn, customer, sale_id, total, header.cashier_id, now)
                        .await?;
                }
                None => warn!(
                    sale_number = %header.sale_number,
                    total = %total,
                    "Credit sale recorded without a customer"
                ),
            }
        }

        if let Some(customer) = &customer {
            customer_repo::record_purchase(conn, customer.id, total.cents(), now).await?;
        }

        Ok((sale_id, header.sale_number, low_stock))
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancels a completed sale and puts back everything it took.
    ///
    /// Lines already partly returned only restore what is still out, and the
    /// credit reversal skips amounts already refunded by returns.
    pub async fn cancel_sale(&self, sale_id: i64, reason: &str) -> PosResult<CancelledSale> {
        let _gate = self.write_gate.lock().await;
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        let reversed = self.reverse_sale(&mut tx, sale_id, reason.trim(), now).await;
        let cancelled = commit_or_rollback(tx, reversed, "cancel_sale").await?;

        info!(
            sale_number = %cancelled.sale_number,
            restored_lines = cancelled.restored.len(),
            credit_reversed = %cancelled.credit_reversed,
            "Sale cancelled"
        );
        self.publish(&cancelled.low_stock);

        Ok(cancelled)
    }

    async fn reverse_sale(
        &self,
        conn: &mut SqliteConnection,
        sale_id: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> PosResult<CancelledSale> {
        let sale = sale_repo::find_by_id(conn, sale_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Sale", sale_id))?;
        let already_cancelled = || CoreError::AlreadyCancelled {
            sale_number: sale.sale_number.clone(),
        };

        if !sale.is_completed() {
            return Err(already_cancelled().into());
        }
        if !sale_repo::mark_cancelled(conn, sale.id, reason, now).await? {
            return Err(already_cancelled().into());
        }

        let items = sale_repo::items_for_sale(conn, sale.id).await?;
        let returned = returned_by_line(conn, sale.id).await?;

        let mut restored = Vec::new();
        for item in &items {
            let outstanding = item.quantity - returned.get(&item.id).copied().unwrap_or(0);
            if outstanding > 0 {
                let change = inventory::increase_stock(
                    conn,
                    item.product_id,
                    outstanding,
                    StockReason::Cancellation,
                    now,
                )
                .await?;
                restored.push(change);
            }
        }

        let refunded = return_repo::total_returned_cents(conn, sale.id).await?;
        let net = Money::from_cents(sale.total_cents - refunded).non_negative();

        let mut credit_reversed = Money::zero();
        if let Some(customer_id) = sale.credit_customer() {
            if net.is_positive() {
                credit::reverse_sale(conn, customer_id, sale.id, net, sale.cashier_id, now)
                    .await?;
                credit_reversed = net;
            }
        }

        if let Some(customer_id) = sale.customer_id {
            customer_repo::reverse_purchase(conn, customer_id, net.cents(), 1, now).await?;
        }

        let low_stock = restored
            .iter()
            .filter_map(|change| change.low_stock.clone())
            .collect();

        Ok(CancelledSale {
            sale_id: sale.id,
            sale_number: sale.sale_number,
            restored,
            credit_reversed,
            cancelled_at: now,
            low_stock,
        })
    }

    // =========================================================================
    // Returns
    // =========================================================================

    /// Records a partial or full return against a completed sale.
    ///
    /// Amounts come from the original line (unit price, line discount, and a
    /// share of any cart discount), never from the current catalog.
    ///
    /// ## Errors
    /// - `NotFound` if the sale does not exist
    /// - `AlreadyCancelled` if the sale was cancelled
    /// - `ItemNotFound` for a product not on the sale
    /// - `InvalidReturnQuantity` for `quantity <= 0` or more than is still out
    pub async fn process_return(
        &self,
        sale_id: i64,
        lines: &[ReturnLine],
        processed_by: i64,
        reason: Option<&str>,
    ) -> PosResult<ReturnReceipt> {
        if lines.is_empty() {
            return Err(ValidationError::Required {
                field: "items".to_string(),
            }
            .into());
        }

        let _gate = self.write_gate.lock().await;
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        let recorded = self
            .record_return(&mut tx, sale_id, lines, processed_by, reason, now)
            .await;
        let receipt = commit_or_rollback(tx, recorded, "process_return").await?;

        info!(
            return_number = %receipt.return_number,
            sale_number = %receipt.sale_number,
            amount = %receipt.return_amount,
            "Return processed"
        );
        self.publish(&receipt.low_stock);

        Ok(receipt)
    }

    async fn record_return(
        &self,
        conn: &mut SqliteConnection,
        sale_id: i64,
        lines: &[ReturnLine],
        processed_by: i64,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> PosResult<ReturnReceipt> {
        let sale = sale_repo::find_by_id(conn, sale_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Sale", sale_id))?;
        if !sale.is_completed() {
            return Err(CoreError::AlreadyCancelled {
                sale_number: sale.sale_number,
            }
            .into());
        }

        let items = sale_repo::items_for_sale(conn, sale.id).await?;
        let returned = returned_by_line(conn, sale.id).await?;

        let find_item = |product_id: i64| {
            items
                .iter()
                .find(|item| item.product_id == product_id)
                .ok_or(CoreError::ItemNotFound {
                    sale_id: sale.id,
                    product_id,
                })
        };
        let returnable =
            |item: &SaleItem| item.quantity - returned.get(&item.id).copied().unwrap_or(0);

        // Merge repeated products, rejecting non-positive entries first.
        let mut requested: Vec<(&SaleItem, i64)> = Vec::new();
        for line in lines {
            let item = find_item(line.product_id)?;
            if line.quantity <= 0 {
                return Err(CoreError::InvalidReturnQuantity {
                    product_id: line.product_id,
                    requested: line.quantity,
                    returnable: returnable(item),
                }
                .into());
            }
            match requested.iter_mut().find(|(seen, _)| seen.id == item.id) {
                Some((_, quantity)) => *quantity += line.quantity,
                None => requested.push((item, line.quantity)),
            }
        }

        let mut returned_lines = Vec::with_capacity(requested.len());
        for &(item, quantity) in &requested {
            let available = returnable(item);
            if quantity > available {
                return Err(CoreError::InvalidReturnQuantity {
                    product_id: item.product_id,
                    requested: quantity,
                    returnable: available,
                }
                .into());
            }
            returned_lines.push(ReturnedLine {
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                quantity,
                unit_price: item.discounted_unit_price(),
                amount: sale.refund_amount(item, item.quantity - available, quantity),
            });
        }

        // Never refund more than the sale collected. The return that brings
        // back the last unit refunds the exact remainder.
        let refunded = Money::from_cents(return_repo::total_returned_cents(conn, sale.id).await?);
        let remaining = (sale.total() - refunded).non_negative();
        let settles_sale = items.iter().all(|item| {
            let now_returning = requested
                .iter()
                .find(|(seen, _)| seen.id == item.id)
                .map_or(0, |&(_, quantity)| quantity);
            returnable(item) == now_returning
        });
        let priced: Money = returned_lines.iter().map(|line| line.amount).sum();
        let target = if settles_sale { remaining } else { priced.min(remaining) };
        settle_refund(&mut returned_lines, target);
        let return_amount: Money = returned_lines.iter().map(|line| line.amount).sum();

        let return_number = numbering::next_return_number(conn, now).await?;
        let return_id = return_repo::insert_return(
            conn,
            &NewReturn {
                return_number: return_number.clone(),
                original_sale_id: sale.id,
                return_amount_cents: return_amount.cents(),
                refund_method: sale.payment_method,
                processed_by,
                reason: reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
                created_at: now,
            },
        )
        .await?;

        let mut low_stock = Vec::new();
        for ((item, _), line) in requested.iter().zip(&returned_lines) {
            return_repo::insert_item(
                conn,
                &NewReturnItem {
                    return_id,
                    sale_item_id: item.id,
                    product_id: item.product_id,
                    quantity_returned: line.quantity,
                    unit_price_cents: line.unit_price.cents(),
                    subtotal_cents: line.amount.cents(),
                },
            )
            .await?;

            let change = inventory::increase_stock(
                conn,
                item.product_id,
                line.quantity,
                StockReason::Return,
                now,
            )
            .await?;
            low_stock.extend(change.low_stock);
        }

        if let Some(customer_id) = sale.credit_customer() {
            if return_amount.is_positive() {
                credit::refund_return(
                    conn,
                    customer_id,
                    sale.id,
                    return_id,
                    return_amount,
                    processed_by,
                    now,
                )
                .await?;
            }
        }

        if let Some(customer_id) = sale.customer_id {
            customer_repo::reverse_purchase(conn, customer_id, return_amount.cents(), 0, now)
                .await?;
        }

        Ok(ReturnReceipt {
            return_id,
            return_number,
            sale_id: sale.id,
            sale_number: sale.sale_number.clone(),
            return_amount,
            refund_method: sale.payment_method,
            lines: returned_lines,
            low_stock,
        })
    }

    // =========================================================================
    // Standalone Stock Adjustments
    // =========================================================================

    /// Applies a manual stock correction in its own transaction.
    pub async fn adjust_stock(
        &self,
        product_id: i64,
        delta: i64,
        reason: StockReason,
    ) -> PosResult<StockChange> {
        if delta == 0 {
            return Err(ValidationError::InvalidFormat {
                field: "delta".to_string(),
                reason: "must not be zero".to_string(),
            }
            .into());
        }

        let _gate = self.write_gate.lock().await;
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        let adjusted = inventory::adjust_stock(&mut tx, product_id, delta, reason, now).await;
        let change = commit_or_rollback(tx, adjusted, "adjust_stock").await?;

        info!(
            product_id,
            delta,
            reason = %reason,
            stock = change.new_quantity,
            "Stock adjusted"
        );
        if let Some(alert) = &change.low_stock {
            self.publish(std::slice::from_ref(alert));
        }

        Ok(change)
    }

    /// Receives `quantity` new units from a supplier.
    pub async fn restock(&self, product_id: i64, quantity: i64) -> PosResult<StockChange> {
        if quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }
        self.adjust_stock(product_id, quantity, StockReason::Restock)
            .await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// A sale with its lines, returns, and returned quantity per line.
    pub async fn get_sale(&self, sale_id: i64) -> PosResult<Option<SaleDetails>> {
        let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;
        match sale_repo::find_by_id(&mut conn, sale_id).await? {
            Some(sale) => Ok(Some(load_details(&mut conn, sale).await?)),
            None => Ok(None),
        }
    }

    pub async fn get_sale_by_number(&self, sale_number: &str) -> PosResult<Option<SaleDetails>> {
        let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;
        match sale_repo::find_by_number(&mut conn, sale_number.trim()).await? {
            Some(sale) => Ok(Some(load_details(&mut conn, sale).await?)),
            None => Ok(None),
        }
    }

    /// Most recent sales first, any status.
    pub async fn recent_sales(&self, limit: u32) -> PosResult<Vec<Sale>> {
        Ok(self.db.sales().list_recent(limit).await?)
    }

    pub async fn sales_for_customer(&self, customer_id: i64) -> PosResult<Vec<Sale>> {
        Ok(self.db.sales().list_for_customer(customer_id).await?)
    }

    /// Active product by barcode, for scanning into a cart.
    pub async fn product_by_barcode(&self, barcode: &str) -> PosResult<Product> {
        self.db
            .products()
            .get_by_barcode(barcode)
            .await?
            .ok_or_else(|| CoreError::not_found("Product", barcode.trim()).into())
    }

    /// Active product by id. Archived products are reported as not found.
    pub async fn product(&self, product_id: i64) -> PosResult<Product> {
        self.db
            .products()
            .get_by_id(product_id)
            .await?
            .filter(|product| product.status.is_active())
            .ok_or_else(|| CoreError::not_found("Product", product_id).into())
    }

    pub async fn low_stock_products(&self) -> PosResult<Vec<Product>> {
        Ok(self.db.products().low_stock().await?)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn log_phase(phase: SalePhase) {
    debug!(?phase, "Sale phase");
}

/// Units already returned, keyed by sale item id.
/// Moves the line amounts so they add up to `target`. Extra is added to the
/// last line; a shortfall is taken from the last lines first, none below zero.
fn settle_refund(lines: &mut [ReturnedLine], target: Money) {
    let priced: Money = lines.iter().map(|line| line.amount).sum();
    let mut excess = priced - target;
    if excess.is_negative() {
        if let Some(last) = lines.last_mut() {
            last.amount -= excess;
        }
        return;
    }
    for line in lines.iter_mut().rev() {
        if !excess.is_positive() {
            break;
        }
        let taken = excess.min(line.amount);
        line.amount -= taken;
        excess -= taken;
    }
}

async fn returned_by_line(conn: &mut SqliteConnection, sale_id: i64) -> PosResult<HashMap<i64, i64>> {
    Ok(return_repo::returned_quantities(conn, sale_id)
        .await?
        .into_iter()
        .map(|row| (row.sale_item_id, row.quantity))
        .collect())
}

async fn load_details(conn: &mut SqliteConnection, sale: Sale) -> PosResult<SaleDetails> {
    let returned = returned_by_line(conn, sale.id).await?;
    let items = sale_repo::items_for_sale(conn, sale.id)
        .await?
        .into_iter()
        .map(|item| SaleLineView {
            returned_quantity: returned.get(&item.id).copied().unwrap_or(0),
            item,
        })
        .collect();
    let returns = return_repo::returns_for_sale(conn, sale.id).await?;

    Ok(SaleDetails {
        sale,
        items,
        returns,
    })
}

/// Commits on success, rolls back on failure.
///
/// Persistence failures are logged at ERROR; rule violations at DEBUG since
/// the caller already gets them back.
pub(crate) async fn commit_or_rollback<T>(
    tx: Transaction<'static, Sqlite>,
    result: PosResult<T>,
    operation: &'static str,
) -> PosResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(|e| {
                error!(operation, error = %e, "Commit failed");
                DbError::TransactionFailed(e.to_string())
            })?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!(operation, error = %rollback_err, "Rollback failed");
            }
            if err.is_persistence() {
                error!(operation, error = %err, "Persistence failure, rolled back");
            } else {
                debug!(operation, error = %err, "Rejected, rolled back");
            }
            Err(err)
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, PosError};
    use chrono::TimeZone;
    use minimart_core::{
        CreditTransactionType, DiscountRate, FixedClock, NewCustomer, NewProduct, SaleStatus,
    };
    use minimart_db::repository::product as product_repo;
    use minimart_db::DbConfig;

    async fn setup() -> (PointOfSale, Arc<FixedClock>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        ));
        (PointOfSale::with_clock(db, 1, clock.clone()), clock)
    }

    async fn product(pos: &PointOfSale, name: &str, price: i64, cost: i64, stock: i64) -> Product {
        pos.add_product(&NewProduct {
            barcode: None,
            name: name.to_string(),
            selling_price_cents: price,
            purchase_price_cents: cost,
            initial_stock: stock,
            min_stock_level: 2,
            discount_bps: 0,
        })
        .await
        .unwrap()
    }

    async fn customer(pos: &PointOfSale, limit: i64) -> i64 {
        pos.add_customer(&NewCustomer {
            full_name: "Amina Benali".to_string(),
            phone: None,
            credit_limit_cents: limit,
        })
        .await
        .unwrap()
        .id
    }

    async fn stock_of(pos: &PointOfSale, id: i64) -> i64 {
        pos.database()
            .products()
            .get_by_id(id)
            .await
            .unwrap()
            .unwrap()
            .stock_quantity
    }

    async fn count(pos: &PointOfSale, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pos.database().pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_cash_sale_with_percentage_discount() {
        let (pos, _) = setup().await;
        let oil = product(&pos, "Olive Oil 1L", 15000, 10000, 10).await;

        let mut cart = Cart::new();
        cart.add_item(&oil, 2).unwrap();
        cart.set_discount_percentage(DiscountRate::from_percent(10)).unwrap();
        assert_eq!(cart.total_profit().cents(), 10000);
        assert_eq!(cart.net_profit().cents(), 7000);
        let (subtotal, discount, total) = (cart.subtotal(), cart.discount_amount(), cart.total());

        let receipt = pos
            .complete_sale(&mut cart, &CheckoutRequest::cash(1, Money::from_cents(30000)))
            .await
            .unwrap();

        assert_eq!(receipt.sale_number, "VNT-20240301093000-1");
        assert_eq!(receipt.subtotal.cents(), 30000);
        assert_eq!(receipt.discount.cents(), 3000);
        assert_eq!(receipt.total.cents(), 27000);
        assert_eq!(receipt.change.cents(), 3000);
        assert!(cart.is_empty());
        assert_eq!(stock_of(&pos, oil.id).await, 8);

        let details = pos.get_sale(receipt.sale_id).await.unwrap().unwrap();
        assert_eq!(details.sale.status, SaleStatus::Completed);
        assert_eq!(details.sale.subtotal(), subtotal);
        assert_eq!(details.sale.discount(), discount);
        assert_eq!(details.sale.total(), total);
        assert_eq!(details.sale.amount_paid_cents, 30000);
        assert_eq!(details.sale.change_cents, 3000);
        assert_eq!(details.items.len(), 1);
        assert_eq!(details.items[0].item.subtotal_cents, 30000);
        assert_eq!(details.items[0].returnable(), 2);

        let by_number = pos
            .get_sale_by_number("VNT-20240301093000-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_number.sale.id, receipt.sale_id);
    }

    #[tokio::test]
    async fn test_same_second_sales_get_suffix() {
        let (pos, _) = setup().await;
        let oil = product(&pos, "Olive Oil 1L", 15000, 10000, 10).await;

        let mut numbers = Vec::new();
        for _ in 0..3 {
            let mut cart = Cart::new();
            cart.add_item(&oil, 1).unwrap();
            let receipt = pos
                .complete_sale(&mut cart, &CheckoutRequest::cash(1, Money::from_cents(15000)))
                .await
                .unwrap();
            numbers.push(receipt.sale_number);
        }

        assert_eq!(
            numbers,
            vec![
                "VNT-20240301093000-1",
                "VNT-20240301093000-1-2",
                "VNT-20240301093000-1-3"
            ]
        );
        assert_eq!(pos.recent_sales(10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_insufficient_payment_writes_nothing() {
        let (pos, _) = setup().await;
        let oil = product(&pos, "Olive Oil 1L", 15000, 10000, 10).await;

        let mut cart = Cart::new();
        cart.add_item(&oil, 2).unwrap();
        let err = pos
            .complete_sale(&mut cart, &CheckoutRequest::cash(1, Money::from_cents(20000)))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::InsufficientPayment);
        assert_eq!(cart.item_count(), 1);
        assert_eq!(count(&pos, "sales").await, 0);
        assert_eq!(count(&pos, "sale_items").await, 0);
        assert_eq!(stock_of(&pos, oil.id).await, 10);
    }

    #[tokio::test]
    async fn test_empty_cart_and_negative_payment_rejected() {
        let (pos, _) = setup().await;
        let oil = product(&pos, "Olive Oil 1L", 15000, 10000, 10).await;

        let mut cart = Cart::new();
        let err = pos
            .complete_sale(&mut cart, &CheckoutRequest::cash(1, Money::from_cents(100)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::EmptyCart);

        cart.add_item(&oil, 1).unwrap();
        let err = pos
            .complete_sale(&mut cart, &CheckoutRequest::cash(1, Money::from_cents(-1)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidAmount);
    }

    #[tokio::test]
    async fn test_mid_sale_stock_failure_rolls_back_everything() {
        let (pos, _) = setup().await;
        let mut products = Vec::new();
        for i in 0..5 {
            products.push(product(&pos, &format!("Item {i}"), 1000, 500, 10).await);
        }

        let mut cart = Cart::new();
        for p in &products {
            cart.add_item(p, 4).unwrap();
        }

        // Another writer drains the third product after it was scanned.
        {
            let mut conn = pos.database().pool().acquire().await.unwrap();
            product_repo::apply_stock_delta(&mut conn, products[2].id, -8, Utc::now())
                .await
                .unwrap();
        }

        let err = pos
            .complete_sale(&mut cart, &CheckoutRequest::cash(1, Money::from_cents(20000)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientStock);

        assert_eq!(count(&pos, "sales").await, 0);
        assert_eq!(count(&pos, "sale_items").await, 0);
        assert_eq!(stock_of(&pos, products[0].id).await, 10);
        assert_eq!(stock_of(&pos, products[1].id).await, 10);
        assert_eq!(stock_of(&pos, products[2].id).await, 2);
        assert_eq!(stock_of(&pos, products[4].id).await, 10);
        assert_eq!(cart.item_count(), 5);
    }

    #[tokio::test]
    async fn test_credit_sale_charges_ledger_and_stats() {
        let (pos, _) = setup().await;
        let oil = product(&pos, "Olive Oil 1L", 15000, 10000, 10).await;
        let customer_id = customer(&pos, 50000).await;

        let mut cart = Cart::new();
        cart.add_item(&oil, 2).unwrap();
        let receipt = pos
            .complete_sale(&mut cart, &CheckoutRequest::credit(1, customer_id))
            .await
            .unwrap();
        assert_eq!(receipt.change, Money::zero());

        let customer = pos.customer(customer_id).await.unwrap();
        assert_eq!(customer.current_credit_cents, 30000);
        assert_eq!(customer.total_purchases_cents, 30000);
        assert_eq!(customer.purchase_count, 1);
        assert_eq!(pos.sales_for_customer(customer_id).await.unwrap().len(), 1);

        let statement = pos.statement(customer_id).await.unwrap();
        assert_eq!(statement.len(), 1);
        assert_eq!(statement[0].transaction_type, CreditTransactionType::CreditSale);
        assert_eq!(statement[0].sale_id, Some(receipt.sale_id));
        assert!(pos.reconcile(customer_id).await.unwrap().is_balanced());
    }

    #[tokio::test]
    async fn test_unknown_customer_aborts_sale() {
        let (pos, _) = setup().await;
        let oil = product(&pos, "Olive Oil 1L", 15000, 10000, 10).await;

        let mut cart = Cart::new();
        cart.add_item(&oil, 1).unwrap();
        let err = pos
            .complete_sale(&mut cart, &CheckoutRequest::credit(1, 404))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(count(&pos, "sales").await, 0);
        assert_eq!(stock_of(&pos, oil.id).await, 10);
    }

    #[tokio::test]
    async fn test_credit_without_customer_is_accepted() {
        let (pos, _) = setup().await;
        let oil = product(&pos, "Olive Oil 1L", 15000, 10000, 10).await;

        let mut cart = Cart::new();
        cart.add_item(&oil, 1).unwrap();
        let request = CheckoutRequest {
            cashier_id: 1,
            payment_method: PaymentMethod::Credit,
            amount_paid: None,
            customer_id: None,
        };
        let receipt = pos.complete_sale(&mut cart, &request).await.unwrap();
        assert_eq!(receipt.customer_id, None);
        assert_eq!(count(&pos, "customer_credit_transactions").await, 0);
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_and_credit_once() {
        let (pos, clock) = setup().await;
        let oil = product(&pos, "Olive Oil 1L", 15000, 10000, 10).await;
        let sugar = product(&pos, "Sugar 1kg", 1200, 900, 5).await;
        let customer_id = customer(&pos, 100000).await;

        let mut cart = Cart::new();
        cart.add_item(&oil, 2).unwrap();
        cart.add_item(&sugar, 3).unwrap();
        let receipt = pos
            .complete_sale(&mut cart, &CheckoutRequest::credit(1, customer_id))
            .await
            .unwrap();
        assert_eq!(stock_of(&pos, sugar.id).await, 2);

        clock.advance_secs(60);
        let cancelled = pos
            .cancel_sale(receipt.sale_id, "Customer changed mind")
            .await
            .unwrap();
        assert_eq!(cancelled.restored.len(), 2);
        assert_eq!(cancelled.credit_reversed, receipt.total);
        assert_eq!(stock_of(&pos, oil.id).await, 10);
        assert_eq!(stock_of(&pos, sugar.id).await, 5);

        let err = pos.cancel_sale(receipt.sale_id, "again").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyCancelled);
        assert_eq!(stock_of(&pos, oil.id).await, 10);

        let customer = pos.customer(customer_id).await.unwrap();
        assert_eq!(customer.current_credit_cents, 0);
        assert_eq!(customer.total_purchases_cents, 0);
        assert_eq!(customer.purchase_count, 0);
        assert!(pos.reconcile(customer_id).await.unwrap().is_balanced());

        let details = pos.get_sale(receipt.sale_id).await.unwrap().unwrap();
        assert_eq!(details.sale.status, SaleStatus::Cancelled);
        assert_eq!(
            details.sale.cancellation_reason.as_deref(),
            Some("Customer changed mind")
        );

        let err = pos.cancel_sale(9999, "missing").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_returns_are_bounded_cumulatively() {
        let (pos, clock) = setup().await;
        let couscous = product(&pos, "Couscous 1kg", 1500, 1000, 10).await;

        let mut cart = Cart::new();
        cart.add_item(&couscous, 3).unwrap();
        let receipt = pos
            .complete_sale(&mut cart, &CheckoutRequest::cash(1, Money::from_cents(5000)))
            .await
            .unwrap();

        let first = pos
            .process_return(receipt.sale_id, &[ReturnLine::new(couscous.id, 2)], 1, Some("Torn bag"))
            .await
            .unwrap();
        assert_eq!(first.return_amount.cents(), 3000);
        assert_eq!(first.return_number, "RET-20240301093000");
        assert_eq!(stock_of(&pos, couscous.id).await, 9);

        clock.advance_secs(5);
        let err = pos
            .process_return(receipt.sale_id, &[ReturnLine::new(couscous.id, 2)], 1, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PosError::Core(CoreError::InvalidReturnQuantity {
                requested: 2,
                returnable: 1,
                ..
            })
        ));

        let err = pos
            .process_return(receipt.sale_id, &[ReturnLine::new(couscous.id, 0)], 1, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidReturn);

        let err = pos
            .process_return(receipt.sale_id, &[ReturnLine::new(404, 1)], 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PosError::Core(CoreError::ItemNotFound { .. })));

        let err = pos.process_return(receipt.sale_id, &[], 1, None).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        pos.process_return(receipt.sale_id, &[ReturnLine::new(couscous.id, 1)], 1, None)
            .await
            .unwrap();
        assert_eq!(stock_of(&pos, couscous.id).await, 10);

        let details = pos.get_sale(receipt.sale_id).await.unwrap().unwrap();
        assert_eq!(details.returns.len(), 2);
        assert_eq!(details.items[0].returnable(), 0);
        assert_eq!(details.total_returned().cents(), 4500);

        // Everything came back: cancelling restores no units.
        let cancelled = pos.cancel_sale(receipt.sale_id, "void").await.unwrap();
        assert!(cancelled.restored.is_empty());
        assert_eq!(stock_of(&pos, couscous.id).await, 10);
    }

    #[tokio::test]
    async fn test_duplicate_return_lines_are_merged() {
        let (pos, _) = setup().await;
        let couscous = product(&pos, "Couscous 1kg", 1500, 1000, 10).await;

        let mut cart = Cart::new();
        cart.add_item(&couscous, 3).unwrap();
        let receipt = pos
            .complete_sale(&mut cart, &CheckoutRequest::cash(1, Money::from_cents(4500)))
            .await
            .unwrap();

        let err = pos
            .process_return(
                receipt.sale_id,
                &[ReturnLine::new(couscous.id, 2), ReturnLine::new(couscous.id, 2)],
                1,
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidReturn);
        assert_eq!(count(&pos, "returns").await, 0);

        let ok = pos
            .process_return(
                receipt.sale_id,
                &[ReturnLine::new(couscous.id, 1), ReturnLine::new(couscous.id, 2)],
                1,
                None,
            )
            .await
            .unwrap();
        assert_eq!(ok.lines.len(), 1);
        assert_eq!(ok.lines[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_credit_return_then_cancel_balances_ledger() {
        let (pos, clock) = setup().await;
        let oil = product(&pos, "Olive Oil 1L", 15000, 10000, 10).await;
        let customer_id = customer(&pos, 50000).await;

        let mut cart = Cart::new();
        cart.add_item(&oil, 2).unwrap();
        cart.set_discount_percentage(DiscountRate::from_percent(10)).unwrap();
        let receipt = pos
            .complete_sale(&mut cart, &CheckoutRequest::credit(1, customer_id))
            .await
            .unwrap();
        assert_eq!(receipt.total.cents(), 27000);

        clock.advance_secs(3600);
        let ret = pos
            .process_return(receipt.sale_id, &[ReturnLine::new(oil.id, 1)], 1, None)
            .await
            .unwrap();
        assert_eq!(ret.return_amount.cents(), 13500);
        assert_eq!(ret.refund_method, PaymentMethod::Credit);
        assert_eq!(pos.customer(customer_id).await.unwrap().current_credit_cents, 13500);

        let cancelled = pos.cancel_sale(receipt.sale_id, "void").await.unwrap();
        assert_eq!(cancelled.credit_reversed.cents(), 13500);
        assert_eq!(stock_of(&pos, oil.id).await, 10);

        let customer = pos.customer(customer_id).await.unwrap();
        assert_eq!(customer.current_credit_cents, 0);
        assert_eq!(customer.total_purchases_cents, 0);
        let reconciliation = pos.reconcile(customer_id).await.unwrap();
        assert!(reconciliation.is_balanced());

        let kinds: Vec<_> = pos
            .statement(customer_id)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.transaction_type)
            .collect();
        assert_eq!(
            kinds,
            vec![
                CreditTransactionType::CreditSale,
                CreditTransactionType::ReturnCredit,
                CreditTransactionType::SaleCancellation
            ]
        );
    }

    #[tokio::test]
    async fn test_stepwise_credit_returns_refund_exact_total() {
        let (pos, clock) = setup().await;
        let soap = product(&pos, "Soap Bar", 100, 60, 10).await;
        let customer_id = customer(&pos, 50000).await;

        let mut cart = Cart::new();
        cart.add_item(&soap, 3).unwrap();
        cart.set_discount_amount(Money::from_cents(100)).unwrap();
        let receipt = pos
            .complete_sale(&mut cart, &CheckoutRequest::credit(1, customer_id))
            .await
            .unwrap();
        assert_eq!(receipt.total.cents(), 200);

        let mut refunds = Vec::new();
        for _ in 0..3 {
            clock.advance_secs(60);
            let ret = pos
                .process_return(receipt.sale_id, &[ReturnLine::new(soap.id, 1)], 1, None)
                .await
                .unwrap();
            refunds.push(ret.return_amount.cents());
        }
        assert_eq!(refunds, vec![67, 66, 67]);

        let details = pos.get_sale(receipt.sale_id).await.unwrap().unwrap();
        assert_eq!(details.total_returned(), receipt.total);
        assert_eq!(pos.customer(customer_id).await.unwrap().current_credit_cents, 0);
        assert!(pos.reconcile(customer_id).await.unwrap().is_balanced());
    }

    #[tokio::test]
    async fn test_last_return_refunds_remainder_of_sale() {
        let (pos, clock) = setup().await;
        let soap = product(&pos, "Soap Bar", 100, 60, 10).await;
        let salt = product(&pos, "Salt 1kg", 100, 60, 10).await;
        let customer_id = customer(&pos, 50000).await;

        // Each line's rounded share is 0.50 but only 0.99 was collected.
        let mut cart = Cart::new();
        cart.add_item(&soap, 1).unwrap();
        cart.add_item(&salt, 1).unwrap();
        cart.set_discount_amount(Money::from_cents(101)).unwrap();
        let receipt = pos
            .complete_sale(&mut cart, &CheckoutRequest::credit(1, customer_id))
            .await
            .unwrap();
        assert_eq!(receipt.total.cents(), 99);

        let first = pos
            .process_return(receipt.sale_id, &[ReturnLine::new(soap.id, 1)], 1, None)
            .await
            .unwrap();
        assert_eq!(first.return_amount.cents(), 50);

        clock.advance_secs(60);
        let last = pos
            .process_return(receipt.sale_id, &[ReturnLine::new(salt.id, 1)], 1, None)
            .await
            .unwrap();
        assert_eq!(last.return_amount.cents(), 49);
        assert_eq!(last.lines[0].amount.cents(), 49);

        assert_eq!(pos.customer(customer_id).await.unwrap().current_credit_cents, 0);
        let cancelled = pos.cancel_sale(receipt.sale_id, "void").await.unwrap();
        assert!(cancelled.credit_reversed.is_zero());
        assert!(pos.reconcile(customer_id).await.unwrap().is_balanced());
    }

    #[tokio::test]
    async fn test_return_against_cancelled_sale_rejected() {
        let (pos, _) = setup().await;
        let oil = product(&pos, "Olive Oil 1L", 15000, 10000, 10).await;

        let mut cart = Cart::new();
        cart.add_item(&oil, 1).unwrap();
        let receipt = pos
            .complete_sale(&mut cart, &CheckoutRequest::cash(1, Money::from_cents(15000)))
            .await
            .unwrap();
        pos.cancel_sale(receipt.sale_id, "void").await.unwrap();

        let err = pos
            .process_return(receipt.sale_id, &[ReturnLine::new(oil.id, 1)], 1, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyCancelled);
        assert_eq!(stock_of(&pos, oil.id).await, 10);
    }

    #[tokio::test]
    async fn test_low_stock_alert_published_after_commit() {
        let (pos, _) = setup().await;
        let oil = product(&pos, "Olive Oil 1L", 15000, 10000, 4).await;
        let mut alerts = pos.subscribe_low_stock();

        let mut cart = Cart::new();
        cart.add_item(&oil, 2).unwrap();
        let receipt = pos
            .complete_sale(&mut cart, &CheckoutRequest::cash(1, Money::from_cents(30000)))
            .await
            .unwrap();

        assert_eq!(receipt.low_stock.len(), 1);
        let alert = alerts.try_recv().unwrap();
        assert_eq!(alert.product_id, oil.id);
        assert_eq!(alert.stock_quantity, 2);

        let low = pos.low_stock_products().await.unwrap();
        assert_eq!(low.len(), 1);
    }

    #[tokio::test]
    async fn test_manual_adjustments() {
        let (pos, _) = setup().await;
        let oil = product(&pos, "Olive Oil 1L", 15000, 10000, 4).await;

        let change = pos.restock(oil.id, 20).await.unwrap();
        assert_eq!(change.new_quantity, 24);
        assert_eq!(change.reason, StockReason::Restock);

        let err = pos
            .adjust_stock(oil.id, -25, StockReason::Adjustment)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientStock);
        assert_eq!(stock_of(&pos, oil.id).await, 24);

        assert!(pos.restock(oil.id, 0).await.is_err());
        assert!(pos.adjust_stock(oil.id, 0, StockReason::Adjustment).await.is_err());
    }
}
