//! Product and customer administration.
//!
//! These writes never touch stock movements or credit balances, so they run
//! outside the write gate on a plain pooled connection.

use tracing::info;

use crate::error::PosResult;
use crate::orchestrator::PointOfSale;
use minimart_core::{
    CoreError, Customer, CustomerPatch, NewCustomer, NewProduct, Product, ProductPatch,
    RecordStatus, ValidationError,
};
use minimart_db::repository::{customer as customer_repo, product as product_repo};
use minimart_db::DbError;

/// Upper bound on search results handed to a picker.
pub const MAX_SEARCH_RESULTS: u32 = 50;

impl PointOfSale {
    // =========================================================================
    // Products
    // =========================================================================

    pub async fn add_product(&self, product: &NewProduct) -> PosResult<Product> {
        product.validate()?;

        let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;
        let created = product_repo::insert(&mut conn, product, self.clock.now()).await?;

        info!(id = created.id, name = %created.name, stock = created.stock_quantity, "Product added");
        Ok(created)
    }

    /// Changes administrative fields. Stock is not part of a patch.
    pub async fn update_product(&self, product_id: i64, patch: &ProductPatch) -> PosResult<Product> {
        if patch.is_empty() {
            return Err(ValidationError::Required {
                field: "patch".to_string(),
            }
            .into());
        }
        patch.validate()?;

        let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;
        let updated = product_repo::update(&mut conn, product_id, patch, self.clock.now()).await?;

        info!(id = product_id, "Product updated");
        Ok(updated)
    }

    /// Hides a product from scanning. Past sales keep their snapshots.
    pub async fn archive_product(&self, product_id: i64) -> PosResult<()> {
        self.set_product_status(product_id, RecordStatus::Archived).await
    }

    pub async fn restore_product(&self, product_id: i64) -> PosResult<()> {
        self.set_product_status(product_id, RecordStatus::Active).await
    }

    /// Active products by name, for browsing without a barcode.
    pub async fn active_products(&self, limit: u32) -> PosResult<Vec<Product>> {
        Ok(self.db.products().list_active(limit).await?)
    }

    /// Finds products by name or barcode prefix, for adding items without
    /// scanning.
    pub async fn search_products(&self, term: &str, limit: u32) -> PosResult<Vec<Product>> {
        let term = term.trim();
        if term.is_empty() {
            return Err(ValidationError::Required {
                field: "term".to_string(),
            }
            .into());
        }
        Ok(self
            .db
            .products()
            .search(term, limit.min(MAX_SEARCH_RESULTS))
            .await?)
    }

    /// Products currently sold at a line discount.
    pub async fn promoted_products(&self) -> PosResult<Vec<Product>> {
        Ok(self.db.products().promoted().await?)
    }

    async fn set_product_status(&self, product_id: i64, status: RecordStatus) -> PosResult<()> {
        let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;
        product_repo::set_status(&mut conn, product_id, status, self.clock.now()).await?;
        info!(id = product_id, ?status, "Product status changed");
        Ok(())
    }

    // =========================================================================
    // Customers
    // =========================================================================

    pub async fn add_customer(&self, customer: &NewCustomer) -> PosResult<Customer> {
        customer.validate()?;

        let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;
        let created = customer_repo::insert(&mut conn, customer, self.clock.now()).await?;

        info!(id = created.id, name = %created.full_name, "Customer added");
        Ok(created)
    }

    pub async fn update_customer(
        &self,
        customer_id: i64,
        patch: &CustomerPatch,
    ) -> PosResult<Customer> {
        if patch.is_empty() {
            return Err(ValidationError::Required {
                field: "patch".to_string(),
            }
            .into());
        }
        patch.validate()?;

        let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;
        let updated = customer_repo::update(&mut conn, customer_id, patch, self.clock.now()).await?;

        info!(id = customer_id, "Customer updated");
        Ok(updated)
    }

    /// Archived customers cannot be attached to new sales but keep their
    /// balance and history.
    pub async fn archive_customer(&self, customer_id: i64) -> PosResult<()> {
        let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;
        customer_repo::set_status(&mut conn, customer_id, RecordStatus::Archived, self.clock.now())
            .await?;
        info!(id = customer_id, "Customer archived");
        Ok(())
    }

    /// Any customer by id, archived included.
    pub async fn customer(&self, customer_id: i64) -> PosResult<Customer> {
        self.db
            .customers()
            .get_by_id(customer_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Customer", customer_id).into())
    }

    /// Customers with an outstanding balance, largest first.
    pub async fn debtors(&self) -> PosResult<Vec<Customer>> {
        Ok(self.db.customers().list_debtors().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use minimart_db::{Database, DbConfig};

    async fn pos() -> PointOfSale {
        PointOfSale::new(Database::new(DbConfig::in_memory()).await.unwrap(), 1)
    }

    fn tea() -> NewProduct {
        NewProduct {
            barcode: Some("6111245591032".to_string()),
            name: "Green Tea 200g".to_string(),
            selling_price_cents: 1850,
            purchase_price_cents: 1400,
            initial_stock: 24,
            min_stock_level: 5,
            discount_bps: 0,
        }
    }

    #[tokio::test]
    async fn test_add_and_scan_product() {
        let pos = pos().await;
        let created = pos.add_product(&tea()).await.unwrap();

        let scanned = pos.product_by_barcode("6111245591032").await.unwrap();
        assert_eq!(scanned.id, created.id);
        assert_eq!(scanned.stock_quantity, 24);

        let err = pos.add_product(&tea()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_invalid_product_rejected() {
        let pos = pos().await;
        let mut product = tea();
        product.name = "   ".to_string();
        let err = pos.add_product(&product).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_update_product() {
        let pos = pos().await;
        let created = pos.add_product(&tea()).await.unwrap();

        let err = pos
            .update_product(created.id, &ProductPatch::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let updated = pos
            .update_product(
                created.id,
                &ProductPatch {
                    selling_price_cents: Some(1950),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.selling_price_cents, 1950);
        assert_eq!(updated.stock_quantity, 24);

        let err = pos
            .update_product(
                9999,
                &ProductPatch {
                    name: Some("Ghost".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_archive_and_restore_product() {
        let pos = pos().await;
        let created = pos.add_product(&tea()).await.unwrap();

        pos.archive_product(created.id).await.unwrap();
        assert_eq!(
            pos.product_by_barcode("6111245591032").await.unwrap_err().code(),
            ErrorCode::NotFound
        );
        assert_eq!(pos.product(created.id).await.unwrap_err().code(), ErrorCode::NotFound);
        assert!(pos.active_products(10).await.unwrap().is_empty());

        pos.restore_product(created.id).await.unwrap();
        assert_eq!(pos.product(created.id).await.unwrap().id, created.id);
        assert_eq!(pos.active_products(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_and_promotions() {
        let pos = pos().await;
        let tea = pos.add_product(&tea()).await.unwrap();
        let mint = pos
            .add_product(&NewProduct {
                barcode: None,
                name: "Mint Tea Bags".to_string(),
                discount_bps: 1500,
                ..self::tea()
            })
            .await
            .unwrap();

        let found = pos.search_products("  TEA ", 10).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(pos.search_products("6111245591032", 10).await.unwrap()[0].id, tea.id);
        assert_eq!(
            pos.search_products("   ", 10).await.unwrap_err().code(),
            ErrorCode::ValidationError
        );

        let promoted = pos.promoted_products().await.unwrap();
        assert_eq!(promoted.len(), 1);
        assert_eq!(promoted[0].id, mint.id);

        pos.archive_product(mint.id).await.unwrap();
        assert!(pos.promoted_products().await.unwrap().is_empty());
        assert_eq!(pos.search_products("tea", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_customer_lifecycle() {
        let pos = pos().await;
        let created = pos
            .add_customer(&NewCustomer {
                full_name: "Fatima Zahra".to_string(),
                phone: Some("0661000000".to_string()),
                credit_limit_cents: 100000,
            })
            .await
            .unwrap();
        assert_eq!(created.current_credit_cents, 0);

        let updated = pos
            .update_customer(
                created.id,
                &CustomerPatch {
                    phone: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.phone, None);

        pos.archive_customer(created.id).await.unwrap();
        let archived = pos.customer(created.id).await.unwrap();
        assert_eq!(archived.status, RecordStatus::Archived);

        assert!(pos.debtors().await.unwrap().is_empty());
        assert_eq!(pos.customer(9999).await.unwrap_err().code(), ErrorCode::NotFound);
    }
}
