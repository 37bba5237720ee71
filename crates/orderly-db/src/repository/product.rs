//! # Product Repository
//!
//! Catalog CRUD plus the inventory ledger primitives.
//!
//! ## The Inventory Ledger
//! `stock_quantity` is a shared counter decremented by concurrent
//! settlements. The ONLY way to decrement it is [`try_reserve`], a single
//! conditional UPDATE:
//!
//! ```text
//! UPDATE products
//!    SET stock_quantity = stock_quantity - :qty
//!  WHERE id = :id AND is_active = 1 AND stock_quantity >= :qty
//! ```
//!
//! SQLite applies the row update atomically, so two settlements racing for
//! the last unit cannot both succeed: one sees `rows_affected == 1`, the
//! other sees `0` and aborts. There is no read-check-write window.
//!
//! [`try_reserve`]: ProductRepository::try_reserve

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

use orderly_core::types::Product;

use crate::error::{DbError, DbResult};

/// Repository for product catalog and stock operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new product repository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Inserts a new product. Generates an ID if the caller left it empty.
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        let id = if product.id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            product.id.clone()
        };
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO products
                (id, sku, name, price_cents, stock_quantity, is_active, image,
                 created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.stock_quantity)
        .bind(product.is_active)
        .bind(&product.image)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(product_id = %id, name = %product.name, "Product inserted");

        self.get_by_id(&id).await
    }

    /// Fetches a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Product> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Fetches a product by SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Product> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE sku = ?1")
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product", sku))
    }

    /// Lists all active products.
    pub async fn list_active(&self) -> DbResult<Vec<Product>> {
        let products =
            sqlx::query_as::<_, Product>("SELECT * FROM products WHERE is_active = 1 ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(products)
    }

    /// Deactivates a product. Existing orders keep their snapshots.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE products SET is_active = 0, updated_at = ?1 WHERE id = ?2")
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    // =========================================================================
    // Transaction-Scoped Operations
    // =========================================================================

    /// Fetches a product inside an open transaction.
    pub async fn fetch_in_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(product)
    }

    /// Attempts to atomically reserve `quantity` units of stock.
    ///
    /// Returns `true` if the reservation succeeded, `false` if the product
    /// is inactive or has insufficient stock *at the moment of the update*.
    /// A `false` return inside a transaction means the settlement lost a
    /// race and must abort; nothing has been written for this product.
    pub async fn try_reserve(
        conn: &mut SqliteConnection,
        id: &str,
        quantity: i64,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
               SET stock_quantity = stock_quantity - ?1, updated_at = ?2
             WHERE id = ?3 AND is_active = 1 AND stock_quantity >= ?1
            "#,
        )
        .bind(quantity)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;

        let reserved = result.rows_affected() == 1;
        if !reserved {
            warn!(product_id = %id, quantity, "Stock reservation failed");
        }
        Ok(reserved)
    }

    /// Returns `quantity` units to stock (order cancellation, failed payment
    /// cleanup). Unconditional increment; the CHECK constraint still holds.
    pub async fn release(&self, id: &str, quantity: i64) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
               SET stock_quantity = stock_quantity + ?1, updated_at = ?2
             WHERE id = ?3
            "#,
        )
        .bind(quantity)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        debug!(product_id = %id, quantity, "Stock released");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
