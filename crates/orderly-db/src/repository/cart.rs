//! # Cart Repository
//!
//! Persisted per-user carts. One row per (user, product) pair; adding a
//! product already in the cart bumps the quantity instead of duplicating
//! the row.
//!
//! Settlement clears the buyer's cart inside the settlement transaction,
//! so an aborted settlement leaves the cart intact.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use orderly_core::types::CartItem;

use crate::error::DbResult;

/// Repository for persisted cart rows.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new cart repository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Adds a product to the user's cart, or increments the quantity if the
    /// product is already there.
    pub async fn upsert_item(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
        image: Option<&str>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (id, user_id, product_id, quantity, image, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = quantity + excluded.quantity
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .bind(image)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(user_id, product_id, quantity, "Cart item upserted");
        Ok(())
    }

    /// Sets the quantity for a cart line, removing the row if `quantity <= 0`.
    pub async fn set_quantity(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        if quantity <= 0 {
            self.remove_item(user_id, product_id).await?;
            return Ok(());
        }

        sqlx::query(
            "UPDATE cart_items SET quantity = ?1 WHERE user_id = ?2 AND product_id = ?3",
        )
        .bind(quantity)
        .bind(user_id)
        .bind(product_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Removes one product from the user's cart.
    pub async fn remove_item(&self, user_id: &str, product_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = ?1 AND product_id = ?2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Returns all cart rows for a user, oldest first.
    pub async fn items_for_user(&self, user_id: &str) -> DbResult<Vec<CartItem>> {
        let items = sqlx::query_as::<_, CartItem>(
            "SELECT * FROM cart_items WHERE user_id = ?1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Counts the cart rows for a user.
    pub async fn count_for_user(&self, user_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE user_id = ?1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Clears a user's cart inside an open transaction. Called by settlement
    /// after the order is written; rolls back with everything else on abort.
    pub async fn clear_for_user(conn: &mut SqliteConnection, user_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
