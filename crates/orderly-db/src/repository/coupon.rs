//! # Coupon Repository
//!
//! Coupon CRUD plus the usage ledger primitive.
//!
//! `used_count` is a shared counter, incremented only through
//! [`try_consume`] - a conditional UPDATE that re-checks activity and the
//! usage limit at write time:
//!
//! ```text
//! UPDATE coupons
//!    SET used_count = used_count + 1
//!  WHERE id = :id AND is_active = 1
//!    AND (usage_limit IS NULL OR used_count < usage_limit)
//! ```
//!
//! Two settlements racing for the last use of a limited coupon cannot both
//! win; the loser sees `rows_affected == 0` and aborts its transaction.
//!
//! [`try_consume`]: CouponRepository::try_consume

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

use orderly_core::types::Coupon;

use crate::error::{DbError, DbResult};

/// Repository for coupon storage and consumption.
#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

impl CouponRepository {
    /// Creates a new coupon repository.
    pub fn new(pool: SqlitePool) -> Self {
        CouponRepository { pool }
    }

    /// Inserts a new coupon. The code is stored as given; lookups are done
    /// against normalized (uppercased) codes, so store codes uppercase.
    pub async fn insert(&self, coupon: &Coupon) -> DbResult<Coupon> {
        let id = if coupon.id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            coupon.id.clone()
        };
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO coupons
                (id, code, discount_type, discount_value, min_order_cents,
                 max_discount_cents, usage_limit, used_count, valid_from,
                 valid_until, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&id)
        .bind(&coupon.code)
        .bind(coupon.discount_type)
        .bind(coupon.discount_value)
        .bind(coupon.min_order_cents)
        .bind(coupon.max_discount_cents)
        .bind(coupon.usage_limit)
        .bind(coupon.used_count)
        .bind(coupon.valid_from)
        .bind(coupon.valid_until)
        .bind(coupon.is_active)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(coupon_id = %id, code = %coupon.code, "Coupon inserted");

        self.get_by_id(&id).await
    }

    /// Fetches a coupon by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Coupon> {
        sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Coupon", id))
    }

    /// Fetches a coupon by its (already normalized) code.
    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<Coupon>> {
        let coupon = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE code = ?1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(coupon)
    }

    /// Fetches a coupon by code inside an open transaction.
    pub async fn find_by_code_in_tx(
        conn: &mut SqliteConnection,
        code: &str,
    ) -> DbResult<Option<Coupon>> {
        let coupon = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE code = ?1")
            .bind(code)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(coupon)
    }

    /// Attempts to atomically consume one use of the coupon.
    ///
    /// Returns `true` if the consumption succeeded. `false` means the
    /// coupon was deactivated or hit its usage limit since evaluation;
    /// the settlement must abort.
    pub async fn try_consume(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE coupons
               SET used_count = used_count + 1, updated_at = ?1
             WHERE id = ?2 AND is_active = 1
               AND (usage_limit IS NULL OR used_count < usage_limit)
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;

        let consumed = result.rows_affected() == 1;
        if !consumed {
            warn!(coupon_id = %id, "Coupon consumption failed");
        }
        Ok(consumed)
    }

    /// Deactivates a coupon.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE coupons SET is_active = 0, updated_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Coupon", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use orderly_core::types::DiscountType;

    fn sample_coupon(usage_limit: Option<i64>) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: String::new(),
            code: "SAVE10".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: 10,
            min_order_cents: None,
            max_discount_cents: None,
            usage_limit,
            used_count: 0,
            valid_from: now - chrono::Duration::days(1),
            valid_until: now + chrono::Duration::days(30),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_find_by_code() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.coupons();
        repo.insert(&sample_coupon(None)).await.unwrap();

        let found = repo.find_by_code("SAVE10").await.unwrap();
        assert!(found.is_some());

        let missing = repo.find_by_code("NOPE").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_try_consume_respects_usage_limit() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.coupons();
        let coupon = repo.insert(&sample_coupon(Some(2))).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        assert!(CouponRepository::try_consume(&mut tx, &coupon.id)
            .await
            .unwrap());
        assert!(CouponRepository::try_consume(&mut tx, &coupon.id)
            .await
            .unwrap());
        // Limit reached: the third consume must lose
        assert!(!CouponRepository::try_consume(&mut tx, &coupon.id)
            .await
            .unwrap());
        tx.commit().await.unwrap();

        let after = repo.get_by_id(&coupon.id).await.unwrap();
        assert_eq!(after.used_count, 2);
    }

    #[tokio::test]
    async fn test_try_consume_unlimited_coupon() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.coupons();
        let coupon = repo.insert(&sample_coupon(None)).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        for _ in 0..5 {
            assert!(CouponRepository::try_consume(&mut tx, &coupon.id)
                .await
                .unwrap());
        }
        tx.commit().await.unwrap();

        let after = repo.get_by_id(&coupon.id).await.unwrap();
        assert_eq!(after.used_count, 5);
    }

    #[tokio::test]
    async fn test_try_consume_inactive_coupon() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.coupons();
        let coupon = repo.insert(&sample_coupon(None)).await.unwrap();
        repo.deactivate(&coupon.id).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        assert!(!CouponRepository::try_consume(&mut tx, &coupon.id)
            .await
            .unwrap());
    }
}
