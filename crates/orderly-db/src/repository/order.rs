//! # Order Repository
//!
//! Orders, their line-item snapshots, and invoices.
//!
//! The insert methods all take a `&mut SqliteConnection` because order,
//! items, invoice and invoice items are only ever written together inside
//! the settlement transaction. Reads and the payment reconciliation
//! updates go through the pool.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use orderly_core::types::{
    Invoice, InvoiceItem, Order, OrderLineItem, OrderStatus, PaymentStatus,
};

use crate::error::{DbError, DbResult};

/// Repository for orders and invoices.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new order repository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Transaction-Scoped Writes (settlement only)
    // =========================================================================

    /// Inserts the order row inside the settlement transaction.
    pub async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders
                (id, user_id, order_number, status, payment_method, payment_status,
                 subtotal_cents, discount_cents, total_cents, discount_code,
                 customer_info, shipping_address, invoice_number, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(&order.order_number)
        .bind(order.status)
        .bind(order.payment_method)
        .bind(order.payment_status)
        .bind(order.subtotal_cents)
        .bind(order.discount_cents)
        .bind(order.total_cents)
        .bind(&order.discount_code)
        .bind(&order.customer_info)
        .bind(&order.shipping_address)
        .bind(&order.invoice_number)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *conn)
        .await?;

        debug!(order_id = %order.id, order_number = %order.order_number, "Order row inserted");
        Ok(())
    }

    /// Inserts the frozen line items for an order.
    pub async fn insert_items(
        conn: &mut SqliteConnection,
        items: &[OrderLineItem],
    ) -> DbResult<()> {
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items
                    (id, order_id, product_id, name_snapshot, unit_price_cents,
                     quantity, image, line_total_cents, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&item.id)
            .bind(&item.order_id)
            .bind(&item.product_id)
            .bind(&item.name_snapshot)
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .bind(&item.image)
            .bind(item.line_total_cents)
            .bind(item.created_at)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Inserts the invoice row inside the settlement transaction.
    pub async fn insert_invoice(conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invoices
                (id, invoice_number, order_id, subtotal_cents, discount_cents,
                 total_cents, discount_code, payment_method, payment_status,
                 created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.invoice_number)
        .bind(&invoice.order_id)
        .bind(invoice.subtotal_cents)
        .bind(invoice.discount_cents)
        .bind(invoice.total_cents)
        .bind(&invoice.discount_code)
        .bind(invoice.payment_method)
        .bind(invoice.payment_status)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *conn)
        .await?;

        debug!(invoice_id = %invoice.id, "Invoice row inserted");
        Ok(())
    }

    /// Inserts the invoice line items.
    pub async fn insert_invoice_items(
        conn: &mut SqliteConnection,
        items: &[InvoiceItem],
    ) -> DbResult<()> {
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO invoice_items
                    (id, invoice_id, product_id, name_snapshot, unit_price_cents,
                     quantity, image, line_total_cents, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&item.id)
            .bind(&item.invoice_id)
            .bind(&item.product_id)
            .bind(&item.name_snapshot)
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .bind(&item.image)
            .bind(item.line_total_cents)
            .bind(item.created_at)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetches an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Order> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))
    }

    /// Fetches an order by its human-readable order number.
    pub async fn get_by_order_number(&self, order_number: &str) -> DbResult<Order> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_number = ?1")
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_number))
    }

    /// Lists a user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = ?1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    /// Returns the frozen line items for an order.
    pub async fn items_for_order(&self, order_id: &str) -> DbResult<Vec<OrderLineItem>> {
        let items = sqlx::query_as::<_, OrderLineItem>(
            "SELECT * FROM order_items WHERE order_id = ?1 ORDER BY created_at",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Fetches the invoice created alongside an order.
    pub async fn invoice_for_order(&self, order_id: &str) -> DbResult<Invoice> {
        sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE order_id = ?1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", order_id))
    }

    /// Returns the line items for an invoice.
    pub async fn items_for_invoice(&self, invoice_id: &str) -> DbResult<Vec<InvoiceItem>> {
        let items = sqlx::query_as::<_, InvoiceItem>(
            "SELECT * FROM invoice_items WHERE invoice_id = ?1 ORDER BY created_at",
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    // =========================================================================
    // Payment Reconciliation
    // =========================================================================

    /// Marks an order confirmed and paid after the gateway reports a
    /// completed payment. Also updates the invoice: Order and Invoice are
    /// independent aggregates, so both are written explicitly.
    pub async fn mark_confirmed_and_paid(&self, order_id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE orders SET status = ?1, payment_status = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(OrderStatus::Confirmed)
        .bind(PaymentStatus::Paid)
        .bind(now)
        .bind(order_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id));
        }

        sqlx::query(
            "UPDATE invoices SET payment_status = ?1, updated_at = ?2 WHERE order_id = ?3",
        )
        .bind(PaymentStatus::Paid)
        .bind(now)
        .bind(order_id)
        .execute(&self.pool)
        .await?;

        info!(order_id, "Order confirmed and marked paid");
        Ok(())
    }

    /// Marks an order cancelled (failed or abandoned gateway payment).
    pub async fn mark_cancelled(&self, order_id: &str) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(OrderStatus::Cancelled)
                .bind(Utc::now())
                .bind(order_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id));
        }

        info!(order_id, "Order cancelled");
        Ok(())
    }
}
