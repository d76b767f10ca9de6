//! # Repository Traits
//!
//! Persistence seams over the managed database. Production uses the
//! PostgREST-backed store in `pay-supabase`; development and tests use
//! [`crate::memory::InMemoryStore`].
//!
//! Status transitions are conditional: `confirm_payment`,
//! `expire_payment` and `settle_pending_order` only touch rows that are
//! still `pending`, so at most one of two racing confirmations wins. A
//! transaction hash settles at most one crypto payment.

use crate::error::CommerceResult;
use crate::newsletter::{Subscriber, SubscriberEmail, SubscriberQuery};
use crate::order::{Order, Settlement};
use crate::payment::CryptoPayment;
use crate::product::{Product, ProductQuery};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// One page of results plus the total row count
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }
}

/// Pagination block returned alongside listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let pages = if limit == 0 {
            0
        } else {
            total.div_ceil(u64::from(limit))
        };
        Self {
            page,
            limit,
            total,
            pages,
        }
    }
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Order by id regardless of owner
    async fn get_order(&self, order_id: Uuid) -> CommerceResult<Option<Order>>;

    /// Order by id, only if owned by `user_id`
    async fn find_order_for_user(
        &self,
        order_id: Uuid,
        user_id: Uuid,
    ) -> CommerceResult<Option<Order>> {
        Ok(self
            .get_order(order_id)
            .await?
            .filter(|order| order.is_owned_by(user_id)))
    }

    /// Set `payment_status = paid`, `status = processing` and return the row
    async fn mark_order_paid(&self, order_id: Uuid, now: DateTime<Utc>) -> CommerceResult<Order>;

    /// Apply `settlement` to an order whose payment is still pending.
    ///
    /// `owner` restricts the update to that user's order. Returns `None` when
    /// no pending row matched.
    async fn settle_pending_order(
        &self,
        order_id: Uuid,
        owner: Option<Uuid>,
        settlement: Settlement,
        now: DateTime<Utc>,
    ) -> CommerceResult<Option<Order>>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert_payment(&self, payment: &CryptoPayment) -> CommerceResult<CryptoPayment>;

    async fn get_payment(&self, payment_id: Uuid) -> CommerceResult<Option<CryptoPayment>>;

    /// Payment carrying this transaction hash / signature
    async fn find_payment_by_transaction(
        &self,
        transaction_hash: &str,
    ) -> CommerceResult<Option<CryptoPayment>>;

    /// Flip a pending payment to `expired`. Returns false if it was no longer pending.
    async fn expire_payment(&self, payment_id: Uuid) -> CommerceResult<bool>;

    /// Flip a pending payment to `confirmed`.
    ///
    /// Returns `None` when the row was not pending anymore.
    async fn confirm_payment(
        &self,
        payment_id: Uuid,
        transaction_hash: &str,
        now: DateTime<Utc>,
    ) -> CommerceResult<Option<CryptoPayment>>;
}

#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    async fn find_subscriber(&self, email: &SubscriberEmail) -> CommerceResult<Option<Subscriber>>;

    async fn insert_subscriber(&self, subscriber: &Subscriber) -> CommerceResult<Subscriber>;

    /// Set the `subscribed` flag. Returns false if no row has this email.
    async fn set_subscribed(
        &self,
        email: &SubscriberEmail,
        subscribed: bool,
        now: DateTime<Utc>,
    ) -> CommerceResult<bool>;

    /// Newest first
    async fn list_subscribers(&self, query: SubscriberQuery) -> CommerceResult<Page<Subscriber>>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list_products(&self, query: &ProductQuery) -> CommerceResult<Page<Product>>;

    /// Active product by id
    async fn get_product(&self, product_id: Uuid) -> CommerceResult<Option<Product>>;
}

/// Everything the API needs from the database
pub trait Store:
    OrderRepository + PaymentRepository + SubscriberRepository + ProductRepository
{
    /// Backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Shared store handle
pub type SharedStore = Arc<dyn Store>;
