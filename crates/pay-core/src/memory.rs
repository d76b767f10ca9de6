//! # In-Memory Store
//!
//! `Store` implementation backed by hash maps behind a tokio `RwLock`.
//! Used for local development (`STORE_BACKEND=memory`) and tests.

use crate::error::{CommerceError, CommerceResult};
use crate::newsletter::{Subscriber, SubscriberEmail, SubscriberQuery};
use crate::order::{Order, Settlement};
use crate::payment::{CryptoPayment, CryptoPaymentStatus};
use crate::product::{Product, ProductCatalog, ProductQuery};
use crate::store::{
    OrderRepository, Page, PaymentRepository, ProductRepository, Store, SubscriberRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    payments: HashMap<Uuid, CryptoPayment>,
    subscribers: HashMap<SubscriberEmail, Subscriber>,
    products: HashMap<Uuid, Product>,
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a product catalog
    pub fn with_catalog(catalog: ProductCatalog) -> Self {
        let tables = Tables {
            products: catalog
                .products
                .into_iter()
                .map(|p| (p.id, p))
                .collect(),
            ..Default::default()
        };
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Insert or replace an order (checkout lives outside this service)
    pub async fn put_order(&self, order: Order) {
        self.tables.write().await.orders.insert(order.id, order);
    }

    /// Insert or replace a payment row as-is
    pub async fn put_payment(&self, payment: CryptoPayment) {
        self.tables.write().await.payments.insert(payment.id, payment);
    }

    /// Insert or replace a product
    pub async fn put_product(&self, product: Product) {
        self.tables.write().await.products.insert(product.id, product);
    }

    pub async fn product_count(&self) -> usize {
        self.tables.read().await.products.len()
    }
}

fn paginate<T>(items: Vec<T>, offset: u64, limit: u32) -> Page<T> {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(limit as usize)
        .collect();
    Page::new(items, total)
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn get_order(&self, order_id: Uuid) -> CommerceResult<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&order_id).cloned())
    }

    async fn mark_order_paid(&self, order_id: Uuid, now: DateTime<Utc>) -> CommerceResult<Order> {
        let mut tables = self.tables.write().await;
        let order = tables
            .orders
            .get_mut(&order_id)
            .ok_or(CommerceError::OrderNotFound)?;
        order.mark_paid(now);
        Ok(order.clone())
    }

    async fn settle_pending_order(
        &self,
        order_id: Uuid,
        owner: Option<Uuid>,
        settlement: Settlement,
        now: DateTime<Utc>,
    ) -> CommerceResult<Option<Order>> {
        let mut tables = self.tables.write().await;
        match tables.orders.get_mut(&order_id) {
            Some(order)
                if order.awaiting_payment() && owner.map_or(true, |id| order.is_owned_by(id)) =>
            {
                order.settle(settlement, now);
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn insert_payment(&self, payment: &CryptoPayment) -> CommerceResult<CryptoPayment> {
        let mut tables = self.tables.write().await;
        if tables.payments.contains_key(&payment.id) {
            return Err(CommerceError::Storage(format!(
                "duplicate crypto payment id {}",
                payment.id
            )));
        }
        tables.payments.insert(payment.id, payment.clone());
        Ok(payment.clone())
    }

    async fn get_payment(&self, payment_id: Uuid) -> CommerceResult<Option<CryptoPayment>> {
        Ok(self.tables.read().await.payments.get(&payment_id).cloned())
    }

    async fn find_payment_by_transaction(
        &self,
        transaction_hash: &str,
    ) -> CommerceResult<Option<CryptoPayment>> {
        Ok(self
            .tables
            .read()
            .await
            .payments
            .values()
            .find(|p| p.transaction_hash.as_deref() == Some(transaction_hash))
            .cloned())
    }

    async fn expire_payment(&self, payment_id: Uuid) -> CommerceResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.payments.get_mut(&payment_id) {
            Some(payment) if payment.is_pending() => {
                payment.status = CryptoPaymentStatus::Expired;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn confirm_payment(
        &self,
        payment_id: Uuid,
        transaction_hash: &str,
        now: DateTime<Utc>,
    ) -> CommerceResult<Option<CryptoPayment>> {
        let mut tables = self.tables.write().await;
        let pending = tables
            .payments
            .get(&payment_id)
            .is_some_and(CryptoPayment::is_pending);
        if !pending {
            return Ok(None);
        }
        let hash_taken = tables.payments.values().any(|p| {
            p.id != payment_id && p.transaction_hash.as_deref() == Some(transaction_hash)
        });
        if hash_taken {
            return Err(CommerceError::TransactionAlreadyUsed);
        }

        match tables.payments.get_mut(&payment_id) {
            Some(payment) => {
                payment.confirm(transaction_hash, now);
                Ok(Some(payment.clone()))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SubscriberRepository for InMemoryStore {
    async fn find_subscriber(&self, email: &SubscriberEmail) -> CommerceResult<Option<Subscriber>> {
        Ok(self.tables.read().await.subscribers.get(email).cloned())
    }

    async fn insert_subscriber(&self, subscriber: &Subscriber) -> CommerceResult<Subscriber> {
        let mut tables = self.tables.write().await;
        if tables.subscribers.contains_key(&subscriber.email) {
            return Err(CommerceError::Conflict(
                "duplicate key value violates unique constraint on email".to_string(),
            ));
        }
        tables
            .subscribers
            .insert(subscriber.email.clone(), subscriber.clone());
        Ok(subscriber.clone())
    }

    async fn set_subscribed(
        &self,
        email: &SubscriberEmail,
        subscribed: bool,
        now: DateTime<Utc>,
    ) -> CommerceResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.subscribers.get_mut(email) {
            Some(subscriber) => {
                subscriber.subscribed = subscribed;
                subscriber.updated_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_subscribers(&self, query: SubscriberQuery) -> CommerceResult<Page<Subscriber>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Subscriber> = tables
            .subscribers
            .values()
            .filter(|s| query.subscribed.map_or(true, |flag| s.subscribed == flag))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = u64::from(query.page.saturating_sub(1)) * u64::from(query.limit);
        Ok(paginate(rows, offset, query.limit))
    }
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn list_products(&self, query: &ProductQuery) -> CommerceResult<Page<Product>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Product> = tables
            .products
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        rows.sort_by(|a, b| query.compare(a, b));

        Ok(paginate(rows, query.offset(), query.limit))
    }

    async fn get_product(&self, product_id: Uuid) -> CommerceResult<Option<Product>> {
        Ok(self
            .tables
            .read()
            .await
            .products
            .get(&product_id)
            .filter(|p| p.active)
            .cloned())
    }
}

impl Store for InMemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
