//! # Supabase Store
//!
//! `Store` implementation over the tables `orders`, `crypto_payments`,
//! `newsletter_subscribers` and `products`.
//!
//! Status transitions are PATCHes filtered on the current status, so the
//! database decides which of two racing writers wins. A transaction hash
//! reused across payments is rejected by the partial unique index in
//! `migrations/0001_crypto_payment_transaction_hash.sql`.

use crate::client::{eq, Filter, PostgrestClient};
use crate::config::SupabaseConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pay_core::{
    CommerceError, CommerceResult, CryptoPayment, CryptoPaymentStatus, Order, OrderRepository,
    OrderStatus, Page, PaymentRepository, PaymentStatus, Product, ProductQuery,
    ProductRepository, Settlement, Store, Subscriber, SubscriberEmail, SubscriberQuery,
    SubscriberRepository,
};
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

const ORDERS: &str = "orders";
const PAYMENTS: &str = "crypto_payments";
const SUBSCRIBERS: &str = "newsletter_subscribers";
const PRODUCTS: &str = "products";

/// Postgres-backed store reached through PostgREST
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: PostgrestClient,
}

impl SupabaseStore {
    pub fn new(config: SupabaseConfig) -> CommerceResult<Self> {
        Ok(Self {
            client: PostgrestClient::new(config)?,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> CommerceResult<Self> {
        Self::new(SupabaseConfig::from_env()?)
    }
}

fn paging(offset: u64, limit: u32) -> [Filter; 2] {
    [("offset", offset.to_string()), ("limit", limit.to_string())]
}

/// Strip characters with meaning inside a PostgREST `or=(...)` filter
fn search_term(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            ',' | '(' | ')' | '*' | '"' | '\\' => ' ',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

// ===== Patch Bodies =====

#[derive(Serialize)]
struct OrderSettlePatch {
    payment_status: PaymentStatus,
    status: OrderStatus,
    updated_at: DateTime<Utc>,
}

impl OrderSettlePatch {
    fn new(settlement: Settlement, now: DateTime<Utc>) -> Self {
        Self {
            payment_status: settlement.payment_status,
            status: settlement.status,
            updated_at: now,
        }
    }
}

#[derive(Serialize)]
struct PaymentStatusPatch {
    status: CryptoPaymentStatus,
}

#[derive(Serialize)]
struct PaymentConfirmPatch<'a> {
    status: CryptoPaymentStatus,
    transaction_hash: &'a str,
    confirmed_at: DateTime<Utc>,
}

/// Insert body; id and timestamps come from column defaults
#[derive(Serialize)]
struct NewSubscriber<'a> {
    email: &'a SubscriberEmail,
    subscribed: bool,
}

#[derive(Serialize)]
struct SubscribedPatch {
    subscribed: bool,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl OrderRepository for SupabaseStore {
    async fn get_order(&self, order_id: Uuid) -> CommerceResult<Option<Order>> {
        self.client.select_one(ORDERS, &[eq("id", order_id)]).await
    }

    async fn find_order_for_user(
        &self,
        order_id: Uuid,
        user_id: Uuid,
    ) -> CommerceResult<Option<Order>> {
        self.client
            .select_one(ORDERS, &[eq("id", order_id), eq("user_id", user_id)])
            .await
    }

    #[instrument(skip(self))]
    async fn mark_order_paid(&self, order_id: Uuid, now: DateTime<Utc>) -> CommerceResult<Order> {
        let patch = OrderSettlePatch::new(Settlement::PAID, now);
        self.client
            .update::<_, Order>(ORDERS, &[eq("id", order_id)], &patch)
            .await?
            .into_iter()
            .next()
            .ok_or(CommerceError::OrderNotFound)
    }

    #[instrument(skip(self))]
    async fn settle_pending_order(
        &self,
        order_id: Uuid,
        owner: Option<Uuid>,
        settlement: Settlement,
        now: DateTime<Utc>,
    ) -> CommerceResult<Option<Order>> {
        let mut filters = vec![
            eq("id", order_id),
            eq("payment_status", "pending"),
        ];
        if let Some(user_id) = owner {
            filters.push(eq("user_id", user_id));
        }
        let rows: Vec<Order> = self
            .client
            .update(ORDERS, &filters, &OrderSettlePatch::new(settlement, now))
            .await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl PaymentRepository for SupabaseStore {
    #[instrument(skip(self, payment), fields(payment_id = %payment.id))]
    async fn insert_payment(&self, payment: &CryptoPayment) -> CommerceResult<CryptoPayment> {
        self.client.insert(PAYMENTS, payment).await
    }

    async fn get_payment(&self, payment_id: Uuid) -> CommerceResult<Option<CryptoPayment>> {
        self.client.select_one(PAYMENTS, &[eq("id", payment_id)]).await
    }

    async fn find_payment_by_transaction(
        &self,
        transaction_hash: &str,
    ) -> CommerceResult<Option<CryptoPayment>> {
        self.client
            .select_one(PAYMENTS, &[eq("transaction_hash", transaction_hash)])
            .await
    }

    async fn expire_payment(&self, payment_id: Uuid) -> CommerceResult<bool> {
        let patch = PaymentStatusPatch {
            status: CryptoPaymentStatus::Expired,
        };
        let rows: Vec<CryptoPayment> = self
            .client
            .update(
                PAYMENTS,
                &[eq("id", payment_id), eq("status", CryptoPaymentStatus::Pending)],
                &patch,
            )
            .await?;
        Ok(!rows.is_empty())
    }

    #[instrument(skip(self, transaction_hash))]
    async fn confirm_payment(
        &self,
        payment_id: Uuid,
        transaction_hash: &str,
        now: DateTime<Utc>,
    ) -> CommerceResult<Option<CryptoPayment>> {
        let patch = PaymentConfirmPatch {
            status: CryptoPaymentStatus::Confirmed,
            transaction_hash,
            confirmed_at: now,
        };
        let rows: Vec<CryptoPayment> = self
            .client
            .update(
                PAYMENTS,
                &[eq("id", payment_id), eq("status", CryptoPaymentStatus::Pending)],
                &patch,
            )
            .await
            .map_err(|e| match e {
                CommerceError::Conflict(_) => CommerceError::TransactionAlreadyUsed,
                other => other,
            })?;
        if rows.is_empty() {
            debug!("Conditional confirm matched no pending row");
        }
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl SubscriberRepository for SupabaseStore {
    async fn find_subscriber(&self, email: &SubscriberEmail) -> CommerceResult<Option<Subscriber>> {
        self.client
            .select_one(SUBSCRIBERS, &[eq("email", email)])
            .await
    }

    async fn insert_subscriber(&self, subscriber: &Subscriber) -> CommerceResult<Subscriber> {
        let row = NewSubscriber {
            email: &subscriber.email,
            subscribed: subscriber.subscribed,
        };
        self.client.insert(SUBSCRIBERS, &row).await
    }

    async fn set_subscribed(
        &self,
        email: &SubscriberEmail,
        subscribed: bool,
        now: DateTime<Utc>,
    ) -> CommerceResult<bool> {
        let patch = SubscribedPatch {
            subscribed,
            updated_at: now,
        };
        let rows: Vec<Subscriber> = self
            .client
            .update(SUBSCRIBERS, &[eq("email", email)], &patch)
            .await?;
        Ok(!rows.is_empty())
    }

    async fn list_subscribers(&self, query: SubscriberQuery) -> CommerceResult<Page<Subscriber>> {
        let offset = u64::from(query.page.saturating_sub(1)) * u64::from(query.limit);
        let mut filters: Vec<Filter> = vec![("order", "created_at.desc".to_string())];
        if let Some(flag) = query.subscribed {
            filters.push(eq("subscribed", flag));
        }
        filters.extend(paging(offset, query.limit));

        let (items, total) = self.client.select_counted(SUBSCRIBERS, &filters).await?;
        Ok(Page::new(items, total))
    }
}

#[async_trait]
impl ProductRepository for SupabaseStore {
    #[instrument(skip(self))]
    async fn list_products(&self, query: &ProductQuery) -> CommerceResult<Page<Product>> {
        let mut filters: Vec<Filter> = vec![eq("active", true)];
        if let Some(category) = query.category {
            filters.push(eq("category", category.as_str()));
        }
        if query.featured_only {
            filters.push(eq("featured", true));
        }
        if let Some(term) = query.search.as_deref().map(search_term) {
            if !term.is_empty() {
                filters.push((
                    "or",
                    format!("(name.ilike.*{0}*,description.ilike.*{0}*)", term),
                ));
            }
        }
        filters.push((
            "order",
            format!("{}.{}", query.sort.column(), query.order.as_str()),
        ));
        filters.extend(paging(query.offset(), query.limit));

        let (items, total) = self.client.select_counted(PRODUCTS, &filters).await?;
        Ok(Page::new(items, total))
    }

    async fn get_product(&self, product_id: Uuid) -> CommerceResult<Option<Product>> {
        self.client
            .select_one(PRODUCTS, &[eq("id", product_id), eq("active", true)])
            .await
    }
}

impl Store for SupabaseStore {
    fn backend_name(&self) -> &'static str {
        "supabase"
    }
}
