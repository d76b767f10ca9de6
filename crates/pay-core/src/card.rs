//! # Card Payments
//!
//! Card checkout through a hosted gateway. The gateway owns the money
//! movement; this module only opens intents for payable orders and applies
//! the gateway's verdict to the order.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │          CardGateway (trait)             │
//! │  ├── create_intent()                     │
//! │  ├── retrieve_intent()                   │
//! │  └── verify_webhook()                    │
//! └──────────────────────────────────────────┘
//!                      ▲
//!             ┌────────┴────────┐
//!             │  StripeGateway  │
//!             │  (pay-stripe)   │
//!             └─────────────────┘
//! ```

use crate::auth::AuthUser;
use crate::error::{CommerceError, CommerceResult};
use crate::order::{Order, Settlement};
use crate::store::{OrderRepository, SharedStore};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Order total in the smallest currency unit
pub fn amount_in_cents(total: f64) -> i64 {
    (total * 100.0).round() as i64
}

/// Statement description: `Order #` plus the last 8 characters of the id
pub fn order_description(order_id: Uuid) -> String {
    let id = order_id.to_string();
    format!("Order #{}", &id[id.len() - 8..])
}

/// A gateway payment intent, as much of it as checkout needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,

    /// Handed to the browser to confirm the card
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Gateway status string (`succeeded`, `requires_payment_method`, ...)
    pub status: String,

    /// Amount in cents
    #[serde(default)]
    pub amount: i64,

    #[serde(default)]
    pub currency: String,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    fn metadata_uuid(&self, key: &str) -> Option<Uuid> {
        self.metadata.get(key).and_then(|v| Uuid::parse_str(v).ok())
    }

    pub fn order_id(&self) -> Option<Uuid> {
        self.metadata_uuid("order_id")
    }

    /// Owner recorded when the intent was created
    pub fn user_id(&self) -> Option<Uuid> {
        self.metadata_uuid("user_id")
    }

    /// Order transition implied by the intent status; `None` while undecided
    pub fn settlement(&self) -> Option<Settlement> {
        match self.status.as_str() {
            "succeeded" => Some(Settlement::PAID),
            "payment_failed" | "canceled" => Some(Settlement::FAILED),
            _ => None,
        }
    }
}

/// Webhook event types the checkout reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardEventKind {
    PaymentSucceeded,
    PaymentFailed,
    Other(String),
}

impl CardEventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "payment_intent.succeeded" => CardEventKind::PaymentSucceeded,
            "payment_intent.payment_failed" => CardEventKind::PaymentFailed,
            other => CardEventKind::Other(other.to_string()),
        }
    }
}

/// A verified webhook event
#[derive(Debug, Clone, PartialEq)]
pub struct CardEvent {
    pub id: String,
    pub kind: CardEventKind,
    /// Present when the event object is a payment intent
    pub intent: Option<PaymentIntent>,
}

/// Hosted card gateway.
#[async_trait]
pub trait CardGateway: Send + Sync {
    /// Open an intent for the full order total, tagged with order and owner ids
    async fn create_intent(&self, order: &Order) -> CommerceResult<PaymentIntent>;

    async fn retrieve_intent(&self, intent_id: &str) -> CommerceResult<PaymentIntent>;

    /// Check the signature header against the raw body and parse the event.
    ///
    /// Fails with `WebhookVerificationFailed` on any signature problem.
    fn verify_webhook(&self, payload: &[u8], signature: &str) -> CommerceResult<CardEvent>;

    /// Gateway name (for logging)
    fn provider_name(&self) -> &'static str;
}

/// Shared gateway handle
pub type SharedCardGateway = Arc<dyn CardGateway>;

/// Order state after syncing an intent, plus the gateway's raw status
#[derive(Debug, Clone, PartialEq)]
pub struct IntentSync {
    pub order: Order,
    pub intent_status: String,
}

/// Card checkout: open, sync and webhook settlement
#[derive(Clone)]
pub struct CardPaymentService {
    store: SharedStore,
    gateway: SharedCardGateway,
}

impl CardPaymentService {
    pub fn new(store: SharedStore, gateway: SharedCardGateway) -> Self {
        Self { store, gateway }
    }

    pub fn provider_name(&self) -> &'static str {
        self.gateway.provider_name()
    }

    /// Open an intent for an owned order that still awaits payment
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn create_intent(
        &self,
        user: &AuthUser,
        order_id: Uuid,
    ) -> CommerceResult<PaymentIntent> {
        let order = self
            .store
            .find_order_for_user(order_id, user.id)
            .await?
            .ok_or(CommerceError::OrderNotFound)?;
        if !order.awaiting_payment() {
            return Err(CommerceError::OrderAlreadyProcessed);
        }

        let intent = self.gateway.create_intent(&order).await?;
        info!(
            order_id = %order.id,
            intent_id = %intent.id,
            amount = intent.amount,
            "Opened card payment intent"
        );
        Ok(intent)
    }

    /// Pull the intent from the gateway and move the order accordingly.
    ///
    /// Only a pending order moves. An undecided intent, or an order that
    /// already left `pending`, returns the order as stored.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn sync_intent(
        &self,
        user: &AuthUser,
        intent_id: &str,
    ) -> CommerceResult<IntentSync> {
        let intent = self.gateway.retrieve_intent(intent_id).await?;
        if intent.user_id() != Some(user.id) {
            warn!(intent_id = %intent.id, "Payment intent synced by non-owner");
            return Err(CommerceError::Forbidden);
        }
        let order_id = intent.order_id().ok_or(CommerceError::OrderNotFound)?;

        let settled = match intent.settlement() {
            Some(settlement) => {
                self.store
                    .settle_pending_order(order_id, Some(user.id), settlement, Utc::now())
                    .await?
            }
            None => None,
        };

        let order = match settled {
            Some(order) => {
                info!(order_id = %order.id, status = %intent.status, "Card payment settled");
                order
            }
            None => self
                .store
                .find_order_for_user(order_id, user.id)
                .await?
                .ok_or(CommerceError::OrderNotFound)?,
        };

        Ok(IntentSync {
            order,
            intent_status: intent.status,
        })
    }

    /// Verify and apply a gateway webhook. Returns the order it settled, if any.
    #[instrument(skip(self, payload, signature))]
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> CommerceResult<Option<Order>> {
        let event = self
            .gateway
            .verify_webhook(payload, signature)
            .map_err(|e| {
                warn!(error = ?e, "Webhook verification failed");
                e
            })?;

        let settlement = match &event.kind {
            CardEventKind::PaymentSucceeded => Settlement::PAID,
            CardEventKind::PaymentFailed => Settlement::FAILED,
            CardEventKind::Other(event_type) => {
                info!(event_id = %event.id, event_type = %event_type, "Unhandled webhook event");
                return Ok(None);
            }
        };

        let Some(order_id) = event.intent.as_ref().and_then(PaymentIntent::order_id) else {
            warn!(event_id = %event.id, "Webhook intent carries no order id");
            return Ok(None);
        };

        let settled = self
            .store
            .settle_pending_order(order_id, None, settlement, Utc::now())
            .await?;
        match &settled {
            Some(order) => info!(
                event_id = %event.id,
                order_id = %order.id,
                payment_status = ?order.payment_status,
                "Order settled by webhook"
            ),
            None => info!(
                event_id = %event.id,
                order_id = %order_id,
                "Webhook for an order that is not pending"
            ),
        }
        Ok(settled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::order::{OrderStatus, PaymentStatus};

    /// Gateway that answers from a fixed intent and treats the signature
    /// as the event type
    struct FixedGateway {
        intent: PaymentIntent,
    }

    #[async_trait]
    impl CardGateway for FixedGateway {
        async fn create_intent(&self, order: &Order) -> CommerceResult<PaymentIntent> {
            let mut intent = self.intent.clone();
            intent.amount = amount_in_cents(order.total_amount);
            Ok(intent)
        }

        async fn retrieve_intent(&self, _intent_id: &str) -> CommerceResult<PaymentIntent> {
            Ok(self.intent.clone())
        }

        fn verify_webhook(&self, _payload: &[u8], signature: &str) -> CommerceResult<CardEvent> {
            if signature.is_empty() {
                return Err(CommerceError::WebhookVerificationFailed {
                    reason: "empty".into(),
                });
            }
            Ok(CardEvent {
                id: "evt_1".into(),
                kind: CardEventKind::from_type(signature),
                intent: Some(self.intent.clone()),
            })
        }

        fn provider_name(&self) -> &'static str {
            "fixed"
        }
    }

    fn intent_for(order: &Order, status: &str) -> PaymentIntent {
        PaymentIntent {
            id: "pi_123".into(),
            client_secret: Some("pi_123_secret_abc".into()),
            status: status.into(),
            amount: 0,
            currency: "usd".into(),
            metadata: HashMap::from([
                ("order_id".to_string(), order.id.to_string()),
                ("user_id".to_string(), order.user_id.to_string()),
            ]),
        }
    }

    async fn service_for(
        order: &Order,
        status: &str,
    ) -> (Arc<InMemoryStore>, CardPaymentService) {
        let store = Arc::new(InMemoryStore::new());
        store.put_order(order.clone()).await;
        let gateway = Arc::new(FixedGateway {
            intent: intent_for(order, status),
        });
        (store.clone(), CardPaymentService::new(store, gateway))
    }

    #[test]
    fn test_amount_and_description() {
        assert_eq!(amount_in_cents(19.99), 1999);
        assert_eq!(amount_in_cents(0.105), 11);
        let id = Uuid::parse_str("0b0c5a4e-6f8b-4b59-9d51-0d7c1f1f2a01").unwrap();
        assert_eq!(order_description(id), "Order #1f1f2a01");
    }

    #[test]
    fn test_intent_settlement() {
        let order = Order::new(Uuid::new_v4(), 10.0);
        assert_eq!(intent_for(&order, "succeeded").settlement(), Some(Settlement::PAID));
        assert_eq!(intent_for(&order, "payment_failed").settlement(), Some(Settlement::FAILED));
        assert_eq!(intent_for(&order, "processing").settlement(), None);
        assert_eq!(intent_for(&order, "succeeded").order_id(), Some(order.id));
    }

    #[tokio::test]
    async fn test_create_intent_requires_pending_owned_order() {
        let owner = AuthUser::new(Uuid::new_v4());
        let order = Order::new(owner.id, 42.5);
        let (store, service) = service_for(&order, "requires_payment_method").await;

        let intent = service.create_intent(&owner, order.id).await.unwrap();
        assert_eq!(intent.amount, 4250);

        let stranger = AuthUser::new(Uuid::new_v4());
        assert!(matches!(
            service.create_intent(&stranger, order.id).await,
            Err(CommerceError::OrderNotFound)
        ));

        store
            .put_order(order.clone().with_payment_status(PaymentStatus::Paid))
            .await;
        assert!(matches!(
            service.create_intent(&owner, order.id).await,
            Err(CommerceError::OrderAlreadyProcessed)
        ));
    }

    #[tokio::test]
    async fn test_sync_succeeded_intent_marks_order_paid() {
        let owner = AuthUser::new(Uuid::new_v4());
        let order = Order::new(owner.id, 42.5);
        let (_, service) = service_for(&order, "succeeded").await;

        let sync = service.sync_intent(&owner, "pi_123").await.unwrap();
        assert_eq!(sync.intent_status, "succeeded");
        assert_eq!(sync.order.payment_status, PaymentStatus::Paid);
        assert_eq!(sync.order.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_sync_leaves_settled_order_alone() {
        let owner = AuthUser::new(Uuid::new_v4());
        let order = Order::new(owner.id, 42.5);
        let (store, service) = service_for(&order, "payment_failed").await;
        store.mark_order_paid(order.id, Utc::now()).await.unwrap();

        let sync = service.sync_intent(&owner, "pi_123").await.unwrap();
        assert_eq!(sync.intent_status, "payment_failed");
        assert_eq!(sync.order.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_sync_by_non_owner_is_forbidden() {
        let order = Order::new(Uuid::new_v4(), 42.5);
        let (_, service) = service_for(&order, "succeeded").await;

        let stranger = AuthUser::new(Uuid::new_v4());
        let err = service.sync_intent(&stranger, "pi_123").await.unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.public_message(), "Unauthorized");
    }

    #[tokio::test]
    async fn test_webhook_failure_cancels_order() {
        let order = Order::new(Uuid::new_v4(), 42.5);
        let (store, service) = service_for(&order, "requires_payment_method").await;

        let settled = service
            .handle_webhook(b"{}", "payment_intent.payment_failed")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(settled.payment_status, PaymentStatus::Failed);
        assert_eq!(settled.status, OrderStatus::Cancelled);

        let replay = service
            .handle_webhook(b"{}", "payment_intent.succeeded")
            .await
            .unwrap();
        assert!(replay.is_none());
        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_webhook_ignores_other_events_and_rejects_bad_signatures() {
        let order = Order::new(Uuid::new_v4(), 42.5);
        let (_, service) = service_for(&order, "succeeded").await;

        assert!(service
            .handle_webhook(b"{}", "charge.refunded")
            .await
            .unwrap()
            .is_none());
        let err = service.handle_webhook(b"{}", "").await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "Invalid signature");
    }
}
