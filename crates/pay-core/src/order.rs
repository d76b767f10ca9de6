//! # Order Types
//!
//! Orders as stored in the `orders` table. Only the columns the payment
//! flow reads or writes are modelled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fulfilment status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

/// Payment status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

/// How the customer chose to pay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Stripe,
    Crypto,
}

/// Where an order lands once its payment is decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
}

impl Settlement {
    /// Payment captured; fulfilment can start
    pub const PAID: Settlement = Settlement {
        payment_status: PaymentStatus::Paid,
        status: OrderStatus::Processing,
    };

    /// Payment declined; the order is cancelled
    pub const FAILED: Settlement = Settlement {
        payment_status: PaymentStatus::Failed,
        status: OrderStatus::Cancelled,
    };
}

/// An order row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,

    /// Owner (auth user id)
    pub user_id: Uuid,

    #[serde(default)]
    pub status: OrderStatus,

    #[serde(default)]
    pub payment_status: PaymentStatus,

    /// Order total in USD
    pub total_amount: f64,

    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Order {
    /// Create a new pending order with generated ID
    pub fn new(user_id: Uuid, total_amount: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            total_amount,
            currency: default_currency(),
            payment_method: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: set payment method
    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    /// Builder: set payment status
    pub fn with_payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = status;
        self
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Payment can still be initiated for this order
    pub fn awaiting_payment(&self) -> bool {
        self.payment_status == PaymentStatus::Pending
    }

    /// Apply the transition made when a crypto payment confirms
    pub fn mark_paid(&mut self, now: DateTime<Utc>) {
        self.settle(Settlement::PAID, now);
    }

    pub fn settle(&mut self, settlement: Settlement, now: DateTime<Utc>) {
        self.payment_status = settlement.payment_status;
        self.status = settlement.status;
        self.updated_at = now;
    }
}
