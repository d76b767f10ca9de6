//! # Payment & Newsletter Services
//!
//! The request-independent business flows behind the HTTP handlers.
//! Handlers validate presence of fields; services own every lookup,
//! ownership check and status transition.

use crate::auth::AuthUser;
use crate::crypto::{sol_to_lamports, CryptoCurrency, ExchangeRates};
use crate::error::{CommerceError, CommerceResult};
use crate::mailer::{Email, SharedMailer};
use crate::newsletter::{
    SubscribeOutcome, Subscriber, SubscriberEmail, SubscriberQuery, UnsubscribeSigner,
};
use crate::order::Order;
use crate::payment::{CryptoPayment, CryptoPaymentStatus, PaymentRail};
use crate::store::{
    OrderRepository, Page, PaymentRepository, SharedStore, SubscriberRepository,
};
use crate::verifier::{TransactionStatus, VerifierSelector};
use crate::wallet::{is_solana_address, payment_uri, MerchantWallets};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// A freshly opened payment on the generic crypto rail
#[derive(Debug, Clone, PartialEq)]
pub struct CryptoQuote {
    pub payment: CryptoPayment,
    /// Wallet deep link for the QR code
    pub qr_code_data: String,
}

/// A freshly opened payment on the Solana rail
#[derive(Debug, Clone, PartialEq)]
pub struct SolanaQuote {
    pub payment: CryptoPayment,
    pub amount_lamports: u64,
    pub payer_wallet: String,
}

/// Result of a successful confirmation
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub payment: CryptoPayment,
    pub order: Order,
}

/// Chain status for a signature, plus the payment that carries it (if any)
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureStatus {
    pub chain: TransactionStatus,
    pub payment: Option<CryptoPayment>,
}

/// Crypto payment lifecycle: open, confirm, query
#[derive(Clone)]
pub struct PaymentService {
    store: SharedStore,
    verifiers: VerifierSelector,
    rates: ExchangeRates,
    wallets: MerchantWallets,
}

impl PaymentService {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            verifiers: VerifierSelector::default(),
            rates: ExchangeRates::default(),
            wallets: MerchantWallets::default(),
        }
    }

    /// Builder: set verifiers
    pub fn with_verifiers(mut self, verifiers: VerifierSelector) -> Self {
        self.verifiers = verifiers;
        self
    }

    /// Builder: set exchange rates
    pub fn with_rates(mut self, rates: ExchangeRates) -> Self {
        self.rates = rates;
        self
    }

    /// Builder: set merchant wallets
    pub fn with_wallets(mut self, wallets: MerchantWallets) -> Self {
        self.wallets = wallets;
        self
    }

    pub fn verifiers(&self) -> &VerifierSelector {
        &self.verifiers
    }

    pub fn wallets(&self) -> &MerchantWallets {
        &self.wallets
    }

    /// Order must belong to the caller and still await payment
    async fn payable_order(&self, user: &AuthUser, order_id: Uuid) -> CommerceResult<Order> {
        let order = self
            .store
            .find_order_for_user(order_id, user.id)
            .await?
            .ok_or(CommerceError::OrderNotFound)?;

        if !order.awaiting_payment() {
            return Err(CommerceError::OrderAlreadyProcessed);
        }
        Ok(order)
    }

    async fn open(
        &self,
        order: &Order,
        currency: CryptoCurrency,
        rail: PaymentRail,
    ) -> CommerceResult<CryptoPayment> {
        let amount = self.rates.convert(order.total_amount, currency)?;
        let address = self.wallets.address(currency);
        let payment = CryptoPayment::open(order, currency, amount, address, rail, Utc::now());

        let stored = self.store.insert_payment(&payment).await?;
        info!(
            payment_id = %stored.id,
            order_id = %order.id,
            currency = %currency,
            amount = stored.amount,
            "Opened crypto payment"
        );
        Ok(stored)
    }

    /// Open a payment on the generic crypto rail (30 minute window)
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn open_crypto_payment(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        currency: CryptoCurrency,
    ) -> CommerceResult<CryptoQuote> {
        let order = self.payable_order(user, order_id).await?;
        let payment = self.open(&order, currency, PaymentRail::Crypto).await?;
        let qr_code_data = payment_uri(currency, &payment.address, payment.amount);

        Ok(CryptoQuote {
            payment,
            qr_code_data,
        })
    }

    /// Open a SOL payment on the Solana rail (15 minute window)
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn open_solana_payment(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        payer_wallet: &str,
    ) -> CommerceResult<SolanaQuote> {
        if !is_solana_address(payer_wallet) {
            return Err(CommerceError::InvalidRequest(
                "Invalid payer wallet address".to_string(),
            ));
        }

        let order = self.payable_order(user, order_id).await?;
        let payment = self
            .open(&order, CryptoCurrency::SOL, PaymentRail::Solana)
            .await?;
        let amount_lamports = sol_to_lamports(payment.amount);

        Ok(SolanaQuote {
            payment,
            amount_lamports,
            payer_wallet: payer_wallet.to_string(),
        })
    }

    /// Payment visible through `rail` whose order belongs to the caller
    async fn owned_payment(
        &self,
        user: &AuthUser,
        payment_id: Uuid,
        rail: PaymentRail,
    ) -> CommerceResult<CryptoPayment> {
        let payment = self
            .store
            .get_payment(payment_id)
            .await?
            .filter(|p| rail.accepts(p.currency))
            .ok_or(CommerceError::PaymentNotFound { rail: rail.label() })?;

        self.ensure_owner(user, &payment).await?;
        Ok(payment)
    }

    async fn ensure_owner(&self, user: &AuthUser, payment: &CryptoPayment) -> CommerceResult<()> {
        let owned = self
            .store
            .get_order(payment.order_id)
            .await?
            .map(|order| order.is_owned_by(user.id))
            .unwrap_or(false);

        if owned {
            Ok(())
        } else {
            warn!(
                payment_id = %payment.id,
                user_id = %user.id,
                "Payment accessed by non-owner"
            );
            Err(CommerceError::Forbidden)
        }
    }

    /// Accept a transaction reference and settle the order.
    ///
    /// Pending and unexpired is required; an expired payment is flipped to
    /// `expired` on the way out. A reference can settle one payment only.
    /// The final transition is conditional, so a concurrent confirmation
    /// that lost the race sees `PaymentAlreadyProcessed`.
    #[instrument(skip(self, user, reference), fields(user_id = %user.id))]
    pub async fn confirm_payment(
        &self,
        user: &AuthUser,
        payment_id: Uuid,
        reference: &str,
        rail: PaymentRail,
    ) -> CommerceResult<Confirmation> {
        let payment = self.owned_payment(user, payment_id, rail).await?;

        if !payment.is_pending() {
            return Err(CommerceError::PaymentAlreadyProcessed);
        }

        let now = Utc::now();
        if payment.is_past_expiry(now) {
            self.store.expire_payment(payment.id).await?;
            info!(payment_id = %payment.id, "Payment expired before confirmation");
            return Err(CommerceError::PaymentExpired);
        }

        if let Some(holder) = self.store.find_payment_by_transaction(reference).await? {
            if holder.id != payment.id {
                warn!(
                    payment_id = %payment.id,
                    holder_id = %holder.id,
                    "Transaction reference already settles another payment"
                );
                return Err(CommerceError::TransactionAlreadyUsed);
            }
        }

        let verifier = self.verifiers.get(payment.currency);
        let status = verifier
            .transaction_status(payment.currency, reference)
            .await?;
        if !status.is_success() {
            warn!(
                payment_id = %payment.id,
                verifier = verifier.verifier_name(),
                confirmed = status.confirmed,
                error = ?status.error,
                "Transaction did not verify"
            );
            return Err(CommerceError::VerificationFailed {
                reason: status
                    .error
                    .unwrap_or_else(|| "transaction not confirmed".to_string()),
            });
        }

        let payment = self
            .store
            .confirm_payment(payment.id, reference, now)
            .await?
            .ok_or(CommerceError::PaymentAlreadyProcessed)?;

        let order = self.store.mark_order_paid(payment.order_id, now).await?;

        info!(
            payment_id = %payment.id,
            order_id = %order.id,
            verifier = verifier.verifier_name(),
            "Crypto payment confirmed"
        );

        Ok(Confirmation { payment, order })
    }

    /// Current payment status, expiring a stale pending record first
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn payment_status(
        &self,
        user: &AuthUser,
        payment_id: Uuid,
    ) -> CommerceResult<CryptoPayment> {
        let mut payment = self
            .owned_payment(user, payment_id, PaymentRail::Crypto)
            .await?;

        if payment.is_stale(Utc::now()) {
            if self.store.expire_payment(payment.id).await? {
                debug!(payment_id = %payment.id, "Lazily expired payment");
                payment.status = CryptoPaymentStatus::Expired;
            } else if let Some(current) = self.store.get_payment(payment.id).await? {
                payment = current;
            }
        }

        Ok(payment)
    }

    /// On-chain status of a Solana signature
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn signature_status(
        &self,
        user: &AuthUser,
        signature: &str,
    ) -> CommerceResult<SignatureStatus> {
        let payment = self.store.find_payment_by_transaction(signature).await?;
        if let Some(payment) = &payment {
            self.ensure_owner(user, payment).await?;
        }

        let chain = self
            .verifiers
            .get(CryptoCurrency::SOL)
            .transaction_status(CryptoCurrency::SOL, signature)
            .await?;

        Ok(SignatureStatus { chain, payment })
    }
}

/// Newsletter subscribe / unsubscribe / listing
#[derive(Clone)]
pub struct NewsletterService {
    store: SharedStore,
    mailer: SharedMailer,
    signer: Option<UnsubscribeSigner>,
    base_url: String,
}

impl NewsletterService {
    pub fn new(store: SharedStore, mailer: SharedMailer, base_url: impl Into<String>) -> Self {
        Self {
            store,
            mailer,
            signer: None,
            base_url: base_url.into(),
        }
    }

    /// Builder: require signed unsubscribe links
    pub fn with_signer(mut self, signer: UnsubscribeSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Signed one-click unsubscribe link, if signing is enabled
    pub fn unsubscribe_url(&self, email: &SubscriberEmail) -> Option<String> {
        let signer = self.signer.as_ref()?;
        let endpoint = format!("{}/api/newsletter", self.base_url.trim_end_matches('/'));
        url::Url::parse_with_params(
            &endpoint,
            &[("email", email.as_str()), ("token", signer.token(email).as_str())],
        )
        .map(String::from)
        .ok()
    }

    /// Subscribe or reactivate. The welcome email is best-effort.
    #[instrument(skip(self))]
    pub async fn subscribe(&self, raw_email: &str) -> CommerceResult<SubscribeOutcome> {
        let email = SubscriberEmail::parse(raw_email)?;

        if let Some(existing) = self.store.find_subscriber(&email).await? {
            if existing.subscribed {
                return Err(CommerceError::AlreadySubscribed);
            }
            self.store.set_subscribed(&email, true, Utc::now()).await?;
            info!(subscriber_id = %existing.id, "Newsletter subscription reactivated");
            return Ok(SubscribeOutcome::Reactivated);
        }

        let subscriber = self
            .store
            .insert_subscriber(&Subscriber::new(email.clone(), Utc::now()))
            .await
            .map_err(|e| match e {
                CommerceError::Conflict(_) => CommerceError::AlreadySubscribed,
                other => other,
            })?;
        info!(subscriber_id = %subscriber.id, "Newsletter subscription created");

        let welcome = Email::welcome(&email, self.unsubscribe_url(&email).as_deref());
        if let Err(e) = self.mailer.send(&welcome).await {
            warn!(
                error = %e,
                mailer = self.mailer.mailer_name(),
                "Failed to send welcome email"
            );
        }

        Ok(SubscribeOutcome::Created(subscriber))
    }

    /// Unsubscribe; succeeds even when the address was never subscribed.
    /// The address is only normalised, not shape-checked.
    #[instrument(skip(self, token))]
    pub async fn unsubscribe(&self, raw_email: &str, token: Option<&str>) -> CommerceResult<()> {
        let email = SubscriberEmail::normalize(raw_email)?;

        if let Some(signer) = &self.signer {
            let valid = token.map(|t| signer.verify(&email, t)).unwrap_or(false);
            if !valid {
                return Err(CommerceError::InvalidUnsubscribeToken);
            }
        }

        if !self.store.set_subscribed(&email, false, Utc::now()).await? {
            debug!("Unsubscribe for unknown address");
        }
        Ok(())
    }

    pub async fn list(&self, query: SubscriberQuery) -> CommerceResult<Page<Subscriber>> {
        self.store.list_subscribers(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::{LoggingMailer, Mailer};
    use crate::memory::InMemoryStore;
    use crate::order::{OrderStatus, PaymentStatus, Settlement};
    use crate::product::{Product, ProductQuery};
    use crate::store::{ProductRepository, Store};
    use crate::verifier::TransactionVerifier;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::sync::Mutex;
    use tokio::sync::Barrier;

    const PAYER: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

    struct Fixture {
        store: Arc<InMemoryStore>,
        service: PaymentService,
        owner: AuthUser,
        order: Order,
    }

    async fn fixture(total: f64) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let owner = AuthUser::new(Uuid::new_v4());
        let order = Order::new(owner.id, total);
        store.put_order(order.clone()).await;
        let service = PaymentService::new(store.clone());
        Fixture {
            store,
            service,
            owner,
            order,
        }
    }

    #[tokio::test]
    async fn test_btc_quote_amount() {
        let f = fixture(100.0).await;
        let quote = f
            .service
            .open_crypto_payment(&f.owner, f.order.id, CryptoCurrency::BTC)
            .await
            .unwrap();

        assert_eq!(quote.payment.amount, 100.0 * 0.000016);
        assert_eq!(quote.payment.status, CryptoPaymentStatus::Pending);
        assert_eq!(quote.payment.expires_at - quote.payment.created_at, Duration::minutes(30));
        assert!(quote
            .qr_code_data
            .starts_with("bitcoin:1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa?amount="));
    }

    #[tokio::test]
    async fn test_open_requires_owned_order() {
        let f = fixture(100.0).await;
        let stranger = AuthUser::new(Uuid::new_v4());
        let err = f
            .service
            .open_crypto_payment(&stranger, f.order.id, CryptoCurrency::ETH)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::OrderNotFound));
    }

    #[tokio::test]
    async fn test_open_rejects_paid_order() {
        let f = fixture(100.0).await;
        f.store
            .put_order(f.order.clone().with_payment_status(PaymentStatus::Paid))
            .await;
        let err = f
            .service
            .open_crypto_payment(&f.owner, f.order.id, CryptoCurrency::ETH)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::OrderAlreadyProcessed));
    }

    #[tokio::test]
    async fn test_solana_quote() {
        let f = fixture(123.45).await;
        let quote = f
            .service
            .open_solana_payment(&f.owner, f.order.id, PAYER)
            .await
            .unwrap();

        assert_eq!(quote.payment.currency, CryptoCurrency::SOL);
        assert_eq!(quote.amount_lamports, sol_to_lamports(123.45 * 0.01));
        assert_eq!(quote.payment.expires_at - quote.payment.created_at, Duration::minutes(15));

        let err = f
            .service
            .open_solana_payment(&f.owner, f.order.id, "not a wallet")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid payer wallet address");
    }

    #[tokio::test]
    async fn test_confirm_marks_order_processing() {
        let f = fixture(100.0).await;
        let quote = f
            .service
            .open_crypto_payment(&f.owner, f.order.id, CryptoCurrency::USDT)
            .await
            .unwrap();

        let confirmation = f
            .service
            .confirm_payment(&f.owner, quote.payment.id, "0xfeed", PaymentRail::Crypto)
            .await
            .unwrap();

        assert_eq!(confirmation.payment.status, CryptoPaymentStatus::Confirmed);
        assert_eq!(confirmation.payment.transaction_hash.as_deref(), Some("0xfeed"));
        assert_eq!(confirmation.order.payment_status, PaymentStatus::Paid);
        assert_eq!(confirmation.order.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_confirm_twice_fails() {
        let f = fixture(100.0).await;
        let quote = f
            .service
            .open_crypto_payment(&f.owner, f.order.id, CryptoCurrency::USDC)
            .await
            .unwrap();
        f.service
            .confirm_payment(&f.owner, quote.payment.id, "0x1", PaymentRail::Crypto)
            .await
            .unwrap();

        let err = f
            .service
            .confirm_payment(&f.owner, quote.payment.id, "0x2", PaymentRail::Crypto)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::PaymentAlreadyProcessed));
    }

    #[tokio::test]
    async fn test_confirm_expired_payment() {
        let f = fixture(100.0).await;
        let payment = CryptoPayment::open(
            &f.order,
            CryptoCurrency::BTC,
            0.0016,
            "addr",
            PaymentRail::Crypto,
            Utc::now() - Duration::minutes(31),
        );
        f.store.put_payment(payment.clone()).await;

        let err = f
            .service
            .confirm_payment(&f.owner, payment.id, "0xlate", PaymentRail::Crypto)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Payment has expired");

        let stored = f.store.get_payment(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CryptoPaymentStatus::Expired);
    }

    #[tokio::test]
    async fn test_confirm_by_non_owner_is_forbidden() {
        let f = fixture(100.0).await;
        let quote = f
            .service
            .open_crypto_payment(&f.owner, f.order.id, CryptoCurrency::BTC)
            .await
            .unwrap();

        let stranger = AuthUser::new(Uuid::new_v4());
        let err = f
            .service
            .confirm_payment(&stranger, quote.payment.id, "0x1", PaymentRail::Crypto)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_solana_rail_hides_other_currencies() {
        let f = fixture(100.0).await;
        let quote = f
            .service
            .open_crypto_payment(&f.owner, f.order.id, CryptoCurrency::BTC)
            .await
            .unwrap();

        let err = f
            .service
            .confirm_payment(&f.owner, quote.payment.id, "sig", PaymentRail::Solana)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Solana payment not found");
    }

    struct Rejecting;

    #[async_trait]
    impl TransactionVerifier for Rejecting {
        async fn transaction_status(
            &self,
            _currency: CryptoCurrency,
            reference: &str,
        ) -> CommerceResult<TransactionStatus> {
            Ok(TransactionStatus::unknown(reference))
        }

        fn verifier_name(&self) -> &'static str {
            "rejecting"
        }
    }

    #[tokio::test]
    async fn test_unverified_transaction_leaves_payment_pending() {
        let f = fixture(100.0).await;
        let service = f
            .service
            .clone()
            .with_verifiers(VerifierSelector::new(Arc::new(Rejecting)));
        let quote = service
            .open_crypto_payment(&f.owner, f.order.id, CryptoCurrency::ETH)
            .await
            .unwrap();

        let err = service
            .confirm_payment(&f.owner, quote.payment.id, "0xbad", PaymentRail::Crypto)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::VerificationFailed { .. }));

        let stored = f.store.get_payment(quote.payment.id).await.unwrap().unwrap();
        assert!(stored.is_pending());
    }

    #[tokio::test]
    async fn test_transaction_reference_settles_one_payment() {
        let f = fixture(100.0).await;
        let second_order = Order::new(f.owner.id, 60.0);
        f.store.put_order(second_order.clone()).await;

        let first = f
            .service
            .open_crypto_payment(&f.owner, f.order.id, CryptoCurrency::ETH)
            .await
            .unwrap();
        let second = f
            .service
            .open_crypto_payment(&f.owner, second_order.id, CryptoCurrency::ETH)
            .await
            .unwrap();

        f.service
            .confirm_payment(&f.owner, first.payment.id, "0xSAME", PaymentRail::Crypto)
            .await
            .unwrap();
        let err = f
            .service
            .confirm_payment(&f.owner, second.payment.id, "0xSAME", PaymentRail::Crypto)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::TransactionAlreadyUsed));
        assert_eq!(err.status_code(), 400);

        let stored = f.store.get_payment(second.payment.id).await.unwrap().unwrap();
        assert!(stored.is_pending());
        let order = f.store.get_order(second_order.id).await.unwrap().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Pending);

        let status = f.service.signature_status(&f.owner, "0xSAME").await.unwrap();
        assert_eq!(status.payment.map(|p| p.id), Some(first.payment.id));
    }

    /// Holds every caller until two have arrived
    struct Rendezvous(Barrier);

    #[async_trait]
    impl TransactionVerifier for Rendezvous {
        async fn transaction_status(
            &self,
            _currency: CryptoCurrency,
            reference: &str,
        ) -> CommerceResult<TransactionStatus> {
            self.0.wait().await;
            Ok(TransactionStatus {
                signature: reference.to_string(),
                confirmed: true,
                finalized: true,
                error: None,
            })
        }

        fn verifier_name(&self) -> &'static str {
            "rendezvous"
        }
    }

    /// Delegates to the in-memory store and counts order settlements
    struct CountingStore {
        inner: InMemoryStore,
        orders_paid: AtomicUsize,
    }

    #[async_trait]
    impl OrderRepository for CountingStore {
        async fn get_order(&self, order_id: Uuid) -> CommerceResult<Option<Order>> {
            self.inner.get_order(order_id).await
        }

        async fn mark_order_paid(
            &self,
            order_id: Uuid,
            now: DateTime<Utc>,
        ) -> CommerceResult<Order> {
            self.orders_paid.fetch_add(1, Ordering::SeqCst);
            self.inner.mark_order_paid(order_id, now).await
        }

        async fn settle_pending_order(
            &self,
            order_id: Uuid,
            owner: Option<Uuid>,
            settlement: Settlement,
            now: DateTime<Utc>,
        ) -> CommerceResult<Option<Order>> {
            self.inner
                .settle_pending_order(order_id, owner, settlement, now)
                .await
        }
    }

    #[async_trait]
    impl PaymentRepository for CountingStore {
        async fn insert_payment(&self, payment: &CryptoPayment) -> CommerceResult<CryptoPayment> {
            self.inner.insert_payment(payment).await
        }

        async fn get_payment(&self, payment_id: Uuid) -> CommerceResult<Option<CryptoPayment>> {
            self.inner.get_payment(payment_id).await
        }

        async fn find_payment_by_transaction(
            &self,
            transaction_hash: &str,
        ) -> CommerceResult<Option<CryptoPayment>> {
            self.inner.find_payment_by_transaction(transaction_hash).await
        }

        async fn expire_payment(&self, payment_id: Uuid) -> CommerceResult<bool> {
            self.inner.expire_payment(payment_id).await
        }

        async fn confirm_payment(
            &self,
            payment_id: Uuid,
            transaction_hash: &str,
            now: DateTime<Utc>,
        ) -> CommerceResult<Option<CryptoPayment>> {
            self.inner
                .confirm_payment(payment_id, transaction_hash, now)
                .await
        }
    }

    #[async_trait]
    impl SubscriberRepository for CountingStore {
        async fn find_subscriber(
            &self,
            email: &SubscriberEmail,
        ) -> CommerceResult<Option<Subscriber>> {
            self.inner.find_subscriber(email).await
        }

        async fn insert_subscriber(&self, subscriber: &Subscriber) -> CommerceResult<Subscriber> {
            self.inner.insert_subscriber(subscriber).await
        }

        async fn set_subscribed(
            &self,
            email: &SubscriberEmail,
            subscribed: bool,
            now: DateTime<Utc>,
        ) -> CommerceResult<bool> {
            self.inner.set_subscribed(email, subscribed, now).await
        }

        async fn list_subscribers(
            &self,
            query: SubscriberQuery,
        ) -> CommerceResult<Page<Subscriber>> {
            self.inner.list_subscribers(query).await
        }
    }

    #[async_trait]
    impl ProductRepository for CountingStore {
        async fn list_products(&self, query: &ProductQuery) -> CommerceResult<Page<Product>> {
            self.inner.list_products(query).await
        }

        async fn get_product(&self, product_id: Uuid) -> CommerceResult<Option<Product>> {
            self.inner.get_product(product_id).await
        }
    }

    impl Store for CountingStore {
        fn backend_name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_concurrent_confirmations_settle_once() {
        let store = Arc::new(CountingStore {
            inner: InMemoryStore::new(),
            orders_paid: AtomicUsize::new(0),
        });
        let owner = AuthUser::new(Uuid::new_v4());
        let order = Order::new(owner.id, 100.0);
        store.inner.put_order(order.clone()).await;

        let service = PaymentService::new(store.clone()).with_verifiers(VerifierSelector::new(
            Arc::new(Rendezvous(Barrier::new(2))),
        ));
        let quote = service
            .open_crypto_payment(&owner, order.id, CryptoCurrency::BTC)
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            service.confirm_payment(&owner, quote.payment.id, "0xa", PaymentRail::Crypto),
            service.confirm_payment(&owner, quote.payment.id, "0xb", PaymentRail::Crypto),
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(CommerceError::PaymentAlreadyProcessed)))
                .count(),
            1
        );
        assert_eq!(store.orders_paid.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_status_lazily_expires() {
        let f = fixture(100.0).await;
        let payment = CryptoPayment::open(
            &f.order,
            CryptoCurrency::ETH,
            0.025,
            "addr",
            PaymentRail::Crypto,
            Utc::now() - Duration::hours(2),
        );
        f.store.put_payment(payment.clone()).await;

        let status = f.service.payment_status(&f.owner, payment.id).await.unwrap();
        assert_eq!(status.status, CryptoPaymentStatus::Expired);
    }

    #[tokio::test]
    async fn test_signature_status_checks_owner() {
        let f = fixture(100.0).await;
        let quote = f
            .service
            .open_solana_payment(&f.owner, f.order.id, PAYER)
            .await
            .unwrap();
        f.service
            .confirm_payment(&f.owner, quote.payment.id, "5sig", PaymentRail::Solana)
            .await
            .unwrap();

        let status = f.service.signature_status(&f.owner, "5sig").await.unwrap();
        assert!(status.chain.confirmed);
        assert_eq!(status.payment.map(|p| p.id), Some(quote.payment.id));

        let stranger = AuthUser::new(Uuid::new_v4());
        assert!(matches!(
            f.service.signature_status(&stranger, "5sig").await,
            Err(CommerceError::Forbidden)
        ));
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<Email>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &Email) -> CommerceResult<()> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }

        fn mailer_name(&self) -> &'static str {
            "recording"
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _email: &Email) -> CommerceResult<()> {
            Err(CommerceError::NetworkError("smtp down".into()))
        }

        fn mailer_name(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_subscribe_then_duplicate() {
        let store = Arc::new(InMemoryStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let service = NewsletterService::new(store, mailer.clone(), "https://dropics.com");

        let outcome = service.subscribe("Baker@Example.com").await.unwrap();
        assert!(matches!(outcome, SubscribeOutcome::Created(_)));
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);

        let err = service.subscribe("baker@example.com").await.unwrap_err();
        assert_eq!(err.to_string(), "Email already subscribed");
    }

    #[tokio::test]
    async fn test_concurrent_subscribe_reports_duplicate() {
        let store = Arc::new(InMemoryStore::new());
        let service =
            NewsletterService::new(store.clone(), Arc::new(LoggingMailer), "https://dropics.com");

        let (a, b) = tokio::join!(
            service.subscribe("baker@example.com"),
            service.subscribe("baker@example.com"),
        );
        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(CommerceError::AlreadySubscribed))));
    }

    #[tokio::test]
    async fn test_resubscribe_reactivates() {
        let store = Arc::new(InMemoryStore::new());
        let service =
            NewsletterService::new(store.clone(), Arc::new(LoggingMailer), "https://dropics.com");

        service.subscribe("baker@example.com").await.unwrap();
        service.unsubscribe("baker@example.com", None).await.unwrap();
        let outcome = service.subscribe("baker@example.com").await.unwrap();

        assert_eq!(outcome, SubscribeOutcome::Reactivated);
        let email = SubscriberEmail::parse("baker@example.com").unwrap();
        assert!(store.find_subscriber(&email).await.unwrap().unwrap().subscribed);
    }

    #[tokio::test]
    async fn test_unsubscribe_normalises_without_format_check() {
        let store = Arc::new(InMemoryStore::new());
        let service =
            NewsletterService::new(store.clone(), Arc::new(LoggingMailer), "https://dropics.com");
        service.subscribe("baker@example.com").await.unwrap();

        assert!(matches!(
            service.subscribe(" baker@example.com").await,
            Err(CommerceError::InvalidRequest(_))
        ));
        service.unsubscribe("  Baker@Example.com ", None).await.unwrap();
        service.unsubscribe("not-an-email", None).await.unwrap();

        let email = SubscriberEmail::parse("baker@example.com").unwrap();
        assert!(!store.find_subscriber(&email).await.unwrap().unwrap().subscribed);
    }

    #[tokio::test]
    async fn test_welcome_failure_is_swallowed() {
        let store = Arc::new(InMemoryStore::new());
        let service = NewsletterService::new(store, Arc::new(FailingMailer), "https://dropics.com");
        assert!(service.subscribe("baker@example.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_signed_unsubscribe() {
        let store = Arc::new(InMemoryStore::new());
        let signer = UnsubscribeSigner::new("secret").unwrap();
        let service = NewsletterService::new(store, Arc::new(LoggingMailer), "https://dropics.com/")
            .with_signer(signer.clone());
        service.subscribe("a+b@example.com").await.unwrap();

        let email = SubscriberEmail::parse("a+b@example.com").unwrap();
        let url = service.unsubscribe_url(&email).unwrap();
        let expected = "https://dropics.com/api/newsletter?email=a%2Bb%40example.com&token=";
        assert!(url.starts_with(expected));

        assert!(matches!(
            service.unsubscribe("a+b@example.com", Some("bad")).await,
            Err(CommerceError::InvalidUnsubscribeToken)
        ));
        let token = signer.token(&email);
        assert!(service
            .unsubscribe("a+b@example.com", Some(&token))
            .await
            .is_ok());
    }
}
