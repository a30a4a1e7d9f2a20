use stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode,
    CheckoutSessionPaymentStatus, Client, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, Currency, EventObject, EventType,
    Webhook, WebhookError,
};
use chrono::Utc;
use uuid::Uuid;
use std::sync::Arc;

use crate::{
    domain::{Booking, Payment, PaymentMethod, PaymentPurpose, PaymentStatus, User},
    error::{AppError, Result},
    repository::PaymentRepository,
    service::PaymentService,
};

/// The only code that talks to the payment provider. Checkout sessions go
/// out; webhook events and manual verification come back in, and both feed
/// the same `PaymentService` linkage so the effects converge.
pub struct StripeClient {
    client: Client,
    webhook_secret: String,
    payment_repo: Arc<dyn PaymentRepository>,
    payment_service: Arc<PaymentService>,
}

impl StripeClient {
    pub fn new(
        api_key: String,
        webhook_secret: String,
        payment_repo: Arc<dyn PaymentRepository>,
        payment_service: Arc<PaymentService>,
    ) -> Self {
        let client = Client::new(api_key);
        Self {
            client,
            webhook_secret,
            payment_repo,
            payment_service,
        }
    }

    /// Opens a checkout session for a booking and records the pending
    /// payment keyed by the session id. Returns the redirect URL.
    pub async fn create_booking_checkout_session(
        &self,
        user: &User,
        booking: &Booking,
        service_name: &str,
        amount_cents: i64,
        success_url: String,
        cancel_url: String,
    ) -> Result<String> {
        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Payment);
        params.success_url = Some(&success_url);
        params.cancel_url = Some(&cancel_url);

        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price_data: Some(stripe::CreateCheckoutSessionLineItemsPriceData {
                currency: Currency::USD,
                unit_amount: Some(amount_cents),
                product_data: Some(stripe::CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: service_name.to_string(),
                    description: Some(format!(
                        "Booking on {} at {}",
                        booking.date, booking.time_slot.start
                    )),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            quantity: Some(1),
            ..Default::default()
        }]);

        let mut metadata = std::collections::HashMap::new();
        metadata.insert("purpose".to_string(), "booking".to_string());
        metadata.insert("user_id".to_string(), user.id.to_string());
        metadata.insert("booking_id".to_string(), booking.id.to_string());
        params.metadata = Some(metadata);
        let booking_id_str = booking.id.to_string();
        params.client_reference_id = Some(&booking_id_str);

        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| AppError::Upstream(format!("Stripe error: {}", e)))?;

        let payment = Payment {
            id: Uuid::new_v4(),
            user_id: user.id,
            purpose: PaymentPurpose::Booking,
            booking_id: Some(booking.id),
            garage_id: Some(booking.garage_id),
            amount_cents,
            currency: "USD".to_string(),
            status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Stripe,
            transaction_id: Some(session.id.to_string()),
            description: format!("{} booking payment", service_name),
            paid_at: None,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        self.payment_repo.create(payment).await?;

        session.url
            .ok_or_else(|| AppError::Upstream("No checkout URL returned".to_string()))
    }

    /// Checkout for the one-time garage registration fee.
    pub async fn create_garage_checkout_session(
        &self,
        user: &User,
        amount_cents: i64,
        success_url: String,
        cancel_url: String,
    ) -> Result<String> {
        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Payment);
        params.success_url = Some(&success_url);
        params.cancel_url = Some(&cancel_url);

        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price_data: Some(stripe::CreateCheckoutSessionLineItemsPriceData {
                currency: Currency::USD,
                unit_amount: Some(amount_cents),
                product_data: Some(stripe::CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: "Garage registration".to_string(),
                    description: Some("One-time garage registration fee".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            quantity: Some(1),
            ..Default::default()
        }]);

        let mut metadata = std::collections::HashMap::new();
        metadata.insert("purpose".to_string(), "garage_creation".to_string());
        metadata.insert("user_id".to_string(), user.id.to_string());
        params.metadata = Some(metadata);
        let user_id_str = user.id.to_string();
        params.client_reference_id = Some(&user_id_str);

        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| AppError::Upstream(format!("Stripe error: {}", e)))?;

        let payment = Payment {
            id: Uuid::new_v4(),
            user_id: user.id,
            purpose: PaymentPurpose::GarageCreation,
            booking_id: None,
            garage_id: None,
            amount_cents,
            currency: "USD".to_string(),
            status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Stripe,
            transaction_id: Some(session.id.to_string()),
            description: "Garage registration fee".to_string(),
            paid_at: None,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        self.payment_repo.create(payment).await?;

        session.url
            .ok_or_else(|| AppError::Upstream("No checkout URL returned".to_string()))
    }

    /// Entry point for provider webhooks. Signature verification happens
    /// before anything is trusted; effects run through the idempotent
    /// linkage, so duplicate deliveries are harmless.
    pub async fn handle_webhook(
        &self,
        payload: &str,
        stripe_signature: &str,
    ) -> Result<()> {
        let event = Webhook::construct_event(
            payload,
            stripe_signature,
            &self.webhook_secret,
        )
        .map_err(|e| match e {
            WebhookError::BadSignature => AppError::BadRequest("Invalid signature".to_string()),
            _ => AppError::Upstream(format!("Webhook error: {}", e)),
        })?;

        match event.type_ {
            EventType::CheckoutSessionCompleted => {
                if let EventObject::CheckoutSession(session) = event.data.object {
                    self.settle_by_transaction_id(&session.id.to_string()).await?;
                }
            }
            EventType::CheckoutSessionExpired => {
                if let EventObject::CheckoutSession(session) = event.data.object {
                    self.fail_by_transaction_id(&session.id.to_string()).await?;
                }
            }
            EventType::PaymentIntentPaymentFailed => {
                if let EventObject::PaymentIntent(intent) = event.data.object {
                    self.fail_by_transaction_id(&intent.id.to_string()).await?;
                }
            }
            _ => {
                tracing::debug!("Unhandled webhook event type: {:?}", event.type_);
            }
        }

        Ok(())
    }

    /// Verify-by-reference fallback for when a webhook never arrives: asks
    /// the provider for the session's state and applies the same settlement
    /// path the webhook would have.
    pub async fn verify_payment(&self, payment: &Payment) -> Result<Payment> {
        let transaction_id = payment.transaction_id.as_deref().ok_or_else(|| {
            AppError::Validation("Payment has no provider transaction id".to_string())
        })?;

        let session_id = transaction_id
            .parse::<CheckoutSessionId>()
            .map_err(|e| AppError::Validation(format!("Invalid checkout session id: {}", e)))?;

        let session = CheckoutSession::retrieve(&self.client, &session_id, &[])
            .await
            .map_err(|e| AppError::Upstream(format!("Stripe error: {}", e)))?;

        match session.payment_status {
            CheckoutSessionPaymentStatus::Paid => {
                self.payment_service.on_payment_settled(payment.id).await
            }
            _ => {
                tracing::info!(payment_id = %payment.id, "checkout not paid yet");
                Ok(payment.clone())
            }
        }
    }

    async fn settle_by_transaction_id(&self, transaction_id: &str) -> Result<()> {
        if let Some(payment) = self.payment_repo.find_by_transaction_id(transaction_id).await? {
            self.payment_service.on_payment_settled(payment.id).await?;
        } else {
            tracing::warn!("Payment not found for Stripe session: {}", transaction_id);
        }

        Ok(())
    }

    async fn fail_by_transaction_id(&self, transaction_id: &str) -> Result<()> {
        if let Some(payment) = self.payment_repo.find_by_transaction_id(transaction_id).await? {
            self.payment_service.mark_failed(payment.id).await?;
            tracing::info!("Payment marked failed: {}", transaction_id);
        }

        Ok(())
    }
}
