//! Leaf operations behind each phase of the cart submission.
//!
//! In a real application these would present UI or call remote services.
//! [`ScriptedServices`] answers immediately and can be scripted to fail,
//! cancel or stall on a chosen phase.

use crate::model::{Cart, FulfilmentKind, Instructions, Location, Payment, Receipt};
use async_trait::async_trait;
use chrono::Utc;
use flowcore::{BoxError, InterruptionReason};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Named phases of the cart submission, in flow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Submit,
    SelectType,
    SelectPickupAddress,
    ProvideDeliveryInstructions,
    ProvidePaymentDetails,
    Confirm,
    Checkout,
    Receipt,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::Submit,
        Phase::SelectType,
        Phase::SelectPickupAddress,
        Phase::ProvideDeliveryInstructions,
        Phase::ProvidePaymentDetails,
        Phase::Confirm,
        Phase::Checkout,
        Phase::Receipt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Submit => "submit",
            Phase::SelectType => "select-type",
            Phase::SelectPickupAddress => "select-pickup-address",
            Phase::ProvideDeliveryInstructions => "provide-delivery-instructions",
            Phase::ProvidePaymentDetails => "provide-payment-details",
            Phase::Confirm => "confirm",
            Phase::Checkout => "checkout",
            Phase::Receipt => "receipt",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("unknown phase '{0}'")]
pub struct UnknownPhase(pub String);

impl FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == normalized)
            .ok_or_else(|| UnknownPhase(s.to_string()))
    }
}

/// Error raised by a service operation.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{domain} (code {code})")]
pub struct ServiceError {
    pub domain: String,
    pub code: i64,
}

impl ServiceError {
    pub fn new(domain: impl Into<String>, code: i64) -> Self {
        Self {
            domain: domain.into(),
            code,
        }
    }
}

/// The operations the cart submission flow relies on.
#[async_trait]
pub trait CartServices: Send + Sync {
    async fn select_type(&self, cart: &Cart) -> Result<FulfilmentKind, BoxError>;

    async fn select_pickup_address(&self, cart: &Cart) -> Result<Location, BoxError>;

    async fn provide_delivery_instructions(&self, cart: &Cart) -> Result<Instructions, BoxError>;

    async fn provide_payment_details(&self, cart: &Cart) -> Result<Payment, BoxError>;

    /// `false` when the customer declines to submit.
    async fn confirm(&self, cart: &Cart) -> Result<bool, BoxError>;

    async fn checkout(&self, cart: &Cart) -> Result<Receipt, BoxError>;
}

/// What a scripted phase does instead of answering.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedFailure {
    /// Raise `InterruptionReason::Canceled`.
    Canceled,
    /// Raise a [`ServiceError`].
    Error { domain: String, code: i64 },
    /// Never answer.
    Stall,
}

/// Services that answer immediately, except on the scripted phase.
#[derive(Debug, Clone)]
pub struct ScriptedServices {
    fulfilment: FulfilmentKind,
    confirm: bool,
    fail_on: Option<(Phase, ScriptedFailure)>,
}

impl ScriptedServices {
    /// Pickup order, confirmed, no failures.
    pub fn new() -> Self {
        Self {
            fulfilment: FulfilmentKind::Pickup,
            confirm: true,
            fail_on: None,
        }
    }

    pub fn delivery(mut self) -> Self {
        self.fulfilment = FulfilmentKind::Delivery;
        self
    }

    /// Make the customer decline at the confirm phase.
    pub fn declining(mut self) -> Self {
        self.confirm = false;
        self
    }

    pub fn fail_on(mut self, phase: Phase, failure: ScriptedFailure) -> Self {
        self.fail_on = Some((phase, failure));
        self
    }

    async fn answer(&self, phase: Phase) -> Result<(), BoxError> {
        tracing::debug!(%phase, "scripted service call");
        match &self.fail_on {
            Some((failing, failure)) if *failing == phase => match failure {
                ScriptedFailure::Canceled => Err(InterruptionReason::Canceled.into()),
                ScriptedFailure::Error { domain, code } => Err(ServiceError::new(domain.clone(), *code).into()),
                ScriptedFailure::Stall => {
                    std::future::pending::<()>().await;
                    Ok(())
                }
            },
            _ => Ok(()),
        }
    }
}

impl Default for ScriptedServices {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CartServices for ScriptedServices {
    async fn select_type(&self, _cart: &Cart) -> Result<FulfilmentKind, BoxError> {
        self.answer(Phase::SelectType).await?;
        Ok(self.fulfilment)
    }

    async fn select_pickup_address(&self, _cart: &Cart) -> Result<Location, BoxError> {
        self.answer(Phase::SelectPickupAddress).await?;
        Ok(Location {
            address: "1 Market Street".to_string(),
        })
    }

    async fn provide_delivery_instructions(&self, _cart: &Cart) -> Result<Instructions, BoxError> {
        self.answer(Phase::ProvideDeliveryInstructions).await?;
        Ok(Instructions {
            location: Location {
                address: "22 Harbour Road".to_string(),
            },
            instructions: "leave at the front door".to_string(),
        })
    }

    async fn provide_payment_details(&self, _cart: &Cart) -> Result<Payment, BoxError> {
        self.answer(Phase::ProvidePaymentDetails).await?;
        Ok(Payment {
            method: "card ending 4242".to_string(),
        })
    }

    async fn confirm(&self, _cart: &Cart) -> Result<bool, BoxError> {
        self.answer(Phase::Confirm).await?;
        Ok(self.confirm)
    }

    async fn checkout(&self, cart: &Cart) -> Result<Receipt, BoxError> {
        self.answer(Phase::Checkout).await?;
        Ok(Receipt {
            order_id: Uuid::new_v4(),
            item_count: cart.item_count(),
            fulfilment: cart.fulfilment.clone(),
            issued_at: Utc::now(),
        })
    }
}
