use crate::model::{Cart, CartType, FulfilmentKind, Receipt, Summary};
use crate::services::{CartServices, Phase};
use async_trait::async_trait;
use flowcore::{BoxError, FlowDefinition, InterruptionReason, UserStory};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub type Services = Arc<dyn CartServices>;

/// The cart submission flow, one variant per phase.
///
/// `Submit` is the usual entry point, but every variant carries the cart and
/// the services it needs, so the flow can be started from any of them. A
/// flow abandoned at `Confirm` can be recreated at `Confirm` and carried on
/// from there.
///
/// A successful submission ends on `Receipt`.
#[derive(Clone)]
pub enum CartSubmission {
    Submit(Cart, Services),
    SelectType(Cart, Services),
    SelectPickupAddress(Cart, Services),
    ProvideDeliveryInstructions(Cart, Services),
    ProvidePaymentDetails(Cart, Services),
    Confirm(Cart, Services),
    Checkout(Cart, Services),
    Receipt(Cart, Services, Receipt),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResumeError {
    #[error("the receipt phase can only be reached by checking out")]
    ReceiptRequired,
}

impl CartSubmission {
    pub fn start(cart: Cart, services: Services) -> Self {
        CartSubmission::Submit(cart, services)
    }

    /// Recreate the flow at `phase`.
    pub fn resume_at(phase: Phase, cart: Cart, services: Services) -> Result<Self, ResumeError> {
        Ok(match phase {
            Phase::Submit => CartSubmission::Submit(cart, services),
            Phase::SelectType => CartSubmission::SelectType(cart, services),
            Phase::SelectPickupAddress => CartSubmission::SelectPickupAddress(cart, services),
            Phase::ProvideDeliveryInstructions => {
                CartSubmission::ProvideDeliveryInstructions(cart, services)
            }
            Phase::ProvidePaymentDetails => CartSubmission::ProvidePaymentDetails(cart, services),
            Phase::Confirm => CartSubmission::Confirm(cart, services),
            Phase::Checkout => CartSubmission::Checkout(cart, services),
            Phase::Receipt => return Err(ResumeError::ReceiptRequired),
        })
    }

    pub fn phase(&self) -> Phase {
        match self {
            CartSubmission::Submit(..) => Phase::Submit,
            CartSubmission::SelectType(..) => Phase::SelectType,
            CartSubmission::SelectPickupAddress(..) => Phase::SelectPickupAddress,
            CartSubmission::ProvideDeliveryInstructions(..) => Phase::ProvideDeliveryInstructions,
            CartSubmission::ProvidePaymentDetails(..) => Phase::ProvidePaymentDetails,
            CartSubmission::Confirm(..) => Phase::Confirm,
            CartSubmission::Checkout(..) => Phase::Checkout,
            CartSubmission::Receipt(..) => Phase::Receipt,
        }
    }

    pub fn cart(&self) -> &Cart {
        match self {
            CartSubmission::Submit(cart, _)
            | CartSubmission::SelectType(cart, _)
            | CartSubmission::SelectPickupAddress(cart, _)
            | CartSubmission::ProvideDeliveryInstructions(cart, _)
            | CartSubmission::ProvidePaymentDetails(cart, _)
            | CartSubmission::Confirm(cart, _)
            | CartSubmission::Checkout(cart, _)
            | CartSubmission::Receipt(cart, _, _) => cart,
        }
    }

    /// Map a completed submission to its receipt.
    pub fn try_map(self) -> Result<Receipt, InterruptionReason> {
        match self {
            CartSubmission::Receipt(_, _, receipt) => Ok(receipt),
            _ => Err(InterruptionReason::CompletedWithUnexpectedResult),
        }
    }

    /// Run the submission from this phase to its receipt.
    pub async fn execute_from(self) -> Result<Receipt, InterruptionReason> {
        flowruntime::execute_from(self, CartSubmission::try_map).await
    }
}

#[async_trait]
impl UserStory for CartSubmission {
    async fn execute(&self) -> Result<Option<Self>, BoxError> {
        let next = match self {
            CartSubmission::Submit(cart, services) => {
                let summary = Summary {
                    item_count: cart.item_count(),
                };
                CartSubmission::SelectType(cart.clone().with_summary(summary), services.clone())
            }

            CartSubmission::SelectType(cart, services) => match services.select_type(cart).await? {
                FulfilmentKind::Delivery => {
                    CartSubmission::ProvideDeliveryInstructions(cart.clone(), services.clone())
                }
                FulfilmentKind::Pickup => {
                    CartSubmission::SelectPickupAddress(cart.clone(), services.clone())
                }
            },

            CartSubmission::SelectPickupAddress(cart, services) => {
                let location = services.select_pickup_address(cart).await?;
                let cart = cart.clone().with_fulfilment(CartType::Pickup { location });
                CartSubmission::ProvidePaymentDetails(cart, services.clone())
            }

            CartSubmission::ProvideDeliveryInstructions(cart, services) => {
                let instructions = services.provide_delivery_instructions(cart).await?;
                let cart = cart.clone().with_fulfilment(CartType::Delivery { instructions });
                CartSubmission::ProvidePaymentDetails(cart, services.clone())
            }

            CartSubmission::ProvidePaymentDetails(cart, services) => {
                let payment = services.provide_payment_details(cart).await?;
                CartSubmission::Confirm(cart.clone().with_payment(payment), services.clone())
            }

            CartSubmission::Confirm(cart, services) => {
                if !services.confirm(cart).await? {
                    return Err(InterruptionReason::Canceled.into());
                }
                CartSubmission::Checkout(cart.clone(), services.clone())
            }

            CartSubmission::Checkout(cart, services) => {
                let receipt = services.checkout(cart).await?;
                CartSubmission::Receipt(cart.clone(), services.clone(), receipt)
            }

            CartSubmission::Receipt(..) => return Ok(None),
        };

        Ok(Some(next))
    }

    fn name(&self) -> &str {
        self.phase().as_str()
    }
}

impl fmt::Debug for CartSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("CartSubmission");
        debug.field("phase", &self.phase()).field("cart", self.cart());
        if let CartSubmission::Receipt(_, _, receipt) = self {
            debug.field("receipt", receipt);
        }
        debug.finish()
    }
}

/// [`CartSubmission`] as a flow definition, for hosting on a `FlowRuntime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CartSubmissionFlow;

impl FlowDefinition for CartSubmissionFlow {
    type Story = CartSubmission;
    type Output = Receipt;

    fn name(&self) -> &str {
        "cart-submission"
    }

    fn try_map(&self, terminal: CartSubmission) -> Result<Receipt, BoxError> {
        terminal.try_map().map_err(Into::into)
    }
}
