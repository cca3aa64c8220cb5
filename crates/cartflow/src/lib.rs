//! Cart submission flow
//!
//! A reference flow built on `flowcore`: a customer submits a cart, picks
//! pickup or delivery, provides payment details, confirms and checks out.
//! The flow completes with a [`Receipt`].

mod model;
mod services;
mod submission;

pub use model::{Cart, CartType, FulfilmentKind, Instructions, Item, Location, Payment, Receipt, Summary};
pub use services::{CartServices, Phase, ScriptedFailure, ScriptedServices, ServiceError, UnknownPhase};
pub use submission::{CartSubmission, CartSubmissionFlow, ResumeError, Services};
