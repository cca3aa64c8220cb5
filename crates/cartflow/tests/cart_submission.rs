// crates/cartflow/tests/cart_submission.rs

use cartflow::{
    Cart, CartSubmission, CartSubmissionFlow, CartType, Item, Phase, ResumeError, ScriptedFailure,
    ScriptedServices, ServiceError, Services,
};
use flowcore::{FlowEvent, InterruptionReason, MappedFlow, RunOutcome};
use flowruntime::{FlowRuntime, RunError};
use std::sync::Arc;
use std::time::Duration;

fn cart() -> Cart {
    Cart::new(vec![
        Item {
            sku: "espresso-beans".to_string(),
            quantity: 2,
        },
        Item {
            sku: "milk-frother".to_string(),
            quantity: 1,
        },
    ])
}

fn services(scripted: ScriptedServices) -> Services {
    Arc::new(scripted)
}

#[tokio::test]
async fn test_successful_submission_ends_with_receipt() {
    let receipt = CartSubmission::start(cart(), services(ScriptedServices::new()))
        .execute_from()
        .await
        .expect("submission should complete");

    assert_eq!(receipt.item_count, 3);
    assert!(
        matches!(receipt.fulfilment, Some(CartType::Pickup { .. })),
        "default script picks up the order"
    );
}

#[tokio::test]
async fn test_delivery_branch_records_instructions() {
    let receipt = CartSubmission::start(cart(), services(ScriptedServices::new().delivery()))
        .execute_from()
        .await
        .expect("delivery submission should complete");

    match receipt.fulfilment {
        Some(CartType::Delivery { instructions }) => {
            assert_eq!(instructions.instructions, "leave at the front door")
        }
        other => panic!("expected delivery fulfilment, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failure_on_checkout_wraps_the_exact_error() {
    let scripted = ScriptedServices::new().fail_on(
        Phase::Checkout,
        ScriptedFailure::Error {
            domain: "FailedOnCheckout".to_string(),
            code: 0,
        },
    );

    let reason = CartSubmission::start(cart(), services(scripted))
        .execute_from()
        .await
        .expect_err("checkout failure should interrupt the flow");

    assert!(reason.is_failed(), "expected failed, got {:?}", reason);
    assert_eq!(
        reason.cause_as::<ServiceError>(),
        Some(&ServiceError::new("FailedOnCheckout", 0))
    );
}

#[tokio::test]
async fn test_canceled_on_payment_details_is_not_wrapped() {
    let scripted = ScriptedServices::new().fail_on(Phase::ProvidePaymentDetails, ScriptedFailure::Canceled);

    let reason = CartSubmission::start(cart(), services(scripted))
        .execute_from()
        .await
        .expect_err("cancellation should interrupt the flow");

    assert!(reason.is_canceled(), "expected canceled, got {:?}", reason);
}

#[tokio::test]
async fn test_declining_confirmation_cancels() {
    let reason = CartSubmission::start(cart(), services(ScriptedServices::new().declining()))
        .execute_from()
        .await
        .expect_err("declining should cancel the flow");

    assert!(reason.is_canceled());
}

#[tokio::test]
async fn test_resume_from_payment_details() {
    let receipt = CartSubmission::ProvidePaymentDetails(cart(), services(ScriptedServices::new()))
        .execute_from()
        .await
        .expect("resumed submission should complete");

    // fulfilment was never chosen because the flow started after that phase
    assert_eq!(receipt.fulfilment, None);
    assert_eq!(receipt.item_count, 3);
}

#[tokio::test]
async fn test_resume_matches_a_full_run_from_the_same_phase() {
    let services = services(ScriptedServices::new().delivery());
    let full = CartSubmission::start(cart(), services.clone()).execute_from().await.unwrap();

    // replay the chain by hand up to confirm, then resume from that value
    let mut story = CartSubmission::start(cart(), services.clone());
    while story.phase() != Phase::Confirm {
        story = flowcore::UserStory::execute(&story).await.unwrap().unwrap();
    }
    let resumed = story.clone().execute_from().await.unwrap();

    assert_eq!(resumed.item_count, full.item_count);
    assert_eq!(resumed.fulfilment, full.fulfilment);
    assert_eq!(story.cart().payment, Some(cartflow::Payment { method: "card ending 4242".to_string() }));
}

#[tokio::test]
async fn test_resume_at_rejects_receipt_phase() {
    let result = CartSubmission::resume_at(Phase::Receipt, cart(), services(ScriptedServices::new()));

    assert_eq!(result.err(), Some(ResumeError::ReceiptRequired));
}

#[tokio::test]
async fn test_unrecognized_terminal_story_is_unexpected_result() {
    // a mapper that only accepts the confirm phase never sees it as terminal
    let flow = MappedFlow::new("confirm-only", |terminal: CartSubmission| match terminal {
        CartSubmission::Confirm(cart, _) => Ok(cart),
        _ => Err(InterruptionReason::CompletedWithUnexpectedResult),
    });

    let reason = flowruntime::execute_flow(
        &flow,
        CartSubmission::start(cart(), services(ScriptedServices::new())),
    )
    .await
    .expect_err("mapper should reject the receipt");

    assert!(matches!(reason, InterruptionReason::CompletedWithUnexpectedResult));
}

#[tokio::test]
async fn test_runtime_reports_each_phase() {
    let runtime = FlowRuntime::new();
    let mut events = runtime.subscribe_events();

    runtime
        .execute(
            &CartSubmissionFlow,
            CartSubmission::start(cart(), services(ScriptedServices::new())),
        )
        .await
        .expect("submission should complete");

    let mut started = Vec::new();
    let mut outcome = None;
    while let Ok(event) = events.try_recv() {
        match event {
            FlowEvent::FlowStarted { flow, entry_step, .. } => {
                assert_eq!(flow, "cart-submission");
                assert_eq!(entry_step, "submit");
            }
            FlowEvent::StepStarted { step, .. } => started.push(step),
            FlowEvent::FlowFinished { outcome: finished, .. } => outcome = Some(finished),
            _ => {}
        }
    }

    assert_eq!(
        started,
        vec![
            "submit",
            "select-type",
            "select-pickup-address",
            "provide-payment-details",
            "confirm",
            "checkout",
            "receipt",
        ]
    );
    assert_eq!(outcome, Some(RunOutcome::Completed));
}

#[tokio::test]
async fn test_stalled_phase_hits_the_deadline() {
    let runtime = FlowRuntime::new();
    let scripted = ScriptedServices::new().fail_on(Phase::Confirm, ScriptedFailure::Stall);

    let error = runtime
        .execute_with_deadline(
            &CartSubmissionFlow,
            CartSubmission::start(cart(), services(scripted)),
            Duration::from_millis(25),
        )
        .await
        .expect_err("stalled flow should time out");

    assert!(matches!(error, RunError::DeadlineElapsed(_)));
}

#[tokio::test]
async fn test_cancelled_run_produces_no_receipt() {
    let runtime = FlowRuntime::new();
    let mut events = runtime.subscribe_events();
    let scripted = ScriptedServices::new().fail_on(Phase::Confirm, ScriptedFailure::Stall);

    let handle = runtime.spawn(
        Arc::new(CartSubmissionFlow),
        CartSubmission::start(cart(), services(scripted)),
    );

    // wait until the run is parked on the confirm phase
    loop {
        match events.recv().await.expect("event stream open") {
            FlowEvent::StepStarted { step, .. } if step == "confirm" => break,
            _ => {}
        }
    }
    handle.cancel();

    let error = handle.join().await.expect_err("cancelled run must not complete");
    assert!(matches!(error, RunError::Abandoned));

    let mut steps_after_confirm = 0;
    while let Ok(event) = events.try_recv() {
        if let FlowEvent::StepStarted { .. } = event {
            steps_after_confirm += 1;
        }
    }
    assert_eq!(steps_after_confirm, 0, "no phase may start after cancellation");
}

#[tokio::test]
async fn test_concurrent_submissions_are_independent() {
    let runtime = FlowRuntime::new();
    let failing = ScriptedServices::new().fail_on(
        Phase::Checkout,
        ScriptedFailure::Error {
            domain: "FailedOnCheckout".to_string(),
            code: 7,
        },
    );

    let results = runtime
        .execute_all(
            &CartSubmissionFlow,
            vec![
                CartSubmission::start(cart(), services(ScriptedServices::new())),
                CartSubmission::start(cart(), services(failing)),
                CartSubmission::start(cart(), services(ScriptedServices::new().delivery())),
            ],
        )
        .await;

    assert!(results[0].is_ok());
    assert_eq!(
        results[1].as_ref().unwrap_err().cause_as::<ServiceError>(),
        Some(&ServiceError::new("FailedOnCheckout", 7))
    );
    assert!(matches!(
        results[2].as_ref().map(|receipt| &receipt.fulfilment),
        Ok(Some(CartType::Delivery { .. }))
    ));
}

#[tokio::test]
async fn test_receipt_serializes_to_json() {
    let receipt = CartSubmission::start(cart(), services(ScriptedServices::new()))
        .execute_from()
        .await
        .unwrap();

    let json = serde_json::to_value(&receipt).unwrap();
    assert_eq!(json["item_count"], 3);
    assert_eq!(json["fulfilment"]["kind"], "pickup");
    assert_eq!(json["fulfilment"]["location"]["address"], "1 Market Street");
}
