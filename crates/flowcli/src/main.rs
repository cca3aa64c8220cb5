// crates/flowcli/src/main.rs

use anyhow::{bail, Result};
use cartflow::{
    Cart, CartSubmission, CartSubmissionFlow, Item, Phase, ScriptedFailure, ScriptedServices,
};
use clap::{Parser, Subcommand};
use flowcore::FlowEvent;
use flowruntime::{FlowRuntime, RunError, RuntimeConfig};
use std::sync::Arc;
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Run the cart submission flow", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a demo cart, starting from any phase
    Run(RunArgs),

    /// List the phases of the cart submission flow
    Phases,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Phase to start (or resume) the flow from
    #[arg(long, default_value = "submit")]
    from: Phase,

    /// Choose delivery instead of pickup
    #[arg(long)]
    delivery: bool,

    /// Decline at the confirm phase
    #[arg(long)]
    decline: bool,

    /// Make this phase fail with a service error
    #[arg(long, conflicts_with_all = ["cancel_on", "stall_on"])]
    fail_on: Option<Phase>,

    /// Domain of the injected service error
    #[arg(long, default_value = "ServiceFailure")]
    error_domain: String,

    /// Code of the injected service error
    #[arg(long, default_value_t = 1)]
    error_code: i64,

    /// Make this phase cancel the flow
    #[arg(long, conflicts_with = "stall_on")]
    cancel_on: Option<Phase>,

    /// Make this phase never answer
    #[arg(long)]
    stall_on: Option<Phase>,

    /// Give up after this many milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Capacity of the execution event channel
    #[arg(long, default_value_t = RuntimeConfig::default().event_buffer_size)]
    event_buffer: usize,

    /// Print execution events as JSON lines
    #[arg(long)]
    events: bool,

    /// Show debug logs
    #[arg(short, long)]
    verbose: bool,
}

impl RunArgs {
    fn services(&self) -> ScriptedServices {
        let mut services = ScriptedServices::new();
        if self.delivery {
            services = services.delivery();
        }
        if self.decline {
            services = services.declining();
        }
        if let Some(phase) = self.fail_on {
            services = services.fail_on(
                phase,
                ScriptedFailure::Error {
                    domain: self.error_domain.clone(),
                    code: self.error_code,
                },
            );
        } else if let Some(phase) = self.cancel_on {
            services = services.fail_on(phase, ScriptedFailure::Canceled);
        } else if let Some(phase) = self.stall_on {
            services = services.fail_on(phase, ScriptedFailure::Stall);
        }
        services
    }

    fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            event_buffer_size: self.event_buffer,
            default_deadline_ms: self.deadline_ms,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            init_tracing(args.verbose);
            run_submission(args).await?;
        }

        Commands::Phases => {
            list_phases();
        }
    }

    Ok(())
}

fn demo_cart() -> Cart {
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

async fn run_submission(args: RunArgs) -> Result<()> {
    let story = CartSubmission::resume_at(args.from, demo_cart(), Arc::new(args.services()))?;
    let runtime = FlowRuntime::with_config(args.runtime_config());

    let print_events = args.events;
    let event_task = tokio::spawn(forward_events(runtime.subscribe_events(), move |event| {
        if print_events {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!("Failed to serialize event: {}", e),
            }
        } else if let FlowEvent::StepFailed { step, error, .. } = &event {
            eprintln!("  ❌ {} failed: {}", step, error);
        }
    }));

    let handle = runtime.spawn(Arc::new(CartSubmissionFlow), story);
    tracing::info!(execution_id = %handle.execution_id(), from = %args.from, "submitting cart");

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let result = handle.join().await;

    // closing the bus ends the event stream
    drop(runtime);
    if let Err(e) = event_task.await {
        tracing::warn!("Event printer stopped unexpectedly: {}", e);
    }

    match result {
        Ok(receipt) => {
            eprintln!("✨ Cart submitted");
            println!("{}", serde_json::to_string_pretty(&receipt)?);
            Ok(())
        }
        Err(RunError::Interrupted(reason)) => bail!("cart submission interrupted: {}", reason),
        Err(e) => bail!("cart submission did not finish: {}", e),
    }
}

/// Hand every event to `show` until the bus closes. Lagging skips the
/// overwritten events and keeps listening.
async fn forward_events(mut events: Receiver<FlowEvent>, mut show: impl FnMut(FlowEvent)) {
    loop {
        match events.recv().await {
            Ok(event) => show(event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event printer fell behind, events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn list_phases() {
    println!("📋 Cart submission phases:");
    println!();
    for (index, phase) in Phase::ALL.iter().enumerate() {
        println!("  {}. {}", index + 1, phase);
    }
}
