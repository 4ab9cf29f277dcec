//! Synthetic driver for the failguard command wrapper.
//!
//! Feeds a scripted burst of "normal", "slow", "error", and "wait" inputs
//! through one protected command and prints timing information. Slow bursts
//! exercise the execution timeout, error bursts open the circuit breaker,
//! and the trailing normal bursts show the breaker probing and recovering.

use failguard_core::{Command, CommandRegistry, ConfigProperties};
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Input = (usize, String);

/// The downstream call being protected.
async fn raw_service(input: Input) -> Result<String, String> {
    let (index, kind) = input;
    println!(
        "Entered ({index}, {kind}), running on {:?}",
        std::thread::current().id()
    );
    let result = match kind.as_str() {
        "normal" => {
            tokio::time::sleep(Duration::from_millis(40)).await;
            Ok(format!("OK-normal[index={index}]"))
        }
        "slow" => {
            tokio::time::sleep(Duration::from_millis(400)).await;
            Ok(format!("OK-slow[index={index}]"))
        }
        "error" => {
            tokio::time::sleep(Duration::from_millis(2)).await;
            Err(format!("service error, index={index}"))
        }
        other => Err(format!("unexpected input kind: {other}")),
    };
    println!("Exiting ({index}, {kind})");
    result
}

/// Fallback used when a call to the raw service fails, times out, or is
/// rejected.
async fn fallback_service(input: Input) -> Result<String, String> {
    let (index, kind) = input;
    println!("Entered fallback for ({index}, {kind})");
    tokio::time::sleep(Duration::from_millis(2)).await;
    println!("Exiting fallback for ({index}, {kind})");
    Ok(format!("fallback(input=({index}, {kind}))"))
}

/// The original example's scripted input list: bursts separated by waits.
fn script() -> Vec<&'static str> {
    let bursts: [(usize, &'static str); 15] = [
        (25, "normal"),
        (2, "wait"),
        (10, "normal"),
        (2, "wait"),
        (20, "slow"),
        (2, "wait"),
        (20, "error"),
        (1, "wait"),
        (20, "error"),
        (5, "wait"),
        (10, "normal"),
        (5, "wait"),
        (2, "normal"),
        (1, "wait"),
        (20, "normal"),
    ];
    bursts
        .iter()
        .flat_map(|&(count, kind)| std::iter::repeat_n(kind, count))
        .collect()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "failguard_driver=info,failguard_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ConfigProperties::builder()
        .execution_max_concurrent(20)
        .fallback_max_concurrent(100) // effectively no limit
        .execution_timeout(Duration::from_millis(200))
        .sleep_window(Duration::from_millis(2000))
        .error_threshold_percentage(50)
        .build();

    let registry = CommandRegistry::new();
    let command = match Command::new(
        &registry,
        "functional-demo",
        "functional-demo",
        raw_service,
        fallback_service,
        config,
    ) {
        Ok(command) => command,
        Err(error) => {
            eprintln!("invalid configuration: {error}");
            return;
        }
    };

    let start = Instant::now();
    let mut handles = Vec::new();

    for (index, kind) in script().into_iter().enumerate() {
        if kind == "wait" {
            let wait = Duration::from_millis(500);
            println!(">>> Starting to wait {} ms", wait.as_millis());
            tokio::time::sleep(wait).await;
            println!("<<< Finished waiting {} ms", wait.as_millis());
        } else {
            // Calls are started eagerly, like the original's hot futures;
            // results are collected in order afterwards.
            let command = command.clone();
            let input = (index, kind.to_owned());
            handles.push(tokio::spawn(
                async move { (index, command.execute(input).await) },
            ));
        }
    }

    for handle in handles {
        match handle.await {
            Ok((index, Ok(value))) => println!("** Result[{index}] = {value}"),
            Ok((index, Err(error))) => println!("** Result[{index}] = ERROR: {error}"),
            Err(join_error) => println!("** task failed: {join_error}"),
        }
    }

    println!(
        "@@@@ Elapsed time = {} ms, final breaker state = {:?}",
        start.elapsed().as_millis(),
        command.breaker_state()
    );
}
