//! Utility functions for exercising the dispatcher from the command line.

use anyhow::{anyhow, bail};
use rpc_core::{callable, sync_callable, Args, Namespace};
use serde_json::{json, Value};
use std::time::Duration;

pub fn namespace() -> Namespace {
    Namespace::new("util")
        .function("echo", sync_callable(echo))
        .function("add", sync_callable(add))
        .function("fail", sync_callable(fail))
        .function(
            "sleep",
            callable(|args| async move {
                let ms = sleep_ms(&args)?;
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok::<_, anyhow::Error>(json!({ "slept_ms": ms }))
            }),
        )
}

fn echo(args: Args) -> anyhow::Result<Value> {
    Ok(json!({
        "positional": args.positional,
        "named": args.named,
    }))
}

/// Integer sum when every argument is an integer, float sum otherwise.
fn add(args: Args) -> anyhow::Result<Value> {
    let mut int_sum: Option<i64> = Some(0);
    let mut float_sum = 0.0;

    for (index, value) in args.positional.iter().enumerate() {
        let number = value
            .as_f64()
            .ok_or_else(|| anyhow!("argument {} is not a number: {}", index, value))?;
        float_sum += number;
        int_sum = match (int_sum, value.as_i64()) {
            (Some(sum), Some(n)) => sum.checked_add(n),
            _ => None,
        };
    }

    Ok(match int_sum {
        Some(sum) => json!(sum),
        None => json!(float_sum),
    })
}

fn fail(args: Args) -> anyhow::Result<Value> {
    let message: Option<String> = args.opt_named_arg("message")?;
    bail!(message.unwrap_or_else(|| "requested failure".to_string()))
}

/// `ms` as a named argument, or the first positional one.
fn sleep_ms(args: &Args) -> anyhow::Result<u64> {
    match args.opt_named_arg("ms")? {
        Some(ms) => Ok(ms),
        None => args.arg(0),
    }
}
