//! Ping-pong over real TCP.
//!
//! Run as two separate processes:
//!
//! ```bash
//! # Terminal 1 - start the responder
//! cargo run --example ping_pong -- server
//!
//! # Terminal 2 - run the caller
//! cargo run --example ping_pong -- client
//! ```
//!
//! Set `RUST_LOG=debug` for frame-level tracing.

use std::env;
use std::time::Duration;

use serde_json::{json, Value};
use tether::prelude::*;
use tether_stream::tcp;
use tokio::net::TcpListener;

const SERVER_ADDR: &str = "127.0.0.1:4500";

fn make_pair(name: &str) -> Pair {
    Pair::builder(name)
        .timeout(Duration::from_secs(2))
        .on_error(|err| tracing::error!(error = %err, "pair failure"))
        .build()
        .expect("valid pair config")
}

async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Ping-Pong Server ===");

    let pair = make_pair("server");
    pair.expose("ping", |params| async move {
        let seq = params.first().and_then(Value::as_i64).unwrap_or(0);
        let message = params
            .get(1)
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        println!("received ping seq={seq}: {message:?}");
        Ok(json!({"seq": seq, "echo": format!("pong: {message}")}))
    });

    let listener = TcpListener::bind(SERVER_ADDR).await?;
    println!("listening on {SERVER_ADDR}");

    let (mut handle, peer) = tcp::accept(&pair, &listener).await?;
    println!("peer connected from {peer}");

    // Serve until the peer goes away, reporting stream-level trouble.
    let mut errors = handle.take_errors().expect("first take wins");
    while let Some(err) = errors.recv().await {
        match err {
            tether_stream::StreamError::Closed => break,
            other => eprintln!("stream error: {other}"),
        }
    }
    println!("peer disconnected, shutting down");
    Ok(())
}

async fn run_client() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Ping-Pong Client ===");

    let pair = make_pair("client");
    let _handle = tcp::connect(&pair, SERVER_ADDR).await?;
    println!("connected to {SERVER_ADDR}");

    let mut successes = 0;
    for seq in 0..5 {
        let message = format!("hello from client (seq={seq})");
        println!("sending ping seq={seq}");
        match pair.call("ping", args![seq, message]).await {
            Ok(response) => {
                println!("received {}", response["echo"]);
                successes += 1;
            }
            Err(err) => println!("rpc error: {err}"),
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    println!("{successes}/5 pings completed");
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mode = env::args().nth(1).unwrap_or_else(|| "help".to_string());

    // Pairs are single-threaded: current-thread runtime plus a LocalSet.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .expect("failed to build runtime");
    let local = tokio::task::LocalSet::new();

    match mode.as_str() {
        "server" => runtime.block_on(local.run_until(async {
            if let Err(err) = run_server().await {
                eprintln!("server error: {err}");
                std::process::exit(1);
            }
        })),
        "client" => runtime.block_on(local.run_until(async {
            if let Err(err) = run_client().await {
                eprintln!("client error: {err}");
                std::process::exit(1);
            }
        })),
        _ => {
            println!("Ping-pong over tether-stream TCP.\n");
            println!("Usage:");
            println!("  cargo run --example ping_pong -- server   # start the responder");
            println!("  cargo run --example ping_pong -- client   # run the caller");
        }
    }
}
