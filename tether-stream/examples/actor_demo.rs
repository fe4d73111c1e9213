//! Actors over an in-memory duplex: registration, late binding, events.
//!
//! ```bash
//! cargo run --example actor_demo
//! RUST_LOG=debug cargo run --example actor_demo
//! ```

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use serde_json::json;
use tether::prelude::*;
use tether_stream::bind;

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let host = Pair::builder("host")
        .on_error(|err| tracing::error!(error = %err, "host pair failure"))
        .build()?;
    let remote = Pair::builder("remote")
        .on_error(|err| tracing::error!(error = %err, "remote pair failure"))
        .build()?;

    let (host_end, remote_end) = tokio::io::duplex(64 * 1024);
    let (host_read, host_write) = tokio::io::split(host_end);
    let (remote_read, remote_write) = tokio::io::split(remote_end);
    let _host_wire = bind(&host, host_read, host_write);
    let _remote_wire = bind(&remote, remote_read, remote_write);

    let registry = ActorRegistry::new();
    registry.attach(&host)?;

    // The remote side starts calling before the actor exists; the call
    // binds as soon as registration lands.
    let early_call = tokio::task::spawn_local({
        let remote = remote.clone();
        async move { remote.call_actor("counter-1", "increment", args![]).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    let value = Rc::new(Cell::new(0i64));
    let state = value.clone();
    let counter = Rc::new(
        ActorObject::new()
            .with_property("name", json!("counter-1"))
            .with_method("increment", move |_| {
                let state = state.clone();
                async move {
                    state.set(state.get() + 1);
                    Ok(json!(state.get()))
                }
            }),
    );
    host.expose_actor("counter-1", counter.clone())?;
    println!("actor registered");

    let early = early_call.await?.expect("late-bound call resolves");
    println!("early call (sent before registration) resolved: {early}");

    let handle = remote.actor("counter-1");
    println!("name property: {}", handle.get("name").await?);
    println!("increment: {}", handle.call("increment", args![]).await?);

    // Actor events arrive under their scoped name on the remote side.
    handle.on("milestone", |data| {
        println!("milestone event from actor: {data:?}");
    });
    counter.emit("milestone", &[json!({"value": value.get()})]);
    tokio::time::sleep(Duration::from_millis(100)).await;

    host.expire_actor("counter-1")?;
    match handle.call("increment", args![]).await {
        Err(err) => println!("after expiry, calls fail: {err}"),
        Ok(value) => println!("unexpected success after expiry: {value}"),
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .expect("failed to build runtime");
    let local = tokio::task::LocalSet::new();

    runtime.block_on(local.run_until(async {
        if let Err(err) = run().await {
            eprintln!("demo error: {err}");
            std::process::exit(1);
        }
    }));
}
