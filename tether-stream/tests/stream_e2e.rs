//! End-to-end tests over real byte streams.

use std::time::Duration;

use serde_json::{json, Value};
use tether::prelude::*;
use tether_stream::{bind, StreamError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

fn quiet_pair(name: &str) -> Pair {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    Pair::builder(name)
        .on_error(move |err| tracing::warn!(error = %err, "pair failure"))
        .build()
        .expect("valid pair config")
}

/// Two pairs talking newline-JSON over an in-memory duplex.
fn duplex_pairs() -> (Pair, Pair, tether_stream::StreamHandle, tether_stream::StreamHandle) {
    let client = quiet_pair("client");
    let server = quiet_pair("server");

    let (client_end, server_end) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client_end);
    let (server_read, server_write) = tokio::io::split(server_end);

    let client_handle = bind(&client, client_read, client_write);
    let server_handle = bind(&server, server_read, server_write);

    (client, server, client_handle, server_handle)
}

macro_rules! local_test {
    ($body:expr) => {
        tokio::task::LocalSet::new().run_until($body).await
    };
}

#[tokio::test]
async fn test_call_round_trips_over_bytes() {
    local_test!(async {
        let (client, server, _ch, _sh) = duplex_pairs();

        server.expose("add", |params| async move {
            let sum: i64 = params.iter().filter_map(Value::as_i64).sum();
            Ok(json!(sum))
        });

        let result = client.call("add", args![10, 5]).await;
        assert_eq!(result.expect("call succeeds"), json!(15));
    })
}

#[tokio::test]
async fn test_events_and_actors_work_over_bytes() {
    local_test!(async {
        let (client, server, _ch, _sh) = duplex_pairs();

        let registry = ActorRegistry::new();
        registry.attach(&server).expect("registry attaches");
        server
            .expose_actor(
                "greeter",
                std::rc::Rc::new(ActorObject::new().with_method("greet", |params| async move {
                    let name = params
                        .first()
                        .and_then(Value::as_str)
                        .unwrap_or("stranger")
                        .to_string();
                    Ok(json!(format!("hello, {name}")))
                })),
            )
            .expect("registration succeeds");

        let greeting = client
            .actor("greeter")
            .call("greet", args!["tether"])
            .await
            .expect("actor call resolves");
        assert_eq!(greeting, json!("hello, tether"));

        client.emit("ping", args![]).await.expect("ack arrives");
    })
}

#[tokio::test]
async fn test_undecodable_line_reports_error_without_tearing_down() {
    local_test!(async {
        let server = quiet_pair("server");
        server.expose("echo", |params| async move {
            Ok(params.into_iter().next().unwrap_or(Value::Null))
        });

        let (raw_end, server_end) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_end);
        let mut handle = bind(&server, server_read, server_write);
        let mut errors = handle.take_errors().expect("first take wins");
        assert!(handle.take_errors().is_none());

        let (raw_read, mut raw_write) = tokio::io::split(raw_end);
        let mut raw_lines = BufReader::new(raw_read).lines();

        // A garbage line, then a well-formed call on the same stream.
        raw_write
            .write_all(b"this is not json\n")
            .await
            .expect("write succeeds");
        raw_write
            .write_all(
                format!(
                    "{}\n",
                    json!({"type": "call", "id": "raw:1", "method": "echo", "params": ["still alive"]})
                )
                .as_bytes(),
            )
            .await
            .expect("write succeeds");

        let error = tokio::time::timeout(Duration::from_millis(500), errors.recv())
            .await
            .expect("error arrives")
            .expect("channel open");
        match error {
            StreamError::Parse { line, original } => {
                assert_eq!(line, "this is not json");
                assert!(!original.is_empty());
            }
            other => panic!("expected parse error, got {other:?}"),
        }

        let reply_line = tokio::time::timeout(Duration::from_millis(500), raw_lines.next_line())
            .await
            .expect("reply arrives")
            .expect("read succeeds")
            .expect("stream still open");
        let reply: Value = serde_json::from_str(&reply_line).expect("reply is json");
        assert_eq!(reply["id"], json!("raw:1"));
        assert_eq!(reply["result"], json!("still alive"));
    })
}

#[tokio::test]
async fn test_disconnect_installs_a_noop_send() {
    local_test!(async {
        let (client, server, client_handle, _sh) = duplex_pairs();
        server.expose("echo", |params| async move {
            Ok(params.into_iter().next().unwrap_or(Value::Null))
        });

        // Sanity: the wire works before disconnecting.
        client.call("echo", args![1]).await.expect("call succeeds");

        client_handle.disconnect();

        let err = client
            .call_with(
                CallOptions::timeout(Duration::from_millis(30)),
                "echo",
                args![2],
            )
            .await
            .expect_err("frames go nowhere after disconnect");
        assert!(err.to_string().contains("Timeout"));
    })
}

#[tokio::test]
async fn test_frames_arrive_in_send_order() {
    local_test!(async {
        let (client, server, _ch, _sh) = duplex_pairs();

        let order = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let seen = order.clone();
        server.on("seq", move |args| {
            seen.borrow_mut()
                .push(args.first().cloned().unwrap_or(Value::Null))
        });

        for n in 0..10 {
            client.emit("seq", vec![json!(n)]).await.expect("ack arrives");
        }

        let seen: Vec<i64> = order
            .borrow()
            .iter()
            .filter_map(Value::as_i64)
            .collect();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    })
}
