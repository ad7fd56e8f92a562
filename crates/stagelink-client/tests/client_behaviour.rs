//! Behavioural tests for the client against a scripted fake bridge.
//!
//! The fake accepts connections on a loopback listener and answers framed
//! commands according to a per-test behaviour function, letting the tests
//! exercise validation, reconnection, and failure surfaces without a real
//! host process.

use std::io::Read;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Map, Value, json};

use stagelink_client::{Client, ClientError};
use stagelink_config::Config;
use stagelink_protocol::{Command, FrameBuffer, FrameProgress, Response, write_message};

/// What the fake bridge does with one received command.
enum Action {
    Reply(Response),
    CloseConnection,
}

/// Spawns a fake bridge answering commands via `behaviour`, which receives
/// the zero-based connection number and the parsed command.
fn spawn_bridge<F>(behaviour: F) -> (SocketAddr, Arc<AtomicUsize>)
where
    F: Fn(usize, &Command) -> Action + Send + Sync + 'static,
{
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind fake bridge");
    let addr = listener.local_addr().expect("local addr");
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);
    let behaviour = Arc::new(behaviour);

    thread::spawn(move || {
        for accepted in listener.incoming() {
            let Ok(stream) = accepted else {
                return;
            };
            let index = counter.fetch_add(1, Ordering::SeqCst);
            let behaviour = Arc::clone(&behaviour);
            thread::spawn(move || serve_connection(stream, index, behaviour.as_ref()));
        }
    });

    (addr, connections)
}

fn serve_connection<F>(mut stream: TcpStream, index: usize, behaviour: &F)
where
    F: Fn(usize, &Command) -> Action,
{
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("arm read timeout");
    let mut frames = FrameBuffer::new(1_048_576);
    let mut chunk = [0_u8; 4096];
    loop {
        let Ok(bytes_read) = stream.read(&mut chunk) else {
            return;
        };
        if bytes_read == 0 {
            return;
        }
        let received = chunk.get(..bytes_read).expect("chunk bounds");
        let Ok(progress) = frames.push_chunk(received) else {
            return;
        };
        let FrameProgress::Complete(value) = progress else {
            continue;
        };
        let command: Command = serde_json::from_value(value).expect("valid command");
        match behaviour(index, &command) {
            Action::Reply(response) => {
                if write_message(&mut stream, &response).is_err() {
                    return;
                }
            }
            Action::CloseConnection => return,
        }
    }
}

fn healthy() -> Action {
    Action::Reply(Response::success(json!({"status": "ok", "tempo": 120.0})))
}

fn client_for(addr: SocketAddr) -> Client {
    client_with(addr, |_config| {})
}

fn client_with<F>(addr: SocketAddr, adjust: F) -> Client
where
    F: FnOnce(&mut Config),
{
    let mut config = Config {
        host: String::from("127.0.0.1"),
        port: addr.port(),
        connect_retry_pause_ms: 10,
        mutate_delay_ms: 0,
        ..Config::default()
    };
    adjust(&mut config);
    Client::new(config)
}

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

#[test]
fn send_command_round_trips_through_one_connection() {
    let (addr, connections) = spawn_bridge(|_, command| match command.name.as_str() {
        "health_check" => healthy(),
        "get_session_info" => Action::Reply(Response::success(json!({
            "tempo": 120.0,
            "track_count": 2,
        }))),
        other => panic!("unexpected command {other}"),
    });

    let client = client_for(addr);
    let result = client
        .send_command("get_session_info", Map::new())
        .expect("command should succeed");
    assert_eq!(result["tempo"], 120.0);
    assert!(client.is_connected());
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[test]
fn connect_is_idempotent() {
    let (addr, connections) = spawn_bridge(|_, _| healthy());

    let client = client_for(addr);
    client.connect().expect("first connect");
    client.connect().expect("second connect");
    assert!(client.is_connected());
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[test]
fn host_errors_surface_without_dropping_the_connection() {
    let (addr, connections) = spawn_bridge(|_, command| match command.name.as_str() {
        "health_check" => healthy(),
        "get_track_info" => Action::Reply(Response::error("track index 9 out of range (0-1)")),
        other => panic!("unexpected command {other}"),
    });

    let client = client_for(addr);
    let error = client
        .send_command("get_track_info", params(json!({"track_index": 9})))
        .expect_err("host error expected");
    assert!(matches!(error, ClientError::Host { .. }));
    assert!(error.to_string().contains("out of range"));

    // The same connection keeps serving; no reconnect happened.
    assert!(client.is_connected());
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[test]
fn reconnects_transparently_after_a_broken_connection() {
    let (addr, connections) = spawn_bridge(|index, command| {
        match (index, command.name.as_str()) {
            // First connection validates, then dies on the real command.
            (0, "health_check") => healthy(),
            (0, _) => Action::CloseConnection,
            // Later connections behave.
            (_, "health_check") => healthy(),
            (_, _) => Action::Reply(Response::success(json!({"tempo": 98.0}))),
        }
    });

    let client = client_for(addr);
    let error = client
        .send_command("get_session_info", Map::new())
        .expect_err("first call should fail on the dead socket");
    assert!(matches!(error, ClientError::ConnectionClosed));
    assert!(!client.is_connected(), "failure must invalidate the handle");

    let result = client
        .send_command("get_session_info", Map::new())
        .expect("second call should transparently reconnect");
    assert_eq!(result["tempo"], 98.0);
    assert_eq!(connections.load(Ordering::SeqCst), 2);
}

#[test]
fn gives_up_after_the_attempt_budget() {
    // Reserve a port with no listener behind it.
    let addr = {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        listener.local_addr().expect("local addr")
    };

    let client = client_for(addr);
    let started = Instant::now();
    let error = client
        .send_command("health_check", Map::new())
        .expect_err("no bridge is listening");
    assert!(matches!(error, ClientError::Exhausted { attempts: 3, .. }));
    assert!(error.to_string().contains("3 attempts"));
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "the call must fail in bounded time, not hang"
    );
}

#[test]
fn validation_failures_consume_the_attempt_budget() {
    let (addr, connections) = spawn_bridge(|_, command| match command.name.as_str() {
        "health_check" => Action::Reply(Response::error("host still loading")),
        other => panic!("unexpected command {other}"),
    });

    let client = client_for(addr);
    let error = client
        .send_command("get_session_info", Map::new())
        .expect_err("validation never passes");
    assert!(matches!(error, ClientError::Exhausted { .. }));
    assert_eq!(
        connections.load(Ordering::SeqCst),
        3,
        "each failed validation should burn one attempt"
    );
}

#[test]
fn mutating_commands_apply_the_settle_delay() {
    let (addr, _connections) = spawn_bridge(|_, command| match command.name.as_str() {
        "health_check" => healthy(),
        _ => Action::Reply(Response::success(json!({"tempo": 120.0}))),
    });

    let client = client_with(addr, |config| config.mutate_delay_ms = 60);
    client.connect().expect("connect");

    let started = Instant::now();
    client
        .send_command("set_tempo", params(json!({"tempo": 120.0})))
        .expect("mutation should succeed");
    assert!(
        started.elapsed() >= Duration::from_millis(120),
        "settle delay applies before and after the response"
    );
}
