//! End-to-end behaviour of the command server over real loopback sockets.
//!
//! These tests drive a running [`CommandServer`] backed by the stub song,
//! either through the real client crate or through raw framed sockets when
//! the scenario needs byte-level control.

use std::collections::VecDeque;
use std::io::Read;
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Map, Value, json};

use stagelink_client::{Client, ClientError};
use stagelink_config::Config;
use stagelink_protocol::{FrameBuffer, FrameProgress, Response, write_message};
use stagelinkd::{
    CommandServer, HostScheduler, ScheduledTask, ServerState, SongModel, StubSong, TickScheduler,
};

fn server_config(adjust: impl FnOnce(&mut Config)) -> Config {
    let mut config = Config {
        host: String::from("127.0.0.1"),
        port: 0,
        ..Config::default()
    };
    adjust(&mut config);
    config
}

fn start_server(config: Config) -> (CommandServer, SocketAddr) {
    let scheduler = TickScheduler::start(Duration::from_millis(1)).expect("start scheduler");
    let server = CommandServer::new(config, Arc::new(StubSong::demo()), Arc::new(scheduler));
    server.start().expect("start server");
    let addr = server.local_addr().expect("bound address");
    (server, addr)
}

fn client_for(addr: SocketAddr) -> Client {
    Client::new(Config {
        host: String::from("127.0.0.1"),
        port: addr.port(),
        connect_retry_pause_ms: 10,
        mutate_delay_ms: 0,
        ..Config::default()
    })
}

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn send_frame(stream: &mut TcpStream, value: &Value) {
    write_message(stream, value).expect("write frame");
}

fn read_frame(stream: &mut TcpStream, timeout: Duration) -> Response {
    stream
        .set_read_timeout(Some(timeout))
        .expect("arm read timeout");
    let mut frames = FrameBuffer::new(1_048_576);
    let mut chunk = [0_u8; 4096];
    loop {
        let bytes_read = stream.read(&mut chunk).expect("read response");
        assert!(bytes_read > 0, "connection closed before a response arrived");
        let received = chunk.get(..bytes_read).expect("chunk bounds");
        if let FrameProgress::Complete(value) = frames.push_chunk(received).expect("no overflow") {
            return serde_json::from_value(value).expect("valid response");
        }
    }
}

#[test]
fn health_check_round_trips_through_the_client() {
    let (server, addr) = start_server(server_config(|_| {}));
    let client = client_for(addr);

    let result = client
        .send_command("health_check", Map::new())
        .expect("health check");
    assert_eq!(result["status"], "ok");
    assert_eq!(result["track_count"], 2);

    drop(client);
    server.stop().expect("stop server");
}

#[test]
fn mutation_is_visible_to_the_next_query_on_the_same_connection() {
    let (server, addr) = start_server(server_config(|_| {}));
    let client = client_for(addr);

    let applied = client
        .send_command(
            "set_track_volume",
            params(json!({"track_index": 0, "volume": 0.5})),
        )
        .expect("set volume");
    assert_eq!(applied["volume"], 0.5);

    let info = client
        .send_command("get_track_info", params(json!({"track_index": 0})))
        .expect("track info");
    assert_eq!(info["volume"], 0.5, "the deferred write must be applied");

    drop(client);
    server.stop().expect("stop server");
}

#[test]
fn unknown_commands_are_structured_errors_not_disconnects() {
    let (server, addr) = start_server(server_config(|_| {}));
    let client = client_for(addr);

    let error = client
        .send_command("totally_bogus", Map::new())
        .expect_err("bogus command");
    assert!(matches!(error, ClientError::Host { .. }));
    assert!(error.to_string().contains("Unknown command"));

    // The connection survives and keeps serving.
    assert!(client.is_connected());
    client
        .send_command("health_check", Map::new())
        .expect("follow-up command");

    drop(client);
    server.stop().expect("stop server");
}

#[test]
fn excess_connections_wait_instead_of_being_rejected() {
    let (server, addr) = start_server(server_config(|config| config.max_clients = 1));

    let mut first = TcpStream::connect(addr).expect("first connection");
    send_frame(&mut first, &json!({"type": "health_check", "params": {}}));
    assert!(!read_frame(&mut first, Duration::from_secs(5)).is_error());

    // The second connection sits in the backlog while the ceiling is hit.
    let mut second = TcpStream::connect(addr).expect("second connection");
    send_frame(&mut second, &json!({"type": "health_check", "params": {}}));

    thread::sleep(Duration::from_millis(1500));
    assert_eq!(
        server.active_connections(),
        1,
        "the ceiling must hold while the first connection is open"
    );

    drop(first);
    let response = read_frame(&mut second, Duration::from_secs(5));
    assert!(
        !response.is_error(),
        "the queued connection must be served once capacity frees up"
    );

    drop(second);
    server.stop().expect("stop server");
}

#[test]
fn buffer_overflow_closes_only_the_offending_connection() {
    let (server, addr) = start_server(server_config(|config| config.max_message_bytes = 64));

    let mut healthy = TcpStream::connect(addr).expect("healthy connection");
    send_frame(&mut healthy, &json!({"type": "health_check", "params": {}}));
    assert!(!read_frame(&mut healthy, Duration::from_secs(5)).is_error());

    let mut flooder = TcpStream::connect(addr).expect("flooding connection");
    // An unterminated string never parses, so the buffer only grows.
    let garbage = [b"\"".as_slice(), &[b'a'; 256]].concat();
    send_frame_raw(&mut flooder, &garbage);

    flooder
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("arm read timeout");
    let mut sink = [0_u8; 16];
    let closed = flooder.read(&mut sink).expect("read after overflow");
    assert_eq!(closed, 0, "the flooding connection must be closed silently");

    // The healthy connection is unaffected.
    send_frame(&mut healthy, &json!({"type": "get_session_info", "params": {}}));
    assert!(!read_frame(&mut healthy, Duration::from_secs(5)).is_error());

    drop(healthy);
    server.stop().expect("stop server");
}

fn send_frame_raw(stream: &mut TcpStream, bytes: &[u8]) {
    use std::io::Write;
    stream.write_all(bytes).expect("write bytes");
    stream.flush().expect("flush bytes");
}

/// Scheduler that never runs anything, for timeout scenarios.
struct StalledScheduler;

impl HostScheduler for StalledScheduler {
    fn run_async(&self, task: ScheduledTask) {
        // Leak the task sender-side: the bridge's wait must expire.
        std::mem::forget(task);
    }

    fn is_on_scheduler_thread(&self) -> bool {
        false
    }
}

#[test]
fn stalled_scheduler_turns_into_a_timeout_error_response() {
    let config = server_config(|config| config.command_timeout_secs = 1);
    let server = CommandServer::new(
        config,
        Arc::new(StubSong::demo()),
        Arc::new(StalledScheduler),
    );
    server.start().expect("start server");
    let addr = server.local_addr().expect("bound address");

    let mut stream = TcpStream::connect(addr).expect("connect");
    send_frame(
        &mut stream,
        &json!({"type": "set_tempo", "params": {"tempo": 128.0}}),
    );

    let started = Instant::now();
    let response = read_frame(&mut stream, Duration::from_secs(5));
    let waited = started.elapsed();

    match response {
        Response::Error { message } => assert!(
            message.contains("Timeout"),
            "expected a timeout message, got: {message}"
        ),
        Response::Success { .. } => panic!("a stalled mutation must not succeed"),
    }
    assert!(
        waited >= Duration::from_millis(900) && waited < Duration::from_secs(4),
        "timeout should fire near the configured bound, got {waited:?}"
    );

    drop(stream);
    server.stop().expect("stop server");
}

/// Scheduler that queues tasks until the test runs them by hand.
#[derive(Default)]
struct ManualScheduler {
    tasks: Mutex<VecDeque<ScheduledTask>>,
}

impl ManualScheduler {
    fn queued(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn run_one(&self) -> bool {
        let task = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        task.map(|task| task()).is_some()
    }
}

impl HostScheduler for ManualScheduler {
    fn run_async(&self, task: ScheduledTask) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(task);
    }

    fn is_on_scheduler_thread(&self) -> bool {
        false
    }
}

fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn a_worker_never_has_two_tasks_in_flight() {
    let scheduler = Arc::new(ManualScheduler::default());
    let song: Arc<dyn SongModel> = Arc::new(StubSong::demo());
    let server = CommandServer::new(
        server_config(|_| {}),
        song,
        Arc::clone(&scheduler) as Arc<dyn HostScheduler>,
    );
    server.start().expect("start server");
    let addr = server.local_addr().expect("bound address");

    let mut stream = TcpStream::connect(addr).expect("connect");
    send_frame(
        &mut stream,
        &json!({"type": "set_tempo", "params": {"tempo": 100.0}}),
    );
    assert!(
        wait_until(Duration::from_secs(2), || scheduler.queued() == 1),
        "the first mutation should reach the scheduler"
    );

    // A second command on the same connection stays in the socket buffer:
    // the worker is still blocked on the first task's result.
    send_frame(
        &mut stream,
        &json!({"type": "set_track_volume", "params": {"track_index": 0, "volume": 0.3}}),
    );
    thread::sleep(Duration::from_millis(300));
    assert_eq!(
        scheduler.queued(),
        1,
        "the worker must not issue a second task before the first resolves"
    );

    assert!(scheduler.run_one(), "run the first task");
    assert!(!read_frame(&mut stream, Duration::from_secs(5)).is_error());

    // Only now does the worker read and defer the second command.
    assert!(
        wait_until(Duration::from_secs(2), || scheduler.queued() == 1),
        "the second mutation should reach the scheduler after the first response"
    );
    assert!(scheduler.run_one(), "run the second task");
    assert!(!read_frame(&mut stream, Duration::from_secs(5)).is_error());

    drop(stream);
    server.stop().expect("stop server");
}

#[test]
fn stop_returns_promptly_with_an_idle_connection_open() {
    let (server, addr) = start_server(server_config(|_| {}));

    let mut stream = TcpStream::connect(addr).expect("connect");
    send_frame(&mut stream, &json!({"type": "health_check", "params": {}}));
    assert!(!read_frame(&mut stream, Duration::from_secs(5)).is_error());

    let started = Instant::now();
    server.stop().expect("stop server");
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "stop must not wait for idle workers"
    );
    assert_eq!(server.state(), ServerState::Stopped);
}
