//! End-to-end session tests against a scripted authority.
//!
//! The test thread plays the game authority: it accepts the runtime's
//! connection, pushes lifecycle events, and answers capability calls frame by
//! frame.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::cast_possible_truncation)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::{Value, json};

use ratchet::config::RuntimeConfig;
use ratchet::game::Team;
use ratchet::gateway::Link;
use ratchet::protocol::Method;
use ratchet::sandbox::Bundle;
use ratchet::session::{Session, SessionError};
use ratchet::transport::Client;

/// Counts turns, logs the count, then asks for the round number.
const COUNTER: &str = "\
load_const 0
store_name count
load_const @turn
make_function
store_name turn
.func turn
    load_global count
    load_const 1
    binary_op +
    store_global count
    load_global log
    load_global count
    call_function 1
    pop_top
    load_global rc
    load_attr get_round_num
    call_function 0
    pop_top
.end
";

/// Tries to move north and logs when the move is rejected.
const CAREFUL: &str = "\
load_const @turn
make_function
store_name turn
.func turn
    setup_except handler
    load_global rc
    load_attr move
    load_global Direction
    load_attr NORTH
    call_function 1
    pop_top
    pop_block
    jump done
handler:
    copy 1
    load_global GameActionException
    compare_op exc_match
    pop_jump_if_false again
    pop_top
    load_global log
    load_const \"caught\"
    call_function 1
    pop_top
    jump done
again:
    reraise
done:
    load_const none
    return_value
.end
";

/// Spins forever.
const SPINNER: &str = "\
load_const @turn
make_function
store_name turn
.func turn
top:
    nop
    jump top
.end
";

struct Authority {
    stream: TcpStream,
}

impl Authority {
    fn send(&mut self, value: &Value) {
        let body = serde_json::to_vec(value).unwrap();
        self.stream.write_all(&(body.len() as u32).to_be_bytes()).unwrap();
        self.stream.write_all(&body).unwrap();
    }

    fn recv(&mut self) -> Value {
        let mut header = [0u8; 4];
        self.stream.read_exact(&mut header).unwrap();
        let mut body = vec![0u8; u32::from_be_bytes(header) as usize];
        self.stream.read_exact(&mut body).unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    /// Receive a request and check its method.
    fn expect(&mut self, method: Method) -> Vec<Value> {
        let message = self.recv();
        assert_eq!(message["method"], json!(method.id()), "unexpected request {message}");
        message["params"].as_array().unwrap().clone()
    }

    fn expect_null(&mut self) {
        assert_eq!(self.recv(), Value::Null);
    }

    fn end_turn(&mut self) -> i64 {
        self.expect(Method::EndTurn)[0].as_i64().unwrap()
    }

    fn spawn(&mut self, team: usize, id: i64) {
        self.send(&json!({"type": "spawn_bot", "team": team, "id": id}));
        self.expect_null();
    }

    fn start_turn(&mut self, round: i64, id: i64) {
        self.send(&json!({"type": "start_turn", "round": round, "id": id}));
    }

    fn end_game(mut self, runtime: JoinHandle<Result<(), SessionError>>) {
        self.send(&json!({"type": "end_game"}));
        runtime.join().unwrap().unwrap();
        let mut rest = Vec::new();
        assert_eq!(self.stream.read_to_end(&mut rest).unwrap(), 0);
    }
}

fn start(
    programs: Vec<(Team, &str)>,
    bytecode_limit: i64,
) -> (Authority, JoinHandle<Result<(), SessionError>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let bundles: Vec<(Team, Arc<Bundle>)> = programs
        .into_iter()
        .map(|(team, source)| (team, Arc::new(Bundle::from_sources([("bot", source)]).unwrap())))
        .collect();
    let config = RuntimeConfig {
        host: addr.ip(),
        port: addr.port(),
        bytecode_limit,
        retry_interval: Duration::from_millis(5),
        stack_size: 4 * 1024 * 1024,
        ..RuntimeConfig::default()
    };
    let runtime = thread::spawn(move || {
        let client = Client::connect(config.addr(), config.retry_interval)?;
        let mut session = bundles
            .into_iter()
            .fold(Session::new(Link::new(client), config), |session, (team, bundle)| {
                session.with_program(team, bundle)
            });
        session.run()
    });
    let (stream, _) = listener.accept().unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    (Authority { stream }, runtime)
}

#[test]
fn test_counter_persists_until_uncaught_game_action() {
    let (mut authority, runtime) = start(vec![(Team::A, COUNTER)], 1_000);

    authority.spawn(0, 7);
    assert!(authority.end_turn() > 0);

    for round in 1..=2 {
        authority.start_turn(round, 7);
        assert_eq!(authority.expect(Method::Log), vec![json!(round.to_string())]);
        authority.send(&Value::Null);
        authority.expect(Method::RcGetRoundNum);
        authority.send(&json!(round));
        let used = authority.end_turn();
        assert!(used > 0 && used < 1_000);
    }

    // Round 3: the authority rejects the call and nothing catches it.
    authority.start_turn(3, 7);
    assert_eq!(authority.expect(Method::Log), vec![json!("3")]);
    authority.send(&Value::Null);
    authority.expect(Method::RcGetRoundNum);
    authority.send(&json!({"type": 9, "etype": 2, "msg": "Cannot move there."}));
    let report = authority.expect(Method::ThrowGameActionException);
    assert_eq!(report[0], json!(2));
    let traceback = report[1].as_str().unwrap();
    assert!(traceback.starts_with("Traceback (most recent call last):"));
    assert!(traceback.contains("CANT_MOVE_THERE"));
    assert!(traceback.contains("Cannot move there."));

    // The failed instance is gone.
    authority.start_turn(4, 7);
    assert!(authority.expect(Method::RcDisintegrate).is_empty());

    authority.end_game(runtime);
}

#[test]
fn test_caught_game_action_keeps_instance_alive() {
    let (mut authority, runtime) = start(vec![(Team::B, CAREFUL)], 1_000);

    authority.spawn(1, 12);
    authority.end_turn();

    for round in 1..=2 {
        authority.start_turn(round, 12);
        let params = authority.expect(Method::RcMove);
        assert_eq!(params[0]["type"], json!(1));
        authority.send(&json!({"type": 9, "etype": 2, "msg": "blocked"}));
        assert_eq!(authority.expect(Method::Log), vec![json!("caught")]);
        authority.send(&Value::Null);
        authority.end_turn();
    }

    authority.end_game(runtime);
}

#[test]
fn test_team_without_program_reports_exception() {
    let (mut authority, runtime) = start(vec![(Team::A, COUNTER)], 1_000);

    authority.spawn(1, 3);
    let report = authority.expect(Method::ThrowException);
    assert!(report[0].as_str().unwrap().contains("No program for team B."));

    authority.start_turn(1, 3);
    authority.expect(Method::RcDisintegrate);

    authority.end_game(runtime);
}

#[test]
fn test_spinning_program_pauses_and_is_destroyed() {
    let (mut authority, runtime) = start(vec![(Team::A, SPINNER)], 200);

    authority.spawn(0, 5);
    authority.end_turn();

    for round in 1..=3 {
        authority.start_turn(round, 5);
        assert!(authority.end_turn() >= 200);
    }

    authority.send(&json!({"type": "destroy_bot", "id": 5}));
    authority.expect_null();
    authority.start_turn(4, 5);
    authority.expect(Method::RcDisintegrate);

    authority.end_game(runtime);
}

#[test]
fn test_destroy_notification_during_call() {
    let (mut authority, runtime) = start(vec![(Team::B, CAREFUL)], 1_000);

    authority.spawn(1, 20);
    authority.end_turn();

    authority.start_turn(1, 20);
    authority.expect(Method::RcMove);
    authority.send(&json!({"type": "destroy_bot", "id": 20}));
    authority.expect_null();
    authority.send(&json!(true));
    authority.end_turn();

    authority.start_turn(2, 20);
    authority.expect(Method::RcDisintegrate);

    authority.end_game(runtime);
}

#[test]
fn test_unknown_event_is_fatal() {
    let (mut authority, runtime) = start(vec![], 1_000);
    authority.send(&json!({"type": "reboot"}));
    let err = runtime.join().unwrap().unwrap_err();
    assert!(err.to_string().contains("Unknown message type"));
}
