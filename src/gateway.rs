//! Capability gateway: the only way a program reaches the outside world.
//!
//! Each capability resolves its arguments to a method id, encodes the
//! parameters, performs one blocking round trip on the shared link and decodes
//! the response. Lifecycle notifications that arrive in place of a response
//! are queued on the [`Link`] and acknowledged without the caller noticing.

mod table;

pub use table::{
    Capability, Literal, Param, TableBuilder, controller, free_functions, overload,
};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::Value as Json;
use tracing::{debug, trace};

use crate::codec::{self, CodecError};
use crate::error::{ErrorKind, ProgramError};
use crate::protocol::{DESTROY_BOT, Method, Request};
use crate::transport::{Client, TransportError};
use crate::vm::{Args, Interp, Native, Unwind, Value, ops};

/// Something that answers capability calls.
pub trait Authority: Send {
    /// Send one request and wait for its response.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the link fails.
    fn call(&mut self, method: Method, params: Vec<Json>) -> Result<Json, TransportError>;
}

/// Authority shared between the session and every worker.
pub type SharedAuthority = Arc<Mutex<dyn Authority>>;

/// The session's end of the transport, with the destroy-notification queue.
#[derive(Debug)]
pub struct Link {
    client: Client,
    destroyed: VecDeque<i64>,
}

impl Link {
    /// Wrap a connected client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self {
            client,
            destroyed: VecDeque::new(),
        }
    }

    /// Send a request without waiting for a response.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the write fails.
    pub fn send(&mut self, method: Method, params: Vec<Json>) -> Result<(), TransportError> {
        trace!(method = method.name(), "send");
        self.client.send(&Request::new(method, params))
    }

    /// Acknowledge with `null`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the write fails.
    pub fn send_null(&mut self) -> Result<(), TransportError> {
        self.client.send_null()
    }

    /// Read the next document.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the read fails.
    pub fn receive(&mut self) -> Result<Json, TransportError> {
        self.client.receive()
    }

    /// Ids whose destroy notification arrived during a capability call.
    pub fn take_destroyed(&mut self) -> Vec<i64> {
        self.destroyed.drain(..).collect()
    }

    /// Close the connection.
    pub fn close(&mut self) {
        self.client.close();
    }
}

impl Authority for Link {
    fn call(&mut self, method: Method, params: Vec<Json>) -> Result<Json, TransportError> {
        self.send(method, params)?;
        loop {
            let response = self.client.receive()?;
            match destroy_notification(&response)? {
                Some(id) => {
                    debug!(id, method = method.name(), "destroy notification during call");
                    self.destroyed.push_back(id);
                    self.client.send_null()?;
                }
                None => return Ok(response),
            }
        }
    }
}

fn destroy_notification(response: &Json) -> Result<Option<i64>, TransportError> {
    let Some(fields) = response.as_object() else {
        return Ok(None);
    };
    if fields.get("type").and_then(Json::as_str) != Some(DESTROY_BOT) {
        return Ok(None);
    }
    fields
        .get("id")
        .and_then(Json::as_i64)
        .map(Some)
        .ok_or_else(|| TransportError::Malformed("destroy_bot without an id".to_string()))
}

impl From<CodecError> for Unwind {
    fn from(error: CodecError) -> Self {
        match error {
            CodecError::Thrown { kind, message } => {
                Self::Raise(ProgramError::new(ErrorKind::GameAction(kind), message))
            }
            CodecError::Unsupported(_) => Self::Raise(ProgramError::type_error(error.to_string())),
            CodecError::Malformed(msg) => Self::Transport(TransportError::Malformed(msg)),
        }
    }
}

/// Program-side handle for making capability calls.
#[derive(Clone)]
pub struct Gateway {
    authority: SharedAuthority,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway").finish_non_exhaustive()
    }
}

impl Gateway {
    /// Gateway over a shared authority.
    #[must_use]
    pub fn new(authority: SharedAuthority) -> Self {
        Self { authority }
    }

    /// One raw round trip. The lock is released before returning.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the link fails or its lock is poisoned.
    pub fn round_trip(&self, method: Method, params: Vec<Json>) -> Result<Json, TransportError> {
        let mut authority = self.authority.lock().map_err(|_| TransportError::Poisoned)?;
        authority.call(method, params)
    }

    /// Run one capability call from a program.
    ///
    /// # Errors
    ///
    /// Raises `ValueError` for an unmatched overload, `TypeError` for an
    /// unsupported argument, `GameActionException` when the authority rejects
    /// the action, and [`Unwind::Transport`] when the link fails.
    pub fn invoke(
        &self,
        interp: &mut Interp,
        capability: &Capability,
        args: Args,
    ) -> Result<Value, Unwind> {
        if capability.cost > 0 {
            interp.meter.charge(capability.cost)?;
        }
        let (method, values) = capability.resolve(args)?;
        let params = values.iter().map(codec::encode).collect::<Result<Vec<_>, _>>()?;
        let response = self.round_trip(method, params)?;
        Ok(codec::decode(&response)?)
    }

    /// `log(*messages)`: join the string forms with spaces and send them.
    ///
    /// # Errors
    ///
    /// As [`Gateway::invoke`].
    pub fn log(&self, args: Args) -> Result<Value, Unwind> {
        if let Some((name, _)) = args.keywords.first() {
            return Err(ProgramError::type_error(format!(
                "log() got an unexpected keyword argument '{name}'"
            ))
            .into());
        }
        let line = args.positional.iter().map(ops::to_str).collect::<Vec<_>>().join(" ");
        self.round_trip(Method::Log, vec![Json::String(line)])?;
        Ok(Value::None)
    }

    /// Callable values for a capability table.
    #[must_use]
    pub fn bind(&self, capabilities: Vec<Capability>) -> Vec<(&'static str, Value)> {
        capabilities
            .into_iter()
            .map(|capability| {
                let gateway = self.clone();
                let name = capability.name;
                let value = Native::value(name, move |interp, args| {
                    gateway.invoke(interp, &capability, args)
                });
                (name, value)
            })
            .collect()
    }

    /// The `log` free function.
    #[must_use]
    pub fn log_function(&self) -> Value {
        let gateway = self.clone();
        Native::value("log", move |_, args| gateway.log(args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Direction, GameActionKind, MapLocation};
    use crate::vm::{Bare, Meter, Namespace};
    use serde_json::json;
    use std::rc::Rc;

    /// Records every call and answers from a script.
    #[derive(Default)]
    struct Scripted {
        calls: Vec<(Method, Vec<Json>)>,
        replies: VecDeque<Json>,
    }

    impl Authority for Scripted {
        fn call(&mut self, method: Method, params: Vec<Json>) -> Result<Json, TransportError> {
            self.calls.push((method, params));
            self.replies.pop_front().ok_or(TransportError::Closed)
        }
    }

    fn setup(replies: Vec<Json>) -> (Arc<Mutex<Scripted>>, Gateway, Interp) {
        let scripted = Arc::new(Mutex::new(Scripted {
            calls: Vec::new(),
            replies: replies.into(),
        }));
        let shared: SharedAuthority = scripted.clone();
        let interp = Interp::new(Meter::new(100), Rc::new(Namespace::new()), Rc::new(Bare), 50);
        (scripted, Gateway::new(shared), interp)
    }

    fn find(name: &str) -> Capability {
        controller().into_iter().find(|c| c.name == name).unwrap()
    }

    #[test]
    fn test_overloads_select_method_ids() {
        let (scripted, gateway, mut interp) = setup(vec![json!([]); 4]);
        let robots = find("sense_nearby_robots");
        let team = Value::Team(crate::game::Team::B);
        let here = Value::Location(MapLocation::new(1, 2));

        gateway.invoke(&mut interp, &robots, Args::default()).unwrap();
        let radius_only = Args {
            positional: Vec::new(),
            keywords: vec![("radius_squared".to_string(), Value::Int(20))],
        };
        gateway.invoke(&mut interp, &robots, radius_only).unwrap();
        let keywords = Args {
            positional: Vec::new(),
            keywords: vec![
                ("team".to_string(), team.clone()),
                ("radius_squared".to_string(), Value::Int(20)),
            ],
        };
        gateway.invoke(&mut interp, &robots, keywords).unwrap();
        gateway
            .invoke(&mut interp, &robots, Args::positional(vec![here, Value::Int(4), team]))
            .unwrap();

        let calls = scripted.lock().unwrap();
        let ids: Vec<u8> = calls.calls.iter().map(|(m, _)| m.id()).collect();
        assert_eq!(ids, [38, 39, 40, 41]);
        assert_eq!(calls.calls[2].1, vec![json!(20), json!({"type": 8, "val": 1})]);
    }

    #[test]
    fn test_invalid_combination_is_value_error() {
        let (scripted, gateway, mut interp) = setup(Vec::new());
        let args = Args {
            positional: Vec::new(),
            keywords: vec![("team".to_string(), Value::Team(crate::game::Team::A))],
        };
        let Err(Unwind::Raise(err)) = gateway.invoke(&mut interp, &find("sense_nearby_robots"), args)
        else {
            panic!("expected a raise");
        };
        assert_eq!(err.kind(), ErrorKind::Value);
        assert_eq!(
            err.message(),
            "Invalid combination of parameters for sense_nearby_robots. See docstring for valid combinations."
        );
        assert!(scripted.lock().unwrap().calls.is_empty());
    }

    #[test]
    fn test_defaults_are_sent() {
        let (scripted, gateway, mut interp) = setup(vec![json!(true)]);
        let loc = Value::Location(MapLocation::new(3, 3));
        let result = gateway
            .invoke(&mut interp, &find("can_attack"), Args::positional(vec![loc]))
            .unwrap();
        assert!(matches!(result, Value::Bool(true)));
        let calls = scripted.lock().unwrap();
        assert_eq!(calls.calls[0].0, Method::RcCanAttackLocInt);
        assert_eq!(calls.calls[0].1[1], json!(0));
    }

    #[test]
    fn test_thrown_exception_raises_game_action() {
        let (_, gateway, mut interp) = setup(vec![json!({"type": 9, "etype": 2, "msg": "wall"})]);
        let args = Args::positional(vec![Value::Direction(Direction::North)]);
        let Err(Unwind::Raise(err)) = gateway.invoke(&mut interp, &find("move"), args) else {
            panic!("expected a raise");
        };
        assert_eq!(err.kind(), ErrorKind::GameAction(GameActionKind::CantMoveThere));
    }

    #[test]
    fn test_unsupported_argument_is_type_error_before_sending() {
        let (scripted, gateway, mut interp) = setup(Vec::new());
        let args = Args::positional(vec![Value::list(Vec::new())]);
        let Err(Unwind::Raise(err)) = gateway.invoke(&mut interp, &find("move"), args) else {
            panic!("expected a raise");
        };
        assert_eq!(err.kind(), ErrorKind::Type);
        assert!(scripted.lock().unwrap().calls.is_empty());
    }

    #[test]
    fn test_costed_capability_charges_meter() {
        let (_, gateway, mut interp) = setup(vec![json!(7)]);
        let capability = TableBuilder::new()
            .call("get_round_num", Method::RcGetRoundNum, &[])
            .cost("get_round_num", 30)
            .build()
            .remove(0);
        gateway.invoke(&mut interp, &capability, Args::default()).unwrap();
        assert_eq!(interp.meter.used(), 30);
    }

    #[test]
    fn test_log_joins_string_forms() {
        let (scripted, gateway, _) = setup(vec![Json::Null]);
        gateway
            .log(Args::positional(vec![Value::str("at"), Value::Int(3), Value::None]))
            .unwrap();
        let calls = scripted.lock().unwrap();
        assert_eq!(calls.calls[0], (Method::Log, vec![json!("at 3 None")]));
    }

    #[test]
    fn test_transport_failure_unwinds() {
        let (_, gateway, mut interp) = setup(Vec::new());
        let result = gateway.invoke(&mut interp, &find("get_id"), Args::default());
        assert!(matches!(result, Err(Unwind::Transport(TransportError::Closed))));
    }

    #[test]
    fn test_destroy_notification_detection() {
        assert_eq!(destroy_notification(&json!({"type": "destroy_bot", "id": 4})).unwrap(), Some(4));
        assert_eq!(destroy_notification(&json!({"type": 2, "x": 0, "y": 0})).unwrap(), None);
        assert_eq!(destroy_notification(&json!(5)).unwrap(), None);
        assert!(destroy_notification(&json!({"type": "destroy_bot"})).is_err());
    }
}
