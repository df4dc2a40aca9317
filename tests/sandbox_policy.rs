//! Bot directories loaded from disk, and what the sandbox refuses to do.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::fs;
use std::sync::{Arc, Mutex};

use serde_json::Value as Json;
use tempfile::TempDir;

use ratchet::error::{ErrorKind, ProgramError};
use ratchet::gateway::{Authority, Gateway, SharedAuthority};
use ratchet::protocol::Method;
use ratchet::sandbox::{Bundle, LoadError, Sandbox, SandboxOptions};
use ratchet::transport::TransportError;
use ratchet::vm::{Meter, Unwind, Value};

struct Silent;

impl Authority for Silent {
    fn call(&mut self, _method: Method, _params: Vec<Json>) -> Result<Json, TransportError> {
        Ok(Json::Null)
    }
}

fn bot_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, source) in files {
        fs::write(dir.path().join(name), source).unwrap();
    }
    dir
}

fn sandbox(bundle: Bundle) -> Sandbox {
    let authority: SharedAuthority = Arc::new(Mutex::new(Silent));
    let options = SandboxOptions {
        entity_id: 3,
        max_depth: 50,
    };
    Sandbox::new(Arc::new(bundle), &Gateway::new(authority), Meter::new(100_000), options)
}

fn init_error(files: &[(&str, &str)]) -> ProgramError {
    let dir = bot_dir(files);
    let mut sb = sandbox(Bundle::from_dir(dir.path()).unwrap());
    match sb.init() {
        Err(Unwind::Raise(e)) => e,
        other => panic!("expected a raise, got {other:?}"),
    }
}

#[test]
fn test_load_directory_with_helper_module() {
    let dir = bot_dir(&[
        ("bot.rasm", "import_name nav\nload_attr step\nstore_name step\n"),
        ("nav.rasm", "load_const 4\nstore_name step\n"),
        ("notes.txt", "ignored"),
    ]);
    let bundle = Bundle::from_dir(dir.path()).unwrap();
    assert_eq!(bundle.names().collect::<Vec<_>>(), ["bot", "nav"]);

    let mut sb = sandbox(bundle);
    sb.init().unwrap();
    assert!(matches!(sb.globals().get("step"), Some(Value::Int(4))));
}

#[test]
fn test_load_failures() {
    let missing = tempfile::tempdir().unwrap().path().join("nope");
    assert!(matches!(Bundle::from_dir(&missing), Err(LoadError::MissingDir(_))));

    let dir = bot_dir(&[("helper.rasm", "nop\n")]);
    assert!(matches!(Bundle::from_dir(dir.path()), Err(LoadError::MissingMain)));

    let dir = bot_dir(&[("bot.rasm", "frobnicate 3\n")]);
    let err = Bundle::from_dir(dir.path()).unwrap_err();
    assert!(matches!(err, LoadError::Assemble(_)));
}

#[test]
fn test_three_module_import_cycle() {
    let err = init_error(&[
        ("bot.rasm", "import_name a\npop_top\n"),
        ("a.rasm", "import_name b\npop_top\n"),
        ("b.rasm", "import_name c\npop_top\n"),
        ("c.rasm", "import_name a\npop_top\n"),
    ]);
    assert_eq!(err.kind(), ErrorKind::Import);
    assert_eq!(err.message(), "Infinite loop in imports: a, b, c");
}

#[test]
fn test_private_attribute_of_module_denied() {
    let err = init_error(&[("bot.rasm", "import_name math\nload_attr _hidden\npop_top\n")]);
    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert_eq!(err.message(), "Cannot access attributes that begin with \"_\".");
}

#[test]
fn test_module_attributes_are_read_only() {
    let err = init_error(&[("bot.rasm", "load_const 3\nimport_name math\nstore_attr pi\n")]);
    assert_eq!(err.message(), "Can't write to modules.");
}

#[test]
fn test_function_attributes_are_read_only() {
    let err = init_error(&[("bot.rasm", "load_const 1\nload_global len\nstore_attr x\n")]);
    assert_eq!(err.message(), "Can't write to functions.");
}

#[test]
fn test_floor_division_in_place_rejected() {
    let err = init_error(&[(
        "bot.rasm",
        "load_const 7\nstore_name x\nload_name x\nload_const 2\ninplace_op //\nstore_name x\n",
    )]);
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(err.message(), "Unsupported in place op \"//=\".");
}

#[test]
fn test_oversized_list_repeat_raises_memory_error() {
    let err = init_error(&[(
        "bot.rasm",
        "load_const 1\nload_const 2\nbuild_list 2\nload_const 4611686018427387904\nbinary_op *\nstore_name xs\n",
    )]);
    assert_eq!(err.kind(), ErrorKind::Memory);
}

#[test]
fn test_oversized_string_repeat_raises_memory_error() {
    let err = init_error(&[(
        "bot.rasm",
        "load_const \"x\"\nload_const 17592186044416\nbinary_op *\nstore_name s\n",
    )]);
    assert_eq!(err.kind(), ErrorKind::Memory);
    assert_eq!(format!("{err}").split(':').next(), Some("MemoryError"));
}

#[test]
fn test_materializing_a_huge_range_raises_memory_error() {
    let err = init_error(&[(
        "bot.rasm",
        "load_global list\nload_global range\nload_const 1000000000000\ncall_function 1\ncall_function 1\nstore_name xs\n",
    )]);
    assert_eq!(err.kind(), ErrorKind::Memory);
}

#[test]
fn test_binding_private_name_denied() {
    let err = init_error(&[("bot.rasm", "load_const 1\nstore_name _secret\n")]);
    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert_eq!(
        err.message(),
        "\"_secret\" is an invalid variable name because it starts with \"_\""
    );
}

#[test]
fn test_reading_private_names_denied() {
    let err = init_error(&[("bot.rasm", "load_name _x\npop_top\n")]);
    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert!(err.message().starts_with("\"_x\""));

    let err = init_error(&[("bot.rasm", "load_global __name__\nstore_name n\n")]);
    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert!(err.message().starts_with("\"__name__\""));
}

#[test]
fn test_private_function_parameter_denied() {
    let err = init_error(&[(
        "bot.rasm",
        "load_const @f\nmake_function\nstore_name f\n.func f _a\n    load_fast _a\n    return_value\n.end\n",
    )]);
    assert!(err.message().starts_with("\"_a\""));
}
