//! Sandbox loader.
//!
//! A [`Bundle`] holds a team's assembled and instrumented source files. A
//! [`Sandbox`] is one program instance over a bundle: its own interpreter,
//! meter, module namespace and import cache, plus a builtins table in which
//! every outward-facing name is a capability.

mod guards;
mod imports;

pub use guards::INPLACE_ALLOWED;
pub use imports::{CAPABILITY_MODULE, ImportGraph};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use crate::bytecode::{AssembleError, BinOp, CodeObject, assemble};
use crate::error::{ErrorKind, ProgramError};
use crate::gateway::{Gateway, controller, free_functions};
use crate::instrument::{InstrumentError, instrument};
use crate::scheduler::Program;
use crate::vm::{
    BuiltinsBuilder, ExcClass, Host, Interp, Meter, Module, Namespace, TypeObject, Unwind, Value,
};

use imports::Imports;

/// Module executed at spawn time; it must define `turn`.
pub const MAIN_MODULE: &str = "bot";

/// Extension of bundle source files.
pub const SOURCE_EXTENSION: &str = "rasm";

/// Entry point called every turn.
pub const ENTRY_POINT: &str = "turn";

/// Failure to prepare a bundle.
#[derive(Debug)]
pub enum LoadError {
    /// The bot directory does not exist.
    MissingDir(PathBuf),
    /// Reading a source file failed.
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// A source file does not assemble.
    Assemble(AssembleError),
    /// An assembled unit cannot be instrumented.
    Instrument {
        /// Bundle module.
        module: String,
        /// Underlying error.
        source: InstrumentError,
    },
    /// The bundle has no main module.
    MissingMain,
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDir(path) => write!(f, "bot directory {} does not exist", path.display()),
            Self::Io { path, source } => write!(f, "failed to read {}: {source}", path.display()),
            Self::Assemble(e) => write!(f, "{e}"),
            Self::Instrument { module, source } => {
                write!(f, "failed to instrument {module}: {source}")
            }
            Self::MissingMain => {
                write!(f, "bundle has no {MAIN_MODULE}.{SOURCE_EXTENSION} main module")
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Assemble(e) => Some(e),
            Self::Instrument { source, .. } => Some(source),
            Self::MissingDir(_) | Self::MissingMain => None,
        }
    }
}

impl From<AssembleError> for LoadError {
    fn from(e: AssembleError) -> Self {
        Self::Assemble(e)
    }
}

/// A team's instrumented modules, shared by all of its instances.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    modules: BTreeMap<String, Arc<CodeObject>>,
}

fn prepare(name: &str, source: &str) -> Result<(String, Arc<CodeObject>), LoadError> {
    let code = assemble(name, source)?;
    let metered = instrument(&code).map_err(|source| LoadError::Instrument {
        module: name.to_string(),
        source,
    })?;
    Ok((name.to_string(), Arc::new(metered)))
}

impl Bundle {
    /// Load every `*.rasm` file in `dir`, named by file stem.
    ///
    /// Files are assembled and instrumented in parallel.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] if the directory cannot be read, any file fails
    /// to assemble or instrument, or there is no main module.
    pub fn from_dir(dir: &Path) -> Result<Self, LoadError> {
        if !dir.is_dir() {
            return Err(LoadError::MissingDir(dir.to_path_buf()));
        }
        let io = |source| LoadError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut sources = Vec::new();
        for entry in fs::read_dir(dir).map_err(io)? {
            let path = entry.map_err(io)?.path();
            if path.extension().is_some_and(|e| e == SOURCE_EXTENSION)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                let text = fs::read_to_string(&path).map_err(|source| LoadError::Io {
                    path: path.clone(),
                    source,
                })?;
                sources.push((stem.to_string(), text));
            }
        }
        let bundle = Self::from_sources(sources.iter().map(|(n, s)| (n.as_str(), s.as_str())))?;
        debug!(dir = %dir.display(), modules = bundle.len(), "bundle loaded");
        Ok(bundle)
    }

    /// Build a bundle from `(module name, source)` pairs.
    ///
    /// # Errors
    ///
    /// As [`Bundle::from_dir`], minus the I/O failures.
    pub fn from_sources<'a>(
        sources: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, LoadError> {
        let sources: Vec<(&str, &str)> = sources.into_iter().collect();
        let modules = sources
            .par_iter()
            .map(|(name, source)| prepare(name, source))
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        if !modules.contains_key(MAIN_MODULE) {
            return Err(LoadError::MissingMain);
        }
        Ok(Self { modules })
    }

    /// Instrumented unit of a module.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<CodeObject>> {
        self.modules.get(name)
    }

    /// Module names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Number of modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the bundle is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Interpreter hooks for sandboxed programs.
#[derive(Debug)]
struct SandboxHost {
    imports: Imports,
}

impl Host for SandboxHost {
    fn check_attr(&self, name: &str) -> Result<(), ProgramError> {
        guards::check_attr(name)
    }

    fn check_item(&self, key: &Value) -> Result<(), ProgramError> {
        guards::check_item(key)
    }

    fn check_store(&self, target: &Value) -> Result<(), ProgramError> {
        guards::check_store(target)
    }

    fn check_name(&self, name: &str) -> Result<(), ProgramError> {
        guards::check_name(name)
    }

    fn check_binding(&self, name: &str) -> Result<(), ProgramError> {
        guards::check_binding(name)
    }

    fn check_inplace(&self, op: BinOp) -> Result<(), ProgramError> {
        guards::check_inplace(op)
    }

    fn import(&self, interp: &mut Interp, importer: &str, name: &str) -> Result<Value, Unwind> {
        self.imports.import(interp, importer, name)
    }
}

fn module(name: &str, entries: Vec<(&'static str, Value)>) -> Value {
    let ns = Namespace::new();
    for (key, value) in entries {
        ns.set(key, value);
    }
    Value::Module(Rc::new(Module {
        name: name.to_string(),
        ns: Rc::new(ns),
    }))
}

/// Game names visible to programs, both as builtins and in the capability
/// module.
fn game_names(gateway: &Gateway) -> Vec<(&'static str, Value)> {
    let mut names = vec![
        ("Direction", Value::Type(TypeObject::Direction)),
        ("Team", Value::Type(TypeObject::Team)),
        ("MapLocation", Value::Type(TypeObject::MapLocation)),
        ("UnitType", Value::Type(TypeObject::UnitType)),
        ("TrapType", Value::Type(TypeObject::TrapType)),
        (
            "GameActionExceptionType",
            Value::Type(TypeObject::GameActionExceptionType),
        ),
        ("GameActionException", Value::ExcClass(ExcClass::GameAction)),
        ("rc", module("rc", gateway.bind(controller()))),
        ("log", gateway.log_function()),
    ];
    names.extend(gateway.bind(free_functions()));
    names
}

/// Per-instance settings.
#[derive(Debug, Clone, Copy)]
pub struct SandboxOptions {
    /// Entity id; seeds `random`.
    pub entity_id: i64,
    /// Call depth limit.
    pub max_depth: usize,
}

/// One program instance.
#[derive(Debug)]
pub struct Sandbox {
    interp: Interp,
    globals: Rc<Namespace>,
    bundle: Arc<Bundle>,
    initialized: bool,
}

impl Sandbox {
    /// Create an instance. Nothing runs until [`Sandbox::init`].
    #[must_use]
    pub fn new(bundle: Arc<Bundle>, gateway: &Gateway, meter: Meter, options: SandboxOptions) -> Self {
        let names = game_names(gateway);
        let capabilities = module(CAPABILITY_MODULE, names.clone());
        let builtins = names
            .into_iter()
            .fold(BuiltinsBuilder::standard(), |builder, (name, value)| {
                builder.value(name, value)
            })
            .build();
        let host = SandboxHost {
            imports: Imports::new(
                Arc::clone(&bundle),
                options.entity_id.unsigned_abs(),
                capabilities,
            ),
        };
        let globals = Rc::new(Namespace::new());
        globals.set("__name__", Value::str(MAIN_MODULE));
        Self {
            interp: Interp::new(meter, Rc::new(builtins), Rc::new(host), options.max_depth),
            globals,
            bundle,
            initialized: false,
        }
    }

    /// The main module namespace.
    #[must_use]
    pub fn globals(&self) -> &Rc<Namespace> {
        &self.globals
    }

    /// Run the main module once.
    ///
    /// # Errors
    ///
    /// Returns whatever the module body raises.
    pub fn init(&mut self) -> Result<(), Unwind> {
        let code = self
            .bundle
            .get(MAIN_MODULE)
            .cloned()
            .ok_or_else(|| ProgramError::import(format!("Module \"{MAIN_MODULE}\" does not exist.")))?;
        self.interp.exec(&code, &self.globals)?;
        self.initialized = true;
        Ok(())
    }

    /// Run the entry point's body over the main module namespace.
    ///
    /// # Errors
    ///
    /// `SyntaxError` if the main module defines no `turn` function, otherwise
    /// whatever the turn raises.
    pub fn turn(&mut self) -> Result<(), Unwind> {
        let Some(Value::Function(entry)) = self.globals.get(ENTRY_POINT) else {
            return Err(ProgramError::new(
                ErrorKind::Syntax,
                "Couldn't find turn() function. All bots must have a turn() function.",
            )
            .into());
        };
        let code = Arc::clone(&entry.code);
        self.interp.exec(&code, &self.globals)?;
        Ok(())
    }
}

impl Program for Sandbox {
    fn start(&mut self, limit: i64) {
        self.interp.meter.reset(limit);
    }

    fn remaining(&self) -> i64 {
        self.interp.meter.remaining()
    }

    fn initialized(&self) -> bool {
        self.initialized
    }

    fn init(&mut self) -> Result<(), Unwind> {
        Self::init(self)
    }

    fn turn(&mut self) -> Result<(), Unwind> {
        Self::turn(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Authority, SharedAuthority};
    use crate::protocol::Method;
    use crate::transport::TransportError;
    use std::sync::Mutex;

    struct Silent;

    impl Authority for Silent {
        fn call(
            &mut self,
            _method: Method,
            _params: Vec<serde_json::Value>,
        ) -> Result<serde_json::Value, TransportError> {
            Ok(serde_json::Value::Null)
        }
    }

    fn sandbox(sources: &[(&str, &str)]) -> Sandbox {
        let bundle = Bundle::from_sources(sources.iter().copied()).unwrap();
        let authority: SharedAuthority = Arc::new(Mutex::new(Silent));
        let options = SandboxOptions {
            entity_id: 7,
            max_depth: 100,
        };
        Sandbox::new(Arc::new(bundle), &Gateway::new(authority), Meter::new(1_000_000), options)
    }

    fn raised(result: Result<(), Unwind>) -> ProgramError {
        match result {
            Err(Unwind::Raise(e)) => e,
            other => panic!("expected a raise, got {other:?}"),
        }
    }

    const TURN: &str = "\
load_const @turn
make_function
store_name turn
.func turn
    load_global count
    load_const 1
    binary_op +
    store_global count
.end
load_const 0
store_name count
";

    #[test]
    fn test_turn_state_persists() {
        let mut sb = sandbox(&[("bot", TURN)]);
        sb.init().unwrap();
        sb.turn().unwrap();
        sb.turn().unwrap();
        assert!(matches!(sb.globals().get("count"), Some(Value::Int(2))));
    }

    #[test]
    fn test_missing_turn_is_syntax_error() {
        let mut sb = sandbox(&[("bot", "load_const 1\nstore_name x\n")]);
        sb.init().unwrap();
        let err = raised(sb.turn());
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert!(err.message().starts_with("Couldn't find turn() function."));
    }

    #[test]
    fn test_missing_main_module() {
        let err = Bundle::from_sources([("helper", "nop\n")]).unwrap_err();
        assert!(matches!(err, LoadError::MissingMain));
    }

    #[test]
    fn test_underscore_attribute_denied() {
        let src = "load_global rc\nload_attr __dict__\npop_top\n";
        let mut sb = sandbox(&[("bot", src)]);
        let err = raised(sb.init());
        assert_eq!(err.message(), "Cannot access attributes that begin with \"_\".");
    }

    #[test]
    fn test_unknown_module() {
        let src = "import_name os\nstore_name os\n";
        let mut sb = sandbox(&[("bot", src)]);
        let err = raised(sb.init());
        assert_eq!(err.kind(), ErrorKind::Import);
        assert_eq!(err.message(), "Module \"os\" does not exist.");
    }

    #[test]
    fn test_bundle_module_runs_once() {
        let helper = "load_global log\nload_const \"loaded\"\ncall_function 1\npop_top\nload_const 5\nstore_name five\n";
        let bot = "import_name helper\nstore_name a\nimport_name helper\nstore_name b\nload_name b\nload_attr five\nstore_name got\n";
        let mut sb = sandbox(&[("bot", bot), ("helper", helper)]);
        sb.init().unwrap();
        assert!(matches!(sb.globals().get("got"), Some(Value::Int(5))));
        let (Some(Value::Module(a)), Some(Value::Module(b))) =
            (sb.globals().get("a"), sb.globals().get("b"))
        else {
            panic!("expected modules");
        };
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_import_cycle_detected() {
        let bot = "import_name a\nstore_name a\n";
        let a = "import_name b\nstore_name b\n";
        let b = "import_name a\nstore_name a\n";
        let mut sb = sandbox(&[("bot", bot), ("a", a), ("b", b)]);
        let err = raised(sb.init());
        assert_eq!(err.kind(), ErrorKind::Import);
        assert_eq!(err.message(), "Infinite loop in imports: a, b");
    }

    #[test]
    fn test_capability_module_import() {
        let src = "import_name robot\nimport_from Direction\nstore_name D\npop_top\nload_name D\nload_attr NORTH\nstore_name n\n";
        let mut sb = sandbox(&[("bot", src)]);
        sb.init().unwrap();
        assert!(matches!(sb.globals().get("n"), Some(Value::Direction(_))));
    }

    #[test]
    fn test_meter_name_cannot_be_rebound() {
        let src = "load_const 0\nstore_name __meter__\n";
        let mut sb = sandbox(&[("bot", src)]);
        assert_eq!(raised(sb.init()).kind(), ErrorKind::Runtime);
    }
}
