use crate::{HarnessError, Result};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};
use wasmtime::{Config, Engine, Linker, Memory, Module, Store, Trap, TypedFunc};

/// Export every transport module carries to declare its ABI version
pub const VERSION_MARKER: &str = "_water_v0";

const MEMORY_EXPORT: &str = "memory";
const ALLOC_EXPORT: &str = "water_alloc";
const WRAP_EXPORT: &str = "water_wrap";
const UNWRAP_EXPORT: &str = "water_unwrap";

/// Fuel granted to each call into a module; running out traps the call
pub const CALL_FUEL: u64 = 10_000_000;

/// Which way a chunk is travelling through the module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the local caller onto the wire
    Outbound,
    /// From the wire to the local caller
    Inbound,
}

impl Direction {
    fn export(self) -> &'static str {
        match self {
            Direction::Outbound => WRAP_EXPORT,
            Direction::Inbound => UNWRAP_EXPORT,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outbound => write!(f, "outbound"),
            Direction::Inbound => write!(f, "inbound"),
        }
    }
}

/// A compiled transport module, ready to be instantiated once per connection
///
/// Host imports are stubbed to trap: the module runs sandboxed while the
/// harness owns the sockets. A module either exports the full transform ABI
/// (`memory`, `water_alloc`, `water_wrap`, `water_unwrap`) or none of it, in
/// which case bytes are relayed unchanged.
#[derive(Clone)]
pub struct TransportModule {
    engine: Engine,
    module: Module,
    linker: Linker<()>,
    transforms: bool,
}

impl fmt::Debug for TransportModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportModule")
            .field("transforms", &self.transforms)
            .finish_non_exhaustive()
    }
}

impl TransportModule {
    /// Reads and compiles the module at `path`
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            HarnessError::Setup(format!("failed to read transport module {}: {e}", path.display()))
        })?;
        let module = Self::from_bytes(&bytes)?;
        info!(path = %path.display(), size = bytes.len(), transforms = module.transforms, "Loaded transport module");
        Ok(module)
    }

    /// Compiles a module from its binary or text encoding
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut config = Config::new();
        config.consume_fuel(true);
        let engine = Engine::new(&config)
            .map_err(|e| HarnessError::Setup(format!("failed to create module engine: {e:#}")))?;
        let module = Module::new(&engine, bytes)
            .map_err(|e| HarnessError::Setup(format!("failed to compile transport module: {e:#}")))?;

        let exports: HashSet<&str> = module.exports().map(|export| export.name()).collect();
        if !exports.contains(VERSION_MARKER) {
            return Err(HarnessError::Setup(format!(
                "not a transport module: missing `{VERSION_MARKER}` export"
            )));
        }

        let abi = [MEMORY_EXPORT, ALLOC_EXPORT, WRAP_EXPORT, UNWRAP_EXPORT];
        let present = abi.iter().filter(|name| exports.contains(*name)).count();
        let transform_funcs = [ALLOC_EXPORT, WRAP_EXPORT, UNWRAP_EXPORT]
            .iter()
            .any(|name| exports.contains(*name));
        let transforms = match present {
            4 => true,
            _ if !transform_funcs => false,
            _ => {
                return Err(HarnessError::Setup(format!(
                    "incomplete transform ABI: expected all of {abi:?}"
                )));
            }
        };

        let mut linker = Linker::new(&engine);
        linker
            .define_unknown_imports_as_traps(&module)
            .map_err(|e| HarnessError::Setup(format!("failed to link transport module: {e:#}")))?;

        let module = Self {
            engine,
            module,
            linker,
            transforms,
        };
        // Fail at load time rather than on the first connection
        module.instantiate()?;
        Ok(module)
    }

    /// Returns true if the module rewrites bytes on the wire
    pub fn has_transforms(&self) -> bool {
        self.transforms
    }

    /// Creates a fresh, independent instance of the module
    pub fn instantiate(&self) -> Result<ModuleInstance> {
        let mut store = Store::new(&self.engine, ());
        store
            .set_fuel(CALL_FUEL)
            .map_err(|e| HarnessError::Setup(format!("failed to fuel transport module: {e:#}")))?;
        let instance = self
            .linker
            .instantiate(&mut store, &self.module)
            .map_err(|e| HarnessError::Setup(format!("failed to instantiate transport module: {e:#}")))?;

        let abi = if self.transforms {
            let memory = instance
                .get_memory(&mut store, MEMORY_EXPORT)
                .ok_or_else(|| HarnessError::Setup(format!("`{MEMORY_EXPORT}` export is not a memory")))?;
            let typed = |e: wasmtime::Error| HarnessError::Setup(format!("transform ABI type mismatch: {e:#}"));
            Some(TransformAbi {
                memory,
                alloc: instance.get_typed_func(&mut store, ALLOC_EXPORT).map_err(typed)?,
                wrap: instance.get_typed_func(&mut store, WRAP_EXPORT).map_err(typed)?,
                unwrap: instance.get_typed_func(&mut store, UNWRAP_EXPORT).map_err(typed)?,
            })
        } else {
            None
        };

        debug!(transforms = abi.is_some(), "Instantiated transport module");
        Ok(ModuleInstance { store, abi })
    }
}

struct TransformAbi {
    memory: Memory,
    alloc: TypedFunc<i32, i32>,
    wrap: TypedFunc<(i32, i32), i32>,
    unwrap: TypedFunc<(i32, i32), i32>,
}

/// One live instance of a transport module, owned by a single connection
pub struct ModuleInstance {
    store: Store<()>,
    abi: Option<TransformAbi>,
}

impl ModuleInstance {
    /// Runs `data` through the module in place
    ///
    /// Transforms must keep the chunk length; anything else is reported as a
    /// module error.
    ///
    /// Each call into the module runs on a fresh [`CALL_FUEL`] budget, so a
    /// module that never returns traps instead of blocking the caller.
    pub fn transform(&mut self, direction: Direction, data: &mut [u8]) -> Result<()> {
        let Some(abi) = &self.abi else {
            return Ok(());
        };
        if data.is_empty() {
            return Ok(());
        }

        let export = direction.export();
        let trapped = |name: &str, e: wasmtime::Error| match e.downcast_ref::<Trap>() {
            Some(Trap::OutOfFuel) => HarnessError::Module(format!("`{name}` ran out of fuel")),
            _ => HarnessError::Module(format!("`{name}` trapped: {e:#}")),
        };

        let len = i32::try_from(data.len())
            .map_err(|_| HarnessError::Module(format!("chunk of {} bytes is too large", data.len())))?;
        refuel(&mut self.store)?;
        let ptr = abi
            .alloc
            .call(&mut self.store, len)
            .map_err(|e| trapped(ALLOC_EXPORT, e))?;
        let offset = usize::try_from(ptr)
            .map_err(|_| HarnessError::Module(format!("`{ALLOC_EXPORT}` returned invalid pointer {ptr}")))?;

        abi.memory
            .write(&mut self.store, offset, data)
            .map_err(|e| HarnessError::Module(format!("chunk does not fit module memory: {e}")))?;
        refuel(&mut self.store)?;
        let written = abi
            .wrap_or_unwrap(direction)
            .call(&mut self.store, (ptr, len))
            .map_err(|e| trapped(export, e))?;
        if written != len {
            return Err(HarnessError::Module(format!(
                "`{export}` changed chunk length from {len} to {written}"
            )));
        }
        abi.memory
            .read(&self.store, offset, data)
            .map_err(|e| HarnessError::Module(format!("failed to read transformed chunk: {e}")))?;
        Ok(())
    }

    /// Returns true if chunks are rewritten by the module
    pub fn has_transforms(&self) -> bool {
        self.abi.is_some()
    }
}

fn refuel(store: &mut Store<()>) -> Result<()> {
    store
        .set_fuel(CALL_FUEL)
        .map_err(|e| HarnessError::Module(format!("failed to refuel module: {e:#}")))
}

impl TransformAbi {
    fn wrap_or_unwrap(&self, direction: Direction) -> &TypedFunc<(i32, i32), i32> {
        match direction {
            Direction::Outbound => &self.wrap,
            Direction::Inbound => &self.unwrap,
        }
    }
}
