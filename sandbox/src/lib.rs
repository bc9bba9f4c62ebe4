pub mod context;
pub mod environment;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod transpile;

pub use environment::{Environment, Global};
pub use error::ExecError;
pub use executor::{Executor, NodeExecutor, Verdict};
pub use transpile::Transpiler;
