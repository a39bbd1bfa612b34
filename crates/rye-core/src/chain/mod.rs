//! Execution chains: templating, validation, resolution, and lockfiles.

pub mod executor;
pub mod lockfile;
pub mod template;
pub mod validator;

pub use executor::{ExecutorCacheStats, Primitive, PrimitiveExecutor, PrimitiveRegistry};
pub use lockfile::{Lockfile, LockfileEntry, LockfileResolver, LockfileRoot, LOCKFILE_VERSION};
pub use template::{quote_if_unsafe, template_config, template_string};
pub use validator::{ChainLink, ChainValidator, ValidationResult};
