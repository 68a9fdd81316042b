//! Formula compiler
//!
//! Compiles short math formulas such as `f(x, y) = 2x + |y - 1|` into
//! reusable objects. Formulas can be solved by walking their expression tree
//! or compiled once into closures for repeated calls; both paths give the
//! same results.
//!
//! ```
//! use formulate::{FormulaEngine, Value};
//!
//! let engine = FormulaEngine::new();
//! let formula = engine.parse("f(x, y) = 2x + |y - 1|").unwrap();
//! let fast = formula.compile(engine.context()).unwrap();
//!
//! let inputs = [Value::from(3.0), Value::from(-1.0)];
//! assert_eq!(formula.solve(engine.context(), &inputs).unwrap(), Value::from(8.0));
//! assert_eq!(fast.solve(&inputs).unwrap(), Value::from(8.0));
//! ```

pub mod ast;
pub mod compiler;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod formula;
pub mod model;
pub mod parser;
pub mod registry;

pub use compiler::FastFormula;
pub use config::{CacheConfig, FormulaConfig};
pub use context::FormulaContext;
pub use engine::FormulaEngine;
pub use error::{ErrorKind, FormulaError, FormulaResult};
pub use formula::{BoundFormula, Formula};
pub use model::{HostValue, StandardProvider, TypeInfo, Value, ValueProvider};
pub use parser::Specification;
pub use registry::{FunctionRegistry, Transform, TypeDescriptor, TypeRegistry};
