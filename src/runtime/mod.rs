//! Cell heap, module registry and the bytecode virtual machine.
//!
//! Every runtime value is a `CellRef` into the arena heap owned by the `VM`.
//! Nothing is reference counted except compiled code records, which cells
//! share through `Rc<FunctionInfo>`; reachability of cells themselves is
//! decided only by the mark-sweep collector.
pub mod builtin_function;
pub mod builtins;
pub mod compiled_function;
pub mod config;
pub mod errors;
pub mod frame;
pub mod gc;
pub mod module;
pub mod symbol_table;
pub mod value;
pub mod vm;
