pub mod compilation_scope;
pub mod compiler;
pub mod op_code;
