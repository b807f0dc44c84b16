pub mod printer;
pub mod reader;
pub mod token;
