pub mod methods;
pub mod parser;
pub mod tokenizer;
