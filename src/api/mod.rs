pub mod firebase;
pub mod llm;
