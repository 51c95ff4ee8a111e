pub mod drafting;
pub mod embedding;
pub mod llm;
pub mod paper;
pub mod seed;
