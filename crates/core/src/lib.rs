pub mod junior;
pub mod llm;
pub mod machine;
pub mod senior;
pub mod stage;
pub mod tools;
pub mod transcript;
