/// Knowledge store module - Gateway

mod store;

pub use store::{format_for_prompt, KnowledgeItem, KnowledgeStore};
