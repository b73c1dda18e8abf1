pub mod document;
pub mod presentation;
pub mod script;
