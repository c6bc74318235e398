pub mod comment;
pub mod history;
pub mod knowledge;
pub mod knowledge_editor;
pub mod like;
pub mod stock;
pub mod tag;
