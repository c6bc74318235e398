pub mod access_control;
pub mod comment;
pub mod config;
pub mod knowledge;
pub mod like;
pub mod stock;
pub mod tag;
