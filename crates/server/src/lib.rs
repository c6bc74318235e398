pub mod error;
pub mod extract;
pub mod identity;
pub mod routes;
pub mod state;
