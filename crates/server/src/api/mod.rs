pub mod downloads;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod rows;
pub mod update;

pub use routes::create_router;
