pub mod handlers;
pub mod routes;

pub use handlers::{AppState, TableView, VerifyResponse};
pub use routes::create_router;
