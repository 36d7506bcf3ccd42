pub mod api_error;
pub mod routes;
pub mod state;
