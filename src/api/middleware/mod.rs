pub mod request_id;
pub mod state;
