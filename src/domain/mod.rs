pub mod clock;
pub mod models;
pub mod session_buffer;
pub mod station;
