pub mod diesel_ulid;
pub mod message_log;
pub mod user;

pub use diesel_ulid::DieselUlid;
