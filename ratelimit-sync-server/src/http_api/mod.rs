// Deriving Apiv2Schema raises this Clippy warning.
#[allow(clippy::field_reassign_with_default)]
mod request_types;

pub mod server;
