pub mod directory;
pub mod error;
pub mod roles;
pub mod server;
pub mod uri;
pub mod users;
