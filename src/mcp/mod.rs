pub mod catalog;
pub mod content;
pub mod protocol;
pub mod schema;
pub mod server;
