pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod logger;
pub mod security;
pub mod upstream;
