pub mod calendar;
pub mod graphql;
pub mod render;
pub mod tasks;
pub mod team;
pub mod weather;
