mod handler;
mod model;

pub use handler::{get_location, list_locations};
