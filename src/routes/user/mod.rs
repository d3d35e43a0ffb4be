mod handler;
mod model;

pub use handler::{get_me, login, refresh_token, register, stats};
