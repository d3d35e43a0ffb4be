mod handler;

pub use handler::{DEFAULT_LIMIT, MAX_LIMIT, badges, leaderboard};
