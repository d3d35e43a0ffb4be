mod handler;

pub use handler::{check_in, my_check_ins};
