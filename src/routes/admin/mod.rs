mod handler;
mod model;

pub use handler::{
    cancel_job, create_job, enhance_all_locations, enhance_location, job_status, list_jobs,
    run_jobs, validate_coordinates,
};
