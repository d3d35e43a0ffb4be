mod checkin;
mod location;
mod user;

pub use checkin::{CheckIn, CheckInAttempt, CheckInRequest, CheckInResult, Rejection};
pub use location::{Category, Location, LocationView};
pub use user::{
    AuthResponse, LeaderboardEntry, LoginRequest, NewUser, RegisterRequest, User, UserProgress,
};
