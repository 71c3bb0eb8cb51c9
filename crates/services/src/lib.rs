pub mod admission;
pub mod attendance;
pub mod auth;
pub mod capacity;
pub mod dao;
pub mod grant;
pub mod lifecycle;
pub mod resolver;
pub mod store;

pub use admission::{AdmissionError, AdmissionService};
pub use auth::AuthService;
pub use capacity::{OccupancyCounter, Occupancy};
pub use dao::*;
pub use grant::GrantIssuer;
pub use store::Stores;
