pub mod booking;
pub mod dashboard;
pub mod lifecycle;

pub use booking::BookingService;
pub use dashboard::{partition, DashboardService};
pub use lifecycle::{validate_completion, LifecycleService};
