//! Request admission: per-client sliding-window rate limiting.

mod clock;
mod controller;
mod policy;
mod sweeper;
mod table;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::AdmissionController;
pub use policy::{AdmissionPolicy, AdmissionStatus, Decision, DEFAULT_LIMIT, DEFAULT_WINDOW};
pub use sweeper::Sweeper;
pub use table::AdmissionTable;
pub use window::ClientWindow;
