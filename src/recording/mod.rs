pub mod controller;
pub mod navigation;
pub mod permission;
pub mod state;
pub mod tracker;

pub use controller::{ArmedTimers, RecordingController, StartOutcome, TickOutcome, COUNTDOWN_TICKS};
pub use navigation::{NavigationGuard, NavigationLock};
pub use permission::{PermissionGate, PermissionStatus, PermissionsProvider, SimulatedPermissions};
pub use state::{RecordingSession, RecordingState, SessionEvent, SharedSession};
pub use tracker::{DurationTracker, TrackerTick};
