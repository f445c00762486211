//! ward: capacity-bounded treatment areas for concurrent patients.

pub mod area;
pub mod cancel;
pub mod display;
pub mod error;
pub mod observer;
pub mod patient;
pub mod registry;

pub use area::{AreaState, AreaStatus, BoundedArea, Occupancy};
pub use cancel::{CancelToken, Cancelled};
pub use display::{AREA_SIDE, Color, ParseColorError, Position};
pub use error::{EnterError, RegistryError};
pub use observer::{AreaObserver, NoopObserver, TracingObserver};
pub use patient::{Patient, PatientId, PatientOutcome, PatientStatus};
pub use registry::AreaRegistry;
