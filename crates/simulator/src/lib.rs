//! # Simulator
//!
//! Hardware-free collaborators for the acquisition engines.
//!
//! - [`SceneGenerator`]: particle scene implementing `ImageGenerator`
//! - [`DemoCore`]: simulated host core implementing `AcquisitionHost`
//! - [`CancelToken`]: cooperative cancellation shared with the host

mod cancel;
mod demo_core;
mod scene;

pub use cancel::CancelToken;
pub use demo_core::{DemoCore, DemoCoreConfig, StageState};
pub use scene::SceneGenerator;
