mod image_asset;
mod presenter;
mod session;
mod workflow;

#[cfg(test)]
mod test_support;

pub mod acquisition;
pub mod app;
pub mod config;
pub mod error;
pub mod prediction;

pub use app::start_app;
pub use image_asset::ImageAsset;
pub use presenter::{render_notification, render_snapshot, render_state, tier, Tier};
pub use session::{Session, SessionCommand, SessionHandle, Snapshot};
pub use workflow::{
    Effect, Event, Notification, NotificationLevel, RequestToken, WorkflowController,
    WorkflowState,
};
