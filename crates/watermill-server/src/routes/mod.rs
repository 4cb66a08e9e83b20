pub mod coins;
pub mod events;
pub mod investigation;
pub mod screenshots;
pub mod status;
