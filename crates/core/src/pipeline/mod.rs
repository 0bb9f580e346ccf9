pub mod detector_stage;
pub mod events;
pub mod periodic_trigger;
pub mod stage;
