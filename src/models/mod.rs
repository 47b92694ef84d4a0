pub mod background;
pub mod clip;
pub mod job;
pub mod request;
