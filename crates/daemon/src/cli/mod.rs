pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Daemon, Grant, Health, Init, Keys, Open, Seal, Version};
