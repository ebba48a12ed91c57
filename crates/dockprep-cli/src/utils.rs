pub mod inputs;
pub mod progress;
