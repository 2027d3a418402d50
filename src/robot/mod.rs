pub mod devices;
pub mod logger;
