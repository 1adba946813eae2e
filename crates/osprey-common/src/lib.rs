pub mod models;

pub use models::{BmcVendor, Credentials, DeviceFacts, PowerState};
