pub mod alert;
pub mod device;
pub mod message;
pub mod sample;

pub use alert::{AlertEvent, AlertKind, Severity};
pub use device::{Device, DeviceStatus};
pub use message::{FeedBatch, FeedEnvelope};
pub use sample::{AttributeValue, Attributes, Sample};
