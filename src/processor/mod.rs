pub mod message_processor;

pub use message_processor::{process_batch, process_payload, sweep};
