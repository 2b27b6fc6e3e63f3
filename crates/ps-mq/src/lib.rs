pub mod audit;
pub mod consumer;
pub mod producer;

pub use consumer::{run_consumer, stream_consumer, EventHandler, HandlerOutcome};
pub use producer::EventProducer;
