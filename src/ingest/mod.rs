pub mod consumer;

pub use consumer::IngestLoop;
