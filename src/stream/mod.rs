pub mod decode;
pub mod kafka;
pub mod source;

pub use decode::decode_sale;
pub use kafka::KafkaSource;
pub use source::StreamSource;
