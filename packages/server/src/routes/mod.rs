pub mod collect;
pub mod health;
pub mod stream;

pub use collect::collect_handler;
pub use health::health_handler;
pub use stream::collect_stream_handler;
