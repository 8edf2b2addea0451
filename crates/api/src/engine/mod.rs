//! Job event emission toward relay subscribers.

pub mod emitter;

pub use emitter::JobEmitter;
