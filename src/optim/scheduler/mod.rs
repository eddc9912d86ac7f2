//! Learning rate schedulers
//!
//! One `PolyLR` instance is attached to every optimizer (frontend and each
//! worker); the trainer steps them at the logging interval with that task's
//! latest loss.

mod poly;


pub use poly::PolyLR;
