//! Optimizers and learning-rate scheduling

mod adam;
mod clip;
mod optimizer;
mod scheduler;
mod sgd;

pub use adam::Adam;
pub use clip::clip_grad_norm;
pub use optimizer::{OptimState, Optimizer};
pub use scheduler::PolyLR;
pub use sgd::SGD;

use crate::{Error, Result};

/// Build an optimizer from its configured kind name
///
/// Recognized kinds are `sgd` and `adam`; anything else is a fatal
/// configuration error.
pub fn build_optimizer(kind: &str, lr: f32) -> Result<Box<dyn Optimizer>> {
    match kind {
        "sgd" => Ok(Box::new(SGD::new(lr, 0.0))),
        "adam" => Ok(Box::new(Adam::default_params(lr))),
        other => Err(Error::Config(format!("unsupported optimizer kind: {other}"))),
    }
}
