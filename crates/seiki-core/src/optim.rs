//! # RMSProp with global-norm clipping
//!
//! ```text
//! scale = min(1, clip_norm / ‖g‖₂)        over all gradients together
//! ms    = decay · ms + (1 − decay) · (scale · g)²
//! θ     = θ − lr · scale · g / √(ms + ε)
//! ```
//!
//! The mean-square accumulator starts at 1.0.

use candle_core::backprop::GradStore;
use candle_core::{Result, Tensor, Var};
use candle_nn::Optimizer;

/// RMSProp hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamsRmsProp {
    pub lr: f64,
    pub decay: f64,
    pub epsilon: f64,
    /// Maximum global gradient norm; `None` disables clipping.
    pub clip_norm: Option<f64>,
}

impl Default for ParamsRmsProp {
    fn default() -> Self {
        Self {
            lr: 0.001,
            decay: 0.9,
            epsilon: 1e-10,
            clip_norm: Some(10.0),
        }
    }
}

#[derive(Debug)]
struct VarRmsProp {
    var: Var,
    mean_square: Var,
}

/// RMSProp optimizer over a fixed set of variables.
#[derive(Debug)]
pub struct RmsProp {
    vars: Vec<VarRmsProp>,
    params: ParamsRmsProp,
}

impl RmsProp {
    pub fn params(&self) -> &ParamsRmsProp {
        &self.params
    }

    /// Combined L2 norm of every gradient in `grads` that belongs to our variables.
    pub fn global_norm(&self, grads: &GradStore) -> Result<f64> {
        let mut sum = 0f64;
        for v in &self.vars {
            if let Some(g) = grads.get(v.var.as_tensor()) {
                sum += g.sqr()?.sum_all()?.to_dtype(candle_core::DType::F64)?.to_scalar::<f64>()?;
            }
        }
        Ok(sum.sqrt())
    }

    fn clip_scale(&self, grads: &GradStore) -> Result<f64> {
        match self.params.clip_norm {
            Some(max_norm) => {
                let norm = self.global_norm(grads)?;
                Ok(if norm > max_norm { max_norm / norm } else { 1.0 })
            }
            None => Ok(1.0),
        }
    }
}

impl Optimizer for RmsProp {
    type Config = ParamsRmsProp;

    fn new(vars: Vec<Var>, params: ParamsRmsProp) -> Result<Self> {
        let vars = vars
            .into_iter()
            .filter(|var| var.dtype().is_float())
            .map(|var| {
                let mean_square = Var::from_tensor(&var.as_tensor().ones_like()?)?;
                Ok(VarRmsProp { var, mean_square })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { vars, params })
    }

    fn learning_rate(&self) -> f64 {
        self.params.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.params.lr = lr;
    }

    fn step(&mut self, grads: &GradStore) -> Result<()> {
        let scale = self.clip_scale(grads)?;
        let ParamsRmsProp {
            lr, decay, epsilon, ..
        } = self.params;

        for v in &self.vars {
            let Some(g) = grads.get(v.var.as_tensor()) else {
                continue;
            };
            let g: Tensor = g.affine(scale, 0.0)?;
            let mean_square = v
                .mean_square
                .as_tensor()
                .affine(decay, 0.0)?
                .add(&g.sqr()?.affine(1.0 - decay, 0.0)?)?;
            let denom = mean_square.affine(1.0, epsilon)?.sqrt()?;
            let delta = g.div(&denom)?.affine(lr, 0.0)?;

            v.var.set(&v.var.as_tensor().sub(&delta)?)?;
            v.mean_square.set(&mean_square)?;
        }
        Ok(())
    }
}
