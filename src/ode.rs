//! User-supplied ODE model.

use crate::Float;

/// User-supplied ODE model.
///
/// The model owns its state vector. Solvers read it at the start of a step,
/// call `rate` as often as the method requires and write the advanced state
/// back through `state_mut`. `rate` must not depend on anything but the
/// `state` argument; time-dependent systems carry time as a state component
/// with unit rate.
///
/// # Example
///
/// ```
/// use odestep::{Float, ODE};
///
/// struct Decay {
///     state: [Float; 2], // [x, t]
/// }
///
/// impl ODE for Decay {
///     fn state(&self) -> &[Float] {
///         &self.state
///     }
///     fn state_mut(&mut self) -> &mut [Float] {
///         &mut self.state
///     }
///     fn rate(&self, state: &[Float], rate: &mut [Float]) {
///         rate[0] = -state[0];
///         rate[1] = 1.0;
///     }
/// }
/// ```
pub trait ODE {
    fn state(&self) -> &[Float];
    fn state_mut(&mut self) -> &mut [Float];
    fn rate(&self, state: &[Float], rate: &mut [Float]);
}

/// Identity of a model's state buffer (address and length).
///
/// Engines keep one of these instead of a reference so they can tell when the
/// model swapped its state vector and scratch space must be rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StateId {
    addr: usize,
    len: usize,
}

impl StateId {
    pub(crate) fn of(state: &[Float]) -> Self {
        Self {
            addr: state.as_ptr() as usize,
            len: state.len(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// True when `buf` shares memory with the bound state buffer.
    pub(crate) fn overlaps(&self, buf: &[Float]) -> bool {
        if self.len == 0 || buf.is_empty() {
            return false;
        }
        let size = std::mem::size_of::<Float>();
        let start = buf.as_ptr() as usize;
        let end = start + buf.len() * size;
        start < self.addr + self.len * size && self.addr < end
    }
}
