//! Gas metering

use crate::error::{VmError, VmResult};
use quill_primitives::Gas;

/// Running gas total for one execution, shared by nested calls
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GasMeter {
    limit: Gas,
    used: Gas,
}

impl GasMeter {
    /// Meter with nothing used yet
    pub fn new(limit: Gas) -> Self {
        Self { limit, used: 0 }
    }

    /// Debit `amount`. Exceeding the limit pins `used` at the limit.
    pub fn charge(&mut self, amount: Gas) -> VmResult<()> {
        match self.used.checked_add(amount) {
            Some(total) if total <= self.limit => {
                self.used = total;
                Ok(())
            }
            _ => {
                self.used = self.limit;
                Err(VmError::OutOfGas)
            }
        }
    }

    /// Gas used so far
    pub fn used(&self) -> Gas {
        self.used
    }

    /// Gas left
    pub fn remaining(&self) -> Gas {
        self.limit - self.used
    }

    /// Gas limit
    pub fn limit(&self) -> Gas {
        self.limit
    }
}
