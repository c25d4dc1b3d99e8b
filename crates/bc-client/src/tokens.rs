//! In-memory token balance.
//!
//! Not persisted and not authoritative: a fresh balance starts from the
//! configured grant every time the client starts.

/// Credits available for conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBalance {
    balance: u64,
}

impl TokenBalance {
    /// Start from the given grant.
    pub fn new(starting_grant: u64) -> Self {
        Self {
            balance: starting_grant,
        }
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    /// Fail with [`bc_core::Error::InsufficientTokens`] unless `cost` is
    /// covered.
    pub fn ensure(&self, cost: u64) -> bc_core::Result<()> {
        if self.balance < cost {
            return Err(bc_core::Error::InsufficientTokens {
                balance: self.balance,
                cost,
            });
        }
        Ok(())
    }

    /// Take `cost` tokens. The balance is untouched on failure.
    pub fn debit(&mut self, cost: u64) -> bc_core::Result<u64> {
        self.ensure(cost)?;
        self.balance -= cost;
        Ok(self.balance)
    }

    /// Add tokens, e.g. after a confirmed top-up.
    pub fn credit(&mut self, amount: u64) -> u64 {
        self.balance = self.balance.saturating_add(amount);
        self.balance
    }
}
