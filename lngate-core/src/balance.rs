use serde::{Deserialize, Serialize};

/// Channel balance snapshot in sat, as reported by the node.
///
/// `total_balance == confirmed_balance + unconfirmed_balance` is expected to
/// hold but is not enforced; see [`Balance::is_consistent`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub total_balance: u64,
    pub confirmed_balance: u64,
    pub unconfirmed_balance: u64,
}

impl Balance {
    pub const fn new(total_balance: u64, confirmed_balance: u64, unconfirmed_balance: u64) -> Self {
        Self {
            total_balance,
            confirmed_balance,
            unconfirmed_balance,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.confirmed_balance.checked_add(self.unconfirmed_balance) == Some(self.total_balance)
    }
}

#[cfg(test)]
mod tests {
    use super::Balance;

    #[test]
    fn test_is_consistent() {
        assert!(Balance::new(100_000, 80_000, 20_000).is_consistent());
        assert!(!Balance::new(100_000, 80_000, 0).is_consistent());
        assert!(!Balance::new(0, u64::MAX, 1).is_consistent());
    }
}
