use std::fmt;

/// A non-negative credit counter for reactive-streams flow control.
///
/// The value never wraps: [Allowance::add] saturates at [Allowance::max], and
/// consumption only succeeds for amounts the counter can cover.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Allowance(u64);

impl Allowance {
    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The largest value the counter can hold.
    #[inline]
    pub const fn max() -> u64 {
        u64::MAX
    }

    /// Subtract `n` if the counter covers it, otherwise leave it unchanged.
    #[inline]
    pub fn try_consume(&mut self, n: u64) -> bool {
        if self.can_consume(n) {
            self.0 -= n;
            true
        } else {
            false
        }
    }

    /// Add `n`, clamping to [Allowance::max] on overflow. Returns the value before the add.
    #[inline]
    pub fn add(&mut self, n: u64) -> u64 {
        let old = self.0;
        self.0 = old.saturating_add(n);
        old
    }

    #[inline]
    pub fn can_consume(&self, n: u64) -> bool {
        self.0 >= n
    }

    #[inline]
    pub fn consume_all(&mut self) -> u64 {
        std::mem::take(&mut self.0)
    }

    /// Consume `min(limit, value)` and return the consumed amount.
    #[inline]
    pub fn consume_up_to(&mut self, limit: u64) -> u64 {
        let n = self.0.min(limit);
        self.0 -= n;
        n
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0
    }

    /// True when there is any credit left.
    #[inline]
    pub fn has_credit(&self) -> bool {
        self.0 != 0
    }
}

impl From<Allowance> for bool {
    #[inline]
    fn from(a: Allowance) -> bool {
        a.has_credit()
    }
}

impl fmt::Debug for Allowance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Allowance({})", self.0)
    }
}

impl fmt::Display for Allowance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
