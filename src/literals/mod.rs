use std::fmt;
use std::sync::Arc;

/// An assignment literal: the statement that a puzzle variable equals, or
/// does not equal, one value of its domain.
///
/// Literals are immutable value objects with a total order (variable name,
/// then value, then polarity), so sets of literals behave deterministically.
/// The variable name is shared, which makes cloning cheap enough to pass
/// literals freely between worker threads.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PuzLit {
    var: Arc<str>,
    val: i32,
    equal: bool,
}

impl PuzLit {
    /// Creates the literal `var = val`.
    pub fn eq(var: impl Into<Arc<str>>, val: i32) -> Self {
        Self { var: var.into(), val, equal: true }
    }

    /// Creates the literal `var != val`.
    pub fn neq(var: impl Into<Arc<str>>, val: i32) -> Self {
        Self { var: var.into(), val, equal: false }
    }

    /// Returns the literal with the opposite polarity.
    #[must_use]
    pub fn neg(&self) -> Self {
        Self { var: Arc::clone(&self.var), val: self.val, equal: !self.equal }
    }

    /// The variable name.
    pub fn var(&self) -> &str {
        &self.var
    }

    /// The domain value.
    pub const fn val(&self) -> i32 {
        self.val
    }

    /// `true` for `var = val`, `false` for `var != val`.
    pub const fn is_eq(&self) -> bool {
        self.equal
    }
}

impl fmt::Display for PuzLit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.equal {
            write!(f, "{} is {}", self.var, self.val)
        } else {
            write!(f, "{} is not {}", self.var, self.val)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PuzLit;

    #[test]
    fn negation_flips_polarity_only() {
        let lit = PuzLit::eq("a", 3);
        let neg = lit.neg();
        assert_eq!(neg, PuzLit::neq("a", 3));
        assert_eq!(neg.neg(), lit);
        assert_eq!(neg.var(), "a");
        assert_eq!(neg.val(), 3);
        assert!(!neg.is_eq());
    }

    #[test]
    fn ordering_is_var_then_val_then_polarity() {
        let mut lits = vec![
            PuzLit::eq("b", 1),
            PuzLit::neq("a", 2),
            PuzLit::eq("a", 2),
            PuzLit::eq("a", 1),
        ];
        lits.sort();
        assert_eq!(
            lits,
            vec![PuzLit::eq("a", 1), PuzLit::neq("a", 2), PuzLit::eq("a", 2), PuzLit::eq("b", 1)]
        );
    }

    #[test]
    fn display_matches_polarity() {
        assert_eq!(PuzLit::eq("x", 5).to_string(), "x is 5");
        assert_eq!(PuzLit::neq("x", 5).to_string(), "x is not 5");
    }
}
