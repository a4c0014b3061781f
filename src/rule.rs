//! Register rules as the CFA interpreter hands them to us.
//!
//! Source: https://dwarfstd.org/doc/DWARF5.pdf §6.4.1 Structure of Call Frame Information
//!
//! The stack never looks at a rule. It stores the tag and an `i64` payload
//! whose meaning depends on the tag, and gives both back unchanged.

use core::fmt;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum RegisterRule {
    /// A register that has this rule has no recoverable value in the previous
    /// frame. (By convention, it is not preserved by a callee.)
    Undefined = 0,
    /// This register has not been modified from the previous frame.
    /// (By convention, it is preserved by the callee, but the callee has not
    /// modified it.)
    SameValue = 1,
    /// The previous value of this register is saved at the address CFA+N where
    /// CFA is the current CFA value and N is the payload.
    Offset = 2,
    /// The previous value of this register is the value CFA+N where CFA is the
    /// current CFA value and N is the payload.
    ValOffset = 3,
    /// The previous value of this register is stored in another register,
    /// whose number is the payload.
    Register = 4,
    /// The previous value of this register is located at the address produced
    /// by executing the DWARF expression whose address is the payload.
    Expression = 5,
    /// The previous value of this register is the value produced by executing
    /// the DWARF expression whose address is the payload.
    ValExpression = 6,
    /// The rule is defined outside of DWARF, by the augmenter.
    Architectural = 7,
}

impl RegisterRule {
    pub const fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Undefined,
            1 => Self::SameValue,
            2 => Self::Offset,
            3 => Self::ValOffset,
            4 => Self::Register,
            5 => Self::Expression,
            6 => Self::ValExpression,
            7 => Self::Architectural,
            _ => return None,
        })
    }

    pub const fn as_raw(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for RegisterRule {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self, Error> {
        Self::from_raw(raw).ok_or(Error::InvalidRule(raw))
    }
}

/// One register's rule in the current state, as yielded by
/// [`CfaStackIter`](crate::CfaStackIter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegisterEntry {
    /// DWARF register number.
    pub regnum: u32,
    pub rule: RegisterRule,
    /// Rule dependent payload.
    pub value: i64,
}

struct CfaOffset(i64);

impl fmt::Display for CfaOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => f.write_str("CFA"),
            n if n < 0 => write!(f, "CFA-{}", n.unsigned_abs()),
            n => write!(f, "CFA+{n}"),
        }
    }
}

/// Formats like the rule column of `llvm-dwarfdump --eh-frame`.
impl fmt::Display for RegisterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.regnum;
        match self.rule {
            RegisterRule::Undefined => write!(f, "r{r}=undef"),
            RegisterRule::SameValue => write!(f, "r{r}=same"),
            RegisterRule::Offset => write!(f, "r{r}=[{}]", CfaOffset(self.value)),
            RegisterRule::ValOffset => write!(f, "r{r}={}", CfaOffset(self.value)),
            RegisterRule::Register => write!(f, "r{r}=r{}", self.value),
            RegisterRule::Expression => write!(f, "r{r}=[expr@{:#x}]", self.value),
            RegisterRule::ValExpression => write!(f, "r{r}=expr@{:#x}", self.value),
            RegisterRule::Architectural => write!(f, "r{r}=arch({})", self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RegisterEntry, RegisterRule};
    use crate::Error;

    #[test]
    fn raw_tags() {
        for raw in 0..=7 {
            let rule = RegisterRule::from_raw(raw).unwrap();
            assert_eq!(rule.as_raw(), raw);
        }
        assert_eq!(RegisterRule::from_raw(8), None);
        assert_eq!(RegisterRule::try_from(200), Err(Error::InvalidRule(200)));
        assert_eq!(RegisterRule::try_from(2), Ok(RegisterRule::Offset));
    }

    #[test]
    fn dump_format() {
        let entry = |regnum, rule, value| RegisterEntry { regnum, rule, value }.to_string();

        assert_eq!(entry(6, RegisterRule::Offset, -16), "r6=[CFA-16]");
        assert_eq!(entry(16, RegisterRule::Offset, -8), "r16=[CFA-8]");
        assert_eq!(entry(7, RegisterRule::ValOffset, 0), "r7=CFA");
        assert_eq!(entry(7, RegisterRule::ValOffset, 8), "r7=CFA+8");
        assert_eq!(entry(3, RegisterRule::SameValue, 0), "r3=same");
        assert_eq!(entry(12, RegisterRule::Register, 3), "r12=r3");
        assert_eq!(entry(1, RegisterRule::Undefined, 0), "r1=undef");
        assert_eq!(entry(2, RegisterRule::Expression, 0x1000), "r2=[expr@0x1000]");
    }
}
