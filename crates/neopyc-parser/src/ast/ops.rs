//! Operators and their binding powers.

use crate::lexer::TokenKind;
use std::fmt;

/// Binary operators, including comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    MatMul,
    LShift,
    RShift,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl BinaryOp {
    /// Arithmetic and bitwise operator for a token, as used by the Pratt
    /// loop. Comparisons are parsed separately because they chain.
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::DoubleSlash => BinaryOp::FloorDiv,
            TokenKind::Percent => BinaryOp::Mod,
            TokenKind::DoubleStar => BinaryOp::Pow,
            TokenKind::At => BinaryOp::MatMul,
            TokenKind::LeftShift => BinaryOp::LShift,
            TokenKind::RightShift => BinaryOp::RShift,
            TokenKind::Ampersand => BinaryOp::BitAnd,
            TokenKind::Pipe => BinaryOp::BitOr,
            TokenKind::Caret => BinaryOp::BitXor,
            _ => return None,
        })
    }

    /// Operator of an augmented assignment token (`+=` gives `Add`).
    pub fn from_augmented(kind: TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::PlusEqual => BinaryOp::Add,
            TokenKind::MinusEqual => BinaryOp::Sub,
            TokenKind::StarEqual => BinaryOp::Mul,
            TokenKind::SlashEqual => BinaryOp::Div,
            TokenKind::DoubleSlashEqual => BinaryOp::FloorDiv,
            TokenKind::PercentEqual => BinaryOp::Mod,
            TokenKind::DoubleStarEqual => BinaryOp::Pow,
            TokenKind::AtEqual => BinaryOp::MatMul,
            TokenKind::LeftShiftEqual => BinaryOp::LShift,
            TokenKind::RightShiftEqual => BinaryOp::RShift,
            TokenKind::AmpersandEqual => BinaryOp::BitAnd,
            TokenKind::PipeEqual => BinaryOp::BitOr,
            TokenKind::CaretEqual => BinaryOp::BitXor,
            _ => return None,
        })
    }

    /// Left and right binding power. `**` is right associative.
    pub fn binding_power(self) -> (u8, u8) {
        match self {
            BinaryOp::BitOr => (1, 2),
            BinaryOp::BitXor => (3, 4),
            BinaryOp::BitAnd => (5, 6),
            BinaryOp::LShift | BinaryOp::RShift => (7, 8),
            BinaryOp::Add | BinaryOp::Sub => (9, 10),
            BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::FloorDiv
            | BinaryOp::Mod
            | BinaryOp::MatMul => (11, 12),
            BinaryOp::Pow => (16, 15),
            _ => (0, 0),
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtE
                | BinaryOp::Gt
                | BinaryOp::GtE
                | BinaryOp::Is
                | BinaryOp::IsNot
                | BinaryOp::In
                | BinaryOp::NotIn
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::MatMul => "@",
            BinaryOp::LShift => "<<",
            BinaryOp::RShift => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtE => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtE => ">=",
            BinaryOp::Is => "is",
            BinaryOp::IsNot => "is not",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Pos,
    Invert,
    Not,
}

impl UnaryOp {
    /// Binding power of the arithmetic prefix operators: tighter than `*`,
    /// looser than `**`.
    pub const ARITHMETIC_BP: u8 = 13;

    pub fn from_token(kind: TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Pos),
            TokenKind::Tilde => Some(UnaryOp::Invert),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Invert => "~",
            UnaryOp::Not => "not",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short-circuit boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    And,
    Or,
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BoolOp::And => "and",
            BoolOp::Or => "or",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_ordering() {
        let add = BinaryOp::Add.binding_power();
        let mul = BinaryOp::Mul.binding_power();
        let or = BinaryOp::BitOr.binding_power();
        assert!(mul.0 > add.0);
        assert!(add.0 > or.0);
        assert!(UnaryOp::ARITHMETIC_BP > mul.0);
        assert!(BinaryOp::Pow.binding_power().0 > UnaryOp::ARITHMETIC_BP);
    }

    #[test]
    fn power_is_right_associative() {
        let (l, r) = BinaryOp::Pow.binding_power();
        assert!(l > r);
    }

    #[test]
    fn augmented_tokens() {
        assert_eq!(BinaryOp::from_augmented(TokenKind::PlusEqual), Some(BinaryOp::Add));
        assert_eq!(BinaryOp::from_augmented(TokenKind::Equal), None);
    }

    #[test]
    fn comparisons() {
        assert!(BinaryOp::IsNot.is_comparison());
        assert!(!BinaryOp::Add.is_comparison());
        assert_eq!(BinaryOp::NotIn.to_string(), "not in");
    }
}
