//! Expression nodes.
//!
//! Every node lives in the AST arena; [`Expr`] is a small copyable handle
//! over a reference to one of them. Each node carries a [`NodeId`] that the
//! semantic passes use as the key of their side tables (types, resolved
//! symbols, casts), so the tree itself never needs to be mutated.

use neopyc_core::{Constant, NodeId, Span};
use num_bigint::BigInt;

use crate::ast::{BinaryOp, BoolOp, Ident, UnaryOp};

/// An expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expr<'ast> {
    Literal(&'ast LiteralExpr<'ast>),
    Name(&'ast NameExpr<'ast>),
    Binary(&'ast BinaryExpr<'ast>),
    Unary(&'ast UnaryExpr<'ast>),
    BoolOp(&'ast BoolOpExpr<'ast>),
    /// A chain of two or more comparisons, `a < b <= c`.
    Compare(&'ast CompareExpr<'ast>),
    Call(&'ast CallExpr<'ast>),
    Attribute(&'ast AttributeExpr<'ast>),
    Subscript(&'ast SubscriptExpr<'ast>),
    Slice(&'ast SliceExpr<'ast>),
    List(&'ast SequenceExpr<'ast>),
    Tuple(&'ast SequenceExpr<'ast>),
    Dict(&'ast DictExpr<'ast>),
    IfExp(&'ast IfExpr<'ast>),
}

impl<'ast> Expr<'ast> {
    pub fn id(&self) -> NodeId {
        match self {
            Expr::Literal(e) => e.id,
            Expr::Name(e) => e.id,
            Expr::Binary(e) => e.id,
            Expr::Unary(e) => e.id,
            Expr::BoolOp(e) => e.id,
            Expr::Compare(e) => e.id,
            Expr::Call(e) => e.id,
            Expr::Attribute(e) => e.id,
            Expr::Subscript(e) => e.id,
            Expr::Slice(e) => e.id,
            Expr::List(e) | Expr::Tuple(e) => e.id,
            Expr::Dict(e) => e.id,
            Expr::IfExp(e) => e.id,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(e) => e.span,
            Expr::Name(e) => e.span,
            Expr::Binary(e) => e.span,
            Expr::Unary(e) => e.span,
            Expr::BoolOp(e) => e.span,
            Expr::Compare(e) => e.span,
            Expr::Call(e) => e.span,
            Expr::Attribute(e) => e.span,
            Expr::Subscript(e) => e.span,
            Expr::Slice(e) => e.span,
            Expr::List(e) | Expr::Tuple(e) => e.span,
            Expr::Dict(e) => e.span,
            Expr::IfExp(e) => e.span,
        }
    }

    /// The literal value if this is a literal.
    pub fn as_literal(&self) -> Option<&'ast Literal<'ast>> {
        match self {
            Expr::Literal(lit) => Some(&lit.value),
            _ => None,
        }
    }

    /// The identifier if this is a plain name.
    pub fn as_name(&self) -> Option<&'ast str> {
        match self {
            Expr::Name(name) => Some(name.name),
            _ => None,
        }
    }

    /// Whether evaluating the expression twice is indistinguishable from
    /// evaluating it once: names, literals and attribute/subscript chains
    /// over them.
    pub fn is_side_effect_free(&self) -> bool {
        match self {
            Expr::Literal(_) | Expr::Name(_) => true,
            Expr::Attribute(attr) => attr.value.is_side_effect_free(),
            Expr::Subscript(sub) => sub.value.is_side_effect_free() && sub.index.is_side_effect_free(),
            Expr::Unary(unary) => unary.operand.is_side_effect_free(),
            Expr::Binary(bin) => bin.left.is_side_effect_free() && bin.right.is_side_effect_free(),
            _ => false,
        }
    }

    /// Short description of the expression kind for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Expr::Literal(_) => "literal",
            Expr::Name(_) => "name",
            Expr::Binary(_) => "binary operation",
            Expr::Unary(_) => "unary operation",
            Expr::BoolOp(_) => "boolean operation",
            Expr::Compare(_) => "comparison chain",
            Expr::Call(_) => "call",
            Expr::Attribute(_) => "attribute",
            Expr::Subscript(_) => "subscript",
            Expr::Slice(_) => "slice",
            Expr::List(_) => "list display",
            Expr::Tuple(_) => "tuple display",
            Expr::Dict(_) => "dict display",
            Expr::IfExp(_) => "conditional expression",
        }
    }
}

/// A literal value as written in the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal<'ast> {
    None,
    Bool(bool),
    Int(i128),
    /// An integer outside the `i128` range, as minimal two's-complement
    /// little-endian bytes.
    BigInt(&'ast [u8]),
    Str(&'ast str),
    Bytes(&'ast [u8]),
}

impl Literal<'_> {
    pub fn to_constant(&self) -> Constant {
        match self {
            Literal::None => Constant::None,
            Literal::Bool(b) => Constant::Bool(*b),
            Literal::Int(v) => Constant::Int(*v),
            Literal::BigInt(bytes) => Constant::integer(BigInt::from_signed_bytes_le(bytes)),
            Literal::Str(s) => Constant::Str((*s).to_string()),
            Literal::Bytes(b) => Constant::Bytes(b.to_vec()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiteralExpr<'ast> {
    pub id: NodeId,
    pub value: Literal<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NameExpr<'ast> {
    pub id: NodeId,
    pub name: &'ast str,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryExpr<'ast> {
    pub id: NodeId,
    pub left: Expr<'ast>,
    pub op: BinaryOp,
    pub right: Expr<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnaryExpr<'ast> {
    pub id: NodeId,
    pub op: UnaryOp,
    pub operand: Expr<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoolOpExpr<'ast> {
    pub id: NodeId,
    pub op: BoolOp,
    pub left: Expr<'ast>,
    pub right: Expr<'ast>,
    pub span: Span,
}

/// `left ops[0] comparators[0] ops[1] comparators[1] ...`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompareExpr<'ast> {
    pub id: NodeId,
    pub left: Expr<'ast>,
    pub ops: &'ast [BinaryOp],
    pub comparators: &'ast [Expr<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallExpr<'ast> {
    pub id: NodeId,
    pub func: Expr<'ast>,
    pub args: &'ast [Expr<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeExpr<'ast> {
    pub id: NodeId,
    pub value: Expr<'ast>,
    pub attr: Ident<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubscriptExpr<'ast> {
    pub id: NodeId,
    pub value: Expr<'ast>,
    pub index: Expr<'ast>,
    pub span: Span,
}

/// `value[lower:upper]`; either bound may be omitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceExpr<'ast> {
    pub id: NodeId,
    pub value: Expr<'ast>,
    pub lower: Option<Expr<'ast>>,
    pub upper: Option<Expr<'ast>>,
    pub span: Span,
}

/// List or tuple display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceExpr<'ast> {
    pub id: NodeId,
    pub elements: &'ast [Expr<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DictExpr<'ast> {
    pub id: NodeId,
    pub keys: &'ast [Expr<'ast>],
    pub values: &'ast [Expr<'ast>],
    pub span: Span,
}

/// `body if test else orelse`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IfExpr<'ast> {
    pub id: NodeId,
    pub test: Expr<'ast>,
    pub body: Expr<'ast>,
    pub orelse: Expr<'ast>,
    pub span: Span,
}
