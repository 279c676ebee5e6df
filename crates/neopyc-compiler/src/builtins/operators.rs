//! Operator catalog.
//!
//! Resolves an operator applied to static operand types into the result
//! type and the instructions implementing it. Operands are already on the
//! stack, left below right, when the template runs.

use neopyc_core::{StackItemType, Type};
use neopyc_parser::ast::{BinaryOp, UnaryOp};

use super::TemplateOp::{self, Convert, Op};
use crate::bytecode::Opcode;

/// A resolved operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub result: Type,
    pub template: Vec<TemplateOp>,
}

impl Operation {
    fn new(result: Type, template: Vec<TemplateOp>) -> Self {
        Self { result, template }
    }
}

/// Operands usable as integers: `int`, `bool` and anything untyped.
fn is_numeric(ty: &Type) -> bool {
    Type::Int.is_type_of(ty)
}

/// Exactly `int` or `bool`, so numeric comparison is safe at run time.
fn is_strictly_numeric(ty: &Type) -> bool {
    matches!(ty, Type::Int | Type::Bool)
}

fn is_text(ty: &Type, text: &Type) -> bool {
    ty == text || ty.is_any()
}

/// Resolve a binary operator. `None` means the operand pair has no
/// implementation; `is`/`is not` are handled by the generator directly.
pub fn binary(op: BinaryOp, left: &Type, right: &Type) -> Option<Operation> {
    use BinaryOp::*;

    let numeric = is_numeric(left) && is_numeric(right);
    let arithmetic = |opcode: Opcode| numeric.then(|| Operation::new(Type::Int, vec![Op(opcode)]));
    let comparison = |opcode: Opcode| numeric.then(|| Operation::new(Type::Bool, vec![Op(opcode)]));

    match op {
        Add => {
            if numeric {
                return Some(Operation::new(Type::Int, vec![Op(Opcode::Add)]));
            }
            for text in [Type::Str, Type::Bytes] {
                if is_text(left, &text) && is_text(right, &text) {
                    let template = vec![Op(Opcode::Cat), Convert(StackItemType::ByteString)];
                    return Some(Operation::new(text, template));
                }
            }
            None
        }
        Sub => arithmetic(Opcode::Sub),
        Mul => arithmetic(Opcode::Mul),
        FloorDiv => arithmetic(Opcode::Div),
        Mod => arithmetic(Opcode::Mod),
        Pow => arithmetic(Opcode::Pow),
        LShift => arithmetic(Opcode::Shl),
        RShift => arithmetic(Opcode::Shr),
        BitAnd => arithmetic(Opcode::And),
        BitOr => arithmetic(Opcode::Or),
        BitXor => arithmetic(Opcode::Xor),
        Div | MatMul => None,

        Eq | NotEq => {
            let numeric_eq = is_strictly_numeric(left) && is_strictly_numeric(right);
            let opcode = match (op, numeric_eq) {
                (Eq, true) => Opcode::NumEqual,
                (Eq, false) => Opcode::Equal,
                (_, true) => Opcode::NumNotEqual,
                (_, false) => Opcode::NotEqual,
            };
            Some(Operation::new(Type::Bool, vec![Op(opcode)]))
        }
        Lt => comparison(Opcode::Lt),
        LtE => comparison(Opcode::Le),
        Gt => comparison(Opcode::Gt),
        GtE => comparison(Opcode::Ge),

        In | NotIn => {
            let Type::Dict(key, _) = right else {
                return None;
            };
            if !key.is_type_of(left) {
                return None;
            }
            let mut template = vec![Op(Opcode::Swap), Op(Opcode::HasKey)];
            if op == NotIn {
                template.push(Op(Opcode::Not));
            }
            Some(Operation::new(Type::Bool, template))
        }

        Is | IsNot => None,
    }
}

/// Resolve a prefix operator.
pub fn unary(op: UnaryOp, operand: &Type) -> Option<Operation> {
    match op {
        UnaryOp::Not => Some(Operation::new(Type::Bool, vec![Op(Opcode::Not)])),
        _ if !is_numeric(operand) => None,
        UnaryOp::Neg => Some(Operation::new(Type::Int, vec![Op(Opcode::Negate)])),
        UnaryOp::Pos => Some(Operation::new(Type::Int, vec![])),
        UnaryOp::Invert => Some(Operation::new(Type::Int, vec![Op(Opcode::Invert)])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic() {
        let add = binary(BinaryOp::Add, &Type::Int, &Type::Int).unwrap();
        assert_eq!(add.result, Type::Int);
        assert_eq!(add.template, vec![Op(Opcode::Add)]);

        let floor = binary(BinaryOp::FloorDiv, &Type::Int, &Type::Bool).unwrap();
        assert_eq!(floor.template, vec![Op(Opcode::Div)]);
        assert!(binary(BinaryOp::Div, &Type::Int, &Type::Int).is_none());
    }

    #[test]
    fn concatenation() {
        let cat = binary(BinaryOp::Add, &Type::Str, &Type::Str).unwrap();
        assert_eq!(cat.result, Type::Str);
        assert_eq!(cat.template, vec![Op(Opcode::Cat), Convert(StackItemType::ByteString)]);

        let bytes = binary(BinaryOp::Add, &Type::Bytes, &Type::Bytes).unwrap();
        assert_eq!(bytes.result, Type::Bytes);
        assert!(binary(BinaryOp::Add, &Type::Str, &Type::Bytes).is_none());
        assert!(binary(BinaryOp::Add, &Type::Str, &Type::Int).is_none());
    }

    #[test]
    fn equality_picks_numeric_form_for_ints_only() {
        let ints = binary(BinaryOp::Eq, &Type::Int, &Type::Int).unwrap();
        assert_eq!(ints.template, vec![Op(Opcode::NumEqual)]);
        let strings = binary(BinaryOp::NotEq, &Type::Str, &Type::Str).unwrap();
        assert_eq!(strings.template, vec![Op(Opcode::NotEqual)]);
        let untyped = binary(BinaryOp::Eq, &Type::Any, &Type::Int).unwrap();
        assert_eq!(untyped.template, vec![Op(Opcode::Equal)]);
    }

    #[test]
    fn ordering_needs_integers() {
        assert_eq!(
            binary(BinaryOp::GtE, &Type::Int, &Type::Int).unwrap().template,
            vec![Op(Opcode::Ge)]
        );
        assert!(binary(BinaryOp::Lt, &Type::Str, &Type::Str).is_none());
    }

    #[test]
    fn membership_on_dicts() {
        let dict = Type::dict(Type::Str, Type::Int);
        let not_in = binary(BinaryOp::NotIn, &Type::Str, &dict).unwrap();
        assert_eq!(
            not_in.template,
            vec![Op(Opcode::Swap), Op(Opcode::HasKey), Op(Opcode::Not)]
        );
        assert!(binary(BinaryOp::In, &Type::Int, &dict).is_none());
        assert!(binary(BinaryOp::In, &Type::Int, &Type::list(Type::Int)).is_none());
    }

    #[test]
    fn prefix_operators() {
        assert_eq!(unary(UnaryOp::Neg, &Type::Int).unwrap().template, vec![Op(Opcode::Negate)]);
        assert_eq!(unary(UnaryOp::Not, &Type::Str).unwrap().result, Type::Bool);
        assert!(unary(UnaryOp::Invert, &Type::Str).is_none());
        assert!(unary(UnaryOp::Pos, &Type::Int).unwrap().template.is_empty());
    }
}
