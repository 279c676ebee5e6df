//! Compiler diagnostics.
//!
//! User-facing problems are collected as [`CompilerError`]s and
//! [`CompilerWarning`]s in a [`Diagnostics`] list; each pass keeps going
//! after an error so one run reports as much as possible. Faults inside the
//! code generator are [`CodegenError`]s and are returned as `Err`.

use thiserror::Error;

use crate::Span;

// ============================================================================
// Errors
// ============================================================================

/// A problem in the compiled program that prevents code generation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompilerError {
    /// The source could not be tokenized or parsed.
    #[error("at {span}: syntax error: {message}")]
    Syntax { message: String, span: Span },

    /// A name does not resolve to any symbol in scope.
    #[error("at {span}: unresolved reference '{name}'")]
    UnresolvedReference { name: String, span: Span },

    /// An import target (module or imported name) does not exist.
    #[error("at {span}: could not resolve import '{target}'")]
    UnresolvedImport { target: String, span: Span },

    /// A module imports itself, directly or through other modules.
    #[error("at {span}: circular import of '{target}'")]
    CircularImport { target: String, span: Span },

    /// A value's type is not accepted where it is used.
    #[error("at {span}: expected type '{expected}', got '{actual}'")]
    MismatchedTypes {
        expected: String,
        actual: String,
        span: Span,
    },

    /// An operator is applied to operand types it has no implementation for.
    #[error("at {span}: operator '{operator}' is not supported for {operands}")]
    NotSupportedOperation {
        operator: String,
        operands: String,
        span: Span,
    },

    /// Valid source that uses a construct outside the accepted subset.
    #[error("at {span}: unsupported syntax: {construct}")]
    UnsupportedSyntax { construct: String, span: Span },

    /// A call omits a required parameter.
    #[error("at {span}: missing argument '{param}' in call to '{callee}'")]
    UnfilledArgument {
        callee: String,
        param: String,
        span: Span,
    },

    /// A call passes more arguments than the callee declares.
    #[error("at {span}: unexpected argument in call to '{callee}'")]
    UnexpectedArgument { callee: String, span: Span },

    /// `return`, `break` or `continue` outside of the construct it belongs to.
    #[error("at {span}: '{statement}' outside of {context}")]
    MisplacedStatement {
        statement: String,
        context: String,
        span: Span,
    },

    /// A function with a non-`None` return type can finish without returning.
    #[error("at {span}: function '{function}' does not return a value on every path")]
    MissingReturn { function: String, span: Span },

    /// The compiler reached a state it cannot handle.
    #[error("internal compiler error: {message}")]
    Internal { message: String },
}

impl CompilerError {
    /// Where the problem was found; internal errors have no location.
    pub fn span(&self) -> Option<Span> {
        match self {
            CompilerError::Syntax { span, .. }
            | CompilerError::UnresolvedReference { span, .. }
            | CompilerError::UnresolvedImport { span, .. }
            | CompilerError::CircularImport { span, .. }
            | CompilerError::MismatchedTypes { span, .. }
            | CompilerError::NotSupportedOperation { span, .. }
            | CompilerError::UnsupportedSyntax { span, .. }
            | CompilerError::UnfilledArgument { span, .. }
            | CompilerError::UnexpectedArgument { span, .. }
            | CompilerError::MisplacedStatement { span, .. }
            | CompilerError::MissingReturn { span, .. } => Some(*span),
            CompilerError::Internal { .. } => None,
        }
    }

    pub fn unsupported(construct: impl Into<String>, span: Span) -> Self {
        CompilerError::UnsupportedSyntax {
            construct: construct.into(),
            span,
        }
    }

    pub fn mismatched(expected: impl ToString, actual: impl ToString, span: Span) -> Self {
        CompilerError::MismatchedTypes {
            expected: expected.to_string(),
            actual: actual.to_string(),
            span,
        }
    }
}

// ============================================================================
// Warnings
// ============================================================================

/// A problem that does not stop compilation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompilerWarning {
    /// A user definition hides a builtin name.
    #[error("at {span}: '{name}' shadows a builtin name")]
    NameShadowing { name: String, span: Span },

    /// Statements after a `return`, `break` or `continue` never run.
    #[error("at {span}: unreachable code")]
    UnreachableCode { span: Span },
}

impl CompilerWarning {
    pub fn span(&self) -> Span {
        match self {
            CompilerWarning::NameShadowing { span, .. }
            | CompilerWarning::UnreachableCode { span } => *span,
        }
    }
}

// ============================================================================
// Code generation faults
// ============================================================================

/// A fault while emitting instructions for an already validated program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    /// More values were popped from the operand-type stack than were pushed.
    #[error("operand stack underflow while emitting {0}")]
    StackUnderflow(String),

    /// Statement boundaries must leave the operand-type stack empty.
    #[error("operand stack holds {depth} value(s) after a statement in '{method}'")]
    UnbalancedStack { method: String, depth: usize },

    /// `begin_method` was called while another method was open.
    #[error("method '{0}' was started while another method was being generated")]
    NestedMethod(String),

    /// A method symbol was generated twice.
    #[error("method '{0}' has already been generated")]
    MethodAlreadyGenerated(String),

    /// An instruction was requested with no method open.
    #[error("no method is being generated")]
    NoCurrentMethod,

    /// The validated program refers to something the generator cannot find.
    #[error("unresolved symbol '{0}' during code generation")]
    UnresolvedSymbol(String),

    /// A slot index does not fit the one-byte operand.
    #[error("slot index {0} exceeds the VM limit of 255")]
    SlotOutOfRange(usize),

    /// A branch was patched to an address inside another instruction.
    #[error("address {0} is not the start of an instruction")]
    InvalidJumpTarget(u32),

    /// Branches or calls were still unresolved when the bytecode was built.
    #[error("{0} branch or call target(s) are still unresolved")]
    UnresolvedTargets(usize),

    /// A literal payload is larger than `PUSHDATA4` can carry.
    #[error("push-data payload of {0} bytes is too large")]
    PayloadTooLarge(usize),

    /// A node reached the generator that validation should have rejected.
    #[error("unexpected construct during code generation: {0}")]
    Unexpected(String),
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Errors and warnings accumulated across the passes of one compilation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    errors: Vec<CompilerError>,
    warnings: Vec<CompilerWarning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, error: CompilerError) {
        self.errors.push(error);
    }

    pub fn warning(&mut self, warning: CompilerWarning) {
        self.warnings.push(warning);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Number of errors recorded so far; passes compare counts to tell
    /// whether they added any.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[CompilerError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[CompilerWarning] {
        &self.warnings
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn into_parts(self) -> (Vec<CompilerError>, Vec<CompilerWarning>) {
        (self.errors, self.warnings)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_location() {
        let err = CompilerError::UnresolvedReference {
            name: "foo".into(),
            span: Span::new(4, 8, 3),
        };
        assert_eq!(err.to_string(), "at 4:8: unresolved reference 'foo'");
        assert_eq!(err.span(), Some(Span::new(4, 8, 3)));
    }

    #[test]
    fn mismatched_helper_formats_types() {
        let err = CompilerError::mismatched(crate::Type::Int, crate::Type::Str, Span::point(1, 1));
        assert_eq!(err.to_string(), "at 1:1: expected type 'int', got 'str'");
    }

    #[test]
    fn internal_error_has_no_span() {
        let err = CompilerError::Internal {
            message: "boom".into(),
        };
        assert_eq!(err.span(), None);
        assert_eq!(err.to_string(), "internal compiler error: boom");
    }

    #[test]
    fn diagnostics_accumulate() {
        let mut diags = Diagnostics::new();
        assert!(!diags.has_errors());

        diags.warning(CompilerWarning::NameShadowing {
            name: "len".into(),
            span: Span::point(1, 1),
        });
        assert!(!diags.has_errors());

        diags.error(CompilerError::unsupported("lambda", Span::point(2, 1)));
        assert_eq!(diags.error_count(), 1);

        let mut other = Diagnostics::new();
        other.error(CompilerError::Internal {
            message: "x".into(),
        });
        diags.extend(other);

        let (errors, warnings) = diags.into_parts();
        assert_eq!(errors.len(), 2);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn codegen_error_display() {
        assert_eq!(
            CodegenError::SlotOutOfRange(300).to_string(),
            "slot index 300 exceeds the VM limit of 255"
        );
    }
}
