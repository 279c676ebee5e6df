//! Arena identifiers.
//!
//! Every long-lived compiler object (AST node, symbol, scope, module) is
//! stored in an arena and referred to by one of these small copyable ids.

use std::fmt;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl From<usize> for $name {
            fn from(index: usize) -> Self {
                Self(index as u32)
            }
        }
    };
}

arena_id!(
    /// Identifies an AST node. Unique across every module parsed in one
    /// compilation so side tables can be shared between modules.
    NodeId,
    "node#"
);

arena_id!(
    /// Identifies a symbol in the symbol arena.
    SymbolId,
    "sym#"
);

arena_id!(
    /// Identifies a lexical scope.
    ScopeId,
    "scope#"
);

arena_id!(
    /// Identifies an analysed module (one source file).
    ModuleId,
    "module#"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_their_index() {
        assert_eq!(SymbolId::new(7).index(), 7);
        assert_eq!(NodeId::from(3usize), NodeId::new(3));
    }

    #[test]
    fn debug_names_the_arena() {
        assert_eq!(format!("{:?}", ScopeId::new(2)), "scope#2");
        assert_eq!(format!("{:?}", ModuleId::new(0)), "module#0");
    }
}
