//! Enum type inference from expressions.
//!
//! Recognizes every qualification form the language allows for naming a
//! variant or an enum-typed value: `Enum.MEMBER`, `Scope.Enum.MEMBER`,
//! `this.Enum.MEMBER`, `global.Enum.MEMBER`, `global.Scope.Enum.MEMBER`,
//! enum-typed variables through `this`/`global`, and calls whose return type
//! is an enum.

use crate::ast::Expr;
use crate::codegen::CodegenState;

impl CodegenState {
    /// The enum type an expression evaluates to, or `None` when it is not
    /// enum-typed. Scoped enums come back under their mangled name
    /// (`Scope_Enum`).
    pub fn enum_type_of_expression(&self, e: &Expr) -> Option<String> {
        match e {
            Expr::Identifier(name) => self.lookup_type_info(name)?.enum_type_name,
            Expr::Member { base, member } => self.enum_member_type(base, member),
            Expr::Call { callee, .. } => {
                let ret = self.function_return_type(callee)?;
                if self.symbols.is_enum_type(&ret) {
                    Some(ret)
                } else {
                    None
                }
            }
            Expr::Cast { type_name, .. } => {
                if self.symbols.is_enum_type(type_name) {
                    Some(type_name.clone())
                } else {
                    None
                }
            }
            Expr::Paren(inner) => self.enum_type_of_expression(inner),
            _ => None,
        }
    }

    fn enum_member_type(&self, base: &Expr, member: &str) -> Option<String> {
        match base {
            // Enum.MEMBER
            Expr::Identifier(name) => {
                if let Some(info) = self.symbols.enums.get(name) {
                    if info.contains(member) {
                        return Some(name.clone());
                    }
                }
                None
            }
            // this.varName where varName is enum-typed, or this.Enum.MEMBER
            // resolved one level up
            Expr::This => {
                let scope = self.current_scope.as_deref()?;
                let mangled = format!("{}_{}", scope, member);
                if let Some(info) = self.type_registry.get(&mangled) {
                    return info.enum_type_name.clone();
                }
                None
            }
            // global.varName of enum type
            Expr::Global => self
                .type_registry
                .get(member)
                .and_then(|info| info.enum_type_name.clone()),
            Expr::Member {
                base: inner,
                member: qualifier,
            } => match inner.as_ref() {
                // Scope.Enum.MEMBER -> Scope_Enum
                Expr::Identifier(scope) if self.symbols.is_scope(scope) => {
                    let mangled = format!("{}_{}", scope, qualifier);
                    self.named_enum_with_variant(&mangled, member)
                }
                // this.Enum.MEMBER
                Expr::This => {
                    let scope = self.current_scope.as_deref()?;
                    let mangled = format!("{}_{}", scope, qualifier);
                    self.named_enum_with_variant(&mangled, member)
                }
                // global.Enum.MEMBER and global.Scope.Enum.MEMBER
                Expr::Global => self.named_enum_with_variant(qualifier, member),
                Expr::Member {
                    base: innermost,
                    member: scope,
                } if matches!(innermost.as_ref(), Expr::Global)
                    && self.symbols.is_scope(scope) =>
                {
                    let mangled = format!("{}_{}", scope, qualifier);
                    self.named_enum_with_variant(&mangled, member)
                }
                _ => None,
            },
            _ => None,
        }
    }

    fn named_enum_with_variant(&self, enum_name: &str, variant: &str) -> Option<String> {
        let info = self.symbols.enums.get(enum_name)?;
        if info.contains(variant) {
            Some(enum_name.to_string())
        } else {
            None
        }
    }
}
