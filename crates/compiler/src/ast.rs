//! Abstract syntax tree for C-Next.
//!
//! The parser (an external collaborator) produces these nodes; the backend
//! consumes them read-only. Every node the code generator needs a source
//! position for carries a `line` field. The whole tree derives serde so the
//! frontend can hand it to the backend as a serialized bundle.

use serde::{Deserialize, Serialize};

use crate::symbols::{AccessMode, CallbackSignature};

/// A parsed translation unit: top-level declarations in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub declarations: Vec<Decl>,
}

/// Visibility of a scope member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// Overflow behavior declared on an integer variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowBehavior {
    /// Modular wrap-around (native C behavior for unsigned)
    Wrap,
    /// Saturate at the type's bounds via the clamp helpers
    Clamp,
    /// No declared behavior
    #[default]
    None,
}

// ============================================================================
//                              DECLARATIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decl {
    Include(IncludeDecl),
    Variable(VarDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    Bitmap(BitmapDecl),
    Register(RegisterDecl),
    Callback(CallbackDecl),
    Function(FunctionDecl),
    Scope(ScopeDecl),
}

/// `#include "path"` directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncludeDecl {
    pub path: String,
    pub line: usize,
}

/// A variable declaration, at file scope, scope-member position, or inside a
/// function body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    /// Base type token: a primitive (`u8`, `f32`, ...), `string`, or a user
    /// type name
    pub type_name: String,
    pub is_const: bool,
    pub is_atomic: bool,
    pub overflow: OverflowBehavior,
    /// Declared dimensions; empty for scalars, `0` for an unsized dimension
    pub array_dims: Vec<u32>,
    /// `string<N>` capacity; the emitted storage is `N + 1` bytes
    pub string_capacity: Option<u32>,
    pub initializer: Option<Expr>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructField {
    pub name: String,
    /// Full type token, e.g. `u16` or `string<32>`
    pub type_name: String,
    pub array_dims: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<StructField>,
    pub line: usize,
}

/// `enum Color { RED, GREEN = 5, ... }` — variants keep declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    pub name: String,
    pub variants: Vec<(String, i64)>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitmapField {
    pub name: String,
    /// Field width in bits; single-bit fields have width 1
    pub width: u32,
}

/// `bitmap8 Flags { Ready, Mode[2], ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitmapDecl {
    pub name: String,
    /// Total width of the backing integer: 8, 16, 32, or 64
    pub bit_width: u32,
    pub fields: Vec<BitmapField>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterMemberDecl {
    pub name: String,
    pub offset: u64,
    pub access: AccessMode,
    /// The member's C type token (`u8`..`u64` or a bitmap type name)
    pub type_name: String,
}

/// A memory-mapped register block with a base address and typed members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDecl {
    pub name: String,
    pub base_address: u64,
    pub members: Vec<RegisterMemberDecl>,
    pub line: usize,
}

/// A named callback (function pointer) typedef.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackDecl {
    pub name: String,
    pub signature: CallbackSignature,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    pub type_name: String,
    pub is_const: bool,
    pub array_dims: Vec<u32>,
    pub string_capacity: Option<u32>,
    /// Non-array parameters passed by reference (structs, out-params)
    pub by_ref: bool,
}

impl ParamDecl {
    pub fn is_array(&self) -> bool {
        !self.array_dims.is_empty()
    }

    pub fn is_string(&self) -> bool {
        self.type_name == "string"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub return_type: String,
    pub params: Vec<ParamDecl>,
    pub body: Vec<Stmt>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeMember {
    pub visibility: Visibility,
    pub decl: Decl,
}

/// A named scope: a namespace of variables and functions with per-member
/// visibility. Members mangle to `Scope_member` in the emitted C.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeDecl {
    pub name: String,
    pub members: Vec<ScopeMember>,
    pub line: usize,
}

// ============================================================================
//                               STATEMENTS
// ============================================================================

/// Assignment operators. `Set` is plain `<-`; the rest are the compound
/// forms (`+<-`, `-<-`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl AssignOp {
    /// The C operator token this assignment lowers to.
    pub fn c_token(self) -> &'static str {
        match self {
            AssignOp::Set => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Mod => "%=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitOr => "|=",
            AssignOp::BitXor => "^=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
        }
    }

    pub fn is_compound(self) -> bool {
        self != AssignOp::Set
    }

    /// The plain binary operator behind a compound assignment.
    pub fn binary_token(self) -> &'static str {
        match self {
            AssignOp::Set => "=",
            AssignOp::Add => "+",
            AssignOp::Sub => "-",
            AssignOp::Mul => "*",
            AssignOp::Div => "/",
            AssignOp::Mod => "%",
            AssignOp::BitAnd => "&",
            AssignOp::BitOr => "|",
            AssignOp::BitXor => "^",
            AssignOp::Shl => "<<",
            AssignOp::Shr => ">>",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignStmt {
    pub target: Expr,
    pub op: AssignOp,
    pub value: Expr,
    pub line: usize,
}

/// One `case A || B:` clause; alternates share a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub labels: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub line: usize,
}

/// A `default` clause. `default(N)` declares the count of enum variants the
/// author intends it to absorb; exhaustiveness checking verifies the count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultCase {
    pub expected_remaining: Option<u32>,
    pub body: Vec<Stmt>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchStmt {
    pub value: Expr,
    pub cases: Vec<SwitchCase>,
    pub default: Option<DefaultCase>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Declaration(VarDecl),
    Assign(AssignStmt),
    Expression {
        expr: Expr,
        line: usize,
    },
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
        line: usize,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        line: usize,
    },
    DoWhile {
        body: Vec<Stmt>,
        cond: Expr,
        line: usize,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Box<Stmt>>,
        body: Vec<Stmt>,
        line: usize,
    },
    Switch(SwitchStmt),
    /// `critical { ... }` — interrupts disabled for the body's duration
    Critical {
        body: Vec<Stmt>,
        line: usize,
    },
    Return {
        value: Option<Expr>,
        line: usize,
    },
    Break {
        line: usize,
    },
    Continue {
        line: usize,
    },
    Block(Vec<Stmt>),
}

// ============================================================================
//                              EXPRESSIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    BitNot,
}

impl UnaryOp {
    pub fn c_token(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
            UnaryOp::BitNot => "~",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn c_token(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::BitAnd => "&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }

    /// Comparison and logical operators produce `bool`.
    pub fn yields_bool(self) -> bool {
        matches!(
            self,
            BinaryOp::Or
                | BinaryOp::And
                | BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
        )
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr)
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Sub
                | BinaryOp::Mul
                | BinaryOp::Div
                | BinaryOp::Mod
                | BinaryOp::BitAnd
                | BinaryOp::BitOr
                | BinaryOp::BitXor
                | BinaryOp::Shl
                | BinaryOp::Shr
        )
    }
}

/// Argument of a `sizeof` expression.
///
/// The grammar cannot distinguish `sizeof(Type)` from `sizeof(variable)` for
/// bare names; the resolver applies the variable-wins tie-break.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SizeofArg {
    Type(String),
    Value(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Integer literal; `text` keeps the source spelling (decimal, `0x…`,
    /// `0b…`), `suffix` a typed-literal suffix like `u8`
    IntLiteral {
        text: String,
        suffix: Option<String>,
    },
    FloatLiteral {
        text: String,
        suffix: Option<String>,
    },
    BoolLiteral(bool),
    CharLiteral(char),
    StringLiteral(String),
    Identifier(String),
    /// `this` — the enclosing scope
    This,
    /// `global` — the file scope escape hatch
    Global,
    Member {
        base: Box<Expr>,
        member: String,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
        line: usize,
    },
    /// `base[start, width]`: bit-range on integers/registers, slice on arrays
    Range {
        base: Box<Expr>,
        start: Box<Expr>,
        width: Box<Expr>,
        line: usize,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        line: usize,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
        line: usize,
    },
    Cast {
        type_name: String,
        value: Box<Expr>,
    },
    Sizeof {
        arg: Box<SizeofArg>,
        line: usize,
    },
    Paren(Box<Expr>),
}

impl Expr {
    /// Convenience constructor for an unsuffixed integer literal.
    pub fn int(text: impl Into<String>) -> Expr {
        Expr::IntLiteral {
            text: text.into(),
            suffix: None,
        }
    }

    pub fn ident(name: impl Into<String>) -> Expr {
        Expr::Identifier(name.into())
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Expr::Identifier(name) => Some(name),
            _ => None,
        }
    }

    /// True for `true`, and for the literals `1`/`0` used in bit positions.
    pub fn is_literal_true(&self) -> bool {
        match self {
            Expr::BoolLiteral(b) => *b,
            Expr::IntLiteral { text, .. } => text == "1",
            _ => false,
        }
    }

    pub fn is_literal_false_or_zero(&self) -> bool {
        match self {
            Expr::BoolLiteral(b) => !*b,
            Expr::IntLiteral { text, .. } => {
                matches!(text.as_str(), "0" | "0x0" | "0b0" | "0x00")
            }
            _ => false,
        }
    }

    /// Does this subtree contain a function call?
    pub fn contains_call(&self) -> bool {
        match self {
            Expr::Call { .. } => true,
            Expr::Member { base, .. } => base.contains_call(),
            Expr::Index { base, index, .. } => base.contains_call() || index.contains_call(),
            Expr::Range {
                base, start, width, ..
            } => base.contains_call() || start.contains_call() || width.contains_call(),
            Expr::Unary { operand, .. } => operand.contains_call(),
            Expr::Binary { lhs, rhs, .. } => lhs.contains_call() || rhs.contains_call(),
            Expr::Ternary {
                cond,
                then_value,
                else_value,
                ..
            } => cond.contains_call() || then_value.contains_call() || else_value.contains_call(),
            Expr::Cast { value, .. } => value.contains_call(),
            Expr::Paren(inner) => inner.contains_call(),
            Expr::Sizeof { .. } => false,
            _ => false,
        }
    }
}

// ============================================================================
//                              TOKEN STREAM
// ============================================================================

/// Kind of a token the backend cares about. The backend only consumes
/// comment trivia and line positions; everything else is `Code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Comment,
    Code,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

/// The tokenized source, borrowed read-only by the emitter for comment
/// preservation and line lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenStream {
    pub tokens: Vec<Token>,
}

impl TokenStream {
    pub fn empty() -> Self {
        TokenStream { tokens: Vec::new() }
    }

    /// Comment tokens on lines strictly before `line`, starting at token
    /// index `cursor`. Returns the comments and the advanced cursor.
    pub fn comments_before(&self, cursor: usize, line: usize) -> (Vec<&Token>, usize) {
        let mut found = Vec::new();
        let mut next = cursor;
        for (i, tok) in self.tokens.iter().enumerate().skip(cursor) {
            if tok.line >= line {
                break;
            }
            next = i + 1;
            if tok.kind == TokenKind::Comment {
                found.push(tok);
            }
        }
        (found, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_op_tokens() {
        assert_eq!(AssignOp::Set.c_token(), "=");
        assert_eq!(AssignOp::Add.c_token(), "+=");
        assert_eq!(AssignOp::Shl.c_token(), "<<=");
        assert!(!AssignOp::Set.is_compound());
        assert!(AssignOp::BitXor.is_compound());
    }

    #[test]
    fn test_binary_op_bool_layers() {
        assert!(BinaryOp::Or.yields_bool());
        assert!(BinaryOp::Le.yields_bool());
        assert!(!BinaryOp::Add.yields_bool());
        assert!(!BinaryOp::Shl.yields_bool());
    }

    #[test]
    fn test_contains_call_walks_nested_structure() {
        let call = Expr::Call {
            callee: Box::new(Expr::ident("f")),
            args: vec![],
            line: 1,
        };
        let wrapped = Expr::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(Expr::int("1")),
            rhs: Box::new(Expr::Paren(Box::new(call))),
        };
        assert!(wrapped.contains_call());
        assert!(!Expr::ident("x").contains_call());
    }

    #[test]
    fn test_comments_before_advances_cursor() {
        let stream = TokenStream {
            tokens: vec![
                Token {
                    kind: TokenKind::Comment,
                    text: "// setup".to_string(),
                    line: 1,
                },
                Token {
                    kind: TokenKind::Code,
                    text: "u8".to_string(),
                    line: 2,
                },
                Token {
                    kind: TokenKind::Comment,
                    text: "// later".to_string(),
                    line: 5,
                },
            ],
        };
        let (comments, cursor) = stream.comments_before(0, 3);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "// setup");
        let (comments, _) = stream.comments_before(cursor, 10);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "// later");
    }
}
