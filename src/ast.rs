use crate::lexer::Token;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// An expression node. The token is the one that introduced the node and is
/// used only for diagnostics, never for re-lexing.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub token: Token,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Literal),
    Var(String),
    Index {
        obj: Box<Expr>,
        key: Box<Expr>,
    },
    ListLiteral(Vec<Expr>),
    /// Map literal with string keys only.
    MapLiteral(Vec<(String, Expr)>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub token: Token,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Import(String),
    Let {
        name: String,
        init: Expr,
    },
    /// Target is a variable or an index expression; anything else is
    /// rejected at parse time.
    Assign {
        target: Expr,
        value: Expr,
    },
    Function {
        name: String,
        params: Vec<String>,
        body: Block,
    },
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    /// `for <name> in range(start, end)` — end exclusive.
    ForRange {
        name: String,
        start: Expr,
        end: Expr,
        body: Block,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    Expr(Expr),
    /// A stray `;`.
    Empty,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub body: Vec<Stmt>,
    pub token: Token,
}

#[derive(Debug, Clone)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub token: Token,
}
