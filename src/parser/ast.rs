// AST (Abstract Syntax Tree) definitions for the Mila compiler

/// Source location information for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Identifies a `while`/`for` loop so that `break` can refer back to it
/// without owning it. Assigned by the parser in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopId(pub usize);

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Relational
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    // Boolean
    And,
    Or,
}

impl BinOp {
    /// Source spelling of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "div",
            BinOp::Mod => "mod",
            BinOp::Eq => "=",
            BinOp::Ne => "<>",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }
}

/// A call, usable both as an expression and as a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub name: String,
    pub args: Vec<Expr>,
    pub location: SourceLocation,
}

/// Expression nodes
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Var(String, SourceLocation),
    Numb(i32, SourceLocation),
    /// Literal text, only produced as the argument of `write`
    String(String, SourceLocation),
    Bop {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        location: SourceLocation,
    },
    UnMinus(Box<Expr>, SourceLocation),
    Not(Box<Expr>, SourceLocation),
    ArrayElement {
        name: String,
        index: Box<Expr>,
        location: SourceLocation,
    },
    Call(CallExpr),
}

impl Expr {
    /// Get the source location of this node
    pub fn location(&self) -> SourceLocation {
        match self {
            Expr::Var(_, loc)
            | Expr::Numb(_, loc)
            | Expr::String(_, loc)
            | Expr::UnMinus(_, loc)
            | Expr::Not(_, loc) => *loc,
            Expr::Bop { location, .. } | Expr::ArrayElement { location, .. } => *location,
            Expr::Call(call) => call.location,
        }
    }

    /// Name of the storage this expression designates, if it is assignable.
    pub fn assignable_name(&self) -> Option<&str> {
        match self {
            Expr::Var(name, _) | Expr::ArrayElement { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Type annotation as written in the source. Array bounds stay unevaluated
/// until translation, where they must fold to constants.
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    Integer,
    Array { from: Box<Expr>, to: Box<Expr> },
}

/// `var a, b: T`: several identifiers sharing one type annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub idents: Vec<String>,
    pub data_type: DataType,
    pub location: SourceLocation,
}

/// `function`/`procedure` declaration. A missing body marks a forward
/// declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct CallableDecl {
    pub name: String,
    pub params: Vec<VarDecl>,
    /// `None` for procedures
    pub return_type: Option<DataType>,
    /// Declarations followed by action statements
    pub body: Option<Vec<Statm>>,
    pub location: SourceLocation,
}

impl CallableDecl {
    pub fn param_idents(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .flat_map(|decl| decl.idents.iter().map(String::as_str))
    }

    pub fn param_count(&self) -> usize {
        self.params.iter().map(|decl| decl.idents.len()).sum()
    }

    pub fn is_forward(&self) -> bool {
        self.body.is_none()
    }
}

/// `target := value`, where the target is a variable or an array element
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: Expr,
    pub value: Expr,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopKind {
    While {
        condition: Expr,
    },
    For {
        init: Assignment,
        downto: bool,
        limit: Expr,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    pub id: LoopId,
    pub kind: LoopKind,
    pub body: Box<Statm>,
    pub location: SourceLocation,
}

/// Statement nodes
#[derive(Debug, Clone, PartialEq)]
pub enum Statm {
    Decl(VarDecl),
    DeclConst {
        name: String,
        value: Expr,
        location: SourceLocation,
    },
    DeclCallable(CallableDecl),
    Call(CallExpr),
    Assign(Assignment),
    /// Executed head to tail
    List(Vec<Statm>),
    If {
        condition: Expr,
        then_branch: Box<Statm>,
        else_branch: Option<Box<Statm>>,
        location: SourceLocation,
    },
    Loop(Loop),
    Break {
        target: LoopId,
        location: SourceLocation,
    },
    /// `program name;` header, no effect on translation
    Program(String),
}

impl Statm {
    pub fn is_declaration(&self) -> bool {
        matches!(
            self,
            Statm::Decl(_) | Statm::DeclConst { .. } | Statm::DeclCallable(_) | Statm::Program(_)
        )
    }
}

/// A whole compiled source: global declarations and callables, followed by
/// the synthesized `main` callable holding the main body's statements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Unit {
    pub statements: Vec<Statm>,
}

impl Unit {
    pub fn new() -> Self {
        Unit::default()
    }
}
