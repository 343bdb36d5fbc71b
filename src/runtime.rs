use std::{
    collections::HashMap,
    fs,
    path::{Component, Path, PathBuf},
    rc::Rc,
};

use indexmap::IndexMap;

use crate::{
    ast::{BinaryOp, Block, Expr, ExprKind, Literal, Program, Stmt, StmtKind, UnaryOp},
    diagnostics::{BryonyError, Diagnostic, ErrorKind, Result},
    lexer::{Token, TokenKind},
    parser,
    rng::DeterministicRng,
    stdlib,
    value::{Event, ScriptFn, Value},
};

/// Stable handle into the runtime's module arena. Closures store one of
/// these instead of an owning reference, so mutually importing modules
/// never form an ownership cycle.
pub type ModuleId = usize;

/// One loaded module: its source file name and its mutable namespace,
/// pre-populated with the native bridge.
pub struct Namespace {
    pub file: Rc<str>,
    pub bindings: IndexMap<String, Value>,
}

/// Execution scope for one block of statements: a call-local mapping
/// checked first, with the owning module's namespace as fallback. At
/// module top level the "local" mapping *is* the module namespace.
struct Frame {
    locals: IndexMap<String, Value>,
    module: ModuleId,
    file: Rc<str>,
    module_level: bool,
}

/// Outcome of executing one statement, propagated explicitly instead of
/// through a host unwinding mechanism.
enum Flow {
    Proceed,
    Returned(Value),
    Broke,
    Continued,
}

// Each script call crosses several host frames (eval_expr, call_value,
// exec_block, exec_stmt), so the limit is sized against the 2 MiB stack
// of a spawned thread, not against what scripts might want.
const MAX_CALL_DEPTH: usize = 64;

/// The interpreter instance: module arena and path-keyed cache, the
/// seedable RNG, and the event sink. Single-threaded and fully
/// synchronous; one logical thread of execution per instance.
pub struct Runtime {
    root: PathBuf,
    debug: bool,
    modules: Vec<Namespace>,
    cache: HashMap<PathBuf, ModuleId>,
    rng: DeterministicRng,
    events: Vec<Event>,
    call_depth: usize,
}

impl Runtime {
    pub fn new(root: impl Into<PathBuf>, debug: bool) -> Self {
        Self {
            root: root.into(),
            debug,
            modules: Vec::new(),
            cache: HashMap::new(),
            rng: DeterministicRng::new(0),
            events: Vec::new(),
            call_depth: 0,
        }
    }

    /// Load a module by root-relative path, executing its top-level
    /// statements exactly once. Repeat loads of the same normalized path
    /// return the cached namespace without re-execution.
    pub fn load_module(&mut self, path: &str) -> Result<ModuleId> {
        let norm = normalize(&self.root.join(path));
        if let Some(&id) = self.cache.get(&norm) {
            return Ok(id);
        }
        let source = fs::read_to_string(&norm).map_err(|err| {
            Diagnostic::new(ErrorKind::Module, format!("Module not found: {path} ({err})"))
                .at(path, 1, 1)
        })?;
        let program = parser::parse_source(&source, path)?;
        let id = self.fresh_namespace(path);
        // Inserted before execution: a cyclic import observes whatever the
        // module has defined so far instead of recursing forever.
        self.cache.insert(norm, id);
        self.exec_program(&program, id)?;
        Ok(id)
    }

    /// A namespace with the native bridge but no backing file, for REPL
    /// and `eval` use.
    pub fn scratch_module(&mut self, name: &str) -> ModuleId {
        self.fresh_namespace(name)
    }

    /// Execute source text against an existing namespace, returning the
    /// value of the last top-level bare expression statement.
    pub fn eval_in(&mut self, module: ModuleId, source: &str, file: &str) -> Result<Value> {
        let program = parser::parse_source(source, file)?;
        self.exec_program(&program, module)
    }

    /// Invoke a named function in a namespace with positional arguments.
    pub fn call(&mut self, module: ModuleId, name: &str, args: Vec<Value>) -> Result<Value> {
        let file = self.modules[module].file.clone();
        let callee = self.lookup(module, name).ok_or_else(|| {
            Diagnostic::new(ErrorKind::Name, format!("Missing function '{name}'")).at(
                file.as_ref(),
                1,
                1,
            )
        })?;
        let token = Token {
            kind: TokenKind::Ident(name.to_string()),
            line: 1,
            col: 1,
        };
        self.call_value(callee, args, &token, &file)
    }

    /// Read a binding out of a namespace.
    pub fn lookup(&self, module: ModuleId, name: &str) -> Option<Value> {
        self.modules[module].bindings.get(name).cloned()
    }

    /// Take and clear the event sink.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn reseed(&mut self, seed: i64) {
        self.rng.seed(seed);
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    pub(crate) fn rng_mut(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }

    pub(crate) fn push_event(&mut self, event: Event) {
        self.events.push(event);
    }

    fn fresh_namespace(&mut self, file: &str) -> ModuleId {
        let mut bindings = IndexMap::new();
        stdlib::install(&mut bindings);
        self.modules.push(Namespace {
            file: Rc::from(file),
            bindings,
        });
        self.modules.len() - 1
    }

    // Statement execution.

    fn exec_program(&mut self, program: &Program, module: ModuleId) -> Result<Value> {
        let mut frame = Frame {
            locals: IndexMap::new(),
            module,
            file: self.modules[module].file.clone(),
            module_level: true,
        };
        let mut last = Value::Null;
        for stmt in &program.body {
            if let StmtKind::Expr(expr) = &stmt.kind {
                last = self.eval_expr(expr, &mut frame)?;
                continue;
            }
            match self.exec_stmt(stmt, &mut frame)? {
                Flow::Proceed => {}
                Flow::Returned(_) => {
                    return Err(self.err(
                        ErrorKind::Range,
                        "`return` outside function",
                        &frame.file,
                        &stmt.token,
                    ));
                }
                Flow::Broke => {
                    return Err(self.err(
                        ErrorKind::Range,
                        "`break` outside loop",
                        &frame.file,
                        &stmt.token,
                    ));
                }
                Flow::Continued => {
                    return Err(self.err(
                        ErrorKind::Range,
                        "`continue` outside loop",
                        &frame.file,
                        &stmt.token,
                    ));
                }
            }
        }
        Ok(last)
    }

    fn exec_block(&mut self, block: &Block, frame: &mut Frame) -> Result<Flow> {
        for stmt in &block.body {
            match self.exec_stmt(stmt, frame)? {
                Flow::Proceed => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Proceed)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, frame: &mut Frame) -> Result<Flow> {
        match &stmt.kind {
            StmtKind::Import(path) => {
                let imported = self.load_module(path)?;
                // First definition wins: the importing module's existing
                // bindings are never overwritten.
                let incoming: Vec<(String, Value)> = self.modules[imported]
                    .bindings
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let target = &mut self.modules[frame.module].bindings;
                for (name, value) in incoming {
                    if !target.contains_key(&name) {
                        target.insert(name, value);
                    }
                }
                Ok(Flow::Proceed)
            }
            StmtKind::Let { name, init } => {
                let value = self.eval_expr(init, frame)?;
                self.define(frame, name, value);
                Ok(Flow::Proceed)
            }
            StmtKind::Function { name, params, body } => {
                let function = ScriptFn {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                    module: frame.module,
                    file: frame.file.clone(),
                };
                self.define(frame, name, Value::Function(Rc::new(function)));
                Ok(Flow::Proceed)
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval_expr(value, frame)?;
                self.assign(target, value, frame)?;
                Ok(Flow::Proceed)
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                if self.eval_expr(cond, frame)?.is_truthy() {
                    self.exec_block(then_block, frame)
                } else if let Some(else_block) = else_block {
                    self.exec_block(else_block, frame)
                } else {
                    Ok(Flow::Proceed)
                }
            }
            StmtKind::While { cond, body } => {
                while self.eval_expr(cond, frame)?.is_truthy() {
                    match self.exec_block(body, frame)? {
                        Flow::Proceed | Flow::Continued => {}
                        Flow::Broke => break,
                        Flow::Returned(value) => return Ok(Flow::Returned(value)),
                    }
                }
                Ok(Flow::Proceed)
            }
            StmtKind::ForRange {
                name,
                start,
                end,
                body,
            } => {
                let start_value = self.eval_expr(start, frame)?;
                let end_value = self.eval_expr(end, frame)?;
                let (Some(a), Some(b)) = (start_value.as_number(), end_value.as_number()) else {
                    return Err(self.err(
                        ErrorKind::Type,
                        "range(a,b) requires numbers",
                        &frame.file,
                        &stmt.token,
                    ));
                };
                for i in (a as i64)..(b as i64) {
                    self.define(frame, name, Value::Int(i));
                    match self.exec_block(body, frame)? {
                        Flow::Proceed | Flow::Continued => {}
                        Flow::Broke => break,
                        Flow::Returned(value) => return Ok(Flow::Returned(value)),
                    }
                }
                Ok(Flow::Proceed)
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval_expr(expr, frame)?,
                    None => Value::Null,
                };
                Ok(Flow::Returned(value))
            }
            StmtKind::Break => Ok(Flow::Broke),
            StmtKind::Continue => Ok(Flow::Continued),
            StmtKind::Expr(expr) => {
                self.eval_expr(expr, frame)?;
                Ok(Flow::Proceed)
            }
            StmtKind::Empty => Ok(Flow::Proceed),
        }
    }

    // Name binding.

    fn define(&mut self, frame: &mut Frame, name: &str, value: Value) {
        if frame.module_level {
            self.modules[frame.module]
                .bindings
                .insert(name.to_string(), value);
        } else {
            frame.locals.insert(name.to_string(), value);
        }
    }

    fn lookup_var(&self, frame: &Frame, name: &str) -> Option<Value> {
        if !frame.module_level {
            if let Some(value) = frame.locals.get(name) {
                return Some(value.clone());
            }
        }
        self.modules[frame.module].bindings.get(name).cloned()
    }

    fn assign(&mut self, target: &Expr, value: Value, frame: &mut Frame) -> Result<()> {
        match &target.kind {
            ExprKind::Var(name) => {
                if frame.module_level {
                    self.modules[frame.module]
                        .bindings
                        .insert(name.clone(), value);
                } else if frame.locals.contains_key(name) {
                    frame.locals.insert(name.clone(), value);
                } else if self.modules[frame.module].bindings.contains_key(name) {
                    self.modules[frame.module]
                        .bindings
                        .insert(name.clone(), value);
                } else {
                    frame.locals.insert(name.clone(), value);
                }
                Ok(())
            }
            ExprKind::Index { obj, key } => {
                let obj_value = self.eval_expr(obj, frame)?;
                let key_value = self.eval_expr(key, frame)?;
                match obj_value {
                    Value::List(items) => {
                        let Some(idx) = key_value.as_number() else {
                            return Err(self.err(
                                ErrorKind::Type,
                                "List index must be number",
                                &frame.file,
                                &target.token,
                            ));
                        };
                        let idx = idx as i64;
                        let mut items = items.borrow_mut();
                        // Reads past the end yield null, but writes past the
                        // end are errors.
                        if idx < 0 || idx as usize >= items.len() {
                            return Err(self.err(
                                ErrorKind::Range,
                                "List index out of range",
                                &frame.file,
                                &target.token,
                            ));
                        }
                        items[idx as usize] = value;
                        Ok(())
                    }
                    Value::Map(entries) => {
                        let Value::Str(key) = key_value else {
                            return Err(self.err(
                                ErrorKind::Type,
                                "Map keys must be strings",
                                &frame.file,
                                &target.token,
                            ));
                        };
                        entries.borrow_mut().insert(key.to_string(), value);
                        Ok(())
                    }
                    _ => Err(self.err(
                        ErrorKind::Type,
                        "Index assignment target must be list or map",
                        &frame.file,
                        &target.token,
                    )),
                }
            }
            _ => Err(self.err(
                ErrorKind::Type,
                "Invalid assignment target",
                &frame.file,
                &target.token,
            )),
        }
    }

    // Expression evaluation.

    fn eval_expr(&mut self, expr: &Expr, frame: &mut Frame) -> Result<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal_value(lit)),
            ExprKind::Var(name) => self.lookup_var(frame, name).ok_or_else(|| {
                self.err(
                    ErrorKind::Name,
                    format!("Undefined variable '{name}'"),
                    &frame.file,
                    &expr.token,
                )
            }),
            ExprKind::ListLiteral(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, frame)?);
                }
                Ok(Value::list(values))
            }
            ExprKind::MapLiteral(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, value_expr) in entries {
                    let value = self.eval_expr(value_expr, frame)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::map(map))
            }
            ExprKind::Index { obj, key } => {
                let obj_value = self.eval_expr(obj, frame)?;
                let key_value = self.eval_expr(key, frame)?;
                self.index_read(obj_value, key_value, &frame.file, &expr.token)
            }
            ExprKind::Unary { op, expr: inner } => {
                let value = self.eval_expr(inner, frame)?;
                match op {
                    UnaryOp::Neg => match value {
                        Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
                        Value::Float(f) => Ok(Value::Float(-f)),
                        _ => Err(self.err(
                            ErrorKind::Type,
                            "Unary - requires number",
                            &frame.file,
                            &expr.token,
                        )),
                    },
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                }
            }
            ExprKind::Binary { op, left, right } => {
                // `and`/`or` short-circuit and return the operand itself,
                // not a coerced boolean.
                match op {
                    BinaryOp::And => {
                        let lhs = self.eval_expr(left, frame)?;
                        if lhs.is_truthy() {
                            self.eval_expr(right, frame)
                        } else {
                            Ok(lhs)
                        }
                    }
                    BinaryOp::Or => {
                        let lhs = self.eval_expr(left, frame)?;
                        if lhs.is_truthy() {
                            Ok(lhs)
                        } else {
                            self.eval_expr(right, frame)
                        }
                    }
                    _ => {
                        let lhs = self.eval_expr(left, frame)?;
                        let rhs = self.eval_expr(right, frame)?;
                        self.binary(*op, lhs, rhs, &frame.file, &expr.token)
                    }
                }
            }
            ExprKind::Call { callee, args } => {
                let callee_value = self.eval_expr(callee, frame)?;
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.eval_expr(arg, frame)?);
                }
                let file = frame.file.clone();
                self.call_value(callee_value, arg_values, &expr.token, &file)
            }
        }
    }

    fn index_read(
        &self,
        obj: Value,
        key: Value,
        file: &Rc<str>,
        token: &Token,
    ) -> Result<Value> {
        match obj {
            Value::List(items) => {
                let Some(idx) = key.as_number() else {
                    return Err(self.err(
                        ErrorKind::Type,
                        "List index must be number",
                        file,
                        token,
                    ));
                };
                let idx = idx as i64;
                let items = items.borrow();
                if idx < 0 || idx as usize >= items.len() {
                    return Ok(Value::Null);
                }
                Ok(items[idx as usize].clone())
            }
            Value::Map(entries) => {
                let Value::Str(key) = key else {
                    return Err(self.err(ErrorKind::Type, "Map keys must be strings", file, token));
                };
                Ok(entries
                    .borrow()
                    .get(key.as_ref())
                    .cloned()
                    .unwrap_or(Value::Null))
            }
            _ => Err(self.err(
                ErrorKind::Type,
                "Indexing requires list or map",
                file,
                token,
            )),
        }
    }

    fn binary(
        &self,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        file: &Rc<str>,
        token: &Token,
    ) -> Result<Value> {
        use BinaryOp::*;
        match op {
            Add | Sub | Mul | Div | Mod => {
                if op == Add && (matches!(lhs, Value::Str(_)) || matches!(rhs, Value::Str(_))) {
                    return Ok(Value::string(format!("{lhs}{rhs}")));
                }
                self.numeric(op, lhs, rhs, file, token)
            }
            Eq => Ok(Value::Bool(lhs.equals(&rhs))),
            Ne => Ok(Value::Bool(!lhs.equals(&rhs))),
            Lt | Gt | Le | Ge => self.compare(op, lhs, rhs, file, token),
            And | Or => unreachable!("short-circuit operators handled by eval_expr"),
        }
    }

    fn numeric(
        &self,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        file: &Rc<str>,
        token: &Token,
    ) -> Result<Value> {
        use BinaryOp::*;
        if op == Mod {
            let (Value::Int(a), Value::Int(b)) = (&lhs, &rhs) else {
                return Err(self.err(ErrorKind::Type, "% requires ints", file, token));
            };
            if *b == 0 {
                return Err(self.err(ErrorKind::Range, "Modulo by zero", file, token));
            }
            return Ok(Value::Int(floored_rem(*a, *b)));
        }
        match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => match op {
                Add => Ok(Value::Int(a.wrapping_add(*b))),
                Sub => Ok(Value::Int(a.wrapping_sub(*b))),
                Mul => Ok(Value::Int(a.wrapping_mul(*b))),
                Div => {
                    if *b == 0 {
                        Err(self.err(ErrorKind::Range, "Division by zero", file, token))
                    } else {
                        // Division is true division regardless of operand
                        // types.
                        Ok(Value::Float(*a as f64 / *b as f64))
                    }
                }
                _ => unreachable!(),
            },
            _ => {
                let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) else {
                    return Err(self.err(
                        ErrorKind::Type,
                        format!("Operator {} requires numbers", op_symbol(op)),
                        file,
                        token,
                    ));
                };
                match op {
                    Add => Ok(Value::Float(a + b)),
                    Sub => Ok(Value::Float(a - b)),
                    Mul => Ok(Value::Float(a * b)),
                    Div => {
                        if b == 0.0 {
                            Err(self.err(ErrorKind::Range, "Division by zero", file, token))
                        } else {
                            Ok(Value::Float(a / b))
                        }
                    }
                    _ => unreachable!(),
                }
            }
        }
    }

    fn compare(
        &self,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        file: &Rc<str>,
        token: &Token,
    ) -> Result<Value> {
        use std::cmp::Ordering;
        let ordering = match (&lhs, &rhs) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => match (lhs.as_number(), rhs.as_number()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => {
                    return Err(self.err(
                        ErrorKind::Type,
                        format!("Compare {} requires comparable types", op_symbol(op)),
                        file,
                        token,
                    ));
                }
            },
        };
        let result = match (op, ordering) {
            (BinaryOp::Lt, Some(Ordering::Less)) => true,
            (BinaryOp::Gt, Some(Ordering::Greater)) => true,
            (BinaryOp::Le, Some(Ordering::Less | Ordering::Equal)) => true,
            (BinaryOp::Ge, Some(Ordering::Greater | Ordering::Equal)) => true,
            _ => false,
        };
        Ok(Value::Bool(result))
    }

    // Call dispatch.

    fn call_value(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        token: &Token,
        file: &Rc<str>,
    ) -> Result<Value> {
        match &callee {
            Value::Native(fun) => {
                fun.check_arity(&args).map_err(|err| {
                    BryonyError::from(
                        Diagnostic::new(err.kind, err.message).at(
                            file.as_ref(),
                            token.line,
                            token.col,
                        ),
                    )
                })?;
                (fun.callback)(self, &args).map_err(|err| {
                    BryonyError::from(
                        Diagnostic::new(err.kind, format!("Native error in {}: {}", fun.name, err.message))
                            .at(file.as_ref(), token.line, token.col),
                    )
                })
            }
            Value::Function(fun) => {
                if args.len() != fun.params.len() {
                    return Err(self.err(
                        ErrorKind::Range,
                        format!("{} expects {} args, got {}", fun.name, fun.params.len(), args.len()),
                        file,
                        token,
                    ));
                }
                if self.call_depth >= MAX_CALL_DEPTH {
                    return Err(self.err(
                        ErrorKind::Range,
                        "Recursion depth limit exceeded",
                        file,
                        token,
                    ));
                }
                let mut locals = IndexMap::with_capacity(fun.params.len());
                for (param, arg) in fun.params.iter().zip(args) {
                    locals.insert(param.clone(), arg);
                }
                // The function body runs against its defining module's
                // namespace, never the caller's locals.
                let mut frame = Frame {
                    locals,
                    module: fun.module,
                    file: fun.file.clone(),
                    module_level: false,
                };
                self.call_depth += 1;
                let flow = self.exec_block(&fun.body, &mut frame);
                self.call_depth -= 1;
                match flow? {
                    Flow::Returned(value) => Ok(value),
                    Flow::Proceed => Ok(Value::Null),
                    Flow::Broke | Flow::Continued => Err(self.err(
                        ErrorKind::Range,
                        "Loop control flow escaped function body",
                        file,
                        token,
                    )),
                }
            }
            _ => Err(self.err(
                ErrorKind::Type,
                "Attempted to call non-function",
                file,
                token,
            )),
        }
    }

    fn err(
        &self,
        kind: ErrorKind,
        message: impl Into<String>,
        file: &Rc<str>,
        token: &Token,
    ) -> BryonyError {
        BryonyError::from(
            Diagnostic::new(kind, message).at(file.as_ref(), token.line, token.col),
        )
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(f) => Value::Float(*f),
        Literal::Str(s) => Value::string(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

fn op_symbol(op: BinaryOp) -> &'static str {
    use BinaryOp::*;
    match op {
        Add => "+",
        Sub => "-",
        Mul => "*",
        Div => "/",
        Mod => "%",
        Eq => "==",
        Ne => "!=",
        Lt => "<",
        Gt => ">",
        Le => "<=",
        Ge => ">=",
        And => "and",
        Or => "or",
    }
}

/// Floored modulo: the result takes the sign of the divisor, so
/// `-7 % 2 == 1`.
fn floored_rem(a: i64, b: i64) -> i64 {
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        r + b
    } else {
        r
    }
}

/// Lexical path normalization relative to a fixed root; `.` segments drop
/// and `..` pops, without touching the filesystem. Cache keys come from
/// here so `a/./b.bry` and `a/b.bry` share one entry.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}
