//! Step-capable execution engine.
//!
//! A tree-walking interpreter over the parsed block tree. Before every
//! statement it calls the observer's `on_statement`; when a frame exits it
//! calls `on_return`, and a propagating fault triggers `on_exception` on
//! each frame it unwinds through, just before that frame's return event.
//! The engine has no knowledge of timelines or loops-as-recorded; all of
//! that lives behind the observer seam.

use std::collections::BTreeMap;

use crate::errors::RuntimeFault;
use crate::lang::ast::{Block, Node, Program, StmtKind, Target};

pub mod expressions;
pub mod frame;
pub mod values;

#[cfg(test)]
mod tests;

pub use frame::{FrameData, FrameId, FrameProbe, MODULE_SCOPE, TRACED_MODULE};
pub use values::{Builtin, Value};

/// Callbacks invoked at execution boundaries.
pub trait Observer {
    fn on_statement(&mut self, frame: &mut dyn FrameProbe, line: usize);
    fn on_exception(&mut self, frame: &mut dyn FrameProbe, fault: &RuntimeFault);
    fn on_return(&mut self, frame: &mut dyn FrameProbe, line: usize, value: &Value);
}

/// Result of executing one statement or block.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct Engine {
    /// Hard ceiling on executed statements. Turns a non-terminating program
    /// into a fault instead of a hang; the recorder's own step budget
    /// detaches the observer long before this trips.
    pub max_steps: u64,
    /// Maximum user-call depth.
    pub max_depth: usize,
}

impl Default for Engine {
    fn default() -> Self {
        Engine {
            max_steps: 200_000,
            max_depth: 200,
        }
    }
}

impl Engine {
    /// Run a program to completion.
    ///
    /// Returns the final module bindings on success. A fault is reported to
    /// the observer (exception notifier, then the unwinding return events)
    /// before it is returned to the caller.
    pub fn run(
        &self,
        program: &Program,
        initial: BTreeMap<String, Value>,
        observer: Option<&mut dyn Observer>,
    ) -> Result<BTreeMap<String, Value>, RuntimeFault> {
        let mut run = Run {
            program,
            observer,
            steps: 0,
            max_steps: self.max_steps,
            depth: 0,
            max_depth: self.max_depth,
            next_frame: 2,
        };
        let mut module = FrameData::module(FrameId(1), initial);
        match run.exec_block(&program.body, &mut module, None) {
            Ok(Flow::Return(_)) => {
                let fault = RuntimeFault::new(
                    "SyntaxError",
                    "'return' outside function",
                    module.current_line,
                );
                run.notify_exception(&mut module, &fault);
                run.notify_return(&mut module, &Value::None);
                Err(fault)
            }
            Ok(_) => {
                run.notify_return(&mut module, &Value::None);
                Ok(module.bindings)
            }
            Err(fault) => {
                run.notify_exception(&mut module, &fault);
                run.notify_return(&mut module, &Value::None);
                Err(fault)
            }
        }
    }
}

/// One in-flight execution pass.
pub(crate) struct Run<'p, 'o> {
    pub(crate) program: &'p Program,
    observer: Option<&'o mut dyn Observer>,
    steps: u64,
    max_steps: u64,
    depth: usize,
    max_depth: usize,
    next_frame: u64,
}

impl<'p, 'o> Run<'p, 'o> {
    fn notify_statement(
        &mut self,
        frame: &mut FrameData,
        line: usize,
    ) -> Result<(), RuntimeFault> {
        frame.current_line = line;
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(RuntimeFault::new(
                "StepLimitError",
                "execution step limit exceeded",
                line,
            ));
        }
        if let Some(obs) = self.observer.as_deref_mut() {
            obs.on_statement(frame, line);
        }
        Ok(())
    }

    fn notify_exception(&mut self, frame: &mut FrameData, fault: &RuntimeFault) {
        if let Some(obs) = self.observer.as_deref_mut() {
            obs.on_exception(frame, fault);
        }
    }

    fn notify_return(&mut self, frame: &mut FrameData, value: &Value) {
        let line = frame.current_line;
        if let Some(obs) = self.observer.as_deref_mut() {
            obs.on_return(frame, line, value);
        }
    }

    fn exec_block(
        &mut self,
        block: &Block,
        frame: &mut FrameData,
        globals: Option<&FrameData>,
    ) -> Result<Flow, RuntimeFault> {
        for node in &block.nodes {
            match self.exec_node(node, frame, globals)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_node(
        &mut self,
        node: &Node,
        frame: &mut FrameData,
        globals: Option<&FrameData>,
    ) -> Result<Flow, RuntimeFault> {
        let program = self.program;
        match node {
            Node::Simple(line) => {
                self.notify_statement(frame, *line)?;
                self.exec_simple(*line, frame, globals)
            }
            Node::If { arms, orelse } => {
                for (line, body) in arms {
                    self.notify_statement(frame, *line)?;
                    let test = match &program.statement(*line).kind {
                        StmtKind::If { test } | StmtKind::Elif { test } => test,
                        other => unreachable!("if arm header is not a condition: {other:?}"),
                    };
                    if self.eval(test, frame, globals)?.is_truthy() {
                        return self.exec_block(body, frame, globals);
                    }
                }
                match orelse {
                    Some(body) => self.exec_block(body, frame, globals),
                    None => Ok(Flow::Normal),
                }
            }
            Node::While { line, body } => {
                let test = match &program.statement(*line).kind {
                    StmtKind::While { test } => test,
                    other => unreachable!("while header is not a while: {other:?}"),
                };
                loop {
                    self.notify_statement(frame, *line)?;
                    if !self.eval(test, frame, globals)?.is_truthy() {
                        break;
                    }
                    match self.exec_block(body, frame, globals)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Node::For { line, body } => {
                let (var, iter_expr) = match &program.statement(*line).kind {
                    StmtKind::For { var, iter } => (var, iter),
                    other => unreachable!("for header is not a for: {other:?}"),
                };
                self.notify_statement(frame, *line)?;
                let iterable = self.eval(iter_expr, frame, globals)?;
                let items = expressions::iterate(iterable, *line)?;
                let mut items = items.into_iter();
                loop {
                    match items.next() {
                        None => break,
                        Some(item) => {
                            frame.bindings.insert(var.clone(), item);
                            match self.exec_block(body, frame, globals)? {
                                Flow::Break => return Ok(Flow::Normal),
                                Flow::Return(v) => return Ok(Flow::Return(v)),
                                Flow::Normal | Flow::Continue => {}
                            }
                            // Loop-around (and final exhaustion) re-observes
                            // the header line, like a real stepper would.
                            self.notify_statement(frame, *line)?;
                        }
                    }
                }
                Ok(Flow::Normal)
            }
            Node::Def { line, func } => {
                self.notify_statement(frame, *line)?;
                frame
                    .bindings
                    .insert(func.name.clone(), Value::Function(func.clone()));
                Ok(Flow::Normal)
            }
        }
    }

    fn exec_simple(
        &mut self,
        line: usize,
        frame: &mut FrameData,
        globals: Option<&FrameData>,
    ) -> Result<Flow, RuntimeFault> {
        let program = self.program;
        match &program.statement(line).kind {
            StmtKind::Assign { target, value } => {
                let v = self.eval(value, frame, globals)?;
                match target {
                    Target::Name(name) => {
                        frame.bindings.insert(name.clone(), v);
                    }
                    Target::Subscript { base, index } => {
                        self.assign_subscript(base, index, v, frame, globals)?;
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::ExprStmt { expr } => {
                self.eval(expr, frame, globals)?;
                Ok(Flow::Normal)
            }
            StmtKind::Return { value } => {
                let v = match value {
                    Some(expr) => self.eval(expr, frame, globals)?,
                    None => Value::None,
                };
                Ok(Flow::Return(v))
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Pass | StmtKind::Blank => Ok(Flow::Normal),
            other => unreachable!("compound statement executed as simple: {other:?}"),
        }
    }

    /// Call a user-defined function in a fresh frame.
    pub(crate) fn call_function(
        &mut self,
        func: &std::rc::Rc<crate::lang::ast::FunctionDef>,
        args: Vec<Value>,
        globals: &FrameData,
        call_line: usize,
    ) -> Result<Value, RuntimeFault> {
        if args.len() != func.params.len() {
            return Err(RuntimeFault::new(
                "TypeError",
                format!(
                    "{}() takes {} arguments but {} were given",
                    func.name,
                    func.params.len(),
                    args.len()
                ),
                call_line,
            ));
        }
        if self.depth + 1 > self.max_depth {
            return Err(RuntimeFault::new(
                "RecursionError",
                "maximum call depth exceeded",
                call_line,
            ));
        }

        let bindings: BTreeMap<String, Value> =
            func.params.iter().cloned().zip(args).collect();
        let id = FrameId(self.next_frame);
        self.next_frame += 1;
        let mut callee = FrameData::function(id, &func.name, bindings);
        callee.current_line = func.line;

        self.depth += 1;
        let result = self.exec_block(&func.body, &mut callee, Some(globals));
        self.depth -= 1;

        match result {
            Ok(Flow::Return(v)) => {
                self.notify_return(&mut callee, &v);
                Ok(v)
            }
            Ok(_) => {
                self.notify_return(&mut callee, &Value::None);
                Ok(Value::None)
            }
            Err(fault) => {
                self.notify_exception(&mut callee, &fault);
                self.notify_return(&mut callee, &Value::None);
                Err(fault)
            }
        }
    }

    fn assign_subscript(
        &mut self,
        base: &crate::lang::ast::Expr,
        index: &crate::lang::ast::Expr,
        value: Value,
        frame: &mut FrameData,
        globals: Option<&FrameData>,
    ) -> Result<(), RuntimeFault> {
        let idx = self.eval(index, frame, globals)?;
        let (root, path) = self.collect_path(base, frame, globals)?;
        let line = frame.current_line;
        let mut slot = frame.bindings.get_mut(&root).ok_or_else(|| {
            RuntimeFault::new("NameError", format!("name '{root}' is not defined"), line)
        })?;
        for step in &path {
            slot = expressions::index_mut(slot, step, line)?;
        }
        expressions::set_item(slot, &idx, value, line)
    }

    /// Decompose a subscript chain into its root name and index values.
    pub(crate) fn collect_path(
        &mut self,
        expr: &crate::lang::ast::Expr,
        frame: &mut FrameData,
        globals: Option<&FrameData>,
    ) -> Result<(String, Vec<Value>), RuntimeFault> {
        use crate::lang::ast::Expr;
        match expr {
            Expr::Name(name) => Ok((name.clone(), Vec::new())),
            Expr::Index { base, index } => {
                let (root, mut path) = self.collect_path(base, frame, globals)?;
                path.push(self.eval(index, frame, globals)?);
                Ok((root, path))
            }
            _ => Err(RuntimeFault::new(
                "TypeError",
                "cannot assign through this expression",
                frame.current_line,
            )),
        }
    }
}
