//! Control statement translation (`if`, `while`, `for`, `break`).
//!
//! Adds `impl Translator` methods. Each construct appends its blocks to the
//! function being translated and leaves the insert point on the block that
//! follows it, so an `if` or a loop never terminates the enclosing block
//! itself even when every branch inside it does.
//!
//! Loop exits are recorded in `loop_exits` under the [`LoopId`] the parser
//! assigned, which is how `break` finds its target.

use log::trace;

use crate::codegen::constants::{
    BLOCK_AFTER, BLOCK_COND, BLOCK_ELSE, BLOCK_LOOP, BLOCK_MERGE, BLOCK_THEN,
};
use crate::codegen::errors::SemanticError;
use crate::codegen::translate::{Terminated, Translator};
use crate::ir::{BinaryOp, IntPredicate, IrBuilder, Value};
use crate::parser::ast::{Assignment, Expr, Loop, LoopId, LoopKind, SourceLocation, Statm};

impl<B: IrBuilder> Translator<'_, B> {
    /// Condition as an `i1`: anything other than false is taken.
    ///
    /// The operand may be an `i32` while the constant is an `i1`, so the
    /// compare is mixed-width; a typed backend has to widen the constant first.
    fn translate_condition(&mut self, condition: &Expr) -> Result<Value, SemanticError> {
        let value = self.translate_expr(condition)?;
        let false_value = self.builder.const_bool(false);
        Ok(self.builder.compare(IntPredicate::Ne, value, false_value))
    }

    pub(crate) fn translate_if(
        &mut self,
        condition: &Expr,
        then_branch: &Statm,
        else_branch: Option<&Statm>,
        location: SourceLocation,
    ) -> Result<Option<Terminated>, SemanticError> {
        let func = self.current_function("if", location)?;
        let cond = self.translate_condition(condition)?;

        let then_block = self.builder.append_block(func, BLOCK_THEN);
        let else_block = self.builder.append_block(func, BLOCK_ELSE);
        let merge_block = self.builder.append_block(func, BLOCK_MERGE);
        self.builder.cond_br(cond, then_block, else_block);

        self.builder.set_insert_point(then_block);
        if self.translate_statement(then_branch)?.is_none() {
            self.builder.br(merge_block);
        }

        self.builder.set_insert_point(else_block);
        let else_terminated = match else_branch {
            Some(statement) => self.translate_statement(statement)?,
            None => None,
        };
        if else_terminated.is_none() {
            self.builder.br(merge_block);
        }

        self.builder.set_insert_point(merge_block);
        Ok(None)
    }

    pub(crate) fn translate_loop(&mut self, lp: &Loop) -> Result<Option<Terminated>, SemanticError> {
        trace!("loop {:?}", lp.id);
        match &lp.kind {
            LoopKind::While { condition } => self.translate_while(lp, condition),
            LoopKind::For {
                init,
                downto,
                limit,
            } => self.translate_for(lp, init, *downto, limit),
        }
    }

    fn translate_while(
        &mut self,
        lp: &Loop,
        condition: &Expr,
    ) -> Result<Option<Terminated>, SemanticError> {
        let func = self.current_function("while", lp.location)?;
        let cond_block = self.builder.append_block(func, BLOCK_COND);
        let loop_block = self.builder.append_block(func, BLOCK_LOOP);
        let after_block = self.builder.append_block(func, BLOCK_AFTER);
        self.builder.br(cond_block);

        self.builder.set_insert_point(cond_block);
        let cond = self.translate_condition(condition)?;
        self.builder.cond_br(cond, loop_block, after_block);
        self.loop_exits.insert(lp.id, after_block);

        self.builder.set_insert_point(loop_block);
        if self.translate_statement(&lp.body)?.is_none() {
            self.builder.br(cond_block);
        }

        self.builder.set_insert_point(after_block);
        Ok(None)
    }

    /// `for v := a to b do s` runs `s` for `v = a, a+1, ..., b`; the limit is
    /// re-evaluated on every iteration.
    fn translate_for(
        &mut self,
        lp: &Loop,
        init: &Assignment,
        downto: bool,
        limit: &Expr,
    ) -> Result<Option<Terminated>, SemanticError> {
        let func = self.current_function("for", lp.location)?;
        self.translate_assign(init)?;

        let cond_block = self.builder.append_block(func, BLOCK_COND);
        let loop_block = self.builder.append_block(func, BLOCK_LOOP);
        let after_block = self.builder.append_block(func, BLOCK_AFTER);
        self.builder.br(cond_block);

        self.builder.set_insert_point(cond_block);
        let limit = self.translate_expr(limit)?;
        let current = self.translate_expr(&init.target)?;
        let pred = if downto {
            IntPredicate::Sge
        } else {
            IntPredicate::Sle
        };
        let cond = self.builder.compare(pred, current, limit);
        self.builder.cond_br(cond, loop_block, after_block);
        self.loop_exits.insert(lp.id, after_block);

        self.builder.set_insert_point(loop_block);
        if self.translate_statement(&lp.body)?.is_none() {
            let ptr = self.pointer(&init.target)?;
            let current = self.translate_expr(&init.target)?;
            let one = self.builder.const_int(1);
            let op = if downto { BinaryOp::Sub } else { BinaryOp::Add };
            let next = self.builder.binary(op, current, one);
            self.builder.store(next, ptr);
            self.builder.br(cond_block);
        }

        self.builder.set_insert_point(after_block);
        Ok(None)
    }

    pub(crate) fn translate_break(
        &mut self,
        target: LoopId,
        location: SourceLocation,
    ) -> Result<Option<Terminated>, SemanticError> {
        let exit = self
            .loop_exits
            .get(&target)
            .copied()
            .ok_or(SemanticError::BreakOutsideLoop { location })?;
        self.builder.br(exit);
        Ok(Some(Terminated::Break))
    }
}
