//! Statement lowering and CFG construction
//!
//! Each construct opens and closes basic blocks following a fixed template;
//! break and continue targets are saved and restored around loops and
//! switches. Blocks that must exist as branch targets before their code is
//! emitted (loop exits, for-updates) are reserved early and appended to the
//! layout late, keeping the printed order close to source order.

use super::env::{ExprContext, GotoFixup, GotoLabel, SwitchCase, Term};
use super::IrGen;
use crate::ast::{BlockItem, Expr, ForInit, Statement, StatementKind};
use crate::ir::{CastOp, IrCmp, Value};
use crate::types::CType;
use occ_common::{CompilerError, SourceSpan};

impl IrGen<'_> {
    pub fn gen_statement(&mut self, statement: &Statement) -> Result<(), CompilerError> {
        let span = &statement.span;
        match &statement.kind {
            StatementKind::Empty => Ok(()),

            StatementKind::Compound(items) => {
                self.env.push_scope();
                for item in items {
                    match item {
                        BlockItem::Decl(decl) => self.add_decl_to_scope(decl)?,
                        BlockItem::Statement(statement) => self.gen_statement(statement)?,
                    }
                }
                self.env.pop_scope();
                Ok(())
            }

            StatementKind::Expr(expr) => {
                self.gen_expr(expr, ExprContext::Rvalue)?;
                Ok(())
            }

            StatementKind::Return(expr) => self.gen_return(expr.as_ref(), span),

            StatementKind::If {
                condition,
                then_statement,
                else_statement,
            } => {
                let condition_term = self.gen_condition(condition)?;

                let before_block = self.builder.current_block;

                let then_block = self.builder.add_block("if.then")?;
                self.builder.set_current_block(then_block);
                self.gen_statement(then_statement)?;
                let then_resultant_block = self.builder.current_block;

                let mut else_entry = None;
                let mut else_resultant_block = None;
                if let Some(else_statement) = else_statement {
                    let else_block = self.builder.add_block("if.else")?;
                    self.builder.set_current_block(else_block);
                    self.gen_statement(else_statement)?;
                    else_entry = Some(else_block);
                    else_resultant_block = Some(self.builder.current_block);
                }

                let after_block = self.builder.add_block("if.after")?;

                self.builder.set_current_block(before_block);
                self.builder.build_cond(
                    condition_term.value,
                    then_block,
                    else_entry.unwrap_or(after_block),
                )?;

                self.builder.set_current_block(then_resultant_block);
                self.builder.build_branch(after_block)?;
                if let Some(else_resultant) = else_resultant_block {
                    self.builder.set_current_block(else_resultant);
                    self.builder.build_branch(after_block)?;
                }

                self.builder.set_current_block(after_block);
                Ok(())
            }

            StatementKind::While { condition, body } => {
                let pre_header = self.builder.add_block("while.ph")?;
                // Reserved now so it exists as the break target, appended
                // after the body for better block layout
                let after = self.builder.reserve_block("while.after")?;

                self.builder.build_branch(pre_header)?;
                self.builder.set_current_block(pre_header);
                let condition_term = self.gen_condition(condition)?;

                let body_block = self.builder.add_block("while.body")?;
                self.builder
                    .build_cond(condition_term.value, body_block, after)?;

                let prev_break = self.env.break_target.replace(after);
                let prev_continue = self.env.continue_target.replace(pre_header);
                self.builder.set_current_block(body_block);
                self.gen_statement(body)?;
                self.builder.build_branch(pre_header)?;
                self.env.break_target = prev_break;
                self.env.continue_target = prev_continue;

                self.builder.append_block(after)?;
                self.builder.set_current_block(after);
                Ok(())
            }

            StatementKind::DoWhile { body, condition } => {
                let pre_header = self.builder.add_block("do_while.ph")?;
                let body_block = self.builder.add_block("do_while.body")?;
                let after = self.builder.add_block("do_while.after")?;

                self.builder.build_branch(body_block)?;
                self.builder.set_current_block(pre_header);
                let condition_term = self.gen_condition(condition)?;
                self.builder
                    .build_cond(condition_term.value, body_block, after)?;

                let prev_break = self.env.break_target.replace(after);
                let prev_continue = self.env.continue_target.replace(pre_header);
                self.builder.set_current_block(body_block);
                self.gen_statement(body)?;
                self.builder.build_branch(pre_header)?;
                self.env.break_target = prev_break;
                self.env.continue_target = prev_continue;

                self.builder.set_current_block(after);
                Ok(())
            }

            StatementKind::For {
                init,
                condition,
                update,
                body,
            } => {
                let pre_header = self.builder.add_block("for.ph")?;
                let body_block = self.builder.add_block("for.body")?;
                // Reserved now so they exist as break/continue targets,
                // appended after the body for better block layout
                let update_block = self.builder.reserve_block("for.update")?;
                let after = self.builder.reserve_block("for.after")?;

                // A declaration in the init clause scopes through the for
                let mut has_init_scope = false;
                match init {
                    ForInit::Decl(decl) => {
                        self.env.push_scope();
                        has_init_scope = true;
                        self.add_decl_to_scope(decl)?;
                    }
                    ForInit::Expr(Some(expr)) => {
                        self.gen_expr(expr, ExprContext::Rvalue)?;
                    }
                    ForInit::Expr(None) => {}
                }

                self.builder.build_branch(pre_header)?;
                self.builder.set_current_block(pre_header);
                let condition_term = match condition {
                    Some(expr) => self.gen_condition(expr)?,
                    None => {
                        // An absent condition is the constant 1
                        let int_type = self.env.types.int_type;
                        let int_ir = self.env.types.c_type_to_ir(int_type)?;
                        Term {
                            ctype: int_type,
                            value: Value::const_int(int_ir, 1),
                        }
                    }
                };
                self.builder
                    .build_cond(condition_term.value, body_block, after)?;

                self.builder.set_current_block(body_block);
                let prev_break = self.env.break_target.replace(after);
                let prev_continue = self.env.continue_target.replace(update_block);
                self.gen_statement(body)?;
                self.builder.build_branch(update_block)?;

                self.builder.append_block(update_block)?;
                self.builder.set_current_block(update_block);
                self.env.break_target = prev_break;
                self.env.continue_target = prev_continue;

                if let Some(update_expr) = update {
                    self.gen_expr(update_expr, ExprContext::Rvalue)?;
                }
                self.builder.build_branch(pre_header)?;

                if has_init_scope {
                    self.env.pop_scope();
                }
                self.builder.append_block(after)?;
                self.builder.set_current_block(after);
                Ok(())
            }

            StatementKind::Switch { value, body } => self.gen_switch(value, body, span),

            StatementKind::Case { value, body } => {
                if self.env.case_labels.is_none() {
                    return Err(CompilerError::semantic(
                        "case label outside a switch statement",
                        span.clone(),
                    ));
                }
                let case_block = self.builder.add_block("switch.case")?;
                self.builder.build_branch(case_block)?;
                self.builder.set_current_block(case_block);

                self.gen_statement(body)?;

                let case_value = self.eval_constant_int(value)?;
                self.env
                    .case_labels
                    .as_mut()
                    .expect("checked above")
                    .push(SwitchCase {
                        is_default: false,
                        value: Some(case_value),
                        block: case_block,
                    });
                Ok(())
            }

            StatementKind::Labeled { label, body } => {
                let label_block = self.builder.add_block(label)?;
                self.builder.build_branch(label_block)?;
                self.builder.set_current_block(label_block);

                // The grammar parses `default:` like any other label
                if label == "default" {
                    let cases = self.env.case_labels.as_mut().ok_or_else(|| {
                        CompilerError::semantic(
                            "default label outside a switch statement",
                            span.clone(),
                        )
                    })?;
                    cases.push(SwitchCase {
                        is_default: true,
                        value: None,
                        block: label_block,
                    });
                } else {
                    if self.env.goto_labels.iter().any(|l| &l.name == label) {
                        return Err(CompilerError::semantic(
                            format!("duplicate label '{}'", label),
                            span.clone(),
                        ));
                    }
                    self.env.goto_labels.push(GotoLabel {
                        name: label.clone(),
                        block: label_block,
                    });
                }

                self.gen_statement(body)
            }

            StatementKind::Goto(label) => {
                if let Some(instr) = self.builder.build_open_branch()? {
                    self.env.goto_fixups.push(GotoFixup {
                        label: label.clone(),
                        instr,
                        span: span.clone(),
                    });
                }
                // The current block must still end in a terminator
                let after = self.builder.add_block("goto.after")?;
                self.builder.set_current_block(after);
                Ok(())
            }

            StatementKind::Break => match self.env.break_target {
                Some(target) => self.builder.build_branch(target),
                None => Err(CompilerError::semantic(
                    "break outside a loop or switch",
                    span.clone(),
                )),
            },

            StatementKind::Continue => match self.env.continue_target {
                Some(target) => self.builder.build_branch(target),
                None => Err(CompilerError::semantic(
                    "continue outside a loop",
                    span.clone(),
                )),
            },
        }
    }

    /// Lower a controlling expression to an integer term; pointer
    /// conditions are cast to a pointer-sized integer first
    fn gen_condition(&mut self, condition: &Expr) -> Result<Term, CompilerError> {
        let mut term = self.gen_expr(condition, ExprContext::Rvalue)?;
        if self.env.types.is_pointer(term.ctype) {
            let int_ptr_type = self.env.types.int_ptr_type;
            let int_ptr_ir = self.env.types.c_type_to_ir(int_ptr_type)?;
            term.value = self.builder.build_cast(CastOp::Cast, term.value, int_ptr_ir)?;
            term.ctype = int_ptr_type;
        }
        if !self.env.types.is_integer(term.ctype) {
            return Err(CompilerError::unimplemented(
                "non-scalar controlling expression",
                condition.span.clone(),
            ));
        }
        Ok(term)
    }

    fn gen_return(
        &mut self,
        expr: Option<&Expr>,
        span: &SourceSpan,
    ) -> Result<(), CompilerError> {
        let Some(expr) = expr else {
            return self.builder.build_ret_void();
        };

        let term = self.gen_expr(expr, ExprContext::Rvalue)?;
        if matches!(self.env.types.get(term.ctype), CType::Struct { .. }) {
            // The first IR argument is a pointer to caller-allocated space
            // for the returned struct
            let caller_ptr = Term {
                ctype: term.ctype,
                value: Value::arg(0, crate::ir::IrType::Ptr),
            };
            self.gen_assign_op(caller_ptr, term, None, span)?;
            self.builder.build_ret_void()
        } else {
            let function_type = self.env.current_function_type.ok_or_else(|| {
                CompilerError::internal("return statement outside a function")
            })?;
            let return_type = match self.env.types.get(function_type) {
                CType::Function { ret, .. } => *ret,
                _ => return Err(CompilerError::internal("current function type is not a function")),
            };
            let converted = self.convert_type(term, return_type)?;
            self.builder.build_ret(converted.value)
        }
    }

    /// Lower a switch: the body first (collecting its case labels in a
    /// nested context), then a chain of equality compares from the entry
    /// block, one reserved compare block per non-default case
    fn gen_switch(
        &mut self,
        value: &Expr,
        body: &Statement,
        span: &SourceSpan,
    ) -> Result<(), CompilerError> {
        let prev_case_labels = self.env.case_labels.replace(Vec::new());

        let switch_entry = self.builder.current_block;
        let before_body = self.builder.layout_len()?;
        let after = self.builder.add_block("switch.after")?;
        let prev_break = self.env.break_target.replace(after);

        let body_block = self.builder.add_block("switch.body")?;
        self.builder.set_current_block(body_block);
        self.gen_statement(body)?;
        self.builder.build_branch(after)?;

        self.builder.set_current_block(switch_entry);
        let switch_value = self.gen_expr(value, ExprContext::Rvalue)?;
        if !self.env.types.is_integer(switch_value.ctype) {
            return Err(CompilerError::semantic(
                "switch value must have integer type",
                span.clone(),
            ));
        }

        let case_labels = self.env.case_labels.take().unwrap_or_default();
        let mut insert_at = before_body;
        let mut default_block = None;

        for case in &case_labels {
            if case.is_default {
                default_block = Some(case.block);
                continue;
            }
            let next = self.builder.reserve_block("switch.cmp")?;
            let case_const = Value::const_int(
                switch_value.value.ty,
                case.value.expect("non-default case has a value"),
            );
            let cmp = self
                .builder
                .build_cmp(IrCmp::Eq, switch_value.value, case_const)?;
            self.builder.build_cond(cmp, case.block, next)?;
            self.builder.set_current_block(next);

            self.builder.insert_block_in_layout(insert_at, next)?;
            insert_at += 1;
        }

        match default_block {
            Some(block) => self.builder.build_branch(block)?,
            None => self.builder.build_branch(after)?,
        }
        self.builder.set_current_block(after);

        self.env.break_target = prev_break;
        self.env.case_labels = prev_case_labels;
        Ok(())
    }
}
