//! Deterministic source reconstruction from the typed AST.
//!
//! Expressions are parenthesized by comparing the precedence of the
//! surrounding operator against the printed expression's own precedence;
//! assignment, conditional and unary levels associate right-to-left.
//! Implicit casts are elided unless requested, and literals reproduce their
//! original spelling including prefixes and suffixes.

use std::fmt::{self, Write};

use crate::ast::{
    prec, AsmArgument, BinaryOp, CallExpr, CompoundLiteralExpr, CompoundStatement,
    ConditionalExpr, Designator, ExprKind, Expression, FuncnameKind, Initializer, LiteralExpr,
    LiteralKind, OffsetofExpr, SelectExpr, Statement, StatementKind, TypePropExpr, UnaryOp,
};
use crate::config::CMode;
use crate::context::Context;
use crate::entity::{
    DeclModifiers, EntityId, EntityKind, Scope, StorageClass, TranslationUnit,
};
use crate::symbol::{StringValue, Symbol};
use crate::types::{
    ArraySize, CallingConvention, FunctionType, Linkage, Qualifiers, TypeKind, TypeRef,
};

pub struct Printer<'c, W: Write> {
    ctx: &'c Context,
    out: W,
    indent: usize,
    /// If set, implicit casts are printed.
    pub print_implicit_casts: bool,
    /// If set, parentheses are printed to indicate operator precedence.
    pub print_parenthesis: bool,
    pub print_implicit_array_size: bool,
}

/// True for precedence levels that associate right-to-left.
fn right_to_left(precedence: u8) -> u8 {
    match precedence {
        prec::ASSIGNMENT | prec::CONDITIONAL | prec::UNARY => 1,
        _ => 0,
    }
}

fn is_generated_entity(ctx: &Context, entity: EntityId) -> bool {
    let entity = ctx.entity(entity);
    match &entity.kind {
        EntityKind::Typedef(typedef) => typedef.builtin,
        _ => entity.declaration().map_or(false, |decl| decl.implicit),
    }
}

impl<'c, W: Write> Printer<'c, W> {
    pub fn new(ctx: &'c Context, out: W) -> Self {
        Printer {
            ctx,
            out,
            indent: 0,
            print_implicit_casts: false,
            print_parenthesis: false,
            print_implicit_array_size: false,
        }
    }

    fn print_indent(&mut self) -> fmt::Result {
        for _ in 0..self.indent {
            self.out.write_str("\t")?;
        }
        Ok(())
    }

    fn print_symbol(&mut self, symbol: Symbol) -> fmt::Result {
        self.out.write_str(self.ctx.name(symbol))
    }

    fn print_opt_symbol(&mut self, symbol: Option<Symbol>) -> fmt::Result {
        match symbol {
            Some(symbol) => self.print_symbol(symbol),
            None => Ok(()),
        }
    }

    fn print_stringrep(&mut self, value: &StringValue) -> fmt::Result {
        for &byte in &value.bytes {
            self.out.write_char(byte as char)?;
        }
        Ok(())
    }

    /// Prints a quoted string constant. `skip` counts bytes to drop at the
    /// end (the terminating NUL of a string literal).
    fn print_quoted_string(
        &mut self,
        value: &StringValue,
        border: char,
        skip: usize,
    ) -> fmt::Result {
        self.out.write_char(border)?;
        let end = value.bytes.len().saturating_sub(skip);
        for &byte in &value.bytes[..end] {
            if byte as char == border {
                self.out.write_str("\\")?;
            }
            match byte {
                b'\\' => self.out.write_str("\\\\")?,
                0x07 => self.out.write_str("\\a")?,
                0x08 => self.out.write_str("\\b")?,
                0x0c => self.out.write_str("\\f")?,
                b'\n' => self.out.write_str("\\n")?,
                b'\r' => self.out.write_str("\\r")?,
                b'\t' => self.out.write_str("\\t")?,
                0x0b => self.out.write_str("\\v")?,
                b'?' => self.out.write_str("\\?")?,
                0x1b if self.ctx.config.c_mode.contains(CMode::GNUC) => {
                    self.out.write_str("\\e")?
                }
                _ => {
                    if byte < 0x80 && !(0x20..0x7f).contains(&byte) {
                        write!(self.out, "\\{:03o}", byte)?;
                    } else {
                        self.out.write_char(byte as char)?;
                    }
                }
            }
        }
        self.out.write_char(border)
    }

    fn print_string_literal(&mut self, wide: bool, value: &StringValue) -> fmt::Result {
        if wide {
            self.out.write_char('L')?;
        }
        self.print_quoted_string(value, '"', 1)
    }

    fn print_literal(&mut self, literal: &LiteralExpr) -> fmt::Result {
        match literal.kind {
            LiteralKind::MsNoop => return self.out.write_str("__noop"),
            LiteralKind::IntegerHexadecimal | LiteralKind::FloatingPointHexadecimal => {
                self.out.write_str("0x")?;
            }
            LiteralKind::WideCharacter => {
                self.out.write_char('L')?;
            }
            _ => {}
        }
        match literal.kind {
            LiteralKind::Character | LiteralKind::WideCharacter => {
                self.print_quoted_string(&literal.value, '\'', 0)
            }
            _ => {
                self.print_stringrep(&literal.value)?;
                self.print_opt_symbol(literal.suffix)
            }
        }
    }

    fn print_funcname(&mut self, kind: FuncnameKind) -> fmt::Result {
        let s = match kind {
            FuncnameKind::Function => {
                if self.ctx.config.c_mode.contains(CMode::C99) {
                    "__func__"
                } else {
                    "__FUNCTION__"
                }
            }
            FuncnameKind::PrettyFunction => "__PRETTY_FUNCTION__",
            FuncnameKind::Funcsig => "__FUNCSIG__",
            FuncnameKind::Funcdname => "__FUNCDNAME__",
        };
        self.out.write_str(s)
    }

    fn print_compound_literal(&mut self, expression: &CompoundLiteralExpr) -> fmt::Result {
        self.out.write_str("(")?;
        self.print_type(expression.ty)?;
        self.out.write_str(")")?;
        self.print_initializer(Some(&expression.initializer))
    }

    fn print_assignment_expression(&mut self, expression: &Expression) -> fmt::Result {
        self.print_expression_prec(expression, prec::ASSIGNMENT)
    }

    fn print_call_expression(&mut self, call: &CallExpr) -> fmt::Result {
        self.print_expression_prec(&call.function, prec::POSTFIX)?;
        self.out.write_str("(")?;
        for (i, argument) in call.arguments.iter().enumerate() {
            if i != 0 {
                self.out.write_str(", ")?;
            }
            self.print_assignment_expression(argument)?;
        }
        self.out.write_str(")")
    }

    fn print_unordered_comparison(
        &mut self,
        op: BinaryOp,
        left: &Expression,
        right: &Expression,
    ) -> fmt::Result {
        let name = match op {
            BinaryOp::IsGreater => "__builtin_isgreater",
            BinaryOp::IsGreaterEqual => "__builtin_isgreaterequal",
            BinaryOp::IsLess => "__builtin_isless",
            BinaryOp::IsLessEqual => "__builtin_islessequal",
            BinaryOp::IsLessGreater => "__builtin_islessgreater",
            BinaryOp::IsUnordered => "__builtin_isunordered",
            _ => unreachable!(),
        };
        self.out.write_str(name)?;
        self.out.write_str("(")?;
        self.print_assignment_expression(left)?;
        self.out.write_str(", ")?;
        self.print_assignment_expression(right)?;
        self.out.write_str(")")
    }

    fn print_binary_expression(
        &mut self,
        op: BinaryOp,
        left: &Expression,
        right: &Expression,
    ) -> fmt::Result {
        if op.is_unordered_comparison() {
            return self.print_unordered_comparison(op, left, right);
        }

        let precedence = op.precedence();
        let r2l = right_to_left(precedence);

        self.print_expression_prec(left, precedence + r2l)?;
        let op_str = match op {
            BinaryOp::Comma => ", ",
            BinaryOp::Assign => " = ",
            BinaryOp::Add => " + ",
            BinaryOp::Sub => " - ",
            BinaryOp::Mul => " * ",
            BinaryOp::Mod => " % ",
            BinaryOp::Div => " / ",
            BinaryOp::BitwiseOr => " | ",
            BinaryOp::BitwiseAnd => " & ",
            BinaryOp::BitwiseXor => " ^ ",
            BinaryOp::LogicalOr => " || ",
            BinaryOp::LogicalAnd => " && ",
            BinaryOp::NotEqual => " != ",
            BinaryOp::Equal => " == ",
            BinaryOp::Less => " < ",
            BinaryOp::LessEqual => " <= ",
            BinaryOp::Greater => " > ",
            BinaryOp::GreaterEqual => " >= ",
            BinaryOp::ShiftLeft => " << ",
            BinaryOp::ShiftRight => " >> ",
            BinaryOp::AddAssign => " += ",
            BinaryOp::SubAssign => " -= ",
            BinaryOp::MulAssign => " *= ",
            BinaryOp::ModAssign => " %= ",
            BinaryOp::DivAssign => " /= ",
            BinaryOp::BitwiseOrAssign => " |= ",
            BinaryOp::BitwiseAndAssign => " &= ",
            BinaryOp::BitwiseXorAssign => " ^= ",
            BinaryOp::ShiftLeftAssign => " <<= ",
            BinaryOp::ShiftRightAssign => " >>= ",
            _ => panic!("invalid binary expression found"),
        };
        self.out.write_str(op_str)?;
        self.print_expression_prec(right, precedence + 1 - r2l)
    }

    fn print_unary_expression(
        &mut self,
        expression: &Expression,
        op: UnaryOp,
        value: &Expression,
    ) -> fmt::Result {
        let precedence = expression.precedence();
        match op {
            UnaryOp::Negate => self.out.write_str("-")?,
            UnaryOp::Plus => self.out.write_str("+")?,
            UnaryOp::Not => self.out.write_str("!")?,
            UnaryOp::BitwiseNegate => self.out.write_str("~")?,
            UnaryOp::PrefixIncrement => self.out.write_str("++")?,
            UnaryOp::PrefixDecrement => self.out.write_str("--")?,
            UnaryOp::Dereference => self.out.write_str("*")?,
            UnaryOp::TakeAddress => self.out.write_str("&")?,
            UnaryOp::Delete => self.out.write_str("delete ")?,
            UnaryOp::DeleteArray => self.out.write_str("delete [] ")?,

            UnaryOp::PostfixIncrement => {
                self.print_expression_prec(value, precedence)?;
                return self.out.write_str("++");
            }
            UnaryOp::PostfixDecrement => {
                self.print_expression_prec(value, precedence)?;
                return self.out.write_str("--");
            }
            UnaryOp::Cast | UnaryOp::ImplicitCast => {
                self.out.write_str("(")?;
                self.print_type(expression.ty)?;
                self.out.write_str(")")?;
            }
            UnaryOp::Assume => {
                self.out.write_str("__assume(")?;
                self.print_assignment_expression(value)?;
                return self.out.write_str(")");
            }
        }
        self.print_expression_prec(value, precedence)
    }

    fn print_reference_expression(&mut self, entity: EntityId) -> fmt::Result {
        self.print_opt_symbol(self.ctx.entity(entity).symbol)
    }

    fn print_label_address_expression(&mut self, label: EntityId) -> fmt::Result {
        self.out.write_str("&&")?;
        self.print_opt_symbol(self.ctx.entity(label).symbol)
    }

    fn print_array_expression(
        &mut self,
        array: &Expression,
        index: &Expression,
        flipped: bool,
    ) -> fmt::Result {
        let (first, second) = if flipped { (index, array) } else { (array, index) };
        self.print_expression_prec(first, prec::POSTFIX)?;
        self.out.write_str("[")?;
        self.print_expression(second)?;
        self.out.write_str("]")
    }

    fn print_typeprop_expression(
        &mut self,
        is_sizeof: bool,
        typeprop: &TypePropExpr,
    ) -> fmt::Result {
        if is_sizeof {
            self.out.write_str("sizeof")?;
        } else {
            self.out.write_str("__alignof__")?;
        }
        match &typeprop.expression {
            Some(expression) => {
                /* always print the '()' here, sizeof x is right but unusual */
                self.print_expression_prec(expression, prec::TOP)
            }
            None => {
                self.out.write_str("(")?;
                self.print_type(typeprop.ty)?;
                self.out.write_str(")")
            }
        }
    }

    fn print_builtin_constant(&mut self, value: &Expression) -> fmt::Result {
        self.out.write_str("__builtin_constant_p(")?;
        self.print_assignment_expression(value)?;
        self.out.write_str(")")
    }

    fn print_builtin_types_compatible(&mut self, left: TypeRef, right: TypeRef) -> fmt::Result {
        self.out.write_str("__builtin_types_compatible_p(")?;
        self.print_type(left)?;
        self.out.write_str(", ")?;
        self.print_type(right)?;
        self.out.write_str(")")
    }

    fn print_conditional(&mut self, conditional: &ConditionalExpr) -> fmt::Result {
        self.print_expression_prec(&conditional.condition, prec::LOGICAL_OR)?;
        match &conditional.true_expression {
            Some(true_expression) => {
                self.out.write_str(" ? ")?;
                self.print_expression_prec(true_expression, prec::EXPRESSION)?;
                self.out.write_str(" : ")?;
            }
            None => {
                self.out.write_str(" ?: ")?;
            }
        }
        let false_prec = if self.ctx.config.c_mode.contains(CMode::CXX) {
            prec::ASSIGNMENT
        } else {
            prec::CONDITIONAL
        };
        self.print_expression_prec(&conditional.false_expression, false_prec)
    }

    fn print_va_start(&mut self, ap: &Expression, parameter: EntityId) -> fmt::Result {
        self.out.write_str("__builtin_va_start(")?;
        self.print_assignment_expression(ap)?;
        self.out.write_str(", ")?;
        self.print_opt_symbol(self.ctx.entity(parameter).symbol)?;
        self.out.write_str(")")
    }

    fn print_va_arg(&mut self, expression: &Expression, ap: &Expression) -> fmt::Result {
        self.out.write_str("__builtin_va_arg(")?;
        self.print_assignment_expression(ap)?;
        self.out.write_str(", ")?;
        self.print_type(expression.ty)?;
        self.out.write_str(")")
    }

    fn print_va_copy(&mut self, dst: &Expression, src: &Expression) -> fmt::Result {
        self.out.write_str("__builtin_va_copy(")?;
        self.print_assignment_expression(dst)?;
        self.out.write_str(", ")?;
        self.print_assignment_expression(src)?;
        self.out.write_str(")")
    }

    fn print_select(&mut self, select: &SelectExpr) -> fmt::Result {
        self.print_expression_prec(&select.compound, prec::POSTFIX)?;
        let compound_type = self.ctx.typeref_target(select.compound.ty);
        if matches!(self.ctx.ty(compound_type).kind, TypeKind::Pointer(_)) {
            self.out.write_str("->")?;
        } else {
            self.out.write_str(".")?;
        }
        self.print_opt_symbol(self.ctx.entity(select.member).symbol)
    }

    fn print_classify_type_expression(&mut self, value: &Expression) -> fmt::Result {
        self.out.write_str("__builtin_classify_type(")?;
        self.print_assignment_expression(value)?;
        self.out.write_str(")")
    }

    fn print_designator(&mut self, designator: &[Designator]) -> fmt::Result {
        for link in designator {
            match link {
                Designator::Member(symbol) => {
                    self.out.write_str(".")?;
                    self.print_symbol(*symbol)?;
                }
                Designator::Index(index) => {
                    self.out.write_str("[")?;
                    self.print_expression(index)?;
                    self.out.write_str("]")?;
                }
            }
        }
        Ok(())
    }

    fn print_offsetof_expression(&mut self, offsetof: &OffsetofExpr) -> fmt::Result {
        self.out.write_str("__builtin_offsetof(")?;
        self.print_type(offsetof.ty)?;
        self.out.write_str(",")?;
        self.print_designator(&offsetof.designator)?;
        self.out.write_str(")")
    }

    fn print_statement_expression(&mut self, statement: &Statement) -> fmt::Result {
        self.out.write_str("(")?;
        self.print_statement(statement)?;
        self.out.write_str(")")
    }

    /// Prints an expression, parenthesized if needed in a context with
    /// precedence `top_prec`.
    pub fn print_expression_prec(
        &mut self,
        expression: &Expression,
        top_prec: u8,
    ) -> fmt::Result {
        let mut expression = expression;
        if !self.print_implicit_casts {
            if let ExprKind::Unary(UnaryOp::ImplicitCast, value) = &expression.kind {
                expression = value;
            }
        }

        let parenthesized = expression.parenthesized
            || (self.print_parenthesis && top_prec != prec::BOTTOM)
            || top_prec > expression.precedence();

        if parenthesized {
            self.out.write_str("(")?;
        }
        match &expression.kind {
            ExprKind::Invalid => self.out.write_str("$invalid expression$")?,
            ExprKind::StringLiteral(value) => self.print_string_literal(false, value)?,
            ExprKind::WideStringLiteral(value) => self.print_string_literal(true, value)?,
            ExprKind::Literal(literal) => self.print_literal(literal)?,
            ExprKind::Funcname(kind) => self.print_funcname(*kind)?,
            ExprKind::CompoundLiteral(literal) => self.print_compound_literal(literal)?,
            ExprKind::Call(call) => self.print_call_expression(call)?,
            ExprKind::Binary(op, left, right) => {
                self.print_binary_expression(*op, left, right)?
            }
            ExprKind::Reference(entity) | ExprKind::EnumValueReference(entity) => {
                self.print_reference_expression(*entity)?
            }
            ExprKind::ArrayAccess {
                array,
                index,
                flipped,
            } => self.print_array_expression(array, index, *flipped)?,
            ExprKind::LabelAddress(label) => self.print_label_address_expression(*label)?,
            ExprKind::Unary(op, value) => self.print_unary_expression(expression, *op, value)?,
            ExprKind::Throw(value) => match value {
                Some(value) => {
                    self.out.write_str("throw ")?;
                    self.print_expression_prec(value, prec::ASSIGNMENT)?;
                }
                None => self.out.write_str("throw")?,
            },
            ExprKind::SizeOf(typeprop) => self.print_typeprop_expression(true, typeprop)?,
            ExprKind::AlignOf(typeprop) => self.print_typeprop_expression(false, typeprop)?,
            ExprKind::BuiltinConstantP(value) => self.print_builtin_constant(value)?,
            ExprKind::BuiltinTypesCompatibleP { left, right } => {
                self.print_builtin_types_compatible(*left, *right)?
            }
            ExprKind::Conditional(conditional) => self.print_conditional(conditional)?,
            ExprKind::VaStart { ap, parameter } => self.print_va_start(ap, *parameter)?,
            ExprKind::VaArg { ap } => self.print_va_arg(expression, ap)?,
            ExprKind::VaCopy { dst, src } => self.print_va_copy(dst, src)?,
            ExprKind::Select(select) => self.print_select(select)?,
            ExprKind::ClassifyType(value) => self.print_classify_type_expression(value)?,
            ExprKind::Offsetof(offsetof) => self.print_offsetof_expression(offsetof)?,
            ExprKind::Statement(statement) => self.print_statement_expression(statement)?,
        }
        if parenthesized {
            self.out.write_str(")")?;
        }
        Ok(())
    }

    pub fn print_expression(&mut self, expression: &Expression) -> fmt::Result {
        self.print_expression_prec(expression, prec::BOTTOM)
    }

    // -- statements ---------------------------------------------------

    fn print_compound_statement(&mut self, block: &CompoundStatement) -> fmt::Result {
        self.out.write_str("{\n")?;
        self.indent += 1;

        for statement in &block.statements {
            if matches!(statement.kind, StatementKind::CaseLabel { .. }) {
                self.indent = self.indent.saturating_sub(1);
            }
            if !matches!(statement.kind, StatementKind::Label { .. }) {
                self.print_indent()?;
            }
            self.print_statement(statement)?;
        }
        self.indent = self.indent.saturating_sub(1);
        self.print_indent()?;
        self.out.write_str(if block.stmt_expr { "}" } else { "}\n" })
    }

    fn print_declaration_statement(&mut self, entities: &[EntityId]) -> fmt::Result {
        if entities.is_empty() {
            return self.out.write_str("/* empty declaration statement */\n");
        }

        let mut first = true;
        for &entity in entities {
            if matches!(self.ctx.entity(entity).kind, EntityKind::EnumValue(_)) {
                continue;
            }
            if is_generated_entity(self.ctx, entity) {
                continue;
            }

            if !first {
                self.print_indent()?;
            } else {
                first = false;
            }
            self.print_entity(entity)?;
            self.out.write_str("\n")?;
        }
        Ok(())
    }

    fn print_asm_arguments(&mut self, arguments: &[AsmArgument]) -> fmt::Result {
        for (i, argument) in arguments.iter().enumerate() {
            if i != 0 {
                self.out.write_str(", ")?;
            }
            if let Some(symbol) = argument.symbol {
                self.out.write_str("[")?;
                self.print_symbol(symbol)?;
                self.out.write_str("] ")?;
            }
            self.print_quoted_string(&argument.constraints, '"', 1)?;
            self.out.write_str(" (")?;
            self.print_expression(&argument.expression)?;
            self.out.write_str(")")?;
        }
        Ok(())
    }

    fn print_asm_clobbers(&mut self, clobbers: &[StringValue]) -> fmt::Result {
        for (i, clobber) in clobbers.iter().enumerate() {
            if i != 0 {
                self.out.write_str(", ")?;
            }
            self.print_quoted_string(clobber, '"', 1)?;
        }
        Ok(())
    }

    pub fn print_statement(&mut self, statement: &Statement) -> fmt::Result {
        match &statement.kind {
            StatementKind::Empty => self.out.write_str(";\n"),
            StatementKind::Compound(block) => self.print_compound_statement(block),
            StatementKind::Return(value) => match value {
                Some(value) => {
                    self.out.write_str("return ")?;
                    self.print_expression(value)?;
                    self.out.write_str(";\n")
                }
                None => self.out.write_str("return;\n"),
            },
            StatementKind::Expression(expression) => {
                self.print_expression(expression)?;
                self.out.write_str(";\n")
            }
            StatementKind::Label { label, statement } => {
                self.print_opt_symbol(self.ctx.entity(*label).symbol)?;
                self.out.write_str(":\n")?;
                self.print_indent()?;
                self.print_statement(statement)
            }
            StatementKind::Goto(label) => {
                self.out.write_str("goto ")?;
                self.print_opt_symbol(self.ctx.entity(*label).symbol)?;
                self.out.write_str(";\n")
            }
            StatementKind::ComputedGoto(expression) => {
                self.out.write_str("goto *")?;
                self.print_expression(expression)?;
                self.out.write_str(";\n")
            }
            StatementKind::Continue => self.out.write_str("continue;\n"),
            StatementKind::Break => self.out.write_str("break;\n"),
            StatementKind::If {
                condition,
                true_statement,
                false_statement,
            } => {
                self.out.write_str("if (")?;
                self.print_expression(condition)?;
                self.out.write_str(") ")?;
                self.print_statement(true_statement)?;
                if let Some(false_statement) = false_statement {
                    self.print_indent()?;
                    self.out.write_str("else ")?;
                    self.print_statement(false_statement)?;
                }
                Ok(())
            }
            StatementKind::Switch { expression, body } => {
                self.out.write_str("switch (")?;
                self.print_expression(expression)?;
                self.out.write_str(") ")?;
                self.print_statement(body)
            }
            StatementKind::CaseLabel {
                expression,
                end_range,
                statement,
            } => {
                match expression {
                    None => self.out.write_str("default:\n")?,
                    Some(expression) => {
                        self.out.write_str("case ")?;
                        self.print_expression(expression)?;
                        if let Some(end_range) = end_range {
                            self.out.write_str(" ... ")?;
                            self.print_expression(end_range)?;
                        }
                        self.out.write_str(":\n")?;
                    }
                }
                self.indent += 1;
                if let Some(statement) = statement {
                    if matches!(statement.kind, StatementKind::CaseLabel { .. }) {
                        self.indent = self.indent.saturating_sub(1);
                    }
                    self.print_indent()?;
                    self.print_statement(statement)?;
                }
                Ok(())
            }
            StatementKind::Declaration { entities } => self.print_declaration_statement(entities),
            StatementKind::While { condition, body } => {
                self.out.write_str("while (")?;
                self.print_expression(condition)?;
                self.out.write_str(") ")?;
                self.print_statement(body)
            }
            StatementKind::DoWhile { body, condition } => {
                self.out.write_str("do ")?;
                self.print_statement(body)?;
                self.print_indent()?;
                self.out.write_str("while (")?;
                self.print_expression(condition)?;
                self.out.write_str(");\n")
            }
            StatementKind::For {
                scope,
                initialisation,
                condition,
                step,
                body,
            } => {
                self.out.write_str("for (")?;
                match initialisation {
                    Some(initialisation) => {
                        self.print_expression(initialisation)?;
                        self.out.write_str(";")?;
                    }
                    None => {
                        for &entity in scope {
                            if is_generated_entity(self.ctx, entity) {
                                continue;
                            }
                            self.print_declaration(entity)?;
                        }
                    }
                }
                if let Some(condition) = condition {
                    self.out.write_str(" ")?;
                    self.print_expression(condition)?;
                }
                self.out.write_str(";")?;
                if let Some(step) = step {
                    self.out.write_str(" ")?;
                    self.print_expression(step)?;
                }
                self.out.write_str(") ")?;
                self.print_statement(body)
            }
            StatementKind::Asm(asm) => {
                self.out.write_str("asm ")?;
                if asm.is_volatile {
                    self.out.write_str("volatile ")?;
                }
                self.out.write_str("(")?;
                self.print_quoted_string(&asm.asm_text, '"', 1)?;
                if !asm.outputs.is_empty() || !asm.inputs.is_empty() || !asm.clobbers.is_empty() {
                    self.out.write_str(" : ")?;
                    self.print_asm_arguments(&asm.outputs)?;
                    if !asm.inputs.is_empty() || !asm.clobbers.is_empty() {
                        self.out.write_str(" : ")?;
                        self.print_asm_arguments(&asm.inputs)?;
                        if !asm.clobbers.is_empty() {
                            self.out.write_str(" : ")?;
                            self.print_asm_clobbers(&asm.clobbers)?;
                        }
                    }
                }
                self.out.write_str(");\n")
            }
            StatementKind::MsTry {
                try_statement,
                except_expression,
                final_statement,
            } => {
                self.out.write_str("__try ")?;
                self.print_statement(try_statement)?;
                self.print_indent()?;
                match except_expression {
                    Some(except_expression) => {
                        self.out.write_str("__except(")?;
                        self.print_expression(except_expression)?;
                        self.out.write_str(") ")?;
                    }
                    None => self.out.write_str("__finally ")?,
                }
                self.print_statement(final_statement)
            }
            StatementKind::Leave => self.out.write_str("__leave;\n"),
            StatementKind::Invalid => self.out.write_str("$invalid statement$\n"),
        }
    }

    // -- initializers -------------------------------------------------

    pub fn print_initializer(&mut self, initializer: Option<&Initializer>) -> fmt::Result {
        let initializer = match initializer {
            Some(initializer) => initializer,
            None => return self.out.write_str("{}"),
        };

        match initializer {
            Initializer::Value(value) => self.print_assignment_expression(value),
            Initializer::List(initializers) => {
                self.out.write_str("{ ")?;
                for (i, sub) in initializers.iter().enumerate() {
                    self.print_initializer(Some(sub))?;
                    if i + 1 < initializers.len() {
                        if !matches!(sub, Initializer::Designator(_)) {
                            self.out.write_str(", ")?;
                        }
                    }
                }
                self.out.write_str(" }")
            }
            Initializer::String(value) => self.print_quoted_string(value, '"', 1),
            Initializer::WideString(value) => self.print_quoted_string(value, '"', 1),
            Initializer::Designator(designator) => {
                self.print_designator(designator)?;
                self.out.write_str(" = ")
            }
        }
    }

    // -- types --------------------------------------------------------

    fn print_type_qualifiers(&mut self, qualifiers: Qualifiers) -> fmt::Result {
        if qualifiers.contains(Qualifiers::CONST) {
            self.out.write_str("const ")?;
        }
        if qualifiers.contains(Qualifiers::VOLATILE) {
            self.out.write_str("volatile ")?;
        }
        if qualifiers.contains(Qualifiers::RESTRICT) {
            self.out.write_str("restrict ")?;
        }
        Ok(())
    }

    fn print_function_type_pre(
        &mut self,
        function: &FunctionType,
        qualifiers: Qualifiers,
    ) -> fmt::Result {
        match function.linkage {
            Linkage::C => {
                if self.ctx.config.c_mode.contains(CMode::CXX) {
                    self.out.write_str("extern \"C\" ")?;
                }
            }
            Linkage::Cxx => {
                if !self.ctx.config.c_mode.contains(CMode::CXX) {
                    self.out.write_str("extern \"C++\" ")?;
                }
            }
        }

        self.print_type_qualifiers(qualifiers)?;
        self.print_type_pre(function.return_type)?;

        let mut cc = function.calling_convention;
        if cc == CallingConvention::Default
            && self.ctx.config.default_calling_convention != CallingConvention::Cdecl
        {
            /* show the default calling convention if it is not cdecl */
            cc = self.ctx.config.default_calling_convention;
        }
        match cc {
            CallingConvention::Cdecl => self.out.write_str(" __cdecl")?,
            CallingConvention::Stdcall => self.out.write_str(" __stdcall")?,
            CallingConvention::Fastcall => self.out.write_str(" __fastcall")?,
            CallingConvention::Thiscall => self.out.write_str(" __thiscall")?,
            CallingConvention::Default => {}
        }
        Ok(())
    }

    fn print_function_type_post(
        &mut self,
        function: &FunctionType,
        parameters: Option<&Scope>,
    ) -> fmt::Result {
        self.out.write_str("(")?;
        let mut first = true;
        match parameters {
            None => {
                for parameter in &function.parameters {
                    if first {
                        first = false;
                    } else {
                        self.out.write_str(", ")?;
                    }
                    self.print_type(parameter.ty)?;
                }
            }
            Some(scope) => {
                for entity in scope.iter() {
                    let entity_ref = self.ctx.entity(entity);
                    if !matches!(entity_ref.kind, EntityKind::Parameter(_)) {
                        continue;
                    }
                    if first {
                        first = false;
                    } else {
                        self.out.write_str(", ")?;
                    }
                    let ty = entity_ref.declaration().unwrap().ty;
                    self.print_type_ext(ty, entity_ref.symbol, None)?;
                }
            }
        }
        if function.variadic {
            if first {
                first = false;
            } else {
                self.out.write_str(", ")?;
            }
            self.out.write_str("...")?;
        }
        if first && !function.unspecified_parameters {
            self.out.write_str("void")?;
        }
        self.out.write_str(")")?;

        self.print_type_post(function.return_type)
    }

    fn print_pointer_type_pre(
        &mut self,
        points_to: TypeRef,
        base_variable: Option<EntityId>,
        qualifiers: Qualifiers,
    ) -> fmt::Result {
        self.print_type_pre(points_to)?;
        if matches!(
            self.ctx.ty(points_to).kind,
            TypeKind::Array(_) | TypeKind::Function(_)
        ) {
            self.out.write_str(" (")?;
        }
        if let Some(variable) = base_variable {
            self.out.write_str(" __based(")?;
            self.print_opt_symbol(self.ctx.entity(variable).symbol)?;
            self.out.write_str(") ")?;
        }
        self.out.write_str("*")?;
        if !qualifiers.is_empty() {
            self.out.write_str(" ")?;
        }
        self.print_type_qualifiers(qualifiers)
    }

    fn print_pointer_type_post(&mut self, points_to: TypeRef) -> fmt::Result {
        if matches!(
            self.ctx.ty(points_to).kind,
            TypeKind::Array(_) | TypeKind::Function(_)
        ) {
            self.out.write_str(")")?;
        }
        self.print_type_post(points_to)
    }

    /// Prints an enum definition.
    pub fn print_enum_definition(&mut self, entity: EntityId) -> fmt::Result {
        self.out.write_str("{\n")?;
        self.indent += 1;

        let values = match &self.ctx.entity(entity).kind {
            EntityKind::Enum(enum_entity) => enum_entity.values.clone(),
            _ => panic!("print_enum_definition on non-enum entity"),
        };
        for value_entity in values {
            self.print_indent()?;
            self.print_opt_symbol(self.ctx.entity(value_entity).symbol)?;
            if let EntityKind::EnumValue(value) = &self.ctx.entity(value_entity).kind {
                if let Some(expression) = &value.value {
                    self.out.write_str(" = ")?;

                    /* skip the implicit cast */
                    let mut expression = expression;
                    if let ExprKind::Unary(UnaryOp::ImplicitCast, inner) = &expression.kind {
                        expression = inner;
                    }
                    self.print_expression(expression)?;
                }
            }
            self.out.write_str(",\n")?;
        }

        self.indent = self.indent.saturating_sub(1);
        self.print_indent()?;
        self.out.write_str("}")
    }

    /// Prints the member list of a compound definition.
    pub fn print_compound_definition(&mut self, entity: EntityId) -> fmt::Result {
        self.out.write_str("{\n")?;
        self.indent += 1;

        let members = self.ctx.compound(entity).members.entities.clone();
        for member in members {
            if !matches!(self.ctx.entity(member).kind, EntityKind::CompoundMember(_)) {
                continue;
            }
            self.print_indent()?;
            self.print_entity(member)?;
            self.out.write_str("\n")?;
        }

        self.indent = self.indent.saturating_sub(1);
        self.print_indent()?;
        self.out.write_str("}")?;
        if self
            .ctx
            .compound(entity)
            .modifiers
            .contains(DeclModifiers::TRANSPARENT_UNION)
        {
            self.out.write_str("__attribute__((__transparent_union__))")?;
        }
        Ok(())
    }

    fn print_compound_type_pre(
        &mut self,
        is_struct: bool,
        entity: EntityId,
        qualifiers: Qualifiers,
    ) -> fmt::Result {
        self.print_type_qualifiers(qualifiers)?;
        self.out
            .write_str(if is_struct { "struct " } else { "union " })?;
        match self.ctx.entity(entity).symbol {
            Some(symbol) => self.print_symbol(symbol),
            None => self.print_compound_definition(entity),
        }
    }

    fn print_enum_type_pre(&mut self, entity: EntityId, qualifiers: Qualifiers) -> fmt::Result {
        self.print_type_qualifiers(qualifiers)?;
        self.out.write_str("enum ")?;
        match self.ctx.entity(entity).symbol {
            Some(symbol) => self.print_symbol(symbol),
            None => self.print_enum_definition(entity),
        }
    }

    fn print_type_pre(&mut self, ty: TypeRef) -> fmt::Result {
        let t = self.ctx.ty(ty);
        let qualifiers = t.qualifiers;
        match &t.kind {
            TypeKind::Error => self.out.write_str("<error>"),
            TypeKind::Invalid => self.out.write_str("<invalid>"),
            TypeKind::Enum(enum_type) => self.print_enum_type_pre(enum_type.entity, qualifiers),
            TypeKind::Atomic(akind) => {
                self.print_type_qualifiers(qualifiers)?;
                self.out.write_str(self.ctx.get_atomic_kind_name(*akind))
            }
            TypeKind::Complex(akind) => {
                self.print_type_qualifiers(qualifiers)?;
                self.out.write_str("_Complex ")?;
                self.out.write_str(self.ctx.get_atomic_kind_name(*akind))
            }
            TypeKind::Imaginary(akind) => {
                self.print_type_qualifiers(qualifiers)?;
                self.out.write_str("_Imaginary ")?;
                self.out.write_str(self.ctx.get_atomic_kind_name(*akind))
            }
            TypeKind::CompoundStruct(compound) => {
                self.print_compound_type_pre(true, *compound, qualifiers)
            }
            TypeKind::CompoundUnion(compound) => {
                self.print_compound_type_pre(false, *compound, qualifiers)
            }
            TypeKind::Builtin(builtin) => self.print_symbol(builtin.symbol),
            TypeKind::Function(function) => {
                let function = function.clone();
                self.print_function_type_pre(&function, qualifiers)
            }
            TypeKind::Pointer(pointer) => {
                let pointer = pointer.clone();
                self.print_pointer_type_pre(pointer.points_to, pointer.base_variable, qualifiers)
            }
            TypeKind::Reference(reference) => {
                let refers_to = reference.refers_to;
                self.print_type_pre(refers_to)?;
                if matches!(
                    self.ctx.ty(refers_to).kind,
                    TypeKind::Array(_) | TypeKind::Function(_)
                ) {
                    self.out.write_str(" (")?;
                }
                self.out.write_str("&")
            }
            TypeKind::Bitfield(bitfield) => self.print_type_pre(bitfield.base_type),
            TypeKind::Array(array) => self.print_type_pre(array.element_type),
            TypeKind::Typedef(typedef) => {
                self.print_type_qualifiers(qualifiers)?;
                self.print_opt_symbol(self.ctx.entity(typedef.entity).symbol)
            }
            TypeKind::Typeof(typeof_type) => {
                self.out.write_str("typeof(")?;
                match typeof_type.expression {
                    Some(expression) => {
                        let expression = self.ctx.type_expr(expression).clone();
                        self.print_expression(&expression)?;
                    }
                    None => {
                        self.print_type(typeof_type.typeof_type.expect("empty typeof type"))?;
                    }
                }
                self.out.write_str(")")
            }
        }
    }

    fn print_type_post(&mut self, ty: TypeRef) -> fmt::Result {
        match self.ctx.ty(ty).kind.clone() {
            TypeKind::Function(function) => self.print_function_type_post(&function, None),
            TypeKind::Pointer(pointer) => self.print_pointer_type_post(pointer.points_to),
            TypeKind::Reference(reference) => {
                if matches!(
                    self.ctx.ty(reference.refers_to).kind,
                    TypeKind::Array(_) | TypeKind::Function(_)
                ) {
                    self.out.write_str(")")?;
                }
                self.print_type_post(reference.refers_to)
            }
            TypeKind::Array(array) => {
                self.out.write_str("[")?;
                if array.is_static {
                    self.out.write_str("static ")?;
                }
                self.print_type_qualifiers(self.ctx.ty(ty).qualifiers)?;
                if self.print_implicit_array_size || !array.has_implicit_size {
                    match array.size {
                        ArraySize::Constant(size) => write!(self.out, "{}", size)?,
                        ArraySize::Variable(expression) => {
                            let expression = self.ctx.type_expr(expression).clone();
                            self.print_expression(&expression)?;
                        }
                        ArraySize::Unknown => {}
                    }
                }
                self.out.write_str("]")?;
                self.print_type_post(array.element_type)
            }
            TypeKind::Bitfield(bitfield) => {
                self.out.write_str(" : ")?;
                match bitfield.size_expression {
                    Some(expression) => {
                        let expression = self.ctx.type_expr(expression).clone();
                        self.print_expression(&expression)?;
                    }
                    None => write!(self.out, "{}", bitfield.bit_size)?,
                }
                self.print_type_post(bitfield.base_type)
            }
            _ => Ok(()),
        }
    }

    pub fn print_type(&mut self, ty: TypeRef) -> fmt::Result {
        self.print_type_ext(ty, None, None)
    }

    /// Prints a type with an optional declared name and, for functions, an
    /// optional parameter scope providing parameter names.
    pub fn print_type_ext(
        &mut self,
        ty: TypeRef,
        symbol: Option<Symbol>,
        parameters: Option<&Scope>,
    ) -> fmt::Result {
        self.print_type_pre(ty)?;
        if let Some(symbol) = symbol {
            self.out.write_str(" ")?;
            self.print_symbol(symbol)?;
        }
        match self.ctx.ty(ty).kind.clone() {
            TypeKind::Function(function) => self.print_function_type_post(&function, parameters),
            _ => self.print_type_post(ty),
        }
    }

    // -- entities -----------------------------------------------------

    fn print_storage_class(&mut self, storage_class: StorageClass) -> fmt::Result {
        let s = match storage_class {
            StorageClass::None => return Ok(()),
            StorageClass::Typedef => "typedef ",
            StorageClass::Extern => "extern ",
            StorageClass::Static => "static ",
            StorageClass::Auto => "auto ",
            StorageClass::Register => "register ",
        };
        self.out.write_str(s)
    }

    fn print_typedef(&mut self, entity: EntityId) -> fmt::Result {
        self.out.write_str("typedef ")?;
        let ty = match &self.ctx.entity(entity).kind {
            EntityKind::Typedef(typedef) => typedef.ty,
            _ => panic!("print_typedef on non-typedef entity"),
        };
        self.print_type_ext(ty, self.ctx.entity(entity).symbol, None)?;
        self.out.write_str(";")
    }

    /// Prints a variable or function declaration.
    pub fn print_declaration(&mut self, entity: EntityId) -> fmt::Result {
        let entity_ref = self.ctx.entity(entity);
        let declaration = entity_ref.declaration().expect("entity is not a declaration");

        self.print_storage_class(declaration.declared_storage_class)?;
        if let EntityKind::Function(function) = &entity_ref.kind {
            if function.is_inline {
                if declaration.modifiers.contains(DeclModifiers::FORCEINLINE) {
                    self.out.write_str("__forceinline ")?;
                } else if declaration
                    .modifiers
                    .contains(DeclModifiers::MICROSOFT_INLINE)
                {
                    self.out.write_str("__inline ")?;
                } else {
                    self.out.write_str("inline ")?;
                }
            }
        }

        match &entity_ref.kind {
            EntityKind::Function(function) => {
                let ty = function.decl.ty;
                let symbol = entity_ref.symbol;
                let parameters = function.parameters.clone();
                let has_body = function.body.is_some();
                self.print_type_ext(ty, symbol, Some(&parameters))?;

                if has_body {
                    let body = match &self.ctx.entity(entity).kind {
                        EntityKind::Function(function) => function.body.clone().unwrap(),
                        _ => unreachable!(),
                    };
                    self.out.write_str("\n")?;
                    self.print_indent()?;
                    self.print_statement(&body)?;
                    return Ok(());
                }
            }
            EntityKind::Variable(variable) => {
                if variable.thread_local {
                    self.out.write_str("__thread ")?;
                }
                let ty = variable.decl.ty;
                let initializer = variable.initializer.clone();
                self.print_type_ext(ty, entity_ref.symbol, None)?;
                if let Some(initializer) = initializer {
                    self.out.write_str(" = ")?;
                    self.print_initializer(Some(&initializer))?;
                }
            }
            _ => {
                self.print_type_ext(declaration.ty, entity_ref.symbol, None)?;
            }
        }
        self.out.write_str(";")
    }

    fn print_scope(&mut self, scope: &Scope) -> fmt::Result {
        for entity in scope.iter() {
            self.print_indent()?;
            self.print_entity(entity)?;
            self.out.write_str("\n")?;
        }
        Ok(())
    }

    fn print_namespace(&mut self, entity: EntityId) -> fmt::Result {
        self.out.write_str("namespace ")?;
        if let Some(symbol) = self.ctx.entity(entity).symbol {
            self.print_symbol(symbol)?;
            self.out.write_str(" ")?;
        }

        self.out.write_str("{\n")?;
        self.indent += 1;

        let members = match &self.ctx.entity(entity).kind {
            EntityKind::Namespace(namespace) => namespace.members.clone(),
            _ => panic!("print_namespace on non-namespace entity"),
        };
        self.print_scope(&members)?;

        self.indent = self.indent.saturating_sub(1);
        self.print_indent()?;
        self.out.write_str("}\n")
    }

    /// Prints any named entity the way it would appear at file scope.
    pub fn print_entity(&mut self, entity: EntityId) -> fmt::Result {
        let entity_ref = self.ctx.entity(entity);
        if entity_ref.namespc != crate::entity::NamespaceKind::Normal
            && entity_ref.symbol.is_none()
        {
            return Ok(());
        }

        match &entity_ref.kind {
            EntityKind::Variable(_)
            | EntityKind::Parameter(_)
            | EntityKind::CompoundMember(_)
            | EntityKind::Function(_) => self.print_declaration(entity),
            EntityKind::Typedef(_) => self.print_typedef(entity),
            EntityKind::Class(_) => {
                self.out.write_str("class ")?;
                self.print_opt_symbol(entity_ref.symbol)?;
                self.out.write_str(";")
            }
            EntityKind::Struct(compound) => {
                let complete = compound.complete;
                self.out.write_str("struct ")?;
                self.print_opt_symbol(entity_ref.symbol)?;
                if complete {
                    self.out.write_str(" ")?;
                    self.print_compound_definition(entity)?;
                }
                self.out.write_str(";")
            }
            EntityKind::Union(compound) => {
                let complete = compound.complete;
                self.out.write_str("union ")?;
                self.print_opt_symbol(entity_ref.symbol)?;
                if complete {
                    self.out.write_str(" ")?;
                    self.print_compound_definition(entity)?;
                }
                self.out.write_str(";")
            }
            EntityKind::Enum(_) => {
                self.out.write_str("enum ")?;
                self.print_opt_symbol(entity_ref.symbol)?;
                self.out.write_str(" ")?;
                self.print_enum_definition(entity)?;
                self.out.write_str(";")
            }
            EntityKind::Namespace(_) => self.print_namespace(entity),
            EntityKind::LocalLabel(_) => {
                self.out.write_str("__label__ ")?;
                self.print_opt_symbol(entity_ref.symbol)?;
                self.out.write_str(";")
            }
            EntityKind::Label(_) | EntityKind::EnumValue(_) => {
                panic!("print_entity used on unexpected entity kind")
            }
        }
    }

    /// Prints the whole translation unit.
    pub fn print_translation_unit(&mut self, unit: &TranslationUnit) -> fmt::Result {
        for entity in unit.scope.iter() {
            let entity_ref = self.ctx.entity(entity);
            if matches!(entity_ref.kind, EntityKind::EnumValue(_)) {
                continue;
            }
            if entity_ref.namespc != crate::entity::NamespaceKind::Normal
                && entity_ref.symbol.is_none()
            {
                continue;
            }
            if is_generated_entity(self.ctx, entity) {
                continue;
            }

            self.print_indent()?;
            self.print_entity(entity)?;
            self.out.write_str("\n")?;
        }
        Ok(())
    }
}

/// Renders a whole translation unit to a string.
pub fn print_ast(ctx: &Context, unit: &TranslationUnit) -> String {
    let mut out = String::new();
    Printer::new(ctx, &mut out)
        .print_translation_unit(unit)
        .expect("printing to a string cannot fail");
    out
}

pub fn expression_to_string(ctx: &Context, expression: &Expression) -> String {
    let mut out = String::new();
    Printer::new(ctx, &mut out)
        .print_expression(expression)
        .expect("printing to a string cannot fail");
    out
}

pub fn statement_to_string(ctx: &Context, statement: &Statement) -> String {
    let mut out = String::new();
    Printer::new(ctx, &mut out)
        .print_statement(statement)
        .expect("printing to a string cannot fail");
    out
}

pub fn type_to_string(ctx: &Context, ty: TypeRef) -> String {
    let mut out = String::new();
    Printer::new(ctx, &mut out)
        .print_type(ty)
        .expect("printing to a string cannot fail");
    out
}

pub fn entity_to_string(ctx: &Context, entity: EntityId) -> String {
    let mut out = String::new();
    Printer::new(ctx, &mut out)
        .print_entity(entity)
        .expect("printing to a string cannot fail");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::symbol::StringValue;
    use crate::types::AtomicKind;

    fn pos(ctx: &Context) -> crate::diagnostic::SourcePosition {
        ctx.builtin_position()
    }

    fn int_lit(ctx: &Context, text: &str) -> Expression {
        Expression::new(
            ExprKind::Literal(LiteralExpr {
                kind: LiteralKind::Integer,
                value: StringValue::chars(text),
                suffix: None,
            }),
            ctx.predef.type_int,
            pos(ctx),
        )
    }

    fn binary(ctx: &Context, op: BinaryOp, l: Expression, r: Expression) -> Expression {
        Expression::new(
            ExprKind::Binary(op, Box::new(l), Box::new(r)),
            ctx.predef.type_int,
            pos(ctx),
        )
    }

    #[test]
    fn precedence_drives_parenthesization() {
        let ctx = Context::new(Config::default());
        // (1 + 2) * 3 needs parentheses around the sum
        let sum = binary(&ctx, BinaryOp::Add, int_lit(&ctx, "1"), int_lit(&ctx, "2"));
        let product = binary(&ctx, BinaryOp::Mul, sum, int_lit(&ctx, "3"));
        assert_eq!(expression_to_string(&ctx, &product), "(1 + 2) * 3");

        // 1 + 2 * 3 does not
        let product = binary(&ctx, BinaryOp::Mul, int_lit(&ctx, "2"), int_lit(&ctx, "3"));
        let sum = binary(&ctx, BinaryOp::Add, int_lit(&ctx, "1"), product);
        assert_eq!(expression_to_string(&ctx, &sum), "1 + 2 * 3");
    }

    #[test]
    fn assignment_associates_right_to_left() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.predef.type_int;
        let a = ctx.intern("a");
        let b = ctx.intern("b");
        let a = ctx.define_variable(a, int);
        let b = ctx.define_variable(b, int);
        let ref_a = Expression::new(ExprKind::Reference(a), int, pos(&ctx));
        let ref_b = Expression::new(ExprKind::Reference(b), int, pos(&ctx));

        let inner = binary(&ctx, BinaryOp::Assign, ref_b, int_lit(&ctx, "1"));
        let outer = binary(&ctx, BinaryOp::Assign, ref_a, inner);
        assert_eq!(expression_to_string(&ctx, &outer), "a = b = 1");
    }

    #[test]
    fn parenthesized_flag_is_respected() {
        let ctx = Context::new(Config::default());
        let mut one = int_lit(&ctx, "1");
        one.parenthesized = true;
        assert_eq!(expression_to_string(&ctx, &one), "(1)");
    }

    #[test]
    fn implicit_casts_are_elided_by_default() {
        let mut ctx = Context::new(Config::default());
        let long_ty = ctx.make_atomic_type(AtomicKind::Long, Qualifiers::empty());
        let cast = Expression::new(
            ExprKind::Unary(UnaryOp::ImplicitCast, Box::new(int_lit(&ctx, "5"))),
            long_ty,
            pos(&ctx),
        );
        assert_eq!(expression_to_string(&ctx, &cast), "5");

        let mut out = String::new();
        let mut printer = Printer::new(&ctx, &mut out);
        printer.print_implicit_casts = true;
        printer.print_expression(&cast).unwrap();
        assert_eq!(out, "(long)5");
    }

    #[test]
    fn literals_keep_prefix_and_suffix() {
        let mut ctx = Context::new(Config::default());
        let suffix = ctx.intern("UL");
        let lit = Expression::new(
            ExprKind::Literal(LiteralExpr {
                kind: LiteralKind::IntegerHexadecimal,
                value: StringValue::chars("ff"),
                suffix: Some(suffix),
            }),
            ctx.predef.type_unsigned_long,
            pos(&ctx),
        );
        assert_eq!(expression_to_string(&ctx, &lit), "0xffUL");

        let oct = Expression::new(
            ExprKind::Literal(LiteralExpr {
                kind: LiteralKind::IntegerOctal,
                value: StringValue::chars("017"),
                suffix: None,
            }),
            ctx.predef.type_int,
            pos(&ctx),
        );
        assert_eq!(expression_to_string(&ctx, &oct), "017");
    }

    #[test]
    fn strings_are_escaped() {
        let ctx = Context::new(Config::default());
        let s = Expression::new(
            ExprKind::StringLiteral(StringValue::literal("a\"b\n\x01")),
            ctx.predef.type_char_ptr,
            pos(&ctx),
        );
        assert_eq!(expression_to_string(&ctx, &s), "\"a\\\"b\\n\\001\"");

        let wide = Expression::new(
            ExprKind::WideStringLiteral(StringValue::wide_literal("w")),
            ctx.predef.type_wchar_t_ptr,
            pos(&ctx),
        );
        assert_eq!(expression_to_string(&ctx, &wide), "L\"w\"");
    }

    #[test]
    fn escape_is_gnu_only() {
        let ctx = Context::new(Config::default());
        let s = Expression::new(
            ExprKind::StringLiteral(StringValue::literal("\x1b")),
            ctx.predef.type_char_ptr,
            pos(&ctx),
        );
        assert_eq!(expression_to_string(&ctx, &s), "\"\\e\"");

        let ctx = Context::new(Config {
            c_mode: crate::config::CMode::C89 | crate::config::CMode::C99,
            ..Config::default()
        });
        let s = Expression::new(
            ExprKind::StringLiteral(StringValue::literal("\x1b")),
            ctx.predef.type_char_ptr,
            pos(&ctx),
        );
        assert_eq!(expression_to_string(&ctx, &s), "\"\\033\"");
    }

    #[test]
    fn pointer_to_function_needs_parens() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.predef.type_int;
        let void = ctx.predef.type_void;
        let fty = ctx.make_function_1_type(void, int);
        let fptr = ctx.make_pointer_type(fty, Qualifiers::empty());
        assert_eq!(type_to_string(&ctx, fptr), "void (*)(int)");
    }

    #[test]
    fn qualified_types_print_their_qualifiers() {
        let mut ctx = Context::new(Config::default());
        let ty = ctx.make_atomic_type(AtomicKind::Int, Qualifiers::CONST | Qualifiers::VOLATILE);
        assert_eq!(type_to_string(&ctx, ty), "const volatile int");

        let char_ty = ctx.make_atomic_type(AtomicKind::Char, Qualifiers::CONST);
        let ptr = ctx.make_pointer_type(char_ty, Qualifiers::empty());
        assert_eq!(type_to_string(&ctx, ptr), "const char*");

        let const_ptr = ctx.make_pointer_type(char_ty, Qualifiers::CONST);
        assert_eq!(type_to_string(&ctx, const_ptr), "const char* const ");
    }

    #[test]
    fn array_types_print_their_size() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.predef.type_int;
        let array = ctx.make_array_type(int, 12, Qualifiers::empty());
        assert_eq!(type_to_string(&ctx, array), "int[12]");
    }

    #[test]
    fn statements_print_with_indentation() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.predef.type_int;
        let x = ctx.intern("x");
        let x = ctx.define_variable(x, int);
        let ref_x = Expression::new(ExprKind::Reference(x), int, pos(&ctx));

        let body = Statement::new(
            StatementKind::Compound(CompoundStatement {
                statements: vec![Statement::new(
                    StatementKind::Return(Some(ref_x)),
                    pos(&ctx),
                )],
                stmt_expr: false,
            }),
            pos(&ctx),
        );
        let iff = Statement::new(
            StatementKind::If {
                condition: int_lit(&ctx, "1"),
                true_statement: Box::new(body),
                false_statement: None,
            },
            pos(&ctx),
        );
        assert_eq!(
            statement_to_string(&ctx, &iff),
            "if (1) {\n\treturn x;\n}\n"
        );
    }

    #[test]
    fn print_ast_renders_declarations() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.predef.type_int;
        let x = ctx.intern("x");
        let var = ctx.define_variable(x, int);
        let value = int_lit(&ctx, "42");
        if let EntityKind::Variable(v) = &mut ctx.entity_mut(var).kind {
            v.decl.declared_storage_class = StorageClass::Static;
            v.initializer = Some(Initializer::Value(value));
        }

        let mut unit = TranslationUnit::default();
        unit.scope.append(var);
        assert_eq!(print_ast(&ctx, &unit), "static int x = 42;\n");
    }

    #[test]
    fn function_declarations_print_parameter_names() {
        let mut ctx = Context::new(Config::default());
        let int = ctx.predef.type_int;
        let void = ctx.predef.type_void;
        let fty = ctx.make_function_1_type(void, int);
        let f = ctx.intern("f");
        let func = ctx.define_function(f, fty);

        let n = ctx.intern("n");
        let param = ctx.alloc_entity(crate::entity::Entity {
            kind: EntityKind::Parameter(crate::entity::Parameter {
                decl: crate::entity::Declaration::new(int),
                address_taken: false,
                read: false,
            }),
            namespc: crate::entity::NamespaceKind::Normal,
            symbol: Some(n),
            pos: pos(&ctx),
            parent: Some(func),
        });
        if let EntityKind::Function(function) = &mut ctx.entity_mut(func).kind {
            function.parameters.append(param);
        }

        assert_eq!(entity_to_string(&ctx, func), "void f(int n);");
    }

    #[test]
    fn struct_definition_prints_members() {
        let mut ctx = Context::new(Config::default());
        let char_ty = ctx.make_atomic_type(AtomicKind::Char, Qualifiers::empty());
        let int_ty = ctx.predef.type_int;
        let s = ctx.intern("S");
        let compound = ctx.define_compound(Some(s), false);
        let a = ctx.intern("a");
        let b = ctx.intern("b");
        ctx.add_compound_member(compound, a, char_ty);
        ctx.add_compound_member(compound, b, int_ty);
        ctx.compound_mut(compound).complete = true;

        assert_eq!(
            entity_to_string(&ctx, compound),
            "struct S {\n\tchar a;\n\tint b;\n};"
        );
    }

    #[test]
    fn conditional_and_comma_print() {
        let ctx = Context::new(Config::default());
        let cond = Expression::new(
            ExprKind::Conditional(ConditionalExpr {
                condition: Box::new(int_lit(&ctx, "1")),
                true_expression: Some(Box::new(int_lit(&ctx, "2"))),
                false_expression: Box::new(int_lit(&ctx, "3")),
            }),
            ctx.predef.type_int,
            pos(&ctx),
        );
        assert_eq!(expression_to_string(&ctx, &cond), "1 ? 2 : 3");

        let elided = Expression::new(
            ExprKind::Conditional(ConditionalExpr {
                condition: Box::new(int_lit(&ctx, "1")),
                true_expression: None,
                false_expression: Box::new(int_lit(&ctx, "3")),
            }),
            ctx.predef.type_int,
            pos(&ctx),
        );
        assert_eq!(expression_to_string(&ctx, &elided), "1 ?: 3");
    }
}
