//! printf/scanf format string checking.
//!
//! For a closed set of known format functions the format string is walked
//! specifier by specifier and each one is matched against the type of the
//! corresponding call argument. All findings are warnings gated by the
//! `format` warning flag.

use bitflags::bitflags;

use crate::ast::{CallExpr, ExprKind, Expression, UnaryOp};
use crate::context::Context;
use crate::diagnostic::SourcePosition;
use crate::printer::type_to_string;
use crate::symbol::StringValue;
use crate::types::{Qualifiers, TypeKind, TypeRef};

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    struct FormatFlags: u8 {
        const HASH  = 1 << 0;
        const ZERO  = 1 << 1;
        const MINUS = 1 << 2;
        const SPACE = 1 << 3;
        const PLUS  = 1 << 4;
        const TICK  = 1 << 5;
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum LengthModifier {
    None,
    CapitalL,
    Hh,
    H,
    L,
    Ll,
    J,
    T,
    Z,
    Q,
    /* only in Microsoft mode */
    W,
    I,
    I32,
    I64,
}

impl LengthModifier {
    fn name(self) -> &'static str {
        match self {
            LengthModifier::None => "",
            LengthModifier::CapitalL => "L",
            LengthModifier::Hh => "hh",
            LengthModifier::H => "h",
            LengthModifier::L => "l",
            LengthModifier::Ll => "ll",
            LengthModifier::J => "j",
            LengthModifier::T => "t",
            LengthModifier::Z => "z",
            LengthModifier::Q => "q",
            LengthModifier::W => "w",
            LengthModifier::I => "I",
            LengthModifier::I32 => "I32",
            LengthModifier::I64 => "I64",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum FormatKind {
    Printf,
    Scanf,
    Strftime,
    Strfmon,
}

struct FormatSpec {
    name: &'static str,
    kind: FormatKind,
    /// Index of the format string argument.
    fmt_idx: usize,
    /// Index of the first variadic argument.
    arg_idx: usize,
}

const fn spec(name: &'static str, kind: FormatKind, fmt_idx: usize, arg_idx: usize) -> FormatSpec {
    FormatSpec {
        name,
        kind,
        fmt_idx,
        arg_idx,
    }
}

/// The functions whose format strings are always checked, even without a
/// `format` attribute.
static BUILTIN_TABLE: &[FormatSpec] = &[
    spec("printf", FormatKind::Printf, 0, 1),
    spec("wprintf", FormatKind::Printf, 0, 1),
    spec("sprintf", FormatKind::Printf, 1, 2),
    spec("swprintf", FormatKind::Printf, 1, 2),
    spec("snprintf", FormatKind::Printf, 2, 3),
    spec("snwprintf", FormatKind::Printf, 2, 3),
    spec("fprintf", FormatKind::Printf, 1, 2),
    spec("fwprintf", FormatKind::Printf, 1, 2),
    spec("scanf", FormatKind::Scanf, 0, 1),
    spec("wscanf", FormatKind::Scanf, 0, 1),
    spec("sscanf", FormatKind::Scanf, 1, 2),
    spec("swscanf", FormatKind::Scanf, 1, 2),
    spec("fscanf", FormatKind::Scanf, 1, 2),
    spec("fwscanf", FormatKind::Scanf, 1, 2),
    spec("strftime", FormatKind::Strftime, 3, 4),
    spec("wcstrftime", FormatKind::Strftime, 3, 4),
    spec("strfmon", FormatKind::Strfmon, 3, 4),
    /* MS extensions */
    spec("_snprintf", FormatKind::Printf, 2, 3),
    spec("_snwprintf", FormatKind::Printf, 2, 3),
    spec("_scrintf", FormatKind::Printf, 0, 1),
    spec("_scwprintf", FormatKind::Printf, 0, 1),
    spec("printf_s", FormatKind::Printf, 0, 1),
    spec("wprintf_s", FormatKind::Printf, 0, 1),
    spec("sprintf_s", FormatKind::Printf, 3, 4),
    spec("swprintf_s", FormatKind::Printf, 3, 4),
    spec("fprintf_s", FormatKind::Printf, 1, 2),
    spec("fwprintf_s", FormatKind::Printf, 1, 2),
    spec("_sprintf_l", FormatKind::Printf, 1, 3),
    spec("_swprintf_l", FormatKind::Printf, 1, 3),
    spec("_printf_l", FormatKind::Printf, 0, 2),
    spec("_wprintf_l", FormatKind::Printf, 0, 2),
    spec("_fprintf_l", FormatKind::Printf, 1, 3),
    spec("_fwprintf_l", FormatKind::Printf, 1, 3),
    spec("_printf_s_l", FormatKind::Printf, 0, 2),
    spec("_wprintf_s_l", FormatKind::Printf, 0, 2),
    spec("_sprintf_s_l", FormatKind::Printf, 3, 5),
    spec("_swprintf_s_l", FormatKind::Printf, 3, 5),
    spec("_fprintf_s_l", FormatKind::Printf, 1, 3),
    spec("_fwprintf_s_l", FormatKind::Printf, 1, 3),
];

/// Cursor over a narrow or wide format string. Reading past the end yields
/// NUL; `at_end` tells a string that stopped at its terminator apart from
/// one with an embedded NUL.
struct FormatCursor<'a> {
    bytes: &'a [u8],
    size: usize,
    position: usize,
}

impl<'a> FormatCursor<'a> {
    fn narrow(value: &'a StringValue) -> Self {
        FormatCursor {
            bytes: &value.bytes,
            size: value.size,
            position: 0,
        }
    }

    fn wide(value: &'a StringValue) -> Self {
        // wide values keep one byte per code unit
        FormatCursor {
            bytes: &value.bytes,
            size: value.size,
            position: 0,
        }
    }

    fn byte(&self, index: usize) -> u8 {
        self.bytes.get(index).copied().unwrap_or(0)
    }

    fn first(&mut self) -> u8 {
        self.position = 0;
        self.byte(0)
    }

    fn next(&mut self) -> u8 {
        self.position += 1;
        self.byte(self.position)
    }

    fn rewind(&mut self) {
        self.position -= 1;
    }

    fn at_end(&self) -> bool {
        self.position + 1 == self.size
    }
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn skip_implicit_cast(expression: &Expression) -> &Expression {
    match &expression.kind {
        ExprKind::Unary(UnaryOp::ImplicitCast, value) => value,
        _ => expression,
    }
}

fn parse_length_modifier(cursor: &mut FormatCursor, fmt: &mut u8, ms_mode: bool) -> LengthModifier {
    match *fmt {
        b'h' => {
            *fmt = cursor.next();
            if *fmt == b'h' {
                *fmt = cursor.next();
                LengthModifier::Hh
            } else {
                LengthModifier::H
            }
        }
        b'l' => {
            *fmt = cursor.next();
            if *fmt == b'l' {
                *fmt = cursor.next();
                LengthModifier::Ll
            } else {
                LengthModifier::L
            }
        }
        b'L' => {
            *fmt = cursor.next();
            LengthModifier::CapitalL
        }
        b'j' => {
            *fmt = cursor.next();
            LengthModifier::J
        }
        b't' => {
            *fmt = cursor.next();
            LengthModifier::T
        }
        b'z' => {
            *fmt = cursor.next();
            LengthModifier::Z
        }
        b'q' => {
            *fmt = cursor.next();
            LengthModifier::Q
        }
        b'w' if ms_mode => {
            *fmt = cursor.next();
            LengthModifier::W
        }
        b'I' if ms_mode => {
            *fmt = cursor.next();
            let mut modifier = LengthModifier::I;
            if *fmt == b'3' {
                *fmt = cursor.next();
                if *fmt == b'2' {
                    *fmt = cursor.next();
                    modifier = LengthModifier::I32;
                } else {
                    cursor.rewind();
                }
            } else if *fmt == b'6' {
                *fmt = cursor.next();
                if *fmt == b'4' {
                    *fmt = cursor.next();
                    modifier = LengthModifier::I64;
                } else {
                    cursor.rewind();
                }
            }
            modifier
        }
        _ => LengthModifier::None,
    }
}

fn warn_invalid_length_modifier(
    ctx: &mut Context,
    pos: SourcePosition,
    modifier: LengthModifier,
    conversion: u8,
) {
    ctx.diagnostics.warn(
        pos,
        format!(
            "invalid length modifier '{}' for conversion specifier '%{}'",
            modifier.name(),
            conversion as char
        ),
    );
}

/// The expected argument type for a printf conversion, its implied
/// qualifiers and the allowed flag set. `None` means the combination was
/// invalid and has been warned about.
#[allow(clippy::type_complexity)]
fn printf_expected_type(
    ctx: &mut Context,
    pos: SourcePosition,
    fmt: u8,
    modifier: LengthModifier,
) -> Option<(TypeRef, Qualifiers, FormatFlags)> {
    use LengthModifier as M;
    let predef = ctx.predef;
    let result = match fmt {
        b'd' | b'i' => {
            let expected = match modifier {
                M::None => predef.type_int,
                M::Hh => predef.type_int, /* promoted signed char */
                M::H => predef.type_int,  /* promoted short */
                M::L => predef.type_long,
                M::Ll => predef.type_long_long,
                M::J => predef.type_intmax_t,
                M::Z => predef.type_ssize_t,
                M::T => predef.type_ptrdiff_t,
                M::I => predef.type_ptrdiff_t,
                M::I32 => predef.type_int32,
                M::I64 => predef.type_int64,
                _ => {
                    warn_invalid_length_modifier(ctx, pos, modifier, fmt);
                    return None;
                }
            };
            (
                expected,
                Qualifiers::empty(),
                FormatFlags::MINUS | FormatFlags::SPACE | FormatFlags::PLUS | FormatFlags::ZERO,
            )
        }
        b'o' | b'X' | b'x' | b'u' => {
            let allowed = if fmt == b'u' {
                FormatFlags::MINUS | FormatFlags::ZERO
            } else {
                FormatFlags::MINUS | FormatFlags::HASH | FormatFlags::ZERO
            };
            let expected = match modifier {
                M::None => predef.type_unsigned_int,
                M::Hh => predef.type_int, /* promoted unsigned char */
                M::H => predef.type_int,  /* promoted unsigned short */
                M::L => predef.type_unsigned_long,
                M::Ll => predef.type_unsigned_long_long,
                M::J => predef.type_uintmax_t,
                M::Z => predef.type_size_t,
                M::T => predef.type_uptrdiff_t,
                M::I => predef.type_size_t,
                M::I32 => predef.type_unsigned_int32,
                M::I64 => predef.type_unsigned_int64,
                _ => {
                    warn_invalid_length_modifier(ctx, pos, modifier, fmt);
                    return None;
                }
            };
            (expected, Qualifiers::empty(), allowed)
        }
        b'A' | b'a' | b'E' | b'e' | b'F' | b'f' | b'G' | b'g' => {
            let expected = match modifier {
                /* l modifier is ignored */
                M::L | M::None => predef.type_double,
                M::CapitalL => predef.type_long_double,
                _ => {
                    warn_invalid_length_modifier(ctx, pos, modifier, fmt);
                    return None;
                }
            };
            (
                expected,
                Qualifiers::empty(),
                FormatFlags::MINUS
                    | FormatFlags::SPACE
                    | FormatFlags::PLUS
                    | FormatFlags::HASH
                    | FormatFlags::ZERO,
            )
        }
        b'C' => {
            if modifier != M::None {
                warn_invalid_length_modifier(ctx, pos, modifier, fmt);
                return None;
            }
            (predef.type_wchar_t, Qualifiers::empty(), FormatFlags::empty())
        }
        b'c' => {
            let expected = match modifier {
                M::None => predef.type_int, /* promoted char */
                M::L => predef.type_wint_t,
                M::W => predef.type_wchar_t,
                _ => {
                    warn_invalid_length_modifier(ctx, pos, modifier, fmt);
                    return None;
                }
            };
            (expected, Qualifiers::empty(), FormatFlags::empty())
        }
        b'S' => {
            if modifier != M::None {
                warn_invalid_length_modifier(ctx, pos, modifier, fmt);
                return None;
            }
            (predef.type_wchar_t_ptr, Qualifiers::CONST, FormatFlags::MINUS)
        }
        b's' => {
            let expected = match modifier {
                M::None => predef.type_char_ptr,
                M::L | M::W => predef.type_wchar_t_ptr,
                _ => {
                    warn_invalid_length_modifier(ctx, pos, modifier, fmt);
                    return None;
                }
            };
            (expected, Qualifiers::CONST, FormatFlags::MINUS)
        }
        b'p' => {
            if modifier != M::None {
                warn_invalid_length_modifier(ctx, pos, modifier, fmt);
                return None;
            }
            (predef.type_void_ptr, Qualifiers::empty(), FormatFlags::empty())
        }
        b'n' => {
            let expected = match modifier {
                M::None => predef.type_int_ptr,
                M::Hh => predef.type_signed_char_ptr,
                M::H => predef.type_short_ptr,
                M::L => predef.type_long_ptr,
                M::Ll => predef.type_long_long_ptr,
                M::J => predef.type_intmax_t_ptr,
                M::Z => predef.type_ssize_t_ptr,
                M::T => predef.type_ptrdiff_t_ptr,
                _ => {
                    warn_invalid_length_modifier(ctx, pos, modifier, fmt);
                    return None;
                }
            };
            (expected, Qualifiers::empty(), FormatFlags::empty())
        }
        _ => return None,
    };
    Some(result)
}

fn scanf_expected_type(
    ctx: &mut Context,
    pos: SourcePosition,
    fmt: u8,
    modifier: LengthModifier,
) -> Option<TypeRef> {
    use LengthModifier as M;
    let predef = ctx.predef;
    let expected = match fmt {
        b'd' | b'i' => match modifier {
            M::None => predef.type_int,
            M::Hh => predef.type_signed_char,
            M::H => predef.type_short,
            M::L => predef.type_long,
            M::Ll => predef.type_long_long,
            M::J => predef.type_intmax_t,
            M::Z => predef.type_ssize_t,
            M::T => predef.type_ptrdiff_t,
            M::I => predef.type_ptrdiff_t,
            M::I32 => predef.type_int32,
            M::I64 => predef.type_int64,
            _ => {
                warn_invalid_length_modifier(ctx, pos, modifier, fmt);
                return None;
            }
        },
        b'o' | b'X' | b'x' | b'u' => match modifier {
            M::None => predef.type_unsigned_int,
            M::Hh => predef.type_unsigned_char,
            M::H => predef.type_unsigned_short,
            M::L => predef.type_unsigned_long,
            M::Ll => predef.type_unsigned_long_long,
            M::J => predef.type_uintmax_t,
            M::Z => predef.type_size_t,
            M::T => predef.type_uptrdiff_t,
            M::I => predef.type_size_t,
            M::I32 => predef.type_unsigned_int32,
            M::I64 => predef.type_unsigned_int64,
            _ => {
                warn_invalid_length_modifier(ctx, pos, modifier, fmt);
                return None;
            }
        },
        b'A' | b'a' | b'E' | b'e' | b'F' | b'f' | b'G' | b'g' => match modifier {
            /* l modifier is ignored */
            M::L | M::None => predef.type_double,
            M::CapitalL => predef.type_long_double,
            _ => {
                warn_invalid_length_modifier(ctx, pos, modifier, fmt);
                return None;
            }
        },
        b'C' => {
            if modifier != M::None {
                warn_invalid_length_modifier(ctx, pos, modifier, fmt);
                return None;
            }
            predef.type_wchar_t
        }
        b'c' => match modifier {
            M::None => predef.type_int, /* promoted char */
            M::L => predef.type_wint_t,
            M::W => predef.type_wchar_t,
            _ => {
                warn_invalid_length_modifier(ctx, pos, modifier, fmt);
                return None;
            }
        },
        b'S' => {
            if modifier != M::None {
                warn_invalid_length_modifier(ctx, pos, modifier, fmt);
                return None;
            }
            predef.type_wchar_t
        }
        b's' | b'[' => match modifier {
            M::None => predef.type_char,
            M::L | M::W => predef.type_wchar_t,
            _ => {
                warn_invalid_length_modifier(ctx, pos, modifier, fmt);
                return None;
            }
        },
        b'p' => {
            if modifier != M::None {
                warn_invalid_length_modifier(ctx, pos, modifier, fmt);
                return None;
            }
            predef.type_void_ptr
        }
        b'n' => match modifier {
            M::None => predef.type_int,
            M::Hh => predef.type_signed_char,
            M::H => predef.type_short,
            M::L => predef.type_long,
            M::Ll => predef.type_long_long,
            M::J => predef.type_intmax_t,
            M::Z => predef.type_ssize_t,
            M::T => predef.type_ptrdiff_t,
            _ => {
                warn_invalid_length_modifier(ctx, pos, modifier, fmt);
                return None;
            }
        },
        _ => return None,
    };
    Some(expected)
}

fn warn_argument_type(
    ctx: &mut Context,
    pos: SourcePosition,
    arg_type: TypeRef,
    modifier: LengthModifier,
    fmt: u8,
    num_fmt: usize,
) {
    let type_name = type_to_string(ctx, arg_type);
    ctx.diagnostics.warn(
        pos,
        format!(
            "argument type '{}' does not match conversion specifier '%{}{}' at position {}",
            type_name,
            modifier.name(),
            fmt as char,
            num_fmt
        ),
    );
}

/// Walks one printf format string. Returns the number of conversion
/// specifiers, or `None` when checking had to be abandoned.
fn internal_check_printf_format(
    ctx: &mut Context,
    fmt_expr: &Expression,
    args: &[Expression],
    spec: &FormatSpec,
) -> Option<usize> {
    let fmt_expr = skip_implicit_cast(fmt_expr);

    let mut cursor = match &fmt_expr.kind {
        ExprKind::StringLiteral(value) => FormatCursor::narrow(value),
        ExprKind::WideStringLiteral(value) => FormatCursor::wide(value),
        ExprKind::Conditional(conditional) => {
            // check both branches and assume the worst
            let t = conditional
                .true_expression
                .as_deref()
                .unwrap_or(&conditional.condition);
            let nt = internal_check_printf_format(ctx, t, args, spec);
            let nf = internal_check_printf_format(ctx, &conditional.false_expression, args, spec);
            return match (nt, nf) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            };
        }
        _ => return None,
    };

    let ms_mode = ctx
        .config
        .c_mode
        .contains(crate::config::CMode::MS);
    let pos = fmt_expr.pos;
    let mut args_iter = args.iter();
    let mut arg = args_iter.next();
    let mut num_fmt: usize = 0;

    let mut fmt = cursor.first();
    while fmt != 0 {
        if fmt != b'%' {
            fmt = cursor.next();
            continue;
        }
        fmt = cursor.next();
        if fmt == b'%' {
            fmt = cursor.next();
            continue;
        }

        num_fmt += 1;

        let mut fmt_flags = FormatFlags::empty();
        if fmt == b'0' {
            fmt = cursor.next();
            fmt_flags |= FormatFlags::ZERO;
        }

        /* argument selector or minimum field width */
        if is_digit(fmt) {
            while is_digit(fmt) {
                fmt = cursor.next();
            }
            if fmt == b'$' {
                /* positional arguments are not checked */
                return None;
            }
            /* ... it was a minimum field width */
        } else {
            /* flags */
            loop {
                let flag = match fmt {
                    b'#' => FormatFlags::HASH,
                    b'0' => FormatFlags::ZERO,
                    b'-' => FormatFlags::MINUS,
                    b'\'' => FormatFlags::TICK,
                    b' ' => {
                        if fmt_flags.contains(FormatFlags::PLUS) {
                            ctx.diagnostics.warn(
                                pos,
                                format!(
                                    "' ' is overridden by prior '+' in conversion specification {}",
                                    num_fmt
                                ),
                            );
                        }
                        FormatFlags::SPACE
                    }
                    b'+' => {
                        if fmt_flags.contains(FormatFlags::SPACE) {
                            ctx.diagnostics.warn(
                                pos,
                                format!(
                                    "'+' overrides prior ' ' in conversion specification {}",
                                    num_fmt
                                ),
                            );
                        }
                        FormatFlags::PLUS
                    }
                    _ => break,
                };
                if fmt_flags.contains(flag) {
                    ctx.diagnostics.warn(
                        pos,
                        format!(
                            "repeated flag '{}' in conversion specification {}",
                            fmt as char, num_fmt
                        ),
                    );
                }
                fmt_flags |= flag;
                fmt = cursor.next();
            }

            /* minimum field width */
            if fmt == b'*' {
                fmt = cursor.next();
                match arg {
                    None => {
                        ctx.diagnostics.warn(
                            pos,
                            format!(
                                "missing argument for '*' field width in conversion specification {}",
                                num_fmt
                            ),
                        );
                        return None;
                    }
                    Some(a) => {
                        if a.ty != ctx.predef.type_int {
                            let type_name = type_to_string(ctx, a.ty);
                            ctx.diagnostics.warn(
                                pos,
                                format!(
                                    "argument for '*' field width in conversion specification {} is not an 'int', but an '{}'",
                                    num_fmt, type_name
                                ),
                            );
                        }
                        arg = args_iter.next();
                    }
                }
            } else {
                while is_digit(fmt) {
                    fmt = cursor.next();
                }
            }
        }

        /* precision */
        if fmt == b'.' {
            fmt = cursor.next();
            if fmt == b'*' {
                fmt = cursor.next();
                match arg {
                    None => {
                        ctx.diagnostics.warn(
                            pos,
                            format!(
                                "missing argument for '*' precision in conversion specification {}",
                                num_fmt
                            ),
                        );
                        return None;
                    }
                    Some(a) => {
                        if a.ty != ctx.predef.type_int {
                            let type_name = type_to_string(ctx, a.ty);
                            ctx.diagnostics.warn(
                                pos,
                                format!(
                                    "argument for '*' precision in conversion specification {} is not an 'int', but an '{}'",
                                    num_fmt, type_name
                                ),
                            );
                        }
                        arg = args_iter.next();
                    }
                }
            } else {
                /* digit string may be omitted */
                while is_digit(fmt) {
                    fmt = cursor.next();
                }
            }
        }

        let fmt_mod = parse_length_modifier(&mut cursor, &mut fmt, ms_mode);

        if fmt == 0 {
            ctx.diagnostics
                .warn(pos, "dangling % in format string".into());
            break;
        }

        let expected = printf_expected_type(ctx, pos, fmt, fmt_mod);
        let expected = match expected {
            Some(expected) => Some(expected),
            None if !matches!(
                fmt,
                b'd' | b'i'
                    | b'o'
                    | b'X'
                    | b'x'
                    | b'u'
                    | b'A'
                    | b'a'
                    | b'E'
                    | b'e'
                    | b'F'
                    | b'f'
                    | b'G'
                    | b'g'
                    | b'C'
                    | b'c'
                    | b'S'
                    | b's'
                    | b'p'
                    | b'n'
            ) =>
            {
                /* unknown conversion specifier */
                ctx.diagnostics.warn(
                    pos,
                    format!(
                        "encountered unknown conversion specifier '%{}' at position {}",
                        fmt as char, num_fmt
                    ),
                );
                if arg.is_none() {
                    ctx.diagnostics
                        .warn(pos, "too few arguments for format string".into());
                    return None;
                }
                None
            }
            None => None, /* invalid length modifier, already warned */
        };

        if let Some((expected_type, expected_qual, allowed_flags)) = expected {
            let wrong_flags = fmt_flags & !allowed_flags;
            if !wrong_flags.is_empty() {
                let mut wrong = String::new();
                if wrong_flags.contains(FormatFlags::HASH) {
                    wrong.push('#');
                }
                if wrong_flags.contains(FormatFlags::ZERO) {
                    wrong.push('0');
                }
                if wrong_flags.contains(FormatFlags::MINUS) {
                    wrong.push('-');
                }
                if wrong_flags.contains(FormatFlags::SPACE) {
                    wrong.push(' ');
                }
                if wrong_flags.contains(FormatFlags::PLUS) {
                    wrong.push('+');
                }
                if wrong_flags.contains(FormatFlags::TICK) {
                    wrong.push('\'');
                }
                ctx.diagnostics.warn(
                    pos,
                    format!(
                        "invalid format flags \"{}\" in conversion specification %{} at position {}",
                        wrong, fmt as char, num_fmt
                    ),
                );
            }

            let a = match arg {
                Some(a) => a,
                None => {
                    ctx.diagnostics
                        .warn(pos, "too few arguments for format string".into());
                    return None;
                }
            };

            let arg_type = a.ty;
            let arg_skip = ctx.skip_typeref(arg_type);
            let expected_skip = ctx.skip_typeref(expected_type);

            let matches = if fmt == b'p' && ctx.is_type_pointer(arg_skip) {
                /* allow any pointer type for %p, not just void* */
                true
            } else if ctx.is_type_pointer(expected_skip) {
                if ctx.is_type_pointer(arg_skip) {
                    let expected_to = match &ctx.ty(expected_skip).kind {
                        TypeKind::Pointer(pointer) => pointer.points_to,
                        _ => unreachable!(),
                    };
                    let arg_to = match &ctx.ty(arg_skip).kind {
                        TypeKind::Pointer(pointer) => pointer.points_to,
                        _ => unreachable!(),
                    };
                    let expected_to = ctx.skip_typeref(expected_to);
                    let arg_to = ctx.skip_typeref(arg_to);
                    let extra_quals = ctx.ty(arg_to).qualifiers & !expected_qual;
                    extra_quals.is_empty()
                        && ctx.get_unqualified_type(arg_to) == expected_to
                } else {
                    false
                }
            } else {
                ctx.get_unqualified_type(arg_skip) == expected_skip
            };

            if !matches && ctx.is_type_valid(arg_skip) {
                warn_argument_type(ctx, pos, arg_type, fmt_mod, fmt, num_fmt);
            }
        }

        arg = args_iter.next();
        fmt = cursor.next();
    }

    if !cursor.at_end() {
        ctx.diagnostics
            .warn(pos, "format string contains '\\0'".into());
    }
    Some(num_fmt)
}

fn check_printf_format(ctx: &mut Context, arguments: &[Expression], spec: &FormatSpec) {
    if spec.fmt_idx >= arguments.len() {
        return;
    }
    let fmt_expr = &arguments[spec.fmt_idx];
    let var_args = if spec.arg_idx <= arguments.len() {
        &arguments[spec.arg_idx..]
    } else {
        &[]
    };

    let num_fmt = match internal_check_printf_format(ctx, fmt_expr, var_args, spec) {
        Some(num_fmt) => num_fmt,
        None => return,
    };

    let num_args = var_args.len();
    if num_args > num_fmt {
        ctx.diagnostics.warn(
            fmt_expr.pos,
            format!(
                "{} argument{} but only {} format specifier{}",
                num_args,
                if num_args != 1 { "s" } else { "" },
                num_fmt,
                if num_fmt != 1 { "s" } else { "" }
            ),
        );
    }
}

fn check_scanf_format(ctx: &mut Context, arguments: &[Expression], spec: &FormatSpec) {
    if spec.fmt_idx >= arguments.len() {
        return;
    }
    let fmt_expr = skip_implicit_cast(&arguments[spec.fmt_idx]);

    let mut cursor = match &fmt_expr.kind {
        ExprKind::StringLiteral(value) => FormatCursor::narrow(value),
        ExprKind::WideStringLiteral(value) => FormatCursor::wide(value),
        _ => return,
    };

    let var_args = if spec.arg_idx <= arguments.len() {
        &arguments[spec.arg_idx..]
    } else {
        &[]
    };

    let ms_mode = ctx
        .config
        .c_mode
        .contains(crate::config::CMode::MS);
    let pos = fmt_expr.pos;
    let mut args_iter = var_args.iter();
    let mut arg = args_iter.next();
    let mut num_fmt: usize = 0;

    let mut fmt = cursor.first();
    while fmt != 0 {
        if fmt != b'%' {
            fmt = cursor.next();
            continue;
        }
        fmt = cursor.next();
        if fmt == b'%' {
            fmt = cursor.next();
            continue;
        }

        num_fmt += 1;

        let fmt_mod = parse_length_modifier(&mut cursor, &mut fmt, ms_mode);

        if fmt == 0 {
            ctx.diagnostics
                .warn(pos, "dangling % in format string".into());
            break;
        }

        let known_conversion = matches!(
            fmt,
            b'd' | b'i'
                | b'o'
                | b'X'
                | b'x'
                | b'u'
                | b'A'
                | b'a'
                | b'E'
                | b'e'
                | b'F'
                | b'f'
                | b'G'
                | b'g'
                | b'C'
                | b'c'
                | b'S'
                | b's'
                | b'['
                | b'p'
                | b'n'
        );
        let expected = if known_conversion {
            scanf_expected_type(ctx, pos, fmt, fmt_mod)
        } else {
            ctx.diagnostics.warn(
                pos,
                format!(
                    "encountered unknown conversion specifier '%{}' at position {}",
                    fmt as char, num_fmt
                ),
            );
            if arg.is_none() {
                ctx.diagnostics
                    .warn(pos, "too few arguments for format string".into());
                return;
            }
            None
        };

        if let Some(expected_type) = expected {
            let a = match arg {
                Some(a) => a,
                None => {
                    ctx.diagnostics
                        .warn(pos, "too few arguments for format string".into());
                    return;
                }
            };

            let arg_type = a.ty;
            let arg_skip = ctx.skip_typeref(arg_type);
            let expected_skip = ctx.skip_typeref(expected_type);

            let matches = if !ctx.is_type_pointer(arg_skip) {
                false
            } else {
                let pointee = match &ctx.ty(arg_skip).kind {
                    TypeKind::Pointer(pointer) => pointer.points_to,
                    _ => unreachable!(),
                };
                let ptr_skip = ctx.skip_typeref(pointee);

                if fmt == b'p' && ctx.is_type_pointer(ptr_skip) {
                    /* allow any pointer-to-pointer type for %p */
                    true
                } else if ctx
                    .ty(ptr_skip)
                    .qualifiers
                    .intersects(Qualifiers::CONST | Qualifiers::VOLATILE)
                {
                    /* scanf writes through the pointer */
                    false
                } else {
                    let unqual_ptr = ctx.get_unqualified_type(ptr_skip);
                    if unqual_ptr == expected_skip {
                        true
                    } else if expected_skip == ctx.predef.type_char {
                        /* char matches both signed char and unsigned char */
                        unqual_ptr == ctx.predef.type_signed_char
                            || unqual_ptr == ctx.predef.type_unsigned_char
                    } else {
                        false
                    }
                }
            };

            if !matches && ctx.is_type_valid(arg_skip) {
                warn_argument_type(ctx, pos, arg_type, fmt_mod, fmt, num_fmt);
            }
        }

        arg = args_iter.next();
        fmt = cursor.next();
    }

    if !cursor.at_end() {
        ctx.diagnostics
            .warn(pos, "format string contains '\\0'".into());
    }

    let remaining = args_iter.count() + arg.map_or(0, |_| 1);
    if remaining > 0 {
        let num_args = num_fmt + remaining;
        ctx.diagnostics.warn(
            pos,
            format!(
                "{} argument{} but only {} format specifier{}",
                num_args,
                if num_args != 1 { "s" } else { "" },
                num_fmt,
                if num_fmt != 1 { "s" } else { "" }
            ),
        );
    }
}

/// Checks the format string of a call to one of the known format
/// functions. Does nothing when the callee is not recognized or the
/// `format` warning is disabled.
pub fn check_format(ctx: &mut Context, call: &CallExpr) {
    if !ctx.diagnostics.warnings.format {
        return;
    }

    let function = skip_implicit_cast(&call.function);
    let entity = match &function.kind {
        ExprKind::Reference(entity) => *entity,
        _ => return,
    };
    let symbol = match ctx.entity(entity).symbol {
        Some(symbol) => symbol,
        None => return,
    };

    let spec = {
        let name = ctx.name(symbol);
        BUILTIN_TABLE.iter().find(|spec| spec.name == name)
    };
    let spec = match spec {
        Some(spec) => spec,
        None => return,
    };

    match spec.kind {
        FormatKind::Printf => check_printf_format(ctx, &call.arguments, spec),
        FormatKind::Scanf => check_scanf_format(ctx, &call.arguments, spec),
        /* not implemented */
        FormatKind::Strftime | FormatKind::Strfmon => {}
    }
}
