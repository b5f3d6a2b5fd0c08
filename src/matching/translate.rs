use std::borrow::Cow;

/// DOS_STAR: any run of characters that does not consume the final period.
pub const DOS_STAR: char = '<';
/// DOS_QM: one character, or nothing at end-of-name / before a period.
pub const DOS_QM: char = '>';
/// DOS_DOT: a literal period, or nothing at end-of-name.
pub const DOS_DOT: char = '"';

/// Characters that carry meaning for the extended matcher and must be
/// escaped when they appear literally in a name.
const STRUCTURAL: &[char] = &['\\', DOS_DOT, DOS_STAR, DOS_QM];

/// Rewrite a legacy wildcard expression into the extended alphabet.
///
/// - `""`, `"*"`, `"."` and `"*.*"` become `"*"`
/// - a final `.` right after `*` turns that `*` into `<` (`*.` = "no extension")
/// - a `.` followed by `?` or `*` becomes `"`
/// - every `?` becomes `>`
///
/// Returns the input unchanged (borrowed) when no rewrite applies.
pub fn translate_win32_expression(expression: &str) -> Cow<'_, str> {
    if expression.is_empty() || expression == "*" || expression == "." || expression == "*.*" {
        return Cow::Borrowed("*");
    }

    let chars: Vec<char> = expression.chars().collect();
    let len = chars.len();
    let mut out = String::with_capacity(expression.len());
    let mut modified = false;

    for (i, &c) in chars.iter().enumerate() {
        match c {
            '.' => {
                modified = true;
                if i >= 1 && i == len - 1 && chars[i - 1] == '*' {
                    out.pop();
                    out.push(DOS_STAR);
                } else if i + 1 < len && (chars[i + 1] == '?' || chars[i + 1] == '*') {
                    out.push(DOS_DOT);
                } else {
                    out.push('.');
                }
            }
            '?' => {
                modified = true;
                out.push(DOS_QM);
            }
            _ => out.push(c),
        }
    }

    if modified {
        Cow::Owned(out)
    } else {
        Cow::Borrowed(expression)
    }
}

/// Escape `\`, `"`, `<` and `>` so the extended matcher treats them as
/// literals. Only needed where `\` is not a directory separator.
pub fn escape_structural(expression: &str) -> Cow<'_, str> {
    if !expression.contains(STRUCTURAL) {
        return Cow::Borrowed(expression);
    }

    let mut out = String::with_capacity(expression.len() + 4);
    for c in expression.chars() {
        if STRUCTURAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_all_forms_collapse() {
        assert_eq!(translate_win32_expression(""), "*");
        assert_eq!(translate_win32_expression("*"), "*");
        assert_eq!(translate_win32_expression("*.*"), "*");
        assert_eq!(translate_win32_expression("."), "*");
    }

    #[test]
    fn trailing_period_after_star() {
        assert_eq!(translate_win32_expression("*."), "<");
        assert_eq!(translate_win32_expression("foo*."), "foo<");
        // Not directly after a star: stays a period
        assert_eq!(translate_win32_expression("foo."), "foo.");
    }

    #[test]
    fn period_before_wildcard_becomes_dos_dot() {
        assert_eq!(translate_win32_expression("foo.*"), "foo\"*");
        assert_eq!(translate_win32_expression("foo.?"), "foo\">");
        assert_eq!(translate_win32_expression("*.t?t"), "*.t>t");
    }

    #[test]
    fn question_mark_becomes_dos_qm() {
        assert_eq!(translate_win32_expression("a?c"), "a>c");
        assert_eq!(translate_win32_expression("??"), ">>");
    }

    #[test]
    fn untouched_expression_is_borrowed() {
        assert!(matches!(translate_win32_expression("*.txt"), Cow::Owned(_)));
        assert!(matches!(translate_win32_expression("readme"), Cow::Borrowed(_)));
    }

    #[test]
    fn escape_only_structural_characters() {
        assert_eq!(escape_structural("plain*?"), "plain*?");
        assert_eq!(escape_structural("a<b>c"), "a\\<b\\>c");
        assert_eq!(escape_structural("q\"\\"), "q\\\"\\\\");
    }
}
