//! State-set wildcard automaton shared by the Simple and ExtendedDos modes.
//!
//! Every expression offset owns one state (`2 * offset`). `*` and `<` own a
//! second, "zero characters consumed" state (`2 * offset + 1`). The end of the
//! expression is the sentinel state `2 * len`. After each name character we
//! hold the sorted set of states that are still viable, so patterns like
//! `*a*a*a*b` never backtrack.

/// Wildcard characters that disable the `*suffix` fast path.
const SIMPLE_WILDCARDS: &[char] = &['*', '?'];
const EXTENDED_WILDCARDS: &[char] = &['*', '?', '\\', '<', '>', '"'];

/// Initial capacity of each state array. Grows on demand.
const INITIAL_STATES: usize = 16;

/// Run the automaton over `name`.
///
/// An empty expression or an empty name never matches.
pub(crate) fn match_pattern(
    expression: &[char],
    name: &[char],
    ignore_case: bool,
    extended: bool,
) -> bool {
    if expression.is_empty() || name.is_empty() {
        return false;
    }

    if expression[0] == '*' {
        // A lone `*` matches everything
        if expression.len() == 1 {
            return true;
        }

        let suffix = &expression[1..];
        let wildcards = if extended {
            EXTENDED_WILDCARDS
        } else {
            SIMPLE_WILDCARDS
        };
        if !suffix.iter().any(|c| wildcards.contains(c)) {
            // "ends with"
            if name.len() < suffix.len() {
                return false;
            }
            let tail = &name[name.len() - suffix.len()..];
            return tail
                .iter()
                .zip(suffix)
                .all(|(&n, &e)| chars_equal(e, n, ignore_case));
        }
    }

    let max_state = expression.len() * 2;

    let mut prior: Vec<usize> = Vec::with_capacity(INITIAL_STATES);
    let mut current: Vec<usize> = Vec::with_capacity(INITIAL_STATES);
    prior.push(0);

    let mut name_offset = 0;
    let mut name_char = '\0';
    let mut name_finished = false;

    // Walk one position beyond the end of the name: `>`, `"` and `<` can all
    // match zero characters there.
    while !name_finished {
        if name_offset < name.len() {
            name_char = name[name_offset];
            name_offset += 1;
        } else {
            if prior.last() == Some(&max_state) {
                break;
            }
            name_finished = true;
        }

        current.clear();
        let mut prior_index = 0;

        while prior_index < prior.len() {
            let mut expr_offset = (prior[prior_index] + 1) / 2;
            prior_index += 1;
            let emitted_from = current.len();

            'expression: while expr_offset < expression.len() {
                let mut state = expr_offset * 2;
                let mut expr_char = expression[expr_offset];

                // Every arm either stops this expression walk (`break`) or
                // falls through to one of the epsilon transitions below.
                let zero_or_more;
                let zero_only;

                if expr_char == '*' {
                    zero_or_more = true;
                    zero_only = false;
                } else if extended && expr_char == '<' {
                    // `<` may not consume the final period of the name.
                    let mut not_last_period = false;
                    if !name_finished && name_char == '.' {
                        not_last_period = name[name_offset..].contains(&'.');
                    }
                    if name_finished || name_char != '.' || not_last_period {
                        zero_or_more = true;
                        zero_only = false;
                    } else {
                        zero_or_more = false;
                        zero_only = true;
                    }
                } else {
                    // Everything else consumes exactly one name character.
                    state += 2;

                    if extended && expr_char == '>' {
                        if name_finished || name_char == '.' {
                            zero_or_more = false;
                            zero_only = false;
                        } else {
                            current.push(state);
                            break 'expression;
                        }
                    } else if extended && expr_char == '"' {
                        if name_finished {
                            zero_or_more = false;
                            zero_only = false;
                        } else {
                            if name_char == '.' {
                                current.push(state);
                            }
                            break 'expression;
                        }
                    } else {
                        let mut escaped = false;
                        if extended && expr_char == '\\' {
                            expr_offset += 1;
                            if expr_offset == expression.len() {
                                // Dangling escape terminates the expression.
                                current.push(max_state);
                                break 'expression;
                            }
                            state = expr_offset * 2 + 2;
                            expr_char = expression[expr_offset];
                            escaped = true;
                        }

                        if name_finished {
                            break 'expression;
                        }

                        if (expr_char == '?' && !escaped)
                            || chars_equal(expr_char, name_char, ignore_case)
                        {
                            current.push(state);
                        }
                        break 'expression;
                    }
                }

                if zero_or_more {
                    current.push(state);
                }
                if zero_or_more || zero_only {
                    current.push(state + 1);
                }
                expr_offset += 1;
                if expr_offset == expression.len() {
                    current.push(max_state);
                }
            }

            // Both arrays are ascending and duplicate-free. Skip every prior
            // state that the walk above has already covered.
            if prior_index < prior.len() {
                for &emitted in &current[emitted_from..] {
                    while prior_index < prior.len() && prior[prior_index] < emitted {
                        prior_index += 1;
                    }
                }
            }
        }

        if current.is_empty() {
            return false;
        }

        std::mem::swap(&mut prior, &mut current);
    }

    prior.last() == Some(&max_state)
}

/// Ordinal or case-insensitive comparison of a single character pair.
#[inline]
fn chars_equal(expr_char: char, name_char: char, ignore_case: bool) -> bool {
    if expr_char == name_char {
        return true;
    }
    if !ignore_case {
        return false;
    }
    let mut upper_expr = expr_char.to_uppercase();
    let mut upper_name = name_char.to_uppercase();
    loop {
        match (upper_expr.next(), upper_name.next()) {
            (None, None) => return true,
            (Some(a), Some(b)) if a == b => continue,
            _ => return false,
        }
    }
}
