// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command-line rendering for echo and logs.
//!
//! An argument is left alone unless it is empty or contains whitespace or a
//! double quote. Otherwise it is wrapped in double quotes, embedded quotes
//! are escaped with a backslash, and backslashes that end up in front of a
//! quote (embedded or closing) are doubled. This is the convention the
//! Windows C runtime uses to split a command line back into arguments.

use std::borrow::Cow;

/// Quote a single argument if it needs it.
pub fn quote_arg(arg: &str) -> Cow<'_, str> {
    let needs_quotes = arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '"');
    if !needs_quotes {
        return Cow::Borrowed(arg);
    }

    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                out.extend(std::iter::repeat_n('\\', backslashes * 2 + 1));
                out.push('"');
                backslashes = 0;
            }
            _ => {
                out.extend(std::iter::repeat_n('\\', backslashes));
                out.push(c);
                backslashes = 0;
            }
        }
    }
    out.extend(std::iter::repeat_n('\\', backslashes * 2));
    out.push('"');
    Cow::Owned(out)
}

/// Render `command` and `args` as one quoted command line.
pub fn join_args<I, S>(command: &str, args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut line = quote_arg(command).into_owned();
    for arg in args {
        line.push(' ');
        line.push_str(&quote_arg(arg.as_ref()));
    }
    line
}
