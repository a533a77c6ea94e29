//! Generation of the Python programs that run inside the debuggee.
//!
//! Two kinds of programs exist:
//! - predicates: a single expression evaluating to `True` or `False`,
//! - save programs: statements that write the value of an expression to a file, print
//!   [`SAVED_SENTINEL`] on success and raise a `RuntimeError` otherwise. A failed import is
//!   reported as `RuntimeError('<MISSING_MODULE_SENTINEL>:<module>: <message>')`.
//!
//! Every binding a program creates starts with `__plysnap_` and is removed before the
//! program finishes, so nothing is left in the user's frame.

use std::fmt::Write;

/// Printed by a save program that completed.
pub const SAVED_SENTINEL: &str = "__PLYSNAP_SAVED__";
/// Prefix of the error raised when the save program could not import a module.
pub const MISSING_MODULE_SENTINEL: &str = "__PLYSNAP_MISSING_MODULE__";

/// Name under which predicate and save bodies see the inspected value.
pub const VALUE: &str = "__plysnap_v";
/// Name under which save bodies see the destination path.
pub const PATH: &str = "__plysnap_path";

const SAVE_FN: &str = "__plysnap_save";
const EXC: &str = "__plysnap_exc";

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ProgramError {
    #[error("empty expression")]
    EmptyExpression,
    #[error("expression `{0}` spans several lines")]
    MultiLineExpression(String),
}

fn check_expression(expression: &str) -> Result<&str, ProgramError> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err(ProgramError::EmptyExpression);
    }
    if expression.contains(['\n', '\r']) {
        return Err(ProgramError::MultiLineExpression(expression.to_string()));
    }
    Ok(expression)
}

/// Python string literal for `s`.
pub fn py_str(s: &str) -> String {
    let mut lit = String::with_capacity(s.len() + 2);
    lit.push('\'');
    for c in s.chars() {
        match c {
            '\\' => lit.push_str("\\\\"),
            '\'' => lit.push_str("\\'"),
            '\n' => lit.push_str("\\n"),
            '\r' => lit.push_str("\\r"),
            '\t' => lit.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                _ = write!(lit, "\\x{:02x}", c as u32);
            }
            c => lit.push(c),
        }
    }
    lit.push('\'');
    lit
}

/// A boolean expression over [`VALUE`] applied to a user expression.
///
/// The user expression is evaluated as the argument of an immediately invoked lambda, so
/// it is resolved in the debuggee's frame while the lambda parameter never escapes.
pub fn predicate(expression: &str, test: &str) -> Result<String, ProgramError> {
    let expression = check_expression(expression)?;
    Ok(format!("(lambda {VALUE}: bool({test}))(({expression}))"))
}

/// Statement program that stores the value of an expression into a file.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveProgram {
    /// Python module the body cannot work without.
    pub module: &'static str,
    pub source: String,
}

/// Wrap a save `body` (statements using [`VALUE`] and [`PATH`]) into a self-contained
/// program.
pub fn save_program(
    expression: &str,
    destination: &str,
    module: &'static str,
    body: &str,
) -> Result<SaveProgram, ProgramError> {
    let expression = check_expression(expression)?;

    let mut src = String::new();
    _ = writeln!(src, "def {SAVE_FN}({VALUE}, {PATH}):");
    for line in body.lines() {
        if line.trim().is_empty() {
            continue;
        }
        _ = writeln!(src, "    {line}");
    }
    _ = writeln!(src, "try:");
    _ = writeln!(src, "    {SAVE_FN}(({expression}), {})", py_str(destination));
    _ = writeln!(src, "    print({})", py_str(SAVED_SENTINEL));
    _ = writeln!(src, "except ImportError as {EXC}:");
    _ = writeln!(
        src,
        "    raise RuntimeError({} + ':' + (getattr({EXC}, 'name', None) or {}) + ': ' + str({EXC})) from None",
        py_str(MISSING_MODULE_SENTINEL),
        py_str(module),
    );
    _ = writeln!(src, "except Exception as {EXC}:");
    _ = writeln!(
        src,
        "    raise RuntimeError(type({EXC}).__name__ + ': ' + str({EXC})) from None"
    );
    _ = writeln!(src, "finally:");
    _ = writeln!(src, "    del {SAVE_FN}");

    Ok(SaveProgram {
        module,
        source: src,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_py_str() {
        struct TestCase {
            input: &'static str,
            expected: &'static str,
        }
        let cases = [
            TestCase {
                input: "/tmp/plysnap/s1/pts_1.ply",
                expected: "'/tmp/plysnap/s1/pts_1.ply'",
            },
            TestCase {
                input: r"C:\Users\o'neil\a.ply",
                expected: r"'C:\\Users\\o\'neil\\a.ply'",
            },
            TestCase {
                input: "a\nb\x01",
                expected: r"'a\nb\x01'",
            },
        ];
        for tc in cases {
            assert_eq!(py_str(tc.input), tc.expected);
        }
    }

    #[test]
    fn test_predicate() {
        let p = predicate(" a[0].points ", "len(__plysnap_v) == 3").unwrap();
        assert_eq!(
            p,
            "(lambda __plysnap_v: bool(len(__plysnap_v) == 3))((a[0].points))"
        );
        assert!(!p.contains('\n'));

        assert_eq!(predicate("  ", "True"), Err(ProgramError::EmptyExpression));
        assert!(matches!(
            predicate("a\nb", "True"),
            Err(ProgramError::MultiLineExpression(_))
        ));
    }

    #[test]
    fn test_save_program_shape() {
        let program = save_program(
            "cloud",
            "/tmp/x.ply",
            "open3d",
            "import open3d\n\nopen3d.io.write_point_cloud(__plysnap_path, __plysnap_v)\n",
        )
        .unwrap();
        let lines: Vec<&str> = program.source.lines().collect();

        assert_eq!(lines[0], "def __plysnap_save(__plysnap_v, __plysnap_path):");
        assert_eq!(lines[1], "    import open3d");
        assert_eq!(
            lines[2],
            "    open3d.io.write_point_cloud(__plysnap_path, __plysnap_v)"
        );
        assert_eq!(lines[3], "try:");
        assert_eq!(lines[4], "    __plysnap_save((cloud), '/tmp/x.ply')");
        assert!(program.source.contains("print('__PLYSNAP_SAVED__')"));
        assert!(program.source.contains("'__PLYSNAP_MISSING_MODULE__'"));
        assert_eq!(lines.last(), Some(&"    del __plysnap_save"));
        assert_eq!(program.module, "open3d");
    }
}
