//! Represents strings with embedded variable references, e.g.
//! `cc -o $build/$name ${name}.c`, and mechanisms for expanding those into
//! plain strings.

use std::borrow::Cow;

/// An environment providing a mapping of variable name to variable value.
pub trait Env {
    fn get_var(&self, var: &str) -> Option<Cow<str>>;
}

/// One token within an EvalString, either literal text or a variable reference.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalPart<'a> {
    Literal(&'a str),
    VarRef(&'a str),
}

/// A parsed but unexpanded variable-reference string.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalString<T: AsRef<str>>(T);

impl<T: AsRef<str>> EvalString<T> {
    pub fn new(inner: T) -> Self {
        EvalString(inner)
    }

    /// Expand variable references using the first env that knows each
    /// variable.  Unknown variables expand to nothing.
    pub fn evaluate(&self, envs: &[&dyn Env]) -> String {
        let mut result = String::new();
        for part in self.parse() {
            match part {
                EvalPart::Literal(s) => result.push_str(s),
                EvalPart::VarRef(v) => {
                    if let Some(val) = envs.iter().find_map(|env| env.get_var(v)) {
                        result.push_str(&val);
                    }
                }
            }
        }
        result
    }

    pub fn parse(&self) -> EvalParser<'_> {
        EvalParser {
            buf: self.0.as_ref(),
            ofs: 0,
        }
    }
}

/// Splits a string into literal and variable-reference parts.
/// `$$` produces a literal `$`; a `$` not followed by a name is kept as-is.
pub struct EvalParser<'a> {
    buf: &'a str,
    ofs: usize,
}

fn is_var_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'-'
}

impl<'a> Iterator for EvalParser<'a> {
    type Item = EvalPart<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.buf[self.ofs..];
        if rest.is_empty() {
            return None;
        }
        let bytes = rest.as_bytes();
        if bytes[0] != b'$' {
            let end = rest.find('$').unwrap_or(rest.len());
            self.ofs += end;
            return Some(EvalPart::Literal(&rest[..end]));
        }
        match bytes.get(1) {
            Some(b'$') => {
                self.ofs += 2;
                Some(EvalPart::Literal("$"))
            }
            Some(b'{') => match rest.find('}') {
                Some(close) => {
                    self.ofs += close + 1;
                    Some(EvalPart::VarRef(&rest[2..close]))
                }
                None => {
                    self.ofs += rest.len();
                    Some(EvalPart::Literal(rest))
                }
            },
            _ => {
                let len = bytes[1..].iter().take_while(|&&c| is_var_char(c)).count();
                if len == 0 {
                    self.ofs += 1;
                    Some(EvalPart::Literal("$"))
                } else {
                    self.ofs += 1 + len;
                    Some(EvalPart::VarRef(&rest[1..1 + len]))
                }
            }
        }
    }
}
