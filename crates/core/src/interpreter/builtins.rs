//! Native functions available in every root scope.

use super::scope::{Function, NativeFunction, Scopes};
use super::token::Token;

pub fn install(scopes: &mut Scopes) {
    let root = scopes.root();
    let table: [(&str, Option<usize>, NativeFunction); 5] = [
        ("rect", Some(4), rect),
        ("min", None, min),
        ("max", None, max),
        ("abs", Some(1), abs),
        ("len", Some(1), len),
    ];
    for (name, arity, body) in table {
        scopes.add_function(
            root,
            Function {
                name: name.to_owned(),
                arity,
                body,
            },
        );
    }
}

fn integers(args: &[Token]) -> Result<Vec<i64>, String> {
    args.iter()
        .map(|t| {
            t.as_integer()
                .ok_or_else(|| format!("expected integer, found {}", t.type_name()))
        })
        .collect()
}

/// `rect(top, left, bottom, right)`
fn rect(args: &[Token]) -> Result<Token, String> {
    let sides = integers(args)?;
    Ok(Token::List(sides.into_iter().map(Token::Integer).collect()))
}

fn min(args: &[Token]) -> Result<Token, String> {
    integers(args)?
        .into_iter()
        .min()
        .map(Token::Integer)
        .ok_or_else(|| "min needs at least one argument".to_owned())
}

fn max(args: &[Token]) -> Result<Token, String> {
    integers(args)?
        .into_iter()
        .max()
        .map(Token::Integer)
        .ok_or_else(|| "max needs at least one argument".to_owned())
}

fn abs(args: &[Token]) -> Result<Token, String> {
    let n = integers(args)?[0];
    n.checked_abs()
        .map(Token::Integer)
        .ok_or_else(|| "overflow".to_owned())
}

fn len(args: &[Token]) -> Result<Token, String> {
    let n = match &args[0] {
        Token::String(s) => s.len(),
        Token::List(items) => items.len(),
        other => return Err(format!("cannot take the length of {}", other.type_name())),
    };
    Ok(Token::Integer(n as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Token]) -> Result<Token, crate::interpreter::scope::CallError> {
        let mut scopes = Scopes::new();
        install(&mut scopes);
        scopes.call(scopes.root(), name, args)
    }

    #[test]
    fn len_counts_bytes_and_items() {
        assert_eq!(call("len", &["abc".into()]), Ok(Token::Integer(3)));
        assert_eq!(
            call("len", &[Token::List(vec![Token::Integer(1), Token::Integer(2)])]),
            Ok(Token::Integer(2))
        );
    }

    #[test]
    fn min_rejects_empty_and_non_integers() {
        assert!(call("min", &[]).is_err());
        assert!(call("min", &["a".into()]).is_err());
    }

    #[test]
    fn rect_needs_four_sides() {
        assert!(call("rect", &[Token::Integer(1)]).is_err());
    }
}
