use std::iter::Peekable;
use std::str::Chars;

/// Splits an extended XYZ comment line into `key=value` pairs.
///
/// Values may be double-quoted to contain whitespace. A key without `=`
/// is a flag and maps to `"T"`. Keys keep their original case.
pub fn split_key_values(line: &str) -> Result<Vec<(String, String)>, String> {
    let mut pairs = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        skip_whitespace(&mut chars);
        if chars.peek().is_none() {
            break;
        }

        let key = take_token(&mut chars, true)?;
        if key.is_empty() {
            return Err("empty key in comment line".to_string());
        }

        skip_whitespace(&mut chars);
        if chars.peek() == Some(&'=') {
            chars.next();
            skip_whitespace(&mut chars);
            let value = take_token(&mut chars, false)?;
            pairs.push((key, value));
        } else {
            pairs.push((key, "T".to_string()));
        }
    }

    Ok(pairs)
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

fn take_token(chars: &mut Peekable<Chars<'_>>, stop_at_eq: bool) -> Result<String, String> {
    let mut token = String::new();

    if chars.peek() == Some(&'"') {
        chars.next();
        loop {
            match chars.next() {
                Some('\\') => {
                    if let Some(escaped) = chars.next() {
                        token.push(escaped);
                    }
                }
                Some('"') => return Ok(token),
                Some(c) => token.push(c),
                None => return Err("unterminated quoted value".to_string()),
            }
        }
    }

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || (stop_at_eq && c == '=') {
            break;
        }
        token.push(c);
        chars.next();
    }
    Ok(token)
}

pub fn parse_flag(token: &str) -> Option<bool> {
    match token {
        "T" | "t" | "True" | "true" | "TRUE" | "1" => Some(true),
        "F" | "f" | "False" | "false" | "FALSE" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_quoted_and_bare_values() {
        let pairs =
            split_key_values(r#"Lattice="5.0 0 0 0 5.0 0 0 0 5.0" pbc="T T F" config_type=bulk"#)
                .unwrap();
        assert_eq!(
            pairs,
            vec![
                ("Lattice".to_string(), "5.0 0 0 0 5.0 0 0 0 5.0".to_string()),
                ("pbc".to_string(), "T T F".to_string()),
                ("config_type".to_string(), "bulk".to_string()),
            ]
        );
    }

    #[test]
    fn bare_key_is_a_true_flag() {
        let pairs = split_key_values("relaxed energy = -3.5").unwrap();
        assert_eq!(pairs[0], ("relaxed".to_string(), "T".to_string()));
        assert_eq!(pairs[1], ("energy".to_string(), "-3.5".to_string()));
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(split_key_values(r#"Lattice="1 0 0"#).is_err());
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("T"), Some(true));
        assert_eq!(parse_flag("false"), Some(false));
        assert_eq!(parse_flag("yes"), None);
    }
}
