use std::borrow::Cow;

/// Escape a DN attribute value ([RFC 4514](https://tools.ietf.org/html/rfc4514) section 2.4).
///
/// Leading/trailing spaces, a leading `#`, and the characters `,+"\<>;=`
/// must be escaped for the value to round-trip through a DN's string
/// representation.
pub fn dn_escape<'a, S: Into<Cow<'a, str>>>(val: S) -> Cow<'a, str> {
    let val = val.into();
    let len = val.chars().count();
    let mut output = String::new();
    let mut changed = false;
    for (i, c) in val.chars().enumerate() {
        let needs_escape = matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=')
            || (i == 0 && (c == ' ' || c == '#'))
            || (i + 1 == len && c == ' ');
        if needs_escape {
            output.push('\\');
            changed = true;
        }
        output.push(c);
    }
    if changed {
        Cow::Owned(output)
    } else {
        val
    }
}

/// Escape a filter literal.
///
/// Literal values appearing in an LDAP filter can contain any character,
/// but some characters (parentheses, asterisk, backslash, NUL) must be
/// escaped in the filter's string representation. This function does the
/// escaping.
///
/// The argument, `lit`, can be owned or borrowed. The function doesn't
/// allocate the return value unless there's need to escape the input.
pub fn ldap_escape<'a, S: Into<Cow<'a, str>>>(lit: S) -> Cow<'a, str> {
    #[inline]
    fn needs_escape(c: u8) -> bool {
        c == b'\\' || c == b'*' || c == b'(' || c == b')' || c == 0
    }

    #[inline]
    fn xdigit(c: u8) -> u8 {
        c + if c < 10 { b'0' } else { b'a' - 10 }
    }

    let lit = lit.into();
    let mut output = None;
    for (i, &c) in lit.as_bytes().iter().enumerate() {
        if needs_escape(c) {
            if output.is_none() {
                output = Some(Vec::with_capacity(lit.len() + 12)); // guess: up to 4 escaped chars
                output.as_mut().unwrap().extend(lit[..i].as_bytes());
            }
            let output = output.as_mut().unwrap();
            output.push(b'\\');
            output.push(xdigit(c >> 4));
            output.push(xdigit(c & 0xF));
        } else if let Some(ref mut output) = output {
            output.push(c);
        }
    }
    if let Some(output) = output {
        // unchecked conversion is safe here: we receive a valid
        // UTF-8 value, by definition, and only replace single ASCII
        // bytes with ASCII byte sequences
        Cow::Owned(unsafe { String::from_utf8_unchecked(output) })
    } else {
        lit.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_filter_specials() {
        assert_eq!(ldap_escape("a(b)c*d\\e\0f"), r"a\28b\29c\2ad\5ce\00f");
    }

    #[test]
    fn ldap_escape_leaves_plain_text_borrowed() {
        assert!(matches!(ldap_escape("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn escapes_dn_specials() {
        assert_eq!(dn_escape("Smith, John"), "Smith\\, John");
        assert_eq!(dn_escape(" leading"), "\\ leading");
        assert_eq!(dn_escape("trailing "), "trailing\\ ");
        assert_eq!(dn_escape("#leading-hash"), "\\#leading-hash");
    }

    #[test]
    fn dn_escape_leaves_plain_text_borrowed() {
        assert!(matches!(dn_escape("cn=plain"), Cow::Owned(_)));
        assert!(matches!(dn_escape("plain"), Cow::Borrowed(_)));
    }
}
