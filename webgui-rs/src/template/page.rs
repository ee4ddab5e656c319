//! Page rendering over `~token~` templates

use super::TemplateResolver;

/// Token delimiter; `~~` renders a literal `~`
pub const TOKEN_DELIMITER: u8 = b'~';

/// Longest token name accepted between delimiters
const MAX_TOKEN_LENGTH: usize = 64;

/// Render a template page.
///
/// Text is copied through and every `~token~` is replaced by its resolution.
/// A delimiter followed by whitespace before the next delimiter, or by no
/// closing delimiter at all, is a plain `~` in the text. A delimited token
/// that is too long or not UTF-8 is copied verbatim together with both of
/// its delimiters.
pub fn render_page<C>(resolver: &TemplateResolver<C>, ctx: &C, template: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(template.len());
    let mut buf = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.iter().position(|&b| b == TOKEN_DELIMITER) {
        out.extend_from_slice(&rest[..start]);
        let after = &rest[start + 1..];

        let Some(end) = after.iter().position(|&b| b == TOKEN_DELIMITER) else {
            out.push(TOKEN_DELIMITER);
            rest = after;
            continue;
        };
        let raw = &after[..end];

        if raw.iter().any(u8::is_ascii_whitespace) {
            out.push(TOKEN_DELIMITER);
            rest = after;
            continue;
        }
        rest = &after[end + 1..];

        match std::str::from_utf8(raw) {
            Ok("") => out.push(TOKEN_DELIMITER),
            Ok(token) if token.len() <= MAX_TOKEN_LENGTH => {
                buf.resize(resolver.buffer_hint(token), 0);
                let n = resolver.resolve(ctx, token, &mut buf);
                out.extend_from_slice(&buf[..n]);
            }
            _ => {
                out.push(TOKEN_DELIMITER);
                out.extend_from_slice(raw);
                out.push(TOKEN_DELIMITER);
            }
        }
    }
    out.extend_from_slice(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{StaticFs, TemplateTag};
    use std::sync::Arc;

    fn resolver() -> TemplateResolver<u32> {
        let fs = StaticFs::new().with_file("/hdr.html", b"<h1>~n~</h1>");
        TemplateResolver::new(vec![
            TemplateTag::new("n", |c: &u32, _| c.to_string()),
            TemplateTag::new("twice", |c: &u32, arg| (c * 2 + arg as u32).to_string()),
        ])
        .with_fs(Arc::new(fs))
    }

    fn render(template: &str) -> String {
        String::from_utf8(render_page(&resolver(), &21, template.as_bytes())).unwrap()
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(render("<p>hello</p>"), "<p>hello</p>");
        assert_eq!(render(""), "");
    }

    #[test]
    fn test_tokens_replaced() {
        assert_eq!(render("<b>~n~</b>"), "<b>21</b>");
        assert_eq!(render("~n~~twice(1)~"), "2143");
    }

    #[test]
    fn test_escaped_delimiter() {
        assert_eq!(render("a~~b"), "a~b");
    }

    #[test]
    fn test_unknown_token() {
        assert_eq!(render("[~nope~]"), "[#DEF]");
    }

    #[test]
    fn test_unterminated_token_copied() {
        assert_eq!(render("50~ off"), "50~ off");
        assert_eq!(render("~n~ and ~n"), "21 and ~n");
    }

    #[test]
    fn test_whitespace_is_not_a_token() {
        assert_eq!(render("~ approx ~n~"), "~ approx 21");
    }

    #[test]
    fn test_oversized_token_copied_whole() {
        let long = "a".repeat(MAX_TOKEN_LENGTH + 1);
        let template = format!("~{}~n~", long);
        assert_eq!(render(&template), format!("~{}~n~", long));

        let template = format!("<~{}~>~n~", long);
        assert_eq!(render(&template), format!("<~{}~>21", long));
    }

    #[test]
    fn test_longest_token_resolves() {
        let name = "b".repeat(MAX_TOKEN_LENGTH);
        assert_eq!(render(&format!("~{}~", name)), "#DEF");
    }

    #[test]
    fn test_invalid_utf8_token_copied() {
        let out = render_page(&resolver(), &21, b"~\xff\xfe~~n~");
        assert_eq!(out, b"~\xff\xfe~21".to_vec());
    }

    #[test]
    fn test_include_is_not_expanded_again() {
        assert_eq!(render("~inc:hdr.html~"), "<h1>~n~</h1>");
    }
}
