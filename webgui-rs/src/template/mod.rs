//! Template variable resolution
//!
//! Pages contain tokens such as `~dname~`, `~mport(2)~` or
//! `~inc:parts/header.html~`. [`TemplateResolver::resolve`] turns one token
//! into bytes:
//!
//! 1. `inc:<path>` copies `/<path>` from the embedded file system (nothing if
//!    the file is missing).
//! 2. Otherwise the token is split into a name and an optional integer
//!    argument and the tag table is scanned for an exact name match.
//! 3. Unmatched tokens go to the custom hook if one is registered, else render
//!    as [`DEFAULT_PLACEHOLDER`].
//!
//! Tag output is capped at one byte short of [`MAX_DYNVAR_LENGTH`] and always
//! at the size of the destination buffer.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use log::debug;

pub mod fs;
mod page;
mod tags;

pub use fs::{content_type_for, EmbeddedFs, StaticFs};
pub use page::{render_page, TOKEN_DELIMITER};
pub use tags::builtin_tags;

/// Tag value buffer size; one byte is reserved, so values render at most
/// `MAX_DYNVAR_LENGTH - 1` bytes
pub const MAX_DYNVAR_LENGTH: usize = 64;

/// Token prefix for file inclusion
pub const INCLUDE_PREFIX: &str = "inc:";

/// Rendered for tokens nobody recognises
pub const DEFAULT_PLACEHOLDER: &str = "#DEF";

type Render<C> = Box<dyn Fn(&C, i32) -> String + Send + Sync>;
type CustomHook<C> = Box<dyn Fn(&C, &str, &mut [u8]) -> usize + Send + Sync>;

/// A named display value.
///
/// The render function receives the context and the integer argument from
/// `name(N)` (0 when absent).
pub struct TemplateTag<C> {
    name: Cow<'static, str>,
    render: Render<C>,
}

impl<C> TemplateTag<C> {
    pub fn new<F>(name: impl Into<Cow<'static, str>>, render: F) -> Self
    where
        F: Fn(&C, i32) -> String + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            render: Box::new(render),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render(&self, ctx: &C, arg: i32) -> String {
        (self.render)(ctx, arg)
    }
}

impl<C> fmt::Debug for TemplateTag<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateTag").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Split `name(N)` into `("name", N)`.
///
/// The closing parenthesis must be the last character; the argument is parsed
/// leniently (leading sign and digits, anything else ends it, no digits is 0).
/// Tokens without a well-formed argument are returned whole with argument 0.
pub fn parse_token(token: &str) -> (&str, i32) {
    let Some(inner) = token.strip_suffix(')') else {
        return (token, 0);
    };
    match inner.rfind('(') {
        Some(open) => (&token[..open], leading_int(&inner[open + 1..])),
        None => (token, 0),
    }
}

fn leading_int(s: &str) -> i32 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let mut value: i32 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        value = value.saturating_mul(10).saturating_add(i32::from(b - b'0'));
    }
    if negative {
        -value
    } else {
        value
    }
}

/// Copy as much of `src` as fits into `out`
fn copy_capped(src: &[u8], out: &mut [u8]) -> usize {
    let n = src.len().min(out.len());
    out[..n].copy_from_slice(&src[..n]);
    n
}

/// Resolves template tokens against a context `C`
pub struct TemplateResolver<C> {
    tags: Vec<TemplateTag<C>>,
    custom: Option<CustomHook<C>>,
    fs: Option<Arc<dyn EmbeddedFs>>,
}

impl<C> TemplateResolver<C> {
    pub fn new(tags: Vec<TemplateTag<C>>) -> Self {
        Self {
            tags,
            custom: None,
            fs: None,
        }
    }

    /// File system used for `inc:` tokens
    pub fn with_fs(mut self, fs: Arc<dyn EmbeddedFs>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Register the hook for tokens not in the tag table.
    ///
    /// The hook gets the raw token and writes straight into the output
    /// buffer, returning the bytes written. Replaces any previous hook.
    pub fn set_custom_hook<F>(&mut self, hook: F)
    where
        F: Fn(&C, &str, &mut [u8]) -> usize + Send + Sync + 'static,
    {
        self.custom = Some(Box::new(hook));
    }

    pub fn clear_custom_hook(&mut self) {
        self.custom = None;
    }

    pub fn tags(&self) -> &[TemplateTag<C>] {
        &self.tags
    }

    /// Resolve one token into `out`, returning the number of bytes written
    pub fn resolve(&self, ctx: &C, token: &str, out: &mut [u8]) -> usize {
        if let Some(path) = token.strip_prefix(INCLUDE_PREFIX) {
            return self.include(path, out);
        }

        let (name, arg) = parse_token(token);
        if let Some(tag) = self.tags.iter().find(|t| t.name() == name) {
            let value = tag.render(ctx, arg);
            let capped = &value.as_bytes()[..value.len().min(MAX_DYNVAR_LENGTH - 1)];
            return copy_capped(capped, out);
        }

        if let Some(hook) = &self.custom {
            let n = hook(ctx, token, out);
            return n.min(out.len());
        }

        debug!("Unknown template token '{}'", token);
        copy_capped(DEFAULT_PLACEHOLDER.as_bytes(), out)
    }

    /// Resolve one token into a new string
    pub fn resolve_to_string(&self, ctx: &C, token: &str) -> String {
        let mut buf = vec![0u8; self.buffer_hint(token)];
        let n = self.resolve(ctx, token, &mut buf);
        buf.truncate(n);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Buffer size that holds any resolution of `token`
    pub(crate) fn buffer_hint(&self, token: &str) -> usize {
        token
            .strip_prefix(INCLUDE_PREFIX)
            .and_then(|path| self.fs.as_ref()?.open(&format!("/{}", path)))
            .map_or(MAX_DYNVAR_LENGTH, |data| data.len().max(MAX_DYNVAR_LENGTH))
    }

    fn include(&self, path: &str, out: &mut [u8]) -> usize {
        let full = format!("/{}", path);
        match self.fs.as_ref().and_then(|fs| fs.open(&full)) {
            Some(data) => copy_capped(data, out),
            None => {
                debug!("Include file '{}' not found", full);
                0
            }
        }
    }
}
