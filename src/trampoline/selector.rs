//! Selector symbol names.

/// Prefix carried by selector symbols.
pub const SELECTOR_PREFIX: &str = "sel_";

/// Prefix of the names given to renamed trampolines.
pub const SEND_MSG_PREFIX: &str = "_objc_sendMsg$";

/// Returns true if `name` is a selector symbol name.
#[inline]
pub fn is_selector_symbol(name: &str) -> bool {
    name.starts_with(SELECTOR_PREFIX)
}

/// Derives the bare selector from a selector symbol name.
///
/// Drops the four-character prefix, then one trailing `[0x<hex>]`
/// disambiguation suffix (lowercase hex digits) if present. The prefix is
/// not checked here.
pub fn sanitize(raw: &str) -> String {
    let body = raw
        .char_indices()
        .nth(SELECTOR_PREFIX.len())
        .map_or("", |(i, _)| &raw[i..]);

    strip_address_suffix(body).to_string()
}

/// Returns the trampoline name for a selector symbol.
pub fn send_msg_name(raw: &str) -> String {
    format!("{SEND_MSG_PREFIX}{}", sanitize(raw))
}

fn strip_address_suffix(name: &str) -> &str {
    let Some(inner) = name.strip_suffix(']') else {
        return name;
    };
    let Some(open) = inner.rfind("[0x") else {
        return name;
    };
    let digits = &inner[open + 3..];
    if !digits.is_empty() && digits.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        &name[..open]
    } else {
        name
    }
}
