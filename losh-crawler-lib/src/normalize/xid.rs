use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters escaped within a single path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

/// Build an external id from its parts.
///
/// Each part is escaped as a URL path segment, so a part never introduces an
/// extra `/`. Empty parts are written as `-`.
pub fn as_xid<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut xid = String::new();
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            xid.push('/');
        }

        let part = part.as_ref();
        if part.is_empty() {
            xid.push('-');
        } else {
            xid.extend(utf8_percent_encode(part, SEGMENT));
        }
    }
    xid
}
