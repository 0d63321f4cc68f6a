// SPDX-License-Identifier: GPL-3.0-only
use percent_encoding::percent_decode_str;

/// Decode a form-encoded preview file name
///
/// '+' becomes a space and `%XX` escapes are decoded. Escapes that do not
/// form valid UTF-8 are read as ISO-8859-1.
pub fn decode_preview_name(raw: &str) -> String {
    let plus_decoded = raw.replace('+', " ");
    let bytes: Vec<u8> = percent_decode_str(&plus_decoded).collect();

    match String::from_utf8(bytes) {
        Ok(decoded) => decoded,
        Err(err) => err.into_bytes().into_iter().map(char::from).collect(),
    }
}
