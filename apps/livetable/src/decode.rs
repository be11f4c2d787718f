use encoding_rs::Encoding;

const CHARSET_SNIFF_BYTES: usize = 8192;

/// Decodes an HTML file, honoring a `charset=` declaration near the top and
/// falling back to lossy UTF-8.
pub fn decode_html(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (decoded, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return decoded.into_owned();
    }

    if let Some(label) = charset_from_html_prefix(bytes) {
        match Encoding::for_label(label.as_bytes()) {
            Some(encoding) => {
                log::debug!("decoding input as {}", encoding.name());
                let (decoded, _, had_errors) = encoding.decode(bytes);
                if had_errors {
                    log::warn!("input contains bytes that are invalid in {}", encoding.name());
                }
                return decoded.into_owned();
            }
            None => log::warn!("unknown charset `{label}`; assuming UTF-8"),
        }
    }

    String::from_utf8_lossy(bytes).into_owned()
}

fn charset_from_html_prefix(bytes: &[u8]) -> Option<String> {
    let prefix = String::from_utf8_lossy(&bytes[..bytes.len().min(CHARSET_SNIFF_BYTES)]);
    let lower = prefix.to_ascii_lowercase();
    let mut search_start = 0_usize;

    while let Some(relative) = lower[search_start..].find("charset=") {
        let label_start = search_start + relative + "charset=".len();
        if let Some(label) = charset_label(&prefix[label_start..]) {
            return Some(label);
        }
        search_start = label_start;
    }

    None
}

fn charset_label(input: &str) -> Option<String> {
    let trimmed = input.trim_start();
    let first = trimmed.chars().next()?;

    let label = if first == '"' || first == '\'' {
        let rest = &trimmed[first.len_utf8()..];
        &rest[..rest.find(first)?]
    } else {
        let end = trimmed
            .find(|ch: char| ch.is_whitespace() || matches!(ch, '"' | '\'' | ';' | '>' | '/'))
            .unwrap_or(trimmed.len());
        &trimmed[..end]
    };

    let label = label.trim();
    (!label.is_empty()).then(|| label.to_owned())
}

#[cfg(test)]
mod tests {
    use super::charset_from_html_prefix;
    use super::decode_html;

    #[test]
    fn finds_meta_charset_in_both_forms() {
        assert_eq!(
            charset_from_html_prefix(b"<meta charset=\"windows-1252\">").as_deref(),
            Some("windows-1252")
        );
        assert_eq!(
            charset_from_html_prefix(
                b"<meta http-equiv=content-type content='text/html; charset=Shift_JIS'>"
            )
            .as_deref(),
            Some("Shift_JIS")
        );
        assert_eq!(charset_from_html_prefix(b"<p>no declaration</p>"), None);
    }

    #[test]
    fn decodes_declared_legacy_charset() {
        let bytes = b"<meta charset=windows-1252><td>caf\xe9</td>";
        assert!(decode_html(bytes).ends_with("<td>caf\u{e9}</td>"));
    }

    #[test]
    fn defaults_to_utf8_and_strips_bom() {
        assert_eq!(decode_html("<td>\u{e9}</td>".as_bytes()), "<td>\u{e9}</td>");
        assert_eq!(decode_html(b"\xef\xbb\xbf<table>"), "<table>");
    }
}
