use thiserror::Error;

pub const WORD: usize = std::mem::size_of::<usize>();

#[derive(Debug, Error)]
#[error("malformed hex word: {word:?}")]
pub struct MalformedHexWord {
    pub word: String,
}

/// Decodes the comma-separated hex list between a frame's parentheses into
/// the byte buffer the runtime spilled onto the stack, one native-order word
/// per element. A trailing `...` token ends the list and marks it truncated.
pub fn decode_words(list: &str) -> Result<(Vec<u8>, bool), MalformedHexWord> {
    if list.is_empty() {
        return Ok((Vec::new(), false));
    }

    let mut bytes = Vec::new();
    for token in list.split(',') {
        let token = token.trim();
        if token == "..." {
            return Ok((bytes, true));
        }
        let digits = token.strip_prefix("0x").unwrap_or(token);
        let word = usize::from_str_radix(digits, 16).map_err(|_| MalformedHexWord {
            word: token.to_string(),
        })?;
        bytes.extend_from_slice(&word.to_ne_bytes());
    }

    Ok((bytes, false))
}

// The one place host byte order is assumed. Everything that turns word bytes
// back into an address or length goes through here.
pub fn word_to_addr(bytes: &[u8]) -> usize {
    usize::from_ne_bytes(bytes[..WORD].try_into().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_is_empty_buffer() {
        let (bytes, truncated) = decode_words("").unwrap();
        assert!(bytes.is_empty());
        assert!(!truncated);
    }

    #[test]
    fn words_are_spilled_in_native_order() {
        let (bytes, truncated) = decode_words("0x7, 0x5").unwrap();
        assert_eq!(bytes.len(), 2 * WORD);
        assert_eq!(word_to_addr(&bytes), 7);
        assert_eq!(word_to_addr(&bytes[WORD..]), 5);
        assert!(!truncated);
    }

    #[test]
    fn prefix_is_optional() {
        let (bytes, _) = decode_words("ff, 0x10").unwrap();
        assert_eq!(word_to_addr(&bytes), 0xff);
        assert_eq!(word_to_addr(&bytes[WORD..]), 0x10);
    }

    #[test]
    fn ellipsis_ends_the_list() {
        let (bytes, truncated) = decode_words("0x1, 0x2, ...").unwrap();
        assert_eq!(bytes.len(), 2 * WORD);
        assert!(truncated);
    }

    #[test]
    fn text_after_ellipsis_is_ignored() {
        let (bytes, truncated) = decode_words("..., not even hex").unwrap();
        assert!(bytes.is_empty());
        assert!(truncated);
    }

    #[test]
    fn junk_token_is_rejected() {
        let err = decode_words("0x1, zebra").unwrap_err();
        assert_eq!(err.word, "zebra");
    }

    #[test]
    fn word_overflow_is_rejected() {
        let wide = format!("0x1{}", "0".repeat(2 * WORD));
        assert!(decode_words(&wide).is_err());
    }

    #[test]
    fn empty_token_is_rejected() {
        assert!(decode_words("0x1,, 0x2").is_err());
        assert!(decode_words("0x").is_err());
    }
}
