// Property file scanner
// Parses simple key = value layout files

/// Scan `key = value` text, invoking `handler` with `(line, key, value)`
///
/// Keys keep their case. `#` starts a comment that runs to the end of the
/// line, including after a value. Surrounding whitespace is trimmed from both
/// keys and values. Lines without `=` are skipped with a warning. Line
/// numbers start at 1.
pub fn parse_propfile(data: &str, handler: &mut dyn FnMut(usize, &str, &str)) {
    const NL: u8 = b'\n';
    const HASH: u8 = b'#';
    const EQ: u8 = b'=';

    let bytes = data.as_bytes();
    let len = bytes.len();
    let mut i = 0;
    let mut line = 1;

    while i < len {
        while i < len && bytes[i].is_ascii_whitespace() {
            if bytes[i] == NL {
                line += 1;
            }
            i += 1;
        }
        if i >= len {
            break;
        }

        if bytes[i] == HASH {
            while i < len && bytes[i] != NL {
                i += 1;
            }
            continue;
        }

        let key_start = i;
        while i < len && bytes[i] != EQ && bytes[i] != NL && bytes[i] != HASH {
            i += 1;
        }

        if i >= len || bytes[i] != EQ {
            log::warn!(
                "Line {}: key without value: {}",
                line,
                data[key_start..i].trim()
            );
            while i < len && bytes[i] != NL {
                i += 1;
            }
            continue;
        }

        let key = data[key_start..i].trim_end();
        i += 1;

        let value_start = i;
        while i < len && bytes[i] != HASH && bytes[i] != NL {
            i += 1;
        }
        let value = data[value_start..i].trim();

        while i < len && bytes[i] != NL {
            i += 1;
        }

        handler(line, key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(data: &str) -> Vec<(usize, String, String)> {
        let mut out = Vec::new();
        parse_propfile(data, &mut |line, key, value| {
            out.push((line, key.to_string(), value.to_string()))
        });
        out
    }

    #[test]
    fn test_basic_pairs() {
        let entries = collect("name = mouse\nrecord_bits=224\n");
        assert_eq!(
            entries,
            vec![
                (1, "name".into(), "mouse".into()),
                (2, "record_bits".into(), "224".into()),
            ]
        );
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let entries = collect("# header\n\n  field.x = float32 0 32 float 0 # trailing\n#end");
        assert_eq!(
            entries,
            vec![(3, "field.x".into(), "float32 0 32 float 0".into())]
        );
    }

    #[test]
    fn test_key_without_value_skipped() {
        let entries = collect("orphan\nkey = value\nlast");
        assert_eq!(entries, vec![(2, "key".into(), "value".into())]);
    }

    #[test]
    fn test_empty_value_and_crlf() {
        let entries = collect("a =\r\nb = 2\r\n");
        assert_eq!(
            entries,
            vec![(1, "a".into(), "".into()), (2, "b".into(), "2".into())]
        );
    }

    #[test]
    fn test_key_case_preserved() {
        let entries = collect("Field.PosX = 1");
        assert_eq!(entries[0].1, "Field.PosX");
    }
}
