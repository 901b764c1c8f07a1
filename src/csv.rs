pub type RawRow = Vec<String>;

// Never fails: an unterminated quote at end of input is flushed as
// literal text.
pub fn decode(text: &str) -> Vec<RawRow> {
    let mut rows: Vec<RawRow> = Vec::new();
    let mut row: RawRow = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        field.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => {
                    row.push(std::mem::take(&mut field));
                }
                '\n' => {
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                }
                // Bare \r is treated as a row break; \r\n collapses to one.
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                }
                _ => field.push(c),
            }
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows.retain(|cells| cells.iter().any(|cell| !cell.trim().is_empty()));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plain_rows() {
        let rows = decode("a,b,c\nd,e,f\n");
        assert_eq!(rows, vec![vec!["a", "b", "c"], vec!["d", "e", "f"]]);
    }

    #[test]
    fn quoted_field_roundtrip() {
        // A field containing a comma, a newline and an escaped quote.
        let rows = decode("\"a,b\nc\"\"d\",second\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "a,b\nc\"d");
        assert_eq!(rows[0][1], "second");
    }

    #[test]
    fn normalizes_line_endings() {
        let rows = decode("a,b\r\nc,d\re,f");
        assert_eq!(rows, vec![vec!["a", "b"], vec!["c", "d"], vec!["e", "f"]]);
    }

    #[test]
    fn drops_blank_rows() {
        let rows = decode("a,b\n,\n  ,  \nc,d\n");
        assert_eq!(rows, vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn unterminated_quote_degrades_to_literal() {
        let rows = decode("\"never closed,still one field\nmore");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], vec!["never closed,still one field\nmore"]);
    }

    #[test]
    fn trailing_row_without_newline() {
        let rows = decode("a,b\nc,d");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["c", "d"]);
    }

    #[test]
    fn empty_input_yields_no_rows() {
        assert!(decode("").is_empty());
        assert!(decode("\n\n\r\n").is_empty());
    }
}
