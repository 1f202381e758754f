use std::cmp::Ordering;
use std::fmt;

use tracing::{debug, trace};

use crate::domain::DVError;

/// A single cell. Cells that fully parse as a finite float are numbers,
/// everything else (including the empty string) is kept as trimmed text.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    /// Only a whole-cell parse counts: numeric prefixes such as `12abc` or
    /// `2024-01-05` stay text.
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();
        if !trimmed.is_empty()
            && let Ok(number) = trimmed.parse::<f64>()
            && number.is_finite()
        {
            return Value::Number(number);
        }
        Value::Text(trimmed.to_string())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Value::Number(_) => false,
            Value::Text(s) => s.trim().is_empty(),
        }
    }

    /// Sort bucket: 0 for text whose string form sorts below every rendered
    /// number (empty, or starting below `-`), 1 for numbers, 2 for other text.
    /// Rendered numbers always start with `-` or a digit.
    fn rank(&self) -> u8 {
        match self {
            Value::Number(_) => 1,
            Value::Text(s) => match s.chars().next() {
                None => 0,
                Some(c) if c < '-' => 0,
                Some(_) => 2,
            },
        }
    }

    // Buckets keep mixed columns a total order that matches string-form
    // comparison for blanks and for text outside the `-`..`9` range.
    pub fn compare(&self, other: &Value) -> Ordering {
        self.rank().cmp(&other.rank()).then_with(|| match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => Ordering::Equal,
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// One record, positionally aligned with the header list.
pub type Row = Vec<Value>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

/// Naive comma splitting: quoted fields are not recognised, so a comma inside
/// quotes splits the field.
pub fn parse(text: &str) -> Result<ParsedCsv, DVError> {
    let mut lines = text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

    let header_line = lines
        .next()
        .ok_or_else(|| DVError::ParseError("missing header line".into()))?;
    let headers: Vec<String> = header_line
        .split(',')
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(DVError::ParseError("header line is empty".into()));
    }

    let mut dropped = 0;
    let rows: Vec<Row> = lines
        .filter_map(|line| {
            let mut fields = line.split(',');
            let row: Row = headers
                .iter()
                .map(|_| Value::classify(fields.next().unwrap_or("")))
                .collect();
            if row.iter().all(Value::is_blank) {
                dropped += 1;
                None
            } else {
                Some(row)
            }
        })
        .collect();

    debug!(
        "Parsed {} columns, {} rows ({} blank lines dropped)",
        headers.len(),
        rows.len(),
        dropped
    );
    Ok(ParsedCsv { headers, rows })
}

pub fn parse_bytes(bytes: &[u8]) -> Result<ParsedCsv, DVError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| DVError::ParseError(format!("file is not valid UTF-8: {e}")))?;
    parse(text.strip_prefix('\u{feff}').unwrap_or(text))
}

/// Wraps text containing a comma in double quotes. Nothing else is escaped.
pub fn quote_field(value: &Value) -> String {
    match value {
        Value::Text(s) if s.contains(',') => format!("\"{s}\""),
        v => v.to_string(),
    }
}

pub fn format_row(row: &[Value]) -> String {
    row.iter().map(quote_field).collect::<Vec<String>>().join(",")
}

pub fn to_csv(headers: &[String], rows: &[Row]) -> String {
    trace!("Serializing {} rows to CSV", rows.len());
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.join(","));
    lines.extend(rows.iter().map(|r| format_row(r)));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn parses_headers_and_typed_rows() {
        let parsed = parse("a,b\n1,2\n3,x\n").unwrap();
        assert_eq!(parsed.headers, vec!["a", "b"]);
        assert_eq!(
            parsed.rows,
            vec![vec![num(1.0), num(2.0)], vec![num(3.0), text("x")]]
        );
    }

    #[test]
    fn headers_are_trimmed_and_crlf_is_handled() {
        let parsed = parse(" name , age \r\nbob, 42\r\n").unwrap();
        assert_eq!(parsed.headers, vec!["name", "age"]);
        assert_eq!(parsed.rows, vec![vec![text("bob"), num(42.0)]]);
    }

    #[test]
    fn header_only_file_has_no_rows() {
        let parsed = parse("a,b,c").unwrap();
        assert_eq!(parsed.headers.len(), 3);
        assert!(parsed.rows.is_empty());
    }

    #[test]
    fn short_rows_are_padded_with_empty_text() {
        let parsed = parse("a,b,c\n1\n").unwrap();
        assert_eq!(parsed.rows, vec![vec![num(1.0), text(""), text("")]]);
    }

    #[test]
    fn extra_fields_are_ignored() {
        let parsed = parse("a\n1,2,3\n").unwrap();
        assert_eq!(parsed.rows, vec![vec![num(1.0)]]);
    }

    #[test]
    fn blank_lines_are_dropped() {
        let parsed = parse("a,b\n\n1,2\n , \n,\n3,4\n").unwrap();
        assert_eq!(parsed.rows.len(), 2);
    }

    #[test]
    fn quoted_commas_are_split() {
        let parsed = parse("a,b\n\"x,y\",z\n").unwrap();
        assert_eq!(parsed.rows[0], vec![text("\"x"), text("y\"")]);
    }

    #[test]
    fn numeric_classification() {
        assert_eq!(Value::classify(" 1.5 "), num(1.5));
        assert_eq!(Value::classify("-3e2"), num(-300.0));
        assert_eq!(Value::classify(""), text(""));
        assert_eq!(Value::classify("12abc"), text("12abc"));
        assert_eq!(Value::classify("NaN"), text("NaN"));
        assert_eq!(Value::classify("inf"), text("inf"));
    }

    #[test]
    fn empty_header_line_is_a_parse_error() {
        assert!(matches!(parse(""), Err(DVError::ParseError(_))));
        assert!(matches!(parse(" , \n1,2"), Err(DVError::ParseError(_))));
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        assert!(matches!(
            parse_bytes(&[b'a', b'\n', 0xff, 0xfe]),
            Err(DVError::ParseError(_))
        ));
    }

    #[test]
    fn byte_order_mark_is_stripped() {
        let parsed = parse_bytes("\u{feff}a,b\n1,2".as_bytes()).unwrap();
        assert_eq!(parsed.headers, vec!["a", "b"]);
    }

    #[test]
    fn serializes_with_comma_quoting() {
        let headers = vec!["name".to_string(), "n".to_string()];
        let rows = vec![vec![text("Doe, John"), num(2.0)], vec![text("x"), num(0.5)]];
        assert_eq!(to_csv(&headers, &rows), "name,n\n\"Doe, John\",2\nx,0.5");
    }

    #[test]
    fn reparsing_serialized_rows_is_stable() {
        let first = parse("id,city,score\n1,Vienna,3.25\n2,,7\n3,Graz,x\n").unwrap();
        let again = parse(&to_csv(&first.headers, &first.rows)).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn compare_places_text_around_numbers() {
        assert_eq!(num(2.0).compare(&num(10.0)), Ordering::Less);
        assert_eq!(text("10").compare(&text("9")), Ordering::Less);
        assert_eq!(num(100.0).compare(&text("a")), Ordering::Less);
        assert_eq!(text("").compare(&num(1.0)), Ordering::Less);
        assert_eq!(text("#N/A").compare(&num(-5.0)), Ordering::Less);
        assert_eq!(text("").compare(&text("#N/A")), Ordering::Less);
        assert_eq!(text("n/a").compare(&num(1e9)), Ordering::Greater);
    }

    #[test]
    fn classify_keeps_date_like_cells_as_text() {
        assert_eq!(Value::classify("2024-01-05"), text("2024-01-05"));
    }
}
