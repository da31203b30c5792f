//! Number format compilation and application.
//!
//! Excel number format codes are a mini-language. A code is compiled once per
//! `numFmtId` into a [`ParsedFormat`] and applied to every numeric cell that
//! resolves to that id. The compiler is a sequence of textual passes whose
//! order matters: pick the sign section, strip the color, classify, strip
//! escapes, then extract grouping, scaling, width/precision, and currency.
//!
//! Date/time codes compile into an output token alphabet (`Y y F M m n l D d
//! j H G h g i s A`) that the renderer and the enforced-format overrides
//! share. Serial date arithmetic anchors to the 1900 epoch with the phantom
//! leap day skipped.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Weekday};

use crate::worksheet::CellValue;

/// Locale and behavior options injected by the reader facade.
///
/// The core never calls locale APIs; separators and the currency code are
/// supplied from outside.
#[derive(Debug, Clone)]
pub(crate) struct FormatOptions {
    pub return_objects: bool,
    pub force_date: Option<String>,
    pub force_time: Option<String>,
    pub force_datetime: Option<String>,
    pub decimal_separator: char,
    pub thousand_separator: char,
    pub currency_code: String,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            return_objects: false,
            force_date: None,
            force_time: None,
            force_datetime: None,
            decimal_separator: '.',
            thousand_separator: ',',
            currency_code: "USD".to_string(),
        }
    }
}

/// Classification of a compiled format code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FormatKind {
    Text,
    Percentage,
    DateTime,
    Euro,
    Fraction,
    Number,
}

/// A format code compiled for repeated application.
#[derive(Debug, Clone)]
pub(crate) struct ParsedFormat {
    pub kind: FormatKind,
    /// Cleaned section code; for `DateTime` this is the output token pattern.
    pub code: String,
    /// Divisor from trailing scaling commas (1000 per comma).
    pub scale: f64,
    pub thousands: bool,
    pub currency: Option<String>,
    /// Total printf width of the digit group (`0+ .? 0*`).
    pub min_width: usize,
    /// Digits after the decimal point in the digit group.
    pub decimals: usize,
    /// Decimal places used by thousands-grouped rendering.
    pub precision: usize,
    /// Byte span of the digit-group placeholder within `code`.
    pub placeholder: Option<(usize, usize)>,
    /// Byte span of the `[$...]` currency placeholder within `code`.
    pub currency_span: Option<(usize, usize)>,
}

impl ParsedFormat {
    fn plain(kind: FormatKind, code: String) -> Self {
        Self {
            kind,
            code,
            scale: 1.0,
            thousands: false,
            currency: None,
            min_width: 0,
            decimals: 0,
            precision: 0,
            placeholder: None,
            currency_span: None,
        }
    }
}

/// Built-in number format IDs (0-49 are predefined by Excel)
/// See: ECMA-376 Part 1, Section 18.8.30
pub(crate) const fn builtin_format(id: u32) -> Option<&'static str> {
    match id {
        0 => Some("General"),
        1 => Some("0"),
        2 => Some("0.00"),
        3 => Some("#,##0"),
        4 => Some("#,##0.00"),
        // Currency formats (5-8)
        5 => Some("$#,##0_);($#,##0)"),
        6 => Some("$#,##0_);[Red]($#,##0)"),
        7 => Some("$#,##0.00_);($#,##0.00)"),
        8 => Some("$#,##0.00_);[Red]($#,##0.00)"),
        9 => Some("0%"),
        10 => Some("0.00%"),
        11 => Some("0.00E+00"),
        12 => Some("# ?/?"),
        13 => Some("# ??/??"),
        14 => Some("mm-dd-yy"),
        15 => Some("d-mmm-yy"),
        16 => Some("d-mmm"),
        17 => Some("mmm-yy"),
        18 => Some("h:mm AM/PM"),
        19 => Some("h:mm:ss AM/PM"),
        20 => Some("h:mm"),
        21 => Some("h:mm:ss"),
        22 => Some("m/d/yy h:mm"),
        37 => Some("#,##0 ;(#,##0)"),
        38 => Some("#,##0 ;[Red](#,##0)"),
        39 => Some("#,##0.00;(#,##0.00)"),
        40 => Some("#,##0.00;[Red](#,##0.00)"),
        // Accounting formats (41-44)
        41 => Some("_(* #,##0_);_(* (#,##0);_(* \"-\"_);_(@_)"),
        42 => Some("_($* #,##0_);_($* (#,##0);_($* \"-\"_);_(@_)"),
        43 => Some("_(* #,##0.00_);_(* (#,##0.00);_(* \"-\"??_);_(@_)"),
        44 => Some("_($* #,##0.00_);_($* (#,##0.00);_($* \"-\"??_);_(@_)"),
        45 => Some("mm:ss"),
        46 => Some("[h]:mm:ss"),
        47 => Some("mmss.0"),
        48 => Some("##0.0E+0"),
        49 => Some("@"),
        _ => None,
    }
}

// =============================================================================
// Compilation
// =============================================================================

/// Compile a format code for a value of the given sign.
///
/// The section is picked by sign: a 2-section code sends negatives to the
/// second section, a 3+-section code additionally sends zero to the third.
pub(crate) fn compile(
    code: &str,
    negative: bool,
    zero: bool,
    opts: &FormatOptions,
) -> ParsedFormat {
    let sections: Vec<&str> = code.split(';').collect();
    let section = if negative && sections.len() >= 2 {
        sections[1]
    } else if zero && sections.len() >= 3 {
        sections[2]
    } else {
        sections[0]
    };
    let section = strip_leading_color(section);

    if section.trim() == "@" {
        return ParsedFormat::plain(FormatKind::Text, section.to_string());
    }
    if section.ends_with('%') {
        return ParsedFormat::plain(FormatKind::Percentage, section.to_string());
    }
    if is_date_code(section) {
        let pattern = compile_date_pattern(section);
        return ParsedFormat::plain(FormatKind::DateTime, pattern);
    }
    if section.eq_ignore_ascii_case("[$eur ]#,##0.00_-") {
        return ParsedFormat::plain(FormatKind::Euro, section.to_string());
    }

    // Removing skipped characters, escaping, string quotes and fill marks.
    let mut cleaned = strip_underscore_pairs(section);
    cleaned.retain(|c| c != '\\' && c != '"' && c != '*');

    if cleaned.contains("?/?") {
        return ParsedFormat::plain(FormatKind::Fraction, cleaned);
    }

    let (cleaned, thousands) = collapse_thousands(cleaned);
    let (cleaned, scale) = extract_scale(cleaned);
    let digit_group = find_digit_group(&cleaned);
    let currency = find_currency(&cleaned, opts);

    let (placeholder, min_width, decimals) =
        digit_group.map_or((None, 0, 0), |(start, end, width, dec)| {
            (Some((start, end)), width, dec)
        });
    let (currency_span, currency) = currency.map_or((None, None), |(span, symbol)| {
        (Some(span), Some(symbol))
    });

    ParsedFormat {
        kind: FormatKind::Number,
        code: cleaned,
        scale,
        thousands,
        currency,
        min_width,
        decimals,
        precision: decimals,
        placeholder,
        currency_span,
    }
}

/// Strip a leading `[Color]` bracket (but not a `[$...]` currency bracket).
fn strip_leading_color(section: &str) -> &str {
    if let Some(rest) = section.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            let inner = &rest[..end];
            if !inner.is_empty() && inner.chars().all(|c| c.is_ascii_alphabetic()) {
                return &rest[end + 1..];
            }
        }
    }
    section
}

/// Date codes start with an `[hmsdy]` token, optionally preceded by one or
/// more `[$...]` locale prefixes.
fn is_date_code(section: &str) -> bool {
    let mut rest = section;
    while rest.starts_with("[$") {
        match rest.find(']') {
            Some(end) => rest = &rest[end + 1..],
            None => return false,
        }
    }
    matches!(
        rest.bytes().next(),
        Some(b'h' | b'm' | b's' | b'd' | b'y' | b'H' | b'M' | b'S' | b'D' | b'Y')
    )
}

/// Replacement tables for date codes, applied longest-match-first in a single
/// left-to-right pass (replaced text is never rescanned).
const DATE_ALL: &[(&str, &str)] = &[
    ("\\", ""),
    ("am/pm", "A"),
    ("yyyy", "Y"),
    ("yy", "y"),
    ("mmmmm", "M"),
    ("mmmm", "F"),
    ("mmm", "M"),
    (":mm", ":i"),
    ("mm", "m"),
    ("m", "n"),
    ("dddd", "l"),
    ("ddd", "D"),
    ("dd", "d"),
    ("d", "j"),
    ("ss", "s"),
    (".s", ""),
];
const DATE_24H: &[(&str, &str)] = &[("hh", "H"), ("h", "G")];
const DATE_12H: &[(&str, &str)] = &[("hh", "h"), ("h", "G")];

fn compile_date_pattern(section: &str) -> String {
    let mut rest = section;
    while rest.starts_with("[$") {
        match rest.find(']') {
            Some(end) => rest = &rest[end + 1..],
            None => break,
        }
    }
    let lower = rest.to_ascii_lowercase();
    let pass = str_translate(&lower, DATE_ALL);
    // AM/PM markers survive the first pass as 'A' and select the 12H table.
    if pass.contains('A') {
        str_translate(&pass, DATE_12H)
    } else {
        str_translate(&pass, DATE_24H)
    }
}

/// Single-pass, longest-match-first string translation.
fn str_translate(input: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let rest = &input[i..];
        let mut best: Option<(&str, &str)> = None;
        for &(from, to) in pairs {
            if rest.starts_with(from) && best.map_or(true, |(b, _)| from.len() > b.len()) {
                best = Some((from, to));
            }
        }
        match best {
            Some((from, to)) => {
                out.push_str(to);
                i += from.len();
            }
            None => {
                let ch = rest.chars().next().unwrap_or_default();
                out.push(ch);
                i += ch.len_utf8();
            }
        }
    }
    out
}

/// Remove each `_` together with the character it pads for.
fn strip_underscore_pairs(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut chars = code.chars();
    while let Some(c) = chars.next() {
        if c == '_' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

/// Collapse grouping commas (`0,0` / `#,#`) and report their presence.
fn collapse_thousands(mut code: String) -> (String, bool) {
    let mut thousands = false;
    loop {
        if let Some(i) = code.find("0,0") {
            code.replace_range(i..i + 3, "00");
            thousands = true;
        } else if let Some(i) = code.find("#,#") {
            code.replace_range(i..i + 3, "##");
            thousands = true;
        } else {
            break;
        }
    }
    (code, thousands)
}

/// Trailing commas after a digit placeholder scale the value by 1000 each.
fn extract_scale(code: String) -> (String, f64) {
    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len());
    let mut scale = 1.0f64;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == ',' && i > 0 && matches!(chars[i - 1], '0' | '#') {
            let mut j = i;
            while j < chars.len() && chars[j] == ',' {
                j += 1;
            }
            let followed_by_digit = j < chars.len() && matches!(chars[j], '0' | '#');
            if !followed_by_digit {
                scale *= 1000f64.powi((j - i) as i32);
                i = j;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    (out, scale)
}

/// Locate the digit-group placeholder `(0+)(\.?)(0*)`, extended over adjacent
/// `#` marks so the whole placeholder is replaced by the rendered number.
/// Returns `(start, end, min_width, decimals)`.
fn find_digit_group(code: &str) -> Option<(usize, usize, usize, usize)> {
    let bytes = code.as_bytes();
    let mut in_bracket = false;
    let mut zero_at = None;
    for (idx, &b) in bytes.iter().enumerate() {
        match b {
            b'[' => in_bracket = true,
            b']' => in_bracket = false,
            b'0' if !in_bracket => {
                zero_at = Some(idx);
                break;
            }
            _ => {}
        }
    }
    let z = zero_at?;

    let mut end = z;
    while end < bytes.len() && bytes[end] == b'0' {
        end += 1;
    }
    let m1 = end - z;
    let mut m2 = 0;
    if end < bytes.len() && bytes[end] == b'.' {
        m2 = 1;
        end += 1;
    }
    let m3_start = end;
    while end < bytes.len() && bytes[end] == b'0' {
        end += 1;
    }
    let m3 = end - m3_start;

    let mut start = z;
    while start > 0 && bytes[start - 1] == b'#' {
        start -= 1;
    }
    while end < bytes.len() && bytes[end] == b'#' {
        end += 1;
    }

    Some((start, end, m1 + m2 + m3, m3))
}

/// Locate a `[$XXX-yyy]` currency placeholder and resolve its symbol, falling
/// back to the configured currency code when the symbol part is empty.
fn find_currency(code: &str, opts: &FormatOptions) -> Option<((usize, usize), String)> {
    let start = code.find("[$")?;
    let end = start + code[start..].find(']')? + 1;
    let inner = &code[start + 2..end - 1];
    let symbol = inner.split('-').next().unwrap_or("");
    let currency = if symbol.is_empty() {
        opts.currency_code.clone()
    } else {
        symbol.to_string()
    };
    Some(((start, end), currency))
}

// =============================================================================
// Application
// =============================================================================

/// Apply a compiled format to a numeric cell value.
pub(crate) fn apply(raw: &str, value: f64, pf: &ParsedFormat, opts: &FormatOptions) -> CellValue {
    match pf.kind {
        FormatKind::Text => CellValue::Text(raw.to_string()),
        FormatKind::Percentage => CellValue::Text(apply_percentage(value, &pf.code)),
        FormatKind::DateTime => apply_datetime(value, &pf.code, opts),
        FormatKind::Euro => CellValue::Text(format!("EUR {value:.2}")),
        FormatKind::Fraction => CellValue::Text(apply_fraction(value, &pf.code)),
        FormatKind::Number => CellValue::Text(apply_number(value, pf, opts)),
    }
}

/// General format: shortest decimal representation that round-trips.
pub(crate) fn general_number(value: f64) -> String {
    format!("{value}")
}

fn apply_percentage(value: f64, code: &str) -> String {
    if code.trim() == "0%" {
        format!("{}%", (value * 100.0).round() as i64)
    } else {
        format!("{:.2}%", value * 100.0)
    }
}

/// Output tokens that denote a date component.
const DATE_TOKENS: &[char] = &[
    'D', 'd', 'F', 'j', 'l', 'm', 'M', 'n', 'o', 'S', 't', 'w', 'W', 'Y', 'y', 'z',
];
/// Output tokens that denote a time component.
const TIME_TOKENS: &[char] = &['a', 'A', 'B', 'g', 'G', 'h', 'H', 'i', 's', 'u', 'v'];

fn apply_datetime(value: f64, pattern: &str, opts: &FormatOptions) -> CellValue {
    let Some(datetime) = serial_to_datetime(value) else {
        return CellValue::Text(general_number(value));
    };
    if opts.return_objects {
        return CellValue::DateTime(datetime);
    }

    let has_date = pattern.chars().any(|c| DATE_TOKENS.contains(&c));
    let has_time = pattern.chars().any(|c| TIME_TOKENS.contains(&c));
    let chosen = match (has_date, has_time) {
        (true, true) => opts.force_datetime.as_deref().unwrap_or(pattern),
        (true, false) => opts.force_date.as_deref().unwrap_or(pattern),
        (false, true) => opts.force_time.as_deref().unwrap_or(pattern),
        (false, false) => pattern,
    };
    CellValue::Text(render_date_pattern(chosen, &datetime))
}

/// Convert an Excel serial to a date/time.
///
/// Serial 1 is 1900-01-01. Serial 60 is the phantom 1900-02-29, mapped onto
/// 1900-02-28; everything above skips that day. Fractional days are seconds,
/// rounded; negative serials subtract the interval.
pub(crate) fn serial_to_datetime(value: f64) -> Option<NaiveDateTime> {
    let mut days = value.floor() as i64;
    if days >= 60 {
        days -= 1;
    }
    let seconds = ((value - value.floor()) * 86400.0).round() as i64;
    let base = NaiveDate::from_ymd_opt(1899, 12, 31)?.and_hms_opt(0, 0, 0)?;
    base.checked_add_signed(Duration::days(days))?
        .checked_add_signed(Duration::seconds(seconds))
}

/// Render an output token pattern against a date/time.
fn render_date_pattern(pattern: &str, dt: &NaiveDateTime) -> String {
    let hour = dt.hour();
    let hour12 = match hour % 12 {
        0 => 12,
        h => h,
    };
    let mut out = String::with_capacity(pattern.len() * 2);
    for c in pattern.chars() {
        match c {
            'Y' => out.push_str(&format!("{:04}", dt.year())),
            'y' => out.push_str(&format!("{:02}", dt.year().rem_euclid(100))),
            'F' => out.push_str(month_full(dt.month())),
            'M' => out.push_str(month_abbrev(dt.month())),
            'm' => out.push_str(&format!("{:02}", dt.month())),
            'n' => out.push_str(&dt.month().to_string()),
            'l' => out.push_str(day_full(dt.weekday())),
            'D' => out.push_str(day_abbrev(dt.weekday())),
            'd' => out.push_str(&format!("{:02}", dt.day())),
            'j' => out.push_str(&dt.day().to_string()),
            'H' => out.push_str(&format!("{hour:02}")),
            'G' => out.push_str(&hour.to_string()),
            'h' => out.push_str(&format!("{hour12:02}")),
            'g' => out.push_str(&hour12.to_string()),
            'i' => out.push_str(&format!("{:02}", dt.minute())),
            's' => out.push_str(&format!("{:02}", dt.second())),
            'A' => out.push_str(if hour >= 12 { "PM" } else { "AM" }),
            'a' => out.push_str(if hour >= 12 { "pm" } else { "am" }),
            other => out.push(other),
        }
    }
    out
}

fn month_abbrev(month: u32) -> &'static str {
    match month {
        1 => "Jan",
        2 => "Feb",
        3 => "Mar",
        4 => "Apr",
        5 => "May",
        6 => "Jun",
        7 => "Jul",
        8 => "Aug",
        9 => "Sep",
        10 => "Oct",
        11 => "Nov",
        12 => "Dec",
        _ => "???",
    }
}

fn month_full(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "???",
    }
}

fn day_abbrev(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Sun",
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
    }
}

fn day_full(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Sunday",
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
    }
}

/// Render a value as a reduced fraction.
fn apply_fraction(value: f64, code: &str) -> String {
    if !value.is_finite() {
        return general_number(value);
    }
    let negative = value < 0.0;
    let sign = if negative { "-" } else { "" };
    let abs = value.abs();
    let integer = abs.trunc() as u64;
    let frac = abs.fract();
    if frac == 0.0 {
        return format!("{sign}{integer}");
    }

    // Decimal digits become the numerator over the matching power of ten.
    let mut repr = format!("{frac}");
    if repr.contains(['e', 'E']) {
        repr = format!("{frac:.9}");
    }
    let digits = repr.split('.').nth(1).unwrap_or("").trim_end_matches('0');
    let digits = if digits.len() > 18 { &digits[..18] } else { digits };
    if digits.is_empty() {
        return format!("{sign}{integer}");
    }
    let Ok(numerator) = digits.parse::<u64>() else {
        return general_number(value);
    };
    let denominator = 10u64.pow(digits.len() as u32);
    let divisor = gcd(numerator, denominator);
    let (numerator, denominator) = (numerator / divisor, denominator / divisor);

    let mixed = code.contains('0') || code.contains('#') || code.trim_start().starts_with("? ?");
    if mixed {
        if integer > 0 {
            format!("{sign}{integer} {numerator}/{denominator}")
        } else {
            format!("{sign}{numerator}/{denominator}")
        }
    } else {
        let folded = integer * denominator + numerator;
        format!("{sign}{folded}/{denominator}")
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

/// Render a scaled, optionally grouped number and splice it back into the
/// code so surrounding literals (units, labels, currency) are preserved.
fn apply_number(value: f64, pf: &ParsedFormat, opts: &FormatOptions) -> String {
    let value = value / pf.scale;
    let rendered = if pf.thousands {
        format_thousands(
            value,
            pf.precision,
            opts.decimal_separator,
            opts.thousand_separator,
        )
    } else if pf.placeholder.is_some() {
        format!("{:0width$.prec$}", value, width = pf.min_width, prec = pf.decimals)
    } else {
        general_number(value)
    };

    let Some(placeholder) = pf.placeholder else {
        return rendered;
    };

    let mut spans: Vec<((usize, usize), &str)> = vec![(placeholder, rendered.as_str())];
    if let (Some(span), Some(currency)) = (pf.currency_span, pf.currency.as_deref()) {
        spans.push((span, currency));
    }
    spans.sort_by_key(|((start, _), _)| *start);

    let mut out = String::with_capacity(pf.code.len() + rendered.len());
    let mut last = 0;
    for ((start, end), replacement) in spans {
        out.push_str(&pf.code[last..start]);
        out.push_str(replacement);
        last = end;
    }
    out.push_str(&pf.code[last..]);
    out
}

/// Format with grouped integer digits and the configured separators.
fn format_thousands(value: f64, decimals: usize, dec_sep: char, thou_sep: char) -> String {
    let negative = value < 0.0;
    let formatted = format!("{:.prec$}", value.abs(), prec = decimals.min(10));
    let (int_part, dec_part) = match formatted.split_once('.') {
        Some((i, d)) => (i, Some(d)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(thou_sep);
        }
        grouped.push(c);
    }
    let mut out: String = grouped.chars().rev().collect();
    if let Some(d) = dec_part {
        out.push(dec_sep);
        out.push_str(d);
    }
    if negative {
        out.insert(0, '-');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> FormatOptions {
        FormatOptions::default()
    }

    fn text(raw: &str, code: &str) -> String {
        let value: f64 = raw.parse().unwrap();
        let pf = compile(code, value < 0.0, value == 0.0, &opts());
        match apply(raw, value, &pf, &opts()) {
            CellValue::Text(s) => s,
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn percentage_codes() {
        assert_eq!(text("0.125", "0.00%"), "12.50%");
        assert_eq!(text("0.125", "0%"), "13%");
        assert_eq!(text("0.5", "0%"), "50%");
    }

    #[test]
    fn date_pattern_compilation() {
        let pf = compile("yyyy-mm-dd", false, false, &opts());
        assert_eq!(pf.kind, FormatKind::DateTime);
        assert_eq!(pf.code, "Y-m-d");

        let pf = compile("h:mm:ss", false, false, &opts());
        assert_eq!(pf.code, "G:i:s");

        let pf = compile("h:mm AM/PM", false, false, &opts());
        assert_eq!(pf.code, "G:i A");

        let pf = compile("hh:mm AM/PM", false, false, &opts());
        assert_eq!(pf.code, "h:i A");

        let pf = compile("[$-409]d-mmm-yy", false, false, &opts());
        assert_eq!(pf.kind, FormatKind::DateTime);
        assert_eq!(pf.code, "j-M-y");
    }

    #[test]
    fn serial_date_epoch() {
        let d = serial_to_datetime(1.0).unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (1900, 1, 1));
        let d = serial_to_datetime(60.0).unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (1900, 2, 28));
        let d = serial_to_datetime(61.0).unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (1900, 3, 1));
        let d = serial_to_datetime(0.5).unwrap();
        assert_eq!((d.hour(), d.minute(), d.second()), (12, 0, 0));
        let d = serial_to_datetime(44197.0).unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2021, 1, 1));
    }

    #[test]
    fn date_rendering() {
        assert_eq!(text("44197", "yyyy-mm-dd"), "2021-01-01");
        assert_eq!(text("44197.5215", "hh:mm:ss"), "12:30:58");
    }

    #[test]
    fn enforced_date_format() {
        let o = FormatOptions {
            force_date: Some("j.n.Y".to_string()),
            ..opts()
        };
        let pf = compile("yyyy-mm-dd", false, false, &o);
        let rendered = apply("44197", 44197.0, &pf, &o);
        assert_eq!(rendered, CellValue::Text("1.1.2021".to_string()));

        let o = FormatOptions {
            force_date: Some("d.m.Y".to_string()),
            ..opts()
        };
        let rendered = apply("44197", 44197.0, &pf, &o);
        assert_eq!(rendered, CellValue::Text("01.01.2021".to_string()));
    }

    #[test]
    fn date_objects_when_configured() {
        let o = FormatOptions {
            return_objects: true,
            ..opts()
        };
        let pf = compile("yyyy-mm-dd", false, false, &o);
        match apply("44197", 44197.0, &pf, &o) {
            CellValue::DateTime(dt) => assert_eq!(dt.year(), 2021),
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn fraction_codes() {
        assert_eq!(text("0.25", "# ?/?"), "1/4");
        assert_eq!(text("2.25", "# ?/?"), "2 1/4");
        assert_eq!(text("0.25", "?/?"), "1/4");
        assert_eq!(text("2.25", "?/?"), "9/4");
        assert_eq!(text("-2.25", "# ?/?"), "-2 1/4");
        assert_eq!(text("3", "# ?/?"), "3");
    }

    #[test]
    fn euro_code() {
        assert_eq!(text("1234.5", "[$EUR ]#,##0.00_-"), "EUR 1234.50");
    }

    #[test]
    fn plain_number_codes() {
        assert_eq!(text("3.5", "0.00"), "3.50");
        assert_eq!(text("3.456", "0.00"), "3.46");
        assert_eq!(text("12", "0"), "12");
    }

    #[test]
    fn thousands_and_scaling() {
        assert_eq!(text("1234567.891", "#,##0.00"), "1,234,567.89");
        assert_eq!(text("12000", "0,"), "12");
        assert_eq!(text("12500000", "0.0,,"), "12.5");
    }

    #[test]
    fn literals_around_digits_survive() {
        assert_eq!(text("12.5", "0.00 \"kg\""), "12.50 kg");
        assert_eq!(text("7", "0\\ m"), "7 m");
    }

    #[test]
    fn currency_placeholder() {
        assert_eq!(text("1234.5", "[$USD-409]#,##0.00"), "USD1,234.50");
        // Empty symbol falls back to the configured currency code.
        assert_eq!(text("5", "[$-409]0.00"), "USD5.00");
    }

    #[test]
    fn sign_sections() {
        let pf = compile("0.00;(0.00)", true, false, &opts());
        let rendered = apply("-3.5", -3.5, &pf, &opts());
        assert_eq!(rendered, CellValue::Text("(-3.50)".to_string()));
    }

    #[test]
    fn color_prefix_is_stripped() {
        let pf = compile("[Red]0.00", false, false, &opts());
        assert_eq!(pf.kind, FormatKind::Number);
        assert_eq!(text("1.5", "[Red]0.00"), "1.50");
    }

    #[test]
    fn text_code_passes_through() {
        let pf = compile("@", false, false, &opts());
        assert_eq!(pf.kind, FormatKind::Text);
        assert_eq!(apply("7", 7.0, &pf, &opts()), CellValue::Text("7".to_string()));
    }

    #[test]
    fn translate_is_single_pass() {
        // "mm" collapses to "m" and the result is not rescanned into "n".
        assert_eq!(str_translate("mm", DATE_ALL), "m");
        assert_eq!(str_translate("m", DATE_ALL), "n");
        assert_eq!(str_translate("yyyy-mm-dd", DATE_ALL), "Y-m-d");
    }
}
