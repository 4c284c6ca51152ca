use std::ops::Range;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::error::ElementError;
use super::types::ElementSet;

const LINE_LENGTH: usize = 69;

/// Modulo-10 checksum over the first 68 columns of an element line.
///
/// Digits count their value, a minus sign counts one, everything else zero.
pub fn checksum(line: &str) -> u8 {
    let sum: u32 = line
        .bytes()
        .take(LINE_LENGTH - 1)
        .map(|b| match b {
            b'0'..=b'9' => u32::from(b - b'0'),
            b'-' => 1,
            _ => 0,
        })
        .sum();
    (sum % 10) as u8
}

/// Parse the first record of `text`, either a named 3-line record or a bare 2-line one.
pub fn parse(text: &str) -> Result<ElementSet, ElementError> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect();

    match lines.as_slice() {
        [line1, line2, ..] if line1.starts_with("1 ") => parse_record(None, line1, line2),
        [name, line1, line2, ..] => parse_record(Some(name), line1, line2),
        _ => Err(ElementError::parse(0, "expected a name line and two element lines")),
    }
}

/// Parse every record in `text`; lines that do not start a record are skipped.
pub fn parse_all(text: &str) -> Result<Vec<ElementSet>, ElementError> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect();

    let mut result = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].starts_with("1 ") && i + 1 < lines.len() && lines[i + 1].starts_with("2 ") {
            result.push(parse_record(None, lines[i], lines[i + 1])?);
            i += 2;
        } else if i + 2 < lines.len()
            && lines[i + 1].starts_with("1 ")
            && lines[i + 2].starts_with("2 ")
        {
            result.push(parse_record(Some(lines[i]), lines[i + 1], lines[i + 2])?);
            i += 3;
        } else {
            i += 1;
        }
    }

    Ok(result)
}

/// Find the record whose name line contains `identifier` and parse it.
///
/// The first line containing the identifier is taken as the name line; the two
/// lines following it must be the element lines.
pub fn lookup(text: &str, identifier: &str) -> Result<ElementSet, ElementError> {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();

    let index = lines
        .iter()
        .position(|line| line.contains(identifier))
        .ok_or_else(|| ElementError::NotFound(identifier.to_string()))?;

    if index + 2 >= lines.len() {
        return Err(ElementError::parse(
            0,
            format!("incomplete record for {identifier:?}"),
        ));
    }

    parse_record(Some(lines[index]), lines[index + 1], lines[index + 2])
}

fn parse_record(name: Option<&str>, line1: &str, line2: &str) -> Result<ElementSet, ElementError> {
    let line1 = validate_line(line1, 1)?;
    let line2 = validate_line(line2, 2)?;

    let norad_id: u32 = number(line1, 2..7, 1, "catalog number")?;
    let norad_id_2: u32 = number(line2, 2..7, 2, "catalog number")?;
    if norad_id != norad_id_2 {
        return Err(ElementError::parse(
            2,
            format!("catalog number {norad_id_2} does not match line 1 ({norad_id})"),
        ));
    }

    let name = name
        .map(|n| n.trim())
        .map(|n| n.strip_prefix("0 ").unwrap_or(n).trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("NORAD {norad_id}"));

    let epoch_year: i32 = number(line1, 18..20, 1, "epoch year")?;
    let epoch_day: f64 = number(line1, 20..32, 1, "epoch day")?;

    let mean_motion_dot = parse_decimal_point(field(line1, 33..43))
        .ok_or_else(|| ElementError::parse(1, "invalid mean motion derivative"))?;
    let mean_motion_ddot = parse_implied_decimal(field(line1, 44..52))
        .ok_or_else(|| ElementError::parse(1, "invalid mean motion second derivative"))?;
    let drag_term = parse_implied_decimal(field(line1, 53..61))
        .ok_or_else(|| ElementError::parse(1, "invalid drag term"))?;
    let element_set_number: u32 = optional_number(line1, 64..68, 1, "element set number")?;

    let eccentricity = parse_implied_decimal(field(line2, 26..33))
        .filter(|e| (0.0..1.0).contains(e))
        .ok_or_else(|| ElementError::parse(2, "invalid eccentricity"))?;
    let mean_motion_rev_per_day: f64 = number(line2, 52..63, 2, "mean motion")?;
    if mean_motion_rev_per_day <= 0.0 {
        return Err(ElementError::parse(2, "mean motion must be positive"));
    }

    Ok(ElementSet {
        name,
        norad_id,
        classification: field(line1, 7..8).trim().to_string(),
        international_designator: field(line1, 9..17).trim().to_string(),
        epoch: epoch_from_fields(epoch_year, epoch_day)?,
        mean_motion_dot,
        mean_motion_ddot,
        drag_term,
        element_set_number,
        inclination_deg: number(line2, 8..16, 2, "inclination")?,
        right_ascension_deg: number(line2, 17..25, 2, "right ascension")?,
        eccentricity,
        argument_of_perigee_deg: number(line2, 34..42, 2, "argument of perigee")?,
        mean_anomaly_deg: number(line2, 43..51, 2, "mean anomaly")?,
        mean_motion_rev_per_day,
        revolution_number: optional_number(line2, 63..68, 2, "revolution number")?,
    })
}

fn validate_line(line: &str, number: u8) -> Result<&str, ElementError> {
    let line = line.trim();

    if !line.is_ascii() {
        return Err(ElementError::parse(number, "non-ASCII characters"));
    }
    if line.len() < LINE_LENGTH {
        return Err(ElementError::parse(
            number,
            format!("expected {LINE_LENGTH} columns, found {}", line.len()),
        ));
    }

    let expected_prefix = [b'0' + number, b' '];
    if line.as_bytes()[..2] != expected_prefix {
        return Err(ElementError::parse(
            number,
            format!("line must start with \"{number} \""),
        ));
    }

    let stated = line.as_bytes()[LINE_LENGTH - 1];
    if !stated.is_ascii_digit() {
        return Err(ElementError::parse(number, "missing checksum digit"));
    }
    let computed = checksum(line);
    if stated - b'0' != computed {
        return Err(ElementError::parse(
            number,
            format!("checksum mismatch: stated {}, computed {computed}", stated - b'0'),
        ));
    }

    Ok(line)
}

fn field(line: &str, columns: Range<usize>) -> &str {
    line.get(columns).unwrap_or("")
}

fn number<T: FromStr>(
    line: &str,
    columns: Range<usize>,
    line_number: u8,
    what: &str,
) -> Result<T, ElementError> {
    let raw = field(line, columns).trim();
    raw.parse()
        .map_err(|_| ElementError::parse(line_number, format!("invalid {what}: {raw:?}")))
}

fn optional_number<T: FromStr + Default>(
    line: &str,
    columns: Range<usize>,
    line_number: u8,
    what: &str,
) -> Result<T, ElementError> {
    if field(line, columns.clone()).trim().is_empty() {
        return Ok(T::default());
    }
    number(line, columns, line_number, what)
}

fn epoch_from_fields(two_digit_year: i32, day_of_year: f64) -> Result<DateTime<Utc>, ElementError> {
    if !(1.0..367.0).contains(&day_of_year) {
        return Err(ElementError::parse(1, format!("invalid epoch day {day_of_year}")));
    }
    let year = if two_digit_year < 57 {
        2000 + two_digit_year
    } else {
        1900 + two_digit_year
    };
    let year_start = Utc
        .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| ElementError::parse(1, format!("invalid epoch year {year}")))?;
    let offset = Duration::nanoseconds(((day_of_year - 1.0) * 86_400e9).round() as i64);
    Ok(year_start + offset)
}

/// Fields written with an explicit decimal point and no leading zero, e.g. `-.00002182`.
fn parse_decimal_point(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return Some(0.0);
    }
    let (sign, digits) = match s.as_bytes()[0] {
        b'-' => (-1.0, &s[1..]),
        b'+' => (1.0, &s[1..]),
        _ => (1.0, s),
    };
    let digits = digits.trim();
    let value: f64 = if digits.starts_with('.') {
        format!("0{digits}").parse().ok()?
    } else {
        digits.parse().ok()?
    };
    Some(sign * value)
}

/// Fields with an implied leading decimal point and a one-digit exponent, e.g. `-11606-4`.
fn parse_implied_decimal(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return Some(0.0);
    }
    let (sign, rest) = match s.as_bytes()[0] {
        b'-' => (-1.0, &s[1..]),
        b'+' => (1.0, &s[1..]),
        _ => (1.0, s),
    };
    let (mantissa, exponent) = match rest.rfind(['+', '-']) {
        Some(i) if i > 0 => (&rest[..i], rest[i..].parse::<i32>().ok()?),
        _ => (rest, 0),
    };
    let mantissa = mantissa.trim();
    if mantissa.is_empty() || !mantissa.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mantissa: f64 = format!("0.{mantissa}").parse().ok()?;
    Some(sign * mantissa * 10f64.powi(exponent))
}

pub(crate) fn format_decimal_point(value: f64) -> String {
    let digits = format!("{:.8}", value.abs());
    let digits = digits.strip_prefix('0').unwrap_or(&digits);
    let sign = if value < 0.0 { '-' } else { ' ' };
    format!("{sign}{digits}")
}

pub(crate) fn format_implied_decimal(value: f64) -> String {
    const ZERO: &str = " 00000-0";
    if value == 0.0 || !value.is_finite() {
        return ZERO.to_string();
    }
    let sign = if value < 0.0 { '-' } else { ' ' };
    let mut exponent = value.abs().log10().floor() as i32 + 1;
    let mut mantissa = (value.abs() / 10f64.powi(exponent) * 1e5).round() as u32;
    if mantissa >= 100_000 {
        mantissa /= 10;
        exponent += 1;
    }
    if exponent < -9 {
        return ZERO.to_string();
    }
    let exponent = exponent.min(9);
    let exponent_sign = if exponent < 0 { '-' } else { '+' };
    format!("{sign}{mantissa:05}{exponent_sign}{}", exponent.abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::fixtures::{CATALOG, ISS};
    use chrono::Timelike;

    #[test]
    fn checksum_matches_published_lines() {
        for line in CATALOG.lines().filter(|l| l.starts_with('1') || l.starts_with('2')) {
            let stated = line.as_bytes()[68] - b'0';
            assert_eq!(checksum(line), stated, "{line}");
        }
    }

    #[test]
    fn parses_named_record() {
        let set = parse(ISS).unwrap();
        assert_eq!(set.name, "ISS (ZARYA)");
        assert_eq!(set.norad_id, 25544);
        assert_eq!(set.classification, "U");
        assert_eq!(set.international_designator, "98067A");
        assert_eq!(set.element_set_number, 292);
        assert_eq!(set.revolution_number, 56353);
        assert!((set.inclination_deg - 51.6416).abs() < 1e-12);
        assert!((set.right_ascension_deg - 247.4627).abs() < 1e-12);
        assert!((set.eccentricity - 0.0006703).abs() < 1e-12);
        assert!((set.argument_of_perigee_deg - 130.5360).abs() < 1e-12);
        assert!((set.mean_anomaly_deg - 325.0288).abs() < 1e-12);
        assert!((set.mean_motion_rev_per_day - 15.72125391).abs() < 1e-12);
        assert!((set.mean_motion_dot + 0.00002182).abs() < 1e-15);
        assert!((set.drag_term + 0.11606e-4).abs() < 1e-15);
        assert_eq!(set.mean_motion_ddot, 0.0);
    }

    #[test]
    fn epoch_is_day_of_year() {
        let set = parse(ISS).unwrap();
        // Day 264.51782528 of 2008 is 20 September, 12:25:40.104 UTC.
        assert_eq!(set.epoch.date_naive().to_string(), "2008-09-20");
        assert_eq!(set.epoch.hour(), 12);
        assert_eq!(set.epoch.minute(), 25);
        assert_eq!(set.epoch.second(), 40);

        let vanguard = lookup(CATALOG, "VANGUARD").unwrap();
        assert_eq!(vanguard.epoch.date_naive().to_string(), "2000-06-27");
    }

    #[test]
    fn parses_bare_two_line_record() {
        let bare: String = ISS.lines().skip(1).collect::<Vec<_>>().join("\n");
        let set = parse(&bare).unwrap();
        assert_eq!(set.name, "NORAD 25544");
    }

    #[test]
    fn lookup_matches_substring_of_name_line() {
        let set = lookup(CATALOG, "ZARYA").unwrap();
        assert_eq!(set.norad_id, 25544);
        let set = lookup(CATALOG, "VANGUARD").unwrap();
        assert_eq!(set.norad_id, 5);
    }

    #[test]
    fn lookup_reports_missing_object() {
        let err = lookup(CATALOG, "HUBBLE").unwrap_err();
        assert!(matches!(err, ElementError::NotFound(ref id) if id == "HUBBLE"));
    }

    #[test]
    fn lookup_reports_truncated_record() {
        let truncated = "ISS (ZARYA)\n1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927\n";
        let err = lookup(truncated, "ISS").unwrap_err();
        assert!(matches!(err, ElementError::Parse { .. }));
    }

    #[test]
    fn rejects_checksum_mismatch() {
        let corrupted = ISS.replace("0  2927", "0  2928");
        let err = parse(&corrupted).unwrap_err();
        match err {
            ElementError::Parse { line, message } => {
                assert_eq!(line, 1);
                assert!(message.contains("checksum"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_short_or_mismatched_lines() {
        let short = "X\n1 25544U 98067A\n2 25544  51.6416\n";
        assert!(matches!(parse(short), Err(ElementError::Parse { line: 1, .. })));

        let swapped: Vec<&str> = ISS.lines().collect();
        let swapped = format!("{}\n{}\n{}\n", swapped[0], swapped[2], swapped[1]);
        assert!(matches!(parse(&swapped), Err(ElementError::Parse { .. })));
    }

    #[test]
    fn parse_all_reads_every_record() {
        let sets = parse_all(CATALOG).unwrap();
        let ids: Vec<u32> = sets.iter().map(|s| s.norad_id).collect();
        assert_eq!(ids, vec![5, 25544]);
    }

    #[test]
    fn round_trips_through_element_lines() {
        for name in ["ZARYA", "VANGUARD"] {
            let original = lookup(CATALOG, name).unwrap();
            let (line1, line2) = original.to_lines();

            let source: Vec<&str> = CATALOG.lines().collect();
            let index = source.iter().position(|l| l.contains(name)).unwrap();
            assert_eq!(line1, source[index + 1]);
            assert_eq!(line2, source[index + 2]);

            let reparsed = parse(&format!("{}\n{line1}\n{line2}\n", original.name)).unwrap();
            assert_eq!(reparsed.inclination_deg, original.inclination_deg);
            assert_eq!(reparsed.eccentricity, original.eccentricity);
            assert_eq!(reparsed.mean_motion_rev_per_day, original.mean_motion_rev_per_day);
            assert_eq!(reparsed.right_ascension_deg, original.right_ascension_deg);
            assert_eq!(reparsed.argument_of_perigee_deg, original.argument_of_perigee_deg);
            assert_eq!(reparsed.mean_anomaly_deg, original.mean_anomaly_deg);
            assert!((reparsed.drag_term - original.drag_term).abs() < 1e-12);
            assert!((reparsed.epoch - original.epoch).num_milliseconds().abs() <= 1);
        }
    }

    #[test]
    fn implied_decimal_fields() {
        assert_eq!(parse_implied_decimal(" 00000-0"), Some(0.0));
        assert!((parse_implied_decimal("-11606-4").unwrap() + 1.1606e-5).abs() < 1e-18);
        assert!((parse_implied_decimal(" 28098-4").unwrap() - 2.8098e-5).abs() < 1e-18);
        assert_eq!(parse_implied_decimal("12a45-3"), None);
        assert_eq!(format_implied_decimal(-1.1606e-5), "-11606-4");
        assert_eq!(format_implied_decimal(0.0), " 00000-0");
        assert_eq!(format_decimal_point(-0.00002182), "-.00002182");
        assert_eq!(format_decimal_point(0.00000023), " .00000023");
    }
}
