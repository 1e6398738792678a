use crate::error::{ExchangeError, Result};

const SEPARATORS: [char; 3] = [',', '.', ' '];

fn invalid(text: &str) -> ExchangeError {
    ExchangeError::InvalidAmount(format!("cannot parse '{}'", text))
}

fn scale(minor_digits: u32) -> Result<i64> {
    10i64
        .checked_pow(minor_digits)
        .ok_or_else(|| ExchangeError::InvalidAmount(format!("unsupported precision {}", minor_digits)))
}

pub fn parse_amount(text: &str, minor_digits: u32) -> Result<i64> {
    if text.contains('-') {
        return Err(ExchangeError::InvalidAmount(format!("negative amount '{}'", text.trim())));
    }

    let body = text
        .trim()
        .trim_matches(|c: char| !c.is_ascii_digit() && c != ',' && c != '.')
        .replace('\u{a0}', " ");

    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit() || SEPARATORS.contains(&c)) {
        return Err(invalid(text));
    }

    let (integer, fraction) = split_fraction(&body, minor_digits);

    let mut groups = integer.split(|c| SEPARATORS.contains(&c));
    let mut digits = String::new();
    match groups.next() {
        Some(first) if !first.is_empty() => digits.push_str(first),
        _ => return Err(invalid(text)),
    }
    let mut grouped = false;
    for group in groups {
        if group.len() != 3 {
            return Err(invalid(text));
        }
        grouped = true;
        digits.push_str(group);
    }
    if grouped && integer.split(|c| SEPARATORS.contains(&c)).next().map_or(0, str::len) > 3 {
        return Err(invalid(text));
    }

    let whole: i64 = digits.parse().map_err(|_| invalid(text))?;
    let unit = scale(minor_digits)?;

    let fractional = match fraction {
        Some(frac) => {
            let value: i64 = frac.parse().map_err(|_| invalid(text))?;
            let missing = minor_digits - frac.len() as u32;
            value * scale(missing)?
        }
        None => 0,
    };

    whole
        .checked_mul(unit)
        .and_then(|v| v.checked_add(fractional))
        .ok_or_else(|| ExchangeError::InvalidAmount(format!("amount '{}' is too large", text.trim())))
}

fn split_fraction(body: &str, minor_digits: u32) -> (&str, Option<&str>) {
    if minor_digits == 0 {
        return (body, None);
    }

    let Some(pos) = body.rfind([',', '.']) else {
        return (body, None);
    };
    let sep = body[pos..].chars().next().unwrap_or('.');
    let tail = &body[pos + 1..];

    let occurs_once = body.matches(sep).count() == 1;
    let other_before = body[..pos].contains(if sep == ',' { '.' } else { ',' });
    let fits = !tail.is_empty() && tail.len() <= minor_digits as usize && tail.chars().all(|c| c.is_ascii_digit());

    if fits && occurs_once && (other_before || tail.len() != 3) {
        (&body[..pos], Some(tail))
    } else {
        (body, None)
    }
}

pub fn format_amount(amount: i64, minor_digits: u32) -> String {
    let unit = 10u64.pow(minor_digits.min(18));
    let magnitude = amount.unsigned_abs();
    let whole = (magnitude / unit).to_string();

    let mut out = String::with_capacity(whole.len() + whole.len() / 3 + minor_digits as usize + 2);
    if amount < 0 {
        out.push('-');
    }
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if minor_digits > 0 {
        out.push('.');
        out.push_str(&format!("{:0width$}", magnitude % unit, width = minor_digits as usize));
    }
    out
}

pub fn price_difference(a: i64, b: i64) -> i64 {
    i64::try_from(a.abs_diff(b)).unwrap_or(i64::MAX)
}
