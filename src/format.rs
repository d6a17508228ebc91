use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const MB: f64 = 1024.0 * 1024.0;

/// Cuts `s` to at most `max_width` columns. Fields wider than three columns
/// keep room for a `...` marker; narrower ones are cut hard.
pub fn truncate_unicode(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let (budget, marker) = if max_width > 3 {
        (max_width - 3, "...")
    } else {
        (max_width, "")
    };
    let mut result = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width > budget {
            break;
        }
        result.push(ch);
        width += ch_width;
    }
    result.push_str(marker);
    result
}

/// Truncates and left-aligns `s` in a field of `width` columns.
pub fn fit_field(s: &str, width: usize) -> String {
    let mut out = truncate_unicode(s, width);
    let used = out.width();
    out.extend(std::iter::repeat_n(' ', width.saturating_sub(used)));
    out
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / MB
}

pub fn format_cpu(percent: f64) -> String {
    format!("{percent:.1}%")
}

pub fn format_memory_kb(kb: u64) -> String {
    let mb = kb as f64 / 1024.0;
    if mb >= 0.1 {
        format!("{} MB", group_thousands(&format!("{mb:.1}")))
    } else if kb == 0 {
        "0.0 MB".to_string()
    } else {
        "< 0.1 MB".to_string()
    }
}

pub fn format_rate(bytes_per_sec: f64) -> String {
    let mb = bytes_per_sec / MB;
    if mb.abs() < 0.01 {
        "0.0 MB/s".to_string()
    } else {
        format!("{mb:.1} MB/s")
    }
}

/// `read/write` disk rates, collapsed to a single zero when both are idle.
pub fn format_disk_rates(read_bytes_per_sec: f64, write_bytes_per_sec: f64) -> String {
    let read = format_rate(read_bytes_per_sec);
    let write = format_rate(write_bytes_per_sec);
    if read == "0.0 MB/s" && write == "0.0 MB/s" {
        read
    } else {
        format!("{read}/{write}")
    }
}

/// Inserts `,` separators into the integer part of a decimal string.
fn group_thousands(number: &str) -> String {
    let (int_part, frac_part) = match number.split_once('.') {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (number, None),
    };
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };

    let mut grouped = String::with_capacity(number.len() + digits.len() / 3);
    grouped.push_str(sign);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i).is_multiple_of(3) {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }
    grouped
}
