/// Displays bytes in string form if they make up a string, else just displays them as bytes.
pub(crate) fn display_magic_number(bytes: &[u8]) -> String {
	std::str::from_utf8(bytes).map(str::to_owned).unwrap_or(format!("{bytes:?}"))
}

/// Reads the integer at the start of `s` the way C's `atoi` does: leading whitespace and a sign are accepted,
/// parsing stops at the first non-digit, and no digits at all gives 0.
pub(crate) fn leading_int(s: &str) -> i64 {
	let s = s.trim_start();
	let (negative, digits) = match s.as_bytes().first() {
		Some(b'-') => (true, &s[1..]),
		Some(b'+') => (false, &s[1..]),
		_ => (false, s),
	};
	let value = digits
		.bytes()
		.take_while(u8::is_ascii_digit)
		.fold(0i64, |acc, digit| acc.saturating_mul(10).saturating_add((digit - b'0') as i64));
	if negative { -value } else { value }
}
