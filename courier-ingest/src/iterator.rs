//! Iterator over the meaningful lines of a text payload.

/// Yields every line of `src` trimmed, skipping blank ones.
pub(crate) struct Lines<'a> {
    lines: std::str::Lines<'a>,
}

impl<'a> Lines<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        // A leading BOM would otherwise end up glued to the first value.
        let src = src.strip_prefix('\u{feff}').unwrap_or(src);
        Self { lines: src.lines() }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let trimmed = self.lines.next()?.trim();
            if !trimmed.is_empty() {
                return Some(trimmed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_blank_and_whitespace_lines() {
        let src = "\u{feff} 555-1234 \n\n   \r\n\t777\n";
        let got: Vec<_> = Lines::new(src).collect();
        assert_eq!(got, vec!["555-1234", "777"]);
    }
}
