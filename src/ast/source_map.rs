/// Maps byte offsets to line/column positions within LPD source text.
pub struct SourceMap {
    line_starts: Vec<usize>,
}

impl SourceMap {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        SourceMap { line_starts }
    }

    /// Returns (line, col), both 1-based.
    pub fn lookup(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let col = offset.saturating_sub(self.line_starts[line]);
        (line + 1, col + 1)
    }

    /// Byte offset of a 1-based (line, column) pair, clamped to the source.
    pub fn offset(&self, line: usize, column: usize) -> usize {
        match line.checked_sub(1).and_then(|l| self.line_starts.get(l)) {
            Some(start) => start + column.saturating_sub(1),
            None => 0,
        }
    }

    /// Full text of the given 1-based line, without its line terminator.
    pub fn line_text<'a>(&self, source: &'a str, line: usize) -> &'a str {
        if line == 0 || line > self.line_starts.len() {
            return "";
        }
        let start = self.line_starts[line - 1];
        let end = self.line_starts.get(line).copied().unwrap_or(source.len());
        source[start..end].trim_end_matches('\n').trim_end_matches('\r')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_first_line() {
        let src = "programa p;";
        let sm = SourceMap::new(src);
        assert_eq!(sm.lookup(0), (1, 1));
        assert_eq!(sm.lookup(9), (1, 10));
    }

    #[test]
    fn lookup_across_lines() {
        let src = "programa p;\nvar x: inteiro;\ninicio fim.";
        let sm = SourceMap::new(src);
        assert_eq!(sm.lookup(11), (1, 12)); // the newline itself
        assert_eq!(sm.lookup(12), (2, 1));
        assert_eq!(sm.lookup(16), (2, 5));
        assert_eq!(sm.lookup(28), (3, 1));
    }

    #[test]
    fn offset_inverts_lookup() {
        let src = "a\nbb\nccc";
        let sm = SourceMap::new(src);
        for off in 0..src.len() {
            let (l, c) = sm.lookup(off);
            assert_eq!(sm.offset(l, c), off);
        }
        assert_eq!(sm.offset(0, 1), 0);
        assert_eq!(sm.offset(9, 1), 0);
    }

    #[test]
    fn line_text_strips_terminators() {
        let src = "inicio\r\n  escreva(x)\nfim.";
        let sm = SourceMap::new(src);
        assert_eq!(sm.line_text(src, 1), "inicio");
        assert_eq!(sm.line_text(src, 2), "  escreva(x)");
        assert_eq!(sm.line_text(src, 3), "fim.");
        assert_eq!(sm.line_text(src, 0), "");
        assert_eq!(sm.line_text(src, 4), "");
    }

    #[test]
    fn empty_source() {
        let sm = SourceMap::new("");
        assert_eq!(sm.lookup(0), (1, 1));
        assert_eq!(sm.line_text("", 1), "");
    }
}
