/// Owns the source text of one compilation unit and maps character
/// offsets to 1-based line/column pairs for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    pub name: String,
    source: Vec<char>,
    line_indices: Vec<usize>,
}

impl SourceMap {
    pub fn new(source: String) -> Self {
        Self::from_source("(script)", source)
    }

    pub fn from_source(name: &str, source: String) -> Self {
        let chars: Vec<char> = source.chars().collect();
        let mut line_indices = Vec::new();
        let mut in_string = false;
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '"' => in_string = !in_string,
                '\\' if in_string => {
                    // Skip the escaped character as well.
                    i += 2;
                    continue;
                }
                '\n' if !in_string => line_indices.push(i),
                _ => {}
            }
            i += 1;
        }

        Self {
            name: name.to_string(),
            source: chars,
            line_indices,
        }
    }

    pub fn get_source(&self) -> &[char] {
        &self.source
    }

    /// Returns a single line of source, without its trailing newline.
    pub fn get_line(&self, line_number: u32) -> &[char] {
        if line_number == 0 {
            return &[];
        }

        let line_index = (line_number - 1) as usize;

        let start = if line_number == 1 {
            0
        } else if let Some(&prev_newline) = self.line_indices.get(line_index - 1) {
            prev_newline + 1
        } else {
            return &[];
        };

        let end = if let Some(&newline) = self.line_indices.get(line_index) {
            newline
        } else if line_index == self.line_indices.len() {
            self.source.len()
        } else {
            return &[];
        };

        if start <= end && end <= self.source.len() {
            &self.source[start..end]
        } else {
            &[]
        }
    }

    pub fn get_line_number(&self, position: usize) -> u32 {
        if position >= self.source.len() {
            return (self.line_indices.len() + 1) as u32;
        }

        match self.line_indices.binary_search(&position) {
            Ok(index) => (index + 1) as u32,
            Err(index) => (index + 1) as u32,
        }
    }

    pub fn get_column_number(&self, position: usize) -> u32 {
        if position >= self.source.len() {
            return 1;
        }
        let line_number = self.get_line_number(position);
        let line_start = if line_number == 1 {
            0
        } else {
            let line_index = (line_number - 2) as usize;
            self.line_indices
                .get(line_index)
                .map(|&newline| newline + 1)
                .unwrap_or(0)
        };
        (position - line_start + 1) as u32
    }
}

/// A half-open character range into a SourceMap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_positions_to_lines_and_columns() {
        let map = SourceMap::new("var a = 1;\nvar b = 2;".to_string());

        assert_eq!(map.get_line_number(0), 1);
        assert_eq!(map.get_line_number(11), 2);
        assert_eq!(map.get_column_number(11), 1);
        assert_eq!(map.get_column_number(15), 5);
    }

    #[test]
    fn ignores_newlines_inside_strings_when_indexing() {
        let map = SourceMap::from_source("test", "var a = \"x\";\nprint a;".to_string());
        assert_eq!(map.get_line_number(13), 2);
    }

    #[test]
    fn fetches_single_lines() {
        let map = SourceMap::new("one\ntwo\nthree".to_string());
        let line: String = map.get_line(2).iter().collect();
        assert_eq!(line, "two");
        let line: String = map.get_line(3).iter().collect();
        assert_eq!(line, "three");
    }
}
