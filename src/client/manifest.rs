//! Dependency manifest extraction.
//!
//! The manifest is a text body whose first line is a marker/header and whose
//! remaining lines list comma-separated dependent resource filenames.
//! Extraction is a pure function over the body: it returns a lazy,
//! restartable iterator and never mutates the source text.

/// Iterate the dependent resource paths named by a manifest body.
///
/// The first line is a marker and yields nothing; every comma-separated
/// field of each later line is one path token. Empty fields are skipped.
/// Deduplication is the scheduler's job, not the extractor's.
pub fn dependencies(body: &str) -> impl Iterator<Item = &str> {
    body.lines()
        .skip(1)
        .flat_map(|line| line.split(','))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fans_out_comma_separated_lines() {
        let body = "index.html\r\na.txt,b.txt\r\n";
        let paths: Vec<_> = dependencies(body).collect();
        assert_eq!(paths, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn marker_line_is_not_a_dependency() {
        let paths: Vec<_> = dependencies("index.html\r\n").collect();
        assert!(paths.is_empty());
    }

    #[test]
    fn is_restartable() {
        let body = "top\r\none.css,two.js\r\nthree.png\r\n";
        let first: Vec<_> = dependencies(body).collect();
        let second: Vec<_> = dependencies(body).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["one.css", "two.js", "three.png"]);
    }

    #[test]
    fn tolerates_bare_newlines_and_blank_fields() {
        let body = "top\na.txt,,b.txt\n\n, c.txt\n";
        let paths: Vec<_> = dependencies(body).collect();
        assert_eq!(paths, vec!["a.txt", "b.txt", "c.txt"]);
    }
}
