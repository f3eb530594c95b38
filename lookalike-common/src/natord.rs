//! Natural ordering: `img2` sorts before `img10`.
//!
//! Names are split into runs of ASCII digits and runs of everything else.
//! Digit runs compare by integer value (of any length), text runs compare
//! case-insensitively. At the same position a digit run sorts before a text
//! run, which keeps names that start with a number ahead of names that do
//! not. Names that are equal under these rules fall back to a plain byte
//! comparison so the order stays total.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digits)
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());
        let (head, tail) = self.rest.split_at(end);
        self.rest = tail;
        Some(if digits {
            Chunk::Digits(head)
        } else {
            Chunk::Text(head)
        })
    }
}

fn chunks(s: &str) -> Chunks<'_> {
    Chunks { rest: s }
}

fn compare_digits(a: &str, b: &str) -> Ordering {
    let ta = a.trim_start_matches('0');
    let tb = b.trim_start_matches('0');
    ta.len()
        .cmp(&tb.len())
        .then_with(|| ta.cmp(tb))
        .then_with(|| a.len().cmp(&b.len()))
}

fn compare_text(a: &str, b: &str) -> Ordering {
    let la = a.chars().flat_map(char::to_lowercase);
    let lb = b.chars().flat_map(char::to_lowercase);
    la.cmp(lb)
}

/// Compare two names in natural order.
///
/// ```
/// use lookalike_common::natord::compare;
/// use std::cmp::Ordering;
///
/// assert_eq!(compare("img2", "img10"), Ordering::Less);
/// assert_eq!(compare("Cat", "cat"), compare("Cat", "cat"));
/// ```
pub fn compare(a: &str, b: &str) -> Ordering {
    let mut ca = chunks(a);
    let mut cb = chunks(b);
    loop {
        let ord = match (ca.next(), cb.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(Chunk::Digits(x)), Some(Chunk::Digits(y))) => compare_digits(x, y),
            (Some(Chunk::Text(x)), Some(Chunk::Text(y))) => compare_text(x, y),
            (Some(Chunk::Digits(_)), Some(Chunk::Text(_))) => Ordering::Less,
            (Some(Chunk::Text(_)), Some(Chunk::Digits(_))) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

/// Sort `items` in place by the natural order of the string returned by `key`.
pub fn sort_natural<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> &str,
{
    items.sort_by(|a, b| compare(key(a), key(b)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(input: &[&str]) -> Vec<String> {
        let mut v: Vec<String> = input.iter().map(|s| s.to_string()).collect();
        sort_natural(&mut v, |s| s.as_str());
        v
    }

    #[test]
    fn numbers_compare_as_integers() {
        assert_eq!(sorted(&["img10", "img2", "img1"]), ["img1", "img2", "img10"]);
    }

    #[test]
    fn text_compares_case_insensitively() {
        assert_eq!(sorted(&["beta", "Alpha", "alpha2"]), ["Alpha", "alpha2", "beta"]);
    }

    #[test]
    fn leading_zeros_do_not_change_value() {
        assert_eq!(compare("a007", "a7"), Ordering::Greater);
        assert_eq!(compare("a007", "a8"), Ordering::Less);
    }

    #[test]
    fn very_long_digit_runs_do_not_overflow() {
        let big = "x123456789012345678901234567890";
        let bigger = "x923456789012345678901234567890";
        assert_eq!(compare(big, bigger), Ordering::Less);
        assert_eq!(compare("x9", big), Ordering::Less);
    }

    #[test]
    fn numeric_prefix_sorts_before_text_prefix() {
        assert_eq!(sorted(&["cat", "10cat", "2cat"]), ["2cat", "10cat", "cat"]);
    }

    #[test]
    fn category_names_with_separators() {
        assert_eq!(
            sorted(&["n02_img10.png", "n02_img9.png", "n01_img100.png"]),
            ["n01_img100.png", "n02_img9.png", "n02_img10.png"]
        );
    }

    #[test]
    fn order_is_total_for_case_variants() {
        assert_ne!(compare("Cat", "cat"), Ordering::Equal);
        assert_eq!(compare("cat", "cat"), Ordering::Equal);
    }
}
