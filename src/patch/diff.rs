//! Bounded lock-step diff.

use super::ops::Patch;

/// Candidate window comparisons allowed per diff run, across all
/// realignment searches.
pub const SEARCH_BUDGET: i64 = 10_000;

/// Compute a patch turning `source` into `target`.
///
/// Always terminates within the search budget and always satisfies
/// `apply(source, &diff(source, target)) == target`.
pub fn diff(source: &str, target: &str) -> Patch {
    let x: Vec<char> = source.chars().collect();
    let y: Vec<char> = target.chars().collect();

    // Too dissimilar to be worth searching.
    if y.len() > x.len() * 2 {
        return Patch::literal(target);
    }

    let differ = Differ {
        x: &x,
        y: &y,
        patch: Patch::new(),
        drift: 0,
        budget: SEARCH_BUDGET,
    };
    differ.run(target)
}

/// Scan state: position `i` in the source lines up with `i + drift` in the target.
struct Differ<'a> {
    x: &'a [char],
    y: &'a [char],
    patch: Patch,
    drift: isize,
    budget: i64,
}

impl<'a> Differ<'a> {
    fn run(mut self, target: &str) -> Patch {
        let x_len = self.x.len();
        let y_len = self.y.len() as isize;
        let mut i = 0usize;

        'main: while i < x_len && (i as isize + self.drift) < y_len {
            if Some(self.x[i]) == self.target_at(i) {
                let mut j = i + 1;
                loop {
                    if j >= x_len {
                        // Source exhausted: keep its tail, then whatever the target adds.
                        self.patch.push_copy(i, None);
                        let rest = slice(self.y, x_len as isize + self.drift, y_len);
                        self.patch.push_literal(rest);
                        return self.patch;
                    }
                    if Some(self.x[j]) != self.target_at(j) {
                        self.patch.push_copy(i, Some(j));
                        i = j;
                        continue 'main;
                    }
                    if j as isize + self.drift == y_len - 1 {
                        if j == x_len - 1 {
                            self.patch.push_copy(i, None);
                        } else {
                            self.patch.push_copy(i, Some(j + 1));
                        }
                        return self.patch;
                    }
                    j += 1;
                }
            }

            if let Some((l, m)) = self.realign(i) {
                let at = i as isize + self.drift;
                let inserted = slice(self.y, at, at + m);
                self.patch.push_literal(inserted);
                self.drift += m - l;
                i += l as usize;
                continue;
            }

            // No realignment: copy the tail if the source ends with it, else send it.
            let tail = slice(self.y, i as isize + self.drift, y_len);
            match find(self.x, tail, i) {
                Some(c) if x_len - c == tail.len() => self.patch.push_copy(c, None),
                _ => self.patch.push_literal(tail),
            }
            return self.patch;
        }

        if self.y.is_empty() {
            self.patch
        } else {
            Patch::literal(target)
        }
    }

    fn target_at(&self, i: usize) -> Option<char> {
        let at = i as isize + self.drift;
        if at < 0 {
            None
        } else {
            self.y.get(at as usize).copied()
        }
    }

    /// Search for the next point where the rest of the source (minus `k`
    /// chars) reappears in the target. Returns `(l, m)`: skip `l` source
    /// chars and insert `m` target chars. Smallest shift wins, then smallest
    /// source offset, then smallest target offset.
    fn realign(&mut self, i: usize) -> Option<(isize, isize)> {
        let x_len = self.x.len() as isize;
        let y_len = self.y.len() as isize;
        let i = i as isize;

        let mut k = 0isize;
        while k * 2 < x_len - i {
            if self.budget <= 0 {
                return None;
            }

            let mut l = 0isize;
            while l < k && self.budget > 0 {
                let a = slice(self.x, i + l, x_len - k + l);

                let mut m = 0isize;
                while m < y_len - self.drift - x_len + k {
                    self.budget -= 1;
                    if self.budget <= 0 {
                        break;
                    }
                    let b = slice(self.y, i + self.drift + m, x_len - k + self.drift + m);
                    if a == b {
                        return Some((l, m));
                    }
                    m += 1;
                }
                l += 1;
            }
            k += 1;
        }

        None
    }
}

/// Clamped slice: out-of-range bounds shrink to the text, inverted bounds are empty.
fn slice(text: &[char], start: isize, end: isize) -> &[char] {
    let len = text.len() as isize;
    let end = end.clamp(0, len) as usize;
    let start = start.clamp(0, len) as usize;
    if start >= end {
        &[]
    } else {
        &text[start..end]
    }
}

/// First occurrence of `needle` in `haystack` at or after `from`.
fn find(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::apply;

    fn check(x: &str, y: &str, expected: &str) {
        let patch = diff(x, y);
        assert_eq!(serde_json::to_string(&patch).unwrap(), expected, "diff({x:?}, {y:?})");
        assert_eq!(apply(x, &patch), y);
    }

    #[test]
    fn test_insertion_inside_value() {
        check(
            r#"{ foo: "bar", baz: "qux" }"#,
            r#"{ foo: "barrister", baz: "qux" }"#,
            r#"[0,11,"rister",11]"#,
        );
    }

    #[test]
    fn test_two_insertions() {
        check(
            r#"{ foo: "bar", baz: "qux" }"#,
            r#"{ foo: "barrister", baz: "quxster" }"#,
            r#"[0,11,"rister",11,23,"ster",23]"#,
        );
    }

    #[test]
    fn test_removed_member() {
        check(r#"{ foo: "bar", baz: "qux" }"#, r#"{ foo: "bar" }"#, "[0,12,24]");
        check(
            r#"{ foo: "bar", baz: "qux", abc: "xyz" }"#,
            r#"{ foo: "bar", abc: "xyz" }"#,
            "[0,14,26]",
        );
    }

    #[test]
    fn test_replaced_char() {
        check(r#"{ foo: "bar" }"#, r#"{ foo: "jar" }"#, r#"[0,8,"j",9]"#);
        check(
            r#"{ foo: "bad", baz: "qux" }"#,
            r#"{ foo: "bark", baz: "qux" }"#,
            r#"[0,10,"rk",11]"#,
        );
    }

    #[test]
    fn test_identical_is_single_copy() {
        check(r#"{ foo: "bar", baz: "qux" }"#, r#"{ foo: "bar", baz: "qux" }"#, "[0]");
    }

    #[test]
    fn test_empty_target() {
        check(r#"{ foo: "bar", baz: "qux" }"#, "", "[]");
        check("", "", "[]");
    }

    #[test]
    fn test_suffix_edits() {
        check(
            r#"{ foo: "bar", baz: "qux" "#,
            r#"{ foo: "bar", baz: "qux" }"#,
            r#"[0,"}"]"#,
        );
        check(
            r#"{ foo: "bar", baz: "qux" }"#,
            r#"{ foo: "bar", baz: "qux" "#,
            "[0,25]",
        );
    }

    #[test]
    fn test_much_longer_target_is_literal() {
        check("{", r#"{ foo: "bar", baz: "qux" }"#, r#"["{ foo: \"bar\", baz: \"qux\" }"]"#);
        check("", r#"{ foo: "bar" }"#, r#"["{ foo: \"bar\" }"]"#);
    }

    #[test]
    fn test_mixed_insert_and_delete() {
        check(
            r#"{ foo: "", baz: "qux" }"#,
            r#"{ foo: "bar", abc: "xyz", baz: "" }"#,
            r#"[0,8,"bar\", abc: \"xyz",8,17,20]"#,
        );
    }

    #[test]
    fn test_tail_found_in_source() {
        check("renice", "renie", "[0,4,5]");
    }

    #[test]
    fn test_removed_prefix() {
        check(r#"{ foo: "bar" }"#, r#" foo: "bar" }"#, "[1]");
    }

    #[test]
    fn test_budget_bounds_large_inputs() {
        let x: String = (0..2000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let y: String = x.chars().rev().collect();
        let patch = diff(&x, &y);
        assert_eq!(apply(&x, &patch), y);
    }

    #[test]
    fn test_slice_clamps() {
        let text: Vec<char> = "abc".chars().collect();
        assert_eq!(slice(&text, -2, 2), &['a', 'b']);
        assert_eq!(slice(&text, 2, 10), &['c']);
        assert!(slice(&text, 3, 1).is_empty());
    }
}
