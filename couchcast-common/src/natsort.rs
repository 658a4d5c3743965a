//! Natural-sort ordering for catalog listings
//!
//! Compares digit runs numerically so `Episode 2` sorts before `Episode 10`.
//! Comparison is case-insensitive on the non-digit runs.

use std::cmp::Ordering;

/// Compare two names in natural order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ac), Some(bc)) => {
                if ac.is_ascii_digit() && bc.is_ascii_digit() {
                    let an = take_number(&mut ai);
                    let bn = take_number(&mut bi);
                    match an.cmp(&bn) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                let al = ac.to_ascii_lowercase();
                let bl = bc.to_ascii_lowercase();
                match al.cmp(&bl) {
                    Ordering::Equal => {
                        ai.next();
                        bi.next();
                    }
                    other => return other,
                }
            }
        }
    }
}

/// Sort a list of names in place using natural order.
pub fn natural_sort(names: &mut [String]) {
    names.sort_by(|a, b| natural_cmp(a, b));
}

/// Consume a run of ASCII digits, saturating on overflow.
fn take_number(iter: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u128 {
    let mut value: u128 = 0;
    while let Some(c) = iter.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        iter.next();
        value = value
            .saturating_mul(10)
            .saturating_add((c as u8 - b'0') as u128);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_runs_compare_numerically() {
        assert_eq!(natural_cmp("ep2.mp4", "ep10.mp4"), Ordering::Less);
        assert_eq!(natural_cmp("ep10.mp4", "ep2.mp4"), Ordering::Greater);
        assert_eq!(natural_cmp("ep02.mp4", "ep2.mp4"), Ordering::Equal);
    }

    #[test]
    fn plain_text_compares_case_insensitively() {
        assert_eq!(natural_cmp("Alpha", "alpha"), Ordering::Equal);
        assert_eq!(natural_cmp("Beta", "alpha"), Ordering::Greater);
    }

    #[test]
    fn shorter_prefix_sorts_first() {
        assert_eq!(natural_cmp("show", "show extras"), Ordering::Less);
    }

    #[test]
    fn sorts_episode_lists_the_way_humans_expect() {
        let mut names = vec![
            "S01E10.mkv".to_string(),
            "S01E2.mkv".to_string(),
            "S01E1.mkv".to_string(),
            "Specials".to_string(),
        ];
        natural_sort(&mut names);
        assert_eq!(names, vec!["S01E1.mkv", "S01E2.mkv", "S01E10.mkv", "Specials"]);
    }
}
