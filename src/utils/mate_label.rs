//! Literal `\1`/`\2` mate-label handling for interleaved streams. Strip on
//! read, append on write — nothing else about the name is touched.

/// Strips a trailing literal `\1` or `\2` from `header`, if present.
pub fn strip_mate_label(header: &mut String) {
    if let Some(stripped) = header.strip_suffix("\\1").or_else(|| header.strip_suffix("\\2")) {
        header.truncate(stripped.len());
    }
}

/// Appends a literal `\` followed by `side` (expected to be `'1'` or `'2'`)
/// to `header`.
pub fn append_mate_label(header: &mut String, side: char) {
    header.push('\\');
    header.push(side);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_suffixes() {
        let mut h = "@read/0\\1".to_string();
        strip_mate_label(&mut h);
        assert_eq!(h, "@read/0");

        let mut h = "@read/0\\2".to_string();
        strip_mate_label(&mut h);
        assert_eq!(h, "@read/0");
    }

    #[test]
    fn leaves_unlabeled_names_alone() {
        let mut h = "@read/0".to_string();
        strip_mate_label(&mut h);
        assert_eq!(h, "@read/0");
    }

    #[test]
    fn append_round_trips_with_strip() {
        let mut h = "@read/0".to_string();
        append_mate_label(&mut h, '1');
        assert_eq!(h, "@read/0\\1");
        strip_mate_label(&mut h);
        assert_eq!(h, "@read/0");
    }
}
