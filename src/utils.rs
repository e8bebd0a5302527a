use std::fmt::Write;

/// Joins an iterator of [`std::fmt::Display`]'ables into a new `String`.
pub(crate) fn iter_join<I, T>(iter: I, delim: &str) -> String
where
    I: IntoIterator<Item = T>,
    T: std::fmt::Display,
{
    let mut s = String::new();
    for (i, item) in iter.into_iter().enumerate() {
        if i > 0 {
            s.push_str(delim);
        }
        let _ = write!(s, "{}", item);
    }
    s
}
