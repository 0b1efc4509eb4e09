use std::cmp::Ordering;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::row::Row;
use crate::view_state::{FilterState, SortDirection, SortState};

/// Derives the displayed rows from the loaded window. Filters first, then a
/// stable sort, so rows with equal keys keep their received order in either
/// direction.
#[must_use]
pub fn reduce<'a>(window: &'a [Row], filters: &FilterState, sort: &SortState) -> Vec<&'a Row> {
    let mut rows = window
        .iter()
        .filter(|row| filters.matches(row))
        .collect::<Vec<_>>();

    if let Some(key) = sort.active() {
        rows.sort_by(|left, right| {
            let ordering = locale_compare(left.get(key.field), right.get(key.field));
            match key.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
    }

    rows
}

/// Collation-style comparison: base letters first (accents and case
/// ignored, punctuation before digits before letters), then accents, then
/// lowercase before uppercase, then code points. Equal strings compare equal
/// so the stable sort keeps their order.
#[must_use]
pub fn locale_compare(left: &str, right: &str) -> Ordering {
    base_key(left)
        .cmp(base_key(right))
        .then_with(|| accent_key(left).cmp(accent_key(right)))
        .then_with(|| {
            left.chars()
                .map(char::is_uppercase)
                .cmp(right.chars().map(char::is_uppercase))
        })
        .then_with(|| left.cmp(right))
}

fn base_key(text: &str) -> impl Iterator<Item = (u8, char)> + '_ {
    text.nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .map(|ch| (char_class(ch), ch))
}

fn accent_key(text: &str) -> impl Iterator<Item = char> + '_ {
    text.nfd().flat_map(char::to_lowercase)
}

fn char_class(ch: char) -> u8 {
    if ch.is_whitespace() {
        0
    } else if ch.is_numeric() {
        2
    } else if ch.is_alphabetic() {
        3
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::{locale_compare, reduce};
    use crate::fields::Field;
    use crate::row::Row;
    use crate::view_state::{FilterState, SortDirection, SortState};

    fn named(name: &str, tag: &str) -> Row {
        Row::new()
            .with(Field::LegalName, name)
            .with(Field::DbaName, tag)
    }

    fn names<'a>(rows: &[&'a Row]) -> Vec<&'a str> {
        rows.iter().map(|row| row.get(Field::LegalName)).collect()
    }

    fn tags<'a>(rows: &[&'a Row]) -> Vec<&'a str> {
        rows.iter().map(|row| row.get(Field::DbaName)).collect()
    }

    #[test]
    fn empty_window_reduces_to_nothing() {
        let filters = FilterState::new().with(Field::LegalName, "acme");
        let sort = SortState::by(Field::LegalName, SortDirection::Ascending);
        assert!(reduce(&[], &filters, &sort).is_empty());
    }

    #[test]
    fn no_filter_and_no_sort_keeps_received_order() {
        let window = vec![named("b", "1"), named("a", "2"), named("c", "3")];
        let rows = reduce(&window, &FilterState::new(), &SortState::none());
        assert_eq!(names(&rows), vec!["b", "a", "c"]);
    }

    #[test]
    fn legal_name_filter_keeps_only_matching_rows() {
        let window = vec![named("ACME LLC", ""), named("Beta Co", "")];
        let filters = FilterState::new().with(Field::LegalName, "acme");
        let rows = reduce(&window, &filters, &SortState::none());
        assert_eq!(names(&rows), vec!["ACME LLC"]);
    }

    #[test]
    fn sort_compares_strings_not_numbers() {
        let window = vec![
            Row::new().with(Field::PowerUnits, "10"),
            Row::new().with(Field::PowerUnits, "9"),
            Row::new().with(Field::PowerUnits, "100"),
        ];
        let sort = SortState::by(Field::PowerUnits, SortDirection::Ascending);
        let rows = reduce(&window, &FilterState::new(), &sort);
        let units = rows
            .iter()
            .map(|row| row.get(Field::PowerUnits))
            .collect::<Vec<_>>();
        assert_eq!(units, vec!["10", "100", "9"]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys_in_both_directions() {
        let window = vec![
            named("beta", "first-beta"),
            named("alpha", "first-alpha"),
            named("beta", "second-beta"),
            named("alpha", "second-alpha"),
        ];

        let ascending = SortState::by(Field::LegalName, SortDirection::Ascending);
        let rows = reduce(&window, &FilterState::new(), &ascending);
        assert_eq!(
            tags(&rows),
            vec!["first-alpha", "second-alpha", "first-beta", "second-beta"]
        );

        let descending = SortState::by(Field::LegalName, SortDirection::Descending);
        let rows = reduce(&window, &FilterState::new(), &descending);
        assert_eq!(
            tags(&rows),
            vec!["first-beta", "second-beta", "first-alpha", "second-alpha"]
        );
    }

    #[test]
    fn filter_and_sort_commute_when_sort_key_is_unfiltered() {
        let window = vec![
            named("delta", "keep"),
            named("alpha", "drop"),
            named("charlie", "keep"),
            named("bravo", "keep"),
        ];
        let filters = FilterState::new().with(Field::DbaName, "keep");
        let sort = SortState::by(Field::LegalName, SortDirection::Ascending);

        let filter_then_sort = reduce(&window, &filters, &sort);

        let sorted = reduce(&window, &FilterState::new(), &sort)
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();
        let sort_then_filter = reduce(&sorted, &filters, &SortState::none());

        assert_eq!(names(&filter_then_sort), names(&sort_then_filter));
        assert_eq!(names(&filter_then_sort), vec!["bravo", "charlie", "delta"]);
    }

    #[test]
    fn reducing_leaves_the_window_untouched() {
        let window = vec![named("b", ""), named("a", "")];
        let before = window.clone();
        let _ = reduce(
            &window,
            &FilterState::new().with(Field::LegalName, "a"),
            &SortState::by(Field::LegalName, SortDirection::Ascending),
        );
        assert_eq!(window, before);
    }

    #[test]
    fn locale_compare_ignores_case_before_breaking_ties() {
        assert_eq!(locale_compare("apple", "Banana"), Ordering::Less);
        assert_eq!(locale_compare("Zed", "alpha"), Ordering::Greater);
        assert_eq!(locale_compare("a", "A"), Ordering::Less);
        assert_eq!(locale_compare("same", "same"), Ordering::Equal);
        assert_eq!(locale_compare("", "a"), Ordering::Less);
    }

    #[test]
    fn accented_letters_sort_with_their_base_letter() {
        assert_eq!(locale_compare("École", "Fast"), Ordering::Less);
        assert_eq!(locale_compare("ecole", "École"), Ordering::Less);
        assert_eq!(locale_compare("cote", "côte"), Ordering::Less);
        assert_eq!(locale_compare("Zoo", "Zürich"), Ordering::Less);
        assert_eq!(locale_compare("Zürich", "Zz"), Ordering::Less);

        let window = vec![
            named("Zebra", ""),
            named("Ábaco", ""),
            named("Némo", ""),
            named("apple", ""),
        ];
        let sort = SortState::by(Field::LegalName, SortDirection::Ascending);
        let rows = reduce(&window, &FilterState::new(), &sort);
        assert_eq!(names(&rows), vec!["Ábaco", "apple", "Némo", "Zebra"]);
    }

    #[test]
    fn punctuation_sorts_before_digits_and_letters() {
        assert_eq!(locale_compare("~tilde", "alpha"), Ordering::Less);
        assert_eq!(locale_compare("#1", "1"), Ordering::Less);
        assert_eq!(locale_compare("9", "a"), Ordering::Less);
        assert_eq!(locale_compare("a b", "ab"), Ordering::Less);
    }
}
