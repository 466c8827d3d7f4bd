use super::PickerItem;
use crate::issue::Issue;

use std::collections::HashSet;

/// Where a merged issue came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Search,
    Default,
}

/// Search results first (in returned order), then defaults not already present.
/// Dedup key is the identifier; first occurrence wins.
pub fn merge<'a>(search: &'a [Issue], defaults: &'a [Issue]) -> Vec<(Source, &'a Issue)> {
    let mut seen = HashSet::new();
    search
        .iter()
        .map(|i| (Source::Search, i))
        .chain(defaults.iter().map(|i| (Source::Default, i)))
        .filter(|(_, i)| seen.insert(i.identifier.clone()))
        .collect()
}

/// Pinned actions, separator, issues. The busy placeholder trails the issues while the
/// default list is still loading.
pub fn layout<A>(actions: A, issues: Vec<Issue>, loading: bool) -> Vec<PickerItem>
where
    A: IntoIterator<Item = PickerItem>,
{
    let mut items: Vec<PickerItem> = actions.into_iter().collect();
    if !items.is_empty() {
        items.push(PickerItem::Separator);
    }
    items.extend(issues.into_iter().map(PickerItem::Issue));
    if loading {
        items.push(PickerItem::Busy);
    }
    items
}

#[cfg(test)]
mod test {
    use super::*;

    fn ids(merged: &[(Source, &Issue)]) -> Vec<(Source, String)> {
        merged
            .iter()
            .map(|(s, i)| (*s, format!("{}", i)))
            .collect()
    }

    #[test]
    fn search_wins_over_default() {
        let defaults = vec![Issue::new("A-1", "old"), Issue::new("A-2", "two")];
        let search = vec![Issue::new("A-3", "three"), Issue::new("A-1", "new")];
        assert_eq!(
            ids(&merge(&search, &defaults)),
            vec![
                (Source::Search, "A-3: three".to_owned()),
                (Source::Search, "A-1: new".to_owned()),
                (Source::Default, "A-2: two".to_owned()),
            ]
        );
    }

    #[test]
    fn duplicates_within_one_list() {
        let search = vec![Issue::new("A-1", "first"), Issue::new("A-1", "second")];
        let merged = merge(&search, &[]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].1.title, "first");
    }

    #[test]
    fn layout_order() {
        let actions = vec![
            PickerItem::Action {
                id: "one",
                label: "One".into(),
            },
            PickerItem::Action {
                id: "two",
                label: "Two".into(),
            },
        ];
        let items = layout(actions, vec![Issue::new("A-1", "x")], true);
        assert_eq!(
            items,
            vec![
                PickerItem::Action {
                    id: "one",
                    label: "One".into()
                },
                PickerItem::Action {
                    id: "two",
                    label: "Two".into()
                },
                PickerItem::Separator,
                PickerItem::Issue(Issue::new("A-1", "x")),
                PickerItem::Busy,
            ]
        );
    }

    #[test]
    fn no_separator_without_actions() {
        assert_eq!(layout(vec![], vec![], false), vec![]);
    }
}
