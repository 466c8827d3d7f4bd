use super::merge::{merge, Source};
use crate::issue::Issue;
use crate::tracker;

/// Result of a query change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    None,
    /// (Re)start the debounce timer for this generation
    Debounce(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub generation: u64,
    pub query: String,
}

#[derive(Debug)]
pub enum Resolution {
    Applied,
    /// Previous results stay visible
    Failed(tracker::Error),
    /// Superseded by a newer query or arrived after close
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SearchResults {
    query: String,
    issues: Vec<Issue>,
}

/// State of one open picker.
///
/// Every query change bumps `generation`. Search responses carry the generation they were
/// dispatched with and are only applied while it is still current.
#[derive(Debug, Clone)]
pub struct SearchSession {
    query: String,
    generation: u64,
    /// `None` while the default list is loading
    defaults: Option<Vec<Issue>>,
    search: Option<SearchResults>,
    /// Generation of the search currently in flight
    searching: Option<u64>,
    threshold: usize,
    closed: bool,
}

impl SearchSession {
    pub fn new(threshold: usize) -> Self {
        Self {
            query: String::new(),
            generation: 0,
            defaults: None,
            search: None,
            searching: None,
            threshold,
            closed: false,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        self.defaults.is_none() && !self.closed
    }

    pub fn is_searching(&self) -> bool {
        self.searching == Some(self.generation) && !self.closed
    }

    pub fn set_query(&mut self, query: &str) -> Trigger {
        if self.closed || query == self.query {
            return Trigger::None;
        }
        self.query = query.to_owned();
        self.generation += 1;
        if query.trim().is_empty() {
            self.search = None;
            return Trigger::None;
        }
        if self.search.as_ref().map_or(false, |s| s.query == self.query) {
            return Trigger::None;
        }
        if self.issues().len() >= self.threshold {
            return Trigger::None;
        }
        Trigger::Debounce(self.generation)
    }

    /// Debounce timer expired. Yields the search to dispatch unless the timer was
    /// superseded in the meantime.
    pub fn debounce_fired(&mut self, generation: u64) -> Option<SearchRequest> {
        if self.closed || generation != self.generation {
            return None;
        }
        self.searching = Some(generation);
        Some(SearchRequest {
            generation,
            query: self.query.clone(),
        })
    }

    pub fn search_resolved(
        &mut self,
        generation: u64,
        query: String,
        result: Result<Vec<Issue>, tracker::Error>,
    ) -> Resolution {
        if self.closed || generation != self.generation {
            return Resolution::Stale;
        }
        self.searching = None;
        match result {
            Ok(issues) => {
                self.search = Some(SearchResults { query, issues });
                Resolution::Applied
            }
            Err(e) => Resolution::Failed(e),
        }
    }

    /// On failure the default list is treated as empty and the error handed back.
    pub fn defaults_loaded(
        &mut self,
        result: Result<Vec<Issue>, tracker::Error>,
    ) -> Result<(), tracker::Error> {
        if self.closed {
            return Ok(());
        }
        match result {
            Ok(issues) => {
                self.defaults = Some(issues);
                Ok(())
            }
            Err(e) => {
                self.defaults = Some(Vec::new());
                Err(e)
            }
        }
    }

    /// Issues to display for the current query.
    ///
    /// Search results fetched for exactly this query are shown as they are, everything else
    /// is filtered locally.
    pub fn issues(&self) -> Vec<Issue> {
        let (search, fresh) = match &self.search {
            Some(s) => (s.issues.as_slice(), s.query == self.query),
            None => (&[][..], false),
        };
        let defaults = self.defaults.as_deref().unwrap_or(&[]);
        merge(search, defaults)
            .into_iter()
            .filter(|(src, i)| (*src == Source::Search && fresh) || i.matches(&self.query))
            .map(|(_, i)| i.clone())
            .collect()
    }

    /// Returns `true` on the first call only
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.generation += 1;
        self.searching = None;
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tests::{failure, issues};
    use assert_matches::assert_matches;

    fn loaded(defaults: Vec<Issue>) -> SearchSession {
        let mut s = SearchSession::new(5);
        s.defaults_loaded(Ok(defaults)).unwrap();
        s
    }

    /// Runs a full query -> debounce -> resolve cycle
    fn searched(s: &mut SearchSession, query: &str, result: Vec<Issue>) {
        let gen = match s.set_query(query) {
            Trigger::Debounce(g) => g,
            t => panic!("expected debounce, got {:?}", t),
        };
        let req = s.debounce_fired(gen).unwrap();
        assert_matches!(
            s.search_resolved(req.generation, req.query, Ok(result)),
            Resolution::Applied
        );
    }

    fn ids(s: &SearchSession) -> Vec<String> {
        s.issues().into_iter().map(|i| i.identifier.to_string()).collect()
    }

    #[test]
    fn loading_until_defaults_arrive() {
        let mut s = SearchSession::new(5);
        assert!(s.is_loading());
        s.defaults_loaded(Ok(issues(&[("A-1", "one")]))).unwrap();
        assert!(!s.is_loading());
        assert_eq!(ids(&s), vec!["A-1"]);
    }

    #[test]
    fn failed_defaults_leave_empty_list() {
        let mut s = SearchSession::new(5);
        assert!(s.defaults_loaded(Err(failure())).is_err());
        assert!(!s.is_loading());
        assert!(s.issues().is_empty());
    }

    #[test]
    fn local_filter_without_search() {
        let mut s = loaded(issues(&[("A-1", "login page"), ("A-2", "signup")]));
        // one local match is below threshold -> search scheduled
        assert_matches!(s.set_query("login"), Trigger::Debounce(_));
        assert_eq!(ids(&s), vec!["A-1"]);
    }

    #[test]
    fn enough_local_matches_skip_search() {
        let many: Vec<(String, String)> = (1..=6)
            .map(|n| (format!("A-{}", n), format!("task {}", n)))
            .collect();
        let many: Vec<(&str, &str)> = many.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let mut s = loaded(issues(&many));
        assert_eq!(s.set_query("task"), Trigger::None);
        assert_eq!(s.issues().len(), 6);
    }

    #[test]
    fn identical_query_is_noop() {
        let mut s = loaded(vec![]);
        let t = s.set_query("abc");
        let gen = s.generation();
        assert_matches!(t, Trigger::Debounce(g) if g == gen);
        assert_eq!(s.set_query("abc"), Trigger::None);
        assert_eq!(s.generation(), gen);
    }

    #[test]
    fn superseded_debounce_yields_nothing() {
        let mut s = loaded(vec![]);
        let first = s.set_query("a");
        let second = s.set_query("ab");
        assert_eq!(first, Trigger::Debounce(1));
        assert_eq!(second, Trigger::Debounce(2));
        assert_eq!(s.debounce_fired(1), None);
        assert!(!s.is_searching());
        assert_eq!(
            s.debounce_fired(2),
            Some(SearchRequest {
                generation: 2,
                query: "ab".into()
            })
        );
        assert!(s.is_searching());
    }

    #[test]
    fn stale_response_discarded() {
        let mut s = loaded(vec![]);
        let gx = match s.set_query("x") {
            Trigger::Debounce(g) => g,
            _ => unreachable!(),
        };
        let rx = s.debounce_fired(gx).unwrap();
        s.set_query("y");
        assert!(!s.is_searching());
        assert_matches!(
            s.search_resolved(rx.generation, rx.query, Ok(issues(&[("X-1", "x")]))),
            Resolution::Stale
        );
        assert!(s.issues().is_empty());
    }

    #[test]
    fn search_result_overrides_default() {
        let mut s = loaded(issues(&[("A-1", "old"), ("A-2", "other")]));
        searched(&mut s, "A-1", issues(&[("A-1", "new")]));
        let shown = s.issues();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "new");
    }

    #[test]
    fn fresh_search_results_are_not_filtered() {
        let mut s = loaded(issues(&[("A-2", "unrelated")]));
        searched(&mut s, "crash", issues(&[("B-9", "Segfault on boot")]));
        assert_eq!(ids(&s), vec!["B-9"]);
        // older results get filtered once the query moves on
        s.set_query("crash boot");
        assert!(s.issues().is_empty());
    }

    #[test]
    fn empty_query_reverts_to_defaults() {
        let mut s = loaded(issues(&[("A-1", "one"), ("A-2", "two")]));
        searched(&mut s, "zzz", issues(&[("Z-1", "zzz")]));
        assert_eq!(ids(&s), vec!["Z-1"]);
        assert_eq!(s.set_query(""), Trigger::None);
        assert_eq!(ids(&s), vec!["A-1", "A-2"]);
        // re-typing the same query has to search again
        assert_matches!(s.set_query("zzz"), Trigger::Debounce(_));
    }

    #[test]
    fn returning_to_searched_query_reuses_results() {
        let mut s = loaded(vec![]);
        searched(&mut s, "ab", issues(&[("A-1", "ab")]));
        assert_matches!(s.set_query("abx"), Trigger::Debounce(_));
        assert_eq!(s.set_query("ab"), Trigger::None);
        assert_eq!(ids(&s), vec!["A-1"]);
    }

    #[test]
    fn failed_search_keeps_previous_results() {
        let mut s = loaded(vec![]);
        searched(&mut s, "ab", issues(&[("A-1", "ab one")]));
        let g = match s.set_query("ab o") {
            Trigger::Debounce(g) => g,
            _ => unreachable!(),
        };
        let req = s.debounce_fired(g).unwrap();
        assert!(s.is_searching());
        assert_matches!(
            s.search_resolved(req.generation, req.query, Err(failure())),
            Resolution::Failed(_)
        );
        assert!(!s.is_searching());
        assert_eq!(ids(&s), vec!["A-1"]);
    }

    #[test]
    fn close_is_idempotent_and_final() {
        let mut s = loaded(vec![]);
        let g = match s.set_query("q") {
            Trigger::Debounce(g) => g,
            _ => unreachable!(),
        };
        let req = s.debounce_fired(g).unwrap();
        assert!(s.close());
        assert!(!s.close());
        assert_matches!(
            s.search_resolved(req.generation, req.query, Ok(issues(&[("Q-1", "q")]))),
            Resolution::Stale
        );
        assert_eq!(s.set_query("other"), Trigger::None);
        assert!(s.issues().is_empty());
    }
}
