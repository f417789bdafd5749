//! Autocomplete box state.
//!
//! At most one completion query is outstanding. Keystrokes typed while a
//! query is in flight only update the remembered text; when the response
//! arrives the box asks for a follow-up query if the text moved on.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::link::source_url;
use crate::observer::{ClientObserver, NoopObserver};
use crate::service::{CompleteRequest, CompleteResponse, HitKind};

/// Default number of choices requested per query.
pub const DEFAULT_COMPLETE_LIMIT: usize = 8;

/// One row of the drop-down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub index: usize,
    pub kind: HitKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub url: String,
    pub use_count_text: String,
}

/// Where submitting the box leads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "navigation", content = "url", rename_all = "lowercase")]
pub enum Navigation {
    /// The selected choice's source URL.
    Choice(String),
    /// The full search page for the typed text.
    Search(String),
}

/// `"1 use"`, `"N uses"`, or empty for zero.
pub fn use_count_text(count: u32) -> String {
    match count {
        0 => String::new(),
        1 => "1 use".to_string(),
        n => format!("{} uses", n),
    }
}

pub struct CompletionBox {
    query: String,
    in_flight: Option<String>,
    choices: Vec<Choice>,
    selected: isize,
    visible: bool,
    limit: usize,
    observer: Arc<dyn ClientObserver>,
}

impl Default for CompletionBox {
    fn default() -> Self {
        Self::new(DEFAULT_COMPLETE_LIMIT)
    }
}

impl std::fmt::Debug for CompletionBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionBox")
            .field("query", &self.query)
            .field("in_flight", &self.in_flight)
            .field("choices", &self.choices.len())
            .field("selected", &self.selected)
            .field("visible", &self.visible)
            .finish()
    }
}

impl CompletionBox {
    pub fn new(limit: usize) -> Self {
        CompletionBox {
            query: String::new(),
            in_flight: None,
            choices: Vec::new(),
            selected: -1,
            visible: true,
            limit,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ClientObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    /// Selected row; `None` when nothing is selected.
    pub fn selected(&self) -> Option<usize> {
        usize::try_from(self.selected).ok()
    }

    pub fn selected_choice(&self) -> Option<&Choice> {
        self.selected().and_then(|i| self.choices.get(i))
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// The text changed. Returns the query to send, if one may be sent now.
    pub fn update(&mut self, query: impl Into<String>) -> Option<CompleteRequest> {
        self.query = query.into();
        if self.in_flight.is_some() {
            debug!(query = %self.query, "completion query held back");
            self.observer.query_dropped(&self.query);
            return None;
        }
        self.request()
    }

    /// Install the response to the outstanding query.
    ///
    /// Returns a follow-up request when the text changed while the query was
    /// in flight.
    pub fn apply(&mut self, response: CompleteResponse) -> Option<CompleteRequest> {
        self.choices = response
            .hits
            .into_iter()
            .enumerate()
            .map(|(index, hit)| Choice {
                index,
                kind: hit.kind,
                url: source_url(&hit.jump_target),
                use_count_text: match hit.kind {
                    HitKind::Type => use_count_text(hit.use_count),
                    _ => String::new(),
                },
                name: hit.name,
                summary: hit.summary,
            })
            .collect();
        if self.selected >= self.choices.len() as isize {
            self.selected = 0;
        }
        self.recheck()
    }

    /// The outstanding query failed. Choices are left as they were.
    pub fn abort(&mut self) -> Option<CompleteRequest> {
        self.recheck()
    }

    /// Move the selection up; it may leave the list (index -1).
    pub fn move_up(&mut self) {
        if self.selected >= 0 {
            self.selected -= 1;
        }
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.choices.len() as isize {
            self.selected += 1;
        }
    }

    pub fn blur(&mut self) {
        self.visible = false;
    }

    pub fn focus(&mut self) {
        self.visible = true;
    }

    /// Enter pressed: open the selected choice if the list is showing,
    /// otherwise search for the typed text.
    pub fn submit(&self) -> Navigation {
        match self.selected_choice() {
            Some(choice) if self.visible => Navigation::Choice(choice.url.clone()),
            _ => Navigation::Search(format!("search?query={}", self.query)),
        }
    }

    fn request(&mut self) -> Option<CompleteRequest> {
        if self.query.is_empty() {
            return None;
        }
        self.in_flight = Some(self.query.clone());
        Some(CompleteRequest {
            query: self.query.clone(),
            limit: self.limit,
        })
    }

    fn recheck(&mut self) -> Option<CompleteRequest> {
        let sent = self.in_flight.take();
        if sent.as_deref() == Some(self.query.as_str()) {
            return None;
        }
        self.request()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::RequestCounters;
    use crate::service::CompletionHit;
    use crate::types::{FileHandle, FileId, FileKind, JumpTarget};

    fn hit(kind: HitKind, name: &str, uses: u32) -> CompletionHit {
        CompletionHit {
            kind,
            name: name.to_string(),
            summary: None,
            jump_target: JumpTarget::new(
                FileHandle::new("p", format!("/{}.java", name), FileId(1), FileKind::NormalFile),
                None,
            ),
            use_count: uses,
        }
    }

    fn hits(n: usize) -> CompleteResponse {
        CompleteResponse {
            hits: (0..n).map(|i| hit(HitKind::Type, &format!("T{}", i), 1)).collect(),
        }
    }

    mod query_tests {
        use super::*;

        #[test]
        fn one_query_outstanding() {
            let counters = Arc::new(RequestCounters::new());
            let mut b = CompletionBox::default().with_observer(counters.clone());

            let first = b.update("F").unwrap();
            assert_eq!(first.query, "F");
            assert_eq!(first.limit, DEFAULT_COMPLETE_LIMIT);
            assert!(b.update("Fo").is_none());
            assert!(b.update("Foo").is_none());
            assert_eq!(counters.snapshot().dropped_queries, 2);

            let recheck = b.apply(hits(2)).unwrap();
            assert_eq!(recheck.query, "Foo");
            assert!(b.is_loading());
            assert!(b.apply(hits(1)).is_none());
            assert!(!b.is_loading());
        }

        #[test]
        fn empty_query_is_not_sent() {
            let mut b = CompletionBox::default();
            assert!(b.update("").is_none());
            assert!(!b.is_loading());

            b.update("x").unwrap();
            b.update("");
            assert!(b.apply(hits(0)).is_none());
        }

        #[test]
        fn failure_releases_the_box() {
            let mut b = CompletionBox::default();
            b.update("a").unwrap();
            assert!(b.abort().is_none());
            assert!(b.update("ab").is_some());
        }
    }

    mod choice_tests {
        use super::*;

        #[test]
        fn use_count_text_forms() {
            assert_eq!(use_count_text(0), "");
            assert_eq!(use_count_text(1), "1 use");
            assert_eq!(use_count_text(5), "5 uses");
        }

        #[test]
        fn choices_carry_url_and_count() {
            let mut b = CompletionBox::default();
            b.update("L");
            b.apply(CompleteResponse {
                hits: vec![hit(HitKind::Type, "List", 3), hit(HitKind::Method, "length", 9)],
            });
            let c = b.choices();
            assert_eq!(c[0].url, "p/List.java");
            assert_eq!(c[0].use_count_text, "3 uses");
            assert_eq!(c[1].index, 1);
            assert_eq!(c[1].use_count_text, "");
        }
    }

    mod selection_tests {
        use super::*;

        #[test]
        fn move_within_bounds() {
            let mut b = CompletionBox::default();
            b.update("T");
            b.apply(hits(2));
            assert_eq!(b.selected(), None);
            b.move_down();
            b.move_down();
            b.move_down();
            assert_eq!(b.selected(), Some(1));
            b.move_up();
            b.move_up();
            assert_eq!(b.selected(), None);
            b.move_up();
            assert_eq!(b.selected(), None);
        }

        #[test]
        fn selection_past_new_choices_resets() {
            let mut b = CompletionBox::default();
            b.update("T");
            b.apply(hits(3));
            b.move_down();
            b.move_down();
            b.move_down();
            assert_eq!(b.selected(), Some(2));
            b.update("T1");
            b.apply(hits(1));
            assert_eq!(b.selected(), Some(0));
        }

        #[test]
        fn submit_opens_choice_or_searches() {
            let mut b = CompletionBox::default();
            b.update("T");
            b.apply(hits(2));
            assert_eq!(b.submit(), Navigation::Search("search?query=T".to_string()));

            b.move_down();
            assert_eq!(b.submit(), Navigation::Choice("p/T0.java".to_string()));

            b.blur();
            assert_eq!(b.submit(), Navigation::Search("search?query=T".to_string()));
            b.focus();
            assert!(matches!(b.submit(), Navigation::Choice(_)));
        }
    }
}
