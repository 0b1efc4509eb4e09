use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::fetch_runner::{FetchCompletion, FetchFailure, FetchRequest};
use crate::fields::Field;
use crate::loaded_window::LoadedWindow;
use crate::query_planner::{fetch_required, plan_fetch};
use crate::row::Row;
use crate::view_reducer::reduce;
use crate::view_state::{
    FilterState, PageState, PageStateError, SortDirection, SortState, ViewState, DEFAULT_PAGE_SIZE,
};

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load data. Please try again later.";
pub const DEFAULT_NOMINAL_ROW_COUNT: u64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// What to do with a response whose request is no longer the latest issued.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StaleResponsePolicy {
    #[default]
    Discard,
    Apply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub page_size: usize,
    pub nominal_row_count: u64,
    pub stale_responses: StaleResponsePolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            nominal_row_count: DEFAULT_NOMINAL_ROW_COUNT,
            stale_responses: StaleResponsePolicy::Discard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    Applied { rows: usize },
    Failed,
    DiscardedStale { sequence: u64, latest: u64 },
}

#[derive(Debug)]
pub struct DataEngine {
    state: ViewState,
    window: LoadedWindow,
    phase: EnginePhase,
    failure: Option<FetchFailure>,
    nominal_row_count: u64,
    stale_responses: StaleResponsePolicy,
    last_issued: u64,
}

impl DataEngine {
    pub fn new(settings: EngineSettings) -> Result<Self, PageStateError> {
        Ok(Self {
            state: ViewState {
                page: PageState::new(0, settings.page_size)?,
                ..ViewState::default()
            },
            window: LoadedWindow::empty(),
            phase: EnginePhase::Idle,
            failure: None,
            nominal_row_count: settings.nominal_row_count,
            stale_responses: settings.stale_responses,
            last_issued: 0,
        })
    }

    pub fn mount(&mut self) -> FetchRequest {
        self.issue()
    }

    /// Re-attempts the current page. Used for an explicit user retry; the
    /// engine never retries by itself.
    pub fn reload(&mut self) -> FetchRequest {
        self.issue()
    }

    pub fn set_filter(&mut self, field: Field, pattern: impl Into<String>) -> Option<FetchRequest> {
        let mut next = self.state.clone();
        if !next.filters.set(field, pattern) {
            return None;
        }
        next.page = next.page.first();
        self.transition(next)
    }

    pub fn clear_filter(&mut self, field: Field) -> Option<FetchRequest> {
        self.set_filter(field, String::new())
    }

    pub fn clear_filters(&mut self) -> Option<FetchRequest> {
        let mut next = self.state.clone();
        if !next.filters.clear() {
            return None;
        }
        next.page = next.page.first();
        self.transition(next)
    }

    pub fn set_sort(&mut self, field: Field, direction: SortDirection) -> Option<FetchRequest> {
        self.apply_sort(SortState::by(field, direction))
    }

    pub fn toggle_sort(&mut self, field: Field) -> Option<FetchRequest> {
        self.apply_sort(self.state.sort.toggled(field))
    }

    pub fn clear_sort(&mut self) -> Option<FetchRequest> {
        self.apply_sort(SortState::none())
    }

    pub fn set_page(&mut self, index: usize) -> Option<FetchRequest> {
        let next = ViewState {
            page: self.state.page.with_index(index),
            ..self.state.clone()
        };
        self.transition(next)
    }

    pub fn set_page_size(&mut self, size: usize) -> Result<Option<FetchRequest>, PageStateError> {
        let next = ViewState {
            page: PageState::new(0, size)?,
            ..self.state.clone()
        };
        Ok(self.transition(next))
    }

    pub fn complete(&mut self, completion: FetchCompletion) -> CompletionOutcome {
        let FetchCompletion {
            request, result, ..
        } = completion;

        let is_latest = request.sequence == self.last_issued;
        if !is_latest && self.stale_responses == StaleResponsePolicy::Discard {
            debug!(
                sequence = request.sequence,
                latest = self.last_issued,
                "discarding stale fetch result"
            );
            return CompletionOutcome::DiscardedStale {
                sequence: request.sequence,
                latest: self.last_issued,
            };
        }

        match result {
            Ok(rows) => {
                let count = rows.len();
                self.window = LoadedWindow::new(rows, request.descriptor.offset, request.sequence);
                self.phase = EnginePhase::Loaded;
                self.failure = None;
                info!(
                    sequence = request.sequence,
                    page = request.page.index(),
                    rows = count,
                    "loaded window"
                );
                CompletionOutcome::Applied { rows: count }
            }
            Err(failure) => {
                warn!(
                    sequence = request.sequence,
                    page = request.page.index(),
                    error = %failure,
                    "keeping previous window after failed fetch"
                );
                self.phase = EnginePhase::Failed;
                self.failure = Some(failure);
                CompletionOutcome::Failed
            }
        }
    }

    #[must_use]
    pub fn rows(&self) -> Vec<&Row> {
        reduce(self.window.rows(), &self.state.filters, &self.state.sort)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.phase == EnginePhase::Loading
    }

    #[must_use]
    pub fn error(&self) -> Option<&'static str> {
        self.failure.as_ref().map(|_| LOAD_FAILED_MESSAGE)
    }

    #[must_use]
    pub fn failure(&self) -> Option<&FetchFailure> {
        self.failure.as_ref()
    }

    #[must_use]
    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    #[must_use]
    pub fn filters(&self) -> &FilterState {
        &self.state.filters
    }

    #[must_use]
    pub fn sort(&self) -> SortState {
        self.state.sort
    }

    #[must_use]
    pub fn page(&self) -> PageState {
        self.state.page
    }

    #[must_use]
    pub fn view_state(&self) -> &ViewState {
        &self.state
    }

    #[must_use]
    pub fn window(&self) -> &LoadedWindow {
        &self.window
    }

    #[must_use]
    pub fn nominal_row_count(&self) -> u64 {
        self.nominal_row_count
    }

    #[must_use]
    pub fn last_issued_sequence(&self) -> u64 {
        self.last_issued
    }

    fn apply_sort(&mut self, sort: SortState) -> Option<FetchRequest> {
        if sort == self.state.sort {
            return None;
        }
        let next = ViewState {
            sort,
            page: self.state.page.first(),
            ..self.state.clone()
        };
        self.transition(next)
    }

    fn transition(&mut self, next: ViewState) -> Option<FetchRequest> {
        let required = fetch_required(&self.state, &next);
        self.state = next;
        required.then(|| self.issue())
    }

    fn issue(&mut self) -> FetchRequest {
        self.last_issued += 1;
        self.phase = EnginePhase::Loading;
        self.failure = None;
        let request = FetchRequest {
            sequence: self.last_issued,
            page: self.state.page,
            descriptor: plan_fetch(&self.state),
        };
        debug!(
            sequence = request.sequence,
            offset = request.descriptor.offset,
            limit = request.descriptor.limit,
            "issuing fetch"
        );
        request
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{
        CompletionOutcome, DataEngine, EnginePhase, EngineSettings, StaleResponsePolicy,
        LOAD_FAILED_MESSAGE,
    };
    use crate::decoder::DecodeError;
    use crate::fetch_runner::tests::{envelope_with_names, FakeSheetSource};
    use crate::fetch_runner::{FetchCompletion, FetchFailure, FetchRequest, FetchRunner, SourceError};
    use crate::fields::Field;
    use crate::query_planner::FetchDescriptor;
    use crate::row::Row;
    use crate::view_state::{FilterState, PageStateError, SortDirection, SortState};

    fn engine() -> DataEngine {
        DataEngine::new(EngineSettings::default()).expect("default settings are valid")
    }

    fn rows(names: &[&str]) -> Vec<Row> {
        names
            .iter()
            .map(|name| Row::new().with(Field::LegalName, *name))
            .collect()
    }

    fn settle(request: FetchRequest, names: &[&str]) -> FetchCompletion {
        FetchCompletion {
            request,
            result: Ok(rows(names)),
            elapsed: Duration::ZERO,
        }
    }

    fn fail(request: FetchRequest, failure: FetchFailure) -> FetchCompletion {
        FetchCompletion {
            request,
            result: Err(failure),
            elapsed: Duration::ZERO,
        }
    }

    fn displayed(engine: &DataEngine) -> Vec<String> {
        engine
            .rows()
            .into_iter()
            .map(|row| row.get(Field::LegalName).to_string())
            .collect()
    }

    #[test]
    fn starts_idle_and_mount_requests_first_page() {
        let mut engine = engine();
        assert_eq!(engine.phase(), EnginePhase::Idle);
        assert!(!engine.is_loading());

        let request = engine.mount();
        assert_eq!(engine.phase(), EnginePhase::Loading);
        assert!(engine.is_loading());
        assert_eq!(
            request.descriptor,
            FetchDescriptor {
                offset: 0,
                limit: 10
            }
        );
        assert_eq!(request.sequence, 1);
    }

    #[test]
    fn successful_completion_loads_window() {
        let mut engine = engine();
        let request = engine.mount();

        let outcome = engine.complete(settle(request, &["ACME LLC", "Beta Co"]));

        assert_eq!(outcome, CompletionOutcome::Applied { rows: 2 });
        assert_eq!(engine.phase(), EnginePhase::Loaded);
        assert_eq!(engine.error(), None);
        assert_eq!(displayed(&engine), vec!["ACME LLC", "Beta Co"]);
    }

    #[test]
    fn set_page_requests_scaled_offset_and_keeps_view_intents() {
        let mut engine = engine();
        let first = engine.mount();
        engine.complete(settle(first, &["a"]));
        assert_eq!(engine.set_filter(Field::LegalName, "acme"), None);
        assert_eq!(
            engine.set_sort(Field::LegalName, SortDirection::Descending),
            None
        );

        let request = engine.set_page(2).expect("page change must fetch");

        assert_eq!(
            request.descriptor,
            FetchDescriptor {
                offset: 20,
                limit: 10
            }
        );
        assert_eq!(engine.filters(), &FilterState::new().with(Field::LegalName, "acme"));
        assert_eq!(
            engine.sort(),
            SortState::by(Field::LegalName, SortDirection::Descending)
        );
        assert_eq!(engine.page().index(), 2);
    }

    #[test]
    fn filter_and_sort_changes_never_fetch_or_change_phase() {
        let mut engine = engine();
        let request = engine.mount();
        engine.complete(settle(request, &["ACME LLC", "Beta Co"]));
        let issued = engine.last_issued_sequence();

        assert_eq!(engine.set_filter(Field::LegalName, "acme"), None);
        assert_eq!(engine.phase(), EnginePhase::Loaded);
        assert_eq!(displayed(&engine), vec!["ACME LLC"]);

        assert_eq!(engine.clear_filters(), None);
        assert_eq!(engine.toggle_sort(Field::LegalName), None);
        assert_eq!(engine.toggle_sort(Field::LegalName), None);
        assert_eq!(displayed(&engine), vec!["Beta Co", "ACME LLC"]);
        assert_eq!(engine.clear_sort(), None);
        assert_eq!(displayed(&engine), vec!["ACME LLC", "Beta Co"]);

        assert_eq!(engine.phase(), EnginePhase::Loaded);
        assert_eq!(engine.last_issued_sequence(), issued);
    }

    #[test]
    fn filter_change_on_later_page_returns_to_first_page() {
        let mut engine = engine();
        let first = engine.mount();
        engine.complete(settle(first, &["a"]));
        let third = engine.set_page(3).expect("page change must fetch");
        engine.complete(settle(third, &["b"]));

        let request = engine
            .set_filter(Field::LegalName, "b")
            .expect("page reset changes the window");

        assert_eq!(engine.page().index(), 0);
        assert_eq!(request.descriptor.offset, 0);
    }

    #[test]
    fn page_and_page_size_changes_issue_exactly_one_fetch() {
        let mut engine = engine();
        let first = engine.mount();

        assert!(engine.set_page(1).is_some());
        assert_eq!(engine.last_issued_sequence(), first.sequence + 1);
        assert!(engine.set_page(1).is_none());

        let request = engine
            .set_page_size(25)
            .expect("valid size")
            .expect("size change must fetch");
        assert_eq!(engine.last_issued_sequence(), first.sequence + 2);
        assert_eq!(
            request.descriptor,
            FetchDescriptor {
                offset: 0,
                limit: 25
            }
        );
        assert_eq!(engine.set_page_size(0), Err(PageStateError::ZeroPageSize));
    }

    #[test]
    fn decode_failure_keeps_previous_window() {
        let mut engine = engine();
        let first = engine.mount();
        engine.complete(settle(first, &["ACME LLC"]));
        let request = engine.set_page(1).expect("page change must fetch");

        let outcome = engine.complete(fail(
            request,
            FetchFailure::Decode(DecodeError::EnvelopeMismatch {
                detail: "response does not start with the expected prefix".to_string(),
            }),
        ));

        assert_eq!(outcome, CompletionOutcome::Failed);
        assert_eq!(engine.phase(), EnginePhase::Failed);
        assert_eq!(engine.error(), Some(LOAD_FAILED_MESSAGE));
        assert!(matches!(engine.failure(), Some(FetchFailure::Decode(_))));
        assert_eq!(displayed(&engine), vec!["ACME LLC"]);
        assert_eq!(engine.window().sequence(), Some(first.sequence));
    }

    #[test]
    fn failure_before_any_data_leaves_window_empty() {
        let mut engine = engine();
        let request = engine.mount();

        engine.complete(fail(
            request,
            FetchFailure::Network(SourceError::transport("connection refused")),
        ));

        assert_eq!(engine.phase(), EnginePhase::Failed);
        assert!(engine.rows().is_empty());
        assert!(matches!(engine.failure(), Some(FetchFailure::Network(_))));
    }

    #[test]
    fn next_trigger_after_failure_starts_loading_and_clears_error() {
        let mut engine = engine();
        let request = engine.mount();
        engine.complete(fail(
            request,
            FetchFailure::Network(SourceError::Status { status: 500 }),
        ));

        let retry = engine.reload();

        assert_eq!(engine.phase(), EnginePhase::Loading);
        assert_eq!(engine.error(), None);
        assert_eq!(retry.descriptor, request.descriptor);
        engine.complete(settle(retry, &["ok"]));
        assert_eq!(engine.phase(), EnginePhase::Loaded);
    }

    #[test]
    fn stale_results_are_discarded_by_default() {
        let mut engine = engine();
        let first = engine.mount();
        let second = engine.set_page(1).expect("page change must fetch");

        engine.complete(settle(second, &["page two"]));
        let outcome = engine.complete(settle(first, &["page one"]));

        assert_eq!(
            outcome,
            CompletionOutcome::DiscardedStale {
                sequence: first.sequence,
                latest: second.sequence
            }
        );
        assert_eq!(displayed(&engine), vec!["page two"]);
        assert_eq!(engine.phase(), EnginePhase::Loaded);
    }

    #[test]
    fn stale_discard_keeps_loading_until_latest_settles() {
        let mut engine = engine();
        let first = engine.mount();
        let second = engine.set_page(1).expect("page change must fetch");

        engine.complete(settle(first, &["page one"]));
        assert!(engine.is_loading());
        assert!(engine.rows().is_empty());

        engine.complete(settle(second, &["page two"]));
        assert!(!engine.is_loading());
    }

    #[test]
    fn apply_policy_accepts_whichever_response_settles_last() {
        let mut engine = DataEngine::new(EngineSettings {
            stale_responses: StaleResponsePolicy::Apply,
            ..EngineSettings::default()
        })
        .expect("valid settings");
        let first = engine.mount();
        let second = engine.set_page(1).expect("page change must fetch");

        engine.complete(settle(second, &["page two"]));
        let outcome = engine.complete(settle(first, &["page one"]));

        assert_eq!(outcome, CompletionOutcome::Applied { rows: 1 });
        assert_eq!(displayed(&engine), vec!["page one"]);
    }

    #[test]
    fn zero_page_size_setting_is_rejected() {
        let result = DataEngine::new(EngineSettings {
            page_size: 0,
            ..EngineSettings::default()
        });
        assert!(matches!(result, Err(PageStateError::ZeroPageSize)));
    }

    #[tokio::test]
    async fn malformed_envelope_through_runner_fails_and_keeps_window() {
        let source = FakeSheetSource::with_responses(vec![
            Ok(envelope_with_names(&["ACME LLC", "Beta Co"])),
            Ok("google.visualization.Query.setResponse({});".to_string()),
        ]);
        let runner = FetchRunner::new(Arc::clone(&source));
        let mut engine = engine();

        let first = engine.mount();
        engine.complete(runner.execute(first).await);
        let before = engine.window().clone();

        let second = engine.set_page(1).expect("page change must fetch");
        engine.complete(runner.execute(second).await);

        assert_eq!(engine.phase(), EnginePhase::Failed);
        assert!(matches!(engine.failure(), Some(FetchFailure::Decode(_))));
        assert_eq!(engine.window(), &before);
        assert_eq!(displayed(&engine), vec!["ACME LLC", "Beta Co"]);
    }
}
