use crate::fields::source_columns;
use crate::view_state::{PageState, ViewState};

/// A window of the remote sheet. Filtering and sorting always happen locally,
/// so the descriptor only ever carries the window bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchDescriptor {
    pub offset: usize,
    pub limit: usize,
}

impl FetchDescriptor {
    #[must_use]
    pub fn for_page(page: PageState) -> Self {
        Self {
            offset: page.start_offset(),
            limit: page.size(),
        }
    }

    #[must_use]
    pub fn to_query(&self) -> String {
        format!(
            "SELECT {} LIMIT {} OFFSET {}",
            source_columns().join(","),
            self.limit,
            self.offset
        )
    }
}

#[must_use]
pub fn plan_fetch(state: &ViewState) -> FetchDescriptor {
    FetchDescriptor::for_page(state.page)
}

#[must_use]
pub fn fetch_required(previous: &ViewState, next: &ViewState) -> bool {
    previous.page != next.page
}
