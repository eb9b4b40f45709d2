//! Review session over one audit dataset.
//!
//! The session owns the dataset, the pagination position and the transient
//! state of the per-row controls. Reviewer input arrives as [`TableAction`]
//! values through [`TableSession::dispatch`]; every change to the data is
//! announced to the event sink, which is the only way it reaches storage.

use crate::Action;
use crate::error::{AuditError, Result};
use crate::events::{EventSink, TableEvent};
use crate::pagination::PaginationState;
use crate::render;
use crate::results::Dataset;
use std::collections::HashMap;

/// What the reviewer did to a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    ToggleChecked,
    ToggleFailed,
    /// Note text was edited but not saved yet
    EditNote(String),
    SaveNote,
}

/// A reviewer action on one image of the current page.
///
/// `page_index` is the position of the page record within the current
/// pagination page, `image_index` the position of the image in that record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableAction {
    pub kind: ActionKind,
    pub page_index: usize,
    pub image_index: usize,
}

impl TableAction {
    pub fn new(kind: ActionKind, page_index: usize, image_index: usize) -> Self {
        Self {
            kind,
            page_index,
            image_index,
        }
    }
}

/// State of a row's "save the note" control
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveState {
    /// Nothing edited; the control is disabled
    #[default]
    Idle,
    /// Edited text waits to be saved; the control is enabled
    Unsaved,
    /// Last edit was saved; disabled with success styling
    Saved,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowControl {
    pub draft: Option<String>,
    pub save: SaveState,
}

/// Control state of the rows on the current page, keyed by
/// `(page_index, image_index)`. Rows without an entry are idle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowControls {
    rows: HashMap<(usize, usize), RowControl>,
}

impl RowControls {
    pub fn get(&self, page_index: usize, image_index: usize) -> RowControl {
        self.rows
            .get(&(page_index, image_index))
            .cloned()
            .unwrap_or_default()
    }

    fn entry(&mut self, page_index: usize, image_index: usize) -> &mut RowControl {
        self.rows.entry((page_index, image_index)).or_default()
    }

    fn clear(&mut self) {
        self.rows.clear();
    }
}

pub struct TableSession<E> {
    dataset: Dataset,
    pagination: PaginationState,
    action: Action,
    controls: RowControls,
    sink: E,
}

impl<E: EventSink> TableSession<E> {
    /// Starts a session at `page`, clamped to the dataset
    pub fn new(dataset: Dataset, action: Action, page: usize, sink: E) -> Self {
        let pagination = PaginationState::new(page, dataset.total_pages());
        Self {
            dataset,
            pagination,
            action,
            controls: RowControls::default(),
            sink,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn pagination(&self) -> &PaginationState {
        &self.pagination
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn controls(&self) -> &RowControls {
        &self.controls
    }

    pub fn into_dataset(self) -> Dataset {
        self.dataset
    }

    /// HTML of the current page
    pub fn render(&self) -> Result<String> {
        let records = self
            .dataset
            .chunk(self.pagination.current_page())
            .unwrap_or_default();
        Ok(render::render_page(records, &self.pagination, &self.controls)?)
    }

    /// Announces that the table has been rendered
    pub fn rendered(&self) {
        self.sink.emit(TableEvent::TableRendered {
            action: self.action,
        });
    }

    pub fn notify_data_change(&self) {
        self.sink.emit(TableEvent::TableDataChange {
            table_data: self.dataset.clone(),
        });
    }

    /// Switches to another pagination page. Unsaved drafts are dropped.
    pub fn change_page(&mut self, page: usize) -> Result<()> {
        if !self.pagination.go_to(page) {
            return Err(AuditError::PageOutOfRange {
                page,
                total: self.pagination.total_pages(),
            });
        }

        self.controls.clear();
        ::log::debug!("Switched to page {}", page);
        self.sink.emit(TableEvent::PageChange { page });
        Ok(())
    }

    /// Applies one reviewer action to the current page. Returns whether the
    /// dataset changed; note drafts and ignored actions leave it untouched.
    pub fn dispatch(&mut self, action: TableAction) -> Result<bool> {
        let TableAction {
            kind,
            page_index,
            image_index,
        } = action;
        let page = self.pagination.current_page();

        let image = self
            .dataset
            .image_mut(page, page_index, image_index)
            .ok_or(AuditError::RowOutOfRange {
                page_index,
                image_index,
            })?;

        let changed = match kind {
            ActionKind::ToggleChecked => {
                let checked = !image.is_checked;
                image.set_checked(checked);
                true
            }
            ActionKind::ToggleFailed => {
                let toggled = image.toggle_failed();
                if !toggled {
                    ::log::debug!(
                        "Ignoring failed mark on unchecked image {}:{}",
                        page_index,
                        image_index
                    );
                }
                toggled
            }
            ActionKind::EditNote(text) => {
                let control = self.controls.entry(page_index, image_index);
                control.draft = Some(text);
                control.save = SaveState::Unsaved;
                false
            }
            ActionKind::SaveNote => {
                let control = self.controls.entry(page_index, image_index);
                match control.draft.take() {
                    Some(draft) if control.save == SaveState::Unsaved => {
                        image.note = draft;
                        control.save = SaveState::Saved;
                        true
                    }
                    _ => false,
                }
            }
        };

        if changed {
            self.notify_data_change();
        }
        Ok(changed)
    }
}
