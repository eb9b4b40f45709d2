//! HTML rendering of the audit table.
//!
//! Records are turned into plain view structs first, so the template only
//! prints values and never decides anything.

use crate::locate::image_deep_link;
use crate::pagination::{PageToken, PaginationState};
use crate::results::{ImageDescriptor, PageRecord};
use crate::session::{RowControls, SaveState};
use askama::Template;

pub const MARK_FAILED_LABEL: &str = "Mark as failed";
pub const UNMARK_FAILED_LABEL: &str = "Unmark as failed";
pub const SAVE_NOTE_LABEL: &str = "Save the note";
pub const SAVED_NOTE_LABEL: &str = "Saved ✓";

/// Background of an image row: failed beats checked beats striping
pub fn row_background(image_index: usize, is_checked: bool, is_failed: bool) -> &'static str {
    if is_failed {
        "#ffdfdf"
    } else if is_checked {
        "#dfffdf"
    } else if image_index % 2 == 0 {
        "#f9f9f9"
    } else {
        ""
    }
}

pub struct PageButtonView {
    pub label: String,
    pub page: usize,
    pub active: bool,
    pub ellipsis: bool,
}

pub struct ImageRowView<'a> {
    pub page_index: usize,
    pub image_index: usize,
    pub src: &'a str,
    pub alt: &'a str,
    /// Unsaved draft when there is one, the stored note otherwise
    pub note: String,
    pub background: &'static str,
    pub inline: bool,
    pub deep_link: String,
    pub checked: bool,
    pub failed_label: &'static str,
    pub failed_enabled: bool,
    pub save_enabled: bool,
    pub save_label: &'static str,
    pub saved: bool,
}

pub struct PageTableView<'a> {
    pub page_index: usize,
    pub page_title: &'a str,
    pub page_link: &'a str,
    pub error: &'a str,
    pub failed: bool,
    pub rows: Vec<ImageRowView<'a>>,
}

#[derive(Template)]
#[template(path = "audit_table.html")]
pub struct AuditTableTemplate<'a> {
    pub current_page: usize,
    pub total_pages: usize,
    pub pages: Vec<PageButtonView>,
    pub tables: Vec<PageTableView<'a>>,
}

fn page_buttons(pagination: &PaginationState) -> Vec<PageButtonView> {
    pagination
        .window()
        .into_iter()
        .map(|token| match token {
            PageToken::Number(page) => PageButtonView {
                label: token.to_string(),
                page,
                active: page == pagination.current_page(),
                ellipsis: false,
            },
            PageToken::Ellipsis => PageButtonView {
                label: token.to_string(),
                page: 0,
                active: false,
                ellipsis: true,
            },
        })
        .collect()
}

fn image_row<'a>(
    page_link: &str,
    page_index: usize,
    image_index: usize,
    image: &'a ImageDescriptor,
    controls: &RowControls,
) -> ImageRowView<'a> {
    let control = controls.get(page_index, image_index);

    ImageRowView {
        page_index,
        image_index,
        src: &image.src,
        alt: &image.alt,
        note: control.draft.clone().unwrap_or_else(|| image.note.clone()),
        background: row_background(image_index, image.is_checked, image.is_failed),
        inline: image.is_inline(),
        deep_link: image_deep_link(page_link, &image.src),
        checked: image.is_checked,
        failed_label: if image.is_failed {
            UNMARK_FAILED_LABEL
        } else {
            MARK_FAILED_LABEL
        },
        failed_enabled: image.is_checked,
        save_enabled: control.save == SaveState::Unsaved,
        save_label: if control.save == SaveState::Saved {
            SAVED_NOTE_LABEL
        } else {
            SAVE_NOTE_LABEL
        },
        saved: control.save == SaveState::Saved,
    }
}

fn page_table<'a>(page_index: usize, record: &'a PageRecord, controls: &RowControls) -> PageTableView<'a> {
    match record {
        PageRecord::Audited(page) => PageTableView {
            page_index,
            page_title: &page.page_title,
            page_link: &page.page_link,
            error: "",
            failed: false,
            rows: page
                .images
                .iter()
                .enumerate()
                .map(|(image_index, image)| {
                    image_row(&page.page_link, page_index, image_index, image, controls)
                })
                .collect(),
        },
        PageRecord::Failed(page) => PageTableView {
            page_index,
            page_title: "",
            page_link: &page.page_link,
            error: &page.error,
            failed: true,
            rows: Vec::new(),
        },
    }
}

/// Renders one pagination page of records with its page selector
pub fn render_page(
    records: &[PageRecord],
    pagination: &PaginationState,
    controls: &RowControls,
) -> Result<String, askama::Error> {
    let template = AuditTableTemplate {
        current_page: pagination.current_page(),
        total_pages: pagination.total_pages(),
        pages: page_buttons(pagination),
        tables: records
            .iter()
            .enumerate()
            .map(|(page_index, record)| page_table(page_index, record, controls))
            .collect(),
    };
    template.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{Dataset, MISSING_ALT_NOTE};
    use crate::session::{ActionKind, TableAction, TableSession};
    use crate::events::NullSink;
    use crate::Action;

    fn sample() -> Dataset {
        let mut records: Vec<PageRecord> = (0..12)
            .map(|n| {
                PageRecord::audited(
                    format!("Page <{n}>"),
                    format!("https://e.com/{n}"),
                    vec![
                        ImageDescriptor::new(format!("https://e.com/{n}.png"), Some("Cat & dog".into())),
                        ImageDescriptor::new("data:image/png;base64,AAAA".to_string(), None),
                    ],
                )
            })
            .collect();
        records[1] = PageRecord::failed("https://e.com/1", "Page not found (404)");
        Dataset::from_records(records)
    }

    #[test]
    fn test_row_background_precedence() {
        assert_eq!(row_background(0, true, true), "#ffdfdf");
        assert_eq!(row_background(0, true, false), "#dfffdf");
        assert_eq!(row_background(0, false, false), "#f9f9f9");
        assert_eq!(row_background(1, false, false), "");
    }

    #[test]
    fn test_render_is_idempotent() {
        let session = TableSession::new(sample(), Action::UseSitemap, 1, NullSink);
        assert_eq!(session.render().unwrap(), session.render().unwrap());
    }

    #[test]
    fn test_render_escapes_and_describes_rows() {
        let session = TableSession::new(sample(), Action::UseSitemap, 1, NullSink);
        let html = session.render().unwrap();

        assert!(html.contains("Page &lt;0&gt;"));
        assert!(html.contains("Cat &amp; dog"));
        assert!(!html.contains("Page <0>"));
        assert!(html.contains("Page not found (404)"));
        assert!(html.contains("You can only reach this img manually"));
        assert!(html.contains("image-url="));
        assert!(html.contains("Go to the image</a>"));
        assert!(html.contains(&MISSING_ALT_NOTE[..20]));
        assert!(html.contains(r#"data-kind="toggle-checked" data-page-index="2" data-image-index="1""#));
    }

    #[test]
    fn test_render_reflects_row_state() {
        let mut session = TableSession::new(sample(), Action::UseSitemap, 1, NullSink);
        let before = session.render().unwrap();
        assert!(!before.contains(UNMARK_FAILED_LABEL));

        session.dispatch(TableAction::new(ActionKind::ToggleChecked, 0, 0)).unwrap();
        session.dispatch(TableAction::new(ActionKind::ToggleFailed, 0, 0)).unwrap();
        session
            .dispatch(TableAction::new(ActionKind::EditNote("Reworded caption".into()), 0, 1))
            .unwrap();

        let editing = session.render().unwrap();
        assert!(editing.contains("Reworded caption</textarea>"));
        assert!(!editing.contains(SAVED_NOTE_LABEL));

        session.dispatch(TableAction::new(ActionKind::SaveNote, 0, 1)).unwrap();

        let after = session.render().unwrap();
        assert!(after.contains(UNMARK_FAILED_LABEL));
        assert!(after.contains("#ffdfdf"));
        assert!(after.contains(SAVED_NOTE_LABEL));
        assert!(after.contains("Reworded caption</textarea>"));
    }

    #[test]
    fn test_pagination_bar() {
        let mut session = TableSession::new(sample(), Action::UseSitemap, 1, NullSink);
        let html = session.render().unwrap();
        assert!(html.contains(r#"data-page="2""#));
        assert!(html.contains("page-button active"));

        session.change_page(2).unwrap();
        let second = session.render().unwrap();
        assert!(second.contains("Page &lt;10&gt;"));
        assert!(!second.contains("Page &lt;9&gt;"));
    }
}
