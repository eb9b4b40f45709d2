use serde::{Deserialize, Serialize};

/// Number of page records shown per pagination page.
pub const CHUNK_SIZE: usize = 10;

/// Note attached to images that carry no `alt` attribute at all.
pub const MISSING_ALT_NOTE: &str = "This image has no alt attribute at all. Neither with an empty string nor without a value. Even if the image is just decorative, you should add an alt attribute to the image with an empty value. Otherwise, screen readers may read incorrect information and potentially confuse some users.";

/// One `<img>` found on a crawled page, plus the reviewer's annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescriptor {
    pub src: String,
    pub alt: String,
    pub note: String,
    pub is_checked: bool,

    /// Only meaningful while `is_checked` is set.
    #[serde(default)]
    pub is_failed: bool,
}

impl ImageDescriptor {
    /// Create an unreviewed descriptor. `alt` is `None` only when the
    /// attribute is absent; an empty attribute is `Some("")`.
    pub fn new(src: String, alt: Option<String>) -> Self {
        let note = if alt.is_some() {
            String::new()
        } else {
            MISSING_ALT_NOTE.to_string()
        };

        Self {
            src,
            alt: alt.unwrap_or_default(),
            note,
            is_checked: false,
            is_failed: false,
        }
    }

    /// Set the checked flag. Unchecking also clears the failed flag.
    pub fn set_checked(&mut self, checked: bool) {
        self.is_checked = checked;
        if !checked {
            self.is_failed = false;
        }
    }

    /// Flip the failed flag. Returns false, leaving the descriptor untouched,
    /// when the image has not been checked yet.
    pub fn toggle_failed(&mut self) -> bool {
        if !self.is_checked {
            return false;
        }
        self.is_failed = !self.is_failed;
        true
    }

    /// Inline `data:` images cannot be deep-linked on the live page.
    pub fn is_inline(&self) -> bool {
        self.src.starts_with("data:image")
    }
}

/// Images extracted from one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditedPage {
    pub page_title: String,
    pub page_link: String,
    pub images: Vec<ImageDescriptor>,
}

/// A page that could not be audited, with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedPage {
    pub page_link: String,
    pub error: String,
}

/// Audit data for one crawled URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageRecord {
    Audited(AuditedPage),
    Failed(FailedPage),
}

impl PageRecord {
    pub fn audited(page_title: String, page_link: String, images: Vec<ImageDescriptor>) -> Self {
        PageRecord::Audited(AuditedPage {
            page_title,
            page_link,
            images,
        })
    }

    pub fn failed(page_link: impl Into<String>, error: impl Into<String>) -> Self {
        PageRecord::Failed(FailedPage {
            page_link: page_link.into(),
            error: error.into(),
        })
    }

    pub fn page_link(&self) -> &str {
        match self {
            PageRecord::Audited(page) => &page.page_link,
            PageRecord::Failed(page) => &page.page_link,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PageRecord::Audited(_) => None,
            PageRecord::Failed(page) => Some(&page.error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PageRecord::Failed(_))
    }

    pub fn images(&self) -> &[ImageDescriptor] {
        match self {
            PageRecord::Audited(page) => &page.images,
            PageRecord::Failed(_) => &[],
        }
    }

    pub fn image_mut(&mut self, index: usize) -> Option<&mut ImageDescriptor> {
        match self {
            PageRecord::Audited(page) => page.images.get_mut(index),
            PageRecord::Failed(_) => None,
        }
    }
}

/// All page records of one audit session, split into pagination chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    chunks: Vec<Vec<PageRecord>>,
}

impl Dataset {
    /// Chunk the records in order, `CHUNK_SIZE` per chunk.
    pub fn from_records(records: Vec<PageRecord>) -> Self {
        let mut chunks: Vec<Vec<PageRecord>> = Vec::new();
        for record in records {
            match chunks.last_mut() {
                Some(chunk) if chunk.len() < CHUNK_SIZE => chunk.push(record),
                _ => chunks.push(vec![record]),
            }
        }
        Self { chunks }
    }

    pub fn from_chunks(chunks: Vec<Vec<PageRecord>>) -> Self {
        Self { chunks }
    }

    /// Number of pagination pages.
    pub fn total_pages(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Records of a 1-based pagination page.
    pub fn chunk(&self, page: usize) -> Option<&[PageRecord]> {
        page.checked_sub(1)
            .and_then(|index| self.chunks.get(index))
            .map(Vec::as_slice)
    }

    pub fn image_mut(
        &mut self,
        page: usize,
        page_index: usize,
        image_index: usize,
    ) -> Option<&mut ImageDescriptor> {
        let chunk = self.chunks.get_mut(page.checked_sub(1)?)?;
        chunk.get_mut(page_index)?.image_mut(image_index)
    }

    pub fn chunks(&self) -> &[Vec<PageRecord>] {
        &self.chunks
    }

    pub fn records(&self) -> impl Iterator<Item = &PageRecord> {
        self.chunks.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(n: usize) -> PageRecord {
        PageRecord::audited(
            format!("Page {n}"),
            format!("https://example.com/{n}"),
            vec![ImageDescriptor::new(format!("https://example.com/{n}.png"), None)],
        )
    }

    #[test]
    fn test_new_descriptor_notes() {
        let missing = ImageDescriptor::new("a.png".to_string(), None);
        assert_eq!(missing.note, MISSING_ALT_NOTE);
        assert_eq!(missing.alt, "");

        let empty = ImageDescriptor::new("b.png".to_string(), Some(String::new()));
        assert_eq!(empty.note, "");
        assert!(!empty.is_checked);
        assert!(!empty.is_failed);
    }

    #[test]
    fn test_failed_requires_checked() {
        let mut image = ImageDescriptor::new("a.png".to_string(), Some("A".to_string()));
        assert!(!image.toggle_failed());
        assert!(!image.is_failed);

        image.set_checked(true);
        assert!(image.toggle_failed());
        assert!(image.is_failed);

        image.set_checked(false);
        assert!(!image.is_failed);
        assert!(!image.is_checked);
    }

    #[test]
    fn test_chunking() {
        let dataset = Dataset::from_records((0..23).map(record).collect());
        assert_eq!(dataset.total_pages(), 3);
        assert_eq!(dataset.chunk(1).unwrap().len(), 10);
        assert_eq!(dataset.chunk(3).unwrap().len(), 3);
        assert!(dataset.chunk(0).is_none());
        assert!(dataset.chunk(4).is_none());
        assert_eq!(dataset.records().count(), 23);
    }

    #[test]
    fn test_serialized_shape() {
        let dataset = Dataset::from_records(vec![
            record(1),
            PageRecord::failed("https://example.com/missing", "Page not found (404)"),
        ]);

        let json = serde_json::to_value(&dataset).unwrap();
        assert_eq!(json[0][0]["pageTitle"], "Page 1");
        assert_eq!(json[0][0]["images"][0]["isChecked"], false);
        assert_eq!(json[0][1]["error"], "Page not found (404)");
        assert!(json[0][1].get("pageTitle").is_none());

        let restored: Dataset = serde_json::from_value(json).unwrap();
        assert_eq!(restored, dataset);
    }

    #[test]
    fn test_legacy_data_without_failed_flag() {
        let json = r#"[[{"pageTitle":"T","pageLink":"https://e.com/","images":[{"src":"x.png","alt":"","note":"","isChecked":true}]}]]"#;
        let dataset: Dataset = serde_json::from_str(json).unwrap();
        let image = &dataset.chunk(1).unwrap()[0].images()[0];
        assert!(image.is_checked);
        assert!(!image.is_failed);
    }
}
