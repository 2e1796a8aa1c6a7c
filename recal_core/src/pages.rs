use recal_ical::{Component, Time};

use crate::errors::Error;
use crate::occurrence::Occurrence;
use crate::query::OccurrencesAfter;
use crate::time::compare_greater;

/// One page of a paginated walk.
#[derive(Debug, Clone)]
pub struct Page {
    components: Vec<Component>,
    next_page_id: String,
}

impl Page {
    fn new(components: Vec<Component>, next_page_id: String) -> Page {
        Page {
            components,
            next_page_id,
        }
    }

    fn empty() -> Page {
        Page::new(Vec::new(), String::new())
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn into_components(self) -> Vec<Component> {
        self.components
    }

    /// The cursor for the following page, empty on the last page.
    pub fn next_page_id(&self) -> &str {
        &self.next_page_id
    }

    pub fn has_next_page(&self) -> bool {
        !self.next_page_id.is_empty()
    }

    pub fn is_last(&self) -> bool {
        self.next_page_id.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// A stable walk over the ordered occurrence stream, one page at a time.
///
/// The look-ahead occurrence becomes the next page's first entry and its id
/// becomes the page cursor, so a client can resume across process restarts.
#[derive(Debug)]
pub struct Pages<'a> {
    prefix: std::collections::VecDeque<Occurrence>,
    occurrences: OccurrencesAfter<'a>,
    size: usize,
    stop: Option<Time>,
    keep_recurrence_attributes: bool,
    next_occurrence: Option<Occurrence>,
}

impl<'a> Pages<'a> {
    pub(crate) fn new(
        prefix: Vec<Occurrence>,
        occurrences: OccurrencesAfter<'a>,
        size: usize,
        stop: Option<Time>,
        keep_recurrence_attributes: bool,
    ) -> Result<Pages<'a>, Error> {
        let mut pages = Pages {
            prefix: prefix.into(),
            occurrences,
            size,
            stop,
            keep_recurrence_attributes,
            next_occurrence: None,
        };
        // prime the look-ahead with the first occurrence within the bound;
        // a start exactly at the bound is still in, as in the page loop
        if let Some(first) = pages.pull()? {
            let in_bounds = match &pages.stop {
                None => true,
                Some(stop) => !compare_greater(&first.start, stop),
            };
            if in_bounds {
                pages.next_occurrence = Some(first);
            }
        }
        Ok(pages)
    }

    fn pull(&mut self) -> Result<Option<Occurrence>, Error> {
        if let Some(occurrence) = self.prefix.pop_front() {
            return Ok(Some(occurrence));
        }
        self.occurrences.next().transpose()
    }

    /// Generate the next page. After the last one, pages are empty.
    pub fn generate_next_page(&mut self) -> Result<Page, Error> {
        let Some(first) = self.next_occurrence.take() else {
            return Ok(Page::empty());
        };

        let mut last = first.clone();
        let mut occurrences = vec![first];
        while let Some(occurrence) = self.pull()? {
            if let Some(stop) = &self.stop {
                if compare_greater(&occurrence.start, stop) {
                    break;
                }
            }
            last = occurrence.clone();
            if occurrences.len() < self.size {
                occurrences.push(occurrence);
            } else {
                break;
            }
        }

        let last_is_on_this_page = occurrences
            .last()
            .map(|occurrence| occurrence.id() == last.id())
            .unwrap_or(true);
        self.next_occurrence = if last_is_on_this_page {
            None
        } else {
            Some(last)
        };

        let next_page_id = self
            .next_occurrence
            .as_ref()
            .map(|occurrence| occurrence.id().to_string())
            .unwrap_or_default();
        let components = occurrences
            .into_iter()
            .map(|occurrence| occurrence.as_component(self.keep_recurrence_attributes))
            .collect();
        Ok(Page::new(components, next_page_id))
    }
}
