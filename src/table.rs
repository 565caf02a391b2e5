use std::cmp::Ordering;
use std::collections::BTreeSet;

use rayon::prelude::*;
use tracing::trace;

use crate::record::UserRecord;

/// Fields of a [`UserRecord`] the engine can sort on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Name,
    Email,
    Mobile,
    Status,
    Avatar,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Name => "name",
            Field::Email => "email",
            Field::Mobile => "mobile",
            Field::Status => "status",
            Field::Avatar => "avatar",
        }
    }

    // Strings compare lexicographically, ids numerically.
    fn compare(&self, a: &UserRecord, b: &UserRecord) -> Ordering {
        match self {
            Field::Id => a.id.cmp(&b.id),
            Field::Name => a.name.cmp(&b.name),
            Field::Email => a.email.cmp(&b.email),
            Field::Mobile => a.mobile.cmp(&b.mobile),
            Field::Status => a.status.as_str().cmp(b.status.as_str()),
            Field::Avatar => a.avatar.cmp(&b.avatar),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnId {
    Name,
    Email,
    Mobile,
    Status,
    Actions,
}

/// How the presentation layer is expected to draw a cell of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Text,
    Truncated,
    Monospace,
    Badge,
    Menu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub id: ColumnId,
    pub header: &'static str,
    pub field: Option<Field>,
    pub sortable: bool,
    pub hideable: bool,
    pub cell: CellKind,
}

pub static COLUMNS: [ColumnDescriptor; 5] = [
    ColumnDescriptor {
        id: ColumnId::Name,
        header: "Name",
        field: Some(Field::Name),
        sortable: true,
        hideable: true,
        cell: CellKind::Text,
    },
    ColumnDescriptor {
        id: ColumnId::Email,
        header: "Email",
        field: Some(Field::Email),
        sortable: false,
        hideable: true,
        cell: CellKind::Truncated,
    },
    ColumnDescriptor {
        id: ColumnId::Mobile,
        header: "Mobile",
        field: Some(Field::Mobile),
        sortable: false,
        hideable: true,
        cell: CellKind::Monospace,
    },
    ColumnDescriptor {
        id: ColumnId::Status,
        header: "Status",
        field: Some(Field::Status),
        sortable: false,
        hideable: true,
        cell: CellKind::Badge,
    },
    ColumnDescriptor {
        id: ColumnId::Actions,
        header: "",
        field: None,
        sortable: false,
        hideable: false,
        cell: CellKind::Menu,
    },
];

pub fn column(id: ColumnId) -> &'static ColumnDescriptor {
    // COLUMNS is declared in ColumnId order
    &COLUMNS[id as usize]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: Field,
    pub direction: SortDirection,
}

impl SortSpec {
    fn compare(&self, a: &UserRecord, b: &UserRecord) -> Ordering {
        match self.direction {
            SortDirection::Ascending => self.field.compare(a, b),
            SortDirection::Descending => self.field.compare(b, a),
        }
    }
}

/// The rows of the current page plus the counts needed to draw the footer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibleWindow {
    pub rows: Vec<UserRecord>,
    pub total_matching: usize,
    pub total_pages: usize,
    pub page_index: usize,
}

impl VisibleWindow {
    pub fn can_previous(&self) -> bool {
        self.page_index > 0
    }

    pub fn can_next(&self) -> bool {
        self.page_index + 1 < self.total_pages
    }
}

/// Sort, filter, column visibility and pagination state of the user table.
///
/// The state never holds rows. Every view is produced by [`TableState::derive_window`]
/// from the full record set, applying filter, sort and pagination in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableState {
    sort: Option<SortSpec>,
    filter_text: String,
    hidden_columns: BTreeSet<ColumnId>,
    page_index: usize,
    page_size: usize,
}

impl Default for TableState {
    fn default() -> Self {
        Self::new(crate::domain::DEFAULT_PAGE_SIZE)
    }
}

impl TableState {
    pub fn new(page_size: usize) -> Self {
        Self {
            sort: None,
            filter_text: String::new(),
            hidden_columns: BTreeSet::new(),
            page_index: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn sort(&self) -> Option<SortSpec> {
        self.sort
    }

    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    pub fn hidden_columns(&self) -> &BTreeSet<ColumnId> {
        &self.hidden_columns
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn is_visible(&self, id: ColumnId) -> bool {
        !self.hidden_columns.contains(&id)
    }

    pub fn visible_columns(&self) -> Vec<&'static ColumnDescriptor> {
        COLUMNS.iter().filter(|c| self.is_visible(c.id)).collect()
    }

    /// Cycles the sort on `field`: ascending, descending, unsorted.
    pub fn set_sort(&mut self, field: Field) {
        self.sort = match self.sort {
            Some(SortSpec {
                field: f,
                direction: SortDirection::Ascending,
            }) if f == field => Some(SortSpec {
                field,
                direction: SortDirection::Descending,
            }),
            Some(SortSpec {
                field: f,
                direction: SortDirection::Descending,
            }) if f == field => None,
            _ => Some(SortSpec {
                field,
                direction: SortDirection::Ascending,
            }),
        };
        self.page_index = 0;
        trace!("Sort on {} => {:?}", field.name(), self.sort);
    }

    pub fn set_filter_text(&mut self, text: impl Into<String>) {
        self.filter_text = text.into();
        self.page_index = 0;
        trace!("Filter text => {:?}", self.filter_text);
    }

    /// Flips the visibility of a column. Returns false if the column can not be hidden.
    pub fn toggle_column_visibility(&mut self, id: ColumnId) -> bool {
        if !column(id).hideable {
            trace!("Column {id:?} can not be hidden");
            return false;
        }
        if !self.hidden_columns.remove(&id) {
            self.hidden_columns.insert(id);
        }
        trace!("Hidden columns => {:?}", self.hidden_columns);
        true
    }

    pub fn set_page_index(&mut self, records: &[UserRecord], index: usize) {
        let pages = self.page_count(records);
        self.page_index = index.min(pages - 1);
        trace!("Page index => {}/{}", self.page_index, pages);
    }

    pub fn next_page(&mut self, records: &[UserRecord]) -> bool {
        if self.page_index + 1 >= self.page_count(records) {
            return false;
        }
        self.page_index += 1;
        true
    }

    pub fn previous_page(&mut self) -> bool {
        if self.page_index == 0 {
            return false;
        }
        self.page_index -= 1;
        true
    }

    pub fn last_page(&mut self, records: &[UserRecord]) {
        self.set_page_index(records, usize::MAX);
    }

    pub fn set_page_size(&mut self, records: &[UserRecord], page_size: usize) {
        self.page_size = page_size.max(1);
        self.set_page_index(records, self.page_index);
    }

    /// Keeps the page index inside the page range after the record set changed.
    pub fn clamp(&mut self, records: &[UserRecord]) {
        self.set_page_index(records, self.page_index);
    }

    pub fn reset_filters(&mut self) {
        self.filter_text.clear();
        self.page_index = 0;
    }

    pub fn page_count(&self, records: &[UserRecord]) -> usize {
        Self::pages_for(self.filter(records).len(), self.page_size)
    }

    fn pages_for(matching: usize, page_size: usize) -> usize {
        matching.div_ceil(page_size).max(1)
    }

    fn filter<'a>(&self, records: &'a [UserRecord]) -> Vec<&'a UserRecord> {
        if self.filter_text.is_empty() {
            return records.iter().collect();
        }
        let needle = self.filter_text.to_lowercase();
        records
            .par_iter()
            .filter(|r| r.name.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn derive_window(&self, records: &[UserRecord]) -> VisibleWindow {
        let mut rows = self.filter(records);
        if let Some(spec) = self.sort {
            rows.sort_by(|a, b| spec.compare(a, b));
        }

        let total_matching = rows.len();
        let total_pages = Self::pages_for(total_matching, self.page_size);
        let page_index = self.page_index.min(total_pages - 1);
        let begin = std::cmp::min(page_index * self.page_size, total_matching);
        let end = std::cmp::min(begin + self.page_size, total_matching);

        trace!(
            "Window: matching {}, pages {}, page {}, rows {}..{}",
            total_matching, total_pages, page_index, begin, end
        );
        VisibleWindow {
            rows: rows[begin..end].iter().map(|&r| r.clone()).collect(),
            total_matching,
            total_pages,
            page_index,
        }
    }
}
