//! Greedy, order-preserving bin-packing of rendered items into pages.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLimits {
    pub max_items: usize,
    pub max_chars: usize,
}

impl PageLimits {
    /// Default limits for list views.
    pub const LIST: Self = Self { max_items: 10, max_chars: 4000 };
    /// One full record per page, no practical character cap.
    pub const DETAIL: Self = Self { max_items: 1, max_chars: usize::MAX };

    pub fn new(max_items: usize, max_chars: usize) -> Self {
        Self { max_items, max_chars }
    }
}

impl Default for PageLimits {
    fn default() -> Self {
        Self::LIST
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    /// Position of the first item in the paginated input.
    pub first: usize,
    pub items: Vec<String>,
    pub chars: usize,
}

impl Page {
    fn push(&mut self, rendered: String, chars: usize) {
        self.items.push(rendered);
        self.chars += chars;
    }
}

/// Packs `items` into pages. A page is closed when it already holds
/// `max_items` entries or when the next item would push it past
/// `max_chars`. An item longer than `max_chars` gets a page of its own.
pub fn paginate<T, F>(items: &[T], render: F, limits: PageLimits) -> Pages
where
    F: Fn(&T) -> String,
{
    let max_items = limits.max_items.max(1);
    let mut pages = Vec::new();
    let mut current = Page::default();

    for (position, item) in items.iter().enumerate() {
        let rendered = render(item);
        let chars = rendered.chars().count();
        let full = current.items.len() >= max_items;
        let overflow = current.chars.saturating_add(chars) > limits.max_chars;

        if !current.items.is_empty() && (full || overflow) {
            pages.push(std::mem::take(&mut current));
        }
        if current.items.is_empty() {
            current.first = position;
        }
        current.push(rendered, chars);
    }

    if !current.items.is_empty() {
        pages.push(current);
    }

    Pages(pages)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pages(Vec<Page>);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageView<'a> {
    /// Zero-based index after clamping.
    pub index: usize,
    /// One-based position for display.
    pub number: usize,
    pub total: usize,
    /// Input position of `items[0]`.
    pub first: usize,
    pub items: &'a [String],
}

impl PageView<'_> {
    pub fn has_previous(&self) -> bool {
        self.index > 0
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total
    }
}

impl Pages {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.0.iter()
    }

    /// Clamps `index` into `[0, len)`. `None` only when there are no pages.
    pub fn clamp(&self, index: usize) -> Option<usize> {
        if self.0.is_empty() {
            None
        } else {
            Some(index.min(self.0.len() - 1))
        }
    }

    pub fn view(&self, index: usize) -> Option<PageView<'_>> {
        let index = self.clamp(index)?;
        let page = self.0.get(index)?;
        Some(PageView {
            index,
            number: index + 1,
            total: self.0.len(),
            first: page.first,
            items: &page.items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{paginate, PageLimits};

    fn numbered(count: usize) -> Vec<usize> {
        (0..count).collect()
    }

    #[test]
    fn empty_input_produces_no_pages() {
        let pages = paginate(&Vec::<usize>::new(), |item| item.to_string(), PageLimits::LIST);

        assert!(pages.is_empty());
        assert_eq!(pages.view(0), None);
        assert_eq!(pages.clamp(3), None);
    }

    #[test]
    fn twelve_items_fill_ten_then_two() {
        let pages = paginate(&numbered(12), |item| format!("item {item}"), PageLimits::LIST);

        assert_eq!(pages.len(), 2);
        let first = pages.view(0).expect("first page");
        let second = pages.view(1).expect("second page");
        assert_eq!(first.items.len(), 10);
        assert_eq!(second.items, ["item 10".to_owned(), "item 11".to_owned()].as_slice());
        assert_eq!((second.number, second.total), (2, 2));
    }

    #[test]
    fn pages_partition_input_in_order() {
        let items: Vec<String> = (0..37).map(|i| "x".repeat(1 + (i * 7) % 23)).collect();
        let pages = paginate(&items, String::clone, PageLimits::new(4, 40));

        let flattened: Vec<String> =
            pages.iter().flat_map(|page| page.items.iter().cloned()).collect();
        assert_eq!(flattened, items);
    }

    #[test]
    fn pages_respect_both_limits() {
        let items: Vec<String> = (0..50).map(|i| "y".repeat(1 + (i * 13) % 31)).collect();
        let limits = PageLimits::new(5, 60);
        let pages = paginate(&items, String::clone, limits);

        for page in pages.iter() {
            assert!(page.items.len() <= limits.max_items);
            assert!(page.chars <= limits.max_chars);
            assert!(!page.items.is_empty());
        }
    }

    #[test]
    fn character_limit_closes_pages_early() {
        let items = vec!["a".repeat(1500), "b".repeat(1500), "c".repeat(1500)];
        let pages = paginate(&items, String::clone, PageLimits::LIST);

        assert_eq!(pages.len(), 2);
        assert_eq!(pages.view(0).expect("first page").items.len(), 2);
        assert_eq!(pages.view(1).expect("second page").items.len(), 1);
    }

    #[test]
    fn oversized_item_sits_alone_and_is_not_split() {
        let items = vec!["short".to_owned(), "z".repeat(5000), "tail".to_owned()];
        let pages = paginate(&items, String::clone, PageLimits::LIST);

        assert_eq!(pages.len(), 3);
        let middle = pages.view(1).expect("oversized page");
        assert_eq!(middle.items.len(), 1);
        assert_eq!(middle.items[0].len(), 5000);
    }

    #[test]
    fn characters_are_counted_not_bytes() {
        let items = vec!["ж".repeat(6), "ж".repeat(4)];
        let pages = paginate(&items, String::clone, PageLimits::new(10, 10));

        assert_eq!(pages.len(), 1, "ten cyrillic chars fit a ten char page");
    }

    #[test]
    fn view_clamps_out_of_range_index() {
        let pages = paginate(&numbered(12), |item| item.to_string(), PageLimits::LIST);
        let view = pages.view(5).expect("clamped page");

        assert_eq!(view.index, 1);
        assert_eq!(view.number, 2);
        assert!(view.has_previous());
        assert!(!view.has_next());
    }

    #[test]
    fn detail_limits_put_one_item_per_page() {
        let pages = paginate(&numbered(3), |item| "w".repeat(10_000 + item), PageLimits::DETAIL);

        assert_eq!(pages.len(), 3);
        assert!(pages.iter().all(|page| page.items.len() == 1));
    }

    #[test]
    fn views_report_where_their_items_start() {
        let items = vec!["a".repeat(30), "b".repeat(30), "c".repeat(30)];
        let pages = paginate(&items, String::clone, PageLimits::new(2, 100));

        let second = pages.view(1).expect("second page");
        assert_eq!(second.first, 2);
        assert_eq!(second.items, [items[2].clone()].as_slice());
        assert_eq!(pages.view(0).expect("first page").first, 0);
    }

    #[test]
    fn zero_item_limit_behaves_like_one() {
        let pages = paginate(&numbered(3), |item| item.to_string(), PageLimits::new(0, 100));

        assert_eq!(pages.len(), 3);
    }
}
