/// Pages shown on either side of the current one.
pub const WINDOW: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLink {
    Page { number: u32, current: bool },
    Ellipsis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub current: u32,
    pub total_pages: u32,
    pub first_enabled: bool,
    pub prev_enabled: bool,
    pub next_enabled: bool,
    pub last_enabled: bool,
    pub links: Vec<PageLink>,
}

impl Pagination {
    /// Link bar for `current` out of `total_pages`. An empty result set
    /// still renders as a single page.
    pub fn new(current: u32, total_pages: u32) -> Self {
        let total_pages = total_pages.max(1);
        let current = current.clamp(1, total_pages);
        let start = current.saturating_sub(WINDOW).max(1);
        let end = current.saturating_add(WINDOW).min(total_pages);

        let mut links = Vec::new();
        if start > 1 {
            links.push(PageLink::Ellipsis);
        }
        links.extend((start..=end).map(|number| PageLink::Page {
            number,
            current: number == current,
        }));
        if end < total_pages {
            links.push(PageLink::Ellipsis);
        }

        Self {
            current,
            total_pages,
            first_enabled: current > 1,
            prev_enabled: current > 1,
            next_enabled: current < total_pages,
            last_enabled: current < total_pages,
            links,
        }
    }

    pub fn prev(&self) -> Option<u32> {
        self.prev_enabled.then(|| self.current - 1)
    }

    pub fn next(&self) -> Option<u32> {
        self.next_enabled.then(|| self.current + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(bar: &Pagination) -> Vec<u32> {
        bar.links
            .iter()
            .filter_map(|link| match link {
                PageLink::Page { number, .. } => Some(*number),
                PageLink::Ellipsis => None,
            })
            .collect()
    }

    #[test]
    fn middle_page_has_ellipses_on_both_sides() {
        let bar = Pagination::new(10, 20);
        assert_eq!(numbers(&bar), (7..=13).collect::<Vec<_>>());
        assert_eq!(bar.links.first(), Some(&PageLink::Ellipsis));
        assert_eq!(bar.links.last(), Some(&PageLink::Ellipsis));
        assert!(bar.first_enabled && bar.next_enabled);
    }

    #[test]
    fn first_page_disables_backward_controls() {
        let bar = Pagination::new(1, 20);
        assert_eq!(numbers(&bar), vec![1, 2, 3, 4]);
        assert_ne!(bar.links.first(), Some(&PageLink::Ellipsis));
        assert_eq!(bar.links.last(), Some(&PageLink::Ellipsis));
        assert!(!bar.first_enabled && !bar.prev_enabled);
        assert_eq!(bar.prev(), None);
        assert_eq!(bar.next(), Some(2));
    }

    #[test]
    fn last_page_disables_forward_controls() {
        let bar = Pagination::new(20, 20);
        assert_eq!(numbers(&bar), vec![17, 18, 19, 20]);
        assert!(!bar.next_enabled && !bar.last_enabled);
        assert_eq!(bar.next(), None);
    }

    #[test]
    fn small_result_sets_need_no_ellipsis() {
        let bar = Pagination::new(2, 4);
        assert_eq!(numbers(&bar), vec![1, 2, 3, 4]);
        assert!(!bar.links.contains(&PageLink::Ellipsis));

        let empty = Pagination::new(1, 0);
        assert_eq!(empty.total_pages, 1);
        assert!(!empty.prev_enabled && !empty.next_enabled);
    }

    #[test]
    fn huge_page_counts_do_not_overflow() {
        let bar = Pagination::new(u32::MAX, u32::MAX);
        assert_eq!(numbers(&bar), ((u32::MAX - 3)..=u32::MAX).collect::<Vec<_>>());
        assert_eq!(bar.next(), None);
        assert_eq!(bar.prev(), Some(u32::MAX - 1));

        let near_end = Pagination::new(u32::MAX - 1, u32::MAX);
        assert_eq!(near_end.links.last(), Some(&PageLink::Page { number: u32::MAX, current: false }));
    }
}
