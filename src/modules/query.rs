use std::collections::BTreeSet;
use std::str::FromStr;

use derive_more::with_trait::Display;
use url::form_urlencoded;

use crate::modules::types::Source;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum TagMode {
    #[default]
    #[display("any")]
    Any,
    #[display("all")]
    All,
}

impl FromStr for TagMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" => Ok(TagMode::Any),
            "all" => Ok(TagMode::All),
            other => Err(format!("unknown tag mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SortOrder {
    #[display("asc")]
    Asc,
    #[display("desc")]
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// Columns the backend accepts for `sort_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SortColumn {
    #[display("id")]
    Id,
    #[display("difficulty")]
    Difficulty,
    #[display("rating")]
    Rating,
    #[display("ac_rate")]
    AcRate,
}

impl FromStr for SortColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(SortColumn::Id),
            "difficulty" => Ok(SortColumn::Difficulty),
            "rating" => Ok(SortColumn::Rating),
            "ac_rate" => Ok(SortColumn::AcRate),
            other => Err(format!("unknown sort column: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub column: SortColumn,
    pub order: SortOrder,
}

/// Which filter controls a source supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub difficulty: bool,
    pub tags: bool,
    pub rating: bool,
    pub sortable: Vec<SortColumn>,
}

impl Capabilities {
    pub fn of(source: Source) -> Self {
        let (difficulty, tags, rating) = match source {
            Source::Leetcode => (true, true, true),
            Source::Atcoder => (false, false, true),
            Source::Codeforces => (false, true, true),
            Source::Luogu => (false, true, false),
        };
        let mut sortable = vec![SortColumn::Id];
        if difficulty {
            sortable.push(SortColumn::Difficulty);
        }
        if rating {
            sortable.push(SortColumn::Rating);
        }
        if source == Source::Leetcode {
            sortable.push(SortColumn::AcRate);
        }
        Self {
            difficulty,
            tags,
            rating,
            sortable,
        }
    }
}

/// Filter, sort and pagination state of the problem browser.
///
/// The browser URL carries this whole struct; fields equal to their default
/// are left out of it. Text fields are stored trimmed, which the setters
/// below keep true, so any query survives a trip through the URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub source: Source,
    pub page: u32,
    pub per_page: u32,
    pub search: String,
    pub difficulty: String,
    pub tags: BTreeSet<String>,
    pub tag_mode: TagMode,
    pub sort: Option<Sort>,
    pub rating_min: Option<f64>,
    pub rating_max: Option<f64>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::for_source(Source::default())
    }
}

impl ListQuery {
    /// Everything at its default except the source.
    pub fn for_source(source: Source) -> Self {
        Self {
            source,
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
            search: String::new(),
            difficulty: String::new(),
            tags: BTreeSet::new(),
            tag_mode: TagMode::Any,
            sort: None,
            rating_min: None,
            rating_max: None,
        }
    }

    /// Browser query string, without the leading `?`.
    pub fn to_url_query(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        if self.source != Source::default() {
            out.append_pair("source", self.source.as_str());
        }
        if self.page != DEFAULT_PAGE {
            out.append_pair("page", &self.page.to_string());
        }
        self.append_filters(&mut out, true);
        out.finish()
    }

    /// Inverse of [`ListQuery::to_url_query`]. Unknown keys are ignored and
    /// unparsable values fall back to their default.
    pub fn from_url_query(query: &str) -> Self {
        let mut parsed = Self::default();
        let mut sort_by = None;
        let mut sort_order = None;

        for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            let value = value.trim();
            match key.as_ref() {
                "source" => parsed.source = value.parse().unwrap_or_default(),
                "page" => {
                    parsed.page = value
                        .parse()
                        .ok()
                        .filter(|page| *page >= 1)
                        .unwrap_or(DEFAULT_PAGE)
                }
                "per_page" => {
                    parsed.per_page = value
                        .parse()
                        .ok()
                        .filter(|n| *n >= 1)
                        .unwrap_or(DEFAULT_PER_PAGE)
                }
                "search" => parsed.search = value.to_string(),
                "difficulty" => parsed.difficulty = value.to_string(),
                "tags" => {
                    parsed.tags = value
                        .split(',')
                        .map(str::trim)
                        .filter(|tag| !tag.is_empty())
                        .map(str::to_string)
                        .collect()
                }
                "tag_mode" => parsed.tag_mode = value.parse().unwrap_or_default(),
                "sort_by" => sort_by = value.parse::<SortColumn>().ok(),
                "sort_order" => sort_order = value.parse::<SortOrder>().ok(),
                "rating_min" => parsed.rating_min = parse_rating(value),
                "rating_max" => parsed.rating_max = parse_rating(value),
                _ => {}
            }
        }

        parsed.sort = sort_by.map(|column| Sort {
            column,
            order: sort_order.unwrap_or(SortOrder::Asc),
        });
        parsed
    }

    /// Query string for `GET /problems/{source}`. Page and page size are
    /// always sent.
    pub fn api_query(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        out.append_pair("page", &self.page.to_string());
        out.append_pair("per_page", &self.per_page.to_string());
        self.append_filters(&mut out, false);
        out.finish()
    }

    fn append_filters(&self, out: &mut form_urlencoded::Serializer<'_, String>, url: bool) {
        if !self.search.is_empty() {
            out.append_pair("search", &self.search);
        }
        if !self.difficulty.is_empty() {
            out.append_pair("difficulty", &self.difficulty);
        }
        if url && self.per_page != DEFAULT_PER_PAGE {
            out.append_pair("per_page", &self.per_page.to_string());
        }
        if let Some(sort) = self.sort {
            out.append_pair("sort_by", &sort.column.to_string());
            out.append_pair("sort_order", &sort.order.to_string());
        }
        if !self.tags.is_empty() {
            let joined = self.tags.iter().map(String::as_str).collect::<Vec<_>>().join(",");
            out.append_pair("tags", &joined);
            if self.tag_mode != TagMode::Any {
                out.append_pair("tag_mode", &self.tag_mode.to_string());
            }
        } else if url && self.tag_mode != TagMode::Any {
            out.append_pair("tag_mode", &self.tag_mode.to_string());
        }
        if let Some(min) = self.rating_min {
            out.append_pair("rating_min", &min.to_string());
        }
        if let Some(max) = self.rating_max {
            out.append_pair("rating_max", &max.to_string());
        }
    }

    pub fn set_search(&mut self, text: &str) {
        self.search = text.trim().to_string();
    }

    pub fn set_difficulty(&mut self, difficulty: &str) {
        self.difficulty = difficulty.trim().to_string();
    }

    /// Adds `tag` if absent, removes it otherwise.
    pub fn toggle_tag(&mut self, tag: &str) {
        let Some(tag) = clean_tag(tag) else {
            return;
        };
        if !self.tags.remove(tag) {
            self.tags.insert(tag.to_string());
        }
    }

    pub fn add_tag(&mut self, tag: &str) {
        if let Some(tag) = clean_tag(tag) {
            self.tags.insert(tag.to_string());
        }
    }

    /// Next sort state after a click on `column`'s header.
    pub fn next_sort(&self, column: SortColumn) -> Option<Sort> {
        match self.sort {
            Some(Sort {
                column: current,
                order: SortOrder::Asc,
            }) if current == column => Some(Sort {
                column,
                order: SortOrder::Desc,
            }),
            Some(Sort {
                column: current,
                order: SortOrder::Desc,
            }) if current == column => None,
            _ => Some(Sort {
                column,
                order: SortOrder::Asc,
            }),
        }
    }
}

/// Tags travel comma-joined, so blank tags and tags containing a comma are
/// dropped.
fn clean_tag(tag: &str) -> Option<&str> {
    let tag = tag.trim();
    (!tag.is_empty() && !tag.contains(',')).then_some(tag)
}

/// A rating bound as typed or as found in a URL. Anything that is not a
/// finite number means "no bound".
pub fn parse_rating(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|r| r.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn default_query_serializes_to_nothing() {
        assert_eq!(ListQuery::default().to_url_query(), "");
        assert_eq!(ListQuery::from_url_query(""), ListQuery::default());
    }

    #[test]
    fn populated_query_round_trips_through_the_url() {
        let query = ListQuery {
            source: Source::Codeforces,
            page: 4,
            per_page: 20,
            search: "two sum & more".to_string(),
            difficulty: "Hard".to_string(),
            tags: tags(&["dp", "graphs"]),
            tag_mode: TagMode::All,
            sort: Some(Sort {
                column: SortColumn::Rating,
                order: SortOrder::Desc,
            }),
            rating_min: Some(1200.0),
            rating_max: Some(1900.0),
        };

        let url = query.to_url_query();
        assert_eq!(
            url,
            "source=codeforces&page=4&search=two+sum+%26+more&difficulty=Hard&per_page=20\
             &sort_by=rating&sort_order=desc&tags=dp%2Cgraphs&tag_mode=all\
             &rating_min=1200&rating_max=1900"
        );
        assert_eq!(ListQuery::from_url_query(&url), query);
    }

    #[test]
    fn tag_mode_without_tags_still_round_trips() {
        let query = ListQuery {
            tag_mode: TagMode::All,
            ..ListQuery::default()
        };
        assert_eq!(query.to_url_query(), "tag_mode=all");
        assert_eq!(ListQuery::from_url_query("tag_mode=all"), query);
    }

    #[test]
    fn garbage_values_fall_back_to_defaults() {
        let parsed = ListQuery::from_url_query(
            "?source=topcoder&page=0&per_page=x&tag_mode=some&sort_by=title&rating_min=high&tags=,dp,,",
        );
        assert_eq!(
            parsed,
            ListQuery {
                tags: tags(&["dp"]),
                ..ListQuery::default()
            }
        );
    }

    #[test]
    fn fractional_rating_bounds_are_kept() {
        let parsed = ListQuery::from_url_query("rating_min=1850.5&rating_max=2000");
        assert_eq!(parsed.rating_min, Some(1850.5));
        assert_eq!(parsed.rating_max, Some(2000.0));
        assert_eq!(parsed.to_url_query(), "rating_min=1850.5&rating_max=2000");
        assert_eq!(
            parsed.api_query(),
            "page=1&per_page=50&rating_min=1850.5&rating_max=2000"
        );

        assert_eq!(parse_rating(" 1400.25 "), Some(1400.25));
        assert_eq!(parse_rating("NaN"), None);
        assert_eq!(parse_rating("inf"), None);
        assert_eq!(parse_rating(""), None);
    }

    #[test]
    fn setters_keep_text_fields_trimmed() {
        let mut query = ListQuery::default();
        query.set_search("  two sum ");
        query.set_difficulty(" Easy");
        query.toggle_tag("dp ");
        query.toggle_tag("   ");
        query.toggle_tag("a,b");
        query.add_tag(" graphs");
        assert_eq!(query.search, "two sum");
        assert_eq!(query.difficulty, "Easy");
        assert_eq!(query.tags, tags(&["dp", "graphs"]));
        assert_eq!(ListQuery::from_url_query(&query.to_url_query()), query);

        query.toggle_tag(" dp");
        assert_eq!(query.tags, tags(&["graphs"]));
    }

    #[test]
    fn every_built_query_round_trips() {
        let searches = ["", "  two sum ", "a&b=c", "100%"];
        let difficulties = ["", " Easy", "Hard "];
        let tag_sets: [&[&str]; 4] = [&[], &["dp "], &[" math", "greedy", " "], &["a,b"]];
        let ratings = [None, Some("1200"), Some("1850.5"), Some("-3"), Some("x")];
        let sorts = [
            None,
            Some(Sort {
                column: SortColumn::AcRate,
                order: SortOrder::Desc,
            }),
            Some(Sort {
                column: SortColumn::Id,
                order: SortOrder::Asc,
            }),
        ];

        let mut checked = 0;
        for (i, source) in Source::ALL.iter().enumerate() {
            for search in searches {
                for difficulty in difficulties {
                    for tag_set in tag_sets {
                        for (j, rating) in ratings.iter().enumerate() {
                            let mut query = ListQuery::for_source(*source);
                            query.page = 1 + (i + j) as u32;
                            query.per_page = if j % 2 == 0 { 50 } else { 20 };
                            query.set_search(search);
                            query.set_difficulty(difficulty);
                            for tag in tag_set {
                                query.toggle_tag(tag);
                            }
                            query.tag_mode = if j % 2 == 0 { TagMode::Any } else { TagMode::All };
                            query.sort = sorts[(i + j) % sorts.len()];
                            query.rating_min = rating.and_then(parse_rating);
                            query.rating_max = ratings[(j + 1) % ratings.len()].and_then(parse_rating);

                            let url = query.to_url_query();
                            assert_eq!(ListQuery::from_url_query(&url), query, "url: {url}");
                            checked += 1;
                        }
                    }
                }
            }
        }
        assert_eq!(checked, Source::ALL.len() * 4 * 3 * 4 * 5);
    }

    #[test]
    fn sort_order_defaults_to_ascending() {
        let parsed = ListQuery::from_url_query("sort_by=id");
        assert_eq!(
            parsed.sort,
            Some(Sort {
                column: SortColumn::Id,
                order: SortOrder::Asc,
            })
        );
        assert_eq!(ListQuery::from_url_query("sort_order=desc").sort, None);
    }

    #[test]
    fn api_query_always_carries_paging() {
        let query = ListQuery {
            tags: tags(&["math"]),
            ..ListQuery::for_source(Source::Atcoder)
        };
        assert_eq!(query.api_query(), "page=1&per_page=50&tags=math");
    }

    #[test]
    fn header_clicks_cycle_sort_state() {
        let mut query = ListQuery::default();
        let mut seen = Vec::new();
        for _ in 0..3 {
            query.sort = query.next_sort(SortColumn::Rating);
            seen.push(query.sort.map(|s| s.order));
        }
        assert_eq!(seen, vec![Some(SortOrder::Asc), Some(SortOrder::Desc), None]);

        query.sort = query.next_sort(SortColumn::Rating);
        let switched = query.next_sort(SortColumn::Id);
        assert_eq!(
            switched,
            Some(Sort {
                column: SortColumn::Id,
                order: SortOrder::Asc,
            })
        );
    }

    #[test]
    fn capabilities_follow_the_source() {
        assert!(Capabilities::of(Source::Leetcode).difficulty);
        assert!(!Capabilities::of(Source::Atcoder).tags);
        assert!(!Capabilities::of(Source::Luogu).rating);
        assert_eq!(
            Capabilities::of(Source::Codeforces).sortable,
            vec![SortColumn::Id, SortColumn::Rating]
        );
    }
}
