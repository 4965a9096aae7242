//! Fuzzy search over the tag index and photo text
//!
//! A query is matched against two corpora:
//! 1. tag strings, plus a lowercase variant with whitespace removed
//! 2. photo titles, owning album titles and photo descriptions
//!
//! A tag hit brings in every photo under that tag, a text hit brings in the
//! one photo. Results are deduplicated by photo id; tag hits rank ahead of
//! text hits and each group is ordered by ascending dissimilarity.

use std::collections::HashSet;
use std::sync::Arc;

use crate::gallery::config_loader::Search;
use crate::gallery::photo::Photo;
use crate::gallery::tag_index::TagIndex;

/// Result of a search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Query missing or shorter than the minimum; callers clear their results.
    NoQuery,
    /// Possibly empty list of matching photos.
    Matches(Vec<Arc<Photo>>),
}

impl SearchOutcome {
    pub fn is_no_query(&self) -> bool {
        matches!(self, SearchOutcome::NoQuery)
    }

    pub fn photos(&self) -> &[Arc<Photo>] {
        match self {
            SearchOutcome::NoQuery => &[],
            SearchOutcome::Matches(photos) => photos,
        }
    }
}

/// A corpus entry that matched, with its dissimilarity in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub index: usize,
    pub score: f64,
}

/// Approximate string matching used by the search engine.
pub trait FuzzyMatcher: Send + Sync {
    /// 0.0 is a perfect match, 1.0 is unrelated.
    fn dissimilarity(&self, candidate: &str, query: &str) -> f64;

    /// Corpus entries scoring strictly below `threshold`, best first. Ties
    /// keep corpus order.
    fn rank(&self, corpus: &[&str], query: &str, threshold: f64) -> Vec<Candidate> {
        let mut ranked: Vec<Candidate> = corpus
            .iter()
            .enumerate()
            .map(|(index, text)| Candidate {
                index,
                score: self.dissimilarity(text, query),
            })
            .filter(|c| c.score < threshold)
            .collect();
        ranked.sort_by(|a, b| a.score.total_cmp(&b.score));
        ranked
    }
}

/// Borrowed run of chars that strsim can walk more than once.
#[derive(Clone, Copy)]
struct CharRun<'a>(&'a [char]);

impl<'a> IntoIterator for &CharRun<'a> {
    type Item = &'a char;
    type IntoIter = std::slice::Iter<'a, char>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn edit_distance(a: &[char], b: &[char]) -> usize {
    strsim::generic_levenshtein(&CharRun(a), &CharRun(b))
}

fn lowercase_chars(text: &str) -> Vec<char> {
    text.chars().flat_map(char::to_lowercase).collect()
}

/// Case-insensitive Levenshtein distance between the query and the closest
/// word-aligned window of the candidate, divided by the query length.
///
/// Windows start at the beginning of a word and span the query length plus
/// or minus one character, so a dropped or doubled letter still aligns but
/// a query cannot match across the middle of unrelated words.
#[derive(Debug, Default, Clone, Copy)]
pub struct EditDistanceMatcher;

impl EditDistanceMatcher {
    fn score(candidate: &[char], query: &[char]) -> f64 {
        let query_len = query.len();
        if query_len == 0 || candidate.is_empty() {
            return 1.0;
        }

        let best = if candidate.len() <= query_len + 1 {
            edit_distance(query, candidate)
        } else {
            let widths = [query_len.saturating_sub(1).max(1), query_len, query_len + 1];
            let mut best = usize::MAX;
            for start in word_starts(candidate) {
                for width in widths {
                    let end = (start + width).min(candidate.len());
                    best = best.min(edit_distance(query, &candidate[start..end]));
                    if best == 0 {
                        return 0.0;
                    }
                    if end == candidate.len() {
                        break;
                    }
                }
            }
            best
        };

        (best as f64 / query_len as f64).min(1.0)
    }
}

/// Indices of alphanumeric chars that open a word.
fn word_starts(text: &[char]) -> impl Iterator<Item = usize> + '_ {
    (0..text.len()).filter(move |&i| {
        text[i].is_alphanumeric() && (i == 0 || !text[i - 1].is_alphanumeric())
    })
}

impl FuzzyMatcher for EditDistanceMatcher {
    fn dissimilarity(&self, candidate: &str, query: &str) -> f64 {
        Self::score(&lowercase_chars(candidate), &lowercase_chars(query))
    }

    fn rank(&self, corpus: &[&str], query: &str, threshold: f64) -> Vec<Candidate> {
        let query = lowercase_chars(query);
        let mut ranked: Vec<Candidate> = corpus
            .iter()
            .enumerate()
            .map(|(index, text)| Candidate {
                index,
                score: Self::score(&lowercase_chars(text), &query),
            })
            .filter(|c| c.score < threshold)
            .collect();
        ranked.sort_by(|a, b| a.score.total_cmp(&b.score));
        ranked
    }
}

/// Whitespace-stripped lowercase form used to catch spacing and case variants.
pub fn normalize_tag(tag: &str) -> String {
    tag.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

pub struct SearchEngine<M: FuzzyMatcher = EditDistanceMatcher> {
    matcher: M,
    min_query_len: usize,
    tag_threshold: f64,
    text_threshold: f64,
}

impl SearchEngine<EditDistanceMatcher> {
    pub fn new(config: &Search) -> Self {
        Self::with_matcher(EditDistanceMatcher, config)
    }
}

impl<M: FuzzyMatcher> SearchEngine<M> {
    pub fn with_matcher(matcher: M, config: &Search) -> Self {
        Self {
            matcher,
            min_query_len: config.min_query_len,
            tag_threshold: config.tag_threshold,
            text_threshold: config.text_threshold,
        }
    }

    /// Search `index` and `photos` for `query`.
    pub fn search(&self, query: &str, index: &TagIndex, photos: &[Arc<Photo>]) -> SearchOutcome {
        let query = query.trim();
        if query.chars().count() < self.min_query_len {
            return SearchOutcome::NoQuery;
        }

        let mut results = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for tag in self.matching_tags(query, index) {
            for photo in index.lookup(tag) {
                if seen.insert(photo.identifier.as_str()) {
                    results.push(photo.clone());
                }
            }
        }

        for photo in self.matching_photos(query, photos) {
            if seen.insert(photo.identifier.as_str()) {
                results.push(photo.clone());
            }
        }

        SearchOutcome::Matches(results)
    }

    /// Tags whose raw or normalized form scores below the tag threshold, best first.
    fn matching_tags<'a>(&self, query: &str, index: &'a TagIndex) -> Vec<&'a str> {
        let tags = index.all_tags();
        let normalized: Vec<String> = tags.iter().map(|t| normalize_tag(t)).collect();

        // Corpus entry i belongs to tag owners[i]
        let mut corpus: Vec<&str> = Vec::with_capacity(tags.len() * 2);
        let mut owners: Vec<usize> = Vec::with_capacity(tags.len() * 2);
        for (i, tag) in tags.iter().enumerate() {
            corpus.push(tag);
            owners.push(i);
            if normalized[i] != *tag {
                corpus.push(&normalized[i]);
                owners.push(i);
            }
        }

        best_per_owner(self.matcher.rank(&corpus, query, self.tag_threshold), &owners)
            .into_iter()
            .map(|owner| tags[owner])
            .collect()
    }

    /// Photos whose title, album title or description scores below the text threshold.
    fn matching_photos<'a>(&self, query: &str, photos: &'a [Arc<Photo>]) -> Vec<&'a Arc<Photo>> {
        let mut corpus: Vec<&str> = Vec::with_capacity(photos.len() * 3);
        let mut owners: Vec<usize> = Vec::with_capacity(photos.len() * 3);
        for (i, photo) in photos.iter().enumerate() {
            for text in [
                photo.title.as_str(),
                photo.owning_album.title.as_str(),
                photo.description.as_str(),
            ] {
                if !text.is_empty() {
                    corpus.push(text);
                    owners.push(i);
                }
            }
        }

        best_per_owner(self.matcher.rank(&corpus, query, self.text_threshold), &owners)
            .into_iter()
            .map(|owner| &photos[owner])
            .collect()
    }
}

/// Collapse ranked candidates onto their owners, keeping each owner's first
/// (best) appearance.
fn best_per_owner(ranked: Vec<Candidate>, owners: &[usize]) -> Vec<usize> {
    let mut placed = HashSet::new();
    ranked
        .into_iter()
        .map(|c| owners[c.index])
        .filter(|owner| placed.insert(*owner))
        .collect()
}
