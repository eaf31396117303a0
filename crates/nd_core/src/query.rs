//! Composable WHERE clauses for the article listing.
//!
//! A filter is reduced to a fixed set of predicates. Each predicate renders a
//! constant SQL fragment containing only placeholders, while the user's text
//! travels separately in `params`, in placeholder order.

use crate::types::Article;

/// Placeholder and operator flavour of the target database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Postgres,
    Sqlite,
}

impl SqlDialect {
    /// Placeholder for the 1-based bind position `n`.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            SqlDialect::Postgres => format!("${}", n),
            SqlDialect::Sqlite => "?".to_string(),
        }
    }

    fn case_insensitive_like(&self) -> &'static str {
        match self {
            SqlDialect::Postgres => "ILIKE",
            SqlDialect::Sqlite => "LIKE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Case-insensitive substring of title OR author.
    TextSearch(String),
    /// Exact author name.
    AuthorEquals(String),
}

impl Predicate {
    /// Appends this predicate's fragment and binds, numbering placeholders
    /// after the binds already in `params`.
    fn render(&self, dialect: SqlDialect, params: &mut Vec<String>) -> String {
        match self {
            Predicate::TextSearch(needle) => {
                let pattern = like_pattern(needle);
                let like = dialect.case_insensitive_like();
                let title = dialect.placeholder(params.len() + 1);
                let author = dialect.placeholder(params.len() + 2);
                params.push(pattern.clone());
                params.push(pattern);
                format!(
                    "(title {like} {title} ESCAPE '\\' OR author {like} {author} ESCAPE '\\')"
                )
            }
            Predicate::AuthorEquals(name) => {
                let slot = dialect.placeholder(params.len() + 1);
                params.push(name.clone());
                format!("author = {slot}")
            }
        }
    }

    fn matches(&self, article: &Article) -> bool {
        match self {
            Predicate::TextSearch(needle) => {
                let needle = needle.to_lowercase();
                let contains = |field: &Option<String>| {
                    field
                        .as_deref()
                        .map(|value| value.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                };
                contains(&article.title) || contains(&article.author)
            }
            Predicate::AuthorEquals(name) => article.author.as_deref() == Some(name.as_str()),
        }
    }
}

/// Wraps `needle` in `%` wildcards, escaping LIKE metacharacters so the
/// user's text is matched literally.
pub fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Optional search and author filters of the article listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilter {
    search: Option<String>,
    author: Option<String>,
}

impl ArticleFilter {
    /// Blank values count as absent.
    pub fn new(search: Option<String>, author: Option<String>) -> Self {
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Self {
            search: present(search),
            author: present(author),
        }
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_none() && self.author.is_none()
    }

    pub fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::new();
        if let Some(search) = &self.search {
            predicates.push(Predicate::TextSearch(search.clone()));
        }
        if let Some(author) = &self.author {
            predicates.push(Predicate::AuthorEquals(author.clone()));
        }
        predicates
    }

    /// In-process evaluation of the same conjunction the SQL backends run.
    pub fn matches(&self, article: &Article) -> bool {
        self.predicates().iter().all(|p| p.matches(article))
    }
}

/// A rendered WHERE clause and its bind values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhereClause {
    dialect: SqlDialect,
    fragments: Vec<String>,
    params: Vec<String>,
}

impl WhereClause {
    pub fn build(filter: &ArticleFilter, dialect: SqlDialect) -> Self {
        let mut params = Vec::new();
        let fragments = filter
            .predicates()
            .iter()
            .map(|predicate| predicate.render(dialect, &mut params))
            .collect();
        Self {
            dialect,
            fragments,
            params,
        }
    }

    /// `""` when unfiltered, otherwise `" WHERE a AND b"`.
    pub fn sql(&self) -> String {
        if self.fragments.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.fragments.join(" AND "))
        }
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Placeholder for the `k`-th (1-based) bind that follows the filter's own.
    pub fn next_placeholder(&self, k: usize) -> String {
        self.dialect.placeholder(self.params.len() + k)
    }
}
