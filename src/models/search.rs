use serde::{Deserialize, Serialize};

/// A single normalized search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// Results collected for one query text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResults {
    pub query: String,
    pub results: Vec<SearchResult>,
}

/// Query text -> results, in the order queries were first collected
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sources {
    entries: Vec<QueryResults>,
}

impl Sources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert results for a query. A repeated query keeps its original
    /// position and has its results replaced.
    pub fn insert(&mut self, query: impl Into<String>, results: Vec<SearchResult>) {
        let query = query.into();
        match self.entries.iter_mut().find(|e| e.query == query) {
            Some(entry) => entry.results = results,
            None => self.entries.push(QueryResults { query, results }),
        }
    }

    pub fn get(&self, query: &str) -> Option<&[SearchResult]> {
        self.entries
            .iter()
            .find(|e| e.query == query)
            .map(|e| e.results.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryResults> {
        self.entries.iter()
    }

    /// Number of queries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of results across all queries
    pub fn total_results(&self) -> usize {
        self.entries.iter().map(|e| e.results.len()).sum()
    }
}

/// Search time window understood by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    #[default]
    Day,
    Week,
    Month,
    Year,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Day => "day",
            TimeRange::Week => "week",
            TimeRange::Month => "month",
            TimeRange::Year => "year",
        }
    }
}

/// One entry of the collect stage's query list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Query text; empty queries are skipped
    #[serde(default)]
    pub q: String,
    /// Restrict results to these domains
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_domains: Option<Vec<String>>,
    /// Overrides the aggregator's default time range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
}

impl QuerySpec {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            ..Default::default()
        }
    }

    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_domains = Some(domains.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = Some(time_range);
        self
    }
}

/// Security news queries used when no query file is supplied
pub fn default_queries() -> Vec<QuerySpec> {
    vec![
        QuerySpec::new("latest cybersecurity news")
            .with_domains(["thehackernews.com", "bleepingcomputer.com"]),
        QuerySpec::new("latest vulnerability reports")
            .with_domains(["krebsonsecurity.com", "darkreading.com"]),
        QuerySpec::new("data breach notifications")
            .with_domains(["securityweek.com", "infosecurity-magazine.com"]),
        QuerySpec::new("malware trends").with_domains([
            "crowdstrike.com/blog",
            "paloaltonetworks.com/blog",
            "mandiant.com/resources/blog",
        ]),
        QuerySpec::new("zero-day exploits")
            .with_domains(["zerodayinitiative.com/blog", "threatpost.com"]),
    ]
}
