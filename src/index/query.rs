//! Query construction for the search-index engine
//!
//! Queries travel as plain HTTP GET parameters: `q`, one `fq` per
//! constraint in `field:"value"` form, facet switches, and pagination.

use indexmap::IndexMap;

use crate::models::Record;

/// Input to one index query
#[derive(Debug, Clone)]
pub struct QueryInput {
    /// Free-text query, `*:*` when unconstrained
    pub query: String,

    /// Exact-match constraints, one `fq` each
    pub constraints: Vec<(String, String)>,

    /// Facet dimensions to compute distributions for
    pub facets: Vec<String>,

    /// Pagination offset
    pub start: usize,

    /// Page size
    pub rows: usize,

    /// Shard addresses for a server-side distributed query; empty means
    /// query the local index only
    pub shards: Vec<String>,
}

impl Default for QueryInput {
    fn default() -> Self {
        Self {
            query: "*:*".to_string(),
            constraints: Vec::new(),
            facets: Vec::new(),
            start: 0,
            rows: 10,
            shards: Vec::new(),
        }
    }
}

impl QueryInput {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Add an exact-match constraint
    pub fn constrain(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints.push((field.into(), value.into()));
        self
    }

    /// Request a facet distribution for a field
    pub fn facet(mut self, field: impl Into<String>) -> Self {
        self.facets.push(field.into());
        self
    }

    pub fn paginate(mut self, start: usize, rows: usize) -> Self {
        self.start = start;
        self.rows = rows;
        self
    }

    /// Distribute across the given shard addresses
    pub fn with_shards(mut self, shards: Vec<String>) -> Self {
        self.shards = shards;
        self
    }

    /// Whether a constraint is already fixed for the given facet field
    pub fn is_constrained(&self, field: &str) -> bool {
        self.constraints.iter().any(|(f, _)| f == field)
    }

    /// Faceted fields still needing a full distribution (unconstrained ones)
    pub fn open_facets(&self) -> Vec<&str> {
        self.facets
            .iter()
            .filter(|f| !self.is_constrained(f))
            .map(String::as_str)
            .collect()
    }

    /// Render as HTTP GET parameters
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("q".to_string(), self.query.clone())];

        for (field, value) in &self.constraints {
            params.push(("fq".to_string(), format!("{field}:\"{value}\"")));
        }

        let open = self.open_facets();
        if !open.is_empty() {
            params.push(("facet".to_string(), "true".to_string()));
            for field in open {
                params.push(("facet.field".to_string(), field.to_string()));
            }
        }

        params.push(("start".to_string(), self.start.to_string()));
        params.push(("rows".to_string(), self.rows.to_string()));

        if !self.shards.is_empty() {
            params.push(("shards".to_string(), self.shards.join(",")));
        }

        params
    }
}

/// One facet option: a value and the number of records carrying it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetOption {
    pub value: String,
    pub count: u64,
}

/// Result of one index query
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Total matching records across the queried shard set
    pub num_found: u64,

    /// Pagination offset echoed by the engine
    pub start: u64,

    /// Records on this page
    pub records: Vec<Record>,

    /// Facet distributions keyed by field, in response order
    pub facets: IndexMap<String, Vec<FacetOption>>,
}

impl QueryResult {
    /// Fill in synthetic single-option facets for dimensions whose value is
    /// already fixed by a constraint. Re-deriving a full distribution for a
    /// decided dimension would cost a redundant facet query.
    pub fn synthesize_constrained_facets(&mut self, input: &QueryInput) {
        for field in &input.facets {
            if let Some((_, value)) = input.constraints.iter().find(|(f, _)| f == field) {
                self.facets.insert(
                    field.clone(),
                    vec![FacetOption {
                        value: value.clone(),
                        count: 1,
                    }],
                );
            }
        }
    }
}
