//! List queries and their in-process evaluation.
//!
//! A [`Query`] filters, orders and windows the records of one class. The
//! in-memory and file backends evaluate it with [`apply_query`]; SQL
//! backends translate it instead but must return the same rows.
//!
//! ## Search Semantics
//!
//! A record matches a search when **any** of the searched fields satisfies
//! its term. Within one field, an [`SearchTerm::AllOf`] list requires every
//! predicate to hold.

use entiorm_codec::{Record, Value};
use entiorm_meta::ID_FIELD;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Comparison applied by a [`Predicate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateMode {
    /// Field equals the value.
    Equals,
    /// Field differs from the value.
    Not,
    /// Text field contains the text value.
    Like,
    /// Numeric field is below the value.
    SmallerThan,
    /// Numeric field is above the value.
    GreaterThan,
}

/// A single field comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// The comparison.
    pub mode: PredicateMode,
    /// The operand.
    pub value: Value,
}

impl Predicate {
    /// Creates a predicate.
    pub fn new(mode: PredicateMode, value: impl Into<Value>) -> Self {
        Self {
            mode,
            value: value.into(),
        }
    }

    /// `field == value`.
    pub fn equals(value: impl Into<Value>) -> Self {
        Self::new(PredicateMode::Equals, value)
    }

    /// `field != value`.
    pub fn not(value: impl Into<Value>) -> Self {
        Self::new(PredicateMode::Not, value)
    }

    /// Substring test on text.
    pub fn like(value: impl Into<Value>) -> Self {
        Self::new(PredicateMode::Like, value)
    }

    /// `field < value` on numbers.
    pub fn smaller_than(value: impl Into<Value>) -> Self {
        Self::new(PredicateMode::SmallerThan, value)
    }

    /// `field > value` on numbers.
    pub fn greater_than(value: impl Into<Value>) -> Self {
        Self::new(PredicateMode::GreaterThan, value)
    }

    /// Evaluates the predicate against a field value. A missing field never
    /// matches.
    pub fn holds(&self, actual: Option<&Value>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self.mode {
            PredicateMode::Equals => values_equal(actual, &self.value),
            PredicateMode::Not => !values_equal(actual, &self.value),
            PredicateMode::Like => match (actual, &self.value) {
                (Value::Text(haystack), Value::Text(needle)) => haystack.contains(needle.as_str()),
                _ => false,
            },
            PredicateMode::SmallerThan => numeric_order(actual, &self.value) == Some(Ordering::Less),
            PredicateMode::GreaterThan => {
                numeric_order(actual, &self.value) == Some(Ordering::Greater)
            }
        }
    }
}

/// Equality used by searches: numbers compare by value across integer and
/// float, everything else structurally.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    a.same_value(b)
}

fn numeric_order(a: &Value, b: &Value) -> Option<Ordering> {
    if a.is_number() && b.is_number() {
        a.compare(b)
    } else {
        None
    }
}

/// What a searched field must satisfy.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchTerm {
    /// Plain equality.
    Exact(Value),
    /// One predicate.
    Predicate(Predicate),
    /// Every predicate must hold.
    AllOf(Vec<Predicate>),
}

impl SearchTerm {
    /// Evaluates the term against a field value.
    pub fn holds(&self, actual: Option<&Value>) -> bool {
        match self {
            SearchTerm::Exact(expected) => actual.is_some_and(|v| values_equal(v, expected)),
            SearchTerm::Predicate(predicate) => predicate.holds(actual),
            SearchTerm::AllOf(predicates) => predicates.iter().all(|p| p.holds(actual)),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// One ordering instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Field to order by.
    pub key: String,
    /// Direction.
    pub direction: Direction,
}

impl Order {
    /// Creates an ordering instruction.
    pub fn new(key: impl Into<String>, direction: Direction) -> Self {
        Self {
            key: key.into(),
            direction,
        }
    }
}

/// A list query over the records of one class.
///
/// ```
/// use entiorm_storage::{Direction, Predicate, Query};
///
/// let query = Query::new()
///     .where_eq("name", "Bob")
///     .where_all("age", vec![Predicate::greater_than(18), Predicate::smaller_than(65)])
///     .order_by("e_id", Direction::Desc)
///     .limit(10)
///     .offset(20);
/// assert_eq!(query.search.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Field terms; a record matches if any of them holds.
    pub search: BTreeMap<String, SearchTerm>,
    /// Ordering; only the first entry is honored.
    pub order: Vec<Order>,
    /// Maximum number of rows. `Some(0)` always yields no rows.
    pub limit: Option<usize>,
    /// Rows to skip after filtering and ordering.
    pub offset: Option<usize>,
}

impl Query {
    /// A query returning every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a search term for a field, replacing an earlier one.
    #[must_use]
    pub fn search(mut self, field: impl Into<String>, term: SearchTerm) -> Self {
        self.search.insert(field.into(), term);
        self
    }

    /// Adds an exact-match term.
    #[must_use]
    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.search(field, SearchTerm::Exact(value.into()))
    }

    /// Adds a predicate term.
    #[must_use]
    pub fn where_pred(self, field: impl Into<String>, predicate: Predicate) -> Self {
        self.search(field, SearchTerm::Predicate(predicate))
    }

    /// Adds a conjunctive predicate list.
    #[must_use]
    pub fn where_all(self, field: impl Into<String>, predicates: Vec<Predicate>) -> Self {
        self.search(field, SearchTerm::AllOf(predicates))
    }

    /// Appends an ordering instruction.
    #[must_use]
    pub fn order_by(mut self, key: impl Into<String>, direction: Direction) -> Self {
        self.order.push(Order::new(key, direction));
        self
    }

    /// Sets the limit.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the offset.
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The ordering instruction that is honored.
    pub fn primary_order(&self) -> Option<&Order> {
        self.order.first()
    }

    /// Returns true if the record satisfies the search.
    pub fn matches(&self, record: &Record) -> bool {
        self.search.is_empty()
            || self
                .search
                .iter()
                .any(|(field, term)| term.holds(record.get(field)))
    }
}

/// Filters, orders and windows `records`, which must be in the backend's
/// sequence order.
///
/// Ordering by [`ID_FIELD`] keeps (`Asc`) or reverses (`Desc`) the sequence
/// order; ordering by any other field sorts by value, stable for ties.
pub fn apply_query(records: Vec<Record>, query: &Query) -> Vec<Record> {
    if query.limit == Some(0) {
        return Vec::new();
    }

    let mut rows: Vec<Record> = records.into_iter().filter(|r| query.matches(r)).collect();

    if let Some(order) = query.primary_order() {
        if order.key != ID_FIELD {
            rows.sort_by(|a, b| compare_field(a, b, &order.key));
        }
        if order.direction == Direction::Desc {
            rows.reverse();
        }
    }

    let offset = query.offset.unwrap_or(0);
    let rows = rows.into_iter().skip(offset);
    match query.limit {
        Some(limit) => rows.take(limit).collect(),
        None => rows.collect(),
    }
}

fn compare_field(a: &Record, b: &Record, key: &str) -> Ordering {
    match (a.get(key), b.get(key)) {
        (Some(x), Some(y)) => x.compare(y).unwrap_or_else(|| sort_rank(x).cmp(&sort_rank(y))),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Tiebreak for values `Value::compare` cannot order: kinds sort in a fixed
/// sequence and NaN sorts after every other number.
fn sort_rank(value: &Value) -> (u8, bool) {
    let kind = match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Integer(_) | Value::Float(_) => 2,
        Value::Text(_) => 3,
        Value::Bytes(_) => 4,
        Value::Json(_) => 5,
        Value::Timestamp(_) => 6,
    };
    (kind, value.as_number().is_some_and(f64::is_nan))
}

/// First record containing every field of `partial`.
pub fn find_first<'a, I>(records: I, partial: &Record) -> Option<&'a Record>
where
    I: IntoIterator<Item = &'a Record>,
{
    records.into_iter().find(|r| r.contains_all(partial))
}
