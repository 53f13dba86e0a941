// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};

use crate::ErrorKind;

mod dsl;
mod dump;
mod serialize;
mod sql;
mod tokenizer;
mod value;

pub use serialize::{SKIP_JOIN_QUERIES, SKIP_LIMIT_OFFSET, SKIP_MERGE_QUERIES};
pub use value::Value;

/// Sentinel limit meaning "return every matching document".
pub const UNLIMITED: u64 = u64::MAX;

/// How consecutive WHERE conjuncts (and ON conditions) combine.
///
/// The numeric values are stable wire constants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpType {
    #[default]
    And = 0,
    Or = 1,
    Not = 2,
}

impl OpType {
    pub(crate) fn to_wire(self) -> u64 {
        self as u64
    }

    pub(crate) fn from_wire(v: u64) -> crate::Result<Self> {
        match v {
            0 => Ok(OpType::And),
            1 => Ok(OpType::Or),
            2 => Ok(OpType::Not),
            _ => Err(ErrorKind::Wire.with_message(format!("unknown operation code {v}"))),
        }
    }
}

/// Comparison applied by a single WHERE predicate or ON condition.
///
/// The numeric values are stable wire constants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    /// The field holds any non-null value.
    #[default]
    Any = 0,
    Eq = 1,
    Lt = 2,
    Le = 3,
    Gt = 4,
    Ge = 5,
    /// The field lies within a two-ended range.
    Range = 6,
    /// The field equals one of the listed values.
    Set = 7,
    /// The (array) field contains every listed value.
    AllSet = 8,
    /// The field is null or absent.
    Empty = 9,
    Like = 10,
}

impl Condition {
    pub(crate) fn to_wire(self) -> u64 {
        self as u64
    }

    pub(crate) fn from_wire(v: u64) -> crate::Result<Self> {
        match v {
            0 => Ok(Condition::Any),
            1 => Ok(Condition::Eq),
            2 => Ok(Condition::Lt),
            3 => Ok(Condition::Le),
            4 => Ok(Condition::Gt),
            5 => Ok(Condition::Ge),
            6 => Ok(Condition::Range),
            7 => Ok(Condition::Set),
            8 => Ok(Condition::AllSet),
            9 => Ok(Condition::Empty),
            10 => Ok(Condition::Like),
            _ => Err(ErrorKind::Wire.with_message(format!("unknown condition code {v}"))),
        }
    }

    /// The SQL spelling of the condition, as printed between a field and its values.
    pub fn as_sql(self) -> &'static str {
        match self {
            Condition::Any => "IS NOT NULL",
            Condition::Eq => "=",
            Condition::Lt => "<",
            Condition::Le => "<=",
            Condition::Gt => ">",
            Condition::Ge => ">=",
            Condition::Range => "RANGE",
            Condition::Set => "IN",
            Condition::AllSet => "ALLSET",
            Condition::Empty => "IS NULL",
            Condition::Like => "LIKE",
        }
    }
}

/// Aggregation applied to a single field of the result set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateKind {
    Avg = 0,
    Sum = 1,
}

impl AggregateKind {
    pub(crate) fn to_wire(self) -> u64 {
        self as u64
    }

    pub(crate) fn from_wire(v: u64) -> crate::Result<Self> {
        match v {
            0 => Ok(AggregateKind::Avg),
            1 => Ok(AggregateKind::Sum),
            _ => Err(ErrorKind::Wire.with_message(format!("unknown aggregation code {v}"))),
        }
    }
}

/// How a child query attaches to its parent. `None` marks a root query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    #[default]
    None = -1,
    LeftJoin = 0,
    InnerJoin = 1,
    OrInnerJoin = 2,
    Merge = 3,
}

impl JoinType {
    pub(crate) fn to_wire(self) -> u64 {
        match self {
            // A root query never reaches the wire with its join type; children always carry one.
            JoinType::None | JoinType::LeftJoin => 0,
            JoinType::InnerJoin => 1,
            JoinType::OrInnerJoin => 2,
            JoinType::Merge => 3,
        }
    }

    pub(crate) fn from_wire(v: u64) -> crate::Result<Self> {
        match v {
            0 => Ok(JoinType::LeftJoin),
            1 => Ok(JoinType::InnerJoin),
            2 => Ok(JoinType::OrInnerJoin),
            3 => Ok(JoinType::Merge),
            _ => Err(ErrorKind::Wire.with_message(format!("unknown join type code {v}"))),
        }
    }

    /// The SQL keyword form of the join type.
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinType::InnerJoin => "INNER JOIN",
            JoinType::OrInnerJoin => "OR INNER JOIN",
            JoinType::LeftJoin => "LEFT JOIN",
            JoinType::Merge => "MERGE",
            JoinType::None => "<unknown>",
        }
    }
}

/// Whether the engine computes the total match count independently of the limit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalcTotalMode {
    #[default]
    None = 0,
    Approximate = 1,
    Accurate = 2,
}

impl CalcTotalMode {
    pub(crate) fn to_wire(self) -> u64 {
        self as u64
    }

    pub(crate) fn from_wire(v: u64) -> crate::Result<Self> {
        match v {
            0 => Ok(CalcTotalMode::None),
            1 => Ok(CalcTotalMode::Approximate),
            2 => Ok(CalcTotalMode::Accurate),
            _ => Err(ErrorKind::Wire.with_message(format!("unknown total mode code {v}"))),
        }
    }
}

/// One predicate of the WHERE clause.
///
/// A distinct entry is a projection marker rather than a predicate: `distinct` is set,
/// `condition` is [`Condition::Any`] and `values` is empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryEntry {
    #[serde(skip_serializing_if = "is_and")]
    pub op: OpType,
    pub field: String,
    pub condition: Condition,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
    #[serde(skip_serializing_if = "is_false")]
    pub distinct: bool,
}

/// One aggregation requested by the projection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateEntry {
    pub field: String,
    pub kind: AggregateKind,
}

/// One equation of a JOIN's ON clause, stored on the child query.
///
/// `left_field` belongs to the parent namespace, `right_field` to the child's.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinCondition {
    #[serde(default, skip_serializing_if = "is_and")]
    pub op: OpType,
    pub condition: Condition,
    pub left_field: String,
    pub right_field: String,
}

/// A structured query over a namespace of documents.
///
/// A query is a tree: joined and merged sub-queries are themselves queries, owned by their
/// parent. The same tree round-trips through four encodings (SQL text via parse and print,
/// the binary wire format, and the JSON DSL), and equality covers exactly the observable
/// model, so round-trip identity is a meaningful check.
///
/// Queries can also be assembled programmatically:
///
/// ```
/// use docdb_query_engine::query::{Condition, OpType, Query, Value};
///
/// let q = Query::new("items")
///     .where_cond(OpType::And, "price", Condition::Gt, vec![Value::Int(100)])
///     .sorted("price", true)
///     .with_limit(10);
/// assert_eq!(q.to_sql(), "SELECT * FROM items WHERE price > 100 ORDER BY price DESC LIMIT 10");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Query {
    /// Target namespace (collection). Empty only for describe-form queries.
    pub namespace: String,

    /// The WHERE predicates, in source order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<QueryEntry>,

    /// Aggregations requested by the projection.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aggregations: Vec<AggregateEntry>,

    /// ON conditions linking this query to its parent; populated only on join children.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub join_entries: Vec<JoinCondition>,

    /// Joined child queries, in source order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub join_queries: Vec<Query>,

    /// Merged child queries, in source order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub merge_queries: Vec<Query>,

    /// Sort field; empty means unsorted.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sort_by: String,

    #[serde(skip_serializing_if = "is_false")]
    pub sort_descending: bool,

    /// Explicit value order overriding the natural sort of `sort_by`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub forced_sort_order: Vec<Value>,

    /// Projection fields; empty means `*`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub select_filter: Vec<String>,

    /// Free-form projection function expressions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub select_functions: Vec<String>,

    #[serde(skip_serializing_if = "is_zero")]
    pub offset: u64,

    /// Maximum number of documents to return; [`UNLIMITED`] by default.
    /// `0` together with `calc_total == Accurate` marks an aggregation-only query.
    #[serde(skip_serializing_if = "is_unlimited")]
    pub limit: u64,

    #[serde(skip_serializing_if = "is_no_total")]
    pub calc_total: CalcTotalMode,

    /// Set on `DESCRIBE` queries; `namespaces` lists the targets (empty means all).
    #[serde(skip_serializing_if = "is_false")]
    pub describe: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,

    #[serde(skip_serializing_if = "is_zero")]
    pub debug_level: u64,

    /// How this query attaches to its parent; meaningful only on children.
    #[serde(skip_serializing_if = "is_join_none")]
    pub join_type: JoinType,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            entries: Vec::new(),
            aggregations: Vec::new(),
            join_entries: Vec::new(),
            join_queries: Vec::new(),
            merge_queries: Vec::new(),
            sort_by: String::new(),
            sort_descending: false,
            forced_sort_order: Vec::new(),
            select_filter: Vec::new(),
            select_functions: Vec::new(),
            offset: 0,
            limit: UNLIMITED,
            calc_total: CalcTotalMode::None,
            describe: false,
            namespaces: Vec::new(),
            debug_level: 0,
            join_type: JoinType::None,
        }
    }
}

impl Query {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// Appends a WHERE predicate.
    pub fn where_cond(
        mut self,
        op: OpType,
        field: impl Into<String>,
        condition: Condition,
        values: Vec<Value>,
    ) -> Self {
        self.entries.push(QueryEntry {
            op,
            field: field.into(),
            condition,
            values,
            distinct: false,
        });
        self
    }

    /// Marks the field for distinct projection.
    pub fn distinct_on(mut self, field: impl Into<String>) -> Self {
        self.entries.push(QueryEntry {
            op: OpType::And,
            field: field.into(),
            condition: Condition::Any,
            values: Vec::new(),
            distinct: true,
        });
        self
    }

    pub fn aggregate(mut self, kind: AggregateKind, field: impl Into<String>) -> Self {
        self.aggregations.push(AggregateEntry {
            field: field.into(),
            kind,
        });
        self
    }

    pub fn select_field(mut self, field: impl Into<String>) -> Self {
        self.select_filter.push(field.into());
        self
    }

    pub fn select_function(mut self, expr: impl Into<String>) -> Self {
        self.select_functions.push(expr.into());
        self
    }

    pub fn sorted(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.sort_by = field.into();
        self.sort_descending = descending;
        self
    }

    /// Sorts by the field with an explicit value order, FIELD(...)-style.
    pub fn sorted_by_order(
        mut self,
        field: impl Into<String>,
        descending: bool,
        order: Vec<Value>,
    ) -> Self {
        self.sort_by = field.into();
        self.sort_descending = descending;
        self.forced_sort_order = order;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_total_mode(mut self, mode: CalcTotalMode) -> Self {
        self.calc_total = mode;
        self
    }

    pub fn with_debug_level(mut self, level: u64) -> Self {
        self.debug_level = level;
        self
    }

    /// Appends an ON condition; call on the child query before attaching it to a parent.
    pub fn on(
        mut self,
        op: OpType,
        condition: Condition,
        left_field: impl Into<String>,
        right_field: impl Into<String>,
    ) -> Self {
        self.join_entries.push(JoinCondition {
            op,
            condition,
            left_field: left_field.into(),
            right_field: right_field.into(),
        });
        self
    }

    pub fn inner_join(self, child: Query) -> Self {
        self.join(JoinType::InnerJoin, child)
    }

    pub fn or_inner_join(self, child: Query) -> Self {
        self.join(JoinType::OrInnerJoin, child)
    }

    pub fn left_join(self, child: Query) -> Self {
        self.join(JoinType::LeftJoin, child)
    }

    pub fn merge(self, child: Query) -> Self {
        self.join(JoinType::Merge, child)
    }

    /// Attaches a child query with the given join type, routing merges separately.
    pub fn join(mut self, join_type: JoinType, mut child: Query) -> Self {
        child.join_type = join_type;
        if join_type == JoinType::Merge {
            self.merge_queries.push(child);
        } else {
            self.join_queries.push(child);
        }
        self
    }
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

fn is_unlimited(v: &u64) -> bool {
    *v == UNLIMITED
}

fn is_and(op: &OpType) -> bool {
    *op == OpType::And
}

fn is_no_total(mode: &CalcTotalMode) -> bool {
    *mode == CalcTotalMode::None
}

fn is_join_none(join_type: &JoinType) -> bool {
    *join_type == JoinType::None
}
