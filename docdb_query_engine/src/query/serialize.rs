// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Binary wire codec for query trees.
//!
//! A serialized query is its namespace followed by tagged clauses, terminated by
//! [`QUERY_END`]. Child queries follow in a flat trailer, each prefixed with its join type;
//! there is no child count, presence is signaled by remaining bytes. Decoding routes
//! `Merge` children into `merge_queries` and every other join type into `join_queries`.

use super::{
    AggregateEntry, AggregateKind, CalcTotalMode, Condition, JoinCondition, JoinType, OpType,
    Query, QueryEntry,
};
use crate::wire::{Reader, Writer};
use crate::ErrorKind;

/// Leaves `QueryLimit`/`QueryOffset` clauses off the wire.
pub const SKIP_LIMIT_OFFSET: u8 = 1 << 0;
/// Leaves joined child queries off the wire.
pub const SKIP_JOIN_QUERIES: u8 = 1 << 1;
/// Leaves merged child queries off the wire.
pub const SKIP_MERGE_QUERIES: u8 = 1 << 2;

const QUERY_CONDITION: u64 = 0;
const QUERY_DISTINCT: u64 = 1;
const QUERY_SORT_INDEX: u64 = 2;
const QUERY_JOIN_ON: u64 = 3;
const QUERY_LIMIT: u64 = 4;
const QUERY_OFFSET: u64 = 5;
const QUERY_REQ_TOTAL: u64 = 6;
const QUERY_DEBUG_LEVEL: u64 = 7;
const QUERY_AGGREGATION: u64 = 8;
const QUERY_SELECT_FILTER: u64 = 9;
const QUERY_SELECT_FUNCTION: u64 = 10;
const QUERY_END: u64 = 11;

impl Query {
    /// Appends the wire form of this query to `wr`. `mode` is a bitset of the
    /// `SKIP_*` flags; pass `0` for the full form.
    pub fn serialize(&self, wr: &mut Writer, mode: u8) {
        wr.put_v_string(&self.namespace);
        self.serialize_clauses(wr, mode);

        if mode & SKIP_JOIN_QUERIES == 0 {
            for child in &self.join_queries {
                wr.put_var_uint(child.join_type.to_wire());
                child.serialize(wr, 0);
            }
        }
        if mode & SKIP_MERGE_QUERIES == 0 {
            for child in &self.merge_queries {
                wr.put_var_uint(child.join_type.to_wire());
                child.serialize(wr, 0);
            }
        }
    }

    /// Serializes into a fresh buffer; see [`Query::serialize`].
    pub fn to_bytes(&self, mode: u8) -> Vec<u8> {
        let mut wr = Writer::new();
        self.serialize(&mut wr, mode);
        wr.into_bytes()
    }

    fn serialize_clauses(&self, wr: &mut Writer, mode: u8) {
        for entry in &self.entries {
            if entry.distinct {
                wr.put_var_uint(QUERY_DISTINCT);
                wr.put_v_string(&entry.field);
            } else {
                wr.put_var_uint(QUERY_CONDITION);
                wr.put_v_string(&entry.field);
                wr.put_var_uint(entry.op.to_wire());
                wr.put_var_uint(entry.condition.to_wire());
                wr.put_var_uint(entry.values.len() as u64);
                for value in &entry.values {
                    wr.put_value(value);
                }
            }
        }

        for agg in &self.aggregations {
            wr.put_var_uint(QUERY_AGGREGATION);
            wr.put_v_string(&agg.field);
            wr.put_var_uint(agg.kind.to_wire());
        }

        if !self.sort_by.is_empty() {
            wr.put_var_uint(QUERY_SORT_INDEX);
            wr.put_v_string(&self.sort_by);
            wr.put_var_uint(u64::from(self.sort_descending));
            wr.put_var_uint(self.forced_sort_order.len() as u64);
            for value in &self.forced_sort_order {
                wr.put_value(value);
            }
        }

        for je in &self.join_entries {
            wr.put_var_uint(QUERY_JOIN_ON);
            wr.put_var_uint(je.op.to_wire());
            wr.put_var_uint(je.condition.to_wire());
            wr.put_v_string(&je.left_field);
            wr.put_v_string(&je.right_field);
        }

        wr.put_var_uint(QUERY_DEBUG_LEVEL);
        wr.put_var_uint(self.debug_level);

        if mode & SKIP_LIMIT_OFFSET == 0 {
            if self.limit != 0 {
                wr.put_var_uint(QUERY_LIMIT);
                wr.put_var_uint(self.limit);
            }
            if self.offset != 0 {
                wr.put_var_uint(QUERY_OFFSET);
                wr.put_var_uint(self.offset);
            }
        }

        if self.calc_total != CalcTotalMode::None {
            wr.put_var_uint(QUERY_REQ_TOTAL);
            wr.put_var_uint(self.calc_total.to_wire());
        }

        for field in &self.select_filter {
            wr.put_var_uint(QUERY_SELECT_FILTER);
            wr.put_v_string(field);
        }

        for expr in &self.select_functions {
            wr.put_var_uint(QUERY_SELECT_FUNCTION);
            wr.put_v_string(expr);
        }

        wr.put_var_uint(QUERY_END);
    }

    /// Decodes a query from the wire form.
    ///
    /// Children found in the trailer inherit the root's debug level. Unknown clause tags
    /// are fatal: the format carries no payload lengths, so a clause that cannot be
    /// understood cannot be skipped either.
    #[tracing::instrument(level = "debug", skip_all, err)]
    pub fn deserialize(rd: &mut Reader) -> crate::Result<Query> {
        let mut query = Query {
            namespace: rd.get_v_string()?,
            ..Query::default()
        };
        query.deserialize_clauses(rd)?;

        while !rd.eof() {
            let join_type = JoinType::from_wire(rd.get_var_uint()?)?;
            let mut child = Query {
                namespace: rd.get_v_string()?,
                ..Query::default()
            };
            child.deserialize_clauses(rd)?;
            child.join_type = join_type;
            child.debug_level = query.debug_level;
            tracing::trace!(namespace = %child.namespace, ?join_type, "decoded child query");
            if join_type == JoinType::Merge {
                query.merge_queries.push(child);
            } else {
                query.join_queries.push(child);
            }
        }
        Ok(query)
    }

    /// Decodes a query from a byte slice; see [`Query::deserialize`].
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Query> {
        Self::deserialize(&mut Reader::new(bytes))
    }

    fn deserialize_clauses(&mut self, rd: &mut Reader) -> crate::Result<()> {
        loop {
            match rd.get_var_uint()? {
                QUERY_CONDITION => {
                    let field = rd.get_v_string()?;
                    let op = OpType::from_wire(rd.get_var_uint()?)?;
                    let condition = Condition::from_wire(rd.get_var_uint()?)?;
                    let count = rd.get_var_uint()? as usize;
                    let mut values = Vec::with_capacity(count.min(64));
                    for _ in 0..count {
                        values.push(rd.get_value()?);
                    }
                    self.entries.push(QueryEntry {
                        op,
                        field,
                        condition,
                        values,
                        distinct: false,
                    });
                }
                QUERY_DISTINCT => {
                    self.entries.push(QueryEntry {
                        op: OpType::And,
                        field: rd.get_v_string()?,
                        condition: Condition::Any,
                        values: Vec::new(),
                        distinct: true,
                    });
                }
                QUERY_AGGREGATION => {
                    self.aggregations.push(AggregateEntry {
                        field: rd.get_v_string()?,
                        kind: AggregateKind::from_wire(rd.get_var_uint()?)?,
                    });
                }
                QUERY_SORT_INDEX => {
                    self.sort_by = rd.get_v_string()?;
                    self.sort_descending = rd.get_var_uint()? != 0;
                    let count = rd.get_var_uint()? as usize;
                    for _ in 0..count {
                        self.forced_sort_order.push(rd.get_value()?);
                    }
                }
                QUERY_JOIN_ON => {
                    let op = OpType::from_wire(rd.get_var_uint()?)?;
                    let condition = Condition::from_wire(rd.get_var_uint()?)?;
                    self.join_entries.push(JoinCondition {
                        op,
                        condition,
                        left_field: rd.get_v_string()?,
                        right_field: rd.get_v_string()?,
                    });
                }
                QUERY_DEBUG_LEVEL => self.debug_level = rd.get_var_uint()?,
                QUERY_LIMIT => self.limit = rd.get_var_uint()?,
                QUERY_OFFSET => self.offset = rd.get_var_uint()?,
                QUERY_REQ_TOTAL => {
                    self.calc_total = CalcTotalMode::from_wire(rd.get_var_uint()?)?;
                }
                QUERY_SELECT_FILTER => self.select_filter.push(rd.get_v_string()?),
                QUERY_SELECT_FUNCTION => self.select_functions.push(rd.get_v_string()?),
                QUERY_END => return Ok(()),
                tag => {
                    return Err(
                        ErrorKind::Wire.with_message(format!("unknown query clause tag {tag}"))
                    )
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{OpType, Value};
    use super::*;

    #[test]
    fn distinct_entries_use_the_short_clause() -> crate::Result<()> {
        let q = Query::new("ns").distinct_on("city");
        let decoded = Query::from_bytes(&q.to_bytes(0))?;
        assert_eq!(decoded.entries.len(), 1);
        assert!(decoded.entries[0].distinct);
        assert_eq!(decoded.entries[0].condition, Condition::Any);
        assert!(decoded.entries[0].values.is_empty());
        Ok(())
    }

    #[test]
    fn unknown_clause_tag_is_fatal() {
        let mut wr = Writer::new();
        wr.put_v_string("ns");
        wr.put_var_uint(200);
        let err = Query::from_bytes(wr.as_slice()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Wire);
        assert!(err.to_string().contains("200"));
    }

    #[test]
    fn truncated_clause_is_fatal() {
        let q = Query::new("ns").where_cond(
            OpType::And,
            "price",
            Condition::Eq,
            vec![Value::Int(1)],
        );
        let bytes = q.to_bytes(0);
        let err = Query::from_bytes(&bytes[..bytes.len() - 2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Wire);
    }

    #[test]
    fn out_of_range_enum_code_is_fatal() {
        let mut wr = Writer::new();
        wr.put_v_string("ns");
        wr.put_var_uint(QUERY_REQ_TOTAL);
        wr.put_var_uint(9);
        let err = Query::from_bytes(wr.as_slice()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Wire);
    }
}
