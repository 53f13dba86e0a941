// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Canonical SQL rendering of a query tree.
//!
//! Printing is a pure function of the tree and never fails; the output re-parses into a
//! semantically equal query (keyword case and whitespace are not preserved, the structure is).

use std::fmt::{self, Display};

use super::{CalcTotalMode, OpType, Query, QueryEntry, UNLIMITED};

impl Query {
    /// Renders the canonical SQL form of the query.
    pub fn to_sql(&self) -> String {
        self.to_string()
    }

    fn fmt_projection(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.aggregations.is_empty() {
            for (i, agg) in self.aggregations.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                let name = match agg.kind {
                    super::AggregateKind::Avg => "AVG",
                    super::AggregateKind::Sum => "SUM",
                };
                write!(f, "{name}({})", agg.field)?;
            }
        } else if !self.select_filter.is_empty() {
            for (i, field) in self.select_filter.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                f.write_str(field)?;
            }
        } else {
            f.write_str("*")?;
        }
        if self.calc_total != CalcTotalMode::None {
            f.write_str(", COUNT(*)")?;
        }
        Ok(())
    }

    fn fmt_where(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.entries.is_empty() {
            return Ok(());
        }
        f.write_str(" WHERE ")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(match entry.op {
                    OpType::Or => " OR ",
                    OpType::Not => " AND NOT ",
                    OpType::And => " AND ",
                })?;
            } else if entry.op == OpType::Not {
                f.write_str("NOT ")?;
            }
            fmt_entry(entry, f)?;
        }
        Ok(())
    }

    fn fmt_joined(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for child in &self.join_queries {
            write!(f, " {}", child.join_type.as_sql())?;
            if child.entries.is_empty() && child.limit == UNLIMITED {
                write!(f, " {} ON ", child.namespace)?;
            } else {
                write!(f, " ({child}) ON ")?;
            }
            if child.join_entries.len() != 1 {
                f.write_str("(")?;
            }
            for (i, je) in child.join_entries.iter().enumerate() {
                if i > 0 {
                    f.write_str(if je.op == OpType::Or { " OR " } else { " AND " })?;
                }
                write!(
                    f,
                    "{}.{} {} {}.{}",
                    child.namespace,
                    je.right_field,
                    je.condition.as_sql(),
                    self.namespace,
                    je.left_field
                )?;
            }
            if child.join_entries.len() != 1 {
                f.write_str(")")?;
            }
        }
        Ok(())
    }

    fn fmt_merged(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for child in &self.merge_queries {
            write!(f, " {}( {child})", child.join_type.as_sql())?;
        }
        Ok(())
    }

    fn fmt_order_by(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.sort_by.is_empty() {
            return Ok(());
        }
        f.write_str(" ORDER BY ")?;
        if self.forced_sort_order.is_empty() {
            f.write_str(&self.sort_by)?;
        } else {
            write!(f, "FIELD({}", self.sort_by)?;
            for value in &self.forced_sort_order {
                f.write_str(", ")?;
                value.write_sql(f)?;
            }
            f.write_str(")")?;
        }
        if self.sort_descending {
            f.write_str(" DESC")?;
        }
        Ok(())
    }
}

fn fmt_entry(entry: &QueryEntry, f: &mut fmt::Formatter) -> fmt::Result {
    use super::Condition;

    f.write_str(&entry.field)?;
    match entry.condition {
        Condition::Empty | Condition::Any => write!(f, " {}", entry.condition.as_sql()),
        Condition::Range | Condition::Set | Condition::AllSet => {
            write!(f, " {}", entry.condition.as_sql())?;
            f.write_str(if entry.condition == Condition::Range { "(" } else { " (" })?;
            for (i, value) in entry.values.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                value.write_sql(f)?;
            }
            f.write_str(")")
        }
        _ => {
            write!(f, " {} ", entry.condition.as_sql())?;
            match entry.values.first() {
                Some(value) => value.write_sql(f),
                // An entry without a value cannot be rendered; print a placeholder
                // rather than failing, the printer is infallible by contract.
                None => f.write_str("''"),
            }
        }
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.describe {
            f.write_str("DESCRIBE ")?;
            if self.namespaces.is_empty() {
                return f.write_str("*");
            }
            for (i, ns) in self.namespaces.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                f.write_str(ns)?;
            }
            return Ok(());
        }

        f.write_str("SELECT ")?;
        self.fmt_projection(f)?;
        write!(f, " FROM {}", self.namespace)?;
        self.fmt_where(f)?;
        self.fmt_joined(f)?;
        self.fmt_merged(f)?;
        self.fmt_order_by(f)?;
        if self.offset != 0 {
            write!(f, " OFFSET {}", self.offset)?;
        }
        if self.limit != UNLIMITED {
            write!(f, " LIMIT {}", self.limit)?;
        }
        Ok(())
    }
}
