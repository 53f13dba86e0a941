// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Recursive-descent parser for the restricted SQL dialect.
//!
//! Two top-level forms are accepted:
//!
//! ```sql
//! DESCRIBE ( '*' | name (',' name)* ) [';']
//! SELECT <projection> FROM <namespace> <clause>* [';']
//! ```
//!
//! Keywords match case-insensitively; identifiers keep their case where it is observable
//! (projection fields, sort fields). Join and merge specs re-enter the SELECT parser, so a
//! parsed query is a tree of sub-queries mirroring the SQL nesting.

use std::mem;

use super::tokenizer::{Token, TokenKind, Tokenizer};
use super::{
    AggregateEntry, AggregateKind, CalcTotalMode, Condition, JoinCondition, JoinType, OpType,
    Query, QueryEntry, Value, UNLIMITED,
};
use crate::ErrorKind;

impl Query {
    /// Parses SQL text into a query tree.
    #[tracing::instrument(level = "debug", skip_all, err)]
    pub fn from_sql(input: &str) -> crate::Result<Query> {
        SqlParser::new(input).parse_query()
    }
}

fn condition_from_text(text: &str) -> Option<Condition> {
    match text {
        "=" | "==" | "eq" => Some(Condition::Eq),
        "<" => Some(Condition::Lt),
        "<=" => Some(Condition::Le),
        ">" => Some(Condition::Gt),
        ">=" => Some(Condition::Ge),
        "in" => Some(Condition::Set),
        "range" => Some(Condition::Range),
        "allset" => Some(Condition::AllSet),
        "like" => Some(Condition::Like),
        _ => None,
    }
}

struct SqlParser<'q> {
    tokens: Tokenizer<'q>,

    // Pending operator for the next predicate or join; resets to And once consumed.
    next_op: OpType,
}

impl<'q> SqlParser<'q> {
    fn new(input: &'q str) -> Self {
        Self {
            tokens: Tokenizer::new(input),
            next_op: OpType::And,
        }
    }

    fn parse_query(mut self) -> crate::Result<Query> {
        let mut query = Query::default();
        let tok = self.tokens.next_token();
        if tok.is("describe") {
            self.describe_parse(&mut query)?;
        } else if tok.is("select") {
            self.select_parse(&mut query)?;
        } else {
            return Err(ErrorKind::ParseSql.with_message(format!(
                "Syntax error at or near '{}', {}",
                tok.text,
                self.tokens.where_is()
            )));
        }

        let mut tok = self.tokens.next_token();
        if tok.is(";") {
            tok = self.tokens.next_token();
        }
        if tok.kind != TokenKind::End || !self.tokens.end() {
            return Err(ErrorKind::ParseSql.with_message(format!(
                "Unexpected '{}' in query, {}",
                tok.text,
                self.tokens.where_is()
            )));
        }
        Ok(query)
    }

    fn describe_parse(&mut self, query: &mut Query) -> crate::Result<()> {
        let tok = self.tokens.next_token_keep_case();
        if tok.is("*") {
            // Describe everything; the namespace list stays empty.
        } else if tok.kind == TokenKind::Name {
            query.namespaces.push(tok.into_text());
            while self.tokens.peek_token().is(",") {
                self.tokens.next_token();
                let tok = self.tokens.next_token_keep_case();
                if tok.kind != TokenKind::Name {
                    return Err(ErrorKind::ParseSql.with_message(format!(
                        "Expected namespace name, but found '{}' in query, {}",
                        tok.text,
                        self.tokens.where_is()
                    )));
                }
                query.namespaces.push(tok.into_text());
            }
        } else {
            return Err(ErrorKind::ParseSql.with_message(format!(
                "Expected namespace name or '*', but found '{}' in query, {}",
                tok.text,
                self.tokens.where_is()
            )));
        }
        query.describe = true;
        Ok(())
    }

    fn select_parse(&mut self, query: &mut Query) -> crate::Result<()> {
        loop {
            let name_cased = self.tokens.peek_token_keep_case();
            let name = self.tokens.next_token();
            let mut tok = self.tokens.peek_token();
            if tok.is("(") {
                self.tokens.next_token();
                let field = self.tokens.next_token();
                if name.is("avg") {
                    query.aggregations.push(AggregateEntry {
                        field: field.into_text(),
                        kind: AggregateKind::Avg,
                    });
                } else if name.is("sum") {
                    query.aggregations.push(AggregateEntry {
                        field: field.into_text(),
                        kind: AggregateKind::Sum,
                    });
                } else if name.is("count") {
                    query.calc_total = CalcTotalMode::Accurate;
                    query.limit = 0;
                } else {
                    return Err(ErrorKind::Params.with_message(format!(
                        "Unknown function name '{}', {}",
                        name.text,
                        self.tokens.where_is()
                    )));
                }
                let close = self.tokens.next_token();
                if !close.is(")") {
                    return Err(ErrorKind::ParseSql.with_message(format!(
                        "Expected ')', but found '{}', {}",
                        close.text,
                        self.tokens.where_is()
                    )));
                }
                tok = self.tokens.peek_token();
            } else if !name.is("*") {
                query.select_filter.push(name_cased.into_text());
                query.limit = UNLIMITED;
            } else {
                query.limit = UNLIMITED;
            }
            if !tok.is(",") {
                break;
            }
            self.tokens.next_token();
        }

        let tok = self.tokens.next_token();
        if !tok.is("from") {
            return Err(ErrorKind::ParseSql.with_message(format!(
                "Expected 'FROM', but found '{}' in query, {}",
                tok.text,
                self.tokens.where_is()
            )));
        }
        query.namespace = self.tokens.next_token().into_text();
        self.tokens.skip_space();

        while !self.tokens.end() {
            let tok = self.tokens.peek_token();
            if tok.is("where") {
                self.tokens.next_token();
                self.where_parse(query)?;
            } else if tok.is("limit") {
                self.tokens.next_token();
                query.limit = self.int_clause_parse("LIMIT")?;
            } else if tok.is("offset") {
                self.tokens.next_token();
                query.offset = self.int_clause_parse("OFFSET")?;
            } else if tok.is("order") {
                self.tokens.next_token();
                self.order_by_parse(query)?;
            } else if tok.is("join") {
                self.tokens.next_token();
                self.join_parse(JoinType::LeftJoin, query)?;
            } else if tok.is("left") {
                self.tokens.next_token();
                self.expect_keyword("join", "JOIN")?;
                self.join_parse(JoinType::LeftJoin, query)?;
            } else if tok.is("inner") {
                self.tokens.next_token();
                self.expect_keyword("join", "JOIN")?;
                let join_type = if self.next_op == OpType::Or {
                    JoinType::OrInnerJoin
                } else {
                    JoinType::InnerJoin
                };
                self.next_op = OpType::And;
                self.join_parse(join_type, query)?;
            } else if tok.is("merge") {
                self.tokens.next_token();
                self.merge_parse(query)?;
            } else if tok.is("or") {
                self.tokens.next_token();
                self.next_op = OpType::Or;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn expect_keyword(&mut self, keyword: &str, display: &str) -> crate::Result<()> {
        let tok = self.tokens.next_token();
        if !tok.is(keyword) {
            return Err(ErrorKind::ParseSql.with_message(format!(
                "Expected '{display}', but found '{}' in query, {}",
                tok.text,
                self.tokens.where_is()
            )));
        }
        Ok(())
    }

    fn int_clause_parse(&mut self, clause: &str) -> crate::Result<u64> {
        let tok = self.tokens.next_token();
        if tok.kind != TokenKind::Number {
            return Err(ErrorKind::ParseSql.with_message(format!(
                "Expected number, but found '{}' in query, {}",
                tok.text,
                self.tokens.where_is()
            )));
        }
        tok.text.parse().map_err(|_| {
            ErrorKind::ParseSql.with_message(format!(
                "{clause} expects a non-negative integer, but found '{}', {}",
                tok.text,
                self.tokens.where_is()
            ))
        })
    }

    fn order_by_parse(&mut self, query: &mut Query) -> crate::Result<()> {
        self.expect_keyword("by", "BY")?;
        let name_lowered = self.tokens.peek_token();
        let tok = self.tokens.next_token_keep_case();
        if tok.kind != TokenKind::Name {
            return Err(ErrorKind::ParseSql.with_message(format!(
                "Expected name, but found '{}' in query, {}",
                tok.text,
                self.tokens.where_is()
            )));
        }
        query.sort_by = tok.into_text();
        let mut tok = self.tokens.peek_token();
        if tok.is("(") && name_lowered.is("field") {
            self.tokens.next_token();
            let field = self.tokens.next_token_keep_case();
            if field.kind != TokenKind::Name {
                return Err(ErrorKind::ParseSql.with_message(format!(
                    "Expected name, but found '{}' in query, {}",
                    field.text,
                    self.tokens.where_is()
                )));
            }
            query.sort_by = field.into_text();
            loop {
                let tok = self.tokens.next_token();
                if tok.is(")") {
                    break;
                }
                if !tok.is(",") {
                    return Err(ErrorKind::ParseSql.with_message(format!(
                        "Expected ')' or ',', but found '{}' in query, {}",
                        tok.text,
                        self.tokens.where_is()
                    )));
                }
                let val = self.tokens.next_token_keep_case();
                if val.kind != TokenKind::Number && val.kind != TokenKind::String {
                    return Err(ErrorKind::ParseSql.with_message(format!(
                        "Expected parameter, but found '{}' in query, {}",
                        val.text,
                        self.tokens.where_is()
                    )));
                }
                query.forced_sort_order.push(self.token_value(&val)?);
            }
            tok = self.tokens.peek_token();
        }

        if tok.is("asc") || tok.is("desc") {
            query.sort_descending = tok.is("desc");
            self.tokens.next_token();
        }
        Ok(())
    }

    fn where_parse(&mut self, query: &mut Query) -> crate::Result<()> {
        loop {
            let mut op = mem::replace(&mut self.next_op, OpType::And);
            if self.tokens.peek_token().is("not") {
                self.tokens.next_token();
                op = OpType::Not;
            }
            let field = self.tokens.next_token_keep_case();
            if field.kind != TokenKind::Name && field.kind != TokenKind::String {
                return Err(ErrorKind::ParseSql.with_message(format!(
                    "Expected field name, but found '{}' in query, {}",
                    field.text,
                    self.tokens.where_is()
                )));
            }
            let (condition, values) = self.condition_parse()?;
            query.entries.push(QueryEntry {
                op,
                field: field.into_text(),
                condition,
                values,
                distinct: false,
            });

            let tok = self.tokens.peek_token();
            if tok.is("and") {
                self.tokens.next_token();
            } else if tok.is("or") {
                self.tokens.next_token();
                self.next_op = OpType::Or;
            } else {
                return Ok(());
            }
        }
    }

    fn condition_parse(&mut self) -> crate::Result<(Condition, Vec<Value>)> {
        let tok = self.tokens.next_token();
        match tok.text.as_ref() {
            "=" | "==" | "eq" => Ok((Condition::Eq, vec![self.single_value_parse()?])),
            "<" => Ok((Condition::Lt, vec![self.single_value_parse()?])),
            "<=" => Ok((Condition::Le, vec![self.single_value_parse()?])),
            ">" => Ok((Condition::Gt, vec![self.single_value_parse()?])),
            ">=" => Ok((Condition::Ge, vec![self.single_value_parse()?])),
            "like" => Ok((Condition::Like, vec![self.single_value_parse()?])),
            "in" => Ok((Condition::Set, self.value_list_parse()?)),
            "allset" => Ok((Condition::AllSet, self.value_list_parse()?)),
            "range" => {
                let values = self.value_list_parse()?;
                if values.len() != 2 {
                    return Err(ErrorKind::ParseSql.with_message(format!(
                        "RANGE expects exactly two values, {}",
                        self.tokens.where_is()
                    )));
                }
                Ok((Condition::Range, values))
            }
            "is" => {
                let tok = self.tokens.next_token();
                if tok.is("null") {
                    Ok((Condition::Empty, Vec::new()))
                } else if tok.is("not") {
                    self.expect_keyword("null", "NULL")?;
                    Ok((Condition::Any, Vec::new()))
                } else {
                    Err(ErrorKind::ParseSql.with_message(format!(
                        "Expected 'NULL' or 'NOT NULL', but found '{}' in query, {}",
                        tok.text,
                        self.tokens.where_is()
                    )))
                }
            }
            _ => Err(ErrorKind::ParseSql.with_message(format!(
                "Expected condition, but found '{}' in query, {}",
                tok.text,
                self.tokens.where_is()
            ))),
        }
    }

    fn single_value_parse(&mut self) -> crate::Result<Value> {
        let tok = self.tokens.next_token_keep_case();
        self.token_value(&tok)
    }

    fn value_list_parse(&mut self) -> crate::Result<Vec<Value>> {
        let tok = self.tokens.next_token();
        if !tok.is("(") {
            return Err(ErrorKind::ParseSql.with_message(format!(
                "Expected '(', but found '{}' in query, {}",
                tok.text,
                self.tokens.where_is()
            )));
        }
        let mut values = Vec::new();
        loop {
            let tok = self.tokens.next_token_keep_case();
            values.push(self.token_value(&tok)?);
            let tok = self.tokens.next_token();
            if tok.is(")") {
                return Ok(values);
            }
            if !tok.is(",") {
                return Err(ErrorKind::ParseSql.with_message(format!(
                    "Expected ')' or ',', but found '{}' in query, {}",
                    tok.text,
                    self.tokens.where_is()
                )));
            }
        }
    }

    fn token_value(&self, tok: &Token) -> crate::Result<Value> {
        match tok.kind {
            TokenKind::Number => {
                if tok.text.contains('.') {
                    tok.text.parse().map(Value::Double).map_err(|_| {
                        ErrorKind::ParseSql.with_message(format!(
                            "Invalid number '{}', {}",
                            tok.text,
                            self.tokens.where_is()
                        ))
                    })
                } else {
                    tok.text.parse().map(Value::Int).map_err(|_| {
                        ErrorKind::ParseSql.with_message(format!(
                            "Invalid number '{}', {}",
                            tok.text,
                            self.tokens.where_is()
                        ))
                    })
                }
            }
            TokenKind::String => Ok(Value::Str(tok.text.to_string())),
            TokenKind::Name if tok.text.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            TokenKind::Name if tok.text.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            _ => Err(ErrorKind::ParseSql.with_message(format!(
                "Expected value, but found '{}' in query, {}",
                tok.text,
                self.tokens.where_is()
            ))),
        }
    }

    fn join_parse(&mut self, join_type: JoinType, query: &mut Query) -> crate::Result<()> {
        let mut child = Query::default();
        let tok = self.tokens.next_token();
        if tok.is("(") {
            let tok = self.tokens.next_token();
            if !tok.is("select") {
                return Err(ErrorKind::ParseSql.with_message(format!(
                    "Expected 'SELECT', but found '{}', {}",
                    tok.text,
                    self.tokens.where_is()
                )));
            }
            self.select_parse(&mut child)?;
            let tok = self.tokens.next_token();
            if !tok.is(")") {
                return Err(ErrorKind::ParseSql.with_message(format!(
                    "Expected ')', but found '{}', {}",
                    tok.text,
                    self.tokens.where_is()
                )));
            }
        } else {
            child.namespace = tok.into_text();
        }
        child.join_type = join_type;
        let main_namespace = query.namespace.clone();
        self.join_entries_parse(&main_namespace, &mut child)?;
        query.join_queries.push(child);
        Ok(())
    }

    fn merge_parse(&mut self, query: &mut Query) -> crate::Result<()> {
        let tok = self.tokens.next_token();
        if !tok.is("(") {
            return Err(ErrorKind::ParseSql.with_message(format!(
                "Expected '(', but found '{}', {}",
                tok.text,
                self.tokens.where_is()
            )));
        }
        let tok = self.tokens.next_token();
        if !tok.is("select") {
            return Err(ErrorKind::ParseSql.with_message(format!(
                "Expected 'SELECT', but found '{}', {}",
                tok.text,
                self.tokens.where_is()
            )));
        }
        let mut child = Query::default();
        self.select_parse(&mut child)?;
        let tok = self.tokens.next_token();
        if !tok.is(")") {
            return Err(ErrorKind::ParseSql.with_message(format!(
                "Expected ')', but found '{}', {}",
                tok.text,
                self.tokens.where_is()
            )));
        }
        child.join_type = JoinType::Merge;
        query.merge_queries.push(child);
        Ok(())
    }

    /// Parses `[namespace.]field`, overwriting `namespace` when the dotted form is used.
    fn dotted_field_parse(&mut self, namespace: &mut String) -> crate::Result<String> {
        let tok = self.tokens.next_token();
        if tok.kind != TokenKind::Name && tok.kind != TokenKind::String {
            return Err(ErrorKind::ParseSql.with_message(format!(
                "Expected name, but found '{}', {}",
                tok.text,
                self.tokens.where_is()
            )));
        }
        if !self.tokens.peek_token().is(".") {
            return Ok(tok.into_text());
        }
        self.tokens.next_token();
        *namespace = tok.into_text();
        let tok = self.tokens.next_token();
        if tok.kind != TokenKind::Name && tok.kind != TokenKind::String {
            return Err(ErrorKind::ParseSql.with_message(format!(
                "Expected name, but found '{}', {}",
                tok.text,
                self.tokens.where_is()
            )));
        }
        Ok(tok.into_text())
    }

    fn join_entries_parse(&mut self, main_namespace: &str, child: &mut Query) -> crate::Result<()> {
        self.tokens.skip_space();
        let tok = self.tokens.next_token();
        if !tok.is("on") {
            return Err(ErrorKind::ParseSql.with_message(format!(
                "Expected 'ON', but found '{}', {}",
                tok.text,
                self.tokens.where_is()
            )));
        }

        let braces = self.tokens.peek_token().is("(");
        if braces {
            self.tokens.next_token();
        }

        while !self.tokens.end() {
            let mut tok = self.tokens.peek_token();
            if tok.is("or") {
                self.next_op = OpType::Or;
                self.tokens.next_token();
                tok = self.tokens.peek_token();
            } else if tok.is("and") {
                self.next_op = OpType::And;
                self.tokens.next_token();
                tok = self.tokens.peek_token();
            }

            if braces && tok.is(")") {
                self.tokens.next_token();
                return Ok(());
            }

            let mut ns1 = main_namespace.to_string();
            let mut ns2 = child.namespace.clone();
            let field1 = self.dotted_field_parse(&mut ns1)?;
            let cond_tok = self.tokens.next_token();
            let condition = condition_from_text(&cond_tok.text).ok_or_else(|| {
                ErrorKind::ParseSql.with_message(format!(
                    "Expected condition, but found '{}', {}",
                    cond_tok.text,
                    self.tokens.where_is()
                ))
            })?;
            let field2 = self.dotted_field_parse(&mut ns2)?;

            let (left_field, right_field) = if ns1 == main_namespace && ns2 == child.namespace {
                (field1, field2)
            } else if ns2 == main_namespace && ns1 == child.namespace {
                (field2, field1)
            } else {
                return Err(ErrorKind::Params.with_message(format!(
                    "Unexpected namespaces in ON statement: ('{ns1}' and '{ns2}') but expected ('{main_namespace}' and '{}'), {}",
                    child.namespace,
                    self.tokens.where_is()
                )));
            };

            child.join_entries.push(JoinCondition {
                op: mem::replace(&mut self.next_op, OpType::And),
                condition,
                left_field,
                right_field,
            });
            if !braces {
                return Ok(());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_lists_namespaces() -> crate::Result<()> {
        let q = Query::from_sql("describe media_items, users;")?;
        assert!(q.describe);
        assert_eq!(q.namespaces, vec!["media_items", "users"]);
        Ok(())
    }

    #[test]
    fn describe_star_means_all() -> crate::Result<()> {
        let q = Query::from_sql("describe *")?;
        assert!(q.describe);
        assert!(q.namespaces.is_empty());
        Ok(())
    }

    #[test]
    fn unknown_top_level_form_is_rejected() {
        let err = Query::from_sql("insert into ns").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseSql);
        assert!(err.to_string().contains("'insert'"));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let err = Query::from_sql("select * from ns; extra").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseSql);
    }

    #[test]
    fn unknown_projection_function_is_a_params_error() {
        let err = Query::from_sql("select median(price) from ns").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Params);
        assert!(err.to_string().contains("median"));
    }

    #[test]
    fn errors_carry_token_positions() {
        let err = Query::from_sql("select * from ns where price >").unwrap_err();
        assert!(err.to_string().contains("line 1"), "message: {err}");
    }

    #[test]
    fn on_clause_must_name_both_namespaces() {
        let err =
            Query::from_sql("select * from a inner join b on a.x = c.y").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Params);
    }

    #[test]
    fn on_clause_direction_may_be_swapped() -> crate::Result<()> {
        let q = Query::from_sql("select * from a inner join b on b.y = a.x")?;
        let child = &q.join_queries[0];
        assert_eq!(child.join_entries[0].left_field, "x");
        assert_eq!(child.join_entries[0].right_field, "y");
        Ok(())
    }

    #[test]
    fn where_accepts_null_checks_and_sets() -> crate::Result<()> {
        let q = Query::from_sql(
            "select * from ns where a is null and b is not null or c in (1, 2, 3) and not d range(0, 10)",
        )?;
        let shape: Vec<_> = q
            .entries
            .iter()
            .map(|e| (e.op, e.field.as_str(), e.condition, e.values.len()))
            .collect();
        assert_eq!(
            shape,
            vec![
                (OpType::And, "a", Condition::Empty, 0),
                (OpType::And, "b", Condition::Any, 0),
                (OpType::Or, "c", Condition::Set, 3),
                (OpType::Not, "d", Condition::Range, 2),
            ]
        );
        Ok(())
    }

    #[test]
    fn count_resets_the_limit() -> crate::Result<()> {
        let q = Query::from_sql("select count(*) from ns")?;
        assert_eq!(q.calc_total, CalcTotalMode::Accurate);
        assert_eq!(q.limit, 0);
        Ok(())
    }

    #[test]
    fn projection_keeps_field_case() -> crate::Result<()> {
        let q = Query::from_sql("select Price, Qty from ns")?;
        assert_eq!(q.select_filter, vec!["Price", "Qty"]);
        assert_eq!(q.limit, UNLIMITED);
        Ok(())
    }

    #[test]
    fn join_spec_may_be_a_sub_select() -> crate::Result<()> {
        let q = Query::from_sql(
            "select * from a left join (select * from b where x > 0) on a.id = b.aid",
        )?;
        let child = &q.join_queries[0];
        assert_eq!(child.join_type, JoinType::LeftJoin);
        assert_eq!(child.namespace, "b");
        assert_eq!(child.entries.len(), 1);
        Ok(())
    }

    #[test]
    fn merge_requires_a_parenthesised_select() {
        let err = Query::from_sql("select * from a merge b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseSql);

        let q = Query::from_sql("select * from a merge (select * from b)").unwrap();
        assert_eq!(q.merge_queries[0].join_type, JoinType::Merge);
    }
}
