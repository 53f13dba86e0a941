// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! End-to-end SQL parsing scenarios: each query's parsed tree is compared against the
//! same tree assembled through the builder API.

use docdb_query_engine::query::{
    AggregateKind, CalcTotalMode, Condition, JoinType, OpType, Query, Value, UNLIMITED,
};
use pretty_assertions::assert_eq;

#[test]
fn filter_with_limit_and_offset() -> Result<(), docdb_query_engine::Error> {
    let q = Query::from_sql("select * from items where price > 10 limit 20 offset 5")?;
    assert_eq!(
        q,
        Query::new("items")
            .where_cond(OpType::And, "price", Condition::Gt, vec![Value::Int(10)])
            .with_limit(20)
            .with_offset(5)
    );
    Ok(())
}

#[test]
fn aggregation_projection() -> Result<(), docdb_query_engine::Error> {
    let q = Query::from_sql("select avg(price), sum(qty) from items")?;
    assert_eq!(
        q,
        Query::new("items")
            .aggregate(AggregateKind::Avg, "price")
            .aggregate(AggregateKind::Sum, "qty")
    );
    Ok(())
}

#[test]
fn inner_join_with_on_condition() -> Result<(), docdb_query_engine::Error> {
    let q = Query::from_sql("select * from a inner join b on a.x = b.y")?;
    assert_eq!(
        q,
        Query::new("a").inner_join(Query::new("b").on(OpType::And, Condition::Eq, "x", "y"))
    );
    assert_eq!(q.join_queries[0].join_type, JoinType::InnerJoin);
    Ok(())
}

#[test]
fn or_before_inner_join_flips_the_join_type() -> Result<(), docdb_query_engine::Error> {
    let q = Query::from_sql("select * from a or inner join b on a.x=b.y")?;
    assert_eq!(
        q,
        Query::new("a").or_inner_join(Query::new("b").on(OpType::And, Condition::Eq, "x", "y"))
    );
    Ok(())
}

#[test]
fn forced_sort_order() -> Result<(), docdb_query_engine::Error> {
    let q = Query::from_sql("select * from t order by field(tag,'hi','lo') desc")?;
    assert_eq!(
        q,
        Query::new("t").sorted_by_order(
            "tag",
            true,
            vec![Value::Str("hi".into()), Value::Str("lo".into())]
        )
    );
    Ok(())
}

#[test]
fn bare_join_and_left_join_mean_left_join() -> Result<(), docdb_query_engine::Error> {
    let bare = Query::from_sql("select * from a join b on a.x = b.y")?;
    let left = Query::from_sql("select * from a left join b on a.x = b.y")?;
    assert_eq!(bare, left);
    assert_eq!(bare.join_queries[0].join_type, JoinType::LeftJoin);
    Ok(())
}

#[test]
fn parenthesised_on_list_combines_conditions() -> Result<(), docdb_query_engine::Error> {
    let q = Query::from_sql(
        "select * from a inner join b on (a.x = b.y and a.z >= b.w or a.v = b.u)",
    )?;
    let child = Query::new("b")
        .on(OpType::And, Condition::Eq, "x", "y")
        .on(OpType::And, Condition::Ge, "z", "w")
        .on(OpType::Or, Condition::Eq, "v", "u");
    assert_eq!(q, Query::new("a").inner_join(child));
    Ok(())
}

#[test]
fn projection_list_sets_select_filter() -> Result<(), docdb_query_engine::Error> {
    let q = Query::from_sql("select name, Price from items")?;
    assert_eq!(
        q,
        Query::new("items").select_field("name").select_field("Price")
    );
    assert_eq!(q.limit, UNLIMITED);
    Ok(())
}

#[test]
fn count_star_marks_an_aggregate_only_query() -> Result<(), docdb_query_engine::Error> {
    let q = Query::from_sql("select count(*) from items")?;
    assert_eq!(q.calc_total, CalcTotalMode::Accurate);
    assert_eq!(q.limit, 0);
    Ok(())
}

#[test]
fn keywords_are_case_insensitive_and_namespace_is_folded() -> Result<(), docdb_query_engine::Error>
{
    let q = Query::from_sql("SELECT * FROM Items WHERE Price <= 99 ORDER BY Price ASC;")?;
    assert_eq!(q.namespace, "items");
    assert_eq!(q.entries[0].field, "Price");
    assert_eq!(q.entries[0].condition, Condition::Le);
    assert_eq!(q.sort_by, "Price");
    assert!(!q.sort_descending);
    Ok(())
}

#[test]
fn describe_forms() -> Result<(), docdb_query_engine::Error> {
    let all = Query::from_sql("describe *;")?;
    assert!(all.describe);
    assert!(all.namespaces.is_empty());

    let some = Query::from_sql("describe media_items, users")?;
    assert!(some.describe);
    assert_eq!(some.namespaces, vec!["media_items", "users"]);
    Ok(())
}

#[test]
fn merge_appends_a_merge_child() -> Result<(), docdb_query_engine::Error> {
    let q = Query::from_sql("select * from items merge (select * from archive where year < 2000)")?;
    assert_eq!(
        q,
        Query::new("items").merge(Query::new("archive").where_cond(
            OpType::And,
            "year",
            Condition::Lt,
            vec![Value::Int(2000)],
        ))
    );
    Ok(())
}
