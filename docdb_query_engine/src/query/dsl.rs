// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! JSON DSL codec for query trees.
//!
//! The DSL is the serde view of [`Query`]: camelCase keys, empty collections and default
//! scalars omitted, literal values as bare JSON scalars. The shape mirrors the binary
//! format field for field, so anything the wire can carry, the DSL can carry too.

use super::Query;
use crate::ErrorKind;

impl Query {
    /// Parses a query from its JSON DSL form.
    #[tracing::instrument(level = "debug", skip_all, err)]
    pub fn parse_json(dsl: &str) -> crate::Result<Query> {
        serde_json::from_str(dsl).map_err(|e| {
            ErrorKind::ParseJson
                .with_message(format!(
                    "could not parse JSON query: {e} at line {} column {}",
                    e.line(),
                    e.column()
                ))
                .with_source(e)
        })
    }

    /// Renders the query as JSON DSL text.
    pub fn to_dsl(&self) -> String {
        serde_json::to_string(self).expect("a query tree always serializes to JSON")
    }
}
