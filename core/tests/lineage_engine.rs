//! End-to-end lineage scenarios (S1, S2, S5, S6 from the design notes'
//! testable-properties section), exercising `LineageExtractor` the way a
//! caller would: one SQL text in, a contracted graph out.

use lineage_core::{CatalogProvider, Graph, LineageExtractor, ResolveError};

fn lineage(sql: &str) -> Graph {
    let mut graph = Graph::new();
    LineageExtractor::new("").extract(sql, &mut graph).unwrap();
    graph.contract();
    graph
}

#[test]
fn s1_cte_chain_elides_to_source_tables_only() {
    let graph = lineage(
        "WITH a AS (SELECT * FROM public.t1), \
              b AS (SELECT * FROM a JOIN public.t2 ON a.id=public.t2.id) \
         SELECT * FROM b;",
    );

    assert!(graph.contains("public.t1"));
    assert!(graph.contains("public.t2"));
    assert!(!graph.contains("a"));
    assert!(!graph.contains("b"));
    assert_eq!(graph.len(), 2);
}

#[test]
fn s2_ctas_chain_through_temp_table() {
    let graph = lineage(
        "CREATE TEMP TABLE tmp_x AS SELECT * FROM public.src; \
         CREATE TABLE dw.dst AS SELECT * FROM tmp_x;",
    );

    assert!(graph.depends_on("dw.dst", "public.src"));
    assert!(!graph.contains("tmp_x"));
}

#[test]
fn s5_insert_select_with_cte() {
    let graph = lineage(
        "INSERT INTO dw.agg \
         WITH src AS (SELECT * FROM public.raw) \
         SELECT * FROM src;",
    );

    assert!(graph.depends_on("dw.agg", "public.raw"));
    assert!(!graph.contains("src"));
}

struct StoredFunction {
    schema: &'static str,
    name: &'static str,
    body: &'static str,
}

impl CatalogProvider for StoredFunction {
    fn fetch_body(&self, schema: &str, name: &str) -> Result<String, ResolveError> {
        if schema == self.schema && name == self.name {
            Ok(self.body.to_string())
        } else {
            Err(ResolveError::NotFound {
                schema: schema.to_string(),
                name: name.to_string(),
            })
        }
    }
}

#[test]
fn s6_function_recursion_yields_inner_statements_lineage() {
    let catalog = StoredFunction {
        schema: "dw",
        name: "f",
        body: "SELECT * FROM public.a; INSERT INTO dw.b SELECT * FROM public.c;",
    };

    let mut graph = Graph::new();
    LineageExtractor::new("")
        .with_catalog(&catalog)
        .extract("SELECT dw.f();", &mut graph)
        .unwrap();
    graph.contract();

    assert!(graph.contains("public.a"));
    assert!(graph.contains("public.c"));
    assert!(graph.contains("dw.b"));
    assert!(graph.depends_on("dw.b", "public.c"));
}

#[test]
fn empty_sql_produces_empty_graph() {
    let graph = lineage("SELECT 1;");
    assert!(graph.is_empty());
}
