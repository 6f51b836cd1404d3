//! End-to-end compilation tests against a small shop schema.

use restq::{
    Compiler, ExpansionTree, LimitKind, Limits, OptionsContract, Predicate, QueryError, RawQuery,
    Registry, Relation, ResourceDescriptor, Shape, SortSpec, Value,
};
use restq_sql::{QueryBuilder, Sqlite};

fn registry() -> Registry {
    Registry::builder()
        .resource(
            ResourceDescriptor::new("customers")
                .properties(["name", "email", "password_hash"])
                .relation("orders", Relation::has_many("orders", "id", "customer_id"))
                .allow_columns(["id", "name", "email"]),
        )
        .resource(
            ResourceDescriptor::new("orders")
                .properties(["total", "status", "created_at"])
                .relation("customer", Relation::belongs_to("customers", "customer_id", "id"))
                .relation("items", Relation::has_many("order_items", "id", "order_id"))
                .relation("audit", Relation::has_one("order_audits", "id", "order_id"))
                .allow_relations(["customer", "items"]),
        )
        .resource(
            ResourceDescriptor::new("order_items")
                .properties(["sku", "qty", "price"])
                .relation("order", Relation::belongs_to("orders", "order_id", "id")),
        )
        .resource(ResourceDescriptor::new("order_audits").properties(["order_id", "note"]))
        .resource(ResourceDescriptor::new("products").properties(["name", "price", "qty"]))
        .build()
        .unwrap()
}

fn compiler() -> Compiler {
    Compiler::new(registry())
}

fn raw(pairs: &[(&str, &str)]) -> RawQuery {
    pairs.iter().copied().collect()
}

fn where_sql(plan: &restq::QueryPlan) -> String {
    let predicate = plan.predicate.as_ref().unwrap();
    let sql = predicate
        .apply(QueryBuilder::new(Sqlite, plan.table.as_str()))
        .build()
        .sql;
    sql.split_once(" WHERE ").unwrap().1.to_string()
}

// =============================================================================
// Worked examples
// =============================================================================

#[test]
fn top_without_filter() {
    let plan = compiler()
        .compile("products", &raw(&[("$top", "5")]))
        .unwrap();
    assert_eq!(plan.limit, Some(5));
    assert_eq!(plan.offset, None);
    assert_eq!(plan.predicate, None);
}

#[test]
fn or_of_equalities() {
    let plan = compiler()
        .compile("products", &raw(&[("$filter", "name eq 'x' or name eq 'y'")]))
        .unwrap();
    assert_eq!(where_sql(&plan), "(name = ?1 OR name = ?2)");
}

#[test]
fn eq_null_is_a_null_test() {
    let plan = compiler()
        .compile("products", &raw(&[("$filter", "qty eq null")]))
        .unwrap();
    assert_eq!(where_sql(&plan), "qty IS NULL");
    assert_eq!(
        plan.predicate,
        Some(Predicate::IsNull {
            column: "qty".into(),
            negated: false,
        })
    );
}

#[test]
fn expansion_depth_is_bounded() {
    let query = raw(&[("$expand", "orders/items")]);

    let compiler = Compiler::new(registry())
        .with_limits(Limits::default().max_recursion_depth(2))
        .unwrap();
    let plan = compiler.compile("customers", &query).unwrap();
    let tree = plan.expansion.unwrap();
    assert_eq!(tree.to_string(), "[orders.[items]]");
    assert!(tree.node("orders/items").unwrap().children().is_empty());

    let compiler = Compiler::new(registry())
        .with_limits(Limits::default().max_recursion_depth(1))
        .unwrap();
    let err = compiler.compile("customers", &query).unwrap_err();
    assert!(matches!(
        err,
        QueryError::LimitExceeded {
            kind: LimitKind::RecursionDepth,
            max: 1,
            actual: 2,
            ..
        }
    ));
}

#[test]
fn select_from_unexpanded_relation() {
    let err = compiler()
        .compile("customers", &raw(&[("$select", "orders.total")]))
        .unwrap_err();
    assert_eq!(err.code(), "UnexpandedRelation");
    assert_eq!(err.param(), "$select");
    assert_eq!(err.status(), 400);
}

#[test]
fn unsupported_operator() {
    let err = compiler()
        .compile("products", &raw(&[("$filter", "price add 2 eq 5")]))
        .unwrap_err();
    assert_eq!(
        err,
        QueryError::UnsupportedFilterOperator {
            param: "$filter".into(),
            value: "price add 2 eq 5".into(),
            operator: "add".into(),
        }
    );
}

// =============================================================================
// Options
// =============================================================================

#[test]
fn top_defaults_and_range() {
    let plan = compiler().compile("products", &RawQuery::new()).unwrap();
    assert_eq!(plan.limit, Some(10));

    for top in ["0", "101", "-1", "ten"] {
        let err = compiler()
            .compile("products", &raw(&[("$top", top)]))
            .unwrap_err();
        assert_eq!(err.code(), "SchemaValidationError", "{top}");
        assert_eq!(err.param(), "$top");
    }
}

#[test]
fn unknown_parameter_rejected_unless_passed_through() {
    let query = raw(&[("access_token", "abc")]);
    let err = compiler().compile("products", &query).unwrap_err();
    assert_eq!(err.param(), "access_token");

    let config = restq::CompilerConfig {
        contract: OptionsContract::new().pass_through(["access_token"]),
        ..Default::default()
    };
    let compiler = compiler().with_config(config).unwrap();
    assert!(compiler.compile("products", &query).is_ok());
}

#[test]
fn sort_and_skip() {
    let plan = compiler()
        .compile(
            "orders",
            &raw(&[("$sort", "-created_at,+total"), ("$skip", "40")]),
        )
        .unwrap();
    assert_eq!(
        plan.sort,
        [SortSpec::desc("created_at"), SortSpec::asc("total")]
    );
    assert_eq!(plan.offset, Some(40));
}

#[test]
fn repeated_list_keys_concatenate() {
    let plan = compiler()
        .compile(
            "orders",
            &raw(&[("$expand", "customer"), ("$expand", "items")]),
        )
        .unwrap();
    assert_eq!(plan.eager_expression().as_deref(), Some("[customer, items]"));
}

// =============================================================================
// Whitelisting
// =============================================================================

#[test]
fn non_whitelisted_filter_column() {
    let err = compiler()
        .compile(
            "customers",
            &raw(&[("$filter", "password_hash eq 'x'")]),
        )
        .unwrap_err();
    assert_eq!(
        err,
        QueryError::UnknownAttribute {
            param: "$filter".into(),
            attribute: "password_hash".into(),
            resource: "customers".into(),
        }
    );
}

#[test]
fn non_whitelisted_relation() {
    let err = compiler()
        .compile("orders", &raw(&[("$expand", "audit")]))
        .unwrap_err();
    assert_eq!(
        err,
        QueryError::UnknownRelation {
            param: "$expand".into(),
            path: "audit".into(),
            segment: "audit".into(),
        }
    );
}

#[test]
fn filters_reference_only_whitelisted_columns() {
    let plan = compiler()
        .compile(
            "customers",
            &raw(&[(
                "$filter",
                "(name eq 'a' or startswith(email, 'b')) and not id eq 3",
            )]),
        )
        .unwrap();
    let root = registry();
    let customers = root.get("customers").unwrap();
    for column in plan.predicate.as_ref().unwrap().columns() {
        assert!(customers.is_allowed_column(column), "{column}");
    }
}

#[test]
fn root_projection_keeps_join_keys() {
    let plan = compiler()
        .compile(
            "customers",
            &raw(&[("$expand", "orders"), ("$select", "email,orders/total")]),
        )
        .unwrap();
    assert_eq!(plan.root_columns, ["id", "email"]);

    let tree: &ExpansionTree = plan.expansion.as_ref().unwrap();
    assert_eq!(
        tree.node("orders").unwrap().columns(),
        ["id", "customer_id", "total"]
    );
    let projection = plan.projection.unwrap();
    assert_eq!(projection.top_level, ["email"]);
    assert_eq!(projection.nested["orders"], ["total"]);
}

// =============================================================================
// Plans
// =============================================================================

#[test]
fn compilation_is_idempotent() {
    let query = raw(&[
        ("$filter", "status eq 'paid' and total gt 10.5"),
        ("$sort", "-created_at"),
        ("$expand", "customer,items"),
        ("$select", "total,items/sku"),
        ("$count", "true"),
    ]);
    let compiler = compiler();
    assert_eq!(
        compiler.compile("orders", &query).unwrap(),
        compiler.compile("orders", &query).unwrap()
    );
}

#[test]
fn entity_plan_matches_id() {
    let plan = compiler()
        .compile_entity(
            "orders",
            &raw(&[("$expand", "items")]),
            &[Value::Int(42)],
        )
        .unwrap();
    assert_eq!(plan.shape, Shape::Entity);
    assert_eq!(plan.limit, Some(1));
    assert_eq!(where_sql(&plan), "id = ?1");
}

#[test]
fn from_json_object() {
    let query = RawQuery::from_json(&serde_json::json!({
        "$top": 3,
        "$count": true,
        "$sort": ["-total", "created_at"],
    }))
    .unwrap();
    let plan = compiler().compile("orders", &query).unwrap();
    assert_eq!(plan.limit, Some(3));
    assert!(plan.want_count);
    assert_eq!(plan.sort.len(), 2);
}
