mod common;

use serde_json::json;

use common::{Customer, DummyEntity, Order, memory_manager};
use elastic_odm::{
    Criteria, Entity, OdmError, OrderBy, QueryOptions, SortDirection, shared, with_entity,
};

fn seed_dummies(transport: &elastic_odm::MemoryTransport) {
    for (id, field1, field2) in [
        ("d1", "apple pie", 3),
        ("d2", "apple tart", 7),
        ("d3", "banana split", 5),
        ("d4", "cherry cake", 11),
    ] {
        transport.insert("dummy_index", id, json!({"field1": field1, "field2": field2}));
    }
}

fn field2_values(entities: &[elastic_odm::EntityRef]) -> Vec<i64> {
    entities
        .iter()
        .filter_map(|e| with_entity::<DummyEntity, _>(e, |d| d.field2))
        .collect()
}

#[test]
fn test_find_by_translates_criteria() -> elastic_odm::Result<()> {
    let (transport, manager) = memory_manager();
    seed_dummies(&transport);

    let criteria = Criteria::new()
        .eq("field1", "apple")
        .range("field2", json!({"gte": 5}));
    let found = manager.find_by::<DummyEntity>(&criteria, &OrderBy::new(), None, None)?;

    assert_eq!(field2_values(&found), vec![7]);
    assert!(found[0].read().is_persisted());
    assert_eq!(found[0].read().id(), "d2");

    let (index, body) = transport.search_requests().pop().unwrap();
    assert_eq!(index, "dummy_index");
    assert_eq!(
        body,
        json!({
            "query": {"bool": {"must": [
                {"match": {"field1": "apple"}},
                {"range": {"field2": {"gte": 5}}}
            ]}},
            "sort": []
        })
    );
    Ok(())
}

#[test]
fn test_find_by_sorts_and_pages() -> elastic_odm::Result<()> {
    let (transport, manager) = memory_manager();
    seed_dummies(&transport);

    let order_by = OrderBy::new().by("field2", SortDirection::Desc);
    let page = manager.find_by::<DummyEntity>(&Criteria::new(), &order_by, Some(2), Some(1))?;
    assert_eq!(field2_values(&page), vec![7, 5]);

    let prefixed = manager.find_by::<DummyEntity>(
        &Criteria::new().prefix("field1", "ch"),
        &OrderBy::new(),
        None,
        None,
    )?;
    assert_eq!(field2_values(&prefixed), vec![11]);

    let wildcard = manager.find_by::<DummyEntity>(
        &Criteria::new().wildcard("field1", "b*t"),
        &OrderBy::new(),
        None,
        None,
    )?;
    assert_eq!(field2_values(&wildcard), vec![5]);
    Ok(())
}

#[test]
fn test_criteria_from_map() -> elastic_odm::Result<()> {
    let (transport, manager) = memory_manager();
    seed_dummies(&transport);

    let criteria: Criteria = json!({"field2": {"_range": {"lt": 5}}})
        .as_object()
        .cloned()
        .unwrap()
        .into();
    let ordered: OrderBy = [("field2", "asc")].into_iter().collect();
    let found = manager.find_by::<DummyEntity>(&criteria, &ordered, None, None)?;
    assert_eq!(field2_values(&found), vec![3]);
    Ok(())
}

#[test]
fn test_undeclared_fields_are_rejected() {
    let (transport, manager) = memory_manager();

    let err = manager
        .find_by::<DummyEntity>(
            &Criteria::new().eq("unknownField", "value"),
            &OrderBy::new(),
            None,
            None,
        )
        .unwrap_err();
    assert!(matches!(err, OdmError::InvalidField { ref field, .. } if field == "unknownField"));

    let err = manager
        .find_by::<DummyEntity>(&Criteria::new(), &OrderBy::new().asc("nope"), None, None)
        .unwrap_err();
    assert!(matches!(err, OdmError::InvalidSortField { .. }));

    let err = manager
        .aggregate::<DummyEntity>(
            json!({"by_field2": {"terms": {"field": "field2"}}}),
            &Criteria::new().eq("unknownField", "value"),
        )
        .unwrap_err();
    assert!(matches!(err, OdmError::InvalidField { ref field, .. } if field == "unknownField"));

    // Nothing reached the index
    assert!(transport.calls().is_empty());
}

#[test]
fn test_find_one_by() -> elastic_odm::Result<()> {
    let (transport, manager) = memory_manager();
    seed_dummies(&transport);

    let first = manager
        .find_one_by::<DummyEntity>(&Criteria::new(), &OrderBy::new().desc("field2"))?
        .unwrap();
    assert_eq!(with_entity::<DummyEntity, _>(&first, |d| d.field2), Some(11));

    let none = manager.find_one_by::<DummyEntity>(
        &Criteria::new().eq("field1", "durian"),
        &OrderBy::new(),
    )?;
    assert!(none.is_none());
    Ok(())
}

#[test]
fn test_find_hydrates_references() -> elastic_odm::Result<()> {
    let (transport, mut manager) = memory_manager();

    let mut order = Order::new("ORD-1", "1001");
    order.customer = Some(shared(Customer::new("CUST-123", "Ada")));
    manager.persist(&order.customer.clone().unwrap())?;
    let order = shared(order);
    manager.persist(&order)?;
    manager.flush()?;
    assert_eq!(transport.document_count("customers"), 1);

    let loaded = manager.find::<Order>("ORD-1")?.unwrap();
    assert!(loaded.read().is_persisted());
    let customer = with_entity::<Order, _>(&loaded, |o| o.customer.clone())
        .flatten()
        .unwrap();
    assert_eq!(
        with_entity::<Customer, _>(&customer, |c| c.name.clone()).flatten(),
        Some("Ada".to_string())
    );
    assert!(customer.read().is_persisted());

    assert!(manager.find::<Order>("missing")?.is_none());
    Ok(())
}

#[test]
fn test_aggregate() -> elastic_odm::Result<()> {
    let (transport, manager) = memory_manager();
    seed_dummies(&transport);

    let aggregations = manager.aggregate::<DummyEntity>(
        json!({"total": {"sum": {"field": "field2"}}, "top": {"max": {"field": "field2"}}}),
        &Criteria::new().eq("field1", "apple"),
    )?;
    assert_eq!(aggregations["total"], json!({"value": 10.0}));
    assert_eq!(aggregations["top"], json!({"value": 7.0}));
    Ok(())
}

#[test]
fn test_custom_queries() -> elastic_odm::Result<()> {
    let (transport, manager) = memory_manager();
    seed_dummies(&transport);

    let query = json!({"query": {"term": {"field2": 5}}});
    let options = QueryOptions::new().size(5);

    let hydrated = manager.execute_custom_query::<DummyEntity>(query.clone(), &options)?;
    assert_eq!(field2_values(&hydrated), vec![5]);
    assert!(!hydrated[0].read().is_persisted());

    let raw = manager.execute_raw_query("dummy_index", query.clone(), &options)?;
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0]["_id"], json!("d3"));

    let sorted = manager.execute_raw_query(
        "dummy_index",
        json!({"query": {"match_all": {}}}),
        &QueryOptions::new().offset(1).size(2).sort(json!([{"field2": {"order": "asc"}}])),
    )?;
    let ids: Vec<&str> = sorted.iter().filter_map(|hit| hit["_id"].as_str()).collect();
    assert_eq!(ids, vec!["d3", "d2"]);

    assert_eq!(manager.count_custom_query("dummy_index", &query)?, 1);
    assert_eq!(
        manager.count_custom_query("dummy_index", &json!({"query": {"match_all": {}}}))?,
        4
    );
    Ok(())
}

#[test]
fn test_query_metrics_are_recorded() -> elastic_odm::Result<()> {
    let (transport, manager) = memory_manager();
    seed_dummies(&transport);
    assert!(manager.last_query_metrics().is_none());

    manager.find_by::<DummyEntity>(&Criteria::new(), &OrderBy::new(), None, None)?;
    let metrics = manager.last_query_metrics().unwrap();
    assert_eq!(metrics.total_results, 4);
    Ok(())
}

#[test]
fn test_search_failure_is_wrapped() {
    let (transport, manager) = memory_manager();
    transport.fail_next("search", Some(503), "unavailable");

    let err = manager
        .find_by::<DummyEntity>(&Criteria::new(), &OrderBy::new(), None, None)
        .unwrap_err();
    assert!(matches!(
        err,
        OdmError::Transport { ref operation, status: Some(503), .. } if operation == "SEARCH"
    ));
}
