//! In-memory search engine.
//!
//! [`MemoryTransport`] keeps documents in ordered maps and answers the wire
//! contract well enough to drive the mapper end to end without a server:
//! bulk bodies are applied and recorded, searches evaluate `bool` queries made
//! of `match`, `term`, `range`, `prefix` and `wildcard` clauses, and the basic
//! metric aggregations are computed over the matching documents.
//!
//! Failures can be injected per operation with [`MemoryTransport::fail_next`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use parking_lot::{Mutex, RwLock};
use regex::Regex;
use serde_json::{Map, Value, json};

use crate::client::transport::{Transport, TransportFailure, TransportResult};

const DEFAULT_SEARCH_SIZE: usize = 10;

type Index = BTreeMap<String, Value>;

#[derive(Default)]
pub struct MemoryTransport {
    indices: RwLock<BTreeMap<String, Index>>,
    bulk_log: Mutex<Vec<Vec<Value>>>,
    search_log: Mutex<Vec<(String, Value)>>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, TransportFailure>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document directly, bypassing the bulk API.
    pub fn insert(&self, index: &str, id: &str, source: Value) {
        self.indices
            .write()
            .entry(index.to_string())
            .or_default()
            .insert(id.to_string(), source);
    }

    pub fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.indices.read().get(index)?.get(id).cloned()
    }

    pub fn document_count(&self, index: &str) -> usize {
        self.indices.read().get(index).map_or(0, BTreeMap::len)
    }

    /// Make the next call of `operation` (`"get"`, `"search"`, `"bulk"`,
    /// or `"count"`) fail.
    pub fn fail_next(&self, operation: &str, status: Option<u16>, message: &str) {
        self.failures
            .lock()
            .insert(operation.to_string(), TransportFailure::new(status, message));
    }

    /// Every bulk body applied so far, in call order.
    pub fn bulk_requests(&self) -> Vec<Vec<Value>> {
        self.bulk_log.lock().clone()
    }

    pub fn last_bulk(&self) -> Option<Vec<Value>> {
        self.bulk_log.lock().last().cloned()
    }

    /// Every search request as `(index, body)`, in call order.
    pub fn search_requests(&self) -> Vec<(String, Value)> {
        self.search_log.lock().clone()
    }

    /// Names of every operation attempted, failed ones included.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == operation).count()
    }

    fn begin(&self, operation: &str) -> TransportResult<()> {
        self.calls.lock().push(operation.to_string());
        match self.failures.lock().remove(operation) {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    fn matching(&self, index: &str, query: Option<&Value>) -> TransportResult<Vec<(String, Value)>> {
        let indices = self.indices.read();
        let Some(docs) = indices.get(index) else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::new();
        for (id, source) in docs {
            if matches_query(query, source)? {
                hits.push((id.clone(), source.clone()));
            }
        }
        Ok(hits)
    }

    fn apply_bulk(&self, body: &[Value]) -> TransportResult<Value> {
        let mut indices = self.indices.write();
        let mut items = Vec::new();
        let mut errors = false;
        let mut i = 0;

        while i < body.len() {
            let (action, meta) = body[i]
                .as_object()
                .and_then(|header| header.iter().next())
                .ok_or_else(|| bad_request(format!("malformed action header at line {i}")))?;
            let index = meta
                .get("_index")
                .and_then(Value::as_str)
                .ok_or_else(|| bad_request("action header without _index"))?;
            let id = meta
                .get("_id")
                .and_then(Value::as_str)
                .ok_or_else(|| bad_request("action header without _id"))?;

            let docs = indices.entry(index.to_string()).or_default();
            let item = match action.as_str() {
                "index" | "create" => {
                    let source = body
                        .get(i + 1)
                        .ok_or_else(|| bad_request("index action without payload"))?;
                    let created = docs.insert(id.to_string(), source.clone()).is_none();
                    i += 2;
                    let (status, result) = if created {
                        (201, "created")
                    } else {
                        (200, "updated")
                    };
                    json!({"_index": index, "_id": id, "status": status, "result": result})
                }
                "update" => {
                    let doc = body
                        .get(i + 1)
                        .and_then(|payload| payload.get("doc"))
                        .and_then(Value::as_object)
                        .ok_or_else(|| bad_request("update action without doc payload"))?;
                    i += 2;
                    match docs.get_mut(id) {
                        Some(existing) => {
                            merge(existing, doc);
                            json!({"_index": index, "_id": id, "status": 200, "result": "updated"})
                        }
                        None => {
                            errors = true;
                            json!({
                                "_index": index,
                                "_id": id,
                                "status": 404,
                                "error": {"type": "document_missing_exception"}
                            })
                        }
                    }
                }
                "delete" => {
                    i += 1;
                    if docs.remove(id).is_some() {
                        json!({"_index": index, "_id": id, "status": 200, "result": "deleted"})
                    } else {
                        json!({"_index": index, "_id": id, "status": 404, "result": "not_found"})
                    }
                }
                other => return Err(bad_request(format!("unknown bulk action '{other}'"))),
            };

            let mut entry = Map::new();
            entry.insert(action.clone(), item);
            items.push(Value::Object(entry));
        }

        Ok(json!({"took": 0, "errors": errors, "items": items}))
    }
}

impl Transport for MemoryTransport {
    fn get(&self, index: &str, id: &str) -> TransportResult<Value> {
        self.begin("get")?;
        Ok(match self.document(index, id) {
            Some(source) => json!({"_index": index, "_id": id, "found": true, "_source": source}),
            None => json!({"_index": index, "_id": id, "found": false}),
        })
    }

    fn search(&self, index: &str, body: &Value) -> TransportResult<Value> {
        self.begin("search")?;
        self.search_log
            .lock()
            .push((index.to_string(), body.clone()));

        let mut docs = self.matching(index, body.get("query"))?;
        let total = docs.len();

        if let Some(sort) = body.get("sort").and_then(Value::as_array) {
            let keys = sort_keys(sort)?;
            docs.sort_by(|(_, a), (_, b)| compare_by_keys(a, b, &keys));
        }

        let aggregations = match body.get("aggs").or_else(|| body.get("aggregations")) {
            Some(aggs) => Some(aggregate(aggs, &docs)?),
            None => None,
        };

        let from = body.get("from").and_then(Value::as_u64).unwrap_or(0) as usize;
        let size = body
            .get("size")
            .and_then(Value::as_u64)
            .map_or(DEFAULT_SEARCH_SIZE, |s| s as usize);
        let hits: Vec<Value> = docs
            .into_iter()
            .skip(from)
            .take(size)
            .map(|(id, source)| json!({"_index": index, "_id": id, "_source": source}))
            .collect();

        let mut response = json!({
            "took": 0,
            "timed_out": false,
            "hits": {"total": {"value": total, "relation": "eq"}, "hits": hits}
        });
        if let (Some(aggregations), Some(object)) = (aggregations, response.as_object_mut()) {
            object.insert("aggregations".to_string(), aggregations);
        }
        Ok(response)
    }

    fn bulk(&self, body: &[Value]) -> TransportResult<Value> {
        self.begin("bulk")?;
        let response = self.apply_bulk(body)?;
        self.bulk_log.lock().push(body.to_vec());
        Ok(response)
    }

    fn count(&self, index: &str, body: &Value) -> TransportResult<Value> {
        self.begin("count")?;
        let count = self.matching(index, body.get("query"))?.len();
        Ok(json!({"count": count}))
    }
}

fn bad_request(message: impl Into<String>) -> TransportFailure {
    TransportFailure::new(Some(400), message)
}

fn merge(target: &mut Value, doc: &Map<String, Value>) {
    if let Some(object) = target.as_object_mut() {
        for (key, value) in doc {
            object.insert(key.clone(), value.clone());
        }
    }
}

// --- Query evaluation ---

fn matches_query(query: Option<&Value>, source: &Value) -> TransportResult<bool> {
    let Some(query) = query.filter(|q| !q.is_null()) else {
        return Ok(true);
    };
    let clauses = query
        .as_object()
        .ok_or_else(|| bad_request("query must be an object"))?;

    for (kind, clause) in clauses {
        let matched = match kind.as_str() {
            "match_all" => true,
            "bool" => matches_bool(clause, source)?,
            "match" => field_clauses(clause, "query")?
                .into_iter()
                .all(|(field, expected)| {
                    values_at(source, field)
                        .into_iter()
                        .any(|actual| match_value(actual, expected))
                }),
            "term" => field_clauses(clause, "value")?
                .into_iter()
                .all(|(field, expected)| values_at(source, field).contains(&expected)),
            "range" => {
                let mut all = true;
                for (field, bounds) in field_clauses(clause, "")? {
                    let bounds = bounds
                        .as_object()
                        .ok_or_else(|| bad_request("range bounds must be an object"))?;
                    all &= values_at(source, field)
                        .into_iter()
                        .any(|actual| in_range(actual, bounds));
                }
                all
            }
            "prefix" => field_clauses(clause, "value")?
                .into_iter()
                .all(|(field, prefix)| {
                    let prefix = prefix.as_str().unwrap_or_default();
                    values_at(source, field)
                        .into_iter()
                        .filter_map(Value::as_str)
                        .any(|actual| actual.starts_with(prefix))
                }),
            "wildcard" => {
                let mut all = true;
                for (field, pattern) in field_clauses(clause, "value")? {
                    let regex = compile_wildcard(pattern.as_str().unwrap_or_default())?;
                    all &= values_at(source, field)
                        .into_iter()
                        .filter_map(Value::as_str)
                        .any(|actual| regex.is_match(actual));
                }
                all
            }
            other => return Err(bad_request(format!("unsupported query clause '{other}'"))),
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_bool(clause: &Value, source: &Value) -> TransportResult<bool> {
    let list = |key: &str| -> Vec<&Value> {
        match clause.get(key) {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(single) => vec![single],
        }
    };

    for q in list("must").into_iter().chain(list("filter")) {
        if !matches_query(Some(q), source)? {
            return Ok(false);
        }
    }
    for q in list("must_not") {
        if matches_query(Some(q), source)? {
            return Ok(false);
        }
    }
    let should = list("should");
    if !should.is_empty() {
        let mut any = false;
        for q in should {
            any |= matches_query(Some(q), source)?;
        }
        return Ok(any);
    }
    Ok(true)
}

/// Splits `{field: value}` or `{field: {inner_key: value}}` clauses.
fn field_clauses<'a>(clause: &'a Value, inner_key: &str) -> TransportResult<Vec<(&'a str, &'a Value)>> {
    let object = clause
        .as_object()
        .ok_or_else(|| bad_request("clause must be an object"))?;
    Ok(object
        .iter()
        .map(|(field, value)| {
            let value = match value {
                Value::Object(inner) if !inner_key.is_empty() && inner.contains_key(inner_key) => {
                    &inner[inner_key]
                }
                other => other,
            };
            (field.as_str(), value)
        })
        .collect())
}

/// Values at a dotted path, flattening arrays along the way.
fn values_at<'a>(source: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![source];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(object) => {
                    if let Some(child) = object.get(segment) {
                        next.push(child);
                    }
                }
                Value::Array(items) => next.extend(items.iter().filter_map(|i| i.get(segment))),
                _ => {}
            }
        }
        current = next;
    }

    current
        .into_iter()
        .flat_map(|value| match value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        })
        .collect()
}

fn match_value(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::String(actual), Value::String(expected)) => {
            let tokens = tokenize(actual);
            tokenize(expected).iter().any(|t| tokens.contains(t))
        }
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn in_range(actual: &Value, bounds: &Map<String, Value>) -> bool {
    bounds.iter().all(|(op, bound)| {
        let Some(ordering) = compare_values(actual, bound) else {
            return false;
        };
        match op.as_str() {
            "gte" => ordering != Ordering::Less,
            "gt" => ordering == Ordering::Greater,
            "lte" => ordering != Ordering::Greater,
            "lt" => ordering == Ordering::Less,
            _ => true,
        }
    })
}

fn compile_wildcard(pattern: &str) -> TransportResult<Regex> {
    let mut regex = String::from("^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => regex.push_str(&regex::escape(&escaped.to_string())),
                None => regex.push_str("\\\\"),
            },
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');
    Regex::new(&regex).map_err(|e| bad_request(format!("invalid wildcard pattern: {e}")))
}

// --- Sorting ---

struct SortKey {
    field: String,
    descending: bool,
}

fn sort_keys(sort: &[Value]) -> TransportResult<Vec<SortKey>> {
    let mut keys = Vec::new();
    for entry in sort {
        match entry {
            Value::String(field) => keys.push(SortKey {
                field: field.clone(),
                descending: false,
            }),
            Value::Object(object) => {
                for (field, spec) in object {
                    let order = match spec {
                        Value::String(order) => order.as_str(),
                        other => other.get("order").and_then(Value::as_str).unwrap_or("asc"),
                    };
                    keys.push(SortKey {
                        field: field.clone(),
                        descending: order.eq_ignore_ascii_case("desc"),
                    });
                }
            }
            _ => return Err(bad_request("invalid sort entry")),
        }
    }
    Ok(keys)
}

fn compare_by_keys(a: &Value, b: &Value, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let left = values_at(a, &key.field).into_iter().next();
        let right = values_at(b, &key.field).into_iter().next();
        // Missing values sort last in both directions.
        let ordering = match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => return Ordering::Greater,
            (Some(_), None) => return Ordering::Less,
            (Some(l), Some(r)) => compare_values(l, r).unwrap_or(Ordering::Equal),
        };
        let ordering = if key.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

// --- Aggregations ---

fn aggregate(aggs: &Value, docs: &[(String, Value)]) -> TransportResult<Value> {
    let aggs = aggs
        .as_object()
        .ok_or_else(|| bad_request("aggs must be an object"))?;

    let mut results = Map::new();
    for (name, spec) in aggs {
        let (kind, params) = spec
            .as_object()
            .and_then(|s| s.iter().next())
            .ok_or_else(|| bad_request(format!("aggregation '{name}' has no type")))?;
        let field = params
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| bad_request(format!("aggregation '{name}' has no field")))?;

        let values: Vec<&Value> = docs
            .iter()
            .flat_map(|(_, source)| values_at(source, field))
            .filter(|v| !v.is_null())
            .collect();
        let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();

        let value = match kind.as_str() {
            "value_count" => json!(values.len()),
            "sum" => json!(numbers.iter().sum::<f64>()),
            "avg" if numbers.is_empty() => Value::Null,
            "avg" => json!(numbers.iter().sum::<f64>() / numbers.len() as f64),
            "min" => numbers.iter().copied().reduce(f64::min).map_or(Value::Null, |v| json!(v)),
            "max" => numbers.iter().copied().reduce(f64::max).map_or(Value::Null, |v| json!(v)),
            other => {
                return Err(bad_request(format!(
                    "unsupported aggregation type '{other}'"
                )));
            }
        };
        results.insert(name.clone(), json!({ "value": value }));
    }
    Ok(Value::Object(results))
}
