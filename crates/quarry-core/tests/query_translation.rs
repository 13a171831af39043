//! Integration tests for query translation and paging.

use pretty_assertions::assert_eq;
use quarry_core::lang::{MemoryPredicateCache, TranslationError};
use quarry_core::model::{
    Entity, Field, FieldDef, FieldType, FilterNode, PageRequest, Query, Record, ScalarType, Shape,
    SortNode, Value,
};
use quarry_core::{
    DocumentTranslator, Error, ExpressionTranslator, InMemorySource, NativeFieldMap,
    PaginationExecutor, QueryConfig,
};
use serde_json::json;

#[derive(Debug, Clone, PartialEq)]
struct Person {
    first_name: String,
    last_name: String,
    city: Option<String>,
}

impl Entity for Person {
    fn shape() -> Shape {
        let address =
            Shape::new("Address").with_field(FieldDef::scalar("City", ScalarType::String));
        Shape::new("Person").with_fields([
            FieldDef::scalar("FirstName", ScalarType::String),
            FieldDef::scalar("LastName", ScalarType::String),
            FieldDef::new("Address", FieldType::OptionalEmbedded(address)),
        ])
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "FirstName" => Some(self.first_name.clone().into()),
            "LastName" => Some(self.last_name.clone().into()),
            "Address" => Some(match &self.city {
                Some(city) => Record::new().with("City", city.as_str()).into(),
                None => Value::Null,
            }),
            _ => None,
        }
    }
}

const FIRST_NAME: Field<Person, String> = Field::new("FirstName", |p| p.first_name.clone());
const LAST_NAME: Field<Person, String> = Field::new("LastName", |p| p.last_name.clone());

struct TestContext {
    people: Vec<Person>,
    cache: MemoryPredicateCache,
}

impl TestContext {
    fn new() -> Self {
        let person = |first: &str, last: &str, city: Option<&str>| Person {
            first_name: first.to_string(),
            last_name: last.to_string(),
            city: city.map(str::to_string),
        };
        Self {
            people: vec![
                person("John", "Doe", Some("Paris")),
                person("Jane", "Doe", None),
                person("John", "Smith", Some("Oslo")),
                person("Jane", "Smith", Some("Paris")),
            ],
            cache: MemoryPredicateCache::new(),
        }
    }

    fn translator(&self) -> ExpressionTranslator<'_, Person> {
        ExpressionTranslator::new(QueryConfig::default()).with_cache(&self.cache)
    }

    fn run(&self, query: &Query<Person>) -> Vec<(String, String)> {
        self.translator()
            .apply(query, self.people.clone())
            .unwrap()
            .into_iter()
            .map(|p| (p.first_name, p.last_name))
            .collect()
    }
}

fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
    expected
        .iter()
        .map(|(f, l)| (f.to_string(), l.to_string()))
        .collect()
}

#[test]
fn test_order_by_then_descending() {
    let ctx = TestContext::new();
    let sort = SortNode::combined(vec![
        SortNode::ascending(FIRST_NAME),
        SortNode::descending(LAST_NAME),
    ])
    .unwrap();
    let query = Query::all().sorted_by(sort);

    assert_eq!(
        ctx.run(&query),
        pairs(&[
            ("Jane", "Smith"),
            ("Jane", "Doe"),
            ("John", "Smith"),
            ("John", "Doe"),
        ])
    );
}

#[test]
fn test_dynamic_filters_and_together() {
    let ctx = TestContext::new();
    let query = Query::filter_by(FilterNode::dynamic("x", r#"x.FirstName == "John""#).unwrap())
        .and(FilterNode::dynamic("x", r#"x.LastName == "Doe""#).unwrap());

    assert_eq!(ctx.run(&query), pairs(&[("John", "Doe")]));
    assert_eq!(ctx.cache.len(), 2);
}

#[test]
fn test_nested_member_through_null() {
    let ctx = TestContext::new();
    let query = Query::filter_by(FilterNode::dynamic("p", r#"p.Address.City == "Paris""#).unwrap())
        .order_by(FIRST_NAME);

    assert_eq!(ctx.run(&query), pairs(&[("Jane", "Smith"), ("John", "Doe")]));

    let homeless = Query::filter_by(FilterNode::dynamic("p", "p.Address == null").unwrap());
    assert_eq!(ctx.run(&homeless), pairs(&[("Jane", "Doe")]));
}

#[test]
fn test_compile_errors() {
    let ctx = TestContext::new();
    let translator = ctx.translator();

    let not_boolean = FilterNode::dynamic("x", "FirstName").unwrap();
    assert!(matches!(
        translator.predicate(&not_boolean),
        Err(Error::Translation(TranslationError::NotBoolean { .. }))
    ));

    let malformed = FilterNode::dynamic("x", "FirstName ==").unwrap();
    assert!(matches!(
        translator.predicate(&malformed),
        Err(Error::Translation(TranslationError::Parse(_)))
    ));
    assert!(ctx.cache.is_empty());
}

#[test]
fn test_empty_page() {
    let ctx = TestContext::new();
    let source = InMemorySource::new(&ctx.people, ctx.translator());
    let request = PageRequest::new(1, 10)
        .unwrap()
        .filter_by(LAST_NAME.eq("Nobody"));

    let page = PaginationExecutor::new(&source).execute(&request).unwrap();
    assert_eq!(page.total_items(), 0);
    assert_eq!(page.total_pages(), 0);
    assert!(page.items().is_empty());
}

#[test]
fn test_paged_dynamic_query() {
    let ctx = TestContext::new();
    let source = InMemorySource::new(&ctx.people, ctx.translator());
    let text = r#"x.LastName.StartsWith("S") || x.FirstName == "John""#;
    let request = PageRequest::new(2, 1)
        .unwrap()
        .filter_by(FilterNode::dynamic("x", text).unwrap())
        .order_by_name("FirstName")
        .unwrap()
        .order_by_name_descending("LastName")
        .unwrap();

    let page = PaginationExecutor::new(&source).execute(&request).unwrap();
    assert_eq!(page.total_items(), 3);
    assert_eq!(page.total_pages(), 3);
    assert_eq!(page.items()[0].first_name, "John");
    assert_eq!(page.items()[0].last_name, "Smith");
}

#[test]
fn test_sort_by_name_without_mapper() {
    let ctx = TestContext::new();
    let strict = ExpressionTranslator::<Person>::new(QueryConfig::strict());
    let query = Query::all().order_by_name("LastName").unwrap();

    match strict.apply(&query, ctx.people.clone()) {
        Err(Error::NotSupported(err)) => {
            assert_eq!(err.field(), Some("LastName"));
            assert!(err.to_string().contains("LastName"));
        }
        other => panic!("expected NotSupported, got {other:?}"),
    }
}

#[test]
fn test_retarget_onto_records() {
    let ctx = TestContext::new();
    let records: Vec<Record> = ctx
        .people
        .iter()
        .map(|p| {
            Record::new()
                .with("FirstName", p.first_name.as_str())
                .with("LastName", p.last_name.as_str())
        })
        .collect();
    let translator = ExpressionTranslator::<Record>::new(QueryConfig::default())
        .with_shape(Shape::infer("Row", &records));

    let typed: FilterNode<Person> = FIRST_NAME.eq("Jane").and(LAST_NAME.starts_with("Sm")).into();
    let predicate = translator.predicate_from(&typed).unwrap();
    let matched: Vec<_> = records.iter().filter(|r| predicate.test(r)).collect();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].get("LastName"), Some(&Value::from("Smith")));

    let nested: FilterNode<Person> = FilterNode::from(FIRST_NAME.eq("Jane"))
        .combine(FilterNode::dynamic("x", "x.Address.City == \"Oslo\"").unwrap());
    let retargeted = translator.retarget(&nested).unwrap();
    assert!(matches!(
        translator.predicate(&retargeted),
        Err(Error::Translation(TranslationError::Parse(_)))
    ));
}

#[test]
fn test_document_translation() {
    let ctx = TestContext::new();
    let mapper = NativeFieldMap::new()
        .with("FirstName", "first_name")
        .with("LastName", "last_name")
        .with("Address.City", "address.city");
    let translator = DocumentTranslator::<Person>::new()
        .with_cache(&ctx.cache)
        .with_mapper(&mapper);

    let request = PageRequest::new(2, 25)
        .unwrap()
        .filter_by(FIRST_NAME.ne("Jane"))
        .and(FilterNode::dynamic("x", r#"x.Address.City == "Paris""#).unwrap())
        .order_by(LAST_NAME)
        .order_by_descending(FIRST_NAME);

    let lowered = translator.page(&request).unwrap();
    assert_eq!(
        lowered.to_json(),
        json!({
            "filter": {"$and": [
                {"first_name": {"$ne": "Jane"}},
                {"address.city": {"$eq": "Paris"}},
            ]},
            "sort": {"last_name": 1, "first_name": -1},
            "skip": 25,
            "limit": 25,
        })
    );
}

#[test]
fn test_shared_cache_across_translators() {
    let ctx = TestContext::new();
    let text = r#"x.LastName == "Doe""#;
    let filter = FilterNode::dynamic("x", text).unwrap();

    ctx.translator().predicate(&filter).unwrap();
    DocumentTranslator::<Person>::new()
        .with_cache(&ctx.cache)
        .filter(&filter)
        .unwrap();

    assert_eq!(ctx.cache.len(), 1);
    assert_eq!(ctx.cache.stats().hits(), 1);
    assert_eq!(ctx.cache.stats().writes(), 1);
}
