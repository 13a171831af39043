//! In-memory translation: filters become predicates, sorts become
//! comparators, both callable directly over `T`.

use std::fmt;
use std::sync::Arc;

use quarry_lang::{DynamicCompiler, PredicateCache};
use quarry_model::{
    Accessor, Comparator, Entity, Expr, FilterNode, NotSupportedError, Predicate, Query, Shape,
    ShapeMismatchError, SortNode, SortTarget,
};
use tracing::debug;

use crate::config::{NameResolution, QueryConfig};
use crate::error::Result;
use crate::mapper::FieldMapper;

/// Translates query nodes over `T` into in-memory predicates and comparators.
///
/// The shape defaults to `T::shape()`. Types whose layout is only known at
/// runtime, such as [`Record`](quarry_model::Record), supply it through
/// [`with_shape`](Self::with_shape).
pub struct ExpressionTranslator<'a, T> {
    config: QueryConfig,
    shape: Shape,
    compiler: DynamicCompiler<'a>,
    mapper: Option<&'a dyn FieldMapper<T>>,
}

impl<'a, T: Entity + 'static> ExpressionTranslator<'a, T> {
    pub fn new(config: QueryConfig) -> Self {
        Self {
            config,
            shape: T::shape(),
            compiler: DynamicCompiler::new(),
            mapper: None,
        }
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_cache(mut self, cache: &'a dyn PredicateCache) -> Self {
        self.compiler = self.compiler.with_cache(cache);
        self
    }

    pub fn with_mapper(mut self, mapper: &'a dyn FieldMapper<T>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Build a predicate for `filter`.
    ///
    /// `Combined` children are tested left to right and stop at the first
    /// failure, so a later child may rely on an earlier one having passed.
    pub fn predicate(&self, filter: &FilterNode<T>) -> Result<Predicate<T>> {
        match filter {
            FilterNode::Empty => Ok(Predicate::always()),
            FilterNode::Expression(expr) => {
                let expr = expr.clone();
                Ok(Predicate::new(move |entity: &T| expr.evaluate(entity)))
            }
            FilterNode::Combined(children) => {
                let predicates = children
                    .iter()
                    .map(|child| self.predicate(child))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Predicate::all(predicates))
            }
            FilterNode::Dynamic { parameter, text } => {
                let compiled = self.compiler.compile(&self.shape, parameter, text)?;
                Ok(Predicate::new(move |entity: &T| compiled.test(entity)))
            }
            FilterNode::Native(native) => Err(NotSupportedError::new(format!(
                "native filter for backend '{}' cannot be evaluated in memory",
                native.backend()
            ))
            .into()),
        }
    }

    /// Build a comparator for `sort`. Keys compare lexicographically in order.
    pub fn comparator(&self, sort: &SortNode<T>) -> Result<Comparator<T>> {
        let keys = sort
            .keys()
            .into_iter()
            .map(|key| -> Result<Comparator<T>> {
                let accessor = match key.target {
                    SortTarget::Expression(accessor) => accessor.clone(),
                    SortTarget::Name(name) => self.resolve_name(name.as_str())?,
                };
                let comparator = Comparator::new(move |a: &T, b: &T| {
                    accessor.read(a).sort_cmp(&accessor.read(b))
                });
                Ok(if key.ascending {
                    comparator
                } else {
                    comparator.reversed()
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Comparator::chain(keys))
    }

    /// Filter `items`, then stable-sort the survivors.
    pub fn apply(&self, query: &Query<T>, items: impl IntoIterator<Item = T>) -> Result<Vec<T>> {
        let predicate = self.predicate(query.filter())?;
        let comparator = query.sort().map(|sort| self.comparator(sort)).transpose()?;

        let mut matched: Vec<T> = items.into_iter().filter(|item| predicate.test(item)).collect();
        if let Some(comparator) = comparator {
            comparator.sort(&mut matched);
        }
        debug!(
            shape = self.shape.name(),
            filter = query.filter().kind(),
            matched = matched.len(),
            "applied query"
        );
        Ok(matched)
    }

    /// Like [`apply`](Self::apply) but borrows the items.
    pub fn apply_refs<'b>(&self, query: &Query<T>, items: &'b [T]) -> Result<Vec<&'b T>> {
        let predicate = self.predicate(query.filter())?;
        let comparator = query.sort().map(|sort| self.comparator(sort)).transpose()?;

        let mut matched: Vec<&T> = items.iter().filter(|item| predicate.test(item)).collect();
        if let Some(comparator) = comparator {
            matched.sort_by(|a, b| comparator.compare(a, b));
        }
        Ok(matched)
    }

    /// Rebuild a filter written for shape `S` over this translator's shape.
    ///
    /// Every member an expression reads must exist on the target shape with a
    /// compatible type. Dynamic and native nodes carry no accessors and are
    /// passed through; dynamic text is checked when the result is translated.
    pub fn retarget<S>(&self, filter: &FilterNode<S>) -> Result<FilterNode<T>> {
        match filter {
            FilterNode::Empty => Ok(FilterNode::Empty),
            FilterNode::Expression(expr) => Ok(FilterNode::Expression(self.retarget_expr(expr)?)),
            FilterNode::Combined(children) => {
                let children = children
                    .iter()
                    .map(|child| self.retarget(child))
                    .collect::<Result<Vec<_>>>()?;
                Ok(FilterNode::combined(children)?)
            }
            FilterNode::Dynamic { parameter, text } => Ok(FilterNode::Dynamic {
                parameter: parameter.clone(),
                text: text.clone(),
            }),
            FilterNode::Native(native) => Ok(FilterNode::Native(native.clone())),
        }
    }

    /// Predicate over `T` for a filter written against another shape.
    pub fn predicate_from<S>(&self, filter: &FilterNode<S>) -> Result<Predicate<T>> {
        self.predicate(&self.retarget(filter)?)
    }

    /// A dynamic filter over the default parameter, checked immediately.
    pub fn parse_filter(&self, text: &str) -> Result<FilterNode<T>> {
        let parameter = self.config.default_parameter.as_str();
        let node = FilterNode::dynamic(parameter, text)?;
        self.compiler.compile(&self.shape, parameter, text)?;
        Ok(node)
    }

    fn resolve_name(&self, name: &str) -> Result<Accessor<T>> {
        if let Some(mapper) = self.mapper {
            return mapper.resolve(name).ok_or_else(|| {
                NotSupportedError::for_field(
                    name,
                    format!("field mapper has no member '{name}' for sorting"),
                )
                .into()
            });
        }

        match self.config.name_resolution {
            NameResolution::MapperRequired => Err(NotSupportedError::for_field(
                name,
                format!("sorting by name '{name}' requires a field mapper"),
            )
            .into()),
            NameResolution::Reflection => {
                let field_type = self.shape.resolve(name).ok_or_else(|| {
                    NotSupportedError::for_field(
                        name,
                        format!("shape '{}' has no member '{name}'", self.shape.name()),
                    )
                })?;
                Ok(Accessor::named(name, field_type))
            }
        }
    }

    fn retarget_expr<S>(&self, expr: &Expr<S>) -> Result<Expr<T>> {
        Ok(match expr {
            Expr::Compare { field, op, value } => Expr::Compare {
                field: self.retarget_accessor(field)?,
                op: *op,
                value: value.clone(),
            },
            Expr::Member(field) => Expr::Member(self.retarget_accessor(field)?),
            Expr::Call {
                field,
                method,
                argument,
            } => Expr::Call {
                field: self.retarget_accessor(field)?,
                method: *method,
                argument: argument.clone(),
            },
            Expr::And(left, right) => Expr::And(
                Box::new(self.retarget_expr(left)?),
                Box::new(self.retarget_expr(right)?),
            ),
            Expr::Or(left, right) => Expr::Or(
                Box::new(self.retarget_expr(left)?),
                Box::new(self.retarget_expr(right)?),
            ),
            Expr::Not(inner) => Expr::Not(Box::new(self.retarget_expr(inner)?)),
            Expr::Opaque { label, .. } => {
                return Err(NotSupportedError::new(format!(
                    "opaque expression '{label}' cannot be moved to shape '{}'",
                    self.shape.name()
                ))
                .into())
            }
        })
    }

    fn retarget_accessor<S>(&self, accessor: &Accessor<S>) -> Result<Accessor<T>> {
        let path = accessor.path();
        let found = self
            .shape
            .resolve(path)
            .ok_or_else(|| ShapeMismatchError::missing(path, self.shape.name()))?;
        if !accessor.field_type().is_compatible_with(&found) {
            return Err(ShapeMismatchError::incompatible(
                path,
                self.shape.name(),
                accessor.field_type(),
                &found,
            )
            .into());
        }
        Ok(Accessor::named(Arc::<str>::from(path), found))
    }
}

impl<T> fmt::Debug for ExpressionTranslator<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionTranslator")
            .field("config", &self.config)
            .field("shape", &self.shape.name())
            .field("compiler", &self.compiler)
            .field("mapper", &self.mapper.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::mapper::FieldMap;
    use pretty_assertions::assert_eq;
    use quarry_lang::{MemoryPredicateCache, TranslationError};
    use quarry_model::{Field, FieldDef, NativeFilter, Record, ScalarType, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    struct Person {
        first_name: String,
        last_name: String,
        age: i64,
        nickname: Option<String>,
    }

    impl Entity for Person {
        fn shape() -> Shape {
            Shape::new("Person").with_fields([
                FieldDef::scalar("FirstName", ScalarType::String),
                FieldDef::scalar("LastName", ScalarType::String),
                FieldDef::scalar("Age", ScalarType::Int),
                FieldDef::optional("Nickname", ScalarType::String),
            ])
        }

        fn field(&self, name: &str) -> Option<Value> {
            match name {
                "FirstName" => Some(self.first_name.clone().into()),
                "LastName" => Some(self.last_name.clone().into()),
                "Age" => Some(self.age.into()),
                "Nickname" => Some(self.nickname.clone().into()),
                _ => None,
            }
        }
    }

    /// Same member names as `Person` minus the nickname, with a float age.
    #[derive(Debug, Clone)]
    struct Employee {
        first_name: String,
        last_name: String,
        age: f64,
    }

    impl Entity for Employee {
        fn shape() -> Shape {
            Shape::new("Employee").with_fields([
                FieldDef::scalar("FirstName", ScalarType::String),
                FieldDef::scalar("LastName", ScalarType::String),
                FieldDef::scalar("Age", ScalarType::Float),
            ])
        }

        fn field(&self, name: &str) -> Option<Value> {
            match name {
                "FirstName" => Some(self.first_name.clone().into()),
                "LastName" => Some(self.last_name.clone().into()),
                "Age" => Some(self.age.into()),
                _ => None,
            }
        }
    }

    /// Has `LastName` but as a number.
    struct Ticket;

    impl Entity for Ticket {
        fn shape() -> Shape {
            Shape::new("Ticket").with_field(FieldDef::scalar("LastName", ScalarType::Int))
        }

        fn field(&self, name: &str) -> Option<Value> {
            (name == "LastName").then_some(Value::Int(0))
        }
    }

    const FIRST_NAME: Field<Person, String> = Field::new("FirstName", |p| p.first_name.clone());
    const LAST_NAME: Field<Person, String> = Field::new("LastName", |p| p.last_name.clone());
    const AGE: Field<Person, i64> = Field::new("Age", |p| p.age);
    const NICKNAME: Field<Person, Option<String>> = Field::new("Nickname", |p| p.nickname.clone());

    fn person(first: &str, last: &str, age: i64) -> Person {
        Person {
            first_name: first.to_string(),
            last_name: last.to_string(),
            age,
            nickname: None,
        }
    }

    fn people() -> Vec<Person> {
        vec![
            person("John", "Doe", 40),
            person("Jane", "Doe", 35),
            person("John", "Smith", 28),
            person("Jane", "Smith", 52),
        ]
    }

    fn names(items: &[Person]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|p| (p.first_name.clone(), p.last_name.clone()))
            .collect()
    }

    fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
        expected
            .iter()
            .map(|(f, l)| (f.to_string(), l.to_string()))
            .collect()
    }

    fn translator() -> ExpressionTranslator<'static, Person> {
        ExpressionTranslator::new(QueryConfig::default())
    }

    #[test]
    fn test_empty_matches_everything() {
        let predicate = translator().predicate(&FilterNode::Empty).unwrap();
        assert!(people().iter().all(|p| predicate.test(p)));
    }

    #[test]
    fn test_expression_filter() {
        let query = Query::filter_by(AGE.gt(30).and(LAST_NAME.eq("Doe")));
        let result = translator().apply(&query, people()).unwrap();
        assert_eq!(names(&result), pairs(&[("John", "Doe"), ("Jane", "Doe")]));
    }

    #[test]
    fn test_combined_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let filter = FilterNode::combined(vec![
            FIRST_NAME.eq("John").into(),
            Expr::opaque("count", move |_: &Person| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            })
            .into(),
        ])
        .unwrap();

        let predicate = translator().predicate(&filter).unwrap();
        let matched = people().into_iter().filter(|p| predicate.test(p)).count();

        assert_eq!(matched, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_null_guard_before_dereference() {
        let mut nicknamed = person("Ada", "Lovelace", 36);
        nicknamed.nickname = Some("Countess".to_string());
        let items = vec![person("Alan", "Turing", 41), nicknamed];

        let filter = FilterNode::combined(vec![
            NICKNAME.is_not_null().into(),
            Expr::opaque("nickname length", |p: &Person| {
                p.nickname.as_ref().map(String::len).unwrap_or_default() > 3
            })
            .into(),
        ])
        .unwrap();
        let result = translator().apply(&Query::filter_by(filter), items).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].first_name, "Ada");
    }

    #[test]
    fn test_multi_key_sort() {
        let query = Query::all()
            .order_by(FIRST_NAME)
            .order_by_descending(LAST_NAME);
        let result = translator().apply(&query, people()).unwrap();
        assert_eq!(
            names(&result),
            pairs(&[
                ("Jane", "Smith"),
                ("Jane", "Doe"),
                ("John", "Smith"),
                ("John", "Doe"),
            ])
        );
    }

    #[test]
    fn test_sort_is_stable() {
        let query = Query::all().order_by(LAST_NAME);
        let result = translator().apply(&query, people()).unwrap();
        assert_eq!(
            names(&result),
            pairs(&[
                ("John", "Doe"),
                ("Jane", "Doe"),
                ("John", "Smith"),
                ("Jane", "Smith"),
            ])
        );
    }

    #[test]
    fn test_dynamic_filters_combine() {
        let query = Query::filter_by(FilterNode::dynamic("x", r#"x.FirstName == "John""#).unwrap())
            .and(FilterNode::dynamic("x", r#"x.LastName == "Doe""#).unwrap());
        let result = translator().apply(&query, people()).unwrap();
        assert_eq!(names(&result), pairs(&[("John", "Doe")]));
    }

    #[test]
    fn test_dynamic_errors_surface() {
        let not_boolean = FilterNode::dynamic("x", "FirstName").unwrap();
        assert!(matches!(
            translator().predicate(&not_boolean),
            Err(Error::Translation(TranslationError::NotBoolean { .. }))
        ));

        let malformed = FilterNode::dynamic("x", "FirstName ==").unwrap();
        assert!(matches!(
            translator().predicate(&malformed),
            Err(Error::Translation(TranslationError::Parse(_)))
        ));
    }

    #[test]
    fn test_dynamic_uses_cache() {
        let cache = MemoryPredicateCache::new();
        let translator =
            ExpressionTranslator::<Person>::new(QueryConfig::default()).with_cache(&cache);
        let filter = FilterNode::dynamic("x", "x.Age > 30").unwrap();

        translator.predicate(&filter).unwrap();
        translator.predicate(&filter).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().hits(), 1);
    }

    #[test]
    fn test_native_not_supported() {
        let filter = FilterNode::native(NativeFilter::new("document", 1_u8));
        assert!(matches!(
            translator().predicate(&filter),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn test_sort_by_name_with_reflection() {
        let query = Query::all().order_by_name_descending("Age").unwrap();
        let result = translator().apply(&query, people()).unwrap();
        let ages: Vec<i64> = result.iter().map(|p| p.age).collect();
        assert_eq!(ages, vec![52, 40, 35, 28]);
    }

    #[test]
    fn test_sort_by_name_requires_mapper() {
        let translator = ExpressionTranslator::<Person>::new(QueryConfig::strict());
        let sort = SortNode::by_name("LastName", true).unwrap();
        match translator.comparator(&sort) {
            Err(Error::NotSupported(err)) => assert_eq!(err.field(), Some("LastName")),
            other => panic!("expected NotSupported, got {other:?}"),
        }
    }

    #[test]
    fn test_sort_by_name_through_mapper() {
        let mapper = FieldMap::new().with("surname", LAST_NAME).with("given", FIRST_NAME);
        let translator =
            ExpressionTranslator::<Person>::new(QueryConfig::strict()).with_mapper(&mapper);

        let query = Query::all()
            .order_by_name("surname")
            .unwrap()
            .order_by_name("given")
            .unwrap();
        let result = translator.apply(&query, people()).unwrap();
        assert_eq!(
            names(&result),
            pairs(&[
                ("Jane", "Doe"),
                ("John", "Doe"),
                ("Jane", "Smith"),
                ("John", "Smith"),
            ])
        );

        let unknown = SortNode::by_name("LastName", true).unwrap();
        match translator.comparator(&unknown) {
            Err(Error::NotSupported(err)) => assert_eq!(err.field(), Some("LastName")),
            other => panic!("expected NotSupported, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_name_with_reflection() {
        let sort = SortNode::by_name("Salary", true).unwrap();
        assert!(matches!(
            translator().comparator(&sort),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn test_retarget_to_compatible_shape() {
        let filter: FilterNode<Person> = FIRST_NAME.eq("John").and(AGE.ge(30)).into();
        let translator = ExpressionTranslator::<Employee>::new(QueryConfig::default());
        let predicate = translator.predicate_from(&filter).unwrap();

        let senior = Employee {
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            age: 44.5,
        };
        let junior = Employee {
            age: 21.0,
            ..senior.clone()
        };
        assert!(predicate.test(&senior));
        assert!(!predicate.test(&junior));
    }

    #[test]
    fn test_retarget_missing_member() {
        let filter: FilterNode<Person> = NICKNAME.is_null().into();
        let translator = ExpressionTranslator::<Employee>::new(QueryConfig::default());
        match translator.retarget(&filter) {
            Err(Error::Translation(TranslationError::ShapeMismatch(err))) => {
                assert_eq!(err.member, "Nickname");
                assert_eq!(err.shape, "Employee");
            }
            other => panic!("expected ShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_retarget_incompatible_member() {
        let filter: FilterNode<Person> = LAST_NAME.eq("Doe").into();
        let translator = ExpressionTranslator::<Ticket>::new(QueryConfig::default());
        let err = translator.retarget(&filter).unwrap_err();
        assert!(matches!(
            err,
            Error::Translation(TranslationError::ShapeMismatch(_))
        ));
        assert!(err.to_string().contains("LastName"));
    }

    #[test]
    fn test_retarget_opaque_not_supported() {
        let filter: FilterNode<Person> = Expr::opaque("adult", |p: &Person| p.age >= 18).into();
        let translator = ExpressionTranslator::<Employee>::new(QueryConfig::default());
        assert!(matches!(
            translator.retarget(&filter),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn test_records_with_runtime_shape() {
        let records = vec![
            Record::new().with("Name", "b").with("Score", 2),
            Record::new().with("Name", "a").with("Score", 9),
            Record::new().with("Name", "c").with("Score", 5),
        ];
        let shape = Shape::infer("Row", &records);
        let translator =
            ExpressionTranslator::<Record>::new(QueryConfig::default()).with_shape(shape);

        let query = Query::filter_by(translator.parse_filter("Score > 3").unwrap())
            .order_by_name("Name")
            .unwrap();
        let result = translator.apply_refs(&query, &records).unwrap();
        let names: Vec<_> = result
            .iter()
            .filter_map(|r| r.get("Name").and_then(Value::as_str))
            .collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_parse_filter_validates_eagerly() {
        assert!(translator().parse_filter("x.Age > 1").is_ok());
        assert!(translator().parse_filter("x.Salary > 1").is_err());
        assert!(matches!(
            translator().parse_filter("  "),
            Err(Error::Construction(_))
        ));
    }
}
