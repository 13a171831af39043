//! Subcommand arguments and their implementations.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{ArgMatches, Args};
use quarry_core::lang::{self, MemoryPredicateCache};
use quarry_core::model::{FilterNode, PageRequest, Query, Record, Shape};
use quarry_core::{
    DocumentTranslator, Error, ExpressionTranslator, InMemorySource, PaginationExecutor,
    QueryConfig, DEFAULT_PARAMETER,
};
use tracing::{debug, info};

use crate::error::CliError;
use crate::formatter::{format_page, OutputFormat};

/// Data file, filters, ordering and page window shared by `query` and
/// `translate`.
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// JSON file holding an array of objects
    #[arg(short, long)]
    pub data: PathBuf,

    /// Filter expression; repeat to AND several together
    #[arg(short = 'w', long = "where", value_name = "EXPR")]
    pub filters: Vec<String>,

    /// Parameter name used in filter expressions
    #[arg(long, default_value = DEFAULT_PARAMETER)]
    pub param: String,

    /// Sort ascending by member; repeatable
    #[arg(long, value_name = "MEMBER")]
    pub order_by: Vec<String>,

    /// Sort descending by member; repeatable
    #[arg(long, value_name = "MEMBER")]
    pub order_by_desc: Vec<String>,

    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Items per page
    #[arg(long, default_value_t = 20)]
    pub size: u32,

    /// Sort keys in command-line order, filled from the parsed matches
    #[arg(skip)]
    pub sort: Vec<SortKey>,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// JSON file whose objects define the shape
    #[arg(long, value_name = "FILE")]
    pub shape_from: PathBuf,

    /// Expression to check; repeatable
    #[arg(short = 'w', long = "where", value_name = "EXPR", required = true)]
    pub filters: Vec<String>,

    /// Parameter name used in the expressions
    #[arg(long, default_value = DEFAULT_PARAMETER)]
    pub param: String,
}

/// One sort key from `--order-by` or `--order-by-desc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub member: String,
    pub ascending: bool,
}

impl SelectionArgs {
    /// Interleave `--order-by` and `--order-by-desc` in the order given.
    pub fn resolve_sort(&mut self, matches: &ArgMatches) {
        let mut keyed: Vec<(usize, SortKey)> = Vec::new();
        for (id, ascending) in [("order_by", true), ("order_by_desc", false)] {
            let (Some(values), Some(indices)) =
                (matches.get_many::<String>(id), matches.indices_of(id))
            else {
                continue;
            };
            keyed.extend(indices.zip(values).map(|(index, member)| {
                (
                    index,
                    SortKey {
                        member: member.clone(),
                        ascending,
                    },
                )
            }));
        }
        keyed.sort_by_key(|(index, _)| *index);
        self.sort = keyed.into_iter().map(|(_, key)| key).collect();
    }

    /// Sort keys to apply: the resolved order when present, otherwise
    /// ascending keys followed by descending ones.
    fn sort_keys(&self) -> Vec<SortKey> {
        if !self.sort.is_empty() {
            return self.sort.clone();
        }
        let ascending = self.order_by.iter().map(|member| SortKey {
            member: member.clone(),
            ascending: true,
        });
        let descending = self.order_by_desc.iter().map(|member| SortKey {
            member: member.clone(),
            ascending: false,
        });
        ascending.chain(descending).collect()
    }
}

/// Load a JSON array of objects as records.
pub fn load_records(path: &Path) -> Result<Vec<Record>, CliError> {
    let content = fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let json: serde_json::Value = serde_json::from_str(&content).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let serde_json::Value::Array(rows) = json else {
        return Err(CliError::InvalidData {
            path: path.to_path_buf(),
            message: "expected a JSON array of objects".to_string(),
        });
    };

    rows.into_iter()
        .enumerate()
        .map(|(index, row)| match row {
            serde_json::Value::Object(map) => Ok(Record::from_json_object(map)),
            other => Err(CliError::InvalidData {
                path: path.to_path_buf(),
                message: format!("element {index} is not an object: {other}"),
            }),
        })
        .collect()
}

/// Shape named after the file stem.
fn infer_shape(path: &Path, records: &[Record]) -> Shape {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("Record");
    let shape = Shape::infer(name, records);
    debug!(shape = shape.name(), members = shape.fields().len(), "inferred shape");
    shape
}

fn diagnostic(err: Error, text: &str) -> CliError {
    match err {
        Error::Translation(err) => CliError::Diagnostic(err.format_with_source(text)),
        other => CliError::Query(other),
    }
}

/// Build the page request for `args`, checking every filter against the shape.
fn build_request(
    args: &SelectionArgs,
    translator: &ExpressionTranslator<'_, Record>,
) -> Result<PageRequest<Record>, CliError> {
    let mut query = Query::all();
    for text in &args.filters {
        let filter: FilterNode<Record> =
            translator.parse_filter(text).map_err(|err| diagnostic(err, text))?;
        query = query.and(filter);
    }
    for key in args.sort_keys() {
        query = if key.ascending {
            query.order_by_name(key.member)?
        } else {
            query.order_by_name_descending(key.member)?
        };
    }
    Ok(PageRequest::for_query(query, args.page, args.size)?)
}

fn translator_for<'a>(
    args: &SelectionArgs,
    shape: Shape,
    cache: &'a MemoryPredicateCache,
) -> ExpressionTranslator<'a, Record> {
    let config = QueryConfig::default().with_default_parameter(args.param.as_str());
    ExpressionTranslator::new(config)
        .with_shape(shape)
        .with_cache(cache)
}

/// `quarry query`: run the page request in memory and format the result.
pub fn run_query(args: &QueryArgs) -> Result<String, CliError> {
    let selection = &args.selection;
    let records = load_records(&selection.data)?;
    let shape = infer_shape(&selection.data, &records);

    let cache = MemoryPredicateCache::new();
    let translator = translator_for(selection, shape, &cache);
    let request = build_request(selection, &translator)?;

    let source = InMemorySource::new(&records, translator);
    let page = PaginationExecutor::new(&source).execute(&request)?;
    info!(
        records = records.len(),
        matched = page.total_items(),
        "query complete"
    );
    Ok(format_page(&page, args.format))
}

/// `quarry translate`: print the document form of the page request.
pub fn run_translate(args: &SelectionArgs) -> Result<String, CliError> {
    let records = load_records(&args.data)?;
    let shape = infer_shape(&args.data, &records);

    let cache = MemoryPredicateCache::new();
    let translator = translator_for(args, shape.clone(), &cache);
    let request = build_request(args, &translator)?;

    let lowered = DocumentTranslator::<Record>::new()
        .with_shape(shape)
        .with_cache(&cache)
        .page(&request)?;
    Ok(serde_json::to_string_pretty(&lowered.to_json()).unwrap_or_else(|_| "{}".to_string()))
}

/// `quarry check`: compile each expression and report the first failure.
pub fn run_check(args: &CheckArgs) -> Result<String, CliError> {
    let records = load_records(&args.shape_from)?;
    let shape = infer_shape(&args.shape_from, &records);

    let mut report = Vec::with_capacity(args.filters.len());
    for text in &args.filters {
        lang::compile(&shape, &args.param, text)
            .map_err(|err| CliError::Diagnostic(err.format_with_source(text)))?;
        report.push(format!("ok: {text}"));
    }
    Ok(report.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PEOPLE: &str = r#"[
        {"FirstName": "John", "LastName": "Doe", "Age": 40},
        {"FirstName": "Jane", "LastName": "Doe", "Age": 35},
        {"FirstName": "John", "LastName": "Smith", "Age": 28},
        {"FirstName": "Jane", "LastName": "Smith", "Age": 52}
    ]"#;

    fn data_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn selection(file: &NamedTempFile) -> SelectionArgs {
        SelectionArgs {
            data: file.path().to_path_buf(),
            filters: Vec::new(),
            param: DEFAULT_PARAMETER.to_string(),
            order_by: Vec::new(),
            order_by_desc: Vec::new(),
            page: 1,
            size: 20,
            sort: Vec::new(),
        }
    }

    fn json_query(selection: SelectionArgs) -> serde_json::Value {
        let output = run_query(&QueryArgs {
            selection,
            format: OutputFormat::Json,
        })
        .unwrap();
        serde_json::from_str(&output).unwrap()
    }

    #[test]
    fn test_load_records() {
        let file = data_file(PEOPLE);
        let records = load_records(file.path()).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].get("Age").and_then(|v| v.as_i64()), Some(40));
    }

    #[test]
    fn test_load_rejects_non_arrays() {
        let file = data_file(r#"{"FirstName": "John"}"#);
        assert!(matches!(
            load_records(file.path()),
            Err(CliError::InvalidData { .. })
        ));

        let file = data_file("[1, 2]");
        assert!(matches!(
            load_records(file.path()),
            Err(CliError::InvalidData { .. })
        ));

        let file = data_file("[{");
        assert!(matches!(load_records(file.path()), Err(CliError::Json { .. })));

        assert!(matches!(
            load_records(Path::new("/definitely/not/here.json")),
            Err(CliError::Io { .. })
        ));
    }

    #[test]
    fn test_query_filters_and_sorts() {
        let file = data_file(PEOPLE);
        let mut args = selection(&file);
        args.filters = vec!["x.Age > 30".to_string(), r#"LastName == "Doe""#.to_string()];
        args.order_by = vec!["FirstName".to_string()];

        let result = json_query(args);
        assert_eq!(result["total_items"], 2);
        assert_eq!(result["items"][0]["FirstName"], "Jane");
        assert_eq!(result["items"][1]["FirstName"], "John");
    }

    #[test]
    fn test_query_mixed_sort_order() {
        let file = data_file(PEOPLE);
        let mut args = selection(&file);
        args.sort = vec![
            SortKey {
                member: "FirstName".to_string(),
                ascending: true,
            },
            SortKey {
                member: "LastName".to_string(),
                ascending: false,
            },
        ];

        let result = json_query(args);
        let names: Vec<String> = (0..4)
            .map(|i| {
                format!(
                    "{} {}",
                    result["items"][i]["FirstName"].as_str().unwrap(),
                    result["items"][i]["LastName"].as_str().unwrap()
                )
            })
            .collect();
        assert_eq!(names, vec!["Jane Smith", "Jane Doe", "John Smith", "John Doe"]);
    }

    #[test]
    fn test_query_page_window() {
        let file = data_file(PEOPLE);
        let mut args = selection(&file);
        args.order_by_desc = vec!["Age".to_string()];
        args.page = 2;
        args.size = 3;

        let result = json_query(args);
        assert_eq!(result["total_pages"], 2);
        assert_eq!(result["items"].as_array().unwrap().len(), 1);
        assert_eq!(result["items"][0]["Age"], 28);
    }

    #[test]
    fn test_query_custom_parameter() {
        let file = data_file(PEOPLE);
        let mut args = selection(&file);
        args.param = "p".to_string();
        args.filters = vec!["p.FirstName.StartsWith(\"Ja\")".to_string()];

        let result = json_query(args);
        assert_eq!(result["total_items"], 2);
    }

    #[test]
    fn test_query_reports_diagnostic() {
        let file = data_file(PEOPLE);
        let mut args = selection(&file);
        args.filters = vec!["x.Age = 3".to_string()];

        let err = run_query(&QueryArgs {
            selection: args,
            format: OutputFormat::Table,
        })
        .unwrap_err();
        match err {
            CliError::Diagnostic(text) => assert!(text.contains("==")),
            other => panic!("expected diagnostic, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_page_size_is_rejected() {
        let file = data_file(PEOPLE);
        let mut args = selection(&file);
        args.size = 0;
        assert!(matches!(
            run_translate(&args),
            Err(CliError::Construction(_))
        ));
    }

    #[test]
    fn test_translate() {
        let file = data_file(PEOPLE);
        let mut args = selection(&file);
        args.filters = vec!["x.Age >= 30 && x.LastName != \"Smith\"".to_string()];
        args.order_by = vec!["LastName".to_string()];
        args.page = 2;
        args.size = 10;

        let output = run_translate(&args).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!({
                "filter": {"$and": [
                    {"Age": {"$gte": 30}},
                    {"LastName": {"$ne": "Smith"}},
                ]},
                "sort": {"LastName": 1},
                "skip": 10,
                "limit": 10,
            })
        );
    }

    #[test]
    fn test_check() {
        let file = data_file(PEOPLE);
        let ok = run_check(&CheckArgs {
            shape_from: file.path().to_path_buf(),
            filters: vec!["x.Age > 1".to_string(), "FirstName.Length < 10".to_string()],
            param: DEFAULT_PARAMETER.to_string(),
        })
        .unwrap();
        assert_eq!(ok, "ok: x.Age > 1\nok: FirstName.Length < 10");

        let err = run_check(&CheckArgs {
            shape_from: file.path().to_path_buf(),
            filters: vec!["x.Salary > 1".to_string()],
            param: DEFAULT_PARAMETER.to_string(),
        })
        .unwrap_err();
        match err {
            CliError::Diagnostic(text) => {
                assert!(text.contains("Salary"));
                assert!(text.contains('^'));
            }
            other => panic!("expected diagnostic, got {other:?}"),
        }
    }
}
