//! Partsearch Core Integration Tests

use partsearch_core::{
    Error,
    config::{Config, SearchConfig},
    search::{
        self, Filter, FormValues, Number, Prefix, PrefixPolicy, Range, SearchError,
        SearchOutcome, SearchService, SqlArg, TokenKind,
    },
    storage::{Catalog, Database, NewPart},
};

async fn seeded_service() -> (Database, SearchService) {
    let db = Database::in_memory().await.unwrap();
    let service = SearchService::from_config(&db, &Config::default()).unwrap();
    let catalog: &Catalog = service.catalog();

    let resistors = catalog
        .insert_category("Resistor", Some("Ohm"), Some("Ω"))
        .await
        .unwrap();
    let capacitors = catalog
        .insert_category("Capacitor", Some("Farad"), Some("F"))
        .await
        .unwrap();
    let shelf = catalog.insert_place("Shelf 1").await.unwrap();
    let bin = catalog.insert_place("Bin 7").await.unwrap();

    let parts = [
        ("Carbon film resistor", "1k", resistors, shelf, 120),
        ("Carbon film resistor", "4.7k", resistors, shelf, 35),
        ("Metal film resistor", "4.7k", resistors, bin, 4),
        ("Ceramic capacitor", "100n", capacitors, bin, 60),
        ("Electrolytic capacitor", "10μ", capacitors, shelf, 8),
    ];
    for (name, value, category, place, amount) in parts {
        catalog
            .insert_part(
                &NewPart::new(name, category)
                    .with_value(Number::parse(value).unwrap().value())
                    .with_place(place)
                    .with_amount(amount),
            )
            .await
            .unwrap();
    }

    (db, service)
}

#[tokio::test]
async fn test_free_text_search_workflow() {
    let (_db, service) = seeded_service().await;

    let outcome = service.search("resistor 4.7[kΩ]").await.unwrap();
    let names: Vec<&str> = outcome.parts().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Metal film resistor", "Carbon film resistor"]);

    let outcome = service.search("resistor 4.7[kΩ] <10-100>").await.unwrap();
    match outcome {
        SearchOutcome::Single(part) => {
            assert_eq!(part.id, 2);
            assert_eq!(part.place_name.as_deref(), Some("Shelf 1"));
        }
        other => panic!("expected a single match, got {other:?}"),
    }
}

#[tokio::test]
async fn test_exact_name_before_parsing() {
    let (_db, service) = seeded_service().await;
    let outcome = service.search("Ceramic capacitor").await.unwrap();
    assert!(matches!(outcome, SearchOutcome::Exact(ref p) if p.id == 4));
}

#[tokio::test]
async fn test_unit_prefix_scales_plain_number() {
    let (_db, service) = seeded_service().await;
    let outcome = service.search("10[μF]").await.unwrap();
    assert_eq!(outcome.redirect().map(|p| p.name.as_str()), Some("Electrolytic capacitor"));
}

#[tokio::test]
async fn test_form_listing_workflow() {
    let (_db, service) = seeded_service().await;

    let form = FormValues::parse("category=1&category=oops&place=&amount=1-50");
    let page = service.list(&form).await.unwrap();

    assert_eq!(page.filter.categories.len(), 1);
    assert!(page.filter.places.is_empty());
    let ids: Vec<i64> = page.parts.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![3, 2]);

    let page = service
        .list(&FormValues::parse("last_id=3"))
        .await
        .unwrap();
    let ids: Vec<i64> = page.parts.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![5, 4]);

    let page = service
        .list(&FormValues::parse("first_id=3"))
        .await
        .unwrap();
    let ids: Vec<i64> = page.parts.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![2, 1]);
}

#[tokio::test]
async fn test_malformed_query_reports_field() {
    let (_db, service) = seeded_service().await;

    let err = service.search("resistor <abc>").await.unwrap_err();
    let Error::Search(SearchError::FilterParse { field, source }) = err else {
        panic!("expected a filter parse error");
    };
    assert_eq!(field, "stock");
    assert_eq!(*source, SearchError::MalformedNumber("abc".into()));
}

#[tokio::test]
async fn test_strict_prefixes_from_config() {
    let db = Database::in_memory().await.unwrap();
    let mut config = Config::default();
    config.set("search.strict_prefixes", "true").unwrap();
    let service = SearchService::from_config(&db, &config).unwrap();

    let err = service.search("10x").await.unwrap_err();
    assert_eq!(err.code(), "E1303");
    assert!(err.suggestion().unwrap().contains("strict_prefixes"));

    let lenient = SearchService::from_config(&db, &Config::default()).unwrap();
    assert!(lenient.search("10x").await.is_ok());
}

#[test]
fn test_prefix_round_trip_property() {
    for prefix in search::si::PREFIXES {
        for f in [1.0, 2.5, 47.0, 999.0] {
            let text = format!("{}{}", f, prefix.symbol());
            let parsed = Number::parse(&text).unwrap();
            let expected = f * 10f64.powi(prefix.exponent());
            assert!(
                (parsed.value() - expected).abs() <= expected.abs() * 1e-12,
                "{text}: {} != {expected}",
                parsed.value()
            );
        }
    }
}

#[test]
fn test_canon_properties() {
    assert_eq!(
        Number::new(1000.0).canon(),
        Number::with_prefix(1.0, Prefix::Kilo)
    );
    assert_eq!(Number::new(999.0).canon(), Number::new(999.0));
    for value in [0.0042, 15.0, 2.2e6, 7.5e-13] {
        let canon = Number::new(value).canon();
        assert_eq!(canon.canon(), canon);
    }
    assert_eq!(Number::parse("3.3n").unwrap().value(), 0.0000000033);
    assert_eq!(Number::parse("1k").unwrap().value(), 1000.0);
}

#[test]
fn test_range_properties() {
    let range = Range::parse("1k-2k").unwrap();
    assert_eq!(range.low.value(), 1000.0);
    assert_eq!(range.high.value(), 2000.0);
    assert!(!range.is_exact());
    assert!(Range::parse("5").unwrap().is_exact());
}

#[test]
fn test_lexer_token_sequence() {
    let kinds: Vec<(TokenKind, String)> = search::tokenize("4.7[kΩ] resistor <10->")
        .into_iter()
        .map(|t| (t.kind, t.text))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (TokenKind::Number, "4.7".to_string()),
            (TokenKind::Unit, "[kΩ]".to_string()),
            (TokenKind::Text, "resistor".to_string()),
            (TokenKind::Stock, "<10->".to_string()),
            (TokenKind::Eof, String::new()),
        ]
    );

    // Half-open stock ranges lex fine but do not build a filter.
    let err = Filter::parse_query("4.7[kΩ] resistor <10->", PrefixPolicy::Lenient).unwrap_err();
    assert!(matches!(err, SearchError::FilterParse { ref field, .. } if field == "stock"));
}

#[test]
fn test_compiler_property() {
    let filter = Filter::new()
        .with_category(1)
        .with_category(2)
        .with_value(Range::exact(Number::new(1000.0)));
    let query = SearchConfig::default().compiler().compile(&filter);

    let sql = query.to_sql();
    let membership = sql.find(r#""category_id" IN (?, ?)"#).unwrap();
    let equality = sql.find(r#""value" = ?"#).unwrap();
    assert!(membership < equality);
    assert!(sql.ends_with(r#"ORDER BY "id" DESC LIMIT 10"#));
    assert_eq!(
        query.args,
        vec![SqlArg::Int(1), SqlArg::Int(2), SqlArg::Real(1000.0)]
    );
}

#[test]
fn test_form_skips_non_numeric_category() {
    let form = FormValues::from_iter([("category", "abc"), ("category", "7")]);
    let filter = Filter::from_form(&form, PrefixPolicy::Lenient).unwrap();
    assert_eq!(filter.categories.len(), 1);
    assert!(filter.categories.contains(&7));
}

#[tokio::test]
async fn test_failed_filter_stops_producer() {
    let long_query = format!("<oops> {}", "word ".repeat(500));
    let stream = search::pipeline::spawn_lexer(long_query, 1);
    let cancel = stream.cancellation_token();

    let err = Filter::from_token_stream(stream, PrefixPolicy::Lenient)
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::FilterParse { .. }));
    assert!(cancel.is_cancelled());
}

#[test]
fn test_long_number_token_in_query() {
    let query = format!("resistor {}1x", "0".repeat(80_000));
    let started = std::time::Instant::now();

    let filter = Filter::parse_query(&query, PrefixPolicy::Lenient).unwrap();
    assert_eq!(filter.value, Some(Range::exact(Number::new(1.0))));
    assert_eq!(filter.keywords, vec!["resistor".to_string()]);
    assert!(started.elapsed() < std::time::Duration::from_secs(2));
}
