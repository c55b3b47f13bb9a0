use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use entity_query::config::IssueSetting;
use entity_query::context::{MatchContext, MemoryRepository, ParseContext};
use entity_query::lexer::Lexer;
use entity_query::parser::parse_tree;
use entity_query::IssueQuery;
use sea_query::PostgresQueryBuilder;
use std::hint::black_box;

fn test_cases() -> Vec<(&'static str, &'static str)> {
    vec![
        ("simple", r#""state" is "Open""#),
        (
            "medium",
            r#""state" is "Open" and "Priority" is greater than "Normal" order by "vote count" asc"#,
        ),
        (
            "complex",
            r#"("title" contains "crash" or "Labels" is "ui") and not("Assignee" is empty) and "submit date" is after "2024-01-01" and fixed between tag "v1.0" and branch "main" order by "number""#,
        ),
    ]
}

fn demo_repository() -> MemoryRepository {
    let mut repo = MemoryRepository::new();
    repo.add_commit("a1b2c3", &[1])
        .add_commit("d4e5f6", &[2, 3])
        .add_ref(entity_query::token::RevisionKind::Tag, "v1.0", "a1b2c3")
        .add_ref(entity_query::token::RevisionKind::Branch, "main", "d4e5f6");
    repo
}

// Tokenizing only
fn benchmark_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_performance");
    for (name, text) in test_cases() {
        group.bench_with_input(BenchmarkId::new("tokenize", name), &text, |b, &text| {
            b.iter(|| black_box(Lexer::tokenize(black_box(text)).unwrap()))
        });
    }
    group.finish();
}

// Tokenizing plus parse tree construction
fn benchmark_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_performance");
    for (name, text) in test_cases() {
        group.bench_with_input(BenchmarkId::new("parse_tree", name), &text, |b, &text| {
            b.iter(|| black_box(parse_tree(black_box(text)).unwrap()))
        });
    }
    group.finish();
}

fn benchmark_issue_query(c: &mut Criterion) {
    let setting = IssueSetting::demo();
    let repo = demo_repository();
    let parse_ctx = ParseContext::new(&setting, &repo);
    let match_ctx = MatchContext::new(&setting, &repo);

    let mut group = c.benchmark_group("issue_query_performance");
    for (name, text) in test_cases() {
        group.bench_with_input(BenchmarkId::new("parse", name), &text, |b, &text| {
            b.iter(|| black_box(IssueQuery::parse(&parse_ctx, Some(black_box(text)), true).unwrap()))
        });

        let query = IssueQuery::parse(&parse_ctx, Some(text), true).unwrap();
        group.bench_with_input(BenchmarkId::new("to_select", name), &query, |b, query| {
            b.iter(|| black_box(query.to_select(&match_ctx).to_string(PostgresQueryBuilder)))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_lexer, benchmark_parser, benchmark_issue_query);
criterion_main!(benches);
