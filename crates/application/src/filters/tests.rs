use restify_core::AppError;
use restify_domain::{FieldType, MatchType};
use serde_json::{Value, json};

use super::{
    AdvancedFilter, BooleanFilter, FilterKind, FilterOption, IntegerFilter, MatchFilter,
    SelectFilter, TimestampFilter, typed_condition,
};
use crate::query::{ColumnRef, CompareOp, Condition, ModelQuery};
use crate::RestifyRequest;

fn request() -> RestifyRequest {
    RestifyRequest::new(None)
}

#[test]
fn null_literal_checks_absence_for_any_type() {
    let condition = typed_condition(ColumnRef::root("published_at"), MatchType::Datetime, "null", true)
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        condition,
        Condition::Null {
            column: ColumnRef::root("published_at"),
            negated: true,
        }
    );
}

#[test]
fn negated_text_match_uses_same_column_with_inequality() {
    let filter = MatchFilter::new("title", MatchType::Text);
    let mut query = ModelQuery::new("posts", "id");

    filter
        .apply(&request(), &mut query, "Another one", true)
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        query.conditions(),
        &[Condition::Compare {
            column: ColumnRef::root("title"),
            op: CompareOp::Neq,
            value: json!("Another one"),
            field_type: FieldType::Text,
        }]
    );
}

#[test]
fn integer_match_rejects_non_numeric_values() {
    let result = typed_condition(ColumnRef::root("views"), MatchType::Integer, "many", false);
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[test]
fn between_match_infers_bound_types() {
    let integers = typed_condition(ColumnRef::root("views"), MatchType::Between, "1, 10", false)
        .unwrap_or_else(|_| unreachable!());
    assert!(matches!(
        integers,
        Condition::Between {
            field_type: FieldType::Integer,
            ..
        }
    ));

    let dates = typed_condition(
        ColumnRef::root("created_at"),
        MatchType::Between,
        "2024-01-01,2024-12-31",
        true,
    )
    .unwrap_or_else(|_| unreachable!());
    assert!(matches!(
        dates,
        Condition::Between {
            field_type: FieldType::Date,
            negated: true,
            ..
        }
    ));

    let single = typed_condition(ColumnRef::root("views"), MatchType::Between, "1", false);
    assert!(single.is_err());
}

#[test]
fn array_match_builds_membership() {
    let condition = typed_condition(ColumnRef::root("id"), MatchType::Array, "1,2,,3", false)
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        condition,
        Condition::In {
            column: ColumnRef::root("id"),
            values: vec![json!(1), json!(2), json!(3)],
            field_type: FieldType::Integer,
            negated: false,
        }
    );
}

#[test]
fn callback_match_receives_negation_flag() {
    let filter = MatchFilter::callback("mine", |_, query, value, negated| {
        query.filter(Condition::eq("author", json!(format!("{value}:{negated}")), FieldType::Text));
        Ok(())
    });
    let mut query = ModelQuery::new("posts", "id");

    filter
        .apply(&request(), &mut query, "x", true)
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        query.conditions(),
        &[Condition::eq("author", json!("x:true"), FieldType::Text)]
    );
}

#[test]
fn boolean_filter_skips_unparseable_values() {
    let filter = BooleanFilter::new("is-active", "is_active");

    assert_eq!(filter.resolve(&request(), &json!("yes")), Some(json!(true)));
    assert_eq!(filter.resolve(&request(), &json!(0)), Some(json!(false)));
    assert_eq!(filter.resolve(&request(), &json!("")), None);
    assert_eq!(filter.resolve(&request(), &json!("maybe")), None);
}

#[test]
fn select_filter_only_accepts_declared_options() {
    let filter = SelectFilter::new(
        "status",
        "status",
        vec![
            FilterOption::new("Draft", "draft"),
            FilterOption::new("Published", "published"),
        ],
    );

    assert_eq!(filter.resolve(&request(), &json!("unknown")), None);
    assert_eq!(
        filter.resolve(&request(), &json!(["draft", "unknown"])),
        Some(json!(["draft"]))
    );
}

#[test]
fn timestamp_filter_accepts_ranges() {
    let filter = TimestampFilter::new("created", "created_at");
    let resolved = filter
        .resolve(&request(), &json!(["2024-01-01T10:00:00Z", "2024-02-01"]))
        .unwrap_or(Value::Null);
    assert_eq!(resolved, json!(["2024-01-01", "2024-02-01"]));

    let mut query = ModelQuery::new("posts", "id");
    filter
        .apply(&request(), &mut query, &resolved)
        .unwrap_or_else(|_| unreachable!());
    assert!(matches!(
        query.conditions(),
        [Condition::Between {
            field_type: FieldType::Date,
            ..
        }]
    ));
}

#[test]
fn hidden_filter_reports_visibility() {
    let filter = BooleanFilter::new("flagged", "flagged").can_see(|request| request.viewer().is_some());
    assert!(!filter.authorized_to_see(&request()));
    assert_eq!(filter.describe(&request())["type"], json!("boolean"));
}

#[test]
fn integer_filter_rejects_non_numeric_values() {
    let filter = IntegerFilter::new("author", "user_id");

    assert_eq!(filter.kind(), FilterKind::Integer);
    assert_eq!(filter.kind().as_str(), "integer");
    assert_eq!(filter.resolve(&request(), &json!(" 7 ")), Some(json!(7)));
    assert_eq!(filter.resolve(&request(), &json!([1, "2"])), Some(json!([1, 2])));
    assert_eq!(filter.resolve(&request(), &json!("abc")), None);
    assert_eq!(filter.resolve(&request(), &json!([1, "x"])), None);
    assert_eq!(filter.resolve(&request(), &json!([])), None);
    assert!(filter.boot(&request()).is_ok());
}
