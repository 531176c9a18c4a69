//! Property-based test generators using proptest.
//!
//! Strategies produce data shaped for the [`Person`](crate::Person)
//! fixture, so generated records and queries can be fed straight into a
//! backend prepared with [`prepare`](crate::prepare).

use entiorm_codec::{Record, Value};
use entiorm_meta::{ColumnMeta, DataType, ForeignKey, ID_FIELD};
use entiorm_storage::{Direction, Predicate, PredicateMode, Query, SearchTerm};
use proptest::prelude::*;

/// Strategy for person names drawn from a small alphabet, so that
/// searches and substring predicates hit often.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[abc]{1,4}").expect("Invalid regex")
}

/// Strategy for person ages.
pub fn age_strategy() -> impl Strategy<Value = i64> {
    0i64..60
}

/// Strategy for batches of `(name, age)` pairs.
pub fn people_strategy(max: usize) -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::vec((name_strategy(), age_strategy()), 0..max)
}

/// Strategy for one predicate on the `name` or `age` field.
pub fn predicate_strategy() -> impl Strategy<Value = (String, Predicate)> {
    let modes = prop_oneof![
        Just(PredicateMode::Equals),
        Just(PredicateMode::Not),
        Just(PredicateMode::Like),
        Just(PredicateMode::SmallerThan),
        Just(PredicateMode::GreaterThan),
    ];
    let values = prop_oneof![
        name_strategy().prop_map(Value::from),
        age_strategy().prop_map(Value::from),
    ];
    (
        prop_oneof![Just("name".to_string()), Just("age".to_string())],
        modes,
        values,
    )
        .prop_map(|(field, mode, value)| (field, Predicate::new(mode, value)))
}

fn search_term_strategy() -> impl Strategy<Value = (String, SearchTerm)> {
    prop_oneof![
        name_strategy().prop_map(|n| ("name".to_string(), SearchTerm::Exact(Value::from(n)))),
        predicate_strategy().prop_map(|(f, p)| (f, SearchTerm::Predicate(p))),
        prop::collection::vec(predicate_strategy(), 1..3).prop_map(|preds| {
            let field = preds[0].0.clone();
            let same_field = preds
                .into_iter()
                .filter(|(f, _)| *f == field)
                .map(|(_, p)| p)
                .collect();
            (field, SearchTerm::AllOf(same_field))
        }),
    ]
}

/// Strategy for queries over the `Person` fields.
pub fn query_strategy() -> impl Strategy<Value = Query> {
    (
        prop::collection::vec(search_term_strategy(), 0..3),
        prop::option::of((
            prop_oneof![
                Just(ID_FIELD.to_string()),
                Just("name".to_string()),
                Just("age".to_string()),
            ],
            prop_oneof![Just(Direction::Asc), Just(Direction::Desc)],
        )),
        prop::option::of(0usize..12),
        0usize..12,
    )
        .prop_map(|(terms, order, limit, offset)| {
            let mut query = terms
                .into_iter()
                .fold(Query::new(), |q, (field, term)| q.search(field, term))
                .offset(offset);
            if let Some((key, direction)) = order {
                query = query.order_by(key, direction);
            }
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            query
        })
}

/// Strategy for arbitrary, possibly invalid, column metadata.
pub fn column_meta_strategy() -> impl Strategy<Value = ColumnMeta> {
    (
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        prop::option::of(prop::sample::select(DataType::ALL.to_vec())),
        any::<bool>(),
    )
        .prop_map(
            |(primary_key, unique, can_be_null, data_type, has_foreign_key)| ColumnMeta {
                primary_key,
                unique,
                can_be_null,
                data_type,
                foreign_key: has_foreign_key.then(|| ForeignKey::new("e_id", "other")),
            },
        )
}

/// Strategy for complete person records with sequential identities.
pub fn person_records_strategy(max: usize) -> impl Strategy<Value = Vec<Record>> {
    people_strategy(max).prop_map(|people| {
        people
            .into_iter()
            .enumerate()
            .map(|(i, (name, age))| crate::person_record(&format!("p-{i:03}"), &name, age))
            .collect()
    })
}
