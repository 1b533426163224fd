//! Shared fixture and the repository contract suite run against every mapper.
#![allow(dead_code, unused_macros)]

use datamapper_core::{
    DataMapper, EntityBuilder, EntityConfig, Items, Locator, RecursiveDirectoryStrategy,
    Repository, Value,
};
use std::path::PathBuf;

pub mod contract;

/// `(title, parent_id, hits)` of the four fixture articles, ids 1..=4.
pub const ARTICLES: [(&str, i64, i64); 4] = [
    ("First Article", 0, 10),
    ("Second Article", 0, 2),
    ("Part One", 2, 33),
    ("Part Two", 2, 2),
];

pub fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
}

pub fn builder() -> EntityBuilder {
    let config = EntityConfig::from_file(data_dir().join("entities.json")).unwrap();
    let locator = Locator::default()
        .with_strategy(RecursiveDirectoryStrategy::new(data_dir().join("definitions")));
    EntityBuilder::load(&locator, &config).unwrap()
}

/// Adds the fixture articles through the repository and commits them.
pub fn seed(repository: &mut Repository<'_>) {
    for (title, parent_id, hits) in ARTICLES {
        let mut article = repository.create().unwrap();
        article.set("title", title).unwrap();
        article.set("parent_id", parent_id).unwrap();
        article.set("hits", hits).unwrap();
        repository.add(&mut article).unwrap();
    }
    repository.commit().unwrap();
}

/// Deletes article 2 through `repository`, then stores it again under its
/// explicit identity through `mapper`, making it the newest row.
pub fn reinsert_second_article(repository: &mut Repository<'_>, mapper: &mut dyn DataMapper) {
    let second = repository.get_by_id(2).unwrap();
    repository.delete(&second).unwrap();
    repository.commit().unwrap();

    let mut again = mapper.builder().create("Article").unwrap();
    again.set("id", 2).unwrap();
    again.set("title", "Second Article").unwrap();
    mapper.insert(&mut again).unwrap();
    mapper.commit().unwrap();
}

pub fn ids(items: &Items) -> Vec<i64> {
    items
        .column("id")
        .iter()
        .filter_map(Value::as_i64)
        .collect()
}

/// Expands to one `#[test]` per contract case, each run through `$harness`.
///
/// `$harness` must have the signature `fn(fn(&mut Repository<'_>))` and hand
/// the case a repository of seeded `Article`s.
macro_rules! repository_contract_tests {
    ($harness:ident) => {
        repository_contract_tests!(@cases $harness;
            projection_returns_requested_fields_in_order,
            star_or_no_columns_return_entities,
            column_spec_forms_normalize_identically,
            get_item_without_match_is_not_found,
            get_items_without_match_is_empty,
            order_by_title_and_id,
            order_by_accepts_direction_names,
            order_by_numeric_field_is_numeric,
            slicing_honors_limit_and_offset,
            comparison_operators,
            string_operators_are_case_sensitive,
            membership_and_null_operators,
            invalid_operator_fails_on_execution,
            unknown_field_fails_on_execution,
            conditions_are_conjoined,
            add_new_entity_assigns_identity,
            add_existing_entity_updates,
            staged_changes_are_invisible_until_commit,
            delete_requires_identity,
            delete_requires_existing_record,
            delete_removes_after_commit,
            children_relation_is_scoped,
            belongs_to_relation_resolves_parent,
            belongs_to_relation_follows_changed_reference,
            scoped_add_fills_reference,
            relation_to_other_entity_type,
        );
    };
    (@cases $harness:ident; $($case:ident),+ $(,)?) => {
        $(
            #[test]
            fn $case() {
                $harness(common::contract::$case);
            }
        )+
    };
}
