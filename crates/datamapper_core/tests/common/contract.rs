//! Behavior every `DataMapper` must show through a `Repository`.
//!
//! Each case receives a repository over the seeded `Article` fixture
//! (see `ARTICLES`, ids 1..=4).

use super::ids;
use datamapper_core::{Direction, Operator, OrmError, Repository, Value};

pub fn projection_returns_requested_fields_in_order(repo: &mut Repository<'_>) {
    let item = repo
        .find_one()
        .columns(["title", "id"])
        .with("id", Operator::Equal, 3)
        .get_item()
        .unwrap();

    let record = item.as_record().expect("projection yields a record");
    assert_eq!(record.keys().collect::<Vec<_>>(), vec!["title", "id"]);
    assert_eq!(record.get("title"), Some(&Value::from("Part One")));
    assert_eq!(record.get("id"), Some(&Value::Integer(3)));
}

pub fn star_or_no_columns_return_entities(repo: &mut Repository<'_>) {
    let starred = repo
        .find_one()
        .columns("*")
        .with("id", Operator::Equal, 1)
        .get_item()
        .unwrap();
    let entity = starred.as_entity().expect("`*` yields an entity");
    assert_eq!(entity.get("title"), Some(&Value::from("First Article")));
    assert_eq!(entity.get("hits"), Some(&Value::Integer(10)));

    let all = repo.find_all().get_items(None, 0).unwrap();
    assert_eq!(all.entities().map(<[_]>::len), Some(4));
}

pub fn column_spec_forms_normalize_identically(repo: &mut Repository<'_>) {
    let from_string = repo
        .find_all()
        .columns(" title , id ")
        .get_items(None, 0)
        .unwrap();
    let from_list = repo
        .find_all()
        .columns(vec!["title", "id"])
        .get_items(None, 0)
        .unwrap();

    assert_eq!(from_string.records(), from_list.records());
    assert_eq!(from_string.len(), 4);
}

pub fn get_item_without_match_is_not_found(repo: &mut Repository<'_>) {
    let err = repo
        .find_one()
        .with("title", Operator::Equal, "Missing")
        .get_item()
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");

    let err = repo.get_by_id(99).unwrap_err();
    assert!(matches!(err, OrmError::EntityNotFound { .. }));
}

pub fn get_items_without_match_is_empty(repo: &mut Repository<'_>) {
    let items = repo
        .find_all()
        .with("hits", Operator::GreaterThan, 1000)
        .get_items(None, 0)
        .unwrap();
    assert!(items.is_empty());
}

pub fn order_by_title_and_id(repo: &mut Repository<'_>) {
    let by_title = repo
        .find_all()
        .order_by("title", Direction::Asc)
        .get_items(None, 0)
        .unwrap();
    assert_eq!(ids(&by_title), vec![1, 3, 4, 2]);

    let by_id_desc = repo
        .find_all()
        .order_by("id", Direction::Desc)
        .get_items(None, 0)
        .unwrap();
    assert_eq!(ids(&by_id_desc), vec![4, 3, 2, 1]);
}

pub fn order_by_accepts_direction_names(repo: &mut Repository<'_>) {
    let items = repo
        .find_all()
        .order_by("id", "desc")
        .get_items(None, 0)
        .unwrap();
    assert_eq!(ids(&items), vec![4, 3, 2, 1]);

    let items = repo
        .find_all()
        .order_by("title", String::from("Asc"))
        .get_items(None, 0)
        .unwrap();
    assert_eq!(ids(&items), vec![1, 3, 4, 2]);

    let err = repo
        .find_all()
        .order_by("id", "sideways")
        .get_items(None, 0)
        .unwrap_err();
    assert!(matches!(err, OrmError::InvalidQuery(_)));
}

pub fn order_by_numeric_field_is_numeric(repo: &mut Repository<'_>) {
    // Ties keep identity order.
    let items = repo
        .find_all()
        .order_by("hits", Direction::Asc)
        .get_items(None, 0)
        .unwrap();
    assert_eq!(ids(&items), vec![2, 4, 1, 3]);
}

pub fn slicing_honors_limit_and_offset(repo: &mut Repository<'_>) {
    let slice = |limit: Option<usize>, offset: usize| ids(&repo.find_all().get_items(limit, offset).unwrap());

    assert_eq!(slice(Some(2), 0), vec![1, 2]);
    assert_eq!(slice(Some(2), 1), vec![2, 3]);
    assert_eq!(slice(None, 3), vec![4]);
    assert!(slice(Some(2), 10).is_empty());
}

pub fn comparison_operators(repo: &mut Repository<'_>) {
    let matching = |operator: Operator, hits: i64| {
        ids(&repo
            .find_all()
            .with("hits", operator, hits)
            .get_items(None, 0)
            .unwrap())
    };

    assert_eq!(matching(Operator::Equal, 2), vec![2, 4]);
    assert_eq!(matching(Operator::NotEqual, 2), vec![1, 3]);
    assert_eq!(matching(Operator::GreaterThan, 10), vec![3]);
    assert_eq!(matching(Operator::GreaterOrEqual, 10), vec![1, 3]);
    assert_eq!(matching(Operator::LessThan, 10), vec![2, 4]);
    assert_eq!(matching(Operator::LessOrEqual, 10), vec![1, 2, 4]);
}

pub fn string_operators_are_case_sensitive(repo: &mut Repository<'_>) {
    let matching = |operator: &str, needle: &str| {
        ids(&repo
            .find_all()
            .with("title", operator, needle)
            .get_items(None, 0)
            .unwrap())
    };

    assert_eq!(matching("CONTAINS", "Article"), vec![1, 2]);
    assert_eq!(matching("STARTS_WITH", "Part"), vec![3, 4]);
    assert_eq!(matching("ENDS_WITH", "One"), vec![3]);
    assert_eq!(matching("MATCHES", r"rt\s"), vec![3, 4]);
    assert_eq!(matching("MATCHES", "^(First|Second)"), vec![1, 2]);
    assert!(matching("CONTAINS", "article").is_empty());
    assert!(matching("STARTS_WITH", "part").is_empty());
}

pub fn membership_and_null_operators(repo: &mut Repository<'_>) {
    let listed = repo
        .find_all()
        .with("id", Operator::In, [1, 3])
        .get_items(None, 0)
        .unwrap();
    assert_eq!(ids(&listed), vec![1, 3]);

    let nothing = repo
        .find_all()
        .with("id", Operator::In, Vec::<i64>::new())
        .get_items(None, 0)
        .unwrap();
    assert!(nothing.is_empty());

    let unset = repo
        .find_all()
        .with("teaser", Operator::Equal, Value::Null)
        .get_items(None, 0)
        .unwrap();
    assert_eq!(unset.len(), 4);

    let set = repo
        .find_all()
        .with("teaser", Operator::NotEqual, Value::Null)
        .get_items(None, 0)
        .unwrap();
    assert!(set.is_empty());
}

pub fn invalid_operator_fails_on_execution(repo: &mut Repository<'_>) {
    // Building the finder succeeds; only execution checks the operator.
    let finder = repo.find_all().with("title", "NONEXISTANT", "x");
    let err = finder.get_items(None, 0).unwrap_err();
    assert!(matches!(err, OrmError::InvalidOperator(ref name) if name == "NONEXISTANT"));
}

pub fn unknown_field_fails_on_execution(repo: &mut Repository<'_>) {
    let err = repo
        .find_all()
        .with("rating", Operator::Equal, 5)
        .get_items(None, 0)
        .unwrap_err();
    assert!(matches!(err, OrmError::UnknownField { ref field, .. } if field == "rating"));

    let err = repo
        .find_all()
        .columns("title, rating")
        .get_items(None, 0)
        .unwrap_err();
    assert!(matches!(err, OrmError::UnknownField { .. }));
}

pub fn conditions_are_conjoined(repo: &mut Repository<'_>) {
    let items = repo
        .find_all()
        .with("parent_id", Operator::Equal, 2)
        .with("hits", Operator::GreaterThan, 5)
        .get_items(None, 0)
        .unwrap();
    assert_eq!(ids(&items), vec![3]);
}

pub fn add_new_entity_assigns_identity(repo: &mut Repository<'_>) {
    let mut article = repo.create().unwrap();
    assert!(!article.has_identity());
    article.set("title", "Fresh").unwrap();
    article.set("body", "Body text").unwrap();

    repo.add(&mut article).unwrap();
    assert_eq!(article.id(), &Value::Integer(5));
    repo.commit().unwrap();

    let reloaded = repo.get_by_id(5).unwrap();
    assert_eq!(reloaded, article);
    assert_eq!(reloaded.get("hits"), Some(&Value::Integer(0)));
}

pub fn add_existing_entity_updates(repo: &mut Repository<'_>) {
    let mut article = repo.get_by_id(2).unwrap();
    article.set("title", "Renamed").unwrap();
    repo.add(&mut article).unwrap();
    repo.commit().unwrap();

    let reloaded = repo.get_by_id(2).unwrap();
    assert_eq!(reloaded.get("title"), Some(&Value::from("Renamed")));
    assert_eq!(repo.find_all().get_items(None, 0).unwrap().len(), 4);
}

pub fn staged_changes_are_invisible_until_commit(repo: &mut Repository<'_>) {
    let mut article = repo.create().unwrap();
    article.set("title", "Draft").unwrap();
    repo.add(&mut article).unwrap();

    assert_eq!(repo.pending().len(), 1);
    assert_eq!(repo.find_all().get_items(None, 0).unwrap().len(), 4);
    assert!(repo.get_by_id(5).unwrap_err().is_not_found());

    repo.commit().unwrap();
    assert!(repo.pending().is_empty());
    assert_eq!(repo.find_all().get_items(None, 0).unwrap().len(), 5);
}

pub fn delete_requires_identity(repo: &mut Repository<'_>) {
    let article = repo.create().unwrap();
    assert!(matches!(
        repo.delete(&article),
        Err(OrmError::MissingIdentity { .. })
    ));
}

pub fn delete_requires_existing_record(repo: &mut Repository<'_>) {
    let mut ghost = repo.create().unwrap();
    ghost.set("id", 99).unwrap();
    assert!(matches!(
        repo.delete(&ghost),
        Err(OrmError::UnknownIdentity { .. })
    ));
    assert!(repo.pending().is_empty());
}

pub fn delete_removes_after_commit(repo: &mut Repository<'_>) {
    let article = repo.get_by_id(1).unwrap();
    repo.delete(&article).unwrap();
    assert!(repo.get_by_id(1).is_ok());

    repo.commit().unwrap();
    assert!(repo.get_by_id(1).unwrap_err().is_not_found());
    assert_eq!(
        ids(&repo.find_all().get_items(None, 0).unwrap()),
        vec![2, 3, 4]
    );
}

pub fn children_relation_is_scoped(repo: &mut Repository<'_>) {
    let parent = repo.get_by_id(2).unwrap();
    let children = repo.relation(&parent, "children").unwrap();

    assert_eq!(
        ids(&children.find_all().get_items(None, 0).unwrap()),
        vec![3, 4]
    );
    let narrowed = children
        .find_all()
        .with("title", Operator::EndsWith, "Two")
        .get_items(None, 0)
        .unwrap();
    assert_eq!(ids(&narrowed), vec![4]);
}

pub fn belongs_to_relation_resolves_parent(repo: &mut Repository<'_>) {
    let child = repo.get_by_id(3).unwrap();
    let parent = repo
        .relation(&child, "parent")
        .unwrap()
        .find_one()
        .get_entity()
        .unwrap();
    assert_eq!(parent.id(), &Value::Integer(2));
    assert_eq!(parent.get("title"), Some(&Value::from("Second Article")));
}

pub fn belongs_to_relation_follows_changed_reference(repo: &mut Repository<'_>) {
    let mut child = repo.get_by_id(3).unwrap();
    child.set("parent_id", 1).unwrap();

    let parent = repo
        .relation(&child, "parent")
        .unwrap()
        .find_one()
        .get_entity()
        .unwrap();
    assert_eq!(parent.id(), &Value::Integer(1));
}

pub fn scoped_add_fills_reference(repo: &mut Repository<'_>) {
    let parent = repo.get_by_id(1).unwrap();
    {
        let mut children = repo.relation(&parent, "children").unwrap();
        let mut child = children.create().unwrap();
        assert_eq!(child.get("parent_id"), Some(&Value::Integer(1)));
        child.set("title", "Appendix").unwrap();
        children.add(&mut child).unwrap();
        assert_eq!(child.id(), &Value::Integer(5));
        children.commit().unwrap();
    }

    let stored = repo.get_by_id(5).unwrap();
    assert_eq!(stored.get("parent_id"), Some(&Value::Integer(1)));
}

pub fn relation_to_other_entity_type(repo: &mut Repository<'_>) {
    let article = repo.get_by_id(4).unwrap();
    {
        let mut comments = repo.relation(&article, "comments").unwrap();
        assert_eq!(comments.entity_name(), "Comment");
        for text in ["first", "second"] {
            let mut comment = comments.create().unwrap();
            comment.set("text", text).unwrap();
            comments.add(&mut comment).unwrap();
        }
        comments.commit().unwrap();
    }

    let comments = repo.relation(&article, "comments").unwrap();
    let listed = comments
        .find_all()
        .order_by("id", Direction::Desc)
        .columns("text")
        .get_items(None, 0)
        .unwrap();
    assert_eq!(
        listed.column("text"),
        vec![Value::from("second"), Value::from("first")]
    );

    let comment = comments.find_one().get_entity().unwrap();
    let owner = comments
        .relation(&comment, "article")
        .unwrap()
        .find_one()
        .get_entity()
        .unwrap();
    assert_eq!(owner.id(), &Value::Integer(4));
}
