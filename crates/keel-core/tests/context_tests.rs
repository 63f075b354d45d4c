mod common;

use common::{context_with, library_model, FakeStore};
use keel_core::{
    AttributeValue, FetchRequest, KeelError, ManagedObjectContext, ObjectId,
    PersistentStoreCoordinator, RequestType, Value,
};

fn seeded_store() -> FakeStore {
    FakeStore::new("fake")
        .with_row("Author", 1, &[("name", Value::from("Ursula"))])
        .with_row("Book", 10, &[("title", Value::from("Lathe of Heaven"))])
}

#[test]
fn test_fetch_returns_faults_that_fire_on_read() {
    // Given: a store holding one author
    let mut ctx = context_with(seeded_store());
    let entity = ctx.entity("Author").unwrap();

    // When: the authors are fetched
    let authors = ctx.execute_fetch_request(&FetchRequest::new(entity)).unwrap();

    // Then: the result is a fault until an attribute is read
    assert_eq!(authors.len(), 1);
    let author = authors[0];
    assert!(ctx.is_fault(author).unwrap());

    let name = ctx.value(author, "name").unwrap();
    assert_eq!(name, Some(Value::from("Ursula")));
    assert!(!ctx.is_fault(author).unwrap());
    assert!(!ctx.has_changes());
}

#[test]
fn test_unresolvable_fault_is_managed_object_error() {
    let mut ctx = context_with(seeded_store());
    let entity = ctx.entity("Author").unwrap();
    let ghost = ctx.new_object_for_entity(&entity, ObjectId::Row(99));

    let err = ctx.get(ghost, "name").unwrap_err();
    match err {
        KeelError::ManagedObject { message, .. } => {
            assert!(message.contains("Error while fetching data for fault"))
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_new_objects_carry_defaults() {
    let mut ctx = context_with(seeded_store());
    let book = ctx.insert_new_object("Book").unwrap();

    assert_eq!(ctx.value(book, "pages").unwrap(), Some(Value::Integer(0)));
    assert_eq!(ctx.value(book, "inPrint").unwrap(), Some(Value::Boolean(true)));
    assert_eq!(ctx.value(book, "title").unwrap(), None);
    assert!(ctx.has_changes());
}

#[test]
fn test_adding_a_book_mirrors_onto_its_author() {
    // Given: a new author and a new book
    let mut ctx = context_with(seeded_store());
    let author = ctx.insert_new_object("Author").unwrap();
    let book = ctx.insert_new_object("Book").unwrap();

    // When: the book is added to the author's books
    ctx.add_to_relationship(author, "books", book).unwrap();

    // Then: the book's author is the author without touching the book
    assert_eq!(ctx.related_object(book, "author").unwrap(), Some(author));
    assert_eq!(ctx.related_objects(author, "books").unwrap(), vec![book]);
}

#[test]
fn test_removing_an_unsaved_link_cancels_it() {
    let mut ctx = context_with(seeded_store());
    let author = ctx.insert_new_object("Author").unwrap();
    let book = ctx.insert_new_object("Book").unwrap();

    ctx.add_to_relationship(author, "book", book).unwrap();
    ctx.remove_from_relationship(author, "book", book).unwrap();

    assert!(ctx.related_objects(author, "books").unwrap().is_empty());
    assert_eq!(ctx.related_object(book, "author").unwrap(), None);
    for handle in [author, book] {
        let object = ctx.object(handle).unwrap();
        assert!(object.inserted_relationships().is_empty());
        assert!(object.removed_relationships().is_empty());
    }
}

#[test]
fn test_wrong_type_leaves_pending_layer_unchanged() {
    let mut ctx = context_with(seeded_store());
    let book = ctx.insert_new_object("Book").unwrap();
    ctx.set_value(book, "title", Some(Value::from("Orsinian Tales")))
        .unwrap();
    let before = ctx.object(book).unwrap().updated_data().clone();

    let err = ctx
        .set_value(book, "title", Some(Value::Integer(5)))
        .unwrap_err();
    assert!(matches!(err, KeelError::InvalidOperation { .. }));
    assert_eq!(ctx.object(book).unwrap().updated_data(), &before);

    // Any number fits any numeric property
    ctx.set_value(book, "pages", Some(Value::Float(12.0))).unwrap();
    ctx.set_value(book, "inPrint", Some(Value::Integer(0))).unwrap();
}

#[test]
fn test_setting_to_one_replaces_current_link() {
    let mut ctx = context_with(seeded_store());
    let first = ctx.insert_new_object("Author").unwrap();
    let second = ctx.insert_new_object("Author").unwrap();
    let book = ctx.insert_new_object("Book").unwrap();

    ctx.set(book, "author", AttributeValue::Object(Some(first))).unwrap();
    ctx.set(book, "author", second.into()).unwrap();

    assert_eq!(ctx.related_object(book, "author").unwrap(), Some(second));
    assert!(ctx.related_objects(first, "books").unwrap().is_empty());
    assert_eq!(ctx.related_objects(second, "books").unwrap(), vec![book]);
}

#[test]
fn test_to_many_cannot_be_set_directly() {
    let mut ctx = context_with(seeded_store());
    let author = ctx.insert_new_object("Author").unwrap();
    let book = ctx.insert_new_object("Book").unwrap();

    let err = ctx
        .set(author, "books", AttributeValue::Object(Some(book)))
        .unwrap_err();
    assert!(matches!(err, KeelError::InvalidOperation { .. }));
}

#[test]
fn test_relationship_type_is_checked() {
    let mut ctx = context_with(seeded_store());
    let author = ctx.insert_new_object("Author").unwrap();
    let tag = ctx.insert_new_object("Tag").unwrap();

    let err = ctx.add_to_relationship(author, "books", tag).unwrap_err();
    assert!(matches!(err, KeelError::InvalidOperation { .. }));
}

#[test]
fn test_unknown_names_are_lookup_errors() {
    let mut ctx = context_with(seeded_store());
    assert!(matches!(
        ctx.insert_new_object("Publisher"),
        Err(KeelError::EntityNotFound { .. })
    ));
    let book = ctx.insert_new_object("Book").unwrap();
    assert!(matches!(
        ctx.get(book, "isbn"),
        Err(KeelError::AttributeNotFound { .. })
    ));
}

#[test]
fn test_lookup_helpers_build_predicates() {
    let mut ctx = context_with(seeded_store());
    assert!(ctx.object_with_object_id("Author", 1).unwrap().is_some());
    assert!(ctx
        .object_with("Book", "title", Some(&Value::from("x")))
        .unwrap()
        .is_some());
    assert!(ctx
        .object_with_attribute_path("Book.title", None)
        .unwrap()
        .is_some());
    assert!(matches!(
        ctx.object_with_attribute_path("Book.author", None),
        Err(KeelError::InvalidOperation { .. })
    ));
}

#[test]
fn test_save_fails_on_store_without_save_support() {
    let mut ctx = context_with(seeded_store());
    ctx.insert_new_object("Book").unwrap();

    let err = ctx.save().unwrap_err();
    assert!(err.to_string().contains("Unsupported request type"));
    assert!(ctx.has_changes());
}

#[test]
fn test_coordinator_without_stores() {
    let mut ctx = ManagedObjectContext::new(PersistentStoreCoordinator::new(library_model()));
    let entity = ctx.entity("Tag").unwrap();
    let err = ctx
        .execute_fetch_request(&FetchRequest::new(entity))
        .unwrap_err();
    assert!(err.to_string().contains("No persistent stores defined"));
}

#[test]
fn test_reads_go_to_first_store() {
    let first = seeded_store();
    let first_log = first.log.clone();
    let second = FakeStore::new("second");
    let second_log = second.log.clone();

    let mut coordinator = PersistentStoreCoordinator::new(library_model());
    assert!(coordinator.add_persistent_store(Box::new(first)).unwrap());
    assert!(coordinator.add_persistent_store(Box::new(second)).unwrap());
    assert!(!coordinator
        .add_persistent_store(Box::new(FakeStore::new("fake")))
        .unwrap());
    let mut ctx = ManagedObjectContext::new(coordinator);

    let author = ctx.object_with_object_id("Author", 1).unwrap().unwrap();
    ctx.fire_fault(author).unwrap();

    assert_eq!(
        *first_log.lock().unwrap(),
        vec![RequestType::Fetch, RequestType::Fault]
    );
    assert!(second_log.lock().unwrap().is_empty());

    assert!(ctx.coordinator_mut().remove_persistent_store("second").is_some());
    assert_eq!(ctx.coordinator().persistent_stores().count(), 1);
}

#[test]
fn test_deleted_objects_count_as_changes() {
    let mut ctx = context_with(seeded_store());
    let author = ctx.object_with_object_id("Author", 1).unwrap().unwrap();
    assert!(!ctx.has_changes());
    ctx.delete_object(author).unwrap();
    assert!(ctx.has_changes());
    assert_eq!(ctx.deleted_objects(), &[author]);
}
