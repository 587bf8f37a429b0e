mod common;

use libdesk::types::{BookChanges, BookQuery, NewBook};
use libdesk::{LibraryError, Role};
use rstest::rstest;

use common::*;

fn titled(title: &str, author: &str, quantity: i64) -> NewBook {
	NewBook {
		title: title.to_string(),
		author: author.to_string(),
		isbn: None,
		quantity,
	}
}

#[tokio::test]
async fn duplicate_title_and_author_is_a_conflict() {
	let lib = library().await;
	let root = superadmin(&lib).await;
	let first = book(&lib, &root, "Emma", "Austen", 1).await;

	let err = lib.add_book(&root, titled("Emma", "Austen", 4)).await.unwrap_err();
	match err {
		LibraryError::Conflict(msg) => assert!(msg.contains(&first.book_id.to_string()), "{msg}"),
		other => panic!("expected conflict, got {other:?}"),
	}
	assert_eq!(lib.list_books().await.unwrap().len(), 1);

	// same title, other author is a different book
	book(&lib, &root, "Emma", "Tennant", 1).await;
	assert_eq!(lib.list_books().await.unwrap().len(), 2);
}

#[rstest]
#[case(titled("Emma", "Austen", 0))]
#[case(titled("Emma", "Austen", -3))]
#[case(titled("  ", "Austen", 1))]
#[case(titled("Emma", "", 1))]
#[tokio::test]
async fn bad_input_is_rejected(#[case] new: NewBook) {
	let lib = library().await;
	let root = superadmin(&lib).await;
	let err = lib.add_book(&root, new).await.unwrap_err();
	assert!(matches!(err, LibraryError::InvalidInput(_)), "{err:?}");
	assert!(lib.list_books().await.unwrap().is_empty());
}

#[tokio::test]
async fn shrinking_below_loaned_copies_is_refused() {
	let lib = library().await;
	let root = superadmin(&lib).await;
	let rita = reader(&lib, "rita").await;
	let omar = reader(&lib, "omar").await;
	let b = book(&lib, &root, "Middlemarch", "Eliot", 3).await;
	lib.borrow(&rita, b.book_id).await.unwrap();
	lib.borrow(&omar, b.book_id).await.unwrap();

	let shrink = BookChanges { quantity: Some(1), ..Default::default() };
	let err = lib.update_book(&root, b.book_id, shrink, &mut yes()).await.unwrap_err();
	assert!(matches!(err, LibraryError::InvalidState(_)), "{err:?}");
	let after = lib.get_book(b.book_id).await.unwrap();
	assert_eq!((after.quantity, after.available_quantity), (3, 1));

	let grow = BookChanges { quantity: Some(5), ..Default::default() };
	let updated = lib.update_book(&root, b.book_id, grow, &mut yes()).await.unwrap().done().unwrap();
	assert_eq!((updated.quantity, updated.available_quantity), (5, 3));
	assert_bounded(&updated);

	let exact = BookChanges { quantity: Some(2), ..Default::default() };
	let updated = lib.update_book(&root, b.book_id, exact, &mut yes()).await.unwrap().done().unwrap();
	assert_eq!((updated.quantity, updated.available_quantity), (2, 0));
}

#[tokio::test]
async fn blank_changes_keep_current_values() {
	let lib = library().await;
	let root = superadmin(&lib).await;
	let b = book(&lib, &root, "Orlando", "Woolf", 2).await;

	let changes = BookChanges {
		title: Some("  ".into()),
		author: None,
		isbn: Some("978-0156701600".into()),
		quantity: None,
	};
	let updated = lib.update_book(&root, b.book_id, changes, &mut yes()).await.unwrap().done().unwrap();
	assert_eq!(updated.title, "Orlando");
	assert_eq!(updated.author, "Woolf");
	assert_eq!(updated.isbn.as_deref(), Some("978-0156701600"));
	assert_eq!(updated.quantity, 2);
}

#[tokio::test]
async fn renaming_onto_an_existing_book_conflicts() {
	let lib = library().await;
	let root = superadmin(&lib).await;
	book(&lib, &root, "Emma", "Austen", 1).await;
	let other = book(&lib, &root, "Persuasion", "Austen", 1).await;

	let rename = BookChanges { title: Some("Emma".into()), ..Default::default() };
	let err = lib.update_book(&root, other.book_id, rename, &mut yes()).await.unwrap_err();
	assert!(matches!(err, LibraryError::Conflict(_)), "{err:?}");
	assert_eq!(lib.get_book(other.book_id).await.unwrap().title, "Persuasion");
}

#[tokio::test]
async fn declined_update_changes_nothing() {
	let lib = library().await;
	let root = superadmin(&lib).await;
	let b = book(&lib, &root, "Orlando", "Woolf", 2).await;

	let changes = BookChanges { quantity: Some(9), ..Default::default() };
	let outcome = lib.update_book(&root, b.book_id, changes, &mut no()).await.unwrap();
	assert!(!outcome.is_done());
	assert_eq!(lib.get_book(b.book_id).await.unwrap(), b);
}

#[tokio::test]
async fn delete_waits_for_every_copy() {
	let lib = library().await;
	let root = superadmin(&lib).await;
	let rita = reader(&lib, "rita").await;
	let b = book(&lib, &root, "Ulysses", "Joyce", 2).await;
	let loan = lib.borrow(&rita, b.book_id).await.unwrap();

	let err = lib.delete_book(&root, b.book_id, &mut yes()).await.unwrap_err();
	assert!(matches!(err, LibraryError::Conflict(_)), "{err:?}");
	assert_eq!(lib.get_book(b.book_id).await.unwrap().available_quantity, 1);

	lib.return_loan(&rita, loan.loan_id).await.unwrap();
	let declined = lib.delete_book(&root, b.book_id, &mut no()).await.unwrap();
	assert!(!declined.is_done());
	assert!(lib.get_book(b.book_id).await.is_ok());

	let deleted = lib.delete_book(&root, b.book_id, &mut yes()).await.unwrap().done().unwrap();
	assert_eq!(deleted.book_id, b.book_id);
	assert!(matches!(lib.get_book(b.book_id).await, Err(LibraryError::NotFound { .. })));
	assert!(matches!(
		lib.delete_book(&root, b.book_id, &mut yes()).await,
		Err(LibraryError::NotFound { .. }),
	));
}

#[tokio::test]
async fn search_is_conjunctive_and_case_insensitive() {
	let lib = library().await;
	let root = superadmin(&lib).await;
	book(&lib, &root, "The Left Hand of Darkness", "Le Guin", 1).await;
	book(&lib, &root, "The Dispossessed", "Le Guin", 1).await;
	book(&lib, &root, "Darkness at Noon", "Koestler", 1).await;
	book(&lib, &root, "100% Wolf", "Burt", 1).await;

	let q = |title: Option<&str>, author: Option<&str>| BookQuery {
		title: title.map(str::to_string),
		author: author.map(str::to_string),
		isbn: None,
	};

	let dark = lib.search_books(q(Some("DARKNESS"), None)).await.unwrap();
	assert_eq!(dark.len(), 2);

	let both = lib.search_books(q(Some("darkness"), Some("guin"))).await.unwrap();
	assert_eq!(both.len(), 1);
	assert_eq!(both[0].title, "The Left Hand of Darkness");

	let literal = lib.search_books(q(Some("0%"), None)).await.unwrap();
	assert_eq!(literal.len(), 1);
	assert_eq!(literal[0].author, "Burt");
	assert!(lib.search_books(q(Some("_"), None)).await.unwrap().is_empty());

	let everything = lib.search_books(q(Some(" "), None)).await.unwrap();
	assert_eq!(everything.len(), 4);
	assert_eq!(everything[0].title, "100% Wolf");
}

#[tokio::test]
async fn catalog_actions_follow_granted_permissions() {
	let lib = library().await;
	let root = superadmin(&lib).await;
	let clerk = user(&lib, "clerk", Role::Admin, "add_book").await;
	let rita = reader(&lib, "rita").await;

	let b = book(&lib, &clerk, "Howl", "Ginsberg", 1).await;
	let changes = BookChanges { quantity: Some(2), ..Default::default() };
	let err = lib.update_book(&clerk, b.book_id, changes.clone(), &mut yes()).await.unwrap_err();
	assert!(matches!(err, LibraryError::PermissionDenied(_)), "{err:?}");
	assert!(matches!(
		lib.delete_book(&clerk, b.book_id, &mut yes()).await,
		Err(LibraryError::PermissionDenied(_)),
	));
	assert!(matches!(
		lib.add_book(&rita, titled("Kaddish", "Ginsberg", 1)).await,
		Err(LibraryError::PermissionDenied(_)),
	));

	assert!(lib.update_book(&root, b.book_id, changes, &mut yes()).await.unwrap().is_done());
	assert_eq!(lib.get_book(b.book_id).await.unwrap().quantity, 2);
}

#[tokio::test]
async fn search_folds_case_beyond_ascii() {
	let lib = library().await;
	let root = superadmin(&lib).await;
	book(&lib, &root, "Émile", "Rousseau", 1).await;
	book(&lib, &root, "Straße", "Ödön", 1).await;

	let by_title = lib.search_books(BookQuery { title: Some("émile".into()), ..Default::default() }).await.unwrap();
	assert_eq!(by_title.len(), 1);
	assert_eq!(by_title[0].title, "Émile");

	let by_author = lib.search_books(BookQuery { author: Some("ÖDÖN".into()), ..Default::default() }).await.unwrap();
	assert_eq!(by_author.len(), 1);
	assert_eq!(by_author[0].title, "Straße");
}
