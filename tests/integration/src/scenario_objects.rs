//! Object store scenarios: round trips and the pagination walk.

use bytes::Bytes;

use crate::test_stack;

#[test]
fn test_should_round_trip_body_and_etag() {
    let stack = test_stack();
    stack.objects.create_bucket("round-trip").unwrap();

    let etag = stack
        .objects
        .put_object("round-trip", "k", Bytes::from_static(b"payload"), None)
        .unwrap();

    let fetched = stack.objects.get_object("round-trip", "k").unwrap();
    assert_eq!(&fetched.body[..], b"payload");
    assert_eq!(stack.objects.head_object("round-trip", "k").unwrap().etag, etag);
}

#[test]
fn test_should_walk_pagination_across_five_keys() {
    let stack = test_stack();
    stack.objects.create_bucket("paging").unwrap();
    for key in ["a", "b", "c", "d", "e"] {
        stack
            .objects
            .put_object("paging", key, Bytes::from_static(b"x"), None)
            .unwrap();
    }

    let page = stack.objects.list_objects_v2("paging", "", Some(2), None).unwrap();
    let keys: Vec<&str> = page.objects.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(keys, vec!["a", "b"]);
    assert!(page.is_truncated);
    assert_eq!(page.next_continuation_token.as_deref(), Some("b"));

    let page = stack
        .objects
        .list_objects_v2("paging", "", Some(2), Some("b"))
        .unwrap();
    let keys: Vec<&str> = page.objects.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(keys, vec!["c", "d"]);
    assert!(page.is_truncated);
    assert_eq!(page.next_continuation_token.as_deref(), Some("d"));

    let page = stack
        .objects
        .list_objects_v2("paging", "", Some(2), Some("d"))
        .unwrap();
    let keys: Vec<&str> = page.objects.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(keys, vec!["e"]);
    assert!(!page.is_truncated);
    assert!(page.next_continuation_token.is_none());
}

#[test]
fn test_should_list_exactly_the_prefixed_keys_in_order() {
    let stack = test_stack();
    stack.objects.create_bucket("prefixed").unwrap();
    for key in ["logs/2", "data/b", "logs/1", "data/a", "other"] {
        stack
            .objects
            .put_object("prefixed", key, Bytes::from_static(b"x"), None)
            .unwrap();
    }

    let page = stack
        .objects
        .list_objects_v2("prefixed", "data/", None, None)
        .unwrap();
    let keys: Vec<&str> = page.objects.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(keys, vec!["data/a", "data/b"]);
}
