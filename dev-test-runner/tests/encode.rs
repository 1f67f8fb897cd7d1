use std::borrow::Cow;
use std::io;

use chrono::{FixedOffset, TimeZone, Utc};
use dev_test_runner::models::*;
use json_writegen::runtime::BufferPool;

fn text(bytes: std::io::Result<Vec<u8>>) -> String {
    String::from_utf8(bytes.unwrap()).unwrap()
}

fn pool() -> BufferPool {
    new_json_buffer_pool()
}

/// Accepts `limit` bytes, then fails every write.
struct FailingSink {
    limit: usize,
    taken: usize,
}

impl io::Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.taken >= self.limit {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
        }
        let n = buf.len().min(self.limit - self.taken);
        self.taken += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn unexported_fields_are_left_out() {
    let person = Person::new("Ann", 30, "hunter2");
    assert_eq!(person.secret(), "hunter2");
    assert_eq!(text(person.marshal_json(&pool())), r#"{"Name":"Ann","Age":30}"#);
}

#[test]
fn only_private_fields_encode_as_empty_object() {
    let opaque = Opaque::default();
    assert_eq!(opaque.token(), "");
    assert_eq!(text(opaque.marshal_json(&pool())), "{}");
}

#[test]
fn skip_and_alternate_tags() {
    let account = Account {
        login: "ann".into(),
        password: "hunter2".into(),
        id: 7,
        session: Some("s".into()),
    };
    assert_eq!(
        text(account.marshal_json(&pool())),
        r#"{"login":"ann","id":7}"#
    );
}

#[test]
fn nullable_pointer_fields() {
    let pool = pool();
    let mut contact = Contact {
        addr: None,
        home: Address { city: "Y".into() },
    };
    assert_eq!(
        text(contact.marshal_json(&pool)),
        r#"{"Addr":null,"home":{"City":"Y"}}"#
    );

    contact.addr = Some(Box::new(Address { city: "X".into() }));
    let encoded = text(contact.marshal_json(&pool));
    assert_eq!(encoded, r#"{"Addr":{"City":"X"},"home":{"City":"Y"}}"#);
    // the pointee encodes exactly as the value would on its own
    let direct = text(Address { city: "X".into() }.marshal_json(&pool));
    assert!(encoded.contains(&direct));
}

#[test]
fn sequences() {
    let post = Post {
        tags: Vec::new(),
        scores: [1, 2, 3],
        ratings: vec![Some(4.5), None, Some(0.0)],
    };
    assert_eq!(
        text(post.marshal_json(&pool())),
        r#"{"Tags":[],"scores":[1,2,3],"ratings":[4.5,null,0]}"#
    );

    let post = Post {
        tags: vec!["a".into(), "b\"c".into()],
        ..post
    };
    let encoded = text(post.marshal_json(&pool()));
    assert_eq!(encoded, serde_json::to_string(&post).unwrap().replace("0.0", "0"));
    assert!(encoded.starts_with(r#"{"Tags":["a","b\"c"],"#));
}

#[test]
fn temporal_fields_are_unix_seconds() {
    let at = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    let offset = FixedOffset::east_opt(5 * 3600).unwrap();
    let seen = offset
        .with_ymd_and_hms(2021, 1, 1, 5, 0, 30)
        .unwrap()
        .with_timezone(&Utc);
    let event = Event {
        name: "launch".into(),
        at,
        seen: Some(seen),
    };
    assert_eq!(
        text(event.marshal_json(&pool())),
        r#"{"name":"launch","at":1609459200,"seen":1609459230}"#
    );
}

#[test]
fn virtual_field_follows_declared_fields() {
    let author = Author {
        first: "Ann".into(),
        last: "Lee".into(),
    };
    assert_eq!(
        text(author.marshal_json(&pool())),
        r#"{"first":"Ann","last":"Lee","full_name":"Ann Lee"}"#
    );
}

#[test]
fn recursive_types_match_serde() {
    let tree = Node {
        value: 1,
        children: vec![
            Node {
                value: 2,
                children: Vec::new(),
                next: None,
            },
            Node {
                value: -3,
                children: Vec::new(),
                next: Some(Box::new(Node {
                    value: 4,
                    children: Vec::new(),
                    next: None,
                })),
            },
        ],
        next: None,
    };
    assert_eq!(
        text(tree.marshal_json(&pool())),
        serde_json::to_string(&tree).unwrap()
    );
}

#[test]
fn scalars_and_borrowed_fields_match_serde() {
    let note = String::from("multi\nline \u{2603}");
    let reading = Reading {
        id: UserId(42),
        flag: true,
        tiny: -8,
        size: 12,
        big: u128::MAX,
        celsius: 21.5,
        ratio: 0.25,
        label: "tab\there",
        note: Cow::Borrowed(&note),
        r#type: "sensor".into(),
    };
    assert_eq!(
        text(reading.marshal_json(&pool())),
        serde_json::to_string(&reading).unwrap()
    );
}

#[test]
fn write_json_reports_bytes_and_reuses_buffers() {
    let pool = pool();
    let author = Author {
        first: "Ann".into(),
        last: "Lee".into(),
    };
    let mut out = Vec::new();
    for _ in 0..3 {
        let written = author.write_json(&pool, &mut out).unwrap();
        assert_eq!(written, 50);
    }
    assert_eq!(out.len(), 3 * 50);
    let stats = pool.stats();
    assert_eq!(stats.allocated, 1);
    assert_eq!(stats.reused, 2);
}

#[test]
fn generated_pool_uses_configured_sizes() {
    let config = *pool().config();
    assert_eq!(config.buffer_size, 8192);
    assert_eq!(config.max_buffer_size, 65536);
    assert_eq!(
        config.capacity,
        json_writegen::runtime::PoolCapacity::Fixed(4)
    );
}

#[test]
fn write_errors_reach_caller_and_release_buffer() {
    let pool = pool();
    let author = Author {
        first: "Ann".into(),
        last: "Lee".into(),
    };
    for limit in [0, 10] {
        let mut sink = FailingSink { limit, taken: 0 };
        let err = author.write_json(&pool, &mut sink).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(err.to_string(), "sink closed");
        assert_eq!(sink.taken, limit);
        assert_eq!(pool.stats().idle, 1);
    }

    let mut out = Vec::new();
    assert_eq!(author.write_json(&pool, &mut out).unwrap(), 50);
    let stats = pool.stats();
    assert_eq!(stats.allocated, 1);
    assert_eq!(stats.reused, 2);
    assert_eq!(stats.discarded, 0);
}
