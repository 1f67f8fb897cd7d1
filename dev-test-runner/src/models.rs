use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub type Timestamp = DateTime<Utc>;

#[derive(Debug, Clone, Serialize)]
pub struct Person {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Age")]
    pub age: i32,
    secret: String,
}

impl Person {
    pub fn new(name: &str, age: i32, secret: &str) -> Self {
        Person {
            name: name.to_string(),
            age,
            secret: secret.to_string(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub login: String,
    #[serde(skip)]
    pub password: String,
    #[serde(rename = "json_id")]
    #[cfg_attr(any(), genjson(rename = "id"))]
    pub id: u64,
    #[serde(rename = "hidden")]
    #[cfg_attr(any(), genjson(skip))]
    pub session: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Address {
    #[serde(rename = "City")]
    pub city: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Contact {
    #[serde(rename = "Addr")]
    pub addr: Option<Box<Address>>,
    pub home: Address,
}

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    #[serde(rename = "Tags")]
    pub tags: Vec<String>,
    pub scores: [u8; 3],
    pub ratings: Vec<Option<f64>>,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub at: Timestamp,
    pub seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Author {
    pub first: String,
    pub last: String,
}

impl Author {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first, self.last)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub value: i64,
    pub children: Vec<Node>,
    pub next: Option<Box<Node>>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct UserId(pub u64);

#[derive(Debug, Clone, Serialize)]
pub struct Reading<'a> {
    pub id: UserId,
    pub flag: bool,
    pub tiny: i8,
    pub size: usize,
    pub big: u128,
    pub celsius: f64,
    pub ratio: f32,
    pub label: &'a str,
    pub note: Cow<'a, str>,
    pub r#type: String,
}

#[derive(Debug, Clone, Default)]
pub struct Opaque {
    token: String,
}

impl Opaque {
    pub fn token(&self) -> &str {
        &self.token
    }
}

include!(concat!(env!("OUT_DIR"), "/gen_json.rs"));
